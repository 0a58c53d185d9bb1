//! Core types shared across the graph, rank engine and retrieval layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RankError;

/// Default damping factor (probability of following a link).
pub const DEFAULT_DAMPING: f64 = 0.85;
/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;
/// Default smoothing added to every edge weight in the link-weighted variants.
pub const DEFAULT_FOLLOW_PRIOR: f64 = 0.1;

/// Index of the reserved background component for vectors of length `len`.
///
/// By convention the last component holds an undifferentiated score that
/// significance scoring uses as its denominator.
pub fn background_index(len: usize) -> Option<usize> {
    len.checked_sub(1)
}

// ============================================================================
// Rank configuration
// ============================================================================

/// Parameters shared by every rank variant.
///
/// When `threshold` is `None` the engine runs exactly `max_iterations`
/// iterations and skips the convergence check. Otherwise it stops the first
/// time the summed L1 delta of a column drops below the threshold, or when
/// the cap is reached (reported as not converged).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    /// Damping factor (typically 0.85)
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Maximum number of iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the summed L1 delta
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Smoothing constant for link-weighted edge splitting
    #[serde(default = "default_follow_prior")]
    pub follow_prior: f64,
}

fn default_damping() -> f64 {
    DEFAULT_DAMPING
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_follow_prior() -> f64 {
    DEFAULT_FOLLOW_PRIOR
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: None,
            follow_prior: DEFAULT_FOLLOW_PRIOR,
        }
    }
}

impl RankConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the damping factor
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set the maximum iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Run a fixed number of iterations without a convergence check
    pub fn fixed_iterations(mut self, iterations: usize) -> Self {
        self.threshold = None;
        self.max_iterations = iterations;
        self
    }

    /// Set the follow prior used by the link-weighted variants
    pub fn with_follow_prior(mut self, follow_prior: f64) -> Self {
        self.follow_prior = follow_prior;
        self
    }
}

// ============================================================================
// Variants
// ============================================================================

/// Rank algorithm family, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Even split over out-edges, teleport by topic prior.
    TopicSensitive,
    /// Split by `follow_prior + prior(target)`, teleport by topic prior.
    LinkWeighted,
    /// Link-weighted split, teleport to a single anchor node.
    Anchored,
}

impl VariantKind {
    /// Returns the user-facing name used in JSON and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicSensitive => "topic_sensitive",
            Self::LinkWeighted => "link_weighted",
            Self::Anchored => "anchored",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-specified variant, ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankVariant {
    TopicSensitive,
    LinkWeighted,
    /// Anchor given by external article id.
    Anchored { anchor: u64 },
}

impl RankVariant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Self::TopicSensitive => VariantKind::TopicSensitive,
            Self::LinkWeighted => VariantKind::LinkWeighted,
            Self::Anchored { .. } => VariantKind::Anchored,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One article as produced by ingestion joined with topic-model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: u64,
    pub title: String,
    /// External ids of linked articles
    pub edges: Vec<u64>,
    /// Topic distribution (length T, background component last)
    pub topics: Vec<f64>,
    /// Optional classification label (e.g. infobox type)
    #[serde(default)]
    pub category: Option<String>,
}

impl ArticleRecord {
    pub fn new(id: u64, title: impl Into<String>, edges: Vec<u64>, topics: Vec<f64>) -> Self {
        Self {
            id,
            title: title.into(),
            edges,
            topics,
            category: None,
        }
    }

    /// Attach a category tag
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The exported, query-time representation of an article.
///
/// All three vectors are index-aligned and have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub topics: Vec<f64>,
    pub global_rank: Vec<f64>,
    pub personalized_rank: Vec<f64>,
}

impl FeatureVector {
    /// Get the vector for a feature space
    pub fn space(&self, space: FeatureSpace) -> &[f64] {
        match space {
            FeatureSpace::Topics => &self.topics,
            FeatureSpace::GlobalRank => &self.global_rank,
            FeatureSpace::PersonalizedRank => &self.personalized_rank,
        }
    }

    /// Number of topic components (including the background component)
    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }

    /// Index of the reserved background component
    pub fn background_index(&self) -> Option<usize> {
        background_index(self.topics.len())
    }

    /// Check whether the category matches exactly
    pub fn has_category(&self, tag: &str) -> bool {
        self.category.as_deref() == Some(tag)
    }
}

// ============================================================================
// Query vocabulary
// ============================================================================

/// Which vector of a [`FeatureVector`] a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSpace {
    Topics,
    GlobalRank,
    PersonalizedRank,
}

impl FeatureSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topics => "topics",
            Self::GlobalRank => "global_rank",
            Self::PersonalizedRank => "personalized_rank",
        }
    }
}

impl FromStr for FeatureSpace {
    type Err = RankError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "lda" | "topics" | "topic" => Ok(Self::Topics),
            "tspr" | "global" | "global_rank" => Ok(Self::GlobalRank),
            "lspr" | "personalized" | "personalized_rank" => Ok(Self::PersonalizedRank),
            _ => Err(RankError::unsupported("features", value)),
        }
    }
}

/// Similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    /// Euclidean distance, ranked by its inverse so that closer sorts first
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

impl FromStr for Metric {
    type Err = RankError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "cosine" | "cos" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            _ => Err(RankError::unsupported("metric", value)),
        }
    }
}
