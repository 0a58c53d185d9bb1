//! Rank run specification types.
//!
//! A [`RankSpec`] describes the rank parameters, which variant fills each
//! output slot, the optional anchor for the personalized slot, and runtime
//! limits. These types are the input to the
//! [`super::validation::ValidationEngine`].
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "rank": { "damping": 0.85, "max_iterations": 50, "threshold": 1e-9 },
//!   "global": "topic_sensitive",
//!   "personalized": "anchored",
//!   "anchor": "Alan Turing",
//!   "runtime": { "threads": 8, "insert_batch_size": 1000 },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::validation::ValidationEngine;
use crate::errors::{RankError, Result};
use crate::types::{RankConfig, VariantKind};

/// Default extra worker threads on top of available parallelism.
pub const DEFAULT_HEADROOM: usize = 2;
/// Default number of records per `insert_batch` call.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1000;
/// Default number of records per fetch when scanning a store.
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 5000;

/// Top-level rank specification (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    /// Damping, iteration cap, threshold and follow prior.
    #[serde(default)]
    pub rank: RankSection,

    /// Variant that fills the global rank slot.
    #[serde(default = "default_global")]
    pub global: VariantKind,

    /// Variant that fills the personalized rank slot. `null` skips the slot.
    #[serde(default = "default_personalized")]
    pub personalized: Option<VariantKind>,

    /// Anchor article for the `anchored` variant.
    #[serde(default)]
    pub anchor: Option<AnchorRef>,

    /// Runtime execution limits.
    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    /// Used by the strict-mode validation rule.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

fn default_global() -> VariantKind {
    VariantKind::TopicSensitive
}

fn default_personalized() -> Option<VariantKind> {
    Some(VariantKind::LinkWeighted)
}

/// The `rank` section: a [`RankConfig`] plus any keys it doesn't know.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankSection {
    #[serde(flatten)]
    pub config: RankConfig,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl From<RankConfig> for RankSection {
    fn from(config: RankConfig) -> Self {
        Self {
            config,
            unknown_fields: HashMap::new(),
        }
    }
}

/// An anchor article, by external id or by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnchorRef {
    Id(u64),
    Title(String),
}

/// Runtime execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Fixed worker count. When absent the pool uses available
    /// parallelism plus `headroom`.
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default = "default_headroom")]
    pub headroom: usize,

    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

fn default_headroom() -> usize {
    DEFAULT_HEADROOM
}

fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH_SIZE
}

fn default_fetch_batch_size() -> usize {
    DEFAULT_FETCH_BATCH_SIZE
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self {
            threads: None,
            headroom: DEFAULT_HEADROOM,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
            unknown_fields: HashMap::new(),
        }
    }
}

impl Default for RankSpec {
    fn default() -> Self {
        Self {
            v: 1,
            rank: RankSection::default(),
            global: default_global(),
            personalized: default_personalized(),
            anchor: None,
            runtime: RuntimeSpec::default(),
            strict: false,
            unknown_fields: HashMap::new(),
        }
    }
}

impl RankSpec {
    /// Parse a spec from JSON without validating it.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Run the default rule set; warnings are logged, the first error is
    /// returned as [`RankError::InvalidSpec`].
    pub fn validated(self) -> Result<Self> {
        let report = ValidationEngine::with_defaults().validate(&self);
        for warning in report.warnings() {
            tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
        }
        let first = report.errors().next().cloned();
        match first {
            Some(err) => Err(RankError::InvalidSpec(err)),
            None => Ok(self),
        }
    }

    /// The rank parameters shared by every task of the run.
    pub fn rank_config(&self) -> RankConfig {
        self.rank.config
    }

    /// Whether any slot uses the anchored variant.
    pub fn uses_anchor(&self) -> bool {
        self.global == VariantKind::Anchored || self.personalized == Some(VariantKind::Anchored)
    }
}
