//! Anchored (personalized) PageRank
//!
//! Uses the link-weighted split, but every teleport (and all leaked mass)
//! lands on a single anchor article instead of being spread by topic prior.
//! The result answers "what is most reachable from this article, for topic t".

use super::{check_column, check_finite, follow_weights, power_iterate, ColumnOutcome, ColumnRanker};
use crate::errors::{RankError, Result};
use crate::graph::csr::ArticleGraph;
use crate::types::{RankConfig, RankVariant, VariantKind};

/// Anchored PageRank implementation
#[derive(Debug, Clone)]
pub struct AnchoredPageRank {
    pub config: RankConfig,
    /// External id of the anchor article
    anchor: u64,
}

impl AnchoredPageRank {
    /// Create an AnchoredPageRank for an anchor article, with default settings
    pub fn new(anchor: u64) -> Self {
        Self::with_config(anchor, RankConfig::default())
    }

    /// Create with custom config
    pub fn with_config(anchor: u64, config: RankConfig) -> Self {
        Self { config, anchor }
    }

    /// Set the smoothing constant added to every link weight
    pub fn with_follow_prior(mut self, follow_prior: f64) -> Self {
        self.config.follow_prior = follow_prior;
        self
    }

    /// Set the convergence threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = Some(threshold);
        self
    }

    /// Set the maximum iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn anchor(&self) -> u64 {
        self.anchor
    }

    /// Rank one topic into a freshly allocated column
    pub fn run(&self, graph: &ArticleGraph, topic: usize) -> Result<(Vec<f64>, ColumnOutcome)> {
        let mut scores = vec![0.0; graph.num_nodes()];
        let outcome = self.rank_column(graph, topic, &mut scores)?;
        Ok((scores, outcome))
    }
}

/// One-hot teleport vector on the anchor
fn anchor_teleport(graph: &ArticleGraph, anchor: u64) -> Result<Vec<f64>> {
    let index = graph
        .index_of(anchor)
        .ok_or(RankError::UnknownNode(anchor))?;
    let mut teleport = vec![0.0; graph.num_nodes()];
    teleport[index as usize] = 1.0;
    Ok(teleport)
}

impl ColumnRanker for AnchoredPageRank {
    fn variant(&self) -> RankVariant {
        RankVariant::Anchored {
            anchor: self.anchor,
        }
    }

    fn rank_column(
        &self,
        graph: &ArticleGraph,
        topic: usize,
        out: &mut [f64],
    ) -> Result<ColumnOutcome> {
        check_column(graph, topic, out)?;

        let teleport = anchor_teleport(graph, self.anchor)?;
        let weights = follow_weights(graph, topic, self.config.follow_prior);
        let (iterations, delta, convergence) =
            power_iterate(graph, &self.config, &teleport, Some(&weights), out);
        check_finite(out, VariantKind::Anchored, topic)?;

        Ok(ColumnOutcome {
            variant: VariantKind::Anchored,
            topic,
            iterations,
            delta,
            convergence,
        })
    }
}
