//! Link-weighted topic-sensitive PageRank
//!
//! A surfer on topic `t` is more likely to follow links to articles that are
//! themselves about `t`. Each link `u → v` gets weight
//! `follow_prior + prior(v, t)`, and `u`'s rank is split in proportion to
//! those weights. The follow prior keeps every link followable, even to
//! articles with zero weight on the topic.

use super::{
    check_column, check_finite, follow_weights, normalized_prior, power_iterate, ColumnOutcome,
    ColumnRanker,
};
use crate::errors::Result;
use crate::graph::csr::ArticleGraph;
use crate::types::{RankConfig, RankVariant, VariantKind};

/// Link-weighted PageRank implementation
#[derive(Debug, Clone, Default)]
pub struct LinkWeightedPageRank {
    pub config: RankConfig,
}

impl LinkWeightedPageRank {
    /// Create a new LinkWeightedPageRank with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: RankConfig) -> Self {
        Self { config }
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

    /// Rank one topic into a freshly allocated column
    pub fn run(&self, graph: &ArticleGraph, topic: usize) -> Result<(Vec<f64>, ColumnOutcome)> {
        let mut scores = vec![0.0; graph.num_nodes()];
        let outcome = self.rank_column(graph, topic, &mut scores)?;
        Ok((scores, outcome))
    }
}

impl ColumnRanker for LinkWeightedPageRank {
    fn variant(&self) -> RankVariant {
        RankVariant::LinkWeighted
    }

    fn rank_column(
        &self,
        graph: &ArticleGraph,
        topic: usize,
        out: &mut [f64],
    ) -> Result<ColumnOutcome> {
        check_column(graph, topic, out)?;

        let teleport = normalized_prior(graph, topic);
        let weights = follow_weights(graph, topic, self.config.follow_prior);
        let (iterations, delta, convergence) =
            power_iterate(graph, &self.config, &teleport, Some(&weights), out);
        check_finite(out, VariantKind::LinkWeighted, topic)?;

        Ok(ColumnOutcome {
            variant: VariantKind::LinkWeighted,
            topic,
            iterations,
            delta,
            convergence,
        })
    }
}
