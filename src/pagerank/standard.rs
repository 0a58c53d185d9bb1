//! Topic-sensitive PageRank
//!
//! Classic power iteration with the uniform teleport replaced by one topic's
//! prior distribution. Each node's rank is divided evenly across its links.

use super::{check_column, check_finite, normalized_prior, power_iterate, ColumnOutcome, ColumnRanker};
use crate::errors::Result;
use crate::graph::csr::ArticleGraph;
use crate::types::{RankConfig, RankVariant, VariantKind};

/// Topic-sensitive PageRank implementation
#[derive(Debug, Clone, Default)]
pub struct TopicSensitivePageRank {
    pub config: RankConfig,
}

impl TopicSensitivePageRank {
    /// Create a new TopicSensitivePageRank with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: RankConfig) -> Self {
        Self { config }
    }

    /// Set the damping factor
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.config.damping = damping;
        self
    }

    /// Set the maximum iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = Some(threshold);
        self
    }

    /// Rank one topic into a freshly allocated column
    pub fn run(&self, graph: &ArticleGraph, topic: usize) -> Result<(Vec<f64>, ColumnOutcome)> {
        let mut scores = vec![0.0; graph.num_nodes()];
        let outcome = self.rank_column(graph, topic, &mut scores)?;
        Ok((scores, outcome))
    }
}

impl ColumnRanker for TopicSensitivePageRank {
    fn variant(&self) -> RankVariant {
        RankVariant::TopicSensitive
    }

    fn rank_column(
        &self,
        graph: &ArticleGraph,
        topic: usize,
        out: &mut [f64],
    ) -> Result<ColumnOutcome> {
        check_column(graph, topic, out)?;

        let teleport = normalized_prior(graph, topic);
        let (iterations, delta, convergence) =
            power_iterate(graph, &self.config, &teleport, None, out);
        check_finite(out, VariantKind::TopicSensitive, topic)?;

        Ok(ColumnOutcome {
            variant: VariantKind::TopicSensitive,
            topic,
            iterations,
            delta,
            convergence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RankError;
    use crate::pagerank::test_graphs::{build_four_node_graph, build_star_graph};
    use crate::pagerank::Convergence;
    use crate::types::ArticleRecord;

    fn build_triangle_graph() -> ArticleGraph {
        ArticleGraph::load(vec![
            ArticleRecord::new(1, "a", vec![2], vec![1.0]),
            ArticleRecord::new(2, "b", vec![3], vec![1.0]),
            ArticleRecord::new(3, "c", vec![1], vec![1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_triangle_graph_equal_scores() {
        let graph = build_triangle_graph();
        let pr = TopicSensitivePageRank::new().with_threshold(1e-10).with_max_iterations(200);
        let (scores, outcome) = pr.run(&graph, 0).unwrap();

        assert!(outcome.is_converged());
        for score in &scores {
            assert!((score - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_four_node_scenario() {
        let graph = build_four_node_graph();
        let pr = TopicSensitivePageRank::new().with_threshold(1e-10).with_max_iterations(500);
        let (scores, outcome) = pr.run(&graph, 0).unwrap();

        assert_eq!(outcome.convergence, Convergence::Converged);
        assert!(outcome.delta < 1e-10);

        let sum: f64 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        // A is linked from both C and D; D has no in-links
        let (a, d) = (scores[0], scores[3]);
        assert!(a > d);
        // D only ever receives its teleport share of the (1 - beta) leak
        assert!((d - 0.15 * 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_single_iteration_without_convergence() {
        let graph = build_four_node_graph();
        let pr = TopicSensitivePageRank::new()
            .with_max_iterations(1)
            .with_threshold(0.0); // Never converge

        let (scores, outcome) = pr.run(&graph, 0).unwrap();

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.convergence, Convergence::NotReached);
        assert!(matches!(
            outcome.ensure_converged(),
            Err(RankError::ConvergenceNotReached { iterations: 1, .. })
        ));

        // First-iteration values: beta-scaled propagation plus 0.15 leak by prior
        let expected = [0.315, 0.385, 0.285, 0.015];
        for (score, want) in scores.iter().zip(expected) {
            assert!((score - want).abs() < 1e-12, "{score} != {want}");
        }
    }

    #[test]
    fn test_fixed_iterations_skip_convergence_check() {
        let graph = build_four_node_graph();
        let pr = TopicSensitivePageRank::with_config(RankConfig::new().fixed_iterations(3));
        let (_, outcome) = pr.run(&graph, 0).unwrap();

        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.convergence, Convergence::Unchecked);
        assert!(outcome.ensure_converged().is_ok());
    }

    #[test]
    fn test_star_graph_hub_highest() {
        let graph = build_star_graph();
        let pr = TopicSensitivePageRank::new().with_threshold(1e-10).with_max_iterations(200);
        let (scores, _) = pr.run(&graph, 0).unwrap();

        let hub_score = scores[0];
        for &score in &scores[1..] {
            assert!(hub_score > score);
        }
        let sum: f64 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prior_biases_rank() {
        // Two disconnected pairs; the topic favours the second pair
        let graph = ArticleGraph::load(vec![
            ArticleRecord::new(1, "a", vec![2], vec![0.05]),
            ArticleRecord::new(2, "b", vec![1], vec![0.05]),
            ArticleRecord::new(3, "c", vec![4], vec![0.45]),
            ArticleRecord::new(4, "d", vec![3], vec![0.45]),
        ])
        .unwrap();

        let (scores, _) = TopicSensitivePageRank::new().run(&graph, 0).unwrap();
        assert!(scores[2] > scores[0]);
        assert!(scores[3] > scores[1]);
    }

    #[test]
    fn test_damping_factor() {
        let graph = build_star_graph();

        let (low, _) = TopicSensitivePageRank::new().with_damping(0.5).run(&graph, 0).unwrap();
        let (high, _) = TopicSensitivePageRank::new().with_damping(0.95).run(&graph, 0).unwrap();

        // With higher damping, hub advantage should be more pronounced
        assert!(high[0] - high[1] > low[0] - low[1]);
    }

    #[test]
    fn test_unknown_topic() {
        let graph = build_triangle_graph();
        let err = TopicSensitivePageRank::new().run(&graph, 1).unwrap_err();
        assert!(matches!(err, RankError::UnknownTopic { topic: 1, num_topics: 1 }));
    }

    #[test]
    fn test_empty_graph() {
        let graph = ArticleGraph::default();
        let mut out: Vec<f64> = Vec::new();
        // No topics at all, so topic 0 is out of range
        assert!(TopicSensitivePageRank::new()
            .rank_column(&graph, 0, &mut out)
            .is_err());
    }
}
