//! PageRank algorithms
//!
//! This module provides the per-topic power iteration shared by every rank
//! variant, plus the variants themselves:
//!
//! - [`standard::TopicSensitivePageRank`]: even split over out-links
//! - [`weighted::LinkWeightedPageRank`]: split by target relevance to the topic
//! - [`personalized::AnchoredPageRank`]: link-weighted, teleporting to one article
//!
//! Every variant computes one topic column at a time into a caller-owned
//! slice. Mass leaked by dangling nodes is measured after each iteration and
//! put back along the teleport vector, so each column always sums to 1.

pub mod personalized;
pub mod standard;
pub mod weighted;

use crate::errors::{RankError, Result};
use crate::graph::csr::ArticleGraph;
use crate::types::{RankConfig, RankVariant, VariantKind};

/// How a column's iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The summed L1 delta dropped below the threshold
    Converged,
    /// The iteration cap was reached first
    NotReached,
    /// No threshold configured; a fixed number of iterations ran
    Unchecked,
}

/// Result of ranking one topic column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnOutcome {
    pub variant: VariantKind,
    pub topic: usize,
    /// Number of iterations performed
    pub iterations: usize,
    /// Summed L1 delta of the last iteration
    pub delta: f64,
    pub convergence: Convergence,
}

impl ColumnOutcome {
    /// Whether the algorithm converged
    pub fn is_converged(&self) -> bool {
        self.convergence == Convergence::Converged
    }

    /// Report a missed threshold as [`RankError::ConvergenceNotReached`]
    ///
    /// The column keeps its last computed values either way.
    pub fn ensure_converged(&self) -> Result<()> {
        match self.convergence {
            Convergence::NotReached => Err(RankError::ConvergenceNotReached {
                variant: self.variant,
                topic: self.topic,
                iterations: self.iterations,
                delta: self.delta,
            }),
            Convergence::Converged | Convergence::Unchecked => Ok(()),
        }
    }
}

/// A rank algorithm that fills one topic column of a shared graph
///
/// Implementations only read the graph; `out` is the single column the
/// caller has granted exclusive access to.
pub trait ColumnRanker {
    /// The variant this ranker computes
    fn variant(&self) -> RankVariant;

    /// Rank one topic column into `out` (one slot per node)
    fn rank_column(&self, graph: &ArticleGraph, topic: usize, out: &mut [f64])
        -> Result<ColumnOutcome>;
}

/// Build the ranker for a variant
pub fn ranker_for(variant: RankVariant, config: RankConfig) -> Box<dyn ColumnRanker + Send + Sync> {
    match variant {
        RankVariant::TopicSensitive => {
            Box::new(standard::TopicSensitivePageRank::with_config(config))
        }
        RankVariant::LinkWeighted => Box::new(weighted::LinkWeightedPageRank::with_config(config)),
        RankVariant::Anchored { anchor } => {
            Box::new(personalized::AnchoredPageRank::with_config(anchor, config))
        }
    }
}

// ============================================================================
// Shared kernel
// ============================================================================

/// Reject a topic index or output slice that doesn't fit the graph
pub(crate) fn check_column(graph: &ArticleGraph, topic: usize, out: &[f64]) -> Result<()> {
    if topic >= graph.num_topics() {
        return Err(RankError::UnknownTopic {
            topic,
            num_topics: graph.num_topics(),
        });
    }
    if out.len() != graph.num_nodes() {
        return Err(RankError::Scheduler(format!(
            "output column has {} slots for {} nodes",
            out.len(),
            graph.num_nodes()
        )));
    }
    Ok(())
}

/// The topic prior column scaled to sum to 1
///
/// Falls back to uniform when the column sums to zero, since no node is
/// preferred.
pub(crate) fn normalized_prior(graph: &ArticleGraph, topic: usize) -> Vec<f64> {
    let n = graph.num_nodes();
    let sum = graph.prior_sum(topic);
    if sum > 0.0 {
        graph.prior_column(topic).iter().map(|&p| p / sum).collect()
    } else {
        tracing::warn!(topic, "topic prior sums to zero, teleporting uniformly");
        vec![1.0 / n as f64; n]
    }
}

/// Per-target edge weights `follow_prior + prior(target)` for one topic
pub(crate) fn follow_weights(graph: &ArticleGraph, topic: usize, follow_prior: f64) -> Vec<f64> {
    graph
        .prior_column(topic)
        .iter()
        .map(|&p| follow_prior + p)
        .collect()
}

/// Power iteration for one column
///
/// `teleport` must sum to 1; it seeds the column and receives leaked mass.
/// With `target_weights`, a node's rank is split across its links in
/// proportion to the weight of each target; otherwise it is split evenly.
/// Dangling nodes distribute nothing: their share comes back through the
/// leak step.
pub(crate) fn power_iterate(
    graph: &ArticleGraph,
    config: &RankConfig,
    teleport: &[f64],
    target_weights: Option<&[f64]>,
    out: &mut [f64],
) -> (usize, f64, Convergence) {
    let n = graph.num_nodes();
    out.copy_from_slice(teleport);
    let mut next = vec![0.0; n];

    // Total outgoing weight for each node, fixed for the whole run
    let totals: Option<Vec<f64>> = target_weights.map(|weights| {
        (0..n as u32)
            .map(|node| {
                graph
                    .neighbors(node)
                    .iter()
                    .map(|&v| weights[v as usize])
                    .sum()
            })
            .collect()
    });

    let mut iterations = 0;
    let mut delta = f64::INFINITY;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;
        next.fill(0.0);

        // Propagate scores through edges
        for (node, &score) in out.iter().enumerate() {
            let neighbors = graph.neighbors(node as u32);
            if neighbors.is_empty() {
                continue;
            }
            let mass = config.damping * score;

            match (target_weights, totals.as_deref()) {
                (Some(weights), Some(totals)) => {
                    let total = totals[node];
                    if total > 0.0 {
                        for &v in neighbors {
                            next[v as usize] += mass * weights[v as usize] / total;
                        }
                    }
                }
                _ => {
                    let share = mass / neighbors.len() as f64;
                    for &v in neighbors {
                        next[v as usize] += share;
                    }
                }
            }
        }

        // Reinsert leaked mass along the teleport vector
        let leaked = 1.0 - next.iter().sum::<f64>();
        for (score, &p) in next.iter_mut().zip(teleport) {
            *score += leaked * p;
        }

        // Calculate convergence delta (L1 norm)
        delta = out
            .iter()
            .zip(next.iter())
            .map(|(old, new)| (old - new).abs())
            .sum();

        out.copy_from_slice(&next);
        tracing::trace!(iteration = iterations, delta, leaked, "power iteration");

        if let Some(threshold) = config.threshold {
            if delta < threshold {
                converged = true;
                break;
            }
        }
    }

    let convergence = match config.threshold {
        None => Convergence::Unchecked,
        Some(_) if converged => Convergence::Converged,
        Some(_) => Convergence::NotReached,
    };
    (iterations, delta, convergence)
}

/// Fail if a column picked up NaN or infinite values
pub(crate) fn check_finite(out: &[f64], variant: VariantKind, topic: usize) -> Result<()> {
    match out.iter().position(|v| !v.is_finite()) {
        Some(node) => Err(RankError::Numerical(format!(
            "{variant} rank for topic {topic} is {} at node {node}",
            out[node]
        ))),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_graphs::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ensure_converged_reports_missed_threshold() {
        let outcome = ColumnOutcome {
            variant: VariantKind::TopicSensitive,
            topic: 2,
            iterations: 1,
            delta: 0.5,
            convergence: Convergence::NotReached,
        };

        let err = outcome.ensure_converged().unwrap_err();
        assert!(matches!(
            err,
            RankError::ConvergenceNotReached { topic: 2, iterations: 1, .. }
        ));
    }

    #[test]
    fn test_unchecked_is_not_an_error() {
        let outcome = ColumnOutcome {
            variant: VariantKind::LinkWeighted,
            topic: 0,
            iterations: 50,
            delta: 0.1,
            convergence: Convergence::Unchecked,
        };
        assert!(outcome.ensure_converged().is_ok());
        assert!(!outcome.is_converged());
    }

    #[test]
    fn test_check_column_rejects_bad_topic() {
        let graph = build_four_node_graph();
        let out = vec![0.0; 4];
        assert!(matches!(
            check_column(&graph, 2, &out),
            Err(RankError::UnknownTopic { topic: 2, num_topics: 2 })
        ));
        assert!(check_column(&graph, 1, &out).is_ok());
        assert!(check_column(&graph, 1, &out[..3]).is_err());
    }

    #[test]
    fn test_normalized_prior_sums_to_one() {
        let graph = build_four_node_graph();
        let p = normalized_prior(&graph, 1);
        assert!(p.iter().all(|&x| (x - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_normalized_prior_zero_column_is_uniform() {
        let graph = ArticleGraph::load(vec![
            crate::types::ArticleRecord::new(1, "a", vec![2], vec![0.0]),
            crate::types::ArticleRecord::new(2, "b", vec![], vec![0.0]),
        ])
        .unwrap();
        assert_eq!(normalized_prior(&graph, 0), vec![0.5, 0.5]);
    }

    #[test]
    fn test_dangling_hub_stays_finite() {
        let graph = build_star_graph();
        let teleport = normalized_prior(&graph, 0);
        let mut out = vec![0.0; 4];
        let cfg = RankConfig::new().fixed_iterations(1);

        power_iterate(&graph, &cfg, &teleport, None, &mut out);

        assert!(out.iter().all(|v| v.is_finite()));
        let sum: f64 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_finite_flags_nan() {
        let err = check_finite(&[0.5, f64::NAN], VariantKind::TopicSensitive, 0).unwrap_err();
        assert!(matches!(err, RankError::Numerical(_)));
        assert!(check_finite(&[0.5, 0.5], VariantKind::TopicSensitive, 0).is_ok());
    }

    fn deltas(graph: &ArticleGraph, weights: Option<&[f64]>, rounds: usize) -> Vec<f64> {
        let teleport = normalized_prior(graph, 0);
        (1..=rounds)
            .map(|k| {
                let mut out = vec![0.0; graph.num_nodes()];
                let cfg = RankConfig::new().fixed_iterations(k);
                power_iterate(graph, &cfg, &teleport, weights, &mut out).1
            })
            .collect()
    }

    proptest! {
        #[test]
        fn mass_is_conserved_every_iteration(
            n in 5usize..50,
            edges in proptest::collection::vec((0usize..50, 0usize..50), 0..200),
            priors in proptest::collection::vec(0.0f64..1.0, 1..50),
            iterations in 1usize..30,
            weighted in any::<bool>(),
        ) {
            let graph = build_random_graph(n, &edges, &priors);
            let teleport = normalized_prior(&graph, 0);
            let weights = follow_weights(&graph, 0, 0.1);
            let mut out = vec![0.0; n];
            let cfg = RankConfig::new().fixed_iterations(iterations);

            power_iterate(&graph, &cfg, &teleport, weighted.then_some(weights.as_slice()), &mut out);

            let sum: f64 = out.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9, "sum = {}", sum);
            prop_assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
        }

        #[test]
        fn l1_delta_is_non_increasing(
            n in 5usize..50,
            edges in proptest::collection::vec((0usize..50, 0usize..50), 0..200),
            priors in proptest::collection::vec(0.0f64..1.0, 1..50),
            weighted in any::<bool>(),
        ) {
            let graph = build_random_graph(n, &edges, &priors);
            let weights = follow_weights(&graph, 0, 0.1);
            let deltas = deltas(&graph, weighted.then_some(weights.as_slice()), 15);

            for pair in deltas.windows(2) {
                prop_assert!(pair[1] <= pair[0] + 1e-12, "{:?}", deltas);
            }
        }
    }
}
