//! Bounded top-k selection
//!
//! [`TopK`] keeps the `k` best items of a stream in a size-k min-heap, so
//! the stream never has to be collected or sorted. Ties keep the item that
//! arrived first. NaN scores rank below everything else.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::errors::{RankError, Result};
use crate::retrieval::similarity::{cosine, inverse_l2};
use crate::types::{FeatureSpace, FeatureVector, Metric};

/// Prefix that turns a category filter into "anything but this category"
pub const EXCLUDE_MARKER: char = '!';

// ============================================================================
// Heap
// ============================================================================

struct Scored<T> {
    score: f64,
    seq: u64,
    item: T,
}

impl<T> Ord for Scored<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier stream position wins ties
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Scored<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Scored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Scored<T> {}

/// The `k` highest-scoring items seen so far
pub struct TopK<T> {
    k: usize,
    seq: u64,
    heap: BinaryHeap<Reverse<Scored<T>>>,
}

impl<T> TopK<T> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seq: 0,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
        }
    }

    /// Offer an item; it is kept only if it beats the current worst
    pub fn push(&mut self, score: f64, item: T) {
        if self.k == 0 {
            return;
        }
        let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
        let candidate = Scored {
            score,
            seq: self.seq,
            item,
        };
        self.seq += 1;

        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
        } else if let Some(Reverse(worst)) = self.heap.peek() {
            if candidate > *worst {
                self.heap.pop();
                self.heap.push(Reverse(candidate));
            }
        }
    }

    /// Lowest score currently kept, once the heap is full
    pub fn threshold(&self) -> Option<f64> {
        if self.heap.len() < self.k {
            return None;
        }
        self.heap.peek().map(|Reverse(s)| s.score)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Kept items, best first
    pub fn into_sorted_vec(self) -> Vec<(f64, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(s)| (s.score, s.item))
            .collect()
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// How a record is scored against one topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// The component value itself
    Raw(FeatureSpace),
    /// `(observed - expected)^2 / expected`, expected being the background component
    Significance(FeatureSpace),
    /// `observed / expected`
    Mass(FeatureSpace),
    /// Topic weight times the background global rank
    ExpectedMass,
}

/// Scoring function for [`top_k`]
#[derive(Debug, Clone, PartialEq)]
pub enum Scorer {
    Topic {
        kind: ScoreKind,
        topic: usize,
    },
    Similarity {
        space: FeatureSpace,
        metric: Metric,
        reference: Vec<f64>,
    },
}

impl Scorer {
    pub fn topic(kind: ScoreKind, topic: usize) -> Self {
        Self::Topic { kind, topic }
    }

    pub fn similarity(space: FeatureSpace, metric: Metric, reference: Vec<f64>) -> Self {
        Self::Similarity {
            space,
            metric,
            reference,
        }
    }

    /// Score one record
    ///
    /// Significance and mass score 0.0 when the background component is not
    /// positive.
    pub fn score(&self, feature: &FeatureVector) -> Result<f64> {
        match self {
            Self::Topic { kind, topic } => score_topic(feature, *kind, *topic),
            Self::Similarity {
                space,
                metric,
                reference,
            } => {
                let vector = feature.space(*space);
                Ok(match metric {
                    Metric::Cosine => cosine(vector, reference),
                    Metric::L2 => inverse_l2(vector, reference),
                })
            }
        }
    }
}

fn component(values: &[f64], topic: usize) -> Result<f64> {
    values.get(topic).copied().ok_or(RankError::UnknownTopic {
        topic,
        num_topics: values.len(),
    })
}

fn background(values: &[f64]) -> Result<f64> {
    match values.last() {
        Some(&value) => Ok(value),
        None => Err(RankError::UnknownTopic {
            topic: 0,
            num_topics: 0,
        }),
    }
}

fn score_topic(feature: &FeatureVector, kind: ScoreKind, topic: usize) -> Result<f64> {
    match kind {
        ScoreKind::Raw(space) => component(feature.space(space), topic),
        ScoreKind::Significance(space) => {
            let values = feature.space(space);
            let observed = component(values, topic)?;
            let expected = background(values)?;
            if expected > 0.0 {
                Ok((observed - expected).powi(2) / expected)
            } else {
                Ok(0.0)
            }
        }
        ScoreKind::Mass(space) => {
            let values = feature.space(space);
            let observed = component(values, topic)?;
            let expected = background(values)?;
            if expected > 0.0 {
                Ok(observed / expected)
            } else {
                Ok(0.0)
            }
        }
        ScoreKind::ExpectedMass => {
            let weight = component(&feature.topics, topic)?;
            let rank = background(&feature.global_rank)?;
            Ok(weight * rank)
        }
    }
}

// ============================================================================
// Category filter
// ============================================================================

/// Restrict a query to one category, or to everything outside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    Include(String),
    Exclude(String),
}

impl CategoryFilter {
    /// `"person"` includes, `"!person"` excludes
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix(EXCLUDE_MARKER) {
            Some(rest) => Self::Exclude(rest.to_string()),
            None => Self::Include(value.to_string()),
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Self::Include(c) | Self::Exclude(c) => c,
        }
    }

    /// Records without a category pass an exclude filter and fail an
    /// include filter
    pub fn matches(&self, feature: &FeatureVector) -> bool {
        match self {
            Self::Include(c) => feature.has_category(c),
            Self::Exclude(c) => !feature.has_category(c),
        }
    }
}

// ============================================================================
// Query
// ============================================================================

/// A selected record and its score
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub feature: FeatureVector,
    pub score: f64,
}

/// The `k` best records of a stream, descending by score
///
/// Consumes the stream once. The first read or scoring error stops the
/// query.
pub fn top_k<I>(
    source: I,
    scorer: &Scorer,
    k: usize,
    filter: Option<&CategoryFilter>,
) -> Result<Vec<Hit>>
where
    I: IntoIterator<Item = Result<FeatureVector>>,
{
    if k == 0 {
        return Ok(Vec::new());
    }
    let mut best = TopK::new(k);

    let mut scanned = 0usize;
    for feature in source {
        let feature = feature?;
        scanned += 1;
        if filter.map_or(true, |f| f.matches(&feature)) {
            let score = scorer.score(&feature)?;
            best.push(score, feature);
        }
    }
    tracing::debug!(scanned, kept = best.len(), k, "top-k scan finished");

    Ok(best
        .into_sorted_vec()
        .into_iter()
        .map(|(score, feature)| Hit { feature, score })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feature(id: u64, category: Option<&str>, topics: Vec<f64>, global: Vec<f64>) -> FeatureVector {
        FeatureVector {
            id,
            title: format!("t{id}"),
            category: category.map(str::to_string),
            personalized_rank: vec![0.0; topics.len()],
            topics,
            global_rank: global,
        }
    }

    fn corpus() -> Vec<FeatureVector> {
        vec![
            feature(1, Some("person"), vec![0.1, 1.0], vec![0.30, 0.20]),
            feature(2, Some("place"), vec![0.7, 1.0], vec![0.10, 0.05]),
            feature(3, None, vec![0.5, 1.0], vec![0.40, 0.50]),
            feature(4, Some("person"), vec![0.9, 1.0], vec![0.20, 0.25]),
        ]
    }

    fn ids(hits: &[Hit]) -> Vec<u64> {
        hits.iter().map(|h| h.feature.id).collect()
    }

    fn stream(features: Vec<FeatureVector>) -> impl Iterator<Item = Result<FeatureVector>> {
        features.into_iter().map(Ok)
    }

    #[test]
    fn test_heap_keeps_best() {
        let mut top = TopK::new(2);
        for (score, item) in [(0.5, 'a'), (0.9, 'b'), (0.1, 'c'), (0.7, 'd')] {
            top.push(score, item);
        }
        assert_eq!(top.threshold(), Some(0.7));
        assert_eq!(top.into_sorted_vec(), vec![(0.9, 'b'), (0.7, 'd')]);
    }

    #[test]
    fn test_ties_keep_stream_order() {
        let mut top = TopK::new(2);
        for item in ['a', 'b', 'c'] {
            top.push(1.0, item);
        }
        assert_eq!(top.into_sorted_vec(), vec![(1.0, 'a'), (1.0, 'b')]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let mut top = TopK::new(3);
        top.push(f64::NAN, 'n');
        top.push(-5.0, 'a');
        top.push(2.0, 'b');
        let items: Vec<char> = top.into_sorted_vec().into_iter().map(|(_, c)| c).collect();
        assert_eq!(items, vec!['b', 'a', 'n']);
    }

    #[test]
    fn test_zero_k() {
        let mut top = TopK::new(0);
        top.push(1.0, ());
        assert!(top.is_empty());
        let hits = top_k(stream(corpus()), &Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 0), 0, None)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_raw_score() {
        let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::GlobalRank), 0);
        let hits = top_k(stream(corpus()), &scorer, 2, None).unwrap();
        assert_eq!(ids(&hits), vec![3, 1]);
        assert_eq!(hits[0].score, 0.40);
    }

    #[test]
    fn test_significance_and_mass() {
        let f = feature(9, None, vec![0.3, 1.0], vec![0.30, 0.10]);
        let sig = Scorer::topic(ScoreKind::Significance(FeatureSpace::GlobalRank), 0);
        let mass = Scorer::topic(ScoreKind::Mass(FeatureSpace::GlobalRank), 0);
        assert!((sig.score(&f).unwrap() - 0.4).abs() < 1e-12);
        assert!((mass.score(&f).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_background_scores_zero() {
        let f = feature(9, None, vec![0.3, 1.0], vec![0.30, 0.0]);
        let sig = Scorer::topic(ScoreKind::Significance(FeatureSpace::GlobalRank), 0);
        let mass = Scorer::topic(ScoreKind::Mass(FeatureSpace::GlobalRank), 0);
        assert_eq!(sig.score(&f).unwrap(), 0.0);
        assert_eq!(mass.score(&f).unwrap(), 0.0);
    }

    #[test]
    fn test_expected_mass() {
        let scorer = Scorer::topic(ScoreKind::ExpectedMass, 0);
        let hits = top_k(stream(corpus()), &scorer, 4, None).unwrap();
        // topics[0] * global_rank[background]
        assert_eq!(ids(&hits), vec![3, 4, 2, 1]);
        assert!((hits[0].score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_topic_is_error() {
        let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 7);
        assert!(matches!(
            top_k(stream(corpus()), &scorer, 2, None),
            Err(RankError::UnknownTopic { topic: 7, .. })
        ));
    }

    #[test]
    fn test_similarity_scorers() {
        let cos = Scorer::similarity(FeatureSpace::Topics, Metric::Cosine, vec![0.9, 1.0]);
        let hits = top_k(stream(corpus()), &cos, 1, None).unwrap();
        assert_eq!(ids(&hits), vec![4]);
        assert!((hits[0].score - 1.0).abs() < 1e-12);

        let l2 = Scorer::similarity(FeatureSpace::Topics, Metric::L2, vec![0.6, 1.0]);
        let mut nearest = ids(&top_k(stream(corpus()), &l2, 2, None).unwrap());
        nearest.sort();
        assert_eq!(nearest, vec![2, 3]);
    }

    #[test]
    fn test_category_filter_parse() {
        assert_eq!(CategoryFilter::parse("person"), CategoryFilter::Include("person".into()));
        assert_eq!(CategoryFilter::parse("!person"), CategoryFilter::Exclude("person".into()));
        assert_eq!(CategoryFilter::parse("!person").category(), "person");
    }

    #[test]
    fn test_include_filter() {
        let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 0);
        let filter = CategoryFilter::parse("person");
        let hits = top_k(stream(corpus()), &scorer, 10, Some(&filter)).unwrap();
        assert_eq!(ids(&hits), vec![4, 1]);
    }

    #[test]
    fn test_exclude_filter_keeps_uncategorized() {
        let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 0);
        let filter = CategoryFilter::parse("!person");
        let hits = top_k(stream(corpus()), &scorer, 10, Some(&filter)).unwrap();
        assert_eq!(ids(&hits), vec![2, 3]);
    }

    #[test]
    fn test_stream_error_stops_query() {
        let source = vec![
            Ok(corpus().remove(0)),
            Err(RankError::Store("cursor closed".into())),
        ];
        let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 0);
        assert!(matches!(top_k(source, &scorer, 3, None), Err(RankError::Store(_))));
    }

    proptest! {
        #[test]
        fn matches_full_sort(
            scores in proptest::collection::vec(0u8..20, 0..200),
            k in 0usize..50,
        ) {
            let mut top = TopK::new(k);
            for (i, &s) in scores.iter().enumerate() {
                top.push(s as f64, i);
            }
            let got: Vec<usize> = top.into_sorted_vec().into_iter().map(|(_, i)| i).collect();

            // Stable sort keeps stream order among equal scores
            let mut expected: Vec<usize> = (0..scores.len()).collect();
            expected.sort_by(|&a, &b| scores[b].cmp(&scores[a]));
            expected.truncate(k);

            prop_assert_eq!(got, expected);
        }

        #[test]
        fn filter_partitions_corpus(categories in proptest::collection::vec(0u8..3, 0..60)) {
            let names = ["person", "place", ""];
            let features: Vec<FeatureVector> = categories
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    let category = (c < 2).then(|| names[c as usize]);
                    feature(i as u64, category, vec![i as f64, 1.0], vec![0.0, 1.0])
                })
                .collect();
            let scorer = Scorer::topic(ScoreKind::Raw(FeatureSpace::Topics), 0);

            let include = CategoryFilter::parse("person");
            let exclude = CategoryFilter::parse("!person");
            let inc = top_k(stream(features.clone()), &scorer, 1000, Some(&include)).unwrap();
            let exc = top_k(stream(features.clone()), &scorer, 1000, Some(&exclude)).unwrap();

            prop_assert!(inc.iter().all(|h| h.feature.has_category("person")));
            prop_assert!(exc.iter().all(|h| !h.feature.has_category("person")));
            prop_assert_eq!(inc.len() + exc.len(), features.len());
        }
    }
}
