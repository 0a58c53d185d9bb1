//! Single-pass graph loader
//!
//! Assigns each article a dense index in arrival order and keeps its
//! outgoing edges as external ids until [`GraphBuilder::build`], when every
//! target is resolved through the id map. The id map uses FxHashMap for
//! O(1) lookups during construction.

use rustc_hash::FxHashMap;

use super::csr::ArticleGraph;
use crate::errors::GraphError;
use crate::types::ArticleRecord;

/// An article waiting for its edges to be resolved
#[derive(Debug, Clone)]
pub(crate) struct PendingNode {
    pub(crate) id: u64,
    pub(crate) title: String,
    pub(crate) category: Option<String>,
    pub(crate) edges: Vec<u64>,
}

/// A mutable graph builder fed by a forward-only record stream
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Maps external id -> dense index
    pub(crate) id_to_index: FxHashMap<u64, u32>,
    /// Node storage, indexed by dense index
    pub(crate) nodes: Vec<PendingNode>,
    /// Topic priors, row-major (node-by-node) while loading
    pub(crate) priors: Vec<f64>,
    /// Topic count, fixed by the first record
    pub(crate) num_topics: Option<usize>,
}

impl GraphBuilder {
    /// Create a new empty graph builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph builder with pre-allocated capacity
    pub fn with_capacity(node_capacity: usize) -> Self {
        Self {
            id_to_index: FxHashMap::with_capacity_and_hasher(node_capacity, Default::default()),
            nodes: Vec::with_capacity(node_capacity),
            priors: Vec::new(),
            num_topics: None,
        }
    }

    /// Add one article, returning its dense index
    ///
    /// Rejects duplicate ids, topic vectors whose length differs from the
    /// first record's, and negative or non-finite weights.
    pub fn push(&mut self, record: ArticleRecord) -> Result<u32, GraphError> {
        if self.id_to_index.contains_key(&record.id) {
            return Err(GraphError::DuplicateId(record.id));
        }

        let expected = self.num_topics.unwrap_or(record.topics.len());
        if record.topics.len() != expected {
            return Err(GraphError::TopicLengthMismatch {
                id: record.id,
                expected,
                actual: record.topics.len(),
            });
        }

        if let Some((topic, &value)) = record
            .topics
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(GraphError::InvalidPrior {
                id: record.id,
                topic,
                value,
            });
        }

        let index = u32::try_from(self.nodes.len())
            .map_err(|_| GraphError::TooManyNodes(self.nodes.len() + 1))?;

        self.num_topics = Some(expected);
        self.id_to_index.insert(record.id, index);
        self.priors.extend_from_slice(&record.topics);
        self.nodes.push(PendingNode {
            id: record.id,
            title: record.title,
            category: record.category,
            edges: record.edges,
        });
        Ok(index)
    }

    /// Consume a whole record stream
    pub fn extend<I>(&mut self, records: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = ArticleRecord>,
    {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Resolve every edge and freeze the graph
    pub fn build(self) -> Result<ArticleGraph, GraphError> {
        ArticleGraph::from_builder(self)
    }

    /// Get the number of nodes loaded so far
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the topic count, once the first record has fixed it
    pub fn num_topics(&self) -> Option<usize> {
        self.num_topics
    }

    /// Get a dense index by external id
    pub fn get_index(&self, id: u64) -> Option<u32> {
        self.id_to_index.get(&id).copied()
    }

    /// Check if the builder is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, edges: Vec<u64>, topics: Vec<f64>) -> ArticleRecord {
        ArticleRecord::new(id, format!("article-{id}"), edges, topics)
    }

    #[test]
    fn test_dense_indices_follow_arrival_order() {
        let mut builder = GraphBuilder::new();

        assert_eq!(builder.push(record(900, vec![], vec![0.5, 1.0])).unwrap(), 0);
        assert_eq!(builder.push(record(17, vec![], vec![0.5, 1.0])).unwrap(), 1);
        assert_eq!(builder.push(record(3, vec![], vec![0.5, 1.0])).unwrap(), 2);

        assert_eq!(builder.get_index(17), Some(1));
        assert_eq!(builder.get_index(4), None);
        assert_eq!(builder.node_count(), 3);
        assert_eq!(builder.num_topics(), Some(2));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut builder = GraphBuilder::new();
        builder.push(record(1, vec![], vec![1.0])).unwrap();

        let err = builder.push(record(1, vec![], vec![1.0])).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId(1));
    }

    #[test]
    fn test_topic_length_mismatch_rejected() {
        let mut builder = GraphBuilder::new();
        builder.push(record(1, vec![], vec![0.2, 0.8, 1.0])).unwrap();

        let err = builder.push(record(2, vec![], vec![0.2, 1.0])).unwrap_err();
        assert_eq!(
            err,
            GraphError::TopicLengthMismatch {
                id: 2,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_negative_prior_rejected() {
        let mut builder = GraphBuilder::new();
        let err = builder.push(record(5, vec![], vec![0.2, -0.1])).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPrior { id: 5, topic: 1, .. }));
    }

    #[test]
    fn test_nan_prior_rejected() {
        let mut builder = GraphBuilder::new();
        let err = builder.push(record(5, vec![], vec![f64::NAN])).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPrior { id: 5, topic: 0, .. }));
    }

    #[test]
    fn test_rejected_record_leaves_builder_unchanged() {
        let mut builder = GraphBuilder::new();
        builder.push(record(1, vec![], vec![0.5, 1.0])).unwrap();
        let _ = builder.push(record(2, vec![], vec![0.5]));

        assert_eq!(builder.node_count(), 1);
        assert_eq!(builder.get_index(2), None);
        assert_eq!(builder.priors.len(), 2);
    }
}
