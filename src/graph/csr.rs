//! Compressed Sparse Row (CSR) article graph and rank output matrices
//!
//! CSR stores edges contiguously, which is what power iteration wants: every
//! iteration walks every edge once. Topic priors and rank outputs are stored
//! column-major, so one topic's column is a single contiguous slice. That is
//! what lets the scheduler hand each task an exclusive `&mut [f64]`.

use rustc_hash::FxHashMap;

use super::builder::GraphBuilder;
use crate::errors::GraphError;
use crate::types::{background_index, ArticleRecord};

/// An immutable article graph in CSR format
///
/// Built once, single-threaded, and shared read-only by every rank task.
#[derive(Debug, Clone)]
pub struct ArticleGraph {
    num_nodes: usize,
    num_topics: usize,
    /// Row pointers: node i's edges are at indices row_ptr[i]..row_ptr[i+1]
    row_ptr: Vec<usize>,
    /// Dense index of each edge target
    col_idx: Vec<u32>,
    /// Topic priors, column-major: topic t is priors[t*n..(t+1)*n]
    priors: Vec<f64>,
    /// Column sums of the priors
    prior_sums: Vec<f64>,
    ids: Vec<u64>,
    titles: Vec<String>,
    categories: Vec<Option<String>>,
    index_of: FxHashMap<u64, u32>,
}

impl ArticleGraph {
    /// Load a graph from a single forward pass over ingestion records
    pub fn load<I>(records: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = ArticleRecord>,
    {
        let records = records.into_iter();
        let mut builder = GraphBuilder::with_capacity(records.size_hint().0);
        builder.extend(records)?;
        builder.build()
    }

    /// Resolve a builder's edges into CSR format
    pub fn from_builder(builder: GraphBuilder) -> Result<Self, GraphError> {
        let GraphBuilder {
            id_to_index,
            nodes,
            priors: row_priors,
            num_topics,
        } = builder;

        let num_nodes = nodes.len();
        let num_topics = num_topics.unwrap_or(0);

        let mut row_ptr = Vec::with_capacity(num_nodes + 1);
        let mut col_idx = Vec::new();
        let mut ids = Vec::with_capacity(num_nodes);
        let mut titles = Vec::with_capacity(num_nodes);
        let mut categories = Vec::with_capacity(num_nodes);

        row_ptr.push(0);

        for node in nodes {
            for &target in &node.edges {
                let index = id_to_index
                    .get(&target)
                    .copied()
                    .ok_or(GraphError::MissingTarget {
                        source_id: node.id,
                        target_id: target,
                    })?;
                col_idx.push(index);
            }
            row_ptr.push(col_idx.len());

            ids.push(node.id);
            titles.push(node.title);
            categories.push(node.category);
        }

        // Transpose row-major priors into contiguous topic columns
        let mut priors = vec![0.0; num_nodes * num_topics];
        let mut prior_sums = vec![0.0; num_topics];
        for node in 0..num_nodes {
            for topic in 0..num_topics {
                let value = row_priors[node * num_topics + topic];
                priors[topic * num_nodes + node] = value;
                prior_sums[topic] += value;
            }
        }

        Ok(Self {
            num_nodes,
            num_topics,
            row_ptr,
            col_idx,
            priors,
            prior_sums,
            ids,
            titles,
            categories,
            index_of: id_to_index,
        })
    }

    /// Get the number of articles
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get the number of topic columns (T)
    pub fn num_topics(&self) -> usize {
        self.num_topics
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.num_nodes == 0
    }

    /// Get the total number of edges
    pub fn num_edges(&self) -> usize {
        self.col_idx.len()
    }

    /// Dense indices of a node's link targets
    pub fn neighbors(&self, node: u32) -> &[u32] {
        let start = self.row_ptr[node as usize];
        let end = self.row_ptr[node as usize + 1];
        &self.col_idx[start..end]
    }

    /// Get the out-degree of a node
    pub fn degree(&self, node: u32) -> usize {
        self.row_ptr[node as usize + 1] - self.row_ptr[node as usize]
    }

    /// A node with no outgoing edges
    pub fn is_dangling(&self, node: u32) -> bool {
        self.row_ptr[node as usize + 1] == self.row_ptr[node as usize]
    }

    /// Find dangling nodes (nodes with no outgoing edges)
    pub fn dangling_nodes(&self) -> Vec<u32> {
        (0..self.num_nodes as u32)
            .filter(|&n| self.is_dangling(n))
            .collect()
    }

    /// Prior weights of every node for one topic
    pub fn prior_column(&self, topic: usize) -> &[f64] {
        &self.priors[topic * self.num_nodes..(topic + 1) * self.num_nodes]
    }

    /// Prior weight of one node for one topic
    pub fn prior(&self, node: u32, topic: usize) -> f64 {
        self.priors[topic * self.num_nodes + node as usize]
    }

    /// Sum of one topic's prior column
    pub fn prior_sum(&self, topic: usize) -> f64 {
        self.prior_sums[topic]
    }

    /// Topic vector of one node, gathered across columns
    pub fn prior_row(&self, node: u32) -> Vec<f64> {
        (0..self.num_topics)
            .map(|topic| self.prior(node, topic))
            .collect()
    }

    /// Index of the reserved background topic
    pub fn background_topic(&self) -> Option<usize> {
        background_index(self.num_topics)
    }

    /// External id of a node
    pub fn id(&self, node: u32) -> u64 {
        self.ids[node as usize]
    }

    pub fn title(&self, node: u32) -> &str {
        &self.titles[node as usize]
    }

    pub fn category(&self, node: u32) -> Option<&str> {
        self.categories[node as usize].as_deref()
    }

    /// Get a dense index by external id
    pub fn index_of(&self, id: u64) -> Option<u32> {
        self.index_of.get(&id).copied()
    }

    /// Get a dense index by title (linear search - use sparingly)
    pub fn index_of_title(&self, title: &str) -> Option<u32> {
        self.titles.iter().position(|t| t == title).map(|i| i as u32)
    }
}

impl Default for ArticleGraph {
    fn default() -> Self {
        Self {
            num_nodes: 0,
            num_topics: 0,
            row_ptr: vec![0],
            col_idx: Vec::new(),
            priors: Vec::new(),
            prior_sums: Vec::new(),
            ids: Vec::new(),
            titles: Vec::new(),
            categories: Vec::new(),
            index_of: FxHashMap::default(),
        }
    }
}

// ============================================================================
// Rank outputs
// ============================================================================

/// A node-by-topic matrix of rank scores, stored column-major
#[derive(Debug, Clone, PartialEq)]
pub struct RankMatrix {
    num_nodes: usize,
    num_topics: usize,
    data: Vec<f64>,
}

impl RankMatrix {
    /// Create a zero-filled matrix
    pub fn zeros(num_nodes: usize, num_topics: usize) -> Self {
        Self {
            num_nodes,
            num_topics,
            data: vec![0.0; num_nodes * num_topics],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_topics(&self) -> usize {
        self.num_topics
    }

    /// Scores of every node for one topic
    pub fn column(&self, topic: usize) -> &[f64] {
        &self.data[topic * self.num_nodes..(topic + 1) * self.num_nodes]
    }

    /// Exclusive handle to one topic column
    pub fn column_mut(&mut self, topic: usize) -> &mut [f64] {
        &mut self.data[topic * self.num_nodes..(topic + 1) * self.num_nodes]
    }

    /// Split the matrix into disjoint, exclusively borrowed topic columns
    pub fn columns_mut(&mut self) -> Vec<&mut [f64]> {
        if self.num_nodes == 0 {
            return (0..self.num_topics).map(|_| <&mut [f64]>::default()).collect();
        }
        self.data.chunks_mut(self.num_nodes).collect()
    }

    /// Score of one node for one topic
    pub fn get(&self, node: u32, topic: usize) -> f64 {
        self.data[topic * self.num_nodes + node as usize]
    }

    /// Scores of one node across all topics
    pub fn row(&self, node: u32) -> Vec<f64> {
        (0..self.num_topics).map(|t| self.get(node, t)).collect()
    }
}

/// The two rank matrices produced by a run
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutputs {
    pub global: RankMatrix,
    pub personalized: RankMatrix,
}

impl RankOutputs {
    /// Zero-filled outputs shaped for a graph
    pub fn for_graph(graph: &ArticleGraph) -> Self {
        Self {
            global: RankMatrix::zeros(graph.num_nodes(), graph.num_topics()),
            personalized: RankMatrix::zeros(graph.num_nodes(), graph.num_topics()),
        }
    }
}
