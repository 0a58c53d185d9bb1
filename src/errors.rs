//! Error types for graph loading, ranking and retrieval.

use thiserror::Error;

use crate::pipeline::errors::RankSpecError;
use crate::types::VariantKind;

/// Reasons a graph load is rejected. Fatal: no rank computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// An edge points at an id that was never loaded
    #[error("article {source_id} links to unknown article {target_id}")]
    MissingTarget { source_id: u64, target_id: u64 },

    /// Topic vectors must all have the same length within one run
    #[error("article {id} has {actual} topic weights, expected {expected}")]
    TopicLengthMismatch {
        id: u64,
        expected: usize,
        actual: usize,
    },

    #[error("article {0} appears more than once")]
    DuplicateId(u64),

    /// Topic weights must be finite and non-negative
    #[error("article {id} has invalid weight {value} for topic {topic}")]
    InvalidPrior { id: u64, topic: usize, value: f64 },

    /// Dense indices are `u32`
    #[error("graph has {0} articles, more than a dense index can address")]
    TooManyNodes(usize),
}

/// Errors raised by the rank engine, the scheduler and the query layer.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RankError {
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] GraphError),

    /// Zero-norm vector in a similarity computation
    #[error("degenerate vector: zero norm")]
    DegenerateVector,

    /// Iteration cap reached before the threshold was met. The column still
    /// holds the last computed values.
    #[error(
        "{variant} rank for topic {topic} did not converge after {iterations} iterations (delta {delta:e})"
    )]
    ConvergenceNotReached {
        variant: VariantKind,
        topic: usize,
        iterations: usize,
        delta: f64,
    },

    /// A per-column task failed. `succeeded` lists the tasks whose columns are
    /// complete.
    #[error("{variant} rank task for topic {topic} failed: {source}")]
    TaskFailed {
        variant: VariantKind,
        topic: usize,
        source: Box<RankError>,
        succeeded: Vec<(VariantKind, usize)>,
    },

    #[error("unsupported {argument}: {value:?}")]
    UnsupportedQuery { argument: String, value: String },

    #[error("unknown article {0}")]
    UnknownNode(u64),

    #[error("topic {topic} out of range for {num_topics} topics")]
    UnknownTopic { topic: usize, num_topics: usize },

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("invalid rank spec: {0}")]
    InvalidSpec(RankSpecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input data (record framing, topic-model text output)
    #[error("format error: {0}")]
    Format(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(String),
}

impl RankError {
    /// Build an [`RankError::UnsupportedQuery`] naming the rejected argument.
    pub fn unsupported(argument: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedQuery {
            argument: argument.into(),
            value: value.into(),
        }
    }
}

impl From<postcard::Error> for RankError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(format!("postcard error: {}", e))
    }
}

impl From<serde_json::Error> for RankError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("json error: {}", e))
    }
}

/// Result type for wikirank operations.
pub type Result<T> = std::result::Result<T, RankError>;
