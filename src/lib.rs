//! # wikirank
//!
//! Topic-sensitive PageRank over a directed graph of articles, and top-k /
//! similarity retrieval over the per-article feature vectors it produces.
//!
//! ## Flow
//!
//! 1. Read [`ArticleRecord`]s from a [`RecordReader`], attaching topic weights
//!    from [`read_topic_map`], into a [`GraphBuilder`] and build an
//!    [`ArticleGraph`] (dense indices, CSR adjacency, column-major priors).
//! 2. Plan one [`RankTask`] per (topic, variant) and hand them to a
//!    [`RankScheduler`], which runs every column on a rayon pool.
//! 3. Export [`FeatureVector`]s and persist them through a [`FeatureStore`].
//! 4. Query the store with [`top_k`], [`nearest_neighbors`] or a [`Retriever`].
//!
//! ```rust,ignore
//! use wikirank::{ArticleGraph, RankRun, RankSpec};
//!
//! let spec = RankSpec::from_json(r#"{ "v": 1, "rank": { "threshold": 1e-9 } }"#)?.validated()?;
//! let graph = ArticleGraph::load(records)?;
//! let run = RankRun::execute(&graph, &spec)?;
//! for feature in run.features() {
//!     // persist
//! }
//! ```

pub mod errors;
pub mod graph;
pub mod io;
pub mod pagerank;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod types;

pub use errors::{GraphError, RankError, Result};
pub use graph::builder::GraphBuilder;
pub use graph::csr::{ArticleGraph, RankMatrix, RankOutputs};
pub use io::records::{RecordReader, RecordWriter};
pub use io::topics::{read_topic_map, TopicMapReader};
pub use pagerank::personalized::AnchoredPageRank;
pub use pagerank::standard::TopicSensitivePageRank;
pub use pagerank::weighted::LinkWeightedPageRank;
pub use pagerank::{ColumnOutcome, ColumnRanker, Convergence};
pub use pipeline::runner::{OutputSlot, RankRun, RankScheduler, RankTask, RunReport};
pub use pipeline::spec::RankSpec;
pub use retrieval::covariance::{CovarianceMatrix, FeatureCovariances, StreamingCovariance};
pub use retrieval::query::{assign_topic, nearest_neighbors, Retriever};
pub use retrieval::similarity::{cosine, dot, l2, norm, try_cosine};
pub use retrieval::topk::{top_k, CategoryFilter, Hit, ScoreKind, Scorer, TopK};
pub use store::{insert_all, FeatureStore, MemoryStore};
pub use types::{
    ArticleRecord, FeatureSpace, FeatureVector, Metric, RankConfig, RankVariant, VariantKind,
};
