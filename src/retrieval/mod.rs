//! Retrieval over exported feature vectors
//!
//! - [`similarity`]: dot, norm, cosine and Euclidean distance
//! - [`topk`]: bounded top-k selection over a stream of feature vectors
//! - [`query`]: nearest neighbours, topic assignment and store-backed queries
//! - [`covariance`]: single-pass covariance of each feature space
//!
//! All selection is a single pass with a size-k heap, so a query over a
//! million-row scan holds only `k` records at a time.

pub mod covariance;
pub mod query;
pub mod similarity;
pub mod topk;
