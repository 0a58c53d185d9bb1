//! Interchange formats
//!
//! - [`records`]: length-prefixed binary streams of articles and feature vectors
//! - [`topics`]: the topic model's tab-separated document-topic output

pub mod records;
pub mod topics;
