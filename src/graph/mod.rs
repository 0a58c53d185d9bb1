//! Graph construction and representation
//!
//! This module loads the article link graph and stores it for power
//! iteration: dense indices, CSR adjacency and column-major topic priors.

pub mod builder;
pub mod csr;
