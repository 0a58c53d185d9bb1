//! Vector similarity primitives
//!
//! Vectors of different lengths are compared over their common prefix.

use crate::errors::{RankError, Result};

/// Dot product
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm
pub fn norm(a: &[f64]) -> f64 {
    a.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity, failing on a zero-norm input
pub fn try_cosine(a: &[f64], b: &[f64]) -> Result<f64> {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(RankError::DegenerateVector);
    }
    Ok(dot(a, b) / (norm_a * norm_b))
}

/// Cosine similarity; a zero-norm input scores 0.0
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    try_cosine(a, b).unwrap_or(0.0)
}

/// Euclidean distance
pub fn l2(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// `1 / l2`, so that closer vectors score higher. Identical vectors score
/// positive infinity.
pub fn inverse_l2(a: &[f64], b: &[f64]) -> f64 {
    1.0 / l2(a, b)
}
