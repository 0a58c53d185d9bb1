//! Single-pass covariance of feature vectors
//!
//! [`StreamingCovariance`] keeps a running mean and co-moment matrix
//! (Welford's update), so a whole corpus can be summarized while it streams
//! out of a store. [`FeatureCovariances`] holds one accumulator per
//! [`FeatureSpace`].

use crate::errors::{RankError, Result};
use crate::types::{FeatureSpace, FeatureVector};

/// Running covariance of fixed-dimension vectors
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingCovariance {
    dim: usize,
    count: u64,
    mean: Vec<f64>,
    /// Row-major `dim × dim` sum of co-deviations
    comoment: Vec<f64>,
}

impl StreamingCovariance {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            count: 0,
            mean: vec![0.0; dim],
            comoment: vec![0.0; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of vectors seen
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Fold one vector into the running statistics
    pub fn increment(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.dim {
            return Err(RankError::Numerical(format!(
                "covariance expects {} components, got {}",
                self.dim,
                x.len()
            )));
        }
        self.count += 1;
        let n = self.count as f64;

        let delta: Vec<f64> = x.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        for (m, d) in self.mean.iter_mut().zip(&delta) {
            *m += d / n;
        }
        for i in 0..self.dim {
            let row = &mut self.comoment[i * self.dim..(i + 1) * self.dim];
            for (j, c) in row.iter_mut().enumerate() {
                *c += delta[i] * (x[j] - self.mean[j]);
            }
        }
        Ok(())
    }

    /// Covariance matrix, sample (`n − 1`) or population (`n`) normalized
    ///
    /// A sample covariance needs at least two vectors, a population
    /// covariance at least one.
    pub fn covariance(&self, bias_corrected: bool) -> Result<CovarianceMatrix> {
        let min = if bias_corrected { 2 } else { 1 };
        if self.count < min {
            return Err(RankError::Numerical(format!(
                "covariance needs at least {min} vectors, got {}",
                self.count
            )));
        }
        let denom = if bias_corrected {
            (self.count - 1) as f64
        } else {
            self.count as f64
        };
        Ok(CovarianceMatrix {
            dim: self.dim,
            data: self.comoment.iter().map(|c| c / denom).collect(),
        })
    }
}

/// Dense symmetric covariance matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl CovarianceMatrix {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Per-component variances
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.dim).map(|i| self.get(i, i)).collect()
    }
}

/// One running covariance per feature space
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCovariances {
    pub topics: StreamingCovariance,
    pub global_rank: StreamingCovariance,
    pub personalized_rank: StreamingCovariance,
}

impl FeatureCovariances {
    /// Accumulators sized for vectors of `num_topics` components
    pub fn new(num_topics: usize) -> Self {
        Self {
            topics: StreamingCovariance::new(num_topics),
            global_rank: StreamingCovariance::new(num_topics),
            personalized_rank: StreamingCovariance::new(num_topics),
        }
    }

    /// Summarize a stream of feature vectors in one pass
    ///
    /// Dimensions are taken from the first record. An empty stream gives
    /// zero-dimension accumulators with a count of zero.
    pub fn from_features<I>(source: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<FeatureVector>>,
    {
        let mut acc: Option<Self> = None;
        for feature in source {
            let feature = feature?;
            let covs = acc.get_or_insert_with(|| Self {
                topics: StreamingCovariance::new(feature.topics.len()),
                global_rank: StreamingCovariance::new(feature.global_rank.len()),
                personalized_rank: StreamingCovariance::new(feature.personalized_rank.len()),
            });
            covs.increment(&feature)?;
        }
        let covs = acc.unwrap_or_else(|| Self::new(0));
        tracing::debug!(
            records = covs.count(),
            dim = covs.topics.dim(),
            "computed feature covariances"
        );
        Ok(covs)
    }

    pub fn increment(&mut self, feature: &FeatureVector) -> Result<()> {
        self.topics.increment(&feature.topics)?;
        self.global_rank.increment(&feature.global_rank)?;
        self.personalized_rank.increment(&feature.personalized_rank)
    }

    pub fn count(&self) -> u64 {
        self.topics.count()
    }

    pub fn space(&self, space: FeatureSpace) -> &StreamingCovariance {
        match space {
            FeatureSpace::Topics => &self.topics,
            FeatureSpace::GlobalRank => &self.global_rank,
            FeatureSpace::PersonalizedRank => &self.personalized_rank,
        }
    }
}
