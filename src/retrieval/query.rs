//! Query helpers over feature vectors and stores

use crate::errors::{RankError, Result};
use crate::pipeline::spec::DEFAULT_FETCH_BATCH_SIZE;
use crate::retrieval::covariance::FeatureCovariances;
use crate::retrieval::topk::{top_k, CategoryFilter, Hit, ScoreKind, Scorer};
use crate::store::FeatureStore;
use crate::types::{background_index, FeatureSpace, FeatureVector, Metric};

/// The `k` records of `corpus` most similar to `source` in one feature space
///
/// `source` itself is returned too if the corpus contains it.
pub fn nearest_neighbors<I>(
    source: &FeatureVector,
    corpus: I,
    space: FeatureSpace,
    metric: Metric,
    k: usize,
    filter: Option<&CategoryFilter>,
) -> Result<Vec<Hit>>
where
    I: IntoIterator<Item = Result<FeatureVector>>,
{
    let scorer = Scorer::similarity(space, metric, source.space(space).to_vec());
    top_k(corpus, &scorer, k, filter)
}

/// Dominant topic of a set of seed titles
///
/// Resolves each seed with `lookup`, sums the topic distributions and
/// returns the largest component outside the background index. Falls back
/// to the background index when no seed resolves or no topic sum is positive.
pub fn assign_topic<F, S>(mut lookup: F, seeds: &[S], num_topics: usize) -> Result<usize>
where
    F: FnMut(&str) -> Result<Option<FeatureVector>>,
    S: AsRef<str>,
{
    let background = background_index(num_topics).ok_or(RankError::UnknownTopic {
        topic: 0,
        num_topics,
    })?;

    let mut sums = vec![0.0; num_topics];
    let mut resolved = 0usize;
    for seed in seeds {
        if let Some(feature) = lookup(seed.as_ref())? {
            for (sum, weight) in sums.iter_mut().zip(&feature.topics) {
                *sum += weight;
            }
            resolved += 1;
        }
    }
    if resolved == 0 {
        tracing::debug!(seeds = seeds.len(), "no seed resolved, using background topic");
        return Ok(background);
    }

    // A topic must beat zero to displace the background; first maximum wins
    let (best, _) = sums[..background]
        .iter()
        .enumerate()
        .fold((background, 0.0), |(best, best_sum), (i, &v)| {
            if v > best_sum {
                (i, v)
            } else {
                (best, best_sum)
            }
        });
    Ok(best)
}

/// Store-backed queries with argument checking
pub struct Retriever<S> {
    store: S,
    fetch_batch_size: usize,
}

impl<S: FeatureStore> Retriever<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
        }
    }

    pub fn with_fetch_batch_size(mut self, fetch_batch_size: usize) -> Self {
        self.fetch_batch_size = fetch_batch_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Parse a category argument and check the store knows it
    fn category_filter(&self, category: Option<&str>) -> Result<Option<CategoryFilter>> {
        let Some(value) = category else {
            return Ok(None);
        };
        let filter = CategoryFilter::parse(value);
        if !self.store.category_exists(filter.category())? {
            return Err(RankError::unsupported("category", value));
        }
        Ok(Some(filter))
    }

    /// Best records for one topic
    pub fn top_by_score(
        &self,
        topic: usize,
        kind: ScoreKind,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let filter = self.category_filter(category)?;
        self.store.top_by_score(topic, kind, filter.as_ref(), limit)
    }

    /// Nearest neighbours of the article with `title`
    ///
    /// `features` and `metric` are names as accepted by [`FeatureSpace`] and
    /// [`Metric`]; anything else is [`RankError::UnsupportedQuery`].
    pub fn nearest_to_title(
        &self,
        title: &str,
        features: &str,
        metric: &str,
        category: Option<&str>,
        k: usize,
    ) -> Result<Vec<Hit>> {
        let space: FeatureSpace = features.parse()?;
        let metric: Metric = metric.parse()?;
        let filter = self.category_filter(category)?;
        let source = self
            .store
            .find_by_title(title)?
            .ok_or_else(|| RankError::unsupported("title", title))?;

        nearest_neighbors(
            &source,
            self.store.scan_all(self.fetch_batch_size)?,
            space,
            metric,
            k,
            filter.as_ref(),
        )
    }

    /// Covariance of every feature space over the whole store, in one scan
    pub fn covariances(&self) -> Result<FeatureCovariances> {
        FeatureCovariances::from_features(self.store.scan_all(self.fetch_batch_size)?)
    }

    /// Dominant topic of the seed titles found in the store
    pub fn assign_topic<T: AsRef<str>>(&self, seeds: &[T], num_topics: usize) -> Result<usize> {
        assign_topic(|title| self.store.find_by_title(title), seeds, num_topics)
    }
}
