//! Feature vector persistence
//!
//! [`FeatureStore`] is the seam to whatever database holds exported
//! [`FeatureVector`]s. The crate ships [`MemoryStore`], an in-process
//! implementation used by tests and small corpora.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::errors::{RankError, Result};
use crate::pipeline::spec::DEFAULT_FETCH_BATCH_SIZE;
use crate::retrieval::topk::{top_k, CategoryFilter, Hit, ScoreKind, Scorer};
use crate::types::FeatureVector;

/// A single-pass stream of stored records
pub type FeatureStream<'a> = Box<dyn Iterator<Item = Result<FeatureVector>> + 'a>;

/// Storage for exported feature vectors, keyed by article id
pub trait FeatureStore {
    fn find_by_title(&self, title: &str) -> Result<Option<FeatureVector>>;

    fn category_exists(&self, category: &str) -> Result<bool>;

    /// Stream every record, fetching `fetch_batch_size` at a time
    fn scan_all(&self, fetch_batch_size: usize) -> Result<FeatureStream<'_>>;

    /// Insert or replace records by id
    fn insert_batch(&mut self, records: Vec<FeatureVector>) -> Result<()>;

    /// The `limit` best records for one topic
    ///
    /// The default scans the whole store through [`top_k`]. Stores that can
    /// sort server-side should override it.
    fn top_by_score(
        &self,
        topic: usize,
        kind: ScoreKind,
        filter: Option<&CategoryFilter>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        top_k(
            self.scan_all(DEFAULT_FETCH_BATCH_SIZE)?,
            &Scorer::topic(kind, topic),
            limit,
            filter,
        )
    }
}

/// Write every record in batches of `batch_size`, returning the count written
pub fn insert_all<S, I>(store: &mut S, records: I, batch_size: usize) -> Result<usize>
where
    S: FeatureStore + ?Sized,
    I: IntoIterator<Item = FeatureVector>,
{
    if batch_size == 0 {
        return Err(RankError::Store("insert batch size must be positive".into()));
    }

    let mut written = 0;
    let mut batch = Vec::with_capacity(batch_size);
    for record in records {
        batch.push(record);
        if batch.len() == batch_size {
            written += batch.len();
            store.insert_batch(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            tracing::debug!(written, "inserted feature batch");
        }
    }
    if !batch.is_empty() {
        written += batch.len();
        store.insert_batch(batch)?;
    }
    tracing::info!(written, "feature export complete");
    Ok(written)
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory [`FeatureStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<FeatureVector>,
    by_id: FxHashMap<u64, usize>,
    /// Records per title, most recently written last
    by_title: FxHashMap<String, Vec<usize>>,
    /// Number of records carrying each category
    categories: FxHashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&FeatureVector> {
        self.by_id.get(&id).map(|&i| &self.records[i])
    }

    fn upsert(&mut self, record: FeatureVector) {
        match self.by_id.get(&record.id).copied() {
            Some(i) => {
                let old = std::mem::replace(&mut self.records[i], record);
                self.unindex(&old, i);
                self.index(i);
            }
            None => {
                let i = self.records.len();
                self.by_id.insert(record.id, i);
                self.records.push(record);
                self.index(i);
            }
        }
    }

    fn index(&mut self, i: usize) {
        let record = &self.records[i];
        self.by_title.entry(record.title.clone()).or_default().push(i);
        if let Some(category) = &record.category {
            *self.categories.entry(category.clone()).or_insert(0) += 1;
        }
    }

    fn unindex(&mut self, old: &FeatureVector, i: usize) {
        if let Some(holders) = self.by_title.get_mut(&old.title) {
            holders.retain(|&h| h != i);
            if holders.is_empty() {
                self.by_title.remove(&old.title);
            }
        }
        if let Some(category) = &old.category {
            if let Some(count) = self.categories.get_mut(category) {
                *count -= 1;
                if *count == 0 {
                    self.categories.remove(category);
                }
            }
        }
    }
}

impl FeatureStore for MemoryStore {
    fn find_by_title(&self, title: &str) -> Result<Option<FeatureVector>> {
        Ok(self
            .by_title
            .get(title)
            .and_then(|holders| holders.last())
            .map(|&i| self.records[i].clone()))
    }

    fn category_exists(&self, category: &str) -> Result<bool> {
        Ok(self.categories.contains_key(category))
    }

    fn scan_all(&self, fetch_batch_size: usize) -> Result<FeatureStream<'_>> {
        if fetch_batch_size == 0 {
            return Err(RankError::Store("fetch batch size must be positive".into()));
        }
        Ok(Box::new(MemoryCursor {
            records: &self.records,
            next: 0,
            batch_size: fetch_batch_size,
            buffer: VecDeque::with_capacity(fetch_batch_size.min(self.records.len())),
        }))
    }

    fn insert_batch(&mut self, records: Vec<FeatureVector>) -> Result<()> {
        for record in records {
            self.upsert(record);
        }
        Ok(())
    }
}

/// Fetches records a batch at a time, like a database cursor
struct MemoryCursor<'a> {
    records: &'a [FeatureVector],
    next: usize,
    batch_size: usize,
    buffer: VecDeque<FeatureVector>,
}

impl Iterator for MemoryCursor<'_> {
    type Item = Result<FeatureVector>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && self.next < self.records.len() {
            let end = (self.next + self.batch_size).min(self.records.len());
            self.buffer.extend(self.records[self.next..end].iter().cloned());
            tracing::trace!(from = self.next, to = end, "fetched feature batch");
            self.next = end;
        }
        self.buffer.pop_front().map(Ok)
    }
}
