//! # In-Memory Stores
//!
//! Process-local implementations of the store traits. The job store guards
//! each key with its own async mutex, which plays the role of the row lock.
//! A key's mutex is dropped from the map once its last guard is released.
//! Every persisted job snapshot is also appended to a write log so tests can
//! observe intermediate states.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    CachedMatch, JobRecordStore, LockedJob, MatchCacheStore, MatchIndexStore, StoredSummary,
    Stores, SummaryStore,
};
use crate::error::RepositoryError;
use crate::models::{JobKey, JobRecord};

#[derive(Default)]
struct JobTable {
    records: Mutex<HashMap<JobKey, JobRecord>>,
    key_locks: SyncMutex<HashMap<JobKey, Arc<Mutex<()>>>>,
    writes: Mutex<Vec<JobRecord>>,
}

impl JobTable {
    async fn write(&self, record: JobRecord) {
        self.records
            .lock()
            .await
            .insert(record.key.clone(), record.clone());
        self.writes.lock().await.push(record);
    }

    fn key_lock(&self, key: &JobKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Forget `key`'s mutex unless another caller holds or awaits it.
    fn release(&self, key: &JobKey) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // the map and the departing guard
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(key);
        }
    }
}

/// Job records held in a map, locked per key.
#[derive(Default)]
pub struct InMemoryJobStore {
    table: Arc<JobTable>,
}

impl InMemoryJobStore {
    /// Every snapshot persisted so far, oldest first.
    pub async fn writes(&self) -> Vec<JobRecord> {
        self.table.writes.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.table.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobRecordStore for InMemoryJobStore {
    async fn find(&self, key: &JobKey) -> Result<Option<JobRecord>, RepositoryError> {
        Ok(self.table.records.lock().await.get(key).cloned())
    }

    async fn find_by_riot_id(
        &self,
        riot_id: &str,
        year: i32,
    ) -> Result<Option<JobRecord>, RepositoryError> {
        Ok(self
            .table
            .records
            .lock()
            .await
            .values()
            .filter(|record| record.riot_id == riot_id && record.key.year == year)
            .max_by_key(|record| record.updated_at)
            .cloned())
    }

    async fn save(&self, record: &JobRecord) -> Result<(), RepositoryError> {
        if !self.table.records.lock().await.contains_key(&record.key) {
            return Err(RepositoryError::NotFound {
                entity: "job record",
                key: record.key.to_string(),
            });
        }
        self.table.write(record.clone()).await;
        Ok(())
    }

    async fn lock_or_create(&self, seed: JobRecord) -> Result<Box<dyn LockedJob>, RepositoryError> {
        let guard = self.table.key_lock(&seed.key).lock_owned().await;

        let existing = self.table.records.lock().await.get(&seed.key).cloned();
        let record = match existing {
            Some(record) => record,
            None => {
                self.table.write(seed.clone()).await;
                seed
            }
        };

        Ok(Box::new(MemoryLockedJob {
            _guard: guard,
            table: Arc::clone(&self.table),
            record,
        }))
    }
}

struct MemoryLockedJob {
    _guard: OwnedMutexGuard<()>,
    table: Arc<JobTable>,
    record: JobRecord,
}

#[async_trait]
impl LockedJob for MemoryLockedJob {
    fn record(&self) -> &JobRecord {
        &self.record
    }

    async fn commit(self: Box<Self>, next: Option<JobRecord>) -> Result<(), RepositoryError> {
        if let Some(next) = next {
            self.table.write(next).await;
        }
        Ok(())
    }
}

impl Drop for MemoryLockedJob {
    fn drop(&mut self) {
        self.table.release(&self.record.key);
    }
}

#[derive(Default)]
struct IndexTable {
    seen: HashSet<(JobKey, String)>,
    ordered: Vec<(JobKey, String)>,
}

/// Match index kept in discovery order.
#[derive(Default)]
pub struct InMemoryMatchIndex {
    table: Mutex<IndexTable>,
}

#[async_trait]
impl MatchIndexStore for InMemoryMatchIndex {
    async fn insert_ignore(&self, key: &JobKey, match_id: &str) -> Result<bool, RepositoryError> {
        let mut table = self.table.lock().await;
        let entry = (key.clone(), match_id.to_string());
        if !table.seen.insert(entry.clone()) {
            return Ok(false);
        }
        table.ordered.push(entry);
        Ok(true)
    }

    async fn list_match_ids(&self, key: &JobKey) -> Result<Vec<String>, RepositoryError> {
        Ok(self
            .table
            .lock()
            .await
            .ordered
            .iter()
            .filter(|(entry_key, _)| entry_key == key)
            .map(|(_, match_id)| match_id.clone())
            .collect())
    }
}

/// Match documents keyed by id.
#[derive(Default)]
pub struct InMemoryMatchCache {
    entries: Mutex<HashMap<String, CachedMatch>>,
}

impl InMemoryMatchCache {
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MatchCacheStore for InMemoryMatchCache {
    async fn contains(&self, match_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.entries.lock().await.contains_key(match_id))
    }

    async fn get(&self, match_id: &str) -> Result<Option<CachedMatch>, RepositoryError> {
        Ok(self.entries.lock().await.get(match_id).cloned())
    }

    async fn insert_if_absent(&self, entry: CachedMatch) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&entry.match_id) {
            return Ok(false);
        }
        entries.insert(entry.match_id.clone(), entry);
        Ok(true)
    }
}

/// Summary documents keyed by (puuid, year).
#[derive(Default)]
pub struct InMemorySummaryStore {
    entries: Mutex<HashMap<JobKey, StoredSummary>>,
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn find(&self, key: &JobKey) -> Result<Option<StoredSummary>, RepositoryError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn upsert(&self, key: &JobKey, summary_json: String) -> Result<(), RepositoryError> {
        self.entries.lock().await.insert(
            key.clone(),
            StoredSummary {
                key: key.clone(),
                computed_at: Utc::now(),
                summary_json,
            },
        );
        Ok(())
    }
}

/// Concrete handles to every in-memory store, for tests that inspect them.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub jobs: Arc<InMemoryJobStore>,
    pub match_index: Arc<InMemoryMatchIndex>,
    pub match_cache: Arc<InMemoryMatchCache>,
    pub summaries: Arc<InMemorySummaryStore>,
}

impl InMemoryStores {
    pub fn stores(&self) -> Stores {
        Stores {
            jobs: self.jobs.clone(),
            match_index: self.match_index.clone(),
            match_cache: self.match_cache.clone(),
            summaries: self.summaries.clone(),
        }
    }
}
