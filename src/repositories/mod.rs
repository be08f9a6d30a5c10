//! # Repository Layer
//!
//! Store traits the wrapped core depends on, with SeaORM implementations for
//! production and in-memory doubles in [`memory`].
//!
//! Only the job record store offers exclusive locking. The match index and
//! match cache are insert-or-ignore and therefore safe to write from several
//! jobs without coordination.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde_json::Value as JsonValue;

use crate::error::RepositoryError;
use crate::models::{JobKey, JobRecord};

pub mod match_cache;
pub mod memory;
pub mod player_match;
pub mod player_year;
pub mod year_summary;

pub use match_cache::MatchCacheRepository;
pub use player_match::PlayerMatchRepository;
pub use player_year::PlayerYearRepository;
pub use year_summary::YearSummaryRepository;

/// A job record held under its key's exclusive lock.
///
/// Dropping the guard releases the lock and discards nothing but the lock.
#[async_trait]
pub trait LockedJob: Send {
    /// The record as read under the lock.
    fn record(&self) -> &JobRecord;

    /// Persist `next` (when given) and release the lock.
    async fn commit(self: Box<Self>, next: Option<JobRecord>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn find(&self, key: &JobKey) -> Result<Option<JobRecord>, RepositoryError>;

    /// Most recently updated record for a display identifier and year.
    async fn find_by_riot_id(
        &self,
        riot_id: &str,
        year: i32,
    ) -> Result<Option<JobRecord>, RepositoryError>;

    /// Overwrite the mutable fields of an existing record.
    async fn save(&self, record: &JobRecord) -> Result<(), RepositoryError>;

    /// Lock the record for `seed.key`, inserting `seed` first when no row
    /// exists. Concurrent first inserts converge on a single row.
    async fn lock_or_create(&self, seed: JobRecord) -> Result<Box<dyn LockedJob>, RepositoryError>;
}

#[async_trait]
pub trait MatchIndexStore: Send + Sync {
    /// Returns `false` when the entry already existed.
    async fn insert_ignore(&self, key: &JobKey, match_id: &str) -> Result<bool, RepositoryError>;

    /// Match ids for a key in discovery order.
    async fn list_match_ids(&self, key: &JobKey) -> Result<Vec<String>, RepositoryError>;
}

/// One cached match document.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMatch {
    pub match_id: String,
    pub routing: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: JsonValue,
}

#[async_trait]
pub trait MatchCacheStore: Send + Sync {
    async fn contains(&self, match_id: &str) -> Result<bool, RepositoryError>;

    async fn get(&self, match_id: &str) -> Result<Option<CachedMatch>, RepositoryError>;

    /// Returns `false` and leaves the stored document untouched when the id is already cached.
    async fn insert_if_absent(&self, entry: CachedMatch) -> Result<bool, RepositoryError>;
}

/// Serialized summary document for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSummary {
    pub key: JobKey,
    pub computed_at: DateTime<Utc>,
    pub summary_json: String,
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find(&self, key: &JobKey) -> Result<Option<StoredSummary>, RepositoryError>;

    /// Last writer wins.
    async fn upsert(&self, key: &JobKey, summary_json: String) -> Result<(), RepositoryError>;
}

/// The four stores, shared by the service, pipeline and aggregator.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobRecordStore>,
    pub match_index: Arc<dyn MatchIndexStore>,
    pub match_cache: Arc<dyn MatchCacheStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl Stores {
    /// SeaORM-backed stores over one connection pool.
    pub fn sea_orm(db: DatabaseConnection) -> Self {
        Self {
            jobs: Arc::new(PlayerYearRepository::new(db.clone())),
            match_index: Arc::new(PlayerMatchRepository::new(db.clone())),
            match_cache: Arc::new(MatchCacheRepository::new(db.clone())),
            summaries: Arc::new(YearSummaryRepository::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        memory::InMemoryStores::default().stores()
    }
}
