//! # Ingestion Pipeline
//!
//! Runs one wrapped job inside a worker: discover the year's match ids,
//! index them, cache every match document and compute the summary. Each
//! phase writes the job record before it starts so status polling sees
//! progress. Any error marks the job FAILED and ends the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{RepositoryError, WrappedError};
use crate::models::{JobKey, JobRecord, JobState};
use crate::repositories::{CachedMatch, Stores};
use crate::riot::MatchApi;
use crate::summary::SummaryAggregator;

/// Newly cached matches between two progress writes.
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

pub struct IngestionPipeline {
    api: Arc<dyn MatchApi>,
    stores: Stores,
    aggregator: SummaryAggregator,
    progress_every: usize,
    cancel: CancellationToken,
}

impl IngestionPipeline {
    pub fn new(api: Arc<dyn MatchApi>, stores: Stores) -> Self {
        let aggregator = SummaryAggregator::new(stores.clone());
        Self {
            api,
            stores,
            aggregator,
            progress_every: DEFAULT_PROGRESS_EVERY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Cancelling this token aborts rate-limit waits with [`WrappedError::Interrupted`].
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the job for `key` to DONE or FAILED.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn run(&self, key: JobKey) {
        let started = Instant::now();

        match self.execute(&key).await {
            Ok(record) => {
                counter!("wrapped_jobs_finished_total", "outcome" => "done").increment(1);
                info!(
                    match_ids_found = record.match_ids_found,
                    matches_cached = record.matches_cached,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Wrapped job finished"
                );
            }
            Err(err) => {
                counter!("wrapped_jobs_finished_total", "outcome" => "failed").increment(1);
                error!(error = %err, "Wrapped job failed");
                self.mark_failed(&key, &err).await;
            }
        }
    }

    async fn execute(&self, key: &JobKey) -> Result<JobRecord, WrappedError> {
        let mut record = self.load(key).await?;
        if record.state != JobState::FetchingMatchIds {
            record = record.advance(JobState::FetchingMatchIds, "Starting...")?;
        }

        // Phase 1: discover match ids, reusing the index from an earlier run.
        record = self.persist(record.with_message("Fetching match IDs...")).await?;
        let mut match_ids = self.stores.match_index.list_match_ids(key).await?;
        if match_ids.is_empty() {
            match_ids = self
                .api
                .list_match_ids_for_year(&key.puuid, key.year)
                .await?;
            debug!(count = match_ids.len(), "Listed match ids upstream");
        } else {
            debug!(count = match_ids.len(), "Reusing indexed match ids");
        }
        record = self
            .persist(record.with_match_ids_found(match_ids.len()))
            .await?;

        // Phase 2: index.
        record = self
            .persist(record.advance(JobState::SavingMatchIds, "Saving match IDs...")?)
            .await?;
        let mut inserted = 0usize;
        for match_id in &match_ids {
            if self.stores.match_index.insert_ignore(key, match_id).await? {
                inserted += 1;
            }
        }
        debug!(inserted, "Match index updated");
        let indexed = self.stores.match_index.list_match_ids(key).await?;

        // Phase 3: cache details. The found count becomes the distinct indexed
        // count so reruns of the same key agree.
        record = self
            .persist(
                record
                    .with_match_ids_found(indexed.len())
                    .advance(JobState::FetchingMatchDetails, "Caching match JSON...")?,
            )
            .await?;
        record = self.cache_details(record, &indexed).await?;

        // Phase 4: summarize.
        record = self
            .persist(record.advance(JobState::Computing, "Computing year summary...")?)
            .await?;
        self.aggregator.compute_and_save(key).await?;
        self.persist(record.complete()?).await
    }

    async fn cache_details(
        &self,
        mut record: JobRecord,
        match_ids: &[String],
    ) -> Result<JobRecord, WrappedError> {
        let total = match_ids.len();

        for match_id in match_ids {
            if self.stores.match_cache.contains(match_id).await? {
                continue;
            }

            let payload = loop {
                match self.api.fetch_match_detail(match_id).await {
                    Ok(payload) => break payload,
                    Err(err) => {
                        let Some(wait_secs) = err.retry_after() else {
                            return Err(err.into());
                        };
                        record = self
                            .persist(record.with_message(format!(
                                "Rate limited. Waiting {}s... Cached {}/{}",
                                wait_secs, record.matches_cached, total
                            )))
                            .await?;
                        self.wait(match_id, wait_secs).await?;
                    }
                }
            };

            let entry = CachedMatch {
                match_id: match_id.clone(),
                routing: self.api.routing().to_string(),
                fetched_at: Utc::now(),
                payload,
            };
            if !self.stores.match_cache.insert_if_absent(entry).await? {
                // another job cached it first
                continue;
            }

            counter!("wrapped_matches_cached_total").increment(1);
            record = record.record_cached();
            if record.matches_cached as usize % self.progress_every == 0 {
                record = self
                    .persist(record.with_message(format!(
                        "Cached {}/{} matches...",
                        record.matches_cached, total
                    )))
                    .await?;
            }
        }

        Ok(record)
    }

    async fn wait(&self, match_id: &str, wait_secs: u64) -> Result<(), WrappedError> {
        warn!(match_id, retry_after_secs = wait_secs, "Rate limited while caching match");
        histogram!("wrapped_rate_limit_wait_seconds", "source" => "pipeline")
            .record(wait_secs as f64);

        tokio::select! {
            _ = self.cancel.cancelled() => Err(WrappedError::Interrupted),
            _ = tokio::time::sleep(Duration::from_secs(wait_secs)) => Ok(()),
        }
    }

    async fn load(&self, key: &JobKey) -> Result<JobRecord, WrappedError> {
        self.stores.jobs.find(key).await?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "player_year",
                key: key.to_string(),
            }
            .into()
        })
    }

    async fn persist(&self, record: JobRecord) -> Result<JobRecord, WrappedError> {
        self.stores.jobs.save(&record).await?;
        Ok(record)
    }

    async fn mark_failed(&self, key: &JobKey, err: &WrappedError) {
        match self.stores.jobs.find(key).await {
            Ok(Some(current)) => {
                if let Err(save_err) = self.stores.jobs.save(&current.fail(err)).await {
                    error!(error = %save_err, "Failed to record job failure");
                }
            }
            Ok(None) => warn!("Job record vanished before failure could be recorded"),
            Err(find_err) => error!(error = %find_err, "Failed to load job record"),
        }
    }
}
