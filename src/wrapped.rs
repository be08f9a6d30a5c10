//! # Wrapped Service
//!
//! Entry point for starting, polling and reading wrapped jobs.
//!
//! Starting a job is a two-step admission check. The fast path reads the
//! record by display identifier without touching the upstream API. The
//! authoritative check runs again under the key's exclusive lock, and the
//! lock is released as soon as the FETCHING_MATCH_IDS transition is
//! committed. From then on the persisted state is what keeps a second
//! worker away from the key.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::WrappedError;
use crate::ingest::IngestionPipeline;
use crate::models::{Admission, JobKey, JobRecord, JobState};
use crate::repositories::Stores;
use crate::riot::{MatchApi, RiotAccount, RiotError, RiotId};
use crate::summary::SummaryAggregator;
use crate::worker_pool::JobExecutor;

pub const MIN_YEAR: i32 = 2020;
pub const MAX_YEAR: i32 = 2030;

const NOT_FOUND_STATE: &str = "NOT_FOUND";

/// Request to build a wrapped summary.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Display identifier, `GameName#TAG`
    pub riot_id: String,
    pub platform: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub puuid: String,
    pub year: i32,
    /// Present only when this call submitted a new job
    pub job_id: Option<Uuid>,
    pub state: JobState,
}

/// Progress of a job, or the NOT_FOUND pseudo-state.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WrappedStatus {
    pub puuid: Option<String>,
    pub year: i32,
    pub state: String,
    pub match_ids_found: i32,
    pub matches_cached: i32,
    pub summary_ready: bool,
    pub message: String,
}

impl WrappedStatus {
    fn from_record(record: &JobRecord) -> Self {
        Self {
            puuid: Some(record.key.puuid.clone()),
            year: record.key.year,
            state: record.state.to_string(),
            match_ids_found: record.match_ids_found,
            matches_cached: record.matches_cached,
            summary_ready: record.summary_ready,
            message: record.message.clone(),
        }
    }

    fn not_found(puuid: Option<String>, year: i32) -> Self {
        Self {
            puuid,
            year,
            state: NOT_FOUND_STATE.to_string(),
            match_ids_found: 0,
            matches_cached: 0,
            summary_ready: false,
            message: "No run found. Call /api/wrapped/request.".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.state == NOT_FOUND_STATE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NotReadySummary {
    pub ready: bool,
    pub message: String,
    pub puuid: String,
    pub year: i32,
}

/// Stored summary document or a not-ready placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryResult {
    Ready(JsonValue),
    NotReady(NotReadySummary),
}

pub struct WrappedService {
    api: Arc<dyn MatchApi>,
    stores: Stores,
    executor: Arc<dyn JobExecutor>,
    pipeline: Arc<IngestionPipeline>,
    aggregator: SummaryAggregator,
}

impl WrappedService {
    pub fn new(
        api: Arc<dyn MatchApi>,
        stores: Stores,
        executor: Arc<dyn JobExecutor>,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            api,
            aggregator: SummaryAggregator::new(stores.clone()),
            stores,
            executor,
            pipeline,
        }
    }

    #[instrument(skip(self, request), fields(riot_id = %request.riot_id, year = request.year))]
    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome, WrappedError> {
        validate_year(request.year)?;
        let platform = request.platform.trim();
        if platform.is_empty() {
            return Err(WrappedError::InvalidPlatform);
        }
        let riot_id = RiotId::parse(&request.riot_id)?;
        let display = riot_id.to_string();
        let year = request.year;

        if let Some(existing) = self.stores.jobs.find_by_riot_id(&display, year).await? {
            if let Some(outcome) = admitted(&existing) {
                debug!(state = %outcome.state, "Fast path admission");
                return Ok(outcome);
            }
        }

        let puuid = self.api.resolve_identifier(&riot_id).await?;
        let key = JobKey::new(puuid, year);

        if self.aggregator.exists(&key).await? {
            debug!(key = %key, "Summary already stored");
            return Ok(outcome(&key, None, JobState::Done));
        }

        let locked = self
            .stores
            .jobs
            .lock_or_create(JobRecord::queued(key.clone(), platform, display.as_str()))
            .await?;
        let current = locked.record().clone();
        if let Some(outcome) = admitted(&current) {
            locked.commit(None).await?;
            info!(key = %key, state = %outcome.state, "Job not restarted");
            return Ok(outcome);
        }

        let restarted = current.restart(platform, display.as_str())?;
        locked.commit(Some(restarted.clone())).await?;

        let job_id = Uuid::new_v4();
        counter!("wrapped_jobs_started_total").increment(1);
        info!(key = %key, %job_id, previous = %current.state, "Job started");

        let pipeline = Arc::clone(&self.pipeline);
        let job_key = key.clone();
        let span = info_span!("wrapped_job", %job_id, key = %key);
        let submitted = self
            .executor
            .submit(Box::pin(
                async move { pipeline.run(job_key).await }.instrument(span),
            ))
            .await;
        if let Err(refused) = submitted {
            // a running record with no task behind it would never finish
            warn!(key = %key, %job_id, "Job refused by executor");
            self.stores.jobs.save(&restarted.fail(refused)).await?;
            return Err(refused.into());
        }

        Ok(outcome(&key, Some(job_id), JobState::FetchingMatchIds))
    }

    pub async fn status(&self, key: &JobKey) -> Result<WrappedStatus, WrappedError> {
        Ok(match self.stores.jobs.find(key).await? {
            Some(record) => WrappedStatus::from_record(&record),
            None => WrappedStatus::not_found(Some(key.puuid.clone()), key.year),
        })
    }

    /// Status lookup by display identifier; never calls upstream.
    pub async fn status_by_riot_id(
        &self,
        riot_id: &str,
        year: i32,
    ) -> Result<WrappedStatus, WrappedError> {
        let display = RiotId::parse(riot_id)?.to_string();
        Ok(match self.stores.jobs.find_by_riot_id(&display, year).await? {
            Some(record) => WrappedStatus::from_record(&record),
            None => WrappedStatus::not_found(None, year),
        })
    }

    pub async fn result(&self, key: &JobKey) -> Result<SummaryResult, WrappedError> {
        Ok(match self.aggregator.load(key).await? {
            Some(document) => SummaryResult::Ready(document),
            None => SummaryResult::NotReady(NotReadySummary {
                ready: false,
                message: "Summary not ready yet. Poll /api/wrapped/status.".to_string(),
                puuid: key.puuid.clone(),
                year: key.year,
            }),
        })
    }

    /// Recompute from cached data only.
    pub async fn recompute(&self, key: &JobKey) -> Result<JsonValue, WrappedError> {
        let document = self.aggregator.compute_and_save(key).await?;
        Ok(serde_json::to_value(document)?)
    }

    pub async fn resolve(&self, riot_id: &str) -> Result<RiotAccount, WrappedError> {
        let riot_id = RiotId::parse(riot_id)?;
        let mut account = self.api.resolve_account(&riot_id).await?;
        account.puuid = account.puuid.trim().to_string();
        if account.puuid.is_empty() {
            return Err(RiotError::ResolutionFailed {
                riot_id: riot_id.to_string(),
            }
            .into());
        }
        Ok(account)
    }
}

pub fn validate_year(year: i32) -> Result<(), WrappedError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(WrappedError::InvalidYear {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        })
    }
}

fn admitted(record: &JobRecord) -> Option<StartOutcome> {
    match record.admission() {
        Admission::AlreadyDone => Some(outcome(&record.key, None, JobState::Done)),
        Admission::Running(state) => Some(outcome(&record.key, None, state)),
        Admission::Eligible => None,
    }
}

fn outcome(key: &JobKey, job_id: Option<Uuid>, state: JobState) -> StartOutcome {
    StartOutcome {
        puuid: key.puuid.clone(),
        year: key.year,
        job_id,
        state,
    }
}
