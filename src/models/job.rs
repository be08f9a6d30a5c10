//! # Job Records
//!
//! Immutable snapshots of a wrapped job for one (puuid, year) key. Every
//! mutation returns a new snapshot with `updated_at` advanced; the stores
//! persist whichever snapshot they are handed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::WrappedError;

/// Lifecycle state of a wrapped job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    FetchingMatchIds,
    SavingMatchIds,
    FetchingMatchDetails,
    Computing,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::FetchingMatchIds => "FETCHING_MATCH_IDS",
            JobState::SavingMatchIds => "SAVING_MATCH_IDS",
            JobState::FetchingMatchDetails => "FETCHING_MATCH_DETAILS",
            JobState::Computing => "COMPUTING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        }
    }

    /// States that mean a worker currently owns the key.
    ///
    /// QUEUED is not one of them: a queued row exists but nothing is running it.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            JobState::FetchingMatchIds
                | JobState::SavingMatchIds
                | JobState::FetchingMatchDetails
                | JobState::Computing
        )
    }

    pub fn is_restartable(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Failed)
    }

    /// Whether a single run may move from `self` to `next`.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;

        match (self, next) {
            (Done, _) => false,
            (_, Failed) => true,
            (Queued, FetchingMatchIds) | (Failed, FetchingMatchIds) => true,
            (FetchingMatchIds, SavingMatchIds) => true,
            (SavingMatchIds, FetchingMatchDetails) => true,
            (FetchingMatchDetails, Computing) => true,
            (Computing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "QUEUED" => Ok(JobState::Queued),
            "FETCHING_MATCH_IDS" => Ok(JobState::FetchingMatchIds),
            "SAVING_MATCH_IDS" => Ok(JobState::SavingMatchIds),
            "FETCHING_MATCH_DETAILS" => Ok(JobState::FetchingMatchDetails),
            "COMPUTING" => Ok(JobState::Computing),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// Identity of a wrapped job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub puuid: String,
    pub year: i32,
}

impl JobKey {
    pub fn new(puuid: impl Into<String>, year: i32) -> Self {
        Self {
            puuid: puuid.into(),
            year,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.puuid, self.year)
    }
}

/// Outcome of inspecting a record before (re)starting a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    AlreadyDone,
    Running(JobState),
    Eligible,
}

/// One snapshot of a job record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub key: JobKey,
    pub platform: String,
    pub riot_id: String,
    pub state: JobState,
    pub match_ids_found: i32,
    pub matches_cached: i32,
    pub summary_ready: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Seed row inserted the first time a key is seen.
    pub fn queued(key: JobKey, platform: impl Into<String>, riot_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            platform: platform.into(),
            riot_id: riot_id.into(),
            state: JobState::Queued,
            match_ids_found: 0,
            matches_cached: 0,
            summary_ready: false,
            message: "Queued".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn admission(&self) -> Admission {
        if self.summary_ready || self.state == JobState::Done {
            Admission::AlreadyDone
        } else if self.state.is_running() {
            Admission::Running(self.state)
        } else {
            Admission::Eligible
        }
    }

    /// Reset counters and enter FETCHING_MATCH_IDS for a fresh run.
    pub fn restart(
        &self,
        platform: impl Into<String>,
        riot_id: impl Into<String>,
    ) -> Result<Self, WrappedError> {
        if !self.state.is_restartable() {
            return Err(WrappedError::IllegalTransition {
                from: self.state,
                to: JobState::FetchingMatchIds,
            });
        }

        Ok(Self {
            platform: platform.into(),
            riot_id: riot_id.into(),
            state: JobState::FetchingMatchIds,
            match_ids_found: 0,
            matches_cached: 0,
            summary_ready: false,
            message: "Starting...".to_string(),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        })
    }

    pub fn advance(&self, next: JobState, message: impl Into<String>) -> Result<Self, WrappedError> {
        if !self.state.can_advance_to(next) {
            return Err(WrappedError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }

        Ok(Self {
            state: next,
            message: message.into(),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        })
    }

    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        }
    }

    pub fn with_match_ids_found(&self, count: usize) -> Self {
        Self {
            match_ids_found: saturating_i32(count),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        }
    }

    pub fn record_cached(&self) -> Self {
        Self {
            matches_cached: self.matches_cached.saturating_add(1),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        }
    }

    pub fn complete(&self) -> Result<Self, WrappedError> {
        let mut done = self.advance(JobState::Done, "Summary ready.")?;
        done.summary_ready = true;
        Ok(done)
    }

    /// Terminal failure; reachable from every state of a running job.
    pub fn fail(&self, detail: impl fmt::Display) -> Self {
        Self {
            state: JobState::Failed,
            message: clip(format!("Failed: {}", detail)),
            updated_at: next_timestamp(self.updated_at),
            ..self.clone()
        }
    }
}

fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Width of the persisted message column.
pub const MAX_MESSAGE_CHARS: usize = 512;

fn clip(message: String) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message;
    }
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

fn saturating_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
