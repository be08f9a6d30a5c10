//! Shared fixtures for integration tests: an in-memory SQLite database, a
//! scriptable upstream double and executors that control when jobs run.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use wrapped::riot::{MatchApi, RiotAccount, RiotError, RiotId};
use wrapped::worker_pool::{JobExecutor, JobFuture, PoolClosed};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// One participant row inside a match document.
pub fn participant(puuid: &str, placement: i64, level: i64, gold_left: i64) -> Value {
    json!({
        "puuid": puuid,
        "placement": placement,
        "level": level,
        "gold_left": gold_left,
        "traits": [
            { "name": "Set10_Punk", "tier_current": 1, "num_units": 2 },
            { "name": "Set10_Dormant", "tier_current": 0, "num_units": 0 }
        ],
        "augments": ["TFT_Augment_Cybernetic"],
        "units": [ { "character_id": "TFT10_Ahri" } ]
    })
}

/// A match document with `me` and one opponent.
pub fn match_doc(match_id: &str, me: Value) -> Value {
    json!({
        "metadata": { "match_id": match_id },
        "info": {
            "participants": [ participant("someone-else", 1, 9, 0), me ]
        }
    })
}

/// Scriptable [`MatchApi`] double.
#[derive(Default)]
pub struct FakeMatchApi {
    accounts: Mutex<HashMap<String, String>>,
    match_ids: Mutex<HashMap<String, Vec<String>>>,
    details: Mutex<HashMap<String, Value>>,
    detail_failures: Mutex<HashMap<String, VecDeque<RiotError>>>,
    list_failures: Mutex<VecDeque<RiotError>>,
    detail_calls: Mutex<Vec<String>>,
    pub resolve_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeMatchApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, riot_id: &str, puuid: &str) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(riot_id.to_string(), puuid.to_string());
        self
    }

    /// Register `count` matches for `puuid`, placements cycling 1..=8.
    pub fn with_matches(self, puuid: &str, count: usize) -> Self {
        let ids: Vec<String> = (1..=count).map(|i| format!("EUW1_{i}")).collect();
        {
            let mut details = self.details.lock().unwrap();
            for (i, id) in ids.iter().enumerate() {
                let placement = (i % 8) as i64 + 1;
                details.insert(id.clone(), match_doc(id, participant(puuid, placement, 8, i as i64)));
            }
        }
        self.match_ids
            .lock()
            .unwrap()
            .insert(puuid.to_string(), ids);
        self
    }

    /// Repeat the first `count` listed ids at the end, as overlapping pages would.
    pub fn with_repeated_ids(self, puuid: &str, count: usize) -> Self {
        if let Some(ids) = self.match_ids.lock().unwrap().get_mut(puuid) {
            let repeated: Vec<String> = ids.iter().take(count).cloned().collect();
            ids.extend(repeated);
        }
        self
    }

    /// Queue an error returned by the next detail fetch of `match_id`.
    pub fn fail_detail(&self, match_id: &str, error: RiotError) {
        self.detail_failures
            .lock()
            .unwrap()
            .entry(match_id.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn fail_listing(&self, error: RiotError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatchApi for FakeMatchApi {
    async fn resolve_account(&self, riot_id: &RiotId) -> Result<RiotAccount, RiotError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&riot_id.to_string()) {
            Some(puuid) => Ok(RiotAccount {
                puuid: puuid.clone(),
                game_name: Some(riot_id.game_name.clone()),
                tag_line: Some(riot_id.tag_line.clone()),
            }),
            None => Err(RiotError::ResolutionFailed {
                riot_id: riot_id.to_string(),
            }),
        }
    }

    async fn list_match_ids_for_year(
        &self,
        puuid: &str,
        _year: i32,
    ) -> Result<Vec<String>, RiotError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .match_ids
            .lock()
            .unwrap()
            .get(puuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_match_detail(&self, match_id: &str) -> Result<Value, RiotError> {
        self.detail_calls.lock().unwrap().push(match_id.to_string());
        let scripted = self
            .detail_failures
            .lock()
            .unwrap()
            .get_mut(match_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        self.details
            .lock()
            .unwrap()
            .get(match_id)
            .cloned()
            .ok_or_else(|| RiotError::Http {
                status: 404,
                body: format!("no match {match_id}"),
            })
    }

    fn routing(&self) -> &str {
        "EUROPE"
    }
}

/// Holds submitted jobs until the test runs them.
#[derive(Default)]
pub struct HeldExecutor {
    jobs: tokio::sync::Mutex<Vec<JobFuture>>,
    submitted: AtomicUsize,
}

impl HeldExecutor {
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Run every held job to completion, oldest first.
    pub async fn run_all(&self) {
        let jobs: Vec<JobFuture> = std::mem::take(&mut *self.jobs.lock().await);
        for job in jobs {
            job.await;
        }
    }
}

#[async_trait]
impl JobExecutor for HeldExecutor {
    async fn submit(&self, job: JobFuture) -> Result<(), PoolClosed> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().await.push(job);
        Ok(())
    }
}
