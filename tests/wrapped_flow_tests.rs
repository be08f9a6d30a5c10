//! End-to-end flows through the wrapped service against in-memory stores.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wrapped::error::WrappedError;
use wrapped::ingest::IngestionPipeline;
use wrapped::models::{JobKey, JobRecord, JobState};
use wrapped::repositories::SummaryStore;
use wrapped::repositories::memory::InMemoryStores;
use wrapped::riot::RiotError;
use wrapped::worker_pool::{ImmediateExecutor, JobExecutor, PoolClosed, WorkerPool};
use wrapped::wrapped::{StartRequest, SummaryResult, WrappedService};

mod test_utils;
use test_utils::{FakeMatchApi, HeldExecutor};

const RIOT_ID: &str = "Ada#EUW";
const PUUID: &str = "puuid-ada";

fn request(year: i32) -> StartRequest {
    StartRequest {
        riot_id: RIOT_ID.to_string(),
        platform: "EUW1".to_string(),
        year,
    }
}

fn key() -> JobKey {
    JobKey::new(PUUID, 2024)
}

fn build(
    api: Arc<FakeMatchApi>,
    stores: &InMemoryStores,
    executor: Arc<dyn JobExecutor>,
    pipeline: IngestionPipeline,
) -> WrappedService {
    WrappedService::new(api, stores.stores(), executor, Arc::new(pipeline))
}

fn immediate(api: Arc<FakeMatchApi>, stores: &InMemoryStores) -> WrappedService {
    let pipeline = IngestionPipeline::new(api.clone(), stores.stores());
    build(api, stores, Arc::new(ImmediateExecutor), pipeline)
}

fn api_with_matches(count: usize) -> Arc<FakeMatchApi> {
    Arc::new(
        FakeMatchApi::new()
            .with_account(RIOT_ID, PUUID)
            .with_matches(PUUID, count),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_create_one_record_and_one_job() {
    let api = api_with_matches(3);
    let stores = InMemoryStores::default();
    let executor = Arc::new(HeldExecutor::default());
    let pipeline = IngestionPipeline::new(api.clone(), stores.stores());
    let service = Arc::new(build(api, &stores, executor.clone(), pipeline));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.start(request(2024)).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| o.job_id.is_some()).count(), 1);
    assert!(outcomes.iter().all(|o| o.state == JobState::FetchingMatchIds));
    assert!(outcomes.iter().all(|o| o.puuid == PUUID));
    assert_eq!(stores.jobs.len().await, 1);
    assert_eq!(executor.submitted(), 1);

    executor.run_all().await;
    let status = service.status(&key()).await.unwrap();
    assert_eq!(status.state, "DONE");
    assert!(status.summary_ready);
}

#[tokio::test]
async fn completed_job_reports_progress_and_summary() {
    let api = api_with_matches(3);
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    let outcome = service.start(request(2024)).await.unwrap();
    assert!(outcome.job_id.is_some());
    assert_eq!(outcome.state, JobState::FetchingMatchIds);

    let status = service.status(&key()).await.unwrap();
    assert_eq!(status.state, "DONE");
    assert_eq!(status.match_ids_found, 3);
    assert_eq!(status.matches_cached, 3);
    assert_eq!(status.message, "Summary ready.");

    let states: Vec<JobState> = stores.jobs.writes().await.iter().map(|r| r.state).collect();
    for expected in [
        JobState::FetchingMatchIds,
        JobState::SavingMatchIds,
        JobState::FetchingMatchDetails,
        JobState::Computing,
        JobState::Done,
    ] {
        assert!(states.contains(&expected), "missing {expected}");
    }

    let SummaryResult::Ready(summary) = service.result(&key()).await.unwrap() else {
        panic!("summary should be ready");
    };
    assert_eq!(summary["gamesPlayed"], 3);
    assert_eq!(summary["avgPlacement"], 2.0);
    assert_eq!(summary["placements"]["1"], 1);
    assert_eq!(summary["topTraits"][0]["name"], "Set10_Punk");
    assert_eq!(summary["topTraits"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_detail_waits_then_retries_same_match() {
    let api = api_with_matches(3);
    api.fail_detail("EUW1_2", RiotError::RateLimited { retry_after_secs: 4 });
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    let started = tokio::time::Instant::now();
    service.start(request(2024)).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(
        api.detail_calls(),
        vec!["EUW1_1", "EUW1_2", "EUW1_2", "EUW1_3"]
    );

    let writes = stores.jobs.writes().await;
    let waits: Vec<&JobRecord> = writes
        .iter()
        .filter(|r| r.message.starts_with("Rate limited."))
        .collect();
    assert_eq!(waits.len(), 1);
    assert_eq!(waits[0].message, "Rate limited. Waiting 4s... Cached 1/3");
    assert_eq!(waits[0].matches_cached, 1);

    let status = service.status(&key()).await.unwrap();
    assert_eq!(status.state, "DONE");
    assert_eq!(status.matches_cached, 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_is_still_waited_out() {
    let api = api_with_matches(1);
    api.fail_detail(
        "EUW1_1",
        RiotError::RateLimitExhausted {
            attempts: 6,
            retry_after_secs: 10,
        },
    );
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    service.start(request(2024)).await.unwrap();

    assert_eq!(api.detail_calls(), vec!["EUW1_1", "EUW1_1"]);
    assert_eq!(service.status(&key()).await.unwrap().state, "DONE");
}

#[tokio::test]
async fn failed_job_restarts_and_reuses_cached_matches() {
    let api = api_with_matches(3);
    api.fail_detail(
        "EUW1_2",
        RiotError::Http {
            status: 500,
            body: "boom".to_string(),
        },
    );
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    service.start(request(2024)).await.unwrap();
    let failed = service.status(&key()).await.unwrap();
    assert_eq!(failed.state, "FAILED");
    assert!(failed.message.starts_with("Failed: "));
    assert!(!failed.summary_ready);
    assert_eq!(stores.match_cache.len().await, 1);

    let restarted = service.start(request(2024)).await.unwrap();
    assert!(restarted.job_id.is_some());
    assert!(
        stores
            .jobs
            .writes()
            .await
            .iter()
            .any(|r| r.state == JobState::FetchingMatchIds && r.message == "Starting...")
    );

    let done = service.status(&key()).await.unwrap();
    assert_eq!(done.state, "DONE");
    assert_eq!(done.match_ids_found, 3);
    assert_eq!(done.matches_cached, 2);
    // the index from the failed run is reused and EUW1_1 is not fetched again
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        api.detail_calls(),
        vec!["EUW1_1", "EUW1_2", "EUW1_2", "EUW1_3"]
    );
}

#[tokio::test]
async fn done_key_short_circuits_without_upstream_calls() {
    let api = api_with_matches(2);
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    service.start(request(2024)).await.unwrap();
    let writes_before = stores.jobs.writes().await.len();
    let resolves_before = api.resolve_calls.load(Ordering::SeqCst);

    let again = service.start(request(2024)).await.unwrap();
    assert_eq!(again.state, JobState::Done);
    assert!(again.job_id.is_none());
    assert_eq!(again.puuid, PUUID);
    assert_eq!(api.resolve_calls.load(Ordering::SeqCst), resolves_before);
    assert_eq!(stores.jobs.writes().await.len(), writes_before);
}

#[tokio::test]
async fn stored_summary_returns_done_without_job_record() {
    let api = api_with_matches(2);
    let stores = InMemoryStores::default();
    stores
        .summaries
        .upsert(&key(), "{\"ready\":true}".to_string())
        .await
        .unwrap();
    let service = immediate(api.clone(), &stores);

    let outcome = service.start(request(2024)).await.unwrap();
    assert_eq!(outcome.state, JobState::Done);
    assert!(outcome.job_id.is_none());
    assert!(stores.jobs.is_empty().await);
}

#[tokio::test]
async fn queued_record_is_restarted() {
    let api = api_with_matches(1);
    let stores = InMemoryStores::default();
    let held = Arc::new(HeldExecutor::default());
    let pipeline = IngestionPipeline::new(api.clone(), stores.stores());
    let service = build(api, &stores, held.clone(), pipeline);

    let locked = stores
        .stores()
        .jobs
        .lock_or_create(JobRecord::queued(key(), "EUW1", RIOT_ID))
        .await
        .unwrap();
    locked.commit(None).await.unwrap();

    let outcome = service.start(request(2024)).await.unwrap();
    assert!(outcome.job_id.is_some());
    assert_eq!(held.submitted(), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_state_change() {
    let api = api_with_matches(1);
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    assert!(matches!(
        service.start(request(2019)).await,
        Err(WrappedError::InvalidYear { year: 2019, .. })
    ));
    assert!(matches!(
        service.start(request(2031)).await,
        Err(WrappedError::InvalidYear { .. })
    ));

    let mut blank_platform = request(2024);
    blank_platform.platform = "  ".to_string();
    assert!(matches!(
        service.start(blank_platform).await,
        Err(WrappedError::InvalidPlatform)
    ));

    let mut bad_id = request(2024);
    bad_id.riot_id = "NoHash".to_string();
    assert!(matches!(
        service.start(bad_id).await,
        Err(WrappedError::Riot(RiotError::InvalidIdentifierFormat { .. }))
    ));

    assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 0);
    assert!(stores.jobs.is_empty().await);
}

#[tokio::test]
async fn unresolvable_riot_id_creates_no_record() {
    let api = Arc::new(FakeMatchApi::new());
    let stores = InMemoryStores::default();
    let service = immediate(api, &stores);

    assert!(matches!(
        service.start(request(2024)).await,
        Err(WrappedError::Riot(RiotError::ResolutionFailed { .. }))
    ));
    assert!(stores.jobs.is_empty().await);
}

#[tokio::test]
async fn listing_failure_marks_job_failed() {
    let api = api_with_matches(2);
    api.fail_listing(RiotError::Http {
        status: 503,
        body: "unavailable".to_string(),
    });
    let stores = InMemoryStores::default();
    let service = immediate(api, &stores);

    service.start(request(2024)).await.unwrap();
    let status = service.status(&key()).await.unwrap();
    assert_eq!(status.state, "FAILED");
    assert!(status.message.contains("503"));
}

#[tokio::test]
async fn cancelled_rate_limit_wait_fails_the_job() {
    let api = api_with_matches(2);
    api.fail_detail("EUW1_1", RiotError::RateLimited { retry_after_secs: 60 });
    let stores = InMemoryStores::default();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let pipeline = IngestionPipeline::new(api.clone(), stores.stores()).with_cancellation(cancel);
    let service = build(api.clone(), &stores, Arc::new(ImmediateExecutor), pipeline);

    service.start(request(2024)).await.unwrap();

    let status = service.status(&key()).await.unwrap();
    assert_eq!(status.state, "FAILED");
    assert_eq!(status.message, "Failed: job interrupted while rate-limited");
    assert_eq!(api.detail_calls(), vec!["EUW1_1"]);
}

#[tokio::test]
async fn progress_is_persisted_every_interval() {
    let api = api_with_matches(25);
    let stores = InMemoryStores::default();
    let service = immediate(api, &stores);

    service.start(request(2024)).await.unwrap();

    let messages: Vec<String> = stores
        .jobs
        .writes()
        .await
        .into_iter()
        .map(|r| r.message)
        .collect();
    assert!(messages.contains(&"Cached 10/25 matches...".to_string()));
    assert!(messages.contains(&"Cached 20/25 matches...".to_string()));
    assert!(!messages.iter().any(|m| m == "Cached 5/25 matches..."));
}

#[tokio::test]
async fn recompute_is_byte_identical() {
    let api = api_with_matches(12);
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);
    service.start(request(2024)).await.unwrap();

    let first = stores.summaries.find(&key()).await.unwrap().unwrap();
    let recomputed = service.recompute(&key()).await.unwrap();
    let second = stores.summaries.find(&key()).await.unwrap().unwrap();

    assert_eq!(first.summary_json, second.summary_json);
    assert_eq!(recomputed["gamesPlayed"], 12);
    // recompute never goes upstream
    assert_eq!(api.detail_calls().len(), 12);
}

#[tokio::test]
async fn status_and_result_before_any_run() {
    let api = api_with_matches(1);
    let stores = InMemoryStores::default();
    let service = immediate(api, &stores);

    let status = service.status(&key()).await.unwrap();
    assert!(status.is_not_found());
    assert_eq!(status.message, "No run found. Call /api/wrapped/request.");
    assert_eq!(status.puuid.as_deref(), Some(PUUID));

    let by_riot_id = service.status_by_riot_id(RIOT_ID, 2024).await.unwrap();
    assert!(by_riot_id.is_not_found());
    assert!(by_riot_id.puuid.is_none());

    let SummaryResult::NotReady(placeholder) = service.result(&key()).await.unwrap() else {
        panic!("no summary should exist yet");
    };
    assert!(!placeholder.ready);
    assert_eq!(placeholder.message, "Summary not ready yet. Poll /api/wrapped/status.");
    assert_eq!(placeholder.year, 2024);
}

#[tokio::test]
async fn corrupt_stored_summary_is_reported() {
    let api = api_with_matches(1);
    let stores = InMemoryStores::default();
    stores
        .summaries
        .upsert(&key(), "not json".to_string())
        .await
        .unwrap();
    let service = immediate(api, &stores);

    assert!(matches!(
        service.result(&key()).await,
        Err(WrappedError::Repository(_))
    ));
}

#[tokio::test]
async fn refused_submission_fails_the_job_so_it_can_restart() {
    let api = api_with_matches(2);
    let stores = InMemoryStores::default();
    let pool = Arc::new(WorkerPool::new(1));
    pool.shutdown().await;
    let pipeline = IngestionPipeline::new(api.clone(), stores.stores());
    let closed = build(api.clone(), &stores, pool, pipeline);

    let err = closed.start(request(2024)).await.unwrap_err();
    assert!(matches!(err, WrappedError::PoolClosed(PoolClosed)));

    let status = closed.status(&key()).await.unwrap();
    assert_eq!(status.state, "FAILED");
    assert_eq!(status.message, "Failed: worker pool is shut down");

    let outcome = immediate(api, &stores).start(request(2024)).await.unwrap();
    assert!(outcome.job_id.is_some());
    let status = closed.status(&key()).await.unwrap();
    assert_eq!(status.state, "DONE");
}

#[tokio::test]
async fn repeated_listing_ids_count_once_across_restarts() {
    let api = Arc::new(
        FakeMatchApi::new()
            .with_account(RIOT_ID, PUUID)
            .with_matches(PUUID, 3)
            .with_repeated_ids(PUUID, 2),
    );
    api.fail_detail(
        "EUW1_3",
        RiotError::Http {
            status: 500,
            body: "boom".to_string(),
        },
    );
    let stores = InMemoryStores::default();
    let service = immediate(api.clone(), &stores);

    service.start(request(2024)).await.unwrap();
    let failed = service.status(&key()).await.unwrap();
    assert_eq!(failed.state, "FAILED");
    assert_eq!(failed.match_ids_found, 3);

    service.start(request(2024)).await.unwrap();
    let done = service.status(&key()).await.unwrap();
    assert_eq!(done.state, "DONE");
    assert_eq!(done.match_ids_found, 3);
    assert_eq!(api.detail_calls(), vec!["EUW1_1", "EUW1_2", "EUW1_3", "EUW1_3"]);
}
