//! HTTP client for the upstream match-history API.
//!
//! Every call goes through [`RiotClient::with_retry`]: a 429 is retried with
//! exponential backoff (never shorter than the advised `Retry-After`) up to
//! [`RetryPolicy::max_attempts`] attempts, then surfaces as
//! [`RiotError::RateLimitExhausted`]. Any other failure propagates at once.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{MatchApi, RiotAccount, RiotError, RiotId, year_window};

/// Upstream page size for match-id listing.
pub const PAGE_SIZE: u32 = 100;

/// Offset ceiling guarding against runaway pagination.
pub const MAX_PAGING_OFFSET: u32 = 100_000;

const TOKEN_HEADER: &str = "X-Riot-Token";

/// Bounded retry for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Used when a 429 carries no parseable `Retry-After`
    pub default_retry_after_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
            default_retry_after_secs: 2,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32, advised_secs: u64) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        backoff.max(Duration::from_secs(advised_secs))
    }
}

/// Settings for [`RiotClient`].
#[derive(Debug, Clone)]
pub struct RiotClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub routing: String,
    pub timezone: Tz,
    pub retry: RetryPolicy,
}

/// Production [`MatchApi`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct RiotClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    routing: String,
    timezone: Tz,
    retry: RetryPolicy,
}

impl RiotClient {
    pub fn new(config: RiotClientConfig) -> Result<Self, RiotError> {
        let base_url = Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("wrapped/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            routing: config.routing,
            timezone: config.timezone,
            retry: config.retry,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RiotError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RiotError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RiotError> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(self.retry.default_retry_after_secs);
            return Err(RiotError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RiotError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Run `call` until it succeeds, fails with something other than a rate
    /// limit, or the attempt budget is spent.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, RiotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RiotError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(RiotError::RateLimited { retry_after_secs }) => {
                    counter!("wrapped_rate_limited_total", "operation" => operation).increment(1);

                    if attempt >= self.retry.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            retry_after_secs,
                            "Upstream rate limit retries exhausted"
                        );
                        return Err(RiotError::RateLimitExhausted {
                            attempts: attempt,
                            retry_after_secs,
                        });
                    }

                    let wait = self.retry.delay_before_retry(attempt, retry_after_secs);
                    debug!(
                        operation,
                        attempt,
                        retry_after_secs,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited by upstream, backing off"
                    );
                    histogram!("wrapped_rate_limit_wait_seconds", "source" => "client")
                        .record(wait.as_secs_f64());
                    sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl MatchApi for RiotClient {
    #[instrument(skip(self, riot_id), fields(riot_id = %riot_id))]
    async fn resolve_account(&self, riot_id: &RiotId) -> Result<RiotAccount, RiotError> {
        let url = self.endpoint(&[
            "riot",
            "account",
            "v1",
            "accounts",
            "by-riot-id",
            &riot_id.game_name,
            &riot_id.tag_line,
        ])?;

        match self
            .with_retry("resolve_account", || self.get_json(url.clone()))
            .await
        {
            Err(RiotError::Http { status: 404, .. }) => Err(RiotError::ResolutionFailed {
                riot_id: riot_id.to_string(),
            }),
            other => other,
        }
    }

    #[instrument(skip(self))]
    async fn list_match_ids_for_year(
        &self,
        puuid: &str,
        year: i32,
    ) -> Result<Vec<String>, RiotError> {
        let (start_time, end_time) = year_window(year, self.timezone)?;
        let base = self.endpoint(&["tft", "match", "v1", "matches", "by-puuid", puuid, "ids"])?;

        let mut match_ids = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("start", &offset.to_string())
                .append_pair("count", &PAGE_SIZE.to_string())
                .append_pair("startTime", &start_time.to_string())
                .append_pair("endTime", &end_time.to_string());

            let page: Vec<String> = self
                .with_retry("list_match_ids", || self.get_json(url.clone()))
                .await?;
            let page_len = page.len();
            match_ids.extend(page);

            if page_len < PAGE_SIZE as usize {
                break;
            }

            offset += PAGE_SIZE;
            if offset > MAX_PAGING_OFFSET {
                return Err(RiotError::PagingLimitExceeded { offset });
            }
        }

        debug!(count = match_ids.len(), "Listed match ids");
        Ok(match_ids)
    }

    #[instrument(skip(self))]
    async fn fetch_match_detail(&self, match_id: &str) -> Result<JsonValue, RiotError> {
        let url = self.endpoint(&["tft", "match", "v1", "matches", match_id])?;
        self.with_retry("fetch_match_detail", || self.get_json(url.clone()))
            .await
    }

    fn routing(&self) -> &str {
        &self.routing
    }
}
