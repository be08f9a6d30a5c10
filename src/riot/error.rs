//! Upstream API errors.

use thiserror::Error;

/// Errors returned by the match-history API client.
#[derive(Debug, Error)]
pub enum RiotError {
    #[error("riotId must be in format GameName#TAG, got '{input}'")]
    InvalidIdentifierFormat { input: String },

    #[error("could not resolve a player id for '{riot_id}'")]
    ResolutionFailed { riot_id: String },

    #[error("paging exceeded offset {offset}, aborting")]
    PagingLimitExceeded { offset: u32 },

    #[error("no calendar window for year {year}")]
    InvalidWindow { year: i32 },

    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("rate limited by upstream after {attempts} attempts, retry after {retry_after_secs}s")]
    RateLimitExhausted { attempts: u32, retry_after_secs: u64 },

    #[error("upstream returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}

impl RiotError {
    /// Advised wait in seconds when the error is a rate-limit signal.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RiotError::RateLimited { retry_after_secs }
            | RiotError::RateLimitExhausted {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
