//! # Match-History API
//!
//! The upstream API seam. [`MatchApi`] is what the orchestrator and the
//! ingestion pipeline depend on; [`RiotClient`] is the production
//! implementation with bounded rate-limit retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

mod client;
mod error;
mod riot_id;
mod window;

pub use client::{RetryPolicy, RiotClient, RiotClientConfig};
pub use error::RiotError;
pub use riot_id::RiotId;
pub use window::year_window;

/// Account returned by the by-riot-id lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiotAccount {
    #[serde(default)]
    pub puuid: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub tag_line: Option<String>,
}

/// Read access to the upstream match-history service.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// Look up the account behind a display identifier.
    async fn resolve_account(&self, riot_id: &RiotId) -> Result<RiotAccount, RiotError>;

    /// Resolve a display identifier to its stable player id.
    async fn resolve_identifier(&self, riot_id: &RiotId) -> Result<String, RiotError> {
        let account = self.resolve_account(riot_id).await?;
        let puuid = account.puuid.trim();
        if puuid.is_empty() {
            return Err(RiotError::ResolutionFailed {
                riot_id: riot_id.to_string(),
            });
        }
        Ok(puuid.to_string())
    }

    /// Every match id the player played in `year`, as delivered upstream.
    async fn list_match_ids_for_year(
        &self,
        puuid: &str,
        year: i32,
    ) -> Result<Vec<String>, RiotError>;

    /// Raw document for one match.
    async fn fetch_match_detail(&self, match_id: &str) -> Result<JsonValue, RiotError>;

    /// Routing tag recorded on cached matches.
    fn routing(&self) -> &str;
}
