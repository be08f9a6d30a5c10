//! # Summary Aggregator
//!
//! Reads every indexed match for a key from the cache, folds the player's
//! rows into a [`YearSummaryDocument`] and upserts it. Missing cache entries
//! and matches without the player are skipped, so a recompute never needs
//! the upstream API.

use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use crate::error::{RepositoryError, WrappedError};
use crate::models::JobKey;
use crate::repositories::Stores;

mod stats;
mod view;

pub use stats::{GameHighlight, RankedEntry, SummaryBuilder, TOP_N, YearSummaryDocument, round2};
pub use view::{MatchView, ParticipantView};

#[derive(Clone)]
pub struct SummaryAggregator {
    stores: Stores,
}

impl SummaryAggregator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn compute_and_save(&self, key: &JobKey) -> Result<YearSummaryDocument, WrappedError> {
        let match_ids = self.stores.match_index.list_match_ids(key).await?;
        let mut builder = SummaryBuilder::new();
        let mut skipped = 0usize;

        for match_id in &match_ids {
            let Some(cached) = self.stores.match_cache.get(match_id).await? else {
                skipped += 1;
                continue;
            };
            let counted = MatchView::new(&cached.payload)
                .participant(&key.puuid)
                .is_some_and(|me| builder.observe(match_id, me));
            if !counted {
                skipped += 1;
            }
        }

        let document = builder.finish(key);
        let summary_json = serde_json::to_string(&document)?;
        self.stores.summaries.upsert(key, summary_json).await?;

        info!(
            indexed = match_ids.len(),
            skipped,
            games_played = document.games_played,
            "Year summary computed"
        );
        Ok(document)
    }

    /// The stored document as JSON, if one exists.
    pub async fn load(&self, key: &JobKey) -> Result<Option<JsonValue>, WrappedError> {
        let Some(stored) = self.stores.summaries.find(key).await? else {
            return Ok(None);
        };

        let document = serde_json::from_str(&stored.summary_json).map_err(|err| {
            debug!(key = %key, error = %err, "Stored summary is not valid JSON");
            RepositoryError::CorruptRecord {
                entity: "year_summary",
                reason: err.to_string(),
            }
        })?;
        Ok(Some(document))
    }

    pub async fn exists(&self, key: &JobKey) -> Result<bool, WrappedError> {
        Ok(self.stores.summaries.find(key).await?.is_some())
    }
}
