//! # Data Models
//!
//! Job record snapshots plus the SeaORM entities backing the four wrapped tables.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod job;
pub mod match_cache;
pub mod player_match;
pub mod player_year;
pub mod year_summary;

pub use job::{Admission, JobKey, JobRecord, JobState};
pub use match_cache::Entity as MatchCache;
pub use player_match::Entity as PlayerMatch;
pub use player_year::Entity as PlayerYear;
pub use year_summary::Entity as YearSummary;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "wrapped".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
