//! # Wrapped API Handlers
//!
//! Start, poll, read and recompute per-player year summaries.

use axum::{
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiError, validation_error};
use crate::models::JobKey;
use crate::server::AppState;
use crate::wrapped::{StartOutcome, StartRequest, SummaryResult, WrappedStatus, validate_year};

/// Query identifying one (puuid, year) key.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub puuid: String,
    pub year: i32,
}

impl KeyQuery {
    fn into_key(self) -> Result<JobKey, ApiError> {
        let puuid = self.puuid.trim();
        if puuid.is_empty() {
            return Err(validation_error(
                "puuid must not be blank",
                json!({ "puuid": "required" }),
            ));
        }
        validate_year(self.year)?;
        Ok(JobKey::new(puuid, self.year))
    }
}

/// Status lookup by resolved id or by display identifier.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub puuid: Option<String>,
    pub riot_id: Option<String>,
    pub year: i32,
}

/// Start building a wrapped summary
#[utoipa::path(
    post,
    path = "/api/wrapped/request",
    request_body = StartRequest,
    responses(
        (status = 202, description = "Job started, already running or already done", body = StartOutcome, example = json!({
            "puuid": "3f1c-puuid",
            "year": 2024,
            "jobId": "550e8400-e29b-41d4-a716-446655440000",
            "state": "FETCHING_MATCH_IDS"
        })),
        (status = 400, description = "Invalid riot id, platform or year", body = ApiError),
        (status = 404, description = "Riot id could not be resolved", body = ApiError),
        (status = 429, description = "Upstream rate limit exhausted", body = ApiError),
        (status = 502, description = "Upstream error", body = ApiError)
    ),
    tag = "wrapped"
)]
pub async fn request_wrapped(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartOutcome>), ApiError> {
    let Json(request) = payload?;
    let outcome = state.wrapped.start(request).await?;
    info!(puuid = %outcome.puuid, year = outcome.year, state = %outcome.state, "Wrapped request accepted");
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// Poll job progress
#[utoipa::path(
    get,
    path = "/api/wrapped/status",
    params(
        ("puuid" = Option<String>, Query, description = "Resolved player id"),
        ("riotId" = Option<String>, Query, description = "Display identifier, used when puuid is absent"),
        ("year" = i32, Query, description = "Year between 2020 and 2030")
    ),
    responses(
        (status = 200, description = "Job status or NOT_FOUND pseudo-state", body = WrappedStatus),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    ),
    tag = "wrapped"
)]
pub async fn wrapped_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<WrappedStatus>, ApiError> {
    let Query(query) = query?;
    validate_year(query.year)?;

    let puuid = query.puuid.filter(|p| !p.trim().is_empty());
    let status = match (puuid, query.riot_id) {
        (Some(puuid), _) => {
            state
                .wrapped
                .status(&JobKey::new(puuid.trim(), query.year))
                .await?
        }
        (None, Some(riot_id)) => state.wrapped.status_by_riot_id(&riot_id, query.year).await?,
        (None, None) => {
            return Err(validation_error(
                "either puuid or riotId is required",
                json!({ "puuid": "required without riotId" }),
            ));
        }
    };
    Ok(Json(status))
}

/// Read the year summary
#[utoipa::path(
    get,
    path = "/api/wrapped",
    params(
        ("puuid" = String, Query, description = "Resolved player id"),
        ("year" = i32, Query, description = "Year between 2020 and 2030")
    ),
    responses(
        (status = 200, description = "Summary document, or a NotReadySummary placeholder while the job runs", body = crate::summary::YearSummaryDocument),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    ),
    tag = "wrapped"
)]
pub async fn wrapped_result(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<SummaryResult>, ApiError> {
    let Query(query) = query?;
    let key = query.into_key()?;
    Ok(Json(state.wrapped.result(&key).await?))
}

/// Recompute the summary from cached matches
#[utoipa::path(
    post,
    path = "/api/wrapped/recompute",
    params(
        ("puuid" = String, Query, description = "Resolved player id"),
        ("year" = i32, Query, description = "Year between 2020 and 2030")
    ),
    responses(
        (status = 200, description = "Freshly computed summary", body = crate::summary::YearSummaryDocument),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    ),
    tag = "wrapped"
)]
pub async fn recompute_wrapped(
    State(state): State<AppState>,
    query: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let key = query.into_key()?;
    let document = state.wrapped.recompute(&key).await?;
    info!(key = %key, "Summary recomputed on request");
    Ok(Json(document))
}
