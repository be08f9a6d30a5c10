//! Riot id lookup.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::riot::RiotAccount;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQuery {
    pub riot_id: String,
}

/// Resolve a `GameName#TAG` display identifier to its account
#[utoipa::path(
    get,
    path = "/api/resolve",
    params(
        ("riotId" = String, Query, description = "Display identifier, e.g. Ada%23EUW")
    ),
    responses(
        (status = 200, description = "Resolved account", body = RiotAccount),
        (status = 400, description = "Malformed riot id", body = ApiError),
        (status = 404, description = "No such account", body = ApiError),
        (status = 429, description = "Upstream rate limit exhausted", body = ApiError)
    ),
    tag = "wrapped"
)]
pub async fn resolve_riot_id(
    State(state): State<AppState>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Result<Json<RiotAccount>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.wrapped.resolve(&query.riot_id).await?))
}
