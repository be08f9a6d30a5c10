//! # API Handlers
//!
//! HTTP endpoint handlers for the wrapped service.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod resolve;
pub mod wrapped;

pub use resolve::resolve_riot_id;
pub use wrapped::{recompute_wrapped, request_wrapped, wrapped_result, wrapped_status};

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
