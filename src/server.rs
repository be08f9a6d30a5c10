//! # Server Configuration
//!
//! Router, shared state and the HTTP serve loop for the wrapped service.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::telemetry::{REQUEST_ID_HEADER, TraceContext, with_trace_context};
use crate::wrapped::WrappedService;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub wrapped: Arc<WrappedService>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/resolve", get(handlers::resolve_riot_id))
        .route("/api/wrapped", get(handlers::wrapped_result))
        .route("/api/wrapped/request", post(handlers::request_wrapped))
        .route("/api/wrapped/status", get(handlers::wrapped_status))
        .route("/api/wrapped/recompute", post(handlers::recompute_wrapped))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(propagate_trace_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run each request inside its trace context and echo the id back.
async fn propagate_trace_id(request: Request, next: Next) -> Response {
    let context = TraceContext::from_headers(request.headers());
    let trace_id = context.trace_id.clone();

    let mut response = with_trace_context(context, next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Serve until `shutdown` resolves, then stop accepting connections and
/// finish in-flight requests.
pub async fn run_server<F>(
    config: Arc<AppConfig>,
    wrapped: Arc<WrappedService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr()?;
    let state = AppState {
        config: Arc::clone(&config),
        wrapped,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels `cancel` so rate-limit waits abort.
pub async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::resolve::resolve_riot_id,
        crate::handlers::wrapped::request_wrapped,
        crate::handlers::wrapped::wrapped_status,
        crate::handlers::wrapped::wrapped_result,
        crate::handlers::wrapped::recompute_wrapped,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::JobState,
            crate::error::ApiError,
            crate::riot::RiotAccount,
            crate::wrapped::StartRequest,
            crate::wrapped::StartOutcome,
            crate::wrapped::WrappedStatus,
            crate::wrapped::NotReadySummary,
            crate::summary::YearSummaryDocument,
            crate::summary::RankedEntry,
            crate::summary::GameHighlight,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "wrapped", description = "Per-player year summaries")
    ),
    info(
        title = "Wrapped API",
        description = "Builds per-player, per-year match history summaries",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
