//! # Error Handling
//!
//! Typed errors for the store and service layers, plus the unified
//! problem+json `ApiError` returned by HTTP handlers with trace ID propagation.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::JobState;
use crate::riot::RiotError;
use crate::telemetry;
use crate::worker_pool::PoolClosed;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Trace ID of the current request, or a generated correlation ID outside one
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Detects unique-constraint violations on Postgres and SQLite.
pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code_str = code.as_ref();
        code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str)
    })
}

/// Errors raised by the persistence stores.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} not found for {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("corrupt {entity} record: {reason}")]
    CorruptRecord { entity: &'static str, reason: String },
}

/// Errors raised by the wrapped service, the ingestion pipeline and the aggregator.
#[derive(Debug, Error)]
pub enum WrappedError {
    #[error("year must be between {min} and {max}, got {year}")]
    InvalidYear { year: i32, min: i32, max: i32 },

    #[error("platform must not be blank")]
    InvalidPlatform,

    #[error(transparent)]
    Riot(#[from] RiotError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("illegal job transition from {from} to {to}")]
    IllegalTransition { from: JobState, to: JobState },

    #[error("job interrupted while rate-limited")]
    Interrupted,

    #[error(transparent)]
    PoolClosed(#[from] PoolClosed),

    #[error("failed to serialize summary: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Too Many Requests")]
    TooManyRequests,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Bad Gateway")]
    BadGateway,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "VALIDATION_FAILED",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::TooManyRequests => "RATE_LIMITED",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::BadGateway => "PROVIDER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// API error of this type with a specific message
    pub fn with_message(self, message: impl Into<String>) -> ApiError {
        let message: String = message.into();
        ApiError::new(self.status_code(), self.error_code(), &message)
    }
}

/// Details of a failed upstream call
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpstreamError {
    /// Upstream API name
    pub upstream: String,
    /// HTTP status code from upstream (0 when no response was received)
    pub status: u16,
    /// Response body snippet from upstream (truncated)
    pub body_snippet: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

// Error mappers for common sources

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        let message = error_type.to_string();
        error_type.with_message(message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        ErrorType::BadRequest.with_message(message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ErrorType::BadRequest
            .with_message(format!("Invalid query parameters: {}", rejection.body_text()))
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return ErrorType::Conflict.with_message("Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                ErrorType::NotFound.with_message(format!("Record not found: {}", record))
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                ErrorType::ServiceUnavailable.with_message("Database service unavailable")
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                ErrorType::InternalServerError.with_message("Database error occurred")
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(db_err) => db_err.into(),
            RepositoryError::NotFound { entity, key } => {
                ErrorType::NotFound.with_message(format!("{} not found for {}", entity, key))
            }
            other => {
                tracing::error!(error = %other, "Repository error");
                ErrorType::InternalServerError.with_message("Stored data could not be read")
            }
        }
    }
}

impl From<RiotError> for ApiError {
    fn from(error: RiotError) -> Self {
        match error {
            RiotError::InvalidIdentifierFormat { .. } => validation_error(
                &error.to_string(),
                json!({ "riotId": "must be in format GameName#TAG" }),
            ),
            RiotError::ResolutionFailed { .. } => ErrorType::NotFound.with_message(error.to_string()),
            RiotError::RateLimited { retry_after_secs }
            | RiotError::RateLimitExhausted {
                retry_after_secs, ..
            } => ErrorType::TooManyRequests
                .with_message("Upstream rate limit exhausted")
                .with_retry_after(retry_after_secs),
            RiotError::Http { status, body } => upstream_error(status, Some(body)),
            other => {
                tracing::warn!(error = %other, "Upstream request failed");
                upstream_error(0, Some(other.to_string()))
            }
        }
    }
}

impl From<WrappedError> for ApiError {
    fn from(error: WrappedError) -> Self {
        match error {
            WrappedError::InvalidYear { year, min, max } => validation_error(
                &format!("year must be between {} and {}", min, max),
                json!({ "year": year }),
            ),
            WrappedError::InvalidPlatform => validation_error(
                "platform must not be blank",
                json!({ "platform": "required" }),
            ),
            WrappedError::Riot(riot_err) => riot_err.into(),
            WrappedError::Repository(repo_err) => repo_err.into(),
            WrappedError::IllegalTransition { from, to } => ErrorType::Conflict
                .with_message(format!("job cannot move from {} to {}", from, to)),
            WrappedError::Interrupted | WrappedError::PoolClosed(_) => {
                ErrorType::ServiceUnavailable.into()
            }
            WrappedError::Serialization(err) => {
                tracing::error!(error = %err, "Summary serialization failed");
                ErrorType::InternalServerError.into()
            }
        }
    }
}

/// 502 for an upstream failure, with a truncated body snippet
pub fn upstream_error(status: u16, body: Option<String>) -> ApiError {
    let upstream = UpstreamError {
        upstream: "riot".to_string(),
        status,
        body_snippet: body.map(|b| {
            if b.chars().count() > 200 {
                let truncated: String = b.chars().take(200).collect();
                format!("{}...", truncated)
            } else {
                b
            }
        }),
    };

    ErrorType::BadGateway
        .with_message(format!("Riot API returned error status {}", status))
        .with_details(json!(upstream))
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ErrorType::BadRequest
        .with_message(message)
        .with_details(field_errors)
}
