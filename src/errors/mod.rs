//! Centralized error handling for the APOD proxy
//!
//! # Error Categories
//!
//! - **Upstream Errors**: provider unreachable, malformed payloads, throttling
//! - **Media Errors**: downloading the picture referenced by a record
//! - **Storage Errors**: writing the local cache
//! - **Render Errors**: template failures
//!
//! Media and storage errors are recovered inside the pipeline; only the
//! upstream, render and configuration classes reach [`AppError`].
//!
//! # Usage
//!
//! ```rust
//! use apod_proxy::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for upstream Results
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Convenience type alias for storage Results
pub type StorageResult<T> = Result<T, StorageError>;

impl AppError {
    /// HTTP status used when this error ends a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(UpstreamError::RateLimited { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text for the error page; internal details stay in the logs
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Upstream(e) => e.user_message(),
            AppError::Configuration { .. } => {
                "The NASA APOD service is not configured. Set NASA_API_KEY and restart."
            }
            AppError::Render(_) => "Something went wrong while preparing this page.",
        }
    }

    /// Seconds the provider asked us to wait, if it said
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::Upstream(UpstreamError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

/// Last-resort conversion; the page handlers render their own error pages,
/// so this only fires when even that failed.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>500 Internal Server Error</h1>".to_string()),
        )
            .into_response()
    }
}
