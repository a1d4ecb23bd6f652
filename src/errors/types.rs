//! Error type definitions for the APOD proxy
//!
//! Errors are grouped by the layer that produces them. Storage and download
//! failures are recovered inside the pipeline and never become an
//! [`AppError`]; upstream, render and configuration failures end the request.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream APOD provider errors
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Template rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Errors raised while talking to the APOD provider
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Network failure, timeout or a 5xx from the provider
    #[error("Upstream unavailable: {message}")]
    Unavailable { message: String },

    /// The provider answered but the payload could not be used
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// The provider throttled us (HTTP 429)
    #[error("Rate limited by provider{}", retry_after.map(|s| format!(" - retry after {s} seconds")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },
}

/// Errors raised while downloading media referenced by a record
#[derive(Error, Debug)]
pub enum MediaError {
    /// Transport failure, non-2xx status or an oversized body
    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },
}

/// Errors raised by the on-disk cache
#[derive(Error, Debug)]
pub enum StorageError {
    /// The cache location could not be created or written
    #[error("Cache path not writable: {path:?} - {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sidecar could not be (de)serialized
    #[error("Cache metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Errors raised by the template engine
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl UpstreamError {
    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Message shown to visitors; never includes provider URLs or keys
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "Failed to contact the NASA APOD service.",
            Self::InvalidResponse { .. } => "The NASA APOD service returned an unexpected response.",
            Self::RateLimited { .. } => {
                "The NASA APOD service is throttling requests. Please try again later."
            }
        }
    }
}

impl MediaError {
    /// Create a download error
    pub fn download<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl StorageError {
    /// Wrap an io error for the given path
    pub fn not_writable<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::NotWritable {
            path: path.into(),
            source,
        }
    }
}
