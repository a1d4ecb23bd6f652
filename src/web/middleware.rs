//! HTTP middleware
//!
//! Request logging, per-client rate limiting and security headers.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, RETRY_AFTER, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

use super::{AppState, extractors::RequestContext};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::ApodDate;
use crate::renderer::PageRenderer;

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Request logging middleware
///
/// Logs all incoming requests with timing information
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    // Generate request ID for tracing
    let request_id = uuid::Uuid::new_v4().to_string();

    info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "HTTP request started"
    );

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}

/// Rate limiting middleware
///
/// Rejects clients that spent their request budget with 429 before the
/// handler runs.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.rate_limiter.is_enabled() {
        return next.run(request).await;
    }

    let peer_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let context = RequestContext::from_parts(request.headers(), peer_addr);
    let identity = context.client_identity(state.rate_limiter.trusts_forwarded_headers());

    match state.rate_limiter.check(&identity).await {
        Ok(()) => next.run(request).await,
        Err(exceeded) => {
            warn!(
                identity = %identity,
                retry_after = exceeded.retry_after_secs(),
                "Rate limit exceeded"
            );

            let body = PageRenderer::render_error(
                "Too many requests. Please slow down and try again shortly.",
                ApodDate::today().as_naive(),
            )
            .unwrap_or_else(|_| "Too many requests".to_string());

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Html(body)).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(exceeded.retry_after_secs()));
            response
        }
    }
}

/// Fixed response headers, built once from configuration
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: HeaderMap,
}

impl SecurityHeaders {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            PERMISSIONS_POLICY,
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        );

        let csp = HeaderValue::from_str(&config.security.content_security_policy).map_err(|e| {
            AppError::configuration(format!("Invalid content_security_policy: {e}"))
        })?;
        headers.insert(CONTENT_SECURITY_POLICY, csp);

        // Browsers ignore HSTS over plain HTTP
        if config.tls_enabled() {
            let hsts = format!(
                "max-age={}; includeSubDomains",
                config.security.hsts_max_age.as_secs()
            );
            let value = HeaderValue::from_str(&hsts)
                .map_err(|e| AppError::configuration(format!("Invalid HSTS header: {e}")))?;
            headers.insert(STRICT_TRANSPORT_SECURITY, value);
        }

        Ok(Self { headers })
    }

    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Security headers middleware
///
/// Adds security-related headers to every response
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    state.security_headers.apply(response.headers_mut());
    response
}
