//! Request extractors
//!
//! Query parameters for the page route and the client identity used by the
//! rate limiter.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Query},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::models::ApodDate;

/// Identity used when neither headers nor the socket address are available
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Query string of the page route
///
/// Extraction never rejects: a repeated `date` keeps the last value and an
/// unparseable query string counts as empty.
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    pub date: Option<String>,
}

impl IndexQuery {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let date = pairs
            .into_iter()
            .filter(|(key, _)| key == "date")
            .map(|(_, value)| value)
            .last();
        Self { date }
    }

    /// Requested date; unparseable or out-of-range values mean "today"
    pub fn apod_date(&self) -> Option<ApodDate> {
        self.date.as_deref().and_then(ApodDate::parse)
    }
}

/// Request context information
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub real_ip: Option<String>,
    pub peer_addr: Option<SocketAddr>,
    pub request_id: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            user_agent: None,
            real_ip: None,
            peer_addr: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl RequestContext {
    pub fn from_parts(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> Self {
        let user_agent = headers
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Self {
            user_agent,
            real_ip: forwarded_ip(headers),
            peer_addr,
            ..Self::default()
        }
    }

    /// Rate limiting identity. Forwarded headers are client-controlled, so
    /// they only count when the deployment sits behind a trusted proxy.
    pub fn client_identity(&self, trust_forwarded_headers: bool) -> String {
        if trust_forwarded_headers && let Some(ip) = &self.real_ip {
            return ip.clone();
        }

        self.peer_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self::from_parts(&parts.headers, peer_addr))
    }
}

impl<S> FromRequestParts<S> for IndexQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| Self::from_pairs(pairs))
            .unwrap_or_default();
        Ok(query)
    }
}

/// First address from `X-Real-IP` or `X-Forwarded-For`
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
