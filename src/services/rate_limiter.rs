//! Per-client request rate limiting
//!
//! Each identity (client IP) keeps the timestamps of its requests inside the
//! current rolling window. A request is admitted while fewer than
//! `max_requests` timestamps remain in the window.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Identities tracked before expired ones are swept
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded for {identity}: {max} requests per {window:?}")]
pub struct RateLimitExceeded {
    pub identity: String,
    pub max: u32,
    pub window: Duration,
    /// Time until the oldest request in the window expires
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Whole seconds for the `Retry-After` header, never zero
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Key: client identity, Value: request instants inside the window
    requests: Arc<RwLock<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn trusts_forwarded_headers(&self) -> bool {
        self.config.trust_forwarded_headers
    }

    /// Record a request for `identity`, or reject it when the budget is spent
    pub async fn check(&self, identity: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(identity, Instant::now()).await
    }

    async fn check_at(&self, identity: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        if !self.config.enabled {
            return Ok(());
        }

        let window = self.config.window;
        let mut requests = self.requests.write().await;

        if requests.len() >= PRUNE_THRESHOLD && !requests.contains_key(identity) {
            Self::prune(&mut requests, now, window);
        }

        let timestamps = requests.entry(identity.to_string()).or_default();
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.config.max_requests as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return Err(RateLimitExceeded {
                identity: identity.to_string(),
                max: self.config.max_requests,
                window,
                retry_after,
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    fn prune(requests: &mut HashMap<String, VecDeque<Instant>>, now: Instant, window: Duration) {
        let before = requests.len();
        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < window)
        });
        debug!("Pruned {} idle rate limit identities", before - requests.len());
    }

    /// Identities currently tracked
    pub async fn tracked_identities(&self) -> usize {
        self.requests.read().await.len()
    }
}
