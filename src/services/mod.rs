//! Service layer
//!
//! Holds the fetch-cache-serve pipeline, the on-disk cache it writes to and
//! the request rate limiter applied in front of it.

pub mod apod_cache;
pub mod apod_service;
pub mod rate_limiter;

pub use apod_cache::{ApodCacheStore, CacheEntry};
pub use apod_service::{ApodService, ServedApod};
pub use rate_limiter::{RateLimitExceeded, RateLimiter};
