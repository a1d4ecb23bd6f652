use std::time::Duration;

/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Upstream provider defaults
pub const DEFAULT_APOD_BASE_URL: &str = "https://api.nasa.gov/planetary/apod";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(6);
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 25 * 1024 * 1024; // 25MB
pub const DEFAULT_REQUEST_HD: bool = true;

// Storage defaults
pub const DEFAULT_CACHE_PATH: &str = "./data/apod";

// Rate limiting defaults
pub const DEFAULT_RATE_LIMIT_ENABLED: bool = true;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 50;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_TRUST_FORWARDED_HEADERS: bool = false;

// Security header defaults
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str = "default-src 'self'; img-src 'self' data: https:; frame-src https://www.youtube.com https://www.youtube-nocookie.com https://player.vimeo.com; style-src 'self'; object-src 'none'; base-uri 'self'; frame-ancestors 'none'";
pub const DEFAULT_HSTS_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);
