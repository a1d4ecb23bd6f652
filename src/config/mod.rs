use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Environment variable holding the provider API key
pub const API_KEY_ENV: &str = "NASA_API_KEY";
/// Environment variable holding the session signing secret
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "APOD_CACHE_DIR";
/// Prefix for every other environment override (`APOD_WEB__PORT=9000`)
pub const ENV_PREFIX: &str = "APOD_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub apod: ApodConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLS is enabled when both paths are provided
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApodConfig {
    /// Provider API key; pages render a configuration error while unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
    /// Upper bound for a single media download
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: u64,
    /// Ask the provider for the HD url alongside the regular one
    #[serde(default = "default_request_hd")]
    pub hd: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests allowed per identity within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window", with = "duration_serde")]
    pub window: Duration,
    /// Use X-Forwarded-For / X-Real-IP as the identity (only behind a proxy)
    #[serde(default = "default_trust_forwarded_headers")]
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Session signing secret. Nothing in the request path signs sessions yet.
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_content_security_policy")]
    pub content_security_policy: String,
    /// Only sent when TLS is enabled
    #[serde(default = "default_hsts_max_age", with = "duration_serde")]
    pub hsts_max_age: Duration,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Upstream defaults
fn default_base_url() -> String {
    DEFAULT_APOD_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_max_media_bytes() -> u64 {
    DEFAULT_MAX_MEDIA_BYTES
}

fn default_request_hd() -> bool {
    DEFAULT_REQUEST_HD
}

// Storage defaults
fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

// Rate limit defaults
fn default_rate_limit_enabled() -> bool {
    DEFAULT_RATE_LIMIT_ENABLED
}

fn default_max_requests() -> u32 {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

fn default_window() -> Duration {
    DEFAULT_RATE_LIMIT_WINDOW
}

fn default_trust_forwarded_headers() -> bool {
    DEFAULT_TRUST_FORWARDED_HEADERS
}

// Security defaults
fn default_content_security_policy() -> String {
    DEFAULT_CONTENT_SECURITY_POLICY.to_string()
}

fn default_hsts_max_age() -> Duration {
    DEFAULT_HSTS_MAX_AGE
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
        }
    }
}

impl Default for ApodConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            max_media_bytes: default_max_media_bytes(),
            hd: default_request_hd(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_max_requests(),
            window: default_window(),
            trust_forwarded_headers: default_trust_forwarded_headers(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            content_security_policy: default_content_security_policy(),
            hsts_max_age: default_hsts_max_age(),
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file (when present) and `APOD_` environment
    /// overrides, then the bare provider variables on top.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if Path::new(config_file).exists() {
            info!("Loading configuration file: {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            info!("No configuration file at {}, using defaults", config_file);
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Invalid configuration (file: {config_file})"))?;
        config.apply_env_shortcuts();
        config.validate()?;

        Ok(config)
    }

    /// The provider variables use their conventional names rather than the
    /// `APOD_` scheme.
    fn apply_env_shortcuts(&mut self) {
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.apod.api_key = Some(key);
        }
        if let Some(secret) = non_empty_env(SECRET_KEY_ENV) {
            self.security.secret_key = Some(secret);
        }
        if let Some(dir) = non_empty_env(CACHE_DIR_ENV) {
            self.storage.cache_path = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                bail!("rate_limit.max_requests must be greater than 0 when rate limiting is enabled");
            }
            if self.rate_limit.window.is_zero() {
                bail!("rate_limit.window must be greater than 0 when rate limiting is enabled");
            }
        }

        url::Url::parse(&self.apod.base_url)
            .with_context(|| format!("apod.base_url is not a valid URL: {}", self.apod.base_url))?;

        if let Some(tls) = &self.web.tls {
            for path in [&tls.cert_path, &tls.key_path] {
                if !path.exists() {
                    bail!("TLS file does not exist: {}", path.display());
                }
            }
        }

        if self.apod.api_key.is_none() {
            warn!("{} is not set; pages will show a configuration error", API_KEY_ENV);
        }
        if self.security.secret_key.is_none() {
            warn!("{} is not set", SECRET_KEY_ENV);
        }

        Ok(())
    }

    pub fn tls_enabled(&self) -> bool {
        self.web.tls.is_some()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
