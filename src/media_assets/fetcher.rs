use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ApodConfig;
use crate::errors::{AppError, AppResult, MediaError};
use crate::utils::UrlUtils;

const USER_AGENT: &str = concat!("apod-proxy/", env!("CARGO_PKG_VERSION"));

/// Downloads the binary media a record points at
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}

#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpMediaFetcher {
    pub fn new(config: &ApodConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: config.max_media_bytes,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        let fail = |message: String| {
            warn!("Media download from {} failed: {}", safe_url, message);
            MediaError::download(safe_url.clone(), message)
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(fail(format!(
                "Media too large: {length} bytes (max {})",
                self.max_bytes
            )));
        }

        // Content-Length can be absent or wrong, so the cap is enforced on
        // the bytes actually received too
        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?
        {
            if data.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(fail(format!("Media too large (max {} bytes)", self.max_bytes)));
            }
            data.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes from {}", data.len(), safe_url);
        Ok(data)
    }
}
