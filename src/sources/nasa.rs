//! NASA APOD API client

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, warn};

use super::traits::ApodSource;
use crate::config::ApodConfig;
use crate::errors::{AppError, AppResult, UpstreamError, UpstreamResult};
use crate::models::{ApodDate, ApodRecord, DATE_FORMAT, MediaType};
use crate::utils::UrlUtils;

const USER_AGENT: &str = concat!("apod-proxy/", env!("CARGO_PKG_VERSION"));

/// Longest provider error message carried into our own errors
const MAX_PROVIDER_MESSAGE: usize = 200;

/// Raw provider payload; every field is optional so that validation can
/// report exactly what was missing
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    date: Option<String>,
    title: Option<String>,
    explanation: Option<String>,
    url: Option<String>,
    hdurl: Option<String>,
    media_type: Option<String>,
    copyright: Option<String>,
}

/// Error body the provider sends with 4xx responses
#[derive(Debug, Deserialize)]
struct ProviderError {
    msg: Option<String>,
    error: Option<ProviderErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

/// Client for the public APOD endpoint
#[derive(Debug, Clone)]
pub struct NasaApodClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    hd: bool,
}

impl NasaApodClient {
    pub fn new(config: &ApodConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Use an existing reqwest client (shared connection pool)
    pub fn with_client(client: Client, config: &ApodConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            hd: config.hd,
        }
    }

    fn request_url(&self, date: Option<ApodDate>) -> UpstreamResult<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::unavailable(format!("Invalid provider URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(key) = &self.api_key {
                query.append_pair("api_key", key);
            }
            if self.hd {
                query.append_pair("hd", "true");
            }
            if let Some(date) = date {
                query.append_pair("date", &date.key());
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl ApodSource for NasaApodClient {
    async fn fetch(&self, date: Option<ApodDate>) -> UpstreamResult<ApodRecord> {
        let url = self.request_url(date)?;
        let safe_url = UrlUtils::obfuscate_credentials(url.as_str());
        debug!("Fetching APOD record from: {}", safe_url);

        let response = self.client.get(url).send().await.map_err(|e| {
            // reqwest errors embed the full URL, including the key
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                UrlUtils::obfuscate_credentials(&e.without_url().to_string())
            };
            warn!("APOD request to {} failed: {}", safe_url, message);
            UpstreamError::unavailable(message)
        })?;

        let status = response.status();
        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!("Provider rate limit remaining: {}", remaining);
        }

        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::unavailable(format!("Failed to read response: {}", e.without_url())))?;

        let payload: ProviderResponse = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::invalid_response(format!("Malformed JSON: {e}")))?;

        let record = parse_record(payload)?;
        debug!("Fetched APOD record for {} ({})", record.date, record.media_type);
        Ok(record)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Map a non-success response onto the upstream error kinds
async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        warn!("Provider rate limited us (retry after {:?}s)", retry_after);
        return UpstreamError::RateLimited { retry_after };
    }

    let detail = response
        .json::<ProviderError>()
        .await
        .ok()
        .and_then(|e| e.msg.or_else(|| e.error.and_then(|d| d.message)))
        .map(|m| truncate(&m, MAX_PROVIDER_MESSAGE))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    warn!("Provider returned HTTP {}: {}", status.as_u16(), detail);

    if status.is_server_error() {
        UpstreamError::unavailable(format!("HTTP {}: {}", status.as_u16(), detail))
    } else {
        UpstreamError::invalid_response(format!("HTTP {}: {}", status.as_u16(), detail))
    }
}

fn parse_record(payload: ProviderResponse) -> UpstreamResult<ApodRecord> {
    let raw_date = required(payload.date, "date")?;
    let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT)
        .map_err(|e| UpstreamError::invalid_response(format!("Invalid date '{raw_date}': {e}")))?;

    let media_type = MediaType::from_provider(payload.media_type.as_deref().unwrap_or("other"));

    let media_url = match media_type {
        MediaType::Image | MediaType::Video => {
            let url = required(payload.url, "url")?;
            check_web_url(&url)?;
            url
        }
        MediaType::Other => payload
            .url
            .filter(|u| check_web_url(u).is_ok())
            .unwrap_or_default(),
    };

    let hd_url = payload
        .hdurl
        .filter(|u| media_type == MediaType::Image && check_web_url(u).is_ok());

    Ok(ApodRecord {
        date,
        title: required(payload.title, "title")?,
        explanation: payload.explanation.unwrap_or_default().trim().to_string(),
        media_url,
        media_type,
        hd_url,
        copyright: payload
            .copyright
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    })
}

/// Media URLs end up in `src`/`href` attributes; only http(s) is allowed
fn check_web_url(value: &str) -> UpstreamResult<()> {
    let url = url::Url::parse(value)
        .map_err(|e| UpstreamError::invalid_response(format!("Invalid media url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UpstreamError::invalid_response(format!(
            "Unsupported media url scheme: {scheme}"
        ))),
    }
}

fn required(value: Option<String>, field: &str) -> UpstreamResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UpstreamError::invalid_response(format!("Missing field: {field}")))
}

fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> ProviderResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_image_record() {
        let record = parse_record(payload(
            r#"{
                "date": "2024-01-01",
                "title": "T",
                "explanation": " Some text ",
                "url": "http://x/img.jpg",
                "hdurl": "http://x/img_hd.jpg",
                "media_type": "image",
                "copyright": "\nSomeone\n",
                "service_version": "v1"
            }"#,
        ))
        .unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(record.title, "T");
        assert_eq!(record.explanation, "Some text");
        assert_eq!(record.media_url, "http://x/img.jpg");
        assert_eq!(record.media_type, MediaType::Image);
        assert_eq!(record.hd_url.as_deref(), Some("http://x/img_hd.jpg"));
        assert_eq!(record.copyright.as_deref(), Some("Someone"));
    }

    #[test]
    fn video_records_drop_hd_url() {
        let record = parse_record(payload(
            r#"{"date": "2024-01-02", "title": "V", "url": "https://www.youtube.com/embed/x",
                "hdurl": "https://www.youtube.com/embed/x", "media_type": "video"}"#,
        ))
        .unwrap();
        assert_eq!(record.media_type, MediaType::Video);
        assert!(record.hd_url.is_none());
    }

    #[test]
    fn other_records_tolerate_missing_url() {
        let record = parse_record(payload(
            r#"{"date": "2024-01-03", "title": "O", "media_type": "other"}"#,
        ))
        .unwrap();
        assert_eq!(record.media_type, MediaType::Other);
        assert!(record.media_url.is_empty());
    }

    #[test]
    fn missing_required_fields_are_invalid() {
        for json in [
            r#"{"title": "T", "url": "http://x/img.jpg", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "url": "http://x/img.jpg", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "title": "T", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "title": "  ", "url": "http://x/img.jpg", "media_type": "image"}"#,
            r#"{"date": "yesterday", "title": "T", "url": "http://x/img.jpg", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "title": "T", "url": "not a url", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "title": "T", "url": "javascript:alert(1)", "media_type": "image"}"#,
            r#"{"date": "2024-01-01", "title": "T", "url": "data:text/html,x", "media_type": "video"}"#,
        ] {
            let err = parse_record(payload(json)).unwrap_err();
            assert!(
                matches!(err, UpstreamError::InvalidResponse { .. }),
                "expected InvalidResponse for {json}, got {err:?}"
            );
        }
    }

    #[test]
    fn non_web_optional_urls_are_dropped() {
        let record = parse_record(payload(
            r#"{"date": "2024-01-01", "title": "T", "url": "https://x/img.jpg",
                "hdurl": "javascript:alert(1)", "media_type": "image"}"#,
        ))
        .unwrap();
        assert_eq!(record.hd_url, None);

        let record = parse_record(payload(
            r#"{"date": "2024-01-01", "title": "T", "url": "file:///etc/passwd", "media_type": "other"}"#,
        ))
        .unwrap();
        assert_eq!(record.media_url, "");
    }

    #[test]
    fn request_url_carries_key_date_and_hd() {
        let config = ApodConfig {
            api_key: Some("SECRET".to_string()),
            base_url: "https://api.example.test/planetary/apod".to_string(),
            ..ApodConfig::default()
        };
        let client = NasaApodClient::new(&config).unwrap();
        let date = ApodDate::parse("2024-01-01").unwrap();

        let url = client.request_url(Some(date)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("api_key".into(), "SECRET".into())));
        assert!(pairs.contains(&("hd".into(), "true".into())));
        assert!(pairs.contains(&("date".into(), "2024-01-01".into())));

        let url = client.request_url(None).unwrap();
        assert!(!url.as_str().contains("date="));
    }

    #[test]
    fn unconfigured_without_key() {
        let client = NasaApodClient::new(&ApodConfig::default()).unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn truncates_long_provider_messages() {
        let long = "x".repeat(300);
        let short = truncate(&long, 10);
        assert_eq!(short, format!("{}...", "x".repeat(10)));
        assert_eq!(truncate("short", 10), "short");
    }
}
