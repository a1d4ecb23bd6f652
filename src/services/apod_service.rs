//! Fetch-cache-serve pipeline for APOD records
//!
//! A request for a date is answered from the cache when possible. On a miss
//! the record is fetched from the upstream source, its image downloaded and
//! both written to the cache. Download and storage failures only degrade the
//! result to the remote media URL; upstream failures end the request.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::apod_cache::{ApodCacheStore, CacheEntry};
use crate::config::API_KEY_ENV;
use crate::errors::{AppError, AppResult};
use crate::media_assets::MediaFetcher;
use crate::models::{ApodDate, ApodRecord};
use crate::sources::ApodSource;

/// A record ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct ServedApod {
    pub record: ApodRecord,
    /// Cached media file name, `None` when the page must link the remote URL
    pub media_file: Option<String>,
}

impl From<CacheEntry> for ServedApod {
    fn from(entry: CacheEntry) -> Self {
        Self {
            record: entry.record,
            media_file: entry.media_file,
        }
    }
}

/// How long the provider's answer for "today" stands in for our own date
const TODAY_ALIAS_TTL: Duration = Duration::from_secs(10 * 60);

/// The provider answered a request for `requested` (our today) with the
/// record of `served`, usually because it has not published yet
#[derive(Debug, Clone, Copy)]
struct TodayAlias {
    requested: NaiveDate,
    served: NaiveDate,
    recorded_at: Instant,
}

impl TodayAlias {
    fn resolve(&self, requested: NaiveDate, now: Instant) -> Option<NaiveDate> {
        (self.requested == requested
            && now.saturating_duration_since(self.recorded_at) < TODAY_ALIAS_TTL)
            .then_some(self.served)
    }
}

#[derive(Clone)]
pub struct ApodService {
    source: Arc<dyn ApodSource>,
    fetcher: Arc<dyn MediaFetcher>,
    cache: ApodCacheStore,
    today_alias: Arc<RwLock<Option<TodayAlias>>>,
}

impl ApodService {
    pub fn new(
        source: Arc<dyn ApodSource>,
        fetcher: Arc<dyn MediaFetcher>,
        cache: ApodCacheStore,
    ) -> Self {
        Self {
            source,
            fetcher,
            cache,
            today_alias: Arc::new(RwLock::new(None)),
        }
    }

    pub fn cache(&self) -> &ApodCacheStore {
        &self.cache
    }

    /// Serve the record for `date`, or the provider's current one
    pub async fn get(&self, date: Option<ApodDate>) -> AppResult<ServedApod> {
        if !self.source.is_configured() {
            return Err(AppError::configuration(format!("{API_KEY_ENV} is not set")));
        }

        let key = date.unwrap_or_else(ApodDate::today).as_naive();
        if let Some(entry) = self.cache.lookup(key).await {
            debug!("Cache hit for APOD {}", key);
            return Ok(self.complete(entry).await);
        }

        if date.is_none()
            && let Some(served) = self.aliased_today(key).await
            && let Some(entry) = self.cache.lookup(served).await
        {
            debug!("Serving APOD {} for today ({}) from cache", served, key);
            return Ok(self.complete(entry).await);
        }

        debug!("Cache miss for APOD {}, fetching upstream", key);
        let record = self.source.fetch(date).await?;

        if date.is_none() && record.date != key {
            *self.today_alias.write().await = Some(TodayAlias {
                requested: key,
                served: record.date,
                recorded_at: Instant::now(),
            });
        }

        // The provider may not have published our "today" yet and answers
        // with the previous day, which can already be cached
        if record.date != key
            && let Some(entry) = self.cache.lookup(record.date).await
        {
            debug!("Upstream answered with cached APOD {}", record.date);
            return Ok(self.complete(entry).await);
        }

        let media = self.download(&record).await;
        match self.cache.write(record.date, &record, media.as_deref()).await {
            Ok(entry) => Ok(entry.into()),
            Err(e) => {
                warn!("Serving APOD {} uncached: {}", record.date, e);
                Ok(ServedApod {
                    record,
                    media_file: None,
                })
            }
        }
    }

    async fn aliased_today(&self, today: NaiveDate) -> Option<NaiveDate> {
        let alias = *self.today_alias.read().await;
        alias.and_then(|alias| alias.resolve(today, Instant::now()))
    }

    /// Retry the media download for an entry cached without one
    async fn complete(&self, entry: CacheEntry) -> ServedApod {
        if !entry.needs_media() {
            return entry.into();
        }

        let date: NaiveDate = entry.date;
        let Some(bytes) = self.download(&entry.record).await else {
            return entry.into();
        };

        match self.cache.attach_media(date, &bytes).await {
            Ok(Some(updated)) => updated.into(),
            Ok(None) => entry.into(),
            Err(e) => {
                warn!("Failed to attach media to APOD {}: {}", date, e);
                entry.into()
            }
        }
    }

    async fn download(&self, record: &ApodRecord) -> Option<Vec<u8>> {
        if !record.media_type.is_downloadable() {
            return None;
        }

        match self.fetcher.download(&record.media_url).await {
            Ok(bytes) => {
                info!("Downloaded {} bytes of media for APOD {}", bytes.len(), record.date);
                Some(bytes)
            }
            Err(e) => {
                warn!("Linking remote media for APOD {}: {}", record.date, e);
                None
            }
        }
    }
}
