//! Cache entry persisted as the per-date JSON sidecar

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ApodRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub date: NaiveDate,
    pub record: ApodRecord,
    /// Media file name relative to the cache directory
    #[serde(default)]
    pub media_file: Option<String>,
    /// Size of the media file in bytes, 0 without one
    #[serde(default)]
    pub content_length: u64,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(record: ApodRecord) -> Self {
        Self {
            date: record.date,
            record,
            media_file: None,
            content_length: 0,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_media(&self) -> bool {
        self.media_file.is_some()
    }

    /// Whether a download should still be attempted for this entry
    pub fn needs_media(&self) -> bool {
        !self.has_media() && self.record.media_type.is_downloadable()
    }
}
