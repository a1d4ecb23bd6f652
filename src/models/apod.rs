use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The first day the provider published a picture
pub const FIRST_APOD_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1995, 6, 16) {
    Some(date) => date,
    None => panic!("invalid first APOD date"),
};

/// The provider rolls over to a new picture at midnight US Eastern time
pub const PROVIDER_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Wire format for dates in query strings, file names and the provider API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    /// Interactive pages and other one-off formats
    Other,
}

impl MediaType {
    pub fn from_provider(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            _ => MediaType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Other => "other",
        }
    }

    /// Only images are downloaded; videos are embedded from their host
    pub fn is_downloadable(&self) -> bool {
        matches!(self, MediaType::Image)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Astronomy Picture of the Day entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApodRecord {
    pub date: NaiveDate,
    pub title: String,
    pub explanation: String,
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

/// A date the provider can serve: between the first APOD and the
/// provider's today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApodDate(NaiveDate);

impl ApodDate {
    pub fn new(date: NaiveDate) -> Option<Self> {
        Self::new_relative_to(date, provider_today())
    }

    pub fn new_relative_to(date: NaiveDate, today: NaiveDate) -> Option<Self> {
        (date >= FIRST_APOD_DATE && date <= today).then_some(Self(date))
    }

    /// Parse a `YYYY-MM-DD` query value. Anything unparseable or out of
    /// range yields `None`, which callers treat as "today".
    pub fn parse(value: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()?;
        Self::new(date)
    }

    pub fn today() -> Self {
        Self(provider_today())
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Cache key / file stem
    pub fn key(&self) -> String {
        self.0.format(DATE_FORMAT).to_string()
    }
}

fn provider_today() -> NaiveDate {
    Utc::now().with_timezone(&PROVIDER_TIMEZONE).date_naive()
}

impl fmt::Display for ApodDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}
