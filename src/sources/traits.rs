//! Upstream source trait definitions

use async_trait::async_trait;

use crate::errors::UpstreamResult;
use crate::models::{ApodDate, ApodRecord};

/// A provider of daily APOD records
///
/// One call is one best-effort attempt; implementations do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApodSource: Send + Sync {
    /// Fetch the record for `date`, or the provider's current entry when
    /// `date` is `None`
    async fn fetch(&self, date: Option<ApodDate>) -> UpstreamResult<ApodRecord>;

    /// Whether the source has the credentials it needs
    fn is_configured(&self) -> bool {
        true
    }
}
