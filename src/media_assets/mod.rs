//! Media downloads for cached APOD entries

pub mod fetcher;

pub use fetcher::{HttpMediaFetcher, MediaFetcher};
#[cfg(test)]
pub use fetcher::MockMediaFetcher;
