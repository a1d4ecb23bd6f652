//! On-disk cache of APOD records and their media
//!
//! Each date owns a JSON sidecar in the cache directory holding the
//! [`CacheEntry`] and, for images, a downloaded file under `media/`. The
//! sidecar is written last, so a sidecar on disk always refers to a complete
//! media file. An in-memory index mirrors the sidecars and is filled lazily.

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::ApodCacheStore;
