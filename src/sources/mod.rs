//! Upstream record sources
//!
//! The pipeline only sees the [`ApodSource`] trait; [`NasaApodClient`] is the
//! production implementation backed by the public APOD API.

pub mod nasa;
pub mod traits;

pub use nasa::NasaApodClient;
pub use traits::ApodSource;
#[cfg(test)]
pub use traits::MockApodSource;
