//! Utility functions for the APOD proxy

pub mod url;

pub use url::UrlUtils;
