//! Caching web front end for NASA's Astronomy Picture of the Day
//!
//! A request for a date is served from the local cache when possible,
//! otherwise fetched from the APOD API, its image downloaded and cached, and
//! rendered through a compiled template.

pub mod assets;
pub mod config;
pub mod errors;
pub mod media_assets;
pub mod models;
pub mod renderer;
pub mod services;
pub mod sources;
pub mod utils;
pub mod web;
