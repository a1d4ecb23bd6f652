//! Domain models

pub mod apod;

pub use apod::*;
