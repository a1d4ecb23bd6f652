//! Web handlers module
//!
//! Handlers stay thin: the page handler asks the APOD service for a record
//! and hands the result to the renderer.

pub mod health;
pub mod index;
pub mod static_assets;
