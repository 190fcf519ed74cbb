//! Shared core for the product-showcase media tiles.
//!
//! Everything in here is platform-neutral: the browser binding
//! (`showcase-web`) and the headless simulator (`showcase-sim`) both drive the
//! same [`controller::Controller`] through the [`host::MediaHost`] trait.

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod manifest;
pub mod platform;
pub mod sources;
pub mod throttle;
pub mod tile;

pub use error::{Result, ShowcaseError};
