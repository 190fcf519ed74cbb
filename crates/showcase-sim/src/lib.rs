//! Headless driver for the showcase controller: replays scroll scenarios
//! against simulated media elements with randomised latency and failures.

pub mod core;
pub mod host;
pub mod report;
pub mod scenario;

pub use crate::core::{spawn_script, SimCore, SimEvent};
pub use report::SimReport;
pub use scenario::Scenario;
