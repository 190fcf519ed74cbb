//! Scroll scenarios for the simulator.
//!
//! A scenario file is a tile manifest (`[[tile]]`) plus a `[media]` profile
//! describing how the fake network behaves and a list of timed `[[step]]`s:
//!
//! ```toml
//! seed = 7
//!
//! [media]
//! load_ms = [40, 400]
//! fail_rate = 0.1
//! autoplay_reject_rate = 0.2
//!
//! [[tile]]
//! category = "家电"
//! id = "1"
//! src = "videos/appliance/1.mp4"
//!
//! [[step]]
//! at_ms = 0
//! enter = ["家电/1"]
//!
//! [[step]]
//! at_ms = 800
//! exit = ["家电/1"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use showcase_proto::manifest::parse_tiles_from_toml_str;
use showcase_proto::tile::{TileKey, TileSpec};
use showcase_proto::ShowcaseError;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub seed: Option<u64>,
    pub media: MediaProfile,
    pub tiles: Vec<TileSpec>,
    pub steps: Vec<Step>,
    /// Quiet time after the last step before teardown.
    pub settle: Duration,
}

/// How the simulated network and browser behave.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaProfile {
    /// Inclusive range for load latency.
    #[serde(default = "default_load_ms")]
    pub load_ms: [u64; 2],
    /// Probability that a load ends in a network/decode error.
    #[serde(default)]
    pub fail_rate: f64,
    /// Probability that the autoplay policy refuses a play request.
    #[serde(default)]
    pub autoplay_reject_rate: f64,
    /// Inclusive range for play-promise settlement latency.
    #[serde(default = "default_play_ms")]
    pub play_ms: [u64; 2],
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            load_ms: default_load_ms(),
            fail_rate: 0.0,
            autoplay_reject_rate: 0.0,
            play_ms: default_play_ms(),
        }
    }
}

fn default_load_ms() -> [u64; 2] {
    [50, 300]
}

fn default_play_ms() -> [u64; 2] {
    [5, 30]
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_ratio() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(default)]
    pub enter: Vec<String>,
    #[serde(default)]
    pub exit: Vec<String>,
    /// Intersection ratio reported for tiles in `enter`.
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    /// Clicks on the tile body.
    #[serde(default)]
    pub click: Vec<String>,
    /// Clicks on the "view details" affordance.
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlScenario {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    media: MediaProfile,
    #[serde(default)]
    step: Vec<Step>,
    #[serde(default = "default_settle_ms")]
    settle_ms: u64,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let tiles = parse_tiles_from_toml_str(content)?;
        let raw: TomlScenario = toml::from_str(content)?;

        let mut steps = raw.step;
        steps.sort_by_key(|s| s.at_ms);

        let scenario = Self {
            seed: raw.seed,
            media: raw.media,
            tiles,
            steps,
            settle: Duration::from_millis(raw.settle_ms),
        };
        scenario.check_keys()?;
        Ok(scenario)
    }

    /// Every key a step mentions must name a tile.
    fn check_keys(&self) -> Result<(), ShowcaseError> {
        let known: Vec<TileKey> = self.tiles.iter().map(|t| t.key()).collect();
        for step in &self.steps {
            for raw in step
                .enter
                .iter()
                .chain(&step.exit)
                .chain(&step.click)
                .chain(&step.details)
            {
                match TileKey::parse(raw) {
                    Some(key) if known.contains(&key) => {}
                    _ => return Err(ShowcaseError::UnknownTile(raw.clone())),
                }
            }
        }
        Ok(())
    }
}
