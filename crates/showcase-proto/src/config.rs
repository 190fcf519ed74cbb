use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::platform;
use crate::error::ShowcaseError;
use crate::tile::Preload;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// Admission control for media loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Tiles allowed in the `loading` state at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub preload: Preload,
    /// What happens to a loaded tile once it scrolls away.
    #[serde(default)]
    pub on_exit: ExitPolicy,
    /// Abort queued and in-flight loads when their tile scrolls away.
    #[serde(default)]
    pub cancel_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Keep the decoded resource for fast re-entry.
    Retain,
    /// Drop full decode, come back with metadata.  Browsers hold decoder
    /// state and buffered media for as long as an element has a `src`, so
    /// the source is removed and the element reset.  Re-entry loads again,
    /// fetching only metadata under the default `preload`.  Tiles that
    /// finish loading after they left the viewport are released on
    /// completion.
    #[default]
    Release,
}

/// Viewport intersection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Fraction of a tile that must be inside the detection zone.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Pixels the detection zone extends past the viewport on every side.
    #[serde(default = "default_root_margin_px")]
    pub root_margin_px: u32,
    /// Minimum spacing between visibility batches.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionConfig {
    #[serde(default)]
    pub click: ClickMode,
}

/// What a click on the tile body does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    /// The body only plays; details have their own affordance.
    #[default]
    Split,
    /// Play when idle, open the detail page when already playing.
    Legacy,
}

/// Cloud substitution for tile sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Base URL the cloud files live under.  Substitution is off when unset.
    #[serde(default)]
    pub cloud_base_url: Option<String>,
    /// Hosts that keep local sources and get verbose diagnostics.
    #[serde(default = "default_local_hosts")]
    pub local_hosts: Vec<String>,
    /// `category -> id -> file name` under `cloud_base_url`.
    #[serde(default)]
    pub videos: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Level used on local-development hosts.
    #[serde(default = "default_verbose_level")]
    pub verbose_level: String,
    /// Level used everywhere else.
    #[serde(default = "default_quiet_level")]
    pub quiet_level: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            preload: Preload::default(),
            on_exit: ExitPolicy::default(),
            cancel_in_flight: false,
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            root_margin_px: default_root_margin_px(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl ObserverConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// CSS margin string for an intersection observer root.
    pub fn root_margin(&self) -> String {
        format!("{}px", self.root_margin_px)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cloud_base_url: None,
            local_hosts: default_local_hosts(),
            videos: BTreeMap::new(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            verbose_level: default_verbose_level(),
            quiet_level: default_quiet_level(),
        }
    }
}

fn default_max_concurrent() -> usize {
    2
}

fn default_threshold() -> f64 {
    0.1
}

fn default_root_margin_px() -> u32 {
    100
}

fn default_throttle_ms() -> u64 {
    100
}

fn default_local_hosts() -> Vec<String> {
    platform::DEFAULT_LOCAL_HOSTS
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_verbose_level() -> String {
    "debug".to_string()
}

fn default_quiet_level() -> String {
    "warn".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the JSON flavour used by the browser build.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ShowcaseError> {
        if self.loader.max_concurrent == 0 {
            return Err(ShowcaseError::InvalidConfig(
                "loader.max_concurrent must be at least 1".into(),
            ));
        }
        let t = self.observer.threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ShowcaseError::InvalidConfig(format!(
                "observer.threshold must be in (0, 1], got {}",
                t
            )));
        }
        if let Some(base) = &self.sources.cloud_base_url {
            if base.trim().is_empty() {
                return Err(ShowcaseError::InvalidConfig(
                    "sources.cloud_base_url is empty".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.loader.max_concurrent, 2);
        assert_eq!(config.loader.preload, Preload::Metadata);
        assert_eq!(config.loader.on_exit, ExitPolicy::Release);
        assert!(!config.loader.cancel_in_flight);
        assert_eq!(config.observer.root_margin(), "100px");
        assert_eq!(config.observer.throttle(), Duration::from_millis(100));
        assert_eq!(config.interaction.click, ClickMode::Split);
        assert!(config.sources.cloud_base_url.is_none());
        assert_eq!(config.sources.local_hosts, vec!["localhost", "127.0.0.1"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [loader]
            max_concurrent = 1
            on_exit = "retain"

            [interaction]
            click = "legacy"

            [sources]
            cloud_base_url = "https://cdn.example.com/u1"

            [sources.videos."家电"]
            "1" = "appliance-1.mp4"
            "#,
        )
        .unwrap();
        assert_eq!(config.loader.max_concurrent, 1);
        assert_eq!(config.loader.on_exit, ExitPolicy::Retain);
        assert_eq!(config.loader.preload, Preload::Metadata);
        assert_eq!(config.observer.threshold, 0.1);
        assert_eq!(config.interaction.click, ClickMode::Legacy);
        assert_eq!(config.sources.videos["家电"]["1"], "appliance-1.mp4");
        assert_eq!(config.sources.local_hosts.len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.loader.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.observer.threshold = 0.0;
        assert!(config.validate().is_err());
        config.observer.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.cloud_base_url = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config =
            Config::from_json(r#"{"loader":{"max_concurrent":3,"preload":"auto"}}"#).unwrap();
        assert_eq!(config.loader.max_concurrent, 3);
        assert_eq!(config.loader.preload, Preload::Auto);
        assert!(Config::from_json(r#"{"loader":{"max_concurrent":0}}"#).is_err());
    }
}
