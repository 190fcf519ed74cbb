//! Cloud substitution for tile sources.
//!
//! Pages ship with local `data-src` paths.  Outside local development those
//! are swapped for files on the video CDN before the controller reads them.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::SourcesConfig;
use crate::platform::HostEnv;
use crate::tile::TileSpec;

#[derive(Debug, Clone)]
pub struct SourceResolver {
    /// `None` disables substitution.
    base: Option<String>,
    videos: BTreeMap<String, BTreeMap<String, String>>,
}

impl SourceResolver {
    pub fn new(config: &SourcesConfig, env: &HostEnv) -> Self {
        let base = if env.is_local {
            None
        } else {
            config
                .cloud_base_url
                .as_deref()
                .map(|b| b.trim().trim_end_matches('/').to_string())
                .filter(|b| !b.is_empty())
        };
        Self {
            base,
            videos: config.videos.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base.is_some()
    }

    /// Cloud URL for `category/id`, or `None` when substitution is off.
    /// Unmapped tiles get a `default-{category}-{id}.mp4` file name.
    pub fn cloud_url(&self, category: &str, id: &str) -> Option<String> {
        let base = self.base.as_deref()?;
        let file = self
            .videos
            .get(category)
            .and_then(|ids| ids.get(id))
            .cloned()
            .unwrap_or_else(|| format!("default-{}-{}.mp4", category, id));
        Some(format!("{}/{}", base, file.trim_start_matches('/')))
    }

    /// Rewrite `src` on every tile in place.  Returns how many changed.
    pub fn apply(&self, tiles: &mut [TileSpec]) -> usize {
        if !self.is_enabled() {
            debug!("sources: substitution disabled, keeping local paths");
            return 0;
        }
        info!("sources: replacing local videos with cloud URLs");

        let mut replaced = 0;
        for (idx, tile) in tiles.iter_mut().enumerate() {
            if let Some(url) = self.cloud_url(&tile.category, &tile.id) {
                if url != tile.src {
                    info!("sources: video {}: {} -> {}", idx + 1, tile.src, url);
                    tile.src = url;
                    replaced += 1;
                }
            }
        }
        replaced
    }
}
