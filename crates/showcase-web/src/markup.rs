//! The page markup the showcase binds to, and the pure parts of reading it.
//!
//! ```html
//! <body data-showcase-config='{"loader":{"max_concurrent":1}}'>
//!   <div class="video-container" data-category="家电" data-id="1"
//!        data-src="videos/appliance/1.mp4">
//!     <video class="video-player"></video>
//!     <div class="video-placeholder"></div>
//!     <div class="video-error">视频加载失败</div>
//!     <a class="video-details">查看详情</a>
//!   </div>
//! </body>
//! ```

use std::collections::HashSet;

use showcase_proto::config::{ClickMode, Config};
use showcase_proto::tile::{TileKey, TileSpec};
use tracing::warn;

pub const CONTAINER_SELECTOR: &str = ".video-container";
pub const PLAYER_SELECTOR: &str = "video.video-player";
pub const ERROR_SELECTOR: &str = ".video-error";
pub const PLACEHOLDER_SELECTOR: &str = ".video-placeholder";
pub const DETAILS_SELECTOR: &str = ".video-details";

/// Class carried by containers currently in the detection zone.
pub const ACTIVE_CLASS: &str = "visible";

pub const CATEGORY_ATTR: &str = "data-category";
pub const ID_ATTR: &str = "data-id";
pub const SRC_ATTR: &str = "data-src";
/// JSON config override on `<body>`.
pub const CONFIG_ATTR: &str = "data-showcase-config";
/// Written onto each managed container so observer entries map back to tiles.
pub const INDEX_ATTR: &str = "data-showcase-index";

/// Attributes read off one `.video-container`.
#[derive(Debug, Clone, Default)]
pub struct RawTile {
    pub category: Option<String>,
    pub id: Option<String>,
    pub src: Option<String>,
}

/// Turn containers into tile specs, paired with their position in the
/// container list.  Containers without a category or id are left alone, as
/// are repeats of a key already seen.  A missing `data-src` becomes an empty
/// source, which the controller reports as a load error.
pub fn collect_tiles(raw: Vec<RawTile>) -> Vec<(usize, TileSpec)> {
    let mut seen: HashSet<TileKey> = HashSet::new();
    let mut tiles = Vec::new();

    for (index, tile) in raw.into_iter().enumerate() {
        let (Some(category), Some(id)) = (non_empty(tile.category), non_empty(tile.id)) else {
            warn!("markup: container {} has no category/id, skipping", index + 1);
            continue;
        };
        let spec = TileSpec::new(category, id, tile.src.unwrap_or_default());
        if !seen.insert(spec.key()) {
            warn!("markup: duplicate tile {} at container {}, skipping", spec.key(), index + 1);
            continue;
        }
        tiles.push((index, spec));
    }
    tiles
}

/// Config from the `<body>` override, or defaults when absent or invalid.
pub fn config_from_attr(raw: Option<&str>) -> Config {
    let Some(json) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Config::default();
    };
    match Config::from_json(json) {
        Ok(config) => config,
        Err(e) => {
            warn!("markup: ignoring {}: {}", CONFIG_ATTR, e);
            Config::default()
        }
    }
}

/// Body-click dispatch for one container.  `Split` leaves navigation to the
/// details link, so a container without one falls back to `Legacy` to keep
/// its detail page reachable.
pub fn click_mode_for(configured: ClickMode, has_details: bool) -> ClickMode {
    match configured {
        ClickMode::Split if !has_details => ClickMode::Legacy,
        mode => mode,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
