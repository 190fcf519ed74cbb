use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense runtime handle for a tile.  Assigned in page order when the
/// controller is built; hosts use it to address their media elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub usize);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a tile: unique per `category/id` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub category: String,
    pub id: String,
}

impl TileKey {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
        }
    }

    /// Parse the `category/id` shorthand used by scenario files.
    /// The id is everything after the last `/`.
    pub fn parse(s: &str) -> Option<Self> {
        let (category, id) = s.rsplit_once('/')?;
        let (category, id) = (category.trim(), id.trim());
        if category.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(category, id))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.id)
    }
}

/// Per-tile configuration as read from the page (or a manifest), after the
/// source resolver had its chance to rewrite `src`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSpec {
    pub category: String,
    pub id: String,
    /// Opaque and final by the time the controller sees it.
    pub src: String,
}

impl TileSpec {
    pub fn new(category: impl Into<String>, id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            src: src.into(),
        }
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.category.clone(), self.id.clone())
    }

    pub fn detail_route(&self) -> DetailRoute {
        DetailRoute {
            category: self.category.clone(),
            id: self.id.clone(),
        }
    }
}

/// Load state of one tile.
///
/// Transitions:
///   Unloaded -> Queued -> Loading -> Loaded | Error
///   Loaded -> Unloaded                  (release on scroll-out)
///   Queued | Loading -> Unloaded        (only with cancel-in-flight)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Unloaded,
    Queued,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn label(self) -> &'static str {
        match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Queued => "queued",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Error => "error",
        }
    }
}

/// Token handed to the host with every load.  Completion events must echo
/// it back; anything else is a leftover from a released source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadTicket(pub u64);

/// How much of the media the host should fetch before reporting ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preload {
    /// Headers and first frame only (`loadedmetadata`).
    #[default]
    Metadata,
    /// Let the browser buffer freely (`loadeddata`).
    Auto,
}

impl Preload {
    /// Value for the `preload` attribute of a media element.
    pub fn attribute(self) -> &'static str {
        match self {
            Preload::Metadata => "metadata",
            Preload::Auto => "auto",
        }
    }

    /// Media event that marks the tile as loaded under this policy.
    pub fn ready_event(self) -> &'static str {
        match self {
            Preload::Metadata => "loadedmetadata",
            Preload::Auto => "loadeddata",
        }
    }
}

/// Attributes every tile's media element carries once it has a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackAttributes {
    pub muted: bool,
    pub looped: bool,
    pub inline: bool,
    pub autoplay: bool,
}

impl PlaybackAttributes {
    /// Muted inline loop; playback is always started by the controller.
    pub const TILE: Self = Self {
        muted: true,
        looped: true,
        inline: true,
        autoplay: false,
    };
}

/// Everything the host needs to start fetching one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest<'a> {
    pub ticket: LoadTicket,
    pub src: &'a str,
    pub preload: Preload,
    pub attributes: PlaybackAttributes,
}

/// How a play request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayOutcome {
    Started,
    /// Refused by the autoplay policy; needs a user gesture.
    Rejected,
}

/// Detail page for a tile.  The path shape is a routing contract with the
/// rest of the site and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRoute {
    pub category: String,
    pub id: String,
}

impl DetailRoute {
    pub fn path(&self) -> String {
        format!("3D/{}/{}/1.html", self.category, self.id)
    }
}

impl fmt::Display for DetailRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// One viewport intersection edge as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub tile: TileId,
    pub is_intersecting: bool,
    /// Fraction of the tile inside the (margin-expanded) viewport.
    pub ratio: f64,
}

impl VisibilityChange {
    pub fn entered(tile: TileId) -> Self {
        Self {
            tile,
            is_intersecting: true,
            ratio: 1.0,
        }
    }

    pub fn exited(tile: TileId) -> Self {
        Self {
            tile,
            is_intersecting: false,
            ratio: 0.0,
        }
    }

    /// Whether this edge counts as "visible" for `threshold`.
    ///
    /// Observers report `is_intersecting == true` for any overlap, including
    /// the downward crossing of a non-zero threshold, so the ratio decides.
    /// The small slack absorbs the rounding browsers apply at the exact
    /// crossing point.
    pub fn is_visible(&self, threshold: f64) -> bool {
        self.is_intersecting && self.ratio + 1e-3 >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_route_path() {
        let spec = TileSpec::new("恒温杯", "3", "videos/cup-3.mp4");
        assert_eq!(spec.detail_route().path(), "3D/恒温杯/3/1.html");
    }

    #[test]
    fn test_tile_key_parse() {
        assert_eq!(TileKey::parse("家电/2"), Some(TileKey::new("家电", "2")));
        assert_eq!(
            TileKey::parse("a/b/c"),
            Some(TileKey::new("a/b", "c"))
        );
        assert_eq!(TileKey::parse("nokey"), None);
        assert_eq!(TileKey::parse("/1"), None);
        assert_eq!(TileKey::parse("cat/ "), None);
    }

    #[test]
    fn test_visibility_threshold() {
        let change = VisibilityChange {
            tile: TileId(0),
            is_intersecting: true,
            ratio: 0.05,
        };
        assert!(change.is_visible(0.05));
        assert!(!change.is_visible(0.3));
        assert!(!VisibilityChange::exited(TileId(0)).is_visible(0.0));
        assert!(VisibilityChange::entered(TileId(0)).is_visible(1.0));
    }

    #[test]
    fn test_preload_events() {
        assert_eq!(Preload::Metadata.ready_event(), "loadedmetadata");
        assert_eq!(Preload::Auto.attribute(), "auto");
    }
}
