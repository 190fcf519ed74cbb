use thiserror::Error;

/// Errors surfaced by constructors and lifecycle calls.
///
/// Per-tile media failures are never reported through this type: they are
/// handled inside the controller and shown on the tile itself.
#[derive(Error, Debug)]
pub enum ShowcaseError {
    /// Two tiles share the same `category/id` key.
    #[error("duplicate tile {category}/{id}")]
    DuplicateTile { category: String, id: String },

    /// A `category/id` key that no tile carries.
    #[error("unknown tile {0}")]
    UnknownTile(String),

    /// Out-of-range or contradictory configuration values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `initialize()` called on a controller that already ran it.
    #[error("controller already initialized")]
    AlreadyInitialized,

    /// `teardown()` called before `initialize()`.
    #[error("controller was never initialized")]
    NotInitialized,

    /// Lifecycle call after `teardown()`.
    #[error("controller already torn down")]
    TornDown,

    /// Tile manifest could not be parsed.
    #[error("manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShowcaseError>;
