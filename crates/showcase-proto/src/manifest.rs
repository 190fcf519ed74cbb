// ── TOML tile manifest ───────────────────────────────────────────────────────
//
// Drivers without a DOM (the simulator, tests) describe the grid as a list of
// `[[tile]]` tables.  The intermediate structs keep the file schema separate
// from `TileSpec` so either can change without breaking the other.

use std::collections::HashSet;

use crate::error::{Result, ShowcaseError};
use crate::tile::TileSpec;

#[derive(Debug, serde::Deserialize)]
struct TomlTileFile {
    #[serde(default)]
    tile: Vec<TomlTile>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlTile {
    category: String,
    id: String,
    #[serde(default)]
    src: String,
}

pub fn load_tiles_from_toml(path: &std::path::Path) -> Result<Vec<TileSpec>> {
    let content = std::fs::read_to_string(path)?;
    parse_tiles_from_toml_str(&content)
}

pub fn parse_tiles_from_toml_str(content: &str) -> Result<Vec<TileSpec>> {
    let file: TomlTileFile = toml::from_str(content)?;
    let tiles: Vec<TileSpec> = file
        .tile
        .into_iter()
        .map(|t| TileSpec::new(t.category.trim(), t.id.trim(), t.src.trim()))
        .collect();
    ensure_unique(&tiles)?;
    Ok(tiles)
}

/// Tile keys must be unique within a page.
pub fn ensure_unique(tiles: &[TileSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for tile in tiles {
        if !seen.insert(tile.key()) {
            return Err(ShowcaseError::DuplicateTile {
                category: tile.category.clone(),
                id: tile.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let tiles = parse_tiles_from_toml_str(
            r#"
            [[tile]]
            category = "电脑"
            id = "1"
            src = "videos/computer/1.mp4"

            [[tile]]
            category = "电脑"
            id = "2"
            "#,
        )
        .unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].src, "videos/computer/1.mp4");
        assert_eq!(tiles[1].src, "");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = parse_tiles_from_toml_str(
            r#"
            [[tile]]
            category = "家电"
            id = "1"
            src = "a.mp4"

            [[tile]]
            category = "家电"
            id = "1"
            src = "b.mp4"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ShowcaseError::DuplicateTile { .. }));
    }

    #[test]
    fn test_empty_manifest() {
        assert!(parse_tiles_from_toml_str("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_manifest() {
        let err = parse_tiles_from_toml_str("[[tile]]\ncategory = 3").unwrap_err();
        assert!(matches!(err, ShowcaseError::Manifest(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("showcase-manifest-{}.toml", std::process::id()));
        std::fs::write(&path, "[[tile]]\ncategory = \"恒温杯\"\nid = \"3\"\nsrc = \"c.mp4\"\n").unwrap();
        let tiles = load_tiles_from_toml(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(tiles, vec![TileSpec::new("恒温杯", "3", "c.mp4")]);

        let missing = load_tiles_from_toml(std::path::Path::new("/nonexistent/showcase.toml"));
        assert!(matches!(missing, Err(ShowcaseError::Io(_))));
    }
}
