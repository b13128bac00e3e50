//! Tile geometry configuration.
//!
//! # Environment Variables
//!
//! - `RASTILE_TILE_SIZE` - square tile edge in pixels
//! - `RASTILE_TILE_WIDTH` - tile width, overrides `RASTILE_TILE_SIZE`
//! - `RASTILE_TILE_HEIGHT` - tile height, overrides `RASTILE_TILE_SIZE`
//!
//! Values that fail to parse or fall outside
//! [`MIN_TILE_SIZE`]..=[`MAX_TILE_SIZE`] are ignored with a warning.

use std::env;

use tracing::warn;

use crate::{Error, Result};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Smallest accepted tile edge.
pub const MIN_TILE_SIZE: u32 = 1;

/// Largest accepted tile edge.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Nominal tile dimensions used by a [`TileManager`](crate::TileManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TileConfig {
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
        }
    }
}

impl TileConfig {
    /// Creates a validated configuration.
    pub fn new(tile_width: u32, tile_height: u32) -> Result<Self> {
        let config = Self {
            tile_width,
            tile_height,
        };
        config.validate()?;
        Ok(config)
    }

    /// Square tiles.
    pub fn square(size: u32) -> Result<Self> {
        Self::new(size, size)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env_tile_dim("RASTILE_TILE_SIZE") {
            config.tile_width = size;
            config.tile_height = size;
        }
        if let Some(w) = env_tile_dim("RASTILE_TILE_WIDTH") {
            config.tile_width = w;
        }
        if let Some(h) = env_tile_dim("RASTILE_TILE_HEIGHT") {
            config.tile_height = h;
        }
        config
    }

    /// Checks both dimensions against the accepted range.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("width", self.tile_width), ("height", self.tile_height)] {
            if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&v) {
                return Err(Error::invalid_parameter(format!(
                    "tile {name} {v} outside {MIN_TILE_SIZE}..={MAX_TILE_SIZE}"
                )));
            }
        }
        Ok(())
    }
}

fn env_tile_dim(name: &str) -> Option<u32> {
    let raw = env::var(name).ok()?;
    match parse_tile_dim(&raw) {
        Some(v) => Some(v),
        None => {
            warn!(var = name, value = %raw, "ignoring invalid tile size override");
            None
        }
    }
}

fn parse_tile_dim(raw: &str) -> Option<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| (MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = TileConfig::default();
        assert_eq!((c.tile_width, c.tile_height), (64, 64));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(TileConfig::new(0, 64).is_err());
        assert!(TileConfig::new(64, MAX_TILE_SIZE + 1).is_err());
        assert_eq!(TileConfig::square(16).unwrap().tile_height, 16);
    }

    #[test]
    fn test_parse_tile_dim() {
        assert_eq!(parse_tile_dim(" 128 "), Some(128));
        assert_eq!(parse_tile_dim("0"), None);
        assert_eq!(parse_tile_dim("abc"), None);
        assert_eq!(parse_tile_dim("100000"), None);
    }
}
