//! # rastile-core
//!
//! Tiled pixel storage for 8-bit raster images.
//!
//! - [`TileManager`] - one image plane as a grid of lazily allocated
//!   [`Tile`]s, with optional mip levels
//! - [`PixelRegion`], [`Processor`] - rectangles over tiles or flat buffers,
//!   walked in lock-step in tile-aligned portions
//! - [`PixelSurround`] - W×H neighborhoods for resampling, with background
//!   substitution outside the image
//! - [`TileManager::crop`] - shrink to the non-transparent bounding box
//!
//! ## Locking
//!
//! Tile locks are an aliasing discipline, not a thread mutex. Guards borrow
//! the manager; a conflicting lock request panics. `TileManager` is `Send`
//! but not `Sync`.
//!
//! ```rust
//! use rastile_core::{PixelRegion, TileManager};
//!
//! let tiles = TileManager::new(256, 256, 4).unwrap();
//! let mut region = PixelRegion::new(&tiles, 60, 0, 10, 1, true).unwrap();
//! region.set_row(60, 0, 10, &[255; 40]);
//!
//! let mut row = [0u8; 40];
//! PixelRegion::full(&tiles, false).get_row(60, 0, 10, &mut row, 1);
//! assert_eq!(row, [255; 40]);
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//! rastile-core (this crate)
//!    ^
//!    +-- rastile-ops (transform, flip, rotate)
//!    +-- rastile-bench
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Serialize/Deserialize for [`Rect`], [`PixelLayout`] and
//!   [`TileConfig`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod crop;
pub mod error;
pub mod format;
pub mod pixel_region;
pub mod pixel_surround;
pub mod rect;
pub mod tile;
pub mod tile_manager;

pub use config::TileConfig;
pub use crop::Cropped;
pub use error::{Error, Result};
pub use format::{ImageBase, MAX_CHANNELS, OPAQUE_OPACITY, PixelLayout, TRANSPARENT_OPACITY};
pub use pixel_region::{PixelRegion, Portion, PortionBuf, Processor};
pub use pixel_surround::{PixelSurround, SurroundView};
pub use rect::{Bounds, Rect};
pub use tile::{Tile, TileGeometry, TileReadGuard, TileWriteGuard};
pub use tile_manager::{TileManager, TileRef, ValidateProc};
