//! Tiled, mip-mapped pixel storage.
//!
//! A [`TileManager`] holds one image plane as a grid of [`Tile`]s per mip
//! level. Level 0 has the declared size; each further level halves both
//! dimensions (rounding up) until a level fits in one tile.
//!
//! # Lifecycle
//!
//! ```text
//! EMPTY ── lock ──► VALID ── read lock ×N ──► VALID
//!   │                 │
//!   └── write lock ───┴──► VALID (dirty) ── invalidates mip tiles above
//! ```
//!
//! Tiles are allocated on first lock. An invalid tile is handed to the
//! [`ValidateProc`] (if one is installed) before the lock is granted.
//!
//! # Ownership
//!
//! Tiles are owned by the manager's arena and addressed by
//! `(level, col, row)`. Lock guards borrow the manager, so it cannot be
//! dropped or re-levelled while a tile is locked.
//!
//! ```rust
//! use rastile_core::TileManager;
//!
//! let mut tiles = TileManager::new(300, 200, 4).unwrap();
//! assert_eq!(tiles.max_levels(), 4);
//! tiles.set_nlevels(3);
//! assert_eq!((tiles.level_width(2), tiles.level_height(2)), (75, 50));
//!
//! assert!(tiles.write_pixel(10, 10, &[255, 0, 0, 255]));
//! let mut px = [0u8; 4];
//! assert!(tiles.read_pixel(10, 10, &mut px));
//! assert_eq!(px, [255, 0, 0, 255]);
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::config::TileConfig;
use crate::format::MAX_CHANNELS;
use crate::rect::{Bounds, Rect};
use crate::tile::{Tile, TileGeometry, TileReadGuard, TileSlot, TileWriteGuard};
use crate::{Error, Result};

/// Fills invalid tiles on first access.
///
/// Invoked with the manager, the (allocated, write-locked) tile and its
/// level. The callback may read other tiles of the same manager, for
/// example the level below when building mips, but must not lock the tile
/// it is validating.
///
/// Closures of the right shape implement this trait:
///
/// ```rust
/// use rastile_core::{Tile, TileManager};
///
/// let mut tiles = TileManager::new(8, 8, 1).unwrap();
/// tiles.set_validate_proc(|_: &TileManager, tile: &mut Tile, _level: usize| {
///     tile.fill(&[42]);
/// });
/// assert_eq!(tiles.read_tile(0, 3, 3).unwrap().pixel(3, 3), &[42]);
/// ```
pub trait ValidateProc: Send {
    /// Fills `tile`.
    fn validate(&self, tiles: &TileManager, tile: &mut Tile, level: usize);
}

impl<F> ValidateProc for F
where
    F: Fn(&TileManager, &mut Tile, usize) + Send,
{
    fn validate(&self, tiles: &TileManager, tile: &mut Tile, level: usize) {
        self(tiles, tile, level)
    }
}

struct Level {
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
    slots: Vec<TileSlot>,
}

impl Level {
    fn new(level: usize, width: u32, height: u32, config: &TileConfig, bpp: u32) -> Self {
        let (tw, th) = (config.tile_width, config.tile_height);
        let cols = width.div_ceil(tw);
        let rows = height.div_ceil(th);
        let mut slots = Vec::with_capacity(cols as usize * rows as usize);
        for row in 0..rows {
            for col in 0..cols {
                let x = col * tw;
                let y = row * th;
                let geom = TileGeometry {
                    level,
                    col,
                    row,
                    x,
                    y,
                    width: tw.min(width - x),
                    height: th.min(height - y),
                };
                slots.push(TileSlot::new(geom, bpp));
            }
        }
        Self {
            width,
            height,
            cols,
            rows,
            slots,
        }
    }

    #[inline]
    fn slot(&self, col: u32, row: u32) -> Option<&TileSlot> {
        if col < self.cols && row < self.rows {
            self.slots.get((row * self.cols + col) as usize)
        } else {
            None
        }
    }
}

/// Unlocked handle to one tile slot.
///
/// Reports geometry and bookkeeping bits without allocating, and locks the
/// tile on request.
#[derive(Clone, Copy)]
pub struct TileRef<'a> {
    manager: &'a TileManager,
    slot: &'a TileSlot,
}

impl<'a> TileRef<'a> {
    /// Position and extent.
    #[inline]
    pub fn geometry(&self) -> TileGeometry {
        self.slot.geom
    }

    /// Effective width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.slot.geom.width
    }

    /// Effective height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.slot.geom.height
    }

    /// Whether the tile holds current data.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.slot.valid.get()
    }

    /// Whether the tile was released dirty since the last
    /// [`TileManager::clear_dirty`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.slot.dirty.get()
    }

    /// Whether the pixel buffer exists.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.slot.allocated.get()
    }

    /// Whether any lock is held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.slot.is_locked()
    }

    /// Acquires a read lock.
    pub fn read(&self) -> TileReadGuard<'a> {
        self.manager.acquire_read(self.slot)
    }

    /// Acquires a write lock.
    pub fn write(&self) -> TileWriteGuard<'a> {
        self.manager.acquire_write(self.slot)
    }
}

impl fmt::Debug for TileRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRef")
            .field("geom", &self.slot.geom)
            .field("valid", &self.is_valid())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Tiled pixel storage for one image plane.
pub struct TileManager {
    width: u32,
    height: u32,
    bpp: u32,
    config: TileConfig,
    levels: Vec<Level>,
    max_levels: usize,
    offset_x: i32,
    offset_y: i32,
    validate: Option<Box<dyn ValidateProc>>,
}

impl TileManager {
    /// Creates a manager with the default 64x64 tiles.
    ///
    /// Width, height and bpp must be non-zero and bpp at most 4.
    pub fn new(width: u32, height: u32, bpp: u32) -> Result<Self> {
        Self::with_config(width, height, bpp, TileConfig::default())
    }

    /// Creates a manager whose tile size honours the `RASTILE_TILE_*`
    /// environment overrides.
    pub fn from_env(width: u32, height: u32, bpp: u32) -> Result<Self> {
        Self::with_config(width, height, bpp, TileConfig::from_env())
    }

    /// Creates a manager with explicit tile geometry.
    pub fn with_config(width: u32, height: u32, bpp: u32, config: TileConfig) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_dimensions(width, height, "zero-sized plane"));
        }
        if bpp == 0 || bpp as usize > MAX_CHANNELS {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("bytes per pixel {bpp} outside 1..={MAX_CHANNELS}"),
            ));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(Error::invalid_dimensions(width, height, "exceeds i32 range"));
        }
        config.validate()?;

        let max_levels = level_count(width, height, &config);
        debug!(
            width,
            height,
            bpp,
            tile_width = config.tile_width,
            tile_height = config.tile_height,
            max_levels,
            "TileManager::new"
        );

        Ok(Self {
            width,
            height,
            bpp,
            config,
            levels: vec![Level::new(0, width, height, &config, bpp)],
            max_levels,
            offset_x: 0,
            offset_y: 0,
            validate: None,
        })
    }

    /// Creates an empty manager with the same size, bpp, tile geometry and
    /// offsets as `self`.
    pub fn new_like(&self) -> Self {
        let mut tiles = Self {
            width: self.width,
            height: self.height,
            bpp: self.bpp,
            config: self.config,
            levels: vec![Level::new(0, self.width, self.height, &self.config, self.bpp)],
            max_levels: self.max_levels,
            offset_x: 0,
            offset_y: 0,
            validate: None,
        };
        tiles.set_offsets(self.offset_x, self.offset_y);
        tiles
    }

    /// Level-0 width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Level-0 height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    /// Tile geometry.
    #[inline]
    pub fn config(&self) -> TileConfig {
        self.config
    }

    /// Nominal tile width.
    #[inline]
    pub fn tile_width(&self) -> u32 {
        self.config.tile_width
    }

    /// Nominal tile height.
    #[inline]
    pub fn tile_height(&self) -> u32 {
        self.config.tile_height
    }

    /// Number of allocated levels.
    #[inline]
    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    /// Number of levels down to the first one that fits in a single tile.
    #[inline]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Creates or destroys levels so that exactly `n` exist.
    ///
    /// # Panics
    ///
    /// If `n` is zero or greater than [`max_levels`](Self::max_levels).
    pub fn set_nlevels(&mut self, n: usize) {
        assert!(
            (1..=self.max_levels).contains(&n),
            "level count {n} outside 1..={}",
            self.max_levels
        );
        if n < self.levels.len() {
            self.levels.truncate(n);
        }
        while self.levels.len() < n {
            let k = self.levels.len();
            let prev = &self.levels[k - 1];
            let (w, h) = (half(prev.width), half(prev.height));
            self.levels.push(Level::new(k, w, h, &self.config, self.bpp));
        }
        trace!(nlevels = n, "TileManager::set_nlevels");
    }

    /// Width of `level`.
    ///
    /// # Panics
    ///
    /// If the level is not allocated.
    #[inline]
    pub fn level_width(&self, level: usize) -> u32 {
        self.level(level).width
    }

    /// Height of `level`.
    #[inline]
    pub fn level_height(&self, level: usize) -> u32 {
        self.level(level).height
    }

    /// Tile grid size `(cols, rows)` of `level`.
    #[inline]
    pub fn num_tiles(&self, level: usize) -> (u32, u32) {
        let l = self.level(level);
        (l.cols, l.rows)
    }

    /// Number of tiles in `level`.
    #[inline]
    pub fn tile_count(&self, level: usize) -> usize {
        self.level(level).slots.len()
    }

    /// Position of this buffer within its parent image.
    #[inline]
    pub fn offsets(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    /// Moves this buffer within its parent image.
    #[inline]
    pub fn set_offsets(&mut self, x: i32, y: i32) {
        self.offset_x = x;
        self.offset_y = y;
    }

    /// Extent in parent image coordinates.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_origin_size(self.offset_x, self.offset_y, self.width, self.height)
    }

    /// Installs the tile validation callback.
    pub fn set_validate_proc(&mut self, proc: impl ValidateProc + 'static) {
        self.validate = Some(Box::new(proc));
    }

    /// Removes the tile validation callback.
    pub fn clear_validate_proc(&mut self) {
        self.validate = None;
    }

    /// Tile grid coordinates of level pixel (x, y), `None` outside the level.
    pub fn tile_coordinates(&self, level: usize, x: u32, y: u32) -> Option<(u32, u32)> {
        let l = self.levels.get(level)?;
        if x >= l.width || y >= l.height {
            return None;
        }
        Some((x / self.config.tile_width, y / self.config.tile_height))
    }

    /// Handle to the tile containing level pixel (x, y).
    ///
    /// `None` if the level is not allocated or the pixel lies outside it.
    pub fn tile(&self, level: usize, x: u32, y: u32) -> Option<TileRef<'_>> {
        let (col, row) = self.tile_coordinates(level, x, y)?;
        self.tile_at(level, col, row)
    }

    /// Handle to the tile at grid position (col, row).
    pub fn tile_at(&self, level: usize, col: u32, row: u32) -> Option<TileRef<'_>> {
        let slot = self.levels.get(level)?.slot(col, row)?;
        Some(TileRef {
            manager: self,
            slot,
        })
    }

    /// Read-locks the tile containing level pixel (x, y).
    pub fn read_tile(&self, level: usize, x: u32, y: u32) -> Option<TileReadGuard<'_>> {
        self.tile(level, x, y).map(|t| t.read())
    }

    /// Write-locks the tile containing level pixel (x, y).
    pub fn write_tile(&self, level: usize, x: u32, y: u32) -> Option<TileWriteGuard<'_>> {
        self.tile(level, x, y).map(|t| t.write())
    }

    fn acquire_read<'a>(&'a self, slot: &'a TileSlot) -> TileReadGuard<'a> {
        if !slot.valid.get() {
            // an invalid tile already read-locked elsewhere stays stale
            // until its readers let go
            if let Ok(mut tile) = slot.tile.try_borrow_mut() {
                self.validate_tile(slot, &mut tile);
            }
        }
        match slot.tile.try_borrow() {
            Ok(tile) => TileReadGuard::new(tile),
            Err(_) => panic!(
                "tile ({}, {}) at level {} is write-locked",
                slot.geom.col, slot.geom.row, slot.geom.level
            ),
        }
    }

    fn acquire_write<'a>(&'a self, slot: &'a TileSlot) -> TileWriteGuard<'a> {
        let Ok(mut tile) = slot.tile.try_borrow_mut() else {
            panic!(
                "tile ({}, {}) at level {} is already locked",
                slot.geom.col, slot.geom.row, slot.geom.level
            );
        };
        if !slot.valid.get() {
            self.validate_tile(slot, &mut tile);
        }
        TileWriteGuard::new(tile, self)
    }

    fn validate_tile(&self, slot: &TileSlot, tile: &mut Tile) {
        if !tile.is_allocated() {
            tile.allocate();
            slot.allocated.set(true);
        }
        if let Some(proc) = &self.validate {
            trace!(
                level = slot.geom.level,
                col = slot.geom.col,
                row = slot.geom.row,
                "tile::validate"
            );
            proc.validate(self, tile, slot.geom.level);
        }
        slot.valid.set(true);
    }

    pub(crate) fn tile_released_dirty(&self, geom: TileGeometry) {
        if let Some(slot) = self.levels.get(geom.level).and_then(|l| l.slot(geom.col, geom.row)) {
            slot.dirty.set(true);
        }
        if geom.level == 0 {
            self.invalidate_tiles(geom.col, geom.row);
        }
    }

    /// Invalidates one tile so its next lock re-runs validation.
    ///
    /// Invalidating a level-0 tile also invalidates the mip tiles derived
    /// from it.
    ///
    /// # Panics
    ///
    /// If the tile is locked or the coordinates are out of range.
    pub fn invalidate_tile(&self, level: usize, col: u32, row: u32) {
        let slot = self.slot(level, col, row);
        assert!(
            !slot.is_locked(),
            "cannot invalidate locked tile ({col}, {row}) at level {level}"
        );
        slot.valid.set(false);
        if level == 0 {
            self.invalidate_tiles(col, row);
        }
    }

    /// Clears the valid bit of every sub-level tile covering level-0 tile
    /// (col, row).
    pub fn invalidate_tiles(&self, col: u32, row: u32) {
        let Some(top) = self.levels.first().and_then(|l| l.slot(col, row)) else {
            return;
        };
        let g = top.geom;
        for (k, level) in self.levels.iter().enumerate().skip(1) {
            let x0 = g.x >> k;
            let y0 = g.y >> k;
            let x1 = (g.x + g.width - 1) >> k;
            let y1 = (g.y + g.height - 1) >> k;
            let c0 = x0 / self.config.tile_width;
            let r0 = y0 / self.config.tile_height;
            let c1 = (x1 / self.config.tile_width).min(level.cols - 1);
            let r1 = (y1 / self.config.tile_height).min(level.rows - 1);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    if let Some(slot) = level.slot(c, r) {
                        slot.valid.set(false);
                    }
                }
            }
        }
    }

    /// Clears the valid bit of every tile above level 0.
    pub fn invalidate_sublevels(&self) {
        for level in self.levels.iter().skip(1) {
            for slot in &level.slots {
                slot.valid.set(false);
            }
        }
    }

    /// Invalidates every level-0 tile intersecting `area`, and their mips.
    ///
    /// # Panics
    ///
    /// If one of those tiles is locked.
    pub fn invalidate_area(&self, area: Rect) {
        let Some(area) = area.intersect(&Rect::from_size(self.width, self.height)) else {
            return;
        };
        let (tw, th) = (self.config.tile_width, self.config.tile_height);
        for row in area.y / th..=(area.bottom() - 1) / th {
            for col in area.x / tw..=(area.right() - 1) / tw {
                self.invalidate_tile(0, col, row);
            }
        }
    }

    /// Grid positions of dirty tiles in `level`.
    pub fn dirty_tiles(&self, level: usize) -> Vec<(u32, u32)> {
        self.level(level)
            .slots
            .iter()
            .filter(|s| s.dirty.get())
            .map(|s| (s.geom.col, s.geom.row))
            .collect()
    }

    /// Clears every dirty flag.
    pub fn clear_dirty(&self) {
        for slot in self.levels.iter().flat_map(|l| &l.slots) {
            slot.dirty.set(false);
        }
    }

    /// Approximate memory footprint in bytes: allocated pixel buffers plus
    /// per-slot bookkeeping.
    pub fn memsize(&self) -> usize {
        self.levels
            .iter()
            .flat_map(|l| &l.slots)
            .map(|s| {
                let pixels = if s.allocated.get() {
                    s.geom.width as usize * s.geom.height as usize * self.bpp as usize
                } else {
                    0
                };
                pixels + std::mem::size_of::<TileSlot>()
            })
            .sum::<usize>()
            + std::mem::size_of::<Self>()
    }

    /// Copies level-0 pixel (x, y) into `out`.
    ///
    /// Returns `false` and leaves `out` untouched outside the buffer.
    pub fn read_pixel(&self, x: i32, y: i32, out: &mut [u8]) -> bool {
        let Some((x, y)) = self.in_bounds(x, y) else {
            return false;
        };
        let Some(tile) = self.read_tile(0, x, y) else {
            return false;
        };
        let bpp = self.bpp as usize;
        out[..bpp].copy_from_slice(tile.pixel(x - tile.x(), y - tile.y()));
        true
    }

    /// Writes `px` to level-0 pixel (x, y), marking the tile dirty.
    ///
    /// Returns `false` outside the buffer.
    pub fn write_pixel(&self, x: i32, y: i32, px: &[u8]) -> bool {
        let Some((x, y)) = self.in_bounds(x, y) else {
            return false;
        };
        let Some(mut tile) = self.write_tile(0, x, y) else {
            return false;
        };
        let bpp = self.bpp as usize;
        let (tx, ty) = (x - tile.x(), y - tile.y());
        tile.pixel_mut(tx, ty).copy_from_slice(&px[..bpp]);
        true
    }

    /// Copies level-0 `rect` into `buffer`, rows `stride` bytes apart.
    ///
    /// # Panics
    ///
    /// If `rect` leaves the buffer or `buffer` is too short.
    pub fn read_pixel_data(&self, rect: Rect, buffer: &mut [u8], stride: usize) {
        self.check_transfer(rect, buffer.len(), stride);
        let bpp = self.bpp as usize;
        self.for_each_tile_in(rect, |col, row, span| {
            let Some(tile) = self.tile_at(0, col, row).map(|t| t.read()) else {
                return;
            };
            for y in span.y..span.bottom() {
                let src = tile.offset(span.x - tile.x(), y - tile.y());
                let dst = (y - rect.y) as usize * stride + (span.x - rect.x) as usize * bpp;
                let n = span.width as usize * bpp;
                buffer[dst..dst + n].copy_from_slice(&tile.data()[src..src + n]);
            }
        });
    }

    /// Copies `buffer` into level-0 `rect`, marking touched tiles dirty.
    ///
    /// # Panics
    ///
    /// If `rect` leaves the buffer or `buffer` is too short.
    pub fn write_pixel_data(&self, rect: Rect, buffer: &[u8], stride: usize) {
        self.check_transfer(rect, buffer.len(), stride);
        let bpp = self.bpp as usize;
        self.for_each_tile_in(rect, |col, row, span| {
            let Some(mut tile) = self.tile_at(0, col, row).map(|t| t.write()) else {
                return;
            };
            let (tx, ty) = (tile.x(), tile.y());
            for y in span.y..span.bottom() {
                let dst = tile.offset(span.x - tx, y - ty);
                let src = (y - rect.y) as usize * stride + (span.x - rect.x) as usize * bpp;
                let n = span.width as usize * bpp;
                tile.data_mut()[dst..dst + n].copy_from_slice(&buffer[src..src + n]);
            }
        });
    }

    /// Sets every level-0 pixel to `color` (zero-extended to bpp).
    pub fn fill(&self, color: &[u8]) {
        for slot in &self.level(0).slots {
            let mut tile = self.acquire_write(slot);
            tile.fill(color);
        }
    }

    fn check_transfer(&self, rect: Rect, len: usize, stride: usize) {
        assert!(
            Rect::from_size(self.width, self.height).contains_rect(&rect),
            "{rect} outside {}x{} buffer",
            self.width,
            self.height
        );
        if rect.is_empty() {
            return;
        }
        let row = rect.width as usize * self.bpp as usize;
        assert!(stride >= row, "stride {stride} shorter than row of {row} bytes");
        let need = (rect.height as usize - 1) * stride + row;
        assert!(len >= need, "buffer of {len} bytes, {need} required");
    }

    /// Calls `f(col, row, span)` for every level-0 tile intersecting `rect`,
    /// `span` being the intersection in buffer coordinates.
    fn for_each_tile_in(&self, rect: Rect, mut f: impl FnMut(u32, u32, Rect)) {
        if rect.is_empty() {
            return;
        }
        let (tw, th) = (self.config.tile_width, self.config.tile_height);
        for row in rect.y / th..=(rect.bottom() - 1) / th {
            for col in rect.x / tw..=(rect.right() - 1) / tw {
                let cell = Rect::new(col * tw, row * th, tw, th);
                if let Some(span) = rect.intersect(&cell) {
                    f(col, row, span);
                }
            }
        }
    }

    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    fn level(&self, level: usize) -> &Level {
        match self.levels.get(level) {
            Some(l) => l,
            None => panic!("level {level} not allocated ({} levels)", self.levels.len()),
        }
    }

    fn slot(&self, level: usize, col: u32, row: u32) -> &TileSlot {
        match self.level(level).slot(col, row) {
            Some(s) => s,
            None => panic!("tile ({col}, {row}) outside level {level}"),
        }
    }
}

impl fmt::Debug for TileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileManager")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bpp", &self.bpp)
            .field("config", &self.config)
            .field("nlevels", &self.levels.len())
            .field("offsets", &(self.offset_x, self.offset_y))
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

#[inline]
fn half(n: u32) -> u32 {
    n.div_ceil(2).max(1)
}

fn level_count(width: u32, height: u32, config: &TileConfig) -> usize {
    let (mut w, mut h) = (width, height);
    let mut n = 1;
    while w > config.tile_width || h > config.tile_height {
        w = half(w);
        h = half(h);
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn assert_send<T: Send>() {}

    #[test]
    fn test_manager_is_send() {
        assert_send::<TileManager>();
    }

    #[test]
    fn test_dimensions_echo() {
        for &(w, h, bpp) in &[(1, 1, 1), (64, 64, 4), (65, 130, 3), (300, 7, 2)] {
            let tiles = TileManager::new(w, h, bpp).unwrap();
            assert_eq!((tiles.width(), tiles.height(), tiles.bpp()), (w, h, bpp));
            assert_eq!(tiles.nlevels(), 1);
        }
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(TileManager::new(0, 10, 1).is_err());
        assert!(TileManager::new(10, 0, 1).is_err());
        assert!(TileManager::new(10, 10, 0).is_err());
        assert!(TileManager::new(10, 10, 5).is_err());
    }

    #[test]
    fn test_level_count() {
        let cfg = TileConfig::default();
        assert_eq!(level_count(64, 64, &cfg), 1);
        assert_eq!(level_count(65, 1, &cfg), 2);
        assert_eq!(level_count(1000, 10, &cfg), 5);
    }

    #[test]
    fn test_set_nlevels() {
        let mut tiles = TileManager::new(257, 100, 1).unwrap();
        let n = tiles.max_levels();
        assert_eq!(n, 4);
        tiles.set_nlevels(n);
        assert_eq!(tiles.level_width(1), 129);
        assert_eq!(tiles.level_width(2), 65);
        assert_eq!(tiles.level_width(3), 33);
        assert_eq!(tiles.level_height(3), 13);
        assert_eq!(tiles.num_tiles(3), (1, 1));
        tiles.set_nlevels(1);
        assert_eq!(tiles.nlevels(), 1);
        assert!(tiles.tile(1, 0, 0).is_none());
    }

    #[test]
    #[should_panic(expected = "level count")]
    fn test_set_nlevels_out_of_range() {
        let mut tiles = TileManager::new(10, 10, 1).unwrap();
        tiles.set_nlevels(2);
    }

    #[test]
    fn test_tile_lookup_and_edges() {
        let tiles = TileManager::new(100, 70, 3).unwrap();
        assert_eq!(tiles.num_tiles(0), (2, 2));
        assert_eq!(tiles.tile_coordinates(0, 99, 69), Some((1, 1)));
        assert_eq!(tiles.tile_coordinates(0, 100, 0), None);
        assert!(tiles.tile(0, 0, 70).is_none());

        let edge = tiles.tile(0, 99, 69).unwrap();
        assert_eq!((edge.width(), edge.height()), (36, 6));
        let inner = tiles.tile(0, 0, 0).unwrap();
        assert_eq!((inner.width(), inner.height()), (64, 64));
    }

    #[test]
    fn test_lazy_allocation_and_buffer_len() {
        let tiles = TileManager::new(100, 70, 3).unwrap();
        let handle = tiles.tile(0, 80, 10).unwrap();
        assert!(!handle.is_allocated());
        assert!(!handle.is_valid());
        {
            let tile = handle.read();
            assert!(tile.data().len() >= 36 * 64 * 3);
        }
        assert!(handle.is_allocated());
        assert!(handle.is_valid());
        assert!(!handle.is_dirty());
    }

    #[test]
    fn test_multiple_readers() {
        let tiles = TileManager::new(10, 10, 1).unwrap();
        let a = tiles.read_tile(0, 0, 0).unwrap();
        let b = tiles.read_tile(0, 5, 5).unwrap();
        assert_eq!(a.data().len(), b.data().len());
    }

    #[test]
    #[should_panic(expected = "already locked")]
    fn test_write_while_read_panics() {
        let tiles = TileManager::new(10, 10, 1).unwrap();
        let _r = tiles.read_tile(0, 0, 0).unwrap();
        let _w = tiles.write_tile(0, 0, 0).unwrap();
    }

    #[test]
    #[should_panic(expected = "write-locked")]
    fn test_read_while_write_panics() {
        let tiles = TileManager::new(10, 10, 1).unwrap();
        let _w = tiles.write_tile(0, 0, 0).unwrap();
        let _r = tiles.read_tile(0, 0, 0).unwrap();
    }

    #[test]
    fn test_release_clean_and_dirty() {
        let tiles = TileManager::new(10, 10, 1).unwrap();
        tiles.write_tile(0, 0, 0).unwrap().release(false);
        assert!(!tiles.tile(0, 0, 0).unwrap().is_dirty());
        drop(tiles.write_tile(0, 0, 0).unwrap());
        assert!(tiles.tile(0, 0, 0).unwrap().is_dirty());
        assert_eq!(tiles.dirty_tiles(0), vec![(0, 0)]);
        tiles.clear_dirty();
        assert!(tiles.dirty_tiles(0).is_empty());
    }

    #[test]
    fn test_validate_proc_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut tiles = TileManager::new(128, 64, 1).unwrap();
        tiles.set_validate_proc(move |_: &TileManager, tile: &mut Tile, level: usize| {
            counter.fetch_add(1, Ordering::SeqCst);
            tile.fill(&[level as u8 + 10]);
        });

        assert_eq!(tiles.read_tile(0, 0, 0).unwrap().pixel(0, 0), &[10]);
        assert_eq!(tiles.read_tile(0, 1, 1).unwrap().pixel(1, 1), &[10]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tiles.read_tile(0, 64, 0).unwrap().pixel(0, 0), &[10]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validate_proc_reads_lower_level() {
        let mut tiles = TileManager::new(128, 128, 1).unwrap();
        tiles.set_nlevels(2);
        tiles.set_validate_proc(|tm: &TileManager, tile: &mut Tile, level: usize| {
            if level == 0 {
                return;
            }
            for y in 0..tile.height() {
                for x in 0..tile.width() {
                    let mut px = [0u8];
                    tm.read_pixel(((tile.x() + x) * 2) as i32, ((tile.y() + y) * 2) as i32, &mut px);
                    tile.pixel_mut(x, y)[0] = px[0];
                }
            }
        });
        tiles.write_pixel(2, 2, &[77]);
        assert_eq!(tiles.read_tile(1, 1, 1).unwrap().pixel(1, 1), &[77]);
    }

    #[test]
    fn test_dirty_release_invalidates_mips() {
        let mut tiles = TileManager::new(256, 256, 1).unwrap();
        tiles.set_nlevels(3);
        for level in 1..3 {
            drop(tiles.read_tile(level, 0, 0).unwrap());
            assert!(tiles.tile(level, 0, 0).unwrap().is_valid());
        }
        drop(tiles.read_tile(1, 64, 64).unwrap());

        tiles.write_pixel(200, 200, &[1]);

        // level-0 tile (3, 3) covers level-1 pixels 96..128 -> tile (1, 1)
        assert!(!tiles.tile(1, 64, 64).unwrap().is_valid());
        assert!(tiles.tile(1, 0, 0).unwrap().is_valid());
        assert!(!tiles.tile(2, 0, 0).unwrap().is_valid());
    }

    #[test]
    fn test_invalidate_sublevels() {
        let mut tiles = TileManager::new(200, 200, 1).unwrap();
        tiles.set_nlevels(2);
        drop(tiles.read_tile(0, 0, 0).unwrap());
        drop(tiles.read_tile(1, 0, 0).unwrap());
        tiles.invalidate_sublevels();
        assert!(tiles.tile(0, 0, 0).unwrap().is_valid());
        assert!(!tiles.tile(1, 0, 0).unwrap().is_valid());
    }

    #[test]
    fn test_invalidate_area() {
        let tiles = TileManager::new(200, 200, 1).unwrap();
        for (x, y) in [(0, 0), (70, 0), (0, 70), (150, 150)] {
            drop(tiles.read_tile(0, x, y).unwrap());
        }
        tiles.invalidate_area(Rect::new(60, 10, 20, 20));
        assert!(!tiles.tile(0, 0, 0).unwrap().is_valid());
        assert!(!tiles.tile(0, 70, 0).unwrap().is_valid());
        assert!(tiles.tile(0, 0, 70).unwrap().is_valid());
        assert!(tiles.tile(0, 150, 150).unwrap().is_valid());
    }

    #[test]
    #[should_panic(expected = "cannot invalidate locked tile")]
    fn test_invalidate_locked_panics() {
        let tiles = TileManager::new(10, 10, 1).unwrap();
        let _g = tiles.read_tile(0, 0, 0).unwrap();
        tiles.invalidate_tile(0, 0, 0);
    }

    #[test]
    fn test_pixel_io() {
        let tiles = TileManager::new(100, 100, 2).unwrap();
        assert!(tiles.write_pixel(99, 64, &[3, 4]));
        assert!(!tiles.write_pixel(100, 0, &[3, 4]));
        assert!(!tiles.write_pixel(-1, 0, &[3, 4]));

        let mut px = [9u8; 2];
        assert!(!tiles.read_pixel(0, -1, &mut px));
        assert_eq!(px, [9, 9]);
        assert!(tiles.read_pixel(99, 64, &mut px));
        assert_eq!(px, [3, 4]);
    }

    #[test]
    fn test_pixel_data_roundtrip_across_tiles() {
        let tiles = TileManager::new(150, 90, 3).unwrap();
        let rect = Rect::new(50, 40, 30, 40);
        let stride = 100;
        let mut src = vec![0u8; stride * rect.height as usize];
        for (i, b) in src.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        tiles.write_pixel_data(rect, &src, stride);

        let mut dst = vec![0u8; stride * rect.height as usize];
        tiles.read_pixel_data(rect, &mut dst, stride);
        for row in 0..rect.height as usize {
            let r = row * stride..row * stride + 90;
            assert_eq!(&src[r.clone()], &dst[r]);
        }

        let mut px = [0u8; 3];
        tiles.read_pixel(50, 40, &mut px);
        assert_eq!(px, [0, 1, 2]);
    }

    #[test]
    fn test_fill_and_memsize() {
        let tiles = TileManager::new(100, 100, 4).unwrap();
        let before = tiles.memsize();
        tiles.fill(&[1, 2, 3, 4]);
        let after = tiles.memsize();
        assert_eq!(after - before, 100 * 100 * 4);

        let mut px = [0u8; 4];
        tiles.read_pixel(99, 99, &mut px);
        assert_eq!(px, [1, 2, 3, 4]);
    }

    #[test]
    fn test_offsets_and_new_like() {
        let mut tiles = TileManager::new(20, 10, 1).unwrap();
        tiles.set_offsets(-3, 7);
        assert_eq!(tiles.bounds(), Bounds::new(-3, 7, 17, 17));
        let copy = tiles.new_like();
        assert_eq!(copy.offsets(), (-3, 7));
        assert_eq!((copy.width(), copy.height(), copy.bpp()), (20, 10, 1));
    }

    #[test]
    fn test_custom_tile_size() {
        let tiles = TileManager::with_config(10, 10, 1, TileConfig::square(4).unwrap()).unwrap();
        assert_eq!(tiles.num_tiles(0), (3, 3));
        assert_eq!(tiles.tile(0, 9, 9).unwrap().width(), 2);
        assert_eq!(tiles.max_levels(), 3);
    }
}
