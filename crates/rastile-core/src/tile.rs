//! Tiles and tile lock guards.
//!
//! A [`Tile`] is one block of a [`TileManager`] level. Tiles live in the
//! manager's slot arena and are only reachable through lock guards:
//!
//! - [`TileReadGuard`] - shared access, any number at once
//! - [`TileWriteGuard`] - exclusive access; releasing it dirty flags the
//!   tile and invalidates the mip tiles derived from it
//!
//! Lock state is a `RefCell` borrow, so a read lock and a write lock on the
//! same tile can never coexist. Requesting a conflicting lock panics.
//!
//! ```rust
//! use rastile_core::TileManager;
//!
//! let tiles = TileManager::new(100, 100, 3).unwrap();
//! {
//!     let mut tile = tiles.write_tile(0, 70, 70).unwrap();
//!     assert_eq!((tile.width(), tile.height()), (36, 36));
//!     tile.pixel_mut(6, 6).copy_from_slice(&[1, 2, 3]);
//! }
//! let tile = tiles.read_tile(0, 70, 70).unwrap();
//! assert_eq!(tile.pixel(6, 6), &[1, 2, 3]);
//! ```

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::TileManager;

/// Position and extent of a tile inside its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGeometry {
    /// Mip level (0 = full resolution).
    pub level: usize,
    /// Tile column.
    pub col: u32,
    /// Tile row.
    pub row: u32,
    /// Left pixel of the tile within the level.
    pub x: u32,
    /// Top pixel of the tile within the level.
    pub y: u32,
    /// Effective width; smaller than the nominal width on the right edge.
    pub width: u32,
    /// Effective height; smaller than the nominal height on the bottom edge.
    pub height: u32,
}

impl TileGeometry {
    /// Returns `true` if the level pixel (x, y) lies in this tile.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One block of pixel storage.
pub struct Tile {
    geom: TileGeometry,
    bpp: u32,
    data: Vec<u8>,
}

impl Tile {
    pub(crate) fn new(geom: TileGeometry, bpp: u32) -> Self {
        Self {
            geom,
            bpp,
            data: Vec::new(),
        }
    }

    /// Position and extent of this tile.
    #[inline]
    pub fn geometry(&self) -> TileGeometry {
        self.geom
    }

    /// Mip level.
    #[inline]
    pub fn level(&self) -> usize {
        self.geom.level
    }

    /// Tile column.
    #[inline]
    pub fn col(&self) -> u32 {
        self.geom.col
    }

    /// Tile row.
    #[inline]
    pub fn row(&self) -> u32 {
        self.geom.row
    }

    /// Left pixel within the level.
    #[inline]
    pub fn x(&self) -> u32 {
        self.geom.x
    }

    /// Top pixel within the level.
    #[inline]
    pub fn y(&self) -> u32 {
        self.geom.y
    }

    /// Effective width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.geom.width
    }

    /// Effective height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.geom.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    /// Bytes between vertically adjacent pixels.
    #[inline]
    pub fn rowstride(&self) -> usize {
        self.geom.width as usize * self.bpp as usize
    }

    /// Size of the pixel buffer in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.rowstride() * self.geom.height as usize
    }

    /// Whether the pixel buffer exists yet.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    pub(crate) fn allocate(&mut self) {
        if self.data.is_empty() {
            self.data = vec![0; self.size()];
        }
    }

    /// Pixel bytes, row-major with [`rowstride`](Self::rowstride).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte offset of tile-local pixel (x, y).
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.geom.width && y < self.geom.height);
        y as usize * self.rowstride() + x as usize * self.bpp as usize
    }

    /// Tile-local pixel.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let o = self.offset(x, y);
        &self.data[o..o + self.bpp as usize]
    }

    /// Mutable tile-local pixel.
    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let o = self.offset(x, y);
        let bpp = self.bpp as usize;
        &mut self.data[o..o + bpp]
    }

    /// Tile-local row.
    #[inline]
    pub fn row_data(&self, y: u32) -> &[u8] {
        let o = y as usize * self.rowstride();
        &self.data[o..o + self.rowstride()]
    }

    /// Mutable tile-local row.
    #[inline]
    pub fn row_data_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.rowstride();
        let o = y as usize * stride;
        &mut self.data[o..o + stride]
    }

    /// Sets every pixel to `color` (zero-extended to bpp).
    pub fn fill(&mut self, color: &[u8]) {
        let bpp = self.bpp as usize;
        let px = crate::format::pixel_from_color(color, bpp);
        for chunk in self.data.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&px[..bpp]);
        }
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("geom", &self.geom)
            .field("bpp", &self.bpp)
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

/// Arena entry: bookkeeping bits beside the lockable tile.
pub(crate) struct TileSlot {
    pub(crate) geom: TileGeometry,
    pub(crate) valid: Cell<bool>,
    pub(crate) dirty: Cell<bool>,
    pub(crate) allocated: Cell<bool>,
    pub(crate) tile: RefCell<Tile>,
}

impl TileSlot {
    pub(crate) fn new(geom: TileGeometry, bpp: u32) -> Self {
        Self {
            geom,
            valid: Cell::new(false),
            dirty: Cell::new(false),
            allocated: Cell::new(false),
            tile: RefCell::new(Tile::new(geom, bpp)),
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.tile.try_borrow_mut().is_err()
    }
}

/// Shared lock on a tile.
pub struct TileReadGuard<'a> {
    tile: Ref<'a, Tile>,
}

impl<'a> TileReadGuard<'a> {
    pub(crate) fn new(tile: Ref<'a, Tile>) -> Self {
        Self { tile }
    }
}

impl Deref for TileReadGuard<'_> {
    type Target = Tile;

    #[inline]
    fn deref(&self) -> &Tile {
        &self.tile
    }
}

impl fmt::Debug for TileReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TileReadGuard").field(&*self.tile).finish()
    }
}

/// Exclusive lock on a tile.
///
/// Dropping the guard releases it dirty; use
/// [`release`](TileWriteGuard::release) to release it clean.
pub struct TileWriteGuard<'a> {
    tile: RefMut<'a, Tile>,
    manager: &'a TileManager,
    dirty: bool,
}

impl<'a> TileWriteGuard<'a> {
    pub(crate) fn new(tile: RefMut<'a, Tile>, manager: &'a TileManager) -> Self {
        Self {
            tile,
            manager,
            dirty: true,
        }
    }

    /// Releases the lock, flagging the tile dirty if `mark_dirty`.
    pub fn release(mut self, mark_dirty: bool) {
        self.dirty = mark_dirty;
    }

    /// Chooses whether the eventual drop marks the tile dirty.
    pub fn set_dirty_on_release(&mut self, mark_dirty: bool) {
        self.dirty = mark_dirty;
    }
}

impl Deref for TileWriteGuard<'_> {
    type Target = Tile;

    #[inline]
    fn deref(&self) -> &Tile {
        &self.tile
    }
}

impl DerefMut for TileWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Tile {
        &mut self.tile
    }
}

impl Drop for TileWriteGuard<'_> {
    fn drop(&mut self) {
        if self.dirty {
            // touches only the Cell bits, never another tile's RefCell
            self.manager.tile_released_dirty(self.tile.geometry());
        }
    }
}

impl fmt::Debug for TileWriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileWriteGuard")
            .field("tile", &*self.tile)
            .field("dirty", &self.dirty)
            .finish()
    }
}
