//! Fixed-size pixel neighborhoods for resampling.
//!
//! [`PixelSurround::lock`] returns a W×H window of level-0 pixels with its
//! top-left corner at (x, y). When the window lies inside one tile the
//! view points straight into the tile; otherwise the window is assembled
//! in a scratch buffer, with the background colour wherever it leaves the
//! image.
//!
//! ```rust
//! use rastile_core::{PixelSurround, TileManager};
//!
//! let tiles = TileManager::new(100, 100, 1).unwrap();
//! tiles.fill(&[7]);
//!
//! let mut s = PixelSurround::new(&tiles, 2, 2, &[0]).unwrap();
//! let view = s.lock(10, 10);
//! assert!(view.is_borrowed());
//! assert_eq!(view.pixel(1, 1), &[7]);
//!
//! let view = s.lock(-1, 99);
//! assert_eq!(view.pixel(0, 0), &[0]);
//! assert_eq!(view.pixel(1, 0), &[7]);
//! assert_eq!(view.pixel(1, 1), &[0]);
//! ```

use std::fmt;

use crate::format::{MAX_CHANNELS, pixel_from_color};
use crate::tile::TileReadGuard;
use crate::{Error, Result, TileManager};

/// Window returned by [`PixelSurround::lock`].
#[derive(Clone, Copy)]
pub struct SurroundView<'s> {
    data: &'s [u8],
    rowstride: usize,
    bpp: usize,
    borrowed: bool,
}

impl<'s> SurroundView<'s> {
    /// Bytes starting at the window's top-left pixel.
    #[inline]
    pub fn data(&self) -> &'s [u8] {
        self.data
    }

    /// Bytes between window rows.
    #[inline]
    pub fn rowstride(&self) -> usize {
        self.rowstride
    }

    /// Window-local pixel.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &'s [u8] {
        let o = y as usize * self.rowstride + x as usize * self.bpp;
        &self.data[o..o + self.bpp]
    }

    /// Whether the view points into tile storage rather than the scratch
    /// buffer.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        self.borrowed
    }
}

impl fmt::Debug for SurroundView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurroundView")
            .field("rowstride", &self.rowstride)
            .field("bpp", &self.bpp)
            .field("borrowed", &self.borrowed)
            .finish()
    }
}

/// Read-only W×H window accessor over a tile manager.
pub struct PixelSurround<'a> {
    tiles: &'a TileManager,
    w: u32,
    h: u32,
    bpp: usize,
    bg: [u8; MAX_CHANNELS],
    scratch: Vec<u8>,
    cached: Option<TileReadGuard<'a>>,
}

impl<'a> PixelSurround<'a> {
    /// Creates a `w`×`h` accessor; `background` is zero-extended to the
    /// manager's bpp.
    pub fn new(tiles: &'a TileManager, w: u32, h: u32, background: &[u8]) -> Result<Self> {
        let bpp = tiles.bpp() as usize;
        if background.len() > bpp {
            return Err(Error::channel_mismatch(bpp as u32, background.len() as u32));
        }
        if w == 0 || h == 0 {
            return Err(Error::invalid_dimensions(w, h, "empty surround"));
        }
        Ok(Self {
            tiles,
            w,
            h,
            bpp,
            bg: pixel_from_color(background, bpp),
            scratch: vec![0; w as usize * h as usize * bpp],
            cached: None,
        })
    }

    /// Window width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.w
    }

    /// Window height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.h
    }

    /// Background pixel used outside the image.
    #[inline]
    pub fn background(&self) -> &[u8] {
        &self.bg[..self.bpp]
    }

    /// Whether a tile is currently held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns the window whose top-left pixel is (x, y).
    pub fn lock(&mut self, x: i32, y: i32) -> SurroundView<'_> {
        let (w, h) = (self.w as i64, self.h as i64);
        let (x64, y64) = (x as i64, y as i64);
        let inside = x64 >= 0
            && y64 >= 0
            && x64 + w <= self.tiles.width() as i64
            && y64 + h <= self.tiles.height() as i64;

        if inside {
            let (ux, uy) = (x as u32, y as u32);
            let covers = |g: crate::TileGeometry| {
                ux >= g.x && uy >= g.y && ux + self.w <= g.x + g.width && uy + self.h <= g.y + g.height
            };
            let hit = self.cached.as_ref().is_some_and(|t| covers(t.geometry()));
            if !hit {
                self.cached = None;
                let fits = self
                    .tiles
                    .tile(0, ux, uy)
                    .filter(|t| covers(t.geometry()));
                if let Some(tile) = fits {
                    self.cached = Some(tile.read());
                }
            }
            if let Some(tile) = &self.cached {
                let o = tile.offset(ux - tile.x(), uy - tile.y());
                return SurroundView {
                    data: &tile.data()[o..],
                    rowstride: tile.rowstride(),
                    bpp: self.bpp,
                    borrowed: true,
                };
            }
        } else {
            self.cached = None;
        }

        gather(self.tiles, &self.bg[..self.bpp], self.w, self.h, x, y, &mut self.scratch);
        SurroundView {
            data: &self.scratch,
            rowstride: self.w as usize * self.bpp,
            bpp: self.bpp,
            borrowed: false,
        }
    }

    /// Drops the held tile, if any.
    pub fn release(&mut self) {
        self.cached = None;
    }
}

impl fmt::Debug for PixelSurround<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelSurround")
            .field("size", &(self.w, self.h))
            .field("bpp", &self.bpp)
            .field("background", &self.background())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Assembles the window at (x, y) into `out`, one row-run per tile.
fn gather(tiles: &TileManager, bg: &[u8], w: u32, h: u32, x: i32, y: i32, out: &mut [u8]) {
    let bpp = bg.len();
    let rowstride = w as usize * bpp;
    for px in out.chunks_exact_mut(bpp) {
        px.copy_from_slice(bg);
    }

    let x1 = (x as i64).max(0);
    let y1 = (y as i64).max(0);
    let x2 = (x as i64 + w as i64).min(tiles.width() as i64);
    let y2 = (y as i64 + h as i64).min(tiles.height() as i64);
    if x1 >= x2 || y1 >= y2 {
        return;
    }

    let (tw, th) = (tiles.tile_width() as i64, tiles.tile_height() as i64);
    let mut ty0 = y1;
    while ty0 < y2 {
        let ty1 = ((ty0 / th + 1) * th).min(y2);
        let mut tx0 = x1;
        while tx0 < x2 {
            let tx1 = ((tx0 / tw + 1) * tw).min(x2);
            if let Some(tile) = tiles.read_tile(0, tx0 as u32, ty0 as u32) {
                let n = (tx1 - tx0) as usize * bpp;
                for sy in ty0..ty1 {
                    let src = tile.offset(tx0 as u32 - tile.x(), sy as u32 - tile.y());
                    let dst = (sy - y as i64) as usize * rowstride + (tx0 - x as i64) as usize * bpp;
                    out[dst..dst + n].copy_from_slice(&tile.data()[src..src + n]);
                }
            }
            tx0 = tx1;
        }
        ty0 = ty1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(w: u32, h: u32, bpp: u32) -> TileManager {
        let tiles = TileManager::new(w, h, bpp).unwrap();
        for y in 0..h {
            for x in 0..w {
                let px: Vec<u8> = (0..bpp).map(|c| ((x * 3 + y * 5 + c * 11) % 251) as u8).collect();
                tiles.write_pixel(x as i32, y as i32, &px);
            }
        }
        tiles
    }

    fn naive(tiles: &TileManager, bg: &[u8], x: i32, y: i32, w: u32, h: u32) -> Vec<u8> {
        let bpp = tiles.bpp() as usize;
        let mut out = Vec::new();
        for j in 0..h as i32 {
            for i in 0..w as i32 {
                let mut px = vec![0u8; bpp];
                if !tiles.read_pixel(x + i, y + j, &mut px) {
                    px.copy_from_slice(&bg[..bpp]);
                }
                out.extend_from_slice(&px);
            }
        }
        out
    }

    fn collect(view: &SurroundView<'_>, w: u32, h: u32) -> Vec<u8> {
        (0..h).flat_map(|j| (0..w).flat_map(move |i| view.pixel(i, j).to_vec())).collect()
    }

    #[test]
    fn test_fast_path_borrows_tile() {
        let tiles = patterned(128, 128, 2);
        let mut s = PixelSurround::new(&tiles, 4, 4, &[9, 9]).unwrap();
        let view = s.lock(10, 20);
        assert!(view.is_borrowed());
        assert_eq!(view.rowstride(), 64 * 2);
        let got = collect(&view, 4, 4);
        assert_eq!(got, naive(&tiles, &[9, 9], 10, 20, 4, 4));
        assert!(s.is_locked());
    }

    #[test]
    fn test_slow_path_matches_naive() {
        let tiles = patterned(130, 70, 3);
        let mut s = PixelSurround::new(&tiles, 4, 4, &[1, 2, 3]).unwrap();
        for &(x, y) in &[(62, 10), (62, 62), (-2, -2), (128, 68), (-5, 30), (500, 500)] {
            let view = s.lock(x, y);
            assert!(!view.is_borrowed());
            assert_eq!(view.rowstride(), 12);
            assert_eq!(collect(&view, 4, 4), naive(&tiles, &[1, 2, 3], x, y, 4, 4), "at ({x}, {y})");
        }
    }

    #[test]
    fn test_every_position_matches_naive() {
        let tiles = TileManager::with_config(20, 12, 1, crate::TileConfig::new(8, 5).unwrap()).unwrap();
        for y in 0..12 {
            for x in 0..20 {
                tiles.write_pixel(x, y, &[(x * 12 + y) as u8]);
            }
        }
        let mut s = PixelSurround::new(&tiles, 3, 2, &[255]).unwrap();
        for y in -3..14 {
            for x in -4..22 {
                let view = s.lock(x, y);
                assert_eq!(collect(&view, 3, 2), naive(&tiles, &[255], x, y, 3, 2));
            }
        }
    }

    #[test]
    fn test_background_zero_extended() {
        let tiles = TileManager::new(4, 4, 4).unwrap();
        let mut s = PixelSurround::new(&tiles, 2, 2, &[5]).unwrap();
        assert_eq!(s.background(), &[5, 0, 0, 0]);
        assert_eq!(s.lock(-10, -10).pixel(1, 1), &[5, 0, 0, 0]);
        assert!(PixelSurround::new(&tiles, 2, 2, &[1, 2, 3, 4, 5]).is_err());
        assert!(PixelSurround::new(&tiles, 0, 2, &[]).is_err());
    }

    #[test]
    fn test_release_idempotent() {
        let tiles = patterned(64, 64, 1);
        let mut s = PixelSurround::new(&tiles, 2, 2, &[0]).unwrap();
        s.release();
        let _ = s.lock(1, 1);
        assert!(s.is_locked());
        s.release();
        s.release();
        assert!(!s.is_locked());
        // the tile is writable again once released
        assert!(tiles.write_pixel(1, 1, &[3]));
    }
}
