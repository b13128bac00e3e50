//! Rectangular views over tiled or flat pixel storage.
//!
//! A [`PixelRegion`] names a sub-rectangle of a [`TileManager`] (level 0)
//! or of a flat byte buffer. It offers scalar row/column copies
//! ([`get_row`](PixelRegion::get_row), [`set_col`](PixelRegion::set_col), ...)
//! and, through [`Processor`], a lock-step walk over several same-sized
//! regions in tile-aligned *portions*.
//!
//! # Portions
//!
//! Each [`Processor::process`] call yields the largest rectangle that every
//! region exposes as contiguous memory at the current position, i.e. the
//! intersection of the tiles each region currently sits in:
//!
//! ```text
//! region A tiles   ┌────┬────┐     region B tiles ┌──┬──┬──┐
//!                  │    │    │                    │  │  │  │
//!                  └────┴────┘                    └──┴──┴──┘
//! portions         ┌──┬─┬─┬──┐
//!                  └──┴─┴─┴──┘
//! ```
//!
//! The previous portion (and its tile locks) must be dropped before the
//! next call; write locks of dirty regions are released dirty.
//!
//! ```rust
//! use rastile_core::{PixelRegion, Processor, TileManager};
//!
//! let src = TileManager::new(100, 80, 3).unwrap();
//! let dst = TileManager::new(100, 80, 1).unwrap();
//! src.fill(&[30, 60, 90]);
//!
//! let mut proc = Processor::new([
//!     PixelRegion::full(&src, false),
//!     PixelRegion::full(&dst, true),
//! ])
//! .unwrap();
//!
//! while let Some(mut portion) = proc.process() {
//!     let [s, d] = portion.buffers_mut() else { unreachable!() };
//!     for row in 0..s.height() {
//!         let (src_row, dst_row) = (s.row(row), d.row_mut(row));
//!         for (px, out) in src_row.chunks(3).zip(dst_row.iter_mut()) {
//!             *out = ((px[0] as u32 + px[1] as u32 + px[2] as u32) / 3) as u8;
//!         }
//!     }
//! }
//!
//! let mut g = [0u8];
//! dst.read_pixel(99, 79, &mut g);
//! assert_eq!(g, [60]);
//! ```

use std::fmt;

use smallvec::SmallVec;

use crate::rect::Rect;
use crate::tile::{TileReadGuard, TileWriteGuard};
use crate::{Error, Result, TileManager};

enum Source<'a> {
    Tiles(&'a TileManager),
    Buffer { data: &'a [u8], rowstride: usize },
    BufferMut { data: &'a mut [u8], rowstride: usize },
}

/// A rectangle of pixels in a tile manager or a flat buffer.
pub struct PixelRegion<'a> {
    source: Source<'a>,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    bpp: u32,
    dirty: bool,
}

impl<'a> PixelRegion<'a> {
    /// Binds a region to level 0 of `tiles`.
    ///
    /// A `dirty` region write-locks the tiles it touches and releases them
    /// dirty. The rectangle must lie inside the manager.
    pub fn new(tiles: &'a TileManager, x: u32, y: u32, w: u32, h: u32, dirty: bool) -> Result<Self> {
        let rect = Rect::new(x, y, w, h);
        if !Rect::from_size(tiles.width(), tiles.height()).contains_rect(&rect) {
            return Err(Error::invalid_region(x, y, w, h, tiles.width(), tiles.height()));
        }
        Ok(Self {
            source: Source::Tiles(tiles),
            x,
            y,
            w,
            h,
            bpp: tiles.bpp(),
            dirty,
        })
    }

    /// Binds a region to `rect` of `tiles`.
    pub fn from_rect(tiles: &'a TileManager, rect: Rect, dirty: bool) -> Result<Self> {
        Self::new(tiles, rect.x, rect.y, rect.width, rect.height, dirty)
    }

    /// Covers all of `tiles`.
    pub fn full(tiles: &'a TileManager, dirty: bool) -> Self {
        Self {
            source: Source::Tiles(tiles),
            x: 0,
            y: 0,
            w: tiles.width(),
            h: tiles.height(),
            bpp: tiles.bpp(),
            dirty,
        }
    }

    /// Read-only region over a flat buffer whose rows are `rowstride`
    /// bytes apart; (x, y) is the region origin inside the buffer.
    pub fn from_buffer(
        data: &'a [u8],
        bpp: u32,
        rowstride: usize,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Self> {
        check_buffer(data.len(), bpp, rowstride, x, y, w, h)?;
        Ok(Self {
            source: Source::Buffer { data, rowstride },
            x,
            y,
            w,
            h,
            bpp,
            dirty: false,
        })
    }

    /// Writable region over a flat buffer.
    pub fn from_buffer_mut(
        data: &'a mut [u8],
        bpp: u32,
        rowstride: usize,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Self> {
        check_buffer(data.len(), bpp, rowstride, x, y, w, h)?;
        Ok(Self {
            source: Source::BufferMut { data, rowstride },
            x,
            y,
            w,
            h,
            bpp,
            dirty: true,
        })
    }

    /// Left edge within the source.
    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Top edge within the source.
    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.w
    }

    /// Height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.h
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    /// Whether accesses write-lock and dirty the source.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The region rectangle in source coordinates.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Whether the region is backed by a tile manager.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        matches!(self.source, Source::Tiles(_))
    }

    /// Copies the source span `[x, x + w)` of row `y` into `buf`, taking
    /// every `subsample`-th pixel.
    ///
    /// Writes `ceil(w / subsample)` pixels.
    ///
    /// # Panics
    ///
    /// If the span leaves the region or `buf` is too short.
    pub fn get_row(&self, x: u32, y: u32, w: u32, buf: &mut [u8], subsample: u32) {
        let subsample = subsample.max(1);
        self.check_span(x, y, w, 1);
        let bpp = self.bpp as usize;
        assert!(buf.len() >= w.div_ceil(subsample) as usize * bpp, "row buffer too short");

        match &self.source {
            Source::Tiles(tm) => {
                let end = x + w;
                let mut sx = x;
                let mut out = 0;
                while sx < end {
                    let tile = tiled(tm.read_tile(0, sx, y), sx, y);
                    let boundary = (tile.x() + tile.width()).min(end);
                    let ty = y - tile.y();
                    while sx < boundary {
                        let o = tile.offset(sx - tile.x(), ty);
                        if subsample == 1 {
                            let n = (boundary - sx) as usize * bpp;
                            buf[out..out + n].copy_from_slice(&tile.data()[o..o + n]);
                            out += n;
                            sx = boundary;
                        } else {
                            buf[out..out + bpp].copy_from_slice(&tile.data()[o..o + bpp]);
                            out += bpp;
                            sx += subsample;
                        }
                    }
                }
            }
            Source::Buffer { data, rowstride } => {
                copy_row_out(data, *rowstride, bpp, x, y, w, subsample, buf)
            }
            Source::BufferMut { data, rowstride } => {
                copy_row_out(data, *rowstride, bpp, x, y, w, subsample, buf)
            }
        }
    }

    /// Copies `w` pixels from `buf` into row `y` starting at `x`.
    ///
    /// # Panics
    ///
    /// If the region is read-only, the span leaves the region or `buf` is
    /// too short.
    pub fn set_row(&mut self, x: u32, y: u32, w: u32, buf: &[u8]) {
        self.check_span(x, y, w, 1);
        assert!(self.dirty, "set_row on a read-only region");
        let bpp = self.bpp as usize;
        assert!(buf.len() >= w as usize * bpp, "row buffer too short");

        match &mut self.source {
            Source::Tiles(tm) => {
                let end = x + w;
                let mut sx = x;
                let mut src = 0;
                while sx < end {
                    let mut tile = tiled(tm.write_tile(0, sx, y), sx, y);
                    let boundary = (tile.x() + tile.width()).min(end);
                    let o = tile.offset(sx - tile.x(), y - tile.y());
                    let n = (boundary - sx) as usize * bpp;
                    tile.data_mut()[o..o + n].copy_from_slice(&buf[src..src + n]);
                    src += n;
                    sx = boundary;
                }
            }
            Source::BufferMut { data, rowstride } => {
                let o = y as usize * *rowstride + x as usize * bpp;
                let n = w as usize * bpp;
                data[o..o + n].copy_from_slice(&buf[..n]);
            }
            Source::Buffer { .. } => unreachable!("read-only buffers are never dirty"),
        }
    }

    /// Copies the source span `[y, y + h)` of column `x` into `buf`,
    /// taking every `subsample`-th pixel.
    pub fn get_col(&self, x: u32, y: u32, h: u32, buf: &mut [u8], subsample: u32) {
        let subsample = subsample.max(1);
        self.check_span(x, y, 1, h);
        let bpp = self.bpp as usize;
        assert!(buf.len() >= h.div_ceil(subsample) as usize * bpp, "column buffer too short");

        match &self.source {
            Source::Tiles(tm) => {
                let end = y + h;
                let mut sy = y;
                let mut out = 0;
                while sy < end {
                    let tile = tiled(tm.read_tile(0, x, sy), x, sy);
                    let boundary = (tile.y() + tile.height()).min(end);
                    let tx = x - tile.x();
                    while sy < boundary {
                        let o = tile.offset(tx, sy - tile.y());
                        buf[out..out + bpp].copy_from_slice(&tile.data()[o..o + bpp]);
                        out += bpp;
                        sy += subsample;
                    }
                }
            }
            Source::Buffer { data, rowstride } => {
                copy_col_out(data, *rowstride, bpp, x, y, h, subsample, buf)
            }
            Source::BufferMut { data, rowstride } => {
                copy_col_out(data, *rowstride, bpp, x, y, h, subsample, buf)
            }
        }
    }

    /// Copies `h` pixels from `buf` into column `x` starting at `y`.
    pub fn set_col(&mut self, x: u32, y: u32, h: u32, buf: &[u8]) {
        self.check_span(x, y, 1, h);
        assert!(self.dirty, "set_col on a read-only region");
        let bpp = self.bpp as usize;
        assert!(buf.len() >= h as usize * bpp, "column buffer too short");

        match &mut self.source {
            Source::Tiles(tm) => {
                let end = y + h;
                let mut sy = y;
                let mut src = 0;
                while sy < end {
                    let mut tile = tiled(tm.write_tile(0, x, sy), x, sy);
                    let boundary = (tile.y() + tile.height()).min(end);
                    let tx = x - tile.x();
                    while sy < boundary {
                        let o = tile.offset(tx, sy - tile.y());
                        tile.data_mut()[o..o + bpp].copy_from_slice(&buf[src..src + bpp]);
                        src += bpp;
                        sy += 1;
                    }
                }
            }
            Source::BufferMut { data, rowstride } => {
                for (i, px) in buf.chunks_exact(bpp).take(h as usize).enumerate() {
                    let o = (y as usize + i) * *rowstride + x as usize * bpp;
                    data[o..o + bpp].copy_from_slice(px);
                }
            }
            Source::Buffer { .. } => unreachable!("read-only buffers are never dirty"),
        }
    }

    fn check_span(&self, x: u32, y: u32, w: u32, h: u32) {
        assert!(
            self.rect().contains_rect(&Rect::new(x, y, w, h)),
            "span ({x}, {y}, {w}x{h}) outside region {}",
            self.rect()
        );
    }

    /// Largest (width, height) this region can expose contiguously at
    /// source position (x, y).
    fn contiguous_extent(&self, x: u32, y: u32) -> (u32, u32) {
        match &self.source {
            Source::Tiles(tm) => (
                tm.tile_width() - x % tm.tile_width(),
                tm.tile_height() - y % tm.tile_height(),
            ),
            Source::Buffer { .. } | Source::BufferMut { .. } => (u32::MAX, u32::MAX),
        }
    }
}

impl fmt::Debug for PixelRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Tiles(_) => "tiles",
            Source::Buffer { .. } => "buffer",
            Source::BufferMut { .. } => "buffer_mut",
        };
        f.debug_struct("PixelRegion")
            .field("source", &kind)
            .field("rect", &self.rect())
            .field("bpp", &self.bpp)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn check_buffer(len: usize, bpp: u32, rowstride: usize, x: u32, y: u32, w: u32, h: u32) -> Result<()> {
    let err = || Error::InvalidStride {
        stride: rowstride,
        len,
        width: w,
        height: h,
        bpp,
    };
    if bpp == 0 {
        return Err(err());
    }
    if w == 0 || h == 0 {
        return Ok(());
    }
    let row_end = (x as usize + w as usize) * bpp as usize;
    if row_end > rowstride {
        return Err(err());
    }
    let need = (y as usize + h as usize - 1) * rowstride + row_end;
    if need > len {
        return Err(err());
    }
    Ok(())
}

#[inline]
fn tiled<G>(guard: Option<G>, x: u32, y: u32) -> G {
    match guard {
        Some(g) => g,
        None => panic!("pixel ({x}, {y}) outside tile manager"),
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_row_out(data: &[u8], rowstride: usize, bpp: usize, x: u32, y: u32, w: u32, subsample: u32, buf: &mut [u8]) {
    let base = y as usize * rowstride;
    for (out, sx) in (x..x + w).step_by(subsample as usize).enumerate() {
        let o = base + sx as usize * bpp;
        buf[out * bpp..(out + 1) * bpp].copy_from_slice(&data[o..o + bpp]);
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_col_out(data: &[u8], rowstride: usize, bpp: usize, x: u32, y: u32, h: u32, subsample: u32, buf: &mut [u8]) {
    for (out, sy) in (y..y + h).step_by(subsample as usize).enumerate() {
        let o = sy as usize * rowstride + x as usize * bpp;
        buf[out * bpp..(out + 1) * bpp].copy_from_slice(&data[o..o + bpp]);
    }
}

enum PortionData<'p> {
    Read(TileReadGuard<'p>),
    Write(TileWriteGuard<'p>),
    Slice(&'p [u8]),
    SliceMut(&'p mut [u8]),
}

/// One region's memory for the current portion.
///
/// Row `r` of the portion starts at `r * rowstride()` in [`data`](Self::data).
pub struct PortionBuf<'p> {
    data: PortionData<'p>,
    offset: usize,
    rowstride: usize,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    bpp: u32,
}

impl PortionBuf<'_> {
    /// Left edge in source coordinates.
    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Top edge in source coordinates.
    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Portion width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.w
    }

    /// Portion height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.h
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    /// Bytes between rows.
    #[inline]
    pub fn rowstride(&self) -> usize {
        self.rowstride
    }

    /// Whether the portion can be written.
    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self.data, PortionData::Write(_) | PortionData::SliceMut(_))
    }

    fn bytes(&self) -> &[u8] {
        match &self.data {
            PortionData::Read(g) => g.data(),
            PortionData::Write(g) => g.data(),
            PortionData::Slice(s) => s,
            PortionData::SliceMut(s) => s,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            PortionData::Write(g) => g.data_mut(),
            PortionData::SliceMut(s) => s,
            PortionData::Read(_) | PortionData::Slice(_) => {
                panic!("portion of a read-only region")
            }
        }
    }

    /// Bytes from the portion's top-left pixel to the end of the backing
    /// storage.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bytes()[self.offset..]
    }

    /// Mutable counterpart of [`data`](Self::data).
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        let o = self.offset;
        &mut self.bytes_mut()[o..]
    }

    /// Row `r` of the portion, `width * bpp` bytes.
    #[inline]
    pub fn row(&self, r: u32) -> &[u8] {
        assert!(r < self.h, "row {r} outside portion of height {}", self.h);
        let o = self.offset + r as usize * self.rowstride;
        &self.bytes()[o..o + self.w as usize * self.bpp as usize]
    }

    /// Mutable row `r`.
    #[inline]
    pub fn row_mut(&mut self, r: u32) -> &mut [u8] {
        assert!(r < self.h, "row {r} outside portion of height {}", self.h);
        let o = self.offset + r as usize * self.rowstride;
        let n = self.w as usize * self.bpp as usize;
        &mut self.bytes_mut()[o..o + n]
    }

    /// Portion-local pixel.
    #[inline]
    pub fn pixel(&self, px: u32, py: u32) -> &[u8] {
        let bpp = self.bpp as usize;
        &self.row(py)[px as usize * bpp..(px as usize + 1) * bpp]
    }
}

impl fmt::Debug for PortionBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortionBuf")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("w", &self.w)
            .field("h", &self.h)
            .field("rowstride", &self.rowstride)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// The current step of a [`Processor`].
#[derive(Debug)]
pub struct Portion<'p> {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    bufs: SmallVec<[PortionBuf<'p>; 4]>,
}

impl<'p> Portion<'p> {
    /// Left edge relative to the processed rectangle.
    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Top edge relative to the processed rectangle.
    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.w
    }

    /// Height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.h
    }

    /// Pixel count.
    #[inline]
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Number of regions.
    #[inline]
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    /// Always false; a processor has at least one region.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Memory of region `i`.
    #[inline]
    pub fn buffer(&self, i: usize) -> &PortionBuf<'p> {
        &self.bufs[i]
    }

    /// Mutable memory of region `i`.
    #[inline]
    pub fn buffer_mut(&mut self, i: usize) -> &mut PortionBuf<'p> {
        &mut self.bufs[i]
    }

    /// All regions, in registration order.
    #[inline]
    pub fn buffers(&self) -> &[PortionBuf<'p>] {
        &self.bufs
    }

    /// All regions mutably; destructure with a slice pattern to work on
    /// several at once.
    #[inline]
    pub fn buffers_mut(&mut self) -> &mut [PortionBuf<'p>] {
        &mut self.bufs
    }
}

/// Lock-step iterator over same-sized regions.
pub struct Processor<'a> {
    regions: SmallVec<[PixelRegion<'a>; 4]>,
    width: u32,
    height: u32,
    ofs_x: u32,
    ofs_y: u32,
    count: usize,
}

impl<'a> Processor<'a> {
    /// Registers regions for a synchronized walk.
    ///
    /// All regions must share one width and height.
    pub fn new(regions: impl IntoIterator<Item = PixelRegion<'a>>) -> Result<Self> {
        let regions: SmallVec<[PixelRegion<'a>; 4]> = regions.into_iter().collect();
        let Some(first) = regions.first() else {
            return Err(Error::invalid_parameter("processor needs at least one region"));
        };
        let (width, height) = (first.w, first.h);
        for r in regions.iter().skip(1) {
            if (r.w, r.h) != (width, height) {
                return Err(Error::dimension_mismatch((width, height), (r.w, r.h)));
            }
        }
        Ok(Self {
            regions,
            width,
            height,
            ofs_x: 0,
            ofs_y: 0,
            count: 0,
        })
    }

    /// Width of the processed rectangle.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the processed rectangle.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Portions yielded so far.
    #[inline]
    pub fn portions_processed(&self) -> usize {
        self.count
    }

    /// Advances to the next portion, `None` once the rectangle is covered.
    ///
    /// Zero-area rectangles yield nothing.
    pub fn process(&mut self) -> Option<Portion<'_>> {
        if self.width == 0 || self.height == 0 || self.ofs_y >= self.height {
            return None;
        }

        let (ox, oy) = (self.ofs_x, self.ofs_y);
        let mut pw = self.width - ox;
        let mut ph = self.height - oy;
        for r in &self.regions {
            let (cw, ch) = r.contiguous_extent(r.x + ox, r.y + oy);
            pw = pw.min(cw);
            ph = ph.min(ch);
        }

        self.ofs_x += pw;
        if self.ofs_x >= self.width {
            self.ofs_x = 0;
            self.ofs_y += ph;
        }
        self.count += 1;

        let mut bufs = SmallVec::new();
        for region in self.regions.iter_mut() {
            let (rx, ry) = (region.x + ox, region.y + oy);
            let bpp = region.bpp;
            let dirty = region.dirty;
            let (data, offset, rowstride) = match &mut region.source {
                Source::Tiles(tm) => {
                    let tm: &TileManager = tm;
                    let tile = tiled(tm.tile(0, rx, ry), rx, ry);
                    let g = tile.geometry();
                    let rowstride = g.width as usize * bpp as usize;
                    let offset = (ry - g.y) as usize * rowstride + (rx - g.x) as usize * bpp as usize;
                    let data = if dirty {
                        PortionData::Write(tile.write())
                    } else {
                        PortionData::Read(tile.read())
                    };
                    (data, offset, rowstride)
                }
                Source::Buffer { data, rowstride } => (
                    PortionData::Slice(&**data),
                    ry as usize * *rowstride + rx as usize * bpp as usize,
                    *rowstride,
                ),
                Source::BufferMut { data, rowstride } => (
                    PortionData::SliceMut(&mut **data),
                    ry as usize * *rowstride + rx as usize * bpp as usize,
                    *rowstride,
                ),
            };
            bufs.push(PortionBuf {
                data,
                offset,
                rowstride,
                x: rx,
                y: ry,
                w: pw,
                h: ph,
                bpp,
            });
        }

        Some(Portion {
            x: ox,
            y: oy,
            w: pw,
            h: ph,
            bufs,
        })
    }

    /// Runs `f` on every remaining portion.
    pub fn for_each(mut self, mut f: impl FnMut(&mut Portion<'_>)) {
        while let Some(mut portion) = self.process() {
            f(&mut portion);
        }
    }
}

impl fmt::Debug for Processor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("regions", &self.regions)
            .field("size", &(self.width, self.height))
            .field("offset", &(self.ofs_x, self.ofs_y))
            .field("count", &self.count)
            .finish()
    }
}
