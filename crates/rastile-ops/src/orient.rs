//! Exact flips and quarter-turn rotations.
//!
//! These copy whole rows and columns without interpolation, so applying
//! an operation and its inverse restores the data bit for bit. New
//! offsets use integer placement arithmetic: the relevant corner is
//! mirrored or rotated about the axis or centre and rounded to the
//! nearest integer (ties to even).

use rastile_core::{Bounds, PixelRegion, TileManager};
use tracing::{debug, trace};

use crate::options::ClipMode;
use crate::source::SourceKind;
use crate::OpsResult;

/// Mirror axis orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlipAxis {
    /// Mirror left-right about the vertical line `x = axis`.
    Horizontal,
    /// Mirror top-bottom about the horizontal line `y = axis`.
    Vertical,
}

/// Clockwise quarter turn (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// 90° clockwise.
    Rotate90,
    /// Half turn.
    Rotate180,
    /// 90° counter-clockwise.
    Rotate270,
}

impl Rotation {
    /// Rotates image point (x, y) about (cx, cy).
    pub fn rotate_point(self, x: f64, y: f64, cx: f64, cy: f64) -> (f64, f64) {
        match self {
            Self::Rotate90 => (cx - y + cy, cy + x - cx),
            Self::Rotate180 => (cx - (x - cx), cy - (y - cy)),
            Self::Rotate270 => (cx + y - cy, cy - x + cx),
        }
    }

    /// Turn that undoes this one.
    pub fn inverse(self) -> Self {
        match self {
            Self::Rotate90 => Self::Rotate270,
            Self::Rotate180 => Self::Rotate180,
            Self::Rotate270 => Self::Rotate90,
        }
    }

    fn swaps_axes(self) -> bool {
        !matches!(self, Self::Rotate180)
    }
}

/// Mirrors `source` about `axis`.
///
/// With [`ClipMode::Clip`] the result keeps the source extent and pixels
/// the flip does not reach are transparent (layers with alpha, channels)
/// or `background`.
///
/// ```rust
/// use rastile_core::{PixelLayout, TileManager};
/// use rastile_ops::{ClipMode, FlipAxis, SourceKind, flip};
///
/// let mut tiles = TileManager::new(4, 2, 1).unwrap();
/// tiles.set_offsets(10, 0);
/// tiles.write_pixel(0, 0, &[9]);
///
/// let kind = SourceKind::Layer(PixelLayout::GRAY);
/// let flipped = flip(&tiles, kind, FlipAxis::Horizontal, 10.0, ClipMode::Adjust, &[]).unwrap();
/// assert_eq!(flipped.offsets(), (6, 0));
/// let mut px = [0u8];
/// flipped.read_pixel(3, 0, &mut px);
/// assert_eq!(px, [9]);
/// ```
pub fn flip(
    source: &TileManager,
    kind: SourceKind,
    axis_kind: FlipAxis,
    axis: f64,
    clip: ClipMode,
    background: &[u8],
) -> OpsResult<TileManager> {
    trace!(?axis_kind, axis, ?clip, "flip");
    check_inputs(source, kind, background)?;

    let (x, y) = source.offsets();
    let (w, h) = (source.width(), source.height());
    let (new_x, new_y) = match axis_kind {
        FlipAxis::Horizontal => (mirror(x, w, axis), y),
        FlipAxis::Vertical => (x, mirror(y, h, axis)),
    };
    debug!(new_x, new_y, "flip offsets");

    let mut out = TileManager::with_config(w, h, source.bpp(), source.config())?;
    out.set_offsets(new_x, new_y);
    {
        let src = PixelRegion::full(source, false);
        let mut dst = PixelRegion::full(&out, true);
        let bpp = source.bpp() as usize;
        let mut row = vec![0u8; w as usize * bpp];
        for j in 0..h {
            match axis_kind {
                FlipAxis::Horizontal => {
                    src.get_row(0, j, w, &mut row, 1);
                    reverse_pixels(&mut row, bpp);
                    dst.set_row(0, j, w, &row);
                }
                FlipAxis::Vertical => {
                    src.get_row(0, j, w, &mut row, 1);
                    dst.set_row(0, h - 1 - j, w, &row);
                }
            }
        }
    }

    finish(source, kind, out, clip, background)
}

/// Turns `source` a quarter, half or three-quarter turn about (cx, cy).
///
/// `clip` behaves as in [`flip`].
pub fn rotate(
    source: &TileManager,
    kind: SourceKind,
    rotation: Rotation,
    center_x: f64,
    center_y: f64,
    clip: ClipMode,
    background: &[u8],
) -> OpsResult<TileManager> {
    trace!(?rotation, center_x, center_y, ?clip, "rotate");
    check_inputs(source, kind, background)?;

    let (x, y) = source.offsets();
    let (w, h) = (source.width(), source.height());
    let (fx, fy, fw, fh) = (x as f64, y as f64, w as f64, h as f64);

    // corner that becomes the new top-left
    let corner = match rotation {
        Rotation::Rotate90 => (fx, fy + fh),
        Rotation::Rotate180 => (fx + fw, fy + fh),
        Rotation::Rotate270 => (fx + fw, fy),
    };
    let (nx, ny) = rotation.rotate_point(corner.0, corner.1, center_x, center_y);
    let (new_x, new_y) = (nx.round_ties_even() as i32, ny.round_ties_even() as i32);
    let (new_w, new_h) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
    debug!(new_x, new_y, new_w, new_h, "rotate placement");

    let mut out = TileManager::with_config(new_w, new_h, source.bpp(), source.config())?;
    out.set_offsets(new_x, new_y);
    {
        let src = PixelRegion::full(source, false);
        let mut dst = PixelRegion::full(&out, true);
        let bpp = source.bpp() as usize;
        let mut line = vec![0u8; w.max(h) as usize * bpp];
        match rotation {
            Rotation::Rotate90 => {
                for j in 0..new_h {
                    let buf = &mut line[..h as usize * bpp];
                    src.get_col(j, 0, h, buf, 1);
                    reverse_pixels(buf, bpp);
                    dst.set_row(0, j, new_w, buf);
                }
            }
            Rotation::Rotate270 => {
                for j in 0..new_h {
                    let buf = &mut line[..h as usize * bpp];
                    src.get_col(w - 1 - j, 0, h, buf, 1);
                    dst.set_row(0, j, new_w, buf);
                }
            }
            Rotation::Rotate180 => {
                for j in 0..new_h {
                    let buf = &mut line[..w as usize * bpp];
                    src.get_row(0, h - 1 - j, w, buf, 1);
                    reverse_pixels(buf, bpp);
                    dst.set_row(0, j, new_w, buf);
                }
            }
        }
    }

    finish(source, kind, out, clip, background)
}

fn check_inputs(source: &TileManager, kind: SourceKind, background: &[u8]) -> OpsResult<()> {
    kind.check(source)?;
    if background.len() > source.bpp() as usize {
        return Err(rastile_core::Error::channel_mismatch(source.bpp(), background.len() as u32).into());
    }
    Ok(())
}

/// `rint(-(pos + size - axis) + axis)`
fn mirror(pos: i32, size: u32, axis: f64) -> i32 {
    (-(pos as f64 + size as f64 - axis) + axis).round_ties_even() as i32
}

fn reverse_pixels(buf: &mut [u8], bpp: usize) {
    let n = buf.len() / bpp;
    for i in 0..n / 2 {
        let (a, b) = (i * bpp, (n - 1 - i) * bpp);
        for c in 0..bpp {
            buf.swap(a + c, b + c);
        }
    }
}

fn finish(
    source: &TileManager,
    kind: SourceKind,
    result: TileManager,
    clip: ClipMode,
    background: &[u8],
) -> OpsResult<TileManager> {
    match clip {
        ClipMode::Adjust => Ok(result),
        ClipMode::Clip => clip_to_source(source, kind, &result, background),
    }
}

/// Copies the part of `result` over the source extent into a buffer of
/// the source's size and placement.
fn clip_to_source(
    source: &TileManager,
    kind: SourceKind,
    result: &TileManager,
    background: &[u8],
) -> OpsResult<TileManager> {
    let (sx, sy) = source.offsets();
    let mut out = TileManager::with_config(source.width(), source.height(), source.bpp(), source.config())?;
    out.set_offsets(sx, sy);
    if !kind.has_transparency() {
        out.fill(background);
    }

    let target: Bounds = source.bounds();
    let placed = result.bounds();
    let Some(overlap) = target.intersect(&placed) else {
        debug!(%target, %placed, "clipped result is empty");
        return Ok(out);
    };

    let from = overlap.to_rect(placed.x1, placed.y1);
    let to = overlap.to_rect(sx, sy);
    let stride = from.width as usize * source.bpp() as usize;
    let mut buf = vec![0u8; stride * from.height as usize];
    result.read_pixel_data(from, &mut buf, stride);
    out.write_pixel_data(to, &buf, stride);
    Ok(out)
}
