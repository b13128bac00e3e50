//! Affine and perspective transforms of tiled buffers.
//!
//! The destination is produced by inverse mapping: every destination pixel
//! (x, y), in image coordinates, is sent through the inverse matrix into
//! the source and reconstructed there with the chosen [`Interpolation`].
//!
//! # Example
//!
//! ```rust
//! use rastile_core::{PixelLayout, TileManager};
//! use rastile_math::Matrix3;
//! use rastile_ops::{Interpolation, SourceKind, TransformOptions, transform_tiles};
//!
//! let src = TileManager::new(32, 16, 4).unwrap();
//! src.fill(&[200, 10, 10, 255]);
//!
//! let m = Matrix3::IDENTITY.scale(2.0, 2.0);
//! let opts = TransformOptions::default().with_interpolation(Interpolation::Linear);
//! let dst = transform_tiles(&src, SourceKind::Layer(PixelLayout::RGBA), &m, &opts, &[0; 4], None).unwrap();
//! assert_eq!((dst.width(), dst.height()), (64, 32));
//! ```

use rastile_core::{MAX_CHANNELS, PixelRegion, PixelSurround, Processor, TileManager};
use rastile_math::Matrix3;
use tracing::{debug, trace, warn};

use crate::options::{ClipMode, Direction, Interpolation, TransformOptions};
use crate::progress::Progress;
use crate::resample::{self, LanczosSampler, pixel_index};
use crate::source::{AlphaLayout, SourceKind};
use crate::{OpsError, OpsResult};

/// Progress is reported once per this many portions.
const PROGRESS_INTERVAL: usize = 16;

/// Slack when snapping transformed corners outward to whole pixels.
const BOUNDS_EPSILON: f64 = 1e-6;

/// Transforms `source` into a newly allocated manager.
///
/// `matrix` maps source image coordinates to destination image
/// coordinates when `options.direction` is [`Direction::Forward`], and
/// the other way round for [`Direction::Backward`]. The result carries
/// the source's tile configuration; its offsets are the top-left corner
/// of the destination box.
///
/// # Errors
///
/// [`OpsError::SingularMatrix`] when the matrix cannot be inverted, plus
/// everything [`transform_region`] rejects.
pub fn transform_tiles(
    source: &TileManager,
    kind: SourceKind,
    matrix: &Matrix3,
    options: &TransformOptions,
    background: &[u8],
    progress: Option<&mut dyn Progress>,
) -> OpsResult<TileManager> {
    trace!(
        width = source.width(),
        height = source.height(),
        bpp = source.bpp(),
        ?options,
        "transform_tiles"
    );
    options.validate()?;
    kind.check(source)?;

    let singular = || OpsError::SingularMatrix(matrix.determinant());
    let (forward, inverse) = match options.direction {
        Direction::Forward => (*matrix, matrix.invert().ok_or_else(singular)?),
        Direction::Backward => (matrix.invert().ok_or_else(singular)?, *matrix),
    };

    let (x1, y1, x2, y2) = match options.clip {
        ClipMode::Clip => source_extent(source),
        ClipMode::Adjust => transformed_extent(source, &forward),
    };
    debug!(x1, y1, x2, y2, clip = ?options.clip, "transform destination box");

    let origin = (to_offset(x1)?, to_offset(y1)?);
    let mut dest = TileManager::with_config(to_size(x2 - x1)?, to_size(y2 - y1)?, source.bpp(), source.config())?;
    dest.set_offsets(origin.0, origin.1);

    transform_region(
        source,
        kind,
        PixelRegion::full(&dest, true),
        origin,
        &inverse,
        options,
        background,
        progress,
    )?;
    Ok(dest)
}

/// Fills a writable `dest` region by sampling `source` through `inverse`.
///
/// `dest_origin` is the image position of the destination manager's
/// pixel (0, 0); `inverse` maps destination image coordinates to source
/// image coordinates. `options.direction` and `options.clip` are ignored.
///
/// # Errors
///
/// Fails when the options are out of range, `kind` does not fit
/// `source`, `dest` is read-only or has a different pixel size, or the
/// background has more bytes than a pixel.
///
/// # Panics
///
/// If `dest` lies over `source` itself.
#[allow(clippy::too_many_arguments)]
pub fn transform_region(
    source: &TileManager,
    kind: SourceKind,
    dest: PixelRegion<'_>,
    dest_origin: (i32, i32),
    inverse: &Matrix3,
    options: &TransformOptions,
    background: &[u8],
    progress: Option<&mut dyn Progress>,
) -> OpsResult<()> {
    options.validate()?;
    kind.check(source)?;
    if dest.bpp() != source.bpp() {
        return Err(rastile_core::Error::channel_mismatch(source.bpp(), dest.bpp()).into());
    }
    if background.len() > source.bpp() as usize {
        return Err(rastile_core::Error::channel_mismatch(source.bpp(), background.len() as u32).into());
    }
    if !dest.is_dirty() {
        return Err(OpsError::InvalidParameter("transform destination is read-only".into()));
    }

    let interpolation = if kind.is_indexed() || inverse.is_simple() {
        Interpolation::None
    } else {
        options.interpolation
    };
    debug!(
        ?interpolation,
        requested = ?options.interpolation,
        supersample = options.supersample,
        "transform sampling"
    );

    let bpp = source.bpp() as usize;
    let y1 = dest_origin.1 + dest.y() as i32;
    let y2 = y1 + dest.height() as i32;
    let mut sampler = PixelSampler::new(source, kind, inverse, interpolation, options, background)?;
    let mut progress = progress;
    let mut current = y1;

    let mut proc = Processor::new([dest])?;
    let region_width = proc.width();
    loop {
        // rows above a band are complete once its rightmost portion is done
        let band_done = {
            let Some(mut portion) = proc.process() else {
                break;
            };
            let band_end = portion.x() + portion.width() == region_width;
            let buf = portion.buffer_mut(0);
            let (px, py, pw, ph) = (buf.x(), buf.y(), buf.width(), buf.height());
            for r in 0..ph {
                let dy = (dest_origin.1 as i64 + (py + r) as i64) as f64;
                let row = buf.row_mut(r);
                for (i, out) in row.chunks_exact_mut(bpp).take(pw as usize).enumerate() {
                    let dx = (dest_origin.0 as i64 + px as i64 + i as i64) as f64;
                    sampler.sample(dx, dy, out);
                }
            }
            band_end.then_some(dest_origin.1 + (py + ph) as i32)
        };

        if let Some(bottom) = band_done {
            current = current.max(bottom);
        }
        if proc.portions_processed() % PROGRESS_INTERVAL == 0 {
            if let Some(p) = progress.as_mut() {
                p.update(y1, y2, current);
            }
        }
    }
    if let Some(p) = progress.as_mut() {
        p.update(y1, y2, y2);
    }

    if sampler.zero_w > 0 {
        warn!(count = sampler.zero_w, "homogeneous w was zero; coordinates left undivided");
    }
    Ok(())
}

/// Source extent in image coordinates, as `(x1, y1, x2, y2)`.
fn source_extent(source: &TileManager) -> (i64, i64, i64, i64) {
    let (ox, oy) = source.offsets();
    let (x, y) = (ox as i64, oy as i64);
    (x, y, x + source.width() as i64, y + source.height() as i64)
}

/// Whole-pixel box around the forward-mapped source corners.
fn transformed_extent(source: &TileManager, forward: &Matrix3) -> (i64, i64, i64, i64) {
    let (sx1, sy1, sx2, sy2) = source_extent(source);
    let corners = [(sx1, sy1), (sx2, sy1), (sx1, sy2), (sx2, sy2)]
        .map(|(x, y)| forward.transform_point(x as f64, y as f64));

    if corners.iter().any(|(u, v)| !u.is_finite() || !v.is_finite()) {
        warn!(?corners, "transformed corners are not finite, keeping the source extent");
        return (sx1, sy1, sx2, sy2);
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (u, v) in corners {
        min_x = min_x.min(u);
        min_y = min_y.min(v);
        max_x = max_x.max(u);
        max_y = max_y.max(v);
    }

    let x1 = (min_x + BOUNDS_EPSILON).floor() as i64;
    let y1 = (min_y + BOUNDS_EPSILON).floor() as i64;
    let x2 = ((max_x - BOUNDS_EPSILON).ceil() as i64).max(x1 + 1);
    let y2 = ((max_y - BOUNDS_EPSILON).ceil() as i64).max(y1 + 1);
    (x1, y1, x2, y2)
}

fn to_offset(v: i64) -> OpsResult<i32> {
    i32::try_from(v).map_err(|_| OpsError::InvalidParameter(format!("destination offset {v} out of range")))
}

fn to_size(v: i64) -> OpsResult<u32> {
    u32::try_from(v).map_err(|_| OpsError::InvalidParameter(format!("destination size {v} out of range")))
}

/// Reconstruction state for one transform call.
enum Filter<'a> {
    Nearest,
    Linear(PixelSurround<'a>),
    Cubic(PixelSurround<'a>),
    Lanczos(LanczosSampler<'a>),
}

struct PixelSampler<'a> {
    source: &'a TileManager,
    inverse: Matrix3,
    /// Source offsets, subtracted to get buffer coordinates.
    origin: (f64, f64),
    size: (i64, i64),
    layout: AlphaLayout,
    bg: [u8; MAX_CHANNELS],
    filter: Filter<'a>,
    supersample: Option<u32>,
    zero_w: u64,
}

impl<'a> PixelSampler<'a> {
    fn new(
        source: &'a TileManager,
        kind: SourceKind,
        inverse: &Matrix3,
        interpolation: Interpolation,
        options: &TransformOptions,
        background: &[u8],
    ) -> OpsResult<Self> {
        let bpp = source.bpp() as usize;
        let bg = kind.background(background, bpp);
        let filter = match interpolation {
            Interpolation::None => Filter::Nearest,
            Interpolation::Linear => Filter::Linear(PixelSurround::new(source, 2, 2, &bg[..bpp])?),
            Interpolation::Cubic => Filter::Cubic(PixelSurround::new(source, 4, 4, &bg[..bpp])?),
            Interpolation::Lanczos => Filter::Lanczos(LanczosSampler::new(source, options.lanczos_width)?),
        };
        let (ox, oy) = source.offsets();
        Ok(Self {
            source,
            inverse: *inverse,
            origin: (ox as f64, oy as f64),
            size: (source.width() as i64, source.height() as i64),
            layout: kind.alpha_layout(bpp),
            bg,
            filter,
            supersample: (options.supersample && interpolation != Interpolation::None)
                .then_some(options.recursion_level),
            zero_w: 0,
        })
    }

    /// Source buffer coordinates of destination image point (x, y).
    fn map(&mut self, x: f64, y: f64) -> [f64; 2] {
        let [u, v, w] = self.inverse.transform_homogeneous(x, y);
        let (u, v) = if w == 0.0 {
            self.zero_w += 1;
            (u, v)
        } else {
            (u / w, v / w)
        };
        [u - self.origin.0, v - self.origin.1]
    }

    fn fill_background(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.bg[..self.layout.bpp]);
    }

    /// Whether pixels `floor(u) + lo ..= floor(u) + hi` (same for v)
    /// overlap the source.
    fn window_hits(&self, u: f64, v: f64, lo: i64, hi: i64) -> bool {
        let (Some(iu), Some(iv)) = (pixel_index(u), pixel_index(v)) else {
            return false;
        };
        let (iu, iv) = (iu as i64, iv as i64);
        iu + hi >= 0 && iu + lo < self.size.0 && iv + hi >= 0 && iv + lo < self.size.1
    }

    /// Whether the 2x2 footprints of every point in the quad miss the source.
    fn quad_misses(&self, quad: &[[f64; 2]; 4]) -> bool {
        let (mut min, mut max) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
        for p in quad {
            for k in 0..2 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        let limits = [self.size.0 as f64, self.size.1 as f64];
        (0..2).any(|k| max[k].floor() + 1.0 < 0.0 || min[k].floor() >= limits[k])
    }

    fn sample(&mut self, x: f64, y: f64, out: &mut [u8]) {
        let center = self.map(x, y);
        if !center.iter().all(|c| c.is_finite()) {
            self.fill_background(out);
            return;
        }

        if let Some(level) = self.supersample {
            let quad = [
                self.map(x - 1.0, y),
                self.map(x, y - 1.0),
                self.map(x + 1.0, y),
                self.map(x, y + 1.0),
            ];
            if quad.iter().flatten().all(|c| c.is_finite()) && resample::supersample_needed(&quad) {
                if self.quad_misses(&quad) {
                    self.fill_background(out);
                } else {
                    resample::sample_adapt(self.source, center, &quad, level, &self.bg, &self.layout, out);
                }
                return;
            }
        }

        let [u, v] = center;
        let hit = match self.filter {
            Filter::Nearest => true,
            Filter::Linear(_) => self.window_hits(u, v, 0, 1),
            Filter::Cubic(_) => self.window_hits(u, v, -1, 2),
            Filter::Lanczos(_) => self.window_hits(u, v, 0, 0),
        };
        if !hit {
            self.fill_background(out);
            return;
        }

        match &mut self.filter {
            Filter::Nearest => resample::sample_nearest(self.source, u, v, &self.bg, out),
            Filter::Linear(s) => resample::sample_linear(s, u, v, &self.layout, out),
            Filter::Cubic(s) => resample::sample_cubic(s, u, v, &self.layout, out),
            Filter::Lanczos(l) => l.sample(u, v, &self.layout, out),
        }
    }
}
