//! Per-pixel reconstruction.
//!
//! Coordinates are continuous source-buffer coordinates: pixel (i, j)
//! covers `[i, i + 1) × [j, j + 1)` and its sample sits at (i, j), with no
//! half-pixel shift. Every filter blends colour premultiplied by alpha and
//! divides the result back out, so transparent pixels never bleed colour
//! into their neighbours.
//!
//! | filter | footprint | alpha > 255 | source access |
//! |--------|-----------|-------------|---------------|
//! | [`sample_nearest`] | 1 | - | direct read |
//! | [`sample_linear`] | 2x2 | clamped | [`PixelSurround`] |
//! | [`sample_cubic`] | 4x4 | clamped | [`PixelSurround`] |
//! | [`LanczosSampler`] | (2w+1)² | clamped | [`PixelSurround`], edge taps repeated |
//! | [`sample_adapt`] | quadtree of 2x2 | - | direct read |

use rastile_core::{MAX_CHANNELS, PixelSurround, TileManager};
use rastile_math::{LanczosKernel, bilinear, catmull_rom};

use crate::source::AlphaLayout;

/// Fractional bits of the supersampling fixed-point coordinates.
pub const FIXED_SHIFT: u32 = 10;

/// One source pixel in fixed point.
pub const FIXED_UNIT: i64 = 1 << FIXED_SHIFT;

/// Magnitude bound for fixed-point coordinates, so that sums and
/// differences of two of them stay in range.
const FIXED_LIMIT: f64 = (i64::MAX >> 12) as f64;

/// C-style `(int)(x + 0.5)`; truncates toward zero after the shift.
#[inline]
fn round_half_up(x: f64) -> i32 {
    (x + 0.5) as i32
}

#[inline]
fn clamp_u8(x: i32) -> u8 {
    x.clamp(0, 255) as u8
}

/// Writes the alpha of a blended pixel and returns the factor that
/// un-premultiplies its colours.
#[inline]
fn resolve_alpha(a_val: f64, layout: &AlphaLayout, out: &mut [u8]) -> f64 {
    if a_val <= 0.0 {
        layout.write_alpha(out, 0);
        0.0
    } else {
        let a = if a_val >= 255.0 { 255 } else { a_val.round_ties_even() as u8 };
        layout.write_alpha(out, a);
        1.0 / a_val
    }
}

/// Copies the pixel containing (u, v), or `bg` outside the buffer.
///
/// The pixel is found with `floor` in buffer coordinates, so a point just
/// left of or above pixel 0 reads as background.
pub fn sample_nearest(tiles: &TileManager, u: f64, v: f64, bg: &[u8], out: &mut [u8]) {
    let bpp = tiles.bpp() as usize;
    let hit = match (pixel_index(u), pixel_index(v)) {
        (Some(iu), Some(iv)) => tiles.read_pixel(iu, iv, out),
        _ => false,
    };
    if !hit {
        out[..bpp].copy_from_slice(&bg[..bpp]);
    }
}

/// `floor(v)` as a pixel index, `None` for non-finite or huge values.
#[inline]
pub(crate) fn pixel_index(v: f64) -> Option<i32> {
    let f = v.floor();
    if f.is_finite() && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// Bilinear sample from a 2x2 surround.
pub fn sample_linear(surround: &mut PixelSurround<'_>, u: f64, v: f64, layout: &AlphaLayout, out: &mut [u8]) {
    let (fu, fv) = (u.floor(), v.floor());
    let (du, dv) = (u - fu, v - fv);
    let view = surround.lock(fu as i32, fv as i32);
    let (d, rs, bpp) = (view.data(), view.rowstride(), layout.bpp);
    let offs = [0, bpp, rs, rs + bpp];
    let a = offs.map(|o| layout.alpha_at(d, o));

    let a_val = bilinear(a[0], a[1], a[2], a[3], du, dv);
    let a_recip = resolve_alpha(a_val, layout, out);

    for c in 0..layout.color_channels() {
        let p = |k: usize| a[k] * d[offs[k] + c] as f64;
        let blended = bilinear(p(0), p(1), p(2), p(3), du, dv);
        out[c] = clamp_u8(round_half_up(a_recip * blended));
    }
}

/// Catmull-Rom sample from a 4x4 surround whose top-left pixel is
/// `(floor(u) - 1, floor(v) - 1)`.
pub fn sample_cubic(surround: &mut PixelSurround<'_>, u: f64, v: f64, layout: &AlphaLayout, out: &mut [u8]) {
    let (fu, fv) = (u.floor(), v.floor());
    let (du, dv) = (u - fu, v - fv);
    let view = surround.lock(fu as i32 - 1, fv as i32 - 1);
    let (d, rs, bpp) = (view.data(), view.rowstride(), layout.bpp);

    let mut alpha = [[0.0f64; 4]; 4];
    for (j, row) in alpha.iter_mut().enumerate() {
        for (i, a) in row.iter_mut().enumerate() {
            *a = layout.alpha_at(d, j * rs + i * bpp);
        }
    }

    let cubic_rows = |f: &dyn Fn(usize, usize) -> f64| {
        let row = |j: usize| catmull_rom(du, f(j, 0), f(j, 1), f(j, 2), f(j, 3));
        catmull_rom(dv, row(0), row(1), row(2), row(3))
    };

    let a_val = cubic_rows(&|j, i| alpha[j][i]);
    let a_recip = resolve_alpha(a_val, layout, out);

    for c in 0..layout.color_channels() {
        let blended = cubic_rows(&|j, i| alpha[j][i] * d[j * rs + i * bpp + c] as f64);
        out[c] = clamp_u8(round_half_up(a_recip * blended));
    }
}

/// Lanczos resampler with its lookup table and a (2w+1)² surround.
///
/// Taps past the buffer edge repeat the nearest edge pixel. The pixel
/// containing the sample point must lie inside the buffer.
#[derive(Debug)]
pub struct LanczosSampler<'a> {
    kernel: LanczosKernel,
    surround: PixelSurround<'a>,
    size: (i64, i64),
    x_weights: Vec<f64>,
    y_weights: Vec<f64>,
    cols: Vec<usize>,
    rows: Vec<usize>,
}

impl<'a> LanczosSampler<'a> {
    /// Builds the table for half-width `width` over `tiles`.
    pub fn new(tiles: &'a TileManager, width: usize) -> rastile_core::Result<Self> {
        let kernel = LanczosKernel::new(width);
        let taps = kernel.taps();
        let surround = PixelSurround::new(tiles, taps as u32, taps as u32, &[])?;
        Ok(Self {
            kernel,
            surround,
            size: (tiles.width() as i64, tiles.height() as i64),
            x_weights: vec![0.0; taps],
            y_weights: vec![0.0; taps],
            cols: vec![0; taps],
            rows: vec![0; taps],
        })
    }

    /// Kernel half-width.
    #[inline]
    pub fn width(&self) -> usize {
        self.kernel.width()
    }

    /// Samples at (u, v).
    pub fn sample(&mut self, u: f64, v: f64, layout: &AlphaLayout, out: &mut [u8]) {
        let (fu, fv) = (u.floor(), v.floor());
        self.kernel.weights(u - fu, &mut self.x_weights);
        self.kernel.weights(v - fv, &mut self.y_weights);

        let half = self.kernel.width() as i64;
        let (x0, y0) = (fu as i64 - half, fv as i64 - half);
        clamped_taps(x0, self.size.0, &mut self.cols);
        clamped_taps(y0, self.size.1, &mut self.rows);

        let Self {
            surround,
            x_weights,
            y_weights,
            cols,
            rows,
            ..
        } = self;
        let view = surround.lock(saturate_i32(x0), saturate_i32(y0));
        let (w, rs, bpp) = (view.data(), view.rowstride(), layout.bpp);
        let offset = |j: usize, i: usize| rows[j] * rs + cols[i] * bpp;

        let mut a_val = 0.0;
        for (j, wy) in y_weights.iter().enumerate() {
            for (i, wx) in x_weights.iter().enumerate() {
                a_val += wy * wx * layout.alpha_at(w, offset(j, i));
            }
        }
        let a_recip = resolve_alpha(a_val, layout, out);

        for c in 0..layout.color_channels() {
            let mut acc = 0.0;
            for (j, wy) in y_weights.iter().enumerate() {
                for (i, wx) in x_weights.iter().enumerate() {
                    let o = offset(j, i);
                    acc += wy * wx * w[o + c] as f64 * layout.alpha_at(w, o);
                }
            }
            out[c] = clamp_u8(round_half_up(acc * a_recip));
        }
    }
}

/// Window index of each tap starting at `origin`, with the source
/// coordinate clamped into `0..size`.
fn clamped_taps(origin: i64, size: i64, out: &mut [usize]) {
    let last = out.len() as i64 - 1;
    for (k, slot) in out.iter_mut().enumerate() {
        let src = (origin + k as i64).clamp(0, size - 1);
        *slot = (src - origin).clamp(0, last) as usize;
    }
}

#[inline]
fn saturate_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// True when an edge of the quad (cycle 0-1-2-3) spans more than one
/// source pixel along either axis.
pub fn supersample_needed(quad: &[[f64; 2]; 4]) -> bool {
    (0..4).any(|k| {
        let (p, q) = (quad[k], quad[(k + 1) % 4]);
        (p[0] - q[0]).abs() > 1.0 || (p[1] - q[1]).abs() > 1.0
    })
}

fn supersample_needed_fixed(quad: &[[i64; 2]; 4]) -> bool {
    (0..4).any(|k| {
        let (p, q) = (quad[k], quad[(k + 1) % 4]);
        (p[0] - q[0]).abs() > FIXED_UNIT || (p[1] - q[1]).abs() > FIXED_UNIT
    })
}

/// Saturates far outside the buffer, where every sample reads as
/// background anyway.
#[inline]
fn to_fixed(v: f64) -> i64 {
    (v * FIXED_UNIT as f64).clamp(-FIXED_LIMIT, FIXED_LIMIT) as i64
}

/// Averages bilinear samples over the quad around `center`, subdividing
/// up to `level` times while an edge spans more than one pixel.
///
/// Returns the number of leaf samples taken.
pub fn sample_adapt(
    tiles: &TileManager,
    center: [f64; 2],
    quad: &[[f64; 2]; 4],
    level: u32,
    bg: &[u8],
    layout: &AlphaLayout,
    out: &mut [u8],
) -> u32 {
    let mut acc = [0u64; MAX_CHANNELS];
    let mut count = 0u32;
    let fixed = quad.map(|p| [to_fixed(p[0]), to_fixed(p[1])]);
    let mut bg_px = [0u8; MAX_CHANNELS];
    bg_px[..layout.bpp].copy_from_slice(&bg[..layout.bpp]);

    let mut ctx = AdaptContext {
        tiles,
        bg: bg_px,
        layout,
        acc: &mut acc,
        count: &mut count,
    };
    ctx.get_sample([to_fixed(center[0]), to_fixed(center[1])], fixed, level);

    let cc = count.max(1) as u64;
    let alpha = match layout.alpha {
        Some(a) => acc[a] / cc,
        None => 255,
    };
    layout.write_alpha(out, alpha as u8);
    for c in 0..layout.color_channels() {
        out[c] = if alpha != 0 {
            ((acc[c] / cc) * 255 / alpha).min(255) as u8
        } else {
            0
        };
    }
    count
}

struct AdaptContext<'a> {
    tiles: &'a TileManager,
    bg: [u8; MAX_CHANNELS],
    layout: &'a AlphaLayout,
    acc: &'a mut [u64; MAX_CHANNELS],
    count: &'a mut u32,
}

impl AdaptContext<'_> {
    fn get_sample(&mut self, c: [i64; 2], q: [[i64; 2]; 4], level: u32) {
        if level == 0 || !supersample_needed_fixed(&q) {
            let mut px = [0u8; MAX_CHANNELS];
            self.sample_bi(c, &mut px);
            for (acc, v) in self.acc.iter_mut().zip(&px[..self.layout.bpp]) {
                *acc += *v as u64;
            }
            *self.count += 1;
            return;
        }

        let mid = |a: [i64; 2], b: [i64; 2]| [(a[0] + b[0]) / 2, (a[1] + b[1]) / 2];
        let [p0, p1, p2, p3] = q;
        let top = mid(p0, p1);
        let left = mid(p0, p3);
        let right = mid(p1, p2);
        let bottom = mid(p3, p2);

        self.get_sample(mid(p0, c), [p0, top, c, left], level - 1);
        self.get_sample(mid(p1, c), [top, p1, right, c], level - 1);
        self.get_sample(mid(p2, c), [c, right, p2, bottom], level - 1);
        self.get_sample(mid(p3, c), [left, c, bottom, p3], level - 1);
    }

    /// Fixed-point bilinear sample; samples outside the buffer read as
    /// the background.
    fn sample_bi(&self, p: [i64; 2], out: &mut [u8; MAX_CHANNELS]) {
        let unit = FIXED_UNIT as u32;
        let xs = (p[0] & (FIXED_UNIT - 1)) as u32;
        let ys = (p[1] & (FIXED_UNIT - 1)) as u32;
        let (x0, y0) = (p[0] >> FIXED_SHIFT, p[1] >> FIXED_SHIFT);

        // 0: (x0, y0)  1: (x0, y1)  2: (x1, y0)  3: (x1, y1)
        let mut s = [self.bg; 4];
        for (k, (dx, dy)) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().enumerate() {
            if let (Ok(x), Ok(y)) = (i32::try_from(x0 + dx), i32::try_from(y0 + dy)) {
                self.tiles.read_pixel(x, y, &mut s[k]);
            }
        }

        let lerp = |v1: u32, v2: u32, r: u32| (v1 * (unit - r) + v2 * r) >> FIXED_SHIFT;
        let blend = |ch: [u32; 4]| lerp(lerp(ch[0], ch[1], ys), lerp(ch[2], ch[3], ys), xs);

        let alphas = s.map(|px| match self.layout.alpha {
            Some(a) => px[a] as u32,
            None => 255,
        });
        let alpha = blend(alphas);
        self.layout.write_alpha(out, alpha as u8);

        for c in 0..self.layout.color_channels() {
            out[c] = if alpha != 0 {
                let pre = [0, 1, 2, 3].map(|k| s[k][c] as u32 * alphas[k] / 255);
                blend(pre) as u8
            } else {
                0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastile_core::{PixelLayout, TileConfig};

    use crate::SourceKind;

    fn rgba() -> AlphaLayout {
        SourceKind::Layer(PixelLayout::RGBA).alpha_layout(4)
    }

    fn tiles_with(w: u32, h: u32, px: &[u8]) -> TileManager {
        let tiles = TileManager::new(w, h, px.len() as u32).unwrap();
        tiles.fill(px);
        tiles
    }

    #[test]
    fn test_nearest_floor_and_background() {
        let tiles = TileManager::new(4, 4, 2).unwrap();
        tiles.write_pixel(1, 2, &[5, 6]);
        let mut out = [0u8; 2];
        sample_nearest(&tiles, 1.99, 2.0, &[8, 0], &mut out);
        assert_eq!(out, [5, 6]);
        sample_nearest(&tiles, -0.5, 2.0, &[8, 0], &mut out);
        assert_eq!(out, [8, 0]);
        sample_nearest(&tiles, 1.0, -0.25, &[8, 0], &mut out);
        assert_eq!(out, [8, 0]);
        sample_nearest(&tiles, f64::NAN, 0.0, &[7, 0], &mut out);
        assert_eq!(out, [7, 0]);
    }

    #[test]
    fn test_linear_at_pixel_is_exact() {
        let tiles = TileManager::new(8, 8, 4).unwrap();
        tiles.write_pixel(3, 3, &[200, 100, 50, 255]);
        let mut surround = PixelSurround::new(&tiles, 2, 2, &[0; 4]).unwrap();
        let mut out = [0u8; 4];
        sample_linear(&mut surround, 3.0, 3.0, &rgba(), &mut out);
        assert_eq!(out, [200, 100, 50, 255]);
    }

    #[test]
    fn test_linear_premultiplied() {
        // opaque red next to transparent green: colour stays red
        let tiles = TileManager::new(2, 1, 4).unwrap();
        tiles.write_pixel(0, 0, &[255, 0, 0, 255]);
        tiles.write_pixel(1, 0, &[0, 255, 0, 0]);
        let mut surround = PixelSurround::new(&tiles, 2, 2, &[0; 4]).unwrap();
        let mut out = [0u8; 4];
        sample_linear(&mut surround, 0.5, 0.0, &rgba(), &mut out);
        assert_eq!(out, [255, 0, 0, 128]);
    }

    #[test]
    fn test_transparent_gives_zero() {
        let tiles = tiles_with(10, 10, &[90, 80, 70, 0]);
        let layout = rgba();
        let mut out = [1u8; 4];

        let mut s2 = PixelSurround::new(&tiles, 2, 2, &[0; 4]).unwrap();
        sample_linear(&mut s2, 4.3, 5.7, &layout, &mut out);
        assert_eq!(out, [0; 4]);

        out = [1; 4];
        let mut s4 = PixelSurround::new(&tiles, 4, 4, &[0; 4]).unwrap();
        sample_cubic(&mut s4, 4.3, 5.7, &layout, &mut out);
        assert_eq!(out, [0; 4]);

        out = [1; 4];
        LanczosSampler::new(&tiles, 3).unwrap().sample(4.3, 5.7, &layout, &mut out);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn test_cubic_flat_field() {
        let tiles = tiles_with(10, 10, &[40, 140, 240, 255]);
        let mut s4 = PixelSurround::new(&tiles, 4, 4, &[0; 4]).unwrap();
        let mut out = [0u8; 4];
        sample_cubic(&mut s4, 5.25, 4.75, &rgba(), &mut out);
        assert_eq!(out, [40, 140, 240, 255]);
    }

    #[test]
    fn test_lanczos_flat_field_and_clamp() {
        let tiles = tiles_with(5, 5, &[10, 20, 30, 255]);
        let mut sampler = LanczosSampler::new(&tiles, 3).unwrap();
        let mut out = [0u8; 4];
        // kernel reaches past the edge; clamped reads keep the field flat
        sampler.sample(0.4, 4.6, &rgba(), &mut out);
        assert_eq!(out, [10, 20, 30, 255]);
    }

    #[test]
    fn test_lanczos_edge_taps_repeat_across_tiles() {
        // rows vary, columns do not: clamping columns must not change the result
        let tiles = TileManager::with_config(30, 30, 4, TileConfig::new(8, 8).unwrap()).unwrap();
        for y in 0..30 {
            for x in 0..30 {
                tiles.write_pixel(x, y, &[(y * 20 % 256) as u8, 7, 0, 255]);
            }
        }
        let mut sampler = LanczosSampler::new(&tiles, 3).unwrap();
        let mut expect = [0u8; 4];
        sampler.sample(14.25, 12.625, &rgba(), &mut expect);
        for u in [0.25, 2.25, 7.25, 27.25, 29.25] {
            let mut out = [0u8; 4];
            sampler.sample(u, 12.625, &rgba(), &mut out);
            assert_eq!(out, expect, "u = {u}");
        }
        for v in [0.625, 29.625] {
            let mut out = [0u8; 4];
            sampler.sample(14.25, v, &rgba(), &mut out);
            assert_eq!(out[1..], [7, 0, 255], "v = {v}");
        }
    }

    #[test]
    fn test_no_alpha_layout() {
        let tiles = TileManager::new(2, 2, 3).unwrap();
        tiles.write_pixel(0, 0, &[0, 0, 0]);
        tiles.write_pixel(1, 0, &[100, 200, 50]);
        tiles.write_pixel(0, 1, &[0, 0, 0]);
        tiles.write_pixel(1, 1, &[100, 200, 50]);
        let layout = SourceKind::Layer(PixelLayout::RGB).alpha_layout(3);
        let mut surround = PixelSurround::new(&tiles, 2, 2, &[0; 3]).unwrap();
        let mut out = [0u8; 3];
        sample_linear(&mut surround, 0.5, 0.5, &layout, &mut out);
        assert_eq!(out, [50, 100, 25]);
    }

    #[test]
    fn test_supersample_test() {
        let small = [[0.0, 0.0], [0.5, 0.5], [1.0, 0.0], [0.5, -0.5]];
        assert!(!supersample_needed(&small));
        let big = [[0.0, 0.0], [0.0, 1.5], [2.0, 0.0], [0.0, -1.0]];
        assert!(supersample_needed(&big));
    }

    #[test]
    fn test_adapt_single_sample_when_small() {
        let tiles = tiles_with(10, 10, &[60, 60, 60, 255]);
        let quad = [[4.0, 5.0], [5.0, 4.0], [6.0, 5.0], [5.0, 6.0]];
        let mut out = [0u8; 4];
        let n = sample_adapt(&tiles, [5.0, 5.0], &quad, 3, &[0; 4], &rgba(), &mut out);
        assert_eq!(n, 1);
        assert_eq!(out, [60, 60, 60, 255]);
    }

    #[test]
    fn test_adapt_recurses_on_large_quad() {
        let tiles = tiles_with(40, 40, &[60, 60, 60, 255]);
        let quad = [[10.0, 20.0], [20.0, 10.0], [30.0, 20.0], [20.0, 30.0]];
        let mut out = [0u8; 4];
        let n = sample_adapt(&tiles, [20.0, 20.0], &quad, 2, &[0; 4], &rgba(), &mut out);
        assert_eq!(n, 16);
        assert_eq!(out, [60, 60, 60, 255]);
    }

    #[test]
    fn test_adapt_huge_quad_saturates() {
        let tiles = tiles_with(8, 8, &[255, 255, 255, 255]);
        let big = 1e17;
        let quad = [[-big, 0.0], [0.0, -big], [big, 0.0], [0.0, big]];
        let mut out = [9u8; 4];
        let n = sample_adapt(&tiles, [0.0, 0.0], &quad, 3, &[0; 4], &rgba(), &mut out);
        assert_eq!(n, 64);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn test_adapt_outside_reads_background() {
        let tiles = tiles_with(4, 4, &[255, 255, 255, 255]);
        let quad = [[-20.0, -10.0], [-10.0, -20.0], [0.0, -10.0], [-10.0, 0.0]];
        let mut out = [9u8; 4];
        sample_adapt(&tiles, [-10.0, -10.0], &quad, 3, &[1, 2, 3, 0], &rgba(), &mut out);
        assert_eq!(out, [0; 4]);
    }
}
