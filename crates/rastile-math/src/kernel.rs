//! Reconstruction kernels used by the resampler.
//!
//! - [`bilinear`] - 2x2 tent filter
//! - [`catmull_rom`] - cubic convolution through four samples
//! - [`LanczosKernel`] - tabulated windowed sinc
//!
//! All functions work on `f64` sample values so callers can feed both
//! straight and alpha-premultiplied channel values.

/// Bilinear blend of a 2x2 neighbourhood.
///
/// `jk` is the top-left sample, `j1k` top-right, `jk1` bottom-left and
/// `j1k1` bottom-right; `dx`/`dy` are the fractional offsets in `[0, 1)`.
#[inline]
pub fn bilinear(jk: f64, j1k: f64, jk1: f64, j1k1: f64, dx: f64, dy: f64) -> f64 {
    (1.0 - dy) * (jk + dx * (j1k - jk)) + dy * (jk1 + dx * (j1k1 - jk1))
}

/// Catmull-Rom cubic through `jm1, j, jp1, jp2` evaluated at `dx` in `[0, 1)`
/// between `j` and `jp1`.
///
/// The result is not clamped; overshoot near hard edges is expected.
///
/// ```rust
/// use rastile_math::catmull_rom;
///
/// assert_eq!(catmull_rom(0.0, 1.0, 2.0, 3.0, 4.0), 2.0);
/// assert_eq!(catmull_rom(0.5, 1.0, 2.0, 3.0, 4.0), 2.5);
/// ```
#[inline]
pub fn catmull_rom(dx: f64, jm1: f64, j: f64, jp1: f64, jp2: f64) -> f64 {
    ((((-jm1 + 3.0 * j - 3.0 * jp1 + jp2) * dx + (2.0 * jm1 - 5.0 * j + 4.0 * jp1 - jp2))
        * dx
        + (-jm1 + jp1))
        * dx
        + (j + j))
        / 2.0
}

/// Normalized sinc, `sin(pi x) / (pi x)`.
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

/// Lanczos window of half-width `a` evaluated at `x`.
#[inline]
pub fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() >= a { 0.0 } else { sinc(x) * sinc(x / a) }
}

/// Lookup table for a Lanczos kernel of a given half-width.
///
/// The table samples the kernel at [`LanczosKernel::SAMPLES_PER_PIXEL`]
/// points per source pixel. It is built per resampling call and owned by
/// it, so concurrent resamplers never share mutable state.
#[derive(Debug, Clone)]
pub struct LanczosKernel {
    width: usize,
    table: Vec<f64>,
}

impl LanczosKernel {
    /// Table resolution.
    pub const SAMPLES_PER_PIXEL: usize = 4000;

    /// Builds the table for half-width `width` (taps = `2 * width + 1`).
    ///
    /// A width of zero is promoted to one.
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        let spp = Self::SAMPLES_PER_PIXEL;
        let len = (width + 1) * spp + 1;
        let a = width as f64;
        let table = (0..len)
            .map(|i| lanczos(i as f64 / spp as f64, a))
            .collect();
        Self { width, table }
    }

    /// Kernel half-width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of taps per axis.
    #[inline]
    pub fn taps(&self) -> usize {
        2 * self.width + 1
    }

    /// Fills `out` (length [`taps`](Self::taps)) with normalized weights
    /// for a sample at fractional offset `frac` in `[0, 1)`.
    ///
    /// `out[k]` is the weight of the pixel at `floor(u) - width + k`.
    pub fn weights(&self, frac: f64, out: &mut [f64]) {
        assert_eq!(out.len(), self.taps(), "lanczos weight buffer size");

        let spp = Self::SAMPLES_PER_PIXEL as i64;
        let w = self.width as i64;
        let s = (frac * spp as f64) as i64;

        let mut sum = 0.0;
        for (k, slot) in out.iter_mut().enumerate() {
            let pos = (k as i64 - w) * spp;
            let idx = (s - pos).unsigned_abs() as usize;
            *slot = self.table.get(idx).copied().unwrap_or(0.0);
            sum += *slot;
        }

        if sum != 0.0 {
            out.iter_mut().for_each(|v| *v /= sum);
        }
    }
}
