//! Auto-crop to the bounding box of non-transparent pixels.

use std::ops::Deref;

use tracing::debug;

use crate::pixel_region::{PixelRegion, Processor};
use crate::{Error, Result, TileManager};

/// Result of [`TileManager::crop`].
#[derive(Debug)]
pub enum Cropped<'a> {
    /// Cropping was a no-op; the source is returned as is.
    Original(&'a TileManager),
    /// A freshly allocated, cropped copy.
    New(TileManager),
}

impl Cropped<'_> {
    /// Whether a new manager was allocated.
    #[inline]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

impl Deref for Cropped<'_> {
    type Target = TileManager;

    fn deref(&self) -> &TileManager {
        match self {
            Self::Original(tiles) => tiles,
            Self::New(tiles) => tiles,
        }
    }
}

impl TileManager {
    /// Crops to the smallest box holding every pixel with non-zero alpha
    /// (the last byte of each pixel), plus `border` pixels of `fill` on
    /// each side.
    ///
    /// Returns `Ok(None)` when every pixel is transparent and
    /// [`Cropped::Original`] when the box is the whole buffer and `border`
    /// is zero. The new manager's offsets place its interior over the
    /// source pixels it was copied from.
    ///
    /// ```rust
    /// use rastile_core::TileManager;
    ///
    /// let tiles = TileManager::new(10, 10, 2).unwrap();
    /// tiles.write_pixel(4, 6, &[200, 255]);
    ///
    /// let cropped = tiles.crop(1, &[0, 0]).unwrap().unwrap();
    /// assert_eq!((cropped.width(), cropped.height()), (3, 3));
    /// assert_eq!(cropped.offsets(), (3, 5));
    /// ```
    pub fn crop(&self, border: u32, fill: &[u8]) -> Result<Option<Cropped<'_>>> {
        if fill.len() > self.bpp() as usize {
            return Err(Error::channel_mismatch(self.bpp(), fill.len() as u32));
        }
        let Some((x1, y1, x2, y2)) = self.opaque_bounds()? else {
            debug!(width = self.width(), height = self.height(), "crop: fully transparent");
            return Ok(None);
        };
        debug!(x1, y1, x2, y2, border, "crop box");

        if border == 0 && x1 == 0 && y1 == 0 && x2 == self.width() - 1 && y2 == self.height() - 1 {
            return Ok(Some(Cropped::Original(self)));
        }

        let (w, h) = (x2 - x1 + 1, y2 - y1 + 1);
        let new_w = w
            .checked_add(border.saturating_mul(2))
            .ok_or_else(|| Error::invalid_dimensions(w, h, "border overflows width"))?;
        let new_h = h
            .checked_add(border.saturating_mul(2))
            .ok_or_else(|| Error::invalid_dimensions(w, h, "border overflows height"))?;

        let mut out = TileManager::with_config(new_w, new_h, self.bpp(), self.config())?;
        let (ox, oy) = self.offsets();
        out.set_offsets(
            ox + x1 as i32 - border as i32,
            oy + y1 as i32 - border as i32,
        );
        if border > 0 {
            out.fill(fill);
        }

        Processor::new([
            PixelRegion::new(self, x1, y1, w, h, false)?,
            PixelRegion::new(&out, border, border, w, h, true)?,
        ])?
        .for_each(|portion| {
            if let [src, dst] = portion.buffers_mut() {
                for r in 0..src.height() {
                    dst.row_mut(r).copy_from_slice(src.row(r));
                }
            }
        });

        Ok(Some(Cropped::New(out)))
    }

    /// Inclusive box of pixels whose last byte is non-zero.
    fn opaque_bounds(&self) -> Result<Option<(u32, u32, u32, u32)>> {
        let alpha = self.bpp() as usize - 1;
        let bpp = self.bpp() as usize;
        let mut found: Option<(u32, u32, u32, u32)> = None;

        Processor::new([PixelRegion::full(self, false)])?.for_each(|portion| {
            let buf = portion.buffer(0);
            for r in 0..buf.height() {
                let row = buf.row(r);
                let mut hits = row
                    .chunks_exact(bpp)
                    .enumerate()
                    .filter(|(_, px)| px[alpha] != 0)
                    .map(|(i, _)| i as u32);
                let Some(first) = hits.next() else {
                    continue;
                };
                let last = hits.last().unwrap_or(first);
                let (lx, rx) = (buf.x() + first, buf.x() + last);
                let y = buf.y() + r;
                found = Some(match found {
                    None => (lx, y, rx, y),
                    Some((x1, y1, x2, y2)) => (x1.min(lx), y1.min(y), x2.max(rx), y2.max(y)),
                });
            }
        });
        Ok(found)
    }
}
