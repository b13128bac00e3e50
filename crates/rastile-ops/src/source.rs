//! What kind of pixels an operation reads.

use rastile_core::{ImageBase, MAX_CHANNELS, PixelLayout, TileManager};

use crate::{OpsError, OpsResult};

/// Interpretation of a source buffer.
///
/// Layers carry colour (and maybe alpha); channels are single-byte masks
/// whose outside is transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Image layer with the given layout.
    Layer(PixelLayout),
    /// Single-byte mask or selection channel.
    Channel,
}

impl SourceKind {
    /// Checks the kind against the buffer it describes.
    pub fn check(&self, tiles: &TileManager) -> OpsResult<()> {
        match self {
            Self::Layer(layout) if layout.bpp() != tiles.bpp() => {
                Err(rastile_core::Error::channel_mismatch(layout.bpp(), tiles.bpp()).into())
            }
            Self::Channel if tiles.bpp() != 1 => Err(OpsError::Unsupported(format!(
                "channel source with {} bytes per pixel",
                tiles.bpp()
            ))),
            _ => Ok(()),
        }
    }

    /// Whether the pixels are palette indices.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Layer(l) if l.base == ImageBase::Indexed)
    }

    /// Whether "nothing" is transparent rather than a background colour.
    #[inline]
    pub fn has_transparency(&self) -> bool {
        match self {
            Self::Layer(l) => l.has_alpha,
            Self::Channel => true,
        }
    }

    /// Byte forced to zero in the background pixel.
    #[inline]
    pub fn background_alpha_index(&self) -> Option<usize> {
        match self {
            Self::Layer(l) => l.alpha_index(),
            Self::Channel => Some(0),
        }
    }

    /// Background pixel for out-of-source samples: `color` zero-extended,
    /// with alpha (or the whole channel value) cleared.
    pub fn background(&self, color: &[u8], bpp: usize) -> [u8; MAX_CHANNELS] {
        let mut bg = rastile_core::format::pixel_from_color(color, bpp);
        if let Some(a) = self.background_alpha_index() {
            bg[a] = 0;
        }
        bg
    }

    /// Channel layout seen by the samplers.
    ///
    /// A single-byte buffer is sampled as pure alpha.
    pub fn alpha_layout(&self, bpp: usize) -> AlphaLayout {
        let alpha = if bpp == 1 {
            Some(0)
        } else {
            match self {
                Self::Layer(l) => l.alpha_index(),
                Self::Channel => Some(0),
            }
        };
        AlphaLayout { bpp, alpha }
    }
}

/// Bytes per pixel plus the position of the alpha byte, if any.
///
/// Bytes before the alpha byte are colour; without alpha every byte is
/// colour and alpha reads as 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaLayout {
    /// Bytes per pixel.
    pub bpp: usize,
    /// Index of the alpha byte.
    pub alpha: Option<usize>,
}

impl AlphaLayout {
    /// Number of colour bytes.
    #[inline]
    pub fn color_channels(&self) -> usize {
        self.alpha.unwrap_or(self.bpp)
    }

    /// Alpha of the pixel at byte offset `o`.
    #[inline]
    pub fn alpha_at(&self, data: &[u8], o: usize) -> f64 {
        match self.alpha {
            Some(a) => data[o + a] as f64,
            None => 255.0,
        }
    }

    #[inline]
    pub(crate) fn write_alpha(&self, out: &mut [u8], value: u8) {
        if let Some(a) = self.alpha {
            out[a] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background() {
        let kind = SourceKind::Layer(PixelLayout::RGBA);
        assert_eq!(kind.background(&[10, 20, 30, 40], 4), [10, 20, 30, 0]);
        let kind = SourceKind::Layer(PixelLayout::RGB);
        assert_eq!(kind.background(&[10, 20, 30], 3), [10, 20, 30, 0]);
        assert_eq!(SourceKind::Channel.background(&[99], 1), [0; 4]);
    }

    #[test]
    fn test_alpha_layout() {
        let rgb = SourceKind::Layer(PixelLayout::RGB).alpha_layout(3);
        assert_eq!((rgb.alpha, rgb.color_channels()), (None, 3));
        let graya = SourceKind::Layer(PixelLayout::GRAYA).alpha_layout(2);
        assert_eq!((graya.alpha, graya.color_channels()), (Some(1), 1));
        let gray = SourceKind::Layer(PixelLayout::GRAY).alpha_layout(1);
        assert_eq!((gray.alpha, gray.color_channels()), (Some(0), 0));
        assert_eq!(SourceKind::Channel.alpha_layout(1).alpha, Some(0));
    }

    #[test]
    fn test_check() {
        let tiles = TileManager::new(4, 4, 3).unwrap();
        assert!(SourceKind::Layer(PixelLayout::RGB).check(&tiles).is_ok());
        assert!(SourceKind::Layer(PixelLayout::RGBA).check(&tiles).is_err());
        assert!(matches!(SourceKind::Channel.check(&tiles), Err(OpsError::Unsupported(_))));
    }
}
