//! Pixel layouts of 8-bit tiled buffers.
//!
//! Every channel is one byte and channels are interleaved. When present,
//! alpha is the last byte of a pixel.

/// Maximum number of bytes per pixel.
pub const MAX_CHANNELS: usize = 4;

/// Fully transparent alpha value.
pub const TRANSPARENT_OPACITY: u8 = 0;

/// Fully opaque alpha value.
pub const OPAQUE_OPACITY: u8 = 255;

/// Colour model of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageBase {
    /// Red, green, blue.
    Rgb,
    /// Single grey channel.
    Gray,
    /// Palette index; values are not interpolable.
    Indexed,
}

impl ImageBase {
    /// Number of colour channels, alpha excluded.
    #[inline]
    pub const fn color_channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Gray | Self::Indexed => 1,
        }
    }
}

/// Colour model plus alpha flag.
///
/// ```rust
/// use rastile_core::PixelLayout;
///
/// assert_eq!(PixelLayout::RGBA.bpp(), 4);
/// assert_eq!(PixelLayout::RGBA.alpha_index(), Some(3));
/// assert_eq!(PixelLayout::GRAY.alpha_index(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelLayout {
    /// Colour model.
    pub base: ImageBase,
    /// Whether a trailing alpha byte is present.
    pub has_alpha: bool,
}

impl PixelLayout {
    /// 3-byte RGB.
    pub const RGB: Self = Self::new(ImageBase::Rgb, false);
    /// 4-byte RGBA.
    pub const RGBA: Self = Self::new(ImageBase::Rgb, true);
    /// 1-byte grey.
    pub const GRAY: Self = Self::new(ImageBase::Gray, false);
    /// 2-byte grey + alpha.
    pub const GRAYA: Self = Self::new(ImageBase::Gray, true);
    /// 1-byte palette index.
    pub const INDEXED: Self = Self::new(ImageBase::Indexed, false);
    /// 2-byte palette index + alpha.
    pub const INDEXEDA: Self = Self::new(ImageBase::Indexed, true);

    /// Creates a layout.
    #[inline]
    pub const fn new(base: ImageBase, has_alpha: bool) -> Self {
        Self { base, has_alpha }
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bpp(self) -> u32 {
        (self.base.color_channels() + self.has_alpha as usize) as u32
    }

    /// Byte index of alpha within a pixel.
    #[inline]
    pub const fn alpha_index(self) -> Option<usize> {
        if self.has_alpha {
            Some(self.base.color_channels())
        } else {
            None
        }
    }
}

/// Copies `color` into a pixel of `bpp` bytes, zero-extending short input.
#[inline]
pub fn pixel_from_color(color: &[u8], bpp: usize) -> [u8; MAX_CHANNELS] {
    let mut px = [0u8; MAX_CHANNELS];
    let n = color.len().min(bpp).min(MAX_CHANNELS);
    px[..n].copy_from_slice(&color[..n]);
    px
}
