//! Error types for rastile-core.
//!
//! Only *recoverable construction errors* are reported through [`Error`]:
//! a tile manager with impossible dimensions, a pixel region that does not
//! fit its source, regions of different sizes registered in one
//! [`Processor`](crate::Processor).
//!
//! Lock conflicts and out-of-range tile coordinates are programming errors
//! and panic instead.
//!
//! # Usage
//!
//! ```rust
//! use rastile_core::{Error, Result, TileManager};
//!
//! fn make(width: u32) -> Result<TileManager> {
//!     TileManager::new(width, 16, 4)
//! }
//!
//! assert!(make(0).unwrap_err().is_dimension_error());
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by tile storage and pixel region construction.
#[derive(Debug, Error)]
pub enum Error {
    /// Region of interest extends beyond its source.
    ///
    /// Returned by the [`PixelRegion`](crate::PixelRegion) constructors;
    /// regions are never clamped silently.
    #[error("region ({rx}, {ry}, {rw}x{rh}) exceeds source bounds {width}x{height}")]
    InvalidRegion {
        /// Region X origin
        rx: u32,
        /// Region Y origin
        ry: u32,
        /// Region width
        rw: u32,
        /// Region height
        rh: u32,
        /// Source width
        width: u32,
        /// Source height
        height: u32,
    },

    /// Invalid buffer dimensions or pixel size.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Regions registered in one processor differ in size.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First region width
        a_width: u32,
        /// First region height
        a_height: u32,
        /// Second region width
        b_width: u32,
        /// Second region height
        b_height: u32,
    },

    /// Bytes-per-pixel mismatch between two buffers that must agree.
    #[error("channel mismatch: expected {expected} bytes per pixel, got {got}")]
    ChannelMismatch {
        /// Expected bytes per pixel
        expected: u32,
        /// Actual bytes per pixel
        got: u32,
    },

    /// Row stride is too small, or the buffer too short, for the region.
    #[error("stride {stride} with buffer length {len} cannot hold {width}x{height} at {bpp} bytes per pixel")]
    InvalidStride {
        /// Provided stride
        stride: usize,
        /// Provided buffer length
        len: usize,
        /// Region width
        width: u32,
        /// Region height
        height: u32,
        /// Bytes per pixel
        bpp: u32,
    },

    /// Invalid configuration value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::InvalidRegion`] error.
    #[inline]
    pub fn invalid_region(rx: u32, ry: u32, rw: u32, rh: u32, width: u32, height: u32) -> Self {
        Self::InvalidRegion {
            rx,
            ry,
            rw,
            rh,
            width,
            height,
        }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (u32, u32), b: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::ChannelMismatch`] error.
    #[inline]
    pub fn channel_mismatch(expected: u32, got: u32) -> Self {
        Self::ChannelMismatch { expected, got }
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` if this is a bounds-related error.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::InvalidRegion { .. } | Self::InvalidStride { .. })
    }

    /// Returns `true` if this error is about sizes or pixel layout.
    #[inline]
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. }
                | Self::DimensionMismatch { .. }
                | Self::ChannelMismatch { .. }
        )
    }
}
