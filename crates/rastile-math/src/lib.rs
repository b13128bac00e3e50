//! # rastile-math
//!
//! Math utilities for tiled raster transforms.
//!
//! - [`Matrix3`] - 3x3 homogeneous matrices for affine and perspective maps
//! - [`bilinear`], [`catmull_rom`] - interpolation kernels
//! - [`LanczosKernel`] - tabulated windowed sinc
//!
//! # Design
//!
//! Everything here is `f64`. Pixel coordinates of very large images lose
//! sub-pixel precision in `f32` long before memory runs out.
//!
//! ```rust
//! use rastile_math::Matrix3;
//!
//! let m = Matrix3::IDENTITY.scale(2.0, 2.0);
//! let inv = m.invert().unwrap();
//! assert_eq!(inv.transform_point(4.0, 8.0), (2.0, 4.0));
//! ```
//!
//! # Dependencies
//!
//! - [`glam`] - `DMat3` interop
//!
//! # Used By
//!
//! - `rastile-ops` - transform and resampling

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod kernel;
mod matrix;

pub use kernel::*;
pub use matrix::*;

/// Re-export glam types for direct use
pub mod glam {
    pub use ::glam::{DMat3, DVec3};
}
