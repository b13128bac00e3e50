//! # rastile-ops
//!
//! Geometric operations on tiled pixel buffers.
//!
//! # Modules
//!
//! - [`transform`] - affine and perspective transforms by inverse mapping
//! - [`resample`] - nearest, bilinear, Catmull-Rom, Lanczos and adaptive
//!   supersampling reconstruction with premultiplied alpha
//! - [`orient`] - exact flips and quarter turns
//! - [`options`] - [`TransformOptions`], loadable from YAML
//!
//! # Example
//!
//! ```rust
//! use rastile_core::{PixelLayout, TileManager};
//! use rastile_math::Matrix3;
//! use rastile_ops::{Interpolation, SourceKind, TransformOptions, transform_tiles};
//!
//! let src = TileManager::new(100, 80, 4).unwrap();
//! src.fill(&[255, 0, 0, 255]);
//!
//! let m = Matrix3::IDENTITY
//!     .translate(-50.0, -40.0)
//!     .rotate(0.4)
//!     .translate(50.0, 40.0);
//! let opts = TransformOptions::default().with_interpolation(Interpolation::Cubic);
//! let out = transform_tiles(&src, SourceKind::Layer(PixelLayout::RGBA), &m, &opts, &[0; 4], None)?;
//! assert!(out.width() > 100);
//! # Ok::<(), rastile_ops::OpsError>(())
//! ```
//!
//! # Dependencies
//!
//! - [`rastile_core`] - tile storage, regions and surrounds
//! - [`rastile_math`] - matrices and kernels
//!
//! # Used By
//!
//! - `rastile-bench`

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod options;
pub mod orient;
pub mod progress;
pub mod resample;
pub mod source;
pub mod transform;

pub use error::{OpsError, OpsResult};
pub use options::{ClipMode, Direction, Interpolation, TransformOptions};
pub use orient::{FlipAxis, Rotation, flip, rotate};
pub use progress::Progress;
pub use source::{AlphaLayout, SourceKind};
pub use transform::{transform_region, transform_tiles};
