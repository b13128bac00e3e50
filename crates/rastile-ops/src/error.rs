//! Error types for raster operations.

use thiserror::Error;

/// Error type for transform, flip and rotate operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Tile storage or region error.
    #[error(transparent)]
    Core(#[from] rastile_core::Error),

    /// The transform matrix has no inverse.
    #[error("singular transform matrix (determinant {0})")]
    SingularMatrix(f64),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not supported for this source.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Options file could not be parsed.
    #[error("invalid options: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Options file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for raster operations.
pub type OpsResult<T> = Result<T, OpsError>;
