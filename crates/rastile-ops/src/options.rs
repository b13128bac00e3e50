//! Transform options.
//!
//! [`TransformOptions`] can be built in code or loaded from YAML; missing
//! keys take their defaults.
//!
//! ```rust
//! use rastile_ops::{Interpolation, TransformOptions};
//!
//! let opts = TransformOptions::from_yaml_str(
//!     "interpolation: lanczos\nsupersample: true\n",
//! )
//! .unwrap();
//! assert_eq!(opts.interpolation, Interpolation::Lanczos);
//! assert!(opts.supersample);
//! assert_eq!(opts.recursion_level, 3);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{OpsError, OpsResult};

/// Deepest supersampling recursion accepted.
pub const MAX_RECURSION_LEVEL: u32 = 10;

/// Largest accepted Lanczos half-width.
pub const MAX_LANCZOS_WIDTH: usize = 8;

/// Reconstruction filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest source pixel.
    None,
    /// 2x2 bilinear.
    Linear,
    /// 4x4 Catmull-Rom.
    #[default]
    Cubic,
    /// Windowed sinc.
    Lanczos,
}

/// How the supplied matrix is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Maps source to destination; it is inverted before sampling.
    #[default]
    Forward,
    /// Maps destination to source and is used as is.
    Backward,
}

/// Extent of the transformed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipMode {
    /// Grow or shrink to the transformed source.
    #[default]
    Adjust,
    /// Keep the source extent.
    Clip,
}

/// Settings for [`transform_tiles`](crate::transform_tiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Reconstruction filter.
    pub interpolation: Interpolation,
    /// Matrix direction.
    pub direction: Direction,
    /// Result extent.
    pub clip: ClipMode,
    /// Adaptive supersampling where the mapping stretches past one source
    /// pixel.
    pub supersample: bool,
    /// Maximum quad subdivisions while supersampling.
    pub recursion_level: u32,
    /// Lanczos half-width in pixels.
    pub lanczos_width: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::default(),
            direction: Direction::default(),
            clip: ClipMode::default(),
            supersample: false,
            recursion_level: 3,
            lanczos_width: 3,
        }
    }
}

impl TransformOptions {
    /// Sets the reconstruction filter.
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Sets the matrix direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the result extent.
    pub fn with_clip(mut self, clip: ClipMode) -> Self {
        self.clip = clip;
        self
    }

    /// Enables adaptive supersampling with the given recursion depth.
    pub fn with_supersample(mut self, recursion_level: u32) -> Self {
        self.supersample = true;
        self.recursion_level = recursion_level;
        self
    }

    /// Sets the Lanczos half-width.
    pub fn with_lanczos_width(mut self, width: usize) -> Self {
        self.lanczos_width = width;
        self
    }

    /// Checks ranges.
    pub fn validate(&self) -> OpsResult<()> {
        if self.recursion_level > MAX_RECURSION_LEVEL {
            return Err(OpsError::InvalidParameter(format!(
                "recursion level {} exceeds {MAX_RECURSION_LEVEL}",
                self.recursion_level
            )));
        }
        if !(1..=MAX_LANCZOS_WIDTH).contains(&self.lanczos_width) {
            return Err(OpsError::InvalidParameter(format!(
                "lanczos width {} outside 1..={MAX_LANCZOS_WIDTH}",
                self.lanczos_width
            )));
        }
        Ok(())
    }

    /// Parses YAML and validates the result.
    pub fn from_yaml_str(yaml: &str) -> OpsResult<Self> {
        let opts: Self = serde_yaml::from_str(yaml)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Loads options from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> OpsResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> OpsResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let opts = TransformOptions::default();
        assert_eq!(opts.interpolation, Interpolation::Cubic);
        assert_eq!(opts.direction, Direction::Forward);
        assert_eq!(opts.clip, ClipMode::Adjust);
        assert!(!opts.supersample);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial() {
        let opts = TransformOptions::from_yaml_str("clip: clip\ndirection: backward\n").unwrap();
        assert_eq!(opts.clip, ClipMode::Clip);
        assert_eq!(opts.direction, Direction::Backward);
        assert_eq!(opts.lanczos_width, 3);
    }

    #[test]
    fn test_yaml_rejects_bad_values() {
        assert!(matches!(
            TransformOptions::from_yaml_str("interpolation: sharpest\n"),
            Err(OpsError::Config(_))
        ));
        assert!(matches!(
            TransformOptions::from_yaml_str("recursion_level: 40\n"),
            Err(OpsError::InvalidParameter(_))
        ));
        assert!(TransformOptions::from_yaml_str("lanczos_width: 0\n").is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let opts = TransformOptions::default()
            .with_interpolation(Interpolation::None)
            .with_supersample(5);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(opts.to_yaml_string().unwrap().as_bytes()).unwrap();

        let loaded = TransformOptions::from_file(file.path()).unwrap();
        assert_eq!(loaded, opts);
        assert!(matches!(
            TransformOptions::from_file("/nonexistent/rastile.yaml"),
            Err(OpsError::Io(_))
        ));
    }
}
