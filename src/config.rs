//! Runtime configuration of the pipeline.
//!
//! Everything that used to be a compile time switch of a GPU rasterizer (texturing, bilinear
//! filtering, perspective correction, per-pixel locking) lives here and is passed into
//! [`crate::pipeline::Pipeline`] at init and may be swapped between frames.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which rasterization path is used for the assembled primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawMode {
    /// Filled, depth tested triangles. Point and line primitives are skipped.
    Triangles,
    /// Wireframe - lines and triangle edges drawn with Bresenham, no depth test.
    Lines,
    /// Vertex markers, no depth test.
    Points,
}

/// Texture sampling mode used by the shading stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Texturing {
    Off,
    Nearest,
    Bilinear,
}

impl FromStr for DrawMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s.to_ascii_lowercase().as_str() {
            "triangles" | "fill" => Ok(DrawMode::Triangles),
            "lines" | "wireframe" => Ok(DrawMode::Lines),
            "points" => Ok(DrawMode::Points),
            other => Err(format!("unknown draw mode '{}'", other)),
        };
    }
}

impl fmt::Display for DrawMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrawMode::Triangles => "triangles",
            DrawMode::Lines => "lines",
            DrawMode::Points => "points",
        };
        return write!(f, "{}", name);
    }
}

impl FromStr for Texturing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Texturing::Off),
            "nearest" => Ok(Texturing::Nearest),
            "bilinear" => Ok(Texturing::Bilinear),
            other => Err(format!("unknown texturing mode '{}'", other)),
        };
    }
}

impl fmt::Display for Texturing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Texturing::Off => "off",
            Texturing::Nearest => "nearest",
            Texturing::Bilinear => "bilinear",
        };
        return write!(f, "{}", name);
    }
}

/// Shading constants. These are pipeline constants, not scene data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    pub base_color: [f32; 3],     // Surface color of untextured fragments.
    pub light_position: [f32; 3], // Point light position in eye space.
    pub light_intensity: f32,
    pub marker_color: [f32; 3],   // Color of point and line debug markers.
    pub clear_color: [f32; 3],    // Color of pixels no primitive touched.
}

impl Default for ShadingConfig {
    fn default() -> Self {
        return Self {
            base_color: [0.9, 0.9, 0.9],
            light_position: [0.0, 0.0, 0.0], // Head light.
            light_intensity: 1.0,
            marker_color: [1.0, 1.0, 1.0],
            clear_color: [0.0, 0.0, 0.0],
        };
    }
}

/// Full runtime configuration of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub draw_mode: DrawMode,
    pub texturing: Texturing,
    pub perspective_correct: bool,
    pub backface_cull: bool,
    /// Serialize depth test and fragment write per pixel. Turning it off brings back the
    /// visibility race and only exists for comparison.
    pub pixel_locking: bool,
    /// Size of the worker pool, 0 means one worker per available core.
    pub worker_threads: usize,
    pub shading: ShadingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        return Self {
            draw_mode: DrawMode::Triangles,
            texturing: Texturing::Bilinear,
            perspective_correct: true,
            backface_cull: false,
            pixel_locking: true,
            worker_threads: 0,
            shading: ShadingConfig::default(),
        };
    }
}

impl RenderConfig {
    /// Parse a config from RON text. Missing fields take their default values.
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = ron::from_str(s)?;
        return Ok(config);
    }

    /// Load a config from a RON file.
    pub fn from_ron_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        return Self::from_ron_str(&contents);
    }

    /// Pretty printed RON, handy as a starting point for a config file.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new().indentor("  ".to_string());
        return Ok(ron::ser::to_string_pretty(self, pretty)?);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_take_the_correct_path() {
        let config = RenderConfig::default();
        assert_eq!(config.draw_mode, DrawMode::Triangles);
        assert!(config.perspective_correct);
        assert!(config.pixel_locking);
        assert!(!config.backface_cull);
    }

    #[test]
    fn partial_ron_keeps_defaults_for_missing_fields() {
        let config = RenderConfig::from_ron_str("(draw_mode: Lines, texturing: Nearest)").unwrap();
        assert_eq!(config.draw_mode, DrawMode::Lines);
        assert_eq!(config.texturing, Texturing::Nearest);
        assert!(config.pixel_locking);
        assert_eq!(config.shading, ShadingConfig::default());
    }

    #[test]
    fn ron_round_trip() {
        let mut config = RenderConfig::default();
        config.backface_cull = true;
        config.shading.light_intensity = 0.5;
        let text = config.to_ron_string().unwrap();
        assert_eq!(RenderConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn bad_ron_is_a_parse_error() {
        let err = RenderConfig::from_ron_str("(draw_mode: Hexagons)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn modes_parse_from_cli_strings() {
        assert_eq!("wireframe".parse::<DrawMode>().unwrap(), DrawMode::Lines);
        assert_eq!("Bilinear".parse::<Texturing>().unwrap(), Texturing::Bilinear);
        assert!("mipmap".parse::<Texturing>().is_err());
        assert_eq!(DrawMode::Points.to_string(), "points");
    }
}
