//! Post-FX tunables.
//!
//! Loaded from JSON with the same field names the debug UI shows:
//!
//! ```json
//! { "Exposure": 1.5, "BlurIterations": 3, "ColorFilter": [1.0, 0.9, 0.8] }
//! ```
//!
//! Missing fields take their defaults.

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PostFxConfig {
    pub exposure: f32,
    pub contrast: f32,
    pub hue_shift: f32,
    pub saturation: f32,
    pub color_filter: [f32; 3],
    pub bloom_range: [f32; 2],
    pub bloom_intensity: f32,
    pub blur_iterations: u32,
    pub scanline_density: f32,
    pub scanline_intensity: f32,
    pub vignette_intensity: f32,
    pub vignette_smoothness: f32,
    pub chromatic_aberration_amount: f32,
    pub barrel_distortion: f32,
}

impl Default for PostFxConfig {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            contrast: 1.0,
            hue_shift: 0.0,
            saturation: 0.5,
            color_filter: [1.0, 1.0, 1.0],
            bloom_range: [1.0, 2.0],
            bloom_intensity: 1.0,
            blur_iterations: 1,
            scanline_density: 360.0,
            scanline_intensity: 0.6,
            vignette_intensity: 0.4,
            vignette_smoothness: 0.36,
            chromatic_aberration_amount: 0.04,
            barrel_distortion: 0.1,
        }
    }
}

impl PostFxConfig {
    /// Upper bound on blur iterations accepted by [`clamped`](Self::clamped).
    pub const MAX_BLUR_ITERATIONS: u32 = 16;

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Copy with every tunable clamped to the range the UI exposes.
    /// Non-finite values fall back to their defaults.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let clamp = |v: f32, fallback: f32, min: f32, max: f32| {
            if v.is_finite() { v.clamp(min, max) } else { fallback }
        };

        let range_start = clamp(self.bloom_range[0], d.bloom_range[0], 0.0, f32::MAX);
        let range_end = clamp(self.bloom_range[1], d.bloom_range[1], range_start, f32::MAX);

        Self {
            exposure: clamp(self.exposure, d.exposure, 0.01, 5.0),
            contrast: clamp(self.contrast, d.contrast, 0.5, 1.5),
            hue_shift: clamp(self.hue_shift, d.hue_shift, -0.5, 0.5),
            saturation: clamp(self.saturation, d.saturation, 0.0, 2.0),
            color_filter: [0, 1, 2].map(|i| clamp(self.color_filter[i], 1.0, 0.0, 1.0)),
            bloom_range: [range_start, range_end],
            bloom_intensity: clamp(self.bloom_intensity, d.bloom_intensity, 0.0, 5.0),
            blur_iterations: self.blur_iterations.min(Self::MAX_BLUR_ITERATIONS),
            scanline_density: clamp(self.scanline_density, d.scanline_density, 50.0, 500.0),
            scanline_intensity: clamp(self.scanline_intensity, d.scanline_intensity, 0.0, 1.0),
            vignette_intensity: clamp(self.vignette_intensity, d.vignette_intensity, 0.0, 1.0),
            vignette_smoothness: clamp(self.vignette_smoothness, d.vignette_smoothness, 0.0, 1.0),
            chromatic_aberration_amount: clamp(
                self.chromatic_aberration_amount,
                d.chromatic_aberration_amount,
                0.0,
                1.0,
            ),
            barrel_distortion: clamp(self.barrel_distortion, d.barrel_distortion, 0.0, 1.0),
        }
    }

    #[inline]
    #[must_use]
    pub fn color_filter(&self) -> Vec3 {
        Vec3::from_array(self.color_filter)
    }

    #[inline]
    #[must_use]
    pub fn bloom_range(&self) -> Vec2 {
        Vec2::from_array(self.bloom_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = PostFxConfig::from_json_str(r#"{ "Exposure": 2.0, "BlurIterations": 3 }"#).unwrap();
        assert_eq!(config.exposure, 2.0);
        assert_eq!(config.blur_iterations, 3);
        assert_eq!(config.saturation, 0.5);
        assert_eq!(config.bloom_range, [1.0, 2.0]);
    }

    #[test]
    fn field_names_match_the_ui_labels() {
        let json = PostFxConfig::default().to_json_string().unwrap();
        for key in [
            "Exposure",
            "HueShift",
            "ColorFilter",
            "BloomRange",
            "ScanlineDensity",
            "ChromaticAberrationAmount",
            "BarrelDistortion",
        ] {
            assert!(json.contains(key), "missing `{key}` in {json}");
        }
    }

    #[test]
    fn clamped_respects_documented_ranges() {
        let config = PostFxConfig {
            exposure: 50.0,
            contrast: 0.0,
            hue_shift: f32::NAN,
            bloom_range: [3.0, 1.0],
            scanline_density: 10.0,
            blur_iterations: 1000,
            ..PostFxConfig::default()
        }
        .clamped();
        assert_eq!(config.exposure, 5.0);
        assert_eq!(config.contrast, 0.5);
        assert_eq!(config.hue_shift, 0.0);
        assert_eq!(config.bloom_range, [3.0, 3.0]);
        assert_eq!(config.scanline_density, 50.0);
        assert_eq!(config.blur_iterations, PostFxConfig::MAX_BLUR_ITERATIONS);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PostFxConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::errors::AfterglowError::Config(_)));
    }
}
