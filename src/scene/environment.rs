//! Environment
//!
//! Describes the sky: the cubemap behind the scene (also used as the
//! irradiance source of the lighting resolve) and the indirect intensity.

use glam::{Vec3, Vec4};

use crate::resources::{CubemapId, PixelFormat, TextureCube};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Background and irradiance cubemap.
    pub env_map: Option<CubemapId>,
    /// Scale of the indirect term, uploaded as `LightIndirect`.
    pub intensity: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            env_map: None,
            intensity: 1.0,
        }
    }

    pub fn set_env_map(&mut self, cubemap: Option<CubemapId>) {
        self.env_map = cubemap;
    }

    #[must_use]
    pub fn with_env_map(mut self, cubemap: CubemapId) -> Self {
        self.env_map = Some(cubemap);
        self
    }

    /// Procedural sky: zenith-to-horizon gradient over a darker ground.
    #[must_use]
    pub fn gradient_sky(size: u32) -> TextureCube {
        let zenith = Vec3::new(0.18, 0.32, 0.62);
        let horizon = Vec3::new(0.75, 0.80, 0.85);
        let ground = Vec3::new(0.12, 0.10, 0.09);

        TextureCube::from_fn("Gradient Sky", size, PixelFormat::Rgb16Float, |dir| {
            let color = if dir.y >= 0.0 {
                horizon.lerp(zenith, dir.y.sqrt())
            } else {
                horizon.lerp(ground, (-dir.y * 4.0).min(1.0))
            };
            Vec4::from((color, 1.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_sky_is_brighter_above_the_horizon() {
        let sky = Environment::gradient_sky(8);
        let up = sky.sample(Vec3::Y);
        let down = sky.sample(Vec3::NEG_Y);
        assert!(up.truncate().length() > down.truncate().length());
        assert!(up.is_finite() && down.is_finite());
    }
}
