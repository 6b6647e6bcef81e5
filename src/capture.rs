//! Display readback and PNG export.

use std::path::Path;

use glam::Vec4;
use image::{ImageFormat, RgbaImage};

use crate::errors::{AfterglowError, Result};
use crate::resources::{ResourceArena, Texture2D, TextureId};

/// Packs a texture into tightly packed RGBA8 rows, top row first.
///
/// Values are clamped to `[0, 1]`; non-finite channels become 0.
#[must_use]
pub fn encode_rgba8(texture: &Texture2D) -> Vec<u8> {
    let pixels: Vec<[u8; 4]> = texture
        .rows_top_down()
        .into_iter()
        .map(|texel: Vec4| {
            texel.to_array().map(|c| {
                let c = if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 };
                (c * 255.0 + 0.5) as u8
            })
        })
        .collect();
    bytemuck::cast_slice(&pixels).to_vec()
}

/// Writes `texture` as a PNG file.
pub fn save_png(arena: &ResourceArena, texture: TextureId, path: impl AsRef<Path>) -> Result<()> {
    let texture = arena
        .texture(texture)
        .ok_or_else(|| AfterglowError::MissingResource("capture source texture".to_string()))?;
    let (width, height) = texture.extent();
    let image = RgbaImage::from_raw(width, height, encode_rgba8(texture))
        .ok_or_else(|| AfterglowError::ImageEncode("pixel buffer size mismatch".to_string()))?;
    image.save_with_format(path.as_ref(), ImageFormat::Png)?;
    log::info!("Saved {}x{} capture to {}", width, height, path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::PixelFormat;

    #[test]
    fn encode_flips_rows_and_clamps() {
        let mut texture = Texture2D::new("t", 1, 2, PixelFormat::Rgba16Float);
        texture.write(0, 0, Vec4::new(2.0, -1.0, f32::NAN, 1.0));
        texture.write(0, 1, Vec4::new(0.0, 0.0, 1.0, 1.0));
        let bytes = encode_rgba8(&texture);
        assert_eq!(bytes, vec![0, 0, 255, 255, 255, 0, 0, 255]);
    }
}
