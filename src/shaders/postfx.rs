//! Image-space effect kernels.
//!
//! Every effect reads `SourceTexture` at location 0 and runs as a
//! full-screen draw; the remaining uniforms are the effect's tunables.
//!
//! | Kernel              | Tunables                                          |
//! |---------------------|---------------------------------------------------|
//! | `postfx/copy`       | -                                                 |
//! | `postfx/bloom`      | `Range`, `Intensity`                              |
//! | `postfx/blur`       | `Scale` (one texel step along the blur axis)      |
//! | `postfx/compose`    | `BloomTexture`, `Exposure`, `Contrast`, `HueShift`, `Saturation`, `ColorFilter` |
//! | `postfx/chromatic`  | `AbAmount`                                        |
//! | `postfx/noise`      | `Amount`, `Time`                                  |
//! | `postfx/vignette`   | `VignetteIntensity`, `VignetteSmoothness`         |
//! | `postfx/barrel`     | `Distortion`                                      |
//! | `postfx/scanline`   | `LineDensity`, `Intensity`, `Time`                |

use std::f32::consts::{PI, SQRT_2};

use glam::{Vec2, Vec3, Vec4};

use super::common::{hash12, hsv_to_rgb, luminance, rgb_to_hsv, smoothstep};
use crate::resources::{
    FragmentInput, FragmentOutput, ShaderKernel, UniformDecl, UniformLocation, UniformType,
};

pub const SOURCE_TEXTURE: &str = "SourceTexture";

const SOURCE: UniformLocation = UniformLocation::new(0);

#[inline]
fn source(input: &FragmentInput<'_>, uv: Vec2) -> Vec4 {
    input.resources.sample(input.uniforms.texture(SOURCE), uv)
}

fn source_decl() -> UniformDecl {
    UniformDecl::new(SOURCE_TEXTURE, UniformType::Texture2D)
}

// ============================================================================
// Copy
// ============================================================================

pub struct CopyKernel;

impl ShaderKernel for CopyKernel {
    fn name(&self) -> &'static str {
        "postfx/copy"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![source_decl()]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        FragmentOutput::color(source(input, input.screen_uv))
    }
}

// ============================================================================
// Bloom extraction
// ============================================================================

/// Keeps the bright part of the image: colour scaled by a smooth step of
/// its luminance over `Range`.
pub struct BloomKernel;

impl BloomKernel {
    const RANGE: UniformLocation = UniformLocation::new(1);
    const INTENSITY: UniformLocation = UniformLocation::new(2);
}

impl ShaderKernel for BloomKernel {
    fn name(&self) -> &'static str {
        "postfx/bloom"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("Range", Vec2::new(1.0, 2.0)),
            UniformDecl::with_default("Intensity", 1.0_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let color = source(input, input.screen_uv).truncate();
        let range = u.vec2(Self::RANGE);
        let weight = smoothstep(range.x, range.y, luminance(color));
        FragmentOutput::color((color * weight * u.float(Self::INTENSITY)).extend(1.0))
    }
}

// ============================================================================
// Separable Gaussian blur
// ============================================================================

/// One axis of a 9-tap Gaussian; `Scale` selects the axis and step.
pub struct BlurKernel;

impl BlurKernel {
    const SCALE: UniformLocation = UniformLocation::new(1);
    const WEIGHTS: [f32; 5] = [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216];
}

impl ShaderKernel for BlurKernel {
    fn name(&self) -> &'static str {
        "postfx/blur"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("Scale", Vec2::ZERO),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let uv = input.screen_uv;
        let step = input.uniforms.vec2(Self::SCALE);

        let mut sum = source(input, uv) * Self::WEIGHTS[0];
        for (i, weight) in Self::WEIGHTS.iter().enumerate().skip(1) {
            let offset = step * i as f32;
            sum += (source(input, uv + offset) + source(input, uv - offset)) * *weight;
        }
        FragmentOutput::color(sum)
    }
}

// ============================================================================
// Compose / grade
// ============================================================================

/// Adds bloom to the scene, tone-maps, and grades:
///
/// 1. `c = scene + bloom`
/// 2. exposure tone map `1 - exp(-c * Exposure)`
/// 3. contrast around mid grey
/// 4. hue rotation in HSV
/// 5. saturation as a lerp from luma (`1.0` is neutral)
/// 6. colour filter, clamp to non-negative, gamma 2.2 encode
pub struct ComposeKernel;

impl ComposeKernel {
    const BLOOM: UniformLocation = UniformLocation::new(1);
    const EXPOSURE: UniformLocation = UniformLocation::new(2);
    const CONTRAST: UniformLocation = UniformLocation::new(3);
    const HUE_SHIFT: UniformLocation = UniformLocation::new(4);
    const SATURATION: UniformLocation = UniformLocation::new(5);
    const COLOR_FILTER: UniformLocation = UniformLocation::new(6);
}

impl ShaderKernel for ComposeKernel {
    fn name(&self) -> &'static str {
        "postfx/compose"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::new("BloomTexture", UniformType::Texture2D),
            UniformDecl::with_default("Exposure", 1.0_f32),
            UniformDecl::with_default("Contrast", 1.0_f32),
            UniformDecl::with_default("HueShift", 0.0_f32),
            UniformDecl::with_default("Saturation", 1.0_f32),
            UniformDecl::with_default("ColorFilter", Vec3::ONE),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let uv = input.screen_uv;

        let scene = source(input, uv).truncate();
        let bloom = input.resources.sample(u.texture(Self::BLOOM), uv).truncate();
        let mut c = (scene + bloom).max(Vec3::ZERO);

        c = Vec3::ONE - (-c * u.float(Self::EXPOSURE)).exp();
        c = (c - Vec3::splat(0.5)) * u.float(Self::CONTRAST) + Vec3::splat(0.5);

        let hue_shift = u.float(Self::HUE_SHIFT);
        if hue_shift != 0.0 {
            let mut hsv = rgb_to_hsv(c.max(Vec3::ZERO));
            hsv.x += hue_shift;
            c = hsv_to_rgb(hsv);
        }

        let luma = Vec3::splat(luminance(c));
        c = luma.lerp(c, u.float(Self::SATURATION));
        c *= u.vec3(Self::COLOR_FILTER);
        c = c.max(Vec3::ZERO).powf(1.0 / 2.2);

        FragmentOutput::color(c.extend(1.0))
    }
}

// ============================================================================
// Chromatic aberration
// ============================================================================

/// Splits red and blue radially away from the image centre.
pub struct ChromaticKernel;

impl ChromaticKernel {
    const AMOUNT: UniformLocation = UniformLocation::new(1);
}

impl ShaderKernel for ChromaticKernel {
    fn name(&self) -> &'static str {
        "postfx/chromatic"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("AbAmount", 0.04_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let uv = input.screen_uv;
        let offset = (uv - Vec2::splat(0.5)) * input.uniforms.float(Self::AMOUNT);
        let r = source(input, uv + offset).x;
        let g = source(input, uv);
        let b = source(input, uv - offset).z;
        FragmentOutput::color(Vec4::new(r, g.y, b, g.w))
    }
}

// ============================================================================
// Film grain
// ============================================================================

pub struct NoiseKernel;

impl NoiseKernel {
    const TIME: UniformLocation = UniformLocation::new(1);
    const AMOUNT: UniformLocation = UniformLocation::new(2);
}

impl ShaderKernel for NoiseKernel {
    fn name(&self) -> &'static str {
        "postfx/noise"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("Time", 0.0_f32),
            UniformDecl::with_default("Amount", 0.08_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let color = source(input, input.screen_uv);
        let seed = input.frag_coord + Vec2::splat(u.float(Self::TIME).fract() * 1000.0);
        let grain = (hash12(seed) - 0.5) * u.float(Self::AMOUNT);
        FragmentOutput::color((color.truncate() + Vec3::splat(grain)).extend(color.w))
    }
}

// ============================================================================
// Vignette
// ============================================================================

/// Darkens towards the corners. `VignetteSmoothness` is the width of the
/// falloff band measured inwards from the corner.
pub struct VignetteKernel;

impl VignetteKernel {
    const INTENSITY: UniformLocation = UniformLocation::new(1);
    const SMOOTHNESS: UniformLocation = UniformLocation::new(2);
}

impl ShaderKernel for VignetteKernel {
    fn name(&self) -> &'static str {
        "postfx/vignette"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("VignetteIntensity", 0.4_f32),
            UniformDecl::with_default("VignetteSmoothness", 0.36_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let uv = input.screen_uv;
        let color = source(input, uv);

        // 0 at the centre, 1 in the corners.
        let distance = (uv - Vec2::splat(0.5)).length() * SQRT_2;
        let falloff = smoothstep(1.0 - u.float(Self::SMOOTHNESS), 1.0, distance);
        let factor = 1.0 - u.float(Self::INTENSITY) * falloff;
        FragmentOutput::color((color.truncate() * factor).extend(color.w))
    }
}

// ============================================================================
// Barrel distortion
// ============================================================================

pub struct BarrelKernel;

impl BarrelKernel {
    const DISTORTION: UniformLocation = UniformLocation::new(1);
}

impl ShaderKernel for BarrelKernel {
    fn name(&self) -> &'static str {
        "postfx/barrel"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("Distortion", 0.1_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let p = input.screen_uv * 2.0 - Vec2::ONE;
        let warped = p * (1.0 + input.uniforms.float(Self::DISTORTION) * p.length_squared());
        let uv = warped * 0.5 + Vec2::splat(0.5);

        if uv.cmplt(Vec2::ZERO).any() || uv.cmpgt(Vec2::ONE).any() {
            return FragmentOutput::color(Vec4::new(0.0, 0.0, 0.0, 1.0));
        }
        FragmentOutput::color(source(input, uv))
    }
}

// ============================================================================
// Scanlines
// ============================================================================

pub struct ScanlineKernel;

impl ScanlineKernel {
    const LINE_DENSITY: UniformLocation = UniformLocation::new(1);
    const INTENSITY: UniformLocation = UniformLocation::new(2);
    const TIME: UniformLocation = UniformLocation::new(3);
}

impl ShaderKernel for ScanlineKernel {
    fn name(&self) -> &'static str {
        "postfx/scanline"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            source_decl(),
            UniformDecl::with_default("LineDensity", 360.0_f32),
            UniformDecl::with_default("Intensity", 0.6_f32),
            UniformDecl::with_default("Time", 0.0_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let uv = input.screen_uv;
        let color = source(input, uv);

        let phase = (uv.y + u.float(Self::TIME) * 0.05) * u.float(Self::LINE_DENSITY) * PI;
        let line = phase.sin() * 0.5 + 0.5;
        let factor = 1.0 + (line - 1.0) * u.float(Self::INTENSITY).clamp(0.0, 1.0);
        FragmentOutput::color((color.truncate() * factor).extend(color.w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceArena, ShaderResources, UniformValue, Uniforms, Varyings};

    fn shade(kernel: &dyn ShaderKernel, values: &[Option<UniformValue>], uv: Vec2) -> Vec4 {
        let arena = ResourceArena::new();
        let input = FragmentInput {
            uniforms: Uniforms::new(values),
            resources: ShaderResources::new(&arena),
            frag_coord: uv * 8.0,
            screen_uv: uv,
            depth: 1.0,
            varyings: Varyings::default(),
            resolution: Vec2::splat(8.0),
        };
        kernel.fragment(&input).colors[0]
    }

    fn defaults(kernel: &dyn ShaderKernel) -> Vec<Option<UniformValue>> {
        kernel.declarations().into_iter().map(|d| d.default).collect()
    }

    #[test]
    fn blur_weights_sum_to_one() {
        let w = BlurKernel::WEIGHTS;
        let total = w[0] + 2.0 * (w[1] + w[2] + w[3] + w[4]);
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn barrel_outside_the_image_is_black() {
        let mut values = defaults(&BarrelKernel);
        values[1] = Some(UniformValue::Float(1.0));
        let out = shade(&BarrelKernel, &values, Vec2::new(0.99, 0.99));
        assert_eq!(out, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn unbound_source_reads_zero() {
        let out = shade(&CopyKernel, &defaults(&CopyKernel), Vec2::splat(0.5));
        assert_eq!(out, Vec4::ZERO);
    }
}
