//! Geometry kernels: write surface attributes into the four G-buffer outputs.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::common::{hash12, smoothstep};
use crate::renderer::registry::{WORLD_VIEW_MATRIX, WORLD_VIEW_PROJ_MATRIX};
use crate::resources::{
    FragmentInput, FragmentOutput, ShaderKernel, UniformDecl, UniformLocation, UniformType,
    Uniforms, Varyings, Vertex, VertexOutput,
};

// Varying layout shared by the geometry kernels.
const V_NORMAL: usize = 0;
const V_UV: usize = 3;

/// Default opaque surface: base colour (optionally textured), view-space
/// normal, roughness and metalness.
pub struct GBufferKernel;

impl GBufferKernel {
    const WORLD_VIEW: UniformLocation = UniformLocation::new(0);
    const WORLD_VIEW_PROJ: UniformLocation = UniformLocation::new(1);
    const COLOR: UniformLocation = UniformLocation::new(2);
    const COLOR_TEXTURE: UniformLocation = UniformLocation::new(3);
    const ROUGHNESS: UniformLocation = UniformLocation::new(4);
    const METALNESS: UniformLocation = UniformLocation::new(5);
}

impl ShaderKernel for GBufferKernel {
    fn name(&self) -> &'static str {
        "deferred/gbuffer"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            UniformDecl::with_default(WORLD_VIEW_MATRIX, Mat4::IDENTITY),
            UniformDecl::with_default(WORLD_VIEW_PROJ_MATRIX, Mat4::IDENTITY),
            UniformDecl::with_default("Color", Vec3::ONE),
            UniformDecl::new("ColorTexture", UniformType::Texture2D),
            UniformDecl::with_default("Roughness", 0.5_f32),
            UniformDecl::with_default("Metalness", 0.0_f32),
        ]
    }

    fn vertex(&self, uniforms: &Uniforms<'_>, vertex: &Vertex) -> VertexOutput {
        let world_view = uniforms.mat4(Self::WORLD_VIEW);
        let world_view_proj = uniforms.mat4(Self::WORLD_VIEW_PROJ);

        let mut varyings = Varyings::default();
        varyings.set_vec3(V_NORMAL, world_view.transform_vector3(vertex.normal));
        varyings.set_vec2(V_UV, vertex.uv);
        VertexOutput {
            clip: world_view_proj * vertex.position.extend(1.0),
            varyings,
        }
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let uv = input.varyings.vec2(V_UV);

        let texture = u.texture(Self::COLOR_TEXTURE);
        let texel = if input.resources.is_bound(texture) {
            input.resources.sample(texture, uv).truncate()
        } else {
            Vec3::ONE
        };
        let albedo = u.vec3(Self::COLOR) * texel;
        let normal = input.varyings.vec3(V_NORMAL).normalize_or_zero();

        FragmentOutput::targets([
            albedo.extend(1.0),
            normal.extend(1.0),
            Vec4::new(u.float(Self::ROUGHNESS), u.float(Self::METALNESS), 0.0, 1.0),
            Vec4::ZERO,
        ])
    }
}

/// Animated television screen: rolling bar over static, written to the
/// G-buffer as a rough dielectric facing the viewer.
pub struct TvScreenKernel;

impl TvScreenKernel {
    const WORLD_VIEW_PROJ: UniformLocation = UniformLocation::new(0);
    const TIME: UniformLocation = UniformLocation::new(1);
    const RESOLUTION: UniformLocation = UniformLocation::new(2);
}

impl ShaderKernel for TvScreenKernel {
    fn name(&self) -> &'static str {
        "tvscreen"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            UniformDecl::with_default(WORLD_VIEW_PROJ_MATRIX, Mat4::IDENTITY),
            UniformDecl::with_default("Time", 0.0_f32),
            UniformDecl::with_default("Resolution", Vec2::new(1024.0, 1024.0)),
        ]
    }

    fn vertex(&self, uniforms: &Uniforms<'_>, vertex: &Vertex) -> VertexOutput {
        let mut varyings = Varyings::default();
        varyings.set_vec2(V_UV, vertex.uv);
        VertexOutput {
            clip: uniforms.mat4(Self::WORLD_VIEW_PROJ) * vertex.position.extend(1.0),
            varyings,
        }
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let time = u.float(Self::TIME);
        let resolution = u.vec2(Self::RESOLUTION).max(Vec2::ONE);
        let uv = input.varyings.vec2(V_UV);

        // Static is quantised to 4x4-pixel cells of the nominal resolution.
        let cell = (uv * resolution / 4.0).floor();
        let grain = hash12(cell + Vec2::splat((time * 24.0).floor()));
        let roll = (uv.y - time * 0.25).rem_euclid(1.0);
        let bar = smoothstep(0.0, 0.08, roll) * (1.0 - smoothstep(0.08, 0.2, roll));
        let level = (0.35 + 0.45 * grain + 0.6 * bar).min(1.0);

        FragmentOutput::targets([
            Vec3::splat(level).extend(1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::ZERO,
        ])
    }
}
