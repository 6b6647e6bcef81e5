//! Deferred lighting resolve and skybox kernels.
//!
//! The resolve reconstructs the world position of each pixel from G-buffer
//! depth, then accumulates every light of the frame in one invocation:
//! Lambert diffuse plus a normalised Blinn-Phong lobe, with the environment
//! cubemap as the indirect term. Background pixels (depth at the far plane)
//! show the environment along the view ray.

use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::common::smoothstep;
use crate::renderer::passes::SKYBOX_INV_VIEW_PROJ;
use crate::renderer::registry::{
    INV_PROJ_MATRIX, INV_VIEW_MATRIX, LIGHT_ATTENUATION, LIGHT_COLOR, LIGHT_COUNT,
    LIGHT_DIRECTION, LIGHT_INDIRECT, LIGHT_POSITION, WORLD_VIEW_PROJ_MATRIX,
};
use crate::resources::{
    FragmentInput, FragmentOutput, ShaderKernel, UniformDecl, UniformLocation, UniformType,
};

/// Irradiance used when no environment map is bound.
const AMBIENT_FLOOR: Vec3 = Vec3::splat(0.03);

pub struct DeferredLightingKernel;

impl DeferredLightingKernel {
    const INV_VIEW: UniformLocation = UniformLocation::new(0);
    const INV_PROJ: UniformLocation = UniformLocation::new(1);
    const DEPTH: UniformLocation = UniformLocation::new(3);
    const ALBEDO: UniformLocation = UniformLocation::new(4);
    const NORMAL: UniformLocation = UniformLocation::new(5);
    const OTHERS: UniformLocation = UniformLocation::new(6);
    const ENVIRONMENT: UniformLocation = UniformLocation::new(7);
    const LIGHT_COUNT: UniformLocation = UniformLocation::new(8);
    const LIGHT_COLOR: UniformLocation = UniformLocation::new(9);
    const LIGHT_POSITION: UniformLocation = UniformLocation::new(10);
    const LIGHT_DIRECTION: UniformLocation = UniformLocation::new(11);
    const LIGHT_ATTENUATION: UniformLocation = UniformLocation::new(12);
    const LIGHT_INDIRECT: UniformLocation = UniformLocation::new(13);
}

struct Surface {
    position: Vec3,
    normal: Vec3,
    view: Vec3,
    albedo: Vec3,
    roughness: f32,
    metalness: f32,
}

impl Surface {
    fn direct(&self, light_dir: Vec3, radiance: Vec3) -> Vec3 {
        let n_dot_l = self.normal.dot(light_dir).max(0.0);
        if n_dot_l <= 0.0 {
            return Vec3::ZERO;
        }
        let diffuse = self.albedo * (1.0 - self.metalness);

        let half = (light_dir + self.view).normalize_or_zero();
        let shininess = 2.0 + (1.0 - self.roughness.clamp(0.0, 1.0)) * 126.0;
        let f0 = Vec3::splat(0.04).lerp(self.albedo, self.metalness);
        let lobe = (shininess + 8.0) / (8.0 * PI) * self.normal.dot(half).max(0.0).powf(shininess);

        (diffuse + f0 * lobe) * radiance * n_dot_l
    }
}

impl ShaderKernel for DeferredLightingKernel {
    fn name(&self) -> &'static str {
        "deferred/lighting"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            UniformDecl::with_default(INV_VIEW_MATRIX, Mat4::IDENTITY),
            UniformDecl::with_default(INV_PROJ_MATRIX, Mat4::IDENTITY),
            UniformDecl::with_default(WORLD_VIEW_PROJ_MATRIX, Mat4::IDENTITY),
            UniformDecl::new("DepthTexture", UniformType::Texture2D),
            UniformDecl::new("AlbedoTexture", UniformType::Texture2D),
            UniformDecl::new("NormalTexture", UniformType::Texture2D),
            UniformDecl::new("OthersTexture", UniformType::Texture2D),
            UniformDecl::new("EnvironmentTexture", UniformType::TextureCube),
            UniformDecl::with_default(LIGHT_COUNT, 0_i32),
            UniformDecl::new(LIGHT_COLOR, UniformType::Vec3Array),
            UniformDecl::new(LIGHT_POSITION, UniformType::Vec4Array),
            UniformDecl::new(LIGHT_DIRECTION, UniformType::Vec3Array),
            UniformDecl::new(LIGHT_ATTENUATION, UniformType::Vec4Array),
            UniformDecl::with_default(LIGHT_INDIRECT, 1.0_f32),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let res = &input.resources;
        let uv = input.screen_uv;
        let inv_view = u.mat4(Self::INV_VIEW);
        let inv_proj = u.mat4(Self::INV_PROJ);
        let environment = u.cubemap(Self::ENVIRONMENT);
        let has_environment = res.has_cubemap(environment);

        let depth_texture = u.texture(Self::DEPTH);
        let depth = if res.is_bound(depth_texture) {
            res.fetch(depth_texture, uv).x
        } else {
            1.0
        };

        let ndc_xy = uv * 2.0 - Vec2::ONE;
        if depth >= 1.0 {
            let color = if has_environment {
                let far = dehomogenize(inv_proj * Vec4::new(ndc_xy.x, ndc_xy.y, 1.0, 1.0));
                let direction = inv_view.transform_vector3(far).normalize_or_zero();
                res.sample_cube(environment, direction).truncate()
            } else {
                Vec3::ZERO
            };
            return FragmentOutput::color(sanitize(color).extend(1.0));
        }

        let clip = Vec4::new(ndc_xy.x, ndc_xy.y, depth * 2.0 - 1.0, 1.0);
        let view_pos = dehomogenize(inv_proj * clip);
        let position = inv_view.transform_point3(view_pos);
        let eye = inv_view.w_axis.truncate();

        let others = res.fetch(u.texture(Self::OTHERS), uv);
        let surface = Surface {
            position,
            normal: inv_view
                .transform_vector3(res.fetch(u.texture(Self::NORMAL), uv).truncate())
                .normalize_or_zero(),
            view: (eye - position).normalize_or_zero(),
            albedo: res.fetch(u.texture(Self::ALBEDO), uv).truncate(),
            roughness: others.x,
            metalness: others.y,
        };

        let colors = u.vec3_array(Self::LIGHT_COLOR);
        let positions = u.vec4_array(Self::LIGHT_POSITION);
        let directions = u.vec3_array(Self::LIGHT_DIRECTION);
        let attenuations = u.vec4_array(Self::LIGHT_ATTENUATION);
        let count = usize::try_from(u.int(Self::LIGHT_COUNT))
            .unwrap_or(0)
            .min(colors.len())
            .min(positions.len())
            .min(directions.len())
            .min(attenuations.len());

        let mut color = Vec3::ZERO;
        for i in 0..count {
            let (light_dir, attenuation) =
                light_incidence(&surface, positions[i], directions[i], attenuations[i]);
            if attenuation > 0.0 {
                color += surface.direct(light_dir, colors[i] * attenuation);
            }
        }

        let irradiance = if has_environment {
            res.sample_cube(environment, surface.normal).truncate()
        } else {
            AMBIENT_FLOOR
        };
        color += surface.albedo * (1.0 - surface.metalness) * irradiance * u.float(Self::LIGHT_INDIRECT);

        FragmentOutput::color(sanitize(color).extend(1.0))
    }
}

/// Direction towards the light and its attenuation at `surface`.
fn light_incidence(surface: &Surface, position: Vec4, direction: Vec3, attenuation: Vec4) -> (Vec3, f32) {
    let kind = position.w.round();
    if kind == 0.0 {
        return (-direction.normalize_or_zero(), 1.0);
    }

    let to_light = position.truncate() - surface.position;
    let distance = to_light.length();
    let light_dir = to_light.normalize_or_zero();
    let mut falloff = 1.0 - smoothstep(attenuation.x, attenuation.y, distance);

    if kind == 2.0 {
        let cos_theta = (-light_dir).dot(direction.normalize_or_zero());
        falloff *= smoothstep(attenuation.w, attenuation.z, cos_theta);
    }
    (light_dir, falloff)
}

#[inline]
fn dehomogenize(p: Vec4) -> Vec3 {
    if p.w.abs() > f32::EPSILON {
        p.truncate() / p.w
    } else {
        p.truncate()
    }
}

/// Replaces non-finite channels with zero.
#[inline]
fn sanitize(c: Vec3) -> Vec3 {
    Vec3::from_array(c.to_array().map(|v| if v.is_finite() { v } else { 0.0 }))
}

/// Environment cubemap drawn behind the scene.
pub struct SkyboxKernel;

impl SkyboxKernel {
    const INV_VIEW_PROJ: UniformLocation = UniformLocation::new(0);
    const ENVIRONMENT: UniformLocation = UniformLocation::new(1);
}

impl ShaderKernel for SkyboxKernel {
    fn name(&self) -> &'static str {
        "skybox"
    }

    fn declarations(&self) -> Vec<UniformDecl> {
        vec![
            UniformDecl::with_default(SKYBOX_INV_VIEW_PROJ, Mat4::IDENTITY),
            UniformDecl::new("EnvironmentTexture", UniformType::TextureCube),
        ]
    }

    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput {
        let u = &input.uniforms;
        let ndc = input.screen_uv * 2.0 - Vec2::ONE;
        let direction = dehomogenize(u.mat4(Self::INV_VIEW_PROJ) * Vec4::new(ndc.x, ndc.y, 1.0, 1.0));
        let color = input
            .resources
            .sample_cube(u.cubemap(Self::ENVIRONMENT), direction.normalize_or_zero());
        FragmentOutput::color(sanitize(color.truncate()).extend(1.0))
    }
}
