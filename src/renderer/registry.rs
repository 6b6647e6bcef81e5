//! Per-program update routines.
//!
//! Every program that draws scene objects is registered once with a
//! [`TransformUpdate`] and, optionally, a [`LightUpdate`]. Registration
//! resolves the uniform locations each routine writes, so the per-object
//! work is a handful of indexed stores with no name lookups.
//!
//! The registry also tracks, per program, the camera revision it last saw.
//! That is what produces the `camera_changed` flag: the first object drawn
//! with a program in a frame (or after [`set_camera`]) sees `true`, every
//! following object under the same camera sees `false`.
//!
//! [`set_camera`]: super::Renderer::set_camera

use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::resources::{ProgramId, ShaderProgram, UniformLocation, UniformValue};
use crate::scene::{Camera, Light};

/// Upper bound on lights uploaded to a program; extra lights are dropped.
pub const MAX_LIGHTS: usize = 8;

pub const WORLD_VIEW_MATRIX: &str = "WorldViewMatrix";
pub const WORLD_VIEW_PROJ_MATRIX: &str = "WorldViewProjMatrix";
pub const INV_VIEW_MATRIX: &str = "InvViewMatrix";
pub const INV_PROJ_MATRIX: &str = "InvProjMatrix";

pub const LIGHT_COUNT: &str = "LightCount";
pub const LIGHT_COLOR: &str = "LightColor";
pub const LIGHT_POSITION: &str = "LightPosition";
pub const LIGHT_DIRECTION: &str = "LightDirection";
pub const LIGHT_ATTENUATION: &str = "LightAttenuation";
pub const LIGHT_INDIRECT: &str = "LightIndirect";

/// Uniforms owned by transform routines; hide them from effect descriptors.
pub const TRANSFORM_UNIFORMS: &[&str] = &[
    WORLD_VIEW_MATRIX,
    WORLD_VIEW_PROJ_MATRIX,
    INV_VIEW_MATRIX,
    INV_PROJ_MATRIX,
];

/// Uniforms owned by the light routine.
pub const LIGHT_UNIFORMS: &[&str] = &[
    LIGHT_COUNT,
    LIGHT_COLOR,
    LIGHT_POSITION,
    LIGHT_DIRECTION,
    LIGHT_ATTENUATION,
    LIGHT_INDIRECT,
];

/// Custom transform routine: `(program, world, camera, camera_changed)`.
pub type TransformFn = fn(&mut ShaderProgram, Mat4, &Camera, bool);

/// Which transform routine a program runs before each object is drawn.
#[derive(Debug, Clone, Copy)]
pub enum TransformUpdate {
    /// The program takes no transform uniforms.
    None,
    /// `WorldViewMatrix` and `WorldViewProjMatrix` (G-buffer geometry).
    ObjectSpace,
    /// `WorldViewProjMatrix` only.
    WorldViewProj,
    /// `InvViewMatrix` and `InvProjMatrix` when the camera changed, plus
    /// `WorldViewProjMatrix` (full-screen resolves that reconstruct positions).
    ScreenSpace,
    Custom(TransformFn),
}

/// A [`TransformUpdate`] with its uniform locations resolved.
#[derive(Debug, Clone, Copy)]
enum TransformRoutine {
    None,
    ObjectSpace {
        world_view: Option<UniformLocation>,
        world_view_proj: Option<UniformLocation>,
    },
    WorldViewProj {
        world_view_proj: Option<UniformLocation>,
    },
    ScreenSpace {
        inv_view: Option<UniformLocation>,
        inv_proj: Option<UniformLocation>,
        world_view_proj: Option<UniformLocation>,
    },
    Custom(TransformFn),
}

impl TransformRoutine {
    fn resolve(update: TransformUpdate, program: &ShaderProgram) -> Self {
        match update {
            TransformUpdate::None => Self::None,
            TransformUpdate::ObjectSpace => Self::ObjectSpace {
                world_view: program.uniform_location(WORLD_VIEW_MATRIX),
                world_view_proj: program.uniform_location(WORLD_VIEW_PROJ_MATRIX),
            },
            TransformUpdate::WorldViewProj => Self::WorldViewProj {
                world_view_proj: program.uniform_location(WORLD_VIEW_PROJ_MATRIX),
            },
            TransformUpdate::ScreenSpace => Self::ScreenSpace {
                inv_view: program.uniform_location(INV_VIEW_MATRIX),
                inv_proj: program.uniform_location(INV_PROJ_MATRIX),
                world_view_proj: program.uniform_location(WORLD_VIEW_PROJ_MATRIX),
            },
            TransformUpdate::Custom(f) => Self::Custom(f),
        }
    }

    fn apply(&self, program: &mut ShaderProgram, world: Mat4, camera: &Camera, camera_changed: bool) {
        match *self {
            Self::None => {}
            Self::ObjectSpace {
                world_view,
                world_view_proj,
            } => {
                program.set_uniform(world_view, (camera.view_matrix() * world).into());
                program.set_uniform(
                    world_view_proj,
                    (camera.view_projection_matrix() * world).into(),
                );
            }
            Self::WorldViewProj { world_view_proj } => {
                program.set_uniform(
                    world_view_proj,
                    (camera.view_projection_matrix() * world).into(),
                );
            }
            Self::ScreenSpace {
                inv_view,
                inv_proj,
                world_view_proj,
            } => {
                if camera_changed {
                    program.set_uniform(inv_view, camera.view_matrix().inverse().into());
                    program.set_uniform(inv_proj, camera.projection_matrix().inverse().into());
                }
                program.set_uniform(
                    world_view_proj,
                    (camera.view_projection_matrix() * world).into(),
                );
            }
            Self::Custom(f) => f(program, world, camera, camera_changed),
        }
    }
}

/// The default light routine: uploads the frame's light list as arrays.
///
/// | Uniform            | Type         | Contents                                   |
/// |--------------------|--------------|--------------------------------------------|
/// | `LightCount`       | int          | number of entries used                     |
/// | `LightColor`       | vec3\[8\]    | `color * intensity`                        |
/// | `LightPosition`    | vec4\[8\]    | xyz position, w = type (0 dir, 1 pt, 2 spot)|
/// | `LightDirection`   | vec3\[8\]    | direction of travel                        |
/// | `LightAttenuation` | vec4\[8\]    | range start/end, cos inner/outer angle     |
/// | `LightIndirect`    | float        | ambient/environment intensity              |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightUpdate {
    count: Option<UniformLocation>,
    color: Option<UniformLocation>,
    position: Option<UniformLocation>,
    direction: Option<UniformLocation>,
    attenuation: Option<UniformLocation>,
    indirect: Option<UniformLocation>,
}

impl LightUpdate {
    #[must_use]
    pub fn resolve(program: &ShaderProgram) -> Self {
        Self {
            count: program.uniform_location(LIGHT_COUNT),
            color: program.uniform_location(LIGHT_COLOR),
            position: program.uniform_location(LIGHT_POSITION),
            direction: program.uniform_location(LIGHT_DIRECTION),
            attenuation: program.uniform_location(LIGHT_ATTENUATION),
            indirect: program.uniform_location(LIGHT_INDIRECT),
        }
    }

    pub fn apply(&self, program: &mut ShaderProgram, lights: &[Light], indirect: f32) {
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "{} lights submitted, only the first {MAX_LIGHTS} are uploaded",
                lights.len()
            );
        }
        let lights = &lights[..lights.len().min(MAX_LIGHTS)];

        let colors: Vec<Vec3> = lights.iter().map(Light::radiance).collect();
        let positions: Vec<Vec4> = lights
            .iter()
            .map(|l| l.position().extend(l.type_code()))
            .collect();
        let directions: Vec<Vec3> = lights.iter().map(Light::direction).collect();
        let attenuations: Vec<Vec4> = lights.iter().map(Light::attenuation).collect();

        program.set_uniform(self.count, UniformValue::Int(lights.len() as i32));
        program.set_uniform(self.color, UniformValue::Vec3Array(colors));
        program.set_uniform(self.position, UniformValue::Vec4Array(positions));
        program.set_uniform(self.direction, UniformValue::Vec3Array(directions));
        program.set_uniform(self.attenuation, UniformValue::Vec4Array(attenuations));
        program.set_uniform(self.indirect, UniformValue::Float(indirect));
    }
}

#[derive(Debug, Clone, Copy)]
struct ProgramBinding {
    transform: TransformRoutine,
    lights: Option<LightUpdate>,
    last_camera_revision: Option<u64>,
}

/// Per-frame state the update routines read.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    pub camera: &'a Camera,
    pub camera_revision: u64,
    pub lights: &'a [Light],
    pub indirect_light: f32,
}

/// Program → update routines.
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    bindings: FxHashMap<ProgramId, ProgramBinding>,
}

impl ProgramRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-registers) `program_id`. Re-registration resets its
    /// camera tracking.
    pub fn register(
        &mut self,
        program_id: ProgramId,
        program: &ShaderProgram,
        transform: TransformUpdate,
        lights: Option<LightUpdate>,
    ) {
        self.bindings.insert(
            program_id,
            ProgramBinding {
                transform: TransformRoutine::resolve(transform, program),
                lights,
                last_camera_revision: None,
            },
        );
    }

    #[inline]
    #[must_use]
    pub fn is_registered(&self, program_id: ProgramId) -> bool {
        self.bindings.contains_key(&program_id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Runs the program's routines for one object. Unregistered programs are
    /// left untouched.
    pub fn prepare(
        &mut self,
        program_id: ProgramId,
        program: &mut ShaderProgram,
        world: Mat4,
        ctx: &UpdateContext<'_>,
    ) {
        let Some(binding) = self.bindings.get_mut(&program_id) else {
            return;
        };
        let camera_changed = binding.last_camera_revision != Some(ctx.camera_revision);
        binding.last_camera_revision = Some(ctx.camera_revision);

        binding
            .transform
            .apply(program, world, ctx.camera, camera_changed);
        if let Some(lights) = binding.lights {
            lights.apply(program, ctx.lights, ctx.indirect_light);
        }
    }
}
