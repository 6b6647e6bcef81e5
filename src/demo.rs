//! Demo Scene
//!
//! A small lit scene (floor, cube, sphere and an animated TV screen under
//! one directional light and a gradient sky) wired through the full
//! post-FX pipeline. Used by the viewer binary, the frame benchmark and the
//! end-to-end tests.

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::errors::Result;
use crate::postfx::{PostFxConfig, PostFxPipeline};
use crate::renderer::registry::TRANSFORM_UNIFORMS;
use crate::renderer::{RenderDevice, Renderer, TransformUpdate};
use crate::resources::{MaterialId, Mesh, ProgramId, ResourceArena};
use crate::scene::{Camera, Environment, Light, Scene, SceneModel};
use crate::shaders::{BUILTIN_INCLUDES, ShaderLibrary};

/// Face size of the procedural sky cubemap.
pub const SKY_SIZE: u32 = 32;

pub struct DemoScene {
    pub scene: Scene,
    pub pipeline: PostFxPipeline,
    pub gbuffer_program: ProgramId,
    pub tv_material: MaterialId,
}

impl DemoScene {
    /// Loads programs, meshes and descriptors, and assembles the pipeline
    /// on `renderer`.
    pub fn build<D: RenderDevice>(
        renderer: &mut Renderer<D>,
        library: &ShaderLibrary,
        config: &PostFxConfig,
    ) -> Result<Self> {
        let settings = *renderer.settings();
        let arena = renderer.resources_mut();

        let sky = arena.create_cubemap(Environment::gradient_sky(SKY_SIZE))?;
        let gbuffer_program = library.load(
            arena,
            &[BUILTIN_INCLUDES[0], BUILTIN_INCLUDES[1], "deferred/gbuffer"],
        )?;
        let tv_program = library.load(arena, &[BUILTIN_INCLUDES[0], "tvscreen"])?;

        let floor = surface(arena, gbuffer_program, Vec3::splat(0.6), 0.8, 0.0)?;
        let crate_box = surface(arena, gbuffer_program, Vec3::new(0.8, 0.3, 0.2), 0.6, 0.0)?;
        let ball = surface(arena, gbuffer_program, Vec3::new(0.95, 0.9, 0.85), 0.3, 1.0)?;
        let tv_material = arena.create_material(tv_program, TRANSFORM_UNIFORMS)?;
        if let Some(material) = arena.material_mut(tv_material) {
            let resolution = Vec2::new(settings.width as f32, settings.height as f32);
            material.set_uniform("Resolution", resolution)?;
        }

        let plane = arena.add_mesh(Mesh::plane(10.0));
        let cube = arena.add_mesh(Mesh::cube(1.0));
        let sphere = arena.add_mesh(Mesh::uv_sphere(0.5, 24, 16));
        let quad = arena.add_mesh(Mesh::quad(1.0));

        renderer.register_shader_program(gbuffer_program, TransformUpdate::ObjectSpace, None);
        renderer.register_shader_program(tv_program, TransformUpdate::WorldViewProj, None);

        let camera = Camera::new_perspective(1.0_f32.to_degrees(), settings.aspect_ratio(), 0.1, 100.0)
            .with_look_at(Vec3::new(-2.0, 1.0, -2.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y);

        let mut scene = Scene::new(camera);
        scene.environment = Environment::new().with_env_map(sky);
        scene.add_model(SceneModel::new("floor", Mat4::IDENTITY, plane, floor));
        scene.add_model(SceneModel::new(
            "cube",
            Mat4::from_translation(Vec3::new(0.8, 0.5, 0.3)),
            cube,
            crate_box,
        ));
        scene.add_model(SceneModel::new(
            "sphere",
            Mat4::from_translation(Vec3::new(-0.6, 0.5, 0.6)),
            sphere,
            ball,
        ));
        scene.add_model(SceneModel::new(
            "tv",
            Mat4::from_rotation_translation(Quat::from_rotation_y(PI + 0.62), Vec3::new(0.5, 1.2, 1.5)),
            quad,
            tv_material,
        ));
        scene.add_light(Light::new_directional(Vec3::new(0.0, -1.0, -0.3), Vec3::ONE, 3.0));

        let mut pipeline = PostFxPipeline::assemble(renderer, library, Some(sky), config)?;
        pipeline.animate_material(renderer.resources(), tv_material)?;

        Ok(Self {
            scene,
            pipeline,
            gbuffer_program,
            tv_material,
        })
    }

    /// Advances animation by `dt` seconds, submits the scene and renders one frame.
    pub fn frame<D: RenderDevice>(&mut self, renderer: &mut Renderer<D>, dt: f32) {
        self.pipeline.advance_time(renderer, dt);
        self.scene.submit(renderer);
        renderer.render();
    }
}

/// Opaque G-buffer surface descriptor.
fn surface(
    arena: &mut ResourceArena,
    program: ProgramId,
    color: Vec3,
    roughness: f32,
    metalness: f32,
) -> Result<MaterialId> {
    let id = arena.create_material(program, TRANSFORM_UNIFORMS)?;
    if let Some(material) = arena.material_mut(id) {
        material.set_uniform("Color", color)?;
        material.set_uniform("Roughness", roughness)?;
        material.set_uniform("Metalness", metalness)?;
    }
    Ok(id)
}
