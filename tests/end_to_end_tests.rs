//! End-to-End Frame Tests
//!
//! Tests for:
//! - Minimal G-buffer → deferred → copy pipeline at 256x256
//! - Empty scene through the full chain: finite output, visible sky
//! - Exposure monotonicity of the compose stage on a lit quad
//! - Demo scene smoke run and PNG capture

use afterglow::postfx::Effect;
use afterglow::renderer::registry::{LIGHT_UNIFORMS, TRANSFORM_UNIFORMS};
use afterglow::renderer::{DeferredPass, GBufferPass, PostFxPass};
use afterglow::resources::FramebufferDesc;
use afterglow::shaders::BUILTIN_INCLUDES;
use afterglow::{
    Camera, DemoScene, Environment, Light, Mesh, PixelFormat, PostFxConfig, PostFxPipeline,
    RenderDevice,
    Renderer, RendererSettings, Scene, SceneModel, ShaderLibrary, SoftwareDevice,
    TransformUpdate, capture,
};
use glam::{Mat4, Vec3, Vec4};

fn software_renderer(size: u32) -> Renderer {
    Renderer::new(SoftwareDevice::new(), RendererSettings::with_size(size, size)).unwrap()
}

fn luminance(c: Vec4) -> f32 {
    c.truncate().dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

// ============================================================================
// Minimal Deferred Pipeline
// ============================================================================

#[test]
fn gbuffer_deferred_copy_renders_sky_only() {
    const SIZE: u32 = 256;
    let mut renderer = software_renderer(SIZE);
    let library = ShaderLibrary::builtin();

    let gbuffer = GBufferPass::new(renderer.resources_mut(), SIZE, SIZE).unwrap();
    let scene_color = renderer
        .create_color_target("Scene Color", PixelFormat::Rgba16Float)
        .unwrap();
    let arena = renderer.resources_mut();
    let scene_fb = arena
        .create_framebuffer(&FramebufferDesc {
            label: "Scene",
            depth: None,
            colors: &[scene_color],
        })
        .unwrap();
    let sky = arena.create_cubemap(Environment::gradient_sky(16)).unwrap();

    let sources: Vec<&str> = BUILTIN_INCLUDES
        .iter()
        .copied()
        .chain(["deferred/lighting"])
        .collect();
    let deferred_program = library.load(arena, &sources).unwrap();
    let filtered: Vec<&str> = TRANSFORM_UNIFORMS.iter().chain(LIGHT_UNIFORMS).copied().collect();
    let deferred = arena.create_material(deferred_program, &filtered).unwrap();
    {
        let material = arena.material_mut(deferred).unwrap();
        material.set_uniform("DepthTexture", gbuffer.depth_texture()).unwrap();
        material.set_uniform("AlbedoTexture", gbuffer.albedo_texture()).unwrap();
        material.set_uniform("NormalTexture", gbuffer.normal_texture()).unwrap();
        material.set_uniform("OthersTexture", gbuffer.others_texture()).unwrap();
        material.set_uniform("EnvironmentTexture", sky).unwrap();
    }

    let copy_program = library.load(arena, &["postfx/copy"]).unwrap();
    let copy = arena.create_material(copy_program, &[]).unwrap();
    arena
        .material_mut(copy)
        .unwrap()
        .set_uniform("SourceTexture", scene_color)
        .unwrap();

    let lights = renderer.default_light_update(deferred_program);
    renderer.register_shader_program(deferred_program, TransformUpdate::ScreenSpace, lights);
    renderer.add_render_pass(gbuffer);
    renderer.add_render_pass(DeferredPass::new(deferred, scene_fb));
    let display = renderer.default_framebuffer();
    renderer.add_render_pass(PostFxPass::new("Copy", copy, display));

    renderer.set_camera(
        &Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
            .with_look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y),
    );
    renderer.add_light(Light::new_directional(Vec3::new(0.0, -1.0, -0.3), Vec3::ONE, 3.0));
    renderer.render();

    let pixels = renderer.display_pixels();
    assert_eq!(pixels.len(), (SIZE * SIZE) as usize);
    assert!(pixels.iter().all(|p| p.is_finite()));
    // Looking at the horizon: every pixel shows the sky gradient.
    assert!(pixels.iter().all(|p| luminance(*p) > 0.0));
}

// ============================================================================
// Empty Scene
// ============================================================================

#[test]
fn empty_scene_renders_finite_sky() {
    let mut renderer = software_renderer(32);
    let library = ShaderLibrary::builtin();
    let sky = renderer
        .resources_mut()
        .create_cubemap(Environment::gradient_sky(8))
        .unwrap();
    PostFxPipeline::assemble(&mut renderer, &library, Some(sky), &PostFxConfig::default())
        .unwrap();

    let camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
        .with_look_at(Vec3::ZERO, Vec3::new(0.0, 0.2, -1.0), Vec3::Y);
    let mut scene = Scene::new(camera);
    scene.add_light(Light::new_directional(Vec3::new(0.0, -1.0, -0.3), Vec3::ONE, 3.0));
    scene.submit(&mut renderer);
    renderer.render();

    let pixels = renderer.display_pixels();
    assert_eq!(pixels.len(), 32 * 32);
    assert!(pixels.iter().all(|p| p.is_finite()), "display holds NaN/Inf");
    assert!(pixels.iter().any(|p| luminance(*p) > 0.0), "sky is invisible");
}

#[test]
fn empty_scene_without_environment_stays_finite() {
    let mut renderer = software_renderer(16);
    PostFxPipeline::assemble(
        &mut renderer,
        &ShaderLibrary::builtin(),
        None,
        &PostFxConfig::default(),
    )
    .unwrap();
    renderer.render();
    assert!(renderer.display_pixels().iter().all(|p| p.is_finite()));
}

// ============================================================================
// Exposure
// ============================================================================

#[test]
fn center_luminance_grows_with_exposure() {
    const SIZE: u32 = 64;
    let mut renderer = software_renderer(SIZE);
    let library = ShaderLibrary::builtin();

    let arena = renderer.resources_mut();
    let program = library
        .load(arena, &[BUILTIN_INCLUDES[0], BUILTIN_INCLUDES[1], "deferred/gbuffer"])
        .unwrap();
    let material = arena.create_material(program, TRANSFORM_UNIFORMS).unwrap();
    arena
        .material_mut(material)
        .unwrap()
        .set_uniform("Color", Vec3::ONE)
        .unwrap();
    let quad = arena.add_mesh(Mesh::quad(1.0));
    renderer.register_shader_program(program, TransformUpdate::ObjectSpace, None);

    let mut pipeline =
        PostFxPipeline::assemble(&mut renderer, &library, None, &PostFxConfig::default())
            .unwrap();

    // Stop after compose so only the tone map sees the exposure change.
    let compose = pipeline
        .stages()
        .iter()
        .position(|s| s.effect == Effect::Compose)
        .unwrap();
    let compose_target = pipeline.texture(pipeline.stages()[compose].target).unwrap();
    let passes = renderer.passes()[..=3 + compose].to_vec();
    renderer.clear_passes();
    for pass in passes {
        renderer.add_render_pass(pass);
    }

    let camera = Camera::new_perspective(45.0, 1.0, 0.1, 10.0)
        .with_look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y);
    let mut scene = Scene::new(camera);
    scene.add_model(SceneModel::new("quad", Mat4::IDENTITY, quad, material));
    scene.add_light(Light::new_directional(Vec3::new(0.0, 0.0, -1.0), Vec3::ONE, 1.0));

    let mut previous = f32::NEG_INFINITY;
    for exposure in [0.5, 1.0, 2.0, 4.0] {
        let config = PostFxConfig {
            exposure,
            ..PostFxConfig::default()
        };
        assert!(!pipeline.apply_config(&mut renderer, &config).unwrap());
        scene.submit(&mut renderer);
        renderer.render();

        let texture = renderer.resources().texture(compose_target).unwrap();
        let center = luminance(texture.read(SIZE / 2, SIZE / 2));
        assert!(center.is_finite());
        assert!(
            center >= previous,
            "exposure {exposure}: {center} < {previous}"
        );
        previous = center;
    }
    assert!(previous > 0.0);
}

// ============================================================================
// Demo Scene
// ============================================================================

#[test]
fn demo_scene_renders_and_captures() {
    let mut renderer = software_renderer(48);
    let library = ShaderLibrary::builtin();
    let mut demo = DemoScene::build(&mut renderer, &library, &PostFxConfig::default()).unwrap();

    for _ in 0..2 {
        demo.frame(&mut renderer, 1.0 / 30.0);
    }

    assert_eq!(renderer.frame_index(), 2);
    assert!((demo.pipeline.time() - 2.0 / 30.0).abs() < 1e-5);
    assert!(renderer.device().stats().triangles > 0);
    assert!(renderer.display_pixels().iter().all(|p| p.is_finite()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    capture::save_png(renderer.resources(), renderer.display_texture(), &path).unwrap();
    let image = image::open(&path).unwrap();
    assert_eq!((image.width(), image.height()), (48, 48));
}
