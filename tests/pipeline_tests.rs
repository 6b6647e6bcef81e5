//! Pipeline Assembly Tests
//!
//! Tests for:
//! - Default chain order as submitted to the device
//! - Final stage targets the display surface
//! - Ping-pong wiring: no stage reads its own target
//! - BlurIterations = 0 leaves the bloom output untouched until compose
//! - Config re-application, re-wiring and time advancement
//! - Fatal assembly errors for missing kernels

use afterglow::postfx::{BufferRef, Effect, SCRATCH_BUFFER_COUNT, SCRATCH_FORMAT};
use afterglow::{
    AfterglowError, PostFxConfig, PostFxPipeline, RecordingDevice, Renderer, RendererSettings,
    ShaderLibrary, SoftwareDevice, UniformValue,
};

const SIZE: u32 = 16;

fn assemble_recording(config: &PostFxConfig) -> (Renderer<RecordingDevice>, PostFxPipeline) {
    let mut renderer =
        Renderer::new(RecordingDevice::new(), RendererSettings::with_size(SIZE, SIZE)).unwrap();
    let pipeline =
        PostFxPipeline::assemble(&mut renderer, &ShaderLibrary::builtin(), None, config).unwrap();
    (renderer, pipeline)
}

fn material_value(
    renderer: &Renderer<impl afterglow::RenderDevice>,
    material: afterglow::MaterialId,
    name: &str,
) -> Option<UniformValue> {
    renderer.resources().material(material)?.uniform(name).cloned()
}

// ============================================================================
// Chain Order
// ============================================================================

#[test]
fn default_chain_is_submitted_in_documented_order() {
    let (mut renderer, _pipeline) = assemble_recording(&PostFxConfig::default());
    renderer.render();

    assert_eq!(
        renderer.device().pass_labels(),
        [
            "G-Buffer",
            "Deferred Lighting",
            "Skybox",
            "Copy",
            "Bloom",
            "Blur Horizontal",
            "Blur Vertical",
            "Compose",
            "Chromatic Aberration",
            "Noise",
            "Vignette",
            "Barrel Distortion",
            "Scanline",
            "Final Copy",
        ]
    );
}

#[test]
fn final_stage_targets_the_display() {
    for iterations in 0..4 {
        let config = PostFxConfig {
            blur_iterations: iterations,
            ..PostFxConfig::default()
        };
        let (renderer, pipeline) = assemble_recording(&config);

        let last = pipeline.stages().last().unwrap();
        assert_eq!(last.effect, Effect::FinalCopy);
        assert_eq!(last.target, BufferRef::Display);
        assert_eq!(
            renderer.passes().last().unwrap().target(),
            renderer.default_framebuffer()
        );

        let display_writers = pipeline
            .stages()
            .iter()
            .filter(|s| s.target == BufferRef::Display)
            .count();
        assert_eq!(display_writers, 1, "only the last stage may target the display");
    }
}

#[test]
fn every_stage_reads_what_an_earlier_stage_wrote() {
    let (_renderer, pipeline) = assemble_recording(&PostFxConfig {
        blur_iterations: 3,
        ..PostFxConfig::default()
    });

    let mut written = vec![BufferRef::Scene];
    for stage in pipeline.stages() {
        for source in &stage.sources {
            assert!(written.contains(source), "{:?} reads unwritten {source:?}", stage.effect);
            assert_ne!(*source, stage.target, "{:?} aliases its target", stage.effect);
        }
        written.push(stage.target);
    }
}

#[test]
fn scene_framebuffer_shares_gbuffer_depth() {
    let (renderer, pipeline) = assemble_recording(&PostFxConfig::default());
    let scene = renderer
        .resources()
        .framebuffer(pipeline.scene_framebuffer())
        .unwrap();
    assert_eq!(scene.depth_attachment(), Some(pipeline.gbuffer().depth_texture()));
    assert_eq!(scene.color_attachments(), &[pipeline.scene_texture()]);
}

#[test]
fn scratch_pool_has_four_hdr_buffers() {
    let (renderer, pipeline) = assemble_recording(&PostFxConfig::default());
    for i in 0..SCRATCH_BUFFER_COUNT {
        let texture = pipeline.scratch_texture(i).unwrap();
        let texture = renderer.resources().texture(texture).unwrap();
        assert_eq!(texture.format(), SCRATCH_FORMAT);
        assert_eq!(texture.extent(), (SIZE, SIZE));
    }
    assert!(pipeline.scratch_texture(SCRATCH_BUFFER_COUNT).is_none());
}

#[test]
fn deferred_program_is_registered_with_lights() {
    let (renderer, pipeline) = assemble_recording(&PostFxConfig::default());
    let program = renderer
        .resources()
        .material(pipeline.deferred_material())
        .unwrap()
        .program();
    assert!(renderer.registry().is_registered(program));

    let deferred = renderer.resources().material(pipeline.deferred_material()).unwrap();
    assert!(!deferred.has_uniform("InvViewMatrix"));
    assert!(!deferred.has_uniform("LightColor"));
    assert!(deferred.has_uniform("AlbedoTexture"));
}

// ============================================================================
// BlurIterations = 0
// ============================================================================

#[test]
fn zero_blur_iterations_wire_bloom_straight_into_compose() {
    let (_renderer, pipeline) = assemble_recording(&PostFxConfig {
        blur_iterations: 0,
        ..PostFxConfig::default()
    });
    let stages = pipeline.stages();
    let bloom = stages.iter().position(|s| s.effect == Effect::Bloom).unwrap();
    let compose = &stages[bloom + 1];

    assert_eq!(compose.effect, Effect::Compose);
    assert!(stages
        .iter()
        .all(|s| !matches!(s.effect, Effect::BlurHorizontal | Effect::BlurVertical)));
    assert_eq!(compose.sources[1], stages[bloom].target);
}

#[test]
fn zero_blur_iterations_leave_bloom_output_unchanged() {
    let config = PostFxConfig {
        blur_iterations: 0,
        bloom_range: [0.0, 0.5],
        ..PostFxConfig::default()
    };
    let mut renderer =
        Renderer::new(SoftwareDevice::new(), RendererSettings::with_size(SIZE, SIZE)).unwrap();
    let library = ShaderLibrary::builtin();
    let sky = renderer
        .resources_mut()
        .create_cubemap(afterglow::Environment::gradient_sky(8))
        .unwrap();
    let pipeline = PostFxPipeline::assemble(&mut renderer, &library, Some(sky), &config).unwrap();

    let passes = renderer.passes().to_vec();
    let bloom = pipeline
        .stages()
        .iter()
        .position(|s| s.effect == Effect::Bloom)
        .unwrap();
    // Three scene passes precede the post-FX stages.
    let bloom_pass = 3 + bloom;
    let compose_pass = bloom_pass + 1;
    let scratch0 = pipeline.scratch_texture(0).unwrap();
    let capture = |renderer: &Renderer| renderer.resources().texture(scratch0).unwrap().texels();

    renderer.clear_passes();
    for pass in &passes[..=bloom_pass] {
        renderer.add_render_pass(pass.clone());
    }
    renderer.render();
    let after_bloom = capture(&renderer);

    renderer.clear_passes();
    for pass in &passes[..=compose_pass] {
        renderer.add_render_pass(pass.clone());
    }
    renderer.render();
    let compose_input = capture(&renderer);

    assert!(after_bloom.iter().any(|t| t.max_element() > 0.0));
    assert_eq!(after_bloom, compose_input);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn assembly_uploads_config_values() {
    let config = PostFxConfig {
        exposure: 2.0,
        vignette_intensity: 0.7,
        ..PostFxConfig::default()
    };
    let (renderer, pipeline) = assemble_recording(&config);
    let m = pipeline.materials();
    assert_eq!(material_value(&renderer, m.compose, "Exposure"), Some(UniformValue::Float(2.0)));
    assert_eq!(
        material_value(&renderer, m.vignette, "VignetteIntensity"),
        Some(UniformValue::Float(0.7))
    );
    assert_eq!(
        material_value(&renderer, m.scanline, "LineDensity"),
        Some(UniformValue::Float(360.0))
    );
}

#[test]
fn apply_config_updates_uniforms_without_rewiring() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let passes_before = renderer.pass_count();

    let config = PostFxConfig {
        contrast: 1.3,
        ..PostFxConfig::default()
    };
    assert!(!pipeline.requires_rebuild(&config));
    let rewired = pipeline.apply_config(&mut renderer, &config).unwrap();

    assert!(!rewired);
    assert_eq!(renderer.pass_count(), passes_before);
    assert_eq!(
        material_value(&renderer, pipeline.materials().compose, "Contrast"),
        Some(UniformValue::Float(1.3))
    );
}

#[test]
fn changing_blur_iterations_rewires_the_chain() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let stages_before = pipeline.stages().len();

    let config = PostFxConfig {
        blur_iterations: 3,
        ..PostFxConfig::default()
    };
    assert!(pipeline.requires_rebuild(&config));
    assert!(pipeline.apply_config(&mut renderer, &config).unwrap());

    assert_eq!(pipeline.stages().len(), stages_before + 4);
    assert_eq!(renderer.pass_count(), 3 + pipeline.stages().len());
    assert_eq!(pipeline.stages().last().unwrap().target, BufferRef::Display);
}

#[test]
fn out_of_range_config_is_clamped_on_apply() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let config = PostFxConfig {
        exposure: 100.0,
        ..PostFxConfig::default()
    };
    pipeline.apply_config(&mut renderer, &config).unwrap();
    assert_eq!(pipeline.config().exposure, 5.0);
    assert_eq!(
        material_value(&renderer, pipeline.materials().compose, "Exposure"),
        Some(UniformValue::Float(5.0))
    );
}

#[test]
fn advance_time_accumulates_on_animated_effects() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    pipeline.advance_time(&mut renderer, 0.25);
    pipeline.advance_time(&mut renderer, 0.5);

    assert!((pipeline.time() - 0.75).abs() < 1e-6);
    for material in [pipeline.materials().noise, pipeline.materials().scanline] {
        assert_eq!(material_value(&renderer, material, "Time"), Some(UniformValue::Float(0.75)));
    }
}

#[test]
fn animating_a_descriptor_without_time_is_rejected() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let copy = pipeline.materials().copy;

    let result = pipeline.animate_material(renderer.resources(), copy);
    assert!(matches!(
        result,
        Err(AfterglowError::UnknownUniform { ref name, .. }) if name == "Time"
    ));

    // The rejected descriptor does not disturb later advances.
    pipeline.advance_time(&mut renderer, 1.0);
    pipeline.advance_time(&mut renderer, 1.0);
    assert!((pipeline.time() - 2.0).abs() < 1e-6);
    assert_eq!(material_value(&renderer, copy, "Time"), None);
    assert_eq!(
        material_value(&renderer, pipeline.materials().noise, "Time"),
        Some(UniformValue::Float(2.0))
    );
}

#[test]
fn removed_animated_descriptor_is_skipped_and_frames_continue() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let library = ShaderLibrary::builtin();
    let tv_program = library
        .load(renderer.resources_mut(), &["shaders/version330.glsl", "tvscreen"])
        .unwrap();
    let tv = renderer.resources_mut().create_material(tv_program, &[]).unwrap();
    pipeline.animate_material(renderer.resources(), tv).unwrap();
    renderer.resources_mut().remove_material(tv);

    pipeline.advance_time(&mut renderer, 0.5);
    renderer.render();

    assert_eq!(
        material_value(&renderer, pipeline.materials().scanline, "Time"),
        Some(UniformValue::Float(0.5))
    );
    assert_eq!(renderer.frame_index(), 1);
    assert_eq!(renderer.device().pass_labels().len(), renderer.pass_count());
}

#[test]
fn animating_a_missing_descriptor_fails() {
    let (mut renderer, mut pipeline) = assemble_recording(&PostFxConfig::default());
    let noise = pipeline.materials().noise;
    renderer.resources_mut().remove_material(noise);
    assert!(matches!(
        pipeline.animate_material(renderer.resources(), noise),
        Err(AfterglowError::MissingResource(_))
    ));
}

// ============================================================================
// Assembly Errors
// ============================================================================

#[test]
fn missing_kernel_aborts_assembly() {
    let mut renderer =
        Renderer::new(RecordingDevice::new(), RendererSettings::with_size(SIZE, SIZE)).unwrap();
    let result = PostFxPipeline::assemble(
        &mut renderer,
        &ShaderLibrary::new(),
        None,
        &PostFxConfig::default(),
    );
    assert!(matches!(result, Err(AfterglowError::ShaderNotFound(_))));
}
