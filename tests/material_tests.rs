//! Effect Descriptor Tests
//!
//! Tests for:
//! - Uniform set/get round trip on a material
//! - Unknown and filtered uniform names
//! - Declared type enforcement
//! - Applying a descriptor onto program-resident uniform state
//! - Program linking through the shader library

use afterglow::renderer::registry::TRANSFORM_UNIFORMS;
use afterglow::resources::{Texture2D, UniformType};
use afterglow::{
    AfterglowError, Material, PixelFormat, ResourceArena, ShaderLibrary, UniformValue,
};
use glam::{Vec2, Vec3};

fn arena_with_program(sources: &[&str]) -> (ResourceArena, afterglow::ProgramId) {
    let mut arena = ResourceArena::new();
    let program = ShaderLibrary::builtin().load(&mut arena, sources).unwrap();
    (arena, program)
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn set_then_get_returns_the_same_value() {
    let (mut arena, program) = arena_with_program(&["postfx/compose"]);
    let id = arena.create_material(program, &[]).unwrap();
    let material = arena.material_mut(id).unwrap();

    material.set_uniform("Exposure", 1.7_f32).unwrap();
    material.set_uniform("ColorFilter", Vec3::new(1.0, 0.9, 0.8)).unwrap();

    assert_eq!(material.float("Exposure"), Some(1.7));
    assert_eq!(
        material.uniform("ColorFilter"),
        Some(&UniformValue::Vec3(Vec3::new(1.0, 0.9, 0.8)))
    );
}

#[test]
fn unset_uniform_reads_as_none() {
    let (mut arena, program) = arena_with_program(&["postfx/compose"]);
    let id = arena.create_material(program, &[]).unwrap();
    let material = arena.material(id).unwrap();

    assert!(material.has_uniform("Contrast"));
    assert_eq!(material.uniform("Contrast"), None);
}

#[test]
fn later_writes_replace_earlier_ones() {
    let (mut arena, program) = arena_with_program(&["postfx/vignette"]);
    let id = arena.create_material(program, &[]).unwrap();
    let material = arena.material_mut(id).unwrap();

    material.set_uniform("VignetteIntensity", 0.2_f32).unwrap();
    material.set_uniform("VignetteIntensity", 0.9_f32).unwrap();
    assert_eq!(material.float("VignetteIntensity"), Some(0.9));
}

// ============================================================================
// Name & Type Checks
// ============================================================================

#[test]
fn unknown_uniform_is_an_error() {
    let (mut arena, program) = arena_with_program(&["postfx/bloom"]);
    let id = arena.create_material(program, &[]).unwrap();
    let err = arena
        .material_mut(id)
        .unwrap()
        .set_uniform("Exposure", 1.0_f32)
        .unwrap_err();

    match err {
        AfterglowError::UnknownUniform { name, program } => {
            assert_eq!(name, "Exposure");
            assert_eq!(program, "postfx/bloom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn filtered_names_are_not_editable() {
    let (mut arena, program) = arena_with_program(&["deferred/gbuffer"]);
    let id = arena.create_material(program, TRANSFORM_UNIFORMS).unwrap();
    let material = arena.material_mut(id).unwrap();

    assert!(!material.has_uniform("WorldViewProjMatrix"));
    assert!(material.has_uniform("Color"));
    assert!(matches!(
        material.set_uniform("WorldViewProjMatrix", glam::Mat4::IDENTITY),
        Err(AfterglowError::UnknownUniform { .. })
    ));
    assert!(material.uniform_names().all(|n| !TRANSFORM_UNIFORMS.contains(&n)));
}

#[test]
fn mismatched_type_is_rejected_and_value_kept() {
    let (mut arena, program) = arena_with_program(&["postfx/bloom"]);
    let id = arena.create_material(program, &[]).unwrap();
    let material = arena.material_mut(id).unwrap();

    material.set_uniform("Range", Vec2::new(0.5, 1.5)).unwrap();
    let err = material.set_uniform("Range", 2.0_f32).unwrap_err();

    assert!(matches!(
        err,
        AfterglowError::UniformTypeMismatch {
            expected: UniformType::Vec2,
            found: UniformType::Float,
            ..
        }
    ));
    assert_eq!(material.uniform("Range"), Some(&UniformValue::Vec2(Vec2::new(0.5, 1.5))));
}

#[test]
fn texture_bindings_go_through_the_same_path() {
    let (mut arena, program) = arena_with_program(&["postfx/copy"]);
    let texture = arena
        .create_texture(Texture2D::new("src", 4, 4, PixelFormat::Rgba16Float))
        .unwrap();
    let id = arena.create_material(program, &[]).unwrap();
    let material = arena.material_mut(id).unwrap();

    material.set_uniform("SourceTexture", texture).unwrap();
    assert_eq!(material.uniform("SourceTexture"), Some(&UniformValue::Texture(texture)));
}

#[test]
fn create_material_requires_a_live_program() {
    let (mut arena, program) = arena_with_program(&["postfx/copy"]);
    let id = arena.create_material(program, &[]).unwrap();
    let stale = arena.material(id).unwrap().program();

    let mut other = ResourceArena::new();
    assert!(matches!(
        other.create_material(stale, &[]),
        Err(AfterglowError::MissingResource(_))
    ));
}

// ============================================================================
// Apply
// ============================================================================

#[test]
fn apply_writes_set_values_into_the_program() {
    let (mut arena, program) = arena_with_program(&["postfx/noise"]);
    let mut material = Material::new(program, arena.program(program).unwrap());
    material.set_uniform("Amount", 0.3_f32).unwrap();

    let program = arena.program_mut(program).unwrap();
    material.apply(program);

    let location = program.uniform_location("Amount").unwrap();
    assert_eq!(program.uniform(location), Some(&UniformValue::Float(0.3)));
}

#[test]
fn apply_leaves_unset_uniforms_at_their_defaults() {
    let (mut arena, program) = arena_with_program(&["postfx/noise"]);
    let material = Material::new(program, arena.program(program).unwrap());

    let program = arena.program_mut(program).unwrap();
    material.apply(program);

    let location = program.uniform_location("Amount").unwrap();
    assert_eq!(program.uniform(location), Some(&UniformValue::Float(0.08)));
}

#[test]
fn programs_link_from_include_lists() {
    let library = ShaderLibrary::builtin();
    let program = library
        .build(&[
            "shaders/version330.glsl",
            "shaders/utils.glsl",
            "shaders/lambert-ggx.glsl",
            "shaders/lighting.glsl",
            "deferred/lighting",
        ])
        .unwrap();
    assert_eq!(program.name(), "deferred/lighting");
    assert!(program.uniform_location("EnvironmentTexture").is_some());

    assert!(matches!(
        library.build(&[]),
        Err(AfterglowError::InvalidShaderSource(_))
    ));
    assert!(matches!(
        library.build(&["postfx/missing"]),
        Err(AfterglowError::ShaderNotFound(_))
    ));
}
