//! Pipeline Assembly
//!
//! Wires the deferred scene passes and the post-FX chain onto a
//! [`Renderer`]:
//!
//! ```text
//! GBuffer → DeferredLighting → Skybox                       (scene colour)
//!   → Copy(scene → s0) → Bloom(scene → s0)
//!   → [BlurH(s0 → s1) → BlurV(s1 → s0)] × BlurIterations
//!   → Compose(scene + s0 → s1)
//!   → Chromatic(s1 → s0) → Noise(s0 → s1) → Vignette(s1 → s0)
//!   → Barrel(s0 → s1) → Scanline(s1 → s0)
//!   → FinalCopy(s0 → display)
//! ```
//!
//! Scratch buffers are picked by a ping-pong cursor, so every stage reads
//! what the previous stage wrote and no stage reads its own target. The
//! wiring is recorded as a list of [`Stage`]s for inspection.
//!
//! Each effect owns one descriptor. The blur axes share theirs across
//! iterations; every iteration reads and writes the same buffer pair.

use glam::Vec2;
use smallvec::{SmallVec, smallvec};

use super::config::PostFxConfig;
use crate::errors::{AfterglowError, Result};
use crate::renderer::registry::{LIGHT_UNIFORMS, TRANSFORM_UNIFORMS};
use crate::renderer::{
    DeferredPass, GBufferPass, PostFxPass, RenderDevice, Renderer, SkyboxPass, TransformUpdate,
};
use crate::renderer::passes::SKYBOX_INV_VIEW_PROJ;
use crate::resources::{
    CubemapId, FramebufferDesc, FramebufferId, MaterialId, PixelFormat, ProgramId,
    ResourceArena, TextureId, UniformType, UniformValue,
};
use crate::shaders::{BUILTIN_INCLUDES, SOURCE_TEXTURE, ShaderLibrary};

/// Size of the scratch buffer pool.
pub const SCRATCH_BUFFER_COUNT: usize = 4;

/// Format of the scene colour and scratch buffers.
pub const SCRATCH_FORMAT: PixelFormat = PixelFormat::Rgba16Float;

/// An image buffer as seen by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRef {
    /// Lit scene colour written by the deferred and skybox passes.
    Scene,
    Scratch(usize),
    /// The renderer's default framebuffer.
    Display,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Copy,
    Bloom,
    BlurHorizontal,
    BlurVertical,
    Compose,
    ChromaticAberration,
    Noise,
    Vignette,
    Barrel,
    Scanline,
    FinalCopy,
}

impl Effect {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Copy => "Copy",
            Self::Bloom => "Bloom",
            Self::BlurHorizontal => "Blur Horizontal",
            Self::BlurVertical => "Blur Vertical",
            Self::Compose => "Compose",
            Self::ChromaticAberration => "Chromatic Aberration",
            Self::Noise => "Noise",
            Self::Vignette => "Vignette",
            Self::Barrel => "Barrel Distortion",
            Self::Scanline => "Scanline",
            Self::FinalCopy => "Final Copy",
        }
    }

    /// Kernel entry name in the shader library.
    #[must_use]
    pub fn kernel(self) -> &'static str {
        match self {
            Self::Copy | Self::FinalCopy => "postfx/copy",
            Self::Bloom => "postfx/bloom",
            Self::BlurHorizontal | Self::BlurVertical => "postfx/blur",
            Self::Compose => "postfx/compose",
            Self::ChromaticAberration => "postfx/chromatic",
            Self::Noise => "postfx/noise",
            Self::Vignette => "postfx/vignette",
            Self::Barrel => "postfx/barrel",
            Self::Scanline => "postfx/scanline",
        }
    }

    /// Texture uniforms receiving the stage's sources, in source order.
    fn source_uniforms(self) -> &'static [&'static str] {
        match self {
            Self::Compose => &[SOURCE_TEXTURE, "BloomTexture"],
            _ => &[SOURCE_TEXTURE],
        }
    }
}

/// One wired post-FX draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub effect: Effect,
    pub sources: SmallVec<[BufferRef; 2]>,
    pub target: BufferRef,
    pub material: MaterialId,
}

/// Effect descriptors of the chain, one per effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFxMaterials {
    pub copy: MaterialId,
    pub bloom: MaterialId,
    pub blur_horizontal: MaterialId,
    pub blur_vertical: MaterialId,
    pub compose: MaterialId,
    pub chromatic: MaterialId,
    pub noise: MaterialId,
    pub vignette: MaterialId,
    pub barrel: MaterialId,
    pub scanline: MaterialId,
    pub final_copy: MaterialId,
}

impl PostFxMaterials {
    #[must_use]
    pub fn for_effect(&self, effect: Effect) -> MaterialId {
        match effect {
            Effect::Copy => self.copy,
            Effect::Bloom => self.bloom,
            Effect::BlurHorizontal => self.blur_horizontal,
            Effect::BlurVertical => self.blur_vertical,
            Effect::Compose => self.compose,
            Effect::ChromaticAberration => self.chromatic,
            Effect::Noise => self.noise,
            Effect::Vignette => self.vignette,
            Effect::Barrel => self.barrel,
            Effect::Scanline => self.scanline,
            Effect::FinalCopy => self.final_copy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageBuffer {
    texture: TextureId,
    framebuffer: FramebufferId,
}

/// Read/write cursor over two scratch buffers.
#[derive(Debug, Clone, Copy)]
struct PingPong {
    read: usize,
    write: usize,
}

impl PingPong {
    fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    fn stage(&mut self, effect: Effect) -> (Effect, SmallVec<[BufferRef; 2]>, BufferRef) {
        let stage = (
            effect,
            smallvec![BufferRef::Scratch(self.read)],
            BufferRef::Scratch(self.write),
        );
        self.swap();
        stage
    }
}

/// The post-FX stage sequence for `blur_iterations`, as
/// `(effect, sources, target)`.
#[must_use]
pub fn plan_stages(blur_iterations: u32) -> Vec<(Effect, SmallVec<[BufferRef; 2]>, BufferRef)> {
    let mut plan = Vec::with_capacity(9 + 2 * blur_iterations as usize);
    plan.push((Effect::Copy, smallvec![BufferRef::Scene], BufferRef::Scratch(0)));
    plan.push((Effect::Bloom, smallvec![BufferRef::Scene], BufferRef::Scratch(0)));

    let mut cursor = PingPong { read: 0, write: 1 };
    for _ in 0..blur_iterations {
        plan.push(cursor.stage(Effect::BlurHorizontal));
        plan.push(cursor.stage(Effect::BlurVertical));
    }

    plan.push((
        Effect::Compose,
        smallvec![BufferRef::Scene, BufferRef::Scratch(cursor.read)],
        BufferRef::Scratch(cursor.write),
    ));
    cursor.swap();

    for effect in [
        Effect::ChromaticAberration,
        Effect::Noise,
        Effect::Vignette,
        Effect::Barrel,
        Effect::Scanline,
    ] {
        plan.push(cursor.stage(effect));
    }

    plan.push((
        Effect::FinalCopy,
        smallvec![BufferRef::Scratch(cursor.read)],
        BufferRef::Display,
    ));
    plan
}

pub struct PostFxPipeline {
    gbuffer: GBufferPass,
    scene: ImageBuffer,
    scratch: Vec<ImageBuffer>,
    display: FramebufferId,

    deferred_material: MaterialId,
    skybox_material: MaterialId,
    materials: PostFxMaterials,

    stages: Vec<Stage>,
    config: PostFxConfig,

    time: f32,
    animated: Vec<MaterialId>,
}

impl PostFxPipeline {
    /// Builds every buffer, program and descriptor of the pipeline and
    /// installs its passes on `renderer`, replacing any existing ones.
    ///
    /// Scene programs that draw into the G-buffer are registered by the
    /// caller. `environment` feeds the skybox and the indirect term.
    pub fn assemble<D: RenderDevice>(
        renderer: &mut Renderer<D>,
        library: &ShaderLibrary,
        environment: Option<CubemapId>,
        config: &PostFxConfig,
    ) -> Result<Self> {
        let config = config.clamped();
        let (width, height) = (renderer.settings().width, renderer.settings().height);

        let gbuffer = GBufferPass::new(renderer.resources_mut(), width, height)?;
        let scene = create_buffer(renderer, "Scene Color", Some(gbuffer.depth_texture()))?;
        let mut scratch = Vec::with_capacity(SCRATCH_BUFFER_COUNT);
        for i in 0..SCRATCH_BUFFER_COUNT {
            scratch.push(create_buffer(renderer, &format!("Scratch {i}"), None)?);
        }

        // Deferred resolve
        let sources: Vec<&str> = BUILTIN_INCLUDES
            .iter()
            .copied()
            .chain(["deferred/lighting"])
            .collect();
        let deferred_program = library.load(renderer.resources_mut(), &sources)?;
        let filtered: Vec<&str> = TRANSFORM_UNIFORMS
            .iter()
            .chain(LIGHT_UNIFORMS)
            .copied()
            .collect();
        let deferred_material = renderer
            .resources_mut()
            .create_material(deferred_program, &filtered)?;
        {
            let arena = renderer.resources_mut();
            set_uniform(arena, deferred_material, "DepthTexture", gbuffer.depth_texture())?;
            set_uniform(arena, deferred_material, "AlbedoTexture", gbuffer.albedo_texture())?;
            set_uniform(arena, deferred_material, "NormalTexture", gbuffer.normal_texture())?;
            set_uniform(arena, deferred_material, "OthersTexture", gbuffer.others_texture())?;
            if let Some(environment) = environment {
                set_uniform(arena, deferred_material, "EnvironmentTexture", environment)?;
            }
        }
        let lights = renderer.default_light_update(deferred_program);
        renderer.register_shader_program(deferred_program, TransformUpdate::ScreenSpace, lights);

        // Skybox
        let skybox_program = library.load(renderer.resources_mut(), &[BUILTIN_INCLUDES[0], "skybox"])?;
        let skybox_material = renderer
            .resources_mut()
            .create_material(skybox_program, &[SKYBOX_INV_VIEW_PROJ])?;
        if let Some(environment) = environment {
            set_uniform(renderer.resources_mut(), skybox_material, "EnvironmentTexture", environment)?;
        }

        // Post-FX descriptors
        let arena = renderer.resources_mut();
        let copy_program = load_effect(arena, library, Effect::Copy)?;
        let blur_program = load_effect(arena, library, Effect::BlurHorizontal)?;
        let materials = PostFxMaterials {
            copy: arena.create_material(copy_program, &[])?,
            bloom: effect_material(arena, library, Effect::Bloom)?,
            blur_horizontal: arena.create_material(blur_program, &[])?,
            blur_vertical: arena.create_material(blur_program, &[])?,
            compose: effect_material(arena, library, Effect::Compose)?,
            chromatic: effect_material(arena, library, Effect::ChromaticAberration)?,
            noise: effect_material(arena, library, Effect::Noise)?,
            vignette: effect_material(arena, library, Effect::Vignette)?,
            barrel: effect_material(arena, library, Effect::Barrel)?,
            scanline: effect_material(arena, library, Effect::Scanline)?,
            final_copy: arena.create_material(copy_program, &[])?,
        };
        let texel = Vec2::new(1.0 / width as f32, 1.0 / height as f32);
        set_uniform(arena, materials.blur_horizontal, "Scale", Vec2::new(texel.x, 0.0))?;
        set_uniform(arena, materials.blur_vertical, "Scale", Vec2::new(0.0, texel.y))?;

        let mut pipeline = Self {
            gbuffer,
            scene,
            scratch,
            display: renderer.default_framebuffer(),
            deferred_material,
            skybox_material,
            materials,
            stages: Vec::new(),
            config,
            time: 0.0,
            animated: vec![materials.noise, materials.scanline],
        };
        pipeline.wire(renderer)?;
        pipeline.upload_config(renderer.resources_mut())?;

        log::info!(
            "Post-FX pipeline assembled: {}x{}, {} passes, {} blur iteration(s)",
            width,
            height,
            renderer.pass_count(),
            pipeline.config.blur_iterations
        );
        Ok(pipeline)
    }

    /// Re-applies every tunable. A change of `BlurIterations` re-wires the
    /// chain; returns `true` when that happened.
    pub fn apply_config<D: RenderDevice>(
        &mut self,
        renderer: &mut Renderer<D>,
        config: &PostFxConfig,
    ) -> Result<bool> {
        let config = config.clamped();
        let rebuild = self.requires_rebuild(&config);
        self.config = config;
        if rebuild {
            log::debug!(
                "Re-wiring post-FX chain for {} blur iteration(s)",
                self.config.blur_iterations
            );
            self.wire(renderer)?;
        }
        self.upload_config(renderer.resources_mut())?;
        Ok(rebuild)
    }

    /// `true` when `config` changes the pass structure, not just uniforms.
    #[must_use]
    pub fn requires_rebuild(&self, config: &PostFxConfig) -> bool {
        config.clamped().blur_iterations != self.config.blur_iterations
    }

    /// Advances the `Time` uniform of the animated descriptors.
    ///
    /// Descriptors removed from the arena since they were registered are
    /// skipped; the frame never fails here.
    pub fn advance_time<D: RenderDevice>(&mut self, renderer: &mut Renderer<D>, seconds: f32) {
        self.time += seconds;
        let arena = renderer.resources_mut();
        for &material in &self.animated {
            let Some(descriptor) = arena.material_mut(material) else {
                log::warn!("advance_time: animated descriptor no longer exists");
                continue;
            };
            if let Err(err) = descriptor.set_uniform("Time", self.time) {
                log::warn!("advance_time: {err}");
            }
        }
    }

    /// Adds a descriptor whose `Time` uniform follows [`advance_time`](Self::advance_time).
    ///
    /// The descriptor must expose a float `Time` uniform.
    pub fn animate_material(&mut self, arena: &ResourceArena, material: MaterialId) -> Result<()> {
        let descriptor = arena
            .material(material)
            .ok_or_else(|| AfterglowError::MissingResource("animated descriptor".to_string()))?;
        match descriptor.uniform_type("Time") {
            Some(UniformType::Float) => {}
            Some(found) => {
                return Err(AfterglowError::UniformTypeMismatch {
                    name: "Time".to_string(),
                    expected: UniformType::Float,
                    found,
                });
            }
            None => {
                return Err(AfterglowError::UnknownUniform {
                    name: "Time".to_string(),
                    program: descriptor.program_name().to_string(),
                });
            }
        }
        if !self.animated.contains(&material) {
            self.animated.push(material);
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[inline]
    #[must_use]
    pub fn materials(&self) -> &PostFxMaterials {
        &self.materials
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PostFxConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn gbuffer(&self) -> &GBufferPass {
        &self.gbuffer
    }

    #[inline]
    #[must_use]
    pub fn deferred_material(&self) -> MaterialId {
        self.deferred_material
    }

    #[inline]
    #[must_use]
    pub fn skybox_material(&self) -> MaterialId {
        self.skybox_material
    }

    #[inline]
    #[must_use]
    pub fn scene_texture(&self) -> TextureId {
        self.scene.texture
    }

    #[inline]
    #[must_use]
    pub fn scene_framebuffer(&self) -> FramebufferId {
        self.scene.framebuffer
    }

    #[must_use]
    pub fn scratch_texture(&self, index: usize) -> Option<TextureId> {
        self.scratch.get(index).map(|b| b.texture)
    }

    /// Texture behind a chain buffer; `None` for the display.
    #[must_use]
    pub fn texture(&self, buffer: BufferRef) -> Option<TextureId> {
        match buffer {
            BufferRef::Scene => Some(self.scene.texture),
            BufferRef::Scratch(i) => self.scratch_texture(i),
            BufferRef::Display => None,
        }
    }

    #[must_use]
    pub fn framebuffer(&self, buffer: BufferRef) -> Option<FramebufferId> {
        match buffer {
            BufferRef::Scene => Some(self.scene.framebuffer),
            BufferRef::Scratch(i) => self.scratch.get(i).map(|b| b.framebuffer),
            BufferRef::Display => Some(self.display),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Installs the scene passes and the post-FX stages for the current
    /// blur iteration count.
    fn wire<D: RenderDevice>(&mut self, renderer: &mut Renderer<D>) -> Result<()> {
        renderer.clear_passes();
        renderer.add_render_pass(self.gbuffer.clone());
        renderer.add_render_pass(DeferredPass::new(self.deferred_material, self.scene.framebuffer));
        renderer.add_render_pass(SkyboxPass::new(self.skybox_material, self.scene.framebuffer));

        self.stages.clear();
        for (effect, sources, target) in plan_stages(self.config.blur_iterations) {
            let material = self.materials.for_effect(effect);
            for (name, source) in effect.source_uniforms().iter().zip(&sources) {
                let texture = self.texture(*source).ok_or_else(|| {
                    AfterglowError::MissingResource(format!("source {source:?} of `{}`", effect.label()))
                })?;
                set_uniform(renderer.resources_mut(), material, name, texture)?;
            }

            let framebuffer = self.framebuffer(target).ok_or_else(|| {
                AfterglowError::MissingResource(format!("target {target:?} of `{}`", effect.label()))
            })?;
            renderer.add_render_pass(PostFxPass::new(effect.label(), material, framebuffer));
            self.stages.push(Stage {
                effect,
                sources,
                target,
                material,
            });
        }
        Ok(())
    }

    fn upload_config(&self, arena: &mut ResourceArena) -> Result<()> {
        let c = &self.config;
        let m = &self.materials;

        set_uniform(arena, m.bloom, "Range", c.bloom_range())?;
        set_uniform(arena, m.bloom, "Intensity", c.bloom_intensity)?;

        set_uniform(arena, m.compose, "Exposure", c.exposure)?;
        set_uniform(arena, m.compose, "Contrast", c.contrast)?;
        set_uniform(arena, m.compose, "HueShift", c.hue_shift)?;
        set_uniform(arena, m.compose, "Saturation", c.saturation)?;
        set_uniform(arena, m.compose, "ColorFilter", c.color_filter())?;

        set_uniform(arena, m.chromatic, "AbAmount", c.chromatic_aberration_amount)?;
        set_uniform(arena, m.vignette, "VignetteIntensity", c.vignette_intensity)?;
        set_uniform(arena, m.vignette, "VignetteSmoothness", c.vignette_smoothness)?;
        set_uniform(arena, m.barrel, "Distortion", c.barrel_distortion)?;
        set_uniform(arena, m.scanline, "LineDensity", c.scanline_density)?;
        set_uniform(arena, m.scanline, "Intensity", c.scanline_intensity)?;
        Ok(())
    }
}

fn create_buffer<D: RenderDevice>(
    renderer: &mut Renderer<D>,
    label: &str,
    depth: Option<TextureId>,
) -> Result<ImageBuffer> {
    let texture = renderer.create_color_target(label, SCRATCH_FORMAT)?;
    let framebuffer = renderer.resources_mut().create_framebuffer(&FramebufferDesc {
        label,
        depth,
        colors: &[texture],
    })?;
    Ok(ImageBuffer {
        texture,
        framebuffer,
    })
}

fn load_effect(arena: &mut ResourceArena, library: &ShaderLibrary, effect: Effect) -> Result<ProgramId> {
    library.load(arena, &[BUILTIN_INCLUDES[0], BUILTIN_INCLUDES[1], effect.kernel()])
}

fn effect_material(arena: &mut ResourceArena, library: &ShaderLibrary, effect: Effect) -> Result<MaterialId> {
    let program = load_effect(arena, library, effect)?;
    arena.create_material(program, &[])
}

fn set_uniform(
    arena: &mut ResourceArena,
    material: MaterialId,
    name: &str,
    value: impl Into<UniformValue>,
) -> Result<()> {
    arena
        .material_mut(material)
        .ok_or_else(|| AfterglowError::MissingResource(format!("descriptor for `{name}`")))?
        .set_uniform(name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_matches_the_documented_chain() {
        use BufferRef::{Display, Scene, Scratch};

        let plan = plan_stages(1);
        let expected: Vec<(Effect, Vec<BufferRef>, BufferRef)> = vec![
            (Effect::Copy, vec![Scene], Scratch(0)),
            (Effect::Bloom, vec![Scene], Scratch(0)),
            (Effect::BlurHorizontal, vec![Scratch(0)], Scratch(1)),
            (Effect::BlurVertical, vec![Scratch(1)], Scratch(0)),
            (Effect::Compose, vec![Scene, Scratch(0)], Scratch(1)),
            (Effect::ChromaticAberration, vec![Scratch(1)], Scratch(0)),
            (Effect::Noise, vec![Scratch(0)], Scratch(1)),
            (Effect::Vignette, vec![Scratch(1)], Scratch(0)),
            (Effect::Barrel, vec![Scratch(0)], Scratch(1)),
            (Effect::Scanline, vec![Scratch(1)], Scratch(0)),
            (Effect::FinalCopy, vec![Scratch(0)], Display),
        ];
        let actual: Vec<_> = plan
            .into_iter()
            .map(|(e, s, t)| (e, s.to_vec(), t))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn no_stage_reads_its_own_target() {
        for iterations in 0..5 {
            for (effect, sources, target) in plan_stages(iterations) {
                assert!(!sources.contains(&target), "{effect:?} aliases {target:?}");
            }
        }
    }

    #[test]
    fn blur_stage_count_follows_iterations() {
        for iterations in 0..4 {
            let blurs = plan_stages(iterations)
                .iter()
                .filter(|(e, ..)| matches!(e, Effect::BlurHorizontal | Effect::BlurVertical))
                .count();
            assert_eq!(blurs, 2 * iterations as usize);
        }
    }
}
