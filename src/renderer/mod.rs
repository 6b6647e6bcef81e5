//! Renderer
//!
//! Owns the ordered pass list, the program registry, the display surface,
//! the resource arena, and the per-frame inputs gathered by scene traversal.
//!
//! # Frame flow
//!
//! ```text
//! set_camera / add_draw_item / add_light      (scene traversal)
//!                    │
//!                    ▼
//!               render()
//!    ┌───────────────┴────────────────┐
//!    │ passes[0].execute → device     │   strict registration order,
//!    │ passes[1].execute → device     │   no reordering or skipping
//!    │ ...                            │   beyond per-pass early-outs
//!    └───────────────┬────────────────┘
//!                    ▼
//!      draw items and lights cleared
//! ```
//!
//! `render()` never fails. A pass whose target or material has been
//! removed logs a warning and is skipped; the rest of the frame still runs.

pub mod device;
pub mod passes;
pub mod registry;
pub mod settings;

use glam::{Mat4, Vec4};

use crate::errors::{AfterglowError, Result};
use crate::resources::{
    FramebufferId, MaterialId, MeshId, PixelFormat, ProgramId, ResourceArena, SamplerDesc,
    Texture2D, TextureId,
};
use crate::scene::{Camera, Light};

pub use device::{
    BlendMode, ClearFlags, CompareFunction, DepthState, DeviceCommand, DrawCall, DrawGeometry,
    FrameStats, PassDescriptor, RecordingDevice, RenderDevice, SoftwareDevice, WgpuDevice,
};
pub use passes::{
    DeferredPass, DrawItem, FrameContext, GBufferPass, PassEncoder, PostFxPass, RenderPass,
    SkyboxPass,
};
pub use registry::{LightUpdate, MAX_LIGHTS, ProgramRegistry, TransformFn, TransformUpdate, UpdateContext};
pub use settings::RendererSettings;

pub struct Renderer<D: RenderDevice = SoftwareDevice> {
    device: D,
    resources: ResourceArena,
    settings: RendererSettings,

    passes: Vec<RenderPass>,
    registry: ProgramRegistry,

    display: FramebufferId,
    display_texture: TextureId,

    // Per-frame inputs
    camera: Camera,
    camera_revision: u64,
    draw_items: Vec<DrawItem>,
    lights: Vec<Light>,
    indirect_light: f32,

    frame_index: u64,
}

impl<D: RenderDevice> Renderer<D> {
    /// Creates the renderer and its display surface.
    pub fn new(device: D, settings: RendererSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(AfterglowError::InvalidExtent {
                width: settings.width,
                height: settings.height,
            });
        }
        if settings.surface_format.is_depth() {
            return Err(AfterglowError::MissingResource(
                "display surface needs a colour format".to_string(),
            ));
        }

        let mut resources = ResourceArena::new();
        let display_texture = resources.create_texture(
            Texture2D::new(
                "Display Surface",
                settings.width,
                settings.height,
                settings.surface_format,
            )
            .with_sampler(SamplerDesc::NEAREST_CLAMP),
        )?;
        let display = resources.create_default_framebuffer(display_texture)?;

        log::info!(
            "Renderer created: {}x{} display ({:?})",
            settings.width,
            settings.height,
            settings.surface_format
        );

        Ok(Self {
            device,
            resources,
            settings,
            passes: Vec::new(),
            registry: ProgramRegistry::new(),
            display,
            display_texture,
            camera: Camera::default(),
            camera_revision: 0,
            draw_items: Vec::new(),
            lights: Vec::new(),
            indirect_light: 1.0,
            frame_index: 0,
        })
    }

    // ========================================================================
    // Pipeline configuration
    // ========================================================================

    /// Appends a pass. No compatibility checks are made here.
    pub fn add_render_pass(&mut self, pass: impl Into<RenderPass>) {
        let pass = pass.into();
        log::debug!("Render pass #{} added: {}", self.passes.len(), pass.label());
        self.passes.push(pass);
    }

    /// Associates per-object update routines with `program`.
    ///
    /// Unknown programs are logged and ignored.
    pub fn register_shader_program(
        &mut self,
        program: ProgramId,
        transform: TransformUpdate,
        lights: Option<LightUpdate>,
    ) {
        let Some(shader) = self.resources.program(program) else {
            log::warn!("register_shader_program: program does not exist");
            return;
        };
        self.registry.register(program, shader, transform, lights);
    }

    /// The stock light routine resolved for `program`.
    #[must_use]
    pub fn default_light_update(&self, program: ProgramId) -> Option<LightUpdate> {
        self.resources.program(program).map(LightUpdate::resolve)
    }

    /// The display surface, valid as the target of the last pass of a chain.
    #[inline]
    #[must_use]
    pub fn default_framebuffer(&self) -> FramebufferId {
        self.display
    }

    /// Colour surface behind [`default_framebuffer`](Self::default_framebuffer).
    #[inline]
    #[must_use]
    pub fn display_texture(&self) -> TextureId {
        self.display_texture
    }

    // ========================================================================
    // Per-frame inputs
    // ========================================================================

    pub fn set_camera(&mut self, camera: &Camera) {
        self.camera = *camera;
        self.camera_revision += 1;
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn add_draw_item(&mut self, item: DrawItem) {
        self.draw_items.push(item);
    }

    pub fn add_model(&mut self, world: Mat4, mesh: MeshId, material: MaterialId) {
        self.draw_items.push(DrawItem {
            world,
            mesh,
            material,
        });
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Ambient/environment contribution uploaded as `LightIndirect`.
    pub fn set_indirect_light(&mut self, intensity: f32) {
        self.indirect_light = intensity;
    }

    #[inline]
    #[must_use]
    pub fn draw_items(&self) -> &[DrawItem] {
        &self.draw_items
    }

    #[inline]
    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Executes every pass once, in registration order.
    ///
    /// With no passes this submits nothing and leaves every resource
    /// untouched; the frame inputs are still consumed.
    pub fn render(&mut self) {
        self.camera_revision += 1;

        // An empty pass list submits nothing and touches no resource. The
        // frame bookkeeping (revision, inputs, index) still advances so the
        // first object of the next frame reports a camera change and stale
        // inputs never leak into it.
        if !self.passes.is_empty() {
            let frame = FrameContext {
                frame_index: self.frame_index,
                draw_items: &self.draw_items,
                update: UpdateContext {
                    camera: &self.camera,
                    camera_revision: self.camera_revision,
                    lights: &self.lights,
                    indirect_light: self.indirect_light,
                },
            };

            let mut encoder = PassEncoder {
                device: &mut self.device,
                arena: &mut self.resources,
                registry: &mut self.registry,
            };

            for pass in &self.passes {
                pass.execute(&mut encoder, &frame);
            }

            log::debug!(
                "Frame {}: {} passes, {} draw items, {} lights",
                self.frame_index,
                self.passes.len(),
                self.draw_items.len(),
                self.lights.len()
            );
        }

        self.draw_items.clear();
        self.lights.clear();
        self.frame_index += 1;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    #[inline]
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Removes every pass. Registered programs and resources stay.
    pub fn clear_passes(&mut self) {
        self.passes.clear();
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[inline]
    #[must_use]
    pub fn resources(&self) -> &ResourceArena {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourceArena {
        &mut self.resources
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Allocates a colour surface at the display resolution.
    pub fn create_color_target(&mut self, label: &str, format: PixelFormat) -> Result<TextureId> {
        self.resources.create_texture(
            Texture2D::new(label, self.settings.width, self.settings.height, format)
                .with_sampler(SamplerDesc::LINEAR_CLAMP),
        )
    }

    /// Fills the display surface with the configured clear colour.
    ///
    /// The pass chain normally rewrites every display pixel, so this is only
    /// needed when the last pass may be skipped.
    pub fn clear_display(&mut self) {
        let color = self.settings.clear_color;
        if let Some(texture) = self.resources.texture_mut(self.display_texture) {
            texture.data.fill(color);
        }
    }

    /// Current contents of the display surface, bottom row first.
    #[must_use]
    pub fn display_pixels(&self) -> Vec<Vec4> {
        self.resources
            .texture(self.display_texture)
            .map(Texture2D::texels)
            .unwrap_or_default()
    }
}
