//! Render Passes
//!
//! The closed set of pass variants a [`Renderer`](super::Renderer) executes.
//! Each variant holds keys of the descriptor(s) it draws with and the
//! framebuffer it writes; [`RenderPass::execute`] dispatches on the variant.
//!
//! | Variant            | Geometry      | Depth                  | Target            |
//! |--------------------|---------------|------------------------|-------------------|
//! | `GBuffer`          | draw list     | test + write           | own 4-output FBO  |
//! | `DeferredLighting` | full screen   | off                    | scene colour      |
//! | `Skybox`           | full screen   | `<=`, read-only        | scene colour      |
//! | `PostFx`           | full screen   | off                    | scratch / display |

mod deferred;
mod gbuffer;
mod postfx;
mod skybox;

use glam::Mat4;

use super::device::{DrawCall, DrawGeometry, PassDescriptor, RenderDevice};
use super::registry::{ProgramRegistry, UpdateContext};
use crate::resources::{
    FramebufferId, MaterialId, MeshId, ProgramId, ResourceArena, ShaderProgram,
};

pub use deferred::DeferredPass;
pub use gbuffer::GBufferPass;
pub use postfx::PostFxPass;
pub use skybox::{SKYBOX_INV_VIEW_PROJ, SkyboxPass};

/// One scene object gathered for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub world: Mat4,
    pub mesh: MeshId,
    pub material: MaterialId,
}

/// Read-only frame state shared by every pass of one `render()` call.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub frame_index: u64,
    pub draw_items: &'a [DrawItem],
    pub update: UpdateContext<'a>,
}

/// Mutable state a pass executes against.
pub struct PassEncoder<'a, D: RenderDevice> {
    pub device: &'a mut D,
    pub arena: &'a mut ResourceArena,
    pub registry: &'a mut ProgramRegistry,
}

impl<D: RenderDevice> PassEncoder<'_, D> {
    /// `true` when both the target and the material still exist; logs the
    /// reason and returns `false` otherwise.
    pub(crate) fn check_resources(
        &self,
        label: &str,
        target: FramebufferId,
        material: Option<MaterialId>,
    ) -> bool {
        if self.arena.framebuffer(target).is_none() {
            log::warn!("Skipping pass `{label}`: target framebuffer was removed");
            return false;
        }
        if let Some(material) = material
            && self.arena.material(material).is_none()
        {
            log::warn!("Skipping pass `{label}`: material was removed");
            return false;
        }
        true
    }

    /// Uploads `material`, runs the program's update routines for `world`,
    /// and submits one draw. Returns the program drawn with.
    pub(crate) fn draw_material(
        &mut self,
        material: MaterialId,
        geometry: DrawGeometry,
        world: Mat4,
        frame: &FrameContext<'_>,
        before_draw: impl FnOnce(&mut ShaderProgram),
    ) -> Option<ProgramId> {
        let program_id = self.arena.bind_material(material)?;
        let program = self.arena.program_mut(program_id)?;
        self.registry
            .prepare(program_id, program, world, &frame.update);
        before_draw(program);
        let uniforms = program.snapshot();
        self.device.draw(
            self.arena,
            &DrawCall {
                program: program_id,
                geometry,
                uniforms: &uniforms,
            },
        );
        Some(program_id)
    }

    pub(crate) fn begin(&mut self, desc: &PassDescriptor<'_>) {
        self.device.begin_pass(self.arena, desc);
    }

    pub(crate) fn end(&mut self) {
        self.device.end_pass(self.arena);
    }
}

/// A unit of per-frame draw work.
#[derive(Debug, Clone)]
pub enum RenderPass {
    GBuffer(GBufferPass),
    DeferredLighting(DeferredPass),
    Skybox(SkyboxPass),
    PostFx(PostFxPass),
}

impl RenderPass {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::GBuffer(_) => "G-Buffer",
            Self::DeferredLighting(_) => "Deferred Lighting",
            Self::Skybox(_) => "Skybox",
            Self::PostFx(pass) => &pass.label,
        }
    }

    /// Framebuffer this pass writes.
    #[must_use]
    pub fn target(&self) -> FramebufferId {
        match self {
            Self::GBuffer(pass) => pass.framebuffer(),
            Self::DeferredLighting(pass) => pass.target,
            Self::Skybox(pass) => pass.target,
            Self::PostFx(pass) => pass.target,
        }
    }

    /// Descriptor this pass draws with, if it has a single one.
    #[must_use]
    pub fn material(&self) -> Option<MaterialId> {
        match self {
            Self::GBuffer(_) => None,
            Self::DeferredLighting(pass) => Some(pass.material),
            Self::Skybox(pass) => Some(pass.material),
            Self::PostFx(pass) => Some(pass.material),
        }
    }

    pub fn execute<D: RenderDevice>(&self, encoder: &mut PassEncoder<'_, D>, frame: &FrameContext<'_>) {
        match self {
            Self::GBuffer(pass) => pass.execute(encoder, frame),
            Self::DeferredLighting(pass) => pass.execute(encoder, frame),
            Self::Skybox(pass) => pass.execute(encoder, frame),
            Self::PostFx(pass) => pass.execute(encoder, frame),
        }
    }
}

impl From<GBufferPass> for RenderPass {
    fn from(pass: GBufferPass) -> Self {
        Self::GBuffer(pass)
    }
}

impl From<DeferredPass> for RenderPass {
    fn from(pass: DeferredPass) -> Self {
        Self::DeferredLighting(pass)
    }
}

impl From<SkyboxPass> for RenderPass {
    fn from(pass: SkyboxPass) -> Self {
        Self::Skybox(pass)
    }
}

impl From<PostFxPass> for RenderPass {
    fn from(pass: PostFxPass) -> Self {
        Self::PostFx(pass)
    }
}
