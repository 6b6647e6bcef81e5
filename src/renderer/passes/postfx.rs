use glam::Mat4;

use super::{FrameContext, PassEncoder};
use crate::renderer::device::{DrawGeometry, PassDescriptor, RenderDevice};
use crate::resources::{FramebufferId, MaterialId};

/// Full-screen image-space effect. Which effect runs is decided entirely
/// by the descriptor's program and uniforms; the pass logic is shared.
#[derive(Debug, Clone)]
pub struct PostFxPass {
    pub label: String,
    pub material: MaterialId,
    pub target: FramebufferId,
}

impl PostFxPass {
    #[must_use]
    pub fn new(label: impl Into<String>, material: MaterialId, target: FramebufferId) -> Self {
        Self {
            label: label.into(),
            material,
            target,
        }
    }

    pub(crate) fn execute<D: RenderDevice>(
        &self,
        encoder: &mut PassEncoder<'_, D>,
        frame: &FrameContext<'_>,
    ) {
        if !encoder.check_resources(&self.label, self.target, Some(self.material)) {
            return;
        }
        encoder.begin(&PassDescriptor::load(&self.label, self.target));
        encoder.draw_material(
            self.material,
            DrawGeometry::Fullscreen,
            Mat4::IDENTITY,
            frame,
            |_| {},
        );
        encoder.end();
    }
}
