//! Deferred lighting resolve: one full-screen draw that reads the G-buffer
//! and the frame's light arrays and writes shaded colour.

use glam::Mat4;

use super::{FrameContext, PassEncoder};
use crate::renderer::device::{DrawGeometry, PassDescriptor, RenderDevice};
use crate::resources::{FramebufferId, MaterialId};

#[derive(Debug, Clone)]
pub struct DeferredPass {
    pub material: MaterialId,
    pub target: FramebufferId,
}

impl DeferredPass {
    #[must_use]
    pub fn new(material: MaterialId, target: FramebufferId) -> Self {
        Self { material, target }
    }

    pub(crate) fn execute<D: RenderDevice>(
        &self,
        encoder: &mut PassEncoder<'_, D>,
        frame: &FrameContext<'_>,
    ) {
        let label = "Deferred Lighting";
        if !encoder.check_resources(label, self.target, Some(self.material)) {
            return;
        }

        // Every pixel is rewritten, so no clear. Depth stays untouched and
        // readable as the G-buffer depth input.
        encoder.begin(&PassDescriptor::load(label, self.target));
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
