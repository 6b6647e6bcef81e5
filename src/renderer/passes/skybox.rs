//! Skybox Render Pass
//!
//! Draws the environment cubemap as a full-screen pass at the far depth
//! plane, tested `LessEqual` against the G-buffer depth without writing it,
//! so lit geometry masks the background.
//!
//! # Pipeline Position
//!
//! ```text
//! GBufferPass → DeferredPass → SkyboxPass → PostFx chain
//! ```
//!
//! Colour is loaded, never cleared: the pass overlays the resolved scene.
//! Only the camera's orientation reaches the shader; the view translation is
//! stripped so the sky stays at infinity.

use glam::{Mat3, Mat4};

use super::{FrameContext, PassEncoder};
use crate::renderer::device::{DepthState, DrawGeometry, PassDescriptor, RenderDevice};
use crate::resources::{FramebufferId, MaterialId};
use crate::scene::Camera;

/// Inverse of `projection * rotation(view)`; maps clip coordinates to a
/// world-space view direction.
pub const SKYBOX_INV_VIEW_PROJ: &str = "InvViewProjRotation";

#[derive(Debug, Clone)]
pub struct SkyboxPass {
    pub material: MaterialId,
    pub target: FramebufferId,
}

impl SkyboxPass {
    #[must_use]
    pub fn new(material: MaterialId, target: FramebufferId) -> Self {
        Self { material, target }
    }

    #[must_use]
    pub fn inverse_view_projection(camera: &Camera) -> Mat4 {
        let rotation = Mat4::from_mat3(Mat3::from_mat4(camera.view_matrix()));
        (camera.projection_matrix() * rotation).inverse()
    }

    pub(crate) fn execute<D: RenderDevice>(
        &self,
        encoder: &mut PassEncoder<'_, D>,
        frame: &FrameContext<'_>,
    ) {
        let label = "Skybox";
        if !encoder.check_resources(label, self.target, Some(self.material)) {
            return;
        }

        let inv_view_proj = Self::inverse_view_projection(frame.update.camera);
        encoder.begin(
            &PassDescriptor::load(label, self.target).with_depth(DepthState::READ_ONLY_LESS_EQUAL),
        );
        encoder.draw_material(
            self.material,
            DrawGeometry::Fullscreen,
            Mat4::IDENTITY,
            frame,
            |program| {
                let location = program.uniform_location(SKYBOX_INV_VIEW_PROJ);
                program.set_uniform(location, inv_view_proj.into());
            },
        );
        encoder.end();
    }
}
