//! Geometry-Buffer Pass
//!
//! Rasterizes every draw item into four full-resolution surfaces at once:
//!
//! | Output  | Format         | Contents                                 |
//! |---------|----------------|------------------------------------------|
//! | depth   | `Depth32Float` | window depth, cleared to `1.0`           |
//! | albedo  | `Rgba8Unorm`   | base colour                              |
//! | normal  | `Rgba16Float`  | view-space normal, xyz in `[-1, 1]`      |
//! | others  | `Rgba8Unorm`   | roughness, metalness, unused, coverage   |
//!
//! The pass owns its framebuffer; the surfaces are exposed so pipeline
//! assembly can bind them as inputs of the lighting resolve.

use glam::Vec4;

use super::{FrameContext, PassEncoder};
use crate::errors::Result;
use crate::renderer::device::{ClearFlags, DepthState, DrawGeometry, PassDescriptor, RenderDevice};
use crate::resources::{
    FramebufferDesc, FramebufferId, PixelFormat, ResourceArena, SamplerDesc, Texture2D, TextureId,
};

#[derive(Debug, Clone)]
pub struct GBufferPass {
    framebuffer: FramebufferId,
    depth: TextureId,
    albedo: TextureId,
    normal: TextureId,
    others: TextureId,
}

impl GBufferPass {
    /// Allocates the four surfaces and their framebuffer at `width × height`.
    pub fn new(arena: &mut ResourceArena, width: u32, height: u32) -> Result<Self> {
        let mut surface = |label: &str, format: PixelFormat| {
            arena.create_texture(
                Texture2D::new(label, width, height, format).with_sampler(SamplerDesc::NEAREST_CLAMP),
            )
        };
        let depth = surface("G-Buffer Depth", PixelFormat::Depth32Float)?;
        let albedo = surface("G-Buffer Albedo", PixelFormat::Rgba8Unorm)?;
        let normal = surface("G-Buffer Normal", PixelFormat::Rgba16Float)?;
        let others = surface("G-Buffer Others", PixelFormat::Rgba8Unorm)?;

        let framebuffer = arena.create_framebuffer(&FramebufferDesc {
            label: "G-Buffer",
            depth: Some(depth),
            colors: &[albedo, normal, others],
        })?;

        Ok(Self {
            framebuffer,
            depth,
            albedo,
            normal,
            others,
        })
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    #[inline]
    #[must_use]
    pub fn depth_texture(&self) -> TextureId {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn albedo_texture(&self) -> TextureId {
        self.albedo
    }

    #[inline]
    #[must_use]
    pub fn normal_texture(&self) -> TextureId {
        self.normal
    }

    #[inline]
    #[must_use]
    pub fn others_texture(&self) -> TextureId {
        self.others
    }

    pub(crate) fn execute<D: RenderDevice>(
        &self,
        encoder: &mut PassEncoder<'_, D>,
        frame: &FrameContext<'_>,
    ) {
        let label = "G-Buffer";
        if !encoder.check_resources(label, self.framebuffer, None) {
            return;
        }

        encoder.begin(
            &PassDescriptor::load(label, self.framebuffer)
                .with_clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::ZERO, 1.0)
                .with_depth(DepthState::OPAQUE),
        );

        let mut skipped = 0usize;
        for item in frame.draw_items {
            let drawn = encoder.draw_material(
                item.material,
                DrawGeometry::Mesh(item.mesh),
                item.world,
                frame,
                |_| {},
            );
            if drawn.is_none() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::warn!("G-Buffer: skipped {skipped} draw item(s) with a missing material");
        }

        encoder.end();
    }
}
