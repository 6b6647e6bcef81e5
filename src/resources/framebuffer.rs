//! Offscreen drawables: a set of surfaces written together by one pass.

use smallvec::SmallVec;

use super::program::MAX_COLOR_ATTACHMENTS;
use super::TextureId;

/// Creation parameters for [`Framebuffer`].
#[derive(Debug, Clone, Copy)]
pub struct FramebufferDesc<'a> {
    pub label: &'a str,
    pub depth: Option<TextureId>,
    /// Colour outputs in fragment-output order.
    pub colors: &'a [TextureId],
}

/// Offscreen drawable wrapper listing which surfaces are writable outputs.
///
/// Every attachment shares the framebuffer's extent; this is validated when
/// the framebuffer is created and cannot change afterwards.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub label: String,
    pub(crate) depth: Option<TextureId>,
    pub(crate) colors: SmallVec<[TextureId; MAX_COLOR_ATTACHMENTS]>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) is_default: bool,
}

impl Framebuffer {
    #[inline]
    #[must_use]
    pub fn depth_attachment(&self) -> Option<TextureId> {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn color_attachments(&self) -> &[TextureId] {
        &self.colors
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` for the display surface owned by the renderer.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Every surface this framebuffer writes, depth first.
    pub fn attachments(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.depth.into_iter().chain(self.colors.iter().copied())
    }
}
