//! Renderer Settings
//!
//! Construction-time configuration of a [`Renderer`](super::Renderer): the
//! display surface size and format, and the colour used by
//! [`Renderer::clear_display`](super::Renderer::clear_display).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use afterglow::renderer::{Renderer, RendererSettings, SoftwareDevice};
//!
//! let settings = RendererSettings {
//!     width: 640,
//!     height: 360,
//!     ..Default::default()
//! };
//! let renderer = Renderer::new(SoftwareDevice::new(), settings)?;
//! ```
//!
//! The size is fixed for the renderer's lifetime; every buffer allocated
//! during pipeline assembly is sized from it.

use glam::Vec4;

use crate::resources::PixelFormat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Storage format of the display surface.
    ///
    /// `Rgba8Unorm` matches a typical swapchain; `Rgba16Float` keeps the
    /// unclamped output, which is useful for inspecting HDR values in tests.
    pub surface_format: PixelFormat,
    /// Colour written by `Renderer::clear_display`.
    pub clear_color: Vec4,
}

impl Default for RendererSettings {
    #[inline]
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            surface_format: PixelFormat::Rgba8Unorm,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

impl RendererSettings {
    #[inline]
    #[must_use]
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
