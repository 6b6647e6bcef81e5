//! Render Device
//!
//! The seam between the pass pipeline and whatever executes draw work. The
//! shape follows a command encoder: a pass is opened against one target
//! framebuffer, receives any number of draws, and is closed again.
//!
//! ```text
//! begin_pass(desc) ─▶ draw(program, geometry, uniforms) × N ─▶ end_pass()
//! ```
//!
//! Devices never own resources. Every call receives the
//! [`ResourceArena`] so the same pass list can drive the CPU reference
//! device, the `wgpu` device or a recorder without changes.

pub mod gpu;
pub mod raster;
pub mod recording;
pub mod software;

use bitflags::bitflags;
use glam::Vec4;

use crate::resources::{FramebufferId, MeshId, ProgramId, ResourceArena, UniformValue};

pub use gpu::WgpuDevice;
pub use recording::{DeviceCommand, RecordingDevice};
pub use software::SoftwareDevice;

bitflags! {
    /// Which attachments a pass clears when it begins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    #[default]
    Less,
    LessEqual,
    Always,
}

impl CompareFunction {
    #[inline]
    #[must_use]
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Always => true,
        }
    }
}

/// Depth test configuration. `compare: None` disables the test entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub compare: Option<CompareFunction>,
    pub write: bool,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        compare: None,
        write: false,
    };

    pub const OPAQUE: Self = Self {
        compare: Some(CompareFunction::Less),
        write: true,
    };

    /// Tested against existing depth but never written (background overlays).
    pub const READ_ONLY_LESS_EQUAL: Self = Self {
        compare: Some(CompareFunction::LessEqual),
        write: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Replace,
    Additive,
}

/// Everything a device needs to open a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDescriptor<'a> {
    pub label: &'a str,
    pub target: FramebufferId,
    pub clear: ClearFlags,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub depth: DepthState,
    pub blend: BlendMode,
}

impl<'a> PassDescriptor<'a> {
    /// A pass that loads existing contents, with no depth test and replace blending.
    #[must_use]
    pub fn load(label: &'a str, target: FramebufferId) -> Self {
        Self {
            label,
            target,
            clear: ClearFlags::empty(),
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            depth: DepthState::DISABLED,
            blend: BlendMode::Replace,
        }
    }

    #[must_use]
    pub fn with_clear(mut self, clear: ClearFlags, color: Vec4, depth: f32) -> Self {
        self.clear = clear;
        self.clear_color = color;
        self.clear_depth = depth;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }
}

/// What a draw call rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawGeometry {
    Mesh(MeshId),
    /// One fragment per target pixel, at depth `1.0` (the far plane).
    Fullscreen,
}

/// One draw: the program to run, what to rasterize, and the program's
/// uniform values at the moment the draw was issued.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub geometry: DrawGeometry,
    pub uniforms: &'a [Option<UniformValue>],
}

/// Counters accumulated by a device since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: u64,
    pub draw_calls: u64,
    pub triangles: u64,
    pub fragments: u64,
}

/// Executes the draw work issued by render passes.
///
/// Calls arrive strictly in submission order; devices must complete the
/// effects of one pass before the next pass reads them.
pub trait RenderDevice {
    fn begin_pass(&mut self, arena: &mut ResourceArena, desc: &PassDescriptor<'_>);

    fn draw(&mut self, arena: &mut ResourceArena, call: &DrawCall<'_>);

    fn end_pass(&mut self, arena: &mut ResourceArena);

    fn stats(&self) -> FrameStats;
}
