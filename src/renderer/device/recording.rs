//! A device that records submissions instead of executing them.

use super::{
    BlendMode, ClearFlags, DepthState, DrawCall, DrawGeometry, FrameStats, PassDescriptor,
    RenderDevice,
};
use crate::resources::{FramebufferId, ProgramId, ResourceArena};

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    BeginPass {
        label: String,
        target: FramebufferId,
        clear: ClearFlags,
        depth: DepthState,
        blend: BlendMode,
    },
    Draw {
        program: ProgramId,
        geometry: DrawGeometry,
    },
    EndPass,
}

/// Logs every `begin_pass` / `draw` / `end_pass` in submission order.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    stats: FrameStats,
}

impl RecordingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Labels of every pass begun, in order.
    #[must_use]
    pub fn pass_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BeginPass { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Target of every pass begun, in order.
    #[must_use]
    pub fn pass_targets(&self) -> Vec<FramebufferId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BeginPass { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl RenderDevice for RecordingDevice {
    fn begin_pass(&mut self, _arena: &mut ResourceArena, desc: &PassDescriptor<'_>) {
        self.stats.passes += 1;
        self.commands.push(DeviceCommand::BeginPass {
            label: desc.label.to_string(),
            target: desc.target,
            clear: desc.clear,
            depth: desc.depth,
            blend: desc.blend,
        });
    }

    fn draw(&mut self, _arena: &mut ResourceArena, call: &DrawCall<'_>) {
        self.stats.draw_calls += 1;
        self.commands.push(DeviceCommand::Draw {
            program: call.program,
            geometry: call.geometry,
        });
    }

    fn end_pass(&mut self, _arena: &mut ResourceArena) {
        self.commands.push(DeviceCommand::EndPass);
    }

    fn stats(&self) -> FrameStats {
        self.stats
    }
}
