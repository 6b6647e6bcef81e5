//! CPU reference device.
//!
//! While a pass is open the device holds the texel storage of every colour
//! attachment of the target framebuffer, and of its depth attachment when
//! the pass clears, tests or writes depth. The arena copies read as empty
//! for the duration. A program that samples its own render target therefore
//! observes zero, which stands in for the undefined result a GPU driver
//! would produce for same-pass feedback. A depth attachment the pass leaves
//! alone stays readable as a texture.

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use super::raster::{self, Fragment};
use super::{
    BlendMode, ClearFlags, DepthState, DrawCall, DrawGeometry, FrameStats, PassDescriptor,
    RenderDevice,
};
use crate::resources::{
    FragmentInput, MAX_COLOR_ATTACHMENTS, ResourceArena, ShaderKernel, ShaderResources, TexelData,
    TextureId, Uniforms, Varyings, VertexOutput,
};

struct Attachment {
    texture: TextureId,
    data: TexelData,
}

struct ActivePass {
    label: String,
    width: u32,
    height: u32,
    depth: Option<Attachment>,
    colors: SmallVec<[Attachment; MAX_COLOR_ATTACHMENTS]>,
    depth_state: DepthState,
    blend: BlendMode,
}

impl ActivePass {
    /// Early depth test, and depth write when the test passes.
    fn depth_test(&mut self, index: usize, depth: f32) -> bool {
        let (Some(compare), Some(attachment)) = (self.depth_state.compare, self.depth.as_mut()) else {
            return true;
        };
        if !compare.passes(depth, attachment.data.depth(index)) {
            return false;
        }
        if self.depth_state.write {
            attachment.data.write(index, Vec4::splat(depth));
        }
        true
    }

    fn write_colors(&mut self, index: usize, colors: &[Vec4; MAX_COLOR_ATTACHMENTS]) {
        for (attachment, &color) in self.colors.iter_mut().zip(colors.iter()) {
            let value = match self.blend {
                BlendMode::Replace => color,
                BlendMode::Additive => attachment.data.read(index) + color,
            };
            attachment.data.write(index, value);
        }
    }
}

/// Deterministic software rasterizer implementing [`RenderDevice`].
#[derive(Default)]
pub struct SoftwareDevice {
    active: Option<ActivePass>,
    stats: FrameStats,
}

impl SoftwareDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_stats(&mut self) {
        self.stats = FrameStats::default();
    }

    fn shade<'a>(
        pass: &mut ActivePass,
        stats: &mut FrameStats,
        input_for: impl Fn(&Fragment) -> FragmentInput<'a>,
        kernel: &dyn ShaderKernel,
        fragment: &Fragment,
    ) {
        let index = fragment.y as usize * pass.width as usize + fragment.x as usize;
        if !pass.depth_test(index, fragment.depth) {
            return;
        }
        stats.fragments += 1;
        let output = kernel.fragment(&input_for(fragment));
        if !output.discard {
            pass.write_colors(index, &output.colors);
        }
    }
}

impl RenderDevice for SoftwareDevice {
    fn begin_pass(&mut self, arena: &mut ResourceArena, desc: &PassDescriptor<'_>) {
        if self.active.is_some() {
            log::warn!("begin_pass `{}` while a pass is open; closing it", desc.label);
            self.end_pass(arena);
        }

        let Some(framebuffer) = arena.framebuffer(desc.target).cloned() else {
            log::warn!("Pass `{}`: target framebuffer no longer exists", desc.label);
            return;
        };
        let (width, height) = framebuffer.extent();

        let mut checkout = |texture: TextureId| {
            arena
                .take_texels(texture)
                .map(|(data, _, _)| Attachment { texture, data })
        };
        let uses_depth = desc.clear.contains(ClearFlags::DEPTH)
            || desc.depth.compare.is_some()
            || desc.depth.write;
        let depth = framebuffer
            .depth_attachment()
            .filter(|_| uses_depth)
            .and_then(&mut checkout);
        let colors = framebuffer
            .color_attachments()
            .iter()
            .filter_map(|&id| checkout(id))
            .collect::<SmallVec<_>>();

        let mut pass = ActivePass {
            label: desc.label.to_string(),
            width,
            height,
            depth,
            colors,
            depth_state: desc.depth,
            blend: desc.blend,
        };

        if desc.clear.contains(ClearFlags::COLOR) {
            for attachment in &mut pass.colors {
                attachment.data.fill(desc.clear_color);
            }
        }
        if desc.clear.contains(ClearFlags::DEPTH) {
            if let Some(depth) = pass.depth.as_mut() {
                depth.data.fill(Vec4::splat(desc.clear_depth));
            }
        }

        self.stats.passes += 1;
        self.active = Some(pass);
    }

    fn draw(&mut self, arena: &mut ResourceArena, call: &DrawCall<'_>) {
        let Some(pass) = self.active.as_mut() else {
            return;
        };
        let arena: &ResourceArena = arena;
        let Some(program) = arena.program(call.program) else {
            log::warn!("Pass `{}`: draw with a removed program", pass.label);
            return;
        };
        let kernel = program.kernel().clone();
        let uniforms = Uniforms::new(call.uniforms);
        let resources = ShaderResources::new(arena);
        let resolution = Vec2::new(pass.width as f32, pass.height as f32);
        self.stats.draw_calls += 1;

        let input_for = |f: &Fragment| {
            let frag_coord = Vec2::new(f.x as f32 + 0.5, f.y as f32 + 0.5);
            FragmentInput {
                uniforms,
                resources,
                frag_coord,
                screen_uv: frag_coord / resolution,
                depth: f.depth,
                varyings: f.varyings,
                resolution,
            }
        };

        match call.geometry {
            DrawGeometry::Fullscreen => {
                for y in 0..pass.height {
                    for x in 0..pass.width {
                        let mut fragment = Fragment {
                            x,
                            y,
                            depth: 1.0,
                            varyings: Varyings::default(),
                        };
                        let uv = Vec2::new(
                            (x as f32 + 0.5) / resolution.x,
                            (y as f32 + 0.5) / resolution.y,
                        );
                        fragment.varyings.set_vec2(0, uv);
                        Self::shade(pass, &mut self.stats, input_for, kernel.as_ref(), &fragment);
                    }
                }
            }
            DrawGeometry::Mesh(mesh_id) => {
                let Some(mesh) = arena.mesh(mesh_id) else {
                    log::warn!("Pass `{}`: draw with a removed mesh", pass.label);
                    return;
                };
                let transformed: Vec<VertexOutput> = mesh
                    .vertices
                    .iter()
                    .map(|v| kernel.vertex(&uniforms, v))
                    .collect();

                let (width, height) = (pass.width, pass.height);
                let mut fragments = Vec::new();
                for tri in mesh.indices.chunks_exact(3) {
                    let fetch = |i: u32| transformed.get(i as usize).copied();
                    let (Some(a), Some(b), Some(c)) = (fetch(tri[0]), fetch(tri[1]), fetch(tri[2]))
                    else {
                        continue;
                    };
                    let triangle = [a, b, c];
                    self.stats.triangles += 1;

                    let polygon = raster::clip_near(&triangle);
                    for i in 1..polygon.len().saturating_sub(1) {
                        fragments.clear();
                        raster::rasterize_triangle(
                            [&polygon[0], &polygon[i], &polygon[i + 1]],
                            width,
                            height,
                            |f| fragments.push(f),
                        );
                        for fragment in &fragments {
                            Self::shade(pass, &mut self.stats, input_for, kernel.as_ref(), fragment);
                        }
                    }
                }
            }
        }
    }

    fn end_pass(&mut self, arena: &mut ResourceArena) {
        let Some(pass) = self.active.take() else {
            return;
        };
        if let Some(depth) = pass.depth {
            arena.restore_texels(depth.texture, depth.data);
        }
        for attachment in pass.colors {
            arena.restore_texels(attachment.texture, attachment.data);
        }
    }

    fn stats(&self) -> FrameStats {
        self.stats
    }
}
