//! GPU device.
//!
//! Executes passes on a `wgpu` adapter. The arena stays the owner of every
//! image: a pass uploads the surfaces it loads or samples, and when it ends
//! its attachments are read back into the arena, so captures and CPU reads
//! see what the GPU wrote.
//!
//! ```text
//! begin_pass ─▶ bind attachments, upload loaded contents
//! draw       ─▶ upload sampled images, pack `Params`, encode one render pass
//! end_pass   ─▶ submit, read attachments and occlusion counts back
//! ```
//!
//! Sampled images are uploaded as `Rgba32Float` and filtered in WGSL with
//! the texture's own sampler state, so results track the software device.
//! A surface attached to the open pass samples as zero, like on the CPU.
//! `FrameStats::fragments` counts the samples reported by occlusion queries.

mod packing;

use std::borrow::Cow;
use std::sync::mpsc;

use glam::Vec4;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use super::{
    BlendMode, ClearFlags, CompareFunction, DepthState, DrawCall, DrawGeometry, FrameStats,
    PassDescriptor, RenderDevice,
};
use crate::errors::{AfterglowError, Result};
use crate::resources::{
    CubemapId, MAX_COLOR_ATTACHMENTS, MeshId, ResourceArena, TextureId,
    UniformDecl, UniformType, UniformValue, Vertex,
};
use crate::resources::texture::CUBE_FACE_COUNT;
use crate::shaders::wgsl;

use packing::{SAMPLED_FORMAT, TEX_BOUND, TEX_LINEAR};

/// Occlusion queries available to the draws of one pass.
const MAX_QUERIES_PER_PASS: u32 = 256;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

fn compare_function(compare: Option<CompareFunction>) -> wgpu::CompareFunction {
    match compare {
        Some(CompareFunction::Less) => wgpu::CompareFunction::Less,
        Some(CompareFunction::LessEqual) => wgpu::CompareFunction::LessEqual,
        Some(CompareFunction::Always) | None => wgpu::CompareFunction::Always,
    }
}

fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Replace => wgpu::BlendState::REPLACE,
        BlendMode::Additive => {
            let add = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState { color: add, alpha: add }
        }
    }
}

// ============================================================================
// Device-side Objects
// ============================================================================

struct Surface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl Surface {
    fn new(
        device: &wgpu::Device,
        label: &str,
        (width, height, layers): (u32, u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let dimension = if layers > 1 {
            wgpu::TextureViewDimension::D2Array
        } else {
            wgpu::TextureViewDimension::D2
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        });
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    fn matches(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        self.width == width && self.height == height && self.format == format
    }

    fn write(&self, queue: &wgpu::Queue, layer: u32, bytes: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * packing::texel_bytes(self.format)),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Shader module and layouts of one kernel.
struct KernelModule {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    kernel: &'static str,
    colors: SmallVec<[wgpu::TextureFormat; MAX_COLOR_ATTACHMENTS]>,
    depth: bool,
    depth_state: DepthState,
    blend: BlendMode,
}

/// Where a texture slot of a draw reads from.
#[derive(Clone, Copy)]
enum Binding {
    Empty2d,
    EmptyCube,
    Sampled(TextureId),
    Cube(CubemapId),
}

struct GpuPass {
    label: String,
    width: u32,
    height: u32,
    colors: SmallVec<[(TextureId, wgpu::TextureFormat); MAX_COLOR_ATTACHMENTS]>,
    depth: Option<TextureId>,
    /// Clear still owed by the first render pass.
    pending_clear: ClearFlags,
    clear_color: Vec4,
    clear_depth: f32,
    depth_state: DepthState,
    blend: BlendMode,
    /// Images uploaded for sampling during this pass.
    uploaded: FxHashSet<TextureId>,
    queries: u32,
    encoder: wgpu::CommandEncoder,
}

impl GpuPass {
    fn is_attachment(&self, id: TextureId) -> bool {
        self.depth == Some(id) || self.colors.iter().any(|&(c, _)| c == id)
    }

    fn has_attachments(&self) -> bool {
        self.depth.is_some() || !self.colors.is_empty()
    }
}

// ============================================================================
// WgpuDevice
// ============================================================================

/// Hardware implementation of [`RenderDevice`] on a headless `wgpu` adapter.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,

    targets: FxHashMap<TextureId, Surface>,
    sampled: FxHashMap<TextureId, Surface>,
    cubes: FxHashMap<CubemapId, Surface>,
    empty_2d: Surface,
    empty_cube: Surface,

    kernels: FxHashMap<&'static str, Option<KernelModule>>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    meshes: FxHashMap<MeshId, Option<MeshBuffers>>,
    fullscreen: wgpu::Buffer,

    depth_load: wgpu::RenderPipeline,
    query_set: wgpu::QuerySet,
    query_resolve: wgpu::Buffer,

    active: Option<GpuPass>,
    stats: FrameStats,
}

impl WgpuDevice {
    /// Opens the default adapter without a presentation surface.
    pub fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| AfterglowError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Afterglow Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))?;

        let adapter_info = adapter.get_info();
        log::info!("GPU device: {} ({:?})", adapter_info.name, adapter_info.backend);
        Ok(Self::from_parts(device, queue, adapter_info))
    }

    fn from_parts(device: wgpu::Device, queue: wgpu::Queue, adapter_info: wgpu::AdapterInfo) -> Self {
        let sampled_usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let empty_2d = Surface::new(&device, "Empty Image", (1, 1, 1), SAMPLED_FORMAT, sampled_usage);
        let empty_cube = Surface::new(
            &device,
            "Empty Cube",
            (1, 1, CUBE_FACE_COUNT as u32),
            SAMPLED_FORMAT,
            sampled_usage,
        );

        let corners = [
            Vertex::new(glam::Vec3::new(-1.0, -1.0, 1.0), glam::Vec3::ZERO, glam::Vec2::ZERO),
            Vertex::new(glam::Vec3::new(3.0, -1.0, 1.0), glam::Vec3::ZERO, glam::Vec2::ZERO),
            Vertex::new(glam::Vec3::new(-1.0, 3.0, 1.0), glam::Vec3::ZERO, glam::Vec2::ZERO),
        ];
        let fullscreen = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Triangle"),
            contents: bytemuck::cast_slice(&corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let depth_load = Self::create_depth_load_pipeline(&device);

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Pass Occlusion Queries"),
            ty: wgpu::QueryType::Occlusion,
            count: MAX_QUERIES_PER_PASS,
        });
        let query_resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Occlusion Resolve"),
            size: u64::from(MAX_QUERIES_PER_PASS) * 8,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            adapter_info,
            targets: FxHashMap::default(),
            sampled: FxHashMap::default(),
            cubes: FxHashMap::default(),
            empty_2d,
            empty_cube,
            kernels: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            meshes: FxHashMap::default(),
            fullscreen,
            depth_load,
            query_set,
            query_resolve,
            active: None,
            stats: FrameStats::default(),
        }
    }

    #[must_use]
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn reset_stats(&mut self) {
        self.stats = FrameStats::default();
    }

    fn create_depth_load_pipeline(device: &wgpu::Device) -> wgpu::RenderPipeline {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Depth Load Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(wgsl::DEPTH_LOAD)),
        });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Depth Load Pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Always),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    // ========================================================================
    // Resource Residency
    // ========================================================================

    fn ensure_target(&mut self, arena: &ResourceArena, id: TextureId, format: wgpu::TextureFormat) {
        let Some(texture) = arena.texture(id) else {
            return;
        };
        let (width, height) = texture.extent();
        if self.targets.get(&id).is_some_and(|s| s.matches(width, height, format)) {
            return;
        }
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        if format != DEPTH_FORMAT {
            usage |= wgpu::TextureUsages::COPY_DST;
        }
        let surface = Surface::new(&self.device, &texture.label, (width, height, 1), format, usage);
        self.targets.insert(id, surface);
    }

    /// Uploads the arena contents of `id` for sampling, once per pass.
    fn upload_sampled(&mut self, arena: &ResourceArena, id: TextureId) {
        let Some(texture) = arena.texture(id) else {
            return;
        };
        if let Some(pass) = self.active.as_mut() {
            if !pass.uploaded.insert(id) {
                return;
            }
        }
        let (width, height) = texture.extent();
        if !self.sampled.get(&id).is_some_and(|s| s.matches(width, height, SAMPLED_FORMAT)) {
            let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
            let surface = Surface::new(&self.device, &texture.label, (width, height, 1), SAMPLED_FORMAT, usage);
            self.sampled.insert(id, surface);
        }
        if let Some(surface) = self.sampled.get(&id) {
            let len = width as usize * height as usize;
            surface.write(&self.queue, 0, &packing::encode_texels(&texture.texels(), len, SAMPLED_FORMAT));
        }
    }

    /// Cubemaps are immutable once created, so they upload once.
    fn ensure_cube(&mut self, arena: &ResourceArena, id: CubemapId) {
        if self.cubes.contains_key(&id) {
            return;
        }
        let Some(cube) = arena.cubemap(id) else {
            return;
        };
        let size = cube.size();
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let surface = Surface::new(
            &self.device,
            &cube.label,
            (size, size, CUBE_FACE_COUNT as u32),
            SAMPLED_FORMAT,
            usage,
        );
        let len = size as usize * size as usize;
        for face in 0..CUBE_FACE_COUNT {
            let bytes = packing::encode_texels(&cube.face_texels(face), len, SAMPLED_FORMAT);
            surface.write(&self.queue, face as u32, &bytes);
        }
        self.cubes.insert(id, surface);
    }

    fn ensure_mesh(&mut self, arena: &ResourceArena, id: MeshId) -> bool {
        if self.meshes.contains_key(&id) {
            return true;
        }
        let Some(mesh) = arena.mesh(id) else {
            return false;
        };
        let count = mesh.vertices.len();
        let indices: Vec<u32> = mesh
            .indices
            .chunks_exact(3)
            .filter(|tri| tri.iter().all(|&i| (i as usize) < count))
            .flatten()
            .copied()
            .collect();
        let buffers = (!indices.is_empty()).then(|| MeshBuffers {
            vertices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&mesh.label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            indices: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&mesh.label),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: indices.len() as u32,
        });
        self.meshes.insert(id, buffers);
        true
    }

    /// Compiles a kernel on first use. `false` when it has no WGSL translation.
    fn ensure_kernel(&mut self, name: &'static str, declarations: &[UniformDecl]) -> bool {
        if let Some(entry) = self.kernels.get(name) {
            return entry.is_some();
        }
        let Some(source) = wgsl::kernel_source(name) else {
            log::warn!("Kernel `{name}` has no WGSL translation; its draws are skipped");
            self.kernels.insert(name, None);
            return false;
        };

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for decl in declarations.iter().filter(|d| d.ty.is_texture()) {
            let view_dimension = if decl.ty == UniformType::TextureCube {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: entries.len() as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension,
                    multisampled: false,
                },
                count: None,
            });
        }
        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: &entries,
        });
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        log::debug!("Kernel `{name}` compiled for the GPU");
        self.kernels.insert(
            name,
            Some(KernelModule {
                module,
                bind_group_layout,
                pipeline_layout,
            }),
        );
        true
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }
        let Some(Some(kernel)) = self.kernels.get(key.kernel) else {
            return;
        };
        let targets: SmallVec<[Option<wgpu::ColorTargetState>; MAX_COLOR_ATTACHMENTS]> = key
            .colors
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend_state(key.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(key.kernel),
            layout: Some(&kernel.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &kernel.module,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &kernel.module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: key.depth.then(|| wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: Some(key.depth_state.compare.is_some() && key.depth_state.write),
                depth_compare: Some(compare_function(key.depth_state.compare)),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert(key.clone(), pipeline);
    }

    fn view(&self, binding: Binding) -> &wgpu::TextureView {
        match binding {
            Binding::Sampled(id) => self.sampled.get(&id).map_or(&self.empty_2d.view, |s| &s.view),
            Binding::Cube(id) => self.cubes.get(&id).map_or(&self.empty_cube.view, |s| &s.view),
            Binding::Empty2d => &self.empty_2d.view,
            Binding::EmptyCube => &self.empty_cube.view,
        }
    }

    /// Resolves every texture slot of a draw, uploading what it samples.
    fn bind_textures(
        &mut self,
        arena: &ResourceArena,
        declarations: &[UniformDecl],
        values: &[Option<UniformValue>],
    ) -> (Vec<Binding>, Vec<u32>) {
        let mut bindings = Vec::new();
        let mut flags = vec![0; declarations.len()];
        for (index, decl) in declarations.iter().enumerate() {
            let value = values.get(index).and_then(Option::as_ref);
            match (decl.ty, value) {
                (UniformType::Texture2D, Some(&UniformValue::Texture(id))) => {
                    let Some(texture) = arena.texture(id) else {
                        bindings.push(Binding::Empty2d);
                        continue;
                    };
                    flags[index] = packing::sampler_flags(texture.sampler);
                    let own_target = self.active.as_ref().is_some_and(|p| p.is_attachment(id));
                    if own_target {
                        bindings.push(Binding::Empty2d);
                    } else {
                        self.upload_sampled(arena, id);
                        bindings.push(Binding::Sampled(id));
                    }
                }
                (UniformType::TextureCube, Some(&UniformValue::Cubemap(id))) if arena.cubemap(id).is_some() => {
                    self.ensure_cube(arena, id);
                    flags[index] = TEX_BOUND | TEX_LINEAR;
                    bindings.push(Binding::Cube(id));
                }
                (UniformType::Texture2D, _) => bindings.push(Binding::Empty2d),
                (UniformType::TextureCube, _) => bindings.push(Binding::EmptyCube),
                _ => {}
            }
        }
        (bindings, flags)
    }

    /// Restores a depth attachment from the arena by drawing it, since depth
    /// formats cannot be written by copies.
    fn load_depth(&mut self, arena: &ResourceArena, id: TextureId) {
        self.upload_sampled(arena, id);
        let (Some(target), Some(source), Some(pass)) =
            (self.targets.get(&id), self.sampled.get(&id), self.active.as_mut())
        else {
            return;
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Depth Load"),
            layout: &self.depth_load.get_bind_group_layout(0),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&source.view),
            }],
        });
        let mut rpass = pass.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Depth Load"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(&self.depth_load);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }

    /// Encodes one render pass over the open pass's attachments, consuming
    /// any clear still owed.
    fn encode(
        &mut self,
        pipeline: Option<&PipelineKey>,
        bind_group: Option<&wgpu::BindGroup>,
        geometry: Option<DrawGeometry>,
    ) {
        let Some(pass) = self.active.as_mut() else {
            return;
        };
        let clear = std::mem::replace(&mut pass.pending_clear, ClearFlags::empty());
        let color_load = if clear.contains(ClearFlags::COLOR) {
            let c = pass.clear_color.as_dvec4();
            wgpu::LoadOp::Clear(wgpu::Color {
                r: c.x,
                g: c.y,
                b: c.z,
                a: c.w,
            })
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if clear.contains(ClearFlags::DEPTH) {
            wgpu::LoadOp::Clear(pass.clear_depth)
        } else {
            wgpu::LoadOp::Load
        };

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; MAX_COLOR_ATTACHMENTS]> =
            pass.colors
                .iter()
                .filter_map(|(id, _)| self.targets.get(id))
                .map(|surface| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &surface.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })
                })
                .collect();
        let depth_stencil_attachment = pass.depth.and_then(|id| self.targets.get(&id)).map(|surface| {
            wgpu::RenderPassDepthStencilAttachment {
                view: &surface.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }
        });

        let query = (geometry.is_some() && pass.queries < MAX_QUERIES_PER_PASS).then_some(pass.queries);
        let mut rpass = pass.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: query.map(|_| &self.query_set),
            multiview_mask: None,
        });

        let (Some(key), Some(bind_group), Some(geometry)) = (pipeline, bind_group, geometry) else {
            return;
        };
        let Some(pipeline) = self.pipelines.get(key) else {
            return;
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        if let Some(index) = query {
            rpass.begin_occlusion_query(index);
        }
        match geometry {
            DrawGeometry::Fullscreen => {
                rpass.set_vertex_buffer(0, self.fullscreen.slice(..));
                rpass.draw(0..3, 0..1);
            }
            DrawGeometry::Mesh(id) => {
                if let Some(Some(mesh)) = self.meshes.get(&id) {
                    rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
                    rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        if query.is_some() {
            rpass.end_occlusion_query();
        }
        drop(rpass);
        if query.is_some() {
            pass.queries += 1;
        }
    }

    /// Maps a readback buffer and blocks until its contents are available.
    fn read_buffer(&self, buffer: &wgpu::Buffer) -> Option<Vec<u8>> {
        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        if let Err(err) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("GPU poll failed: {err}");
        }
        match receiver.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range().to_vec();
                buffer.unmap();
                Some(data)
            }
            Ok(Err(err)) => {
                log::warn!("GPU readback failed: {err}");
                None
            }
            Err(_) => None,
        }
    }
}

impl RenderDevice for WgpuDevice {
    fn begin_pass(&mut self, arena: &mut ResourceArena, desc: &PassDescriptor<'_>) {
        if self.active.is_some() {
            log::warn!("begin_pass `{}` while a pass is open; closing it", desc.label);
            self.end_pass(arena);
        }
        let arena: &ResourceArena = arena;

        let Some(framebuffer) = arena.framebuffer(desc.target) else {
            log::warn!("Pass `{}`: target framebuffer no longer exists", desc.label);
            return;
        };
        let (width, height) = framebuffer.extent();

        let uses_depth = desc.clear.contains(ClearFlags::DEPTH)
            || desc.depth.compare.is_some()
            || desc.depth.write;
        let depth = framebuffer
            .depth_attachment()
            .filter(|_| uses_depth)
            .filter(|&id| arena.texture(id).is_some_and(|t| t.format().is_depth()));
        let colors = framebuffer
            .color_attachments()
            .iter()
            .filter_map(|&id| {
                let texture = arena.texture(id)?;
                (!texture.format().is_depth()).then(|| (id, packing::target_format(texture.format())))
            })
            .collect::<SmallVec<[_; MAX_COLOR_ATTACHMENTS]>>();

        for &(id, format) in &colors {
            self.ensure_target(arena, id, format);
            if desc.clear.contains(ClearFlags::COLOR) {
                continue;
            }
            if let (Some(surface), Some(texture)) = (self.targets.get(&id), arena.texture(id)) {
                let len = width as usize * height as usize;
                surface.write(&self.queue, 0, &packing::encode_texels(&texture.texels(), len, format));
            }
        }
        if let Some(id) = depth {
            self.ensure_target(arena, id, DEPTH_FORMAT);
        }

        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(desc.label),
        });
        self.active = Some(GpuPass {
            label: desc.label.to_string(),
            width,
            height,
            colors,
            depth,
            pending_clear: desc.clear,
            clear_color: desc.clear_color,
            clear_depth: desc.clear_depth,
            depth_state: desc.depth,
            blend: desc.blend,
            uploaded: FxHashSet::default(),
            queries: 0,
            encoder,
        });

        if let Some(id) = depth.filter(|_| !desc.clear.contains(ClearFlags::DEPTH)) {
            self.load_depth(arena, id);
        }
        self.stats.passes += 1;
    }

    fn draw(&mut self, arena: &mut ResourceArena, call: &DrawCall<'_>) {
        let arena: &ResourceArena = arena;
        let Some(label) = self.active.as_ref().map(|p| p.label.clone()) else {
            return;
        };
        let Some(program) = arena.program(call.program) else {
            log::warn!("Pass `{label}`: draw with a removed program");
            return;
        };
        if let DrawGeometry::Mesh(id) = call.geometry {
            if !self.ensure_mesh(arena, id) {
                log::warn!("Pass `{label}`: draw with a removed mesh");
                return;
            }
        }
        let kernel = program.kernel().name();
        let declarations = program.declarations();
        if !self.ensure_kernel(kernel, declarations) {
            return;
        }

        self.stats.draw_calls += 1;
        if let DrawGeometry::Mesh(id) = call.geometry {
            if let Some(Some(mesh)) = self.meshes.get(&id) {
                self.stats.triangles += u64::from(mesh.index_count / 3);
            }
        }

        let Some(pass) = self.active.as_ref() else {
            return;
        };
        if !pass.has_attachments() {
            log::debug!("Pass `{}` has no live attachments; draw skipped", pass.label);
            return;
        }
        let key = PipelineKey {
            kernel,
            colors: pass.colors.iter().map(|&(_, format)| format).collect(),
            depth: pass.depth.is_some(),
            depth_state: pass.depth_state,
            blend: pass.blend,
        };
        let target_size = [pass.width as f32, pass.height as f32];
        self.ensure_pipeline(&key);

        let (bindings, flags) = self.bind_textures(arena, declarations, call.uniforms);
        let params = packing::pack_params(declarations, call.uniforms, |i| flags[i], target_size);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Params"),
            contents: &params,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let Some(Some(module)) = self.kernels.get(kernel) else {
            return;
        };
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }];
        for (slot, &binding) in bindings.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 + 1,
                resource: wgpu::BindingResource::TextureView(self.view(binding)),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel),
            layout: &module.bind_group_layout,
            entries: &entries,
        });

        self.encode(Some(&key), Some(&bind_group), Some(call.geometry));
    }

    fn end_pass(&mut self, arena: &mut ResourceArena) {
        if self.active.as_ref().is_some_and(|p| !p.pending_clear.is_empty() && p.has_attachments()) {
            self.encode(None, None, None);
        }
        let Some(mut pass) = self.active.take() else {
            return;
        };

        let attachments = pass
            .depth
            .map(|id| (id, DEPTH_FORMAT))
            .into_iter()
            .chain(pass.colors.iter().copied());
        let mut readbacks = Vec::new();
        for (id, format) in attachments {
            let Some(surface) = self.targets.get(&id) else {
                continue;
            };
            let bytes_per_row = packing::padded_row_bytes(surface.width, format);
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Attachment Readback"),
                size: u64::from(bytes_per_row) * u64::from(surface.height),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let aspect = if format == DEPTH_FORMAT {
                wgpu::TextureAspect::DepthOnly
            } else {
                wgpu::TextureAspect::All
            };
            pass.encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &surface.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(surface.height),
                    },
                },
                wgpu::Extent3d {
                    width: surface.width,
                    height: surface.height,
                    depth_or_array_layers: 1,
                },
            );
            readbacks.push((id, format, bytes_per_row, buffer));
        }

        let occlusion = (pass.queries > 0).then(|| {
            let size = u64::from(pass.queries) * 8;
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Occlusion Readback"),
                size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            pass.encoder
                .resolve_query_set(&self.query_set, 0..pass.queries, &self.query_resolve, 0);
            pass.encoder
                .copy_buffer_to_buffer(&self.query_resolve, 0, &staging, 0, size);
            staging
        });

        self.queue.submit(Some(pass.encoder.finish()));

        for (id, format, bytes_per_row, buffer) in readbacks {
            let Some(bytes) = self.read_buffer(&buffer) else {
                log::warn!("Pass `{}`: attachment readback lost", pass.label);
                continue;
            };
            let Some(texture) = arena.texture_mut(id) else {
                continue;
            };
            let texel = packing::texel_bytes(format) as usize;
            let (width, height) = texture.extent();
            for y in 0..height {
                let row = &bytes[y as usize * bytes_per_row as usize..];
                for x in 0..width {
                    let at = x as usize * texel;
                    texture.write(x, y, packing::decode_texel(&row[at..at + texel], format));
                }
            }
        }

        if let Some(bytes) = occlusion.and_then(|staging| self.read_buffer(&staging)) {
            self.stats.fragments += bytes
                .chunks_exact(8)
                .map(bytemuck::pod_read_unaligned::<u64>)
                .sum::<u64>();
        }
    }

    fn stats(&self) -> FrameStats {
        self.stats
    }
}
