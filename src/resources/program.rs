//! Shader Programs
//!
//! A [`ShaderProgram`] pairs a compiled [`ShaderKernel`] (the opaque
//! vertex + fragment transformation) with its program-resident uniform
//! state, in the same way a linked GL program object keeps the values last
//! uploaded to it.
//!
//! # Uniform flow
//!
//! ```text
//! Material (named table) ──apply──▶ ShaderProgram.values[location]
//! TransformUpdate / LightUpdate ──▶ ShaderProgram.values[location]
//!                                        │
//!                                        ▼  (draw)
//!                               kernel.vertex / kernel.fragment
//! ```

use std::fmt;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use super::mesh::Vertex;
use super::uniforms::{UniformDecl, UniformLocation, UniformValue, Uniforms};
use super::{CubemapId, ResourceArena, TextureId};

/// Maximum number of simultaneous colour outputs of one draw.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Number of scalar varyings interpolated between the vertex and fragment stage.
pub const MAX_VARYINGS: usize = 12;

// ============================================================================
// Stage I/O
// ============================================================================

/// Interpolated per-vertex outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings(pub [f32; MAX_VARYINGS]);

impl Default for Varyings {
    fn default() -> Self {
        Self([0.0; MAX_VARYINGS])
    }
}

impl Varyings {
    #[inline]
    pub fn set_vec2(&mut self, offset: usize, v: Vec2) {
        self.0[offset..offset + 2].copy_from_slice(&v.to_array());
    }

    #[inline]
    pub fn set_vec3(&mut self, offset: usize, v: Vec3) {
        self.0[offset..offset + 3].copy_from_slice(&v.to_array());
    }

    #[inline]
    pub fn set_vec4(&mut self, offset: usize, v: Vec4) {
        self.0[offset..offset + 4].copy_from_slice(&v.to_array());
    }

    #[inline]
    #[must_use]
    pub fn vec2(&self, offset: usize) -> Vec2 {
        Vec2::from_slice(&self.0[offset..offset + 2])
    }

    #[inline]
    #[must_use]
    pub fn vec3(&self, offset: usize) -> Vec3 {
        Vec3::from_slice(&self.0[offset..offset + 3])
    }

    #[inline]
    #[must_use]
    pub fn vec4(&self, offset: usize) -> Vec4 {
        Vec4::from_slice(&self.0[offset..offset + 4])
    }

    /// `a * wa + b * wb + c * wc`, used for barycentric interpolation.
    #[inline]
    #[must_use]
    pub fn weighted(a: &Self, wa: f32, b: &Self, wb: f32, c: &Self, wc: f32) -> Self {
        let mut out = Self::default();
        for i in 0..MAX_VARYINGS {
            out.0[i] = a.0[i] * wa + b.0[i] * wb + c.0[i] * wc;
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut out = Self::default();
        for i in 0..MAX_VARYINGS {
            out.0[i] = self.0[i] + (other.0[i] - self.0[i]) * t;
        }
        out
    }
}

/// Result of the vertex stage: clip-space position plus varyings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOutput {
    pub clip: Vec4,
    pub varyings: Varyings,
}

/// Texture access for kernels during a draw.
///
/// Lookups of removed resources, unbound slots, or surfaces currently
/// checked out as the draw's own render target all return zero.
#[derive(Clone, Copy)]
pub struct ShaderResources<'a> {
    arena: &'a ResourceArena,
}

impl<'a> ShaderResources<'a> {
    #[inline]
    #[must_use]
    pub fn new(arena: &'a ResourceArena) -> Self {
        Self { arena }
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self, texture: Option<TextureId>) -> bool {
        texture.is_some_and(|id| self.arena.texture(id).is_some())
    }

    #[must_use]
    pub fn sample(&self, texture: Option<TextureId>, uv: Vec2) -> Vec4 {
        texture
            .and_then(|id| self.arena.texture(id))
            .map_or(Vec4::ZERO, |t| t.sample(uv))
    }

    /// Unfiltered nearest-texel read (used for depth and G-buffer data).
    #[must_use]
    pub fn fetch(&self, texture: Option<TextureId>, uv: Vec2) -> Vec4 {
        texture
            .and_then(|id| self.arena.texture(id))
            .map_or(Vec4::ZERO, |t| t.fetch(uv))
    }

    #[must_use]
    pub fn sample_cube(&self, cubemap: Option<CubemapId>, direction: Vec3) -> Vec4 {
        cubemap
            .and_then(|id| self.arena.cubemap(id))
            .map_or(Vec4::ZERO, |c| c.sample(direction))
    }

    #[inline]
    #[must_use]
    pub fn has_cubemap(&self, cubemap: Option<CubemapId>) -> bool {
        cubemap.is_some_and(|id| self.arena.cubemap(id).is_some())
    }
}

/// Inputs of one fragment invocation.
#[derive(Clone, Copy)]
pub struct FragmentInput<'a> {
    pub uniforms: Uniforms<'a>,
    pub resources: ShaderResources<'a>,
    /// Window-space pixel centre (origin bottom-left).
    pub frag_coord: Vec2,
    /// `frag_coord / resolution`.
    pub screen_uv: Vec2,
    /// Window-space depth in `[0, 1]`.
    pub depth: f32,
    pub varyings: Varyings,
    pub resolution: Vec2,
}

/// Outputs of one fragment invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentOutput {
    pub colors: [Vec4; MAX_COLOR_ATTACHMENTS],
    pub discard: bool,
}

impl FragmentOutput {
    /// Single-target output written to colour attachment 0.
    #[inline]
    #[must_use]
    pub fn color(color: Vec4) -> Self {
        let mut colors = [Vec4::ZERO; MAX_COLOR_ATTACHMENTS];
        colors[0] = color;
        Self { colors, discard: false }
    }

    #[inline]
    #[must_use]
    pub fn targets(colors: [Vec4; MAX_COLOR_ATTACHMENTS]) -> Self {
        Self { colors, discard: false }
    }

    #[inline]
    #[must_use]
    pub fn discard() -> Self {
        Self {
            colors: [Vec4::ZERO; MAX_COLOR_ATTACHMENTS],
            discard: true,
        }
    }
}

// ============================================================================
// ShaderKernel
// ============================================================================

/// The opaque transformation function of a GPU program.
///
/// Implementations are stateless: everything a kernel reads comes from its
/// uniforms, the bound textures and the interpolated varyings.
pub trait ShaderKernel: Send + Sync {
    /// Entry name, as referenced from shader source lists.
    fn name(&self) -> &'static str;

    /// Uniforms in location order.
    fn declarations(&self) -> Vec<UniformDecl>;

    /// Vertex stage. The default passes the position through unchanged,
    /// which is all full-screen kernels need.
    fn vertex(&self, _uniforms: &Uniforms<'_>, vertex: &Vertex) -> VertexOutput {
        VertexOutput {
            clip: vertex.position.extend(1.0),
            varyings: Varyings::default(),
        }
    }

    /// Fragment stage.
    fn fragment(&self, input: &FragmentInput<'_>) -> FragmentOutput;
}

// ============================================================================
// ShaderProgram
// ============================================================================

/// A linked program: kernel + uniform table + current uniform values.
pub struct ShaderProgram {
    name: String,
    kernel: Arc<dyn ShaderKernel>,
    declarations: Vec<UniformDecl>,
    lookup: FxHashMap<&'static str, UniformLocation>,
    values: Vec<Option<UniformValue>>,
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("name", &self.name)
            .field("uniforms", &self.declarations.len())
            .finish_non_exhaustive()
    }
}

impl ShaderProgram {
    #[must_use]
    pub fn new(name: &str, kernel: Arc<dyn ShaderKernel>) -> Self {
        let declarations = kernel.declarations();
        let lookup = declarations
            .iter()
            .enumerate()
            .map(|(i, decl)| (decl.name, UniformLocation(i as u32)))
            .collect();
        let values = declarations.iter().map(|d| d.default.clone()).collect();
        Self {
            name: name.to_string(),
            kernel,
            declarations,
            lookup,
            values,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kernel(&self) -> &Arc<dyn ShaderKernel> {
        &self.kernel
    }

    /// Looks up a uniform by name. `None` when the program does not declare it.
    #[inline]
    #[must_use]
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.lookup.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn declaration(&self, location: UniformLocation) -> Option<&UniformDecl> {
        self.declarations.get(location.index())
    }

    #[inline]
    #[must_use]
    pub fn declarations(&self) -> &[UniformDecl] {
        &self.declarations
    }

    /// Uploads a value. A `None` location is a silent no-op, a type mismatch
    /// is logged and dropped.
    pub fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else { return };
        let Some(decl) = self.declarations.get(location.index()) else {
            return;
        };
        if decl.ty != value.uniform_type() {
            log::warn!(
                "Program `{}`: uniform `{}` expects {:?}, got {:?}",
                self.name,
                decl.name,
                decl.ty,
                value.uniform_type()
            );
            return;
        }
        self.values[location.index()] = Some(value);
    }

    #[inline]
    #[must_use]
    pub fn uniform(&self, location: UniformLocation) -> Option<&UniformValue> {
        self.values.get(location.index()).and_then(Option::as_ref)
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> Uniforms<'_> {
        Uniforms::new(&self.values)
    }

    /// Owned copy of the current values, taken by the device at draw time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Option<UniformValue>> {
        self.values.clone()
    }
}
