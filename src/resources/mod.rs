//! Resource Arena
//!
//! Every GPU-side object of the pipeline lives in one [`ResourceArena`] and
//! is referenced everywhere else by a stable slotmap key. Passes and
//! materials hold keys, never the resources themselves, so there is no
//! ownership cycle between a buffer and the passes that read or write it.
//!
//! | Key             | Resource          |
//! |-----------------|-------------------|
//! | `TextureId`     | [`Texture2D`]     |
//! | `CubemapId`     | [`TextureCube`]   |
//! | `FramebufferId` | [`Framebuffer`]   |
//! | `MeshId`        | [`Mesh`]          |
//! | `ProgramId`     | [`ShaderProgram`] |
//! | `MaterialId`    | [`Material`]      |
//!
//! Removing a resource invalidates its key. Stale keys are tolerated at draw
//! time: a removed texture samples as zero and a pass whose target or
//! material is gone is skipped.

pub mod framebuffer;
pub mod material;
pub mod mesh;
pub mod program;
pub mod texture;
pub mod uniforms;

use slotmap::{SlotMap, new_key_type};

use crate::errors::{AfterglowError, Result};

pub use framebuffer::{Framebuffer, FramebufferDesc};
pub use material::Material;
pub use mesh::{Mesh, Vertex};
pub use program::{
    FragmentInput, FragmentOutput, MAX_COLOR_ATTACHMENTS, MAX_VARYINGS, ShaderKernel,
    ShaderProgram, ShaderResources, Varyings, VertexOutput,
};
pub use texture::{
    AddressMode, FilterMode, PixelFormat, SamplerDesc, TexelData, Texture2D, TextureCube,
};
pub use uniforms::{UniformDecl, UniformLocation, UniformType, UniformValue, Uniforms};

new_key_type! {
    pub struct TextureId;
    pub struct CubemapId;
    pub struct FramebufferId;
    pub struct MeshId;
    pub struct ProgramId;
    pub struct MaterialId;
}

#[derive(Debug, Default)]
pub struct ResourceArena {
    textures: SlotMap<TextureId, Texture2D>,
    cubemaps: SlotMap<CubemapId, TextureCube>,
    framebuffers: SlotMap<FramebufferId, Framebuffer>,
    meshes: SlotMap<MeshId, Mesh>,
    programs: SlotMap<ProgramId, ShaderProgram>,
    materials: SlotMap<MaterialId, Material>,
}

impl ResourceArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn create_texture(&mut self, texture: Texture2D) -> Result<TextureId> {
        if texture.width() == 0 || texture.height() == 0 {
            return Err(AfterglowError::InvalidExtent {
                width: texture.width(),
                height: texture.height(),
            });
        }
        Ok(self.textures.insert(texture))
    }

    #[inline]
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&Texture2D> {
        self.textures.get(id)
    }

    #[inline]
    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture2D> {
        self.textures.get_mut(id)
    }

    pub fn remove_texture(&mut self, id: TextureId) -> Option<Texture2D> {
        self.textures.remove(id)
    }

    #[inline]
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Checks a surface's storage out for writing. The texture stays in the
    /// arena but reads as empty until [`restore_texels`](Self::restore_texels).
    pub(crate) fn take_texels(&mut self, id: TextureId) -> Option<(TexelData, u32, u32)> {
        self.textures
            .get_mut(id)
            .map(|t| (std::mem::take(&mut t.data), t.width(), t.height()))
    }

    pub(crate) fn restore_texels(&mut self, id: TextureId, data: TexelData) {
        if let Some(texture) = self.textures.get_mut(id) {
            texture.data = data;
        }
    }

    // ========================================================================
    // Cubemaps
    // ========================================================================

    pub fn create_cubemap(&mut self, cubemap: TextureCube) -> Result<CubemapId> {
        if cubemap.size() == 0 {
            return Err(AfterglowError::InvalidExtent { width: 0, height: 0 });
        }
        Ok(self.cubemaps.insert(cubemap))
    }

    #[inline]
    #[must_use]
    pub fn cubemap(&self, id: CubemapId) -> Option<&TextureCube> {
        self.cubemaps.get(id)
    }

    pub fn remove_cubemap(&mut self, id: CubemapId) -> Option<TextureCube> {
        self.cubemaps.remove(id)
    }

    // ========================================================================
    // Framebuffers
    // ========================================================================

    /// Creates an offscreen drawable. All attachments must exist and share one extent.
    pub fn create_framebuffer(&mut self, desc: &FramebufferDesc<'_>) -> Result<FramebufferId> {
        let framebuffer = self.validate_framebuffer(desc, false)?;
        Ok(self.framebuffers.insert(framebuffer))
    }

    /// Creates the display surface's drawable.
    pub(crate) fn create_default_framebuffer(&mut self, color: TextureId) -> Result<FramebufferId> {
        let desc = FramebufferDesc {
            label: "Default Framebuffer",
            depth: None,
            colors: &[color],
        };
        let framebuffer = self.validate_framebuffer(&desc, true)?;
        Ok(self.framebuffers.insert(framebuffer))
    }

    fn validate_framebuffer(&self, desc: &FramebufferDesc<'_>, is_default: bool) -> Result<Framebuffer> {
        if desc.colors.len() > MAX_COLOR_ATTACHMENTS {
            return Err(AfterglowError::TooManyAttachments {
                label: desc.label.to_string(),
                count: desc.colors.len(),
                max: MAX_COLOR_ATTACHMENTS,
            });
        }

        let mut extent: Option<(u32, u32)> = None;
        for id in desc.depth.iter().chain(desc.colors.iter()) {
            let texture = self.texture(*id).ok_or_else(|| {
                AfterglowError::MissingResource(format!("attachment of framebuffer `{}`", desc.label))
            })?;
            match extent {
                None => extent = Some(texture.extent()),
                Some(expected) if expected != texture.extent() => {
                    return Err(AfterglowError::AttachmentMismatch {
                        label: desc.label.to_string(),
                        expected,
                        found: texture.extent(),
                    });
                }
                Some(_) => {}
            }
        }

        let (width, height) = extent.ok_or_else(|| {
            AfterglowError::MissingResource(format!("framebuffer `{}` has no attachments", desc.label))
        })?;

        Ok(Framebuffer {
            label: desc.label.to_string(),
            depth: desc.depth,
            colors: desc.colors.iter().copied().collect(),
            width,
            height,
            is_default,
        })
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self, id: FramebufferId) -> Option<&Framebuffer> {
        self.framebuffers.get(id)
    }

    pub fn remove_framebuffer(&mut self, id: FramebufferId) -> Option<Framebuffer> {
        self.framebuffers.remove(id)
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    #[inline]
    #[must_use]
    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    // ========================================================================
    // Programs
    // ========================================================================

    pub fn add_program(&mut self, program: ShaderProgram) -> ProgramId {
        self.programs.insert(program)
    }

    #[inline]
    #[must_use]
    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id)
    }

    #[inline]
    pub fn program_mut(&mut self, id: ProgramId) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(id)
    }

    // ========================================================================
    // Materials
    // ========================================================================

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Creates a descriptor for `program`, hiding the `filtered` uniform names.
    pub fn create_material(&mut self, program: ProgramId, filtered: &[&str]) -> Result<MaterialId> {
        let shader = self
            .program(program)
            .ok_or_else(|| AfterglowError::MissingResource("material program".to_string()))?;
        let material = Material::with_filtered(program, shader, filtered);
        Ok(self.materials.insert(material))
    }

    #[inline]
    #[must_use]
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    #[inline]
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn remove_material(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(id)
    }

    /// Copies a material's values into its program. Returns the program key,
    /// or `None` when either the material or its program is gone.
    pub(crate) fn bind_material(&mut self, id: MaterialId) -> Option<ProgramId> {
        let material = self.materials.get(id)?;
        let program_id = material.program();
        let program = self.programs.get_mut(program_id)?;
        material.apply(program);
        Some(program_id)
    }
}
