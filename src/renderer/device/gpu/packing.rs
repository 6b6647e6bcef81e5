//! Byte layouts shared with the WGSL kernels: the `Params` uniform block and
//! texel rows for uploads and readbacks.

use glam::{Mat4, Vec4};
use half::f16;

use crate::resources::{AddressMode, FilterMode, PixelFormat, SamplerDesc, UniformDecl, UniformType, UniformValue};
use crate::shaders::wgsl::UNIFORM_ARRAY_LEN;

pub const TEX_BOUND: u32 = 1;
pub const TEX_LINEAR: u32 = 2;
pub const TEX_REPEAT: u32 = 4;

/// Format sampled images are uploaded in. Unfilterable; kernels filter in WGSL.
pub const SAMPLED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Attachment format backing a surface of `format`.
#[must_use]
pub fn target_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba16Float | PixelFormat::Rgb16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// Bytes per texel of the formats this device creates.
#[must_use]
pub fn texel_bytes(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rgba32Float => 16,
        wgpu::TextureFormat::Rgba16Float => 8,
        _ => 4,
    }
}

/// Row pitch for texture-to-buffer copies.
#[must_use]
pub fn padded_row_bytes(width: u32, format: wgpu::TextureFormat) -> u32 {
    let unpadded = width * texel_bytes(format);
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Flags word of a bound 2D texture.
#[must_use]
pub fn sampler_flags(sampler: SamplerDesc) -> u32 {
    let mut flags = TEX_BOUND;
    if sampler.filter == FilterMode::Linear {
        flags |= TEX_LINEAR;
    }
    if sampler.address_mode == AddressMode::Repeat {
        flags |= TEX_REPEAT;
    }
    flags
}

#[inline]
fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Encodes tightly packed texels, bottom row first. Missing texels encode as zero.
#[must_use]
pub fn encode_texels(texels: &[Vec4], len: usize, format: wgpu::TextureFormat) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len * texel_bytes(format) as usize);
    for i in 0..len {
        let texel = texels.get(i).copied().unwrap_or(Vec4::ZERO);
        match format {
            wgpu::TextureFormat::Rgba32Float => {
                bytes.extend_from_slice(bytemuck::cast_slice(&texel.to_array()));
            }
            wgpu::TextureFormat::Rgba16Float => {
                let halves = texel.to_array().map(|c| f16::from_f32(c).to_bits());
                bytes.extend_from_slice(bytemuck::cast_slice(&halves));
            }
            wgpu::TextureFormat::Rgba8Unorm => {
                bytes.extend_from_slice(&texel.to_array().map(unorm8));
            }
            _ => bytes.extend_from_slice(bytemuck::bytes_of(&texel.x)),
        }
    }
    bytes
}

/// Decodes one texel read back from a surface of `format`.
#[must_use]
pub fn decode_texel(bytes: &[u8], format: wgpu::TextureFormat) -> Vec4 {
    match format {
        wgpu::TextureFormat::Rgba16Float => {
            let mut halves = [0u16; 4];
            bytemuck::cast_slice_mut(&mut halves).copy_from_slice(&bytes[..8]);
            Vec4::from_array(halves.map(|h| f16::from_bits(h).to_f32()))
        }
        wgpu::TextureFormat::Rgba8Unorm => {
            Vec4::new(bytes[0].into(), bytes[1].into(), bytes[2].into(), bytes[3].into()) / 255.0
        }
        _ => {
            let mut depth = 0.0_f32;
            bytemuck::bytes_of_mut(&mut depth).copy_from_slice(&bytes[..4]);
            Vec4::new(depth, depth, depth, 1.0)
        }
    }
}

// ============================================================================
// Params Block
// ============================================================================

/// `(alignment, size)` of a declaration in the uniform address space.
fn layout_of(ty: UniformType) -> (usize, usize) {
    match ty {
        UniformType::Float | UniformType::Int | UniformType::Texture2D | UniformType::TextureCube => (4, 4),
        UniformType::Vec2 => (8, 8),
        UniformType::Vec3 => (16, 12),
        UniformType::Vec4 => (16, 16),
        UniformType::Mat4 => (16, 64),
        UniformType::Vec3Array | UniformType::Vec4Array => (16, 16 * UNIFORM_ARRAY_LEN),
    }
}

#[derive(Default)]
struct BlockWriter {
    bytes: Vec<u8>,
}

impl BlockWriter {
    fn push(&mut self, align: usize, data: &[u8]) {
        let offset = self.bytes.len().next_multiple_of(align);
        self.bytes.resize(offset, 0);
        self.bytes.extend_from_slice(data);
    }

    fn push_array(&mut self, elements: impl Iterator<Item = Vec4>) {
        let mut data = [[0.0_f32; 4]; UNIFORM_ARRAY_LEN];
        for (slot, element) in data.iter_mut().zip(elements) {
            *slot = element.to_array();
        }
        self.push(16, bytemuck::cast_slice(&data));
    }

    fn finish(mut self) -> Vec<u8> {
        let size = self.bytes.len().next_multiple_of(16).max(16);
        self.bytes.resize(size, 0);
        self.bytes
    }
}

/// Packs a program's `Params` block.
///
/// `values` holds one slot per declaration. Unset or mistyped slots pack the
/// value kernels would read on the CPU (zero, identity for matrices).
/// `texture_flags` receives the declaration index of each texture slot.
#[must_use]
pub fn pack_params(
    declarations: &[UniformDecl],
    values: &[Option<UniformValue>],
    mut texture_flags: impl FnMut(usize) -> u32,
    target_size: [f32; 2],
) -> Vec<u8> {
    let mut block = BlockWriter::default();
    for (index, decl) in declarations.iter().enumerate() {
        let value = values
            .get(index)
            .and_then(Option::as_ref)
            .filter(|v| v.uniform_type() == decl.ty);
        let (align, _) = layout_of(decl.ty);
        match (decl.ty, value) {
            (UniformType::Texture2D | UniformType::TextureCube, _) => {
                block.push(align, bytemuck::bytes_of(&texture_flags(index)));
            }
            (_, Some(UniformValue::Float(v))) => block.push(align, bytemuck::bytes_of(v)),
            (_, Some(UniformValue::Int(v))) => block.push(align, bytemuck::bytes_of(v)),
            (_, Some(UniformValue::Vec2(v))) => block.push(align, bytemuck::cast_slice(&v.to_array())),
            (_, Some(UniformValue::Vec3(v))) => block.push(align, bytemuck::cast_slice(&v.to_array())),
            (_, Some(UniformValue::Vec4(v))) => block.push(align, bytemuck::cast_slice(&v.to_array())),
            (_, Some(UniformValue::Mat4(m))) => block.push(align, bytemuck::cast_slice(&m.to_cols_array())),
            (_, Some(UniformValue::Vec3Array(items))) => {
                block.push_array(items.iter().map(|v| v.extend(0.0)));
            }
            (_, Some(UniformValue::Vec4Array(items))) => block.push_array(items.iter().copied()),
            (UniformType::Mat4, _) => {
                block.push(align, bytemuck::cast_slice(&Mat4::IDENTITY.to_cols_array()));
            }
            (UniformType::Vec3Array | UniformType::Vec4Array, _) => block.push_array(std::iter::empty()),
            (ty, _) => {
                let (align, size) = layout_of(ty);
                block.push(align, &vec![0; size]);
            }
        }
    }
    block.push(8, bytemuck::cast_slice(&target_size));
    block.finish()
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::shaders::{ComposeKernel, DeferredLightingKernel, GBufferKernel};
    use crate::resources::ShaderKernel;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytemuck::cast_slice::<u8, f32>(bytes).to_vec()
    }

    #[test]
    fn gbuffer_block_packs_vec3_tail_and_target_size() {
        let decls = GBufferKernel.declarations();
        let values: Vec<_> = decls.iter().map(|d| d.default.clone()).collect();
        let bytes = pack_params(&decls, &values, |_| TEX_BOUND, [64.0, 32.0]);

        // 2 x mat4, vec3 + flags, roughness, metalness, target size, padding.
        assert_eq!(bytes.len(), 160);
        let f = floats(&bytes);
        assert_eq!(f[0], 1.0);
        assert_eq!(&f[32..35], &[1.0, 1.0, 1.0]);
        assert_eq!(bytemuck::cast_slice::<u8, u32>(&bytes[140..144]), &[TEX_BOUND]);
        assert_eq!(f[36], 0.5);
        assert_eq!(f[37], 0.0);
        assert_eq!(&f[38..40], &[64.0, 32.0]);
    }

    #[test]
    fn light_arrays_pad_to_capacity_with_vec4_stride() {
        let decls = DeferredLightingKernel.declarations();
        let mut values: Vec<_> = decls.iter().map(|d| d.default.clone()).collect();
        values[8] = Some(UniformValue::Int(1));
        values[9] = Some(UniformValue::Vec3Array(vec![Vec3::new(1.0, 2.0, 3.0)]));
        let bytes = pack_params(&decls, &values, |_| 0, [8.0, 8.0]);

        assert_eq!(bytes.len(), 752);
        assert_eq!(bytemuck::cast_slice::<u8, i32>(&bytes[212..216]), &[1]);
        let f = floats(&bytes);
        assert_eq!(&f[56..60], &[1.0, 2.0, 3.0, 0.0]);
        assert!(f[60..88].iter().all(|&v| v == 0.0));
        assert_eq!(f[184], 1.0, "LightIndirect default");
        assert_eq!(&f[186..188], &[8.0, 8.0]);
    }

    #[test]
    fn mistyped_values_fall_back_like_cpu_reads() {
        let decls = ComposeKernel.declarations();
        let mut values: Vec<_> = decls.iter().map(|d| d.default.clone()).collect();
        values[2] = Some(UniformValue::Vec2(Vec2::ONE));
        let bytes = pack_params(&decls, &values, |_| 0, [1.0, 1.0]);
        assert_eq!(bytes.len(), 64);
        assert_eq!(floats(&bytes)[2], 0.0);
    }

    #[test]
    fn texture_flags_receive_declaration_indices() {
        let decls = ComposeKernel.declarations();
        let values: Vec<_> = decls.iter().map(|d| d.default.clone()).collect();
        let mut seen = Vec::new();
        let _ = pack_params(&decls, &values, |i| {
            seen.push(i);
            0
        }, [1.0, 1.0]);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn sampler_flags_follow_filter_and_wrap() {
        assert_eq!(sampler_flags(SamplerDesc::NEAREST_CLAMP), TEX_BOUND);
        assert_eq!(sampler_flags(SamplerDesc::LINEAR_CLAMP), TEX_BOUND | TEX_LINEAR);
        assert_eq!(
            sampler_flags(SamplerDesc::LINEAR_REPEAT),
            TEX_BOUND | TEX_LINEAR | TEX_REPEAT
        );
    }

    #[test]
    fn half_float_texels_survive_upload_and_readback() {
        let texels = [Vec4::new(0.5, -2.0, 1024.0, 1.0)];
        let format = wgpu::TextureFormat::Rgba16Float;
        let bytes = encode_texels(&texels, 1, format);
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode_texel(&bytes, format), texels[0]);
    }

    #[test]
    fn missing_texels_encode_as_zero() {
        let bytes = encode_texels(&[], 2, SAMPLED_FORMAT);
        assert_eq!(bytes, vec![0; 32]);
    }

    #[test]
    fn readback_rows_are_aligned_for_copies() {
        assert_eq!(padded_row_bytes(1, wgpu::TextureFormat::Rgba8Unorm), 256);
        assert_eq!(padded_row_bytes(64, wgpu::TextureFormat::Rgba8Unorm), 256);
        assert_eq!(padded_row_bytes(65, wgpu::TextureFormat::Rgba8Unorm), 512);
        assert_eq!(padded_row_bytes(32, wgpu::TextureFormat::Rgba16Float), 256);
    }
}
