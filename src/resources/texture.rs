//! Image Buffer Surfaces
//!
//! CPU-resident 2D and cube textures used as render-target attachments and
//! as sampled effect inputs.
//!
//! Texels are stored row-major with row `0` at the **bottom** of the image
//! (OpenGL window convention), so `uv = (0, 0)` addresses the bottom-left
//! texel. Use [`Texture2D::rows_top_down`] when exporting to an image file.
//!
//! | Format          | Storage        | Typical use                         |
//! |-----------------|----------------|-------------------------------------|
//! | `Rgba16Float`   | `[f16; 4]`     | HDR scene colour, scratch buffers   |
//! | `Rgb16Float`    | `[f16; 3]`     | Environment cube faces              |
//! | `Rgba8Unorm`    | `[u8; 4]`      | G-buffer albedo / display surface   |
//! | `Depth32Float`  | `f32`          | Depth attachment                    |

use glam::{Vec2, Vec3, Vec4};
use half::f16;

// ============================================================================
// Pixel Formats & Sampling State
// ============================================================================

/// Pixel format of an image surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba16Float,
    Rgb16Float,
    Rgba8Unorm,
    Depth32Float,
}

impl PixelFormat {
    #[inline]
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Bytes used by one texel in storage.
    #[inline]
    #[must_use]
    pub fn texel_size(self) -> usize {
        match self {
            Self::Rgba16Float => 8,
            Self::Rgb16Float => 6,
            Self::Rgba8Unorm | Self::Depth32Float => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Sampler state baked into a texture (GL texture-object style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address_mode: AddressMode,
}

impl SamplerDesc {
    pub const NEAREST_CLAMP: Self = Self {
        filter: FilterMode::Nearest,
        address_mode: AddressMode::ClampToEdge,
    };

    pub const LINEAR_CLAMP: Self = Self {
        filter: FilterMode::Linear,
        address_mode: AddressMode::ClampToEdge,
    };

    pub const LINEAR_REPEAT: Self = Self {
        filter: FilterMode::Linear,
        address_mode: AddressMode::Repeat,
    };
}

// ============================================================================
// Texel Storage
// ============================================================================

/// Typed texel storage.
///
/// `Empty` is what a surface holds while it is bound as a render-target
/// attachment (its storage is checked out by the device) or after its data
/// has been released. Sampling empty storage yields zero.
#[derive(Debug, Clone, Default)]
pub enum TexelData {
    #[default]
    Empty,
    Rgba16Float(Vec<[f16; 4]>),
    Rgb16Float(Vec<[f16; 3]>),
    Rgba8Unorm(Vec<[u8; 4]>),
    Depth32Float(Vec<f32>),
}

impl TexelData {
    /// Allocates zero-initialised storage for `len` texels.
    #[must_use]
    pub fn zeroed(format: PixelFormat, len: usize) -> Self {
        match format {
            PixelFormat::Rgba16Float => Self::Rgba16Float(vec![[f16::ZERO; 4]; len]),
            PixelFormat::Rgb16Float => Self::Rgb16Float(vec![[f16::ZERO; 3]; len]),
            PixelFormat::Rgba8Unorm => Self::Rgba8Unorm(vec![[0; 4]; len]),
            PixelFormat::Depth32Float => Self::Depth32Float(vec![1.0; len]),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Rgba16Float(v) => v.len(),
            Self::Rgb16Float(v) => v.len(),
            Self::Rgba8Unorm(v) => v.len(),
            Self::Depth32Float(v) => v.len(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one texel as linear RGBA. Depth reads as `(d, d, d, 1)`.
    #[inline]
    #[must_use]
    pub fn read(&self, index: usize) -> Vec4 {
        match self {
            Self::Empty => Vec4::ZERO,
            Self::Rgba16Float(v) => v.get(index).map_or(Vec4::ZERO, |t| {
                Vec4::new(t[0].to_f32(), t[1].to_f32(), t[2].to_f32(), t[3].to_f32())
            }),
            Self::Rgb16Float(v) => v.get(index).map_or(Vec4::ZERO, |t| {
                Vec4::new(t[0].to_f32(), t[1].to_f32(), t[2].to_f32(), 1.0)
            }),
            Self::Rgba8Unorm(v) => v.get(index).map_or(Vec4::ZERO, |t| {
                Vec4::new(
                    f32::from(t[0]) / 255.0,
                    f32::from(t[1]) / 255.0,
                    f32::from(t[2]) / 255.0,
                    f32::from(t[3]) / 255.0,
                )
            }),
            Self::Depth32Float(v) => v
                .get(index)
                .map_or(Vec4::ZERO, |&d| Vec4::new(d, d, d, 1.0)),
        }
    }

    /// Writes one texel, converting to the storage format.
    #[inline]
    pub fn write(&mut self, index: usize, value: Vec4) {
        match self {
            Self::Empty => {}
            Self::Rgba16Float(v) => {
                if let Some(t) = v.get_mut(index) {
                    *t = value.to_array().map(f16::from_f32);
                }
            }
            Self::Rgb16Float(v) => {
                if let Some(t) = v.get_mut(index) {
                    *t = value.truncate().to_array().map(f16::from_f32);
                }
            }
            Self::Rgba8Unorm(v) => {
                if let Some(t) = v.get_mut(index) {
                    *t = value.to_array().map(unorm8);
                }
            }
            Self::Depth32Float(v) => {
                if let Some(t) = v.get_mut(index) {
                    *t = value.x;
                }
            }
        }
    }

    /// Reads the raw depth value of a depth texel (`1.0` for non-depth storage).
    #[inline]
    #[must_use]
    pub fn depth(&self, index: usize) -> f32 {
        match self {
            Self::Depth32Float(v) => v.get(index).copied().unwrap_or(1.0),
            _ => 1.0,
        }
    }

    /// Overwrites every texel with `value`.
    pub fn fill(&mut self, value: Vec4) {
        for i in 0..self.len() {
            self.write(i, value);
        }
    }
}

#[inline]
fn unorm8(v: f32) -> u8 {
    // NaN saturates to 0 through the float-to-int cast.
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

// ============================================================================
// Texture2D
// ============================================================================

/// A fixed-resolution 2D image surface.
#[derive(Debug, Clone)]
pub struct Texture2D {
    pub label: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pub sampler: SamplerDesc,
    pub(crate) data: TexelData,
}

impl Texture2D {
    /// Allocates a zero-initialised surface (depth surfaces start at `1.0`).
    #[must_use]
    pub fn new(label: &str, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            format,
            sampler: SamplerDesc::default(),
            data: TexelData::zeroed(format, width as usize * height as usize),
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerDesc) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builds a surface by evaluating `f(uv)` at every texel centre.
    #[must_use]
    pub fn from_fn(
        label: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        f: impl Fn(Vec2) -> Vec4,
    ) -> Self {
        let mut texture = Self::new(label, width, height, format);
        for y in 0..height {
            for x in 0..width {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                );
                texture.write(x, y, f(uv));
            }
        }
        texture
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// `false` while the storage is checked out as a render target.
    #[inline]
    #[must_use]
    pub fn is_resident(&self) -> bool {
        !self.data.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Reads the texel at integer coordinates; out-of-range reads return zero.
    #[must_use]
    pub fn read(&self, x: u32, y: u32) -> Vec4 {
        if x >= self.width || y >= self.height {
            return Vec4::ZERO;
        }
        self.data.read(self.index(x, y))
    }

    pub fn write(&mut self, x: u32, y: u32, value: Vec4) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.data.write(i, value);
        }
    }

    /// Samples with the texture's own filter and wrap state.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.data.is_empty() || self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        sample_plane(&self.data, self.width, self.height, self.sampler, uv)
    }

    /// Fetches the nearest texel without filtering (`texelFetch` analogue).
    #[must_use]
    pub fn fetch(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 || !uv.is_finite() {
            return Vec4::ZERO;
        }
        let x = (uv.x * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32);
        let y = (uv.y * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32);
        self.read(x as u32, y as u32)
    }

    /// All texels as linear RGBA, bottom row first.
    #[must_use]
    pub fn texels(&self) -> Vec<Vec4> {
        (0..self.data.len()).map(|i| self.data.read(i)).collect()
    }

    /// All texels as linear RGBA, top row first (image-file order).
    #[must_use]
    pub fn rows_top_down(&self) -> Vec<Vec4> {
        let mut out = Vec::with_capacity(self.data.len());
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                out.push(self.read(x, y));
            }
        }
        out
    }
}

// ============================================================================
// TextureCube
// ============================================================================

/// Cube face order: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_FACE_COUNT: usize = 6;

/// A cube-mapped environment surface with six square faces.
#[derive(Debug, Clone)]
pub struct TextureCube {
    pub label: String,
    size: u32,
    format: PixelFormat,
    faces: [TexelData; CUBE_FACE_COUNT],
}

impl TextureCube {
    #[must_use]
    pub fn new(label: &str, size: u32, format: PixelFormat) -> Self {
        let len = size as usize * size as usize;
        Self {
            label: label.to_string(),
            size,
            format,
            faces: std::array::from_fn(|_| TexelData::zeroed(format, len)),
        }
    }

    /// Builds a cube by evaluating `f(direction)` at each face texel centre.
    #[must_use]
    pub fn from_fn(label: &str, size: u32, format: PixelFormat, f: impl Fn(Vec3) -> Vec4) -> Self {
        let mut cube = Self::new(label, size, format);
        for face in 0..CUBE_FACE_COUNT {
            for y in 0..size {
                for x in 0..size {
                    let s = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let t = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                    let dir = face_direction(face, s, t).normalize();
                    let index = y as usize * size as usize + x as usize;
                    cube.faces[face].write(index, f(dir));
                }
            }
        }
        cube
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Texels of one face as linear RGBA, bottom row first.
    #[must_use]
    pub fn face_texels(&self, face: usize) -> Vec<Vec4> {
        self.faces
            .get(face)
            .map_or_else(Vec::new, |data| (0..data.len()).map(|i| data.read(i)).collect())
    }

    /// Samples the cube along `direction` with bilinear filtering inside the face.
    #[must_use]
    pub fn sample(&self, direction: Vec3) -> Vec4 {
        if self.size == 0 || !direction.is_finite() || direction == Vec3::ZERO {
            return Vec4::ZERO;
        }
        let (face, s, t) = cube_face_coords(direction);
        let uv = Vec2::new(s * 0.5 + 0.5, t * 0.5 + 0.5);
        sample_plane(
            &self.faces[face],
            self.size,
            self.size,
            SamplerDesc::LINEAR_CLAMP,
            uv,
        )
    }
}

/// Maps face-local coordinates `s, t ∈ [-1, 1]` to a direction.
fn face_direction(face: usize, s: f32, t: f32) -> Vec3 {
    match face {
        0 => Vec3::new(1.0, t, -s),
        1 => Vec3::new(-1.0, t, s),
        2 => Vec3::new(s, 1.0, -t),
        3 => Vec3::new(s, -1.0, t),
        4 => Vec3::new(s, t, 1.0),
        _ => Vec3::new(-s, t, -1.0),
    }
}

/// Inverse of [`face_direction`]: major-axis face selection.
fn cube_face_coords(d: Vec3) -> (usize, f32, f32) {
    let a = d.abs();
    if a.x >= a.y && a.x >= a.z {
        if d.x > 0.0 {
            (0, -d.z / a.x, d.y / a.x)
        } else {
            (1, d.z / a.x, d.y / a.x)
        }
    } else if a.y >= a.z {
        if d.y > 0.0 {
            (2, d.x / a.y, -d.z / a.y)
        } else {
            (3, d.x / a.y, d.z / a.y)
        }
    } else if d.z > 0.0 {
        (4, d.x / a.z, d.y / a.z)
    } else {
        (5, -d.x / a.z, d.y / a.z)
    }
}

// ============================================================================
// Filtering
// ============================================================================

#[inline]
fn wrap_coord(i: i64, size: u32, mode: AddressMode) -> usize {
    let n = i64::from(size);
    match mode {
        AddressMode::ClampToEdge => i.clamp(0, n - 1) as usize,
        AddressMode::Repeat => i.rem_euclid(n) as usize,
    }
}

fn sample_plane(data: &TexelData, width: u32, height: u32, sampler: SamplerDesc, uv: Vec2) -> Vec4 {
    if !uv.is_finite() {
        return Vec4::ZERO;
    }
    let texel = |x: i64, y: i64| {
        let xi = wrap_coord(x, width, sampler.address_mode);
        let yi = wrap_coord(y, height, sampler.address_mode);
        data.read(yi * width as usize + xi)
    };

    let px = uv.x * width as f32;
    let py = uv.y * height as f32;

    match sampler.filter {
        FilterMode::Nearest => texel(px.floor() as i64, py.floor() as i64),
        FilterMode::Linear => {
            let fx = px - 0.5;
            let fy = py - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let tx = fx - x0;
            let ty = fy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let top = texel(x0, y0).lerp(texel(x0 + 1, y0), tx);
            let bottom = texel(x0, y0 + 1).lerp(texel(x0 + 1, y0 + 1), tx);
            top.lerp(bottom, ty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_write_saturates_and_rounds() {
        let mut data = TexelData::zeroed(PixelFormat::Rgba8Unorm, 1);
        data.write(0, Vec4::new(2.0, -1.0, 0.5, f32::NAN));
        let v = data.read(0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 0.0);
        assert!((v.z - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(v.w, 0.0);
    }

    #[test]
    fn linear_sampling_interpolates_between_texels() {
        let mut tex = Texture2D::new("t", 2, 1, PixelFormat::Rgba16Float)
            .with_sampler(SamplerDesc::LINEAR_CLAMP);
        tex.write(0, 0, Vec4::ZERO);
        tex.write(1, 0, Vec4::ONE);
        let mid = tex.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-3);
    }

    #[test]
    fn empty_storage_samples_zero() {
        let mut tex = Texture2D::new("t", 4, 4, PixelFormat::Rgba16Float);
        tex.data = TexelData::Empty;
        assert_eq!(tex.sample(Vec2::splat(0.5)), Vec4::ZERO);
    }

    #[test]
    fn cube_face_round_trip_selects_major_axis() {
        for face in 0..CUBE_FACE_COUNT {
            let dir = face_direction(face, 0.25, -0.5);
            let (f, s, t) = cube_face_coords(dir);
            assert_eq!(f, face);
            assert!((s - 0.25).abs() < 1e-5);
            assert!((t + 0.5).abs() < 1e-5);
        }
    }
}
