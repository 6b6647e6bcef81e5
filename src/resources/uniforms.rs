//! Uniform values, declarations and program-resident uniform state.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::{CubemapId, TextureId};

/// Index of a declared uniform inside its program.
///
/// Obtained from [`ShaderProgram::uniform_location`](super::ShaderProgram::uniform_location);
/// only meaningful for the program that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Vec3Array,
    Vec4Array,
    Texture2D,
    TextureCube,
}

impl UniformType {
    /// Sampler-typed uniforms are bindings, not tunable values.
    #[inline]
    #[must_use]
    pub fn is_texture(self) -> bool {
        matches!(self, Self::Texture2D | Self::TextureCube)
    }
}

/// A uniform value as stored in an effect descriptor or a program.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Texture(TextureId),
    Cubemap(CubemapId),
}

impl UniformValue {
    #[must_use]
    pub fn uniform_type(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Int(_) => UniformType::Int,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Mat4(_) => UniformType::Mat4,
            Self::Vec3Array(_) => UniformType::Vec3Array,
            Self::Vec4Array(_) => UniformType::Vec4Array,
            Self::Texture(_) => UniformType::Texture2D,
            Self::Cubemap(_) => UniformType::TextureCube,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Self::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_value!(
    f32 => Float,
    i32 => Int,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat4 => Mat4,
    TextureId => Texture,
    CubemapId => Cubemap,
);

/// Declaration of one uniform exposed by a shader kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub ty: UniformType,
    /// Initial value; `None` leaves samplers unbound and arrays empty.
    pub default: Option<UniformValue>,
}

impl UniformDecl {
    #[must_use]
    pub fn new(name: &'static str, ty: UniformType) -> Self {
        Self { name, ty, default: None }
    }

    #[must_use]
    pub fn with_default(name: &'static str, value: impl Into<UniformValue>) -> Self {
        let value = value.into();
        Self {
            name,
            ty: value.uniform_type(),
            default: Some(value),
        }
    }
}

/// Read-only view over a program's current uniform values, handed to kernels.
///
/// Unset or mistyped slots read as the type's zero value so that kernels
/// never observe an error while shading.
#[derive(Debug, Clone, Copy)]
pub struct Uniforms<'a> {
    values: &'a [Option<UniformValue>],
}

impl<'a> Uniforms<'a> {
    #[inline]
    #[must_use]
    pub fn new(values: &'a [Option<UniformValue>]) -> Self {
        Self { values }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, location: UniformLocation) -> Option<&'a UniformValue> {
        self.values.get(location.index()).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn float(&self, location: UniformLocation) -> f32 {
        match self.get(location) {
            Some(UniformValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn int(&self, location: UniformLocation) -> i32 {
        match self.get(location) {
            Some(UniformValue::Int(v)) => *v,
            _ => 0,
        }
    }

    #[must_use]
    pub fn vec2(&self, location: UniformLocation) -> Vec2 {
        match self.get(location) {
            Some(UniformValue::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    #[must_use]
    pub fn vec3(&self, location: UniformLocation) -> Vec3 {
        match self.get(location) {
            Some(UniformValue::Vec3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn vec4(&self, location: UniformLocation) -> Vec4 {
        match self.get(location) {
            Some(UniformValue::Vec4(v)) => *v,
            _ => Vec4::ZERO,
        }
    }

    #[must_use]
    pub fn mat4(&self, location: UniformLocation) -> Mat4 {
        match self.get(location) {
            Some(UniformValue::Mat4(v)) => *v,
            _ => Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn vec3_array(&self, location: UniformLocation) -> &'a [Vec3] {
        match self.get(location) {
            Some(UniformValue::Vec3Array(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn vec4_array(&self, location: UniformLocation) -> &'a [Vec4] {
        match self.get(location) {
            Some(UniformValue::Vec4Array(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn texture(&self, location: UniformLocation) -> Option<TextureId> {
        match self.get(location) {
            Some(UniformValue::Texture(id)) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn cubemap(&self, location: UniformLocation) -> Option<CubemapId> {
        match self.get(location) {
            Some(UniformValue::Cubemap(id)) => Some(*id),
            _ => None,
        }
    }
}
