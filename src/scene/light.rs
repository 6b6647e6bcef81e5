use glam::{Vec2, Vec3};

/// Distance-attenuation window `(start, end)`; radiance falls off smoothly
/// between the two and is zero past `end`.
pub type AttenuationRange = Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels (not the direction towards it).
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub range: AttenuationRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub range: AttenuationRange,
    /// Half-angles in radians.
    pub inner_cone: f32,
    pub outer_cone: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

/// A scene light as handed to the renderer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
}

impl Light {
    #[must_use]
    pub fn new_directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Directional(DirectionalLight {
                direction: direction.normalize_or_zero(),
            }),
        }
    }

    #[must_use]
    pub fn new_point(position: Vec3, range: AttenuationRange, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Point(PointLight { position, range }),
        }
    }

    #[must_use]
    pub fn new_spot(
        position: Vec3,
        direction: Vec3,
        range: AttenuationRange,
        inner_cone: f32,
        outer_cone: f32,
        color: Vec3,
        intensity: f32,
    ) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Spot(SpotLight {
                position,
                direction: direction.normalize_or_zero(),
                range,
                inner_cone,
                outer_cone: outer_cone.max(inner_cone),
            }),
        }
    }

    /// `color * intensity`.
    #[inline]
    #[must_use]
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Light type code as uploaded to lighting programs: 0 directional, 1 point, 2 spot.
    #[must_use]
    pub fn type_code(&self) -> f32 {
        match self.kind {
            LightKind::Directional(_) => 0.0,
            LightKind::Point(_) => 1.0,
            LightKind::Spot(_) => 2.0,
        }
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        match self.kind {
            LightKind::Directional(_) => Vec3::ZERO,
            LightKind::Point(p) => p.position,
            LightKind::Spot(s) => s.position,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Vec3 {
        match self.kind {
            LightKind::Directional(d) => d.direction,
            LightKind::Point(_) => Vec3::ZERO,
            LightKind::Spot(s) => s.direction,
        }
    }

    /// Packed as `(range.start, range.end, cos(inner), cos(outer))`.
    /// Directional lights get an infinite range and a full cone.
    #[must_use]
    pub fn attenuation(&self) -> glam::Vec4 {
        match self.kind {
            LightKind::Directional(_) => glam::Vec4::new(0.0, f32::MAX, -1.0, -1.0),
            LightKind::Point(p) => glam::Vec4::new(p.range.x, p.range.y, -1.0, -1.0),
            LightKind::Spot(s) => glam::Vec4::new(
                s.range.x,
                s.range.y,
                s.inner_cone.cos(),
                s.outer_cone.cos(),
            ),
        }
    }
}
