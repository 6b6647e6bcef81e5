//! Helpers shared by the built-in kernels.

use glam::{Vec2, Vec3};

/// Rec. 709 luma weights.
pub const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

#[inline]
#[must_use]
pub fn luminance(c: Vec3) -> f32 {
    c.dot(LUMA)
}

/// GLSL `smoothstep`. A degenerate edge pair behaves like `step(edge1, x)`.
#[inline]
#[must_use]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge1 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Cheap 2D hash in `[0, 1)`.
#[inline]
#[must_use]
pub fn hash12(p: Vec2) -> f32 {
    let h = p.dot(Vec2::new(127.1, 311.7)).sin() * 43_758.547;
    h - h.floor()
}

#[must_use]
pub fn rgb_to_hsv(c: Vec3) -> Vec3 {
    let max = c.max_element();
    let min = c.min_element();
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == c.x {
        ((c.y - c.z) / delta).rem_euclid(6.0) / 6.0
    } else if max == c.y {
        ((c.z - c.x) / delta + 2.0) / 6.0
    } else {
        ((c.x - c.y) / delta + 4.0) / 6.0
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    Vec3::new(hue, saturation, max)
}

#[must_use]
pub fn hsv_to_rgb(hsv: Vec3) -> Vec3 {
    let h = hsv.x.rem_euclid(1.0) * 6.0;
    let s = hsv.y;
    let v = hsv.z;
    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - c;
    let rgb = match h as u32 {
        0 => Vec3::new(c, x, 0.0),
        1 => Vec3::new(x, c, 0.0),
        2 => Vec3::new(0.0, c, x),
        3 => Vec3::new(0.0, x, c),
        4 => Vec3::new(x, 0.0, c),
        _ => Vec3::new(c, 0.0, x),
    };
    rgb + Vec3::splat(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_round_trip_preserves_colour() {
        for c in [
            Vec3::new(0.9, 0.2, 0.1),
            Vec3::new(0.1, 0.8, 0.3),
            Vec3::new(0.2, 0.3, 0.7),
            Vec3::splat(0.5),
        ] {
            let back = hsv_to_rgb(rgb_to_hsv(c));
            assert!((back - c).abs().max_element() < 1e-5, "{c} -> {back}");
        }
    }

    #[test]
    fn smoothstep_clamps_and_handles_degenerate_edges() {
        assert_eq!(smoothstep(1.0, 2.0, 0.0), 0.0);
        assert_eq!(smoothstep(1.0, 2.0, 3.0), 1.0);
        assert!((smoothstep(1.0, 2.0, 1.5) - 0.5).abs() < 1e-6);
        assert_eq!(smoothstep(2.0, 2.0, 1.0), 0.0);
        assert_eq!(smoothstep(2.0, 2.0, 2.0), 1.0);
    }
}
