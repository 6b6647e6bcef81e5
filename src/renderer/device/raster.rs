//! Triangle setup and scan conversion for the CPU device.
//!
//! Conventions match OpenGL: clip space is `-w <= x, y, z <= w`, window
//! space has its origin at the bottom-left pixel corner, and window depth
//! is `ndc.z * 0.5 + 0.5`.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::resources::{Varyings, VertexOutput};

/// A covered pixel, ready for depth test and shading.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub varyings: Varyings,
}

/// Vertices of a clipped polygon. Clipping a triangle against one plane
/// yields at most four vertices.
pub type ClippedPolygon = SmallVec<[VertexOutput; 4]>;

const NEAR_EPSILON: f32 = 1e-6;

/// Clips a triangle against the near plane `z = -w`.
#[must_use]
pub fn clip_near(triangle: &[VertexOutput; 3]) -> ClippedPolygon {
    let distance = |v: &VertexOutput| v.clip.z + v.clip.w;
    let mut out = ClippedPolygon::new();

    for i in 0..3 {
        let current = &triangle[i];
        let next = &triangle[(i + 1) % 3];
        let dc = distance(current);
        let dn = distance(next);

        if dc >= 0.0 {
            out.push(*current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push(VertexOutput {
                clip: current.clip.lerp(next.clip, t),
                varyings: current.varyings.lerp(&next.varyings, t),
            });
        }
    }
    out
}

/// Maps a clip-space vertex to window coordinates. `z` is window depth,
/// the returned scalar is `1 / w`.
#[inline]
fn to_window(v: &VertexOutput, viewport: Vec2) -> (Vec3, f32) {
    let inv_w = 1.0 / v.clip.w.max(NEAR_EPSILON);
    let ndc = v.clip.truncate() * inv_w;
    let window = Vec3::new(
        (ndc.x * 0.5 + 0.5) * viewport.x,
        (ndc.y * 0.5 + 0.5) * viewport.y,
        ndc.z * 0.5 + 0.5,
    );
    (window, inv_w)
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top-left fill rule for a counter-clockwise triangle in a y-up window.
#[inline]
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    (d.y == 0.0 && d.x < 0.0) || d.y < 0.0
}

/// Rasterizes one clip-space triangle (both windings) and calls `emit` for
/// every covered pixel centre. Returns the number of fragments emitted.
pub fn rasterize_triangle(
    triangle: [&VertexOutput; 3],
    width: u32,
    height: u32,
    mut emit: impl FnMut(Fragment),
) -> u64 {
    let viewport = Vec2::new(width as f32, height as f32);
    let mut verts = triangle.map(|v| {
        let (window, inv_w) = to_window(v, viewport);
        (window, inv_w, v.varyings)
    });

    let p = |i: usize, verts: &[(Vec3, f32, Varyings); 3]| verts[i].0.truncate();
    let mut area = edge(p(0, &verts), p(1, &verts), p(2, &verts));
    if !area.is_finite() || area == 0.0 {
        return 0;
    }
    if area < 0.0 {
        verts.swap(1, 2);
        area = -area;
    }

    let [a, b, c] = [p(0, &verts), p(1, &verts), p(2, &verts)];
    let min = a.min(b).min(c).max(Vec2::ZERO);
    let max = a.max(b).max(c).min(viewport);
    if min.x >= max.x || min.y >= max.y {
        return 0;
    }

    let bias = [
        is_top_left(b, c),
        is_top_left(c, a),
        is_top_left(a, b),
    ];
    let covers = |w: f32, top_left: bool| w > 0.0 || (w == 0.0 && top_left);

    let x0 = min.x.floor() as u32;
    let y0 = min.y.floor() as u32;
    let x1 = (max.x.ceil() as u32).min(width);
    let y1 = (max.y.ceil() as u32).min(height);

    let mut count = 0;
    for y in y0..y1 {
        for x in x0..x1 {
            let centre = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, centre);
            let w1 = edge(c, a, centre);
            let w2 = edge(a, b, centre);
            if !(covers(w0, bias[0]) && covers(w1, bias[1]) && covers(w2, bias[2])) {
                continue;
            }

            let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
            let depth = l0 * verts[0].0.z + l1 * verts[1].0.z + l2 * verts[2].0.z;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            // Perspective-correct weights.
            let p0 = l0 * verts[0].1;
            let p1 = l1 * verts[1].1;
            let p2 = l2 * verts[2].1;
            let sum = p0 + p1 + p2;
            if sum <= 0.0 {
                continue;
            }
            let varyings = Varyings::weighted(
                &verts[0].2,
                p0 / sum,
                &verts[1].2,
                p1 / sum,
                &verts[2].2,
                p2 / sum,
            );

            emit(Fragment { x, y, depth, varyings });
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn vertex(x: f32, y: f32, z: f32) -> VertexOutput {
        VertexOutput {
            clip: Vec4::new(x, y, z, 1.0),
            varyings: Varyings::default(),
        }
    }

    #[test]
    fn fullscreen_triangle_pair_covers_every_pixel_once() {
        let quad = [
            vertex(-1.0, -1.0, 0.0),
            vertex(1.0, -1.0, 0.0),
            vertex(1.0, 1.0, 0.0),
            vertex(-1.0, 1.0, 0.0),
        ];
        let mut hits = vec![0u32; 16 * 16];
        for tri in [[0, 1, 2], [0, 2, 3]] {
            rasterize_triangle(tri.map(|i| &quad[i]), 16, 16, |f| {
                hits[(f.y * 16 + f.x) as usize] += 1;
            });
        }
        assert!(hits.iter().all(|&h| h == 1));
    }

    #[test]
    fn winding_does_not_affect_coverage() {
        let tri = [vertex(-1.0, -1.0, 0.0), vertex(1.0, -1.0, 0.0), vertex(0.0, 1.0, 0.0)];
        let ccw = rasterize_triangle([&tri[0], &tri[1], &tri[2]], 8, 8, |_| {});
        let cw = rasterize_triangle([&tri[0], &tri[2], &tri[1]], 8, 8, |_| {});
        assert_eq!(ccw, cw);
        assert!(ccw > 0);
    }

    #[test]
    fn triangle_behind_near_plane_is_clipped_away() {
        let tri = [vertex(-1.0, -1.0, -2.0), vertex(1.0, -1.0, -2.0), vertex(0.0, 1.0, -2.0)];
        assert!(clip_near(&tri).is_empty());
    }

    #[test]
    fn straddling_triangle_gains_a_vertex() {
        let tri = [vertex(-1.0, -1.0, -2.0), vertex(1.0, -1.0, 0.0), vertex(0.0, 1.0, 0.0)];
        assert_eq!(clip_near(&tri).len(), 4);
    }
}
