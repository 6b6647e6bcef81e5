//! Drawable geometry: indexed triangle lists and primitive builders.

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved vertex, uploaded as-is to GPU vertex buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    #[inline]
    #[must_use]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }
}

/// Indexed triangle list (counter-clockwise front faces).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub label: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    #[must_use]
    pub fn new(label: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            label: label.to_string(),
            vertices,
            indices,
        }
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Unit quad in the XY plane facing +Z, spanning `[-size/2, size/2]`.
    #[must_use]
    pub fn quad(size: f32) -> Self {
        let h = size * 0.5;
        let n = Vec3::Z;
        let vertices = vec![
            Vertex::new(Vec3::new(-h, -h, 0.0), n, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(h, -h, 0.0), n, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(h, h, 0.0), n, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-h, h, 0.0), n, Vec2::new(0.0, 1.0)),
        ];
        Self::new("Quad", vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// Ground plane in the XZ plane facing +Y.
    #[must_use]
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let n = Vec3::Y;
        let vertices = vec![
            Vertex::new(Vec3::new(-h, 0.0, h), n, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(h, 0.0, h), n, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(h, 0.0, -h), n, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-h, 0.0, -h), n, Vec2::new(0.0, 1.0)),
        ];
        Self::new("Plane", vertices, vec![0, 1, 2, 0, 2, 3])
    }

    /// Axis-aligned cube with per-face normals.
    #[must_use]
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, tangent u, tangent v)
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (n + u * su + v * sv) * h;
                let uv = Vec2::new(su * 0.5 + 0.5, sv * 0.5 + 0.5);
                vertices.push(Vertex::new(position, n, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new("Cube", vertices, indices)
    }

    /// UV sphere centred at the origin.
    #[must_use]
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);

        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        for r in 0..=rings {
            let v = r as f32 / rings as f32;
            let phi = v * PI;
            for s in 0..=segments {
                let u = s as f32 / segments as f32;
                let theta = u * TAU;
                let n = Vec3::new(phi.sin() * theta.cos(), -phi.cos(), phi.sin() * theta.sin());
                vertices.push(Vertex::new(n * radius, n, Vec2::new(u, v)));
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
        for r in 0..rings {
            for s in 0..segments {
                let a = r * stride + s;
                let b = a + stride;
                indices.extend_from_slice(&[a, b + 1, a + 1, a, b, b + 1]);
            }
        }
        Self::new("Sphere", vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_faces() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
    }

    #[test]
    fn cube_faces_wind_counter_clockwise_outward() {
        let cube = Mesh::cube(2.0);
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.vertices[tri[i] as usize]);
            let face_normal = (b.position - a.position).cross(c.position - a.position);
            assert!(face_normal.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn sphere_indices_are_in_range() {
        let sphere = Mesh::uv_sphere(1.0, 8, 6);
        let max = sphere.vertices.len() as u32;
        assert!(sphere.indices.iter().all(|&i| i < max));
    }

    #[test]
    fn vertices_cast_to_tightly_packed_bytes() {
        let quad = Mesh::quad(1.0);
        let bytes: &[u8] = bytemuck::cast_slice(&quad.vertices);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(bytes.len(), quad.vertices.len() * 32);
        let first: &[f32] = bytemuck::cast_slice(&bytes[..32]);
        assert_eq!(first, &[-0.5, -0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }
}
