use glam::{Mat4, Vec3};

/// Active camera: view and projection matrices, separately queryable, plus
/// the cached view-projection product.
///
/// Projections use OpenGL clip conventions (NDC depth in `[-1, 1]`), which
/// the deferred resolve relies on when reconstructing positions from depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    // === Projection ===
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    // Cached matrices, read-only for the renderer
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) view_projection_matrix: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(60.0, 1.0, 0.1, 100.0)
    }
}

impl Camera {
    /// `fov` is the vertical field of view in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::new_perspective(60.0, aspect, near, far);
        cam.projection_type = ProjectionType::Orthographic;
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh_gl(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh_gl(-w, w, -h, h, self.near, self.far)
            }
        };
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.set_view_matrix(Mat4::look_at_rh(eye, target, up));
    }

    #[must_use]
    pub fn with_look_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.look_at(eye, target, up);
        self
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view_matrix = view;
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection_matrix = projection;
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    /// World-space eye position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.view_matrix.inverse().w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_recovers_eye_position() {
        let eye = Vec3::new(-2.0, 1.0, -2.0);
        let cam = Camera::default().with_look_at(eye, Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
        assert!((cam.position() - eye).length() < 1e-4);
    }

    #[test]
    fn view_projection_tracks_both_matrices() {
        let mut cam = Camera::new_perspective(45.0, 1.0, 0.1, 10.0);
        cam.look_at(Vec3::Z * 3.0, Vec3::ZERO, Vec3::Y);
        let expected = cam.projection_matrix() * cam.view_matrix();
        assert!(cam.view_projection_matrix().abs_diff_eq(expected, 1e-6));
    }
}
