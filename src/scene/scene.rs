use glam::Mat4;

use crate::renderer::{RenderDevice, Renderer};
use crate::resources::{MaterialId, MeshId};
use crate::scene::camera::Camera;
use crate::scene::environment::Environment;
use crate::scene::light::Light;

/// One drawable: world transform, geometry and effect descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneModel {
    pub name: String,
    pub transform: Mat4,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub visible: bool,
}

impl SceneModel {
    #[must_use]
    pub fn new(name: &str, transform: Mat4, mesh: MeshId, material: MaterialId) -> Self {
        Self {
            name: name.to_string(),
            transform,
            mesh,
            material,
            visible: true,
        }
    }
}

/// Flat scene container.
///
/// Holds exactly what the renderer needs each frame; hierarchy and
/// traversal order are the caller's business.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub camera: Camera,
    pub models: Vec<SceneModel>,
    pub lights: Vec<Light>,
    pub environment: Environment,
}

impl Scene {
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    /// Adds a model and returns its index.
    pub fn add_model(&mut self, model: SceneModel) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    #[must_use]
    pub fn model_by_name(&self, name: &str) -> Option<&SceneModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn model_by_name_mut(&mut self, name: &str) -> Option<&mut SceneModel> {
        self.models.iter_mut().find(|m| m.name == name)
    }

    /// Hands this frame's camera, visible models and lights to `renderer`.
    /// Call once before every [`Renderer::render`].
    pub fn submit<D: RenderDevice>(&self, renderer: &mut Renderer<D>) {
        renderer.set_camera(&self.camera);
        for model in self.models.iter().filter(|m| m.visible) {
            renderer.add_model(model.transform, model.mesh, model.material);
        }
        for light in &self.lights {
            renderer.add_light(*light);
        }
        renderer.set_indirect_light(self.environment.intensity);
    }
}
