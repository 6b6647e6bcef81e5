//! Scene contract
//!
//! What scene traversal hands the renderer each frame:
//! - [`Camera`]: view and projection matrices
//! - [`Light`]: directional, point and spot lights
//! - [`Environment`]: sky cubemap and indirect intensity
//! - [`Scene`]: a flat list of models plus the above, with [`Scene::submit`]

pub mod camera;
pub mod environment;
pub mod light;
#[allow(clippy::module_inception)]
pub mod scene;

pub use camera::{Camera, ProjectionType};
pub use environment::Environment;
pub use light::{AttenuationRange, DirectionalLight, Light, LightKind, PointLight, SpotLight};
pub use scene::{Scene, SceneModel};
