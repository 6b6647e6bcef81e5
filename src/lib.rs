#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod capture;
pub mod demo;
pub mod errors;
pub mod postfx;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shaders;

pub use demo::DemoScene;
pub use errors::{AfterglowError, Result};
pub use postfx::{PostFxConfig, PostFxPipeline};
pub use renderer::{
    DrawItem, LightUpdate, RecordingDevice, RenderDevice, RenderPass, Renderer, RendererSettings,
    SoftwareDevice, TransformUpdate, WgpuDevice,
};
pub use resources::{
    CubemapId, FramebufferId, Material, MaterialId, Mesh, MeshId, PixelFormat, ProgramId,
    ResourceArena, ShaderKernel, ShaderProgram, TextureId, UniformValue,
};
pub use scene::{Camera, Environment, Light, Scene, SceneModel};
pub use shaders::ShaderLibrary;
