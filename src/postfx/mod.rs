//! Post-processing chain: tunables and pipeline assembly.

pub mod config;
pub mod pipeline;

pub use config::PostFxConfig;
pub use pipeline::{
    BufferRef, Effect, PostFxMaterials, PostFxPipeline, SCRATCH_BUFFER_COUNT, SCRATCH_FORMAT,
    Stage, plan_stages,
};
