//! Shader Library
//!
//! Stands in for the asset-loading side of program creation. A program is
//! built from an ordered list of source fragment names, the same shape as a
//! list of GLSL files concatenated before compilation:
//!
//! ```text
//! ["shaders/version330.glsl", "shaders/utils.glsl", "postfx/bloom"]
//!   └──────────── includes ───────────────────┘   └── entry kernel
//! ```
//!
//! Every fragment must be known to the library. Includes only have to
//! resolve; the last fragment must name a kernel and decides what the
//! program does.

pub mod common;
pub mod gbuffer;
pub mod lighting;
pub mod postfx;
pub mod wgsl;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{AfterglowError, Result};
use crate::resources::{ProgramId, ResourceArena, ShaderKernel, ShaderProgram};

pub use gbuffer::{GBufferKernel, TvScreenKernel};
pub use lighting::{DeferredLightingKernel, SkyboxKernel};
pub use postfx::{
    BarrelKernel, BloomKernel, BlurKernel, ChromaticKernel, ComposeKernel, CopyKernel,
    NoiseKernel, SOURCE_TEXTURE, ScanlineKernel, VignetteKernel,
};

/// Shared include fragments accepted in front of any kernel.
pub const BUILTIN_INCLUDES: &[&str] = &[
    "shaders/version330.glsl",
    "shaders/utils.glsl",
    "shaders/lambert-ggx.glsl",
    "shaders/lighting.glsl",
];

pub struct ShaderLibrary {
    kernels: FxHashMap<&'static str, Arc<dyn ShaderKernel>>,
    includes: FxHashSet<String>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ShaderLibrary {
    /// An empty library: no kernels, no includes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kernels: FxHashMap::default(),
            includes: FxHashSet::default(),
        }
    }

    /// Library holding every built-in kernel and include.
    #[must_use]
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for include in BUILTIN_INCLUDES {
            library.register_include(include);
        }

        let kernels: [Arc<dyn ShaderKernel>; 13] = [
            Arc::new(GBufferKernel),
            Arc::new(TvScreenKernel),
            Arc::new(DeferredLightingKernel),
            Arc::new(SkyboxKernel),
            Arc::new(CopyKernel),
            Arc::new(BloomKernel),
            Arc::new(BlurKernel),
            Arc::new(ComposeKernel),
            Arc::new(ChromaticKernel),
            Arc::new(NoiseKernel),
            Arc::new(VignetteKernel),
            Arc::new(BarrelKernel),
            Arc::new(ScanlineKernel),
        ];
        for kernel in kernels {
            library.register(kernel);
        }
        library
    }

    /// Adds a kernel under its own name, replacing any previous one.
    pub fn register(&mut self, kernel: Arc<dyn ShaderKernel>) {
        let name = kernel.name();
        if self.kernels.insert(name, kernel).is_some() {
            log::debug!("Shader kernel `{name}` replaced");
        }
    }

    pub fn register_include(&mut self, name: &str) {
        self.includes.insert(name.to_string());
    }

    /// Names of every registered kernel, in no particular order.
    pub fn kernel_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kernels.keys().copied()
    }

    #[must_use]
    pub fn kernel(&self, name: &str) -> Option<&Arc<dyn ShaderKernel>> {
        self.kernels.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name) || self.includes.contains(name)
    }

    /// Links a program from an ordered fragment list.
    pub fn build(&self, sources: &[&str]) -> Result<ShaderProgram> {
        let Some((entry, includes)) = sources.split_last() else {
            return Err(AfterglowError::InvalidShaderSource(
                "empty source list".to_string(),
            ));
        };

        for include in includes {
            if !self.contains(include) {
                return Err(AfterglowError::ShaderNotFound((*include).to_string()));
            }
        }

        match self.kernels.get(entry) {
            Some(kernel) => Ok(ShaderProgram::new(entry, Arc::clone(kernel))),
            None if self.includes.contains(*entry) => Err(AfterglowError::InvalidShaderSource(
                format!("`{entry}` is an include, not an entry kernel"),
            )),
            None => Err(AfterglowError::ShaderNotFound((*entry).to_string())),
        }
    }

    /// Builds a program and stores it in `arena`.
    pub fn load(&self, arena: &mut ResourceArena, sources: &[&str]) -> Result<ProgramId> {
        let program = self.build(sources)?;
        log::debug!(
            "Program `{}` linked ({} uniforms)",
            program.name(),
            program.declarations().len()
        );
        Ok(arena.add_program(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_includes_and_entry() {
        let library = ShaderLibrary::builtin();
        let program = library
            .build(&["shaders/version330.glsl", "shaders/utils.glsl", "postfx/bloom"])
            .unwrap();
        assert_eq!(program.name(), "postfx/bloom");
        assert!(program.uniform_location("Range").is_some());
        assert!(program.uniform_location(SOURCE_TEXTURE).is_some());
    }

    #[test]
    fn unknown_fragment_is_fatal() {
        let library = ShaderLibrary::builtin();
        let err = library
            .build(&["shaders/missing.glsl", "postfx/copy"])
            .unwrap_err();
        assert!(matches!(err, AfterglowError::ShaderNotFound(name) if name == "shaders/missing.glsl"));
    }

    #[test]
    fn include_cannot_be_the_entry() {
        let library = ShaderLibrary::builtin();
        assert!(matches!(
            library.build(&["shaders/utils.glsl"]),
            Err(AfterglowError::InvalidShaderSource(_))
        ));
        assert!(matches!(library.build(&[]), Err(AfterglowError::InvalidShaderSource(_))));
    }
}
