//! Effect Descriptors
//!
//! A [`Material`] is the user-editable half of a draw: a program key plus a
//! table of named uniform values. Transform- and light-related uniforms are
//! *filtered out* of that table; the renderer's per-program update routines
//! own them.
//!
//! # Unknown-name policy
//!
//! [`Material::set_uniform`] fails with [`AfterglowError::UnknownUniform`]
//! for names the program does not declare (or that are filtered), and with
//! [`AfterglowError::UniformTypeMismatch`] for a value of the wrong type.
//! Uploading to the program ([`Material::apply`]) never fails.

use rustc_hash::{FxHashMap, FxHashSet};

use super::program::ShaderProgram;
use super::uniforms::{UniformType, UniformValue};
use super::ProgramId;
use crate::errors::{AfterglowError, Result};

#[derive(Debug, Clone)]
pub struct Material {
    program: ProgramId,
    program_name: String,
    /// User-editable uniforms: name → declared type.
    editable: FxHashMap<String, UniformType>,
    values: FxHashMap<String, UniformValue>,
}

impl Material {
    /// Descriptor exposing every uniform the program declares.
    #[must_use]
    pub fn new(program_id: ProgramId, program: &ShaderProgram) -> Self {
        Self::with_filtered(program_id, program, &[])
    }

    /// Descriptor hiding `filtered` names from the editable set.
    #[must_use]
    pub fn with_filtered(program_id: ProgramId, program: &ShaderProgram, filtered: &[&str]) -> Self {
        let filtered: FxHashSet<&str> = filtered.iter().copied().collect();
        let editable = program
            .declarations()
            .iter()
            .filter(|decl| !filtered.contains(decl.name))
            .map(|decl| (decl.name.to_string(), decl.ty))
            .collect();
        Self {
            program: program_id,
            program_name: program.name().to_string(),
            editable,
            values: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn has_uniform(&self, name: &str) -> bool {
        self.editable.contains_key(name)
    }

    /// Declared type of an editable uniform.
    #[inline]
    #[must_use]
    pub fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.editable.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Names this descriptor accepts, in no particular order.
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.editable.keys().map(String::as_str)
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        let Some(&expected) = self.editable.get(name) else {
            return Err(AfterglowError::UnknownUniform {
                name: name.to_string(),
                program: self.program_name.clone(),
            });
        };
        let found = value.uniform_type();
        if expected != found {
            return Err(AfterglowError::UniformTypeMismatch {
                name: name.to_string(),
                expected,
                found,
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Current value of `name`, if it has been set on this descriptor.
    #[inline]
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn float(&self, name: &str) -> Option<f32> {
        self.uniform(name).and_then(UniformValue::as_float)
    }

    /// Uploads every set value into the program's uniform state.
    ///
    /// Names the program does not resolve are skipped silently.
    pub fn apply(&self, program: &mut ShaderProgram) {
        for (name, value) in &self.values {
            let location = program.uniform_location(name);
            program.set_uniform(location, value.clone());
        }
    }
}
