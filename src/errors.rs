//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`AfterglowError`] covers the failure modes that can
//! surface while a pipeline is being *assembled*:
//! - Shader program lookup and linking failures
//! - Effect descriptor (material) uniform misuse
//! - Framebuffer / image-buffer construction errors
//! - GPU adapter and device acquisition
//! - Configuration and output I/O errors
//!
//! Frame execution itself never fails: [`Renderer::render`](crate::Renderer::render)
//! always submits every pass, and a pass whose inputs are missing degrades to
//! an empty image instead of returning an error.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, AfterglowError>`.
//!
//! ```rust,ignore
//! use afterglow::errors::{AfterglowError, Result};
//!
//! fn build() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::UniformType;

/// The main error type for the Afterglow engine.
#[derive(Error, Debug)]
pub enum AfterglowError {
    // ========================================================================
    // Shader & Program Errors
    // ========================================================================
    /// A shader source fragment could not be resolved by the shader library.
    #[error("Shader source not found: {0}")]
    ShaderNotFound(String),

    /// The ordered fragment list does not end in an entry kernel.
    #[error("Invalid shader source list: {0}")]
    InvalidShaderSource(String),

    // ========================================================================
    // Effect Descriptor Errors
    // ========================================================================
    /// The name is not a user-editable uniform of the descriptor's program.
    #[error("Unknown uniform `{name}` for program `{program}`")]
    UnknownUniform {
        /// Requested uniform name
        name: String,
        /// Name of the program the descriptor is bound to
        program: String,
    },

    /// The value type does not match the declared uniform type.
    #[error("Uniform `{name}` expects {expected:?}, got {found:?}")]
    UniformTypeMismatch {
        /// Uniform name
        name: String,
        /// Declared type
        expected: UniformType,
        /// Type of the supplied value
        found: UniformType,
    },

    // ========================================================================
    // Image Buffer Errors
    // ========================================================================
    /// Image buffers must have a non-zero extent.
    #[error("Invalid image extent {width}x{height}")]
    InvalidExtent {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Every attachment of a framebuffer must share one extent.
    #[error("Framebuffer `{label}`: attachment is {found:?}, expected {expected:?}")]
    AttachmentMismatch {
        /// Framebuffer label
        label: String,
        /// Extent of the first attachment
        expected: (u32, u32),
        /// Extent of the offending attachment
        found: (u32, u32),
    },

    /// A framebuffer was given more colour outputs than the device supports.
    #[error("Framebuffer `{label}` has {count} colour attachments (max {max})")]
    TooManyAttachments {
        /// Framebuffer label
        label: String,
        /// Requested number of colour attachments
        count: usize,
        /// Supported maximum
        max: usize,
    },

    /// A resource key does not refer to a live resource in the arena.
    #[error("Missing resource: {0}")]
    MissingResource(String),

    // ========================================================================
    // GPU Device Errors
    // ========================================================================
    /// No graphics adapter could be acquired.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// The adapter refused to create a logical device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    // ========================================================================
    // Configuration & I/O Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error.
    #[error("Image encode error: {0}")]
    ImageEncode(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for AfterglowError {
    fn from(err: image::ImageError) -> Self {
        AfterglowError::ImageEncode(err.to_string())
    }
}

/// Alias for `Result<T, AfterglowError>`.
pub type Result<T> = std::result::Result<T, AfterglowError>;
