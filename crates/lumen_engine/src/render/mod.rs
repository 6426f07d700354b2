//! # Rendering System
//!
//! Turns a scene into GPU work and runs the HDR bloom pipeline.
//!
//! ## Architecture
//!
//! - **Device API** ([`api`]): the WebGL2-shaped [`GraphicsDevice`] trait every
//!   other part renders through
//! - **Backends** ([`backends`]): device implementations
//! - **Resources** ([`resources`]): shader programs, meshes, textures,
//!   framebuffers and uniform buffers wrapping device objects
//! - **Render tasks** ([`render_task`]): the compiler from a scene graph to an
//!   ordered list of state changes and draws
//! - **Renderer** ([`renderer`]): owns the screen-space targets and executes
//!   the frame: geometry pass, blur, composite
//!
//! ## Error policy
//!
//! Everything here fails hard. Resource creation, framebuffer completeness,
//! uniform type resolution and the device error flag all surface as
//! [`RenderError`] and abort the operation.

pub mod api;
pub mod backends;
pub mod render_task;
pub mod renderer;
pub mod resources;
pub mod shaders;

pub use api::{DeviceError, GraphicsDevice};
pub use backends::HeadlessDevice;
pub use render_task::{RenderBundle, RenderContext, RenderTask, RenderTaskKind};
pub use renderer::Renderer;

use api::{ErrorCode, FramebufferStatus, UniformKind};
use thiserror::Error;

/// Rendering error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A device call failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// The device error flag was raised during a stage
    #[error("Device error flag {code:?} raised during {stage}")]
    DeviceFlag {
        /// Stage that was running
        stage: &'static str,
        /// Latched error
        code: ErrorCode,
    },

    /// A framebuffer failed its completeness check
    #[error("Framebuffer `{label}` is incomplete: {status:?}")]
    IncompleteFramebuffer {
        /// Which framebuffer
        label: &'static str,
        /// Reported status
        status: FramebufferStatus,
    },

    /// A program declares a uniform type the engine cannot set
    #[error("Uniform `{name}` has unsupported type 0x{gl_type:04X}")]
    UnsupportedUniformType {
        /// Uniform name
        name: String,
        /// GLSL type code
        gl_type: u32,
    },

    /// A value of the wrong type was set on a uniform
    #[error("Uniform `{name}` is {expected:?}, cannot set {found:?}")]
    UniformTypeMismatch {
        /// Uniform name
        name: String,
        /// Declared kind
        expected: UniformKind,
        /// Kind of the supplied value
        found: UniformKind,
    },

    /// More data was written to a uniform block than it holds
    #[error("Uniform block `{block}` holds {capacity} bytes, got {size}")]
    UniformBlockOverflow {
        /// Block name
        block: String,
        /// Bytes written
        size: usize,
        /// Block data size
        capacity: usize,
    },

    /// A light list is longer than the scene shaders' light array
    #[error("{count} lights given, shaders hold at most {max}")]
    TooManyLights {
        /// Lights in the list
        count: usize,
        /// Light array length
        max: usize,
    },

    /// A task that sets shader state ran before any shader was bound
    #[error("{0:?} task executed with no active shader")]
    NoActiveShader(RenderTaskKind),

    /// A constructor received unusable input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Fail with [`RenderError::DeviceFlag`] if the device raised its error flag
pub fn check_device(device: &mut dyn GraphicsDevice, stage: &'static str) -> RenderResult<()> {
    match device.take_error() {
        Some(code) => {
            log::error!("Device error {:?} during {}", code, stage);
            Err(RenderError::DeviceFlag { stage, code })
        }
        None => Ok(()),
    }
}
