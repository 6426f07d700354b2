//! Device-backed resources
//!
//! Each wrapper owns its device objects and releases them in `destroy`.
//! Shader programs, meshes and textures double as scene components.

pub mod framebuffer;
pub mod mesh;
pub mod shader_program;
pub mod texture;
pub mod uniform_buffer;

pub use framebuffer::Framebuffer;
pub use mesh::{MeshData, Renderable, NORMAL_LOCATION, POSITION_LOCATION, TEXCOORD_LOCATION};
pub use shader_program::{
    binding_point, ShaderKind, ShaderProgram, ShaderSource, LIGHT_SOURCES_BINDING, MATRIX_BINDING,
};
pub use texture::{AttachmentKind, ScreenTarget, Texture2D};
pub use uniform_buffer::UniformBuffers;
