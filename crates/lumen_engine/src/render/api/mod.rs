//! Graphics device API
//!
//! The trait the engine renders through and the value types it exchanges
//! with a device.

pub mod graphics_device;
pub mod types;

pub use graphics_device::{DeviceError, DeviceResult, GraphicsDevice};
pub use types::{
    gl_type, ActiveAttribute, ActiveUniform, ActiveUniformBlock, Attachment, BufferId,
    BufferTarget, BufferUsage, ClearFlags, ErrorCode, FramebufferId, FramebufferStatus, Primitive,
    ProgramId, RenderbufferId, SamplerParams, ShaderStage, TextureDesc, TextureFilter,
    TextureFormat, TextureId, TextureWrap, UniformKind, UniformLocation, UniformValue,
    VertexArrayId,
};
