//! Graphics device abstraction
//!
//! A thin, WebGL2-shaped interface the renderer and resource wrappers are
//! written against. Object creation and program linking report failures
//! through [`DeviceResult`]; state changes latch an [`ErrorCode`] in the
//! device's error flag instead, which callers poll with
//! [`GraphicsDevice::take_error`] after each stage.

use super::types::{
    ActiveAttribute, ActiveUniform, ActiveUniformBlock, Attachment, BufferId, BufferTarget,
    BufferUsage, ClearFlags, ErrorCode, FramebufferId, FramebufferStatus, Primitive, ProgramId,
    RenderbufferId, SamplerParams, ShaderStage, TextureDesc, TextureFormat, TextureId,
    UniformLocation, UniformValue, VertexArrayId,
};
use thiserror::Error;

/// Errors reported directly by device calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A shader stage failed to compile
    #[error("Failed to compile {stage} shader: {log}")]
    Compile {
        /// Failing stage
        stage: ShaderStage,
        /// Compiler info log
        log: String,
    },

    /// The program failed to link
    #[error("Failed to link program: {0}")]
    Link(String),

    /// A handle does not name a live object of this device
    #[error("Unknown {0} handle")]
    UnknownHandle(&'static str),

    /// Pixel data does not match the described image
    #[error("Pixel data is {actual} bytes, expected {expected}")]
    PixelDataSize {
        /// Bytes the description requires
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// A texture image exceeds the device's size limit
    #[error("Texture of {width}x{height} exceeds the {max} pixel limit")]
    TextureTooLarge {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Largest supported side
        max: u32,
    },

    /// The device cannot create another object of this kind
    #[error("Could not create {0}: object limit reached")]
    ObjectLimit(&'static str),

    /// The error flag was raised by an earlier call
    #[error("Device error flag raised: {0:?}")]
    Flagged(ErrorCode),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// WebGL2-shaped graphics device
///
/// Object safe; the renderer holds a `Box<dyn GraphicsDevice>`.
pub trait GraphicsDevice {
    // === Canvas ===

    /// Size of the default framebuffer's backing store
    fn canvas_size(&self) -> (u32, u32);

    /// Size the canvas is displayed at
    fn client_size(&self) -> (u32, u32);

    /// Resize the default framebuffer's backing store
    fn set_canvas_size(&mut self, width: u32, height: u32);

    // === Buffers ===

    /// Create an empty buffer
    fn create_buffer(&mut self) -> DeviceResult<BufferId>;

    /// Bind `buffer` to `target`, `None` unbinds
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);

    /// Replace the storage of the buffer bound to `target`
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);

    /// Overwrite part of the storage of the buffer bound to `target`
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    /// Bind `buffer` to an indexed uniform binding point
    fn bind_buffer_base(&mut self, binding: u32, buffer: BufferId);

    /// Delete a buffer
    fn delete_buffer(&mut self, buffer: BufferId);

    // === Vertex arrays ===

    /// Create a vertex array object
    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayId>;

    /// Bind a vertex array, `None` unbinds
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    /// Enable attribute `location` on the bound vertex array
    fn enable_vertex_attrib(&mut self, location: u32);

    /// Source attribute `location` from the bound array buffer as floats
    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: usize, offset: usize);

    /// Delete a vertex array
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    // === Programs ===

    /// Compile both stages, attach them and link
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> DeviceResult<ProgramId>;

    /// Make `program` current, `None` unbinds
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Delete a program
    fn delete_program(&mut self, program: ProgramId);

    /// Active uniforms of a linked program
    fn active_uniforms(&self, program: ProgramId) -> DeviceResult<Vec<ActiveUniform>>;

    /// Active uniform blocks of a linked program
    fn active_uniform_blocks(&self, program: ProgramId) -> DeviceResult<Vec<ActiveUniformBlock>>;

    /// Active vertex inputs of a linked program
    fn active_attributes(&self, program: ProgramId) -> DeviceResult<Vec<ActiveAttribute>>;

    /// Location of a named uniform, `None` if the program has no such uniform
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Upload a uniform of the current program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Assign uniform block `block_index` of `program` to a binding point
    fn uniform_block_binding(&mut self, program: ProgramId, block_index: u32, binding: u32);

    // === Textures and renderbuffers ===

    /// Create a texture object
    fn create_texture(&mut self) -> DeviceResult<TextureId>;

    /// Allocate the bound texture's storage, optionally uploading pixels
    fn tex_image_2d(&mut self, desc: TextureDesc, pixels: Option<&[u8]>) -> DeviceResult<()>;

    /// Set sampling parameters of the bound texture
    fn tex_parameters(&mut self, params: SamplerParams);

    /// Select the texture unit later binds apply to
    fn active_texture(&mut self, unit: u32);

    /// Bind a texture to the active unit, `None` unbinds
    fn bind_texture(&mut self, texture: Option<TextureId>);

    /// Delete a texture
    fn delete_texture(&mut self, texture: TextureId);

    /// Create a renderbuffer
    fn create_renderbuffer(&mut self) -> DeviceResult<RenderbufferId>;

    /// Allocate storage for a renderbuffer
    fn renderbuffer_storage(&mut self, renderbuffer: RenderbufferId, format: TextureFormat, width: u32, height: u32);

    /// Delete a renderbuffer
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    // === Framebuffers ===

    /// Create a framebuffer object
    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferId>;

    /// Bind a framebuffer, `None` selects the default framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Attach a texture to the bound framebuffer
    fn framebuffer_texture_2d(&mut self, attachment: Attachment, texture: TextureId);

    /// Attach a renderbuffer to the bound framebuffer
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: RenderbufferId);

    /// Select the colour attachments fragment outputs write to
    fn draw_buffers(&mut self, attachments: &[Attachment]);

    /// Completeness of the bound framebuffer
    fn check_framebuffer_status(&self) -> FramebufferStatus;

    /// Delete a framebuffer
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    // === State and drawing ===

    /// Set the viewport rectangle
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Set the clear colour
    fn clear_color(&mut self, color: [f32; 4]);

    /// Clear buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags);

    /// Enable or disable depth testing
    fn enable_depth_test(&mut self, enabled: bool);

    /// Draw `count` vertices from the bound vertex array
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    /// Draw `count` `u32` indices from the bound element buffer
    fn draw_elements(&mut self, primitive: Primitive, count: u32, offset: usize);

    // === Diagnostics ===

    /// Take and reset the error flag
    fn take_error(&mut self) -> Option<ErrorCode>;

    /// Downcast to the concrete device
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to the concrete device, mutably
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
