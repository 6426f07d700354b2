//! Handles and plain data types exchanged with a graphics device
//!
//! Handles are slot-map keys issued by the device. They are only meaningful
//! to the device that created them.

use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Handle to a GPU buffer
    pub struct BufferId;
    /// Handle to a texture object
    pub struct TextureId;
    /// Handle to a renderbuffer
    pub struct RenderbufferId;
    /// Handle to a framebuffer object
    pub struct FramebufferId;
    /// Handle to a linked program
    pub struct ProgramId;
    /// Handle to a vertex array object
    pub struct VertexArrayId;
}

/// GLSL type codes as reported by program introspection
pub mod gl_type {
    /// `float`
    pub const FLOAT: u32 = 0x1406;
    /// `int`
    pub const INT: u32 = 0x1404;
    /// `bool`
    pub const BOOL: u32 = 0x8B56;
    /// `vec2`
    pub const FLOAT_VEC2: u32 = 0x8B50;
    /// `vec3`
    pub const FLOAT_VEC3: u32 = 0x8B51;
    /// `vec4`
    pub const FLOAT_VEC4: u32 = 0x8B52;
    /// `mat3`
    pub const FLOAT_MAT3: u32 = 0x8B5B;
    /// `mat4`
    pub const FLOAT_MAT4: u32 = 0x8B5C;
    /// `sampler2D`
    pub const SAMPLER_2D: u32 = 0x8B5E;
    /// `ivec2`, reported but not settable through this engine
    pub const INT_VEC2: u32 = 0x8B53;
}

/// Buffer binding targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data
    ElementArray,
    /// Uniform block storage
    Uniform,
}

/// Upload usage hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once, drawn many times
    StaticDraw,
    /// Rewritten often
    DynamicDraw,
}

/// Primitive topology for draw calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Independent triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Independent lines
    Lines,
    /// Points
    Points,
}

/// Texel formats for textures and renderbuffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalised RGBA
    Rgba8,
    /// Half-float RGBA
    Rgba16F,
    /// Float RGBA
    Rgba32F,
    /// 24-bit depth
    Depth24,
    /// 24-bit depth with 8-bit stencil
    Depth24Stencil8,
}

impl TextureFormat {
    /// Whether this is a depth (or depth-stencil) format
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth24 | Self::Depth24Stencil8)
    }

    /// Bytes one texel occupies in client memory
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Depth24 | Self::Depth24Stencil8 => 4,
            Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }
}

/// Size and format of a 2D image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Describe a `width` x `height` image
    pub const fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self { width, height, format }
    }

    /// Bytes of client pixel data a full upload needs
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel()
    }
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    #[default]
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    /// Tile
    #[default]
    Repeat,
    /// Clamp to the border texel
    ClampToEdge,
    /// Tile with mirroring
    MirroredRepeat,
}

/// Sampling parameters of a texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    /// Minification and magnification filter
    pub filter: TextureFilter,
    /// Wrapping on both axes
    pub wrap: TextureWrap,
}

impl SamplerParams {
    /// Linear filtering, clamped to edge: what screen-space passes use
    pub const SCREEN: Self = Self {
        filter: TextureFilter::Linear,
        wrap: TextureWrap::ClampToEdge,
    };
}

/// Framebuffer attachment points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    /// Colour attachment `n`
    Color(u32),
    /// Depth attachment
    Depth,
    /// Combined depth-stencil attachment
    DepthStencil,
}

/// Result of a framebuffer completeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Usable
    Complete,
    /// An attachment has the wrong kind of format for its point
    IncompleteAttachment,
    /// Nothing is attached
    MissingAttachment,
    /// Attachments disagree on size
    IncompleteDimensions,
    /// Valid but not supported by the implementation
    Unsupported,
}

bitflags! {
    /// Buffers cleared by `clear`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Colour buffers
        const COLOR = 0x4000;
        /// Depth buffer
        const DEPTH = 0x0100;
        /// Stencil buffer
        const STENCIL = 0x0400;
    }
}

/// Error codes the device latches in its error flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Argument out of range
    InvalidValue,
    /// Operation not allowed in the current state
    InvalidOperation,
    /// Draw or read on an incomplete framebuffer
    InvalidFramebufferOperation,
    /// Allocation failed
    OutOfMemory,
}

/// Shader stage, for compile diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

/// A uniform reported by program introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Fully qualified name (`material.diffuse`)
    pub name: String,
    /// GLSL type code, see [`gl_type`]
    pub gl_type: u32,
    /// Array length, 1 for scalars
    pub size: u32,
}

/// A uniform block reported by program introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniformBlock {
    /// Block name
    pub name: String,
    /// Index used by `uniform_block_binding`
    pub index: u32,
    /// Size of the block's std140 storage in bytes
    pub data_size: usize,
}

/// A vertex input reported by program introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    /// Attribute name
    pub name: String,
    /// GLSL type code
    pub gl_type: u32,
    /// Bound location
    pub location: u32,
}

/// Location of a uniform within one program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    /// Program the location belongs to
    pub program: ProgramId,
    /// Index among the program's active uniforms
    pub index: u32,
}

/// A value to upload to a uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `int` or sampler unit
    Int(i32),
    /// `bool`
    Bool(bool),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `mat3`, column-major
    Mat3([f32; 9]),
    /// `mat4`, column-major
    Mat4([f32; 16]),
}

/// Uniform types the engine can set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
    /// `sampler2D`, set with an `Int` unit
    Sampler2D,
}

impl UniformKind {
    /// Map an introspected type code, `None` if the engine cannot set it
    pub const fn from_gl_type(code: u32) -> Option<Self> {
        Some(match code {
            gl_type::FLOAT => Self::Float,
            gl_type::INT => Self::Int,
            gl_type::BOOL => Self::Bool,
            gl_type::FLOAT_VEC2 => Self::Vec2,
            gl_type::FLOAT_VEC3 => Self::Vec3,
            gl_type::FLOAT_VEC4 => Self::Vec4,
            gl_type::FLOAT_MAT3 => Self::Mat3,
            gl_type::FLOAT_MAT4 => Self::Mat4,
            gl_type::SAMPLER_2D => Self::Sampler2D,
            _ => return None,
        })
    }

    /// Whether `value` can be uploaded to a uniform of this kind
    pub const fn accepts(self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (Self::Float, UniformValue::Float(_))
                | (Self::Int | Self::Sampler2D, UniformValue::Int(_))
                | (Self::Bool, UniformValue::Bool(_) | UniformValue::Int(_))
                | (Self::Vec2, UniformValue::Vec2(_))
                | (Self::Vec3, UniformValue::Vec3(_))
                | (Self::Vec4, UniformValue::Vec4(_))
                | (Self::Mat3, UniformValue::Mat3(_))
                | (Self::Mat4, UniformValue::Mat4(_))
        )
    }
}

impl UniformValue {
    /// The uniform kind this value naturally targets
    pub const fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::Bool(_) => UniformKind::Bool,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Mat3(_) => UniformKind::Mat3,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_kind_from_gl_type() {
        assert_eq!(UniformKind::from_gl_type(gl_type::FLOAT_MAT4), Some(UniformKind::Mat4));
        assert_eq!(UniformKind::from_gl_type(gl_type::SAMPLER_2D), Some(UniformKind::Sampler2D));
        assert_eq!(UniformKind::from_gl_type(gl_type::INT_VEC2), None);
    }

    #[test]
    fn test_uniform_kind_accepts() {
        assert!(UniformKind::Sampler2D.accepts(&UniformValue::Int(1)));
        assert!(UniformKind::Bool.accepts(&UniformValue::Bool(true)));
        assert!(UniformKind::Bool.accepts(&UniformValue::Int(0)));
        assert!(!UniformKind::Vec3.accepts(&UniformValue::Vec4([0.0; 4])));
        assert!(!UniformKind::Float.accepts(&UniformValue::Int(1)));
    }

    #[test]
    fn test_texture_desc_byte_len() {
        assert_eq!(TextureDesc::new(4, 2, TextureFormat::Rgba8).byte_len(), 32);
        assert_eq!(TextureDesc::new(4, 2, TextureFormat::Rgba16F).byte_len(), 64);
        assert!(TextureFormat::Depth24Stencil8.is_depth());
    }
}
