//! Shader programs
//!
//! A [`ShaderProgram`] links a vertex/fragment pair and resolves its whole
//! interface once: every uniform gets a location and a [`UniformKind`], and
//! every uniform block is assigned its well-known binding point. Setting a
//! uniform the program does not declare is ignored, so one scene can drive
//! shader variants with different feature sets.

use crate::ecs::Component;
use crate::render::api::{
    ActiveUniformBlock, GraphicsDevice, ProgramId, UniformKind, UniformLocation, UniformValue,
};
use crate::render::shaders::{self, LIGHT_SOURCES_BLOCK, MATRIX_BLOCK};
use crate::render::{RenderError, RenderResult};
use std::collections::HashMap;

/// Binding point of the `Matrix` block
pub const MATRIX_BINDING: u32 = 0;

/// Binding point of the `LightSources` block
pub const LIGHT_SOURCES_BINDING: u32 = 1;

/// Binding point the engine assigns to a uniform block
pub fn binding_point(block: &str) -> Option<u32> {
    match block {
        MATRIX_BLOCK => Some(MATRIX_BINDING),
        LIGHT_SOURCES_BLOCK => Some(LIGHT_SOURCES_BINDING),
        _ => None,
    }
}

/// Which family a shader belongs to
///
/// All kinds share the single `ShaderProgram` component table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Textured Phong lighting
    Phong,
    /// Diffuse-only lighting
    Lambert,
    /// Texture times colour, no lighting
    Unlit,
    /// Separable Gaussian blur (screen space)
    Blur,
    /// HDR scene plus bloom with tone mapping (screen space)
    Composite,
}

/// GLSL source pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Vertex stage
    pub vertex: String,
    /// Fragment stage
    pub fragment: String,
}

impl ShaderSource {
    /// Pair two stages
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UniformSlot {
    location: UniformLocation,
    kind: UniformKind,
}

/// Linked program with its resolved interface
#[derive(Debug)]
pub struct ShaderProgram {
    kind: ShaderKind,
    program: ProgramId,
    uniforms: HashMap<String, UniformSlot>,
    blocks: HashMap<String, ActiveUniformBlock>,
    attributes: HashMap<String, u32>,
}

impl Component for ShaderProgram {}

impl ShaderProgram {
    /// Link `source` and resolve its interface
    ///
    /// Fails if the program does not link or declares a uniform type the
    /// engine cannot set.
    pub fn new(device: &mut dyn GraphicsDevice, kind: ShaderKind, source: &ShaderSource) -> RenderResult<Self> {
        let program = device.create_program(&source.vertex, &source.fragment)?;
        match Self::introspect(device, program) {
            Ok((uniforms, blocks, attributes)) => {
                log::debug!(
                    "Created {:?} shader: {} uniforms, {} blocks",
                    kind,
                    uniforms.len(),
                    blocks.len()
                );
                Ok(Self {
                    kind,
                    program,
                    uniforms,
                    blocks,
                    attributes,
                })
            }
            Err(err) => {
                device.delete_program(program);
                Err(err)
            }
        }
    }

    /// Link one of the built-in shaders
    pub fn builtin(device: &mut dyn GraphicsDevice, kind: ShaderKind) -> RenderResult<Self> {
        Self::new(device, kind, &shaders::source_for(kind))
    }

    #[allow(clippy::type_complexity)]
    fn introspect(
        device: &mut dyn GraphicsDevice,
        program: ProgramId,
    ) -> RenderResult<(
        HashMap<String, UniformSlot>,
        HashMap<String, ActiveUniformBlock>,
        HashMap<String, u32>,
    )> {
        let mut uniforms = HashMap::new();
        for uniform in device.active_uniforms(program)? {
            let kind = UniformKind::from_gl_type(uniform.gl_type).ok_or_else(|| {
                RenderError::UnsupportedUniformType {
                    name: uniform.name.clone(),
                    gl_type: uniform.gl_type,
                }
            })?;
            let Some(location) = device.uniform_location(program, &uniform.name) else {
                continue;
            };
            uniforms.insert(uniform.name, UniformSlot { location, kind });
        }

        let mut blocks = HashMap::new();
        for block in device.active_uniform_blocks(program)? {
            match binding_point(&block.name) {
                Some(binding) => device.uniform_block_binding(program, block.index, binding),
                None => log::warn!("Uniform block `{}` has no binding point; left unbound", block.name),
            }
            blocks.insert(block.name.clone(), block);
        }

        let attributes = device
            .active_attributes(program)?
            .into_iter()
            .map(|attribute| (attribute.name, attribute.location))
            .collect();

        Ok((uniforms, blocks, attributes))
    }

    /// Shader family
    pub const fn kind(&self) -> ShaderKind {
        self.kind
    }

    /// Device program handle
    pub const fn program(&self) -> ProgramId {
        self.program
    }

    /// Make this program current
    pub fn use_program(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(Some(self.program));
    }

    /// Set a uniform of this program, which must be current
    ///
    /// Returns `Ok(false)` when the program has no such uniform. A value of
    /// the wrong type is an error.
    pub fn set_uniform(&self, device: &mut dyn GraphicsDevice, name: &str, value: UniformValue) -> RenderResult<bool> {
        let Some(slot) = self.uniforms.get(name) else {
            log::trace!("{:?} shader has no uniform `{}`", self.kind, name);
            return Ok(false);
        };
        if !slot.kind.accepts(&value) {
            return Err(RenderError::UniformTypeMismatch {
                name: name.to_string(),
                expected: slot.kind,
                found: value.kind(),
            });
        }
        device.set_uniform(slot.location, value);
        Ok(true)
    }

    /// Declared kind of a uniform
    pub fn uniform_kind(&self, name: &str) -> Option<UniformKind> {
        self.uniforms.get(name).map(|slot| slot.kind)
    }

    /// Whether the program declares `name`
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    /// A uniform block of this program
    pub fn uniform_block(&self, name: &str) -> Option<&ActiveUniformBlock> {
        self.blocks.get(name)
    }

    /// Location of a vertex input
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Delete the device program
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn test_phong_interface() {
        let mut device = HeadlessDevice::new(64, 64);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap();

        assert_eq!(shader.uniform_kind("model_matrix"), Some(UniformKind::Mat4));
        assert_eq!(shader.uniform_kind("material.diffuse"), Some(UniformKind::Vec4));
        assert_eq!(shader.uniform_kind("texture_sampler"), Some(UniformKind::Sampler2D));
        assert_eq!(shader.attribute_location("normal"), Some(1));
        assert_eq!(shader.uniform_block(MATRIX_BLOCK).unwrap().data_size, 128);

        assert_eq!(
            device.uniform_block_binding_of(shader.program(), LIGHT_SOURCES_BLOCK),
            Some(LIGHT_SOURCES_BINDING)
        );
        assert_eq!(device.uniform_block_binding_of(shader.program(), MATRIX_BLOCK), Some(MATRIX_BINDING));
    }

    #[test]
    fn test_every_builtin_links() {
        let mut device = HeadlessDevice::new(64, 64);
        for kind in [
            ShaderKind::Phong,
            ShaderKind::Lambert,
            ShaderKind::Unlit,
            ShaderKind::Blur,
            ShaderKind::Composite,
        ] {
            let shader = ShaderProgram::builtin(&mut device, kind).unwrap();
            assert_eq!(shader.kind(), kind);
        }
        assert_eq!(device.object_counts().programs, 5);
    }

    #[test]
    fn test_unknown_uniform_is_ignored() {
        let mut device = HeadlessDevice::new(64, 64);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Lambert).unwrap();
        shader.use_program(&mut device);
        let set = shader
            .set_uniform(&mut device, "texture_sampler", UniformValue::Int(0))
            .unwrap();
        assert!(!set);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut device = HeadlessDevice::new(64, 64);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Composite).unwrap();
        shader.use_program(&mut device);
        let err = shader
            .set_uniform(&mut device, "exposure", UniformValue::Vec3([1.0; 3]))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UniformTypeMismatch {
                name: "exposure".to_string(),
                expected: UniformKind::Float,
                found: UniformKind::Vec3,
            }
        );
    }

    #[test]
    fn test_unsupported_uniform_type_fails_construction() {
        let mut device = HeadlessDevice::new(64, 64);
        let source = ShaderSource::new("uniform ivec2 grid; void main() {}", "void main() {}");
        let result = ShaderProgram::new(&mut device, ShaderKind::Unlit, &source);
        assert!(matches!(result, Err(RenderError::UnsupportedUniformType { .. })));
        assert_eq!(device.object_counts().programs, 0);
    }

    #[test]
    fn test_link_failure_is_reported() {
        let mut device = HeadlessDevice::new(64, 64);
        let source = ShaderSource::new("void main() {}", "uniform float x;");
        let result = ShaderProgram::new(&mut device, ShaderKind::Unlit, &source);
        assert!(matches!(result, Err(RenderError::Device(crate::render::DeviceError::Link(_)))));
    }
}
