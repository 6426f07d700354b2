//! Shared uniform block storage
//!
//! One buffer per binding point, shared by every program whose block is
//! bound there. A buffer is allocated on the first write, sized to the
//! writing program's block, and attached with `bind_buffer_base`.

use super::ShaderProgram;
use crate::render::api::{BufferId, BufferTarget, BufferUsage, GraphicsDevice};
use crate::render::resources::shader_program::binding_point;
use crate::render::{RenderError, RenderResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct UniformBuffer {
    buffer: BufferId,
    size: usize,
}

/// Buffers backing the well-known uniform blocks
#[derive(Debug, Default)]
pub struct UniformBuffers {
    buffers: HashMap<u32, UniformBuffer>,
}

impl UniformBuffers {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `data` to the start of `shader`'s block named `block`
    ///
    /// The rest of the block is zeroed, so nothing from a longer earlier
    /// write survives. Returns `Ok(false)` when the shader has no such block
    /// or the block has no binding point. Writing more than the block holds
    /// is an error.
    pub fn write(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shader: &ShaderProgram,
        block: &str,
        data: &[f32],
    ) -> RenderResult<bool> {
        let Some(info) = shader.uniform_block(block) else {
            log::trace!("{:?} shader has no uniform block `{}`", shader.kind(), block);
            return Ok(false);
        };
        let Some(binding) = binding_point(block) else {
            log::warn!("Uniform block `{}` has no binding point; write skipped", block);
            return Ok(false);
        };
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() > info.data_size {
            return Err(RenderError::UniformBlockOverflow {
                block: block.to_string(),
                size: bytes.len(),
                capacity: info.data_size,
            });
        }

        match self.buffers.get(&binding) {
            Some(existing) if existing.size >= info.data_size => {
                device.bind_buffer(BufferTarget::Uniform, Some(existing.buffer));
            }
            stale => {
                if let Some(stale) = stale.copied() {
                    device.delete_buffer(stale.buffer);
                }
                let buffer = device.create_buffer()?;
                device.bind_buffer(BufferTarget::Uniform, Some(buffer));
                device.buffer_data(BufferTarget::Uniform, &vec![0; info.data_size], BufferUsage::DynamicDraw);
                device.bind_buffer_base(binding, buffer);
                log::debug!(
                    "Allocated {} byte uniform buffer for `{}` at binding {}",
                    info.data_size,
                    block,
                    binding
                );
                self.buffers.insert(
                    binding,
                    UniformBuffer {
                        buffer,
                        size: info.data_size,
                    },
                );
            }
        }

        let mut block_data = vec![0; info.data_size];
        block_data[..bytes.len()].copy_from_slice(bytes);
        device.buffer_sub_data(BufferTarget::Uniform, 0, &block_data);
        Ok(true)
    }

    /// Buffer bound at `binding`, if one was allocated
    pub fn buffer(&self, binding: u32) -> Option<BufferId> {
        self.buffers.get(&binding).map(|entry| entry.buffer)
    }

    /// Delete every buffer
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, entry) in self.buffers.drain() {
            device.delete_buffer(entry.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::resources::{ShaderKind, LIGHT_SOURCES_BINDING, MATRIX_BINDING};
    use crate::render::HeadlessDevice;

    #[test]
    fn test_first_write_allocates_block_sized_buffer() {
        let mut device = HeadlessDevice::new(8, 8);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap();
        let mut buffers = UniformBuffers::new();

        assert!(buffers.write(&mut device, &shader, "Matrix", &[1.0; 32]).unwrap());
        let buffer = buffers.buffer(MATRIX_BINDING).unwrap();
        assert_eq!(device.buffer_contents(buffer).unwrap().len(), 128);
        assert_eq!(device.uniform_binding(MATRIX_BINDING), Some(buffer));

        // Second write reuses the buffer
        assert!(buffers.write(&mut device, &shader, "Matrix", &[2.0; 16]).unwrap());
        assert_eq!(buffers.buffer(MATRIX_BINDING), Some(buffer));
        assert_eq!(device.object_counts().buffers, 1);
    }

    #[test]
    fn test_short_write_zeroes_rest_of_block() {
        let mut device = HeadlessDevice::new(8, 8);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap();
        let mut buffers = UniformBuffers::new();

        buffers.write(&mut device, &shader, "LightSources", &[9.0; 32]).unwrap();
        buffers.write(&mut device, &shader, "LightSources", &[2.0; 8]).unwrap();

        let buffer = buffers.buffer(LIGHT_SOURCES_BINDING).unwrap();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(device.buffer_contents(buffer).unwrap());
        assert_eq!(floats.len(), 32);
        assert!(floats[..8].iter().all(|&value| value == 2.0));
        assert!(floats[8..].iter().all(|&value| value == 0.0));
    }

    #[test]
    fn test_missing_block_is_skipped() {
        let mut device = HeadlessDevice::new(8, 8);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Blur).unwrap();
        let mut buffers = UniformBuffers::new();
        assert!(!buffers.write(&mut device, &shader, "LightSources", &[0.0; 8]).unwrap());
        assert!(buffers.buffer(LIGHT_SOURCES_BINDING).is_none());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut device = HeadlessDevice::new(8, 8);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap();
        let mut buffers = UniformBuffers::new();
        let err = buffers
            .write(&mut device, &shader, "LightSources", &[0.0; 40])
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UniformBlockOverflow {
                block: "LightSources".to_string(),
                size: 160,
                capacity: 128,
            }
        );
    }
}
