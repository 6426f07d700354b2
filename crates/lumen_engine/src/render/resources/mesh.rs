//! Mesh data and GPU renderables
//!
//! [`MeshData`] is plain vertex data in client memory. [`Renderable`]
//! uploads it once and owns the resulting buffers and vertex array until it
//! is destroyed; after construction it only knows how to draw itself.

use crate::ecs::Component;
use crate::render::api::{
    BufferId, BufferTarget, BufferUsage, GraphicsDevice, Primitive, VertexArrayId,
};
use crate::render::{RenderError, RenderResult};

/// Attribute location of vertex positions
pub const POSITION_LOCATION: u32 = 0;
/// Attribute location of vertex normals
pub const NORMAL_LOCATION: u32 = 1;
/// Attribute location of texture coordinates
pub const TEXCOORD_LOCATION: u32 = 2;

/// Vertex data for one mesh
///
/// Normals and texture coordinates are optional but, when present, must
/// have one entry per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Positions
    pub positions: Vec<[f32; 3]>,
    /// Normals
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates
    pub texcoords: Vec<[f32; 2]>,
    /// Indices, empty for non-indexed drawing
    pub indices: Vec<u32>,
    /// Topology
    pub primitive: Primitive,
}

impl MeshData {
    /// Mesh from positions only
    pub fn new(positions: Vec<[f32; 3]>, primitive: Primitive) -> Self {
        Self {
            positions,
            primitive,
            ..Self::default()
        }
    }

    /// Add normals
    #[must_use]
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    /// Add texture coordinates
    #[must_use]
    pub fn with_texcoords(mut self, texcoords: Vec<[f32; 2]>) -> Self {
        self.texcoords = texcoords;
        self
    }

    /// Add indices
    #[must_use]
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check the attribute arrays agree with each other
    pub fn validate(&self) -> RenderResult<()> {
        let count = self.positions.len();
        if count == 0 {
            return Err(RenderError::InvalidArgument("mesh has no positions".to_string()));
        }
        if !self.normals.is_empty() && self.normals.len() != count {
            return Err(RenderError::InvalidArgument(format!(
                "mesh has {} normals for {} positions",
                self.normals.len(),
                count
            )));
        }
        if !self.texcoords.is_empty() && self.texcoords.len() != count {
            return Err(RenderError::InvalidArgument(format!(
                "mesh has {} texture coordinates for {} positions",
                self.texcoords.len(),
                count
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&index| index as usize >= count) {
            return Err(RenderError::InvalidArgument(format!(
                "mesh index {index} out of range for {count} vertices"
            )));
        }
        Ok(())
    }

    /// Axis-aligned cube centred at the origin with per-face normals
    ///
    /// 24 vertices (4 per face) and 36 indices, counter-clockwise winding
    /// when seen from outside.
    pub fn cube(half_extent: f32) -> Self {
        // (normal, tangent u, tangent v) per face
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

        let mut mesh = Self::new(Vec::with_capacity(24), Primitive::Triangles);
        for (face, (normal, u, v)) in FACES.iter().enumerate() {
            for corner in CORNERS {
                mesh.positions.push(std::array::from_fn(|axis| {
                    (normal[axis] + corner[0] * u[axis] + corner[1] * v[axis]) * half_extent
                }));
                mesh.normals.push(*normal);
                mesh.texcoords.push([(corner[0] + 1.0) * 0.5, (corner[1] + 1.0) * 0.5]);
            }
            let base = face as u32 * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Full-screen quad in clip space, drawn as a triangle strip
    pub fn screen_quad() -> Self {
        Self::new(
            vec![[-1.0, 1.0, 0.0], [-1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [1.0, -1.0, 0.0]],
            Primitive::TriangleStrip,
        )
        .with_texcoords(vec![[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]])
    }
}

/// Uploaded mesh
#[derive(Debug)]
pub struct Renderable {
    vertex_array: VertexArrayId,
    vertex_buffers: Vec<BufferId>,
    index_buffer: Option<BufferId>,
    count: u32,
    primitive: Primitive,
}

impl Component for Renderable {}

impl Renderable {
    /// Validate and upload `mesh`
    pub fn new(device: &mut dyn GraphicsDevice, mesh: &MeshData) -> RenderResult<Self> {
        mesh.validate()?;
        let count = if mesh.indices.is_empty() {
            mesh.positions.len()
        } else {
            mesh.indices.len()
        };
        let count = u32::try_from(count)
            .map_err(|_| RenderError::InvalidArgument(format!("mesh too large to draw: {count} elements")))?;

        let mut renderable = Self {
            vertex_array: device.create_vertex_array()?,
            vertex_buffers: Vec::with_capacity(3),
            index_buffer: None,
            count,
            primitive: mesh.primitive,
        };
        device.bind_vertex_array(Some(renderable.vertex_array));
        let uploaded = renderable.upload(device, mesh);
        device.bind_vertex_array(None);
        device.bind_buffer(BufferTarget::Array, None);
        if let Err(err) = uploaded {
            renderable.destroy(device);
            return Err(err);
        }

        log::trace!(
            "Uploaded mesh: {} vertices, {} buffers, indexed: {}",
            mesh.vertex_count(),
            renderable.vertex_buffers.len() + usize::from(renderable.index_buffer.is_some()),
            renderable.index_buffer.is_some()
        );
        Ok(renderable)
    }

    /// Fill the bound vertex array; buffers are recorded as they are created
    fn upload(&mut self, device: &mut dyn GraphicsDevice, mesh: &MeshData) -> RenderResult<()> {
        let attributes: [(u32, u32, &[u8]); 3] = [
            (POSITION_LOCATION, 3, bytemuck::cast_slice(&mesh.positions)),
            (NORMAL_LOCATION, 3, bytemuck::cast_slice(&mesh.normals)),
            (TEXCOORD_LOCATION, 2, bytemuck::cast_slice(&mesh.texcoords)),
        ];
        for (location, components, bytes) in attributes {
            if bytes.is_empty() {
                continue;
            }
            let buffer = device.create_buffer()?;
            self.vertex_buffers.push(buffer);
            device.bind_buffer(BufferTarget::Array, Some(buffer));
            device.buffer_data(BufferTarget::Array, bytes, BufferUsage::StaticDraw);
            device.enable_vertex_attrib(location);
            device.vertex_attrib_pointer(location, components, 0, 0);
        }

        if !mesh.indices.is_empty() {
            let buffer = device.create_buffer()?;
            self.index_buffer = Some(buffer);
            device.bind_buffer(BufferTarget::ElementArray, Some(buffer));
            device.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(&mesh.indices),
                BufferUsage::StaticDraw,
            );
        }
        Ok(())
    }

    /// Full-screen quad for screen-space passes
    pub fn screen_quad(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        Self::new(device, &MeshData::screen_quad())
    }

    /// Issue the draw call
    pub fn draw(&self, device: &mut dyn GraphicsDevice) {
        device.bind_vertex_array(Some(self.vertex_array));
        if self.index_buffer.is_some() {
            device.draw_elements(self.primitive, self.count, 0);
        } else {
            device.draw_arrays(self.primitive, 0, self.count);
        }
        device.bind_vertex_array(None);
    }

    /// Vertices or indices drawn per call
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Whether drawing uses indices
    pub const fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Delete the device objects
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        for buffer in self.vertex_buffers {
            device.delete_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer {
            device.delete_buffer(buffer);
        }
        device.delete_vertex_array(self.vertex_array);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::{DeviceCommand, HeadlessDevice, ObjectCounts};
    use crate::render::resources::{ShaderKind, ShaderProgram};

    #[test]
    fn test_cube_layout() {
        let cube = MeshData::cube(0.5);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
        cube.validate().unwrap();
        for (position, normal) in cube.positions.iter().zip(&cube.normals) {
            // Each vertex lies on the face its normal points out of
            let along: f32 = (0..3).map(|axis| position[axis] * normal[axis]).sum();
            assert!((along - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_validation_rejects_bad_meshes() {
        assert!(MeshData::default().validate().is_err());

        let mismatched = MeshData::new(vec![[0.0; 3]; 3], Primitive::Triangles).with_normals(vec![[0.0; 3]; 2]);
        assert!(mismatched.validate().is_err());

        let bad_index = MeshData::new(vec![[0.0; 3]; 3], Primitive::Triangles).with_indices(vec![0, 1, 3]);
        assert!(matches!(bad_index.validate(), Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn test_indexed_draw() {
        let mut device = HeadlessDevice::new(8, 8);
        let shader = ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap();
        let cube = Renderable::new(&mut device, &MeshData::cube(1.0)).unwrap();
        assert!(cube.is_indexed());

        shader.use_program(&mut device);
        cube.draw(&mut device);
        assert_eq!(device.take_error(), None);

        let draws: Vec<_> = device.draw_calls().cloned().collect();
        assert_eq!(
            draws,
            vec![DeviceCommand::Draw {
                program: shader.program(),
                framebuffer: None,
                primitive: Primitive::Triangles,
                count: 36,
                indexed: true,
            }]
        );
    }

    #[test]
    fn test_screen_quad_is_a_strip() {
        let mut device = HeadlessDevice::new(8, 8);
        let quad = Renderable::screen_quad(&mut device).unwrap();
        assert!(!quad.is_indexed());
        assert_eq!(quad.count(), 4);
        // Positions and texture coordinates only
        assert_eq!(device.object_counts().buffers, 2);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut device = HeadlessDevice::new(8, 8);
        let cube = Renderable::new(&mut device, &MeshData::cube(1.0)).unwrap();
        assert_eq!(device.object_counts().buffers, 4);
        cube.destroy(&mut device);
        assert_eq!(device.object_counts(), ObjectCounts::default());
    }

    #[test]
    fn test_failed_upload_deletes_partial_objects() {
        let mut device = HeadlessDevice::new(8, 8);
        // The cube needs a vertex array, three attribute buffers and an index buffer
        for limit in 1..5 {
            device.set_object_limit(Some(limit));
            let result = Renderable::new(&mut device, &MeshData::cube(1.0));
            assert!(matches!(
                result,
                Err(RenderError::Device(crate::render::DeviceError::ObjectLimit("buffer")))
            ));
            assert_eq!(device.object_counts(), ObjectCounts::default());
        }
        device.set_object_limit(Some(5));
        assert!(Renderable::new(&mut device, &MeshData::cube(1.0)).is_ok());
    }
}
