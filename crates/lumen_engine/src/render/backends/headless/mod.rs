//! Headless graphics device
//!
//! Implements [`GraphicsDevice`] without a GPU. Objects live in slot maps,
//! program interfaces come from scanning the GLSL sources, framebuffer
//! completeness is validated from the attached images, and every state
//! change and draw is appended to a [`DeviceCommand`] log that tests and
//! tools can inspect.

mod glsl;

use crate::render::api::{
    ActiveAttribute, ActiveUniform, ActiveUniformBlock, Attachment, BufferId, BufferTarget,
    BufferUsage, ClearFlags, DeviceError, DeviceResult, ErrorCode, FramebufferId,
    FramebufferStatus, GraphicsDevice, Primitive, ProgramId, RenderbufferId, SamplerParams,
    ShaderStage, TextureDesc, TextureFormat, TextureId, UniformKind, UniformLocation,
    UniformValue, VertexArrayId,
};
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// `use_program`
    UseProgram(Option<ProgramId>),
    /// A successful `set_uniform`
    SetUniform {
        /// Program the uniform belongs to
        program: ProgramId,
        /// Uniform name
        name: String,
        /// Uploaded value
        value: UniformValue,
    },
    /// `bind_framebuffer`
    BindFramebuffer(Option<FramebufferId>),
    /// `clear`
    Clear {
        /// Framebuffer bound at the time
        framebuffer: Option<FramebufferId>,
        /// Cleared buffers
        flags: ClearFlags,
    },
    /// `active_texture`
    ActiveTexture(u32),
    /// `bind_texture`
    BindTexture {
        /// Active unit at the time
        unit: u32,
        /// Bound texture
        texture: Option<TextureId>,
    },
    /// `buffer_data` or `buffer_sub_data`
    BufferData {
        /// Buffer written
        buffer: BufferId,
        /// Byte offset of the write
        offset: usize,
        /// Bytes written
        data: Vec<u8>,
    },
    /// `bind_buffer_base`
    BindBufferBase {
        /// Uniform binding point
        binding: u32,
        /// Buffer bound
        buffer: BufferId,
    },
    /// `viewport`
    Viewport {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// A successful draw call
    Draw {
        /// Program in use
        program: ProgramId,
        /// Target framebuffer
        framebuffer: Option<FramebufferId>,
        /// Topology
        primitive: Primitive,
        /// Vertex or index count
        count: u32,
        /// Whether indices were used
        indexed: bool,
    },
}

impl DeviceCommand {
    /// Written bytes reinterpreted as floats, for buffer writes
    pub fn data_as_f32(&self) -> Option<Vec<f32>> {
        match self {
            Self::BufferData { data, .. } if data.len() % 4 == 0 => Some(bytemuck::pod_collect_to_vec(data.as_slice())),
            _ => None,
        }
    }
}

/// Live object counts, for leak checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    /// Buffers
    pub buffers: usize,
    /// Vertex arrays
    pub vertex_arrays: usize,
    /// Programs
    pub programs: usize,
    /// Textures
    pub textures: usize,
    /// Renderbuffers
    pub renderbuffers: usize,
    /// Framebuffers
    pub framebuffers: usize,
}

#[derive(Debug, Default)]
struct BufferObject {
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    enabled: Vec<u32>,
    element_buffer: Option<BufferId>,
}

#[derive(Debug)]
struct ProgramObject {
    uniforms: Vec<ActiveUniform>,
    blocks: Vec<ActiveUniformBlock>,
    attributes: Vec<ActiveAttribute>,
    block_bindings: HashMap<u32, u32>,
    values: HashMap<u32, UniformValue>,
}

#[derive(Debug, Default)]
struct TextureObject {
    desc: Option<TextureDesc>,
    params: SamplerParams,
}

#[derive(Debug, Default)]
struct RenderbufferObject {
    desc: Option<TextureDesc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachedImage {
    Texture(TextureId),
    Renderbuffer(RenderbufferId),
}

#[derive(Debug, Default)]
struct FramebufferObject {
    attachments: BTreeMap<Attachment, AttachedImage>,
    draw_buffers: Vec<Attachment>,
}

/// Largest texture side the headless device accepts
pub const MAX_TEXTURE_SIZE: u32 = 4096;

/// Commands kept by a new [`HeadlessDevice`] before the oldest are dropped
pub const DEFAULT_COMMAND_LIMIT: usize = 1 << 16;

/// Bounded command history
#[derive(Debug)]
struct CommandLog {
    commands: Vec<DeviceCommand>,
    limit: usize,
    dropped: u64,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            limit: DEFAULT_COMMAND_LIMIT,
            dropped: 0,
        }
    }
}

impl CommandLog {
    fn push(&mut self, command: DeviceCommand) {
        if self.limit == 0 {
            self.dropped += 1;
            return;
        }
        if self.commands.len() >= self.limit {
            // Drop the older half at once so pushes stay amortised O(1)
            let stale = (self.commands.len() / 2).max(1);
            self.commands.drain(..stale);
            if self.dropped == 0 {
                log::warn!(
                    "Headless command log reached {} entries; dropping the oldest",
                    self.limit
                );
            }
            self.dropped += stale as u64;
        }
        self.commands.push(command);
    }

    fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        if self.commands.len() > limit {
            let stale = self.commands.len() - limit;
            self.commands.drain(..stale);
            self.dropped += stale as u64;
        }
    }
}

/// GPU-less [`GraphicsDevice`] that records what it is asked to do
///
/// The command log keeps at most [`DEFAULT_COMMAND_LIMIT`] entries unless
/// changed with [`set_command_limit`](Self::set_command_limit). Long-running
/// hosts should drain it with [`take_commands`](Self::take_commands).
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    canvas_size: (u32, u32),
    client_size: (u32, u32),

    buffers: SlotMap<BufferId, BufferObject>,
    vertex_arrays: SlotMap<VertexArrayId, VertexArrayObject>,
    programs: SlotMap<ProgramId, ProgramObject>,
    textures: SlotMap<TextureId, TextureObject>,
    renderbuffers: SlotMap<RenderbufferId, RenderbufferObject>,
    framebuffers: SlotMap<FramebufferId, FramebufferObject>,

    bound_buffers: HashMap<BufferTarget, BufferId>,
    uniform_bindings: HashMap<u32, BufferId>,
    bound_vertex_array: Option<VertexArrayId>,
    current_program: Option<ProgramId>,
    bound_framebuffer: Option<FramebufferId>,
    active_unit: u32,
    texture_units: HashMap<u32, TextureId>,
    clear_color: [f32; 4],
    depth_test: bool,

    error: Option<ErrorCode>,
    commands: CommandLog,
    object_limit: Option<usize>,
}

impl HeadlessDevice {
    /// Create a device whose canvas is `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas_size: (width, height),
            client_size: (width, height),
            ..Self::default()
        }
    }

    /// Simulate the canvas being displayed at a new size
    pub fn set_client_size(&mut self, width: u32, height: u32) {
        self.client_size = (width, height);
    }

    /// Every recorded command, oldest first
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands.commands)
    }

    /// Fail object creation once this many buffers, vertex arrays,
    /// textures, renderbuffers and framebuffers are alive together
    pub fn set_object_limit(&mut self, limit: Option<usize>) {
        self.object_limit = limit;
    }

    /// Keep at most `limit` commands; `0` turns recording off
    pub fn set_command_limit(&mut self, limit: usize) {
        self.commands.set_limit(limit);
    }

    /// Commands discarded because the log was full or off
    pub const fn dropped_commands(&self) -> u64 {
        self.commands.dropped
    }

    /// Recorded draw calls
    pub fn draw_calls(&self) -> impl Iterator<Item = &DeviceCommand> + '_ {
        self.commands
            .commands
            .iter()
            .filter(|command| matches!(command, DeviceCommand::Draw { .. }))
    }

    /// Last value uploaded to a uniform, by name
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let object = self.programs.get(program)?;
        let index = object.uniforms.iter().position(|u| u.name == name)?;
        object.values.get(&u32::try_from(index).ok()?).copied()
    }

    /// Binding point a program's uniform block was assigned
    pub fn uniform_block_binding_of(&self, program: ProgramId, block: &str) -> Option<u32> {
        let object = self.programs.get(program)?;
        let block = object.blocks.iter().find(|b| b.name == block)?;
        object.block_bindings.get(&block.index).copied()
    }

    /// Current contents of a buffer
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|object| object.data.as_slice())
    }

    /// Buffer bound to a uniform binding point
    pub fn uniform_binding(&self, binding: u32) -> Option<BufferId> {
        self.uniform_bindings.get(&binding).copied()
    }

    /// Storage description of a texture
    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).and_then(|object| object.desc)
    }

    /// Sampling parameters of a texture
    pub fn texture_params(&self, texture: TextureId) -> Option<SamplerParams> {
        self.textures.get(texture).map(|object| object.params)
    }

    /// Storage description of a renderbuffer
    pub fn renderbuffer_desc(&self, renderbuffer: RenderbufferId) -> Option<TextureDesc> {
        self.renderbuffers.get(renderbuffer).and_then(|object| object.desc)
    }

    /// Texture bound to `unit`
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    /// Program in use
    pub const fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    /// Bound framebuffer, `None` for the default one
    pub const fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound_framebuffer
    }

    /// Current clear colour
    pub const fn current_clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Whether depth testing is enabled
    pub const fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    /// Number of live objects of each kind
    pub fn object_counts(&self) -> ObjectCounts {
        ObjectCounts {
            buffers: self.buffers.len(),
            vertex_arrays: self.vertex_arrays.len(),
            programs: self.programs.len(),
            textures: self.textures.len(),
            renderbuffers: self.renderbuffers.len(),
            framebuffers: self.framebuffers.len(),
        }
    }

    fn reserve(&self, kind: &'static str) -> DeviceResult<()> {
        let counts = self.object_counts();
        let live = counts.buffers
            + counts.vertex_arrays
            + counts.textures
            + counts.renderbuffers
            + counts.framebuffers;
        match self.object_limit {
            Some(limit) if live >= limit => Err(DeviceError::ObjectLimit(kind)),
            _ => Ok(()),
        }
    }

    fn raise(&mut self, code: ErrorCode, context: &str) {
        log::debug!("Headless device error {:?}: {}", code, context);
        // The first error sticks until it is taken
        self.error.get_or_insert(code);
    }

    fn image_desc(&self, image: AttachedImage) -> Option<TextureDesc> {
        match image {
            AttachedImage::Texture(id) => self.textures.get(id).and_then(|t| t.desc),
            AttachedImage::Renderbuffer(id) => self.renderbuffers.get(id).and_then(|r| r.desc),
        }
    }

    fn framebuffer_status(&self, framebuffer: &FramebufferObject) -> FramebufferStatus {
        if framebuffer.attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size = None;
        for (&attachment, &image) in &framebuffer.attachments {
            let Some(desc) = self.image_desc(image) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            let wants_depth = !matches!(attachment, Attachment::Color(_));
            if wants_depth != desc.format.is_depth() {
                return FramebufferStatus::IncompleteAttachment;
            }
            if attachment == Attachment::DepthStencil && desc.format != TextureFormat::Depth24Stencil8 {
                return FramebufferStatus::IncompleteAttachment;
            }
            match size {
                None => size = Some((desc.width, desc.height)),
                Some(existing) if existing != (desc.width, desc.height) => {
                    return FramebufferStatus::IncompleteDimensions;
                }
                Some(_) => {}
            }
        }

        let draw_buffers_attached = framebuffer
            .draw_buffers
            .iter()
            .all(|attachment| framebuffer.attachments.contains_key(attachment));
        if draw_buffers_attached {
            FramebufferStatus::Complete
        } else {
            FramebufferStatus::IncompleteAttachment
        }
    }

    fn bound_framebuffer_object(&mut self) -> Option<&mut FramebufferObject> {
        let id = self.bound_framebuffer?;
        self.framebuffers.get_mut(id)
    }

    fn attach(&mut self, attachment: Attachment, image: AttachedImage) {
        match self.bound_framebuffer_object() {
            Some(framebuffer) => {
                framebuffer.attachments.insert(attachment, image);
            }
            None => self.raise(ErrorCode::InvalidOperation, "attach to the default framebuffer"),
        }
    }

    fn link(vertex: glsl::StageInterface, fragment: glsl::StageInterface) -> DeviceResult<ProgramObject> {
        if !vertex.has_main {
            return Err(DeviceError::Link("vertex shader does not define main()".to_string()));
        }
        if !fragment.has_main {
            return Err(DeviceError::Link("fragment shader does not define main()".to_string()));
        }

        let mut uniforms: Vec<ActiveUniform> = Vec::new();
        for uniform in vertex.uniforms.into_iter().chain(fragment.uniforms) {
            match uniforms.iter().find(|existing| existing.name == uniform.name) {
                Some(existing) if existing.gl_type != uniform.gl_type => {
                    return Err(DeviceError::Link(format!(
                        "uniform `{}` declared with different types",
                        uniform.name
                    )));
                }
                Some(_) => {}
                None => uniforms.push(uniform),
            }
        }

        let mut blocks: Vec<ActiveUniformBlock> = Vec::new();
        for block in vertex.blocks.into_iter().chain(fragment.blocks) {
            match blocks.iter().find(|existing| existing.name == block.name) {
                Some(existing) if existing.data_size != block.data_size => {
                    return Err(DeviceError::Link(format!(
                        "uniform block `{}` declared with different layouts",
                        block.name
                    )));
                }
                Some(_) => {}
                None => {
                    let index = u32::try_from(blocks.len())
                        .map_err(|_| DeviceError::Link("too many uniform blocks".to_string()))?;
                    blocks.push(ActiveUniformBlock { index, ..block });
                }
            }
        }

        Ok(ProgramObject {
            uniforms,
            blocks,
            attributes: vertex.inputs,
            block_bindings: HashMap::new(),
            values: HashMap::new(),
        })
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    fn client_size(&self) -> (u32, u32) {
        self.client_size
    }

    fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas_size = (width, height);
    }

    fn create_buffer(&mut self) -> DeviceResult<BufferId> {
        self.reserve("buffer")?;
        Ok(self.buffers.insert(BufferObject::default()))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        match buffer {
            Some(id) if !self.buffers.contains_key(id) => {
                self.raise(ErrorCode::InvalidOperation, "bind of a deleted buffer");
                return;
            }
            Some(id) => {
                self.bound_buffers.insert(target, id);
            }
            None => {
                self.bound_buffers.remove(&target);
            }
        }
        if target == BufferTarget::ElementArray {
            if let Some(vertex_array) = self.bound_vertex_array.and_then(|id| self.vertex_arrays.get_mut(id)) {
                vertex_array.element_buffer = buffer;
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], _usage: BufferUsage) {
        let Some(&id) = self.bound_buffers.get(&target) else {
            self.raise(ErrorCode::InvalidOperation, "buffer_data with no buffer bound");
            return;
        };
        if let Some(buffer) = self.buffers.get_mut(id) {
            buffer.data = data.to_vec();
        }
        self.commands.push(DeviceCommand::BufferData {
            buffer: id,
            offset: 0,
            data: data.to_vec(),
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let Some(&id) = self.bound_buffers.get(&target) else {
            self.raise(ErrorCode::InvalidOperation, "buffer_sub_data with no buffer bound");
            return;
        };
        let Some(buffer) = self.buffers.get_mut(id) else {
            return;
        };
        if offset + data.len() > buffer.data.len() {
            self.raise(ErrorCode::InvalidValue, "buffer_sub_data past the end of the buffer");
            return;
        }
        buffer.data[offset..offset + data.len()].copy_from_slice(data);
        self.commands.push(DeviceCommand::BufferData {
            buffer: id,
            offset,
            data: data.to_vec(),
        });
    }

    fn bind_buffer_base(&mut self, binding: u32, buffer: BufferId) {
        if !self.buffers.contains_key(buffer) {
            self.raise(ErrorCode::InvalidOperation, "bind_buffer_base of a deleted buffer");
            return;
        }
        self.uniform_bindings.insert(binding, buffer);
        self.bound_buffers.insert(BufferTarget::Uniform, buffer);
        self.commands.push(DeviceCommand::BindBufferBase { binding, buffer });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(buffer);
        self.bound_buffers.retain(|_, bound| *bound != buffer);
        self.uniform_bindings.retain(|_, bound| *bound != buffer);
    }

    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayId> {
        self.reserve("vertex array")?;
        Ok(self.vertex_arrays.insert(VertexArrayObject::default()))
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        match vertex_array {
            Some(id) => match self.vertex_arrays.get(id) {
                Some(object) => {
                    self.bound_vertex_array = Some(id);
                    match object.element_buffer {
                        Some(element_buffer) => {
                            self.bound_buffers.insert(BufferTarget::ElementArray, element_buffer);
                        }
                        None => {
                            self.bound_buffers.remove(&BufferTarget::ElementArray);
                        }
                    }
                }
                None => self.raise(ErrorCode::InvalidOperation, "bind of a deleted vertex array"),
            },
            None => {
                self.bound_vertex_array = None;
                self.bound_buffers.remove(&BufferTarget::ElementArray);
            }
        }
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        match self.bound_vertex_array.and_then(|id| self.vertex_arrays.get_mut(id)) {
            Some(vertex_array) => {
                if !vertex_array.enabled.contains(&location) {
                    vertex_array.enabled.push(location);
                }
            }
            None => self.raise(ErrorCode::InvalidOperation, "enable_vertex_attrib with no vertex array"),
        }
    }

    fn vertex_attrib_pointer(&mut self, _location: u32, components: u32, _stride: usize, _offset: usize) {
        if !(1..=4).contains(&components) {
            self.raise(ErrorCode::InvalidValue, "vertex attribute component count");
        } else if !self.bound_buffers.contains_key(&BufferTarget::Array) {
            self.raise(ErrorCode::InvalidOperation, "vertex_attrib_pointer with no array buffer");
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(vertex_array);
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> DeviceResult<ProgramId> {
        let vertex = glsl::scan(vertex_source).map_err(|log| DeviceError::Compile {
            stage: ShaderStage::Vertex,
            log,
        })?;
        let fragment = glsl::scan(fragment_source).map_err(|log| DeviceError::Compile {
            stage: ShaderStage::Fragment,
            log,
        })?;
        let program = Self::link(vertex, fragment)?;
        log::trace!(
            "Linked headless program: {} uniforms, {} blocks, {} attributes",
            program.uniforms.len(),
            program.blocks.len(),
            program.attributes.len()
        );
        Ok(self.programs.insert(program))
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if let Some(id) = program {
            if !self.programs.contains_key(id) {
                self.raise(ErrorCode::InvalidOperation, "use of a deleted program");
                return;
            }
        }
        self.current_program = program;
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn active_uniforms(&self, program: ProgramId) -> DeviceResult<Vec<ActiveUniform>> {
        self.programs
            .get(program)
            .map(|object| object.uniforms.clone())
            .ok_or(DeviceError::UnknownHandle("program"))
    }

    fn active_uniform_blocks(&self, program: ProgramId) -> DeviceResult<Vec<ActiveUniformBlock>> {
        self.programs
            .get(program)
            .map(|object| object.blocks.clone())
            .ok_or(DeviceError::UnknownHandle("program"))
    }

    fn active_attributes(&self, program: ProgramId) -> DeviceResult<Vec<ActiveAttribute>> {
        self.programs
            .get(program)
            .map(|object| object.attributes.clone())
            .ok_or(DeviceError::UnknownHandle("program"))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let index = self
            .programs
            .get(program)?
            .uniforms
            .iter()
            .position(|uniform| uniform.name == name)?;
        Some(UniformLocation {
            program,
            index: u32::try_from(index).ok()?,
        })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if self.current_program != Some(location.program) {
            self.raise(ErrorCode::InvalidOperation, "uniform location of another program");
            return;
        }
        let Some(program) = self.programs.get_mut(location.program) else {
            self.raise(ErrorCode::InvalidOperation, "set_uniform on a deleted program");
            return;
        };
        let Some(uniform) = program.uniforms.get(location.index as usize) else {
            self.raise(ErrorCode::InvalidValue, "uniform index out of range");
            return;
        };
        let accepted = UniformKind::from_gl_type(uniform.gl_type).is_some_and(|kind| kind.accepts(&value));
        if !accepted {
            self.raise(ErrorCode::InvalidOperation, "uniform value of the wrong type");
            return;
        }
        let name = uniform.name.clone();
        program.values.insert(location.index, value);
        self.commands.push(DeviceCommand::SetUniform {
            program: location.program,
            name,
            value,
        });
    }

    fn uniform_block_binding(&mut self, program: ProgramId, block_index: u32, binding: u32) {
        match self.programs.get_mut(program) {
            Some(object) if (block_index as usize) < object.blocks.len() => {
                object.block_bindings.insert(block_index, binding);
            }
            Some(_) => self.raise(ErrorCode::InvalidValue, "uniform block index out of range"),
            None => self.raise(ErrorCode::InvalidOperation, "uniform_block_binding on a deleted program"),
        }
    }

    fn create_texture(&mut self) -> DeviceResult<TextureId> {
        self.reserve("texture")?;
        Ok(self.textures.insert(TextureObject::default()))
    }

    fn tex_image_2d(&mut self, desc: TextureDesc, pixels: Option<&[u8]>) -> DeviceResult<()> {
        if desc.width > MAX_TEXTURE_SIZE || desc.height > MAX_TEXTURE_SIZE {
            return Err(DeviceError::TextureTooLarge {
                width: desc.width,
                height: desc.height,
                max: MAX_TEXTURE_SIZE,
            });
        }
        if let Some(pixels) = pixels {
            if pixels.len() != desc.byte_len() {
                return Err(DeviceError::PixelDataSize {
                    expected: desc.byte_len(),
                    actual: pixels.len(),
                });
            }
        }
        let unit = self.active_unit;
        let texture = self
            .texture_units
            .get(&unit)
            .and_then(|&id| self.textures.get_mut(id))
            .ok_or(DeviceError::Flagged(ErrorCode::InvalidOperation))?;
        texture.desc = Some(desc);
        Ok(())
    }

    fn tex_parameters(&mut self, params: SamplerParams) {
        let unit = self.active_unit;
        match self.texture_units.get(&unit).and_then(|&id| self.textures.get_mut(id)) {
            Some(texture) => texture.params = params,
            None => self.raise(ErrorCode::InvalidOperation, "tex_parameters with no texture bound"),
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
        self.commands.push(DeviceCommand::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        let unit = self.active_unit;
        match texture {
            Some(id) if !self.textures.contains_key(id) => {
                self.raise(ErrorCode::InvalidOperation, "bind of a deleted texture");
                return;
            }
            Some(id) => {
                self.texture_units.insert(unit, id);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        self.commands.push(DeviceCommand::BindTexture { unit, texture });
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
        self.texture_units.retain(|_, bound| *bound != texture);
    }

    fn create_renderbuffer(&mut self) -> DeviceResult<RenderbufferId> {
        self.reserve("renderbuffer")?;
        Ok(self.renderbuffers.insert(RenderbufferObject::default()))
    }

    fn renderbuffer_storage(&mut self, renderbuffer: RenderbufferId, format: TextureFormat, width: u32, height: u32) {
        match self.renderbuffers.get_mut(renderbuffer) {
            Some(object) => object.desc = Some(TextureDesc::new(width, height, format)),
            None => self.raise(ErrorCode::InvalidOperation, "storage for a deleted renderbuffer"),
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(renderbuffer);
    }

    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferId> {
        self.reserve("framebuffer")?;
        Ok(self.framebuffers.insert(FramebufferObject::default()))
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if let Some(id) = framebuffer {
            if !self.framebuffers.contains_key(id) {
                self.raise(ErrorCode::InvalidOperation, "bind of a deleted framebuffer");
                return;
            }
        }
        self.bound_framebuffer = framebuffer;
        self.commands.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture_2d(&mut self, attachment: Attachment, texture: TextureId) {
        if self.textures.contains_key(texture) {
            self.attach(attachment, AttachedImage::Texture(texture));
        } else {
            self.raise(ErrorCode::InvalidOperation, "attach a deleted texture");
        }
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: RenderbufferId) {
        if self.renderbuffers.contains_key(renderbuffer) {
            self.attach(attachment, AttachedImage::Renderbuffer(renderbuffer));
        } else {
            self.raise(ErrorCode::InvalidOperation, "attach a deleted renderbuffer");
        }
    }

    fn draw_buffers(&mut self, attachments: &[Attachment]) {
        if attachments.iter().any(|a| !matches!(a, Attachment::Color(_))) {
            self.raise(ErrorCode::InvalidOperation, "draw_buffers with a non-colour attachment");
            return;
        }
        match self.bound_framebuffer_object() {
            Some(framebuffer) => framebuffer.draw_buffers = attachments.to_vec(),
            None => self.raise(ErrorCode::InvalidOperation, "draw_buffers on the default framebuffer"),
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        match self.bound_framebuffer.and_then(|id| self.framebuffers.get(id)) {
            Some(framebuffer) => self.framebuffer_status(framebuffer),
            None => FramebufferStatus::Complete,
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn viewport(&mut self, _x: i32, _y: i32, width: u32, height: u32) {
        self.commands.push(DeviceCommand::Viewport { width, height });
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        if self.check_framebuffer_status() != FramebufferStatus::Complete {
            self.raise(ErrorCode::InvalidFramebufferOperation, "clear of an incomplete framebuffer");
            return;
        }
        self.commands.push(DeviceCommand::Clear {
            framebuffer: self.bound_framebuffer,
            flags,
        });
    }

    fn enable_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn draw_arrays(&mut self, primitive: Primitive, _first: u32, count: u32) {
        self.record_draw(primitive, count, false);
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32, offset: usize) {
        let available = self
            .bound_buffers
            .get(&BufferTarget::ElementArray)
            .and_then(|&id| self.buffers.get(id))
            .map(|buffer| buffer.data.len());
        match available {
            None => self.raise(ErrorCode::InvalidOperation, "draw_elements with no element buffer"),
            Some(len) if offset + count as usize * 4 > len => {
                self.raise(ErrorCode::InvalidOperation, "draw_elements past the end of the element buffer");
            }
            Some(_) => self.record_draw(primitive, count, true),
        }
    }

    fn take_error(&mut self) -> Option<ErrorCode> {
        self.error.take()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl HeadlessDevice {
    fn record_draw(&mut self, primitive: Primitive, count: u32, indexed: bool) {
        let Some(program) = self.current_program else {
            self.raise(ErrorCode::InvalidOperation, "draw with no program in use");
            return;
        };
        if self.bound_vertex_array.is_none() {
            self.raise(ErrorCode::InvalidOperation, "draw with no vertex array bound");
            return;
        }
        if self.check_framebuffer_status() != FramebufferStatus::Complete {
            self.raise(ErrorCode::InvalidFramebufferOperation, "draw to an incomplete framebuffer");
            return;
        }
        self.commands.push(DeviceCommand::Draw {
            program,
            framebuffer: self.bound_framebuffer,
            primitive,
            count,
            indexed,
        });
    }
}
