//! HDR renderer with bloom
//!
//! A frame runs in three passes:
//!
//! 1. Geometry: the queued render tasks draw into the HDR framebuffer, which
//!    has two colour targets (lit colour and the bright part) plus depth.
//! 2. Blur: [`BLUR_ITERATIONS`] separable Gaussian passes ping-pong between
//!    two framebuffers, starting from the bright target and alternating
//!    horizontal and vertical.
//! 3. Composite: the HDR colour and the blurred bright image are tone mapped
//!    and added onto the default framebuffer.

use crate::core::config::{HdrFormat, RendererConfig};
use crate::ecs::Scene;
use crate::render::api::{ClearFlags, GraphicsDevice, SamplerParams, TextureFormat, UniformValue};
use crate::render::render_task::{self, RenderContext, RenderTask};
use crate::render::resources::{
    Framebuffer, Renderable, ScreenTarget, ShaderKind, ShaderProgram, UniformBuffers,
};
use crate::render::shaders::{
    BLUR_HORIZONTAL_UNIFORM, BLUR_IMAGE_UNIFORM, COMPOSITE_BLOOM_UNIFORM, COMPOSITE_EXPOSURE_UNIFORM,
    COMPOSITE_SCENE_UNIFORM,
};
use crate::render::{check_device, RenderError, RenderResult};

/// Blur passes per frame
pub const BLUR_ITERATIONS: usize = 10;

/// Texture unit of the HDR scene during compositing
pub const SCENE_TEXTURE_UNIT: u32 = 0;

/// Texture unit of the blurred bloom image during compositing
pub const BLOOM_TEXTURE_UNIT: u32 = 1;

const PING_PONG_LABELS: [&str; 2] = ["bloom_ping", "bloom_pong"];

impl From<HdrFormat> for TextureFormat {
    fn from(format: HdrFormat) -> Self {
        match format {
            HdrFormat::Rgba16F => Self::Rgba16F,
            HdrFormat::Rgba32F => Self::Rgba32F,
        }
    }
}

/// Multi-pass renderer
///
/// Owns the device, the screen-space framebuffers and shaders, the shared
/// uniform buffers and the queue of compiled render tasks.
pub struct Renderer {
    device: Box<dyn GraphicsDevice>,
    config: RendererConfig,
    hdr: Framebuffer,
    ping_pong: [Framebuffer; 2],
    quad: Renderable,
    blur_shader: ShaderProgram,
    composite_shader: ShaderProgram,
    uniform_buffers: UniformBuffers,
    queue: Vec<RenderTask>,
}

impl Renderer {
    /// Build the screen-space pipeline at the device's canvas size
    ///
    /// Any incomplete framebuffer, shader failure or raised device error
    /// aborts construction.
    pub fn new(mut device: Box<dyn GraphicsDevice>, config: &RendererConfig) -> RenderResult<Self> {
        let (width, height) = device.canvas_size();
        let (width, height) = (width.max(1), height.max(1));
        let format = TextureFormat::from(config.hdr_format);
        log::info!("Creating renderer at {}x{} ({:?})", width, height, format);

        let mut passes = ScreenPasses::default();
        if let Err(err) = passes.build(device.as_mut(), config, format, width, height) {
            passes.destroy(device.as_mut());
            return Err(err);
        }
        let (hdr, ping_pong, quad, blur_shader, composite_shader) = match passes {
            ScreenPasses {
                hdr: Some(hdr),
                ping_pong: Some(ping_pong),
                quad: Some(quad),
                blur_shader: Some(blur_shader),
                composite_shader: Some(composite_shader),
            } => (hdr, ping_pong, quad, blur_shader, composite_shader),
            passes => {
                passes.destroy(device.as_mut());
                return Err(RenderError::InvalidArgument("renderer setup left passes unbuilt".to_string()));
            }
        };

        Ok(Self {
            device,
            config: config.clone(),
            hdr,
            ping_pong,
            quad,
            blur_shader,
            composite_shader,
            uniform_buffers: UniformBuffers::new(),
            queue: Vec::new(),
        })
    }

    /// Compile `scene` and append its tasks to the queue
    ///
    /// The queue accumulates across calls until [`Renderer::clear`].
    pub fn enqueue(&mut self, scene: &Scene) -> usize {
        let tasks = render_task::parse_scene(scene);
        let count = tasks.len();
        self.queue.extend(tasks);
        count
    }

    /// Empty the task queue
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Queued tasks
    pub fn task_count(&self) -> usize {
        self.queue.len()
    }

    /// Render one frame from the queued tasks
    ///
    /// On failure the default framebuffer is bound again and depth testing
    /// and the current program are reset before the error is returned.
    pub fn render(&mut self) -> RenderResult<()> {
        let result = self.render_passes();
        if result.is_err() {
            let device = self.device.as_mut();
            device.enable_depth_test(false);
            device.use_program(None);
            device.active_texture(0);
            Framebuffer::unbind(device);
        }
        result
    }

    fn render_passes(&mut self) -> RenderResult<()> {
        let device = self.device.as_mut();
        let (width, height) = device.canvas_size();

        Framebuffer::unbind(device);
        device.viewport(0, 0, width, height);
        device.clear_color(self.config.clear_color);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        check_device(device, "clear")?;

        // Geometry
        self.hdr.bind(device);
        device.enable_depth_test(true);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        {
            let mut ctx = RenderContext::new(&mut *device, &mut self.uniform_buffers);
            render_task::execute_all(&self.queue, &mut ctx)?;
        }
        check_device(device, "geometry pass")?;

        // Blur
        device.enable_depth_test(false);
        self.blur_shader.use_program(device);
        let mut horizontal = true;
        for iteration in 0..BLUR_ITERATIONS {
            self.ping_pong[usize::from(horizontal)].bind(device);
            self.blur_shader
                .set_uniform(device, BLUR_HORIZONTAL_UNIFORM, UniformValue::Bool(horizontal))?;
            let source = if iteration == 0 {
                self.hdr.color_texture(1)
            } else {
                self.ping_pong[usize::from(!horizontal)].color_texture(0)
            };
            device.active_texture(0);
            device.bind_texture(source);
            self.quad.draw(device);
            horizontal = !horizontal;
        }
        check_device(device, "blur pass")?;
        let bloom = self.ping_pong[usize::from(!horizontal)].color_texture(0);

        // Composite
        Framebuffer::unbind(device);
        device.viewport(0, 0, width, height);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        self.composite_shader.use_program(device);
        device.active_texture(SCENE_TEXTURE_UNIT);
        device.bind_texture(self.hdr.color_texture(0));
        device.active_texture(BLOOM_TEXTURE_UNIT);
        device.bind_texture(bloom);
        self.quad.draw(device);
        device.active_texture(0);
        check_device(device, "composite pass")?;

        log::trace!("Rendered frame with {} tasks", self.queue.len());
        Ok(())
    }

    /// Follow the canvas client size
    ///
    /// Resizes the canvas and every screen-space target when the client
    /// size changed. Returns whether anything was resized.
    pub fn handle_resize(&mut self) -> RenderResult<bool> {
        let device = self.device.as_mut();
        let (width, height) = device.client_size();
        if (width, height) == device.canvas_size() || width == 0 || height == 0 {
            return Ok(false);
        }

        device.set_canvas_size(width, height);
        self.hdr.resize(device, width, height)?;
        for framebuffer in &mut self.ping_pong {
            framebuffer.resize(device, width, height)?;
        }
        check_device(device, "resize")?;
        log::info!("Resized render targets to {}x{}", width, height);
        Ok(true)
    }

    /// Set the tone mapping exposure
    pub fn set_exposure(&mut self, exposure: f32) -> RenderResult<()> {
        let device = self.device.as_mut();
        self.composite_shader.use_program(device);
        self.composite_shader
            .set_uniform(device, COMPOSITE_EXPOSURE_UNIFORM, UniformValue::Float(exposure))?;
        self.config.exposure = exposure;
        Ok(())
    }

    /// The device
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// The device, for creating scene resources
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// The device as its concrete backend type
    pub fn device_as<T: GraphicsDevice + 'static>(&self) -> Option<&T> {
        self.device.as_any().downcast_ref()
    }

    /// The device as its concrete backend type, mutably
    pub fn device_as_mut<T: GraphicsDevice + 'static>(&mut self) -> Option<&mut T> {
        self.device.as_any_mut().downcast_mut()
    }

    /// HDR geometry framebuffer
    pub const fn hdr_framebuffer(&self) -> &Framebuffer {
        &self.hdr
    }

    /// The two blur framebuffers
    pub const fn blur_framebuffers(&self) -> &[Framebuffer; 2] {
        &self.ping_pong
    }

    /// Blur shader
    pub const fn blur_shader(&self) -> &ShaderProgram {
        &self.blur_shader
    }

    /// Composite shader
    pub const fn composite_shader(&self) -> &ShaderProgram {
        &self.composite_shader
    }

    /// Release every device object the renderer owns and return the device
    pub fn destroy(self) -> Box<dyn GraphicsDevice> {
        let Self {
            mut device,
            hdr,
            ping_pong,
            quad,
            blur_shader,
            composite_shader,
            mut uniform_buffers,
            ..
        } = self;
        let target = device.as_mut();
        hdr.destroy(target);
        for framebuffer in ping_pong {
            framebuffer.destroy(target);
        }
        quad.destroy(target);
        blur_shader.destroy(target);
        composite_shader.destroy(target);
        uniform_buffers.destroy(target);
        log::debug!("Renderer destroyed");
        device
    }
}

/// Screen-space objects of a renderer while it is being built
///
/// Every object is stored as soon as it exists, so a failed setup can
/// release whatever was made before the failure.
#[derive(Default)]
struct ScreenPasses {
    hdr: Option<Framebuffer>,
    ping_pong: Option<[Framebuffer; 2]>,
    quad: Option<Renderable>,
    blur_shader: Option<ShaderProgram>,
    composite_shader: Option<ShaderProgram>,
}

impl ScreenPasses {
    fn build(
        &mut self,
        device: &mut dyn GraphicsDevice,
        config: &RendererConfig,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        self.hdr = Some(build_hdr_framebuffer(device, format, width, height)?);

        let ping = blur_framebuffer(device, PING_PONG_LABELS[0], format, width, height)?;
        let pong = match blur_framebuffer(device, PING_PONG_LABELS[1], format, width, height) {
            Ok(pong) => pong,
            Err(err) => {
                ping.destroy(device);
                return Err(err);
            }
        };
        self.ping_pong = Some([ping, pong]);
        self.quad = Some(Renderable::screen_quad(device)?);

        let blur_shader = self
            .blur_shader
            .insert(ShaderProgram::builtin(device, ShaderKind::Blur)?);
        blur_shader.use_program(device);
        blur_shader.set_uniform(device, BLUR_IMAGE_UNIFORM, UniformValue::Int(0))?;

        let composite_shader = self
            .composite_shader
            .insert(ShaderProgram::builtin(device, ShaderKind::Composite)?);
        composite_shader.use_program(device);
        composite_shader.set_uniform(
            device,
            COMPOSITE_SCENE_UNIFORM,
            UniformValue::Int(SCENE_TEXTURE_UNIT as i32),
        )?;
        composite_shader.set_uniform(
            device,
            COMPOSITE_BLOOM_UNIFORM,
            UniformValue::Int(BLOOM_TEXTURE_UNIT as i32),
        )?;
        composite_shader.set_uniform(
            device,
            COMPOSITE_EXPOSURE_UNIFORM,
            UniformValue::Float(config.exposure),
        )?;
        device.use_program(None);
        check_device(device, "renderer setup")
    }

    fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.use_program(None);
        if let Some(hdr) = self.hdr {
            hdr.destroy(device);
        }
        for framebuffer in self.ping_pong.into_iter().flatten() {
            framebuffer.destroy(device);
        }
        if let Some(quad) = self.quad {
            quad.destroy(device);
        }
        for shader in [self.blur_shader, self.composite_shader].into_iter().flatten() {
            shader.destroy(device);
        }
        log::debug!("Released partially built renderer");
    }
}

fn build_hdr_framebuffer(
    device: &mut dyn GraphicsDevice,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> RenderResult<Framebuffer> {
    let mut targets = Vec::with_capacity(3);
    if let Err(err) = hdr_targets(device, format, width, height, &mut targets) {
        for target in targets {
            target.destroy(device);
        }
        return Err(err);
    }
    let depth = targets.pop();
    Framebuffer::new(device, "hdr", targets, depth)
}

/// Two colour textures then a depth renderbuffer
fn hdr_targets(
    device: &mut dyn GraphicsDevice,
    format: TextureFormat,
    width: u32,
    height: u32,
    targets: &mut Vec<ScreenTarget>,
) -> RenderResult<()> {
    targets.push(screen_texture(device, format, width, height)?);
    targets.push(screen_texture(device, format, width, height)?);
    targets.push(ScreenTarget::renderbuffer(device, TextureFormat::Depth24, width, height)?);
    Ok(())
}

fn screen_texture(
    device: &mut dyn GraphicsDevice,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> RenderResult<ScreenTarget> {
    ScreenTarget::texture(device, format, width, height, SamplerParams::SCREEN)
}

fn blur_framebuffer(
    device: &mut dyn GraphicsDevice,
    label: &'static str,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> RenderResult<Framebuffer> {
    let color = screen_texture(device, format, width, height)?;
    Framebuffer::new(device, label, vec![color], None)
}
