//! Frame loop
//!
//! The host owns the clock. It calls [`FrameLoop::frame`] from its
//! animation-frame callback with a timestamp, and the loop asks the host
//! for the next callback through a [`FrameScheduler`] while it is running.
//! Stopping is cooperative: a frame in progress always completes, it just
//! does not schedule a successor.

use crate::config::ConfigError;
use crate::core::config::EngineConfig;
use crate::ecs::Scene;
use crate::foundation::time::Timer;
use crate::render::{GraphicsDevice, RenderError, Renderer};
use thiserror::Error;

/// Handle of a requested frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host API for frame callbacks
pub trait FrameScheduler {
    /// Ask for one more frame callback
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a pending request
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// What the loop did at the end of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// The next frame is scheduled
    Continue,
    /// The loop is stopped; nothing was scheduled
    Stopped,
}

/// Frame loop errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rendering failed
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// Configuration was invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Drives one scene and one renderer frame by frame
pub struct FrameLoop {
    scene: Scene,
    renderer: Renderer,
    timer: Timer,
    running: bool,
    pending: Option<FrameHandle>,
}

impl FrameLoop {
    /// Pair a scene with a renderer; the loop starts stopped
    pub fn new(scene: Scene, renderer: Renderer) -> Self {
        Self {
            scene,
            renderer,
            timer: Timer::new(),
            running: false,
            pending: None,
        }
    }

    /// Validate `config` and build the renderer on `device`
    pub fn from_config(
        scene: Scene,
        mut device: Box<dyn GraphicsDevice>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        device.set_canvas_size(config.canvas.width, config.canvas.height);
        let renderer = Renderer::new(device, &config.renderer)?;
        Ok(Self::new(scene, renderer))
    }

    /// Start running and request the first frame
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            log::warn!("Frame loop already running");
            return;
        }
        log::info!("Frame loop started");
        self.running = true;
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_frame());
        }
    }

    /// Stop running and cancel the pending frame, if any
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.running = false;
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        log::info!("Frame loop stopped after {} frames", self.timer.frame_count());
    }

    /// Run one frame at host time `timestamp` (seconds)
    ///
    /// Follows the canvas size, updates the scene, recompiles the render
    /// queue and renders. Reschedules only while running. A render error
    /// stops the loop.
    pub fn frame(&mut self, scheduler: &mut dyn FrameScheduler, timestamp: f64) -> Result<LoopControl, EngineError> {
        self.pending = None;
        if !self.running {
            return Ok(LoopControl::Stopped);
        }

        if let Err(err) = self.run_frame(timestamp) {
            log::error!("Frame failed: {}", err);
            self.running = false;
            return Err(err.into());
        }

        if self.running {
            self.pending = Some(scheduler.request_frame());
            Ok(LoopControl::Continue)
        } else {
            Ok(LoopControl::Stopped)
        }
    }

    fn run_frame(&mut self, timestamp: f64) -> Result<(), RenderError> {
        let dt = self.timer.advance(timestamp);
        self.renderer.handle_resize()?;
        self.scene.update(dt);
        self.renderer.clear();
        self.renderer.enqueue(&self.scene);
        self.renderer.render()
    }

    /// Whether the loop reschedules itself
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Frame request not yet delivered
    pub const fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// The scene
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene, mutably
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The renderer
    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The renderer, mutably
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Frame timing
    pub const fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Stop, release the renderer's device objects and hand back the scene
    /// and the device
    pub fn shutdown(mut self, scheduler: &mut dyn FrameScheduler) -> (Scene, Box<dyn GraphicsDevice>) {
        if self.running || self.pending.is_some() {
            self.stop(scheduler);
        }
        (self.scene, self.renderer.destroy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::System;
    use crate::render::backends::HeadlessDevice;
    use crate::core::config::RendererConfig;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct ManualScheduler {
        next: u64,
        requested: Vec<FrameHandle>,
        cancelled: Vec<FrameHandle>,
    }

    impl FrameScheduler for ManualScheduler {
        fn request_frame(&mut self) -> FrameHandle {
            self.next += 1;
            let handle = FrameHandle(self.next);
            self.requested.push(handle);
            handle
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.cancelled.push(handle);
        }
    }

    struct DtLog(Rc<RefCell<Vec<f32>>>);

    impl System for DtLog {
        fn update(&mut self, dt: f32, _scene: &Scene) {
            self.0.borrow_mut().push(dt);
        }
    }

    fn frame_loop() -> (FrameLoop, Rc<RefCell<Vec<f32>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = Scene::new();
        scene.add_system(DtLog(Rc::clone(&log)));
        let renderer =
            Renderer::new(Box::new(HeadlessDevice::new(32, 32)), &RendererConfig::default()).unwrap();
        (FrameLoop::new(scene, renderer), log)
    }

    #[test]
    fn test_start_requests_one_frame() {
        let (mut frames, _) = frame_loop();
        let mut scheduler = ManualScheduler::default();

        frames.start(&mut scheduler);
        frames.start(&mut scheduler);
        assert!(frames.is_running());
        assert_eq!(scheduler.requested, vec![FrameHandle(1)]);
        assert_eq!(frames.pending_frame(), Some(FrameHandle(1)));
    }

    #[test]
    fn test_frames_update_render_and_reschedule() {
        let (mut frames, log) = frame_loop();
        let mut scheduler = ManualScheduler::default();
        frames.start(&mut scheduler);

        assert_eq!(frames.frame(&mut scheduler, 1.0).unwrap(), LoopControl::Continue);
        assert_eq!(frames.frame(&mut scheduler, 1.25).unwrap(), LoopControl::Continue);

        let dts = log.borrow().clone();
        assert_eq!(dts.len(), 2);
        assert_relative_eq!(dts[0], 0.0);
        assert_relative_eq!(dts[1], 0.25);
        assert_eq!(frames.timer().frame_count(), 2);
        assert_eq!(scheduler.requested.len(), 3);
        assert_eq!(frames.pending_frame(), Some(FrameHandle(3)));

        let device = frames.renderer().device_as::<HeadlessDevice>().unwrap();
        assert!(device.draw_calls().count() >= 2);
    }

    #[test]
    fn test_stop_cancels_pending_frame() {
        let (mut frames, log) = frame_loop();
        let mut scheduler = ManualScheduler::default();
        frames.start(&mut scheduler);
        frames.frame(&mut scheduler, 0.0).unwrap();

        frames.stop(&mut scheduler);
        assert_eq!(scheduler.cancelled, vec![FrameHandle(2)]);
        assert_eq!(frames.pending_frame(), None);

        // A callback that was already in flight does nothing
        assert_eq!(frames.frame(&mut scheduler, 0.1).unwrap(), LoopControl::Stopped);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(scheduler.requested.len(), 2);
    }

    #[test]
    fn test_frame_follows_client_resize() {
        let (mut frames, _) = frame_loop();
        let mut scheduler = ManualScheduler::default();
        frames.start(&mut scheduler);
        frames
            .renderer_mut()
            .device_as_mut::<HeadlessDevice>()
            .unwrap()
            .set_client_size(48, 24);

        frames.frame(&mut scheduler, 0.0).unwrap();
        assert_eq!(frames.renderer().hdr_framebuffer().size(), (48, 24));
    }

    #[test]
    fn test_from_config_rejects_invalid_canvas() {
        let mut config = EngineConfig::default();
        config.canvas.width = 0;
        let result = FrameLoop::from_config(Scene::new(), Box::new(HeadlessDevice::new(1, 1)), &config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_from_config_sizes_canvas() {
        let config = EngineConfig::default();
        let frames = FrameLoop::from_config(Scene::new(), Box::new(HeadlessDevice::new(1, 1)), &config).unwrap();
        assert_eq!(
            frames.renderer().hdr_framebuffer().size(),
            (config.canvas.width, config.canvas.height)
        );
    }

    #[test]
    fn test_shutdown_releases_device_objects() {
        let (mut frames, _) = frame_loop();
        let mut scheduler = ManualScheduler::default();
        frames.start(&mut scheduler);
        frames.frame(&mut scheduler, 0.0).unwrap();

        let (_scene, device) = frames.shutdown(&mut scheduler);
        assert_eq!(scheduler.cancelled, vec![FrameHandle(2)]);
        let device = device.as_any().downcast_ref::<HeadlessDevice>().unwrap();
        assert_eq!(device.object_counts(), crate::render::backends::ObjectCounts::default());
    }
}
