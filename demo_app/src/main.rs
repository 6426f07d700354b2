//! Lumen demo application
//!
//! Renders a spinning textured cube with a satellite through the HDR bloom
//! pipeline on the headless device, driven by a simulated host clock, and
//! logs what the device recorded.
//!
//! Usage: `lumen_demo [config.toml|config.ron]`

mod demo_scene;

use lumen_engine::config::ConfigError;
use lumen_engine::ecs::EcsError;
use lumen_engine::foundation::logging;
use lumen_engine::prelude::*;
use lumen_engine::render::backends::DeviceCommand;
use std::collections::VecDeque;
use thiserror::Error;

const FRAME_COUNT: u64 = 120;
const FRAME_INTERVAL: f64 = 1.0 / 60.0;

/// Device calls seen over the run
#[derive(Debug, Default)]
struct CommandStats {
    commands: usize,
    draws: usize,
}

impl CommandStats {
    /// Drain the device's log for the frame just rendered
    fn collect(&mut self, frames: &mut FrameLoop) {
        if let Some(device) = frames.renderer_mut().device_as_mut::<HeadlessDevice>() {
            let commands = device.take_commands();
            self.draws += commands
                .iter()
                .filter(|command| matches!(command, DeviceCommand::Draw { .. }))
                .count();
            self.commands += commands.len();
        }
    }
}

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ecs(#[from] EcsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Stand-in for the browser's animation-frame callbacks
///
/// Delivers requested frames in order, one fixed interval apart.
#[derive(Debug, Default)]
struct SimulatedHost {
    next_handle: u64,
    queue: VecDeque<FrameHandle>,
    now: f64,
}

impl SimulatedHost {
    fn next_frame(&mut self) -> Option<f64> {
        self.queue.pop_front()?;
        self.now += FRAME_INTERVAL;
        Some(self.now)
    }
}

impl FrameScheduler for SimulatedHost {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_handle += 1;
        let handle = FrameHandle(self.next_handle);
        self.queue.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.retain(|&pending| pending != handle);
    }
}

fn main() {
    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        eprintln!("lumen_demo: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    logging::init_with_level(&config.log_level);
    log::info!(
        "Starting Lumen demo at {}x{}",
        config.canvas.width,
        config.canvas.height
    );

    let mut device = HeadlessDevice::new(config.canvas.width, config.canvas.height);
    let mut scene = Scene::new();
    let entities = demo_scene::build(&mut scene, &mut device, &mut rand::thread_rng())?;
    demo_scene::add_systems(&mut scene)?;

    let mut frames = FrameLoop::from_config(scene, Box::new(device), &config)?;
    let mut host = SimulatedHost::default();
    let mut stats = CommandStats::default();
    frames.start(&mut host);

    while let Some(timestamp) = host.next_frame() {
        frames.frame(&mut host, timestamp)?;
        stats.collect(&mut frames);

        let frame = frames.timer().frame_count();
        if frame == FRAME_COUNT / 2 {
            // Halfway through, the page shrinks the canvas
            if let Some(device) = frames.renderer_mut().device_as_mut::<HeadlessDevice>() {
                device.set_client_size(config.canvas.width / 2, config.canvas.height / 2);
            }
        }
        if frame >= FRAME_COUNT {
            frames.stop(&mut host);
        }
    }

    report(&frames, &stats, &entities);
    let (scene, _device) = frames.shutdown(&mut host);
    log::info!("Demo finished with {} entities", scene.entity_count());
    Ok(())
}

fn report(frames: &FrameLoop, stats: &CommandStats, entities: &demo_scene::DemoEntities) {
    let timer = frames.timer();
    log::info!(
        "Rendered {} frames over {:.2}s ({:.1} fps simulated)",
        timer.frame_count(),
        timer.total_time(),
        timer.average_fps()
    );

    if let Some(device) = frames.renderer().device_as::<HeadlessDevice>() {
        log::info!(
            "Device recorded {} commands, {} draw calls; canvas now {:?}",
            stats.commands,
            stats.draws,
            device.canvas_size()
        );
    }

    let scene = frames.scene();
    for (label, entity) in [("cube", entities.cube), ("satellite", entities.satellite)] {
        if let Some(transform) = scene.get_component::<Transform>(entity) {
            let world = *transform.borrow().world_transform();
            log::info!(
                "{} world position: ({:.3}, {:.3}, {:.3})",
                label,
                world[(0, 3)],
                world[(1, 3)],
                world[(2, 3)]
            );
        }
    }
    log::debug!("Root entity {} holds shader, camera and lights", entities.root);
}
