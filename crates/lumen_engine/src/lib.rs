//! # Lumen Engine
//!
//! A small 3D engine: an Entity-Component-System, a scene graph stored as
//! components, a compiler from that graph to ordered render tasks, and an
//! HDR renderer with bloom on top of a WebGL2-shaped device.
//!
//! ## Features
//!
//! - **ECS**: sparse per-type component tables, snapshot queries and phased
//!   systems
//! - **Scene Graph**: `SceneNode` hierarchy with world transform propagation
//! - **Render Tasks**: one state change or draw per task, in a fixed order per
//!   node
//! - **Bloom**: HDR geometry pass, ten ping-pong blur passes, tone-mapped
//!   composite
//! - **Headless Device**: a software [`GraphicsDevice`](render::GraphicsDevice)
//!   that validates and records every call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumen_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     lumen_engine::foundation::logging::init_with_level(&config.log_level);
//!
//!     let mut scene = Scene::new();
//!     scene.register_component_type::<SceneNode>();
//!     scene.register_component_type::<Transform>();
//!     scene.add_system(TransformPropagationSystem::new());
//!
//!     let device = HeadlessDevice::new(config.canvas.width, config.canvas.height);
//!     let mut frames = FrameLoop::from_config(scene, Box::new(device), &config)?;
//!     frames.renderer_mut().render()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ecs;
pub mod engine;
pub mod foundation;
pub mod render;
pub mod scene;

pub use engine::{EngineError, FrameHandle, FrameLoop, FrameScheduler, LoopControl};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::config::{CanvasConfig, EngineConfig, HdrFormat, RendererConfig},
        ecs::{
            Camera, Component, Entity, Light, LightSources, Material, Query, QuerySystem, Scene,
            SceneNode, Shared, System, SystemPhase, Transform, TransformPropagationSystem,
        },
        engine::{EngineError, FrameHandle, FrameLoop, FrameScheduler, LoopControl},
        foundation::{
            math::{Mat4, Quat, Vec3, Vec4},
            time::Timer,
        },
        render::{
            resources::{MeshData, Renderable, ShaderKind, ShaderProgram, Texture2D},
            GraphicsDevice, HeadlessDevice, RenderError, Renderer,
        },
        scene::hierarchy::attach_child,
    };
}
