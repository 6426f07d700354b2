//! # Core Engine Module
//!
//! Shared configuration types used by the renderer, the frame loop and
//! applications embedding the engine.

pub mod config;

// Re-export commonly used config types
pub use config::{
    CanvasConfig,
    EngineConfig,
    HdrFormat,
    RendererConfig,
    Config,
    ConfigError,
};
