//! Backend implementations for the render module
//!
//! Only a headless device ships with the engine; a browser build supplies
//! its own `GraphicsDevice` over the WebGL2 context.

/// GPU-less device recording every call
pub mod headless;

pub use headless::{DeviceCommand, HeadlessDevice, ObjectCounts, DEFAULT_COMMAND_LIMIT, MAX_TEXTURE_SIZE};
