//! # Unified Configuration System
//!
//! All engine configuration lives here. Every section has defaults, so an
//! empty TOML document is a valid configuration.
//!
//! ```toml
//! log_level = "debug"
//!
//! [canvas]
//! width = 1280
//! height = 720
//!
//! [renderer]
//! clear_color = [0.0, 0.0, 0.0, 1.0]
//! exposure = 1.2
//! hdr_format = "Rgba32F"
//! ```

use serde::{Serialize, Deserialize};

// Re-export from the config module for compatibility
pub use crate::config::{Config, ConfigError};

/// Floating-point colour format for the HDR and blur attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HdrFormat {
    /// Half-float RGBA
    #[default]
    Rgba16F,
    /// Full-float RGBA
    Rgba32F,
}

/// # Canvas Configuration
///
/// Initial drawing-buffer size. The renderer follows the canvas client size
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

/// # Renderer Configuration
///
/// Settings for the HDR + bloom pipeline. The blur pass count is fixed by
/// the renderer and deliberately absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Clear colour for the default and HDR framebuffers
    pub clear_color: [f32; 4],
    /// Exposure fed to the composite shader's tone mapping
    pub exposure: f32,
    /// Colour format of the HDR and ping-pong attachments
    pub hdr_format: HdrFormat,
}

impl RendererConfig {
    /// Set clear colour
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set exposure
    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exposure.is_finite() && self.exposure > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "exposure must be a positive number, got {}",
                self.exposure
            )));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            exposure: 1.0,
            hdr_format: HdrFormat::default(),
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Canvas configuration
    pub canvas: CanvasConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid("canvas size must be non-zero".to_string()));
        }
        self.renderer.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            canvas: CanvasConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            log_level = "debug"

            [canvas]
            width = 1280

            [renderer]
            exposure = 2.5
            hdr_format = "Rgba32F"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.canvas.width, 1280);
        assert_eq!(config.canvas.height, 600);
        assert_eq!(config.renderer.exposure, 2.5);
        assert_eq!(config.renderer.hdr_format, HdrFormat::Rgba32F);
        assert_eq!(config.renderer.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_validate_rejects_bad_exposure() {
        let mut config = EngineConfig::default();
        config.renderer.exposure = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::load_from_file("engine.json");
        // The file does not exist, so IO fails before the extension check
        assert!(result.is_err());

        let dir = std::env::temp_dir().join("lumen_engine_config_test.json");
        std::fs::write(&dir, "{}").unwrap();
        let result = EngineConfig::load_from_file(&dir);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn test_ron_round_trip_through_file() {
        let path = std::env::temp_dir().join("lumen_engine_config_test.ron");
        let config = EngineConfig::default().with_log_level("warn");
        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }
}
