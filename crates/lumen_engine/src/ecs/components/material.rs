//! Material component

use crate::ecs::Component;
use crate::foundation::math::Vec4;

/// Phong surface parameters
///
/// Colours are RGBA; shaders declaring the fields as `vec3` receive only
/// the RGB part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient reflectance
    pub ambient: Vec4,
    /// Diffuse reflectance
    pub diffuse: Vec4,
    /// Specular reflectance
    pub specular: Vec4,
    /// Specular exponent
    pub shininess: f32,
}

impl Component for Material {}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.1, 0.1, 0.1, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.5, 0.5, 0.5, 1.0),
            shininess: 32.0,
        }
    }
}

impl Material {
    /// Create a material
    pub const fn new(ambient: Vec4, diffuse: Vec4, specular: Vec4, shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
        }
    }

    /// Matte material of one colour
    pub fn matte(color: Vec4) -> Self {
        Self {
            ambient: color * 0.1,
            diffuse: color,
            specular: Vec4::zeros(),
            shininess: 1.0,
        }
    }
}
