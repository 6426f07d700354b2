//! Lighting components
//!
//! A scene carries its lights as one aggregate [`LightSources`] component on
//! a single entity. The renderer uploads it to the `LightSources` uniform
//! block in the std140 layout produced by [`pack_lights`].

use crate::ecs::Component;
use crate::foundation::math::Vec3;

/// Floats one light occupies once packed (two padded vec4s)
pub const PACKED_LIGHT_FLOATS: usize = 8;

/// Point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// World space position
    pub position: Vec3,
    /// RGB colour, may exceed 1.0 for HDR
    pub color: Vec3,
}

impl Light {
    /// Create a light
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}

/// The set of lights of a scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSources(pub Vec<Light>);

impl Component for LightSources {}

impl LightSources {
    /// Wrap a list of lights
    pub const fn new(lights: Vec<Light>) -> Self {
        Self(lights)
    }

    /// The lights
    pub fn lights(&self) -> &[Light] {
        &self.0
    }

    /// Std140 payload for the `LightSources` block
    pub fn packed(&self) -> Vec<f32> {
        pack_lights(&self.0)
    }
}

/// Pack lights as `[px, py, pz, 0, r, g, b, 0]` per light
///
/// Each vec3 is padded to a vec4 to match the std140 array stride.
pub fn pack_lights(lights: &[Light]) -> Vec<f32> {
    let mut packed = Vec::with_capacity(lights.len() * PACKED_LIGHT_FLOATS);
    for light in lights {
        packed.extend_from_slice(&[light.position.x, light.position.y, light.position.z, 0.0]);
        packed.extend_from_slice(&[light.color.x, light.color.y, light.color.z, 0.0]);
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_two_lights() {
        let lights = LightSources::new(vec![
            Light::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.1, 0.2, 0.3)),
            Light::new(Vec3::new(4.0, 5.0, 6.0), Vec3::new(0.4, 0.5, 0.6)),
        ]);
        assert_eq!(
            lights.packed(),
            vec![
                1.0, 2.0, 3.0, 0.0, 0.1, 0.2, 0.3, 0.0, //
                4.0, 5.0, 6.0, 0.0, 0.4, 0.5, 0.6, 0.0,
            ]
        );
    }

    #[test]
    fn test_pack_no_lights() {
        assert!(pack_lights(&[]).is_empty());
    }
}
