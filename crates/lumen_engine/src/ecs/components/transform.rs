//! Transform component for the ECS system
//!
//! The local matrix is derived from translation, rotation and scale on first
//! read and cached until one of the three changes. The world matrix is
//! written by the propagation system once per frame.

use crate::ecs::Component;
use crate::foundation::math::{compose_trs, Mat4, Quat, Vec3};
use std::cell::Cell;

/// ECS Transform component
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
    local: Cell<Option<Mat4>>,
    world: Mat4,
}

impl Component for Transform {}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            local: Cell::new(None),
            world: Mat4::identity(),
        }
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from translation only
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// Create from translation, rotation and scale
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            ..Self::default()
        }
    }

    /// Translation
    pub const fn translation(&self) -> &Vec3 {
        &self.translation
    }

    /// Rotation
    pub const fn rotation(&self) -> &Quat {
        &self.rotation
    }

    /// Scale
    pub const fn scale(&self) -> &Vec3 {
        &self.scale
    }

    /// Set the translation and invalidate the local matrix
    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.local.set(None);
    }

    /// Set the rotation and invalidate the local matrix
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.local.set(None);
    }

    /// Set the scale and invalidate the local matrix
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.local.set(None);
    }

    /// Apply an extra rotation on top of the current one
    pub fn rotate(&mut self, delta: &Quat) {
        self.set_rotation(delta * self.rotation);
    }

    /// Local matrix (T * R * S), recomputed only after a change
    pub fn local_transform(&self) -> Mat4 {
        if let Some(cached) = self.local.get() {
            return cached;
        }
        let local = compose_trs(&self.translation, &self.rotation, &self.scale);
        self.local.set(Some(local));
        local
    }

    /// Whether the local matrix is currently cached
    pub fn is_local_cached(&self) -> bool {
        self.local.get().is_some()
    }

    /// World matrix as of the last propagation pass
    pub const fn world_transform(&self) -> &Mat4 {
        &self.world
    }

    /// Overwrite the world matrix
    pub fn set_world_transform(&mut self, world: Mat4) {
        self.world = world;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_local_transform_composes_trs() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), 0.5);
        let transform = Transform::from_trs(Vec3::new(1.0, 2.0, 3.0), rotation, Vec3::new(2.0, 2.0, 2.0));
        let expected = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0))
            * rotation.to_homogeneous()
            * Mat4::new_scaling(2.0);
        assert_relative_eq!(transform.local_transform(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_local_transform_is_cached_until_changed() {
        let mut transform = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        assert!(!transform.is_local_cached());

        let first = transform.local_transform();
        assert!(transform.is_local_cached());
        assert_eq!(transform.local_transform(), first);

        transform.set_scale(Vec3::new(3.0, 3.0, 3.0));
        assert!(!transform.is_local_cached());
        assert_relative_eq!(transform.local_transform()[(0, 0)], 3.0);

        transform.set_translation(Vec3::new(0.0, 5.0, 0.0));
        assert!(!transform.is_local_cached());
        assert_relative_eq!(transform.local_transform()[(1, 3)], 5.0);

        transform.set_rotation(Quat::from_axis_angle(&Vec3::z_axis(), 1.0));
        assert!(!transform.is_local_cached());
    }

    #[test]
    fn test_world_transform_is_independent_of_local() {
        let mut transform = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(*transform.world_transform(), Mat4::identity());

        let world = Mat4::new_translation(&Vec3::new(0.0, 0.0, 9.0));
        transform.set_world_transform(world);
        assert_eq!(*transform.world_transform(), world);
        assert!(!transform.is_local_cached());
    }
}
