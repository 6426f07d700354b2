//! # Camera component
//!
//! Look-at and perspective parameters with lazily rebuilt matrices.
//!
//! ## Parameter merging
//! Every parameter is optional. When a matrix is rebuilt each field resolves
//! to the most recently set value, falling back to the built-in default when
//! it was never set. Setting a subset of fields therefore never disturbs the
//! others.

use crate::ecs::Component;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use std::cell::Cell;

/// Default eye position
pub const DEFAULT_EYE: [f32; 3] = [0.0, 0.0, 5.0];
/// Default vertical field of view in degrees
pub const DEFAULT_FOVY_DEGREES: f32 = 45.0;
/// Default near clip distance
pub const DEFAULT_NEAR: f32 = 0.1;
/// Default far clip distance
pub const DEFAULT_FAR: f32 = 100.0;

/// Perspective camera
///
/// Uses the GL conventions: right-handed view space looking down -Z and a
/// projection mapping depth to [-1, 1].
#[derive(Debug, Clone, Default)]
pub struct Camera {
    eye: Option<Vec3>,
    at: Option<Vec3>,
    up: Option<Vec3>,
    near: Option<f32>,
    far: Option<f32>,
    fovy: Option<f32>,
    aspect: Option<f32>,
    view: Cell<Option<Mat4>>,
    projection: Cell<Option<Mat4>>,
}

impl Component for Camera {}

impl Camera {
    /// Create a camera with every parameter at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a camera looking from `eye` at `at`
    pub fn looking_at(eye: Vec3, at: Vec3) -> Self {
        let mut camera = Self::default();
        camera.set_lookat(Some(eye), Some(at), None);
        camera
    }

    /// Update look-at parameters
    ///
    /// `None` keeps the previously set value (or the default).
    pub fn set_lookat(&mut self, eye: Option<Vec3>, at: Option<Vec3>, up: Option<Vec3>) {
        self.eye = eye.or(self.eye);
        self.at = at.or(self.at);
        self.up = up.or(self.up);
        self.view.set(None);
    }

    /// Update perspective parameters
    ///
    /// `fovy` is in radians. `None` keeps the previously set value (or the
    /// default).
    pub fn set_perspective(
        &mut self,
        near: Option<f32>,
        far: Option<f32>,
        fovy: Option<f32>,
        aspect: Option<f32>,
    ) {
        self.near = near.or(self.near);
        self.far = far.or(self.far);
        self.fovy = fovy.or(self.fovy);
        self.aspect = aspect.or(self.aspect);
        self.projection.set(None);
    }

    /// Update only the aspect ratio
    pub fn set_aspect(&mut self, aspect: f32) {
        self.set_perspective(None, None, None, Some(aspect));
    }

    /// Resolved eye position
    pub fn eye(&self) -> Vec3 {
        self.eye.unwrap_or_else(|| Vec3::from(DEFAULT_EYE))
    }

    /// Resolved look-at target
    pub fn at(&self) -> Vec3 {
        self.at.unwrap_or_else(Vec3::zeros)
    }

    /// Resolved up vector
    pub fn up(&self) -> Vec3 {
        self.up.unwrap_or_else(Vec3::y)
    }

    /// Resolved near clip distance
    pub fn near(&self) -> f32 {
        self.near.unwrap_or(DEFAULT_NEAR)
    }

    /// Resolved far clip distance
    pub fn far(&self) -> f32 {
        self.far.unwrap_or(DEFAULT_FAR)
    }

    /// Resolved vertical field of view in radians
    pub fn fovy(&self) -> f32 {
        self.fovy.unwrap_or_else(|| utils::deg_to_rad(DEFAULT_FOVY_DEGREES))
    }

    /// Resolved aspect ratio
    pub fn aspect(&self) -> f32 {
        self.aspect.unwrap_or(1.0)
    }

    /// View matrix, rebuilt only after a look-at change
    pub fn view_matrix(&self) -> Mat4 {
        if let Some(view) = self.view.get() {
            return view;
        }
        let view = Mat4::look_at(self.eye(), self.at(), self.up());
        log::trace!("Camera view matrix rebuilt");
        self.view.set(Some(view));
        view
    }

    /// Projection matrix, rebuilt only after a perspective change
    pub fn projection_matrix(&self) -> Mat4 {
        if let Some(projection) = self.projection.get() {
            return projection;
        }
        let projection = Mat4::perspective(self.fovy(), self.aspect(), self.near(), self.far());
        log::trace!("Camera projection matrix rebuilt");
        self.projection.set(Some(projection));
        projection
    }

    /// Whether the view matrix is cached
    pub fn is_view_cached(&self) -> bool {
        self.view.get().is_some()
    }

    /// Whether the projection matrix is cached
    pub fn is_projection_cached(&self) -> bool {
        self.projection.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let camera = Camera::new();
        assert_eq!(camera.eye(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.at(), Vec3::zeros());
        assert_eq!(camera.up(), Vec3::y());
        assert_relative_eq!(camera.fovy(), std::f32::consts::FRAC_PI_4);
        assert_relative_eq!(camera.aspect(), 1.0);
    }

    #[test]
    fn test_partial_updates_merge_with_previous_values() {
        let mut camera = Camera::new();
        camera.set_perspective(Some(0.5), Some(50.0), None, None);
        camera.set_perspective(None, Some(80.0), None, Some(2.0));

        assert_relative_eq!(camera.near(), 0.5);
        assert_relative_eq!(camera.far(), 80.0);
        assert_relative_eq!(camera.aspect(), 2.0);
        assert_relative_eq!(camera.fovy(), std::f32::consts::FRAC_PI_4);
    }

    #[test]
    fn test_matrices_are_cached_until_dirty() {
        let mut camera = Camera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros());
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        assert!(camera.is_view_cached());
        assert!(camera.is_projection_cached());

        camera.set_aspect(16.0 / 9.0);
        assert!(camera.is_view_cached());
        assert!(!camera.is_projection_cached());
        assert_ne!(camera.projection_matrix(), projection);
        assert_eq!(camera.view_matrix(), view);

        camera.set_lookat(Some(Vec3::new(0.0, 0.0, 3.0)), None, None);
        assert!(!camera.is_view_cached());
    }

    #[test]
    fn test_view_moves_eye_to_origin() {
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros());
        let eye_in_view = camera.view_matrix().transform_point(&camera.eye().into());
        assert_relative_eq!(eye_in_view.coords, Vec3::zeros(), epsilon = 1e-5);
    }
}
