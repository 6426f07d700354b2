//! ECS Systems module

pub mod transform_propagation;

pub use transform_propagation::{propagate_transforms, TransformPropagationSystem};
