//! ECS Components module
//!
//! Scene-side components. Render resources that double as components
//! (shader programs, textures, renderables) live in `render::resources`.

pub mod camera;
pub mod lighting;
pub mod material;
pub mod scene_node;
pub mod transform;

pub use camera::Camera;
pub use lighting::{pack_lights, Light, LightSources, PACKED_LIGHT_FLOATS};
pub use material::Material;
pub use scene_node::SceneNode;
pub use transform::Transform;
