//! Demo scene content
//!
//! One root node carries the shader, camera and lights so that every mesh
//! below it renders with them bound. A textured cube spins about a random
//! axis and carries a smaller satellite cube around with it.

use image::{Rgba, RgbaImage};
use lumen_engine::ecs::EcsResult;
use lumen_engine::foundation::math::Unit;
use lumen_engine::prelude::*;
use lumen_engine::render::RenderResult;
use rand::Rng;

/// Constant angular velocity
#[derive(Debug, Clone, Copy)]
pub struct Spin {
    /// Rotation axis
    pub axis: Unit<Vec3>,
    /// Radians per second
    pub speed: f32,
}

impl Component for Spin {}

/// Entities the demo reports on
#[derive(Debug, Clone, Copy)]
pub struct DemoEntities {
    /// Shader, camera and lights
    pub root: Entity,
    /// Spinning cube
    pub cube: Entity,
    /// Child of the cube
    pub satellite: Entity,
}

fn register_types(scene: &mut Scene) {
    scene.register_component_type::<SceneNode>();
    scene.register_component_type::<Transform>();
    scene.register_component_type::<ShaderProgram>();
    scene.register_component_type::<Camera>();
    scene.register_component_type::<LightSources>();
    scene.register_component_type::<Texture2D>();
    scene.register_component_type::<Material>();
    scene.register_component_type::<Renderable>();
    scene.register_component_type::<Spin>();
}

fn checkerboard(size: u32, cell: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([235, 235, 225, 255])
        } else {
            Rgba([40, 45, 70, 255])
        }
    })
}

/// Populate `scene` and upload its resources to `device`
pub fn build(scene: &mut Scene, device: &mut dyn GraphicsDevice, rng: &mut impl Rng) -> RenderResult<DemoEntities> {
    register_types(scene);

    let root = scene.spawn();
    scene.set_component(root, SceneNode::new());
    scene.set_component(root, ShaderProgram::builtin(device, ShaderKind::Phong)?);
    scene.set_component(root, Camera::looking_at(Vec3::new(0.0, 2.0, 6.0), Vec3::zeros()));
    scene.set_component(
        root,
        LightSources::new(vec![
            // Bright enough to push highlights past 1.0 and bloom
            Light::new(Vec3::new(4.0, 4.0, 4.0), Vec3::new(3.0, 2.7, 2.4)),
            Light::new(Vec3::new(-4.0, 1.0, -2.0), Vec3::new(0.2, 0.3, 0.6)),
        ]),
    );

    let texture = Texture2D::from_image(device, &checkerboard(64, 8))?;

    let cube = scene.spawn();
    scene.set_component(cube, SceneNode::new());
    scene.set_component(cube, Transform::identity());
    let shared_texture = scene.set_component(cube, texture);
    scene.set_component(cube, Material::default());
    scene.set_component(cube, Renderable::new(device, &MeshData::cube(0.75))?);
    let axis = Unit::new_normalize(Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(0.5..1.0),
        rng.gen_range(-1.0..1.0),
    ));
    scene.set_component(cube, Spin { axis, speed: 0.8 });

    let satellite = scene.spawn();
    scene.set_component(satellite, SceneNode::new());
    scene.set_component(
        satellite,
        Transform::from_trs(Vec3::new(2.0, 0.0, 0.0), Quat::identity(), Vec3::new(0.5, 0.5, 0.5)),
    );
    if let Some(texture) = shared_texture {
        scene.attach_shared(satellite, texture);
    }
    scene.set_component(
        satellite,
        Material::new(
            Vec4::new(0.1, 0.05, 0.0, 1.0),
            Vec4::new(1.0, 0.6, 0.2, 1.0),
            Vec4::new(1.0, 1.0, 1.0, 1.0),
            64.0,
        ),
    );
    scene.set_component(satellite, Renderable::new(device, &MeshData::cube(0.5))?);
    scene.set_component(
        satellite,
        Spin {
            axis: Vec3::y_axis(),
            speed: 3.0,
        },
    );

    attach_child(scene, root, cube);
    attach_child(scene, cube, satellite);

    log::info!(
        "Built demo scene: {} entities, spin axis ({:.2}, {:.2}, {:.2})",
        scene.entity_count(),
        axis.x,
        axis.y,
        axis.z
    );
    Ok(DemoEntities { root, cube, satellite })
}

/// Spin animation followed by world transform propagation
pub fn add_systems(scene: &mut Scene) -> EcsResult<()> {
    let spinning = Query::<(Transform, Spin)>::collect(scene)?;
    scene.add_system(
        QuerySystem::new(spinning, |dt: f32, (transform, spin): (&mut Transform, &mut Spin)| {
            transform.rotate(&Quat::from_axis_angle(&spin.axis, spin.speed * dt));
        })
        .with_name("spin"),
    );
    scene.add_system(TransformPropagationSystem::new());
    Ok(())
}
