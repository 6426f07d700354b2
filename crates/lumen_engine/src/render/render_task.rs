//! Render task compiler
//!
//! [`parse_scene`] walks the scene graph depth first and turns every node's
//! render components into a flat list of [`RenderTask`]s. Per node the
//! tasks always come out in the same order:
//!
//! `UseShader`, `SetCamera`, `SetLights`, `SetTransform`, `UseTexture2D`,
//! `SetMaterial`, `Draw`
//!
//! Tasks after `UseShader` act on whatever shader is current, which
//! [`RenderContext`] carries from one task to the next.

use crate::ecs::{Camera, Entity, LightSources, Material, Scene, Shared, Transform};
use crate::foundation::math::{mat4_to_array, Vec4};
use crate::render::api::{GraphicsDevice, UniformKind, UniformValue};
use crate::render::resources::{Renderable, ShaderProgram, Texture2D, UniformBuffers};
use crate::render::shaders::{
    LIGHT_SOURCES_BLOCK, MATERIAL_AMBIENT_UNIFORM, MATERIAL_DIFFUSE_UNIFORM, MATERIAL_SHININESS_UNIFORM,
    MATERIAL_SPECULAR_UNIFORM, MATRIX_BLOCK, MAX_LIGHTS, MODEL_MATRIX_UNIFORM, TEXTURE_SAMPLER_UNIFORM,
};
use crate::render::{RenderError, RenderResult};
use crate::scene::hierarchy;
use std::fmt;
use std::rc::Rc;

/// Kind of a [`RenderTask`], in execution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderTaskKind {
    /// Make a shader current
    UseShader,
    /// Upload view and projection
    SetCamera,
    /// Upload the light list
    SetLights,
    /// Upload the model matrix
    SetTransform,
    /// Bind a texture to unit 0
    UseTexture2D,
    /// Upload material parameters
    SetMaterial,
    /// Issue a draw call
    Draw,
}

/// One compiled state change or draw
#[derive(Clone)]
pub enum RenderTask {
    /// Make the shader current for the following tasks
    UseShader(Shared<ShaderProgram>),
    /// Write the camera's matrices to the `Matrix` block
    SetCamera(Shared<Camera>),
    /// Write the packed lights to the `LightSources` block
    SetLights(Shared<LightSources>),
    /// Set `model_matrix` to the node's world transform
    SetTransform(Shared<Transform>),
    /// Bind the texture to unit 0 and point the sampler at it
    UseTexture2D(Shared<Texture2D>),
    /// Set the `material.*` uniforms
    SetMaterial(Shared<Material>),
    /// Draw the mesh
    Draw(Shared<Renderable>),
}

impl fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderTask::{:?}", self.kind())
    }
}

/// State threaded through task execution
pub struct RenderContext<'a> {
    /// Device the tasks run against
    pub device: &'a mut dyn GraphicsDevice,
    /// Shared uniform block storage
    pub uniform_buffers: &'a mut UniformBuffers,
    shader: Option<Shared<ShaderProgram>>,
}

impl<'a> RenderContext<'a> {
    /// Start with no shader current
    pub fn new(device: &'a mut dyn GraphicsDevice, uniform_buffers: &'a mut UniformBuffers) -> Self {
        Self {
            device,
            uniform_buffers,
            shader: None,
        }
    }

    /// Shader made current by the last `UseShader`
    pub fn shader(&self) -> Option<&Shared<ShaderProgram>> {
        self.shader.as_ref()
    }

    fn active_shader(&self, kind: RenderTaskKind) -> RenderResult<Shared<ShaderProgram>> {
        self.shader.clone().ok_or(RenderError::NoActiveShader(kind))
    }
}

impl RenderTask {
    /// Kind of this task
    pub const fn kind(&self) -> RenderTaskKind {
        match self {
            Self::UseShader(_) => RenderTaskKind::UseShader,
            Self::SetCamera(_) => RenderTaskKind::SetCamera,
            Self::SetLights(_) => RenderTaskKind::SetLights,
            Self::SetTransform(_) => RenderTaskKind::SetTransform,
            Self::UseTexture2D(_) => RenderTaskKind::UseTexture2D,
            Self::SetMaterial(_) => RenderTaskKind::SetMaterial,
            Self::Draw(_) => RenderTaskKind::Draw,
        }
    }

    /// Perform the task
    ///
    /// Every task except `UseShader` needs a current shader and fails with
    /// [`RenderError::NoActiveShader`] without one.
    pub fn execute(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        match self {
            Self::UseShader(shader) => {
                shader.borrow().use_program(ctx.device);
                ctx.shader = Some(Rc::clone(shader));
            }
            Self::SetCamera(camera) => {
                let shader = ctx.active_shader(RenderTaskKind::SetCamera)?;
                let (width, height) = ctx.device.canvas_size();
                let mut camera = camera.borrow_mut();
                if height > 0 {
                    camera.set_aspect(width as f32 / height as f32);
                }
                let mut matrices = Vec::with_capacity(32);
                matrices.extend_from_slice(&mat4_to_array(&camera.view_matrix()));
                matrices.extend_from_slice(&mat4_to_array(&camera.projection_matrix()));
                ctx.uniform_buffers
                    .write(ctx.device, &shader.borrow(), MATRIX_BLOCK, &matrices)?;
            }
            Self::SetLights(lights) => {
                let shader = ctx.active_shader(RenderTaskKind::SetLights)?;
                let lights = lights.borrow();
                if lights.lights().len() > MAX_LIGHTS {
                    return Err(RenderError::TooManyLights {
                        count: lights.lights().len(),
                        max: MAX_LIGHTS,
                    });
                }
                let packed = lights.packed();
                ctx.uniform_buffers
                    .write(ctx.device, &shader.borrow(), LIGHT_SOURCES_BLOCK, &packed)?;
            }
            Self::SetTransform(transform) => {
                let shader = ctx.active_shader(RenderTaskKind::SetTransform)?;
                let model = mat4_to_array(transform.borrow().world_transform());
                shader
                    .borrow()
                    .set_uniform(ctx.device, MODEL_MATRIX_UNIFORM, UniformValue::Mat4(model))?;
            }
            Self::UseTexture2D(texture) => {
                let shader = ctx.active_shader(RenderTaskKind::UseTexture2D)?;
                ctx.device.active_texture(0);
                shader
                    .borrow()
                    .set_uniform(ctx.device, TEXTURE_SAMPLER_UNIFORM, UniformValue::Int(0))?;
                texture.borrow().bind(ctx.device);
            }
            Self::SetMaterial(material) => {
                let shader = ctx.active_shader(RenderTaskKind::SetMaterial)?;
                let shader = shader.borrow();
                let material = *material.borrow();
                for (name, color) in [
                    (MATERIAL_AMBIENT_UNIFORM, material.ambient),
                    (MATERIAL_DIFFUSE_UNIFORM, material.diffuse),
                    (MATERIAL_SPECULAR_UNIFORM, material.specular),
                ] {
                    let value = color_value(shader.uniform_kind(name), &color);
                    shader.set_uniform(ctx.device, name, value)?;
                }
                shader.set_uniform(
                    ctx.device,
                    MATERIAL_SHININESS_UNIFORM,
                    UniformValue::Float(material.shininess),
                )?;
            }
            Self::Draw(renderable) => {
                ctx.active_shader(RenderTaskKind::Draw)?;
                renderable.borrow().draw(ctx.device);
            }
        }
        Ok(())
    }
}

/// Shaders may declare material colours as `vec3`; they get the RGB part
fn color_value(kind: Option<UniformKind>, color: &Vec4) -> UniformValue {
    match kind {
        Some(UniformKind::Vec3) => UniformValue::Vec3([color.x, color.y, color.z]),
        _ => UniformValue::Vec4([color.x, color.y, color.z, color.w]),
    }
}

/// The render components of one entity
#[derive(Default, Clone)]
pub struct RenderBundle {
    /// Shader to make current
    pub shader: Option<Shared<ShaderProgram>>,
    /// Camera to upload
    pub camera: Option<Shared<Camera>>,
    /// Lights to upload
    pub lights: Option<Shared<LightSources>>,
    /// Node transform
    pub transform: Option<Shared<Transform>>,
    /// Texture to bind
    pub texture: Option<Shared<Texture2D>>,
    /// Surface parameters
    pub material: Option<Shared<Material>>,
    /// Mesh to draw
    pub renderable: Option<Shared<Renderable>>,
}

impl RenderBundle {
    /// Snapshot the render components attached to `entity`
    pub fn collect(scene: &Scene, entity: Entity) -> Self {
        Self {
            shader: scene.get_component(entity),
            camera: scene.get_component(entity),
            lights: scene.get_component(entity),
            transform: scene.get_component(entity),
            texture: scene.get_component(entity),
            material: scene.get_component(entity),
            renderable: scene.get_component(entity),
        }
    }

    /// Append this bundle's tasks in priority order
    pub fn compile_into(&self, tasks: &mut Vec<RenderTask>) {
        tasks.extend(self.shader.clone().map(RenderTask::UseShader));
        tasks.extend(self.camera.clone().map(RenderTask::SetCamera));
        tasks.extend(self.lights.clone().map(RenderTask::SetLights));
        tasks.extend(self.transform.clone().map(RenderTask::SetTransform));
        tasks.extend(self.texture.clone().map(RenderTask::UseTexture2D));
        tasks.extend(self.material.clone().map(RenderTask::SetMaterial));
        tasks.extend(self.renderable.clone().map(RenderTask::Draw));
    }

    /// This bundle's tasks in priority order
    pub fn compile(&self) -> Vec<RenderTask> {
        let mut tasks = Vec::new();
        self.compile_into(&mut tasks);
        tasks
    }
}

/// Compile every scene node into tasks, parents before children
pub fn parse_scene(scene: &Scene) -> Vec<RenderTask> {
    let mut tasks = Vec::new();
    for entity in hierarchy::traverse(scene) {
        RenderBundle::collect(scene, entity).compile_into(&mut tasks);
    }
    log::trace!("Compiled {} render tasks", tasks.len());
    tasks
}

/// Run `tasks` in order, stopping at the first failure
pub fn execute_all(tasks: &[RenderTask], ctx: &mut RenderContext<'_>) -> RenderResult<()> {
    tasks.iter().try_for_each(|task| task.execute(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Light, SceneNode};
    use crate::foundation::math::Vec3;
    use crate::render::api::SamplerParams;
    use crate::render::backends::DeviceCommand;
    use crate::render::resources::{MeshData, ShaderKind, LIGHT_SOURCES_BINDING, MATRIX_BINDING};
    use crate::render::HeadlessDevice;
    use approx::assert_relative_eq;

    fn render_scene() -> Scene {
        let mut scene = Scene::new();
        scene.register_component_type::<SceneNode>();
        scene.register_component_type::<ShaderProgram>();
        scene.register_component_type::<Camera>();
        scene.register_component_type::<LightSources>();
        scene.register_component_type::<Transform>();
        scene.register_component_type::<Texture2D>();
        scene.register_component_type::<Material>();
        scene.register_component_type::<Renderable>();
        scene
    }

    fn kinds(tasks: &[RenderTask]) -> Vec<RenderTaskKind> {
        tasks.iter().map(RenderTask::kind).collect()
    }

    fn white_texture(device: &mut HeadlessDevice) -> Texture2D {
        Texture2D::from_pixels(device, 1, 1, &[255; 4], SamplerParams::default()).unwrap()
    }

    /// One entity carrying every render component
    fn full_entity(scene: &mut Scene, device: &mut HeadlessDevice, kind: ShaderKind) -> Entity {
        let entity = scene.spawn();
        scene.set_component(entity, SceneNode::new());
        scene.set_component(entity, ShaderProgram::builtin(device, kind).unwrap());
        scene.set_component(entity, Camera::new());
        scene.set_component(
            entity,
            LightSources::new(vec![Light::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.1, 0.2, 0.3))]),
        );
        scene.set_component(entity, Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        scene.set_component(entity, white_texture(device));
        scene.set_component(entity, Material::default());
        scene.set_component(entity, Renderable::new(device, &MeshData::cube(0.5)).unwrap());
        entity
    }

    #[test]
    fn test_full_bundle_emits_seven_tasks_in_order() {
        let mut device = HeadlessDevice::new(64, 32);
        let mut scene = render_scene();
        full_entity(&mut scene, &mut device, ShaderKind::Phong);

        let tasks = parse_scene(&scene);
        assert_eq!(
            kinds(&tasks),
            vec![
                RenderTaskKind::UseShader,
                RenderTaskKind::SetCamera,
                RenderTaskKind::SetLights,
                RenderTaskKind::SetTransform,
                RenderTaskKind::UseTexture2D,
                RenderTaskKind::SetMaterial,
                RenderTaskKind::Draw,
            ]
        );
    }

    #[test]
    fn test_partial_bundle_emits_only_present_tasks() {
        let mut device = HeadlessDevice::new(64, 32);
        let mut scene = render_scene();
        let entity = scene.spawn();
        scene.set_component(entity, SceneNode::new());
        scene.set_component(entity, Renderable::new(&mut device, &MeshData::cube(1.0)).unwrap());
        scene.set_component(entity, Material::default());
        scene.set_component(entity, Transform::identity());

        let tasks = parse_scene(&scene);
        assert_eq!(
            kinds(&tasks),
            vec![
                RenderTaskKind::SetTransform,
                RenderTaskKind::SetMaterial,
                RenderTaskKind::Draw,
            ]
        );
    }

    #[test]
    fn test_entities_without_scene_node_are_skipped() {
        let mut scene = render_scene();
        let entity = scene.spawn();
        scene.set_component(entity, Transform::identity());
        assert!(parse_scene(&scene).is_empty());
    }

    #[test]
    fn test_parents_compile_before_children() {
        let mut scene = render_scene();
        // Child gets the lower id so id order alone would put it first
        let child = scene.spawn();
        let parent = scene.spawn();
        scene.set_component(child, SceneNode::new());
        scene.set_component(parent, SceneNode::new());
        let child_transform = scene.set_component(child, Transform::identity()).unwrap();
        let parent_transform = scene.set_component(parent, Transform::identity()).unwrap();
        assert!(hierarchy::attach_child(&scene, parent, child));

        let tasks = parse_scene(&scene);
        assert_eq!(tasks.len(), 2);
        match (&tasks[0], &tasks[1]) {
            (RenderTask::SetTransform(first), RenderTask::SetTransform(second)) => {
                assert!(Rc::ptr_eq(first, &parent_transform));
                assert!(Rc::ptr_eq(second, &child_transform));
            }
            other => panic!("unexpected tasks {other:?}"),
        }
    }

    #[test]
    fn test_task_without_shader_fails() {
        let mut device = HeadlessDevice::new(64, 32);
        let mut buffers = UniformBuffers::new();
        let mut ctx = RenderContext::new(&mut device, &mut buffers);

        let task = RenderTask::SetTransform(Rc::new(std::cell::RefCell::new(Transform::identity())));
        assert_eq!(
            task.execute(&mut ctx),
            Err(RenderError::NoActiveShader(RenderTaskKind::SetTransform))
        );
    }

    #[test]
    fn test_execute_uploads_state_and_draws() {
        let mut device = HeadlessDevice::new(64, 32);
        let mut scene = render_scene();
        let entity = full_entity(&mut scene, &mut device, ShaderKind::Phong);
        crate::ecs::systems::propagate_transforms(&scene);
        let program = scene.get_component::<ShaderProgram>(entity).unwrap().borrow().program();
        let texture = scene.get_component::<Texture2D>(entity).unwrap().borrow().texture();

        let tasks = parse_scene(&scene);
        let mut buffers = UniformBuffers::new();
        {
            let mut ctx = RenderContext::new(&mut device, &mut buffers);
            execute_all(&tasks, &mut ctx).unwrap();
            assert!(ctx.shader().is_some());
        }

        let camera = scene.get_component::<Camera>(entity).unwrap();
        assert_relative_eq!(camera.borrow().aspect(), 2.0);

        let matrix_buffer = buffers.buffer(MATRIX_BINDING).unwrap();
        let uploaded: Vec<f32> = bytemuck::pod_collect_to_vec(device.buffer_contents(matrix_buffer).unwrap());
        let mut expected = mat4_to_array(&camera.borrow().view_matrix()).to_vec();
        expected.extend_from_slice(&mat4_to_array(&camera.borrow().projection_matrix()));
        assert_eq!(uploaded, expected);

        match device.uniform_value(program, MODEL_MATRIX_UNIFORM) {
            Some(UniformValue::Mat4(model)) => assert_relative_eq!(model[12], 1.0),
            other => panic!("model matrix not set: {other:?}"),
        }
        assert_eq!(
            device.uniform_value(program, TEXTURE_SAMPLER_UNIFORM),
            Some(UniformValue::Int(0))
        );
        assert_eq!(device.bound_texture(0), Some(texture));
        assert_eq!(
            device.uniform_value(program, MATERIAL_DIFFUSE_UNIFORM),
            Some(UniformValue::Vec4([0.8, 0.8, 0.8, 1.0]))
        );
        assert_eq!(
            device.uniform_value(program, MATERIAL_SHININESS_UNIFORM),
            Some(UniformValue::Float(32.0))
        );
        assert_eq!(device.draw_calls().count(), 1);
        assert_eq!(device.take_error(), None);
    }

    #[test]
    fn test_vec3_material_fields_get_rgb() {
        let mut device = HeadlessDevice::new(64, 32);
        let mut scene = render_scene();
        let entity = full_entity(&mut scene, &mut device, ShaderKind::Lambert);
        let program = scene.get_component::<ShaderProgram>(entity).unwrap().borrow().program();

        let tasks = parse_scene(&scene);
        let mut buffers = UniformBuffers::new();
        let mut ctx = RenderContext::new(&mut device, &mut buffers);
        execute_all(&tasks, &mut ctx).unwrap();

        assert_eq!(
            device.uniform_value(program, MATERIAL_AMBIENT_UNIFORM),
            Some(UniformValue::Vec3([0.1, 0.1, 0.1]))
        );
        // Lambert has no specular term and no sampler: silently skipped
        assert_eq!(device.uniform_value(program, MATERIAL_SPECULAR_UNIFORM), None);
        assert!(!device
            .commands()
            .iter()
            .any(|command| matches!(command, DeviceCommand::SetUniform { name, .. } if name == TEXTURE_SAMPLER_UNIFORM)));
    }

    #[test]
    fn test_shrinking_light_list_clears_removed_lights() {
        let mut device = HeadlessDevice::new(64, 32);
        let shader = Rc::new(std::cell::RefCell::new(
            ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap(),
        ));
        let lights = Rc::new(std::cell::RefCell::new(LightSources::new(vec![
            Light::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0)),
            Light::new(Vec3::new(4.0, 5.0, 6.0), Vec3::new(9.0, 9.0, 9.0)),
        ])));
        let tasks = [
            RenderTask::UseShader(shader),
            RenderTask::SetLights(Rc::clone(&lights)),
        ];

        let mut buffers = UniformBuffers::new();
        {
            let mut ctx = RenderContext::new(&mut device, &mut buffers);
            execute_all(&tasks, &mut ctx).unwrap();
        }
        lights.borrow_mut().0.truncate(1);
        {
            let mut ctx = RenderContext::new(&mut device, &mut buffers);
            execute_all(&tasks, &mut ctx).unwrap();
        }

        let buffer = buffers.buffer(LIGHT_SOURCES_BINDING).unwrap();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(device.buffer_contents(buffer).unwrap());
        assert_eq!(&floats[..8], &[1.0, 2.0, 3.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
        assert!(floats[8..].iter().all(|&value| value == 0.0));
    }

    #[test]
    fn test_too_many_lights_are_rejected() {
        let mut device = HeadlessDevice::new(64, 32);
        let shader = Rc::new(std::cell::RefCell::new(
            ShaderProgram::builtin(&mut device, ShaderKind::Phong).unwrap(),
        ));
        let lights = vec![Light::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)); 5];
        let tasks = [
            RenderTask::UseShader(shader),
            RenderTask::SetLights(Rc::new(std::cell::RefCell::new(LightSources::new(lights)))),
        ];

        let mut buffers = UniformBuffers::new();
        let mut ctx = RenderContext::new(&mut device, &mut buffers);
        assert!(matches!(
            execute_all(&tasks, &mut ctx),
            Err(RenderError::TooManyLights { count: 5, max: 4 })
        ));
        assert_eq!(buffers.buffer(LIGHT_SOURCES_BINDING), None);
    }
}
