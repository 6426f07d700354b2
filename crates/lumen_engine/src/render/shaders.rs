//! Built-in GLSL ES 3.00 shader sources
//!
//! Scene shaders share two uniform blocks: `Matrix` (view and projection)
//! and `LightSources` (up to [`MAX_LIGHTS`] point lights). Scene fragment
//! shaders write the lit colour to output 0 and the part brighter than 1.0
//! to output 1 for the bloom pass.

use crate::render::resources::{ShaderKind, ShaderSource};

/// Lights the `LightSources` block holds
pub const MAX_LIGHTS: usize = 4;

/// Name of the camera block
pub const MATRIX_BLOCK: &str = "Matrix";

/// Name of the lights block
pub const LIGHT_SOURCES_BLOCK: &str = "LightSources";

/// Model matrix uniform of scene shaders
pub const MODEL_MATRIX_UNIFORM: &str = "model_matrix";

/// Texture sampler uniform of scene shaders
pub const TEXTURE_SAMPLER_UNIFORM: &str = "texture_sampler";

/// Material uniforms of scene shaders, colours first
pub const MATERIAL_AMBIENT_UNIFORM: &str = "material.ambient";
/// See [`MATERIAL_AMBIENT_UNIFORM`]
pub const MATERIAL_DIFFUSE_UNIFORM: &str = "material.diffuse";
/// See [`MATERIAL_AMBIENT_UNIFORM`]
pub const MATERIAL_SPECULAR_UNIFORM: &str = "material.specular";
/// See [`MATERIAL_AMBIENT_UNIFORM`]
pub const MATERIAL_SHININESS_UNIFORM: &str = "material.shininess";

/// Blur direction toggle of the blur shader
pub const BLUR_HORIZONTAL_UNIFORM: &str = "horizontal";
/// Source image of the blur shader
pub const BLUR_IMAGE_UNIFORM: &str = "image";
/// HDR scene sampler of the composite shader
pub const COMPOSITE_SCENE_UNIFORM: &str = "scene";
/// Bloom sampler of the composite shader
pub const COMPOSITE_BLOOM_UNIFORM: &str = "bloom";
/// Tone mapping exposure of the composite shader
pub const COMPOSITE_EXPOSURE_UNIFORM: &str = "exposure";

const SCENE_VERTEX: &str = r"#version 300 es
layout(location = 0) in vec3 position;
layout(location = 1) in vec3 normal;
layout(location = 2) in vec2 texcoord;

layout(std140) uniform Matrix {
    mat4 view;
    mat4 projection;
};
uniform mat4 model_matrix;

out vec3 world_position;
out vec3 world_normal;
out vec2 uv;

void main() {
    vec4 world = model_matrix * vec4(position, 1.0);
    world_position = world.xyz;
    world_normal = mat3(transpose(inverse(model_matrix))) * normal;
    uv = texcoord;
    gl_Position = projection * view * world;
}
";

const PHONG_FRAGMENT: &str = r"#version 300 es
precision highp float;

struct Light {
    vec3 position;
    vec3 color;
};

struct Material {
    vec4 ambient;
    vec4 diffuse;
    vec4 specular;
    float shininess;
};

layout(std140) uniform Matrix {
    mat4 view;
    mat4 projection;
};
layout(std140) uniform LightSources {
    Light lights[MAX_LIGHTS];
};
uniform Material material;
uniform sampler2D texture_sampler;

in vec3 world_position;
in vec3 world_normal;
in vec2 uv;

layout(location = 0) out vec4 frag_color;
layout(location = 1) out vec4 bright_color;

void main() {
    vec3 base = texture(texture_sampler, uv).rgb;
    vec3 n = normalize(world_normal);
    vec3 eye = inverse(view)[3].xyz;
    vec3 v = normalize(eye - world_position);

    vec3 color = material.ambient.rgb * base;
    for (int i = 0; i < MAX_LIGHTS; ++i) {
        vec3 l = normalize(lights[i].position - world_position);
        vec3 r = reflect(-l, n);
        float diffuse = max(dot(n, l), 0.0);
        float specular = pow(max(dot(v, r), 0.0), material.shininess);
        color += lights[i].color * (diffuse * material.diffuse.rgb * base + specular * material.specular.rgb);
    }

    frag_color = vec4(color, material.diffuse.a);
    float brightness = dot(color, vec3(0.2126, 0.7152, 0.0722));
    bright_color = brightness > 1.0 ? vec4(color, 1.0) : vec4(0.0, 0.0, 0.0, 1.0);
}
";

const LAMBERT_FRAGMENT: &str = r"#version 300 es
precision highp float;

struct Light {
    vec3 position;
    vec3 color;
};

struct Material {
    vec3 ambient;
    vec3 diffuse;
};

layout(std140) uniform LightSources {
    Light lights[MAX_LIGHTS];
};
uniform Material material;

in vec3 world_position;
in vec3 world_normal;
in vec2 uv;

layout(location = 0) out vec4 frag_color;
layout(location = 1) out vec4 bright_color;

void main() {
    vec3 n = normalize(world_normal);
    vec3 color = material.ambient;
    for (int i = 0; i < MAX_LIGHTS; ++i) {
        vec3 l = normalize(lights[i].position - world_position);
        color += lights[i].color * max(dot(n, l), 0.0) * material.diffuse;
    }
    frag_color = vec4(color, 1.0);
    float brightness = dot(color, vec3(0.2126, 0.7152, 0.0722));
    bright_color = brightness > 1.0 ? vec4(color, 1.0) : vec4(0.0, 0.0, 0.0, 1.0);
}
";

const UNLIT_FRAGMENT: &str = r"#version 300 es
precision highp float;

struct Material {
    vec4 diffuse;
};

uniform Material material;
uniform sampler2D texture_sampler;

in vec3 world_position;
in vec3 world_normal;
in vec2 uv;

layout(location = 0) out vec4 frag_color;
layout(location = 1) out vec4 bright_color;

void main() {
    vec4 color = texture(texture_sampler, uv) * material.diffuse;
    frag_color = color;
    // Unlit surfaces are emitters: everything above 1.0 blooms
    bright_color = vec4(max(color.rgb - vec3(1.0), vec3(0.0)), 1.0);
}
";

const SCREEN_VERTEX: &str = r"#version 300 es
layout(location = 0) in vec3 position;
layout(location = 2) in vec2 texcoord;

out vec2 uv;

void main() {
    uv = texcoord;
    gl_Position = vec4(position.xy, 0.0, 1.0);
}
";

const BLUR_FRAGMENT: &str = r"#version 300 es
precision highp float;

uniform sampler2D image;
uniform bool horizontal;

in vec2 uv;
out vec4 frag_color;

const float weight[5] = float[](0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);

void main() {
    vec2 texel = 1.0 / vec2(textureSize(image, 0));
    vec2 step_dir = horizontal ? vec2(texel.x, 0.0) : vec2(0.0, texel.y);
    vec3 result = texture(image, uv).rgb * weight[0];
    for (int i = 1; i < 5; ++i) {
        result += texture(image, uv + step_dir * float(i)).rgb * weight[i];
        result += texture(image, uv - step_dir * float(i)).rgb * weight[i];
    }
    frag_color = vec4(result, 1.0);
}
";

const COMPOSITE_FRAGMENT: &str = r"#version 300 es
precision highp float;

uniform sampler2D scene;
uniform sampler2D bloom;
uniform float exposure;

in vec2 uv;
out vec4 frag_color;

void main() {
    vec3 hdr = texture(scene, uv).rgb + texture(bloom, uv).rgb;
    vec3 mapped = vec3(1.0) - exp(-hdr * exposure);
    frag_color = vec4(pow(mapped, vec3(1.0 / 2.2)), 1.0);
}
";

/// Source of a built-in shader
///
/// `MAX_LIGHTS` in the GLSL text is replaced by [`MAX_LIGHTS`].
pub fn source_for(kind: ShaderKind) -> ShaderSource {
    let (vertex, fragment) = match kind {
        ShaderKind::Phong => (SCENE_VERTEX, PHONG_FRAGMENT),
        ShaderKind::Lambert => (SCENE_VERTEX, LAMBERT_FRAGMENT),
        ShaderKind::Unlit => (SCENE_VERTEX, UNLIT_FRAGMENT),
        ShaderKind::Blur => (SCREEN_VERTEX, BLUR_FRAGMENT),
        ShaderKind::Composite => (SCREEN_VERTEX, COMPOSITE_FRAGMENT),
    };
    let lights = MAX_LIGHTS.to_string();
    ShaderSource::new(
        vertex.replace("MAX_LIGHTS", &lights),
        fragment.replace("MAX_LIGHTS", &lights),
    )
}
