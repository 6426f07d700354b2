//! Minimal GLSL interface scanner
//!
//! Extracts what a linker would report about a shader's interface: plain
//! uniforms (with struct members expanded), uniform blocks with their std140
//! sizes, vertex inputs with their locations, and whether `main` is defined.
//! Function bodies are skipped, not checked.

use crate::render::api::{gl_type, ActiveAttribute, ActiveUniform, ActiveUniformBlock};
use std::collections::HashMap;

/// Interface of one compiled stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageInterface {
    /// Plain uniforms in declaration order
    pub uniforms: Vec<ActiveUniform>,
    /// Uniform blocks in declaration order, indices not yet assigned
    pub blocks: Vec<ActiveUniformBlock>,
    /// `in` declarations in declaration order
    pub inputs: Vec<ActiveAttribute>,
    /// Whether `void main()` is defined
    pub has_main: bool,
}

#[derive(Debug, Clone)]
struct Member {
    ty: String,
    name: String,
    array_len: Option<u32>,
}

#[derive(Debug, Default)]
struct Statement {
    head: Vec<String>,
    body: Option<Vec<String>>,
}

/// Scan one stage's source
pub fn scan(source: &str) -> Result<StageInterface, String> {
    let tokens = tokenize(&strip_comments(source));
    let statements = split_statements(&tokens)?;

    let mut structs: HashMap<String, Vec<Member>> = HashMap::new();
    let mut interface = StageInterface::default();
    let mut next_location = 0;

    for statement in statements {
        let (layout, head) = take_layout(&statement.head)?;
        let head: Vec<&str> = head
            .iter()
            .map(String::as_str)
            .filter(|token| !is_ignored_qualifier(token))
            .collect();
        let Some(&first) = head.first() else {
            continue;
        };

        match (first, &statement.body) {
            ("precision", _) => {}
            ("struct", Some(body)) => {
                let name = head.get(1).ok_or("struct without a name")?;
                structs.insert((*name).to_string(), parse_members(body)?);
            }
            ("uniform", Some(body)) => {
                let name = head.get(1).ok_or("uniform block without a name")?;
                let members = parse_members(body)?;
                let (_, size) = std140_members(&members, &structs)?;
                interface.blocks.push(ActiveUniformBlock {
                    name: (*name).to_string(),
                    index: 0,
                    data_size: round_up(size, 16),
                });
            }
            ("uniform", None) => {
                let member = parse_declaration(&head[1..])?;
                expand_uniform(&member.name, &member, &structs, &mut interface.uniforms)?;
            }
            ("in", None) => {
                let member = parse_declaration(&head[1..])?;
                let gl = type_code(&member.ty).ok_or_else(|| format!("unknown input type `{}`", member.ty))?;
                let location = match layout.get("location") {
                    Some(location) => *location,
                    None => next_location,
                };
                next_location = next_location.max(location + 1);
                interface.inputs.push(ActiveAttribute {
                    name: member.name,
                    gl_type: gl,
                    location,
                });
            }
            (_, Some(_)) if head.windows(2).any(|pair| pair == ["main", "("]) => {
                interface.has_main = true;
            }
            _ => {}
        }
    }
    Ok(interface)
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
            out.push(' ');
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(index, next)) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' || (c.is_ascii_digit() && next == '.') {
                    end = index + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(source[start..end].to_string());
        } else {
            tokens.push(c.to_string());
        }
    }
    tokens
}

fn split_statements(tokens: &[String]) -> Result<Vec<Statement>, String> {
    let mut statements = Vec::new();
    let mut current = Statement::default();
    let mut depth = 0usize;
    let mut body = Vec::new();

    for token in tokens {
        match token.as_str() {
            "{" => {
                if depth > 0 {
                    body.push(token.clone());
                }
                depth += 1;
            }
            "}" => {
                depth = depth.checked_sub(1).ok_or("unbalanced `}`")?;
                if depth > 0 {
                    body.push(token.clone());
                    continue;
                }
                current.body = Some(std::mem::take(&mut body));
                // Function definitions end at their closing brace
                if current.head.iter().any(|t| t == "(") {
                    statements.push(std::mem::take(&mut current));
                }
            }
            ";" if depth == 0 => statements.push(std::mem::take(&mut current)),
            _ if depth > 0 => body.push(token.clone()),
            // Instance names after a block body
            _ if current.body.is_some() => {}
            _ => current.head.push(token.clone()),
        }
    }

    if depth != 0 {
        return Err("unbalanced `{`".to_string());
    }
    if !current.head.is_empty() {
        return Err(format!("unterminated declaration starting with `{}`", current.head[0]));
    }
    Ok(statements)
}

/// Split a leading `layout(...)` off a declaration
fn take_layout(head: &[String]) -> Result<(HashMap<String, u32>, &[String]), String> {
    let mut qualifiers = HashMap::new();
    if head.first().map(String::as_str) != Some("layout") {
        return Ok((qualifiers, head));
    }
    let close = head
        .iter()
        .position(|token| token == ")")
        .ok_or("unterminated layout qualifier")?;
    for entry in head[2..close].split(|token| token == ",") {
        if let [key, eq, value] = entry {
            if eq == "=" {
                let value = value
                    .parse()
                    .map_err(|_| format!("invalid layout value `{value}`"))?;
                qualifiers.insert(key.clone(), value);
            }
        }
    }
    Ok((qualifiers, &head[close + 1..]))
}

fn is_ignored_qualifier(token: &str) -> bool {
    matches!(
        token,
        "highp" | "mediump" | "lowp" | "flat" | "smooth" | "centroid" | "const"
    )
}

/// Parse `type name [N]` from the tokens of one declaration
fn parse_declaration(tokens: &[&str]) -> Result<Member, String> {
    let tokens: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|token| !is_ignored_qualifier(token))
        .collect();
    match tokens.as_slice() {
        [ty, name] => Ok(Member {
            ty: (*ty).to_string(),
            name: (*name).to_string(),
            array_len: None,
        }),
        [ty, name, "[", len, "]"] => Ok(Member {
            ty: (*ty).to_string(),
            name: (*name).to_string(),
            array_len: Some(len.parse().map_err(|_| format!("invalid array length `{len}`"))?),
        }),
        _ => Err(format!("cannot parse declaration `{}`", tokens.join(" "))),
    }
}

fn parse_members(body: &[String]) -> Result<Vec<Member>, String> {
    body.split(|token| token == ";")
        .filter(|tokens| !tokens.is_empty())
        .map(|tokens| {
            let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
            parse_declaration(&tokens)
        })
        .collect()
}

fn expand_uniform(
    name: &str,
    member: &Member,
    structs: &HashMap<String, Vec<Member>>,
    out: &mut Vec<ActiveUniform>,
) -> Result<(), String> {
    if let Some(fields) = structs.get(&member.ty) {
        let names: Vec<String> = match member.array_len {
            Some(len) => (0..len).map(|i| format!("{name}[{i}]")).collect(),
            None => vec![name.to_string()],
        };
        for prefix in names {
            for field in fields {
                expand_uniform(&format!("{prefix}.{}", field.name), field, structs, out)?;
            }
        }
        return Ok(());
    }

    let gl = type_code(&member.ty).ok_or_else(|| format!("unknown uniform type `{}`", member.ty))?;
    if out.iter().all(|existing| existing.name != name) {
        out.push(ActiveUniform {
            name: name.to_string(),
            gl_type: gl,
            size: member.array_len.unwrap_or(1),
        });
    }
    Ok(())
}

fn type_code(ty: &str) -> Option<u32> {
    Some(match ty {
        "float" => gl_type::FLOAT,
        "int" => gl_type::INT,
        "bool" => gl_type::BOOL,
        "vec2" => gl_type::FLOAT_VEC2,
        "vec3" => gl_type::FLOAT_VEC3,
        "vec4" => gl_type::FLOAT_VEC4,
        "ivec2" => gl_type::INT_VEC2,
        "mat3" => gl_type::FLOAT_MAT3,
        "mat4" => gl_type::FLOAT_MAT4,
        "sampler2D" => gl_type::SAMPLER_2D,
        _ => return None,
    })
}

const fn round_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// std140 (alignment, size) of one non-array type
fn std140_type(ty: &str, structs: &HashMap<String, Vec<Member>>) -> Result<(usize, usize), String> {
    if let Some(fields) = structs.get(ty) {
        let (align, size) = std140_members(fields, structs)?;
        let align = round_up(align, 16);
        return Ok((align, round_up(size, align)));
    }
    Ok(match ty {
        "float" | "int" | "bool" => (4, 4),
        "vec2" | "ivec2" => (8, 8),
        "vec3" => (16, 12),
        "vec4" => (16, 16),
        "mat3" => (16, 48),
        "mat4" => (16, 64),
        _ => return Err(format!("unknown block member type `{ty}`")),
    })
}

/// std140 (alignment, unpadded size) of a member list
fn std140_members(members: &[Member], structs: &HashMap<String, Vec<Member>>) -> Result<(usize, usize), String> {
    let mut offset = 0;
    let mut max_align = 4;
    for member in members {
        let (align, size) = std140_type(&member.ty, structs)?;
        let (align, size) = match member.array_len {
            Some(len) => {
                let stride = round_up(size, 16);
                (round_up(align, 16), stride * len as usize)
            }
            None => (align, size),
        };
        offset = round_up(offset, align) + size;
        max_align = max_align.max(align);
    }
    Ok((max_align, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 300 es
        // comment with uniform float ignored;
        layout(location = 0) in vec3 position;
        layout(location = 2) in vec2 texcoord;
        in vec3 normal;
        uniform Matrix { mat4 view; mat4 projection; };
        uniform mat4 model_matrix;
        out vec2 uv;
        void main() {
            uv = texcoord;
            gl_Position = projection * view * model_matrix * vec4(position, 1.0);
        }
    ";

    const FRAGMENT: &str = r"#version 300 es
        precision highp float;
        struct Light { vec3 position; vec3 color; };
        struct Surface { vec3 ambient; float shininess; };
        /* block comment */
        layout(std140) uniform LightSources { Light lights[4]; };
        uniform Surface material;
        uniform sampler2D texture_sampler;
        out vec4 frag_color;
        void main() { if (true) { frag_color = vec4(1.0); } }
    ";

    #[test]
    fn test_vertex_interface() {
        let interface = scan(VERTEX).unwrap();
        assert!(interface.has_main);

        let inputs: Vec<_> = interface.inputs.iter().map(|a| (a.name.as_str(), a.location)).collect();
        assert_eq!(inputs, vec![("position", 0), ("texcoord", 2), ("normal", 3)]);

        assert_eq!(interface.uniforms.len(), 1);
        assert_eq!(interface.uniforms[0].name, "model_matrix");
        assert_eq!(interface.uniforms[0].gl_type, gl_type::FLOAT_MAT4);

        assert_eq!(interface.blocks[0].name, "Matrix");
        assert_eq!(interface.blocks[0].data_size, 128);
    }

    #[test]
    fn test_fragment_interface_expands_structs() {
        let interface = scan(FRAGMENT).unwrap();
        let names: Vec<_> = interface.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["material.ambient", "material.shininess", "texture_sampler"]);
        assert_eq!(interface.uniforms[2].gl_type, gl_type::SAMPLER_2D);

        // Two padded vec3s per light
        assert_eq!(interface.blocks[0].name, "LightSources");
        assert_eq!(interface.blocks[0].data_size, 4 * 32);
    }

    #[test]
    fn test_missing_main_is_reported() {
        let interface = scan("uniform float x; void helper() {}").unwrap();
        assert!(!interface.has_main);
    }

    #[test]
    fn test_malformed_sources_fail() {
        assert!(scan("void main() {").is_err());
        assert!(scan("uniform float x").is_err());
        assert!(scan("uniform quaternion q; void main() {}").is_err());
    }

    #[test]
    fn test_std140_scalars_pack_tightly() {
        let interface = scan("uniform Params { float a; float b; vec2 c; vec3 d; }; void main() {}").unwrap();
        // a@0 b@4 c@8 d@16..28 -> 32
        assert_eq!(interface.blocks[0].data_size, 32);
    }
}
