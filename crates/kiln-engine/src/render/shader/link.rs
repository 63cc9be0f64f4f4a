use crate::render::RenderError;

use super::reflect::StageInterface;

/// Checks that the fragment stage only consumes what the vertex stage produces.
///
/// Varyings match by location and type. Uniform blocks read by both stages at
/// the same binding must have the same layout.
pub(crate) fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<(), RenderError> {
    for input in &fragment.inputs {
        match vertex.output(input.location) {
            Some(out) if out.ty == input.ty => {}
            Some(out) => {
                return Err(RenderError::InterfaceMismatch(format!(
                    "fragment input `{}` at location {} is {}, but the vertex stage writes {} (`{}`)",
                    input.name, input.location, input.ty, out.ty, out.name
                )));
            }
            None => {
                if let Some(other) = vertex.output_named(&input.name) {
                    return Err(RenderError::InterfaceMismatch(format!(
                        "fragment input `{}` expects location {}, but the vertex stage writes it at location {}",
                        input.name, input.location, other.location
                    )));
                }
                return Err(RenderError::InterfaceMismatch(format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )));
            }
        }
    }

    if fragment.output(0).is_none() {
        return Err(RenderError::InterfaceMismatch(
            "fragment stage writes no color at location 0".to_string(),
        ));
    }

    for vb in &vertex.uniforms {
        if let Some(fb) = fragment.uniform(vb.group, vb.binding) {
            if !vb.same_layout(fb) {
                return Err(RenderError::InterfaceMismatch(format!(
                    "uniform block at group {}, binding {} differs between stages (`{}` vs `{}`)",
                    vb.group, vb.binding, vb.name, fb.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shader::{parse_stage, ShaderSource, ShaderStage};

    fn vertex(src: &str) -> StageInterface {
        parse_stage(ShaderStage::Vertex, &ShaderSource::wgsl(src, "vs"))
            .unwrap()
            .interface
    }

    fn fragment(src: &str) -> StageInterface {
        parse_stage(ShaderStage::Fragment, &ShaderSource::wgsl(src, "fs"))
            .unwrap()
            .interface
    }

    const VS_LOC0: &str = r"
struct Out { @builtin(position) p: vec4<f32>, @location(0) tex_coord: vec2<f32> };
@vertex fn vs(@location(0) pos: vec2<f32>) -> Out {
    var o: Out;
    o.p = vec4<f32>(pos, 0.0, 1.0);
    o.tex_coord = pos;
    return o;
}
";

    #[test]
    fn matching_varyings_link() {
        let fs = fragment(
            "@fragment fn fs(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(tex_coord, 0.0, 1.0); }",
        );
        assert_eq!(link(&vertex(VS_LOC0), &fs), Ok(()));
    }

    #[test]
    fn location_disagreement_is_a_mismatch() {
        let fs = fragment(
            "@fragment fn fs(@location(1) tex_coord: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(tex_coord, 0.0, 1.0); }",
        );
        let err = link(&vertex(VS_LOC0), &fs).unwrap_err();
        assert!(matches!(&err, RenderError::InterfaceMismatch(m) if m.contains("expects location 1")));
    }

    #[test]
    fn type_disagreement_is_a_mismatch() {
        let fs = fragment(
            "@fragment fn fs(@location(0) tex_coord: vec4<f32>) -> @location(0) vec4<f32> { return tex_coord; }",
        );
        assert!(matches!(
            link(&vertex(VS_LOC0), &fs),
            Err(RenderError::InterfaceMismatch(_))
        ));
    }

    #[test]
    fn missing_color_output_is_a_mismatch() {
        let fs = fragment(
            "@fragment fn fs(@location(0) tex_coord: vec2<f32>) -> @location(1) vec4<f32> { return vec4<f32>(tex_coord, 0.0, 1.0); }",
        );
        let err = link(&vertex(VS_LOC0), &fs).unwrap_err();
        assert!(err.to_string().contains("location 0"));
    }

    #[test]
    fn uniform_layout_disagreement_is_a_mismatch() {
        let vs = vertex(
            "@group(0) @binding(0) var<uniform> m: mat4x4<f32>;\n@vertex fn vs() -> @builtin(position) vec4<f32> { return m[0]; }",
        );
        let fs = fragment(
            "@group(0) @binding(0) var<uniform> c: vec4<f32>;\n@fragment fn fs() -> @location(0) vec4<f32> { return c; }",
        );
        assert!(matches!(link(&vs, &fs), Err(RenderError::InterfaceMismatch(_))));
    }
}
