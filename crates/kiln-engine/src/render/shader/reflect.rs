//! Reflected stage interfaces.
//!
//! A validated naga module is reduced to what the pipeline cares about:
//! located inputs/outputs, the uniform blocks the entry point reads (with
//! their byte layout) and every resource binding it uses, by name.

use std::fmt;

use wgpu::naga;

use super::frontend::SourceError;
use super::source::ShaderStage;

// ── types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Float,
    Sint,
    Uint,
    Bool,
}

/// Host-shareable shader type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ShaderType {
    Scalar(ScalarKind),
    Vector { size: u8, kind: ScalarKind },
    /// Float matrix with `columns` column vectors of `rows` components.
    Matrix { columns: u8, rows: u8 },
    /// Fixed-size array; `stride` is the byte distance between elements.
    Array {
        element: Box<ShaderType>,
        count: u32,
        stride: u32,
    },
    Struct { members: Vec<UniformMember>, size: u32 },
}

impl ShaderType {
    pub const fn vec(size: u8) -> Self {
        ShaderType::Vector {
            size,
            kind: ScalarKind::Float,
        }
    }

    pub const MAT4: ShaderType = ShaderType::Matrix { columns: 4, rows: 4 };

    /// Number of scalar components of a scalar or vector; `None` otherwise.
    pub fn components(&self) -> Option<u8> {
        match self {
            ShaderType::Scalar(_) => Some(1),
            ShaderType::Vector { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// Scalar kind of a scalar or vector.
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            ShaderType::Scalar(kind) | ShaderType::Vector { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn scalar(kind: ScalarKind) -> &'static str {
            match kind {
                ScalarKind::Float => "f32",
                ScalarKind::Sint => "i32",
                ScalarKind::Uint => "u32",
                ScalarKind::Bool => "bool",
            }
        }
        match self {
            ShaderType::Scalar(kind) => f.write_str(scalar(*kind)),
            ShaderType::Vector { size, kind } => write!(f, "vec{size}<{}>", scalar(*kind)),
            ShaderType::Matrix { columns, rows } => write!(f, "mat{columns}x{rows}<f32>"),
            ShaderType::Array { element, count, .. } => write!(f, "array<{element}, {count}>"),
            ShaderType::Struct { members, size } => {
                write!(f, "struct({} members, {size} bytes)", members.len())
            }
        }
    }
}

// ── interface ─────────────────────────────────────────────────────────────

/// A located stage input or output.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InterfaceVar {
    pub location: u32,
    pub name: String,
    pub ty: ShaderType,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UniformMember {
    pub name: String,
    pub ty: ShaderType,
    pub offset: u32,
}

/// A uniform buffer read by the entry point, with its resolved byte layout.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub name: String,
    pub members: Vec<UniformMember>,
    pub size: u32,
}

impl UniformBlock {
    /// True if both blocks have the same member types at the same offsets.
    pub fn same_layout(&self, other: &UniformBlock) -> bool {
        self.size == other.size
            && self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.ty == b.ty && a.offset == b.offset)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderBindingType {
    UniformBuffer,
    StorageBuffer,
    Texture2D,
    /// Any other texture dimension or class.
    Texture,
    Sampler,
}

/// A named resource binding used by one stage.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ShaderBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub ty: ShaderBindingType,
}

/// Everything the pipeline needs to know about one compiled stage.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StageInterface {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<InterfaceVar>,
    pub outputs: Vec<InterfaceVar>,
    pub uniforms: Vec<UniformBlock>,
    pub bindings: Vec<ShaderBinding>,
}

impl StageInterface {
    pub fn input(&self, location: u32) -> Option<&InterfaceVar> {
        self.inputs.iter().find(|v| v.location == location)
    }

    pub fn output(&self, location: u32) -> Option<&InterfaceVar> {
        self.outputs.iter().find(|v| v.location == location)
    }

    pub fn output_named(&self, name: &str) -> Option<&InterfaceVar> {
        self.outputs.iter().find(|v| v.name == name)
    }

    pub fn uniform(&self, group: u32, binding: u32) -> Option<&UniformBlock> {
        self.uniforms
            .iter()
            .find(|u| u.group == group && u.binding == binding)
    }

    /// Looks a resource binding up by its shader-side name.
    pub fn binding(&self, name: &str) -> Option<&ShaderBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

// ── naga ──────────────────────────────────────────────────────────────────

/// Builds the interface of `entry_point` from a validated module.
pub(crate) fn reflect(
    stage: ShaderStage,
    entry_point: &str,
    module: &naga::Module,
    info: &naga::valid::ModuleInfo,
) -> Result<StageInterface, SourceError> {
    let Some((index, ep)) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.name == entry_point)
    else {
        return Err(SourceError::new(format!("entry point `{entry_point}` not found"), 1, 1));
    };
    if ep.stage != naga_stage(stage) {
        return Err(SourceError::new(
            format!("`{entry_point}` is not a {stage} entry point"),
            1,
            1,
        ));
    }

    let mut layouter = naga::proc::Layouter::default();
    layouter
        .update(module.to_ctx())
        .map_err(|e| SourceError::new(format!("type layout failed: {e}"), 1, 1))?;
    let types = TypeReader { module, layouter: &layouter };

    let mut iface = StageInterface {
        stage,
        entry_point: entry_point.to_string(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        uniforms: Vec::new(),
        bindings: Vec::new(),
    };

    for arg in &ep.function.arguments {
        types.collect_io(arg.binding.as_ref(), arg.name.as_deref(), arg.ty, &mut iface.inputs)?;
    }
    if let Some(result) = &ep.function.result {
        types.collect_io(result.binding.as_ref(), Some("return"), result.ty, &mut iface.outputs)?;
    }

    let usage = info.get_entry_point(index);
    for (handle, var) in module.global_variables.iter() {
        let Some(rb) = var.binding.as_ref() else {
            continue;
        };
        if usage[handle].is_empty() {
            continue;
        }
        let name = var.name.clone().unwrap_or_default();
        let Some(ty) = binding_type(&var.space, &module.types[var.ty].inner) else {
            continue;
        };
        if ty == ShaderBindingType::UniformBuffer {
            iface.uniforms.push(types.uniform_block(var, rb)?);
        }
        iface.bindings.push(ShaderBinding {
            name,
            group: rb.group,
            binding: rb.binding,
            ty,
        });
    }

    Ok(iface)
}

pub(crate) fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

struct TypeReader<'m> {
    module: &'m naga::Module,
    layouter: &'m naga::proc::Layouter,
}

impl TypeReader<'_> {
    fn collect_io(
        &self,
        binding: Option<&naga::Binding>,
        name: Option<&str>,
        ty: naga::Handle<naga::Type>,
        out: &mut Vec<InterfaceVar>,
    ) -> Result<(), SourceError> {
        match binding {
            Some(naga::Binding::BuiltIn(_)) => Ok(()),
            Some(naga::Binding::Location { location, .. }) => {
                out.push(InterfaceVar {
                    location: *location,
                    name: name.unwrap_or_default().to_string(),
                    ty: self.shader_type(ty)?,
                });
                Ok(())
            }
            None => match &self.module.types[ty].inner {
                naga::TypeInner::Struct { members, .. } => {
                    for m in members {
                        self.collect_io(m.binding.as_ref(), m.name.as_deref(), m.ty, out)?;
                    }
                    Ok(())
                }
                _ => Err(SourceError::new(
                    format!("entry point IO `{}` has no binding", name.unwrap_or("?")),
                    1,
                    1,
                )),
            },
        }
    }

    fn uniform_block(
        &self,
        var: &naga::GlobalVariable,
        rb: &naga::ResourceBinding,
    ) -> Result<UniformBlock, SourceError> {
        let name = var
            .name
            .clone()
            .or_else(|| self.module.types[var.ty].name.clone())
            .unwrap_or_default();
        let members = match self.shader_type(var.ty)? {
            ShaderType::Struct { members, .. } => members,
            ty => vec![UniformMember {
                name: name.clone(),
                ty,
                offset: 0,
            }],
        };
        Ok(UniformBlock {
            group: rb.group,
            binding: rb.binding,
            name,
            members,
            size: self.layouter[var.ty].size,
        })
    }

    fn shader_type(&self, ty: naga::Handle<naga::Type>) -> Result<ShaderType, SourceError> {
        let unsupported = |what: &str| {
            let name = self.module.types[ty].name.as_deref().unwrap_or(what);
            SourceError::new(format!("unsupported host-shareable type `{name}`"), 1, 1)
        };
        Ok(match &self.module.types[ty].inner {
            naga::TypeInner::Scalar(s) => ShaderType::Scalar(scalar_kind(s.kind)),
            naga::TypeInner::Vector { size, scalar } => ShaderType::Vector {
                size: *size as u8,
                kind: scalar_kind(scalar.kind),
            },
            naga::TypeInner::Matrix { columns, rows, .. } => ShaderType::Matrix {
                columns: *columns as u8,
                rows: *rows as u8,
            },
            naga::TypeInner::Array {
                base,
                size: naga::ArraySize::Constant(count),
                stride,
            } => ShaderType::Array {
                element: Box::new(self.shader_type(*base)?),
                count: count.get(),
                stride: *stride,
            },
            naga::TypeInner::Struct { members, .. } => ShaderType::Struct {
                members: members
                    .iter()
                    .map(|m| {
                        Ok(UniformMember {
                            name: m.name.clone().unwrap_or_default(),
                            ty: self.shader_type(m.ty)?,
                            offset: m.offset,
                        })
                    })
                    .collect::<Result<_, SourceError>>()?,
                size: self.layouter[ty].size,
            },
            naga::TypeInner::Array { .. } => return Err(unsupported("array")),
            _ => return Err(unsupported("opaque")),
        })
    }
}

fn scalar_kind(kind: naga::ScalarKind) -> ScalarKind {
    match kind {
        naga::ScalarKind::Float | naga::ScalarKind::AbstractFloat => ScalarKind::Float,
        naga::ScalarKind::Sint | naga::ScalarKind::AbstractInt => ScalarKind::Sint,
        naga::ScalarKind::Uint => ScalarKind::Uint,
        naga::ScalarKind::Bool => ScalarKind::Bool,
    }
}

fn binding_type(space: &naga::AddressSpace, inner: &naga::TypeInner) -> Option<ShaderBindingType> {
    match (space, inner) {
        (naga::AddressSpace::Uniform, _) => Some(ShaderBindingType::UniformBuffer),
        (naga::AddressSpace::Storage { .. }, _) => Some(ShaderBindingType::StorageBuffer),
        (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => Some(ShaderBindingType::Sampler),
        (
            naga::AddressSpace::Handle,
            naga::TypeInner::Image {
                dim: naga::ImageDimension::D2,
                arrayed: false,
                class: naga::ImageClass::Sampled { .. },
            },
        ) => Some(ShaderBindingType::Texture2D),
        (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => Some(ShaderBindingType::Texture),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shader::frontend::parse_stage;
    use crate::render::shader::ShaderSource;

    const SHADER: &str = r"
alias Mat = mat4x4<f32>;

struct Transforms {
    model: Mat,
    view: Mat,
    projection: Mat,
};

struct Tint {
    colors: array<vec4<f32>, 2>,
    @size(32) strength: f32,
};

@group(0) @binding(0) var<uniform> transforms: Transforms;
@group(0) @binding(1) var<uniform> tint: Tint;
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec4<f32>,
    @location(1) tex_coord: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.tex_coord = in.tex_coord;
    out.clip_position = transforms.projection * transforms.view * transforms.model * in.position;
    return out;
}

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return tint.colors[0] * tint.strength * textureSample(albedo, albedo_sampler, tex_coord);
}

@fragment
fn fs_plain(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(tex_coord, 0.0, 1.0);
}
";

    fn stage(stage: ShaderStage, entry: &str) -> StageInterface {
        parse_stage(stage, &ShaderSource::wgsl(SHADER, entry))
            .unwrap()
            .interface
    }

    // ── io ────────────────────────────────────────────────────────────────

    #[test]
    fn io_structs_are_flattened_and_builtins_skipped() {
        let vs = stage(ShaderStage::Vertex, "vs_main");
        assert_eq!(vs.inputs.len(), 2);
        assert_eq!(vs.input(1).unwrap().name, "tex_coord");
        assert_eq!(vs.input(0).unwrap().ty, ShaderType::vec(4));
        assert_eq!(vs.outputs.len(), 1);
        assert_eq!(vs.output(0).unwrap().ty, ShaderType::vec(2));
    }

    #[test]
    fn wrong_stage_is_rejected() {
        let err = parse_stage(ShaderStage::Vertex, &ShaderSource::wgsl(SHADER, "fs_main")).unwrap_err();
        assert!(err.to_string().contains("not a vertex entry point"));
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    #[test]
    fn aliased_members_resolve() {
        let vs = stage(ShaderStage::Vertex, "vs_main");
        let block = vs.uniform(0, 0).unwrap();
        assert_eq!(block.name, "transforms");
        let offsets: Vec<u32> = block.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, [0, 64, 128]);
        assert!(block.members.iter().all(|m| m.ty == ShaderType::MAT4));
        assert_eq!(block.size, 192);
    }

    #[test]
    fn only_used_globals_are_reported() {
        let vs = stage(ShaderStage::Vertex, "vs_main");
        assert!(vs.uniform(0, 1).is_none());
        assert_eq!(vs.bindings.len(), 1);

        let plain = stage(ShaderStage::Fragment, "fs_plain");
        assert!(plain.uniforms.is_empty());
        assert!(plain.bindings.is_empty());
    }

    #[test]
    fn arrays_and_explicit_sizes_keep_offsets() {
        let fs = stage(ShaderStage::Fragment, "fs_main");
        let tint = fs.uniform(0, 1).unwrap();
        assert_eq!(
            tint.members[0].ty,
            ShaderType::Array {
                element: Box::new(ShaderType::vec(4)),
                count: 2,
                stride: 16
            }
        );
        assert_eq!(tint.members[1].offset, 32);
        assert_eq!(tint.size, 64);
    }

    #[test]
    fn resource_bindings_are_named() {
        let fs = stage(ShaderStage::Fragment, "fs_main");
        let albedo = fs.binding("albedo").unwrap();
        assert_eq!((albedo.group, albedo.binding), (1, 0));
        assert_eq!(albedo.ty, ShaderBindingType::Texture2D);
        assert_eq!(fs.binding("albedo_sampler").unwrap().ty, ShaderBindingType::Sampler);
        assert_eq!(fs.binding("tint").unwrap().ty, ShaderBindingType::UniformBuffer);
    }

    #[test]
    fn bare_uniform_is_a_single_member_block() {
        let src = r"
@group(0) @binding(2) var<uniform> mvp: mat4x4f;
@vertex fn vs(@location(0) p: vec4f, @location(3) n: vec3<i32>) -> @builtin(position) vec4f {
    return mvp * p + vec4f(vec3f(n), 0.0);
}
";
        let iface = parse_stage(ShaderStage::Vertex, &ShaderSource::wgsl(src, "vs"))
            .unwrap()
            .interface;
        let block = iface.uniform(0, 2).unwrap();
        assert_eq!(block.members[0].ty, ShaderType::MAT4);
        assert_eq!(block.size, 64);
        assert_eq!(
            iface.input(3).unwrap().ty,
            ShaderType::Vector { size: 3, kind: ScalarKind::Sint }
        );
        assert!(iface.outputs.is_empty());
    }

    #[test]
    fn display_uses_wgsl_names() {
        assert_eq!(ShaderType::vec(2).to_string(), "vec2<f32>");
        assert_eq!(ShaderType::MAT4.to_string(), "mat4x4<f32>");
        assert_eq!(ShaderType::Scalar(ScalarKind::Uint).to_string(), "u32");
    }
}
