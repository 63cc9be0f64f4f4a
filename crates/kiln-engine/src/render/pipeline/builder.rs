use std::fmt;

use crate::render::backend::{Backend, PipelineDesc};
use crate::render::shader::{ProgramHandle, ScalarKind, ShaderBindingType, StageInterface};
use crate::render::RenderError;

use super::layout::VertexAttributeLayout;
use super::uniform::UniformSlot;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PipelineState {
    Uninitialized,
    Built,
    Destroyed,
}

/// Parts of a built pipeline the dispatcher needs at draw time.
pub(crate) struct BuiltPipeline<B: Backend> {
    pub program: ProgramHandle<B::Program>,
    pub layout: VertexAttributeLayout,
    pub uniform: Option<UniformSlot>,
    pub raw: B::Pipeline,
}

enum State<B: Backend> {
    Uninitialized,
    Built(BuiltPipeline<B>),
    Destroyed,
}

/// Immutable program + vertex layout + uniform slot composite.
///
/// A pipeline is created either as an `uninitialized` placeholder or fully
/// built by [`PipelineBuilder`]. Once built it only moves to `Destroyed`.
pub struct PipelineStateObject<B: Backend> {
    label: String,
    state: State<B>,
}

impl<B: Backend> PipelineStateObject<B> {
    pub fn uninitialized(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: State::Uninitialized,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> PipelineState {
        match self.state {
            State::Uninitialized => PipelineState::Uninitialized,
            State::Built(_) => PipelineState::Built,
            State::Destroyed => PipelineState::Destroyed,
        }
    }

    /// Built and its program is still cached.
    pub fn is_ready(&self) -> bool {
        self.ready().is_ok()
    }

    pub fn program(&self) -> Option<&ProgramHandle<B::Program>> {
        self.built().map(|b| &b.program)
    }

    pub fn layout(&self) -> Option<&VertexAttributeLayout> {
        self.built().map(|b| &b.layout)
    }

    pub fn uniform_slot(&self) -> Option<&UniformSlot> {
        self.built().and_then(|b| b.uniform.as_ref())
    }

    pub fn raw(&self) -> Option<&B::Pipeline> {
        self.built().map(|b| &b.raw)
    }

    /// Releases the backend pipeline. Idempotent.
    pub fn destroy(&mut self) {
        if !matches!(self.state, State::Destroyed) {
            log::debug!("destroyed pipeline `{}`", self.label);
        }
        self.state = State::Destroyed;
    }

    fn built(&self) -> Option<&BuiltPipeline<B>> {
        match &self.state {
            State::Built(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn ready(&self) -> Result<&BuiltPipeline<B>, RenderError> {
        let built = match &self.state {
            State::Built(b) => b,
            State::Uninitialized => {
                return Err(RenderError::NotReady(format!(
                    "pipeline `{}` has not been built",
                    self.label
                )));
            }
            State::Destroyed => {
                return Err(RenderError::NotReady(format!(
                    "pipeline `{}` was destroyed",
                    self.label
                )));
            }
        };
        if !built.program.is_live() {
            return Err(RenderError::NotReady(format!(
                "pipeline `{}` references evicted program {}",
                self.label,
                built.program.key()
            )));
        }
        Ok(built)
    }
}

impl<B: Backend> fmt::Debug for PipelineStateObject<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStateObject")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Validates a program against a vertex layout and uniform slot, then asks
/// the backend for a pipeline object. Meant for load time.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    label: String,
}

impl PipelineBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn build<B: Backend>(
        &self,
        backend: &mut B,
        program: &ProgramHandle<B::Program>,
        layout: &VertexAttributeLayout,
        slot: &UniformSlot,
    ) -> Result<PipelineStateObject<B>, RenderError> {
        self.build_inner(backend, program, layout, Some(slot))
    }

    /// Builds a pipeline for programs that declare no uniform block.
    pub fn build_unbound<B: Backend>(
        &self,
        backend: &mut B,
        program: &ProgramHandle<B::Program>,
        layout: &VertexAttributeLayout,
    ) -> Result<PipelineStateObject<B>, RenderError> {
        self.build_inner(backend, program, layout, None)
    }

    fn build_inner<B: Backend>(
        &self,
        backend: &mut B,
        handle: &ProgramHandle<B::Program>,
        layout: &VertexAttributeLayout,
        slot: Option<&UniformSlot>,
    ) -> Result<PipelineStateObject<B>, RenderError> {
        let program = handle.upgrade()?;

        check_vertex_inputs(program.vertex(), layout)?;

        for stage in [program.vertex(), program.fragment()] {
            if let Some(b) = stage
                .bindings
                .iter()
                .find(|b| b.ty != ShaderBindingType::UniformBuffer)
            {
                return Err(RenderError::LayoutMismatch(format!(
                    "{} binding `{}` ({:?}) at group {}, binding {} cannot be bound",
                    stage.stage, b.name, b.ty, b.group, b.binding
                )));
            }
            for block in &stage.uniforms {
                match slot {
                    Some(s) if s.group == block.group && s.binding == block.binding => {
                        s.check_against(block)?
                    }
                    _ => {
                        return Err(RenderError::LayoutMismatch(format!(
                            "{} uniform block `{}` at group {}, binding {} has no slot",
                            stage.stage, block.name, block.group, block.binding
                        )));
                    }
                }
            }
        }
        if let Some(s) = slot {
            let declared = program.vertex().uniform(s.group, s.binding).is_some()
                || program.fragment().uniform(s.group, s.binding).is_some();
            if !declared {
                return Err(RenderError::LayoutMismatch(format!(
                    "program declares no uniform block at group {}, binding {}",
                    s.group, s.binding
                )));
            }
        }

        let raw = backend.create_pipeline(&PipelineDesc {
            label: &self.label,
            program: &program,
            layout,
            uniform: slot,
        })?;

        log::debug!(
            "built pipeline `{}` for program {} (stride {})",
            self.label,
            handle.key(),
            layout.stride()
        );

        Ok(PipelineStateObject {
            label: self.label.clone(),
            state: State::Built(BuiltPipeline {
                program: handle.clone(),
                layout: layout.clone(),
                uniform: slot.cloned(),
                raw,
            }),
        })
    }
}

fn check_vertex_inputs(
    vertex: &StageInterface,
    layout: &VertexAttributeLayout,
) -> Result<(), RenderError> {
    for attr in layout.attributes() {
        let Some(input) = vertex.input(attr.location) else {
            return Err(RenderError::LayoutMismatch(format!(
                "location {} ({:?}) is not an input of vertex entry `{}`",
                attr.location, attr.semantic, vertex.entry_point
            )));
        };
        let fits = match (input.ty.kind(), input.ty.components()) {
            (Some(ScalarKind::Float), Some(components)) => attr.format.components() <= components,
            _ => false,
        };
        if !fits {
            return Err(RenderError::LayoutMismatch(format!(
                "location {} feeds {:?} into `{}: {}`",
                attr.location, attr.format, input.name, input.ty
            )));
        }
    }

    for input in &vertex.inputs {
        if layout.attribute(input.location).is_none() {
            return Err(RenderError::LayoutMismatch(format!(
                "vertex input `{}` at location {} is not fed by the layout",
                input.name, input.location
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::software::{SoftwareBackend, SoftwareProgram};
    use crate::render::pipeline::{Vertex2, Vertex4, VertexFormat, VertexSemantic};
    use crate::render::shader::{passthrough, ProgramCache, ShaderSource};

    struct Fixture {
        backend: SoftwareBackend,
        cache: ProgramCache<SoftwareBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: SoftwareBackend::default(),
                cache: ProgramCache::new(),
            }
        }

        fn program(&mut self, (vs, fs): (ShaderSource, ShaderSource)) -> ProgramHandle<SoftwareProgram> {
            self.cache.get_or_compile(&mut self.backend, &vs, &fs).unwrap()
        }
    }

    const UNBOUND_VS: &str = "#version 450\nlayout(location = 0) in vec2 position;\nlayout(location = 1) in vec2 texcoord;\nlayout(location = 0) out vec2 tex_coord;\nvoid main() {\n    tex_coord = texcoord;\n    gl_Position = vec4(position, 0.0, 1.0);\n}\n";

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn builds_both_dialects_with_either_vertex_type() {
        let mut fx = Fixture::new();
        for sources in [passthrough::wgsl(), passthrough::glsl()] {
            let program = fx.program(sources);
            for layout in [Vertex2::layout(), Vertex4::layout()] {
                let pso = PipelineBuilder::new("test")
                    .build(&mut fx.backend, &program, &layout, &UniformSlot::transform(0, 0))
                    .unwrap();
                assert_eq!(pso.state(), PipelineState::Built);
                assert!(pso.is_ready());
                assert_eq!(pso.layout(), Some(&layout));
            }
        }
        assert_eq!(fx.backend.pipeline_count(), 4);
    }

    #[test]
    fn undeclared_location_is_a_layout_mismatch() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::wgsl());
        let layout = VertexAttributeLayout::new([
            (0, VertexSemantic::Position, VertexFormat::Float32x4),
            (1, VertexSemantic::TexCoord, VertexFormat::Float32x2),
            (3, VertexSemantic::Color, VertexFormat::Float32x4),
        ])
        .unwrap();

        let err = PipelineBuilder::new("test")
            .build(&mut fx.backend, &program, &layout, &UniformSlot::transform(0, 0))
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert!(err.to_string().contains("location 3"));
        assert_eq!(fx.backend.pipeline_count(), 0);
    }

    #[test]
    fn missing_attribute_is_a_layout_mismatch() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::glsl());
        let layout =
            VertexAttributeLayout::new([(0, VertexSemantic::Position, VertexFormat::Float32x4)])
                .unwrap();

        let err = PipelineBuilder::new("test")
            .build(&mut fx.backend, &program, &layout, &UniformSlot::transform(0, 0))
            .unwrap_err();
        assert!(err.to_string().contains("`texcoord`"));
    }

    #[test]
    fn wider_attribute_than_input_is_rejected() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::wgsl());
        let layout = VertexAttributeLayout::new([
            (0, VertexSemantic::Position, VertexFormat::Float32x4),
            (1, VertexSemantic::TexCoord, VertexFormat::Float32x3),
        ])
        .unwrap();

        assert!(matches!(
            PipelineBuilder::new("test").build(
                &mut fx.backend,
                &program,
                &layout,
                &UniformSlot::transform(0, 0)
            ),
            Err(RenderError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn slot_at_wrong_binding_is_rejected() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::wgsl());
        let err = PipelineBuilder::new("test")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 1))
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
    }

    #[test]
    fn unbound_build_requires_no_uniforms() {
        let mut fx = Fixture::new();
        let program = fx.program((
            ShaderSource::glsl(UNBOUND_VS),
            ShaderSource::glsl(passthrough::GLSL_FRAGMENT),
        ));
        let pso = PipelineBuilder::new("clip")
            .build_unbound(&mut fx.backend, &program, &Vertex2::layout())
            .unwrap();
        assert!(pso.uniform_slot().is_none());

        let bound = fx.program(passthrough::glsl());
        assert!(matches!(
            PipelineBuilder::new("clip").build_unbound(&mut fx.backend, &bound, &Vertex4::layout()),
            Err(RenderError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn unused_uniforms_do_not_need_a_slot() {
        let text = format!(
            "{}\n@vertex\nfn vs_clip(in: VertexInput) -> VertexOutput {{\n    var out: VertexOutput;\n    out.tex_coord = in.tex_coord;\n    out.clip_position = in.position;\n    return out;\n}}\n",
            passthrough::WGSL
        );
        let mut fx = Fixture::new();
        let program = fx.program((
            ShaderSource::wgsl(text.as_str(), "vs_clip"),
            ShaderSource::wgsl(text.as_str(), "fs_main"),
        ));
        let pso = PipelineBuilder::new("clip")
            .build_unbound(&mut fx.backend, &program, &Vertex4::layout())
            .unwrap();
        assert!(pso.uniform_slot().is_none());

        let err = PipelineBuilder::new("clip")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 0))
            .unwrap_err();
        assert!(err.to_string().contains("no uniform block"));
    }

    #[test]
    fn texture_bindings_are_rejected() {
        let text = format!(
            "{}\n@group(1) @binding(0) var albedo: texture_2d<f32>;\n@group(1) @binding(1) var albedo_sampler: sampler;\n\n@fragment\nfn fs_textured(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {{\n    return textureSample(albedo, albedo_sampler, tex_coord);\n}}\n",
            passthrough::WGSL
        );
        let mut fx = Fixture::new();
        let program = fx.program((
            ShaderSource::wgsl(text.as_str(), "vs_main"),
            ShaderSource::wgsl(text.as_str(), "fs_textured"),
        ));
        let err = PipelineBuilder::new("textured")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 0))
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert!(err.to_string().contains("`albedo`"));
        assert_eq!(fx.backend.pipeline_count(), 0);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn placeholder_is_not_ready() {
        let pso = PipelineStateObject::<SoftwareBackend>::uninitialized("later");
        assert_eq!(pso.state(), PipelineState::Uninitialized);
        assert!(matches!(pso.ready(), Err(RenderError::NotReady(_))));
        assert!(pso.layout().is_none());
    }

    #[test]
    fn destroy_is_terminal() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::wgsl());
        let mut pso = PipelineBuilder::new("test")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 0))
            .unwrap();

        pso.destroy();
        pso.destroy();
        assert_eq!(pso.state(), PipelineState::Destroyed);
        assert!(!pso.is_ready());
    }

    #[test]
    fn evicted_program_makes_pipeline_not_ready() {
        let mut fx = Fixture::new();
        let program = fx.program(passthrough::wgsl());
        let pso = PipelineBuilder::new("test")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 0))
            .unwrap();

        fx.cache.evict(&program);
        assert_eq!(pso.state(), PipelineState::Built);
        assert!(matches!(pso.ready(), Err(RenderError::NotReady(_))));

        let err = PipelineBuilder::new("again")
            .build(&mut fx.backend, &program, &Vertex4::layout(), &UniformSlot::transform(0, 0))
            .unwrap_err();
        assert!(matches!(err, RenderError::NotReady(_)));
    }
}
