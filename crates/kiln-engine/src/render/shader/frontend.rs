//! Per-dialect front-ends.
//!
//! Every stage is parsed into a naga module and validated before anything
//! else looks at it. The same module is reflected for linking and handed to
//! the backend, so the interface checks and the compiler can never disagree
//! about what a source means.

use wgpu::naga;

use crate::render::RenderError;

use super::reflect::{naga_stage, reflect, StageInterface};
use super::source::{ShaderDialect, ShaderSource, ShaderStage};

/// A positioned front-end diagnostic (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SourceError {
    pub(crate) fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    fn at(span: naga::Span, source: &str, message: impl Into<String>) -> Self {
        let loc = span.location(source);
        Self::new(message, loc.line_number as usize, loc.line_position as usize)
    }

    pub(crate) fn into_render_error(self, stage: ShaderStage) -> RenderError {
        RenderError::compilation(stage, self.line, self.column, self.message)
    }
}

/// Turns one stage's source text into a naga module.
pub trait ShaderFrontend {
    fn dialect(&self) -> ShaderDialect;

    fn parse(&self, stage: ShaderStage, source: &str) -> Result<naga::Module, SourceError>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct WgslFrontend;

impl ShaderFrontend for WgslFrontend {
    fn dialect(&self) -> ShaderDialect {
        ShaderDialect::Wgsl
    }

    fn parse(&self, _stage: ShaderStage, source: &str) -> Result<naga::Module, SourceError> {
        naga::front::wgsl::parse_str(source).map_err(|e| {
            let (line, column) = e
                .location(source)
                .map_or((0, 0), |l| (l.line_number as usize, l.line_position as usize));
            SourceError::new(e.message(), line, column)
        })
    }
}

/// Vulkan-flavoured GLSL (`#version 450`); the entry point is always `main`.
#[derive(Debug, Default, Copy, Clone)]
pub struct GlslFrontend;

impl ShaderFrontend for GlslFrontend {
    fn dialect(&self) -> ShaderDialect {
        ShaderDialect::Glsl
    }

    fn parse(&self, stage: ShaderStage, source: &str) -> Result<naga::Module, SourceError> {
        let options = naga::front::glsl::Options::from(naga_stage(stage));
        naga::front::glsl::Frontend::default()
            .parse(&options, source)
            .map_err(|errors| match errors.errors.first() {
                Some(e) => SourceError::at(e.meta, source, e.kind.to_string()),
                None => SourceError::new("GLSL parse failed", 0, 0),
            })
    }
}

static GLSL: GlslFrontend = GlslFrontend;
static WGSL: WgslFrontend = WgslFrontend;

impl ShaderDialect {
    /// Returns the built-in front-end for this dialect.
    pub fn frontend(self) -> &'static dyn ShaderFrontend {
        match self {
            ShaderDialect::Glsl => &GLSL,
            ShaderDialect::Wgsl => &WGSL,
        }
    }
}

/// A parsed, validated and reflected stage.
#[derive(Debug)]
pub struct ParsedStage {
    pub module: naga::Module,
    pub interface: StageInterface,
}

/// Parses, validates and reflects one stage.
///
/// Parse errors, validation errors (bodies included) and a missing entry
/// point all come back as `RenderError::Compilation`.
pub fn parse_stage(stage: ShaderStage, source: &ShaderSource) -> Result<ParsedStage, RenderError> {
    let text = source.text.as_str();
    let module = source
        .dialect
        .frontend()
        .parse(stage, text)
        .map_err(|e| e.into_render_error(stage))?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| {
        let (line, column) = e
            .location(text)
            .map_or((0, 0), |l| (l.line_number as usize, l.line_position as usize));
        RenderError::compilation(stage, line, column, e.as_inner().to_string())
    })?;

    let interface = reflect(stage, &source.entry_point, &module, &info)
        .map_err(|e| e.into_render_error(stage))?;
    Ok(ParsedStage { module, interface })
}
