//! GPU seam.
//!
//! Everything above this module (cache, builder, dispatcher) is written
//! against [`Backend`]. `gpu` drives real hardware through wgpu; `software`
//! keeps buffer memory on the CPU and records commands so the front-end can
//! run headless.

pub mod gpu;
pub mod software;

use wgpu::naga;

use crate::render::pipeline::{IndexData, UniformSlot, VertexAttributeLayout, VertexData};
use crate::render::shader::{ShaderProgram, ShaderSource, ShaderStage, StageInterface};
use crate::render::RenderError;

/// One stage handed to the backend compiler, already validated, reflected and linked.
pub struct CompileRequest<'a> {
    pub stage: ShaderStage,
    pub source: &'a ShaderSource,
    pub module: &'a naga::Module,
    pub interface: &'a StageInterface,
}

/// Validated inputs for creating a backend pipeline object.
pub struct PipelineDesc<'a, P> {
    pub label: &'a str,
    pub program: &'a ShaderProgram<P>,
    pub layout: &'a VertexAttributeLayout,
    pub uniform: Option<&'a UniformSlot>,
}

/// A single draw over one vertex buffer, optionally indexed.
pub struct DrawCall<'a, B: Backend + ?Sized> {
    pub pipeline: &'a B::Pipeline,
    pub layout: &'a VertexAttributeLayout,
    pub uniform: Option<(&'a UniformSlot, &'a B::Buffer)>,
    pub vertices: &'a VertexData<'a>,
    pub indices: Option<&'a IndexData<'a>>,
    /// Clear the target to this linear RGBA color before drawing.
    pub clear_color: Option<[f64; 4]>,
}

pub trait Backend {
    type Program;
    type Buffer;
    type Pipeline;
    /// Per-frame render target supplied by the windowing side.
    type Target<'a>;

    fn compile_program(
        &mut self,
        vertex: &CompileRequest<'_>,
        fragment: &CompileRequest<'_>,
    ) -> Result<Self::Program, RenderError>;

    fn create_uniform_buffer(&mut self, label: &str, size: u64)
    -> Result<Self::Buffer, RenderError>;

    /// Overwrites the buffer from byte 0.
    fn write_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]);

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, Self::Program>,
    ) -> Result<Self::Pipeline, RenderError>;

    fn draw(
        &mut self,
        target: &mut Self::Target<'_>,
        call: &DrawCall<'_, Self>,
    ) -> Result<(), RenderError>;
}
