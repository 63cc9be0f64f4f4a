//! Rendering front-end.
//!
//! Data flows from the transform buffer through the dispatcher to the bound
//! pipeline and its cached program. All GPU work goes through a
//! [`backend::Backend`].
//!
//! Convention:
//! - Matrices are column-major `glam::Mat4`.
//! - Clip space follows wgpu: x, y in -1..1, z in 0..1.

pub mod backend;
mod ctx;
pub mod dispatch;
mod error;
pub mod pipeline;
pub mod shader;
pub mod transform;

pub use ctx::RenderTarget;
pub use dispatch::{DispatchConfig, FrameDispatcher, FrameStats};
pub use error::RenderError;
pub use pipeline::{
    IndexData, IndexFormat, PipelineBuilder, PipelineState, PipelineStateObject, UniformSlot,
    Vertex2, Vertex4, VertexAttributeLayout, VertexData,
};
pub use shader::{ProgramCache, ProgramHandle, ShaderDialect, ShaderSource, ShaderStage};
pub use transform::{Flush, TransformBlock, TransformBuffer};
