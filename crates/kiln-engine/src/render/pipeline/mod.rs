//! Vertex layouts, uniform slots and pipeline state objects.

mod builder;
mod layout;
mod uniform;

pub use builder::{PipelineBuilder, PipelineState, PipelineStateObject};
pub use layout::{
    IndexData, IndexFormat, Vertex2, Vertex4, VertexAttribute, VertexAttributeLayout, VertexData, VertexFormat,
    VertexSemantic,
};
pub use uniform::UniformSlot;
