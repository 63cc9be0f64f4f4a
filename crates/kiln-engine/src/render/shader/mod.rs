//! Shader programs.
//!
//! Each stage is parsed and validated by naga through a per-dialect
//! front-end, reflected, linked (vertex outputs against fragment inputs),
//! compiled by the backend and cached by content.

mod cache;
mod frontend;
mod link;
pub mod passthrough;
mod reflect;
mod source;

pub use cache::{CacheStats, ProgramCache, ProgramHandle, ProgramKey, ShaderProgram};
pub use frontend::{parse_stage, GlslFrontend, ParsedStage, ShaderFrontend, SourceError, WgslFrontend};
pub use reflect::{
    InterfaceVar, ScalarKind, ShaderBinding, ShaderBindingType, ShaderType, StageInterface,
    UniformBlock, UniformMember,
};
pub use source::{ShaderDialect, ShaderSource, ShaderStage};
