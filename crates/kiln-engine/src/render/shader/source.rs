use std::fmt;

/// Pipeline stage a shader source targets.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Surface syntax of a shader source.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderDialect {
    /// Layout-qualified GLSL (`#version 450`).
    Glsl,
    /// WebGPU shading language.
    Wgsl,
}

impl ShaderDialect {
    pub(crate) fn tag(self) -> &'static str {
        match self {
            ShaderDialect::Glsl => "glsl",
            ShaderDialect::Wgsl => "wgsl",
        }
    }
}

/// One stage of a program: source text plus the entry point to run.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ShaderSource {
    pub dialect: ShaderDialect,
    pub text: String,
    pub entry_point: String,
}

impl ShaderSource {
    pub fn new(dialect: ShaderDialect, text: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            dialect,
            text: text.into(),
            entry_point: entry_point.into(),
        }
    }

    /// GLSL stage; the entry point is always `main`.
    pub fn glsl(text: impl Into<String>) -> Self {
        Self::new(ShaderDialect::Glsl, text, "main")
    }

    pub fn wgsl(text: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self::new(ShaderDialect::Wgsl, text, entry_point)
    }
}
