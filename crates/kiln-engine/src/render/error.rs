use thiserror::Error;

use super::shader::ShaderStage;

/// Errors surfaced by the rendering front-end.
///
/// All variants describe programmer or data errors except `ResourceExhausted`,
/// which the application may retry after freeing GPU resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A stage failed to parse, lacks its entry point, or was rejected by the
    /// backend compiler. `line`/`column` are 1-based; 0 means unknown.
    #[error("{stage} shader failed to compile at {line}:{column}: {message}")]
    Compilation {
        stage: ShaderStage,
        line: usize,
        column: usize,
        message: String,
    },

    /// Vertex and fragment stages disagree on varyings or uniform layouts.
    #[error("shader interface mismatch: {0}")]
    InterfaceMismatch(String),

    /// Vertex attribute layout or uniform slot disagrees with the program.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// GPU memory or allocation limits were exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A draw referenced a pipeline or buffer that is not built or no longer alive.
    #[error("not ready: {0}")]
    NotReady(String),
}

impl RenderError {
    /// Returns true if retrying the operation can succeed without changing inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::ResourceExhausted(_))
    }

    pub(crate) fn compilation(stage: ShaderStage, line: usize, column: usize, message: impl Into<String>) -> Self {
        RenderError::Compilation {
            stage,
            line,
            column,
            message: message.into(),
        }
    }
}
