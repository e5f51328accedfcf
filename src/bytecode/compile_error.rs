use crate::frontend::token::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A structurally invalid token sequence
    #[error("{line}:{col}: compile error: {message}")]
    Generation { message: String, line: u32, col: u32 },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Create a generation error located at `span`
    pub fn at(span: Span, message: impl Into<String>) -> Self {
        CompileError::Generation {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    /// Create an error for a variable not followed by `;` or `:`
    pub fn dangling_variable(span: Span, found: &str) -> Self {
        Self::at(
            span,
            format!("expected ';' or ':' after variable, found '{}'", found),
        )
    }

    pub fn unmatched_close(span: Span) -> Self {
        Self::at(span, "unmatched ']'")
    }

    pub fn unterminated_lambda(span: Span) -> Self {
        Self::at(span, "unterminated function literal")
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }

    /// Source position of a generation error.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            CompileError::Generation { line, col, .. } => Some((*line, *col)),
            CompileError::Internal(_) => None,
        }
    }
}
