//! Error Types
//!
//! Every failure the runtime can detect is described here. Apart from
//! construction (which returns [`Error`] to the caller), errors are never
//! propagated out of the runtime: they are logged through `tracing` at the
//! point of detection and the offending binding degrades to a no-op.

use thiserror::Error;

/// Failure while compiling an expression string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The source is not a valid expression.
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    /// The source uses a statement keyword (declaration, control flow, ...).
    #[error("disallowed keyword `{0}`")]
    DisallowedKeyword(String),

    /// A setter was requested for something other than a plain path.
    #[error("`{0}` is not an assignable path")]
    NotAssignable(String),
}

impl ExprError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The root passed at construction is not an element.
    #[error("root node must be an element")]
    InvalidRoot,

    /// The initial scope is not an object.
    #[error("initial scope must be an object, got {0}")]
    InvalidScope(&'static str),

    /// An expression failed to compile.
    #[error("invalid expression `{source_text}`: {error}")]
    Expression {
        source_text: String,
        #[source]
        error: ExprError,
    },

    /// A directive attribute names no known directive.
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    /// A directive was placed on an element that cannot carry it.
    #[error("directive `{directive}` is not supported on <{element}>")]
    UnsupportedElement { directive: String, element: String },

    /// A directive that only takes a static value received an expression.
    #[error("directive `{directive}` only accepts a static name, got `{value}`")]
    StaticOnly { directive: String, value: String },

    /// A directive appears somewhere it cannot work (e.g. a stray `else`).
    #[error("directive `{directive}` misplaced: {reason}")]
    Misplaced { directive: String, reason: String },

    /// A bound value has the wrong shape for its binding.
    #[error("{binding} expects {expected}, got {found}")]
    TypeMismatch {
        binding: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn expression(source_text: &str, error: ExprError) -> Self {
        Self::Expression {
            source_text: source_text.to_string(),
            error,
        }
    }
}

/// Result alias used by construction and configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_error_displays_source() {
        let err = Error::expression("let a = 1", ExprError::DisallowedKeyword("let".into()));
        assert_eq!(
            err.to_string(),
            "invalid expression `let a = 1`: disallowed keyword `let`"
        );
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = ExprError::syntax(4, "unexpected `)`");
        assert_eq!(err.to_string(), "syntax error at 4: unexpected `)`");
    }
}
