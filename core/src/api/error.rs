//! Public error types for the Subtext API.
//!
//! Internal evaluation errors are converted to these types at API
//! boundaries.

use crate::evaluator::{Crash, CrashKind, EvalError, StaticError};
use crate::span::Span;
use miette::Diagnostic as _;
use std::fmt;

/// Public error type for all Subtext operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid API usage (e.g., unknown path, writing to a plain output).
    Api(String),

    /// Static errors found while analyzing a version.
    Compilation { diagnostics: Vec<Diagnostic> },

    /// An assertion or builtin failed while executing a version.
    Crash { diagnostic: Diagnostic },

    /// Resource limits exceeded (e.g., evaluation depth).
    ResourceExceeded(String),

    /// The engine reached a state it considers impossible.
    Internal(String),
}

impl Error {
    /// Error code of the first diagnostic, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Compilation { diagnostics } => diagnostics.first()?.code.as_deref(),
            Error::Crash { diagnostic } => diagnostic.code.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Api(msg) => write!(f, "API error: {}", msg),
            Error::Compilation { diagnostics } => {
                let error_count = diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .count();
                write!(f, "Compilation failed with {} error(s)", error_count)?;
                if let Some(first) = diagnostics.first() {
                    write!(f, ": {}", first.message)?;
                }
                Ok(())
            }
            Error::Crash { diagnostic } => write!(f, "Crash: {}", diagnostic.message),
            Error::ResourceExceeded(msg) => write!(f, "Resource limit exceeded: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// A diagnostic message with an optional source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Primary diagnostic message.
    pub message: String,

    /// Source location of the offending token, when it has one.
    pub span: Option<Span>,

    /// Optional help text suggesting how to fix the issue.
    pub help: Option<String>,

    /// Error code (e.g., "subtext::missing_guard") for documentation lookup.
    pub code: Option<String>,
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

// ============================================================================
// Conversion from internal errors
// ============================================================================

impl From<&StaticError> for Diagnostic {
    fn from(err: &StaticError) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: err.to_string(),
            span: err.token.as_ref().map(|token| token.span.clone()),
            help: err.help().map(|help| help.to_string()),
            code: err.code().map(|code| code.to_string()),
        }
    }
}

impl From<&Crash> for Diagnostic {
    fn from(err: &Crash) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: err.to_string(),
            span: err.token.as_ref().map(|token| token.span.clone()),
            help: None,
            code: err.code().map(|code| code.to_string()),
        }
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Static(err) => Error::Compilation {
                diagnostics: vec![Diagnostic::from(&err)],
            },
            EvalError::Crash(err) if matches!(err.kind, CrashKind::TooDeep { .. }) => {
                Error::ResourceExceeded(err.to_string())
            }
            EvalError::Crash(err) => Error::Crash {
                diagnostic: Diagnostic::from(&err),
            },
            EvalError::Trap(trap) => Error::Internal(trap.message),
        }
    }
}
