//! Evaluation errors.
//!
//! # Error Categories
//!
//! - **Static errors**: binding, type and structure problems found while
//!   analyzing a version. The version fails to compile.
//! - **Crashes**: asserted accesses, calls and blocks that actually fail at
//!   runtime, and the evaluation depth limit. Execution of the version stops.
//! - **Traps**: conditions the evaluator considers impossible. Reaching one
//!   is a bug in the evaluator, not in the document.
//!
//! Rejection is not an error; it is recorded on the rejected item.

use crate::span::Token;
use ecow::EcoString;
use miette::{Diagnostic, LabeledSpan};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, thiserror::Error, Diagnostic)]
pub enum StaticErrorKind {
    #[error("undefined name: {name}")]
    #[diagnostic(
        code(subtext::undefined_name),
        help("names resolve in enclosing blocks, then in the builtin library")
    )]
    UndefinedName { name: EcoString },

    #[error("duplicate name: {name}")]
    #[diagnostic(code(subtext::duplicate_name))]
    DuplicateName { name: EcoString },

    #[error("circular reference: {path}")]
    #[diagnostic(code(subtext::circular_reference))]
    CircularReference { path: String },

    #[error("changing type: expected {expected}, found {found}")]
    #[diagnostic(code(subtext::changing_type))]
    ChangingType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing guard on conditional name: {name}")]
    #[diagnostic(
        code(subtext::missing_guard),
        help("add `?` to reject quietly or `!` to assert")
    )]
    MissingGuard { name: EcoString },

    #[error("guard on unconditional name: {name}")]
    #[diagnostic(code(subtext::extra_guard), help("remove the `?` or `!`"))]
    ExtraGuard { name: EcoString },

    #[error("input may not be conditional: {name}")]
    #[diagnostic(code(subtext::conditional_input))]
    ConditionalInput { name: EcoString },

    #[error("name declared conditional but never rejects: {name}")]
    #[diagnostic(code(subtext::unconditional_name))]
    UnconditionalName { name: EcoString },

    #[error("no previous value")]
    #[diagnostic(code(subtext::no_previous_value))]
    NoPreviousValue,

    #[error("write must go backwards")]
    #[diagnostic(
        code(subtext::write_order),
        help("a write may only target fields declared before the field reacting to the update")
    )]
    WriteMustGoBackwards,

    #[error("write conflict: {path}")]
    #[diagnostic(code(subtext::write_conflict))]
    WriteConflict { path: String },

    #[error("write outside context of update")]
    #[diagnostic(code(subtext::write_context))]
    WriteOutsideContext,

    #[error("external write from for-all")]
    #[diagnostic(code(subtext::external_write))]
    ExternalWriteFromForAll,

    #[error("clause must be conditional")]
    #[diagnostic(
        code(subtext::unconditional_clause),
        help("only the last clause of a try may be unconditional")
    )]
    ClauseNotConditional,

    #[error("export must be defined in every clause")]
    #[diagnostic(code(subtext::export_mismatch))]
    ExportMismatch,

    #[error("unused let: {name}")]
    #[diagnostic(code(subtext::unused_let))]
    UnusedLet { name: EcoString },

    #[error("block ignores its previous value")]
    #[diagnostic(
        code(subtext::ignores_previous_value),
        help("start the block from `that` or from one of its inputs")
    )]
    IgnoresPreviousValue,

    #[error("block reaches a previous value outside itself")]
    #[diagnostic(
        code(subtext::retains_previous_value),
        help("only statements of a `do` block continue from the value before them")
    )]
    RetainsPreviousValue,

    #[error("code block has no result")]
    #[diagnostic(code(subtext::no_result))]
    NoResult,

    #[error("not a function: {found}")]
    #[diagnostic(code(subtext::not_a_function))]
    NotAFunction { found: &'static str },

    #[error("unknown input: {name}")]
    #[diagnostic(code(subtext::unknown_input))]
    UnknownInput { name: EcoString },

    #[error("too many arguments")]
    #[diagnostic(code(subtext::too_many_arguments))]
    TooManyArguments,

    #[error("{kind} body must be conditional")]
    #[diagnostic(code(subtext::loop_body))]
    BodyMustBeConditional { kind: &'static str },

    #[error("{kind} body must not be conditional")]
    #[diagnostic(code(subtext::loop_body))]
    BodyMustBeUnconditional { kind: &'static str },

    #[error("fold body needs item and accumulator inputs")]
    #[diagnostic(code(subtext::fold_inputs))]
    FoldInputs,

    #[error("not an array: {found}")]
    #[diagnostic(code(subtext::not_an_array))]
    NotAnArray { found: &'static str },

    #[error("not a choice: {found}")]
    #[diagnostic(code(subtext::not_a_choice))]
    NotAChoice { found: &'static str },

    #[error("undefined option: {name}")]
    #[diagnostic(code(subtext::undefined_option))]
    UndefinedOption { name: EcoString },

    #[error("only inputs can be changed: {name}")]
    #[diagnostic(code(subtext::not_an_input))]
    NotAnInput { name: EcoString },

    #[error("no export: {name}")]
    #[diagnostic(code(subtext::no_export))]
    NoExport { name: EcoString },

    #[error("not updatable: {reason}")]
    #[diagnostic(code(subtext::not_updatable))]
    NotUpdatable { reason: String },

    #[error("unknown builtin: {name}")]
    #[diagnostic(code(subtext::unknown_builtin))]
    UnknownBuiltin { name: EcoString },

    #[error("on-update requires a computed field")]
    #[diagnostic(code(subtext::on_update_on_data))]
    OnUpdateOnData,
}

/// Analysis-time error, fatal to the version being compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct StaticError {
    pub kind: StaticErrorKind,
    pub token: Option<Token>,
}

impl StaticError {
    pub fn new(kind: StaticErrorKind) -> Self {
        StaticError { kind, token: None }
    }

    pub fn at(mut self, token: Option<&Token>) -> Self {
        if self.token.is_none() {
            self.token = token.cloned();
        }
        self
    }
}

impl Diagnostic for StaticError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let token = self.token.as_ref()?;
        let label = LabeledSpan::new_with_span(
            Some(token.text.to_string()),
            token.span.0.clone(),
        );
        Some(Box::new(core::iter::once(label)))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Diagnostic)]
pub enum CrashKind {
    #[error("assertion failed")]
    #[diagnostic(code(subtext::assertion_failed))]
    AssertionFailed,

    #[error("workspace too deep: depth {depth} exceeds maximum of {max_depth}")]
    #[diagnostic(code(subtext::too_deep))]
    TooDeep { depth: usize, max_depth: usize },

    #[error("{name} failed: {message}")]
    #[diagnostic(code(subtext::builtin_failed))]
    Builtin { name: EcoString, message: String },
}

/// Runtime failure of an assertion, fatal to the version being executed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct Crash {
    pub kind: CrashKind,
    pub token: Option<Token>,
}

impl Crash {
    pub fn new(kind: CrashKind) -> Self {
        Crash { kind, token: None }
    }

    pub fn at(mut self, token: Option<&Token>) -> Self {
        if self.token.is_none() {
            self.token = token.cloned();
        }
        self
    }
}

impl Diagnostic for Crash {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.code()
    }
}

/// Internal invariant violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("internal error: {message}")]
pub struct Trap {
    pub message: String,
}

impl Trap {
    pub fn new(message: impl Into<String>) -> Self {
        Trap {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Static(#[from] StaticError),
    #[error(transparent)]
    Crash(#[from] Crash),
    #[error(transparent)]
    Trap(#[from] Trap),
}

impl From<StaticErrorKind> for EvalError {
    fn from(kind: StaticErrorKind) -> Self {
        EvalError::Static(StaticError::new(kind))
    }
}

impl From<CrashKind> for EvalError {
    fn from(kind: CrashKind) -> Self {
        EvalError::Crash(Crash::new(kind))
    }
}

impl EvalError {
    /// Attaches a token to errors that do not have one yet.
    pub fn at(self, token: Option<&Token>) -> Self {
        match self {
            EvalError::Static(error) => EvalError::Static(error.at(token)),
            EvalError::Crash(error) => EvalError::Crash(error.at(token)),
            trap => trap,
        }
    }

    pub fn static_kind(&self) -> Option<&StaticErrorKind> {
        match self {
            EvalError::Static(error) => Some(&error.kind),
            _ => None,
        }
    }
}
