//! The unbound tree handed over by the parser.
//!
//! A [`Head`] describes a document as owned syntax: fields carrying formulas,
//! literals and unbound references. [`load`] turns it into arena items,
//! tagging each item with its formula type and attaching the metadata entries
//! the evaluator works from. No names are bound here.
//!
//! The [`build`] helpers construct heads concisely:
//!
//! ```ignore
//! use subtext_core::head::build::*;
//!
//! let head = Head::new()
//!     .with(input("c", num(0.0)))
//!     .with(interface(
//!         "f",
//!         code([
//!             stmt(reference("c")),
//!             stmt(call("*", [num(1.8)])),
//!             stmt(call("+", [num(32.0)])),
//!         ]),
//!     ));
//! ```

pub mod build;
pub(crate) mod load;


use crate::span::Span;
use crate::tree::{Guard, Io, LoopKind, Qualifier};
use ecow::EcoString;

/// A whole document.
#[derive(Debug, Clone, Default)]
pub struct Head {
    pub fields: Vec<Field>,
}

impl Head {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// A field of a record or a statement of a code block.
#[derive(Debug, Clone)]
pub struct Field {
    /// Anonymous statements are numbered by position.
    pub name: Option<EcoString>,
    pub io: Io,
    pub qualifier: Qualifier,
    pub formula: Formula,
    /// Written `name?`: the field is expected to be conditional.
    pub declared_conditional: bool,
    /// Statements of an on-update reaction.
    pub on_update: Option<Vec<Field>>,
    pub span: Span,
}

impl Field {
    pub fn new(name: Option<&str>, io: Io, formula: impl Into<Formula>) -> Self {
        Field {
            name: name.map(EcoString::from),
            io,
            qualifier: Qualifier::Data,
            formula: formula.into(),
            declared_conditional: false,
            on_update: None,
            span: Span::default(),
        }
    }

    pub fn conditional(mut self) -> Self {
        self.declared_conditional = true;
        self
    }

    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn on_update(mut self, statements: impl IntoIterator<Item = Field>) -> Self {
        self.on_update = Some(statements.into_iter().collect());
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Formula {
    Literal(Literal),
    Reference(RefSyntax),
    Code(Vec<Field>),
    Try {
        clauses: Vec<Clause>,
        optional: bool,
    },
    Loop {
        kind: LoopKind,
        body: Vec<Field>,
    },
    Call {
        function: RefSyntax,
        args: Vec<Arg>,
        guard: Option<Guard>,
    },
    /// `.a.b := value` applied to the previous value.
    Update {
        path: Vec<EcoString>,
        value: Box<Formula>,
    },
    /// `#option` or `#option := value` applied to the previous value.
    Choose {
        option: EcoString,
        value: Option<Box<Formula>>,
    },
    Write {
        target: RefSyntax,
        value: Box<Formula>,
    },
    /// Runs the named builtin on the inputs of the enclosing block.
    Builtin(EcoString),
    Include(RefSyntax),
}

impl Formula {
    /// Adds a guard to a call.
    pub fn guarded(mut self, new_guard: Guard) -> Self {
        if let Formula::Call { guard, .. } = &mut self {
            *guard = Some(new_guard);
        }
        self
    }
}

impl From<Literal> for Formula {
    fn from(literal: Literal) -> Self {
        Formula::Literal(literal)
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub name: Option<EcoString>,
    pub statements: Vec<Field>,
}

/// One argument of a call: a formula assigned to a named or positional input.
#[derive(Debug, Clone)]
pub struct Arg {
    pub input: Option<EcoString>,
    pub value: Formula,
}

impl From<Formula> for Arg {
    fn from(value: Formula) -> Self {
        Arg { input: None, value }
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Nil,
    Anything,
    Number(f64),
    Character(char),
    Boolean(bool),
    Text(EcoString),
    Record(Vec<Field>),
    /// Options; the first is chosen initially.
    Choice(Vec<Field>),
    /// A function definition: a code block value.
    Function(Vec<Field>),
    Array {
        tracked: bool,
        template: Box<Literal>,
        entries: Vec<Literal>,
    },
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<&str> for Literal {
    fn from(text: &str) -> Self {
        Literal::Text(text.into())
    }
}

impl From<char> for Literal {
    fn from(c: char) -> Self {
        Literal::Character(c)
    }
}

/// A reference as written: optional `that`, then guarded steps.
#[derive(Debug, Clone, Default)]
pub struct RefSyntax {
    pub dependent: bool,
    pub steps: Vec<RefStep>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RefStep {
    /// `None` is the export step `~`.
    pub name: Option<EcoString>,
    pub guard: Option<Guard>,
    pub span: Span,
}

impl RefSyntax {
    /// Parses the compact form `that.a.b?` / `f~` / `x!`.
    ///
    /// Steps are separated by `.`; a trailing `?` or `!` guards a step and a
    /// trailing `~` adds an export step. A leading `that` makes the reference
    /// dependent.
    pub fn parse(text: &str) -> RefSyntax {
        let mut reference = RefSyntax {
            span: Span::new(0, text.len()),
            ..RefSyntax::default()
        };
        let mut offset = 0;
        for segment in text.split('.') {
            let start = offset;
            offset += segment.len() + 1;
            if segment.is_empty() {
                continue;
            }
            let (body, guard) = match segment.as_bytes()[segment.len() - 1] {
                b'?' => (&segment[..segment.len() - 1], Some(Guard::Reject)),
                b'!' => (&segment[..segment.len() - 1], Some(Guard::Assert)),
                _ => (segment, None),
            };
            let (name, export) = match body.strip_suffix('~') {
                Some(name) => (name, true),
                None => (body, false),
            };
            let span = Span::new(start, start + segment.len());
            if name == "that" && reference.steps.is_empty() && !reference.dependent {
                reference.dependent = true;
            } else if !name.is_empty() {
                reference.steps.push(RefStep {
                    name: Some(name.into()),
                    guard: if export { None } else { guard },
                    span: span.clone(),
                });
            }
            if export {
                reference.steps.push(RefStep {
                    name: None,
                    guard,
                    span,
                });
            }
        }
        reference
    }
}
