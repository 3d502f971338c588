//! Shorthand constructors for head syntax.

use super::{Arg, Clause, Field, Formula, Head, Literal, RefSyntax};
use crate::tree::{Guard, Io, LoopKind, Qualifier};
pub use crate::tree::Guard::{Assert, Reject};

pub fn head(fields: impl IntoIterator<Item = Field>) -> Head {
    Head {
        fields: fields.into_iter().collect(),
    }
}

// ============================================================================
// Fields
// ============================================================================

/// `name: formula`
pub fn input(name: &str, formula: impl Into<Formula>) -> Field {
    Field::new(Some(name), Io::Input, formula)
}

/// `name = formula`
pub fn output(name: &str, formula: impl Into<Formula>) -> Field {
    Field::new(Some(name), Io::Output, formula)
}

/// `name =|> formula`
pub fn interface(name: &str, formula: impl Into<Formula>) -> Field {
    Field::new(Some(name), Io::Interface, formula)
}

/// An anonymous statement.
pub fn stmt(formula: impl Into<Formula>) -> Field {
    Field::new(None, Io::Output, formula)
}

/// `let name = formula`
pub fn let_(name: &str, formula: impl Into<Formula>) -> Field {
    output(name, formula).qualified(Qualifier::Let)
}

/// `check formula`
pub fn check(formula: impl Into<Formula>) -> Field {
    stmt(formula).qualified(Qualifier::Check)
}

/// `export formula`
pub fn export(formula: impl Into<Formula>) -> Field {
    stmt(formula).qualified(Qualifier::Export)
}

// ============================================================================
// Literals
// ============================================================================

pub fn num(n: f64) -> Formula {
    Formula::Literal(Literal::Number(n))
}

pub fn text(text: &str) -> Formula {
    Formula::Literal(Literal::Text(text.into()))
}

pub fn character(c: char) -> Formula {
    Formula::Literal(Literal::Character(c))
}

pub fn boolean(b: bool) -> Formula {
    Formula::Literal(Literal::Boolean(b))
}

pub fn nil() -> Formula {
    Formula::Literal(Literal::Nil)
}

pub fn anything() -> Formula {
    Formula::Literal(Literal::Anything)
}

pub fn record(fields: impl IntoIterator<Item = Field>) -> Formula {
    Formula::Literal(Literal::Record(fields.into_iter().collect()))
}

pub fn choice(options: impl IntoIterator<Item = Field>) -> Formula {
    Formula::Literal(Literal::Choice(options.into_iter().collect()))
}

/// `do{...}` as a value: a function definition.
pub fn function(statements: impl IntoIterator<Item = Field>) -> Formula {
    Formula::Literal(Literal::Function(statements.into_iter().collect()))
}

pub fn array(
    template: impl Into<Literal>,
    entries: impl IntoIterator<Item = Literal>,
) -> Formula {
    array_literal(false, template.into(), entries)
}

pub fn tracked_array(
    template: impl Into<Literal>,
    entries: impl IntoIterator<Item = Literal>,
) -> Formula {
    array_literal(true, template.into(), entries)
}

fn array_literal(
    tracked: bool,
    template: Literal,
    entries: impl IntoIterator<Item = Literal>,
) -> Formula {
    Formula::Literal(Literal::Array {
        tracked,
        template: Box::new(template),
        entries: entries.into_iter().collect(),
    })
}

// ============================================================================
// References and code
// ============================================================================

/// A reference in compact form, see [`RefSyntax::parse`].
pub fn reference(path: &str) -> Formula {
    Formula::Reference(RefSyntax::parse(path))
}

/// The previous value.
pub fn that() -> Formula {
    reference("that")
}

pub fn include(path: &str) -> Formula {
    Formula::Include(RefSyntax::parse(path))
}

pub fn code(statements: impl IntoIterator<Item = Field>) -> Formula {
    Formula::Code(statements.into_iter().collect())
}

pub fn clause(name: &str, statements: impl IntoIterator<Item = Field>) -> Clause {
    Clause {
        name: Some(name.into()),
        statements: statements.into_iter().collect(),
    }
}

/// `try{...} else{...}`: crashes when every clause rejects.
pub fn try_(clauses: impl IntoIterator<Item = Clause>) -> Formula {
    Formula::Try {
        clauses: clauses.into_iter().collect(),
        optional: false,
    }
}

/// `try?{...}`: rejects when every clause rejects.
pub fn try_optional(clauses: impl IntoIterator<Item = Clause>) -> Formula {
    Formula::Try {
        clauses: clauses.into_iter().collect(),
        optional: true,
    }
}

/// Calls `function` with the previous value as its first input.
pub fn call<A: Into<Arg>>(function: &str, args: impl IntoIterator<Item = A>) -> Formula {
    let mut all = vec![Arg::from(that())];
    all.extend(args.into_iter().map(Into::into));
    Formula::Call {
        function: RefSyntax::parse(function),
        args: all,
        guard: None,
    }
}

/// Calls `function` with exactly the given arguments.
pub fn call_fn<A: Into<Arg>>(function: &str, args: impl IntoIterator<Item = A>) -> Formula {
    Formula::Call {
        function: RefSyntax::parse(function),
        args: args.into_iter().map(Into::into).collect(),
        guard: None,
    }
}

/// An argument for a named input.
pub fn arg(input: &str, value: impl Into<Formula>) -> Arg {
    Arg {
        input: Some(input.into()),
        value: value.into(),
    }
}

/// Runs a builtin on the inputs of the enclosing block.
pub fn builtin(name: &str) -> Formula {
    Formula::Builtin(name.into())
}

/// `.a.b := value`
pub fn update(path: &str, value: impl Into<Formula>) -> Formula {
    Formula::Update {
        path: path
            .split('.')
            .filter(|step| !step.is_empty())
            .map(Into::into)
            .collect(),
        value: Box::new(value.into()),
    }
}

/// `#option`
pub fn choose(option: &str) -> Formula {
    Formula::Choose {
        option: option.into(),
        value: None,
    }
}

/// `#option := value`
pub fn choose_with(option: &str, value: impl Into<Formula>) -> Formula {
    Formula::Choose {
        option: option.into(),
        value: Some(Box::new(value.into())),
    }
}

/// `write value -> target`
pub fn write(target: &str, value: impl Into<Formula>) -> Formula {
    Formula::Write {
        target: RefSyntax::parse(target),
        value: Box::new(value.into()),
    }
}

// ============================================================================
// Loops
// ============================================================================

fn loop_formula(kind: LoopKind, body: impl IntoIterator<Item = Field>) -> Formula {
    Formula::Loop {
        kind,
        body: body.into_iter().collect(),
    }
}

pub fn find(guard: Guard, body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::Find(guard), body)
}

pub fn for_all(body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::ForAll, body)
}

pub fn such_that(body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::SuchThat, body)
}

pub fn all(guard: Guard, body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::All(guard), body)
}

pub fn none(guard: Guard, body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::None(guard), body)
}

/// The body starts with two inputs: the entry and the accumulator.
pub fn fold(body: impl IntoIterator<Item = Field>) -> Formula {
    loop_formula(LoopKind::Fold, body)
}
