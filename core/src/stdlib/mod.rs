//! Builtin Library
//!
//! Builtins are primitive functions invoked by name. This module provides:
//! - Math: arithmetic with exact reverses for write-back
//! - Compare: conditional comparisons
//! - Array: structural intrinsics run by the array engine (append, delete, ...)
//!
//! Native builtins see their inputs unwrapped into [`Datum`]s; non-scalar
//! inputs arrive as [`Datum::Value`]. The registry is installed into each
//! workspace as a library block, so builtins are called like any function.

use crate::tree::{BlockKind, CodeKind, FormulaType, Id, Io, ItemIdx, MetaId, Tree, Value};
use ecow::EcoString;
use hashbrown::HashMap;
use smallvec::SmallVec;

pub mod array;
pub mod compare;
pub mod math;

#[cfg(test)]
mod stdlib_test;

/// A scalar input or output of a native builtin.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Nil,
    Number(f64),
    Character(char),
    Boolean(bool),
    Text(EcoString),
    /// A container or reference passed through untouched.
    Value,
}

impl Datum {
    pub fn number(&self, index: usize) -> Result<f64, BuiltinError> {
        match self {
            Datum::Number(n) => Ok(*n),
            _ => Err(BuiltinError::TypeMismatch {
                index,
                expected: "number",
            }),
        }
    }

    pub(crate) fn from_value(value: &Value) -> Datum {
        match value {
            Value::Nil | Value::Anything => Datum::Nil,
            Value::Number(n) => Datum::Number(*n),
            Value::Character(c) => Datum::Character(*c),
            Value::Boolean(b) => Datum::Boolean(*b),
            Value::Text(text) => Datum::Text(text.clone()),
            Value::Block(_) | Value::Array(_) | Value::Reference(_) => Datum::Value,
        }
    }

    /// Scalar value of a datum; `Value` has no scalar form.
    pub(crate) fn into_value(self) -> Option<Value> {
        match self {
            Datum::Nil => Some(Value::Nil),
            Datum::Number(n) => Some(Value::Number(n)),
            Datum::Character(c) => Some(Value::Character(c)),
            Datum::Boolean(b) => Some(Value::Boolean(b)),
            Datum::Text(text) => Some(Value::Text(text)),
            Datum::Value => None,
        }
    }
}

pub type Data = SmallVec<[Datum; 4]>;

/// Forward computation. `Ok(None)` rejects.
pub type ForwardFn = fn(&[Datum]) -> Result<Option<Datum>, BuiltinError>;

/// Reverse computation: given a new output and the current inputs, the new
/// value of each input that must change.
pub type ReverseFn = fn(&Datum, &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuiltinError {
    #[error("expected {expected} for input {index}")]
    TypeMismatch { index: usize, expected: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of range")]
    OutOfRange { index: i64 },
}

/// Default value of a builtin input, and type of fixed outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prototype {
    Nil,
    Anything,
    Number,
    Character,
    Boolean,
    Text,
}

impl Prototype {
    pub fn value(self) -> Value {
        match self {
            Prototype::Nil => Value::Nil,
            Prototype::Anything => Value::Anything,
            Prototype::Number => Value::Number(0.0),
            Prototype::Character => Value::Character(' '),
            Prototype::Boolean => Value::Boolean(false),
            Prototype::Text => Value::Text(EcoString::new()),
        }
    }
}

/// Shape of a builtin's output during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Fixed(Prototype),
    /// A copy of the given input.
    SameAsInput(usize),
}

/// Structural operations implemented over items rather than scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Append,
    Delete,
    Length,
    At,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy)]
pub enum Implementation {
    Native {
        forward: ForwardFn,
        reverse: Option<ReverseFn>,
    },
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: EcoString,
    pub inputs: Vec<(EcoString, Prototype)>,
    pub output: Output,
    /// May reject instead of producing a value.
    pub conditional: bool,
    pub implementation: Implementation,
}

impl Builtin {
    pub fn native(
        name: &str,
        inputs: &[(&str, Prototype)],
        output: Output,
        forward: ForwardFn,
        reverse: Option<ReverseFn>,
    ) -> Self {
        Builtin {
            name: name.into(),
            inputs: inputs.iter().map(|(n, p)| (EcoString::from(*n), *p)).collect(),
            output,
            conditional: false,
            implementation: Implementation::Native { forward, reverse },
        }
    }

    pub fn intrinsic(
        name: &str,
        inputs: &[(&str, Prototype)],
        output: Output,
        intrinsic: Intrinsic,
    ) -> Self {
        Builtin {
            name: name.into(),
            inputs: inputs.iter().map(|(n, p)| (EcoString::from(*n), *p)).collect(),
            output,
            conditional: false,
            implementation: Implementation::Intrinsic(intrinsic),
        }
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    pub fn reverse(&self) -> Option<ReverseFn> {
        match self.implementation {
            Implementation::Native { reverse, .. } => reverse,
            Implementation::Intrinsic(_) => None,
        }
    }
}

/// Name-indexed table of builtins.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    builtins: Vec<Builtin>,
    index: HashMap<EcoString, usize>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        math::register(&mut registry);
        compare::register(&mut registry);
        array::register(&mut registry);
        registry
    }

    /// Adds a builtin, replacing any builtin with the same name.
    pub fn register(&mut self, builtin: Builtin) {
        match self.index.get(&builtin.name) {
            Some(&position) => self.builtins[position] = builtin,
            None => {
                self.index.insert(builtin.name.clone(), self.builtins.len());
                self.builtins.push(builtin);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.index.get(name).map(|&position| &self.builtins[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.builtins.iter()
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    /// Materializes the table as the library block in the root metadata.
    ///
    /// Each builtin becomes a function whose inputs are followed by a single
    /// builtin statement.
    pub(crate) fn install(&self, tree: &mut Tree) -> ItemIdx {
        let library = tree.new_item(Id::Meta(MetaId::Library), Io::Data);
        let mut functions = Vec::with_capacity(self.builtins.len());
        for builtin in &self.builtins {
            let name = tree.names.intern(&builtin.name);
            let function = tree.new_item(Id::Name(name), Io::Output);
            let mut statements = Vec::with_capacity(builtin.inputs.len() + 1);
            for (input_name, prototype) in &builtin.inputs {
                let input_id = tree.names.intern(input_name);
                let input = tree.new_item(Id::Name(input_id), Io::Input);
                tree.set_value(input, prototype.value());
                statements.push(input);
            }
            let body = tree.new_item(Id::Ordinal(statements.len() as u32 + 1), Io::Output);
            tree.item_mut(body).formula = FormulaType::Builtin { name };
            statements.push(body);
            let block = tree.new_block(BlockKind::Code(CodeKind::Do), statements);
            tree.set_value(function, block);
            functions.push(function);
        }
        let block = tree.new_block(BlockKind::Record, functions);
        tree.set_value(library, block);
        let root = tree.root();
        tree.set_meta(root, MetaId::Library, library);
        library
    }
}
