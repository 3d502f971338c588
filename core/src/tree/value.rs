//! Values held by items.
//!
//! A closed sum over every value kind. Containers own their children through
//! item indices; the children point back through their `container` field.

use super::ids::Id;
use super::item::{Guard, ItemIdx};
use super::path::Path;
use super::provenance::ValueId;
use crate::span::Token;
use ecow::EcoString;

#[derive(Debug, Clone)]
pub enum Value {
    /// Unit.
    Nil,
    /// Top type; the default of generic inputs.
    Anything,
    Number(f64),
    Character(char),
    Boolean(bool),
    Text(EcoString),
    Block(Block),
    Array(Array),
    Reference(Reference),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Anything => "anything",
            Value::Number(_) => "number",
            Value::Character(_) => "character",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::Block(block) => match block.kind {
                BlockKind::Record => "record",
                BlockKind::Choice => "choice",
                BlockKind::Code(CodeKind::Do) => "code",
                BlockKind::Code(CodeKind::Try { .. }) => "try",
            },
            Value::Array(_) => "array",
            Value::Reference(_) => "reference",
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Value::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Provenance handle of container values.
    pub fn vid(&self) -> Option<ValueId> {
        match self {
            Value::Block(block) => Some(block.vid),
            Value::Array(array) => Some(array.vid),
            _ => None,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Value::Block(Block {
                kind: BlockKind::Code(_),
                ..
            })
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// Sequential statements.
    Do,
    /// Ordered alternatives; the fields are the clauses.
    Try { optional: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Record,
    /// Discriminated union: exactly one option is chosen.
    Choice,
    Code(CodeKind),
}

/// Fixed-arity container.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub fields: Vec<ItemIdx>,
    /// Chosen option of a choice, winning clause of a try.
    pub chosen: Option<usize>,
    pub(crate) vid: ValueId,
}

/// Variable-arity container.
#[derive(Debug, Clone)]
pub struct Array {
    pub tracked: bool,
    /// Highest serial ever assigned in this array's lineage.
    pub serial: u32,
    pub template: ItemIdx,
    pub entries: Vec<ItemIdx>,
    /// Speculative entries staged by write-back.
    pub ghosts: Vec<ItemIdx>,
    pub(crate) vid: ValueId,
}

impl Array {
    /// Id for a new entry appended after the current ones.
    pub fn next_id(&self) -> Id {
        if self.tracked {
            Id::Serial(self.serial + 1)
        } else {
            Id::Ordinal(self.entries.len() as u32 + 1)
        }
    }

    pub fn template_id(&self) -> Id {
        if self.tracked {
            Id::Serial(0)
        } else {
            Id::Ordinal(0)
        }
    }
}

/// One step of a reference as written.
#[derive(Debug, Clone, PartialEq)]
pub enum RefToken {
    Name {
        name: super::ids::FieldId,
        guard: Option<Guard>,
        token: Token,
    },
    /// `~`: the export of the preceding step.
    Export { guard: Option<Guard>, token: Token },
}

impl RefToken {
    pub fn guard(&self) -> Option<Guard> {
        match self {
            RefToken::Name { guard, .. } | RefToken::Export { guard, .. } => *guard,
        }
    }

    pub fn token(&self) -> &Token {
        match self {
            RefToken::Name { token, .. } | RefToken::Export { token, .. } => token,
        }
    }
}

/// Result of binding: an absolute path and one guard slot per step.
///
/// Steps the path shares with the reference's own location are neither
/// evaluated nor guarded when dereferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub path: Path,
    pub guards: Vec<Option<Guard>>,
}

/// Outcome of dereferencing a bound reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub target: Option<ItemIdx>,
    pub conditional: bool,
    pub rejected: bool,
}

#[derive(Debug, Clone)]
pub struct Reference {
    /// Starts from the previous value instead of lexical scope.
    pub dependent: bool,
    pub tokens: Vec<RefToken>,
    pub binding: Option<Binding>,
    pub(crate) resolution: Option<Resolution>,
}

impl Reference {
    pub fn new(dependent: bool, tokens: Vec<RefToken>) -> Self {
        Reference {
            dependent,
            tokens,
            binding: None,
            resolution: None,
        }
    }

    pub fn target(&self) -> Option<ItemIdx> {
        self.resolution.and_then(|resolution| resolution.target)
    }
}
