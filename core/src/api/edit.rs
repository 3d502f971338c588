//! Edits applied to the current version of a workspace.

use crate::head::Literal;

/// One edit: an operation on the item at a dotted path such as `"b.2"`.
#[derive(Debug, Clone)]
pub struct Edit {
    pub target: String,
    pub op: EditOp,
}

#[derive(Debug, Clone)]
pub enum EditOp {
    /// Writes a value through the target's formula back to the data it
    /// was computed from.
    Write(Literal),
    /// Replaces the value of a data item outright.
    Replace(Literal),
    /// Appends an entry to the target array; `None` appends a copy of the
    /// template.
    Append(Option<Literal>),
    /// Inserts an entry before the one-based position `at`.
    Insert { at: usize, value: Option<Literal> },
    /// Deletes the target array entry.
    Delete,
}

impl Edit {
    pub fn write(target: &str, value: impl Into<Literal>) -> Self {
        Edit {
            target: target.to_string(),
            op: EditOp::Write(value.into()),
        }
    }

    pub fn replace(target: &str, value: impl Into<Literal>) -> Self {
        Edit {
            target: target.to_string(),
            op: EditOp::Replace(value.into()),
        }
    }

    pub fn append(target: &str, value: Option<Literal>) -> Self {
        Edit {
            target: target.to_string(),
            op: EditOp::Append(value),
        }
    }

    pub fn insert(target: &str, at: usize, value: Option<Literal>) -> Self {
        Edit {
            target: target.to_string(),
            op: EditOp::Insert { at, value },
        }
    }

    pub fn delete(target: &str) -> Self {
        Edit {
            target: target.to_string(),
            op: EditOp::Delete,
        }
    }
}
