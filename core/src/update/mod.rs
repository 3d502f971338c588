//! Reverse computation of edits.
//!
//! Writing a value to a computed item does not store it there. The write is
//! pushed back through the item's formula until it reaches data: references
//! forward to their targets, code blocks to their result statement, builtin
//! calls through their reverse functions, loops entry by entry, and fields
//! with an on-update reaction run the reaction, whose `write` statements
//! become new writes. The data changes collected this way are applied to a
//! copy of the version.

mod feedback;
mod writes;

#[cfg(test)]
mod update_test;

use crate::evaluator::{EvalError, StaticErrorKind};
use crate::tree::{ItemIdx, Path, Tree};

/// A new value for a data item, held by an unattached item.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub path: Path,
    pub value: ItemIdx,
}

/// Data changes produced by one edit. Overlapping changes conflict unless
/// they are identical.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    changes: Vec<Change>,
}

impl Changes {
    pub(crate) fn push(&mut self, tree: &Tree, change: Change) -> Result<(), EvalError> {
        for existing in &self.changes {
            if !existing.path.overlaps(&change.path) {
                continue;
            }
            if existing.path == change.path && tree.values_equal(existing.value, change.value) {
                return Ok(());
            }
            return Err(StaticErrorKind::WriteConflict {
                path: change.path.display(tree.names()).to_string(),
            }
            .into());
        }
        self.changes.push(change);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.changes.len()
    }

    pub(crate) fn into_vec(self) -> Vec<Change> {
        self.changes
    }
}
