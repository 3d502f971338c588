//! Array entry bookkeeping.
//!
//! Tracked arrays give each entry a permanent serial drawn from a counter that
//! only grows, so deletions never cause reuse. Untracked arrays address entries
//! by position and renumber them on insert and delete.

use super::{EvalState, Id, Io, ItemIdx, Translation, Tree, Value};
use core::cell::OnceCell;

impl Tree {
    pub fn array_entries(&self, array: ItemIdx) -> &[ItemIdx] {
        match self.value(array) {
            Some(Value::Array(array)) => &array.entries,
            _ => &[],
        }
    }

    /// Creates an unattached data entry holding a copy of `source` (or of the template).
    fn make_entry(&mut self, array: ItemIdx, id: Id, source: Option<ItemIdx>) -> Option<ItemIdx> {
        let template = self.value(array)?.as_array()?.template;
        let source = source.unwrap_or(template);
        let entry = self.new_item(id, Io::Data);
        let translation = Translation::new(self.path(source), self.path(array).child(id));
        self.copy_value_into(source, entry, Some(&translation));
        let item = self.item_mut(entry);
        item.container = Some(array);
        item.evaluated = EvalState::Done;
        Some(entry)
    }

    /// Appends a copy of `source` and returns the new entry.
    pub(crate) fn array_append(
        &mut self,
        array: ItemIdx,
        source: Option<ItemIdx>,
    ) -> Option<ItemIdx> {
        let id = self.value(array)?.as_array()?.next_id();
        let entry = self.make_entry(array, id, source)?;
        let value = self.value_mut(array)?.as_array_mut()?;
        if let Id::Serial(serial) = id {
            value.serial = serial;
        }
        value.entries.push(entry);
        self.mark_mutated(array);
        Some(entry)
    }

    /// Inserts a copy of `source` before the zero-based `position`.
    pub(crate) fn array_insert(
        &mut self,
        array: ItemIdx,
        position: usize,
        source: Option<ItemIdx>,
    ) -> Option<ItemIdx> {
        let value = self.value(array)?.as_array()?;
        if position > value.entries.len() {
            return None;
        }
        let id = if value.tracked {
            Id::Serial(value.serial + 1)
        } else {
            Id::Ordinal(position as u32 + 1)
        };
        let entry = self.make_entry(array, id, source)?;
        let value = self.value_mut(array)?.as_array_mut()?;
        if let Id::Serial(serial) = id {
            value.serial = serial;
        }
        value.entries.insert(position, entry);
        self.renumber(array);
        self.mark_mutated(array);
        Some(entry)
    }

    /// Removes the entry at the zero-based `position`.
    pub(crate) fn array_delete(&mut self, array: ItemIdx, position: usize) -> Option<ItemIdx> {
        let value = self.value_mut(array)?.as_array_mut()?;
        if position >= value.entries.len() {
            return None;
        }
        let removed = value.entries.remove(position);
        self.renumber(array);
        self.mark_mutated(array);
        Some(removed)
    }

    /// Simulates a structural change during analysis: bumps the serial
    /// counter and breaks the copy chain without materializing an entry.
    pub(crate) fn array_bump(&mut self, array: ItemIdx) {
        if let Some(value) = self.value_mut(array).and_then(Value::as_array_mut) {
            if value.tracked {
                value.serial += 1;
            }
        }
        self.mark_mutated(array);
    }

    /// Stages a speculative entry; a ghost with the same id is replaced.
    pub(crate) fn array_add_ghost(
        &mut self,
        array: ItemIdx,
        id: Id,
        source: Option<ItemIdx>,
    ) -> Option<ItemIdx> {
        let ghost = self.make_entry(array, id, source)?;
        let ghosts: Vec<ItemIdx> = self.value(array)?.as_array()?.ghosts.clone();
        let kept: Vec<ItemIdx> = ghosts
            .into_iter()
            .filter(|&existing| self.item(existing).id != id)
            .collect();
        let value = self.value_mut(array)?.as_array_mut()?;
        value.ghosts = kept;
        value.ghosts.push(ghost);
        Some(ghost)
    }

    /// Turns the ghost with `id` into a real entry placed before the entry
    /// at `position`, or last when `position` is past the end.
    pub(crate) fn array_promote_ghost(
        &mut self,
        array: ItemIdx,
        id: Id,
        position: usize,
    ) -> Option<ItemIdx> {
        let staged = {
            let value = self.value(array)?.as_array()?;
            value
                .ghosts
                .iter()
                .position(|&ghost| self.item(ghost).id == id)?
        };
        let value = self.value_mut(array)?.as_array_mut()?;
        let ghost = value.ghosts.remove(staged);
        if let Id::Serial(serial) = id {
            value.serial = value.serial.max(serial);
        }
        let position = position.min(value.entries.len());
        value.entries.insert(position, ghost);
        self.renumber(array);
        self.mark_mutated(array);
        Some(ghost)
    }

    /// Restores positional ids of an untracked array.
    fn renumber(&mut self, array: ItemIdx) {
        let Some(value) = self.value(array).and_then(Value::as_array) else {
            return;
        };
        if value.tracked {
            return;
        }
        let entries = value.entries.clone();
        for (position, entry) in entries.into_iter().enumerate() {
            let id = Id::Ordinal(position as u32 + 1);
            if self.item(entry).id != id {
                self.item_mut(entry).id = id;
                self.forget_paths(entry);
            }
        }
    }

    /// Drops memoized paths of a subtree whose position changed.
    fn forget_paths(&mut self, idx: ItemIdx) {
        self.item_mut(idx).path = OnceCell::new();
        let metadata: Vec<ItemIdx> = self.item(idx).metadata.iter().map(|(_, m)| *m).collect();
        for child in metadata.into_iter().chain(self.children(idx)) {
            self.forget_paths(child);
        }
    }
}
