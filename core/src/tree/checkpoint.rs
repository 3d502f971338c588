//! Reclaiming arena slots.
//!
//! An edit allocates scratch items while computing its changes, then the
//! items of the new version. A [`Checkpoint`] taken before lets the edit drop
//! everything again when it fails, and free the scratch items once the
//! changes are applied. Freed slots are reused by later allocations.

use super::item::{Item, ItemIdx};
use super::value::Value;
use super::{Id, Io, Tree};
use hashbrown::HashSet;

/// Allocation state of the arena at one moment.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    items: usize,
    values: usize,
    free: Vec<ItemIdx>,
}

impl Tree {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            items: self.items.len(),
            values: self.provenance.len(),
            free: self.free.clone(),
        }
    }

    /// Number of slots waiting to be reused.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Drops every item allocated since `checkpoint` and every link to one.
    ///
    /// Value ids minted since then are dropped too; surviving values that
    /// carry one are given a fresh id.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        let reused: HashSet<ItemIdx> = checkpoint.free.iter().copied().collect();
        let limit = checkpoint.items;
        self.items.truncate(limit);
        for &slot in &checkpoint.free {
            self.items[slot.index()] = blank();
        }
        self.free = checkpoint.free;
        self.provenance.truncate(checkpoint.values);
        self.scrub(&|idx| idx.index() >= limit || reused.contains(&idx));

        for index in 0..self.items.len() {
            let stale = match &self.items[index].value {
                Some(value) => value
                    .vid()
                    .is_some_and(|vid| vid.index() >= checkpoint.values),
                None => false,
            };
            if stale {
                self.mark_mutated(ItemIdx(index as u32));
            }
        }
    }

    /// Removes links from the rest of the arena to the items allocated
    /// between `from` and `to`, leaving those items in place.
    pub(crate) fn sever(&mut self, from: &Checkpoint, to: &Checkpoint) {
        let allocated = allocated_between(from, to);
        self.scrub(&|idx| allocated.contains(&idx));
    }

    /// Frees the items allocated between `from` and `to`.
    ///
    /// Later allocations stay where they are, so value ids minted in that
    /// window are kept.
    pub(crate) fn release(&mut self, from: &Checkpoint, to: &Checkpoint) {
        let allocated = allocated_between(from, to);
        self.scrub(&|idx| allocated.contains(&idx));
        for &slot in &allocated {
            self.items[slot.index()] = blank();
        }
        let mut slots: Vec<ItemIdx> = allocated.into_iter().collect();
        slots.sort_unstable_by(|a, b| b.cmp(a));
        self.free.extend(slots);
    }

    /// Forgets every link to an item for which `gone` holds, from the items
    /// for which it does not.
    fn scrub(&mut self, gone: &dyn Fn(ItemIdx) -> bool) {
        for (index, item) in self.items.iter_mut().enumerate() {
            if gone(ItemIdx(index as u32)) {
                continue;
            }
            if item.container.is_some_and(gone) {
                item.container = None;
            }
            item.metadata.retain(|&(_, meta)| !gone(meta));
            match item.value.as_mut() {
                Some(Value::Block(block)) => block.fields.retain(|&field| !gone(field)),
                Some(Value::Array(array)) => {
                    array.entries.retain(|&entry| !gone(entry));
                    array.ghosts.retain(|&ghost| !gone(ghost));
                }
                Some(Value::Reference(reference)) => {
                    if reference
                        .resolution
                        .is_some_and(|resolution| resolution.target.is_some_and(gone))
                    {
                        reference.resolution = None;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Slots handed out between two checkpoints: new ones past the end of the
/// arena, and free ones taken for reuse.
fn allocated_between(from: &Checkpoint, to: &Checkpoint) -> HashSet<ItemIdx> {
    let still_free: HashSet<ItemIdx> = to.free.iter().copied().collect();
    let mut allocated: HashSet<ItemIdx> = (from.items..to.items)
        .map(|index| ItemIdx(index as u32))
        .collect();
    allocated.extend(from.free.iter().copied().filter(|slot| !still_free.contains(slot)));
    allocated
}

fn blank() -> Item {
    Item::new(Id::Ordinal(0), Io::Data)
}
