//! Deep copies with path translation and provenance.

use super::{Array, Block, Id, ItemIdx, Translation, Tree, Value};
use core::cell::OnceCell;

impl Tree {
    /// Deep copy of `src` as a new unattached item with id `id`.
    ///
    /// References bound inside the copied subtree are rewritten by
    /// `translation`, so a copy refers to itself where the original referred
    /// to itself. The caller attaches the result.
    pub(crate) fn copy_item(
        &mut self,
        src: ItemIdx,
        id: Id,
        translation: Option<&Translation>,
    ) -> ItemIdx {
        let mut item = self.item(src).clone();
        item.id = id;
        item.container = None;
        item.path = OnceCell::new();
        let value = item.value.take();
        let metadata = core::mem::take(&mut item.metadata);
        let dst = self.alloc(item);

        if let Some(value) = value {
            let value = self.copy_value(&value, dst, translation);
            self.item_mut(dst).value = Some(value);
        }
        for (key, meta) in metadata {
            let copy = self.copy_item(meta, Id::Meta(key), translation);
            self.item_mut(copy).container = Some(dst);
            self.item_mut(dst).metadata.push((key, copy));
        }
        dst
    }

    /// Replaces the value of `dst` with a copy of the value of `src`.
    pub(crate) fn copy_value_into(
        &mut self,
        src: ItemIdx,
        dst: ItemIdx,
        translation: Option<&Translation>,
    ) {
        let value = self.item(src).value.clone();
        let copy = value.map(|value| self.copy_value(&value, dst, translation));
        self.item_mut(dst).value = copy;
    }

    /// Copies a value whose children will belong to `holder`.
    pub(crate) fn copy_value(
        &mut self,
        value: &Value,
        holder: ItemIdx,
        translation: Option<&Translation>,
    ) -> Value {
        match value {
            Value::Block(block) => {
                let fields = self.copy_children(&block.fields, holder, translation);
                Value::Block(Block {
                    kind: block.kind,
                    fields,
                    chosen: block.chosen,
                    vid: self.provenance.copied_from(block.vid),
                })
            }
            Value::Array(array) => {
                let template = self.copy_child(array.template, holder, translation);
                let entries = self.copy_children(&array.entries, holder, translation);
                let ghosts = self.copy_children(&array.ghosts, holder, translation);
                Value::Array(Array {
                    tracked: array.tracked,
                    serial: array.serial,
                    template,
                    entries,
                    ghosts,
                    vid: self.provenance.copied_from(array.vid),
                })
            }
            Value::Reference(reference) => {
                let mut copy = reference.clone();
                copy.resolution = None;
                if let (Some(binding), Some(translation)) = (copy.binding.as_mut(), translation) {
                    binding.path = binding.path.translate(translation);
                }
                Value::Reference(copy)
            }
            scalar => scalar.clone(),
        }
    }

    fn copy_child(
        &mut self,
        child: ItemIdx,
        holder: ItemIdx,
        translation: Option<&Translation>,
    ) -> ItemIdx {
        let id = self.item(child).id;
        let copy = self.copy_item(child, id, translation);
        self.item_mut(copy).container = Some(holder);
        copy
    }

    fn copy_children(
        &mut self,
        children: &[ItemIdx],
        holder: ItemIdx,
        translation: Option<&Translation>,
    ) -> Vec<ItemIdx> {
        children
            .iter()
            .map(|&child| self.copy_child(child, holder, translation))
            .collect()
    }

    /// Gives a value a fresh provenance id, as every mutation must.
    pub(crate) fn mark_mutated(&mut self, idx: ItemIdx) {
        let vid = self.provenance.fresh();
        match self.value_mut(idx) {
            Some(Value::Block(block)) => block.vid = vid,
            Some(Value::Array(array)) => array.vid = vid,
            _ => {}
        }
    }

    /// Whether the value of `copy` is an unmodified copy of the value of `original`.
    ///
    /// Containers follow provenance links; scalars compare equal.
    pub fn is_copy_of(&self, copy: ItemIdx, original: ItemIdx, max_depth: usize) -> bool {
        match (self.value(copy), self.value(original)) {
            (Some(a), Some(b)) => match (a.vid(), b.vid()) {
                (Some(a), Some(b)) => self.provenance.is_copy_of(a, b, max_depth),
                (None, None) => self.values_equal(copy, original),
                _ => false,
            },
            _ => false,
        }
    }
}
