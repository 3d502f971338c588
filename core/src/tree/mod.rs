//! The item tree.
//!
//! All items of a workspace live in one arena and are addressed by
//! [`ItemIdx`]. Each item stores the index of its container; containers own
//! their children through the indices held in their values and metadata.
//! Items are never moved between containers: restructuring copies.

pub mod array;
pub mod checkpoint;
pub mod compare;
pub mod copy;
pub mod dump;
pub mod ids;
pub mod item;
pub mod path;
pub mod provenance;
pub mod value;


pub use checkpoint::Checkpoint;
pub use ids::{FieldId, Id, MetaId, Names};
pub use item::{EvalState, FormulaType, Guard, Io, Item, ItemIdx, LoopKind, Qualifier};
pub use path::{Path, Translation};
pub use provenance::{Provenance, ValueId};
pub use value::{
    Array, Binding, Block, BlockKind, CodeKind, RefToken, Reference, Resolution, Value,
};

use core::cell::OnceCell;

#[derive(Debug, Clone)]
pub struct Tree {
    items: Vec<Item>,
    /// Released slots, reused before the arena grows.
    free: Vec<ItemIdx>,
    pub(crate) names: Names,
    pub(crate) provenance: Provenance,
    root: ItemIdx,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Tree {
            items: Vec::new(),
            free: Vec::new(),
            names: Names::new(),
            provenance: Provenance::new(),
            root: ItemIdx(0),
        };
        let root = tree.new_item(Id::Version(0), Io::Data);
        let block = tree.new_block(BlockKind::Record, Vec::new());
        tree.set_value(root, block);
        tree.root = root;
        tree
    }

    pub fn root(&self) -> ItemIdx {
        self.root
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut Names {
        &mut self.names
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, idx: ItemIdx) -> &Item {
        &self.items[idx.index()]
    }

    pub(crate) fn item_mut(&mut self, idx: ItemIdx) -> &mut Item {
        &mut self.items[idx.index()]
    }

    pub(crate) fn alloc(&mut self, item: Item) -> ItemIdx {
        if let Some(idx) = self.free.pop() {
            self.items[idx.index()] = item;
            return idx;
        }
        let idx = ItemIdx(self.items.len() as u32);
        self.items.push(item);
        idx
    }

    /// A new unattached item.
    pub(crate) fn new_item(&mut self, id: Id, io: Io) -> ItemIdx {
        self.alloc(Item::new(id, io))
    }

    pub(crate) fn new_block(&mut self, kind: BlockKind, fields: Vec<ItemIdx>) -> Value {
        Value::Block(Block {
            kind,
            fields,
            chosen: None,
            vid: self.provenance.fresh(),
        })
    }

    pub fn value(&self, idx: ItemIdx) -> Option<&Value> {
        self.item(idx).value.as_ref()
    }

    pub(crate) fn value_mut(&mut self, idx: ItemIdx) -> Option<&mut Value> {
        self.item_mut(idx).value.as_mut()
    }

    pub fn container(&self, idx: ItemIdx) -> Option<ItemIdx> {
        self.item(idx).container
    }

    /// Installs `value` and adopts its children.
    pub(crate) fn set_value(&mut self, idx: ItemIdx, value: Value) {
        for child in value_children(&value) {
            self.adopt(idx, child);
        }
        self.item_mut(idx).value = Some(value);
    }

    /// Removes the value; its children keep pointing at `idx` until re-adopted.
    pub(crate) fn detach_value(&mut self, idx: ItemIdx) -> Option<Value> {
        self.item_mut(idx).value.take()
    }

    fn adopt(&mut self, container: ItemIdx, child: ItemIdx) {
        let item = self.item_mut(child);
        item.container = Some(container);
        item.path = OnceCell::new();
    }

    pub fn meta(&self, idx: ItemIdx, meta: MetaId) -> Option<ItemIdx> {
        self.item(idx).meta(meta)
    }

    /// Attaches `child` as the `meta` entry of `holder`, replacing any previous one.
    pub(crate) fn set_meta(&mut self, holder: ItemIdx, meta: MetaId, child: ItemIdx) {
        self.item_mut(child).id = Id::Meta(meta);
        self.adopt(holder, child);
        let metadata = &mut self.item_mut(holder).metadata;
        match metadata.iter_mut().find(|(key, _)| *key == meta) {
            Some(entry) => entry.1 = child,
            None => metadata.push((meta, child)),
        }
    }

    pub(crate) fn remove_meta(&mut self, holder: ItemIdx, meta: MetaId) {
        self.item_mut(holder).metadata.retain(|(key, _)| *key != meta);
    }

    /// Appends `child` to the fields of the block held by `container`.
    pub(crate) fn push_field(&mut self, container: ItemIdx, child: ItemIdx) {
        self.adopt(container, child);
        if let Some(block) = self.value_mut(container).and_then(Value::as_block_mut) {
            block.fields.push(child);
        }
    }

    /// Children owned by the item's value, in order.
    pub fn children(&self, idx: ItemIdx) -> Vec<ItemIdx> {
        self.value(idx).map(value_children).unwrap_or_default()
    }

    pub fn fields(&self, idx: ItemIdx) -> &[ItemIdx] {
        match self.value(idx) {
            Some(Value::Block(block)) => &block.fields,
            _ => &[],
        }
    }

    pub fn field(&self, idx: ItemIdx, name: FieldId) -> Option<ItemIdx> {
        self.fields(idx)
            .iter()
            .copied()
            .find(|&field| self.item(field).id == Id::Name(name))
    }

    /// The child or metadata entry of `idx` with the given id.
    pub fn child(&self, idx: ItemIdx, id: Id) -> Option<ItemIdx> {
        if let Id::Meta(meta) = id {
            return self.meta(idx, meta);
        }
        match self.value(idx)? {
            Value::Block(block) => block
                .fields
                .iter()
                .copied()
                .find(|&field| self.item(field).id == id),
            Value::Array(array) => core::iter::once(array.template)
                .chain(array.entries.iter().copied())
                .chain(array.ghosts.iter().copied())
                .find(|&entry| self.item(entry).id == id),
            _ => None,
        }
    }

    /// Absolute path of an item, memoized once it is attached.
    pub fn path(&self, idx: ItemIdx) -> Path {
        let item = self.item(idx);
        if let Some(path) = item.path.get() {
            return path.clone();
        }
        if idx == self.root {
            return Path::root();
        }
        match item.container {
            Some(container) => {
                let path = self.path(container).child(item.id);
                if self.is_attached(container) {
                    let _ = item.path.set(path.clone());
                }
                path
            }
            None => Path::from_ids(&[item.id]),
        }
    }

    /// Whether the container chain reaches the root.
    pub fn is_attached(&self, idx: ItemIdx) -> bool {
        let mut current = idx;
        loop {
            if current == self.root {
                return true;
            }
            match self.item(current).container {
                Some(container) => current = container,
                None => return false,
            }
        }
    }

    pub fn lookup(&self, path: &Path) -> Option<ItemIdx> {
        path.ids()
            .iter()
            .try_fold(self.root, |current, &id| self.child(current, id))
    }

    /// Preorder traversal over values and non-template metadata.
    pub fn visit(&self, idx: ItemIdx, f: &mut dyn FnMut(ItemIdx)) {
        f(idx);
        for &(key, meta) in &self.item(idx).metadata {
            if !key.is_template() {
                self.visit(meta, f);
            }
        }
        for child in self.children(idx) {
            self.visit(child, f);
        }
    }

    /// Returns the item to its pre-evaluation state.
    ///
    /// Computed values and computed metadata are dropped, evaluation and
    /// rejection markers cleared and cached reference targets forgotten.
    /// Stored data and bindings survive.
    pub(crate) fn reset(&mut self, idx: ItemIdx) {
        let item = self.item_mut(idx);
        item.evaluated = EvalState::NotStarted;
        item.rejected = false;
        if item.formula.is_computed() {
            item.value = None;
        }
        item.metadata.retain(|(key, _)| !key.is_computed());
        if let Some(Value::Reference(reference)) = item.value.as_mut() {
            reference.resolution = None;
        }
        let metadata = item.metadata.clone();
        for (key, meta) in metadata {
            if !key.is_template() {
                self.reset(meta);
            }
        }
        for child in self.children(idx) {
            self.reset(child);
        }
    }

    /// Repopulates a literal item from its initial value.
    pub(crate) fn initialize(&mut self, idx: ItemIdx) {
        if let Some(initial) = self.meta(idx, MetaId::InitialValue) {
            let translation = Translation::new(self.path(initial), self.path(idx));
            self.copy_value_into(initial, idx, Some(&translation));
        }
    }

    /// The nearest item above `idx` that is not a metadata entry holder,
    /// i.e. the item whose formula `idx` belongs to.
    pub(crate) fn owner(&self, idx: ItemIdx) -> Option<ItemIdx> {
        let mut current = idx;
        while self.item(current).id.is_meta() {
            current = self.item(current).container?;
        }
        Some(current)
    }

    /// The item a dependent reference at `base` starts from.
    ///
    /// Inside a `do` block that is the nearest earlier statement producing
    /// data; the first statement starts from the block's input value. Blocks
    /// without either defer to the enclosing block.
    pub fn previous_value(&self, base: ItemIdx) -> Option<ItemIdx> {
        let mut current = base;
        while let Some(container) = self.container(current) {
            if !self.item(current).id.is_meta() {
                if let Some(block) = self.value(container).and_then(Value::as_block) {
                    if block.kind == BlockKind::Code(CodeKind::Do) {
                        let position = block
                            .fields
                            .iter()
                            .position(|&field| field == current)
                            .unwrap_or(block.fields.len());
                        let previous = block.fields[..position]
                            .iter()
                            .rev()
                            .copied()
                            .find(|&field| self.item(field).produces_data());
                        if previous.is_some() {
                            return previous;
                        }
                        if let Some(input) = self.meta(container, MetaId::Input) {
                            return Some(input);
                        }
                    }
                }
            }
            current = container;
        }
        None
    }

    pub fn display_path(&self, idx: ItemIdx) -> String {
        self.path(idx).display(&self.names).to_string()
    }
}

/// Children owned by a value, in order: template, entries, then ghosts for arrays.
pub(crate) fn value_children(value: &Value) -> Vec<ItemIdx> {
    match value {
        Value::Block(block) => block.fields.clone(),
        Value::Array(array) => core::iter::once(array.template)
            .chain(array.entries.iter().copied())
            .chain(array.ghosts.iter().copied())
            .collect(),
        _ => Vec::new(),
    }
}
