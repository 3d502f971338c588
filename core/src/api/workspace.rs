//! The workspace: one document, its versions, and the edits between them.

use super::{Edit, EditOp, EngineOptions, Error};
use crate::driver;
use crate::evaluator::{EvalError, Evaluator, Phase, StaticErrorKind};
use crate::head::load::Loader;
use crate::head::{Head, Literal};
use crate::stdlib::BuiltinRegistry;
use crate::tree::{FormulaType, Id, Io, ItemIdx, MetaId, Path, Translation, Tree, Value};
use crate::update::{Change, Changes};
use tracing::{debug, info};

/// A document under evaluation.
///
/// Versions are numbered from 1 and never modified once published: each
/// edit produces a new version.
#[derive(Debug)]
pub struct Workspace {
    tree: Tree,
    builtins: BuiltinRegistry,
    options: EngineOptions,
    versions: Vec<ItemIdx>,
}

impl Workspace {
    pub fn new(options: EngineOptions) -> Self {
        Self::with_builtins(options, BuiltinRegistry::standard())
    }

    /// A workspace whose library holds exactly `builtins`.
    pub fn with_builtins(options: EngineOptions, builtins: BuiltinRegistry) -> Self {
        let mut tree = Tree::new();
        builtins.install(&mut tree);
        Workspace {
            tree,
            builtins,
            options,
            versions: Vec::new(),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Number of the current version; zero before compilation.
    pub fn version(&self) -> usize {
        self.versions.len()
    }

    /// Loads `head` as version 1, then analyzes and executes it.
    pub fn compile(&mut self, head: &Head) -> Result<(), Error> {
        if !self.versions.is_empty() {
            return Err(Error::Api("workspace is already compiled".to_string()));
        }
        self.transaction(|workspace| {
            let version = Loader::new(&mut workspace.tree)
                .load_version(head, 1)
                .map_err(EvalError::from)?;
            workspace.publish(version)
        })
    }

    /// Applies an edit to the current version, producing the next one.
    ///
    /// The edit becomes a set of data changes, computed against the current
    /// version by propagating the new value back through formulas. The
    /// changes are applied to a copy, which is then compiled. If anything
    /// fails, the current version stays current and the arena is left as it
    /// was.
    pub fn edit(&mut self, edit: Edit) -> Result<(), Error> {
        let current = self.current()?;
        self.transaction(|workspace| workspace.edit_version(current, edit))
    }

    fn edit_version(&mut self, current: ItemIdx, edit: Edit) -> Result<(), Error> {
        let scratch = self.tree.checkpoint();
        let target = self.locate_in(current, &edit.target)?;
        debug!(target = %edit.target, op = ?edit.op, "edit");

        let (written, value) = match &edit.op {
            EditOp::Write(literal) | EditOp::Replace(literal) => (target, self.load(literal)?),
            EditOp::Append(literal) => {
                let source = self.load_optional(literal.as_ref())?;
                let value = self.array_copy(target)?;
                self.tree.array_append(value, source);
                (target, value)
            }
            EditOp::Insert { at, value: literal } => {
                let source = self.load_optional(literal.as_ref())?;
                let value = self.array_copy(target)?;
                let inserted = at
                    .checked_sub(1)
                    .and_then(|position| self.tree.array_insert(value, position, source));
                if inserted.is_none() {
                    return Err(Error::Api(format!("cannot insert at position {at}")));
                }
                (target, value)
            }
            EditOp::Delete => {
                let array = self
                    .tree
                    .container(target)
                    .ok_or_else(|| Error::Api("cannot delete the version".to_string()))?;
                let value = self.array_copy(array)?;
                let position = self
                    .tree
                    .array_entries(array)
                    .iter()
                    .position(|&entry| entry == target)
                    .ok_or_else(|| Error::Api(format!("{} is not an array entry", edit.target)))?;
                self.tree.array_delete(value, position);
                (array, value)
            }
        };
        self.check_writable(current, written, &edit.target)?;

        let mut changes = Changes::default();
        let path = self.tree.path(written);
        {
            let mut evaluator =
                Evaluator::new(&mut self.tree, &self.builtins, &self.options, Phase::Executing);
            match edit.op {
                EditOp::Replace(_) => {
                    if evaluator.tree.item(written).is_computed() {
                        return Err(Error::Api(format!(
                            "{} is computed and cannot be replaced",
                            edit.target
                        )));
                    }
                    changes.push(&*evaluator.tree, Change { path, value })?;
                }
                _ => evaluator.write_path(&path, value, &mut changes)?,
            }
        }
        debug!(changes = changes.len(), "edit propagated");

        // Propagation may leave iterations behind in the current version.
        let propagated = self.tree.checkpoint();
        self.tree.sever(&scratch, &propagated);

        let number = self.versions.len() as u32 + 1;
        let translation = Translation::new(
            self.tree.path(current),
            Path::from_ids(&[Id::Version(number)]),
        );
        let version = self.tree.copy_item(current, Id::Version(number), Some(&translation));
        let root = self.tree.root();
        self.tree.push_field(root, version);
        self.apply(changes, &translation)?;
        self.tree.release(&scratch, &propagated);
        self.tree.reset(version);
        self.publish(version)
    }

    /// The current version's value as JSON.
    pub fn dump(&self) -> Result<serde_json::Value, Error> {
        Ok(self.tree.dump(self.current()?))
    }

    /// A published version's value as JSON.
    pub fn dump_version(&self, number: usize) -> Result<serde_json::Value, Error> {
        let version = number
            .checked_sub(1)
            .and_then(|index| self.versions.get(index))
            .ok_or_else(|| Error::Api(format!("no version {number}")))?;
        Ok(self.tree.dump(*version))
    }

    /// The value at a dotted path in the current version as JSON.
    pub fn read(&self, path: &str) -> Result<serde_json::Value, Error> {
        Ok(self.tree.dump(self.locate(path)?))
    }

    /// The item at a dotted path in the current version.
    ///
    /// Steps are field names, numbers selecting array entries (by serial
    /// in tracked arrays, by position otherwise) and `~` for exports.
    pub fn locate(&self, path: &str) -> Result<ItemIdx, Error> {
        self.locate_in(self.current()?, path)
    }

    /// Whether the value at `copy` was copied, unchanged, from the value at `original`.
    pub fn is_copy_of(&self, copy: &str, original: &str) -> Result<bool, Error> {
        let (copy, original) = (self.locate(copy)?, self.locate(original)?);
        let max_depth = self.options.execution.max_provenance_depth;
        Ok(self.tree.is_copy_of(copy, original, max_depth))
    }

    fn current(&self) -> Result<ItemIdx, Error> {
        self.versions
            .last()
            .copied()
            .ok_or_else(|| Error::Api("workspace is not compiled".to_string()))
    }

    fn locate_in(&self, version: ItemIdx, path: &str) -> Result<ItemIdx, Error> {
        let mut current = version;
        for step in path.split('.').filter(|step| !step.is_empty()) {
            let id = if step == "~" {
                Id::Meta(MetaId::Export)
            } else if let Ok(number) = step.parse::<u32>() {
                match self.tree.value(current) {
                    Some(Value::Array(array)) if array.tracked => Id::Serial(number),
                    _ => Id::Ordinal(number),
                }
            } else {
                let name = self
                    .tree
                    .names()
                    .get(step)
                    .ok_or_else(|| Error::Api(format!("unknown name: {step}")))?;
                Id::Name(name)
            };
            current = self
                .tree
                .child(current, id)
                .ok_or_else(|| Error::Api(format!("no item at {path}")))?;
        }
        Ok(current)
    }

    /// Edits may change inputs, data inside them, and interface outputs.
    fn check_writable(&self, version: ItemIdx, target: ItemIdx, path: &str) -> Result<(), Error> {
        let mut current = target;
        while current != version {
            if matches!(self.tree.item(current).io(), Io::Input | Io::Interface) {
                return Ok(());
            }
            current = self
                .tree
                .container(current)
                .ok_or_else(|| Error::Internal(format!("{path} is outside the version")))?;
        }
        Err(Error::Api(format!("{path} is an output and cannot be written")))
    }

    fn load(&mut self, literal: &Literal) -> Result<ItemIdx, Error> {
        Ok(Loader::new(&mut self.tree)
            .load_literal(literal)
            .map_err(EvalError::from)?)
    }

    fn load_optional(&mut self, literal: Option<&Literal>) -> Result<Option<ItemIdx>, Error> {
        literal.map(|literal| self.load(literal)).transpose()
    }

    fn array_copy(&mut self, array: ItemIdx) -> Result<ItemIdx, Error> {
        if !matches!(self.tree.value(array), Some(Value::Array(_))) {
            let path = self.tree.display_path(array);
            return Err(Error::Api(format!("{path} is not an array")));
        }
        let copy = self.tree.new_item(Id::Ordinal(0), Io::Data);
        self.tree.copy_value_into(array, copy, None);
        Ok(copy)
    }

    /// Stores each change in the new version, freezing the inputs it
    /// passes through into data.
    fn apply(&mut self, changes: Changes, translation: &Translation) -> Result<(), Error> {
        let max_depth = self.options.execution.max_provenance_depth;
        for change in changes.into_vec() {
            let shown = change.path.display(self.tree.names()).to_string();
            if change
                .path
                .ids()
                .iter()
                .any(|id| matches!(id, Id::Meta(meta) if meta.is_computed()))
            {
                return Err(EvalError::from(StaticErrorKind::NotUpdatable {
                    reason: format!("{shown} is computed"),
                })
                .into());
            }
            let path = change.path.translate(translation);
            let target = self
                .tree
                .lookup(&path)
                .ok_or_else(|| Error::Api(format!("no item at {shown}")))?;
            if !self.tree.changeable_from(change.value, target, max_depth) {
                let kind = |idx| self.tree.value(idx).map_or("nothing", Value::kind_name);
                return Err(EvalError::from(StaticErrorKind::ChangingType {
                    expected: kind(target),
                    found: kind(change.value),
                })
                .into());
            }
            debug!(path = %shown, "applying change");

            let mut containers = Vec::new();
            let mut current = self.tree.container(target);
            while let Some(idx) = current {
                let item = self.tree.item_mut(idx);
                if item.io == Io::Input && item.formula.is_computed() {
                    item.formula = FormulaType::None;
                }
                current = item.container;
                containers.push(idx);
            }
            self.tree.copy_value_into(change.value, target, None);
            let item = self.tree.item_mut(target);
            item.formula = FormulaType::None;
            item.rejected = false;
            self.tree.mark_mutated(target);
            for container in containers {
                self.tree.mark_mutated(container);
            }
        }
        Ok(())
    }

    /// Compiles `version` and makes it current.
    fn publish(&mut self, version: ItemIdx) -> Result<(), Error> {
        driver::compile_version(&mut self.tree, &self.builtins, &self.options, version)?;
        self.versions.push(version);
        info!(version = self.versions.len(), "published");
        Ok(())
    }

    /// Runs `step`, rolling the arena back to where it was if it fails.
    fn transaction(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let checkpoint = self.tree.checkpoint();
        let outcome = step(self);
        if outcome.is_err() {
            self.tree.rollback(checkpoint);
        }
        outcome
    }
}
