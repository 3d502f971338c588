//! Pushing new values back through formulas.

use super::{Change, Changes};
use crate::evaluator::{CrashKind, EvalError, Evaluator, StaticErrorKind, Trap};
use crate::stdlib::{Data, Datum};
use crate::tree::{
    FieldId, FormulaType, Id, Io, ItemIdx, LoopKind, MetaId, Path, Translation, Value,
};
use tracing::debug;

fn not_updatable(reason: impl Into<String>) -> EvalError {
    StaticErrorKind::NotUpdatable {
        reason: reason.into(),
    }
    .into()
}

impl Evaluator<'_> {
    /// Writes `value` to the item at `path`.
    ///
    /// The write is taken over by the outermost computed item on the path
    /// that is not inside metadata of another item on the path; a write
    /// into part of it becomes a write of its whole value. Paths without a
    /// computed item are plain data changes.
    pub(crate) fn write_path(
        &mut self,
        path: &Path,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let (owner, target) = self.write_owner(path)?;
        match owner {
            None => changes.push(self.tree, Change { path: path.clone(), value }),
            Some(owner) if owner == target => self.feedback(owner, value, changes),
            Some(owner) => {
                let owner_path = self.tree.path(owner);
                let suffix = path
                    .suffix_after(&owner_path)
                    .ok_or_else(|| Trap::new("write owner outside the written path"))?
                    .to_vec();
                let patched = self.patch(owner, &suffix, value)?;
                self.feedback(owner, patched, changes)
            }
        }
    }

    fn write_owner(&self, path: &Path) -> Result<(Option<ItemIdx>, ItemIdx), EvalError> {
        let first = path.value_world_start().saturating_sub(1);
        let mut current = self.tree.root();
        let mut owner = None;
        for (index, &id) in path.ids().iter().enumerate() {
            current = self.tree.child(current, id).ok_or_else(|| {
                EvalError::from(StaticErrorKind::UndefinedName {
                    name: self.tree.names.display(id),
                })
            })?;
            if owner.is_none() && index >= first && self.is_write_owner(current) {
                owner = Some(current);
            }
        }
        Ok((owner, current))
    }

    /// Includes are copies; writes stop at them like at data.
    fn is_write_owner(&self, idx: ItemIdx) -> bool {
        let item = self.tree.item(idx);
        item.is_computed() && item.formula != FormulaType::Include
    }

    /// Propagates a new value of a computed item to what it was computed from.
    pub(crate) fn feedback(
        &mut self,
        idx: ItemIdx,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        debug!(path = %self.tree.display_path(idx), "feedback");
        if !self.is_write_owner(idx) {
            let path = self.tree.path(idx);
            return changes.push(self.tree, Change { path, value });
        }
        if let Some(reaction) = self.tree.meta(idx, MetaId::OnUpdate) {
            return self.react(idx, reaction, value, changes);
        }
        if self.tree.values_equal(idx, value) {
            return Ok(());
        }
        match self.tree.item(idx).formula.clone() {
            FormulaType::Reference => {
                let target = self.resolved_target(idx, MetaId::Reference)?;
                let path = self.tree.path(target);
                self.write_path(&path, value, changes)
            }
            FormulaType::Code => {
                let holder = self.required_meta(idx, MetaId::Code)?;
                let result = self
                    .code_result(holder)
                    .ok_or_else(|| not_updatable("code block has no result"))?;
                self.feedback(result, value, changes)
            }
            FormulaType::Call { .. } => self.feedback_call(idx, value, changes),
            FormulaType::Loop(kind) => self.feedback_loop(idx, kind, value, changes),
            FormulaType::Update { path } => self.feedback_update(idx, &path, value, changes),
            FormulaType::Choose { .. } => Err(not_updatable("choose")),
            FormulaType::Write => Err(not_updatable("write statement")),
            FormulaType::Builtin { .. } => Err(not_updatable("builtin outside a call")),
            FormulaType::None | FormulaType::Literal | FormulaType::Include => {
                Err(Trap::new("feedback into data").into())
            }
        }
    }

    fn resolved_target(&self, idx: ItemIdx, meta: MetaId) -> Result<ItemIdx, EvalError> {
        let holder = self.required_meta(idx, meta)?;
        self.tree
            .value(holder)
            .and_then(Value::as_reference)
            .and_then(|reference| reference.target())
            .ok_or_else(|| not_updatable("reference did not resolve"))
    }

    /// An unattached copy of `base` with the item at `suffix` replaced by `value`.
    pub(crate) fn patch(
        &mut self,
        base: ItemIdx,
        suffix: &[Id],
        value: ItemIdx,
    ) -> Result<ItemIdx, EvalError> {
        let copy = self.scratch_copy(base);
        let mut chain = vec![copy];
        let mut current = copy;
        for &id in suffix {
            current = self.tree.child(current, id).ok_or_else(|| {
                not_updatable(format!("nothing to write at {}", self.tree.names.display(id)))
            })?;
            chain.push(current);
        }
        self.tree.copy_value_into(value, current, None);
        let item = self.tree.item_mut(current);
        item.formula = FormulaType::None;
        item.rejected = false;
        for idx in chain {
            self.tree.mark_mutated(idx);
        }
        Ok(copy)
    }

    /// Folds changes landing inside one of `owners` into one new value per
    /// owner; the rest are returned untouched.
    fn merge_into(
        &mut self,
        owners: &[ItemIdx],
        changes: Vec<Change>,
    ) -> Result<(Vec<(ItemIdx, ItemIdx)>, Vec<Change>), EvalError> {
        let mut merged: Vec<(ItemIdx, ItemIdx)> = Vec::new();
        let mut rest = Vec::new();
        for change in changes {
            let owner = owners
                .iter()
                .copied()
                .find(|&owner| self.tree.path(owner).contains_or_equals(&change.path));
            let Some(owner) = owner else {
                rest.push(change);
                continue;
            };
            let owner_path = self.tree.path(owner);
            let slot = merged.iter().position(|&(candidate, _)| candidate == owner);
            let new_value = if change.path == owner_path {
                change.value
            } else {
                let base = slot.map_or(owner, |slot| merged[slot].1);
                let suffix = change.path.ids()[owner_path.len()..].to_vec();
                self.patch(base, &suffix, change.value)?
            };
            match slot {
                Some(slot) => merged[slot].1 = new_value,
                None => merged.push((owner, new_value)),
            }
        }
        Ok((merged, rest))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Builtin calls run their reverse function; user functions propagate
    /// through their body, and whatever lands on an input moves on to the
    /// matching argument.
    fn feedback_call(
        &mut self,
        idx: ItemIdx,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let body = self
            .tree
            .meta(idx, MetaId::CallBody)
            .ok_or_else(|| not_updatable("call was not executed"))?;
        let result = self
            .code_result(body)
            .ok_or_else(|| not_updatable("function has no result"))?;
        let inputs = self.block_inputs(body);

        if let Some(name) = self.builtin_name(result) {
            return self.reverse_builtin(idx, body, name, &inputs, value, changes);
        }

        let mut local = Changes::default();
        self.feedback(result, value, &mut local)?;
        let (merged, rest) = self.merge_into(&inputs, local.into_vec())?;
        let body_path = self.tree.path(body);
        for change in rest {
            if body_path.contains(&change.path) {
                return Err(not_updatable("write into the internals of a function"));
            }
            changes.push(self.tree, change)?;
        }
        for (input, new_value) in merged {
            self.feedback_argument(idx, body, input, new_value, changes)?;
        }
        Ok(())
    }

    fn reverse_builtin(
        &mut self,
        call: ItemIdx,
        body: ItemIdx,
        name: FieldId,
        inputs: &[ItemIdx],
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let builtins = self.builtins;
        let builtin = builtins
            .get(self.tree.names.name(name))
            .ok_or_else(|| StaticErrorKind::UnknownBuiltin {
                name: self.tree.names.name(name).into(),
            })?;
        let reverse = builtin
            .reverse()
            .ok_or_else(|| not_updatable(format!("{} cannot be reversed", builtin.name)))?;
        let data: Data = inputs
            .iter()
            .map(|&input| self.tree.value(input).map_or(Datum::Nil, Datum::from_value))
            .collect();
        let output = self.tree.value(value).map_or(Datum::Nil, Datum::from_value);
        let reversed = reverse(&output, &data).map_err(|error| {
            EvalError::from(CrashKind::Builtin {
                name: builtin.name.clone(),
                message: error.to_string(),
            })
        })?;
        for (&input, datum) in inputs.iter().zip(reversed) {
            let Some(datum) = datum else {
                continue;
            };
            let new_value = datum
                .into_value()
                .ok_or_else(|| Trap::new(format!("{} reversed to a non-scalar", builtin.name)))?;
            let holder = self.scratch(new_value);
            self.feedback_argument(call, body, input, holder, changes)?;
        }
        Ok(())
    }

    fn feedback_argument(
        &mut self,
        call: ItemIdx,
        body: ItemIdx,
        input: ItemIdx,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let arguments = self.required_meta(call, MetaId::Arguments)?;
        let position = self.block_inputs(body).iter().position(|&candidate| candidate == input);
        let input_id = self.tree.item(input).id;
        let argument = self
            .tree
            .fields(arguments)
            .iter()
            .copied()
            .find(|&arg| match self.tree.item(arg).id {
                Id::Name(name) => Id::Name(name) == input_id,
                Id::Ordinal(ordinal) => Some(ordinal as usize - 1) == position,
                _ => false,
            })
            .ok_or_else(|| {
                not_updatable(format!(
                    "input {} has no argument",
                    self.tree.names.display(input_id)
                ))
            })?;
        self.feedback(argument, value, changes)
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Changes to a for-all or such-that view become changes of the source
    /// array: changed entries are reversed through their iteration, new
    /// entries are staged as ghosts and deleted entries are deleted.
    fn feedback_loop(
        &mut self,
        idx: ItemIdx,
        kind: LoopKind,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        if !matches!(kind, LoopKind::ForAll | LoopKind::SuchThat) {
            return Err(not_updatable(format!("{} loop", kind.as_str())));
        }
        let source = self.resolved_target(idx, MetaId::LoopSource)?;
        let new_view = match self.tree.value(value) {
            Some(Value::Array(array)) => array.entries.clone(),
            _ => return Err(not_updatable("loop result must stay an array")),
        };
        let (tracked, serial) = match self.tree.value(source) {
            Some(Value::Array(array)) => (array.tracked, array.serial),
            _ => return Err(Trap::new("loop source is not an array").into()),
        };
        let iterations = self.required_meta(idx, MetaId::Iterations)?;

        // View entry ids paired with the source entry ids they came from.
        let old_view: Vec<Id> = self
            .tree
            .array_entries(idx)
            .iter()
            .map(|&entry| self.tree.item(entry).id)
            .collect();
        let mapping: Vec<(Id, Id)> = match kind {
            LoopKind::SuchThat => {
                let kept = self
                    .tree
                    .fields(iterations)
                    .iter()
                    .filter(|&&iteration| !self.tree.item(iteration).rejected)
                    .map(|&iteration| self.tree.item(iteration).id);
                old_view.iter().copied().zip(kept).collect()
            }
            _ => old_view.iter().map(|&id| (id, id)).collect(),
        };

        let new_source = self.scratch_copy(source);
        // Entries of the copy, looked up before any insertion renumbers them.
        let mut pairs: Vec<(Id, Id, ItemIdx)> = Vec::with_capacity(mapping.len());
        for &(view_id, source_id) in &mapping {
            let entry = self
                .tree
                .child(new_source, source_id)
                .ok_or_else(|| Trap::new("source entry vanished"))?;
            pairs.push((view_id, source_id, entry));
        }
        let paired = |view_id: Id| {
            pairs
                .iter()
                .find(|(candidate, _, _)| *candidate == view_id)
                .copied()
        };

        let mut external = Vec::new();
        for (position, &entry) in new_view.iter().enumerate() {
            let view_id = self.tree.item(entry).id;
            match paired(view_id) {
                Some((_, source_id, target)) => {
                    let old = self
                        .tree
                        .child(idx, view_id)
                        .ok_or_else(|| Trap::new("view entry vanished"))?;
                    if self.tree.values_equal(old, entry) {
                        continue;
                    }
                    let new_value = match kind {
                        LoopKind::ForAll => {
                            let iteration = self
                                .tree
                                .child(iterations, source_id)
                                .ok_or_else(|| Trap::new("missing iteration"))?;
                            self.reverse_iteration(iteration, entry, &mut external)?
                        }
                        _ => entry,
                    };
                    self.tree.copy_value_into(new_value, target, None);
                    self.tree.item_mut(target).formula = FormulaType::None;
                }
                None => {
                    let length = self.tree.array_entries(new_source).len();
                    let source_id = match view_id {
                        Id::Serial(number) if tracked && number > serial => view_id,
                        _ if !tracked => Id::Ordinal(length as u32 + 1),
                        _ => return Err(not_updatable("entry ids are assigned by the array")),
                    };
                    let ghost = self
                        .tree
                        .array_add_ghost(new_source, source_id, None)
                        .ok_or_else(|| Trap::new("cannot stage entry"))?;
                    let new_value = match kind {
                        LoopKind::ForAll => {
                            let iteration = self.spawn_iteration(idx, ghost, None)?;
                            self.eval(iteration)?;
                            self.reverse_iteration(iteration, entry, &mut external)?
                        }
                        _ => entry,
                    };
                    self.tree.copy_value_into(new_value, ghost, None);

                    // Before the source entry of the next surviving view entry.
                    let next = new_view[position + 1..]
                        .iter()
                        .find_map(|&later| paired(self.tree.item(later).id))
                        .map(|(_, _, next)| next);
                    let at = next
                        .and_then(|next| {
                            self.tree
                                .array_entries(new_source)
                                .iter()
                                .position(|&candidate| candidate == next)
                        })
                        .unwrap_or(length);
                    self.tree.array_promote_ghost(new_source, source_id, at);
                }
            }
        }

        let mut deleted: Vec<usize> = pairs
            .iter()
            .filter(|&&(view_id, _, _)| {
                !new_view
                    .iter()
                    .any(|&entry| self.tree.item(entry).id == view_id)
            })
            .filter_map(|&(_, _, gone)| {
                self.tree
                    .array_entries(new_source)
                    .iter()
                    .position(|&candidate| candidate == gone)
            })
            .collect();
        deleted.sort_unstable_by(|a, b| b.cmp(a));
        for position in deleted {
            self.tree.array_delete(new_source, position);
        }
        self.tree.mark_mutated(new_source);

        for change in external {
            changes.push(self.tree, change)?;
        }
        let source_path = self.tree.path(source);
        self.write_path(&source_path, new_source, changes)
    }

    /// The source entry value that makes an iteration produce `value`.
    fn reverse_iteration(
        &mut self,
        iteration: ItemIdx,
        value: ItemIdx,
        external: &mut Vec<Change>,
    ) -> Result<ItemIdx, EvalError> {
        let result = self
            .code_result(iteration)
            .ok_or_else(|| not_updatable("loop body has no result"))?;
        let mut local = Changes::default();
        self.feedback(result, value, &mut local)?;

        let mut owners: Vec<ItemIdx> =
            self.tree.meta(iteration, MetaId::Input).into_iter().collect();
        owners.extend(self.block_inputs(iteration).first().copied());
        let (merged, rest) = self.merge_into(&owners, local.into_vec())?;
        let iteration_path = self.tree.path(iteration);
        for change in rest {
            if iteration_path.contains(&change.path) {
                return Err(not_updatable("write into the internals of a loop body"));
            }
            external.push(change);
        }
        merged
            .last()
            .map(|&(_, new_value)| new_value)
            .ok_or_else(|| not_updatable("loop body does not depend on its entry"))
    }

    // ========================================================================
    // Updates and reactions
    // ========================================================================

    /// The replaced field goes to the payload, everything else to the subject.
    fn feedback_update(
        &mut self,
        idx: ItemIdx,
        path: &[FieldId],
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let subject = self.resolved_target(idx, MetaId::Subject)?;
        let payload = self.required_meta(idx, MetaId::Payload)?;
        let descend = |evaluator: &Self, mut current: ItemIdx| {
            for &name in path {
                current = evaluator
                    .tree
                    .field(current, name)
                    .ok_or_else(|| not_updatable("updated field is missing"))?;
            }
            Ok::<ItemIdx, EvalError>(current)
        };

        let new_field = descend(self, value)?;
        let new_payload = self.scratch_copy(new_field);
        self.feedback(payload, new_payload, changes)?;

        let restored = self.scratch_copy(value);
        let restored_field = descend(self, restored)?;
        let old_field = descend(self, subject)?;
        self.tree.copy_value_into(old_field, restored_field, None);
        let subject_path = self.tree.path(subject);
        self.write_path(&subject_path, restored, changes)
    }

    /// Runs the on-update reaction of `idx` with the written value as its
    /// input; its writes continue the propagation.
    fn react(
        &mut self,
        idx: ItemIdx,
        reaction: ItemIdx,
        value: ItemIdx,
        changes: &mut Changes,
    ) -> Result<(), EvalError> {
        let instance = self.tree.new_item(Id::Meta(MetaId::Reaction), Io::Data);
        self.tree.set_meta(idx, MetaId::Reaction, instance);
        let translation = Translation::new(self.tree.path(reaction), self.tree.path(instance));
        self.tree.copy_value_into(reaction, instance, Some(&translation));
        self.tree.reset(instance);
        let input = self.tree.new_item(Id::Meta(MetaId::Input), Io::Data);
        self.tree.set_meta(instance, MetaId::Input, input);
        self.tree.copy_value_into(value, input, None);

        debug!(path = %self.tree.display_path(idx), "running on-update reaction");
        self.eval(instance)?;
        if self.tree.item(instance).rejected {
            let token = self.tree.item(idx).token.as_ref();
            return Err(EvalError::from(CrashKind::AssertionFailed).at(token));
        }

        let mut visited = Vec::new();
        self.tree.visit(instance, &mut |item| visited.push(item));
        let instance_path = self.tree.path(instance);
        let mut merged: Vec<(ItemIdx, ItemIdx)> = Vec::new();
        for write in visited {
            let item = self.tree.item(write);
            if item.formula != FormulaType::Write
                || item.evaluated != crate::tree::EvalState::Done
                || item.rejected
            {
                continue;
            }
            let target_ref = self.required_meta(write, MetaId::WriteTarget)?;
            let target = self
                .bound_path(target_ref)
                .ok_or_else(|| Trap::new("write target not bound"))?;
            if instance_path.contains(&target) {
                continue;
            }
            let (owner, target_item) = self.write_owner(&target)?;
            let Some(owner) = owner else {
                changes.push(self.tree, Change { path: target, value: write })?;
                continue;
            };
            let slot = merged.iter().position(|&(candidate, _)| candidate == owner);
            let new_value = if owner == target_item {
                write
            } else {
                let base = slot.map_or(owner, |slot| merged[slot].1);
                let suffix = target.ids()[self.tree.path(owner).len()..].to_vec();
                self.patch(base, &suffix, write)?
            };
            match slot {
                Some(slot) => merged[slot].1 = new_value,
                None => merged.push((owner, new_value)),
            }
        }
        for (owner, new_value) in merged {
            self.feedback(owner, new_value, changes)?;
        }
        Ok(())
    }
}
