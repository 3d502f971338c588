//! Loops over arrays.
//!
//! The loop body is a code block applied to each entry. Analysis evaluates
//! one iteration against the array template and keeps it as the
//! `LoopTemplate`; at runtime every entry gets its own copy of that
//! iteration under the `Iterations` metadata, keyed by the entry's id.

use super::{CrashKind, EvalError, Evaluator, StaticErrorKind, Trap};
use crate::tree::{
    Array, EvalState, Guard, Id, Io, ItemIdx, LoopKind, MetaId, Translation, Value,
};

impl Evaluator<'_> {
    pub(crate) fn eval_loop(&mut self, idx: ItemIdx, kind: LoopKind) -> Result<(), EvalError> {
        let source_ref = self.required_meta(idx, MetaId::LoopSource)?;
        let resolution = self.resolve(source_ref, false)?;
        self.mark_conditional(idx, resolution.conditional);
        let Some(source) = resolution.target else {
            self.tree.item_mut(idx).rejected = true;
            return Ok(());
        };
        let (template, entries) = match self.tree.value(source) {
            Some(Value::Array(array)) => (array.template, array.entries.clone()),
            other => {
                let found = other.map_or("nothing", Value::kind_name);
                return Err(StaticErrorKind::NotAnArray { found }.into());
            }
        };
        if self.analyzing() {
            self.analyze_loop(idx, kind, source, template)
        } else {
            self.run_loop(idx, kind, source, &entries)
        }
    }

    fn analyze_loop(
        &mut self,
        idx: ItemIdx,
        kind: LoopKind,
        source: ItemIdx,
        template: ItemIdx,
    ) -> Result<(), EvalError> {
        let body = self.required_meta(idx, MetaId::LoopBody)?;
        let iteration = self.tree.new_item(Id::Meta(MetaId::LoopTemplate), Io::Data);
        self.tree.set_meta(idx, MetaId::LoopTemplate, iteration);
        self.copy_into(body, iteration);
        if kind == LoopKind::Fold && self.block_inputs(iteration).len() < 2 {
            return Err(StaticErrorKind::FoldInputs.into());
        }
        self.bind_iteration(iteration, template, None);
        self.eval(iteration)?;

        let conditional = self.tree.item(iteration).conditional;
        if kind.needs_conditional_body() && !conditional {
            return Err(StaticErrorKind::BodyMustBeConditional { kind: kind.as_str() }.into());
        }
        if !kind.needs_conditional_body() && conditional {
            return Err(StaticErrorKind::BodyMustBeUnconditional { kind: kind.as_str() }.into());
        }

        match kind {
            LoopKind::Find(guard) => {
                self.copy_into(template, idx);
                let index = self.scratch(Value::Number(0.0));
                self.copy_to_meta(index, idx, MetaId::Export);
                self.mark_conditional(idx, guard == Guard::Reject);
            }
            LoopKind::All(guard) | LoopKind::None(guard) => {
                self.copy_into(source, idx);
                self.mark_conditional(idx, guard == Guard::Reject);
            }
            LoopKind::SuchThat => {
                self.copy_into(source, idx);
                self.tree.mark_mutated(idx);
            }
            LoopKind::ForAll => {
                let result = self.code_result(iteration).ok_or(StaticErrorKind::NoResult)?;
                self.copy_to_meta(result, idx, MetaId::LoopResult);
                self.build_mapped(idx, source, result, &[])?;
            }
            LoopKind::Fold => {
                let result = self.code_result(iteration).ok_or(StaticErrorKind::NoResult)?;
                let accumulator = self.block_inputs(iteration)[1];
                self.check_changeable(result, accumulator)?;
                self.copy_into(result, idx);
            }
        }
        Ok(())
    }

    fn run_loop(
        &mut self,
        idx: ItemIdx,
        kind: LoopKind,
        source: ItemIdx,
        entries: &[ItemIdx],
    ) -> Result<(), EvalError> {
        let iterations = self.tree.new_item(Id::Meta(MetaId::Iterations), Io::Data);
        let block = self.tree.new_block(crate::tree::BlockKind::Record, Vec::new());
        self.tree.set_value(iterations, block);
        self.tree.set_meta(idx, MetaId::Iterations, iterations);
        self.tree.item_mut(iterations).evaluated = EvalState::Done;

        let mut accumulator = None;
        let mut found = None;
        let mut kept = Vec::new();
        let mut results = Vec::new();
        let mut failed = false;
        for (position, &entry) in entries.iter().enumerate() {
            let iteration = self.spawn_iteration(idx, entry, accumulator)?;
            self.eval(iteration)?;
            let rejected = self.tree.item(iteration).rejected;
            match kind {
                LoopKind::Find(_) if !rejected => {
                    found = Some((position, entry));
                    break;
                }
                LoopKind::Find(_) => {}
                LoopKind::All(_) if rejected => {
                    failed = true;
                    break;
                }
                LoopKind::None(_) if !rejected => {
                    failed = true;
                    break;
                }
                LoopKind::All(_) | LoopKind::None(_) => {}
                LoopKind::SuchThat => {
                    if !rejected {
                        kept.push(entry);
                    }
                }
                LoopKind::ForAll | LoopKind::Fold => {
                    if rejected {
                        return Err(Trap::new("unconditional loop body rejected").into());
                    }
                    let result = self.code_result(iteration).ok_or(StaticErrorKind::NoResult)?;
                    results.push((self.tree.item(entry).id, result));
                    accumulator = Some(result);
                }
            }
        }

        match kind {
            LoopKind::Find(guard) => match found {
                Some((position, entry)) => {
                    self.copy_into(entry, idx);
                    let index = self.scratch(Value::Number((position + 1) as f64));
                    self.copy_to_meta(index, idx, MetaId::Export);
                }
                None => self.fail(idx, guard)?,
            },
            LoopKind::All(guard) | LoopKind::None(guard) => {
                if failed {
                    self.fail(idx, guard)?;
                } else {
                    self.copy_into(source, idx);
                }
            }
            LoopKind::SuchThat => self.build_filtered(idx, source, &kept)?,
            LoopKind::ForAll => {
                let prototype = self.required_meta(idx, MetaId::LoopResult)?;
                self.build_mapped(idx, source, prototype, &results)?;
            }
            LoopKind::Fold => match accumulator {
                Some(result) => self.copy_into(result, idx),
                None => {
                    let template = self.required_meta(idx, MetaId::LoopTemplate)?;
                    let initial = self.block_inputs(template)[1];
                    self.eval(initial)?;
                    self.copy_into(initial, idx);
                }
            },
        }
        Ok(())
    }

    fn fail(&mut self, idx: ItemIdx, guard: Guard) -> Result<(), EvalError> {
        match guard {
            Guard::Reject => {
                self.tree.item_mut(idx).rejected = true;
                Ok(())
            }
            Guard::Assert => Err(CrashKind::AssertionFailed.into()),
        }
    }

    /// Adds a runtime iteration for `entry`, keyed by the entry's id.
    pub(crate) fn spawn_iteration(
        &mut self,
        loop_item: ItemIdx,
        entry: ItemIdx,
        accumulator: Option<ItemIdx>,
    ) -> Result<ItemIdx, EvalError> {
        let template = self.required_meta(loop_item, MetaId::LoopTemplate)?;
        let iterations = self.required_meta(loop_item, MetaId::Iterations)?;
        let id = self.tree.item(entry).id;
        let to = self.tree.path(iterations).child(id);
        let translation = Translation::new(self.tree.path(template), to);
        let iteration = self.tree.copy_item(template, id, Some(&translation));
        self.tree.push_field(iterations, iteration);
        self.tree.reset(iteration);
        self.bind_iteration(iteration, entry, accumulator);
        Ok(iteration)
    }

    /// Makes `entry` the input value of an iteration and of its first input
    /// statement; a fold's accumulator goes to the second.
    fn bind_iteration(&mut self, iteration: ItemIdx, entry: ItemIdx, accumulator: Option<ItemIdx>) {
        let input = match self.tree.meta(iteration, MetaId::Input) {
            Some(input) => input,
            None => {
                let input = self.tree.new_item(Id::Meta(MetaId::Input), Io::Data);
                self.tree.set_meta(iteration, MetaId::Input, input);
                input
            }
        };
        self.assign(entry, input);
        let inputs = self.block_inputs(iteration);
        if let Some(&first) = inputs.first() {
            self.assign(entry, first);
        }
        if let (Some(accumulator), Some(&second)) = (accumulator, inputs.get(1)) {
            self.assign(accumulator, second);
        }
    }

    /// A for-all result: an array of the same tracking and serial whose
    /// entries are the iteration results, keyed like the source entries.
    fn build_mapped(
        &mut self,
        idx: ItemIdx,
        source: ItemIdx,
        template_result: ItemIdx,
        results: &[(Id, ItemIdx)],
    ) -> Result<(), EvalError> {
        let (tracked, serial) = self.array_shape(source)?;
        let template_id = if tracked { Id::Serial(0) } else { Id::Ordinal(0) };
        let template = self.tree.new_item(template_id, Io::Data);
        let mut entries = Vec::with_capacity(results.len());
        for &(id, _) in results {
            entries.push(self.tree.new_item(id, Io::Data));
        }
        let vid = self.tree.provenance.fresh();
        self.tree.set_value(
            idx,
            Value::Array(Array {
                tracked,
                serial,
                template,
                entries: entries.clone(),
                ghosts: Vec::new(),
                vid,
            }),
        );
        self.fill(template_result, template);
        for (&(_, result), entry) in results.iter().zip(entries) {
            self.fill(result, entry);
        }
        Ok(())
    }

    /// A such-that result: the kept entries, renumbered if untracked.
    fn build_filtered(
        &mut self,
        idx: ItemIdx,
        source: ItemIdx,
        kept: &[ItemIdx],
    ) -> Result<(), EvalError> {
        let (tracked, serial) = self.array_shape(source)?;
        let source_template = self
            .tree
            .value(source)
            .and_then(Value::as_array)
            .map(|array| array.template);
        let template_id = if tracked { Id::Serial(0) } else { Id::Ordinal(0) };
        let template = self.tree.new_item(template_id, Io::Data);
        let mut entries = Vec::with_capacity(kept.len());
        for (position, &entry) in kept.iter().enumerate() {
            let id = if tracked {
                self.tree.item(entry).id
            } else {
                Id::Ordinal(position as u32 + 1)
            };
            entries.push(self.tree.new_item(id, Io::Data));
        }
        let vid = self.tree.provenance.fresh();
        self.tree.set_value(
            idx,
            Value::Array(Array {
                tracked,
                serial,
                template,
                entries: entries.clone(),
                ghosts: Vec::new(),
                vid,
            }),
        );
        if let Some(source_template) = source_template {
            self.fill(source_template, template);
        }
        for (&original, entry) in kept.iter().zip(entries) {
            self.fill(original, entry);
        }
        Ok(())
    }

    fn fill(&mut self, src: ItemIdx, dst: ItemIdx) {
        self.copy_into(src, dst);
        self.tree.item_mut(dst).evaluated = EvalState::Done;
    }

    fn array_shape(&self, source: ItemIdx) -> Result<(bool, u32), EvalError> {
        match self.tree.value(source) {
            Some(Value::Array(array)) => Ok((array.tracked, array.serial)),
            other => Err(StaticErrorKind::NotAnArray {
                found: other.map_or("nothing", Value::kind_name),
            }
            .into()),
        }
    }
}
