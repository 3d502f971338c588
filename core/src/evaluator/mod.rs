//! Evaluation of items.
//!
//! One [`Evaluator`] runs one phase over one version. In the analyzing phase
//! it binds references, checks guards and types, and computes prototype
//! values from defaults; builtins are not run and nothing rejects. In the
//! executing phase it computes concrete values, and rejection stops the
//! enclosing block.
//!
//! Evaluation is recursive descent driven by each item's formula. The
//! `evaluated` marker on items detects cycles: meeting an item that is still
//! in progress is a circular reference, except for the function of a runtime
//! call, which is how recursion works.

pub mod error;

mod builtin;
mod code;
mod loops;
mod reference;

#[cfg(test)]
mod eval_test;

pub use error::{Crash, CrashKind, EvalError, StaticError, StaticErrorKind, Trap};

use crate::api::EngineOptions;
use crate::stdlib::BuiltinRegistry;
use crate::tree::{
    BlockKind, CodeKind, EvalState, FormulaType, Id, ItemIdx, MetaId, Path, Translation, Tree,
    Value,
};
use hashbrown::HashMap;
use std::collections::VecDeque;
use tracing::trace;

/// Which pass an evaluator is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Analyzing,
    Executing,
}

/// Analysis postponed until the first pass completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deferral {
    /// A clause after the first of a try block.
    TryClause { block: ItemIdx, clause: usize },
}

pub(crate) struct Evaluator<'a> {
    pub(crate) tree: &'a mut Tree,
    pub(crate) builtins: &'a BuiltinRegistry,
    pub(crate) options: &'a EngineOptions,
    pub(crate) phase: Phase,
    depth: usize,
    pub(crate) deferred: VecDeque<Deferral>,
    /// Try blocks whose clause exports are checked once all clauses are analyzed.
    pub(crate) exports: VecDeque<ItemIdx>,
    /// Targets written so far by each reaction, for conflict detection.
    pub(crate) reaction_writes: HashMap<ItemIdx, Vec<Path>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        tree: &'a mut Tree,
        builtins: &'a BuiltinRegistry,
        options: &'a EngineOptions,
        phase: Phase,
    ) -> Self {
        Evaluator {
            tree,
            builtins,
            options,
            phase,
            depth: 0,
            deferred: VecDeque::new(),
            exports: VecDeque::new(),
            reaction_writes: HashMap::new(),
        }
    }

    pub(crate) fn analyzing(&self) -> bool {
        self.phase == Phase::Analyzing
    }

    /// Evaluates an item once; later calls are no-ops.
    pub(crate) fn eval(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        match self.tree.item(idx).evaluated {
            EvalState::Done => return Ok(()),
            EvalState::InProgress => return Err(self.circular(idx)),
            EvalState::NotStarted => {}
        }
        let max_depth = self.options.execution.max_depth;
        if self.depth >= max_depth {
            return Err(EvalError::from(CrashKind::TooDeep {
                depth: self.depth,
                max_depth,
            })
            .at(self.tree.item(idx).token.as_ref()));
        }

        trace!(phase = ?self.phase, path = %self.tree.display_path(idx), "eval");
        self.tree.item_mut(idx).evaluated = EvalState::InProgress;
        self.depth += 1;
        let result = self.eval_formula(idx);
        self.depth -= 1;
        result.map_err(|error| error.at(self.tree.item(idx).token.as_ref()))?;
        self.tree.item_mut(idx).evaluated = EvalState::Done;

        self.check_conditionality(idx)?;
        if self.analyzing() && self.tree.meta(idx, MetaId::OnUpdate).is_some() {
            self.analyze_reaction(idx)?;
        }
        Ok(())
    }

    fn eval_formula(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let formula = self.tree.item(idx).formula.clone();
        match formula {
            FormulaType::None => self.eval_value(idx),
            FormulaType::Literal => {
                if self.tree.value(idx).is_none() {
                    self.tree.initialize(idx);
                }
                self.eval_value(idx)
            }
            FormulaType::Reference => self.eval_reference_formula(idx),
            FormulaType::Include => self.eval_reference_formula(idx),
            FormulaType::Code => self.eval_code_formula(idx),
            FormulaType::Loop(kind) => self.eval_loop(idx, kind),
            FormulaType::Call { guard } => self.eval_call(idx, guard),
            FormulaType::Update { path } => self.eval_update(idx, &path),
            FormulaType::Choose { option } => self.eval_choose(idx, option),
            FormulaType::Write => self.eval_write(idx),
            FormulaType::Builtin { name } => self.eval_builtin(idx, name),
        }
    }

    /// Evaluates the children of a stored value.
    pub(crate) fn eval_value(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let kind = match self.tree.value(idx) {
            Some(Value::Block(block)) => Some(block.kind),
            Some(Value::Array(_)) => None,
            _ => return Ok(()),
        };
        match kind {
            Some(BlockKind::Code(CodeKind::Do)) => self.eval_code_block(idx),
            Some(BlockKind::Code(CodeKind::Try { optional })) => self.eval_try_block(idx, optional),
            Some(BlockKind::Choice) => self.eval_choice(idx),
            Some(BlockKind::Record) | None => {
                for child in self.tree.children(idx) {
                    self.eval(child)?;
                }
                Ok(())
            }
        }
    }

    /// Only the chosen option is live at runtime; the rest are rejected.
    fn eval_choice(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let Some(block) = self.tree.value(idx).and_then(Value::as_block) else {
            return Ok(());
        };
        let (options, chosen) = (block.fields.clone(), block.chosen);
        for (position, option) in options.into_iter().enumerate() {
            if self.analyzing() || chosen == Some(position) {
                self.eval(option)?;
            } else {
                let item = self.tree.item_mut(option);
                item.rejected = true;
                item.evaluated = EvalState::Done;
            }
        }
        Ok(())
    }

    /// Copies the reference target's value.
    fn eval_reference_formula(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let holder = self.required_meta(idx, MetaId::Reference)?;
        let resolution = self.resolve(holder, false)?;
        self.mark_conditional(idx, resolution.conditional);
        match resolution.target {
            Some(target) => self.copy_into(target, idx),
            None => self.tree.item_mut(idx).rejected = true,
        }
        Ok(())
    }

    fn check_conditionality(&self, idx: ItemIdx) -> Result<(), EvalError> {
        let item = self.tree.item(idx);
        let name = || self.tree.names.display(item.id);
        if item.io == crate::tree::Io::Input && item.conditional && !self.is_option(idx) {
            return Err(StaticErrorKind::ConditionalInput { name: name() }.into());
        }
        if self.analyzing() && item.declared_conditional && !item.conditional {
            return Err(StaticErrorKind::UnconditionalName { name: name() }.into());
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Options of a choice are conditional by nature.
    fn is_option(&self, idx: ItemIdx) -> bool {
        self.tree
            .container(idx)
            .and_then(|container| self.tree.value(container))
            .and_then(Value::as_block)
            .is_some_and(|block| block.kind == BlockKind::Choice)
    }

    pub(crate) fn circular(&self, idx: ItemIdx) -> EvalError {
        StaticErrorKind::CircularReference {
            path: self.tree.display_path(idx),
        }
        .into()
    }

    pub(crate) fn required_meta(&self, idx: ItemIdx, meta: MetaId) -> Result<ItemIdx, EvalError> {
        self.tree.meta(idx, meta).ok_or_else(|| {
            Trap::new(format!(
                "{} has no {} metadata",
                self.tree.display_path(idx),
                meta.as_str()
            ))
            .into()
        })
    }

    /// Conditionality only accumulates; it is a static property.
    pub(crate) fn mark_conditional(&mut self, idx: ItemIdx, conditional: bool) {
        if conditional {
            self.tree.item_mut(idx).conditional = true;
        }
    }

    /// Copies the value of `src` into `dst`, retargeting internal references.
    pub(crate) fn copy_into(&mut self, src: ItemIdx, dst: ItemIdx) {
        let translation = Translation::new(self.tree.path(src), self.tree.path(dst));
        self.tree.copy_value_into(src, dst, Some(&translation));
    }

    /// Creates a metadata entry on `holder` holding a copy of `src`'s value.
    pub(crate) fn copy_to_meta(&mut self, src: ItemIdx, holder: ItemIdx, meta: MetaId) -> ItemIdx {
        let item = self.tree.new_item(Id::Meta(meta), crate::tree::Io::Data);
        self.tree.set_meta(holder, meta, item);
        self.copy_into(src, item);
        self.tree.item_mut(item).evaluated = EvalState::Done;
        item
    }

    /// An unattached item holding `value`.
    pub(crate) fn scratch(&mut self, value: Value) -> ItemIdx {
        let item = self.tree.new_item(Id::Ordinal(0), crate::tree::Io::Data);
        self.tree.set_value(item, value);
        self.tree.item_mut(item).evaluated = EvalState::Done;
        item
    }

    /// An unattached copy of an item's value.
    pub(crate) fn scratch_copy(&mut self, src: ItemIdx) -> ItemIdx {
        let item = self.tree.new_item(Id::Ordinal(0), crate::tree::Io::Data);
        self.tree.copy_value_into(src, item, None);
        self.tree.item_mut(item).evaluated = EvalState::Done;
        item
    }

    /// Input statements of the code block held by `holder`.
    pub(crate) fn block_inputs(&self, holder: ItemIdx) -> Vec<ItemIdx> {
        self.tree
            .fields(holder)
            .iter()
            .copied()
            .filter(|&field| self.tree.item(field).io == crate::tree::Io::Input)
            .collect()
    }

    /// Result statement of the code block held by `holder`: the last data
    /// statement, or for a try block the result of the chosen clause.
    pub(crate) fn code_result(&self, holder: ItemIdx) -> Option<ItemIdx> {
        let block = self.tree.value(holder)?.as_block()?;
        match block.kind {
            BlockKind::Code(CodeKind::Do) => block
                .fields
                .iter()
                .rev()
                .copied()
                .find(|&field| self.tree.item(field).produces_data()),
            BlockKind::Code(CodeKind::Try { .. }) => {
                let clause = *block.fields.get(block.chosen?)?;
                self.code_result(clause)
            }
            _ => None,
        }
    }

    /// Replaces the value of an input-like statement with a copy of `src`,
    /// turning it into plain data.
    pub(crate) fn assign(&mut self, src: ItemIdx, dst: ItemIdx) {
        self.copy_into(src, dst);
        let item = self.tree.item_mut(dst);
        item.formula = FormulaType::None;
        item.rejected = false;
        item.evaluated = EvalState::NotStarted;
    }
}
