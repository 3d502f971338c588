//! Code blocks, calls and the structural formulas built on them.

use super::{CrashKind, Deferral, EvalError, Evaluator, StaticErrorKind, Trap};
use crate::tree::{
    BlockKind, EvalState, FieldId, FormulaType, Guard, Id, Io, ItemIdx, MetaId, Qualifier,
    Translation, Value,
};
use ecow::EcoVec;
use tracing::debug;

impl Evaluator<'_> {
    /// Runs the statements of a `do` block in order.
    ///
    /// At runtime the first rejected statement rejects the block and the
    /// rest are skipped. During analysis every statement is visited.
    pub(crate) fn eval_code_block(&mut self, holder: ItemIdx) -> Result<(), EvalError> {
        let statements = self.tree.fields(holder).to_vec();
        let mut conditional = false;
        let mut rejected = false;
        for statement in statements {
            self.eval(statement)?;
            let item = self.tree.item(statement);
            conditional |= item.conditional;
            if item.rejected && !self.analyzing() {
                rejected = true;
                break;
            }
        }
        self.mark_conditional(holder, conditional);
        self.tree.item_mut(holder).rejected = rejected;
        if !rejected {
            self.export_block(holder);
        }
        Ok(())
    }

    /// The export of a `do` block: its export statement, or else whatever
    /// its result exports.
    fn export_block(&mut self, holder: ItemIdx) {
        let statements = self.tree.fields(holder).to_vec();
        let exported = statements
            .iter()
            .rev()
            .copied()
            .find(|&statement| self.tree.item(statement).qualifier == Qualifier::Export)
            .or_else(|| {
                let result = self.code_result(holder)?;
                self.tree.meta(result, MetaId::Export)
            });
        if let Some(exported) = exported {
            self.copy_to_meta(exported, holder, MetaId::Export);
        }
    }

    /// Evaluates a try block.
    ///
    /// Analysis checks the first clause immediately and queues the rest, so
    /// that recursive calls in later clauses find the function already
    /// analyzed. At runtime the first clause that does not reject is chosen.
    pub(crate) fn eval_try_block(
        &mut self,
        holder: ItemIdx,
        optional: bool,
    ) -> Result<(), EvalError> {
        let clauses = self.tree.fields(holder).to_vec();
        let Some(&first) = clauses.first() else {
            return Err(StaticErrorKind::NoResult.into());
        };
        self.mark_conditional(holder, optional);

        let chosen = if self.analyzing() {
            self.eval(first)?;
            if clauses.len() > 1 {
                self.check_clause_conditional(first)?;
                for clause in 1..clauses.len() {
                    self.deferred.push_back(Deferral::TryClause { block: holder, clause });
                }
                self.exports.push_back(holder);
            }
            Some(0)
        } else {
            let mut chosen = None;
            for (position, &clause) in clauses.iter().enumerate() {
                self.eval(clause)?;
                if !self.tree.item(clause).rejected {
                    chosen = Some(position);
                    break;
                }
            }
            chosen
        };

        let Some(chosen) = chosen else {
            if optional {
                self.tree.item_mut(holder).rejected = true;
                return Ok(());
            }
            return Err(CrashKind::AssertionFailed.into());
        };
        if let Some(block) = self.tree.value_mut(holder).and_then(Value::as_block_mut) {
            block.chosen = Some(chosen);
        }
        self.export_clauses(holder, chosen);
        Ok(())
    }

    /// Analysis of a clause queued by [`Self::eval_try_block`].
    pub(crate) fn analyze_clause(
        &mut self,
        holder: ItemIdx,
        clause: usize,
    ) -> Result<(), EvalError> {
        let clauses = self.tree.fields(holder).to_vec();
        let (Some(&first), Some(&current)) = (clauses.first(), clauses.get(clause)) else {
            return Err(Trap::new("deferred clause out of range").into());
        };
        debug!(clause, block = %self.tree.display_path(holder), "analyzing deferred clause");
        self.eval(current)?;
        if clause + 1 < clauses.len() {
            self.check_clause_conditional(current)?;
        }
        let results = (self.code_result(first), self.code_result(current));
        if let (Some(expected), Some(found)) = results {
            self.check_changeable(found, expected)?;
        }
        Ok(())
    }

    fn check_clause_conditional(&self, clause: ItemIdx) -> Result<(), EvalError> {
        if self.tree.item(clause).conditional {
            return Ok(());
        }
        Err(EvalError::from(StaticErrorKind::ClauseNotConditional)
            .at(self.tree.item(clause).token.as_ref()))
    }

    /// Either every clause of a try block exports, under the same name, or
    /// none does.
    pub(crate) fn check_try_exports(&self, holder: ItemIdx) -> Result<(), EvalError> {
        let signature = |clause: ItemIdx| {
            self.tree
                .fields(clause)
                .iter()
                .rev()
                .map(|&statement| self.tree.item(statement))
                .find(|item| item.qualifier == Qualifier::Export)
                .map(|item| item.id.name())
        };
        let clauses = self.tree.fields(holder);
        let Some(&first) = clauses.first() else {
            return Ok(());
        };
        let expected = signature(first);
        for &clause in &clauses[1..] {
            if signature(clause) != expected {
                return Err(EvalError::from(StaticErrorKind::ExportMismatch)
                    .at(self.tree.item(clause).token.as_ref()));
            }
        }
        Ok(())
    }

    /// Exports of a try block form a choice keyed by clause, with the
    /// chosen clause's export selected.
    fn export_clauses(&mut self, holder: ItemIdx, chosen: usize) {
        let clauses = self.tree.fields(holder).to_vec();
        let Some(source) = self.tree.meta(clauses[chosen], MetaId::Export) else {
            return;
        };
        let export = self.tree.new_item(Id::Meta(MetaId::Export), Io::Data);
        self.tree.set_meta(holder, MetaId::Export, export);
        let analyzing = self.analyzing();
        let mut options = Vec::with_capacity(clauses.len());
        for (position, &clause) in clauses.iter().enumerate() {
            let id = self.tree.item(clause).id;
            let option = self.tree.new_item(id, Io::Data);
            options.push(option);
            let item = self.tree.item_mut(option);
            item.conditional = true;
            item.evaluated = EvalState::Done;
            item.rejected = position != chosen && !analyzing;
        }
        let mut block = self.tree.new_block(BlockKind::Choice, options.clone());
        if let Value::Block(block) = &mut block {
            block.chosen = Some(chosen);
        }
        self.tree.set_value(export, block);
        self.tree.item_mut(export).evaluated = EvalState::Done;
        for option in options {
            self.copy_into(source, option);
        }
    }

    /// A field computed by a code block takes the block's result.
    pub(crate) fn eval_code_formula(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let holder = self.required_meta(idx, MetaId::Code)?;
        self.eval(holder)?;
        let (conditional, rejected) = {
            let item = self.tree.item(holder);
            (item.conditional, item.rejected)
        };
        self.mark_conditional(idx, conditional);
        if rejected {
            self.tree.item_mut(idx).rejected = true;
            return Ok(());
        }
        self.take_result(holder, idx)
    }

    /// Copies the result and export of the code block held by `holder` into `idx`.
    fn take_result(&mut self, holder: ItemIdx, idx: ItemIdx) -> Result<(), EvalError> {
        let result = self.code_result(holder).ok_or(StaticErrorKind::NoResult)?;
        self.copy_into(result, idx);
        match self.tree.meta(holder, MetaId::Export) {
            Some(export) => {
                self.copy_to_meta(export, idx, MetaId::Export);
            }
            None => self.tree.remove_meta(idx, MetaId::Export),
        }
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Calls a function with the arguments in the `Arguments` metadata.
    ///
    /// During analysis a call to a function without generic inputs takes the
    /// function's analyzed result directly; generic functions are analyzed
    /// afresh for each call. At runtime every call evaluates a copy of the
    /// function body with its inputs replaced by the arguments.
    pub(crate) fn eval_call(
        &mut self,
        idx: ItemIdx,
        guard: Option<Guard>,
    ) -> Result<(), EvalError> {
        let function_ref = self.required_meta(idx, MetaId::Function)?;
        let resolution = self.resolve(function_ref, !self.analyzing())?;
        self.mark_conditional(idx, resolution.conditional);
        let Some(function) = resolution.target else {
            self.tree.item_mut(idx).rejected = true;
            return Ok(());
        };
        match self.tree.value(function) {
            Some(value) if value.is_code() => {}
            other => {
                let found = other.map_or("nothing", Value::kind_name);
                return Err(StaticErrorKind::NotAFunction { found }.into());
            }
        }

        let arguments = self.required_meta(idx, MetaId::Arguments)?;
        let args = self.tree.fields(arguments).to_vec();
        let mut args_rejected = false;
        for &arg in &args {
            self.eval(arg)?;
            let item = self.tree.item(arg);
            let conditional = item.conditional;
            args_rejected |= item.rejected;
            self.mark_conditional(idx, conditional);
        }
        let inputs = self.block_inputs(function);
        let assignments = self.match_arguments(&args, &inputs)?;

        if self.analyzing() {
            self.eval(function)?;
            for &(arg, input) in &assignments {
                self.check_changeable(arg, input)
                    .map_err(|error| error.at(self.tree.item(arg).token.as_ref()))?;
            }
        }

        let generic = inputs
            .iter()
            .any(|&input| matches!(self.tree.value(input), Some(Value::Anything)));
        let shortcut = !generic || self.within_instance_of(idx, function);
        let (conditional, rejected) = if self.analyzing() && shortcut {
            self.take_result(function, idx)?;
            (self.tree.item(function).conditional, false)
        } else if args_rejected {
            (false, true)
        } else {
            let body = self.instantiate(idx, function, &assignments)?;
            self.eval(body)?;
            let (conditional, rejected) = {
                let item = self.tree.item(body);
                (item.conditional, item.rejected)
            };
            if !rejected {
                self.take_result(body, idx)?;
            }
            (conditional, rejected)
        };

        if self.analyzing() {
            let name = || self.tree.item(function).id;
            match (conditional, guard) {
                (true, None) => {
                    return Err(StaticErrorKind::MissingGuard {
                        name: self.tree.names.display(name()),
                    }
                    .into());
                }
                (false, Some(_)) => {
                    return Err(StaticErrorKind::ExtraGuard {
                        name: self.tree.names.display(name()),
                    }
                    .into());
                }
                _ => {}
            }
        }
        match guard {
            Some(Guard::Reject) => self.mark_conditional(idx, true),
            Some(Guard::Assert) if rejected && !args_rejected => {
                return Err(CrashKind::AssertionFailed.into());
            }
            _ => {}
        }
        self.tree.item_mut(idx).rejected = rejected;
        Ok(())
    }

    /// Whether `idx` lies inside a body instantiated from `function`.
    /// Analysis does not instantiate a generic function inside itself again.
    fn within_instance_of(&self, idx: ItemIdx, function: ItemIdx) -> bool {
        let mut current = idx;
        while let Some(container) = self.tree.container(current) {
            if self.tree.item(current).id == Id::Meta(MetaId::CallBody) {
                let target = self
                    .tree
                    .meta(container, MetaId::Function)
                    .and_then(|holder| self.tree.value(holder)?.as_reference()?.target());
                if target == Some(function) {
                    return true;
                }
            }
            current = container;
        }
        false
    }

    /// Pairs each argument with the input it supplies: named arguments by
    /// name, positional ones by position.
    pub(crate) fn match_arguments(
        &self,
        args: &[ItemIdx],
        inputs: &[ItemIdx],
    ) -> Result<Vec<(ItemIdx, ItemIdx)>, EvalError> {
        let mut assignments = Vec::with_capacity(args.len());
        for &arg in args {
            let input = match self.tree.item(arg).id {
                Id::Name(name) => inputs
                    .iter()
                    .copied()
                    .find(|&input| self.tree.item(input).id == Id::Name(name))
                    .ok_or_else(|| StaticErrorKind::UnknownInput {
                        name: self.tree.names.name(name).into(),
                    })?,
                Id::Ordinal(position) => inputs
                    .get(position as usize - 1)
                    .copied()
                    .ok_or(StaticErrorKind::TooManyArguments)?,
                _ => return Err(Trap::new("argument with unexpected id").into()),
            };
            assignments.push((arg, input));
        }
        Ok(assignments)
    }

    /// Copies the function's code into the call's `CallBody` metadata and
    /// substitutes the arguments for its inputs.
    fn instantiate(
        &mut self,
        call: ItemIdx,
        function: ItemIdx,
        assignments: &[(ItemIdx, ItemIdx)],
    ) -> Result<ItemIdx, EvalError> {
        let to = self.tree.path(call).child(Id::Meta(MetaId::CallBody));
        let translation = Translation::new(self.tree.path(function), to);
        let body = self.tree.new_item(Id::Meta(MetaId::CallBody), Io::Data);
        self.tree.copy_value_into(function, body, Some(&translation));
        self.tree.set_meta(call, MetaId::CallBody, body);
        self.tree.reset(body);

        let function_inputs = self.block_inputs(function);
        let body_inputs = self.block_inputs(body);
        for &(arg, input) in assignments {
            let position = function_inputs
                .iter()
                .position(|&candidate| candidate == input)
                .ok_or_else(|| Trap::new("argument input not found"))?;
            self.assign(arg, body_inputs[position]);
        }
        Ok(body)
    }

    /// During analysis, the value of `new` must be able to replace that of `old`.
    pub(crate) fn check_changeable(&self, new: ItemIdx, old: ItemIdx) -> Result<(), EvalError> {
        let max_depth = self.options.execution.max_provenance_depth;
        if self.tree.changeable_from(new, old, max_depth) {
            return Ok(());
        }
        let kind = |idx| self.tree.value(idx).map_or("nothing", Value::kind_name);
        Err(StaticErrorKind::ChangingType {
            expected: kind(old),
            found: kind(new),
        }
        .into())
    }

    // ========================================================================
    // Structural formulas
    // ========================================================================

    /// Copies the subject value into `idx` and returns the subject's resolution flags.
    fn take_subject(&mut self, idx: ItemIdx) -> Result<bool, EvalError> {
        let subject = self.required_meta(idx, MetaId::Subject)?;
        let resolution = self.resolve(subject, false)?;
        self.mark_conditional(idx, resolution.conditional);
        match resolution.target {
            Some(target) => {
                self.copy_into(target, idx);
                for child in self.tree.children(idx) {
                    self.tree.reset(child);
                }
                Ok(true)
            }
            None => {
                self.tree.item_mut(idx).rejected = true;
                Ok(false)
            }
        }
    }

    /// Evaluates the payload; returns it unless it rejected.
    fn take_payload(&mut self, idx: ItemIdx) -> Result<Option<ItemIdx>, EvalError> {
        let Some(payload) = self.tree.meta(idx, MetaId::Payload) else {
            return Ok(None);
        };
        self.eval(payload)?;
        let item = self.tree.item(payload);
        let (conditional, rejected) = (item.conditional, item.rejected);
        self.mark_conditional(idx, conditional);
        if rejected {
            self.tree.item_mut(idx).rejected = true;
        }
        Ok(Some(payload))
    }

    /// `.a.b := v`: the previous value with one input replaced.
    pub(crate) fn eval_update(
        &mut self,
        idx: ItemIdx,
        path: &EcoVec<FieldId>,
    ) -> Result<(), EvalError> {
        if !self.take_subject(idx)? {
            return Ok(());
        }
        // Containers from the subject down to the assigned field's parent.
        let mut containers = Vec::with_capacity(path.len());
        let mut field = idx;
        for &name in path.iter() {
            containers.push(field);
            field = self
                .tree
                .field(field, name)
                .ok_or_else(|| StaticErrorKind::UndefinedName {
                    name: self.tree.names.name(name).into(),
                })?;
        }
        if field == idx || self.tree.item(field).io != Io::Input {
            return Err(StaticErrorKind::NotAnInput {
                name: self.tree.names.display(self.tree.item(field).id),
            }
            .into());
        }
        let payload = self.required_meta(idx, MetaId::Payload)?;
        self.take_payload(idx)?;
        if self.tree.item(idx).rejected {
            return Ok(());
        }
        if self.analyzing() {
            self.check_changeable(payload, field)?;
        }
        self.assign(payload, field);
        for container in containers {
            self.tree.mark_mutated(container);
        }
        self.eval_value(idx)
    }

    /// `choose x`: the previous choice value with another option selected.
    pub(crate) fn eval_choose(&mut self, idx: ItemIdx, option: FieldId) -> Result<(), EvalError> {
        if !self.take_subject(idx)? {
            return Ok(());
        }
        let block = match self.tree.value(idx) {
            Some(Value::Block(block)) if block.kind == BlockKind::Choice => block,
            other => {
                let found = other.map_or("nothing", Value::kind_name);
                return Err(StaticErrorKind::NotAChoice { found }.into());
            }
        };
        let position = block
            .fields
            .iter()
            .position(|&field| self.tree.item(field).id == Id::Name(option))
            .ok_or_else(|| StaticErrorKind::UndefinedOption {
                name: self.tree.names.name(option).into(),
            })?;
        let target = block.fields[position];

        if let Some(payload) = self.take_payload(idx)? {
            if self.tree.item(idx).rejected {
                return Ok(());
            }
            if self.analyzing() {
                self.check_changeable(payload, target)?;
            }
            self.assign(payload, target);
            self.tree.item_mut(target).conditional = true;
        }
        if let Some(block) = self.tree.value_mut(idx).and_then(Value::as_block_mut) {
            block.chosen = Some(position);
        }
        self.tree.mark_mutated(idx);
        self.eval_value(idx)
    }

    /// `write target := v` inside an on-update reaction. Evaluating the
    /// statement only computes the value; the reaction applies it.
    pub(crate) fn eval_write(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let target = self.required_meta(idx, MetaId::WriteTarget)?;
        self.bind(target, false)?;
        if self.analyzing() {
            self.check_write(idx, target)?;
        }
        let Some(payload) = self.take_payload(idx)? else {
            return Err(Trap::new("write without payload").into());
        };
        if !self.tree.item(idx).rejected {
            self.copy_into(payload, idx);
        }
        Ok(())
    }

    /// Analyzes the on-update reaction of `idx` against its prototype value.
    pub(crate) fn analyze_reaction(&mut self, idx: ItemIdx) -> Result<(), EvalError> {
        let reaction = self.required_meta(idx, MetaId::OnUpdate)?;
        if !self.tree.item(idx).is_computed() {
            return Err(StaticErrorKind::OnUpdateOnData.into());
        }
        self.copy_to_meta(idx, reaction, MetaId::Input);
        self.tree.item_mut(reaction).evaluated = EvalState::NotStarted;
        self.eval(reaction)
    }

    /// Whether an item's formula is a call to a builtin.
    pub(crate) fn builtin_name(&self, statement: ItemIdx) -> Option<FieldId> {
        match self.tree.item(statement).formula {
            FormulaType::Builtin { name } => Some(name),
            _ => None,
        }
    }
}
