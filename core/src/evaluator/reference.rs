//! Binding and dereferencing of references.
//!
//! Binding happens once, the first time a reference is evaluated, and turns
//! the written tokens into an absolute [`Binding`]. Dereferencing walks the
//! bound path from the root on every evaluation, evaluating the steps that
//! lie outside the reference's own ancestry and honoring their guards.

use super::{EvalError, Evaluator, StaticErrorKind};
use crate::evaluator::{CrashKind, Trap};
use crate::tree::{
    Binding, BlockKind, CodeKind, EvalState, Guard, Id, ItemIdx, MetaId, Path, RefToken,
    Resolution, Value,
};
use tracing::trace;

impl Evaluator<'_> {
    /// Binds (if needed) and dereferences the reference held by `holder`.
    ///
    /// With `allow_in_progress`, a final step that is still being evaluated
    /// is returned as is instead of being reported as circular.
    pub(crate) fn resolve(
        &mut self,
        holder: ItemIdx,
        allow_in_progress: bool,
    ) -> Result<Resolution, EvalError> {
        let reference = self.reference(holder)?;
        if let Some(resolution) = reference.resolution {
            return Ok(resolution);
        }
        self.bind(holder, allow_in_progress)?;
        let reference = self.reference(holder)?;
        let (binding, dependent) = match reference.binding {
            Some(binding) => (binding, reference.dependent),
            None => return Err(Trap::new("reference bound without binding").into()),
        };
        let token = self.tree.item(holder).token.clone();
        let context = self.context(holder, &binding.path)?;

        let conditional = binding
            .guards
            .iter()
            .any(|guard| *guard == Some(Guard::Reject));
        let steps = binding.path.ids();
        let mut current = self.tree.root();
        for (index, &id) in steps.iter().enumerate() {
            current = self.tree.child(current, id).ok_or_else(|| {
                EvalError::from(StaticErrorKind::UndefinedName {
                    name: self.tree.names.display(id),
                })
            })?;
            if index < context {
                continue;
            }
            let last = index + 1 == steps.len();
            if self.tree.item(current).evaluated == EvalState::InProgress
                && allow_in_progress
                && last
            {
                break;
            }
            self.eval(current)?;
            if !self.tree.item(current).rejected || self.holds_function(current) {
                continue;
            }
            match binding.guards[index] {
                Some(Guard::Assert) => {
                    return Err(EvalError::from(CrashKind::AssertionFailed).at(token.as_ref()));
                }
                Some(Guard::Reject) => {}
                None if dependent && index == context => {}
                None => {
                    return Err(Trap::new(format!(
                        "unguarded rejection of {}",
                        self.tree.display_path(current)
                    ))
                    .into());
                }
            }
            let resolution = Resolution {
                target: None,
                conditional,
                rejected: true,
            };
            self.store_resolution(holder, resolution);
            return Ok(resolution);
        }

        let resolution = Resolution {
            target: Some(current),
            conditional,
            rejected: false,
        };
        self.store_resolution(holder, resolution);
        Ok(resolution)
    }

    /// Turns the written tokens into an absolute path with checked guards.
    pub(crate) fn bind(
        &mut self,
        holder: ItemIdx,
        allow_in_progress: bool,
    ) -> Result<(), EvalError> {
        let reference = self.reference(holder)?;
        if reference.binding.is_some() {
            return Ok(());
        }
        let base = self
            .tree
            .owner(holder)
            .ok_or_else(|| Trap::new("reference without owner"))?;
        let base_path = self.tree.path(base);

        let (mut current, rest) = if reference.dependent {
            (self.previous_value(base)?, &reference.tokens[..])
        } else {
            let Some(RefToken::Name { name, .. }) = reference.tokens.first() else {
                return Err(StaticErrorKind::UndefinedName { name: "~".into() }.into());
            };
            (self.lookup_lexical(base, *name)?, &reference.tokens[1..])
        };
        let mut path = self.tree.path(current);
        let context = base_path.common_prefix_len(&path);
        let calls_ancestor = self.tree.item(holder).id == Id::Meta(MetaId::Function);
        if context >= path.len() && !calls_ancestor {
            return Err(self.circular(current));
        }
        let mut guards = vec![None; path.len()];
        if !reference.dependent {
            let last = rest.is_empty();
            self.check_step(current, &reference.tokens[0], last && allow_in_progress)?;
            guards[path.len() - 1] = reference.tokens[0].guard();
        }

        for (position, token) in rest.iter().enumerate() {
            let last = position + 1 == rest.len();
            if path.len() > context {
                self.eval(current)?;
            }
            let next = match token {
                RefToken::Name { name, .. } => self.tree.child(current, Id::Name(*name)).ok_or_else(
                    || StaticErrorKind::UndefinedName {
                        name: self.tree.names.name(*name).into(),
                    },
                )?,
                RefToken::Export { .. } => {
                    self.tree.meta(current, MetaId::Export).ok_or_else(|| {
                        StaticErrorKind::NoExport {
                            name: self.tree.names.display(self.tree.item(current).id),
                        }
                    })?
                }
            };
            current = next;
            path = path.child(self.tree.item(current).id);
            self.check_step(current, token, last && allow_in_progress)?;
            guards.push(token.guard());
        }

        trace!(path = %path.display(&self.tree.names), context, "bound reference");
        if let Some(reference) = self.tree.value_mut(holder).and_then(Value::as_reference_mut) {
            reference.binding = Some(Binding { path, guards });
        }
        Ok(())
    }

    /// Evaluates a step to learn whether it is conditional and checks the
    /// written guard against it.
    fn check_step(
        &mut self,
        step: ItemIdx,
        token: &RefToken,
        allow_in_progress: bool,
    ) -> Result<(), EvalError> {
        let in_progress = self.tree.item(step).evaluated == EvalState::InProgress;
        if !(in_progress && allow_in_progress) {
            self.eval(step)?;
        }
        if self.holds_function(step) {
            return Ok(());
        }
        let name = || token.token().text.clone();
        match (self.tree.item(step).conditional, token.guard()) {
            (true, None) => Err(StaticErrorKind::MissingGuard { name: name() }.into()),
            (false, Some(_)) => Err(StaticErrorKind::ExtraGuard { name: name() }.into()),
            _ => Ok(()),
        }
    }

    /// The statement a dependent reference starts from.
    pub(crate) fn previous_value(&self, base: ItemIdx) -> Result<ItemIdx, EvalError> {
        self.tree
            .previous_value(base)
            .ok_or_else(|| StaticErrorKind::NoPreviousValue.into())
    }

    /// Finds the item a name refers to by climbing enclosing blocks, then
    /// the builtin library.
    ///
    /// Records see all their fields; `do` blocks only statements before the
    /// one being evaluated. Clauses of a try block and call arguments do not
    /// introduce names.
    pub(crate) fn lookup_lexical(
        &self,
        base: ItemIdx,
        name: crate::tree::FieldId,
    ) -> Result<ItemIdx, EvalError> {
        let id = Id::Name(name);
        let mut current = base;
        while let Some(container) = self.tree.container(current) {
            let is_scope = !self.tree.item(current).id.is_meta()
                && self.tree.item(container).id != Id::Meta(MetaId::Arguments);
            if is_scope {
                if let Some(block) = self.tree.value(container).and_then(Value::as_block) {
                    let visible: &[ItemIdx] = match block.kind {
                        BlockKind::Code(CodeKind::Do) => {
                            let end = block
                                .fields
                                .iter()
                                .position(|&field| field == current)
                                .unwrap_or(block.fields.len());
                            &block.fields[..end]
                        }
                        BlockKind::Code(CodeKind::Try { .. }) => &[],
                        BlockKind::Record | BlockKind::Choice => &block.fields,
                    };
                    let found = visible.iter().find(|&&field| self.tree.item(field).id == id);
                    if let Some(&found) = found {
                        return Ok(found);
                    }
                }
            }
            current = container;
        }
        self.tree
            .meta(self.tree.root(), MetaId::Library)
            .and_then(|library| self.tree.field(library, name))
            .ok_or_else(|| {
                StaticErrorKind::UndefinedName {
                    name: self.tree.names.name(name).into(),
                }
                .into()
            })
    }

    /// Number of leading steps of `path` on the ancestry of the reference
    /// held by `holder`. Computed on use, since copies move both ends.
    fn context(&self, holder: ItemIdx, path: &Path) -> Result<usize, EvalError> {
        let base = self
            .tree
            .owner(holder)
            .ok_or_else(|| Trap::new("reference without owner"))?;
        Ok(self.tree.path(base).common_prefix_len(path))
    }

    /// Functions are values: referring to one never rejects, whatever
    /// running it with its default inputs does.
    fn holds_function(&self, idx: ItemIdx) -> bool {
        self.tree.value(idx).is_some_and(Value::is_code)
    }

    /// Absolute path a bound reference points at.
    pub(crate) fn bound_path(&self, holder: ItemIdx) -> Option<Path> {
        let reference = self.tree.value(holder)?.as_reference()?;
        Some(reference.binding.as_ref()?.path.clone())
    }

    fn reference(&self, holder: ItemIdx) -> Result<crate::tree::Reference, EvalError> {
        match self.tree.value(holder) {
            Some(Value::Reference(reference)) => Ok(reference.clone()),
            _ => Err(Trap::new(format!(
                "{} does not hold a reference",
                self.tree.display_path(holder)
            ))
            .into()),
        }
    }

    fn store_resolution(&mut self, holder: ItemIdx, resolution: Resolution) {
        if let Some(reference) = self.tree.value_mut(holder).and_then(Value::as_reference_mut) {
            reference.resolution = Some(resolution);
        }
    }
}
