//! Static checks on `write` statements.

use crate::evaluator::{EvalError, Evaluator, StaticErrorKind, Trap};
use crate::tree::{Id, ItemIdx, MetaId};

impl Evaluator<'_> {
    /// Checks a write statement found while analyzing a reaction.
    ///
    /// A write inside a loop body may only target the iteration itself. A
    /// write in a reaction must target a field declared before the reacting
    /// field, within the same block, and no two writes of one reaction may
    /// overlap.
    pub(crate) fn check_write(
        &mut self,
        write: ItemIdx,
        target_ref: ItemIdx,
    ) -> Result<(), EvalError> {
        let target = self
            .bound_path(target_ref)
            .ok_or_else(|| Trap::new("write target not bound"))?;

        let mut current = write;
        let reaction = loop {
            match self.tree.item(current).id {
                Id::Meta(MetaId::OnUpdate | MetaId::Reaction) => break current,
                Id::Meta(MetaId::LoopTemplate) => {
                    if self.tree.path(current).contains(&target) {
                        return Ok(());
                    }
                    return Err(StaticErrorKind::ExternalWriteFromForAll.into());
                }
                _ => {}
            }
            current = self
                .tree
                .container(current)
                .ok_or(StaticErrorKind::WriteOutsideContext)?;
        };

        let owner = self
            .tree
            .container(reaction)
            .ok_or_else(|| Trap::new("reaction without owner"))?;
        let context = self
            .tree
            .container(owner)
            .ok_or(StaticErrorKind::WriteOutsideContext)?;
        let context_path = self.tree.path(context);
        if !context_path.contains(&target) {
            return Err(StaticErrorKind::WriteOutsideContext.into());
        }
        let depth = context_path.len();
        let target_step = target.ids()[depth];
        if target_step.is_meta() {
            return Err(StaticErrorKind::WriteOutsideContext.into());
        }
        let fields = self.tree.fields(context);
        let position = |id: Id| fields.iter().position(|&field| self.tree.item(field).id == id);
        let owner_id = self.tree.item(owner).id;
        match (position(target_step), position(owner_id)) {
            (Some(target_position), Some(owner_position)) if target_position < owner_position => {}
            _ => return Err(StaticErrorKind::WriteMustGoBackwards.into()),
        }

        let writes = self.reaction_writes.entry(reaction).or_default();
        if writes.iter().any(|written| written.overlaps(&target)) {
            return Err(StaticErrorKind::WriteConflict {
                path: target.display(&self.tree.names).to_string(),
            }
            .into());
        }
        writes.push(target);
        Ok(())
    }
}
