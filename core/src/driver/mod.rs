//! Compilation of a version: analysis, validation, then execution.

mod validate;

use crate::api::EngineOptions;
use crate::evaluator::{Deferral, EvalError, Evaluator, Phase, Trap};
use crate::stdlib::BuiltinRegistry;
use crate::tree::{ItemIdx, Tree};
use tracing::{debug, info};

/// Analyzes and then executes the version at `version`.
///
/// Analysis binds every reference and checks the version statically. Its
/// prototype values are then discarded and the version is executed from
/// its data.
pub(crate) fn compile_version(
    tree: &mut Tree,
    builtins: &BuiltinRegistry,
    options: &EngineOptions,
    version: ItemIdx,
) -> Result<(), EvalError> {
    info!(version = %tree.display_path(version), "analyzing");
    {
        let mut analyzer = Evaluator::new(tree, builtins, options, Phase::Analyzing);
        analyzer.eval(version)?;
        analyzer.drain()?;
    }
    validate::validate(tree, version)?;

    tree.reset(version);
    info!(version = %tree.display_path(version), "executing");
    let mut executor = Evaluator::new(tree, builtins, options, Phase::Executing);
    executor.eval(version)
}

impl Evaluator<'_> {
    /// Runs deferred analysis until no work is left.
    pub(crate) fn drain(&mut self) -> Result<(), EvalError> {
        let max_deferrals = self.options.analysis.max_deferrals;
        let mut processed = 0;
        while let Some(deferral) = self.deferred.pop_front() {
            processed += 1;
            if processed > max_deferrals {
                return Err(Trap::new(format!(
                    "analysis did not settle after {max_deferrals} deferrals"
                ))
                .into());
            }
            debug!(?deferral, "deferred analysis");
            match deferral {
                Deferral::TryClause { block, clause } => self.analyze_clause(block, clause)?,
            }
        }
        while let Some(block) = self.exports.pop_front() {
            self.check_try_exports(block)?;
        }
        Ok(())
    }
}
