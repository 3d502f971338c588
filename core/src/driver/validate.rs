//! Checks that need the whole analyzed version.

use crate::evaluator::{EvalError, StaticErrorKind};
use crate::tree::{
    BlockKind, CodeKind, EvalState, Id, Io, ItemIdx, MetaId, Path, Qualifier, Tree, Value,
};
use hashbrown::HashSet;

pub(super) fn validate(tree: &Tree, version: ItemIdx) -> Result<(), EvalError> {
    unused_lets(tree, version)?;
    previous_values(tree, version)
}

/// Every `let` that was analyzed must be referenced by something.
fn unused_lets(tree: &Tree, version: ItemIdx) -> Result<(), EvalError> {
    let mut referenced: HashSet<Path> = HashSet::new();
    let mut lets = Vec::new();
    tree.visit(version, &mut |idx| {
        let item = tree.item(idx);
        if let Some(Value::Reference(reference)) = item.value() {
            if let Some(binding) = &reference.binding {
                for len in 1..=binding.path.len() {
                    referenced.insert(binding.path.prefix(len));
                }
            }
        }
        if item.qualifier() == Qualifier::Let && item.evaluated() == EvalState::Done {
            lets.push(idx);
        }
    });
    for idx in lets {
        if !referenced.contains(&tree.path(idx)) {
            let item = tree.item(idx);
            return Err(EvalError::from(StaticErrorKind::UnusedLet {
                name: tree.names().display(item.id()),
            })
            .at(item.token()));
        }
    }
    Ok(())
}

/// Loop bodies and `do` blocks used as statements must start from the
/// value before them; other blocks may not reach one outside themselves.
fn previous_values(tree: &Tree, version: ItemIdx) -> Result<(), EvalError> {
    let mut blocks = Vec::new();
    tree.visit(version, &mut |idx| {
        if matches!(
            tree.value(idx),
            Some(Value::Block(block)) if block.kind == BlockKind::Code(CodeKind::Do)
        ) {
            blocks.push(idx);
        }
    });
    for holder in blocks {
        let Some(first) = first_statement(tree, holder) else {
            continue;
        };
        let Some(previous) = tree.previous_value(first) else {
            continue;
        };
        let holder_path = tree.path(holder);
        let previous_path = tree.path(previous);
        let owned = holder_path.contains(&previous_path);
        let bindings = bindings_under(tree, first);
        let continues = bindings
            .iter()
            .any(|(dependent, path)| *dependent && previous_path.contains_or_equals(path));
        let inputs = input_paths(tree, holder);
        let uses_input = bindings.iter().any(|(_, path)| {
            previous_path.contains_or_equals(path)
                || inputs.iter().any(|input| input.contains_or_equals(path))
        });

        let kind = if is_iteration(tree, holder) || (!owned && is_statement_block(tree, holder)) {
            (!uses_input).then_some(StaticErrorKind::IgnoresPreviousValue)
        } else {
            (!owned && continues).then_some(StaticErrorKind::RetainsPreviousValue)
        };
        if let Some(kind) = kind {
            return Err(EvalError::from(kind).at(tree.item(first).token()));
        }
    }
    Ok(())
}

/// The first statement producing data that is not one of the block's inputs.
fn first_statement(tree: &Tree, holder: ItemIdx) -> Option<ItemIdx> {
    tree.fields(holder).iter().copied().find(|&field| {
        let item = tree.item(field);
        item.produces_data() && item.io() != Io::Input
    })
}

fn input_paths(tree: &Tree, holder: ItemIdx) -> Vec<Path> {
    tree.fields(holder)
        .iter()
        .filter(|&&field| tree.item(field).io() == Io::Input)
        .map(|&field| tree.path(field))
        .collect()
}

/// Bound paths of the references under `statement`, flagged when dependent.
fn bindings_under(tree: &Tree, statement: ItemIdx) -> Vec<(bool, Path)> {
    let mut bindings = Vec::new();
    tree.visit(statement, &mut |idx| {
        if let Some(Value::Reference(reference)) = tree.value(idx) {
            if let Some(binding) = &reference.binding {
                bindings.push((reference.dependent, binding.path.clone()));
            }
        }
    });
    bindings
}

/// A loop body instance: the analyzed template or one iteration.
fn is_iteration(tree: &Tree, holder: ItemIdx) -> bool {
    let item = tree.item(holder);
    item.id() == Id::Meta(MetaId::LoopTemplate)
        || item
            .container()
            .is_some_and(|container| tree.item(container).id() == Id::Meta(MetaId::Iterations))
}

/// The code of a statement in a `do` block, directly or as a try clause.
fn is_statement_block(tree: &Tree, holder: ItemIdx) -> bool {
    let mut code = holder;
    if tree.item(code).id() != Id::Meta(MetaId::Code) {
        match tree.container(code) {
            Some(container) if is_try(tree, container) => code = container,
            _ => return false,
        }
    }
    tree.container(code)
        .and_then(|statement| tree.container(statement))
        .and_then(|block| tree.value(block))
        .is_some_and(|value| {
            matches!(value, Value::Block(block) if block.kind == BlockKind::Code(CodeKind::Do))
        })
}

fn is_try(tree: &Tree, holder: ItemIdx) -> bool {
    let kind = match tree.value(holder) {
        Some(Value::Block(block)) => block.kind,
        _ => return false,
    };
    tree.item(holder).id() == Id::Meta(MetaId::Code)
        && matches!(kind, BlockKind::Code(CodeKind::Try { .. }))
}
