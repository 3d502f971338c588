//! Array and text intrinsics.
//!
//! These operate on whole values, so they are executed by the evaluator's
//! array engine instead of through [`super::Datum`]s.

use super::{Builtin, BuiltinRegistry, Intrinsic, Output, Prototype};

pub fn register(registry: &mut BuiltinRegistry) {
    let collection = ("array", Prototype::Anything);
    registry.register(Builtin::intrinsic(
        "&",
        &[collection, ("value", Prototype::Anything)],
        Output::SameAsInput(0),
        Intrinsic::Append,
    ));
    registry.register(Builtin::intrinsic(
        "delete",
        &[collection, ("index", Prototype::Number)],
        Output::SameAsInput(0),
        Intrinsic::Delete,
    ));
    registry.register(Builtin::intrinsic(
        "length",
        &[collection],
        Output::Fixed(Prototype::Number),
        Intrinsic::Length,
    ));
    registry.register(
        Builtin::intrinsic(
            "at",
            &[collection, ("index", Prototype::Number)],
            Output::SameAsInput(0),
            Intrinsic::At,
        )
        .conditional(),
    );
}
