//! Comparisons.
//!
//! Every comparison is conditional: it passes its first input through when
//! the comparison holds and rejects otherwise, so `x >? 0` reads as "x, if
//! positive".

use super::{Builtin, BuiltinError, BuiltinRegistry, Datum, Intrinsic, Output, Prototype};

const NUMBERS: &[(&str, Prototype)] = &[("a", Prototype::Number), ("b", Prototype::Number)];
const VALUES: &[(&str, Prototype)] = &[("a", Prototype::Anything), ("b", Prototype::Anything)];

pub fn register(registry: &mut BuiltinRegistry) {
    let first = Output::SameAsInput(0);
    registry.register(Builtin::native("<", NUMBERS, first, less, None).conditional());
    registry.register(Builtin::native(">", NUMBERS, first, greater, None).conditional());
    registry.register(Builtin::native("<=", NUMBERS, first, less_equal, None).conditional());
    registry.register(Builtin::native(">=", NUMBERS, first, greater_equal, None).conditional());
    registry.register(Builtin::intrinsic("=", VALUES, first, Intrinsic::Equal).conditional());
    registry.register(Builtin::intrinsic("not=", VALUES, first, Intrinsic::NotEqual).conditional());
}

fn compare(args: &[Datum], holds: fn(f64, f64) -> bool) -> Result<Option<Datum>, BuiltinError> {
    let a = args.first().map_or(Ok(0.0), |datum| datum.number(0))?;
    let b = args.get(1).map_or(Ok(0.0), |datum| datum.number(1))?;
    Ok(holds(a, b).then_some(Datum::Number(a)))
}

fn less(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    compare(args, |a, b| a < b)
}

fn greater(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    compare(args, |a, b| a > b)
}

fn less_equal(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    compare(args, |a, b| a <= b)
}

fn greater_equal(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    compare(args, |a, b| a >= b)
}
