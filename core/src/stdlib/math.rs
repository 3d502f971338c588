//! Math Package
//!
//! Arithmetic over numbers. The four basic operations register exact
//! reverses so that a write to their output can be pushed back to the first
//! input, holding the second fixed.

use super::{Builtin, BuiltinError, BuiltinRegistry, Datum, Output, Prototype};

const BINARY: &[(&str, Prototype)] = &[("a", Prototype::Number), ("b", Prototype::Number)];

pub fn register(registry: &mut BuiltinRegistry) {
    let number = Output::Fixed(Prototype::Number);
    registry.register(Builtin::native("+", BINARY, number, add, Some(add_reverse)));
    registry.register(Builtin::native("-", BINARY, number, sub, Some(sub_reverse)));
    registry.register(Builtin::native("*", BINARY, number, mul, Some(mul_reverse)));
    registry.register(Builtin::native("/", BINARY, number, div, Some(div_reverse)));
    registry.register(Builtin::native("min", BINARY, number, min, None));
    registry.register(Builtin::native("max", BINARY, number, max, None));
    registry.register(Builtin::native(
        "negate",
        &[("a", Prototype::Number)],
        number,
        negate,
        Some(negate_reverse),
    ));
}

fn operands(args: &[Datum]) -> Result<(f64, f64), BuiltinError> {
    let a = args.first().map_or(Ok(0.0), |datum| datum.number(0))?;
    let b = args.get(1).map_or(Ok(0.0), |datum| datum.number(1))?;
    Ok((a, b))
}

// ============================================================================
// Forward
// ============================================================================

fn add(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    Ok(Some(Datum::Number(a + b)))
}

fn sub(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    Ok(Some(Datum::Number(a - b)))
}

fn mul(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    Ok(Some(Datum::Number(a * b)))
}

fn div(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    if b == 0.0 {
        return Err(BuiltinError::DivisionByZero);
    }
    Ok(Some(Datum::Number(a / b)))
}

fn min(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    Ok(Some(Datum::Number(a.min(b))))
}

fn max(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, b) = operands(args)?;
    Ok(Some(Datum::Number(a.max(b))))
}

fn negate(args: &[Datum]) -> Result<Option<Datum>, BuiltinError> {
    let (a, _) = operands(args)?;
    Ok(Some(Datum::Number(-a)))
}

// ============================================================================
// Reverse
// ============================================================================

fn add_reverse(output: &Datum, args: &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError> {
    let (_, b) = operands(args)?;
    let sum = output.number(0)?;
    Ok(vec![Some(Datum::Number(sum - b)), None])
}

fn sub_reverse(output: &Datum, args: &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError> {
    let (_, b) = operands(args)?;
    let difference = output.number(0)?;
    Ok(vec![Some(Datum::Number(difference + b)), None])
}

fn mul_reverse(output: &Datum, args: &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError> {
    let (_, b) = operands(args)?;
    if b == 0.0 {
        return Err(BuiltinError::DivisionByZero);
    }
    let product = output.number(0)?;
    Ok(vec![Some(Datum::Number(product / b)), None])
}

fn div_reverse(output: &Datum, args: &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError> {
    let (_, b) = operands(args)?;
    let quotient = output.number(0)?;
    Ok(vec![Some(Datum::Number(quotient * b)), None])
}

fn negate_reverse(output: &Datum, _args: &[Datum]) -> Result<Vec<Option<Datum>>, BuiltinError> {
    Ok(vec![Some(Datum::Number(-output.number(0)?))])
}
