//! Unit tests for the builtin library.

use super::*;
use pretty_assertions::assert_eq;

fn native(name: &str) -> (ForwardFn, Option<ReverseFn>) {
    let registry = BuiltinRegistry::standard();
    match registry.get(name).map(|builtin| builtin.implementation) {
        Some(Implementation::Native { forward, reverse }) => (forward, reverse),
        other => panic!("{name} is not native: {other:?}"),
    }
}

fn numbers(values: &[f64]) -> Vec<Datum> {
    values.iter().map(|&n| Datum::Number(n)).collect()
}

#[test]
fn test_standard_table() {
    let registry = BuiltinRegistry::standard();
    for name in ["+", "-", "*", "/", "min", "max", "negate", "<", ">", "<=", ">=", "=", "not="] {
        assert!(registry.get(name).is_some(), "missing builtin {name}");
    }
    for name in ["&", "delete", "length", "at"] {
        assert!(
            matches!(registry.get(name).unwrap().implementation, Implementation::Intrinsic(_)),
            "{name} should be intrinsic"
        );
    }
    assert!(registry.get("at").unwrap().conditional);
    assert!(registry.get("=").unwrap().conditional);
    assert!(!registry.get("length").unwrap().conditional);
}

#[test]
fn test_arithmetic() {
    let (add, _) = native("+");
    let (div, _) = native("/");
    assert_eq!(add(&numbers(&[2.0, 3.0])), Ok(Some(Datum::Number(5.0))));
    assert_eq!(div(&numbers(&[1.0, 0.0])), Err(BuiltinError::DivisionByZero));
    assert_eq!(
        add(&[Datum::Text("x".into()), Datum::Number(1.0)]),
        Err(BuiltinError::TypeMismatch {
            index: 0,
            expected: "number"
        })
    );
}

#[test]
fn test_reverses_hold_second_input() {
    let (_, add_reverse) = native("+");
    let (_, mul_reverse) = native("*");
    let (_, sub_reverse) = native("-");
    let (_, div_reverse) = native("/");
    let args = numbers(&[0.0, 4.0]);

    let reverse = |f: Option<ReverseFn>, output: f64| f.unwrap()(&Datum::Number(output), &args);
    assert_eq!(reverse(add_reverse, 10.0), Ok(vec![Some(Datum::Number(6.0)), None]));
    assert_eq!(reverse(sub_reverse, 10.0), Ok(vec![Some(Datum::Number(14.0)), None]));
    assert_eq!(reverse(mul_reverse, 10.0), Ok(vec![Some(Datum::Number(2.5)), None]));
    assert_eq!(reverse(div_reverse, 10.0), Ok(vec![Some(Datum::Number(40.0)), None]));

    let zero = numbers(&[1.0, 0.0]);
    assert_eq!(
        mul_reverse.unwrap()(&Datum::Number(3.0), &zero),
        Err(BuiltinError::DivisionByZero)
    );
}

#[test]
fn test_no_reverse_for_min() {
    let (min, reverse) = native("min");
    assert_eq!(min(&numbers(&[2.0, -1.0])), Ok(Some(Datum::Number(-1.0))));
    assert!(reverse.is_none());
}

#[test]
fn test_comparisons_pass_first_input() {
    let (less, _) = native("<");
    let (greater_equal, _) = native(">=");
    assert_eq!(less(&numbers(&[1.0, 2.0])), Ok(Some(Datum::Number(1.0))));
    assert_eq!(less(&numbers(&[2.0, 2.0])), Ok(None));
    assert_eq!(greater_equal(&numbers(&[2.0, 2.0])), Ok(Some(Datum::Number(2.0))));
}

#[test]
fn test_register_replaces() {
    let mut registry = BuiltinRegistry::standard();
    let count = registry.len();
    registry.register(Builtin::native(
        "+",
        &[("a", Prototype::Number)],
        Output::Fixed(Prototype::Number),
        |args| Ok(args.first().cloned()),
        None,
    ));
    assert_eq!(registry.len(), count);
    assert_eq!(registry.get("+").unwrap().inputs.len(), 1);
}

#[test]
fn test_install_library() {
    let mut tree = Tree::new();
    let registry = BuiltinRegistry::standard();
    let library = registry.install(&mut tree);

    assert_eq!(tree.meta(tree.root(), MetaId::Library), Some(library));
    assert_eq!(tree.fields(library).len(), registry.len());

    let plus = tree.field(library, tree.names().get("+").unwrap()).unwrap();
    let statements = tree.fields(plus);
    assert_eq!(statements.len(), 3);
    assert_eq!(tree.item(statements[0]).io(), Io::Input);
    assert!(matches!(tree.value(statements[1]), Some(Value::Number(n)) if *n == 0.0));
    assert!(matches!(
        tree.item(statements[2]).formula(),
        FormulaType::Builtin { .. }
    ));
    assert!(tree.value(plus).is_some_and(Value::is_code));
}

#[test]
fn test_datum_conversion() {
    assert_eq!(Datum::from_value(&Value::Number(1.0)), Datum::Number(1.0));
    assert_eq!(Datum::from_value(&Value::Anything), Datum::Nil);
    assert_eq!(Datum::Text("a".into()).into_value().and_then(|v| match v {
        Value::Text(text) => Some(text),
        _ => None,
    }), Some("a".into()));
    assert_eq!(Datum::Value.into_value().map(|v| v.kind_name()), None);
}
