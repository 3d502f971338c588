//! Unit tests for reverse computation of edits.

use super::{Change, Changes};
use crate::api::EngineOptions;
use crate::driver;
use crate::evaluator::{EvalError, Evaluator, Phase, StaticErrorKind};
use crate::head::build::*;
use crate::head::load::Loader;
use crate::head::{Head, Literal};
use crate::stdlib::BuiltinRegistry;
use crate::tree::{Id, ItemIdx, Path, Tree};
use pretty_assertions::assert_eq;
use serde_json::{Value as Json, json};

struct Fixture {
    tree: Tree,
    builtins: BuiltinRegistry,
    options: EngineOptions,
    version: ItemIdx,
}

fn try_compile(head: Head) -> Result<Fixture, EvalError> {
    let builtins = BuiltinRegistry::standard();
    let options = EngineOptions::default();
    let mut tree = Tree::new();
    builtins.install(&mut tree);
    let version = Loader::new(&mut tree).load_version(&head, 1)?;
    driver::compile_version(&mut tree, &builtins, &options, version)?;
    Ok(Fixture {
        tree,
        builtins,
        options,
        version,
    })
}

fn compile(head: Head) -> Fixture {
    try_compile(head).unwrap()
}

fn static_error(head: Head) -> StaticErrorKind {
    match try_compile(head) {
        Err(EvalError::Static(error)) => error.kind,
        Err(other) => panic!("expected a static error, got {other:?}"),
        Ok(_) => panic!("expected a static error"),
    }
}

impl Fixture {
    /// Path of the item at a dotted path of field names.
    fn path(&self, dotted: &str) -> Path {
        let mut current = self.version;
        for step in dotted.split('.') {
            let name = self.tree.names().get(step).unwrap();
            current = self.tree.field(current, name).unwrap();
        }
        self.tree.path(current)
    }

    /// Writes `literal` at `target` and returns the resulting data changes.
    fn write(&mut self, target: &str, literal: Literal) -> Result<Vec<(String, Json)>, EvalError> {
        let path = self.path(target);
        let value = Loader::new(&mut self.tree).load_literal(&literal)?;
        let mut changes = Changes::default();
        {
            let mut evaluator =
                Evaluator::new(&mut self.tree, &self.builtins, &self.options, Phase::Executing);
            evaluator.write_path(&path, value, &mut changes)?;
        }
        Ok(changes
            .into_vec()
            .into_iter()
            .map(|change| {
                let path = change.path.display(self.tree.names()).to_string();
                (path, self.tree.dump(change.value))
            })
            .collect())
    }
}

fn not_updatable(result: Result<Vec<(String, Json)>, EvalError>) -> String {
    match result {
        Err(EvalError::Static(error)) => match error.kind {
            StaticErrorKind::NotUpdatable { reason } => reason,
            other => panic!("expected not updatable, got {other:?}"),
        },
        other => panic!("expected not updatable, got {other:?}"),
    }
}

fn fahrenheit() -> Head {
    head([
        input("celsius", num(0.0)),
        interface(
            "fahrenheit",
            code([
                stmt(reference("celsius")),
                stmt(call("*", [num(1.8)])),
                stmt(call("+", [num(32.0)])),
            ]),
        ),
    ])
}

// ============================================================================
// Change sets
// ============================================================================

#[test]
fn test_changes_merge_identical_and_reject_conflicts() {
    let mut tree = Tree::new();
    let a = Id::Name(tree.names_mut().intern("a"));
    let b = Id::Name(tree.names_mut().intern("b"));
    let x = Id::Name(tree.names_mut().intern("x"));
    let at_a = Path::from_ids(&[Id::Version(1), a]);
    let at_b = Path::from_ids(&[Id::Version(1), b]);

    let mut load = |n: f64| Loader::new(&mut tree).load_literal(&Literal::Number(n)).unwrap();
    let (one, other_one, two) = (load(1.0), load(1.0), load(2.0));

    let mut changes = Changes::default();
    let change = |path: &Path, value| Change {
        path: path.clone(),
        value,
    };
    changes.push(&tree, change(&at_a, one)).unwrap();
    changes.push(&tree, change(&at_a, other_one)).unwrap();
    assert_eq!(changes.len(), 1);

    let conflict = changes.push(&tree, change(&at_a, two)).unwrap_err();
    assert!(matches!(
        conflict.static_kind(),
        Some(StaticErrorKind::WriteConflict { .. })
    ));
    let nested = changes.push(&tree, change(&at_a.child(x), one)).unwrap_err();
    assert!(matches!(
        nested.static_kind(),
        Some(StaticErrorKind::WriteConflict { .. })
    ));

    changes.push(&tree, change(&at_b, two)).unwrap();
    assert_eq!(changes.len(), 2);
}

// ============================================================================
// Formulas
// ============================================================================

#[test]
fn test_write_to_data_is_a_plain_change() {
    let mut fixture = compile(head([input("a", num(1.0))]));
    let changes = fixture.write("a", Literal::Number(7.0)).unwrap();
    assert_eq!(changes, vec![("/v1.a".to_string(), json!(7))]);
}

#[test]
fn test_write_through_reference() {
    let mut fixture = compile(head([input("a", num(1.0)), output("b", reference("a"))]));
    let changes = fixture.write("b", Literal::Number(5.0)).unwrap();
    assert_eq!(changes, vec![("/v1.a".to_string(), json!(5))]);
}

#[test]
fn test_write_through_arithmetic() {
    let mut fixture = compile(fahrenheit());
    let changes = fixture.write("fahrenheit", Literal::Number(212.0)).unwrap();
    assert_eq!(changes, vec![("/v1.celsius".to_string(), json!(100))]);
}

#[test]
fn test_writing_the_current_value_changes_nothing() {
    let mut fixture = compile(fahrenheit());
    let changes = fixture.write("fahrenheit", Literal::Number(32.0)).unwrap();
    assert_eq!(changes, vec![]);
}

#[test]
fn test_irreversible_builtin() {
    let mut fixture = compile(head([
        input("a", num(1.0)),
        output("m", code([stmt(reference("a")), stmt(call("min", [num(10.0)]))])),
    ]));
    let reason = not_updatable(fixture.write("m", Literal::Number(3.0)));
    assert_eq!(reason, "min cannot be reversed");
}

#[test]
fn test_write_into_updated_record() {
    let mut fixture = compile(head([
        input("p", record([input("x", num(1.0)), input("y", num(2.0))])),
        output("q", code([stmt(reference("p")), stmt(update("x", num(5.0)))])),
    ]));
    let changes = fixture
        .write(
            "q",
            Literal::Record(vec![input("x", num(5.0)), input("y", num(9.0))]),
        )
        .unwrap();
    assert!(
        changes.contains(&("/v1.p".to_string(), json!({"x": 1, "y": 9}))),
        "{changes:?}"
    );
}

#[test]
fn test_for_all_writes_back_entry_by_entry() {
    crate::test_utils::init_test_logging();
    let mut fixture = compile(head([
        input(
            "numbers",
            tracked_array(0.0, [Literal::Number(1.0), Literal::Number(2.0), Literal::Number(3.0)]),
        ),
        output(
            "doubled",
            code([
                stmt(reference("numbers")),
                stmt(for_all([stmt(that()), stmt(call("*", [num(2.0)]))])),
            ]),
        ),
    ]));
    let written = Literal::Array {
        tracked: true,
        template: Box::new(Literal::Number(0.0)),
        entries: vec![Literal::Number(2.0), Literal::Number(10.0), Literal::Number(6.0)],
    };
    let changes = fixture.write("doubled", written).unwrap();
    assert_eq!(changes, vec![("/v1.numbers".to_string(), json!([1, 5, 3]))]);
}

// ============================================================================
// Reactions
// ============================================================================

#[test]
fn test_reaction_writes_become_changes() {
    crate::test_utils::init_test_logging();
    let mut fixture = compile(head([
        input("a", num(1.0)),
        input("b", num(2.0)),
        output("sum", code([stmt(reference("a")), stmt(call("+", [reference("b")]))]))
            .on_update([stmt(write("a", that())), stmt(write("b", num(0.0)))]),
    ]));
    let changes = fixture.write("sum", Literal::Number(10.0)).unwrap();
    assert_eq!(
        changes,
        vec![
            ("/v1.a".to_string(), json!(10)),
            ("/v1.b".to_string(), json!(0)),
        ]
    );
}

#[test]
fn test_writes_must_go_backwards() {
    let error = static_error(head([
        output("s", code([stmt(reference("a"))])).on_update([stmt(write("b", that()))]),
        input("a", num(1.0)),
        input("b", num(0.0)),
    ]));
    assert_eq!(error, StaticErrorKind::WriteMustGoBackwards);
}

#[test]
fn test_reaction_writes_may_not_overlap() {
    let error = static_error(head([
        input("a", num(1.0)),
        output("s", code([stmt(reference("a"))]))
            .on_update([stmt(write("a", that())), stmt(write("a", num(0.0)))]),
    ]));
    assert!(matches!(error, StaticErrorKind::WriteConflict { .. }));
}

#[test]
fn test_write_outside_context() {
    let error = static_error(head([
        input("a", num(1.0)),
        output(
            "r",
            record([output("s", code([stmt(num(1.0))])).on_update([stmt(write("a", that()))])]),
        ),
    ]));
    assert_eq!(error, StaticErrorKind::WriteOutsideContext);

    let error = static_error(head([
        input("a", num(1.0)),
        output("w", code([stmt(num(1.0)), stmt(write("a", that()))])),
    ]));
    assert_eq!(error, StaticErrorKind::WriteOutsideContext);
}

#[test]
fn test_loop_body_writes_stay_in_iteration() {
    let error = static_error(head([
        input("a", num(1.0)),
        input("numbers", tracked_array(0.0, [Literal::Number(1.0)])),
        output(
            "d",
            code([
                stmt(reference("numbers")),
                stmt(for_all([stmt(that()), stmt(write("a", that()))])),
            ]),
        ),
    ]));
    assert_eq!(error, StaticErrorKind::ExternalWriteFromForAll);
}

#[test]
fn test_on_update_needs_computed_field() {
    let error = static_error(head([
        input("a", num(1.0)).on_update([stmt(write("a", that()))]),
    ]));
    assert_eq!(error, StaticErrorKind::OnUpdateOnData);
}
