//! Unit tests for the evaluator.

use super::{CrashKind, EvalError, StaticErrorKind};
use crate::api::{EngineOptions, ExecutionOptions};
use crate::driver;
use crate::head::build::*;
use crate::head::load::Loader;
use crate::head::{Clause, Field, Formula, Head, Literal};
use crate::stdlib::BuiltinRegistry;
use crate::tree::{ItemIdx, MetaId, Tree};
use pretty_assertions::assert_eq;
use serde_json::{Value as Json, json};

struct Runner {
    tree: Tree,
    builtins: BuiltinRegistry,
    options: EngineOptions,
    version: Option<ItemIdx>,
}

impl Runner {
    fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    fn with_options(options: EngineOptions) -> Self {
        let builtins = BuiltinRegistry::standard();
        let mut tree = Tree::new();
        builtins.install(&mut tree);
        Runner {
            tree,
            builtins,
            options,
            version: None,
        }
    }

    fn run(&mut self, head: &Head) -> Result<Json, EvalError> {
        let version = Loader::new(&mut self.tree).load_version(head, 1)?;
        self.version = Some(version);
        driver::compile_version(&mut self.tree, &self.builtins, &self.options, version)?;
        Ok(self.tree.dump(version))
    }

    /// Dump of a metadata entry of a top-level field.
    fn meta(&self, field: &str, meta: MetaId) -> Json {
        let version = self.version.expect("run first");
        let name = self.tree.names().get(field).expect("known field");
        let field = self.tree.field(version, name).expect("field exists");
        let meta = self.tree.meta(field, meta).expect("meta exists");
        self.tree.dump(meta)
    }
}

fn run(head: Head) -> Json {
    Runner::new().run(&head).unwrap()
}

fn static_error(head: Head) -> StaticErrorKind {
    match Runner::new().run(&head) {
        Err(EvalError::Static(error)) => error.kind,
        other => panic!("expected a static error, got {other:?}"),
    }
}

fn crash(head: Head) -> CrashKind {
    match Runner::new().run(&head) {
        Err(EvalError::Crash(crash)) => crash.kind,
        other => panic!("expected a crash, got {other:?}"),
    }
}

fn flag() -> Field {
    input("flag", choice([input("on", nil()), input("off", nil())]))
}

fn numbers(values: &[f64]) -> Field {
    input(
        "numbers",
        tracked_array(0.0, values.iter().map(|&n| Literal::Number(n))),
    )
}

/// A head computing `result` by applying `looped` to `numbers`.
fn over_numbers(values: &[f64], looped: Formula) -> Head {
    head([
        numbers(values),
        output("result", code([stmt(reference("numbers")), stmt(looped)])),
    ])
}

fn greater_than(n: f64) -> Vec<Field> {
    vec![
        stmt(that()),
        check(call(">", [num(n)]).guarded(Reject)),
    ]
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_reference_copies_target() {
    let result = run(head([
        input("a", num(1.0)),
        output("b", reference("a")),
        output("c", reference("b")),
    ]));
    assert_eq!(result, json!({"a": 1, "b": 1, "c": 1}));
}

#[test]
fn test_reference_into_record() {
    let result = run(head([
        input("p", record([input("x", num(3.0)), input("y", num(4.0))])),
        output("x", reference("p.x")),
    ]));
    assert_eq!(result, json!({"p": {"x": 3, "y": 4}, "x": 3}));
}

#[test]
fn test_undefined_name() {
    let error = static_error(head([output("b", reference("nowhere"))]));
    assert!(matches!(error, StaticErrorKind::UndefinedName { ref name } if name == "nowhere"));
}

#[test]
fn test_circular_references() {
    let error = static_error(head([output("a", reference("b")), output("b", reference("a"))]));
    assert!(matches!(error, StaticErrorKind::CircularReference { .. }));

    let error = static_error(head([output("a", reference("a"))]));
    assert!(matches!(error, StaticErrorKind::CircularReference { .. }));
}

#[test]
fn test_missing_guard() {
    let error = static_error(head([flag(), output("x", reference("flag.on"))]));
    assert!(matches!(error, StaticErrorKind::MissingGuard { ref name } if name == "on"));
}

#[test]
fn test_extra_guard() {
    let error = static_error(head([input("a", num(1.0)), output("b", reference("a?"))]));
    assert!(matches!(error, StaticErrorKind::ExtraGuard { ref name } if name == "a"));
}

#[test]
fn test_guarded_options() {
    let result = run(head([
        flag(),
        output("x", reference("flag.on?")),
        output("y", reference("flag.off?")),
    ]));
    assert_eq!(result, json!({"flag": {"on": null}, "x": null, "y": false}));
}

#[test]
fn test_asserted_option_crashes() {
    let kind = crash(head([flag(), output("y", reference("flag.off!"))]));
    assert_eq!(kind, CrashKind::AssertionFailed);
}

#[test]
fn test_conditional_input() {
    let error = static_error(head([flag(), input("x", reference("flag.on?"))]));
    assert!(matches!(error, StaticErrorKind::ConditionalInput { ref name } if name == "x"));
}

#[test]
fn test_declared_conditional_never_rejects() {
    let error = static_error(head([
        input("a", num(1.0)),
        output("y", reference("a")).conditional(),
    ]));
    assert!(matches!(error, StaticErrorKind::UnconditionalName { ref name } if name == "y"));
}

// ============================================================================
// Code blocks
// ============================================================================

#[test]
fn test_code_block_chains_previous_values() {
    let result = run(head([
        input("a", num(1.0)),
        output(
            "c",
            code([
                stmt(reference("a")),
                stmt(call("+", [num(2.0)])),
                stmt(call("*", [num(3.0)])),
            ]),
        ),
    ]));
    assert_eq!(result["c"], json!(9));
}

#[test]
fn test_let_is_local() {
    let result = run(head([output(
        "c",
        code([
            let_("x", num(2.0)),
            stmt(reference("x")),
            stmt(call("*", [reference("x")])),
        ]),
    )]));
    assert_eq!(result, json!({"c": 4}));
}

#[test]
fn test_unused_let() {
    let error = static_error(head([output("c", code([let_("x", num(2.0)), stmt(num(3.0))]))]));
    assert!(matches!(error, StaticErrorKind::UnusedLet { ref name } if name == "x"));
}

#[test]
fn test_statement_block_continues_from_previous_value() {
    let result = run(head([
        input("a", num(1.0)),
        output(
            "c",
            code([
                stmt(reference("a")),
                stmt(code([stmt(that()), stmt(call("+", [num(1.0)]))])),
            ]),
        ),
    ]));
    assert_eq!(result["c"], json!(2));
}

#[test]
fn test_block_ignoring_its_previous_value() {
    let error = static_error(over_numbers(&[1.0, 2.0], for_all([stmt(num(0.0))])));
    assert_eq!(error, StaticErrorKind::IgnoresPreviousValue);

    let error = static_error(head([
        input("a", num(1.0)),
        output("c", code([stmt(reference("a")), stmt(code([stmt(num(2.0))]))])),
    ]));
    assert_eq!(error, StaticErrorKind::IgnoresPreviousValue);
}

#[test]
fn test_block_reaching_an_outer_previous_value() {
    let inner = output("x", code([stmt(that()), stmt(call("+", [num(1.0)]))]));
    let error = static_error(head([
        input("a", num(1.0)),
        output("c", code([stmt(reference("a")), stmt(record([inner]))])),
    ]));
    assert_eq!(error, StaticErrorKind::RetainsPreviousValue);
}

#[test]
fn test_call_guards() {
    let error = static_error(head([output(
        "m",
        code([stmt(num(1.0)), stmt(call("<", [num(2.0)]))]),
    )]));
    assert!(matches!(error, StaticErrorKind::MissingGuard { ref name } if name == "<"));

    let error = static_error(head([output(
        "m",
        code([stmt(num(1.0)), stmt(call("+", [num(2.0)]).guarded(Reject))]),
    )]));
    assert!(matches!(error, StaticErrorKind::ExtraGuard { ref name } if name == "+"));
}

#[test]
fn test_builtin_failure_crashes() {
    let kind = crash(head([output(
        "d",
        code([stmt(num(1.0)), stmt(call("/", [num(0.0)]))]),
    )]));
    assert_eq!(
        kind,
        CrashKind::Builtin {
            name: "/".into(),
            message: "division by zero".to_string()
        }
    );
}

// ============================================================================
// Try blocks
// ============================================================================

fn classify(a: f64, clauses: Vec<Clause>, optional: bool) -> Head {
    let formula = if optional { try_optional(clauses) } else { try_(clauses) };
    head([input("a", num(a)), output("size", formula)])
}

fn small_clause() -> Clause {
    clause(
        "small",
        [
            stmt(reference("a")),
            check(call("<", [num(10.0)]).guarded(Reject)),
            stmt(text("small")),
        ],
    )
}

#[test]
fn test_try_takes_first_clause_that_does_not_reject() {
    let clauses = || vec![small_clause(), clause("large", [stmt(text("large"))])];
    assert_eq!(run(classify(1.0, clauses(), false))["size"], json!("small"));
    assert_eq!(run(classify(20.0, clauses(), false))["size"], json!("large"));
}

#[test]
fn test_try_without_match() {
    let kind = crash(classify(20.0, vec![small_clause()], false));
    assert_eq!(kind, CrashKind::AssertionFailed);

    let result = run(classify(20.0, vec![small_clause()], true));
    assert_eq!(result["size"], json!(false));
}

#[test]
fn test_only_last_clause_may_be_unconditional() {
    let error = static_error(classify(
        1.0,
        vec![clause("one", [stmt(num(1.0))]), clause("two", [stmt(num(2.0))])],
        false,
    ));
    assert_eq!(error, StaticErrorKind::ClauseNotConditional);
}

#[test]
fn test_clause_exports() {
    let positive = || {
        clause(
            "positive",
            [
                stmt(reference("a")),
                check(call(">", [num(0.0)]).guarded(Reject)),
                export(text("up")),
                stmt(that()),
            ],
        )
    };
    let mut runner = Runner::new();
    let result = runner
        .run(&classify(
            5.0,
            vec![positive(), clause("other", [export(text("down")), stmt(num(0.0))])],
            false,
        ))
        .unwrap();
    assert_eq!(result["size"], json!(5));
    assert_eq!(runner.meta("size", MetaId::Export), json!({"positive": "up"}));

    let error = static_error(classify(
        5.0,
        vec![positive(), clause("other", [stmt(num(0.0))])],
        false,
    ));
    assert_eq!(error, StaticErrorKind::ExportMismatch);
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_for_all_maps_entries() {
    let result = run(over_numbers(
        &[1.0, 2.0, 3.0],
        for_all([stmt(that()), stmt(call("*", [num(2.0)]))]),
    ));
    assert_eq!(result["result"], json!([2, 4, 6]));
}

#[test]
fn test_for_all_body_must_not_be_conditional() {
    let error = static_error(over_numbers(&[1.0], for_all(greater_than(0.0))));
    assert!(matches!(error, StaticErrorKind::BodyMustBeUnconditional { kind: "for-all" }));
}

#[test]
fn test_such_that_filters() {
    let result = run(over_numbers(&[1.0, 2.0, 3.0], such_that(greater_than(1.0))));
    assert_eq!(result["result"], json!([2, 3]));
}

#[test]
fn test_find_exports_position() {
    let mut runner = Runner::new();
    let result = runner
        .run(&over_numbers(&[1.0, 2.0, 3.0], find(Reject, greater_than(1.0))))
        .unwrap();
    assert_eq!(result["result"], json!(2));
    assert_eq!(runner.meta("result", MetaId::Export), json!(2));
}

#[test]
fn test_find_without_match() {
    let result = run(over_numbers(&[1.0, 2.0], find(Reject, greater_than(5.0))));
    assert_eq!(result["result"], json!(false));

    let kind = crash(over_numbers(&[1.0, 2.0], find(Assert, greater_than(5.0))));
    assert_eq!(kind, CrashKind::AssertionFailed);
}

#[test]
fn test_find_body_must_be_conditional() {
    let error = static_error(over_numbers(&[1.0], find(Reject, [stmt(that())])));
    assert!(matches!(error, StaticErrorKind::BodyMustBeConditional { kind: "find?" }));
}

#[test]
fn test_all_and_none() {
    let values = [1.0, 2.0, 3.0];
    assert_eq!(
        run(over_numbers(&values, all(Reject, greater_than(0.0))))["result"],
        json!([1, 2, 3])
    );
    assert_eq!(
        run(over_numbers(&values, all(Reject, greater_than(1.0))))["result"],
        json!(false)
    );
    assert_eq!(
        run(over_numbers(&values, none(Reject, greater_than(5.0))))["result"],
        json!([1, 2, 3])
    );
    assert_eq!(
        run(over_numbers(&values, none(Reject, greater_than(2.0))))["result"],
        json!(false)
    );

    let kind = crash(over_numbers(&values, all(Assert, greater_than(1.0))));
    assert_eq!(kind, CrashKind::AssertionFailed);
    let kind = crash(over_numbers(&values, none(Assert, greater_than(2.0))));
    assert_eq!(kind, CrashKind::AssertionFailed);
}

fn sum() -> Formula {
    fold([
        input("item", num(0.0)),
        input("sum", num(0.0)),
        stmt(reference("sum")),
        stmt(call("+", [reference("item")])),
    ])
}

#[test]
fn test_fold_accumulates() {
    assert_eq!(run(over_numbers(&[1.0, 2.0, 3.0], sum()))["result"], json!(6));
    assert_eq!(run(over_numbers(&[], sum()))["result"], json!(0));
}

#[test]
fn test_fold_needs_two_inputs() {
    let error = static_error(over_numbers(
        &[1.0],
        fold([input("item", num(0.0)), stmt(reference("item"))]),
    ));
    assert_eq!(error, StaticErrorKind::FoldInputs);
}

#[test]
fn test_loop_over_non_array() {
    let error = static_error(head([
        input("a", num(1.0)),
        output("r", code([stmt(reference("a")), stmt(for_all([stmt(that())]))])),
    ]));
    assert!(matches!(error, StaticErrorKind::NotAnArray { found: "number" }));
}

// ============================================================================
// Structural formulas
// ============================================================================

#[test]
fn test_update_replaces_input() {
    let result = run(head([
        input("p", record([input("x", num(1.0)), input("y", num(2.0))])),
        output("q", code([stmt(reference("p")), stmt(update("x", num(5.0)))])),
    ]));
    assert_eq!(result["p"], json!({"x": 1, "y": 2}));
    assert_eq!(result["q"], json!({"x": 5, "y": 2}));
}

#[test]
fn test_update_changing_type() {
    let error = static_error(head([
        input("p", record([input("x", num(1.0))])),
        output("q", code([stmt(reference("p")), stmt(update("x", text("five")))])),
    ]));
    assert!(matches!(
        error,
        StaticErrorKind::ChangingType {
            expected: "number",
            found: "text"
        }
    ));
}

#[test]
fn test_choose_selects_option() {
    let result = run(head([
        input("flag", choice([input("on", num(0.0)), input("off", num(0.0))])),
        output("picked", code([stmt(reference("flag")), stmt(choose_with("off", num(3.0)))])),
        output("plain", code([stmt(reference("flag")), stmt(choose("off"))])),
    ]));
    assert_eq!(result["flag"], json!({"on": 0}));
    assert_eq!(result["picked"], json!({"off": 3}));
    assert_eq!(result["plain"], json!({"off": 0}));
}

#[test]
fn test_choose_unknown_option() {
    let error = static_error(head([
        flag(),
        output("picked", code([stmt(reference("flag")), stmt(choose("maybe"))])),
    ]));
    assert!(matches!(error, StaticErrorKind::UndefinedOption { ref name } if name == "maybe"));
}

// ============================================================================
// Functions
// ============================================================================

fn add_to() -> Field {
    output(
        "add_to",
        function([
            input("x", num(0.0)),
            input("y", num(0.0)),
            stmt(reference("x")),
            stmt(call("+", [reference("y")])),
        ]),
    )
}

#[test]
fn test_named_arguments() {
    let result = run(head([
        add_to(),
        output(
            "r",
            code([stmt(call_fn("add_to", [arg("y", num(10.0)), arg("x", num(2.0))]))]),
        ),
    ]));
    assert_eq!(result["r"], json!(12));
}

#[test]
fn test_argument_errors() {
    let error = static_error(head([
        add_to(),
        output("r", code([stmt(call_fn("add_to", [arg("z", num(1.0))]))])),
    ]));
    assert!(matches!(error, StaticErrorKind::UnknownInput { ref name } if name == "z"));

    let error = static_error(head([
        add_to(),
        output("r", code([stmt(call_fn("add_to", [num(1.0), num(2.0), num(3.0)]))])),
    ]));
    assert_eq!(error, StaticErrorKind::TooManyArguments);
}

#[test]
fn test_not_a_function() {
    let error = static_error(head([
        input("a", num(1.0)),
        output("r", code([stmt(num(1.0)), stmt(call_fn("a", [that()]))])),
    ]));
    assert!(matches!(error, StaticErrorKind::NotAFunction { found: "number" }));
}

#[test]
fn test_generic_function() {
    let result = run(head([
        output("same", function([input("v", anything()), stmt(reference("v"))])),
        output("r", code([stmt(text("hi")), stmt(call_fn("same", [that()]))])),
        output("n", code([stmt(num(7.0)), stmt(call_fn("same", [that()]))])),
    ]));
    assert_eq!(result["r"], json!("hi"));
    assert_eq!(result["n"], json!(7));
}

/// `fact(n)`: 1 when `n <= 1`, else `n * fact(n - 1)`.
fn factorial() -> Field {
    output(
        "fact",
        function([
            input("n", num(0.0)),
            stmt(try_([
                clause(
                    "base",
                    [
                        stmt(reference("n")),
                        check(call("<=", [num(1.0)]).guarded(Reject)),
                        stmt(num(1.0)),
                    ],
                ),
                clause(
                    "step",
                    [
                        stmt(reference("n")),
                        stmt(call("-", [num(1.0)])),
                        stmt(call_fn("fact", [that()])),
                        stmt(call("*", [reference("n")])),
                    ],
                ),
            ])),
        ]),
    )
}

#[test]
fn test_recursive_function() {
    let result = run(head([
        factorial(),
        output("r", code([stmt(num(5.0)), stmt(call_fn("fact", [that()]))])),
    ]));
    assert_eq!(result["r"], json!(120));
}

#[test]
fn test_runaway_recursion_is_too_deep() {
    let down = output(
        "down",
        function([
            input("n", num(0.0)),
            stmt(try_([
                clause(
                    "stop",
                    [
                        stmt(reference("n")),
                        check(call("=", [num(0.5)]).guarded(Reject)),
                    ],
                ),
                clause(
                    "again",
                    [
                        stmt(reference("n")),
                        stmt(call("-", [num(1.0)])),
                        stmt(call_fn("down", [that()])),
                    ],
                ),
            ])),
        ]),
    );
    let options = EngineOptions {
        execution: ExecutionOptions {
            max_depth: 60,
            ..ExecutionOptions::default()
        },
        ..EngineOptions::default()
    };
    let result = Runner::with_options(options).run(&head([down]));
    match result {
        Err(EvalError::Crash(crash)) => {
            assert!(matches!(crash.kind, CrashKind::TooDeep { max_depth: 60, .. }));
        }
        other => panic!("expected too deep, got {other:?}"),
    }
}
