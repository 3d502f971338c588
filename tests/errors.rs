mod cases;

use cases::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use subtext::head::build::*;
use subtext::{EngineOptions, Error, ExecutionOptions, Severity, Workspace};

fn flag() -> subtext::head::Field {
    input("flag", choice([input("on", nil()), input("off", nil())]))
}

#[test]
fn test_static_error_codes() {
    let cases = [
        (
            head([output("a", reference("missing"))]),
            "subtext::undefined_name",
        ),
        (
            head([output("a", reference("b")), output("b", reference("a"))]),
            "subtext::circular_reference",
        ),
        (
            head([flag(), output("x", reference("flag.on"))]),
            "subtext::missing_guard",
        ),
        (
            head([input("a", num(1.0)), output("b", reference("a?"))]),
            "subtext::extra_guard",
        ),
        (
            head([flag(), input("x", reference("flag.on?"))]),
            "subtext::conditional_input",
        ),
        (
            head([output("c", code([stmt(num(1.0)), stmt(call("<", [num(2.0)]))]))]),
            "subtext::missing_guard",
        ),
        (
            head([
                input("a", num(1.0)),
                output("c", code([stmt(num(1.0)), stmt(call_fn("a", [that()]))])),
            ]),
            "subtext::not_a_function",
        ),
        (
            over_numbers(&[1.0], for_all([stmt(num(0.0))])),
            "subtext::ignores_previous_value",
        ),
        (
            head([
                input("a", num(1.0)),
                output(
                    "c",
                    code([
                        stmt(reference("a")),
                        stmt(record([output("x", code([stmt(that())]))])),
                    ]),
                ),
            ]),
            "subtext::retains_previous_value",
        ),
    ];
    for (head, code) in cases {
        let error = compile_error(&head);
        assert!(matches!(error, Error::Compilation { .. }), "{error:?}");
        assert_eq!(error.code(), Some(code));
    }
}

#[test]
fn test_compilation_diagnostics() {
    let error = compile_error(&head([output("a", reference("missing"))]));
    let Error::Compilation { diagnostics } = error else {
        panic!("expected a compilation error");
    };
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert!(diagnostics[0].message.contains("missing"), "{}", diagnostics[0].message);
}

#[test]
fn test_guarded_options() {
    let workspace = compiled(&head([
        flag(),
        output("x", reference("flag.on?")),
        output("y", reference("flag.off?")),
    ]));
    assert_eq!(workspace.read("x").unwrap(), json!(null));
    assert_eq!(workspace.read("y").unwrap(), json!(false));

    let error = compile_error(&head([flag(), output("y", reference("flag.off!"))]));
    assert_eq!(error.code(), Some("subtext::assertion_failed"));
}

#[test]
fn test_builtin_failure_crashes() {
    let error = compile_error(&head([output(
        "c",
        code([stmt(num(1.0)), stmt(call("/", [num(0.0)]))]),
    )]));
    assert!(matches!(error, Error::Crash { .. }), "{error:?}");
    assert_eq!(error.code(), Some("subtext::builtin_failed"));
}

#[test]
fn test_runaway_recursion_exceeds_depth() {
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
    let mut workspace = Workspace::new(options);
    let error = workspace.compile(&head([down])).unwrap_err();
    assert!(matches!(error, Error::ResourceExceeded(_)), "{error:?}");
    assert_eq!(workspace.version(), 0);
}

#[test]
fn test_compile_twice() {
    let mut workspace = compiled(&fahrenheit());
    let error = workspace.compile(&fahrenheit()).unwrap_err();
    assert!(matches!(error, Error::Api(_)), "{error:?}");
}

#[test]
fn test_factorial() {
    let workspace = compiled(&head([
        factorial(),
        output("r", code([stmt(num(5.0)), stmt(call_fn("fact", [that()]))])),
    ]));
    assert_eq!(workspace.read("r").unwrap(), json!(120));
}
