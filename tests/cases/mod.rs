#![allow(dead_code)]

use subtext::head::build::*;
use subtext::head::{Field, Formula, Head, Literal};
use subtext::{EngineOptions, Error, Workspace};

/// A workspace holding `head` as version 1.
pub fn compiled(head: &Head) -> Workspace {
    compiled_with(EngineOptions::default(), head)
}

pub fn compiled_with(options: EngineOptions, head: &Head) -> Workspace {
    let mut workspace = Workspace::new(options);
    if let Err(error) = workspace.compile(head) {
        panic!("compilation failed: {error}");
    }
    workspace
}

/// The error compiling `head` fails with.
pub fn compile_error(head: &Head) -> Error {
    let mut workspace = Workspace::new(EngineOptions::default());
    match workspace.compile(head) {
        Ok(()) => panic!("expected compilation to fail"),
        Err(error) => error,
    }
}

pub fn fahrenheit() -> Head {
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

pub fn numbers(tracked: bool, values: &[f64]) -> Literal {
    Literal::Array {
        tracked,
        template: Box::new(Literal::Number(0.0)),
        entries: values.iter().map(|&n| Literal::Number(n)).collect(),
    }
}

/// A head computing `result` by applying `looped` to the tracked array `numbers`.
pub fn over_numbers(values: &[f64], looped: Formula) -> Head {
    head([
        input("numbers", numbers(true, values)),
        interface("result", code([stmt(reference("numbers")), stmt(looped)])),
    ])
}

/// Loop body keeping entries above `n`.
pub fn greater_than(n: f64) -> Vec<Field> {
    vec![
        stmt(that()),
        check(call(">", [num(n)]).guarded(Reject)),
    ]
}

pub fn sum() -> Formula {
    fold([
        input("item", num(0.0)),
        input("sum", num(0.0)),
        stmt(reference("sum")),
        stmt(call("+", [reference("item")])),
    ])
}

pub fn factorial() -> Field {
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
