mod cases;

use cases::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use subtext::head::Literal;
use subtext::head::build::*;
use subtext::{Edit, Error};

#[test]
fn test_write_flows_back_to_input() {
    let mut workspace = compiled(&fahrenheit());
    assert_eq!(workspace.read("fahrenheit").unwrap(), json!(32));

    workspace.edit(Edit::write("fahrenheit", 212.0)).unwrap();

    assert_eq!(workspace.version(), 2);
    assert_eq!(
        workspace.dump().unwrap(),
        json!({"celsius": 100, "fahrenheit": 212})
    );
    assert_eq!(
        workspace.dump_version(1).unwrap(),
        json!({"celsius": 0, "fahrenheit": 32})
    );
}

#[test]
fn test_write_to_input_recomputes_outputs() {
    let mut workspace = compiled(&fahrenheit());
    workspace.edit(Edit::write("celsius", 100.0)).unwrap();
    assert_eq!(workspace.read("fahrenheit").unwrap(), json!(212));
}

#[test]
fn test_outputs_cannot_be_written() {
    let mut workspace = compiled(&head([
        input("a", num(1.0)),
        output("b", reference("a")),
    ]));
    let error = workspace.edit(Edit::write("b", 2.0)).unwrap_err();
    assert!(matches!(error, Error::Api(_)), "{error:?}");
    assert_eq!(workspace.version(), 1);
}

#[test]
fn test_unknown_path() {
    let mut workspace = compiled(&fahrenheit());
    let error = workspace.edit(Edit::write("kelvin", 2.0)).unwrap_err();
    assert!(matches!(error, Error::Api(_)), "{error:?}");
}

#[test]
fn test_write_inside_record_input() {
    let mut workspace = compiled(&head([
        input("p", record([input("x", num(1.0)), input("y", num(2.0))])),
        output("px", reference("p.x")),
    ]));
    workspace.edit(Edit::write("p.x", 5.0)).unwrap();
    assert_eq!(workspace.read("p").unwrap(), json!({"x": 5, "y": 2}));
    assert_eq!(workspace.read("px").unwrap(), json!(5));
}

#[test]
fn test_replace() {
    let mut workspace = compiled(&fahrenheit());
    let error = workspace.edit(Edit::replace("fahrenheit", 0.0)).unwrap_err();
    assert!(matches!(error, Error::Api(_)), "{error:?}");

    workspace.edit(Edit::replace("celsius", 5.0)).unwrap();
    assert_eq!(workspace.read("fahrenheit").unwrap(), json!(41));
}

#[test]
fn test_changing_type_is_rejected() {
    let mut workspace = compiled(&fahrenheit());
    let error = workspace
        .edit(Edit::write("celsius", Literal::Text("hot".into())))
        .unwrap_err();
    assert_eq!(error.code(), Some("subtext::changing_type"));
    assert_eq!(workspace.version(), 1);
    assert_eq!(workspace.read("celsius").unwrap(), json!(0));
}

#[test]
fn test_copies_are_tracked_across_references() {
    let workspace = compiled(&head([
        input("p", record([input("x", num(1.0)), input("y", num(2.0))])),
        output("q", reference("p")),
        output("r", record([input("x", num(1.0)), input("y", num(2.0))])),
    ]));
    assert!(workspace.is_copy_of("q", "p").unwrap());
    assert!(!workspace.is_copy_of("r", "p").unwrap());
}

#[test]
fn test_recursive_function_after_edit() {
    let mut workspace = compiled(&head([
        factorial(),
        input("n", num(5.0)),
        output("r", code([stmt(reference("n")), stmt(call_fn("fact", [that()]))])),
    ]));
    assert_eq!(workspace.read("r").unwrap(), json!(120));

    workspace.edit(Edit::write("n", 6.0)).unwrap();
    assert_eq!(workspace.read("r").unwrap(), json!(720));
}

// ============================================================================
// Reactions
// ============================================================================

#[test]
fn test_on_update_redirects_writes() {
    let mut workspace = compiled(&head([
        input("a", num(1.0)),
        input("b", num(2.0)),
        interface("sum", code([stmt(reference("a")), stmt(call("+", [reference("b")]))]))
            .on_update([stmt(write("a", that())), stmt(write("b", num(0.0)))]),
    ]));
    assert_eq!(workspace.read("sum").unwrap(), json!(3));

    workspace.edit(Edit::write("sum", 10.0)).unwrap();
    assert_eq!(workspace.dump().unwrap(), json!({"a": 10, "b": 0, "sum": 10}));
}

#[test]
fn test_conflicting_reaction_writes() {
    let mut workspace = compiled(&head([
        input("a", num(0.0)),
        interface("x", reference("a")),
        interface("y", reference("a")),
        interface("s", code([stmt(reference("a"))])).on_update([
            stmt(write("x", that())),
            stmt(write("y", call("+", [num(1.0)]))),
        ]),
    ]));
    let error = workspace.edit(Edit::write("s", 5.0)).unwrap_err();
    assert_eq!(error.code(), Some("subtext::write_conflict"));
    assert_eq!(workspace.version(), 1);
}

#[test]
fn test_reaction_writes_go_backwards() {
    let error = compile_error(&head([
        interface("s", code([stmt(reference("a"))])).on_update([stmt(write("a", that()))]),
        input("a", num(1.0)),
    ]));
    assert_eq!(error.code(), Some("subtext::write_order"));
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_for_all_write_back() {
    let mut workspace = compiled(&over_numbers(
        &[1.0, 2.0, 3.0],
        for_all([stmt(that()), stmt(call("*", [num(2.0)]))]),
    ));
    assert_eq!(workspace.read("result").unwrap(), json!([2, 4, 6]));

    workspace
        .edit(Edit::write("result", numbers(true, &[2.0, 10.0, 6.0])))
        .unwrap();
    assert_eq!(workspace.read("numbers").unwrap(), json!([1, 5, 3]));
    assert_eq!(workspace.read("result").unwrap(), json!([2, 10, 6]));
}

#[test]
fn test_for_all_write_to_one_entry() {
    let looped = || for_all([stmt(that()), stmt(call("+", [num(1.0)]))]);
    for tracked in [true, false] {
        let mut workspace = compiled(&head([
            input("numbers", numbers(tracked, &[1.0, 2.0, 3.0])),
            interface("result", code([stmt(reference("numbers")), stmt(looped())])),
        ]));
        workspace.edit(Edit::write("result.2", 10.0)).unwrap();
        assert_eq!(
            workspace.dump().unwrap(),
            json!({"numbers": [1, 9, 3], "result": [2, 10, 4]}),
            "tracked: {tracked}"
        );
    }
}

#[test]
fn test_insert_through_for_all_keeps_position() {
    let mut workspace = compiled(&over_numbers(
        &[1.0],
        for_all([stmt(that()), stmt(call("+", [num(1.0)]))]),
    ));
    workspace
        .edit(Edit::write("result", numbers(true, &[2.0, 5.0, 6.0])))
        .unwrap();
    assert_eq!(workspace.read("numbers").unwrap(), json!([1, 4, 5]));

    workspace
        .edit(Edit::insert("result", 1, Some(Literal::Number(10.0))))
        .unwrap();
    assert_eq!(workspace.read("result").unwrap(), json!([10, 2, 5, 6]));
    assert_eq!(workspace.read("numbers").unwrap(), json!([9, 1, 4, 5]));
}

// ============================================================================
// Provenance
// ============================================================================

fn nested() -> subtext::head::Field {
    input(
        "p",
        record([
            input("a", record([input("b", num(1.0))])),
            input("c", record([input("d", num(2.0))])),
        ]),
    )
}

#[test]
fn test_nested_update_breaks_copies_along_its_path() {
    let workspace = compiled(&head([
        nested(),
        output("q", code([stmt(reference("p")), stmt(update("a.b", num(5.0)))])),
    ]));
    assert_eq!(
        workspace.read("q").unwrap(),
        json!({"a": {"b": 5}, "c": {"d": 2}})
    );
    assert!(!workspace.is_copy_of("q", "p").unwrap());
    assert!(!workspace.is_copy_of("q.a", "p.a").unwrap());
    assert!(workspace.is_copy_of("q.c", "p.c").unwrap());
}

#[test]
fn test_nested_write_breaks_copies_along_its_path() {
    let mut workspace = compiled(&head([nested()]));
    let (p, a, c) = (
        workspace.locate("p").unwrap(),
        workspace.locate("p.a").unwrap(),
        workspace.locate("p.c").unwrap(),
    );

    workspace.edit(Edit::write("p.a.b", 5.0)).unwrap();
    assert_eq!(
        workspace.read("p").unwrap(),
        json!({"a": {"b": 5}, "c": {"d": 2}})
    );
    let tree = workspace.tree();
    let copied = |now: &str, before| tree.is_copy_of(workspace.locate(now).unwrap(), before, 64);
    assert!(!copied("p", p));
    assert!(!copied("p.a", a));
    assert!(copied("p.c", c));
}

// ============================================================================
// Arena
// ============================================================================

#[test]
fn test_failed_edits_leave_the_arena_as_it_was() {
    let mut workspace = compiled(&head([
        input("a", num(0.0)),
        interface("x", reference("a")),
        interface("y", reference("a")),
        interface("s", code([stmt(reference("a"))])).on_update([
            stmt(write("x", that())),
            stmt(write("y", call("+", [num(1.0)]))),
        ]),
    ]));
    let (items, free) = (workspace.tree().len(), workspace.tree().free_slots());

    let error = workspace.edit(Edit::write("s", 5.0)).unwrap_err();
    assert_eq!(error.code(), Some("subtext::write_conflict"));
    assert_eq!(workspace.tree().len(), items);
    assert_eq!(workspace.tree().free_slots(), free);

    let error = workspace
        .edit(Edit::write("a", Literal::Text("hot".into())))
        .unwrap_err();
    assert_eq!(error.code(), Some("subtext::changing_type"));
    assert_eq!(workspace.tree().len(), items);
    assert_eq!(workspace.tree().free_slots(), free);

    workspace.edit(Edit::write("a", 3.0)).unwrap();
    assert_eq!(
        workspace.dump().unwrap(),
        json!({"a": 3, "x": 3, "y": 3, "s": 3})
    );
}

#[test]
fn test_edits_reuse_freed_scratch_items() {
    let mut workspace = compiled(&over_numbers(
        &[1.0, 2.0, 3.0],
        for_all([stmt(that()), stmt(call("*", [num(2.0)]))]),
    ));
    let compiled_len = workspace.tree().len();

    workspace
        .edit(Edit::write("result", numbers(true, &[2.0, 10.0, 6.0])))
        .unwrap();
    assert!(workspace.tree().free_slots() > 0);
    let first = workspace.tree().len() - compiled_len;

    let edited_len = workspace.tree().len();
    workspace
        .edit(Edit::write("result", numbers(true, &[2.0, 12.0, 6.0])))
        .unwrap();
    let second = workspace.tree().len() - edited_len;

    assert!(second < first, "first edit grew by {first}, second by {second}");
    assert_eq!(workspace.read("numbers").unwrap(), json!([1, 6, 3]));
    assert_eq!(workspace.dump_version(2).unwrap()["numbers"], json!([1, 5, 3]));
}
