use regula::{Regula, Value};
use std::collections::HashMap;

fn run(script: &str) -> regula::ExecutionResult {
    Regula::new().execute(script, &HashMap::new())
}

#[test]
fn or_short_circuits_past_an_unknown_function() {
    let result = run("{ set(a, true || NotAFunction(1)) }");
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(true)));
}

#[test]
fn or_evaluates_the_right_side_when_needed() {
    let result = run("{ set(a, false || NotAFunction(1)) }");
    let err = result.error.expect("expected an error");
    assert_eq!(err.code, 205);
}

#[test]
fn and_short_circuits_past_an_unknown_function() {
    let result = run("{ set(a, false && NotAFunction(1)) }");
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(false)));
}

#[test]
fn and_evaluates_the_right_side_when_needed() {
    let result = run("{ set(a, true && NotAFunction(1)) }");
    assert_eq!(result.error.unwrap().code, 205);
}

#[test]
fn short_circuit_also_skips_runtime_errors() {
    let result = run("{ set(a, true || 1/0 == 0) }");
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(true)));
}

#[test]
fn logical_operands_must_be_bool() {
    let left = run("{ set(a, 1 && true) }");
    assert_eq!(left.error.unwrap().code, 202);
    let right = run("{ set(a, true && 1) }");
    assert_eq!(right.error.unwrap().code, 202);
}

#[test]
fn both_sides_evaluate_once() {
    let result = run("{ set(n, 0) set(a, true && false || true) }");
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(true)));
}
