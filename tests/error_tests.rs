use regula::{ErrorKind, Regula, Value};
use std::collections::HashMap;

fn run(script: &str) -> regula::ExecutionResult {
    Regula::new().execute(script, &HashMap::new())
}

#[test]
fn parse_error_at_end_of_file() {
    let result = run("{ set(a, ");
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::UnexpectedEndOfFile);
    assert_eq!(err.code, 105);
    assert_eq!(err.line, 1);
}

#[test]
fn unterminated_string() {
    let result = run("{ set(a, 'oops) }");
    let err = result.error.expect("expected an error");
    assert_eq!(err.code, 102);
    assert_eq!(err.line, 1);
    assert_eq!(err.snippet.as_deref(), Some("{ set(a, 'oops) }"));
}

#[test]
fn unknown_statement_is_a_syntax_error() {
    let result = run("{ frobnicate(a, 1) }");
    let err = result.error.expect("expected an error");
    assert_eq!(err.code, 106);
}

#[test]
fn trailing_input_after_top_level_block() {
    let result = run("{ set(a, 1) } set(b, 2)");
    let err = result.error.expect("expected an error");
    assert_eq!(err.code, 106);
}

#[test]
fn unknown_function_reports_call_site() {
    let result = run("{\n  set(a, 1)\n  set(b, Nope(1))\n}");
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::UnknownFunction);
    assert_eq!(err.line, 3);
    assert_eq!(err.snippet.as_deref(), Some("  set(b, Nope(1))"));
}

#[test]
fn snippet_points_at_the_failing_line() {
    let script = "{\n  set(a, 1)\n  set(b, 1/0)\n  set(c, 2)\n}";
    let result = run(script);
    let err = result.error.expect("expected an error");
    assert_eq!(err.code, 203);
    assert_eq!(err.line, 3);
    assert_eq!(err.snippet.as_deref(), Some("  set(b, 1/0)"));
}

#[test]
fn partial_results_survive_a_failure() {
    let result = run("{ set(a, 1) msg('checkpoint') set(b, [nope]) set(c, 3) }");
    let err = result.error.as_ref().expect("expected an error");
    assert_eq!(err.kind, ErrorKind::UnknownField);
    assert_eq!(result.assignment("a"), Some(&Value::from(1)));
    assert_eq!(result.assignment("c"), None);
    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].text, "checkpoint");
}

#[test]
fn garbage_input_is_handled() {
    let result = run("@@@");
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::UnexpectedToken);
}

#[test]
fn repeated_compile_failures_keep_their_snippet() {
    // The failure path feeds the same lazily-populated line table as
    // the success path, so the snippet is identical on every attempt.
    let engine = Regula::new();
    let script = "{\n  set(a, 'open\n}";
    let first = engine.execute(script, &HashMap::new());
    let second = engine.execute(script, &HashMap::new());
    let first_err = first.error.expect("expected an error");
    let second_err = second.error.expect("expected an error");
    assert_eq!(first_err.snippet.as_deref(), Some("  set(a, 'open"));
    assert_eq!(first_err.snippet, second_err.snippet);
    assert_eq!(first_err.line, second_err.line);
}

#[test]
fn compile_error_display_includes_the_code() {
    let err = Regula::new().compile("{ set(a, ").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("[E105]"), "{}", rendered);
    assert!(rendered.contains("line 1"), "{}", rendered);
}

#[test]
fn function_argument_errors_carry_the_call_position() {
    let result = run("{\n  set(a, Substring('hello', 10))\n}");
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::InvalidFunctionArguments);
    assert_eq!(err.line, 2);
}

#[test]
fn conversion_error_on_bad_typed_set() {
    let engine = Regula::new();
    let result = engine.execute("{ set([a:decimal], 'not a number') }", &HashMap::new());
    assert_eq!(result.error.unwrap().code, 207);
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(ErrorKind::UnexpectedToken.code(), 101);
    assert_eq!(ErrorKind::UnterminatedString.code(), 102);
    assert_eq!(ErrorKind::InvalidNumber.code(), 103);
    assert_eq!(ErrorKind::InvalidIdentifier.code(), 104);
    assert_eq!(ErrorKind::UnexpectedEndOfFile.code(), 105);
    assert_eq!(ErrorKind::SyntaxError.code(), 106);
    assert_eq!(ErrorKind::InvalidFieldName.code(), 107);
    assert_eq!(ErrorKind::UnknownField.code(), 201);
    assert_eq!(ErrorKind::TypeMismatch.code(), 202);
    assert_eq!(ErrorKind::DivideByZero.code(), 203);
    assert_eq!(ErrorKind::ModuloByZero.code(), 204);
    assert_eq!(ErrorKind::UnknownFunction.code(), 205);
    assert_eq!(ErrorKind::InvalidFunctionArguments.code(), 206);
    assert_eq!(ErrorKind::ConversionError.code(), 207);
    assert_eq!(ErrorKind::AssertionFailed.code(), 208);
    assert_eq!(ErrorKind::UnknownOperator.code(), 209);
    assert_eq!(ErrorKind::NullReference.code(), 210);
    assert_eq!(ErrorKind::MaxNodesExceeded.code(), 301);
    assert_eq!(ErrorKind::MaxVisitsExceeded.code(), 302);
    assert_eq!(ErrorKind::MaxDepthExceeded.code(), 303);
    assert_eq!(ErrorKind::ExecutionTimeout.code(), 304);
    assert_eq!(ErrorKind::ScriptTooLarge.code(), 305);
}
