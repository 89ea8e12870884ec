use regula::{Options, Regula, Value};
use std::collections::HashMap;

const SCRIPT: &str = "{ set(a, [x] * 2) msg('ran') }";

fn inputs() -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("x".to_string(), Value::from(21));
    map
}

#[test]
fn cache_is_semantically_transparent() {
    let engine = Regula::new();
    let direct = engine.execute(SCRIPT, &inputs());
    let block = engine.compile(SCRIPT).unwrap();
    let precompiled = engine.execute_block(&block, &inputs());

    assert!(!direct.has_error());
    assert!(!precompiled.has_error());
    assert_eq!(direct.assignments, precompiled.assignments);
    assert_eq!(direct.messages.len(), precompiled.messages.len());
    assert_eq!(direct.end_line, precompiled.end_line);
    assert_eq!(direct.end_column, precompiled.end_column);
}

#[test]
fn repeated_execution_reuses_the_cached_block() {
    let engine = Regula::new();
    let first = engine.execute(SCRIPT, &inputs());
    let second = engine.execute(SCRIPT, &inputs());
    assert_eq!(first.assignments, second.assignments);

    // The cached block is shared, not recompiled.
    let a = engine.compile(SCRIPT).unwrap();
    let b = engine.compile(SCRIPT).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn clear_cache_keeps_the_engine_usable() {
    let engine = Regula::new();
    let before = engine.execute(SCRIPT, &inputs());
    engine.clear_cache();
    let after = engine.execute(SCRIPT, &inputs());
    assert_eq!(before.assignments, after.assignments);
}

#[test]
fn disabled_cache_still_executes() {
    let engine = Regula::with_options(Options {
        enable_compilation_cache: false,
        ..Options::default()
    });
    let result = engine.execute(SCRIPT, &inputs());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(42)));

    // Compiling twice yields distinct blocks when the cache is off.
    let a = engine.compile(SCRIPT).unwrap();
    let b = engine.compile(SCRIPT).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn disabled_cache_still_produces_snippets() {
    let engine = Regula::with_options(Options {
        enable_compilation_cache: false,
        ..Options::default()
    });
    let result = engine.execute("{ set(a, 1/0) }", &inputs());
    let err = result.error.expect("expected an error");
    assert_eq!(err.snippet.as_deref(), Some("{ set(a, 1/0) }"));
}
