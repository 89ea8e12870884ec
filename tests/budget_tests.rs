use regula::{
    ErrorKind, Function, FunctionContext, Options, Regula, ScriptError, Value,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn options() -> Options {
    Options::default()
}

#[test]
fn max_nodes_rejects_at_compile_time() {
    let engine = Regula::with_options(Options {
        max_nodes: 5,
        ..options()
    });
    let err = engine.compile("{ set(a, 1+2+3+4) }").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ScriptTooLarge);
    assert_eq!(err.line, 1);

    // The same failure surfaces through execute as a result.
    let result = engine.execute("{ set(a, 1+2+3+4) }", &HashMap::new());
    assert_eq!(result.error.unwrap().code, 305);
}

#[test]
fn small_scripts_fit_the_default_node_budget() {
    let engine = Regula::new();
    assert!(engine.compile("{ set(a, 1+2*3) }").is_ok());
}

#[test]
fn max_visits_exceeded() {
    let engine = Regula::with_options(Options {
        max_node_visits: 10,
        ..options()
    });
    let result = engine.execute(
        "{ set(a, 1) set(b, 2) set(c, 3) set(d, 4) set(e, 5) set(f, 6) }",
        &HashMap::new(),
    );
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::MaxVisitsExceeded);
    // Work done before the limit is preserved.
    assert!(result.assignments.len() >= 4);
    assert!(err.line >= 1);
}

#[test]
fn max_depth_exceeded() {
    let engine = Regula::with_options(Options {
        max_depth: 3,
        ..options()
    });
    let result = engine.execute("{ set(a, 1+(2*(3+(4*(5+6))))) }", &HashMap::new());
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
}

#[test]
fn shallow_expressions_fit_a_small_depth_budget() {
    let engine = Regula::with_options(Options {
        max_depth: 3,
        ..options()
    });
    let result = engine.execute("{ set(a, 1+2) set(b, [a]+3) }", &HashMap::new());
    assert!(!result.has_error(), "{:?}", result.error);
}

struct SlowFn;

impl Function for SlowFn {
    fn name(&self) -> &str {
        "Slow"
    }

    fn invoke(&self, _args: &[Value], _ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
        thread::sleep(Duration::from_millis(30));
        Ok(Value::from(1))
    }
}

#[test]
fn wall_clock_timeout() {
    let mut engine = Regula::with_options(Options {
        timeout_milliseconds: 5,
        ..options()
    });
    engine.register_function(Arc::new(SlowFn));
    // The first call sleeps past the deadline; the budget check at the
    // next expression node raises the timeout.
    let result = engine.execute("{ set(a, Slow() + Slow()) }", &HashMap::new());
    let err = result.error.expect("expected a timeout");
    assert_eq!(err.kind, ErrorKind::ExecutionTimeout);
}

#[test]
fn zero_timeout_disables_the_deadline() {
    let mut engine = Regula::with_options(Options {
        timeout_milliseconds: 0,
        ..options()
    });
    engine.register_function(Arc::new(SlowFn));
    let result = engine.execute("{ set(a, Slow()) }", &HashMap::new());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(1)));
}

#[test]
fn custom_functions_register_and_run() {
    struct Double;
    impl Function for Double {
        fn name(&self) -> &str {
            "Double"
        }
        fn invoke(&self, args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
            let n = ctx.to_number(&args[0])?;
            Ok(Value::Number(n + n))
        }
    }
    let mut engine = Regula::new();
    engine.register_function(Arc::new(Double));
    // Resolution is case-insensitive.
    let result = engine.execute("{ set(a, double(21)) }", &HashMap::new());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(42)));
}
