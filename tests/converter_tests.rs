use regula::{Converter, Options, Regula, Value, ValueKind};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

fn null_inputs() -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("f".to_string(), Value::Null);
    map
}

/// Maps null to a sentinel decimal instead of failing.
struct NullSentinel(i64);

impl Converter for NullSentinel {
    fn accepts(&self, input: ValueKind) -> bool {
        input == ValueKind::Null
    }

    fn output(&self) -> ValueKind {
        ValueKind::Number
    }

    fn try_convert(&self, _value: &Value, _options: &Options) -> Option<Value> {
        Some(Value::Number(Decimal::from(self.0)))
    }
}

#[test]
fn custom_converter_handles_null_when_no_default_applies() {
    let mut engine = Regula::new();
    engine.register_converter(Arc::new(NullSentinel(-1)));
    let result = engine.execute("{ set(a, [f:decimal]) }", &null_inputs());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(-1)));
}

#[test]
fn last_registered_converter_wins() {
    let mut engine = Regula::new();
    engine.register_converter(Arc::new(NullSentinel(-1)));
    engine.register_converter(Arc::new(NullSentinel(-2)));
    let result = engine.execute("{ set(a, [f:decimal]) }", &null_inputs());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(-2)));
}

#[test]
fn null_defaults_are_consulted_before_the_scan() {
    let mut engine = Regula::with_options(Options {
        treat_null_decimal_as_zero: true,
        ..Options::default()
    });
    engine.register_converter(Arc::new(NullSentinel(-1)));
    let result = engine.execute("{ set(a, [f:decimal]) }", &null_inputs());
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(0)));
}

/// Parses yes/no answers the built-in bool converter rejects.
struct YesNoBool;

impl Converter for YesNoBool {
    fn accepts(&self, input: ValueKind) -> bool {
        input == ValueKind::Str
    }

    fn output(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn try_convert(&self, value: &Value, _options: &Options) -> Option<Value> {
        match value.as_str()?.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Value::Bool(true)),
            "no" => Some(Value::Bool(false)),
            _ => None,
        }
    }
}

#[test]
fn custom_string_converter_extends_the_builtins() {
    let mut engine = Regula::new();
    engine.register_converter(Arc::new(YesNoBool));
    let mut inputs = HashMap::new();
    inputs.insert("agreed".to_string(), Value::from("yes"));
    inputs.insert("confirmed".to_string(), Value::from("true"));
    let result = engine.execute(
        "{ set(a, [agreed:bool]) set(b, [confirmed:bool]) }",
        &inputs,
    );
    assert!(!result.has_error(), "{:?}", result.error);
    assert_eq!(result.assignment("a"), Some(&Value::from(true)));
    // A miss in the custom converter falls through to the built-in.
    assert_eq!(result.assignment("b"), Some(&Value::from(true)));
}
