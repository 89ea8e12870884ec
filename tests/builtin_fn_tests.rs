use regula::{ErrorKind, Options, Regula, StringComparison, Value};
use std::collections::HashMap;

fn run(script: &str) -> regula::ExecutionResult {
    Regula::new().execute(script, &HashMap::new())
}

fn assign(result: &regula::ExecutionResult, name: &str) -> Value {
    assert!(!result.has_error(), "{:?}", result.error);
    result.assignment(name).cloned().expect(name)
}

#[test]
fn string_predicates_ignore_case_by_default() {
    let result = run(
        "{
            set(a, StartsWith('Hello', 'he'))
            set(b, EndsWith('Hello', 'LO'))
            set(c, Contains('Hello', 'ELL'))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from(true));
    assert_eq!(assign(&result, "b"), Value::from(true));
    assert_eq!(assign(&result, "c"), Value::from(true));
}

#[test]
fn string_predicates_explicit_case_flag_wins() {
    let result = run(
        "{
            set(a, StartsWith('Hello', 'he', false))
            set(b, EndsWith('Hello', 'LO', false))
            set(c, Contains('Hello', 'ell', false))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from(false));
    assert_eq!(assign(&result, "b"), Value::from(false));
    assert_eq!(assign(&result, "c"), Value::from(true));
}

#[test]
fn string_predicates_follow_the_engine_comparison_mode() {
    let engine = Regula::with_options(Options {
        string_comparison: StringComparison::CaseSensitive,
        ..Options::default()
    });
    let result = engine.execute("{ set(a, StartsWith('Hello', 'he')) }", &HashMap::new());
    assert_eq!(assign(&result, "a"), Value::from(false));
}

#[test]
fn case_and_trim_helpers() {
    let result = run(
        "{
            set(a, ToUpper('abc'))
            set(b, ToLower('AbC'))
            set(c, Trim('  pad  '))
            set(d, Len('héllo'))
            set(e, ToString(2.50))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from("ABC"));
    assert_eq!(assign(&result, "b"), Value::from("abc"));
    assert_eq!(assign(&result, "c"), Value::from("pad"));
    assert_eq!(assign(&result, "d"), Value::from(5));
    assert_eq!(assign(&result, "e"), Value::from("2.50"));
}

#[test]
fn replace_plain_and_case_insensitive() {
    let result = run(
        "{
            set(a, Replace('aXbXc', 'X', '-', false))
            set(b, Replace('aXbxc', 'x', '-', true))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from("a-b-c"));
    assert_eq!(assign(&result, "b"), Value::from("a-b-c"));
}

#[test]
fn substring_happy_path() {
    let result = run("{ set(a, Substring('hello', 1)) set(b, Substring('hello', 1, 3)) }");
    assert_eq!(assign(&result, "a"), Value::from("ello"));
    assert_eq!(assign(&result, "b"), Value::from("ell"));
}

#[test]
fn substring_out_of_range_errors() {
    for script in [
        "{ set(a, Substring('hello', 10)) }",
        "{ set(a, Substring('hello', 2, 10)) }",
        "{ set(a, Substring('hello', -1)) }",
    ] {
        let result = run(script);
        let err = result.error.expect(script);
        assert_eq!(err.kind, ErrorKind::InvalidFunctionArguments, "{}", script);
    }
}

#[test]
fn regex_match_basics() {
    let result = run(
        "{
            set(a, RegexMatch('abc123', '^[a-z]+\\d+$'))
            set(b, RegexMatch('ABC', '^abc$', 'i'))
            set(c, RegexMatch('abc', '^xyz$'))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from(true));
    assert_eq!(assign(&result, "b"), Value::from(true));
    assert_eq!(assign(&result, "c"), Value::from(false));
}

#[test]
fn regex_match_rejects_empty_pattern_and_bad_flags() {
    let empty = run("{ set(a, RegexMatch('x', '')) }");
    assert_eq!(empty.error.unwrap().kind, ErrorKind::InvalidFunctionArguments);
    let flag = run("{ set(a, RegexMatch('x', 'x', 'q')) }");
    assert_eq!(flag.error.unwrap().kind, ErrorKind::InvalidFunctionArguments);
}

#[test]
fn regex_timeout_guard_rejects_runaway_patterns() {
    let engine = Regula::with_options(Options {
        regex_timeout_milliseconds: 10,
        ..Options::default()
    });
    let script = "{ set(a, RegexMatch('aaaaaaaaaaaaaaaaaaaaaaab', '^(a+)+$')) }";
    let result = engine.execute(script, &HashMap::new());
    let err = result.error.expect("expected an error");
    assert_eq!(err.kind, ErrorKind::ExecutionTimeout);
    assert!(err.message.contains("timeout"), "{}", err.message);

    // Without a budget the linear-time engine answers directly.
    let unguarded = run(script);
    assert_eq!(assign(&unguarded, "a"), Value::from(false));
}

#[test]
fn coalesce_iif_fieldexists() {
    let mut inputs = HashMap::new();
    inputs.insert("present".to_string(), Value::from(1));
    inputs.insert("empty".to_string(), Value::Null);
    let engine = Regula::new();
    let result = engine.execute(
        "{
            set(a, Coalesce(null, null, 'x', 'y'))
            set(b, Iif(2 > 1, 'big', 'small'))
            set(c, FieldExists('present'))
            set(d, FieldExists('present', 'missing'))
        }",
        &inputs,
    );
    assert_eq!(assign(&result, "a"), Value::from("x"));
    assert_eq!(assign(&result, "b"), Value::from("big"));
    assert_eq!(assign(&result, "c"), Value::from(true));
    assert_eq!(assign(&result, "d"), Value::from(false));
}

#[test]
fn iif_condition_must_be_bool() {
    let result = run("{ set(a, Iif(1, 2, 3)) }");
    assert_eq!(result.error.unwrap().kind, ErrorKind::TypeMismatch);
}

#[test]
fn math_builtins() {
    let result = run(
        "{
            set(a, ToDecimal('3.5'))
            set(b, Max(1, 9, 4))
            set(c, Min(5, -2, 7))
            set(d, Sum(1, 2, 3, 4))
            set(e, Average(2, 4, 6))
            set(f, Round(2.345, 2))
            set(g, Round(2.5))
            set(h, Abs(-3.5))
        }",
    );
    assert_eq!(assign(&result, "a").to_string(), "3.5");
    assert_eq!(assign(&result, "b"), Value::from(9));
    assert_eq!(assign(&result, "c"), Value::from(-2));
    assert_eq!(assign(&result, "d"), Value::from(10));
    assert_eq!(assign(&result, "e"), Value::from(4));
    assert_eq!(assign(&result, "f").to_string(), "2.35");
    assert_eq!(assign(&result, "g"), Value::from(3));
    assert_eq!(assign(&result, "h").to_string(), "3.5");
}

#[test]
fn datetime_builtins() {
    let result = run(
        "{
            set(a, FormatDateTime(ToDateTime('2024-03-01 10:30:00')))
            set(b, FormatDateTime(AddDays(ToDateTime('2024-03-01 10:30:00'), 1)))
            set(c, FormatDateTime(AddHours(ToDateTime('2024-03-01 10:30:00'), -2), '%H:%M'))
            set(d, FormatDateTime(AddMinutes(ToDateTime('2024-03-01 10:30:00'), 45), '%H:%M'))
            set(e, FormatDateTime(AddSeconds(ToDateTime('2024-03-01 10:30:00'), 30), '%H:%M:%S'))
            set(f, FormatDateTime(ToDateTime('2024-03-01'), '%Y-%m-%d %H:%M'))
        }",
    );
    assert_eq!(assign(&result, "a"), Value::from("2024-03-01 10:30:00"));
    assert_eq!(assign(&result, "b"), Value::from("2024-03-02 10:30:00"));
    assert_eq!(assign(&result, "c"), Value::from("08:30"));
    assert_eq!(assign(&result, "d"), Value::from("11:15"));
    assert_eq!(assign(&result, "e"), Value::from("10:30:30"));
    assert_eq!(assign(&result, "f"), Value::from("2024-03-01 00:00"));
}

#[test]
fn time_span_units() {
    let result = run(
        "{
            set(h, TimeSpan(ToDateTime('2024-03-01 12:00:00'), ToDateTime('2024-03-01 10:00:00')))
            set(m, TimeSpan(ToDateTime('2024-03-01 12:00:00'), ToDateTime('2024-03-01 10:00:00'), 'm'))
            set(s, TimeSpan(ToDateTime('2024-03-01 10:00:30'), ToDateTime('2024-03-01 10:00:00'), 's'))
            set(d, TimeSpan(ToDateTime('2024-03-03 00:00:00'), ToDateTime('2024-03-01 00:00:00'), 'd'))
            set(neg, TimeSpan(ToDateTime('2024-03-01 10:00:00'), ToDateTime('2024-03-01 12:00:00')))
            set(half, TimeSpan(ToDateTime('2024-03-01 10:30:00'), ToDateTime('2024-03-01 10:00:00')))
        }",
    );
    assert_eq!(assign(&result, "h"), Value::from(2));
    assert_eq!(assign(&result, "m"), Value::from(120));
    assert_eq!(assign(&result, "s"), Value::from(30));
    assert_eq!(assign(&result, "d"), Value::from(2));
    assert_eq!(assign(&result, "neg"), Value::from(-2));
    assert_eq!(assign(&result, "half").to_string(), "0.5");
}

#[test]
fn format_datetime_rejects_invalid_patterns() {
    let result = run("{ set(a, FormatDateTime(ToDateTime('2024-03-01 10:30:00'), '%Q')) }");
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidFunctionArguments);
}

#[test]
fn time_span_unknown_unit_errors() {
    let result = run(
        "{ set(a, TimeSpan(ToDateTime('2024-03-01 12:00:00'), ToDateTime('2024-03-01 10:00:00'), 'weeks')) }",
    );
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidFunctionArguments);
}

#[test]
fn builtin_arity_errors() {
    for script in [
        "{ set(a, ToUpper()) }",
        "{ set(a, ToUpper('x', 'y')) }",
        "{ set(a, Iif(true, 1)) }",
        "{ set(a, Coalesce()) }",
    ] {
        let result = run(script);
        assert_eq!(
            result.error.expect(script).kind,
            ErrorKind::InvalidFunctionArguments,
            "{}",
            script
        );
    }
}
