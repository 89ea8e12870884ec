//! Built-in string, math and datetime functions.
//!
//! Every built-in goes through the same [`Function`] seam as
//! host-registered functions; the engine itself only depends on names,
//! arities and return shapes.

use crate::error::{ErrorKind, ScriptError};
use crate::eval::round_decimal;
use crate::options::StringComparison;
use crate::registry::{BuiltinFn, Function, FunctionContext, FunctionRegistry};
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::TimeDelta;
use regex::RegexBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) fn register_builtins(reg: &mut FunctionRegistry) {
    let builtins: &[(&'static str, fn(&[Value], &FunctionContext<'_>) -> Result<Value, ScriptError>)] = &[
        // String
        ("ToString", to_string),
        ("StartsWith", starts_with),
        ("EndsWith", ends_with),
        ("Contains", contains),
        ("ToUpper", to_upper),
        ("ToLower", to_lower),
        ("Trim", trim),
        ("Len", len),
        ("Replace", replace),
        ("Substring", substring),
        ("RegexMatch", regex_match),
        ("Coalesce", coalesce),
        ("Iif", iif),
        ("FieldExists", field_exists),
        // Math
        ("ToDecimal", to_decimal),
        ("Max", max),
        ("Min", min),
        ("Sum", sum),
        ("Average", average),
        ("Round", round),
        ("Abs", abs),
        // DateTime
        ("ToDateTime", to_datetime),
        ("FormatDateTime", format_datetime),
        ("AddDays", add_days),
        ("AddHours", add_hours),
        ("AddMinutes", add_minutes),
        ("AddSeconds", add_seconds),
        ("TimeSpan", time_span),
    ];
    for &(name, f) in builtins {
        reg.register(Arc::new(BuiltinFn { name, f }) as Arc<dyn Function>);
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ScriptError> {
    if args.len() < min || args.len() > max {
        let arity = if min == max {
            format!("{}", min)
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{}..{}", min, max)
        };
        return Err(ScriptError::unpositioned(
            ErrorKind::InvalidFunctionArguments,
            format!("{} expects {} arguments, got {}", name, arity, args.len()),
        ));
    }
    Ok(())
}

fn bad_args(name: &str, detail: impl Into<String>) -> ScriptError {
    ScriptError::unpositioned(
        ErrorKind::InvalidFunctionArguments,
        format!("{}: {}", name, detail.into()),
    )
}

/// Optional trailing `ci` argument: an explicit bool wins, otherwise the
/// engine-wide string comparison mode decides.
fn case_insensitive(args: &[Value], index: usize, ctx: &FunctionContext<'_>, name: &str) -> Result<bool, ScriptError> {
    match args.get(index) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(bad_args(
            name,
            format!("case flag must be a bool, found {}", other.kind()),
        )),
        None => Ok(ctx.options.string_comparison == StringComparison::IgnoreCase),
    }
}

fn int_arg(name: &str, n: Decimal, what: &str) -> Result<i64, ScriptError> {
    if !n.fract().is_zero() {
        return Err(bad_args(name, format!("{} must be an integer", what)));
    }
    n.to_i64()
        .ok_or_else(|| bad_args(name, format!("{} out of range", what)))
}

// --- String ---

fn to_string(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("ToString", args, 1, 1)?;
    Ok(Value::Str(ctx.to_string_value(&args[0])?))
}

fn starts_with(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("StartsWith", args, 2, 3)?;
    let s = ctx.to_string_value(&args[0])?;
    let p = ctx.to_string_value(&args[1])?;
    let ci = case_insensitive(args, 2, ctx, "StartsWith")?;
    let hit = if ci {
        s.to_lowercase().starts_with(&p.to_lowercase())
    } else {
        s.starts_with(&p)
    };
    Ok(Value::Bool(hit))
}

fn ends_with(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("EndsWith", args, 2, 3)?;
    let s = ctx.to_string_value(&args[0])?;
    let p = ctx.to_string_value(&args[1])?;
    let ci = case_insensitive(args, 2, ctx, "EndsWith")?;
    let hit = if ci {
        s.to_lowercase().ends_with(&p.to_lowercase())
    } else {
        s.ends_with(&p)
    };
    Ok(Value::Bool(hit))
}

fn contains(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Contains", args, 2, 3)?;
    let s = ctx.to_string_value(&args[0])?;
    let p = ctx.to_string_value(&args[1])?;
    let ci = case_insensitive(args, 2, ctx, "Contains")?;
    let hit = if ci {
        s.to_lowercase().contains(&p.to_lowercase())
    } else {
        s.contains(&p)
    };
    Ok(Value::Bool(hit))
}

fn to_upper(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("ToUpper", args, 1, 1)?;
    Ok(Value::Str(ctx.to_string_value(&args[0])?.to_uppercase()))
}

fn to_lower(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("ToLower", args, 1, 1)?;
    Ok(Value::Str(ctx.to_string_value(&args[0])?.to_lowercase()))
}

fn trim(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Trim", args, 1, 1)?;
    Ok(Value::Str(ctx.to_string_value(&args[0])?.trim().to_string()))
}

fn len(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Len", args, 1, 1)?;
    let s = ctx.to_string_value(&args[0])?;
    Ok(Value::Number(Decimal::from(s.chars().count() as u64)))
}

fn replace(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Replace", args, 3, 4)?;
    let s = ctx.to_string_value(&args[0])?;
    let from = ctx.to_string_value(&args[1])?;
    let to = ctx.to_string_value(&args[2])?;
    if from.is_empty() {
        return Err(bad_args("Replace", "search string must not be empty"));
    }
    let ci = case_insensitive(args, 3, ctx, "Replace")?;
    let out = if ci {
        replace_ci(&s, &from, &to)
    } else {
        s.replace(&from, &to)
    };
    Ok(Value::Str(out))
}

fn replace_ci(s: &str, from: &str, to: &str) -> String {
    let hay: Vec<char> = s.chars().collect();
    let needle: Vec<char> = from.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < hay.len() {
        if i + needle.len() <= hay.len()
            && hay[i..i + needle.len()]
                .iter()
                .zip(&needle)
                .all(|(a, b)| char_eq_ci(*a, *b))
        {
            out.push_str(to);
            i += needle.len();
        } else {
            out.push(hay[i]);
            i += 1;
        }
    }
    out
}

fn char_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn substring(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Substring", args, 2, 3)?;
    let s = ctx.to_string_value(&args[0])?;
    let chars: Vec<char> = s.chars().collect();
    let start = int_arg("Substring", ctx.to_number(&args[1])?, "start")?;
    if start < 0 || start as usize > chars.len() {
        return Err(bad_args("Substring", format!("start {} out of range", start)));
    }
    let start = start as usize;
    let end = match args.get(2) {
        Some(v) => {
            let length = int_arg("Substring", ctx.to_number(v)?, "length")?;
            if length < 0 || start + length as usize > chars.len() {
                return Err(bad_args(
                    "Substring",
                    format!("length {} out of range", length),
                ));
            }
            start + length as usize
        }
        None => chars.len(),
    };
    Ok(Value::Str(chars[start..end].iter().collect()))
}

fn regex_match(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("RegexMatch", args, 2, 3)?;
    let s = ctx.to_string_value(&args[0])?;
    let pattern = ctx.to_string_value(&args[1])?;
    if pattern.is_empty() {
        return Err(bad_args("RegexMatch", "pattern must not be empty"));
    }
    let mut ci = false;
    let mut multiline = false;
    if let Some(flags) = args.get(2) {
        for c in ctx.to_string_value(flags)?.chars() {
            match c {
                'i' => ci = true,
                'm' => multiline = true,
                c if c.is_whitespace() => {}
                other => {
                    return Err(bad_args(
                        "RegexMatch",
                        format!("unsupported flag '{}'", other),
                    ));
                }
            }
        }
    }
    let budget_ms = ctx.options.regex_timeout_milliseconds;
    if budget_ms > 0 && has_nested_repeat(&pattern) {
        return Err(ScriptError::unpositioned(
            ErrorKind::ExecutionTimeout,
            format!(
                "regex '{}' rejected: nested repeats can overrun the {} ms regex timeout",
                pattern, budget_ms
            ),
        ));
    }
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(ci)
        .multi_line(multiline)
        .build()
        .map_err(|e| bad_args("RegexMatch", format!("invalid pattern: {}", e)))?;
    let started = Instant::now();
    let hit = re.is_match(&s);
    if budget_ms > 0 && started.elapsed() > Duration::from_millis(budget_ms) {
        return Err(ScriptError::unpositioned(
            ErrorKind::ExecutionTimeout,
            format!("regex evaluation exceeded the {} ms regex timeout", budget_ms),
        ));
    }
    Ok(Value::Bool(hit))
}

/// Conservative detector for quantified groups that themselves contain
/// a quantifier, the classic catastrophic-backtracking shape.
fn has_nested_repeat(pattern: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    let mut stack: Vec<bool> = Vec::new();
    let mut current = false;
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => {
                stack.push(current);
                current = false;
            }
            ')' if !in_class => {
                let inner = current;
                if inner && matches!(chars.get(i + 1), Some('+') | Some('*') | Some('{')) {
                    return true;
                }
                current = stack.pop().unwrap_or(false) || inner;
            }
            '+' | '*' | '{' if !in_class => current = true,
            _ => {}
        }
        i += 1;
    }
    false
}

fn coalesce(args: &[Value], _ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Coalesce", args, 1, usize::MAX)?;
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

fn iif(args: &[Value], _ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Iif", args, 3, 3)?;
    match &args[0] {
        Value::Bool(true) => Ok(args[1].clone()),
        Value::Bool(false) => Ok(args[2].clone()),
        other => Err(ScriptError::unpositioned(
            ErrorKind::TypeMismatch,
            format!("Iif condition must be a bool, found {}", other.kind()),
        )),
    }
}

fn field_exists(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("FieldExists", args, 1, usize::MAX)?;
    for arg in args {
        let name = ctx.to_string_value(arg)?;
        if !ctx.input_exists(&name) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

// --- Math ---

fn to_decimal(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("ToDecimal", args, 1, 1)?;
    Ok(Value::Number(ctx.to_number(&args[0])?))
}

fn max(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Max", args, 1, usize::MAX)?;
    let mut best = ctx.to_number(&args[0])?;
    for arg in &args[1..] {
        best = best.max(ctx.to_number(arg)?);
    }
    Ok(Value::Number(best))
}

fn min(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Min", args, 1, usize::MAX)?;
    let mut best = ctx.to_number(&args[0])?;
    for arg in &args[1..] {
        best = best.min(ctx.to_number(arg)?);
    }
    Ok(Value::Number(best))
}

fn sum(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Sum", args, 1, usize::MAX)?;
    let mut total = Decimal::ZERO;
    for arg in args {
        total = total
            .checked_add(ctx.to_number(arg)?)
            .ok_or_else(|| bad_args("Sum", "numeric overflow"))?;
    }
    Ok(Value::Number(total))
}

fn average(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Average", args, 1, usize::MAX)?;
    let total = match sum(args, ctx)? {
        Value::Number(n) => n,
        _ => Decimal::ZERO,
    };
    let count = Decimal::from(args.len() as u64);
    total
        .checked_div(count)
        .map(Value::Number)
        .ok_or_else(|| bad_args("Average", "numeric overflow"))
}

fn round(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Round", args, 1, 2)?;
    let n = ctx.to_number(&args[0])?;
    let digits = match args.get(1) {
        Some(v) => {
            let d = int_arg("Round", ctx.to_number(v)?, "digits")?;
            u32::try_from(d).map_err(|_| bad_args("Round", "digits must be non-negative"))?
        }
        None => 0,
    };
    Ok(Value::Number(round_decimal(
        n,
        digits,
        ctx.options.midpoint_rounding,
    )))
}

fn abs(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("Abs", args, 1, 1)?;
    Ok(Value::Number(ctx.to_number(&args[0])?.abs()))
}

// --- DateTime ---

fn to_datetime(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("ToDateTime", args, 1, 1)?;
    Ok(Value::DateTime(ctx.to_datetime(&args[0])?))
}

fn format_datetime(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("FormatDateTime", args, 1, 2)?;
    let dt = ctx.to_datetime(&args[0])?;
    let fmt = match args.get(1) {
        Some(v) => ctx.to_string_value(v)?,
        None => ctx.options.date_time_format.clone(),
    };
    // Script-supplied patterns must not be able to panic the formatter.
    let items: Vec<Item<'_>> = StrftimeItems::new(&fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(bad_args(
            "FormatDateTime",
            format!("invalid format '{}'", fmt),
        ));
    }
    Ok(Value::Str(dt.format_with_items(items.into_iter()).to_string()))
}

fn shift_datetime(
    name: &str,
    args: &[Value],
    ctx: &FunctionContext<'_>,
    ms_per_unit: i64,
) -> Result<Value, ScriptError> {
    expect_args(name, args, 2, 2)?;
    let dt = ctx.to_datetime(&args[0])?;
    let amount = ctx.to_number(&args[1])?;
    let ms = amount
        .checked_mul(Decimal::from(ms_per_unit))
        .and_then(|d| d.round().to_i64())
        .ok_or_else(|| bad_args(name, "amount out of range"))?;
    dt.checked_add_signed(TimeDelta::milliseconds(ms))
        .map(Value::DateTime)
        .ok_or_else(|| bad_args(name, "resulting datetime out of range"))
}

fn add_days(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    shift_datetime("AddDays", args, ctx, 86_400_000)
}

fn add_hours(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    shift_datetime("AddHours", args, ctx, 3_600_000)
}

fn add_minutes(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    shift_datetime("AddMinutes", args, ctx, 60_000)
}

fn add_seconds(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    shift_datetime("AddSeconds", args, ctx, 1_000)
}

/// Signed difference `dt1 - dt2` expressed in the requested unit
/// (`ms`/`s`/`m`/`h`/`d`, default hours), fractional.
fn time_span(args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
    expect_args("TimeSpan", args, 2, 3)?;
    let a = ctx.to_datetime(&args[0])?;
    let b = ctx.to_datetime(&args[1])?;
    let per_unit = match args.get(2) {
        Some(v) => match ctx.to_string_value(v)?.trim().to_ascii_lowercase().as_str() {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            other => {
                return Err(bad_args("TimeSpan", format!("unknown unit '{}'", other)));
            }
        },
        None => 3_600_000,
    };
    let ms = Decimal::from((a - b).num_milliseconds());
    ms.checked_div(Decimal::from(per_unit))
        .map(Value::Number)
        .ok_or_else(|| bad_args("TimeSpan", "numeric overflow"))
}
