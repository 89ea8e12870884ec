use crate::error::{ErrorKind, ScriptError};
use crate::options::Options;
use crate::value::{Value, ValueKind};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// A typed coercion from one runtime kind to another.
///
/// Registered converters are scanned in order and the first one whose
/// input filter accepts the value and whose output matches the target
/// wins. [`ConverterRegistry::register`] prepends, so the most recently
/// registered converter takes precedence over the built-ins.
pub trait Converter: Send + Sync {
    /// Does this converter accept values of `input`?
    fn accepts(&self, input: ValueKind) -> bool;

    /// The kind this converter produces.
    fn output(&self) -> ValueKind;

    /// Attempt the conversion; `None` means "not convertible", which
    /// lets the scan continue to a later converter.
    fn try_convert(&self, value: &Value, options: &Options) -> Option<Value>;
}

/// Ordered converter set with "last registered wins" precedence.
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry with no coercions at all.
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// The built-in coercions: anything to string, and string to
    /// decimal/bool/datetime.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.converters.push(Arc::new(AnyToString));
        reg.converters.push(Arc::new(StringToNumber));
        reg.converters.push(Arc::new(StringToBool));
        reg.converters.push(Arc::new(StringToDateTime));
        reg
    }

    /// Prepends a converter so it is consulted before all earlier ones.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        self.converters.insert(0, converter);
    }

    /// Coerces `value` to `target`.
    ///
    /// Identity conversions succeed without a scan. Null inputs consult
    /// the null-defaulting options first (string targets yield the empty
    /// string, numeric/bool/datetime honor
    /// `treat_null_*`/`null_date_time_default`); when no default
    /// applies, the null falls through to the registration scan like any
    /// other value, so host converters that accept null still run.
    pub fn convert(
        &self,
        value: &Value,
        target: ValueKind,
        options: &Options,
    ) -> Result<Value, ScriptError> {
        if value.kind() == target {
            return Ok(value.clone());
        }
        if value.is_null() {
            if let Some(out) = null_default(target, options) {
                return Ok(out);
            }
        }
        for converter in &self.converters {
            if converter.accepts(value.kind()) && converter.output() == target {
                if let Some(out) = converter.try_convert(value, options) {
                    return Ok(out);
                }
            }
        }
        Err(conversion_error(value, target))
    }
}

/// Null-default resolution, consulted before the converter scan. `None`
/// means "no default configured", not a failure.
fn null_default(target: ValueKind, options: &Options) -> Option<Value> {
    match target {
        ValueKind::Str => Some(Value::Str(String::new())),
        ValueKind::Number if options.treat_null_decimal_as_zero => {
            Some(Value::Number(Decimal::ZERO))
        }
        ValueKind::Bool if options.treat_null_bool_as_false => Some(Value::Bool(false)),
        ValueKind::DateTime => options.null_date_time_default.map(Value::DateTime),
        _ => None,
    }
}

fn conversion_error(value: &Value, target: ValueKind) -> ScriptError {
    ScriptError::unpositioned(
        ErrorKind::ConversionError,
        format!("cannot convert {} to {}", value.kind(), target),
    )
}

/// Default stringification of every kind; date-times honor
/// `Options.date_time_format`.
struct AnyToString;

impl Converter for AnyToString {
    fn accepts(&self, _input: ValueKind) -> bool {
        true
    }

    fn output(&self) -> ValueKind {
        ValueKind::Str
    }

    fn try_convert(&self, value: &Value, options: &Options) -> Option<Value> {
        let s = match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::DateTime(dt) => {
                // A malformed host pattern must not panic the formatter;
                // fall back to the canonical layout.
                let items: Vec<Item<'_>> =
                    StrftimeItems::new(&options.date_time_format).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    value.to_string()
                } else {
                    dt.format_with_items(items.into_iter()).to_string()
                }
            }
        };
        Some(Value::Str(s))
    }
}

struct StringToNumber;

impl Converter for StringToNumber {
    fn accepts(&self, input: ValueKind) -> bool {
        input == ValueKind::Str
    }

    fn output(&self) -> ValueKind {
        ValueKind::Number
    }

    fn try_convert(&self, value: &Value, _options: &Options) -> Option<Value> {
        let s = value.as_str()?;
        Decimal::from_str(s.trim()).ok().map(Value::Number)
    }
}

struct StringToBool;

impl Converter for StringToBool {
    fn accepts(&self, input: ValueKind) -> bool {
        input == ValueKind::Str
    }

    fn output(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn try_convert(&self, value: &Value, _options: &Options) -> Option<Value> {
        let s = value.as_str()?.trim();
        if s.eq_ignore_ascii_case("true") {
            Some(Value::Bool(true))
        } else if s.eq_ignore_ascii_case("false") {
            Some(Value::Bool(false))
        } else {
            None
        }
    }
}

/// Parses with `Options.date_time_format`, falling back to a bare
/// `%Y-%m-%d` date at midnight.
struct StringToDateTime;

impl Converter for StringToDateTime {
    fn accepts(&self, input: ValueKind) -> bool {
        input == ValueKind::Str
    }

    fn output(&self) -> ValueKind {
        ValueKind::DateTime
    }

    fn try_convert(&self, value: &Value, options: &Options) -> Option<Value> {
        let s = value.as_str()?.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, &options.date_time_format) {
            return Some(Value::DateTime(dt));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::DateTime)
    }
}
