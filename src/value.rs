use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;

/// A dynamically-typed script value.
///
/// Numbers are exact scale-preserving decimals, so `2.50` stays `2.50`
/// through arithmetic and stringification. Date-times are naive wall-clock
/// instants with no offset attached.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    Str(String),
    DateTime(NaiveDateTime),
}

/// Runtime type tag of a [`Value`], used by converters and type hints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Str,
    DateTime,
}

impl ValueKind {
    /// Maps a `[field:hint]` type annotation onto a runtime kind.
    /// Hints are matched case-insensitively; unknown hints return `None`.
    pub(crate) fn from_hint(hint: &str) -> Option<ValueKind> {
        match hint.to_ascii_lowercase().as_str() {
            "string" => Some(ValueKind::Str),
            "decimal" => Some(ValueKind::Number),
            "bool" => Some(ValueKind::Bool),
            "datetime" => Some(ValueKind::DateTime),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "decimal",
            ValueKind::Str => "string",
            ValueKind::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

impl Value {
    /// The runtime type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::Str,
            Value::DateTime(_) => ValueKind::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the decimal payload, if this is a number.
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// Default string form, used when no converter-driven formatting applies.
/// Null renders empty, date-times render in the canonical
/// `%Y-%m-%d %H:%M:%S` layout.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Decimal::try_from(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
