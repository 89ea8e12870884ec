use crate::convert::ConverterRegistry;
use crate::error::{ErrorKind, ScriptError};
use crate::options::Options;
use crate::scope::FieldMap;
use crate::value::{Value, ValueKind};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a function body may consult: the engine options, the
/// converter registry, and a read-only view of the caller's input
/// fields. Mutable fields are deliberately not reachable from here.
pub struct FunctionContext<'a> {
    pub options: &'a Options,
    pub converters: &'a ConverterRegistry,
    pub(crate) inputs: &'a FieldMap,
}

impl FunctionContext<'_> {
    /// Whether the caller supplied an input field with this name.
    /// Queries the input snapshot, not the mutable view, so `set` has no
    /// effect on the answer.
    pub fn input_exists(&self, name: &str) -> bool {
        self.inputs.contains(name)
    }

    /// Coerces to string through the converter registry.
    pub fn to_string_value(&self, value: &Value) -> Result<String, ScriptError> {
        match self.converters.convert(value, ValueKind::Str, self.options)? {
            Value::Str(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    /// Coerces to decimal through the converter registry.
    pub fn to_number(&self, value: &Value) -> Result<Decimal, ScriptError> {
        match self
            .converters
            .convert(value, ValueKind::Number, self.options)?
        {
            Value::Number(n) => Ok(n),
            other => Err(ScriptError::unpositioned(
                ErrorKind::ConversionError,
                format!("cannot convert {} to decimal", other.kind()),
            )),
        }
    }

    /// Coerces to datetime through the converter registry.
    pub fn to_datetime(&self, value: &Value) -> Result<NaiveDateTime, ScriptError> {
        match self
            .converters
            .convert(value, ValueKind::DateTime, self.options)?
        {
            Value::DateTime(dt) => Ok(dt),
            other => Err(ScriptError::unpositioned(
                ErrorKind::ConversionError,
                format!("cannot convert {} to datetime", other.kind()),
            )),
        }
    }
}

/// A callable operation exposed to scripts.
pub trait Function: Send + Sync {
    /// Name the script calls this function by; matched
    /// case-insensitively.
    fn name(&self) -> &str;

    fn invoke(&self, args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError>;
}

/// Case-insensitive function name registry. Re-registering a name
/// overwrites the previous entry.
pub struct FunctionRegistry {
    funcs: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in string/math/datetime
    /// functions.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        crate::builtins::register_builtins(&mut reg);
        reg
    }

    pub fn register(&mut self, function: Arc<dyn Function>) {
        self.funcs
            .insert(function.name().to_ascii_lowercase(), function);
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.funcs.get(&name.to_ascii_lowercase())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(&name.to_ascii_lowercase())
    }
}

/// Adapter that turns a plain function pointer into a [`Function`];
/// all built-ins register through this.
pub(crate) struct BuiltinFn {
    pub(crate) name: &'static str,
    pub(crate) f: fn(&[Value], &FunctionContext<'_>) -> Result<Value, ScriptError>,
}

impl Function for BuiltinFn {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(&self, args: &[Value], ctx: &FunctionContext<'_>) -> Result<Value, ScriptError> {
        (self.f)(args, ctx)
    }
}
