#![doc = include_str!("../README.md")]

mod analysis;
mod ast;
mod budget;
mod builtins;
mod cache;
mod collect;
mod convert;
mod engine;
mod error;
mod eval;
mod lexer;
mod options;
mod parser;
mod registry;
mod scope;
mod value;

pub use analysis::{Complexity, FieldRef, ValidationResult, ValidationWarning, WarningKind};
pub use ast::Block;
pub use convert::{Converter, ConverterRegistry};
pub use engine::{ErrorReport, ExecutionResult, Message, MessageLevel, Regula};
pub use error::{ErrorKind, ScriptError};
pub use options::{
    EqualityCoercion, FieldNameValidator, MidpointRounding, Options, StringComparison,
    StringConcatMode,
};
pub use registry::{Function, FunctionContext, FunctionRegistry};
pub use value::{Value, ValueKind};

// Re-export the decimal and datetime types that appear in the public API.
pub use chrono::NaiveDateTime;
pub use rust_decimal::Decimal;
