use std::fmt;
use thiserror::Error;

/// Error taxonomy. The integer codes are stable and appear in rendered
/// messages; hosts may key on them across releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Parse
    UnexpectedToken,
    UnterminatedString,
    InvalidNumber,
    InvalidIdentifier,
    UnexpectedEndOfFile,
    SyntaxError,
    InvalidFieldName,
    // Runtime
    UnknownField,
    TypeMismatch,
    DivideByZero,
    ModuloByZero,
    UnknownFunction,
    InvalidFunctionArguments,
    ConversionError,
    AssertionFailed,
    UnknownOperator,
    NullReference,
    // Limits
    MaxNodesExceeded,
    MaxVisitsExceeded,
    MaxDepthExceeded,
    ExecutionTimeout,
    ScriptTooLarge,
}

impl ErrorKind {
    /// Stable integer code for this kind.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::UnexpectedToken => 101,
            ErrorKind::UnterminatedString => 102,
            ErrorKind::InvalidNumber => 103,
            ErrorKind::InvalidIdentifier => 104,
            ErrorKind::UnexpectedEndOfFile => 105,
            ErrorKind::SyntaxError => 106,
            ErrorKind::InvalidFieldName => 107,
            ErrorKind::UnknownField => 201,
            ErrorKind::TypeMismatch => 202,
            ErrorKind::DivideByZero => 203,
            ErrorKind::ModuloByZero => 204,
            ErrorKind::UnknownFunction => 205,
            ErrorKind::InvalidFunctionArguments => 206,
            ErrorKind::ConversionError => 207,
            ErrorKind::AssertionFailed => 208,
            ErrorKind::UnknownOperator => 209,
            ErrorKind::NullReference => 210,
            ErrorKind::MaxNodesExceeded => 301,
            ErrorKind::MaxVisitsExceeded => 302,
            ErrorKind::MaxDepthExceeded => 303,
            ErrorKind::ExecutionTimeout => 304,
            ErrorKind::ScriptTooLarge => 305,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnexpectedToken => "unexpected token",
            ErrorKind::UnterminatedString => "unterminated string",
            ErrorKind::InvalidNumber => "invalid number",
            ErrorKind::InvalidIdentifier => "invalid identifier",
            ErrorKind::UnexpectedEndOfFile => "unexpected end of file",
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::InvalidFieldName => "invalid field name",
            ErrorKind::UnknownField => "unknown field",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::DivideByZero => "divide by zero",
            ErrorKind::ModuloByZero => "modulo by zero",
            ErrorKind::UnknownFunction => "unknown function",
            ErrorKind::InvalidFunctionArguments => "invalid function arguments",
            ErrorKind::ConversionError => "conversion error",
            ErrorKind::AssertionFailed => "assertion failed",
            ErrorKind::UnknownOperator => "unknown operator",
            ErrorKind::NullReference => "null reference",
            ErrorKind::MaxNodesExceeded => "max nodes exceeded",
            ErrorKind::MaxVisitsExceeded => "max visits exceeded",
            ErrorKind::MaxDepthExceeded => "max depth exceeded",
            ErrorKind::ExecutionTimeout => "execution timeout",
            ErrorKind::ScriptTooLarge => "script too large",
        };
        f.write_str(name)
    }
}

/// The primary error type for the `regula` crate.
///
/// Every error carries the 1-based source position it points at. A zero
/// position means "not yet anchored"; the evaluator fills in the call
/// site before an error escapes a built-in function.
#[derive(Clone, Debug, Error)]
#[error("[E{}] {} (line {}, column {})", .kind.code(), .message, .line, .column)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ScriptError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            column,
        }
    }

    /// An error with no position yet; built-ins use this and the
    /// evaluator anchors it at the call site.
    pub(crate) fn unpositioned(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, 0, 0)
    }

    /// Anchors an unpositioned error; an already-anchored error keeps
    /// its original position.
    pub(crate) fn at(mut self, line: u32, column: u32) -> Self {
        if self.line == 0 {
            self.line = line;
            self.column = column;
        }
        self
    }

    /// Stable integer code of this error's kind.
    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}
