use crate::ast::{BinaryOp, Block, Expr, Stmt, UnaryOp};
use crate::budget::Budget;
use crate::convert::ConverterRegistry;
use crate::engine::{ErrorReport, ExecutionResult, Message, MessageLevel};
use crate::error::{ErrorKind, ScriptError};
use crate::options::{EqualityCoercion, MidpointRounding, Options, StringComparison, StringConcatMode};
use crate::registry::{FunctionContext, FunctionRegistry};
use crate::scope::{ExecutionScope, FieldMap};
use crate::value::{Value, ValueKind};
use chrono::{Local, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Control-flow signal returned by the statement executor. Errors travel
/// through `Result`; flow control is plain data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Normal,
    Return,
    ReturnLocal,
}

/// Relational classification of an operand.
enum RelClass {
    Num(Decimal),
    Dt(NaiveDateTime),
    Other,
}

/// Per-call tree-walking evaluator. Owns the scope, the visit/depth/time
/// budget and the partial results; shares the registries and options
/// read-only with every other execution.
pub(crate) struct Evaluator<'a> {
    options: &'a Options,
    converters: &'a ConverterRegistry,
    functions: &'a FunctionRegistry,
    scope: ExecutionScope,
    budget: Budget,
    assignments: FieldMap,
    messages: Vec<Message>,
    depth: u32,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        options: &'a Options,
        converters: &'a ConverterRegistry,
        functions: &'a FunctionRegistry,
        inputs: &HashMap<String, Value>,
    ) -> Self {
        let scope = ExecutionScope::new(inputs, options.case_insensitive_field_names);
        Self {
            options,
            converters,
            functions,
            scope,
            budget: Budget::new(options),
            assignments: FieldMap::new(options.case_insensitive_field_names),
            messages: Vec::new(),
            depth: 0,
        }
    }

    /// Runs the block to completion or first error. Assignments and
    /// messages produced before a failure stay in the result.
    pub(crate) fn run(mut self, block: &Block) -> ExecutionResult {
        let outcome = self.exec_block(block, false);
        let elapsed = self.budget.elapsed();
        let assignments: HashMap<String, Value> = self
            .assignments
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        ExecutionResult {
            assignments,
            messages: self.messages,
            elapsed,
            end_line: block.end_line,
            end_column: block.end_column,
            error: outcome.err().map(|e| ErrorReport::from_error(&e)),
        }
    }

    fn exec_block(&mut self, block: &Block, in_local: bool) -> Result<Flow, ScriptError> {
        for stmt in &block.stmts {
            let flow = self.exec_stmt(stmt, in_local)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, in_local: bool) -> Result<Flow, ScriptError> {
        let (line, column) = stmt.pos();
        self.budget.check(0, line, column)?;
        match stmt {
            Stmt::Set {
                field,
                type_hint,
                value,
                line,
                column,
            } => {
                self.validate_field_name(field, *line, *column)?;
                let mut v = self.eval_expr(value)?;
                if let Some(hint) = type_hint {
                    let target = ValueKind::from_hint(hint).ok_or_else(|| {
                        ScriptError::new(
                            ErrorKind::TypeMismatch,
                            format!("unknown type hint '{}'", hint),
                            *line,
                            *column,
                        )
                    })?;
                    v = self
                        .converters
                        .convert(&v, target, self.options)
                        .map_err(|e| e.at(*line, *column))?;
                }
                if let (Value::Number(n), Some(digits)) = (&v, self.options.rounding_digits) {
                    v = Value::Number(round_decimal(*n, digits, self.options.midpoint_rounding));
                }
                self.scope.fields.insert(field, v.clone());
                self.assignments.insert(field, v);
                Ok(Flow::Normal)
            }
            Stmt::Msg {
                text,
                level,
                line,
                column,
            } => {
                self.messages.push(Message {
                    level: parse_level(level.as_deref()),
                    text: text.clone(),
                    line: *line,
                    column: *column,
                });
                Ok(Flow::Normal)
            }
            Stmt::Return { .. } => Ok(Flow::Return),
            Stmt::ReturnLocal { .. } => Ok(local_return(in_local)),
            Stmt::Assert {
                cond,
                action,
                message,
                level,
                line,
                column,
            } => {
                if self.eval_cond(cond)? {
                    return Ok(Flow::Normal);
                }
                self.messages.push(Message {
                    level: parse_level(level.as_deref()),
                    text: message.clone(),
                    line: *line,
                    column: *column,
                });
                match action.to_ascii_lowercase().as_str() {
                    "none" => Ok(Flow::Normal),
                    "return" => Ok(Flow::Return),
                    "return_local" => Ok(local_return(in_local)),
                    _ => Err(ScriptError::new(
                        ErrorKind::UnknownOperator,
                        format!("unknown assert action '{}'", action),
                        *line,
                        *column,
                    )),
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_ifs,
                else_block,
                ..
            } => {
                if self.eval_cond(cond)? {
                    return self.exec_block(then_block, in_local);
                }
                for (c, b) in else_ifs {
                    if self.eval_cond(c)? {
                        return self.exec_block(b, in_local);
                    }
                }
                if let Some(b) = else_block {
                    return self.exec_block(b, in_local);
                }
                Ok(Flow::Normal)
            }
            Stmt::Local { body, .. } => match self.exec_block(body, true)? {
                Flow::ReturnLocal => Ok(Flow::Normal),
                other => Ok(other),
            },
        }
    }

    /// Evaluates a condition that the language requires to be boolean.
    fn eval_cond(&mut self, cond: &Expr) -> Result<bool, ScriptError> {
        let v = self.eval_expr(cond)?;
        let (line, column) = cond.pos();
        v.as_bool().ok_or_else(|| {
            ScriptError::new(
                ErrorKind::TypeMismatch,
                format!("condition must be a bool, found {}", v.kind()),
                line,
                column,
            )
        })
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        let (line, column) = expr.pos();
        self.depth += 1;
        self.budget.check(self.depth, line, column)?;
        let result = self.eval_expr_inner(expr, line, column);
        self.depth -= 1;
        result
    }

    fn eval_expr_inner(
        &mut self,
        expr: &Expr,
        line: u32,
        column: u32,
    ) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Field {
                name, type_hint, ..
            } => self.read_field(name, type_hint.as_deref(), line, column),
            Expr::Unary { op, expr, .. } => {
                let v = self.eval_expr(expr)?;
                match op {
                    UnaryOp::Neg => {
                        let n = self.coerce_number(&v, line, column)?;
                        Ok(Value::Number(-n))
                    }
                    UnaryOp::Not => match v {
                        Value::Bool(b) => Ok(Value::Bool(!b)),
                        other => Err(ScriptError::new(
                            ErrorKind::TypeMismatch,
                            format!("'!' requires a bool, found {}", other.kind()),
                            line,
                            column,
                        )),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => self.eval_binary(*op, lhs, rhs, line, column),
            Expr::Call { name, args, .. } => self.eval_call(name, args, line, column),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        line: u32,
        column: u32,
    ) -> Result<Value, ScriptError> {
        // Short-circuit logic evaluates the left side alone first.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.eval_bool_operand(lhs, op)?;
            return match (op, l) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.eval_bool_operand(rhs, op)?)),
            };
        }
        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        match op {
            BinaryOp::Add => self.add_values(&l, &r, line, column),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.coerce_number(&l, line, column)?;
                let b = self.coerce_number(&r, line, column)?;
                let out = match op {
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => {
                        if b.is_zero() {
                            return Err(ScriptError::new(
                                ErrorKind::DivideByZero,
                                "division by zero",
                                line,
                                column,
                            ));
                        }
                        a.checked_div(b)
                    }
                    BinaryOp::Mod => {
                        if b.is_zero() {
                            return Err(ScriptError::new(
                                ErrorKind::ModuloByZero,
                                "modulo by zero",
                                line,
                                column,
                            ));
                        }
                        a.checked_rem(b)
                    }
                    _ => None,
                };
                out.map(Value::Number).ok_or_else(|| {
                    ScriptError::new(ErrorKind::ConversionError, "numeric overflow", line, column)
                })
            }
            BinaryOp::Lt => Ok(Value::Bool(self.relate(&l, &r, line, column)?.is_lt())),
            BinaryOp::Le => Ok(Value::Bool(self.relate(&l, &r, line, column)?.is_le())),
            BinaryOp::Gt => Ok(Value::Bool(self.relate(&l, &r, line, column)?.is_gt())),
            BinaryOp::Ge => Ok(Value::Bool(self.relate(&l, &r, line, column)?.is_ge())),
            BinaryOp::Eq => Ok(Value::Bool(self.values_equal(&l, &r, line, column)?)),
            BinaryOp::Ne => Ok(Value::Bool(!self.values_equal(&l, &r, line, column)?)),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_bool_operand(&mut self, expr: &Expr, op: BinaryOp) -> Result<bool, ScriptError> {
        let v = self.eval_expr(expr)?;
        let (line, column) = expr.pos();
        v.as_bool().ok_or_else(|| {
            ScriptError::new(
                ErrorKind::TypeMismatch,
                format!("'{}' requires bool operands, found {}", op.symbol(), v.kind()),
                line,
                column,
            )
        })
    }

    /// `+`: concatenation when a string is involved, numeric addition
    /// otherwise, governed by `Options.string_concat`.
    fn add_values(
        &self,
        l: &Value,
        r: &Value,
        line: u32,
        column: u32,
    ) -> Result<Value, ScriptError> {
        let any_string = matches!(l, Value::Str(_)) || matches!(r, Value::Str(_));
        if any_string {
            if self.options.string_concat == StringConcatMode::PreferNumericIfParsable {
                if let (Some(a), Some(b)) = (parse_number_quiet(l), parse_number_quiet(r)) {
                    return a.checked_add(b).map(Value::Number).ok_or_else(|| {
                        ScriptError::new(
                            ErrorKind::ConversionError,
                            "numeric overflow",
                            line,
                            column,
                        )
                    });
                }
            }
            let mut s = self.stringify(l).map_err(|e| e.at(line, column))?;
            s.push_str(&self.stringify(r).map_err(|e| e.at(line, column))?);
            return Ok(Value::Str(s));
        }
        let a = self.coerce_number(l, line, column)?;
        let b = self.coerce_number(r, line, column)?;
        a.checked_add(b).map(Value::Number).ok_or_else(|| {
            ScriptError::new(ErrorKind::ConversionError, "numeric overflow", line, column)
        })
    }

    /// Relational ordering per the operand classification rules:
    /// numbers and datetimes never mix, datetimes pull the other side to
    /// datetime, everything else compares as decimals.
    fn relate(
        &self,
        l: &Value,
        r: &Value,
        line: u32,
        column: u32,
    ) -> Result<Ordering, ScriptError> {
        let cl = classify(l);
        let cr = classify(r);
        match (cl, cr) {
            (RelClass::Num(_), RelClass::Dt(_)) | (RelClass::Dt(_), RelClass::Num(_)) => {
                Err(ScriptError::new(
                    ErrorKind::TypeMismatch,
                    format!("cannot order {} against {}", l.kind(), r.kind()),
                    line,
                    column,
                ))
            }
            (RelClass::Num(a), RelClass::Num(b)) => Ok(a.cmp(&b)),
            (RelClass::Dt(a), RelClass::Dt(b)) => Ok(a.cmp(&b)),
            (RelClass::Dt(a), RelClass::Other) => {
                let b = self.coerce_datetime(r, line, column)?;
                Ok(a.cmp(&b))
            }
            (RelClass::Other, RelClass::Dt(b)) => {
                let a = self.coerce_datetime(l, line, column)?;
                Ok(a.cmp(&b))
            }
            (RelClass::Num(a), RelClass::Other) => {
                let b = self.coerce_number(r, line, column)?;
                Ok(a.cmp(&b))
            }
            (RelClass::Other, RelClass::Num(b)) => {
                let a = self.coerce_number(l, line, column)?;
                Ok(a.cmp(&b))
            }
            (RelClass::Other, RelClass::Other) => {
                let a = self.coerce_number(l, line, column)?;
                let b = self.coerce_number(r, line, column)?;
                Ok(a.cmp(&b))
            }
        }
    }

    /// Typed equality per `Options.equality_coercion`; `!=` is always
    /// the negation of this.
    fn values_equal(
        &self,
        l: &Value,
        r: &Value,
        line: u32,
        column: u32,
    ) -> Result<bool, ScriptError> {
        let l_is_str = matches!(l, Value::Str(_));
        let r_is_str = matches!(r, Value::Str(_));
        if !l_is_str && !r_is_str {
            return match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
                (Value::Number(a), Value::Number(b)) => Ok(a == b),
                (Value::DateTime(a), Value::DateTime(b)) => Ok(a == b),
                _ => match self.options.equality_coercion {
                    EqualityCoercion::Permissive | EqualityCoercion::MixedNumericOnly => {
                        self.stringified_equal(l, r, line, column)
                    }
                    EqualityCoercion::Strict | EqualityCoercion::NumberFriendly => {
                        Err(ScriptError::new(
                            ErrorKind::TypeMismatch,
                            format!("cannot compare {} and {}", l.kind(), r.kind()),
                            line,
                            column,
                        ))
                    }
                },
            };
        }
        match self.options.equality_coercion {
            EqualityCoercion::Strict => self.stringified_equal(l, r, line, column),
            EqualityCoercion::NumberFriendly | EqualityCoercion::Permissive => {
                if let (Some(a), Some(b)) = (parse_number_quiet(l), parse_number_quiet(r)) {
                    Ok(a == b)
                } else {
                    self.stringified_equal(l, r, line, column)
                }
            }
            EqualityCoercion::MixedNumericOnly => {
                if l_is_str && r_is_str {
                    return self.stringified_equal(l, r, line, column);
                }
                // One side is a string; numeric compare only against a
                // strict number on the other side.
                let (num, s) = if l_is_str { (r, l) } else { (l, r) };
                if let (Value::Number(a), Some(b)) = (num, parse_number_quiet(s)) {
                    Ok(*a == b)
                } else {
                    self.stringified_equal(l, r, line, column)
                }
            }
        }
    }

    fn stringified_equal(
        &self,
        l: &Value,
        r: &Value,
        line: u32,
        column: u32,
    ) -> Result<bool, ScriptError> {
        let a = self.stringify(l).map_err(|e| e.at(line, column))?;
        let b = self.stringify(r).map_err(|e| e.at(line, column))?;
        Ok(self.str_eq(&a, &b))
    }

    fn str_eq(&self, a: &str, b: &str) -> bool {
        match self.options.string_comparison {
            StringComparison::IgnoreCase => a.to_lowercase() == b.to_lowercase(),
            StringComparison::CaseSensitive => a == b,
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Expr],
        line: u32,
        column: u32,
    ) -> Result<Value, ScriptError> {
        // `now` is reserved and never reaches the registry, so user
        // registrations cannot shadow it.
        if name == "__now__" {
            let dt = if self.options.now_use_local_time {
                Local::now().naive_local()
            } else {
                Utc::now().naive_utc()
            };
            return Ok(Value::DateTime(dt));
        }
        let func = match self.functions.resolve(name) {
            Some(f) => f.clone(),
            None => {
                return Err(ScriptError::new(
                    ErrorKind::UnknownFunction,
                    format!("unknown function '{}'", name),
                    line,
                    column,
                ));
            }
        };
        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(self.eval_expr(arg)?);
        }
        let ctx = FunctionContext {
            options: self.options,
            converters: self.converters,
            inputs: &self.scope.inputs,
        };
        func.invoke(&vals, &ctx).map_err(|e| e.at(line, column))
    }

    /// Field read: validate the name, look up the mutable view, resolve
    /// the target type from the hint or the stored value, and coerce.
    fn read_field(
        &self,
        name: &str,
        type_hint: Option<&str>,
        line: u32,
        column: u32,
    ) -> Result<Value, ScriptError> {
        self.validate_field_name(name, line, column)?;
        let stored = match self.scope.fields.get(name) {
            Some(v) => v.clone(),
            None => {
                return Err(ScriptError::new(
                    ErrorKind::UnknownField,
                    format!("unknown field '{}'", name),
                    line,
                    column,
                ));
            }
        };
        let target = match type_hint {
            Some(hint) => ValueKind::from_hint(hint).ok_or_else(|| {
                ScriptError::new(
                    ErrorKind::TypeMismatch,
                    format!("unknown type hint '{}'", hint),
                    line,
                    column,
                )
            })?,
            None => {
                if stored.is_null() {
                    ValueKind::Str
                } else {
                    stored.kind()
                }
            }
        };
        self.converters
            .convert(&stored, target, self.options)
            .map_err(|e| e.at(line, column))
    }

    /// Validator precedence: a custom predicate replaces the strict
    /// charset check entirely and runs on the original spelling.
    fn validate_field_name(&self, name: &str, line: u32, column: u32) -> Result<(), ScriptError> {
        if let Some(validator) = &self.options.field_name_validator {
            if !validator(name) {
                return Err(ScriptError::new(
                    ErrorKind::InvalidFieldName,
                    format!("field name '{}' rejected by validator", name),
                    line,
                    column,
                ));
            }
        } else if self.options.strict_field_name_validation {
            let ok = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');
            if !ok {
                return Err(ScriptError::new(
                    ErrorKind::InvalidFieldName,
                    format!("invalid field name '{}'", name),
                    line,
                    column,
                ));
            }
        }
        Ok(())
    }

    fn coerce_number(&self, value: &Value, line: u32, column: u32) -> Result<Decimal, ScriptError> {
        match self
            .converters
            .convert(value, ValueKind::Number, self.options)
            .map_err(|e| e.at(line, column))?
        {
            Value::Number(n) => Ok(n),
            other => Err(ScriptError::new(
                ErrorKind::ConversionError,
                format!("cannot convert {} to decimal", other.kind()),
                line,
                column,
            )),
        }
    }

    fn coerce_datetime(
        &self,
        value: &Value,
        line: u32,
        column: u32,
    ) -> Result<NaiveDateTime, ScriptError> {
        match self
            .converters
            .convert(value, ValueKind::DateTime, self.options)
            .map_err(|e| e.at(line, column))?
        {
            Value::DateTime(dt) => Ok(dt),
            other => Err(ScriptError::new(
                ErrorKind::ConversionError,
                format!("cannot convert {} to datetime", other.kind()),
                line,
                column,
            )),
        }
    }

    /// Default stringification used by concatenation and stringified
    /// equality. Nulls honor `treat_null_string_as_empty`.
    fn stringify(&self, value: &Value) -> Result<String, ScriptError> {
        if value.is_null() && !self.options.treat_null_string_as_empty {
            return Ok("null".to_string());
        }
        match self.converters.convert(value, ValueKind::Str, self.options)? {
            Value::Str(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

fn local_return(in_local: bool) -> Flow {
    if in_local {
        Flow::ReturnLocal
    } else {
        Flow::Return
    }
}

fn classify(value: &Value) -> RelClass {
    match value {
        Value::Number(n) => RelClass::Num(*n),
        Value::DateTime(dt) => RelClass::Dt(*dt),
        _ => RelClass::Other,
    }
}

/// Numeric reading of a value without converter involvement: strict
/// numbers pass through, strings parse as decimals, everything else is
/// not a number.
fn parse_number_quiet(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Str(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_level(level: Option<&str>) -> MessageLevel {
    match level {
        Some(s) if s.eq_ignore_ascii_case("warn") => MessageLevel::Warn,
        Some(s) if s.eq_ignore_ascii_case("error") => MessageLevel::Error,
        // Unknown levels fall through to info silently.
        _ => MessageLevel::Info,
    }
}

pub(crate) fn round_decimal(n: Decimal, digits: u32, midpoint: MidpointRounding) -> Decimal {
    let strategy = match midpoint {
        MidpointRounding::AwayFromZero => RoundingStrategy::MidpointAwayFromZero,
        MidpointRounding::ToEven => RoundingStrategy::MidpointNearestEven,
    };
    n.round_dp_with_strategy(digits, strategy)
}
