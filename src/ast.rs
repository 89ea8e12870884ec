use crate::value::Value;
use std::fmt;

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators, lowest to highest precedence tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Expression nodes. Every node carries the 1-based source position of
/// the token that introduced it.
#[derive(Clone, Debug)]
pub(crate) enum Expr {
    Literal {
        value: Value,
        line: u32,
        column: u32,
    },
    Field {
        name: String,
        type_hint: Option<String>,
        line: u32,
        column: u32,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: u32,
        column: u32,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
        column: u32,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        line: u32,
        column: u32,
    },
}

impl Expr {
    pub(crate) fn pos(&self) -> (u32, u32) {
        match self {
            Expr::Literal { line, column, .. }
            | Expr::Field { line, column, .. }
            | Expr::Unary { line, column, .. }
            | Expr::Binary { line, column, .. }
            | Expr::Call { line, column, .. } => (*line, *column),
        }
    }
}

/// Statement nodes.
#[derive(Clone, Debug)]
pub(crate) enum Stmt {
    Set {
        field: String,
        type_hint: Option<String>,
        value: Expr,
        line: u32,
        column: u32,
    },
    Msg {
        text: String,
        level: Option<String>,
        line: u32,
        column: u32,
    },
    Return {
        line: u32,
        column: u32,
    },
    ReturnLocal {
        line: u32,
        column: u32,
    },
    Assert {
        cond: Expr,
        action: String,
        message: String,
        level: Option<String>,
        line: u32,
        column: u32,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_ifs: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        line: u32,
        column: u32,
    },
    Local {
        body: Block,
        line: u32,
        column: u32,
    },
}

impl Stmt {
    pub(crate) fn pos(&self) -> (u32, u32) {
        match self {
            Stmt::Set { line, column, .. }
            | Stmt::Msg { line, column, .. }
            | Stmt::Return { line, column }
            | Stmt::ReturnLocal { line, column }
            | Stmt::Assert { line, column, .. }
            | Stmt::If { line, column, .. }
            | Stmt::Local { line, column, .. } => (*line, *column),
        }
    }
}

/// A compiled script: the statement list plus the position where the
/// script ends (used for `end_line`/`end_column` in results).
#[derive(Clone, Debug)]
pub struct Block {
    pub(crate) stmts: Vec<Stmt>,
    pub(crate) end_line: u32,
    pub(crate) end_column: u32,
}

// --- Pretty-printer ---
//
// Canonical source rendering. Parsing is a left inverse of this printer
// modulo whitespace and comments, which the test suite relies on.

fn fmt_literal(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Number(n) => write!(f, "{}", n),
        Value::Str(s) => {
            f.write_str("'")?;
            for c in s.chars() {
                match c {
                    '\'' => f.write_str("\\'")?,
                    '\n' => f.write_str("\\n")?,
                    '\r' => f.write_str("\\r")?,
                    '\t' => f.write_str("\\t")?,
                    '\\' => f.write_str("\\\\")?,
                    c => write!(f, "{}", c)?,
                }
            }
            f.write_str("'")
        }
        // No datetime literal syntax exists; render the canonical form.
        Value::DateTime(_) => write!(f, "'{}'", value),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, .. } => fmt_literal(value, f),
            Expr::Field {
                name, type_hint, ..
            } => match type_hint {
                Some(hint) => write!(f, "[{}:{}]", name, hint),
                None => write!(f, "[{}]", name),
            },
            Expr::Unary { op, expr, .. } => {
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "{}({})", sym, expr)
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                write!(f, "({} {} {})", lhs, op.symbol(), rhs)
            }
            Expr::Call { name, args, .. } => {
                if name == "__now__" {
                    return f.write_str("now");
                }
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Set {
                field,
                type_hint,
                value,
                ..
            } => match type_hint {
                Some(hint) => write!(f, "set([{}:{}], {})", field, hint, value),
                None => write!(f, "set([{}], {})", field, value),
            },
            Stmt::Msg { text, level, .. } => {
                fmt_string_args(f, "msg", &[Some(text.as_str()), level.as_deref()])
            }
            Stmt::Return { .. } => f.write_str("return"),
            Stmt::ReturnLocal { .. } => f.write_str("return_local"),
            Stmt::Assert {
                cond,
                action,
                message,
                level,
                ..
            } => {
                write!(f, "assert({}, ", cond)?;
                fmt_quoted(f, action)?;
                f.write_str(", ")?;
                fmt_quoted(f, message)?;
                if let Some(level) = level {
                    f.write_str(", ")?;
                    fmt_quoted(f, level)?;
                }
                f.write_str(")")
            }
            Stmt::If {
                cond,
                then_block,
                else_ifs,
                else_block,
                ..
            } => {
                write!(f, "if ({}) {}", cond, then_block)?;
                for (c, b) in else_ifs {
                    write!(f, " elseif ({}) {}", c, b)?;
                }
                if let Some(b) = else_block {
                    write!(f, " else {}", b)?;
                }
                Ok(())
            }
            Stmt::Local { body, .. } => write!(f, "local {}", body),
        }
    }
}

fn fmt_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    fmt_literal(&Value::Str(s.to_string()), f)
}

fn fmt_string_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[Option<&str>]) -> fmt::Result {
    write!(f, "{}(", name)?;
    let mut first = true;
    for arg in args.iter().flatten() {
        if !first {
            f.write_str(", ")?;
        }
        first = false;
        fmt_quoted(f, arg)?;
    }
    f.write_str(")")
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for stmt in &self.stmts {
            write!(f, " {}", stmt)?;
        }
        f.write_str(" }")
    }
}
