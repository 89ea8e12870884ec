use crate::ast::{BinaryOp, Block, Expr, Stmt};
use crate::collect::count_nodes;
use crate::engine::ErrorReport;
use crate::registry::FunctionRegistry;

/// Static complexity profile of a script.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Complexity {
    pub arithmetic_ops: u32,
    pub comparison_ops: u32,
    pub logical_ops: u32,
    pub function_calls: u32,
    pub conditionals: u32,
    pub max_block_depth: u32,
    pub total_expressions: u32,
}

/// A field reference with the position of its first occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub name: String,
    pub line: u32,
    pub column: u32,
}

/// A non-fatal finding from validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    PotentialIssue,
}

#[derive(Clone, Debug)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Result of `Regula::validate`: the outcome of compilation plus the
/// analyzer's read-only statistics. The analyzer never executes code.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub success: bool,
    pub error: Option<ErrorReport>,
    pub total_nodes: u32,
    pub complexity: Complexity,
    pub used_functions: Vec<String>,
    pub referenced_fields: Vec<FieldRef>,
    pub declared_variables: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub(crate) fn failed(error: ErrorReport) -> Self {
        Self {
            success: false,
            error: Some(error),
            total_nodes: 0,
            complexity: Complexity::default(),
            used_functions: Vec::new(),
            referenced_fields: Vec::new(),
            declared_variables: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Walks a compiled block and collects the validation statistics.
pub(crate) fn analyze(block: &Block, functions: &FunctionRegistry) -> ValidationResult {
    let mut ctx = Ctx {
        functions,
        complexity: Complexity::default(),
        used_functions: Vec::new(),
        referenced_fields: Vec::new(),
        declared_variables: Vec::new(),
        warnings: Vec::new(),
    };
    ctx.walk_block(block, 1);
    ValidationResult {
        success: true,
        error: None,
        total_nodes: count_nodes(block),
        complexity: ctx.complexity,
        used_functions: ctx.used_functions,
        referenced_fields: ctx.referenced_fields,
        declared_variables: ctx.declared_variables,
        warnings: ctx.warnings,
    }
}

struct Ctx<'a> {
    functions: &'a FunctionRegistry,
    complexity: Complexity,
    used_functions: Vec<String>,
    referenced_fields: Vec<FieldRef>,
    declared_variables: Vec<String>,
    warnings: Vec<ValidationWarning>,
}

impl Ctx<'_> {
    fn walk_block(&mut self, block: &Block, depth: u32) {
        if depth > self.complexity.max_block_depth {
            self.complexity.max_block_depth = depth;
        }
        for stmt in &block.stmts {
            self.walk_stmt(stmt, depth);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, depth: u32) {
        match stmt {
            Stmt::Set { field, value, .. } => {
                if !self
                    .declared_variables
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(field))
                {
                    self.declared_variables.push(field.clone());
                }
                self.walk_expr(value);
            }
            Stmt::Msg { .. } | Stmt::Return { .. } | Stmt::ReturnLocal { .. } => {}
            Stmt::Assert { cond, .. } => self.walk_expr(cond),
            Stmt::If {
                cond,
                then_block,
                else_ifs,
                else_block,
                ..
            } => {
                self.complexity.conditionals += 1;
                self.walk_expr(cond);
                self.walk_block(then_block, depth + 1);
                for (c, b) in else_ifs {
                    self.complexity.conditionals += 1;
                    self.walk_expr(c);
                    self.walk_block(b, depth + 1);
                }
                if let Some(b) = else_block {
                    self.walk_block(b, depth + 1);
                }
            }
            Stmt::Local { body, .. } => self.walk_block(body, depth + 1),
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        self.complexity.total_expressions += 1;
        match expr {
            Expr::Literal { .. } => {}
            Expr::Field {
                name, line, column, ..
            } => {
                if !self
                    .referenced_fields
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(name))
                {
                    self.referenced_fields.push(FieldRef {
                        name: name.clone(),
                        line: *line,
                        column: *column,
                    });
                }
            }
            Expr::Unary { expr, .. } => self.walk_expr(expr),
            Expr::Binary { op, lhs, rhs, .. } => {
                match op {
                    BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Div
                    | BinaryOp::Mod => self.complexity.arithmetic_ops += 1,
                    BinaryOp::Eq
                    | BinaryOp::Ne
                    | BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge => self.complexity.comparison_ops += 1,
                    BinaryOp::And | BinaryOp::Or => self.complexity.logical_ops += 1,
                }
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            Expr::Call {
                name,
                args,
                line,
                column,
            } => {
                // The reserved `now` node is evaluator-internal, not a
                // registry call.
                if name != "__now__" {
                    self.complexity.function_calls += 1;
                    if !self
                        .used_functions
                        .iter()
                        .any(|f| f.eq_ignore_ascii_case(name))
                    {
                        self.used_functions.push(name.clone());
                    }
                    if !self.functions.contains(name) {
                        self.warnings.push(ValidationWarning {
                            kind: WarningKind::PotentialIssue,
                            message: format!("call to unregistered function '{}'", name),
                            line: *line,
                            column: *column,
                        });
                    }
                }
                for arg in args {
                    self.walk_expr(arg);
                }
            }
        }
    }
}
