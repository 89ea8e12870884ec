use crate::ast::{Block, Expr, Stmt};

/// Counts every AST node in a block: the block itself, each statement,
/// each nested block and each expression node. The facade uses this for
/// the compile-time `max_nodes` check; the analyzer reports the same
/// figure.
pub(crate) fn count_nodes(block: &Block) -> u32 {
    let mut count = 1;
    for stmt in &block.stmts {
        count += count_stmt(stmt);
    }
    count
}

fn count_stmt(stmt: &Stmt) -> u32 {
    match stmt {
        Stmt::Set { value, .. } => 1 + count_expr(value),
        Stmt::Msg { .. } | Stmt::Return { .. } | Stmt::ReturnLocal { .. } => 1,
        Stmt::Assert { cond, .. } => 1 + count_expr(cond),
        Stmt::If {
            cond,
            then_block,
            else_ifs,
            else_block,
            ..
        } => {
            let mut count = 1 + count_expr(cond) + count_nodes(then_block);
            for (c, b) in else_ifs {
                count += count_expr(c) + count_nodes(b);
            }
            if let Some(b) = else_block {
                count += count_nodes(b);
            }
            count
        }
        Stmt::Local { body, .. } => 1 + count_nodes(body),
    }
}

fn count_expr(expr: &Expr) -> u32 {
    match expr {
        Expr::Literal { .. } | Expr::Field { .. } => 1,
        Expr::Unary { expr, .. } => 1 + count_expr(expr),
        Expr::Binary { lhs, rhs, .. } => 1 + count_expr(lhs) + count_expr(rhs),
        Expr::Call { args, .. } => 1 + args.iter().map(count_expr).sum::<u32>(),
    }
}
