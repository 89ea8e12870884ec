use crate::ast::{BinaryOp, Block, Expr, Stmt, UnaryOp};
use crate::error::{ErrorKind, ScriptError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Recursive-descent parser producing a [`Block`].
///
/// Statement keywords (`set`, `msg`, `return`, `return_local`, `assert`,
/// `if`, `elseif`, `else`, `local`) match case-insensitively; the literal
/// keywords `true`, `false`, `null` and `now` are case-sensitive.
pub(crate) struct Parser<'a> {
    lex: Lexer<'a>,
    look: Token,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(s: &'a str, enable_comments: bool) -> Result<Self, ScriptError> {
        let mut lex = Lexer::new(s, enable_comments);
        let look = lex.next_token()?;
        Ok(Self { lex, look })
    }

    fn bump(&mut self) -> Result<Token, ScriptError> {
        let tok = std::mem::replace(&mut self.look, self.lex.next_token()?);
        Ok(tok)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ScriptError> {
        if self.look.kind == kind {
            self.bump()
        } else if self.look.kind == TokenKind::Eof {
            Err(ScriptError::new(
                ErrorKind::UnexpectedEndOfFile,
                format!("expected {}", what),
                self.look.line,
                self.look.column,
            ))
        } else {
            Err(ScriptError::new(
                ErrorKind::UnexpectedToken,
                format!("expected {}, found '{}'", what, self.look.text),
                self.look.line,
                self.look.column,
            ))
        }
    }

    /// The skip-blank-lines helper: newlines only matter between
    /// statements, never as separators.
    fn skip_newlines(&mut self) -> Result<(), ScriptError> {
        while self.look.kind == TokenKind::NewLine {
            self.bump()?;
        }
        Ok(())
    }

    fn keyword_is(&self, kw: &str) -> bool {
        self.look.kind == TokenKind::Ident && self.look.text.eq_ignore_ascii_case(kw)
    }

    /// script := block_body | '{' block_body '}'
    pub(crate) fn parse(mut self) -> Result<Block, ScriptError> {
        self.skip_newlines()?;
        let stmts = if self.look.kind == TokenKind::LBrace {
            self.bump()?;
            let stmts = self.block_body(TokenKind::RBrace)?;
            self.expect(TokenKind::RBrace, "'}'")?;
            self.skip_newlines()?;
            stmts
        } else {
            self.block_body(TokenKind::Eof)?
        };
        if self.look.kind != TokenKind::Eof {
            return Err(ScriptError::new(
                ErrorKind::SyntaxError,
                format!("trailing input '{}'", self.look.text),
                self.look.line,
                self.look.column,
            ));
        }
        Ok(Block {
            stmts,
            end_line: self.look.line,
            end_column: self.look.column,
        })
    }

    fn block_body(&mut self, terminator: TokenKind) -> Result<Vec<Stmt>, ScriptError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines()?;
            if self.look.kind == terminator || self.look.kind == TokenKind::Eof {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
        }
    }

    /// `'{' block_body '}'` as used by `if`/`elseif`/`else`/`local`.
    fn braced_block(&mut self) -> Result<Block, ScriptError> {
        self.skip_newlines()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let stmts = self.block_body(TokenKind::RBrace)?;
        let close = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Block {
            stmts,
            end_line: close.line,
            end_column: close.column,
        })
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if self.look.kind != TokenKind::Ident {
            return Err(ScriptError::new(
                ErrorKind::UnexpectedToken,
                format!("expected a statement, found '{}'", self.look.text),
                self.look.line,
                self.look.column,
            ));
        }
        let kw = self.look.text.to_ascii_lowercase();
        match kw.as_str() {
            "set" => self.stmt_set(),
            "msg" => self.stmt_msg(),
            "return" => {
                let tok = self.bump()?;
                Ok(Stmt::Return {
                    line: tok.line,
                    column: tok.column,
                })
            }
            "return_local" => {
                let tok = self.bump()?;
                Ok(Stmt::ReturnLocal {
                    line: tok.line,
                    column: tok.column,
                })
            }
            "assert" => self.stmt_assert(),
            "if" => self.stmt_if(),
            "local" => {
                let tok = self.bump()?;
                let body = self.braced_block()?;
                Ok(Stmt::Local {
                    body,
                    line: tok.line,
                    column: tok.column,
                })
            }
            _ => Err(ScriptError::new(
                ErrorKind::SyntaxError,
                format!("unknown statement '{}'", self.look.text),
                self.look.line,
                self.look.column,
            )),
        }
    }

    /// `set '(' (IDENT | '[' fieldname (':' IDENT)? ']') ',' expr ')'`
    fn stmt_set(&mut self) -> Result<Stmt, ScriptError> {
        let tok = self.bump()?;
        self.expect(TokenKind::LParen, "'(' after 'set'")?;
        let (field, type_hint) = self.field_target()?;
        self.expect(TokenKind::Comma, "','")?;
        let value = self.expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Stmt::Set {
            field,
            type_hint,
            value,
            line: tok.line,
            column: tok.column,
        })
    }

    /// The Set target: a bare identifier, or a bracketed field name with
    /// an optional type hint.
    fn field_target(&mut self) -> Result<(String, Option<String>), ScriptError> {
        if self.look.kind == TokenKind::LBracket {
            let (name, hint, _, _) = self.bracketed_field()?;
            Ok((name, hint))
        } else {
            let tok = self.expect(TokenKind::Ident, "a field name")?;
            Ok((tok.text, None))
        }
    }

    /// `'[' fieldname (':' IDENT)? ']'` with the lexer switched into the
    /// field-name submode for the name itself.
    fn bracketed_field(&mut self) -> Result<(String, Option<String>, u32, u32), ScriptError> {
        debug_assert_eq!(self.look.kind, TokenKind::LBracket);
        let open = self.look.clone();
        // The token after '[' must be lexed in field-name mode, so it is
        // pulled straight from the lexer instead of through `bump`.
        let name_tok = self.lex.next_field_name()?;
        self.look = self.lex.next_token()?;
        if name_tok.text.is_empty() {
            return Err(ScriptError::new(
                ErrorKind::InvalidFieldName,
                "empty field name",
                open.line,
                open.column,
            ));
        }
        let hint = if self.look.kind == TokenKind::Colon {
            self.bump()?;
            let hint_tok = self.expect(TokenKind::Ident, "a type name after ':'")?;
            Some(hint_tok.text)
        } else {
            None
        };
        self.expect(TokenKind::RBracket, "']'")?;
        Ok((name_tok.text, hint, open.line, open.column))
    }

    /// `msg '(' STRING (',' STRING)? ')'` — both arguments must be
    /// literal strings.
    fn stmt_msg(&mut self) -> Result<Stmt, ScriptError> {
        let tok = self.bump()?;
        self.expect(TokenKind::LParen, "'(' after 'msg'")?;
        let text = self.literal_string("message text")?;
        let level = if self.look.kind == TokenKind::Comma {
            self.bump()?;
            Some(self.literal_string("message level")?)
        } else {
            None
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Stmt::Msg {
            text,
            level,
            line: tok.line,
            column: tok.column,
        })
    }

    /// `assert '(' expr ',' STRING ',' STRING (',' STRING)? ')'`
    fn stmt_assert(&mut self) -> Result<Stmt, ScriptError> {
        let tok = self.bump()?;
        self.expect(TokenKind::LParen, "'(' after 'assert'")?;
        let cond = self.expr()?;
        self.expect(TokenKind::Comma, "','")?;
        let action = self.literal_string("assert action")?;
        self.expect(TokenKind::Comma, "','")?;
        let message = self.literal_string("assert message")?;
        let level = if self.look.kind == TokenKind::Comma {
            self.bump()?;
            Some(self.literal_string("assert level")?)
        } else {
            None
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Stmt::Assert {
            cond,
            action,
            message,
            level,
            line: tok.line,
            column: tok.column,
        })
    }

    fn stmt_if(&mut self) -> Result<Stmt, ScriptError> {
        let tok = self.bump()?;
        self.expect(TokenKind::LParen, "'(' after 'if'")?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_block = self.braced_block()?;
        let mut else_ifs = Vec::new();
        let mut else_block = None;
        loop {
            // Peek past blank lines for an elseif/else continuation.
            self.skip_newlines()?;
            if self.keyword_is("elseif") {
                self.bump()?;
                self.expect(TokenKind::LParen, "'(' after 'elseif'")?;
                let c = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let b = self.braced_block()?;
                else_ifs.push((c, b));
            } else if self.keyword_is("else") {
                self.bump()?;
                else_block = Some(self.braced_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            cond,
            then_block,
            else_ifs,
            else_block,
            line: tok.line,
            column: tok.column,
        })
    }

    /// A literal string argument; anything else is a type error at parse
    /// time.
    fn literal_string(&mut self, what: &str) -> Result<String, ScriptError> {
        if self.look.kind == TokenKind::Str {
            Ok(self.bump()?.text)
        } else {
            Err(ScriptError::new(
                ErrorKind::TypeMismatch,
                format!("{} must be a literal string", what),
                self.look.line,
                self.look.column,
            ))
        }
    }

    // --- Expressions, lowest precedence first ---

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.and_expr()?;
        while self.look.kind == TokenKind::OrOr {
            let op_tok = self.bump()?;
            let rhs = self.and_expr()?;
            node = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.equality()?;
        while self.look.kind == TokenKind::AndAnd {
            let op_tok = self.bump()?;
            let rhs = self.equality()?;
            node = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.relational()?;
        loop {
            let op = match self.look.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let op_tok = self.bump()?;
            let rhs = self.relational()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.additive()?;
        loop {
            let op = match self.look.kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let op_tok = self.bump()?;
            let rhs = self.additive()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.multiplicative()?;
        loop {
            let op = match self.look.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let op_tok = self.bump()?;
            let rhs = self.multiplicative()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut node = self.unary()?;
        loop {
            let op = match self.look.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let op_tok = self.bump()?;
            let rhs = self.unary()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line: op_tok.line,
                column: op_tok.column,
            };
        }
        Ok(node)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.look.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.primary(),
        };
        let op_tok = self.bump()?;
        let inner = self.unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(inner),
            line: op_tok.line,
            column: op_tok.column,
        })
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.look.kind {
            TokenKind::LBracket => {
                let (name, type_hint, line, column) = self.bracketed_field()?;
                Ok(Expr::Field {
                    name,
                    type_hint,
                    line,
                    column,
                })
            }
            TokenKind::Number => {
                let tok = self.bump()?;
                let text = if tok.text.starts_with('.') {
                    format!("0{}", tok.text)
                } else {
                    tok.text.clone()
                };
                let n = Decimal::from_str(&text).map_err(|_| {
                    ScriptError::new(
                        ErrorKind::InvalidNumber,
                        format!("invalid number '{}'", tok.text),
                        tok.line,
                        tok.column,
                    )
                })?;
                Ok(Expr::Literal {
                    value: Value::Number(n),
                    line: tok.line,
                    column: tok.column,
                })
            }
            TokenKind::Str => {
                let tok = self.bump()?;
                Ok(Expr::Literal {
                    value: Value::Str(tok.text),
                    line: tok.line,
                    column: tok.column,
                })
            }
            TokenKind::Ident => {
                // Literal keywords are case-sensitive.
                match self.look.text.as_str() {
                    "true" | "false" => {
                        let tok = self.bump()?;
                        return Ok(Expr::Literal {
                            value: Value::Bool(tok.text == "true"),
                            line: tok.line,
                            column: tok.column,
                        });
                    }
                    "null" => {
                        let tok = self.bump()?;
                        return Ok(Expr::Literal {
                            value: Value::Null,
                            line: tok.line,
                            column: tok.column,
                        });
                    }
                    "now" => {
                        let tok = self.bump()?;
                        return Ok(Expr::Call {
                            name: "__now__".to_string(),
                            args: Vec::new(),
                            line: tok.line,
                            column: tok.column,
                        });
                    }
                    _ => {}
                }
                let tok = self.bump()?;
                if self.look.kind == TokenKind::LParen {
                    self.bump()?;
                    let mut args = Vec::new();
                    if self.look.kind != TokenKind::RParen {
                        loop {
                            args.push(self.expr()?);
                            if self.look.kind == TokenKind::Comma {
                                self.bump()?;
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    Ok(Expr::Call {
                        name: tok.text,
                        args,
                        line: tok.line,
                        column: tok.column,
                    })
                } else {
                    // A bare identifier denotes a field read.
                    Ok(Expr::Field {
                        name: tok.text,
                        type_hint: None,
                        line: tok.line,
                        column: tok.column,
                    })
                }
            }
            TokenKind::LParen => {
                self.bump()?;
                let e = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(e)
            }
            TokenKind::Eof => Err(ScriptError::new(
                ErrorKind::UnexpectedEndOfFile,
                "expected an expression",
                self.look.line,
                self.look.column,
            )),
            _ => Err(ScriptError::new(
                ErrorKind::UnexpectedToken,
                format!("expected an expression, found '{}'", self.look.text),
                self.look.line,
                self.look.column,
            )),
        }
    }
}
