use crate::error::{ErrorKind, ScriptError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    Str,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    NewLine,
    Eof,
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

/// Single-pass lexer over the source bytes with 1-based line/column
/// tracking. CR, LF and CRLF all advance the line counter exactly once.
///
/// The default mode tokenizes operators, literals and identifiers; the
/// parser switches into the field-name submode via [`Lexer::next_field_name`]
/// right after consuming `[` in a field position.
pub(crate) struct Lexer<'a> {
    src: &'a [u8],
    i: usize,
    line: u32,
    col: u32,
    enable_comments: bool,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(s: &'a str, enable_comments: bool) -> Self {
        Self {
            src: s.as_bytes(),
            i: 0,
            line: 1,
            col: 1,
            enable_comments,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.i + 1).copied()
    }

    /// Advances one byte, maintaining the line/column counters. A CRLF
    /// pair advances the line once, on the CR.
    fn bump(&mut self) -> Option<u8> {
        let ch = self.src.get(self.i).copied();
        match ch {
            Some(b'\r') => {
                self.i += 1;
                if self.peek() == Some(b'\n') {
                    self.i += 1;
                }
                self.line += 1;
                self.col = 1;
            }
            Some(b'\n') => {
                self.i += 1;
                self.line += 1;
                self.col = 1;
            }
            Some(_) => {
                self.i += 1;
                self.col += 1;
            }
            None => {}
        }
        ch
    }

    fn at_newline(&self) -> bool {
        matches!(self.peek(), Some(b'\r') | Some(b'\n'))
    }

    /// Skips whitespace (except newlines) and, when enabled, comments.
    fn skip_trivia(&mut self) -> Result<(), ScriptError> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() && !matches!(c, b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.enable_comments && self.peek2() == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if matches!(c, b'\r' | b'\n') {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.enable_comments && self.peek2() == Some(b'*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ScriptError::new(
                                    ErrorKind::UnexpectedEndOfFile,
                                    "unterminated block comment",
                                    line,
                                    col,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    pub(crate) fn next_token(&mut self) -> Result<Token, ScriptError> {
        self.skip_trivia()?;
        let (line, col) = (self.line, self.col);
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, "", line, col)),
        };
        if matches!(c, b'\r' | b'\n') {
            self.bump();
            return Ok(Token::new(TokenKind::NewLine, "\n", line, col));
        }
        match c {
            b'(' => Ok(self.single(TokenKind::LParen, line, col)),
            b')' => Ok(self.single(TokenKind::RParen, line, col)),
            b'{' => Ok(self.single(TokenKind::LBrace, line, col)),
            b'}' => Ok(self.single(TokenKind::RBrace, line, col)),
            b'[' => Ok(self.single(TokenKind::LBracket, line, col)),
            b']' => Ok(self.single(TokenKind::RBracket, line, col)),
            b',' => Ok(self.single(TokenKind::Comma, line, col)),
            b':' => Ok(self.single(TokenKind::Colon, line, col)),
            b'+' => Ok(self.single(TokenKind::Plus, line, col)),
            b'-' => Ok(self.single(TokenKind::Minus, line, col)),
            b'*' => Ok(self.single(TokenKind::Star, line, col)),
            b'/' => Ok(self.single(TokenKind::Slash, line, col)),
            b'%' => Ok(self.single(TokenKind::Percent, line, col)),
            b'=' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Ok(Token::new(TokenKind::EqEq, "==", line, col))
                } else {
                    Err(ScriptError::new(
                        ErrorKind::UnexpectedToken,
                        "expected '=' after '=' for '=='",
                        line,
                        col,
                    ))
                }
            }
            b'!' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Ok(Token::new(TokenKind::NotEq, "!=", line, col))
                } else {
                    Ok(Token::new(TokenKind::Bang, "!", line, col))
                }
            }
            b'<' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Ok(Token::new(TokenKind::Le, "<=", line, col))
                } else {
                    Ok(Token::new(TokenKind::Lt, "<", line, col))
                }
            }
            b'>' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    Ok(Token::new(TokenKind::Ge, ">=", line, col))
                } else {
                    Ok(Token::new(TokenKind::Gt, ">", line, col))
                }
            }
            b'&' => {
                self.bump();
                if self.peek() == Some(b'&') {
                    self.bump();
                    Ok(Token::new(TokenKind::AndAnd, "&&", line, col))
                } else {
                    Err(ScriptError::new(
                        ErrorKind::UnexpectedToken,
                        "expected '&' after '&' for '&&'",
                        line,
                        col,
                    ))
                }
            }
            b'|' => {
                self.bump();
                if self.peek() == Some(b'|') {
                    self.bump();
                    Ok(Token::new(TokenKind::OrOr, "||", line, col))
                } else {
                    Err(ScriptError::new(
                        ErrorKind::UnexpectedToken,
                        "expected '|' after '|' for '||'",
                        line,
                        col,
                    ))
                }
            }
            b'\'' => self.lex_string(line, col),
            c if c.is_ascii_digit() || c == b'.' => self.lex_number(line, col),
            c if c.is_ascii_alphabetic() || c == b'_' => self.lex_ident(line, col),
            other => Err(ScriptError::new(
                ErrorKind::UnexpectedToken,
                format!("unexpected character '{}'", other as char),
                line,
                col,
            )),
        }
    }

    /// Field-name submode, entered by the parser right after `[`.
    ///
    /// Emits one identifier token whose text is the raw character run up
    /// to (excluding) `]` or `:`, trimmed of surrounding whitespace.
    /// Internal spaces and punctuation are allowed; newlines are not.
    pub(crate) fn next_field_name(&mut self) -> Result<Token, ScriptError> {
        let (line, col) = (self.line, self.col);
        let start = self.i;
        loop {
            match self.peek() {
                Some(b']') | Some(b':') => break,
                None => {
                    return Err(ScriptError::new(
                        ErrorKind::UnexpectedEndOfFile,
                        "unterminated field name",
                        line,
                        col,
                    ));
                }
                Some(_) if self.at_newline() => {
                    return Err(ScriptError::new(
                        ErrorKind::InvalidFieldName,
                        "field name must not span lines",
                        line,
                        col,
                    ));
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let raw = std::str::from_utf8(&self.src[start..self.i]).unwrap();
        Ok(Token::new(TokenKind::Ident, raw.trim(), line, col))
    }

    fn single(&mut self, kind: TokenKind, line: u32, col: u32) -> Token {
        let c = self.bump().unwrap_or(0) as char;
        Token::new(kind, c.to_string(), line, col)
    }

    /// `[0-9]+(.[0-9]+)?` or a leading dot followed by digits. The token
    /// carries the raw text; the parser converts it to a decimal.
    fn lex_number(&mut self, line: u32, col: u32) -> Result<Token, ScriptError> {
        let start = self.i;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == b'.' && !seen_dot {
                seen_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        let s = std::str::from_utf8(&self.src[start..self.i]).unwrap();
        if !s.bytes().any(|b| b.is_ascii_digit()) {
            return Err(ScriptError::new(
                ErrorKind::InvalidNumber,
                format!("invalid number '{}'", s),
                line,
                col,
            ));
        }
        Ok(Token::new(TokenKind::Number, s, line, col))
    }

    fn lex_ident(&mut self, line: u32, col: u32) -> Result<Token, ScriptError> {
        let start = self.i;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let s = std::str::from_utf8(&self.src[start..self.i]).unwrap();
        if s.is_empty() {
            return Err(ScriptError::new(
                ErrorKind::InvalidIdentifier,
                "empty identifier",
                line,
                col,
            ));
        }
        Ok(Token::new(TokenKind::Ident, s, line, col))
    }

    /// Single-quoted string literal. `\'`, `\n`, `\r`, `\t` and `\\`
    /// decode to their canonical characters; any other escape passes
    /// through as backslash plus character, so regex literals like `\d`
    /// survive intact.
    fn lex_string(&mut self, line: u32, col: u32) -> Result<Token, ScriptError> {
        self.bump(); // opening quote
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ScriptError::new(
                        ErrorKind::UnterminatedString,
                        "unterminated string literal",
                        line,
                        col,
                    ));
                }
                Some(b'\'') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        Some(b'\'') => {
                            buf.push(b'\'');
                            self.bump();
                        }
                        Some(b'n') => {
                            buf.push(b'\n');
                            self.bump();
                        }
                        Some(b'r') => {
                            buf.push(b'\r');
                            self.bump();
                        }
                        Some(b't') => {
                            buf.push(b'\t');
                            self.bump();
                        }
                        Some(b'\\') => {
                            buf.push(b'\\');
                            self.bump();
                        }
                        Some(other) => {
                            buf.push(b'\\');
                            buf.push(other);
                            self.bump();
                        }
                        None => {
                            return Err(ScriptError::new(
                                ErrorKind::UnterminatedString,
                                "unterminated string literal",
                                line,
                                col,
                            ));
                        }
                    }
                }
                Some(c) => {
                    buf.push(c);
                    if c == b'\r' && self.peek2() == Some(b'\n') {
                        buf.push(b'\n');
                    }
                    self.bump();
                }
            }
        }
        let s = String::from_utf8(buf).unwrap();
        Ok(Token::new(TokenKind::Str, s, line, col))
    }
}
