//! Hand-rolled lexer for the agent-script subset.
//!
//! Produces a flat `Vec<Token>` up front rather than streaming — the parser
//! is simple enough (no preprocessor, no line continuations worth caring
//! about) that a look-ahead buffer over an owned vector is the least
//! surprising shape.

use crate::error::ParseError;
use crate::token::{keyword_str, Token, TokenKind};
use crate::tree::Span;

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

/// Punctuators, longest-match-first so e.g. `===` wins over `==` wins over `=`.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ".", ";", ",", "<", ">", "+", "-", "*", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", "/",
];

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().collect(), pos: 0, tokens: Vec::new() }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            let newline = self.skip_trivia();
            let start = self.byte_offset();
            let Some((_, ch)) = self.peek() else {
                self.tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(start as u32, start as u32),
                    preceded_by_newline: newline,
                });
                break;
            };

            let kind = if ch == '"' || ch == '\'' {
                self.read_string(ch)?
            } else if ch == '`' {
                self.read_template()?
            } else if ch.is_ascii_digit() || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
                self.read_number()?
            } else if is_ident_start(ch) {
                self.read_identifier()
            } else if ch == '/' && self.regex_allowed() {
                self.read_regex()?
            } else {
                self.read_punctuator(start)?
            };

            let end = self.byte_offset();
            self.tokens.push(Token { kind, span: Span::new(start as u32, end as u32), preceded_by_newline: newline });
        }
        Ok(self.tokens)
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Identifier(_) | TokenKind::Number(_) | TokenKind::String(_) | TokenKind::BigInt(_)) => false,
            Some(TokenKind::Keyword(k)) => !matches!(*k, "this"),
            Some(TokenKind::Punct(p)) => !matches!(*p, ")" | "]"),
            _ => true,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn byte_offset(&self) -> usize {
        self.chars.get(self.pos).map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) -> bool {
        let mut saw_newline = false;
        loop {
            match self.peek() {
                Some((_, c)) if c == '\n' => {
                    saw_newline = true;
                    self.advance();
                }
                Some((_, c)) if c.is_whitespace() => {
                    self.advance();
                }
                Some((_, '/')) if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some((_, '\n'))) {
                        self.advance();
                    }
                }
                Some((_, '/')) if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => break,
                            Some((_, '*')) if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some((_, '\n')) => {
                                saw_newline = true;
                                self.advance();
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        saw_newline
    }

    fn current_location(&self) -> (u32, u32) {
        crate::offset_to_line_col(self.src, self.byte_offset() as u32)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.current_location();
        ParseError { message: message.into(), line, column, offset: self.byte_offset() as u32 }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(|(_, c)| is_ident_continue(c)) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        match keyword_str(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(text),
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        if self.peek() == Some((self.byte_offset(), '0'))
            && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'))
        {
            self.advance();
            self.advance();
            while self.peek().is_some_and(|(_, c)| c.is_ascii_alphanumeric()) {
                self.advance();
            }
        } else {
            while self.peek().is_some_and(|(_, c)| c.is_ascii_digit() || c == '_') {
                self.advance();
            }
            if self.peek().is_some_and(|(_, c)| c == '.') {
                self.advance();
                while self.peek().is_some_and(|(_, c)| c.is_ascii_digit() || c == '_') {
                    self.advance();
                }
            }
            if self.peek().is_some_and(|(_, c)| c == 'e' || c == 'E') {
                self.advance();
                if self.peek().is_some_and(|(_, c)| c == '+' || c == '-') {
                    self.advance();
                }
                while self.peek().is_some_and(|(_, c)| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let raw: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        if self.peek().is_some_and(|(_, c)| c == 'n') {
            self.advance();
            return Ok(TokenKind::BigInt(raw));
        }
        let cleaned = raw.replace('_', "");
        let value = parse_numeric_literal(&cleaned).ok_or_else(|| self.err(format!("invalid numeric literal `{raw}`")))?;
        Ok(TokenKind::Number(value))
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => out.push(self.read_escape()?),
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::String(out))
    }

    fn read_escape(&mut self) -> Result<char, ParseError> {
        match self.advance() {
            None => Err(self.err("unterminated escape sequence")),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('v') => Ok('\u{b}'),
            Some(other) => Ok(other),
        }
    }

    /// Templates are lexed whole (no nested-expression re-entry into the
    /// token stream); the parser re-parses each `${...}` segment as a
    /// standalone expression via [`crate::parser::Parser::parse_expression_str`].
    fn read_template(&mut self) -> Result<TokenKind, ParseError> {
        self.advance();
        let mut quasis = vec![String::new()];
        let mut raw_exprs = Vec::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated template literal")),
                Some('`') => break,
                Some('\\') => quasis.last_mut().unwrap().push(self.read_escape()?),
                Some('$') if self.peek().is_some_and(|(_, c)| c == '{') => {
                    self.advance();
                    let mut depth = 1usize;
                    let mut expr = String::new();
                    loop {
                        match self.advance() {
                            None => return Err(self.err("unterminated template expression")),
                            Some('{') => {
                                depth += 1;
                                expr.push('{');
                            }
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                expr.push('}');
                            }
                            Some(c) => expr.push(c),
                        }
                    }
                    raw_exprs.push(expr);
                    quasis.push(String::new());
                }
                Some(c) => quasis.last_mut().unwrap().push(c),
            }
        }
        Ok(TokenKind::TemplateString { quasis, raw_exprs })
    }

    fn read_regex(&mut self) -> Result<TokenKind, ParseError> {
        self.advance();
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated regex literal")),
                Some('\\') => {
                    pattern.push('\\');
                    match self.advance() {
                        None => return Err(self.err("unterminated regex escape")),
                        Some(c) => pattern.push(c),
                    }
                }
                Some('[') => {
                    in_class = true;
                    pattern.push('[');
                }
                Some(']') => {
                    in_class = false;
                    pattern.push(']');
                }
                Some('/') if !in_class => break,
                Some(c) => pattern.push(c),
            }
        }
        let mut flags = String::new();
        while self.peek().is_some_and(|(_, c)| c.is_ascii_alphabetic()) {
            flags.push(self.advance().unwrap());
        }
        Ok(TokenKind::Regex { pattern, flags })
    }

    fn read_punctuator(&mut self, start_byte: usize) -> Result<TokenKind, ParseError> {
        let remaining = &self.src[start_byte..];
        for candidate in PUNCTUATORS {
            if remaining.starts_with(candidate) {
                for _ in 0..candidate.chars().count() {
                    self.advance();
                }
                return Ok(TokenKind::Punct(candidate));
            }
        }
        Err(self.err(format!("unexpected character `{}`", remaining.chars().next().unwrap_or('?'))))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn parse_numeric_literal(raw: &str) -> Option<f64> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    if let Some(oct) = raw.strip_prefix("0o").or_else(|| raw.strip_prefix("0O")) {
        return u64::from_str_radix(oct, 8).ok().map(|v| v as f64);
    }
    if let Some(bin) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2).ok().map(|v| v as f64);
    }
    raw.parse::<f64>().ok()
}
