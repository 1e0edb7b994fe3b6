//! Recursive-descent parser over the token stream from [`crate::lexer`].
//!
//! Builds nodes directly into a [`Tree`] arena rather than an intermediate
//! tree of boxed structs — every `parse_*` method returns a [`NodeId`], not
//! an owned node, so there is never a point where a subtree exists outside
//! the arena.
//!
//! Deliberately does not support `class`, `switch`, generators, or labeled
//! statements: none of them are reachable once the guard runs, and leaving
//! them unparsed keeps this file's job single-purpose (turn source text
//! into a tree, nothing more).

use crate::error::ParseError;
use crate::token::{Token, TokenKind};
use crate::tree::{
    CatchClause, NodeId, NodeKind, ObjectPatternProperty, ObjectProperty, Span, Tree, VarKind,
    VariableDeclarator,
};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    tree: Tree,
    source: &'a str,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, tree: Tree::new(), source }
    }

    pub fn parse_program(mut self) -> PResult<Tree> {
        let start = 0u32;
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }
        let end = self.source.len() as u32;
        let root = self.tree.push(NodeKind::Program { body }, Span::new(start, end));
        self.tree.set_root(root);
        Ok(self.tree)
    }

    // ---- token helpers ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Punct(q) if *q == p)
    }

    fn at_keyword(&self, k: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Keyword(q) if *q == k)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: &str) -> bool {
        if self.at_keyword(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.err(format!("expected `{p}`")))
        }
    }

    fn expect_keyword(&mut self, k: &str) -> PResult<()> {
        if self.eat_keyword(k) {
            Ok(())
        } else {
            Err(self.err(format!("expected `{k}`")))
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.err("expected an identifier")),
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let span = self.current().span;
        let (line, column) = crate::offset_to_line_col(self.source, span.start);
        ParseError { message: message.into(), line, column, offset: span.start }
    }

    /// Swallows a statement-terminating `;` if present; the parser does not
    /// implement automatic-semicolon-insertion rules, it just tolerates
    /// their absence.
    fn eat_semicolon(&mut self) {
        self.eat_punct(";");
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end)
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        if self.at_punct("{") {
            return self.parse_block();
        }
        if self.eat_punct(";") {
            return Ok(self.tree.push(NodeKind::EmptyStatement, self.span_from(start)));
        }
        if self.at_keyword("var") || self.at_keyword("let") || self.at_keyword("const") {
            let decl = self.parse_variable_declaration()?;
            self.eat_semicolon();
            return Ok(decl);
        }
        if self.at_keyword("function") {
            return self.parse_function_declaration(false);
        }
        if self.at_keyword("async") && matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Keyword("function"))) {
            self.bump();
            return self.parse_function_declaration(true);
        }
        if self.eat_keyword("return") {
            let argument = if self.at_punct(";") || self.at_punct("}") || self.is_eof() {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.eat_semicolon();
            return Ok(self.tree.push(NodeKind::ReturnStatement { argument }, self.span_from(start)));
        }
        if self.eat_keyword("if") {
            return self.parse_if(start);
        }
        if self.at_keyword("for") {
            return self.parse_for();
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            let test = self.parse_expression()?;
            self.expect_punct(")")?;
            let body = self.parse_statement()?;
            return Ok(self.tree.push(NodeKind::WhileStatement { test, body }, self.span_from(start)));
        }
        if self.eat_keyword("do") {
            let body = self.parse_statement()?;
            self.expect_keyword("while")?;
            self.expect_punct("(")?;
            let test = self.parse_expression()?;
            self.expect_punct(")")?;
            self.eat_semicolon();
            return Ok(self.tree.push(NodeKind::DoWhileStatement { body, test }, self.span_from(start)));
        }
        if self.eat_keyword("break") {
            self.eat_semicolon();
            return Ok(self.tree.push(NodeKind::BreakStatement, self.span_from(start)));
        }
        if self.eat_keyword("continue") {
            self.eat_semicolon();
            return Ok(self.tree.push(NodeKind::ContinueStatement, self.span_from(start)));
        }
        if self.eat_keyword("throw") {
            let argument = self.parse_expression()?;
            self.eat_semicolon();
            return Ok(self.tree.push(NodeKind::ThrowStatement { argument }, self.span_from(start)));
        }
        if self.eat_keyword("try") {
            return self.parse_try(start);
        }
        let expr = self.parse_expression()?;
        self.eat_semicolon();
        Ok(self.tree.push(NodeKind::ExpressionStatement { expr }, self.span_from(start)))
    }

    fn parse_block(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") && !self.is_eof() {
            body.push(self.parse_statement()?);
        }
        self.expect_punct("}")?;
        Ok(self.tree.push(NodeKind::BlockStatement { body }, self.span_from(start)))
    }

    fn parse_variable_declaration(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let kind = if self.eat_keyword("var") {
            VarKind::Var
        } else if self.eat_keyword("let") {
            VarKind::Let
        } else {
            self.expect_keyword("const")?;
            VarKind::Const
        };
        let mut declarations = Vec::new();
        loop {
            let id = self.parse_binding_target()?;
            let init = if self.eat_punct("=") { Some(self.parse_assignment_expression()?) } else { None };
            declarations.push(VariableDeclarator { id, init });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(self.tree.push(NodeKind::VariableDeclaration { kind, declarations }, self.span_from(start)))
    }

    /// A binding target: identifier or destructuring pattern, optionally
    /// defaulted. Shared by `var`/`let`/`const`, function params, and
    /// `for`-loop left-hand sides.
    fn parse_binding_target(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let base = if self.at_punct("[") {
            self.parse_array_pattern()?
        } else if self.at_punct("{") {
            self.parse_object_pattern()?
        } else if self.at_punct("...") {
            self.bump();
            let argument = self.parse_binding_target()?;
            self.tree.push(NodeKind::RestElement { argument }, self.span_from(start))
        } else {
            let name = self.expect_identifier()?;
            self.tree.push(NodeKind::Identifier { name }, self.span_from(start))
        };
        if self.eat_punct("=") {
            let right = self.parse_assignment_expression()?;
            Ok(self.tree.push(NodeKind::AssignmentPattern { left: base, right }, self.span_from(start)))
        } else {
            Ok(base)
        }
    }

    fn parse_array_pattern(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.at_punct("]") {
            if self.eat_punct(",") {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_binding_target()?));
            if !self.at_punct("]") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("]")?;
        Ok(self.tree.push(NodeKind::ArrayPattern { elements }, self.span_from(start)))
    }

    fn parse_object_pattern(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.at_punct("}") {
            if self.eat_punct("...") {
                rest = Some(self.parse_binding_target()?);
                break;
            }
            let computed = self.at_punct("[");
            let key = if computed {
                self.bump();
                let k = self.parse_assignment_expression()?;
                self.expect_punct("]")?;
                k
            } else {
                let key_start = self.current().span.start;
                let name = self.expect_identifier()?;
                self.tree.push(NodeKind::Identifier { name }, self.span_from(key_start))
            };
            let value = if self.eat_punct(":") {
                self.parse_binding_target()?
            } else if self.eat_punct("=") {
                let right = self.parse_assignment_expression()?;
                self.tree.push(NodeKind::AssignmentPattern { left: key, right }, self.tree.span(key))
            } else {
                key
            };
            properties.push(ObjectPatternProperty { key, value, computed });
            if !self.at_punct("}") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("}")?;
        Ok(self.tree.push(NodeKind::ObjectPattern { properties, rest }, self.span_from(start)))
    }

    fn parse_function_declaration(&mut self, is_async: bool) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_keyword("function")?;
        let name = Some(self.expect_identifier()?);
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(self
            .tree
            .push(NodeKind::FunctionDeclaration { name, params, body, is_async }, self.span_from(start)))
    }

    fn parse_param_list(&mut self) -> PResult<Vec<NodeId>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            params.push(self.parse_binding_target()?);
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_if(&mut self, start: u32) -> PResult<NodeId> {
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat_keyword("else") { Some(self.parse_statement()?) } else { None };
        Ok(self.tree.push(NodeKind::IfStatement { test, consequent, alternate }, self.span_from(start)))
    }

    fn parse_for(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_keyword("for")?;
        self.expect_punct("(")?;

        if self.at_keyword("var") || self.at_keyword("let") || self.at_keyword("const") {
            let decl_start = self.current().span.start;
            let kind = if self.eat_keyword("var") {
                VarKind::Var
            } else if self.eat_keyword("let") {
                VarKind::Let
            } else {
                self.expect_keyword("const")?;
                VarKind::Const
            };
            let binding = self.parse_binding_target()?;
            if self.eat_keyword("of") {
                let left = self.tree.push(
                    NodeKind::VariableDeclaration { kind, declarations: vec![VariableDeclarator { id: binding, init: None }] },
                    self.span_from(decl_start),
                );
                let right = self.parse_assignment_expression()?;
                self.expect_punct(")")?;
                let body = self.parse_statement()?;
                return Ok(self
                    .tree
                    .push(NodeKind::ForOfStatement { left, right, body, is_await: false }, self.span_from(start)));
            }
            if self.eat_keyword("in") {
                let left = self.tree.push(
                    NodeKind::VariableDeclaration { kind, declarations: vec![VariableDeclarator { id: binding, init: None }] },
                    self.span_from(decl_start),
                );
                let right = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = self.parse_statement()?;
                return Ok(self.tree.push(NodeKind::ForInStatement { left, right, body }, self.span_from(start)));
            }
            let init_val = if self.eat_punct("=") { Some(self.parse_assignment_expression()?) } else { None };
            let mut declarations = vec![VariableDeclarator { id: binding, init: init_val }];
            while self.eat_punct(",") {
                let id = self.parse_binding_target()?;
                let init = if self.eat_punct("=") { Some(self.parse_assignment_expression()?) } else { None };
                declarations.push(VariableDeclarator { id, init });
            }
            let init = self.tree.push(NodeKind::VariableDeclaration { kind, declarations }, self.span_from(decl_start));
            return self.parse_classic_for_tail(start, Some(init));
        }

        if self.at_punct(";") {
            return self.parse_classic_for_tail(start, None);
        }

        let expr_start = self.current().span.start;
        let expr = self.parse_expression()?;
        if self.eat_keyword("of") {
            let right = self.parse_assignment_expression()?;
            self.expect_punct(")")?;
            let body = self.parse_statement()?;
            return Ok(self
                .tree
                .push(NodeKind::ForOfStatement { left: expr, right, body, is_await: false }, self.span_from(start)));
        }
        if self.eat_keyword("in") {
            let right = self.parse_expression()?;
            self.expect_punct(")")?;
            let body = self.parse_statement()?;
            return Ok(self.tree.push(NodeKind::ForInStatement { left: expr, right, body }, self.span_from(start)));
        }
        let init = self
            .tree
            .push(NodeKind::ExpressionStatement { expr }, self.span_from(expr_start));
        self.parse_classic_for_tail(start, Some(init))
    }

    fn parse_classic_for_tail(&mut self, start: u32, init: Option<NodeId>) -> PResult<NodeId> {
        self.expect_punct(";")?;
        let test = if self.at_punct(";") { None } else { Some(self.parse_expression()?) };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") { None } else { Some(self.parse_expression()?) };
        self.expect_punct(")")?;
        let body = self.parse_statement()?;
        Ok(self.tree.push(NodeKind::ForStatement { init, test, update, body }, self.span_from(start)))
    }

    fn parse_try(&mut self, start: u32) -> PResult<NodeId> {
        let block = self.parse_block()?;
        let handler = if self.eat_keyword("catch") {
            let param = if self.eat_punct("(") {
                let p = self.parse_binding_target()?;
                self.expect_punct(")")?;
                Some(p)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_keyword("finally") { Some(self.parse_block()?) } else { None };
        Ok(self.tree.push(NodeKind::TryStatement { block, handler, finalizer }, self.span_from(start)))
    }

    // ---- expressions, precedence-climbing ----

    fn parse_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let mut expr = self.parse_assignment_expression()?;
        if self.at_punct(",") {
            let mut expressions = vec![expr];
            while self.eat_punct(",") {
                expressions.push(self.parse_assignment_expression()?);
            }
            expr = self.tree.push(NodeKind::SequenceExpression { expressions }, self.span_from(start));
        }
        Ok(expr)
    }

    fn parse_assignment_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        if self.is_arrow_function_ahead() {
            return self.parse_arrow_function(false);
        }
        if self.at_keyword("async") && self.is_async_arrow_ahead() {
            self.bump();
            return self.parse_arrow_function(true);
        }
        let left = self.parse_conditional_expression()?;
        const ASSIGN_OPS: &[&str] =
            &["=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=", "||=", "??="];
        for op in ASSIGN_OPS {
            if self.at_punct(op) {
                self.bump();
                let right = self.parse_assignment_expression()?;
                return Ok(self
                    .tree
                    .push(NodeKind::AssignmentExpression { operator: op, left, right }, self.span_from(start)));
            }
        }
        Ok(left)
    }

    fn is_arrow_function_ahead(&self) -> bool {
        match &self.current().kind {
            TokenKind::Identifier(_) => {
                matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Punct("=>")))
            }
            TokenKind::Punct("(") => self.scan_matches_arrow_after_parens(self.pos),
            _ => false,
        }
    }

    fn is_async_arrow_ahead(&self) -> bool {
        match self.tokens.get(self.pos + 1).map(|t| &t.kind) {
            Some(TokenKind::Identifier(_)) => {
                matches!(self.tokens.get(self.pos + 2).map(|t| &t.kind), Some(TokenKind::Punct("=>")))
            }
            Some(TokenKind::Punct("(")) => self.scan_matches_arrow_after_parens(self.pos + 1),
            _ => false,
        }
    }

    /// Looks ahead from a `(` token to see whether its matching `)` is
    /// followed by `=>`, without consuming anything. Arrow-function
    /// parameter lists are the only place this grammar needs unbounded
    /// look-ahead.
    fn scan_matches_arrow_after_parens(&self, open_paren_pos: usize) -> bool {
        let mut depth = 0i32;
        let mut i = open_paren_pos;
        loop {
            match self.tokens.get(i).map(|t| &t.kind) {
                None => return false,
                Some(TokenKind::Punct("(")) => depth += 1,
                Some(TokenKind::Punct(")")) => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(self.tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::Punct("=>")));
                    }
                }
                Some(TokenKind::Eof) => return false,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_arrow_function(&mut self, is_async: bool) -> PResult<NodeId> {
        let start = self.current().span.start;
        let params = if self.at_punct("(") {
            self.parse_param_list()?
        } else {
            let name = self.expect_identifier()?;
            let id = self.tree.push(NodeKind::Identifier { name }, self.span_from(start));
            vec![id]
        };
        self.expect_punct("=>")?;
        let (body, expression_body) = if self.at_punct("{") {
            (self.parse_block()?, false)
        } else {
            (self.parse_assignment_expression()?, true)
        };
        Ok(self.tree.push(
            NodeKind::ArrowFunctionExpression { params, body, is_async, expression_body },
            self.span_from(start),
        ))
    }

    fn parse_conditional_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let test = self.parse_binary_expression(0)?;
        if self.eat_punct("?") {
            let consequent = self.parse_assignment_expression()?;
            self.expect_punct(":")?;
            let alternate = self.parse_assignment_expression()?;
            return Ok(self
                .tree
                .push(NodeKind::ConditionalExpression { test, consequent, alternate }, self.span_from(start)));
        }
        Ok(test)
    }

    /// Binary/logical operator precedence table, lowest binding first.
    /// `??` deliberately does not mix with `||`/`&&` at the same level in
    /// real JS (they require parens); this parser doesn't enforce that and
    /// just treats `??` as level 1 — permissive is fine here since the
    /// guard, not the parser, is the security boundary.
    const PRECEDENCE: &'static [&'static [&'static str]] = &[
        &["??"],
        &["||"],
        &["&&"],
        &["|"],
        &["^"],
        &["&"],
        &["==", "!=", "===", "!=="],
        &["<", ">", "<=", ">=", "instanceof", "in"],
        &["<<", ">>", ">>>"],
        &["+", "-"],
        &["*", "/", "%"],
    ];

    fn parse_binary_expression(&mut self, level: usize) -> PResult<NodeId> {
        if level >= Self::PRECEDENCE.len() {
            return self.parse_exponent_expression();
        }
        let start = self.current().span.start;
        let mut left = self.parse_binary_expression(level + 1)?;
        loop {
            let op = self.match_operator_at_level(level);
            let Some(op) = op else { break };
            self.bump_operator(op);
            let right = self.parse_binary_expression(level + 1)?;
            let is_logical = op == "&&" || op == "||" || op == "??";
            left = self.tree.push(
                if is_logical {
                    NodeKind::LogicalExpression { operator: op, left, right }
                } else {
                    NodeKind::BinaryExpression { operator: op, left, right }
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn match_operator_at_level(&self, level: usize) -> Option<&'static str> {
        let ops = Self::PRECEDENCE[level];
        for op in ops {
            let matches = match *op {
                "instanceof" => self.at_keyword("instanceof"),
                "in" => self.at_keyword("in"),
                _ => self.at_punct(op),
            };
            if matches {
                return Some(op);
            }
        }
        None
    }

    fn bump_operator(&mut self, _op: &str) {
        self.bump();
    }

    fn parse_exponent_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let left = self.parse_unary_expression()?;
        if self.eat_punct("**") {
            let right = self.parse_exponent_expression()?;
            return Ok(self
                .tree
                .push(NodeKind::BinaryExpression { operator: "**", left, right }, self.span_from(start)));
        }
        Ok(left)
    }

    const UNARY_OPS: &'static [&'static str] = &["!", "~", "+", "-"];

    fn parse_unary_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        for op in Self::UNARY_OPS {
            if self.at_punct(op) {
                self.bump();
                let argument = self.parse_unary_expression()?;
                return Ok(self.tree.push(NodeKind::UnaryExpression { operator: op, argument }, self.span_from(start)));
            }
        }
        for kw in ["typeof", "void", "delete"] {
            if self.at_keyword(kw) {
                self.bump();
                let argument = self.parse_unary_expression()?;
                let operator: &'static str = match kw {
                    "typeof" => "typeof",
                    "void" => "void",
                    _ => "delete",
                };
                return Ok(self.tree.push(NodeKind::UnaryExpression { operator, argument }, self.span_from(start)));
            }
        }
        if self.at_keyword("await") {
            self.bump();
            let argument = self.parse_unary_expression()?;
            return Ok(self.tree.push(NodeKind::AwaitExpression { argument }, self.span_from(start)));
        }
        if self.at_punct("++") || self.at_punct("--") {
            let op = if self.eat_punct("++") { "++" } else {
                self.bump();
                "--"
            };
            let argument = self.parse_unary_expression()?;
            return Ok(self
                .tree
                .push(NodeKind::UpdateExpression { operator: op, argument, prefix: true }, self.span_from(start)));
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let argument = self.parse_call_expression()?;
        if !self.current().preceded_by_newline && (self.at_punct("++") || self.at_punct("--")) {
            let op = if self.eat_punct("++") { "++" } else {
                self.bump();
                "--"
            };
            return Ok(self
                .tree
                .push(NodeKind::UpdateExpression { operator: op, argument, prefix: false }, self.span_from(start)));
        }
        Ok(argument)
    }

    fn parse_call_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        let mut expr = if self.eat_keyword("new") {
            let callee = self.parse_call_expression_no_call(start)?;
            let arguments = if self.at_punct("(") { self.parse_arguments()? } else { Vec::new() };
            self.tree.push(NodeKind::NewExpression { callee, arguments }, self.span_from(start))
        } else {
            self.parse_primary_expression()?
        };
        loop {
            if self.eat_punct(".") {
                let property = self.expect_identifier()?;
                expr = self.tree.push(NodeKind::StaticMemberExpression { object: expr, property }, self.span_from(start));
            } else if self.eat_punct("?.") {
                if self.at_punct("(") {
                    let arguments = self.parse_arguments()?;
                    expr = self.tree.push(NodeKind::CallExpression { callee: expr, arguments }, self.span_from(start));
                } else {
                    let property = self.expect_identifier()?;
                    expr = self
                        .tree
                        .push(NodeKind::StaticMemberExpression { object: expr, property }, self.span_from(start));
                }
            } else if self.eat_punct("[") {
                let property = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = self
                    .tree
                    .push(NodeKind::ComputedMemberExpression { object: expr, property }, self.span_from(start));
            } else if self.at_punct("(") {
                let arguments = self.parse_arguments()?;
                expr = self.tree.push(NodeKind::CallExpression { callee: expr, arguments }, self.span_from(start));
            } else if matches!(self.current().kind, TokenKind::TemplateString { .. }) {
                let quasi = self.parse_primary_expression()?;
                expr = self.tree.push(NodeKind::TaggedTemplateExpression { tag: expr, quasi }, self.span_from(start));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// `new Foo.Bar(...)`: the callee of `new` binds tighter than a call
    /// but still allows member access — parsed without consuming a `(...)`
    /// argument list, which the caller attaches afterward.
    fn parse_call_expression_no_call(&mut self, start: u32) -> PResult<NodeId> {
        let mut expr = if self.eat_keyword("new") {
            let callee = self.parse_call_expression_no_call(start)?;
            let arguments = if self.at_punct("(") { self.parse_arguments()? } else { Vec::new() };
            self.tree.push(NodeKind::NewExpression { callee, arguments }, self.span_from(start))
        } else {
            self.parse_primary_expression()?
        };
        loop {
            if self.eat_punct(".") {
                let property = self.expect_identifier()?;
                expr = self.tree.push(NodeKind::StaticMemberExpression { object: expr, property }, self.span_from(start));
            } else if self.eat_punct("[") {
                let property = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = self
                    .tree
                    .push(NodeKind::ComputedMemberExpression { object: expr, property }, self.span_from(start));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> PResult<Vec<NodeId>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.at_punct(")") {
            if self.eat_punct("...") {
                let start = self.tokens[self.pos.saturating_sub(1)].span.start;
                let argument = self.parse_assignment_expression()?;
                args.push(self.tree.push(NodeKind::SpreadElement { argument }, self.span_from(start)));
            } else {
                args.push(self.parse_assignment_expression()?);
            }
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_primary_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        match self.current().kind.clone() {
            TokenKind::Number(value) => {
                self.bump();
                Ok(self.tree.push(NodeKind::NumericLiteral { value }, self.span_from(start)))
            }
            TokenKind::BigInt(raw) => {
                self.bump();
                Ok(self.tree.push(NodeKind::BigIntLiteral { raw }, self.span_from(start)))
            }
            TokenKind::String(value) => {
                self.bump();
                Ok(self.tree.push(NodeKind::StringLiteral { value }, self.span_from(start)))
            }
            TokenKind::Regex { pattern, flags } => {
                self.bump();
                Ok(self.tree.push(NodeKind::RegexLiteral { pattern, flags }, self.span_from(start)))
            }
            TokenKind::TemplateString { quasis, raw_exprs } => {
                self.bump();
                let mut expressions = Vec::with_capacity(raw_exprs.len());
                for raw in raw_exprs {
                    expressions.push(self.parse_sub_expression(&raw, start)?);
                }
                Ok(self.tree.push(NodeKind::TemplateLiteral { quasis, expressions }, self.span_from(start)))
            }
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(self.tree.push(NodeKind::Identifier { name }, self.span_from(start)))
            }
            TokenKind::Keyword("true") => {
                self.bump();
                Ok(self.tree.push(NodeKind::BooleanLiteral { value: true }, self.span_from(start)))
            }
            TokenKind::Keyword("false") => {
                self.bump();
                Ok(self.tree.push(NodeKind::BooleanLiteral { value: false }, self.span_from(start)))
            }
            TokenKind::Keyword("null") => {
                self.bump();
                Ok(self.tree.push(NodeKind::NullLiteral, self.span_from(start)))
            }
            TokenKind::Keyword("undefined") => {
                self.bump();
                Ok(self.tree.push(NodeKind::Identifier { name: "undefined".to_string() }, self.span_from(start)))
            }
            TokenKind::Keyword("this") => {
                self.bump();
                Ok(self.tree.push(NodeKind::ThisExpression, self.span_from(start)))
            }
            TokenKind::Keyword("function") => self.parse_function_expression(false),
            TokenKind::Keyword("async")
                if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Keyword("function"))) =>
            {
                self.bump();
                self.parse_function_expression(true)
            }
            TokenKind::Punct("(") => {
                self.bump();
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array_expression(),
            TokenKind::Punct("{") => self.parse_object_expression(),
            _ => Err(self.err(format!("unexpected token {:?}", self.current().kind))),
        }
    }

    fn parse_function_expression(&mut self, is_async: bool) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_keyword("function")?;
        let name = match self.current().kind.clone() {
            TokenKind::Identifier(n) => {
                self.bump();
                Some(n)
            }
            _ => None,
        };
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(self
            .tree
            .push(NodeKind::FunctionExpression { name, params, body, is_async }, self.span_from(start)))
    }

    fn parse_array_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.at_punct("]") {
            if self.at_punct(",") {
                self.bump();
                elements.push(None);
                continue;
            }
            if self.eat_punct("...") {
                let spread_start = self.tokens[self.pos.saturating_sub(1)].span.start;
                let argument = self.parse_assignment_expression()?;
                elements.push(Some(self.tree.push(NodeKind::SpreadElement { argument }, self.span_from(spread_start))));
            } else {
                elements.push(Some(self.parse_assignment_expression()?));
            }
            if !self.at_punct("]") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("]")?;
        Ok(self.tree.push(NodeKind::ArrayExpression { elements }, self.span_from(start)))
    }

    fn parse_object_expression(&mut self) -> PResult<NodeId> {
        let start = self.current().span.start;
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        let mut spreads = Vec::new();
        while !self.at_punct("}") {
            if self.eat_punct("...") {
                let spread_start = self.tokens[self.pos.saturating_sub(1)].span.start;
                let argument = self.parse_assignment_expression()?;
                spreads.push(self.tree.push(NodeKind::SpreadElement { argument }, self.span_from(spread_start)));
                if !self.at_punct("}") {
                    self.expect_punct(",")?;
                }
                continue;
            }
            let key_start = self.current().span.start;
            let computed = self.at_punct("[");
            let key = if computed {
                self.bump();
                let k = self.parse_assignment_expression()?;
                self.expect_punct("]")?;
                k
            } else {
                match self.current().kind.clone() {
                    TokenKind::String(value) => {
                        self.bump();
                        self.tree.push(NodeKind::StringLiteral { value }, self.span_from(key_start))
                    }
                    TokenKind::Number(value) => {
                        self.bump();
                        self.tree.push(NodeKind::NumericLiteral { value }, self.span_from(key_start))
                    }
                    _ => {
                        let name = self.expect_identifier()?;
                        self.tree.push(NodeKind::Identifier { name }, self.span_from(key_start))
                    }
                }
            };
            let (value, shorthand) = if self.eat_punct(":") {
                (self.parse_assignment_expression()?, false)
            } else if self.at_punct("(") {
                // method shorthand: `name(...) { ... }`
                let params = self.parse_param_list()?;
                let body = self.parse_block()?;
                let f = self.tree.push(
                    NodeKind::FunctionExpression { name: None, params, body, is_async: false },
                    self.span_from(key_start),
                );
                (f, false)
            } else {
                (key, true)
            };
            properties.push(ObjectProperty { key, value, computed, shorthand });
            if !self.at_punct("}") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("}")?;
        Ok(self.tree.push(NodeKind::ObjectExpression { properties, spreads }, self.span_from(start)))
    }

    /// Re-lexes and re-parses a `${...}` segment captured verbatim by the
    /// lexer. Each segment is parsed to a single expression; offsets are
    /// rebased onto `outer_start` so error locations still point somewhere
    /// sensible in the original source.
    fn parse_sub_expression(&mut self, raw: &str, outer_start: u32) -> PResult<NodeId> {
        let tokens = crate::lexer::Lexer::new(raw).tokenize().map_err(|mut e| {
            e.offset += outer_start;
            e
        })?;
        let sub_parser = Parser { tokens, pos: 0, tree: std::mem::replace(&mut self.tree, Tree::new()), source: raw };
        let (expr_id, tree) = sub_parser.parse_standalone_expression()?;
        self.tree = tree;
        Ok(expr_id)
    }

    fn parse_standalone_expression(mut self) -> PResult<(NodeId, Tree)> {
        let expr = self.parse_expression()?;
        Ok((expr, self.tree))
    }
}
