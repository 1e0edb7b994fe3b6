//! Prints a (possibly rewritten) [`Tree`] back to JavaScript source text.
//!
//! This is not a general-purpose pretty-printer: it only has to round-trip
//! the restricted grammar `ascript_ast` accepts, and it leans on
//! over-parenthesization rather than precedence tracking to stay correct.
//! Mechanically generated code does not need to look hand-written.

use ascript_ast::{NodeId, NodeKind, Tree};
use ascript_presets::Preset;

/// Global names the rewriter always renames regardless of preset, because
/// the runtime only ever installs the safe form.
const ALWAYS_RENAMED: &[&str] = &["callTool"];

pub struct Printer<'p> {
    preset: &'p Preset,
    loop_counter: u32,
}

impl<'p> Printer<'p> {
    pub fn new(preset: &'p Preset) -> Self {
        Self { preset, loop_counter: 0 }
    }

    /// Number of `for`/`for-in`/`while`/`do-while` loops instrumented so
    /// far. `for-of` loops aren't counted — `__safe_forOf` is their sole
    /// counter.
    pub fn loop_count(&self) -> u32 {
        self.loop_counter
    }

    /// Renames `name` the way the rewritten program must reference it:
    /// the safe-runtime bridge, an allow-listed builtin, or a
    /// `__safe_`-prefixed local.
    fn rename(&self, name: &str) -> String {
        if ALWAYS_RENAMED.contains(&name) {
            format!("__safe_{name}")
        } else if self.preset.is_global_allowed(name) {
            name.to_string()
        } else {
            format!("__safe_{name}")
        }
    }

    fn next_counter(&mut self) -> String {
        self.loop_counter += 1;
        format!("__iter_{}", self.loop_counter)
    }

    /// Entry point: wraps the program's top-level statements in
    /// `async function __ag_main() { ... }`, converting a trailing
    /// expression statement into a `return`.
    pub fn print_program(&mut self, tree: &Tree) -> String {
        let NodeKind::Program { body } = &tree.get(tree.root()).kind else {
            unreachable!("tree root is always a Program node")
        };
        let mut out = String::new();
        for (i, stmt) in body.iter().enumerate() {
            if i + 1 == body.len() {
                self.print_as_tail(tree, *stmt, &mut out);
            } else {
                self.print_statement(tree, *stmt, &mut out);
            }
        }
        let mut wrapped = String::from("async function __ag_main() {\n");
        wrapped.push_str(&out);
        wrapped.push_str("}\n");
        wrapped
    }

    fn print_as_tail(&mut self, tree: &Tree, id: NodeId, out: &mut String) {
        if let NodeKind::ExpressionStatement { expr } = &tree.get(id).kind {
            out.push_str("return ");
            self.print_expr(tree, *expr, out);
            out.push_str(";\n");
        } else {
            self.print_statement(tree, id, out);
        }
    }

    // ---- statements ----

    fn print_statement(&mut self, tree: &Tree, id: NodeId, out: &mut String) {
        match &tree.get(id).kind {
            NodeKind::ExpressionStatement { expr } => {
                let leads_with_brace = matches!(
                    tree.get(*expr).kind,
                    NodeKind::ObjectExpression { .. } | NodeKind::FunctionExpression { .. }
                );
                if leads_with_brace {
                    out.push('(');
                    self.print_expr(tree, *expr, out);
                    out.push(')');
                } else {
                    self.print_expr(tree, *expr, out);
                }
                out.push_str(";\n");
            }
            NodeKind::VariableDeclaration { kind, declarations } => {
                out.push_str(match kind {
                    ascript_ast::VarKind::Var => "var ",
                    ascript_ast::VarKind::Let => "let ",
                    ascript_ast::VarKind::Const => "const ",
                });
                for (i, decl) in declarations.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.print_expr(tree, decl.id, out);
                    if let Some(init) = decl.init {
                        out.push_str(" = ");
                        self.print_expr_wrapped(tree, init, out);
                    }
                }
                out.push_str(";\n");
            }
            NodeKind::ReturnStatement { argument } => {
                out.push_str("return");
                if let Some(a) = argument {
                    out.push(' ');
                    self.print_expr(tree, *a, out);
                }
                out.push_str(";\n");
            }
            NodeKind::IfStatement { test, consequent, alternate } => {
                out.push_str("if (");
                self.print_expr(tree, *test, out);
                out.push_str(") ");
                self.print_statement(tree, *consequent, out);
                if let Some(alt) = alternate {
                    out.push_str("else ");
                    self.print_statement(tree, *alt, out);
                }
            }
            NodeKind::BlockStatement { body } => {
                out.push_str("{\n");
                for stmt in body {
                    self.print_statement(tree, *stmt, out);
                }
                out.push_str("}\n");
            }
            NodeKind::ForStatement { init, test, update, body } => {
                let counter = self.next_counter();
                out.push_str(&format!("let {counter} = 0;\n"));
                out.push_str("for (");
                if let Some(init) = init {
                    self.print_for_head_clause(tree, *init, out);
                }
                out.push_str("; ");
                if let Some(test) = test {
                    self.print_expr(tree, *test, out);
                }
                out.push_str("; ");
                if let Some(update) = update {
                    self.print_for_head_clause(tree, *update, out);
                }
                out.push_str(") ");
                self.print_loop_body_with_check(tree, *body, &counter, out);
            }
            NodeKind::ForInStatement { left, right, body } => {
                let counter = self.next_counter();
                out.push_str(&format!("let {counter} = 0;\n"));
                out.push_str("for (");
                self.print_for_head_clause(tree, *left, out);
                out.push_str(" in ");
                self.print_expr(tree, *right, out);
                out.push_str(") ");
                self.print_loop_body_with_check(tree, *body, &counter, out);
            }
            NodeKind::ForOfStatement { left, right, body, is_await } => {
                out.push_str("for ");
                if *is_await {
                    out.push_str("await ");
                }
                out.push('(');
                self.print_for_head_clause(tree, *left, out);
                out.push_str(" of __safe_forOf(");
                self.print_expr(tree, *right, out);
                out.push_str(")) ");
                self.print_statement(tree, *body, out);
            }
            NodeKind::WhileStatement { test, body } => {
                let counter = self.next_counter();
                out.push_str(&format!("let {counter} = 0;\n"));
                out.push_str("while (");
                self.print_expr(tree, *test, out);
                out.push_str(") ");
                self.print_loop_body_with_check(tree, *body, &counter, out);
            }
            NodeKind::DoWhileStatement { body, test } => {
                let counter = self.next_counter();
                out.push_str(&format!("let {counter} = 0;\n"));
                out.push_str("do ");
                self.print_loop_body_with_check(tree, *body, &counter, out);
                out.push_str(" while (");
                self.print_expr(tree, *test, out);
                out.push_str(");\n");
            }
            NodeKind::BreakStatement => out.push_str("break;\n"),
            NodeKind::ContinueStatement => out.push_str("continue;\n"),
            NodeKind::ThrowStatement { argument } => {
                out.push_str("throw ");
                self.print_expr(tree, *argument, out);
                out.push_str(";\n");
            }
            NodeKind::TryStatement { block, handler, finalizer } => {
                out.push_str("try ");
                self.print_statement(tree, *block, out);
                if let Some(h) = handler {
                    out.push_str("catch ");
                    if let Some(param) = h.param {
                        out.push('(');
                        self.print_expr(tree, param, out);
                        out.push(')');
                        out.push(' ');
                    }
                    self.print_statement(tree, h.body, out);
                }
                if let Some(fin) = finalizer {
                    out.push_str("finally ");
                    self.print_statement(tree, *fin, out);
                }
            }
            NodeKind::FunctionDeclaration { name, params, body, is_async } => {
                if *is_async {
                    out.push_str("async ");
                }
                out.push_str("function");
                if let Some(n) = name {
                    out.push(' ');
                    out.push_str(n);
                }
                out.push('(');
                self.print_param_list(tree, params, out);
                out.push_str(") ");
                self.print_statement(tree, *body, out);
            }
            NodeKind::EmptyStatement => out.push_str(";\n"),
            other => unreachable!("not a statement node: {other:?}"),
        }
    }

    /// `for(...)` head clauses aren't statements: no trailing `;`/`\n`.
    fn print_for_head_clause(&mut self, tree: &Tree, id: NodeId, out: &mut String) {
        if let NodeKind::VariableDeclaration { kind, declarations } = &tree.get(id).kind {
            out.push_str(match kind {
                ascript_ast::VarKind::Var => "var ",
                ascript_ast::VarKind::Let => "let ",
                ascript_ast::VarKind::Const => "const ",
            });
            for (i, decl) in declarations.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.print_expr(tree, decl.id, out);
                if let Some(init) = decl.init {
                    out.push_str(" = ");
                    self.print_expr_wrapped(tree, init, out);
                }
            }
        } else {
            self.print_expr(tree, id, out);
        }
    }

    fn print_loop_body_with_check(&mut self, tree: &Tree, body: NodeId, counter: &str, out: &mut String) {
        out.push_str("{\n");
        out.push_str(&format!(
            "if (++{counter} > __maxIterations) throw new Error('Maximum iteration limit exceeded');\n"
        ));
        match &tree.get(body).kind {
            NodeKind::BlockStatement { body: stmts } => {
                for stmt in stmts {
                    self.print_statement(tree, *stmt, out);
                }
            }
            _ => self.print_statement(tree, body, out),
        }
        out.push_str("}\n");
    }

    fn print_param_list(&mut self, tree: &Tree, params: &[NodeId], out: &mut String) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.print_expr(tree, *param, out);
        }
    }

    // ---- expressions and patterns ----

    fn needs_parens(kind: &NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::BinaryExpression { .. }
                | NodeKind::LogicalExpression { .. }
                | NodeKind::ConditionalExpression { .. }
                | NodeKind::AssignmentExpression { .. }
                | NodeKind::SequenceExpression { .. }
        )
    }

    fn print_expr_wrapped(&mut self, tree: &Tree, id: NodeId, out: &mut String) {
        if Self::needs_parens(&tree.get(id).kind) {
            out.push('(');
            self.print_expr(tree, id, out);
            out.push(')');
        } else {
            self.print_expr(tree, id, out);
        }
    }

    fn print_expr(&mut self, tree: &Tree, id: NodeId, out: &mut String) {
        match &tree.get(id).kind {
            NodeKind::Identifier { name } => out.push_str(&self.rename(name)),
            NodeKind::ThisExpression => out.push_str("this"),
            NodeKind::NumericLiteral { value } => out.push_str(&format_number(*value)),
            NodeKind::StringLiteral { value } => out.push_str(&quote_string(value)),
            NodeKind::BooleanLiteral { value } => out.push_str(if *value { "true" } else { "false" }),
            NodeKind::NullLiteral => out.push_str("null"),
            NodeKind::BigIntLiteral { raw } => {
                out.push_str(raw);
                out.push('n');
            }
            NodeKind::TemplateLiteral { quasis, expressions } => {
                out.push('`');
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(i) {
                        out.push_str("${");
                        self.print_expr(tree, *expr, out);
                        out.push('}');
                    }
                }
                out.push('`');
            }
            NodeKind::TaggedTemplateExpression { tag, quasi } => {
                self.print_expr_wrapped(tree, *tag, out);
                self.print_expr(tree, *quasi, out);
            }
            NodeKind::RegexLiteral { pattern, flags } => {
                out.push('/');
                out.push_str(pattern);
                out.push('/');
                out.push_str(flags);
            }
            NodeKind::ArrayExpression { elements } | NodeKind::ArrayPattern { elements } => {
                out.push('[');
                for (i, el) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if let Some(el) = el {
                        self.print_expr_wrapped(tree, *el, out);
                    }
                }
                out.push(']');
            }
            NodeKind::ObjectExpression { properties, spreads } => {
                let mut members: Vec<(u32, ObjectMember)> = Vec::new();
                for p in properties {
                    let start = tree.span(p.key).start.min(tree.span(p.value).start);
                    members.push((start, ObjectMember::Property(p.clone())));
                }
                for s in spreads {
                    members.push((tree.span(*s).start, ObjectMember::Spread(*s)));
                }
                members.sort_by_key(|(start, _)| *start);
                out.push('{');
                for (i, (_, member)) in members.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match member {
                        ObjectMember::Property(p) => {
                            self.print_property_key(tree, p.key, p.computed, out);
                            out.push_str(": ");
                            self.print_expr_wrapped(tree, p.value, out);
                        }
                        ObjectMember::Spread(s) => self.print_expr_wrapped(tree, *s, out),
                    }
                }
                out.push('}');
            }
            NodeKind::ObjectPattern { properties, rest } => {
                out.push('{');
                for (i, p) in properties.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.print_property_key(tree, p.key, p.computed, out);
                    out.push_str(": ");
                    self.print_expr(tree, p.value, out);
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                    self.print_expr(tree, *rest, out);
                }
                out.push('}');
            }
            NodeKind::SpreadElement { argument } => {
                out.push_str("...");
                self.print_expr_wrapped(tree, *argument, out);
            }
            NodeKind::FunctionExpression { name, params, body, is_async } => {
                if *is_async {
                    out.push_str("async ");
                }
                out.push_str("function");
                if let Some(n) = name {
                    out.push(' ');
                    out.push_str(n);
                }
                out.push('(');
                self.print_param_list(tree, params, out);
                out.push_str(") ");
                self.print_statement(tree, *body, out);
            }
            NodeKind::ArrowFunctionExpression { params, body, is_async, expression_body } => {
                if *is_async {
                    out.push_str("async ");
                }
                out.push('(');
                self.print_param_list(tree, params, out);
                out.push_str(") => ");
                if *expression_body {
                    self.print_expr_wrapped(tree, *body, out);
                } else {
                    self.print_statement(tree, *body, out);
                }
            }
            NodeKind::UnaryExpression { operator, argument } => {
                out.push_str(operator);
                out.push(' ');
                self.print_expr_wrapped(tree, *argument, out);
            }
            NodeKind::UpdateExpression { operator, argument, prefix } => {
                if *prefix {
                    out.push_str(operator);
                    self.print_expr_wrapped(tree, *argument, out);
                } else {
                    self.print_expr_wrapped(tree, *argument, out);
                    out.push_str(operator);
                }
            }
            NodeKind::BinaryExpression { operator, left, right } => {
                self.print_expr_wrapped(tree, *left, out);
                out.push(' ');
                out.push_str(operator);
                out.push(' ');
                self.print_expr_wrapped(tree, *right, out);
            }
            NodeKind::LogicalExpression { operator, left, right } => {
                self.print_expr_wrapped(tree, *left, out);
                out.push(' ');
                out.push_str(operator);
                out.push(' ');
                self.print_expr_wrapped(tree, *right, out);
            }
            NodeKind::ConditionalExpression { test, consequent, alternate } => {
                self.print_expr_wrapped(tree, *test, out);
                out.push_str(" ? ");
                self.print_expr_wrapped(tree, *consequent, out);
                out.push_str(" : ");
                self.print_expr_wrapped(tree, *alternate, out);
            }
            NodeKind::AssignmentExpression { operator, left, right } => {
                self.print_expr(tree, *left, out);
                out.push(' ');
                out.push_str(operator);
                out.push(' ');
                self.print_expr_wrapped(tree, *right, out);
            }
            NodeKind::AssignmentPattern { left, right } => {
                self.print_expr(tree, *left, out);
                out.push_str(" = ");
                self.print_expr_wrapped(tree, *right, out);
            }
            NodeKind::RestElement { argument } => {
                out.push_str("...");
                self.print_expr(tree, *argument, out);
            }
            NodeKind::SequenceExpression { expressions } => {
                for (i, e) in expressions.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.print_expr_wrapped(tree, *e, out);
                }
            }
            NodeKind::CallExpression { callee, arguments } => {
                self.print_expr_wrapped(tree, *callee, out);
                out.push('(');
                for (i, a) in arguments.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.print_expr_wrapped(tree, *a, out);
                }
                out.push(')');
            }
            NodeKind::NewExpression { callee, arguments } => {
                out.push_str("new ");
                self.print_expr_wrapped(tree, *callee, out);
                out.push('(');
                for (i, a) in arguments.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.print_expr_wrapped(tree, *a, out);
                }
                out.push(')');
            }
            NodeKind::AwaitExpression { argument } => {
                out.push_str("await ");
                self.print_expr_wrapped(tree, *argument, out);
            }
            NodeKind::StaticMemberExpression { object, property } => {
                self.print_expr_wrapped(tree, *object, out);
                out.push('.');
                out.push_str(property);
            }
            NodeKind::ComputedMemberExpression { object, property } => {
                self.print_expr_wrapped(tree, *object, out);
                out.push('[');
                self.print_expr_wrapped(tree, *property, out);
                out.push(']');
            }
            other => unreachable!("not an expression/pattern node: {other:?}"),
        }
    }

    /// Property/pattern keys are never renamed: `{ eval: 1 }` has nothing to
    /// do with the global `eval`.
    fn print_property_key(&mut self, tree: &Tree, key: NodeId, computed: bool, out: &mut String) {
        if computed {
            out.push('[');
            self.print_expr_wrapped(tree, key, out);
            out.push(']');
            return;
        }
        match &tree.get(key).kind {
            NodeKind::Identifier { name } => out.push_str(name),
            NodeKind::StringLiteral { value } => out.push_str(&quote_string(value)),
            NodeKind::NumericLiteral { value } => out.push_str(&format_number(*value)),
            other => unreachable!("non-computed property key is never {other:?}"),
        }
    }
}

#[derive(Clone)]
enum ObjectMember {
    Property(ascript_ast::ObjectProperty),
    Spread(NodeId),
}

fn format_number(value: f64) -> String {
    if value == value.trunc() && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
