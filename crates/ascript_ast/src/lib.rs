//! Parser adapter (component A): turns agent-script source text into a
//! typed, position-tagged syntax tree.
//!
//! The tree is a hand-rolled arena (see [`tree::Tree`]) rather than a
//! borrowed-lifetime tree over the source buffer: nodes are addressed by
//! [`tree::NodeId`], children are stored as `Vec<NodeId>` inside their
//! parent, and there is no parent pointer at all — a rule or rewrite pass
//! that needs the parent walks down from the root and tracks it itself.
//! This keeps the guard and rewriter free of lifetime parameters and lets
//! the rewriter append synthetic nodes to the same arena it read from.
//!
//! On a parse failure we retry once with a synthetic async wrapper so
//! scripts containing a bare top-level `return`/`await` (which is what the
//! rewriter's own output, and many hand-written agent scripts, look like)
//! are still accepted. If the wrapped parse also fails we surface the
//! *original* failure location — the wrap is an implementation detail and
//! should never appear in a user-facing error.

mod error;
mod lexer;
mod parser;
mod tree;

pub use error::ParseError;
pub use tree::{
    CatchClause, Node, NodeId, NodeKind, ObjectPatternProperty, ObjectProperty, Span, Tree, VarKind,
    VariableDeclarator,
};

use ascript_common::SourceLocation;

/// Whether a script parsed standalone or only parsed after the fallback
/// wrap. Agent scripts are always scripts, never ES modules — there is no
/// `import`/`export` in the grammar this parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script,
    WrappedFallback,
}

/// A successfully parsed script: the tree plus a record of whether the
/// fallback wrap was needed, so callers can decide whether to warn.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    pub tree: Tree,
    pub source_kind: SourceKind,
}

const FALLBACK_PREFIX: &str = "async function __tmp() {\n";
const FALLBACK_SUFFIX: &str = "\n}";

/// Parses `source` as a sequence of statements. See module docs for the
/// fallback-wrap behavior on a bare top-level `return`/`await`.
pub fn parse(source: &str) -> Result<ParsedScript, ParseError> {
    match try_parse(source) {
        Ok(tree) => Ok(ParsedScript { tree, source_kind: SourceKind::Script }),
        Err(first_err) => {
            let wrapped = format!("{FALLBACK_PREFIX}{source}{FALLBACK_SUFFIX}");
            match try_parse(&wrapped) {
                Ok(tree) => Ok(ParsedScript { tree, source_kind: SourceKind::WrappedFallback }),
                Err(_) => Err(first_err),
            }
        }
    }
}

fn try_parse(source: &str) -> Result<Tree, ParseError> {
    let tokens = lexer::Lexer::new(source).tokenize()?;
    parser::Parser::new(source, tokens).parse_program()
}

/// Converts a 0-based byte offset into 1-based (line, column).
pub fn offset_to_line_col(source: &str, offset: u32) -> (u32, u32) {
    let offset = offset as usize;
    let mut line = 1u32;
    let mut column = 1u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

pub(crate) fn offset_to_location(source: &str, offset: u32) -> SourceLocation {
    let (line, column) = offset_to_line_col(source, offset);
    SourceLocation::new(line, column, offset)
}

/// Converts a [`Span`] into an [`ascript_common::SourceLocation`] anchored
/// on its start byte.
pub fn span_to_location(source: &str, span: Span) -> SourceLocation {
    offset_to_location(source, span.start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_expression_statement() {
        let parsed = parse("callTool('read', { path: 'a.txt' });").unwrap();
        assert_eq!(parsed.source_kind, SourceKind::Script);
        let program = parsed.tree.get(parsed.tree.root());
        match &program.kind {
            NodeKind::Program { body } => assert_eq!(body.len(), 1),
            other => panic!("expected Program, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_wrap_for_bare_return() {
        let parsed = parse("return 1;").unwrap();
        assert_eq!(parsed.source_kind, SourceKind::WrappedFallback);
    }

    #[test]
    fn offset_to_line_col_counts_newlines() {
        let source = "a\nbb\nccc";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 2), (2, 1));
        assert_eq!(offset_to_line_col(source, 7), (3, 3));
    }

    #[test]
    fn parses_for_of_loop_over_array_literal() {
        let parsed = parse("for (const item of [1, 2, 3]) { callTool('noop', {}); }").unwrap();
        let program = parsed.tree.get(parsed.tree.root());
        let NodeKind::Program { body } = &program.kind else { panic!("expected Program") };
        assert_eq!(body.len(), 1);
        let stmt = parsed.tree.get(body[0]);
        assert!(matches!(stmt.kind, NodeKind::ForOfStatement { .. }));
    }

    #[test]
    fn parses_arrow_function_argument() {
        let parsed = parse("const doubled = items.map(x => x * 2);").unwrap();
        assert!(parsed.tree.len() > 0);
    }

    #[test]
    fn parses_template_literal_with_expression() {
        let parsed = parse("const s = `hello ${name}!`;").unwrap();
        let program = parsed.tree.get(parsed.tree.root());
        let NodeKind::Program { body } = &program.kind else { panic!("expected Program") };
        let decl = parsed.tree.get(body[0]);
        let NodeKind::VariableDeclaration { declarations, .. } = &decl.kind else { panic!("expected decl") };
        let init = declarations[0].init.expect("initializer");
        let init_node = parsed.tree.get(init);
        assert!(matches!(init_node.kind, NodeKind::TemplateLiteral { .. }));
    }

    #[test]
    fn parses_destructuring_declaration() {
        let parsed = parse("const { a, b: renamed, ...rest } = callTool('x', {});").unwrap();
        assert!(parsed.tree.len() > 0);
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = parse("const a = 'unterminated").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn distinguishes_division_from_regex_literal() {
        let parsed = parse("const ratio = total / count;").unwrap();
        let program = parsed.tree.get(parsed.tree.root());
        let NodeKind::Program { body } = &program.kind else { panic!("expected Program") };
        let decl = parsed.tree.get(body[0]);
        let NodeKind::VariableDeclaration { declarations, .. } = &decl.kind else { panic!("expected decl") };
        let init = parsed.tree.get(declarations[0].init.unwrap());
        assert!(matches!(init.kind, NodeKind::BinaryExpression { operator: "/", .. }));
    }
}
