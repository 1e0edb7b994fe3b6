//! Source-to-safe rewriter (component E).
//!
//! Takes a tree that has already passed the guard and produces JavaScript
//! source text that:
//!
//! - references no identifier outside the preset's allow-list except under
//!   a `__safe_` prefix (whitelist-mode rename, not a blacklist of the names
//!   the guard already rejected),
//! - has every bounded loop (`for`, `for-in`, `while`, `do-while`)
//!   instrumented with an iteration counter checked against
//!   `__maxIterations`, and every `for-of` iterable wrapped in
//!   `__safe_forOf(...)` instead — which is itself the counter for that
//!   loop kind,
//! - is wrapped in a single top-level `async function __ag_main() { ... }`,
//!   with a trailing top-level expression statement turned into `return`.
//!
//! The guard has already rejected anything this rewriter doesn't know how
//! to handle; this crate does not re-validate, it transforms.

mod printer;

use ascript_ast::Tree;
use ascript_presets::Preset;
use printer::Printer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("cannot rewrite an empty program")]
    EmptyProgram,
}

/// The rewritten program, ready to hand to the evaluator.
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub source: String,
    /// How many loops were instrumented with an iteration counter. Does not
    /// count `for-of` loops, which rely on `__safe_forOf` instead.
    pub instrumented_loop_count: u32,
}

/// Rewrites a parsed, guard-passed tree into safe source text for the given
/// preset. `tree` is consumed because printing reads it immutably and the
/// caller has no further use for the pre-rewrite tree afterwards.
pub fn rewrite(tree: &Tree, preset: &Preset) -> Result<RewriteOutput, RewriteError> {
    let ascript_ast::NodeKind::Program { body } = &tree.get(tree.root()).kind else {
        unreachable!("tree root is always a Program node");
    };
    if body.is_empty() {
        return Err(RewriteError::EmptyProgram);
    }

    let mut printer = Printer::new(preset);
    let source = printer.print_program(tree);
    Ok(RewriteOutput { source, instrumented_loop_count: printer.loop_count() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};

    fn rewrite_source(source: &str, level: SecurityLevel) -> String {
        let parsed = ascript_ast::parse(source).expect("parses");
        let preset = stock_preset(level, Profile::AgentScript);
        rewrite(&parsed.tree, &preset).expect("rewrites").source
    }

    #[test]
    fn wraps_program_in_ag_main() {
        let out = rewrite_source("1 + 1;", SecurityLevel::Standard);
        assert!(out.starts_with("async function __ag_main() {"));
        assert!(out.trim_end().ends_with('}'));
    }

    #[test]
    fn trailing_expression_statement_becomes_return() {
        let out = rewrite_source("const x = 1;\nx + 1;", SecurityLevel::Standard);
        assert!(out.contains("return __safe_x + 1;"));
    }

    #[test]
    fn call_tool_is_renamed_to_safe_bridge() {
        let out = rewrite_source("callTool('search', { q: 'rust' });", SecurityLevel::Standard);
        assert!(out.contains("__safe_callTool('search', {q: 'rust'})"));
    }

    #[test]
    fn user_identifiers_get_safe_prefix_consistently() {
        let out = rewrite_source("let total = 0;\ntotal = total + 1;\ntotal;", SecurityLevel::Standard);
        assert!(out.contains("let __safe_total = 0;"));
        assert!(out.contains("__safe_total = __safe_total + 1;"));
        assert!(out.contains("return __safe_total;"));
    }

    #[test]
    fn allow_listed_globals_are_left_alone() {
        let out = rewrite_source("Math.max(1, 2);", SecurityLevel::Standard);
        assert!(out.contains("Math.max(1, 2)"));
        assert!(!out.contains("__safe_Math"));
    }

    #[test]
    fn for_of_is_wrapped_without_a_separate_counter() {
        let out = rewrite_source("for (const item of [1, 2, 3]) { item; }", SecurityLevel::Standard);
        assert!(out.contains("__safe_forOf(["));
        assert!(!out.contains("__iter_"));
    }

    #[test]
    fn while_loop_gets_an_iteration_counter() {
        let out = rewrite_source("while (true) { break; }", SecurityLevel::Standard);
        assert!(out.contains("let __iter_1 = 0;"));
        assert!(out.contains("if (++__iter_1 > __maxIterations)"));
    }

    #[test]
    fn for_loop_gets_an_iteration_counter_and_single_statement_body_is_braced() {
        let out = rewrite_source("for (let i = 0; i < 10; i = i + 1) callTool('noop', {});", SecurityLevel::Standard);
        assert!(out.contains("let __iter_1 = 0;"));
        assert!(out.contains("if (++__iter_1 > __maxIterations)"));
        assert!(out.contains("__safe_callTool('noop', {})"));
    }

    #[test]
    fn do_while_gets_an_iteration_counter() {
        let out = rewrite_source("let i = 0;\ndo { i = i + 1; } while (i < 5);", SecurityLevel::Standard);
        assert!(out.contains("do {\n"));
        assert!(out.contains("} while (__safe_i < 5);"));
    }

    #[test]
    fn shorthand_object_property_expands_to_explicit_key_value() {
        let out = rewrite_source("let a = 1;\ncallTool('x', { a });", SecurityLevel::Standard);
        assert!(out.contains("{a: __safe_a}"));
    }

    #[test]
    fn shorthand_destructuring_binding_expands_to_explicit_key_value() {
        let out = rewrite_source("const { a } = callTool('x', {});\na;", SecurityLevel::Standard);
        assert!(out.contains("{a: __safe_a}"));
    }

    #[test]
    fn object_member_order_is_preserved_across_spreads_and_properties() {
        let out = rewrite_source("let base = {};\ncallTool('x', { before: 1, ...base, after: 2 });", SecurityLevel::Standard);
        let before = out.find("before").unwrap();
        let spread = out.find("...__safe_base").unwrap();
        let after = out.find("after").unwrap();
        assert!(before < spread && spread < after);
    }

    #[test]
    fn rewritten_output_reparses_with_single_top_level_declaration() {
        let out = rewrite_source("for (const x of [1, 2]) { callTool('a', { x }); }", SecurityLevel::Standard);
        let reparsed = ascript_ast::parse(&out).expect("rewritten source reparses");
        let ascript_ast::NodeKind::Program { body } = &reparsed.tree.get(reparsed.tree.root()).kind else {
            unreachable!()
        };
        assert_eq!(body.len(), 1);
        assert!(matches!(
            reparsed.tree.get(body[0]).kind,
            ascript_ast::NodeKind::FunctionDeclaration { ref name, is_async: true, .. }
                if name.as_deref() == Some("__ag_main")
        ));
    }

    #[test]
    fn rejects_empty_program() {
        let parsed = ascript_ast::parse("").expect("empty source still parses to an empty program");
        let preset = stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        assert!(matches!(rewrite(&parsed.tree, &preset), Err(RewriteError::EmptyProgram)));
    }
}
