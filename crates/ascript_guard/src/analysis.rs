//! Static evaluators shared by several rules: "is this expression
//! statically truthy" (for `INFINITE_LOOP`) and "what string value(s)
//! could this expression resolve to" (for the computed-key coercion
//! detector inside `DISALLOWED_IDENTIFIER`).
//!
//! Both are best-effort — a `None`/empty result means "can't tell
//! statically", not "safe". That asymmetry is deliberate: a rule using
//! these helpers should only act on a positive, not on the absence of one.

use ascript_ast::{NodeId, NodeKind, Tree};

/// Attempts to resolve a boolean loop-test expression without running
/// anything. Mirrors plain JS truthiness for the constructs a guarded
/// script can actually contain.
pub fn static_truthiness(tree: &Tree, id: NodeId) -> Option<bool> {
    match &tree.get(id).kind {
        NodeKind::BooleanLiteral { value } => Some(*value),
        NodeKind::NumericLiteral { value } => Some(*value != 0.0 && !value.is_nan()),
        NodeKind::StringLiteral { value } => Some(!value.is_empty()),
        NodeKind::NullLiteral => Some(false),
        NodeKind::Identifier { name } => match name.as_str() {
            "Infinity" => Some(true),
            "undefined" | "NaN" => Some(false),
            _ => None,
        },
        NodeKind::ArrayExpression { .. } | NodeKind::ObjectExpression { .. } => Some(true),
        NodeKind::UnaryExpression { operator: "!", argument } => static_truthiness(tree, *argument).map(|b| !b),
        _ => None,
    }
}

/// Every string this expression could statically resolve to. Handles the
/// coercion paths the spec calls out by name: literal, no-expression
/// template, conditional branches (both, if the test itself isn't
/// resolvable), logical both-sides, the last expression in a comma
/// sequence, an assignment's right-hand side, a single-element array
/// (`ToPrimitive` on an array with one element stringifies that element),
/// and an object whose `toString`/`valueOf` method has a literal return.
pub fn possible_static_strings(tree: &Tree, id: NodeId) -> Vec<String> {
    match &tree.get(id).kind {
        NodeKind::StringLiteral { value } => vec![value.clone()],
        NodeKind::TemplateLiteral { quasis, expressions } if expressions.is_empty() => vec![quasis.join("")],
        NodeKind::ConditionalExpression { test, consequent, alternate } => match static_truthiness(tree, *test) {
            Some(true) => possible_static_strings(tree, *consequent),
            Some(false) => possible_static_strings(tree, *alternate),
            None => {
                let mut out = possible_static_strings(tree, *consequent);
                out.extend(possible_static_strings(tree, *alternate));
                out
            }
        },
        NodeKind::LogicalExpression { left, right, .. } => {
            let mut out = possible_static_strings(tree, *left);
            out.extend(possible_static_strings(tree, *right));
            out
        }
        NodeKind::SequenceExpression { expressions } => {
            expressions.last().map(|last| possible_static_strings(tree, *last)).unwrap_or_default()
        }
        NodeKind::AssignmentExpression { operator: "=", right, .. } => possible_static_strings(tree, *right),
        NodeKind::ArrayExpression { elements } if elements.len() == 1 => {
            elements[0].map(|e| possible_static_strings(tree, e)).unwrap_or_default()
        }
        NodeKind::ObjectExpression { properties, .. } => properties
            .iter()
            .filter(|p| !p.computed && property_key_name(tree, p.key).as_deref().is_some_and(|n| n == "toString" || n == "valueOf"))
            .flat_map(|p| coercion_method_return(tree, p.value))
            .collect(),
        _ => Vec::new(),
    }
}

fn property_key_name(tree: &Tree, key: NodeId) -> Option<String> {
    match &tree.get(key).kind {
        NodeKind::Identifier { name } => Some(name.clone()),
        NodeKind::StringLiteral { value } => Some(value.clone()),
        _ => None,
    }
}

/// A `toString`/`valueOf` value that is a no-argument function/arrow
/// whose body is (or immediately returns) a statically resolvable string.
fn coercion_method_return(tree: &Tree, value: NodeId) -> Vec<String> {
    match &tree.get(value).kind {
        NodeKind::ArrowFunctionExpression { body, expression_body: true, .. } => possible_static_strings(tree, *body),
        NodeKind::ArrowFunctionExpression { body, expression_body: false, .. }
        | NodeKind::FunctionExpression { body, .. } => {
            let NodeKind::BlockStatement { body: stmts } = &tree.get(*body).kind else { return Vec::new() };
            stmts
                .iter()
                .filter_map(|s| match &tree.get(*s).kind {
                    NodeKind::ReturnStatement { argument: Some(a) } => Some(*a),
                    _ => None,
                })
                .flat_map(|a| possible_static_strings(tree, a))
                .collect()
        }
        _ => Vec::new(),
    }
}

pub fn identifier_name(tree: &Tree, id: NodeId) -> Option<&str> {
    match &tree.get(id).kind {
        NodeKind::Identifier { name } => Some(name.as_str()),
        _ => None,
    }
}
