//! A single generic tree walk, reused by every rule instead of each rule
//! hand-rolling its own recursion. Rules that need structural context
//! (what block a statement sits in, whether a key is computed) still walk
//! by hand; most don't.

use ascript_ast::{NodeId, NodeKind, Tree};

pub fn children(tree: &Tree, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    match &tree.get(id).kind {
        NodeKind::Program { body } | NodeKind::BlockStatement { body } => out.extend(body.iter().copied()),
        NodeKind::ExpressionStatement { expr } => out.push(*expr),
        NodeKind::VariableDeclaration { declarations, .. } => {
            for d in declarations {
                out.push(d.id);
                out.extend(d.init);
            }
        }
        NodeKind::ReturnStatement { argument } => out.extend(*argument),
        NodeKind::IfStatement { test, consequent, alternate } => {
            out.push(*test);
            out.push(*consequent);
            out.extend(*alternate);
        }
        NodeKind::ForStatement { init, test, update, body } => {
            out.extend(*init);
            out.extend(*test);
            out.extend(*update);
            out.push(*body);
        }
        NodeKind::ForInStatement { left, right, body } => {
            out.push(*left);
            out.push(*right);
            out.push(*body);
        }
        NodeKind::ForOfStatement { left, right, body, .. } => {
            out.push(*left);
            out.push(*right);
            out.push(*body);
        }
        NodeKind::WhileStatement { test, body } => {
            out.push(*test);
            out.push(*body);
        }
        NodeKind::DoWhileStatement { body, test } => {
            out.push(*body);
            out.push(*test);
        }
        NodeKind::BreakStatement | NodeKind::ContinueStatement | NodeKind::EmptyStatement => {}
        NodeKind::ThrowStatement { argument } => out.push(*argument),
        NodeKind::TryStatement { block, handler, finalizer } => {
            out.push(*block);
            if let Some(h) = handler {
                out.extend(h.param);
                out.push(h.body);
            }
            out.extend(*finalizer);
        }
        NodeKind::FunctionDeclaration { params, body, .. } | NodeKind::FunctionExpression { params, body, .. } => {
            out.extend(params.iter().copied());
            out.push(*body);
        }
        NodeKind::ArrowFunctionExpression { params, body, .. } => {
            out.extend(params.iter().copied());
            out.push(*body);
        }
        NodeKind::ArrayPattern { elements } | NodeKind::ArrayExpression { elements } => {
            out.extend(elements.iter().filter_map(|e| *e));
        }
        NodeKind::ObjectPattern { properties, rest } => {
            for p in properties {
                if p.computed {
                    out.push(p.key);
                }
                out.push(p.value);
            }
            out.extend(*rest);
        }
        NodeKind::AssignmentPattern { left, right } => {
            out.push(*left);
            out.push(*right);
        }
        NodeKind::RestElement { argument } => out.push(*argument),
        NodeKind::Identifier { .. }
        | NodeKind::ThisExpression
        | NodeKind::NumericLiteral { .. }
        | NodeKind::StringLiteral { .. }
        | NodeKind::BooleanLiteral { .. }
        | NodeKind::NullLiteral
        | NodeKind::BigIntLiteral { .. }
        | NodeKind::RegexLiteral { .. } => {}
        NodeKind::TemplateLiteral { expressions, .. } => out.extend(expressions.iter().copied()),
        NodeKind::TaggedTemplateExpression { tag, quasi } => {
            out.push(*tag);
            out.push(*quasi);
        }
        NodeKind::ObjectExpression { properties, spreads } => {
            for p in properties {
                if p.computed {
                    out.push(p.key);
                }
                out.push(p.value);
            }
            out.extend(spreads.iter().copied());
        }
        NodeKind::SpreadElement { argument } => out.push(*argument),
        NodeKind::UnaryExpression { argument, .. } => out.push(*argument),
        NodeKind::UpdateExpression { argument, .. } => out.push(*argument),
        NodeKind::BinaryExpression { left, right, .. } | NodeKind::LogicalExpression { left, right, .. } => {
            out.push(*left);
            out.push(*right);
        }
        NodeKind::ConditionalExpression { test, consequent, alternate } => {
            out.push(*test);
            out.push(*consequent);
            out.push(*alternate);
        }
        NodeKind::AssignmentExpression { left, right, .. } => {
            out.push(*left);
            out.push(*right);
        }
        NodeKind::SequenceExpression { expressions } => out.extend(expressions.iter().copied()),
        NodeKind::CallExpression { callee, arguments } | NodeKind::NewExpression { callee, arguments } => {
            out.push(*callee);
            out.extend(arguments.iter().copied());
        }
        NodeKind::AwaitExpression { argument } => out.push(*argument),
        NodeKind::StaticMemberExpression { object, .. } => out.push(*object),
        NodeKind::ComputedMemberExpression { object, property } => {
            out.push(*object);
            out.push(*property);
        }
    }
    out
}

pub fn walk(tree: &Tree, id: NodeId, f: &mut impl FnMut(&Tree, NodeId)) {
    f(tree, id);
    for child in children(tree, id) {
        walk(tree, child, f);
    }
}
