//! The rule library (component C): ~15 pure predicates over the tree.
//! Each struct here is one row of the table in the component design —
//! struct name mirrors the rule's stable `name()`.

use ascript_ast::{NodeId, NodeKind, Tree};

use crate::analysis::{identifier_name, possible_static_strings, static_truthiness};
use crate::walk::walk;
use crate::{Rule, Severity, ValidationContext, ValidationIssue};

fn loc(tree: &Tree, ctx: &ValidationContext, id: NodeId) -> ascript_common::SourceLocation {
    tree.location_of(ctx.source, id)
}

fn callee_name<'t>(tree: &'t Tree, callee: NodeId) -> Option<&'t str> {
    identifier_name(tree, callee)
}

fn static_member_property<'t>(tree: &'t Tree, id: NodeId) -> Option<(NodeId, &'t str)> {
    match &tree.get(id).kind {
        NodeKind::StaticMemberExpression { object, property } => Some((*object, property.as_str())),
        _ => None,
    }
}

pub struct NoEval;

impl Rule for NoEval {
    fn name(&self) -> &'static str {
        "NO_EVAL"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        const BLOCKED: &[&str] = &["eval", "Function", "AsyncFunction", "GeneratorFunction"];
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::Identifier { name } if BLOCKED.contains(&name.as_str()) => {
                out.push(
                    ValidationIssue::new(self.name(), Severity::Error, format!("use of `{name}` is not permitted"))
                        .at(loc(tree, ctx, id)),
                );
            }
            NodeKind::CallExpression { callee, arguments } => {
                if let Some(name) = callee_name(tree, *callee) {
                    if (name == "setTimeout" || name == "setInterval")
                        && arguments.first().is_some_and(|a| is_string_like(tree, *a))
                    {
                        out.push(
                            ValidationIssue::new(
                                self.name(),
                                Severity::Error,
                                format!("`{name}` may not be called with a string body"),
                            )
                            .at(loc(tree, ctx, id)),
                        );
                    }
                }
            }
            _ => {}
        });
    }
}

fn is_string_like(tree: &Tree, id: NodeId) -> bool {
    matches!(
        &tree.get(id).kind,
        NodeKind::StringLiteral { .. } | NodeKind::TemplateLiteral { .. }
    )
}

pub struct DisallowedIdentifier;

const BLACKLISTED_NAMES: &[&str] = &[
    "process", "require", "module", "Buffer", "arguments", "RegExp", "Promise", "Symbol", "Reflect",
    "Proxy", "Error", "EvalError", "RangeError", "ReferenceError", "SyntaxError", "TypeError", "URIError",
    "fetch", "WebSocket", "localStorage", "sessionStorage", "crypto", "performance", "structuredClone",
    "AbortController", "AbortSignal", "MessageChannel", "MessagePort", "Intl", "setTimeout", "setInterval",
    "clearTimeout", "clearInterval", "WebAssembly", "Worker", "SharedWorker", "ServiceWorker", "WeakMap",
    "WeakSet", "WeakRef", "FinalizationRegistry", "Map", "Set", "Atomics", "SharedArrayBuffer",
    "importScripts", "ShadowRealm", "Iterator", "AsyncIterator", "constructor", "__proto__", "prototype",
];

impl Rule for DisallowedIdentifier {
    fn name(&self) -> &'static str {
        "DISALLOWED_IDENTIFIER"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        let flag = |out: &mut Vec<ValidationIssue>, id: NodeId, name: &str| {
            out.push(
                ValidationIssue::new(self.name(), Severity::Error, format!("`{name}` is not permitted"))
                    .at(loc(tree, ctx, id)),
            );
        };
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::Identifier { name } if BLACKLISTED_NAMES.contains(&name.as_str()) => flag(out, id, name),
            NodeKind::StaticMemberExpression { property, .. } if BLACKLISTED_NAMES.contains(&property.as_str()) => {
                flag(out, id, property)
            }
            NodeKind::ComputedMemberExpression { property, .. } => {
                for candidate in possible_static_strings(tree, *property) {
                    if BLACKLISTED_NAMES.contains(&candidate.as_str()) {
                        flag(out, id, &candidate);
                        break;
                    }
                }
            }
            _ => {}
        });
    }
}

pub struct NoGlobalAccess;

impl Rule for NoGlobalAccess {
    fn name(&self) -> &'static str {
        "NO_GLOBAL_ACCESS"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        const GLOBAL_NAMES: &[&str] = &["window", "globalThis", "self", "global"];
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::Identifier { name } if GLOBAL_NAMES.contains(&name.as_str()) => {
                out.push(
                    ValidationIssue::new(self.name(), Severity::Error, format!("reference to `{name}` is not permitted"))
                        .at(loc(tree, ctx, id)),
                );
            }
            NodeKind::ThisExpression => {
                out.push(
                    ValidationIssue::new(self.name(), Severity::Error, "reference to `this` is not permitted")
                        .at(loc(tree, ctx, id)),
                );
            }
            _ => {}
        });
    }
}

pub struct ForbiddenLoop;

impl Rule for ForbiddenLoop {
    fn name(&self) -> &'static str {
        "FORBIDDEN_LOOP"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        use ascript_presets::LoopKind;
        walk(tree, tree.root(), &mut |tree, id| {
            let kind = match &tree.get(id).kind {
                NodeKind::ForStatement { .. } => Some(LoopKind::For),
                NodeKind::WhileStatement { .. } => Some(LoopKind::While),
                NodeKind::DoWhileStatement { .. } => Some(LoopKind::DoWhile),
                NodeKind::ForInStatement { .. } => Some(LoopKind::ForIn),
                NodeKind::ForOfStatement { .. } => Some(LoopKind::ForOf),
                _ => None,
            };
            if let Some(kind) = kind {
                if !ctx.preset.is_loop_allowed(kind) {
                    out.push(
                        ValidationIssue::new(self.name(), Severity::Error, format!("{kind:?} loops are not permitted at this security level"))
                            .at(loc(tree, ctx, id)),
                    );
                }
            }
        });
    }
}

pub struct InfiniteLoop;

impl Rule for InfiniteLoop {
    fn name(&self) -> &'static str {
        "INFINITE_LOOP"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        let flag = |out: &mut Vec<ValidationIssue>, id: NodeId| {
            out.push(
                ValidationIssue::new(self.name(), Severity::Error, "loop has no statically bounded exit condition")
                    .at(loc(tree, ctx, id)),
            );
        };
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::ForStatement { test: None, .. } => flag(out, id),
            NodeKind::ForStatement { test: Some(t), .. } if static_truthiness(tree, *t) == Some(true) => flag(out, id),
            NodeKind::WhileStatement { test, .. } if static_truthiness(tree, *test) == Some(true) => flag(out, id),
            NodeKind::DoWhileStatement { test, .. } if static_truthiness(tree, *test) == Some(true) => flag(out, id),
            _ => {}
        });
    }
}

pub struct ResourceExhaustion;

impl Rule for ResourceExhaustion {
    fn name(&self) -> &'static str {
        "RESOURCE_EXHAUSTION"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        let thresholds = ctx.preset.resource_thresholds;
        let flag = |out: &mut Vec<ValidationIssue>, id: NodeId, message: String| {
            out.push(ValidationIssue::new(self.name(), Severity::Error, message).at(loc(tree, ctx, id)));
        };
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::BinaryExpression { operator: "**", right, .. } => {
                if let NodeKind::BigIntLiteral { raw } = &tree.get(*right).kind {
                    if let Ok(exp) = raw.trim_end_matches('n').parse::<u64>() {
                        if exp > thresholds.max_bigint_exponent {
                            flag(out, id, format!("bigint exponent {exp} exceeds the configured threshold"));
                        }
                    }
                }
            }
            NodeKind::NewExpression { callee, arguments } => {
                if callee_name(tree, *callee) == Some("Array") {
                    if let Some(NodeKind::NumericLiteral { value }) = arguments.first().map(|a| &tree.get(*a).kind) {
                        if *value > thresholds.max_array_length as f64 {
                            flag(out, id, format!("Array allocation of {value} exceeds the configured threshold"));
                        }
                    }
                }
            }
            NodeKind::CallExpression { callee, arguments } => {
                if let Some((_, "repeat")) = static_member_property(tree, *callee) {
                    if let Some(NodeKind::NumericLiteral { value }) = arguments.first().map(|a| &tree.get(*a).kind) {
                        if *value > thresholds.max_repeat_count as f64 {
                            flag(out, id, format!("repeat count {value} exceeds the configured threshold"));
                        }
                    }
                }
            }
            _ => {}
        });
    }
}

pub struct NoJsonCallbacks;

impl Rule for NoJsonCallbacks {
    fn name(&self) -> &'static str {
        "NO_JSON_CALLBACKS"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            let NodeKind::CallExpression { callee, arguments } = &tree.get(id).kind else { return };
            let Some((object, property)) = static_member_property(tree, *callee) else { return };
            if callee_name(tree, object) != Some("JSON") {
                return;
            }
            let callback_index = match property {
                "stringify" => 1,
                "parse" => 1,
                _ => return,
            };
            let Some(arg) = arguments.get(callback_index) else { return };
            if is_function_like(tree, *arg) {
                out.push(
                    ValidationIssue::new(
                        "JSON_CALLBACK_NOT_ALLOWED",
                        Severity::Error,
                        format!("JSON.{property} may not be called with a reviver/replacer function"),
                    )
                    .at(loc(tree, ctx, id)),
                );
            }
        });
    }
}

fn is_function_like(tree: &Tree, id: NodeId) -> bool {
    matches!(
        &tree.get(id).kind,
        NodeKind::FunctionExpression { .. }
            | NodeKind::ArrowFunctionExpression { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::StaticMemberExpression { .. }
            | NodeKind::ComputedMemberExpression { .. }
            | NodeKind::CallExpression { .. }
            | NodeKind::ConditionalExpression { .. }
            | NodeKind::LogicalExpression { .. }
    )
}

pub struct NoRegex;

impl Rule for NoRegex {
    fn name(&self) -> &'static str {
        "NO_REGEX_LITERAL"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        const REGEX_METHODS: &[&str] = &["match", "matchAll", "test", "exec", "replace", "search", "split"];
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::RegexLiteral { .. } => {
                out.push(
                    ValidationIssue::new("NO_REGEX_LITERAL", Severity::Error, "regex literals are not permitted")
                        .at(loc(tree, ctx, id)),
                );
            }
            NodeKind::CallExpression { callee, .. } => {
                if let Some((_, property)) = static_member_property(tree, *callee) {
                    if REGEX_METHODS.contains(&property) {
                        out.push(
                            ValidationIssue::new(
                                "NO_REGEX_METHODS",
                                Severity::Error,
                                format!("`.{property}(...)` is not permitted"),
                            )
                            .at(loc(tree, ctx, id)),
                        );
                    }
                }
            }
            _ => {}
        });
    }
}

pub struct NoUserDefinedFunctions;

impl Rule for NoUserDefinedFunctions {
    fn name(&self) -> &'static str {
        "NO_USER_DEFINED_FUNCTIONS"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| match &tree.get(id).kind {
            NodeKind::FunctionDeclaration { name, .. } if name.as_deref() != Some("__ag_main") => {
                out.push(
                    ValidationIssue::new("USER_DEFINED_FUNCTION", Severity::Error, "function declarations are not permitted")
                        .at(loc(tree, ctx, id)),
                );
            }
            NodeKind::FunctionExpression { .. } => {
                out.push(
                    ValidationIssue::new("USER_DEFINED_FUNCTION", Severity::Error, "function expressions are not permitted")
                        .at(loc(tree, ctx, id)),
                );
            }
            _ => {}
        });
    }
}

pub struct ReservedPrefix;

impl Rule for ReservedPrefix {
    fn name(&self) -> &'static str {
        "RESERVED_PREFIX"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            if let NodeKind::Identifier { name } = &tree.get(id).kind {
                if name.starts_with("__ag_") || name.starts_with("__safe_") {
                    out.push(
                        ValidationIssue::new(
                            self.name(),
                            Severity::Error,
                            format!("identifier `{name}` uses a reserved prefix"),
                        )
                        .at(loc(tree, ctx, id)),
                    );
                }
            }
        });
    }
}

pub struct StaticCallTarget;

impl Rule for StaticCallTarget {
    fn name(&self) -> &'static str {
        "STATIC_CALL_TARGET"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            let NodeKind::CallExpression { callee, arguments } = &tree.get(id).kind else { return };
            if callee_name(tree, *callee) != Some("callTool") {
                return;
            }
            match arguments.first().map(|a| &tree.get(*a).kind) {
                Some(NodeKind::StringLiteral { value }) => {
                    if let Some(patterns) = &ctx.preset.tool_name_patterns {
                        if !patterns.iter().any(|p| tool_name_matches(p, value)) {
                            out.push(
                                ValidationIssue::new(
                                    self.name(),
                                    Severity::Error,
                                    format!("tool `{value}` is not on the configured allow-list"),
                                )
                                .at(loc(tree, ctx, id)),
                            );
                        }
                    }
                }
                _ => {
                    out.push(
                        ValidationIssue::new(
                            self.name(),
                            Severity::Error,
                            "callTool's first argument must be a string literal",
                        )
                        .at(loc(tree, ctx, id)),
                    );
                }
            }
        });
    }
}

fn tool_name_matches(pattern: &str, name: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        pattern == name
    }
}

pub struct CallArgValidation;

impl Rule for CallArgValidation {
    fn name(&self) -> &'static str {
        "CALL_ARG_VALIDATION"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            let NodeKind::CallExpression { callee, arguments } = &tree.get(id).kind else { return };
            if callee_name(tree, *callee) != Some("callTool") {
                return;
            }
            if arguments.len() != 2 {
                out.push(
                    ValidationIssue::new(self.name(), Severity::Error, format!("callTool expects 2 arguments, got {}", arguments.len()))
                        .at(loc(tree, ctx, id)),
                );
                return;
            }
            let args_node = &tree.get(arguments[1]).kind;
            if matches!(
                args_node,
                NodeKind::ArrayExpression { .. }
                    | NodeKind::StringLiteral { .. }
                    | NodeKind::NumericLiteral { .. }
                    | NodeKind::BooleanLiteral { .. }
                    | NodeKind::NullLiteral
            ) {
                out.push(
                    ValidationIssue::new(self.name(), Severity::Error, "callTool's second argument must be an object")
                        .at(loc(tree, ctx, id)),
                );
            }
        });
    }
}

pub struct NoComputedDestructuring;

impl Rule for NoComputedDestructuring {
    fn name(&self) -> &'static str {
        "NO_COMPUTED_DESTRUCTURING"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            if let NodeKind::ObjectPattern { properties, .. } = &tree.get(id).kind {
                for p in properties {
                    if p.computed {
                        out.push(
                            ValidationIssue::new(
                                self.name(),
                                Severity::Error,
                                "computed keys are not permitted in destructuring patterns",
                            )
                            .at(loc(tree, ctx, p.key)),
                        );
                    }
                }
            }
        });
    }
}

pub struct UnreachableCode;

impl Rule for UnreachableCode {
    fn name(&self) -> &'static str {
        "UNREACHABLE_CODE"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        walk(tree, tree.root(), &mut |tree, id| {
            let body = match &tree.get(id).kind {
                NodeKind::Program { body } | NodeKind::BlockStatement { body } => body,
                _ => return,
            };
            let mut terminated = false;
            for stmt in body.iter() {
                if terminated {
                    out.push(
                        ValidationIssue::new(self.name(), Severity::Warning, "unreachable code")
                            .at(loc(tree, ctx, *stmt)),
                    );
                    continue;
                }
                if is_terminating(tree, *stmt) {
                    terminated = true;
                }
            }
        });
    }
}

fn is_terminating(tree: &Tree, id: NodeId) -> bool {
    matches!(
        &tree.get(id).kind,
        NodeKind::ReturnStatement { .. } | NodeKind::ThrowStatement { .. } | NodeKind::BreakStatement | NodeKind::ContinueStatement
    )
}

/// Opt-in rule: script must contain at least `min_calls` calls to
/// `function_name`. Not part of [`crate::default_rules`] — constructed
/// directly by a caller that needs it (e.g. "must call `submitResult` at
/// least once").
pub struct RequiredFunctionCall {
    pub function_name: String,
    pub min_calls: usize,
}

impl RequiredFunctionCall {
    pub fn new(function_name: impl Into<String>, min_calls: usize) -> Self {
        Self { function_name: function_name.into(), min_calls }
    }
}

impl Rule for RequiredFunctionCall {
    fn name(&self) -> &'static str {
        "REQUIRED_FUNCTION_CALL"
    }

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>) {
        let mut count = 0usize;
        walk(tree, tree.root(), &mut |tree, id| {
            if let NodeKind::CallExpression { callee, .. } = &tree.get(id).kind {
                if callee_name(tree, *callee) == Some(self.function_name.as_str()) {
                    count += 1;
                }
            }
        });
        if count < self.min_calls {
            out.push(ValidationIssue::new(
                self.name(),
                Severity::Error,
                format!(
                    "expected at least {} call(s) to `{}`, found {count}",
                    self.min_calls, self.function_name
                ),
            ).at(loc(tree, ctx, tree.root())));
        }
    }
}
