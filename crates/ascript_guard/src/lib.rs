//! Rule engine and rule library (components B and C): walks a parsed
//! script once per rule and collects the issues that decide whether it is
//! safe to rewrite and run.

mod analysis;
mod rules;
mod walk;

use ascript_ast::Tree;
use ascript_common::SourceLocation;
use ascript_presets::Preset;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub data: Option<serde_json::Value>,
}

impl ValidationIssue {
    pub fn new(code: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self { code: code.into(), severity, message: message.into(), location: None, data: None }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }
}

/// Context handed to every rule: the source text (for location lookups
/// rules don't already have) and the preset governing this run.
pub struct ValidationContext<'a> {
    pub source: &'a str,
    pub preset: &'a Preset,
}

/// A pure predicate over the tree. Implementations must be side-effect
/// free: same tree + same context → same issues.
pub trait Rule: Send + Sync {
    /// Stable rule name, e.g. `NO_EVAL`. Used for rule identification, not
    /// necessarily equal to every issue code the rule emits (a rule can
    /// emit several related codes — `NO_REGEX_LITERAL` and
    /// `NO_REGEX_METHODS` both come from one rule).
    fn name(&self) -> &'static str;

    fn check(&self, tree: &Tree, ctx: &ValidationContext, out: &mut Vec<ValidationIssue>);
}

/// Walks the tree once per rule, in declaration order, aggregating
/// reports. Rule order is deterministic; within a rule, issues appear in
/// the order the rule's own traversal visits them.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name())
    }

    pub fn run(&self, tree: &Tree, ctx: &ValidationContext) -> ValidationResult {
        let mut issues = Vec::new();
        for rule in &self.rules {
            rule.check(tree, ctx, &mut issues);
        }
        let valid = !issues.iter().any(|i| i.severity == Severity::Error);
        ValidationResult { valid, issues }
    }
}

/// The full rule library in the declaration order the component table
/// lists them. `REQUIRED_FUNCTION_CALL` is intentionally excluded — it is
/// opt-in and only meaningful with a caller-supplied function name, so it
/// is constructed directly (`rules::RequiredFunctionCall::new(...)`) and
/// pushed onto the vec returned here when a caller wants it.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(rules::NoEval),
        Box::new(rules::DisallowedIdentifier),
        Box::new(rules::NoGlobalAccess),
        Box::new(rules::ForbiddenLoop),
        Box::new(rules::InfiniteLoop),
        Box::new(rules::ResourceExhaustion),
        Box::new(rules::NoJsonCallbacks),
        Box::new(rules::NoRegex),
        Box::new(rules::NoUserDefinedFunctions),
        Box::new(rules::ReservedPrefix),
        Box::new(rules::StaticCallTarget),
        Box::new(rules::CallArgValidation),
        Box::new(rules::NoComputedDestructuring),
        Box::new(rules::UnreachableCode),
    ]
}

pub use rules::RequiredFunctionCall;

/// Convenience entry point: build the default rule engine for `preset` and
/// run it over `tree`.
pub fn validate(tree: &Tree, source: &str, preset: &Preset) -> ValidationResult {
    let engine = RuleEngine::new(default_rules());
    let ctx = ValidationContext { source, preset };
    engine.run(tree, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel};

    fn parse(src: &str) -> Tree {
        ascript_ast::parse(src).unwrap().tree
    }

    #[test]
    fn flags_eval_call() {
        let tree = parse("eval('1+1');");
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, "eval('1+1');", &preset);
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.code == "NO_EVAL"));
    }

    #[test]
    fn flags_new_function() {
        let src = "new Function('return 1');";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "NO_EVAL"));
    }

    #[test]
    fn flags_string_settimeout() {
        let src = "setTimeout('x', 0);";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "NO_EVAL"));
    }

    #[test]
    fn flags_direct_constructor_access() {
        let src = "return obj.constructor;";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "DISALLOWED_IDENTIFIER"));
    }

    #[test]
    fn flags_array_coerced_constructor_access() {
        let src = "return obj[['constructor']];";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "DISALLOWED_IDENTIFIER"));
    }

    #[test]
    fn flags_tostring_coerced_constructor_access() {
        let src = "return obj[{toString:()=>'constructor'}];";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "DISALLOWED_IDENTIFIER"));
    }

    #[test]
    fn flags_conditional_coerced_constructor_access() {
        let src = "return obj[true?'constructor':'x'];";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "DISALLOWED_IDENTIFIER"));
    }

    #[test]
    fn flags_assignment_coerced_constructor_access() {
        let src = "let c; return obj[c='constructor'];";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "DISALLOWED_IDENTIFIER"));
    }

    #[test]
    fn flags_bigint_exponent_exhaustion() {
        let src = "return 2n ** 100001n;";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "RESOURCE_EXHAUSTION"));
    }

    #[test]
    fn flags_oversized_array_allocation() {
        let src = "return new Array(2000001);";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "RESOURCE_EXHAUSTION"));
    }

    #[test]
    fn flags_oversized_repeat() {
        let src = "return 'x'.repeat(200000);";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "RESOURCE_EXHAUSTION"));
    }

    #[test]
    fn flags_json_stringify_with_replacer_function() {
        let src = "JSON.stringify(this, w);";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "JSON_CALLBACK_NOT_ALLOWED"));
    }

    #[test]
    fn flags_while_true_as_infinite_loop() {
        let src = "while (true) {}";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Permissive, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "INFINITE_LOOP"));
    }

    #[test]
    fn flags_bare_for_as_infinite_loop() {
        let src = "for (;;) {}";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Permissive, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "INFINITE_LOOP"));
    }

    #[test]
    fn flags_function_declaration() {
        let src = "function f() {}";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "USER_DEFINED_FUNCTION"));
    }

    #[test]
    fn flags_non_literal_call_tool_target() {
        let src = "callTool(name, {});";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "STATIC_CALL_TARGET"));
    }

    #[test]
    fn accepts_happy_path_script() {
        let src = "return 2 + 2;";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.valid, "unexpected issues: {:?}", result.issues);
    }

    #[test]
    fn strict_forbids_while_loop_entirely() {
        let src = "while (x < 10) { x++; }";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Strict, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "FORBIDDEN_LOOP"));
    }

    #[test]
    fn flags_reserved_prefix_identifier() {
        let src = "let __safe_x = 1;";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "RESERVED_PREFIX"));
    }

    #[test]
    fn flags_computed_destructuring() {
        let src = "const { [k]: v } = callTool('x', {});";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Standard, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "NO_COMPUTED_DESTRUCTURING"));
    }

    #[test]
    fn flags_unreachable_code_after_return() {
        let src = "function noop() { return 1; const x = 2; }";
        let tree = parse(src);
        let preset = ascript_presets::stock_preset(SecurityLevel::Permissive, Profile::AgentScript);
        let result = validate(&tree, src, &preset);
        assert!(result.issues.iter().any(|i| i.code == "UNREACHABLE_CODE" && i.severity == Severity::Warning));
    }
}
