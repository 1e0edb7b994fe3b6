//! Preset builder (component D).
//!
//! A [`Preset`] is the single source of truth for "what is this script
//! allowed to do": the identifier allow-list, which loop kinds are
//! permitted, resource-exhaustion thresholds, and the default runtime
//! limits for a [`SecurityLevel`]. Built with explicit builder methods —
//! no implicit global state, no env-var sniffing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

mod defaults;

pub use defaults::*;

/// Security level, from least to most permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Strict,
    Secure,
    Standard,
    Permissive,
}

/// Which caller profile a preset is being built for. Profiles share the
/// rule library but differ in budgets; Babel scripts additionally carry a
/// byte/file transform budget that agent scripts don't need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    AgentScript,
    Babel,
}

/// Loop constructs a preset may or may not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
    ForIn,
    ForOf,
}

impl LoopKind {
    pub const ALL: [LoopKind; 5] = [
        LoopKind::For,
        LoopKind::While,
        LoopKind::DoWhile,
        LoopKind::ForIn,
        LoopKind::ForOf,
    ];
}

/// Resource-exhaustion thresholds enforced by the `RESOURCE_EXHAUSTION` rule
/// and, redundantly, by the runtime (defense in depth — the guard can be
/// wrong about static resolvability, the runtime never is).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceThresholds {
    pub max_bigint_exponent: u64,
    pub max_array_length: u64,
    pub max_repeat_count: u64,
}

/// Byte/file budgets for the Babel transform profile. Unused by
/// `AgentScript` presets; kept as a field rather than a separate type so
/// `Preset` has one shape regardless of profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformBudget {
    pub max_input_bytes: u64,
    pub max_output_files: u32,
}

/// Runtime limits a session is started with; see `ascript_resources` for the
/// live counters these bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLimits {
    pub timeout_ms: u64,
    pub max_iterations: u64,
    pub max_tool_calls: u64,
    pub max_stdout_bytes: u64,
    pub max_tool_result_bytes: u64,
    pub tool_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub session_ttl_ms: u64,
}

/// A fully composed preset: everything the guard, rewriter, and runtime
/// need to agree on for one security level and profile.
#[derive(Debug, Clone)]
pub struct Preset {
    pub level: SecurityLevel,
    pub profile: Profile,
    allowed_globals: BTreeSet<String>,
    allowed_loops: BTreeSet<LoopKind>,
    pub resource_thresholds: ResourceThresholds,
    pub transform_budget: TransformBudget,
    pub limits: RuntimeLimits,
    /// Optional allowlist of tool names for `STATIC_CALL_TARGET` (exact or
    /// regex, stored as raw patterns — matching happens in the rule).
    pub tool_name_patterns: Option<Vec<String>>,
}

impl Preset {
    pub fn is_global_allowed(&self, name: &str) -> bool {
        self.allowed_globals.contains(name)
    }

    pub fn allowed_globals(&self) -> impl Iterator<Item = &str> {
        self.allowed_globals.iter().map(String::as_str)
    }

    pub fn is_loop_allowed(&self, kind: LoopKind) -> bool {
        self.allowed_loops.contains(&kind)
    }
}

/// Builds a [`Preset`] for a given level and profile, applying the defaults
/// table and then any explicit overrides.
pub struct PresetBuilder {
    level: SecurityLevel,
    profile: Profile,
    extra_globals: BTreeSet<String>,
    remove_globals: BTreeSet<String>,
    allowed_loops: Option<BTreeSet<LoopKind>>,
    resource_thresholds: Option<ResourceThresholds>,
    limits: Option<RuntimeLimits>,
    tool_name_patterns: Option<Vec<String>>,
}

impl PresetBuilder {
    pub fn new(level: SecurityLevel, profile: Profile) -> Self {
        Self {
            level,
            profile,
            extra_globals: BTreeSet::new(),
            remove_globals: BTreeSet::new(),
            allowed_loops: None,
            resource_thresholds: None,
            limits: None,
            tool_name_patterns: None,
        }
    }

    /// PERMISSIVE's one documented extension point: allow `console` /
    /// `__safe_console` in addition to the level's base globals.
    pub fn with_extra_global(mut self, name: impl Into<String>) -> Self {
        self.extra_globals.insert(name.into());
        self
    }

    pub fn without_global(mut self, name: impl Into<String>) -> Self {
        self.remove_globals.insert(name.into());
        self
    }

    pub fn with_loops(mut self, loops: impl IntoIterator<Item = LoopKind>) -> Self {
        self.allowed_loops = Some(loops.into_iter().collect());
        self
    }

    pub fn with_resource_thresholds(mut self, thresholds: ResourceThresholds) -> Self {
        self.resource_thresholds = Some(thresholds);
        self
    }

    pub fn with_limits(mut self, limits: RuntimeLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_tool_name_patterns(mut self, patterns: Vec<String>) -> Self {
        self.tool_name_patterns = Some(patterns);
        self
    }

    pub fn build(self) -> Preset {
        let mut allowed_globals: BTreeSet<String> =
            base_globals(self.level).iter().map(|s| s.to_string()).collect();
        allowed_globals.extend(self.extra_globals);
        for removed in &self.remove_globals {
            allowed_globals.remove(removed);
        }

        let allowed_loops = self
            .allowed_loops
            .unwrap_or_else(|| base_loops(self.level).into_iter().collect());

        Preset {
            level: self.level,
            profile: self.profile,
            allowed_globals,
            allowed_loops,
            resource_thresholds: self.resource_thresholds.unwrap_or_else(default_resource_thresholds),
            transform_budget: default_transform_budget(self.level),
            limits: self.limits.unwrap_or_else(|| default_limits(self.level)),
            tool_name_patterns: self.tool_name_patterns,
        }
    }
}

/// Convenience: build the stock preset for a level with no overrides.
pub fn stock_preset(level: SecurityLevel, profile: Profile) -> Preset {
    PresetBuilder::new(level, profile).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_forbids_unbounded_loops() {
        let preset = stock_preset(SecurityLevel::Strict, Profile::AgentScript);
        assert!(preset.is_loop_allowed(LoopKind::ForOf));
        assert!(!preset.is_loop_allowed(LoopKind::While));
    }

    #[test]
    fn permissive_allows_all_loops_and_console() {
        let preset = stock_preset(SecurityLevel::Permissive, Profile::AgentScript);
        for kind in LoopKind::ALL {
            assert!(preset.is_loop_allowed(kind));
        }
        assert!(preset.is_global_allowed("console"));
    }

    #[test]
    fn builder_overrides_are_applied_on_top_of_defaults() {
        let preset = PresetBuilder::new(SecurityLevel::Secure, Profile::AgentScript)
            .with_extra_global("console")
            .without_global("Date")
            .build();
        assert!(preset.is_global_allowed("console"));
        assert!(!preset.is_global_allowed("Date"));
        // Untouched defaults remain.
        assert!(preset.is_global_allowed("Math"));
    }

    #[test]
    fn levels_escalate_iteration_and_timeout_budgets() {
        let strict = stock_preset(SecurityLevel::Strict, Profile::AgentScript);
        let permissive = stock_preset(SecurityLevel::Permissive, Profile::AgentScript);
        assert!(strict.limits.max_iterations < permissive.limits.max_iterations);
        assert!(strict.limits.timeout_ms < permissive.limits.timeout_ms);
    }
}
