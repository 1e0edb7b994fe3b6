//! On-disk broker configuration: the handful of settings that govern every
//! session this process creates. Loaded once at startup from an optional
//! TOML file; anything unset falls back to a hardcoded default, the same
//! way a minimal bootstrap config degrades gracefully to defaults when its
//! file is absent.

use std::path::Path;

use anyhow::Context;
use ascript_presets::SecurityLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrokerConfig {
    /// The security level every session this broker creates is held to.
    /// Not something a client can escalate via a `create_session` request —
    /// only the limit overrides inside that level are client-adjustable.
    #[serde(default = "default_security_level")]
    pub security_level: SecurityLevel,

    /// Upper bound on concurrently live sessions (`maxSessions`).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { security_level: default_security_level(), max_sessions: default_max_sessions() }
    }
}

fn default_security_level() -> SecurityLevel {
    SecurityLevel::Standard
}

fn default_max_sessions() -> usize {
    100
}

impl BrokerConfig {
    /// Loads from `path` if given, else returns the default configuration.
    /// A given path that doesn't parse is an error; a given path that
    /// doesn't exist is not — same leniency the CLI's `--config` flag
    /// extends to an optional file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_missing_path_falls_back_to_defaults() {
        let config = BrokerConfig::load(Some(Path::new("/nonexistent/ascript-broker.toml"))).unwrap();
        assert_eq!(config.max_sessions, 100);
    }

    #[test]
    fn no_path_at_all_falls_back_to_defaults() {
        let config = BrokerConfig::load(None).unwrap();
        assert_eq!(config.max_sessions, default_max_sessions());
    }
}
