//! Session configuration, persisted as `.workflow/config.json`.
//!
//! The wire format uses camelCase keys because external workers and tooling
//! read the same file. Unknown keys are ignored so newer workers can extend
//! the file without breaking the orchestrator.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default bound on refine cycles before escalation.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Configuration for one workflow session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Maximum refine iterations before the operator is escalated to.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Worker roles participating in the implementation phase.
    #[serde(default = "default_workers")]
    pub workers: Vec<String>,
    /// Named checks the reviewer is instructed to apply.
    #[serde(default)]
    pub review_checks: BTreeMap<String, bool>,
    /// Advisory path globs per role, substituted into instruction text.
    /// Roles without an entry get an unrestricted scope.
    #[serde(default)]
    pub scopes: BTreeMap<String, Vec<String>>,
    /// Terminal-multiplexer session workers run inside.
    #[serde(default = "default_session")]
    pub session: String,
    /// Trunk branch override; auto-detected (main, then master) when absent.
    #[serde(default)]
    pub trunk_branch: Option<String>,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_workers() -> Vec<String> {
    vec!["backend".into(), "frontend".into(), "tests".into()]
}

fn default_session() -> String {
    "workflow".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            workers: default_workers(),
            review_checks: BTreeMap::new(),
            scopes: BTreeMap::new(),
            session: default_session(),
            trunk_branch: None,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The multiplexer target a role's instructions are delivered to.
    ///
    /// Destinations are opaque strings to the rest of the system; this is
    /// merely the default session:window convention.
    pub fn destination(&self, role: &str) -> String {
        format!("{}:{}", self.session, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.workers, vec!["backend", "frontend", "tests"]);
        assert!(config.review_checks.is_empty());
        assert_eq!(config.session, "workflow");
        assert!(config.trunk_branch.is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = WorkflowConfig::default();
        config.max_iterations = 5;
        config.workers = vec!["api".into(), "web".into()];
        config.review_checks.insert("lint".into(), true);
        config.save(&path).unwrap();

        let loaded = WorkflowConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        WorkflowConfig::default().save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"maxIterations\""));
        assert!(raw.contains("\"reviewChecks\""));
    }

    #[test]
    fn test_load_applies_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"workers": ["solo"]}"#).unwrap();

        let config = WorkflowConfig::load(&path).unwrap();
        assert_eq!(config.workers, vec!["solo"]);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.session, "workflow");
    }

    #[test]
    fn test_load_ignores_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"maxIterations": 2, "futureKnob": true}"#).unwrap();

        let config = WorkflowConfig::load(&path).unwrap();
        assert_eq!(config.max_iterations, 2);
    }

    #[test]
    fn test_load_or_default_when_absent() {
        let dir = tempdir().unwrap();
        let config = WorkflowConfig::load_or_default(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, WorkflowConfig::default());
    }

    #[test]
    fn test_load_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let result = WorkflowConfig::load(&path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse config JSON")
        );
    }

    #[test]
    fn test_destination_convention() {
        let config = WorkflowConfig::default();
        assert_eq!(config.destination("backend"), "workflow:backend");
    }
}
