//! Project configuration file support for promptloops.
//!
//! Loads configuration from `promptloops.toml` in the working directory.

use anyhow::{Context, Result};
use promptloops_eval::{FieldSpec, MatchPolicy, SchemaDescriptor};
use serde::Deserialize;
use std::path::Path;

/// Project-level configuration loaded from `promptloops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default provider (applies to both agent and mentor)
    pub provider: Option<String>,
    /// Global default model (applies to both agent and mentor)
    pub model: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Agent-specific configuration
    #[serde(default)]
    pub agent: RoleConfig,
    /// Mentor-specific configuration
    #[serde(default)]
    pub mentor: RoleConfig,
    #[serde(default)]
    pub optimizer: OptimizerSection,
    /// Scoring normalization
    pub matching: Option<MatchPolicy>,
    /// Target fields, in prompt order
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// Configuration for a specific role (agent or mentor)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Provider to use for this role
    pub provider: Option<String>,
    /// Model to use for this role
    pub model: Option<String>,
}

/// `[optimizer]` table. Counts are signed so bad values surface as
/// configuration errors rather than parse errors.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OptimizerSection {
    pub loops: Option<i64>,
    pub window: Option<i64>,
    pub concurrency: Option<usize>,
    pub top_errors: Option<usize>,
    pub max_error_examples: Option<usize>,
    pub excerpt_chars: Option<usize>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "promptloops.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective provider for the agent role.
    /// Priority: [agent].provider > global provider > None
    pub fn agent_provider(&self) -> Option<&str> {
        self.agent.provider.as_deref().or(self.provider.as_deref())
    }

    /// Priority: [agent].model > global model > None
    pub fn agent_model(&self) -> Option<&str> {
        self.agent.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [mentor].provider > global provider > None
    pub fn mentor_provider(&self) -> Option<&str> {
        self.mentor.provider.as_deref().or(self.provider.as_deref())
    }

    /// Priority: [mentor].model > global model > None
    pub fn mentor_model(&self) -> Option<&str> {
        self.mentor.model.as_deref().or(self.model.as_deref())
    }

    /// Schema from `[[fields]]`, if any were declared
    pub fn schema(&self) -> Result<Option<SchemaDescriptor>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        let schema = SchemaDescriptor::new(self.fields.clone())
            .with_context(|| format!("Invalid [[fields]] in {}", CONFIG_FILE_NAME))?;
        Ok(Some(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_eval::FieldKind;

    const FULL: &str = r#"
provider = "claude"
model = "sonnet"
timeout_secs = 90

[mentor]
model = "opus"

[optimizer]
loops = 5
window = 3
concurrency = 8

[matching]
case_insensitive = false

[[fields]]
name = "email"
type = "string"
required = true
description = "Primary email address"

[[fields]]
name = "age"
type = "integer"
"#;

    #[test]
    fn test_parse_full_config() {
        let config: ProjectConfig = toml::from_str(FULL).unwrap();

        assert_eq!(config.agent_provider(), Some("claude"));
        assert_eq!(config.agent_model(), Some("sonnet"));
        assert_eq!(config.mentor_model(), Some("opus"));
        assert_eq!(config.timeout_secs, Some(90));
        assert_eq!(config.optimizer.loops, Some(5));
        assert_eq!(config.optimizer.window, Some(3));

        let matching = config.matching.unwrap();
        assert!(!matching.case_insensitive);
        assert!(matching.collapse_whitespace);

        let schema = config.schema().unwrap().unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["email", "age"]);
        assert_eq!(schema.fields[1].kind, FieldKind::Integer);
        assert!(schema.fields[0].required);
    }

    #[test]
    fn test_role_overrides_global() {
        let config: ProjectConfig = toml::from_str(
            r#"
provider = "claude"
[agent]
provider = "opencode"
"#,
        )
        .unwrap();
        assert_eq!(config.agent_provider(), Some("opencode"));
        assert_eq!(config.mentor_provider(), Some("claude"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<ProjectConfig>("agentt = \"claude\"").is_err());
        assert!(toml::from_str::<ProjectConfig>("[optimizer]\nloop = 3").is_err());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let config: ProjectConfig = toml::from_str(
            r#"
[[fields]]
name = "email"
[[fields]]
name = "email"
"#,
        )
        .unwrap();
        assert!(config.schema().is_err());
    }

    #[test]
    fn test_load_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "model = \"haiku\"\n").unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.mentor_model(), Some("haiku"));

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "model = [").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
