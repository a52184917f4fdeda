//! Configuration loading, validation, and management for ClawFlow.
//!
//! Loads configuration from `~/.clawflow/config.toml` with environment
//! variable overrides. Validates all settings at load time; the pattern
//! constructors then turn the tables below into their typed forms and fail
//! if a required key is missing.

use clawflow_core::ModelTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.clawflow/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tool-call loop settings
    #[serde(default)]
    pub tool_loop: ToolLoopConfig,

    /// Concurrency caps for fan-out and worker groups
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Quality gate rubric and prompts
    #[serde(default)]
    pub quality_gate: QualityGateConfig,

    /// Fan-out synthesis settings
    #[serde(default)]
    pub fan_out: FanOutConfig,

    /// Router instruction and tier tables
    #[serde(default)]
    pub router: RouterConfig,

    /// Orchestrator planner and worker settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLoopConfig {
    /// Maximum number of model calls in one run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// System instruction attached to every loop request, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

fn default_max_steps() -> usize {
    5
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_instruction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound on a single model call
    #[serde(default = "default_model_secs")]
    pub model_secs: u64,

    /// Upper bound on a single tool execution
    #[serde(default = "default_tool_secs")]
    pub tool_secs: u64,
}

fn default_model_secs() -> u64 {
    60
}
fn default_tool_secs() -> u64 {
    10
}

impl TimeoutConfig {
    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }

    pub fn tool(&self) -> Duration {
        Duration::from_secs(self.tool_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            model_secs: default_model_secs(),
            tool_secs: default_tool_secs(),
        }
    }
}

/// The pass condition for one quality metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Threshold {
    /// A boolean metric must equal `expected`.
    Flag { expected: bool },
    /// A numeric metric must be at least `min`.
    AtLeast { min: f64 },
}

/// One rubric line: the metric it reads, how it passes, and the instruction
/// line used verbatim when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCriterion {
    pub metric: String,
    pub description: String,
    pub threshold: Threshold,
    pub instruction: String,
}

impl QualityCriterion {
    pub fn flag(metric: &str, description: &str, instruction: &str) -> Self {
        Self {
            metric: metric.into(),
            description: description.into(),
            threshold: Threshold::Flag { expected: true },
            instruction: instruction.into(),
        }
    }

    pub fn at_least(metric: &str, description: &str, min: f64, instruction: &str) -> Self {
        Self {
            metric: metric.into(),
            description: description.into(),
            threshold: Threshold::AtLeast { min },
            instruction: instruction.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateConfig {
    /// Prompt prefix for the first draft; the input follows it.
    #[serde(default = "default_draft_instruction")]
    pub draft_instruction: String,

    #[serde(default = "default_criteria")]
    pub criteria: Vec<QualityCriterion>,
}

fn default_draft_instruction() -> String {
    "Write persuasive marketing copy for the following. Focus on benefits and emotional appeal.".into()
}

fn default_criteria() -> Vec<QualityCriterion> {
    vec![
        QualityCriterion::flag(
            "has_call_to_action",
            "Presence of a call to action (true/false)",
            "A clear call to action",
        ),
        QualityCriterion::at_least(
            "emotional_appeal",
            "Emotional appeal (1-10)",
            7.0,
            "Stronger emotional appeal",
        ),
        QualityCriterion::at_least(
            "clarity",
            "Clarity (1-10)",
            7.0,
            "Improved clarity and directness",
        ),
    ]
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            draft_instruction: default_draft_instruction(),
            criteria: default_criteria(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOutConfig {
    #[serde(default = "default_synthesis_instruction")]
    pub synthesis_instruction: String,
}

fn default_synthesis_instruction() -> String {
    "You are a technical lead summarizing multiple code reviews.".into()
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            synthesis_instruction: default_synthesis_instruction(),
        }
    }
}

/// Routing tables keyed by the lowercase enum names (`general`, `simple`, ...).
///
/// Kept as string-keyed maps so a partial table still parses; the router
/// rejects it at construction with the missing key named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub classifier_tier: ModelTier,

    /// Query category → system instruction
    #[serde(default = "default_router_instructions")]
    pub instructions: BTreeMap<String, String>,

    /// Query complexity → model tier
    #[serde(default = "default_router_tiers")]
    pub tiers: BTreeMap<String, ModelTier>,
}

fn default_router_instructions() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "general".to_string(),
            "You are an expert customer service agent handling general inquiries.".to_string(),
        ),
        (
            "refund".to_string(),
            "You are a customer service agent specializing in refund requests. Follow company policy and collect necessary information.".to_string(),
        ),
        (
            "technical".to_string(),
            "You are a technical support specialist with deep product knowledge. Focus on clear step-by-step troubleshooting.".to_string(),
        ),
    ])
}

fn default_router_tiers() -> BTreeMap<String, ModelTier> {
    BTreeMap::from([
        ("simple".to_string(), ModelTier::Fast),
        ("complex".to_string(), ModelTier::Reasoning),
    ])
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            classifier_tier: ModelTier::Fast,
            instructions: default_router_instructions(),
            tiers: default_router_tiers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_planner_tier")]
    pub planner_tier: ModelTier,

    #[serde(default)]
    pub worker_tier: ModelTier,

    #[serde(default = "default_planner_instruction")]
    pub planner_instruction: String,

    /// Task kind → worker system instruction
    #[serde(default = "default_worker_instructions")]
    pub workers: BTreeMap<String, String>,
}

fn default_planner_tier() -> ModelTier {
    ModelTier::Reasoning
}

fn default_planner_instruction() -> String {
    "You're a senior software architect planning feature implementations.".into()
}

fn default_worker_instructions() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "create".to_string(),
            "You are an expert at implementing new files following the best practices and project patterns.".to_string(),
        ),
        (
            "modify".to_string(),
            "You are an expert at modifying existing code while maintaining consistency and avoiding regression.".to_string(),
        ),
        (
            "delete".to_string(),
            "You are an expert at safely removing code while ensuring no breaking changes.".to_string(),
        ),
    ])
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            planner_tier: default_planner_tier(),
            worker_tier: ModelTier::Fast,
            planner_instruction: default_planner_instruction(),
            workers: default_worker_instructions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `CLAWFLOW_*` overrides read through `lookup`.
    ///
    /// Takes the lookup as a parameter so tests need not touch the process
    /// environment.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("CLAWFLOW_MAX_STEPS") {
            self.tool_loop.max_steps = parse_env("CLAWFLOW_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("CLAWFLOW_MAX_CONCURRENCY") {
            self.concurrency.max_concurrency = parse_env("CLAWFLOW_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("CLAWFLOW_MODEL_TIMEOUT_SECS") {
            self.timeouts.model_secs = parse_env("CLAWFLOW_MODEL_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clawflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_loop.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "tool_loop.max_steps must be positive".into(),
            ));
        }
        if self.concurrency.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency.max_concurrency must be positive".into(),
            ));
        }
        if self.timeouts.model_secs == 0 || self.timeouts.tool_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be positive".into(),
            ));
        }
        if self.quality_gate.criteria.is_empty() {
            return Err(ConfigError::ValidationError(
                "quality_gate.criteria must not be empty".into(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for criterion in &self.quality_gate.criteria {
            if !seen.insert(criterion.metric.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate quality metric '{}'",
                    criterion.metric
                )));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tool_loop: ToolLoopConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            timeouts: TimeoutConfig::default(),
            quality_gate: QualityGateConfig::default(),
            fan_out: FanOutConfig::default(),
            router: RouterConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{key}={value:?}: {e}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for clawflow_core::Error {
    fn from(e: ConfigError) -> Self {
        clawflow_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tool_loop.max_steps, 5);
        assert_eq!(config.orchestrator.planner_tier, ModelTier::Reasoning);
        assert_eq!(config.router.tiers["complex"], ModelTier::Reasoning);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_max_steps_rejected() {
        let mut config = AppConfig::default();
        config.tool_loop.max_steps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn duplicate_metric_rejected() {
        let mut config = AppConfig::default();
        let first = config.quality_gate.criteria[0].clone();
        config.quality_gate.criteria.push(first);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("has_call_to_action"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tool_loop]
max_steps = 8

[router.instructions]
general = "Be helpful."
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.tool_loop.max_steps, 8);
        assert_eq!(config.concurrency.max_concurrency, 4);
        // An explicit table replaces the default one wholesale.
        assert_eq!(config.router.instructions.len(), 1);
    }

    #[test]
    fn threshold_parses_from_inline_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[quality_gate.criteria]]
metric = "clarity"
description = "Clarity (1-10)"
threshold = {{ kind = "at_least", min = 8 }}
instruction = "Be clearer"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.quality_gate.criteria.len(), 1);
        assert_eq!(config.quality_gate.criteria[0].threshold, Threshold::AtLeast { min: 8.0 });
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tool_loop\nmax_steps = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| match key {
                "CLAWFLOW_MAX_STEPS" => Some("12".into()),
                "CLAWFLOW_MODEL_TIMEOUT_SECS" => Some(" 3 ".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.tool_loop.max_steps, 12);
        assert_eq!(config.timeouts.model(), Duration::from_secs(3));
        assert_eq!(config.concurrency.max_concurrency, 4);
    }

    #[test]
    fn bad_env_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|key| (key == "CLAWFLOW_MAX_CONCURRENCY").then(|| "many".into()))
            .unwrap_err();
        assert!(err.to_string().contains("CLAWFLOW_MAX_CONCURRENCY"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_steps"));
        assert!(toml_str.contains("refund"));
    }
}
