//! Configuration system for the check engine
//!
//! Reads configuration from:
//! - `.formcheckrc.yaml` / `.formcheckrc.json` / `formcheck.yaml` (project-level)
//! - the same names in the home directory (user-level)

use crate::check::ParameterSource;
use crate::diagnostic::Severity;
use crate::path::{IdentityMatcher, DEFAULT_IDENTITY_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate targets in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,

    /// Run expensive checks on incremental re-checks too
    pub expensive_on_change: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
            expensive_on_change: false,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,

    /// Show statistics
    pub statistics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            verbose: false,
            statistics: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Check selection, severities and parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Disabled checks
    pub disabled: Vec<String>,

    /// Enabled checks (empty = all)
    pub enabled: Vec<String>,

    /// Severity overrides (check_id -> severity)
    pub severity: HashMap<String, Severity>,

    /// Parameter overrides (check_id -> name -> value)
    pub parameters: HashMap<String, HashMap<String, serde_yaml::Value>>,
}

/// Spellings of the identity reference field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Accepted last segments of a field data path
    pub names: Vec<String>,

    /// Field name looked up in the list's main table (default: first name)
    pub schema_field: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_IDENTITY_NAMES.iter().map(|s| s.to_string()).collect(),
            schema_field: None,
        }
    }
}

impl IdentityConfig {
    pub fn matcher(&self) -> IdentityMatcher {
        IdentityMatcher::new(self.names.iter().cloned())
    }

    pub fn schema_field(&self) -> String {
        self.schema_field
            .clone()
            .or_else(|| self.names.first().cloned())
            .unwrap_or_else(|| DEFAULT_IDENTITY_NAMES[0].to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend from other configuration files or presets
    #[serde(default)]
    pub extends: Vec<String>,

    /// Engine settings
    pub engine: EngineConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Check configuration
    pub checks: ChecksConfig,

    /// Identity field spellings
    pub identity: IdentityConfig,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::default()),
            "ui" => Some(Self::preset_only(&["form-list-field-ref-not-added"])),
            "code" => Some(Self::preset_only(&["self-reference"])),
            _ => None,
        }
    }

    fn preset_only(ids: &[&str]) -> Self {
        let mut config = Self::default();
        config.checks.enabled = ids.iter().map(|s| s.to_string()).collect();
        config
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    /// Load with recursion depth limit (to prevent infinite loops)
    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        if !config.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base_config = Self::default();

            for extend in &config.extends.clone() {
                let extended = if let Some(preset) = Self::preset(extend) {
                    preset
                } else {
                    let extend_path = if Path::new(extend).is_absolute() {
                        PathBuf::from(extend)
                    } else {
                        base_dir.join(extend)
                    };
                    Self::load_with_depth(&extend_path, depth + 1)?
                };
                base_config.merge(extended);
            }

            // Current file wins over everything it extends
            base_config.merge(config);
            config = base_config;
        }

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;
        if other.engine.expensive_on_change {
            self.engine.expensive_on_change = true;
        }

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
        self.output.statistics = other.output.statistics;

        self.checks.disabled.extend(other.checks.disabled);
        if !other.checks.enabled.is_empty() {
            self.checks.enabled = other.checks.enabled;
        }
        self.checks.severity.extend(other.checks.severity);
        for (check_id, params) in other.checks.parameters {
            self.checks
                .parameters
                .entry(check_id)
                .or_default()
                .extend(params);
        }

        if other.identity.names != IdentityConfig::default().names {
            self.identity.names = other.identity.names;
        }
        if other.identity.schema_field.is_some() {
            self.identity.schema_field = other.identity.schema_field;
        }
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [
            ".formcheckrc.yaml",
            ".formcheckrc.yml",
            ".formcheckrc.json",
            "formcheck.yaml",
            "formcheck.yml",
            "formcheck.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_checks: Option<Vec<String>>,
        enabled_checks: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_checks {
            self.checks.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_checks {
            self.checks.enabled = enabled;
        }
    }

    /// Set one parameter override (e.g. from `--param check:name=value`)
    pub fn set_parameter(&mut self, check_id: &str, name: &str, value: &str) {
        self.checks
            .parameters
            .entry(check_id.to_string())
            .or_default()
            .insert(name.to_string(), serde_yaml::Value::String(value.to_string()));
    }

    /// Check if a check is enabled
    pub fn is_check_enabled(&self, check_id: &str) -> bool {
        if self.checks.disabled.iter().any(|id| id == check_id) {
            return false;
        }
        if !self.checks.enabled.is_empty() {
            return self.checks.enabled.iter().any(|id| id == check_id);
        }
        true
    }

    /// Get severity override for a check
    pub fn get_severity_override(&self, check_id: &str) -> Option<Severity> {
        self.checks.severity.get(check_id).copied()
    }

    /// String-encoded parameter overrides of one check
    pub fn parameters_for(&self, check_id: &str) -> HashMap<String, String> {
        self.checks
            .parameters
            .get(check_id)
            .map(|params| {
                params
                    .iter()
                    .map(|(name, value)| (name.clone(), encode_parameter(value)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn encode_parameter(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Live parameter settings, editable between runs
///
/// The engine reads it through [`ParameterSource`] on every evaluation, so an
/// edit applies to the next run without re-registering anything.
#[derive(Debug, Default)]
pub struct SettingsStore {
    values: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with the configured overrides
    pub fn from_config(config: &Config) -> Self {
        let values = config
            .checks
            .parameters
            .keys()
            .map(|check_id| (check_id.clone(), config.parameters_for(check_id)))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn set_parameter(&self, check_id: &str, name: &str, value: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values
            .entry(check_id.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    /// Drop an override so the declared default applies again
    pub fn reset_parameter(&self, check_id: &str, name: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        if let Some(params) = values.get_mut(check_id) {
            params.remove(name);
        }
    }
}

impl ParameterSource for SettingsStore {
    fn parameters(&self, check_id: &str) -> HashMap<String, String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(check_id).cloned().unwrap_or_default()
    }
}
