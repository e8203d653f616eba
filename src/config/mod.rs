//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`TEMPLATE_GUARD_*`)
//! - CLI arguments (for the `template-guard` binary)
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! [validator]
//! max_content_length = 20000
//!
//! [monitor]
//! alert_critical_count = 5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TEMPLATE_GUARD_";

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Validator limits
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Monitor thresholds
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Sanitizer behaviour
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

impl GuardConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| GuardError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay `TEMPLATE_GUARD_*` environment variables
    pub fn with_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`, keyed by full variable name
    /// (e.g. `TEMPLATE_GUARD_MAX_CONTENT_LENGTH`).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        // Validator settings
        override_parsed(&get, "MIN_CONTENT_LENGTH", &mut self.validator.min_content_length)?;
        override_parsed(&get, "MAX_CONTENT_LENGTH", &mut self.validator.max_content_length)?;
        override_parsed(&get, "MAX_NESTING_DEPTH", &mut self.validator.max_nesting_depth)?;
        override_parsed(&get, "MAX_VARIABLE_COUNT", &mut self.validator.max_variable_count)?;
        override_parsed(&get, "REJECT_THRESHOLD", &mut self.validator.reject_threshold)?;
        override_parsed(&get, "MAX_PAYLOAD_BYTES", &mut self.validator.max_payload_bytes)?;
        override_parsed(&get, "DECODE_VARIANTS", &mut self.validator.decode_variants)?;

        // Monitor settings
        override_parsed(&get, "ALERT_CRITICAL_COUNT", &mut self.monitor.alert_critical_count)?;
        override_parsed(&get, "ALERT_TOTAL_COUNT", &mut self.monitor.alert_total_count)?;
        override_parsed(&get, "RETENTION_WINDOW_SECS", &mut self.monitor.retention_window_secs)?;
        override_parsed(&get, "ALERT_COOLDOWN_SECS", &mut self.monitor.alert_cooldown_secs)?;
        override_parsed(&get, "MAX_EVENTS_PER_USER", &mut self.monitor.max_events_per_user)?;
        override_parsed(&get, "TOP_USERS_LIMIT", &mut self.monitor.top_users_limit)?;

        // Sanitizer settings
        override_parsed(
            &get,
            "STRIP_TEMPLATE_IDENTIFIERS",
            &mut self.sanitizer.strip_template_identifiers,
        )?;

        self.validate()?;
        Ok(self)
    }

    /// Default config file location: `<config_dir>/template-guard/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("template-guard").join("config.toml"))
    }

    /// Reject limits that would make validation or alerting meaningless
    pub fn validate(&self) -> Result<()> {
        let v = &self.validator;
        if v.max_content_length == 0 {
            return Err(GuardError::Config("max_content_length must be > 0".into()));
        }
        if v.min_content_length > v.max_content_length {
            return Err(GuardError::Config(format!(
                "min_content_length ({}) exceeds max_content_length ({})",
                v.min_content_length, v.max_content_length
            )));
        }
        if v.max_nesting_depth == 0 {
            return Err(GuardError::Config("max_nesting_depth must be > 0".into()));
        }
        if v.max_payload_bytes == 0 {
            return Err(GuardError::Config("max_payload_bytes must be > 0".into()));
        }

        let m = &self.monitor;
        if m.alert_critical_count == 0 || m.alert_total_count == 0 {
            return Err(GuardError::Config("alert thresholds must be > 0".into()));
        }
        if m.retention_window_secs == 0 {
            return Err(GuardError::Config(
                "retention_window_secs must be > 0".into(),
            ));
        }
        if m.max_events_per_user == 0 {
            return Err(GuardError::Config("max_events_per_user must be > 0".into()));
        }
        Ok(())
    }
}

fn override_parsed<T, G>(get: &G, name: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *target = raw.trim().parse().map_err(|e| {
            GuardError::Config(format!("Invalid value for {ENV_PREFIX}{name} ({raw:?}): {e}"))
        })?;
    }
    Ok(())
}

/// Validator limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum template length in characters
    pub min_content_length: usize,

    /// Maximum template length in characters
    pub max_content_length: usize,

    /// `{{` nesting depth at which a template is rejected
    pub max_nesting_depth: usize,

    /// Distinct variables above which a warning is raised
    pub max_variable_count: usize,

    /// Highest risk score still considered secure
    pub reject_threshold: u32,

    /// Inputs larger than this many bytes are rejected unscanned
    pub max_payload_bytes: usize,

    /// Also scan decoded variants of the input
    pub decode_variants: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_content_length: 1,
            max_content_length: 50_000,
            max_nesting_depth: 10,
            max_variable_count: 100,
            reject_threshold: 0,
            max_payload_bytes: 1024 * 1024, // 1 MiB
            decode_variants: true,
        }
    }
}

/// Monitor thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// CRITICAL events in the window that raise an alert
    pub alert_critical_count: usize,

    /// Events of any severity in the window that raise an alert
    pub alert_total_count: usize,

    /// Sliding window length in seconds
    pub retention_window_secs: u64,

    /// Re-triggers within this many seconds update the open alert
    pub alert_cooldown_secs: u64,

    /// Events kept per user regardless of age
    pub max_events_per_user: usize,

    /// Length of `top_violating_users` in statistics
    pub top_users_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alert_critical_count: 3,
            alert_total_count: 10,
            retention_window_secs: 3600, // 1 hour
            alert_cooldown_secs: 300,    // 5 minutes
            max_events_per_user: 1000,
            top_users_limit: 10,
        }
    }
}

impl MonitorConfig {
    /// Retention window as a duration
    pub fn retention_window(&self) -> chrono::Duration {
        seconds(self.retention_window_secs)
    }

    /// Alert cooldown as a duration
    pub fn alert_cooldown(&self) -> chrono::Duration {
        seconds(self.alert_cooldown_secs)
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    // Largest second count chrono represents without overflow.
    let capped = secs.min(i64::MAX as u64 / 1000) as i64;
    chrono::Duration::try_seconds(capped).unwrap_or_else(chrono::Duration::zero)
}

/// Sanitizer behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Remove engine-introspection identifiers inside `{{ }}`
    pub strip_template_identifiers: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            strip_template_identifiers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.validator.max_content_length, 50_000);
        assert_eq!(config.validator.max_nesting_depth, 10);
        assert_eq!(config.validator.reject_threshold, 0);
        assert_eq!(config.monitor.alert_critical_count, 3);
        assert_eq!(config.monitor.alert_cooldown(), chrono::Duration::minutes(5));
        assert!(config.sanitizer.strip_template_identifiers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [validator]
            max_content_length = 2000
            decode_variants = false

            [monitor]
            alert_total_count = 25
            retention_window_secs = 600
        "#;

        let config = GuardConfig::from_toml(toml).unwrap();
        assert_eq!(config.validator.max_content_length, 2000);
        assert!(!config.validator.decode_variants);
        assert_eq!(config.validator.max_nesting_depth, 10);
        assert_eq!(config.monitor.alert_total_count, 25);
        assert_eq!(config.monitor.retention_window(), chrono::Duration::minutes(10));
        assert_eq!(config.monitor.alert_critical_count, 3);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GuardConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(GuardConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(GuardConfig::from_toml("[validator]\nmax_content_length = 0").is_err());
        assert!(GuardConfig::from_toml(
            "[validator]\nmin_content_length = 10\nmax_content_length = 5"
        )
        .is_err());
        assert!(GuardConfig::from_toml("[monitor]\nalert_total_count = 0").is_err());
        assert!(GuardConfig::from_toml("not toml [").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TEMPLATE_GUARD_MAX_CONTENT_LENGTH", "1234"),
            ("TEMPLATE_GUARD_DECODE_VARIANTS", "false"),
            ("TEMPLATE_GUARD_ALERT_COOLDOWN_SECS", " 60 "),
        ]
        .into_iter()
        .collect();
        let config = GuardConfig::default()
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.validator.max_content_length, 1234);
        assert!(!config.validator.decode_variants);
        assert_eq!(config.monitor.alert_cooldown_secs, 60);
        assert_eq!(config.monitor.alert_critical_count, 3);
    }

    #[test]
    fn test_env_override_parse_error() {
        let err = GuardConfig::default()
            .apply_overrides(|k| (k == "TEMPLATE_GUARD_MAX_NESTING_DEPTH").then(|| "deep".into()))
            .unwrap_err();
        assert!(err.to_string().contains("TEMPLATE_GUARD_MAX_NESTING_DEPTH"));
    }

    #[test]
    fn test_default_path() {
        if let Some(path) = GuardConfig::default_path() {
            assert!(path.ends_with("template-guard/config.toml"));
        }
    }
}
