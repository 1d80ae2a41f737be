// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::DEFAULT_MAX_WORKERS;
use crate::errors::ConfigError;
use crate::models::RetryPolicy;

/// Engine configuration.
///
/// Every field is optional; an empty document yields [`EngineConfig::default`].
///
/// # Fields
/// * `strategy` - Scheduling strategy for plan execution (defaults to `work_queue`)
/// * `max_workers` - Maximum concurrent operator invocations per run (defaults to 4)
/// * `timeout_ms` - Per-run deadline in milliseconds (optional)
/// * `plan_cache` - Plan cache bounds
/// * `model_retry` - Retry policy applied to model services built from this config
///
/// # Example
/// ```yaml
/// strategy: work_queue
/// max_workers: 8
/// timeout_ms: 30000
/// plan_cache:
///   max_entries: 256
/// model_retry:
///   max_attempts: 3
///   initial_backoff_ms: 1000
///   max_backoff_ms: 10000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: Strategy,
    pub max_workers: usize,
    pub timeout_ms: Option<u64>,
    pub plan_cache: PlanCacheConfig,
    pub model_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_ms: None,
            plan_cache: PlanCacheConfig::default(),
            model_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Worker count with the lower bound applied.
    pub fn effective_max_workers(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings that cannot describe a working engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if self.plan_cache.max_entries == Some(0) {
            return Err(ConfigError::Invalid(
                "plan_cache.max_entries must be greater than zero".into(),
            ));
        }
        if self.model_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "model_retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.model_retry.initial_backoff_ms > self.model_retry.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "model_retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.model_retry.initial_backoff_ms, self.model_retry.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Scheduling strategy for plan execution.
///
/// # Variants
/// * `WorkQueue` - Dispatches each node as soon as its last predecessor completes
/// * `Level` - Executes the plan wave by wave with a barrier between waves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    WorkQueue,
    Level,
}

/// Plan cache bounds. `max_entries: None` keeps every compiled plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlanCacheConfig {
    pub max_entries: Option<usize>,
}

/// Parse a config from YAML text and validate it.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    // An empty document parses as null; treat it as all defaults.
    if content.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    let cfg: EngineConfig = serde_yaml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load and validate a config from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
strategy: level
max_workers: 8
timeout_ms: 2500
plan_cache:
  max_entries: 16
model_retry:
  max_attempts: 5
  initial_backoff_ms: 100
  max_backoff_ms: 800
  attempt_timeout_ms: 3000
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.strategy, Strategy::Level);
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(cfg.plan_cache.max_entries, Some(16));
        assert_eq!(cfg.model_retry.max_attempts, 5);
        assert_eq!(cfg.model_retry.attempt_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = parse_config("strategy: work_queue\n").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_workers, 4);
        assert_eq!(cfg.model_retry, RetryPolicy::default());

        assert_eq!(parse_config("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn zero_workers_is_clamped_not_rejected() {
        let cfg = parse_config("max_workers: 0\n").unwrap();
        assert_eq!(cfg.effective_max_workers(), 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "timeout_ms: 0\n",
            "plan_cache:\n  max_entries: 0\n",
            "model_retry:\n  max_attempts: 0\n",
            "model_retry:\n  initial_backoff_ms: 500\n  max_backoff_ms: 100\n",
        ] {
            let err = parse_config(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}: {err}");
        }
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = parse_config("strategy: reactive\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let file = write_config("strategy: level\nmax_workers: 2\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.strategy, Strategy::Level);
        assert_eq!(cfg.max_workers, 2);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.yaml"));
    }
}
