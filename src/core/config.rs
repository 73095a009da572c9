//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::errors::{JanitorError, Result};
use crate::logger::activity::CHANNEL_CAPACITY;
use crate::logger::jsonl::JsonlConfig;
use crate::resource::directive::{DirectivePolicy, OWNER_DATE_FORMAT};

/// Full janitor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub directive: DirectivePolicy,
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Per-rule switches and day counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RulesConfig {
    pub delete_on_termination: DeleteOnTerminationConfig,
    pub old_detached: OldDetachedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeleteOnTerminationConfig {
    pub enabled: bool,
    /// Business days between marking and cleanup. Signed so that a negative
    /// value in the file is reported instead of failing to parse.
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OldDetachedConfig {
    pub enabled: bool,
    pub detach_days_threshold: i64,
    pub retention_days: i64,
}

/// Decision log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
    pub channel_capacity: usize,
}

/// Filesystem paths used by the janitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub decision_log: PathBuf,
    pub decision_log_fallback: Option<PathBuf>,
}

impl Default for DeleteOnTerminationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 3,
        }
    }
}

impl Default for OldDetachedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detach_days_threshold: 30,
            retention_days: 7,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
            fsync_interval_secs: 10,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[VJN-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let data = home_dir.join(".local").join("share").join("vjan");
        Self {
            config_file: home_dir.join(".config").join("vjan").join("config.toml"),
            decision_log: data.join("decisions.jsonl"),
            decision_log_fallback: Some(env::temp_dir().join("vjan-decisions.jsonl")),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path means defaults; a missing explicit
    /// path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| JanitorError::io(&path_buf, source))?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(JanitorError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML without env overrides or validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic FNV-1a hash of the effective config, for log correlation.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Writer settings for the decision log.
    pub fn jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.paths.decision_log.clone(),
            fallback_path: self.paths.decision_log_fallback.clone(),
            max_size_bytes: self.logging.max_size_bytes,
            max_rotated_files: self.logging.max_rotated_files,
            fsync_interval_secs: self.logging.fsync_interval_secs,
        }
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VJN_JANITOR_TAG") {
            self.directive.tag_key = raw;
        }
        if let Some(raw) = lookup("VJN_OPT_OUT_VALUE") {
            self.directive.opt_out_value = raw;
        }

        let dot = &mut self.rules.delete_on_termination;
        if let Some(raw) = lookup("VJN_DELETE_ON_TERMINATION_ENABLED") {
            dot.enabled = parse_env_bool("VJN_DELETE_ON_TERMINATION_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("VJN_DELETE_ON_TERMINATION_RETENTION_DAYS") {
            dot.retention_days = parse_env_i64("VJN_DELETE_ON_TERMINATION_RETENTION_DAYS", &raw)?;
        }

        let old = &mut self.rules.old_detached;
        if let Some(raw) = lookup("VJN_OLD_DETACHED_ENABLED") {
            old.enabled = parse_env_bool("VJN_OLD_DETACHED_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("VJN_OLD_DETACHED_THRESHOLD_DAYS") {
            old.detach_days_threshold = parse_env_i64("VJN_OLD_DETACHED_THRESHOLD_DAYS", &raw)?;
        }
        if let Some(raw) = lookup("VJN_OLD_DETACHED_RETENTION_DAYS") {
            old.retention_days = parse_env_i64("VJN_OLD_DETACHED_RETENTION_DAYS", &raw)?;
        }

        if let Some(raw) = lookup("VJN_LOGGING_ENABLED") {
            self.logging.enabled = parse_env_bool("VJN_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("VJN_DECISION_LOG") {
            self.paths.decision_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.directive.tag_key.trim().is_empty() {
            return Err(JanitorError::invalid_config("directive.tag_key must not be empty"));
        }
        if self.directive.opt_out_value.is_empty() {
            return Err(JanitorError::invalid_config(
                "directive.opt_out_value must not be empty",
            ));
        }
        // A date-shaped sentinel would make opt-out and owner dates ambiguous.
        if NaiveDate::parse_from_str(&self.directive.opt_out_value, OWNER_DATE_FORMAT).is_ok() {
            return Err(JanitorError::invalid_config(format!(
                "directive.opt_out_value {:?} must not look like an owner date",
                self.directive.opt_out_value
            )));
        }

        for (name, days) in [
            (
                "rules.delete_on_termination.retention_days",
                self.rules.delete_on_termination.retention_days,
            ),
            (
                "rules.old_detached.detach_days_threshold",
                self.rules.old_detached.detach_days_threshold,
            ),
            (
                "rules.old_detached.retention_days",
                self.rules.old_detached.retention_days,
            ),
        ] {
            validate_days(name, days)?;
        }

        if self.logging.channel_capacity == 0 {
            return Err(JanitorError::invalid_config(
                "logging.channel_capacity must be > 0",
            ));
        }
        if self.logging.max_rotated_files == 0 {
            return Err(JanitorError::invalid_config(
                "logging.max_rotated_files must be >= 1",
            ));
        }
        if self.logging.max_size_bytes < 1024 {
            return Err(JanitorError::invalid_config(format!(
                "logging.max_size_bytes must be >= 1024, got {}",
                self.logging.max_size_bytes
            )));
        }

        Ok(())
    }
}

fn validate_days(name: &str, days: i64) -> Result<()> {
    if days < 0 || u32::try_from(days).is_err() {
        return Err(JanitorError::invalid_config(format!(
            "{name} must be a non-negative day count, got {days}"
        )));
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_i64(name: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|error| JanitorError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim().parse::<bool>().map_err(|error| JanitorError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
