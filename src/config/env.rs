//! Environment variable configuration
//!
//! Provides environment variable fallbacks for command-line options.

use std::env;
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUITERUN";

/// Configuration read from `SUITERUN_*` environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Run directory from SUITERUN_DIR
    pub dir: Option<PathBuf>,
    /// Run file from SUITERUN_RUN
    pub run_file: Option<PathBuf>,
    /// Include directories from SUITERUN_INCLUDE (colon separated)
    pub include_dirs: Vec<PathBuf>,
    /// JSON output from SUITERUN_JSON
    pub json: Option<bool>,
    /// Log level from SUITERUN_LOG
    pub log_level: Option<String>,
    /// Redaction from SUITERUN_REDACT
    pub redact: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            dir: get_env("DIR").map(PathBuf::from),
            run_file: get_env("RUN").map(PathBuf::from),
            include_dirs: get_env("INCLUDE")
                .map(|v| split_paths(&v))
                .unwrap_or_default(),
            json: get_env_bool("JSON"),
            log_level: get_env("LOG"),
            redact: get_env_bool("REDACT"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.dir.is_some()
            || self.run_file.is_some()
            || !self.include_dirs.is_empty()
            || self.json.is_some()
            || self.log_level.is_some()
            || self.redact.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get boolean environment variable
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).and_then(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
