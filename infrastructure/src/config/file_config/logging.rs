//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where run logs go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for `<run-id>.run.jsonl` files; unset disables run logs
    pub run_log_dir: Option<String>,
}

impl FileLoggingConfig {
    /// Resolved run log directory, expanding a leading `~/`
    pub fn run_log_dir(&self) -> Option<PathBuf> {
        let raw = self.run_log_dir.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(PathBuf::from(raw)),
        }
    }
}
