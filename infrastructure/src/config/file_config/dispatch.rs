//! Dispatch configuration from TOML (`[dispatch]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use phasegate_application::{DispatchMode, DispatchParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw dispatch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDispatchConfig {
    /// Per-attempt task timeout in seconds
    pub task_timeout_secs: f64,
    pub timeout_retries: u32,
    pub failure_retries: u32,
    /// "collect-all" or "fail-fast"
    pub mode: String,
    /// Grace period for in-flight tasks after cancellation, in seconds
    pub cancel_grace_secs: f64,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        let params = DispatchParams::default();
        Self {
            task_timeout_secs: params.task_timeout.as_secs_f64(),
            timeout_retries: params.timeout_retries,
            failure_retries: params.failure_retries,
            mode: params.mode.as_str().to_string(),
            cancel_grace_secs: params.cancel_grace.as_secs_f64(),
        }
    }
}

impl FileDispatchConfig {
    pub fn to_dispatch_params(&self) -> (DispatchParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = DispatchParams::default();

        let mode = match self.mode.parse::<DispatchMode>() {
            Ok(mode) => mode,
            Err(_) => {
                issues.push(ConfigIssue::invalid_enum(
                    "dispatch.mode",
                    &self.mode,
                    &["collect-all", "fail-fast"],
                    defaults.mode.as_str(),
                ));
                defaults.mode
            }
        };

        let task_timeout = seconds("dispatch.task_timeout_secs", self.task_timeout_secs, false)
            .map_err(|issue| issues.push(issue))
            .unwrap_or(defaults.task_timeout);
        let cancel_grace = seconds("dispatch.cancel_grace_secs", self.cancel_grace_secs, true)
            .map_err(|issue| issues.push(issue))
            .unwrap_or(defaults.cancel_grace);

        let params = DispatchParams::default()
            .with_task_timeout(task_timeout)
            .with_timeout_retries(self.timeout_retries)
            .with_failure_retries(self.failure_retries)
            .with_mode(mode)
            .with_cancel_grace(cancel_grace);
        (params, issues)
    }
}

fn seconds(field: &str, value: f64, allow_zero: bool) -> Result<Duration, ConfigIssue> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if valid {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigIssue::error(
            ConfigIssueCode::OutOfRange {
                field: field.to_string(),
                value,
            },
            format!("{}: {} is not a valid duration, using the default", field, value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_dispatch_params() {
        let (params, issues) = FileDispatchConfig::default().to_dispatch_params();
        assert!(issues.is_empty());
        assert_eq!(params.task_timeout, Duration::from_secs(120));
        assert_eq!(params.mode, DispatchMode::CollectAll);
    }

    #[test]
    fn test_fail_fast_and_fractional_timeout() {
        let config: FileDispatchConfig = toml::from_str(
            r#"
task_timeout_secs = 0.5
mode = "fail-fast"
timeout_retries = 0
"#,
        )
        .unwrap();
        let (params, issues) = config.to_dispatch_params();
        assert!(issues.is_empty());
        assert_eq!(params.task_timeout, Duration::from_millis(500));
        assert!(params.fail_fast());
        assert_eq!(params.timeout_retries, 0);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let config = FileDispatchConfig {
            task_timeout_secs: -3.0,
            mode: "eventually".to_string(),
            ..Default::default()
        };
        let (params, issues) = config.to_dispatch_params();
        assert_eq!(issues.len(), 2);
        assert_eq!(params.task_timeout, Duration::from_secs(120));
        assert_eq!(params.mode, DispatchMode::CollectAll);
    }
}
