//! Gate configuration from TOML (`[gate]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use phasegate_domain::GatePolicy;
use serde::{Deserialize, Serialize};

/// Raw gate thresholds; unset fields keep the built-in policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGateConfig {
    pub pass_threshold: Option<f64>,
    pub hard_floor: Option<f64>,
    pub abort_floor: Option<f64>,
}

impl FileGateConfig {
    /// Build the gate policy. An invalid combination falls back to the
    /// defaults and reports an error issue.
    pub fn to_gate_policy(&self) -> (GatePolicy, Vec<ConfigIssue>) {
        let defaults = GatePolicy::default();
        let policy = GatePolicy {
            pass_threshold: self.pass_threshold.unwrap_or(defaults.pass_threshold),
            hard_floor: self.hard_floor.unwrap_or(defaults.hard_floor),
            abort_floor: self.abort_floor.unwrap_or(defaults.abort_floor),
        };

        match policy.validate() {
            Ok(()) => (policy, Vec::new()),
            Err(reason) => (
                defaults,
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidGatePolicy,
                    format!("[gate]: {}", reason),
                )],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_gate_keeps_defaults() {
        let config: FileGateConfig = toml::from_str("pass_threshold = 4.0").unwrap();
        let (policy, issues) = config.to_gate_policy();
        assert!(issues.is_empty());
        assert_eq!(policy.pass_threshold, 4.0);
        assert_eq!(policy.hard_floor, 2.0);
        assert_eq!(policy.abort_floor, 1.5);
    }

    #[test]
    fn test_inverted_thresholds_fall_back() {
        let config = FileGateConfig {
            pass_threshold: Some(1.0),
            abort_floor: Some(2.0),
            ..Default::default()
        };
        let (policy, issues) = config.to_gate_policy();
        assert_eq!(policy, GatePolicy::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
    }
}
