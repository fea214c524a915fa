//! Worker configuration from TOML (`[[workers]]` array)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a configured worker produces output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileWorkerKind {
    /// External process speaking JSON over stdin/stdout
    #[default]
    Command,
    /// Fixed confidence, no external process
    Static,
}

/// One configured worker
///
/// ```toml
/// [[workers]]
/// name = "copywriter"
/// capability = "copy"
/// command = "python3 scripts/copy.py"
/// pool_size = 2
///
/// [[workers]]
/// name = "dry-run-review"
/// capability = "review"
/// kind = "static"
/// confidence = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileWorkerConfig {
    pub name: String,
    pub capability: String,
    #[serde(default)]
    pub kind: FileWorkerKind,
    /// Shell command (command workers)
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Fixed confidence (static workers)
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Concurrency bound for this capability
    #[serde(default)]
    pub pool_size: Option<usize>,
}

impl FileWorkerConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let label = if self.name.is_empty() {
            self.capability.as_str()
        } else {
            self.name.as_str()
        };
        let missing = |field: &str| {
            ConfigIssue::error(
                ConfigIssueCode::MissingWorkerField {
                    worker: label.to_string(),
                    field: field.to_string(),
                },
                format!("worker '{}': '{}' must be set", label, field),
            )
        };

        if self.name.trim().is_empty() {
            issues.push(missing("name"));
        }
        if self.capability.trim().is_empty() {
            issues.push(missing("capability"));
        }
        match self.kind {
            FileWorkerKind::Command => {
                if self.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    issues.push(missing("command"));
                }
            }
            FileWorkerKind::Static => {
                if let Some(confidence) = self.confidence
                    && !(0.0..=1.0).contains(&confidence)
                {
                    issues.push(ConfigIssue::error(
                        ConfigIssueCode::OutOfRange {
                            field: format!("workers.{}.confidence", label),
                            value: confidence,
                        },
                        format!("worker '{}': confidence must lie within 0..=1", label),
                    ));
                }
            }
        }
        if self.pool_size == Some(0) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("workers.{}.pool_size", label),
                    value: 0.0,
                },
                format!("worker '{}': pool_size must be at least 1", label),
            ));
        }
        issues
    }
}

/// Issues across the whole `[[workers]]` array, including duplicate names
pub(crate) fn validate_workers(workers: &[FileWorkerConfig]) -> Vec<ConfigIssue> {
    let mut issues: Vec<ConfigIssue> = workers.iter().flat_map(|w| w.validate()).collect();
    let mut seen = HashSet::new();
    for worker in workers {
        if !worker.name.is_empty() && !seen.insert(worker.name.as_str()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateWorkerName {
                    worker: worker.name.clone(),
                },
                format!("worker name '{}' is used more than once", worker.name),
            ));
        }
    }
    issues
}
