//! Configuration validation issues

use phasegate_domain::Severity;
use serde::Serialize;

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConfigIssueCode {
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    OutOfRange {
        field: String,
        value: f64,
    },
    InvalidGatePolicy,
    MissingWorkerField {
        worker: String,
        field: String,
    },
    DuplicateWorkerName {
        worker: String,
    },
}

/// A detected issue in the loaded configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub(crate) fn invalid_enum(field: &str, value: &str, valid: &[&str], fallback: &str) -> Self {
        Self::warning(
            ConfigIssueCode::InvalidEnumValue {
                field: field.to_string(),
                value: value.to_string(),
                valid_values: valid.iter().map(|v| v.to_string()).collect(),
            },
            format!(
                "{}: unknown value '{}', falling back to '{}'",
                field, value, fallback
            ),
        )
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}
