//! Audit entry types

use crate::core::ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Decision point an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    RunStarted,
    DispatchStarted,
    DispatchCompleted,
    ConflictResolved,
    /// A conflict could not be settled and needs a manual decision
    ConflictEscalated,
    Verdict,
    Routed,
    PhaseAdvanced,
    RunCompleted,
    RunAborted,
    /// Correction of an earlier entry
    Superseded,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::RunStarted => "run_started",
            DecisionKind::DispatchStarted => "dispatch_started",
            DecisionKind::DispatchCompleted => "dispatch_completed",
            DecisionKind::ConflictResolved => "conflict_resolved",
            DecisionKind::ConflictEscalated => "conflict_escalated",
            DecisionKind::Verdict => "verdict",
            DecisionKind::Routed => "routed",
            DecisionKind::PhaseAdvanced => "phase_advanced",
            DecisionKind::RunCompleted => "run_completed",
            DecisionKind::RunAborted => "run_aborted",
            DecisionKind::Superseded => "superseded",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the run's log, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub phase: Option<String>,
    pub kind: DecisionKind,
    /// SHA-256 (hex) of the decision inputs
    pub inputs_digest: String,
    pub rationale: String,
    pub confidence: Option<f64>,
    /// Entry this one corrects, if any
    pub supersedes: Option<u64>,
}

/// Digest of any serializable decision input
pub fn digest<T: Serialize + ?Sized>(inputs: &T) -> String {
    let bytes = serde_json::to_vec(inputs).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable() {
        let a = digest(&json!({"phase": "design", "attempt": 0}));
        let b = digest(&json!({"phase": "design", "attempt": 0}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_input() {
        assert_ne!(digest(&json!({"attempt": 0})), digest(&json!({"attempt": 1})));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DecisionKind::DispatchStarted).unwrap(),
            "\"dispatch_started\""
        );
        assert_eq!(DecisionKind::RunAborted.to_string(), "run_aborted");
    }
}
