//! Manual decision port for conflicts the resolver cannot settle.
//!
//! With `TieBreak::Manual`, a tied conflict comes back from the resolver as
//! `Unresolved`. The orchestrator then asks this port for a decision.
//!
//! # Flow
//!
//! ```text
//! ConflictResolver::resolve()
//!        ↓
//! ConflictOutcome::Unresolved (tie, manual tie-break)
//!        ↓
//! ManualDecisionPort::decide()
//!        ↓
//! Some(decision) → conflict settled, audit entry "conflict_resolved"
//! None           → conflict stays open, audit entry "conflict_escalated",
//!                  a passing gate is held at Iterate
//! ```
//!
//! # Built-in Implementations
//!
//! - [`DeferDecision`] - Never decides; the conflict stays open
//! - [`FixedDecision`] - Always answers with one action

use async_trait::async_trait;
use phasegate_domain::{ConflictRecord, FeedbackAction, RunId};
use thiserror::Error;

/// Failure while obtaining a decision (not a decision itself)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManualDecisionError {
    #[error("Decision request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),
}

/// A decision made outside the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct ManualDecision {
    pub action: FeedbackAction,
    pub note: String,
}

impl ManualDecision {
    pub fn new(action: FeedbackAction, note: impl Into<String>) -> Self {
        Self {
            action,
            note: note.into(),
        }
    }
}

#[async_trait]
pub trait ManualDecisionPort: Send + Sync {
    /// Ask for a decision on an unresolved conflict.
    ///
    /// `Ok(None)` defers: the conflict stays unresolved for this attempt.
    async fn decide(
        &self,
        run_id: RunId,
        phase: &str,
        conflict: &ConflictRecord,
    ) -> Result<Option<ManualDecision>, ManualDecisionError>;
}

/// Leaves every conflict open
pub struct DeferDecision;

#[async_trait]
impl ManualDecisionPort for DeferDecision {
    async fn decide(
        &self,
        _run_id: RunId,
        _phase: &str,
        _conflict: &ConflictRecord,
    ) -> Result<Option<ManualDecision>, ManualDecisionError> {
        Ok(None)
    }
}

/// Answers every conflict with the same action
pub struct FixedDecision(pub FeedbackAction);

#[async_trait]
impl ManualDecisionPort for FixedDecision {
    async fn decide(
        &self,
        _run_id: RunId,
        _phase: &str,
        conflict: &ConflictRecord,
    ) -> Result<Option<ManualDecision>, ManualDecisionError> {
        Ok(Some(ManualDecision::new(
            self.0,
            format!("fixed decision for '{}'", conflict.subject),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_domain::{ConflictOutcome, FeedbackItem};

    fn open_conflict() -> ConflictRecord {
        ConflictRecord {
            subject: "palette".to_string(),
            items: vec![
                FeedbackItem::accept("a", "palette", ""),
                FeedbackItem::reject("b", "palette", ""),
            ],
            outcome: ConflictOutcome::Unresolved {
                reason: "tie".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_defer_returns_none() {
        let decision = DeferDecision
            .decide(RunId::new(), "visual", &open_conflict())
            .await
            .unwrap();
        assert!(decision.is_none());
    }

    #[tokio::test]
    async fn test_fixed_returns_action() {
        let decision = FixedDecision(FeedbackAction::Revise)
            .decide(RunId::new(), "visual", &open_conflict())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.action, FeedbackAction::Revise);
        assert!(decision.note.contains("palette"));
    }
}
