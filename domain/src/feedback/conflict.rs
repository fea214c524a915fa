//! Conflict and resolution types
//!
//! A [`ConflictRecord`] captures one disagreement on a subject together with
//! how (or whether) it was settled.

use super::item::{FeedbackAction, FeedbackItem};
use crate::core::error::OrchestrationError;
use serde::{Deserialize, Serialize};

/// How a conflict was settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub subject: String,
    /// The action the phase should act on
    pub action: FeedbackAction,
    /// |winning - losing| / total, or 1.0 when decided by veto or by hand
    pub confidence: f64,
    pub rationale: String,
    /// Items that took part, in canonical order
    pub contributing: Vec<FeedbackItem>,
    /// Whether a veto decided the outcome
    pub vetoed: bool,
}

impl Resolution {
    /// Resolution supplied by a person for a conflict the resolver could not settle
    pub fn manual(
        subject: impl Into<String>,
        action: FeedbackAction,
        contributing: Vec<FeedbackItem>,
        note: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        let note = note.into();
        let rationale = if note.is_empty() {
            format!("subject '{}': {} chosen by manual decision", subject, action)
        } else {
            format!(
                "subject '{}': {} chosen by manual decision ({})",
                subject, action, note
            )
        };
        Self {
            subject,
            action,
            confidence: 1.0,
            rationale,
            contributing,
            vetoed: false,
        }
    }
}

/// Outcome of a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConflictOutcome {
    Resolved(Resolution),
    /// Tied weights, no veto, and no tie-break configured
    Unresolved { reason: String },
}

impl ConflictOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ConflictOutcome::Resolved(_))
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            ConflictOutcome::Resolved(r) => Some(r),
            ConflictOutcome::Unresolved { .. } => None,
        }
    }
}

/// A disagreement between feedback items on one subject
///
/// # Example
///
/// ```
/// use phasegate_domain::feedback::{ConflictResolver, FeedbackAction, FeedbackItem, ResolverConfig};
///
/// let resolver = ConflictResolver::new(
///     ResolverConfig::default()
///         .with_weight("stakeholder", 0.4)
///         .with_weight("user", 0.6),
/// );
/// let records = resolver.resolve(&[
///     FeedbackItem::reject("stakeholder", "hero-image", "Off-brand"),
///     FeedbackItem::accept("user", "hero-image", "Clear and friendly"),
/// ]);
/// let resolution = records[0].outcome.resolution().unwrap();
/// assert_eq!(resolution.action, FeedbackAction::Accept);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub subject: String,
    /// Items on the subject, in canonical order
    pub items: Vec<FeedbackItem>,
    pub outcome: ConflictOutcome,
}

impl ConflictRecord {
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_resolved()
    }

    /// The resolution, or [`OrchestrationError::ConflictUnresolvable`]
    pub fn require_resolution(&self) -> Result<&Resolution, OrchestrationError> {
        self.outcome
            .resolution()
            .ok_or_else(|| OrchestrationError::ConflictUnresolvable {
                subject: self.subject.clone(),
            })
    }

    /// Settle an unresolved conflict with a manual decision
    pub fn settle(&mut self, action: FeedbackAction, note: impl Into<String>) {
        self.outcome = ConflictOutcome::Resolved(Resolution::manual(
            self.subject.clone(),
            action,
            self.items.clone(),
            note,
        ));
    }

    /// Distinct actions proposed for the subject, least conservative first
    pub fn proposed_actions(&self) -> Vec<FeedbackAction> {
        let mut actions: Vec<_> = self.items.iter().map(|i| i.action).collect();
        actions.sort();
        actions.dedup();
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unresolved() -> ConflictRecord {
        ConflictRecord {
            subject: "logo".to_string(),
            items: vec![
                FeedbackItem::accept("a", "logo", ""),
                FeedbackItem::reject("b", "logo", ""),
            ],
            outcome: ConflictOutcome::Unresolved {
                reason: "tie".to_string(),
            },
        }
    }

    #[test]
    fn test_unresolved_requires_manual_decision() {
        let record = unresolved();
        assert!(!record.is_resolved());
        assert_eq!(
            record.require_resolution().unwrap_err(),
            OrchestrationError::ConflictUnresolvable {
                subject: "logo".to_string()
            }
        );
    }

    #[test]
    fn test_settle_records_manual_resolution() {
        let mut record = unresolved();
        record.settle(FeedbackAction::Revise, "split the difference");
        let resolution = record.require_resolution().unwrap();
        assert_eq!(resolution.action, FeedbackAction::Revise);
        assert_eq!(resolution.confidence, 1.0);
        assert!(resolution.rationale.contains("manual decision"));
        assert_eq!(resolution.contributing.len(), 2);
    }

    #[test]
    fn test_proposed_actions() {
        assert_eq!(
            unresolved().proposed_actions(),
            vec![FeedbackAction::Accept, FeedbackAction::Reject]
        );
    }
}
