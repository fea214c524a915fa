//! Feedback items
//!
//! This module defines the primitive a reviewer (worker or external caller)
//! uses to say what should happen to a subject.

use serde::{Deserialize, Serialize};

/// Action a feedback source recommends for a subject
///
/// Variants are ordered from least to most conservative, so `max()` over a
/// set of actions yields the conservative choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Accept,
    Revise,
    Reject,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Accept => "accept",
            FeedbackAction::Revise => "revise",
            FeedbackAction::Reject => "reject",
        }
    }
}

impl std::fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FeedbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accept" | "approve" => Ok(FeedbackAction::Accept),
            "revise" => Ok(FeedbackAction::Revise),
            "reject" => Ok(FeedbackAction::Reject),
            _ => Err(format!(
                "Unknown feedback action: {}. Valid: accept, revise, reject",
                s
            )),
        }
    }
}

/// How serious the reviewer considers the issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A single piece of feedback about one subject
///
/// # Example
///
/// ```
/// use phasegate_domain::feedback::{FeedbackAction, FeedbackItem};
///
/// let item = FeedbackItem::reject("stakeholder", "logo", "Too close to a competitor mark")
///     .with_category("legal");
/// assert_eq!(item.action, FeedbackAction::Reject);
/// assert_eq!(item.category.as_deref(), Some("legal"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Who gave the feedback (e.g., "stakeholder", "user")
    pub source: String,
    /// What the feedback is about
    pub subject: String,
    pub action: FeedbackAction,
    #[serde(default)]
    pub severity: FeedbackSeverity,
    /// Category used for veto authority (e.g., "legal", "accessibility-critical")
    #[serde(default)]
    pub category: Option<String>,
    /// Free-form reasoning
    #[serde(default)]
    pub note: String,
}

impl FeedbackItem {
    pub fn new(
        source: impl Into<String>,
        subject: impl Into<String>,
        action: FeedbackAction,
        note: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            subject: subject.into(),
            action,
            severity: FeedbackSeverity::default(),
            category: None,
            note: note.into(),
        }
    }

    pub fn accept(
        source: impl Into<String>,
        subject: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self::new(source, subject, FeedbackAction::Accept, note)
    }

    pub fn reject(
        source: impl Into<String>,
        subject: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self::new(source, subject, FeedbackAction::Reject, note)
    }

    pub fn with_severity(mut self, severity: FeedbackSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Short label used in rationale text (e.g., "user:accept")
    pub fn label(&self) -> String {
        format!("{}:{}", self.source, self.action)
    }

    /// Total order used to canonicalize item lists before aggregation
    pub(crate) fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        (
            &self.subject,
            &self.source,
            self.action,
            self.severity,
            &self.category,
            &self.note,
        )
            .cmp(&(
                &other.subject,
                &other.source,
                other.action,
                other.severity,
                &other.category,
                &other.note,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_creation() {
        let item = FeedbackItem::accept("user", "palette", "Feels on-brand");
        assert_eq!(item.action, FeedbackAction::Accept);
        assert_eq!(item.severity, FeedbackSeverity::Medium);
        assert!(item.category.is_none());
        assert_eq!(item.label(), "user:accept");
    }

    #[test]
    fn test_action_conservative_ordering() {
        assert!(FeedbackAction::Reject > FeedbackAction::Revise);
        assert!(FeedbackAction::Revise > FeedbackAction::Accept);
        assert_eq!(
            [FeedbackAction::Accept, FeedbackAction::Reject]
                .into_iter()
                .max(),
            Some(FeedbackAction::Reject)
        );
    }

    #[test]
    fn test_parse_action() {
        assert_eq!("accept".parse::<FeedbackAction>().ok(), Some(FeedbackAction::Accept));
        assert_eq!("APPROVE".parse::<FeedbackAction>().ok(), Some(FeedbackAction::Accept));
        assert_eq!("Reject".parse::<FeedbackAction>().ok(), Some(FeedbackAction::Reject));
        assert!("maybe".parse::<FeedbackAction>().is_err());
    }

    #[test]
    fn test_item_deserialize_defaults() {
        let item: FeedbackItem =
            serde_json::from_str(r#"{"source":"user","subject":"x","action":"revise"}"#).unwrap();
        assert_eq!(item.action, FeedbackAction::Revise);
        assert_eq!(item.severity, FeedbackSeverity::Medium);
        assert!(item.note.is_empty());
    }
}
