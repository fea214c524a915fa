//! Structural validation for [`WorkflowDefinition`].
//!
//! Validation never stops at the first problem: it returns every detected
//! issue so a rejected document can be fixed in one pass.
//!
//! # Examples
//!
//! ```
//! use phasegate_domain::workflow::definition::{PhaseSpec, RubricCriterion, WorkflowDefinition};
//!
//! let def = WorkflowDefinition::new("sprint").with_phase(
//!     PhaseSpec::new("design")
//!         .with_capability("visual")
//!         .with_criterion(RubricCriterion::new("quality", 1.0)),
//! );
//! assert!(def.validate().is_empty());
//! ```

use super::definition::{WEIGHT_EPSILON, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Severity level of a definition issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the definition cannot be run.
    Error,
    /// Non-fatal: the definition runs but may not behave as expected.
    Warning,
}

/// Identifies a specific definition issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DefinitionIssueCode {
    EmptyDefinition,
    EmptyPhaseName { index: usize },
    DuplicatePhaseName { phase: String },
    NoCapabilities { phase: String },
    ZeroFanOut { phase: String },
    EmptyRubric { phase: String },
    DuplicateCriterion { phase: String, criterion: String },
    InvalidWeight { phase: String, criterion: String, weight: f64 },
    WeightsDoNotSumToOne { phase: String, total: f64 },
    /// A criterion scores a capability the phase never dispatches
    UnscoredCapability { phase: String, criterion: String, capability: String },
    UnknownCapability { phase: String, capability: String },
    UnknownReentryTarget { phase: String, criterion: String, target: String },
    /// Re-entry may only point at the same or an earlier phase
    ForwardReentry { phase: String, criterion: String, target: String },
    ReentryCriterionNotInRubric { phase: String, criterion: String },
}

/// A detected issue in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionIssue {
    pub severity: Severity,
    pub code: DefinitionIssueCode,
    pub message: String,
}

impl DefinitionIssue {
    fn error(code: DefinitionIssueCode, message: String) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message,
        }
    }

    fn warning(code: DefinitionIssueCode, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for DefinitionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

/// Whether any of the issues is fatal
pub fn has_errors(issues: &[DefinitionIssue]) -> bool {
    issues.iter().any(DefinitionIssue::is_error)
}

impl WorkflowDefinition {
    /// Validate the definition's structure without checking capabilities.
    pub fn validate(&self) -> Vec<DefinitionIssue> {
        self.validate_against(|_| true)
    }

    /// Validate the definition, treating capabilities rejected by `is_known`
    /// as [`DefinitionIssueCode::UnknownCapability`].
    pub fn validate_against(&self, is_known: impl Fn(&str) -> bool) -> Vec<DefinitionIssue> {
        let mut issues = Vec::new();

        if self.phases.is_empty() {
            issues.push(DefinitionIssue::error(
                DefinitionIssueCode::EmptyDefinition,
                "workflow has no phases".to_string(),
            ));
            return issues;
        }

        let mut names = HashSet::new();
        for (index, phase) in self.phases.iter().enumerate() {
            let name = phase.name.as_str();

            if name.trim().is_empty() {
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::EmptyPhaseName { index },
                    format!("phase #{} has an empty name", index + 1),
                ));
            } else if !names.insert(name) {
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::DuplicatePhaseName {
                        phase: name.to_string(),
                    },
                    format!("phase name '{}' is used more than once", name),
                ));
            }

            if phase.capabilities.is_empty() {
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::NoCapabilities {
                        phase: name.to_string(),
                    },
                    format!("phase '{}': no capabilities declared", name),
                ));
            }

            if phase.fan_out == 0 {
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::ZeroFanOut {
                        phase: name.to_string(),
                    },
                    format!("phase '{}': fan_out must be at least 1", name),
                ));
            }

            for capability in &phase.capabilities {
                if !is_known(capability) {
                    issues.push(DefinitionIssue::error(
                        DefinitionIssueCode::UnknownCapability {
                            phase: name.to_string(),
                            capability: capability.clone(),
                        },
                        format!("phase '{}': unknown capability '{}'", name, capability),
                    ));
                }
            }

            self.validate_rubric(index, &mut issues);
            self.validate_reentry(index, &mut issues);
        }

        issues
    }

    fn validate_rubric(&self, index: usize, issues: &mut Vec<DefinitionIssue>) {
        let phase = &self.phases[index];
        let name = phase.name.as_str();

        if phase.rubric.is_empty() {
            issues.push(DefinitionIssue::error(
                DefinitionIssueCode::EmptyRubric {
                    phase: name.to_string(),
                },
                format!("phase '{}': rubric has no criteria", name),
            ));
            return;
        }

        let mut criteria = HashSet::new();
        let mut weights_valid = true;
        for criterion in &phase.rubric {
            if !criteria.insert(criterion.criterion.as_str()) {
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::DuplicateCriterion {
                        phase: name.to_string(),
                        criterion: criterion.criterion.clone(),
                    },
                    format!(
                        "phase '{}': criterion '{}' is listed more than once",
                        name, criterion.criterion
                    ),
                ));
            }

            if !criterion.weight.is_finite() || criterion.weight < 0.0 {
                weights_valid = false;
                issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::InvalidWeight {
                        phase: name.to_string(),
                        criterion: criterion.criterion.clone(),
                        weight: criterion.weight,
                    },
                    format!(
                        "phase '{}': criterion '{}' has invalid weight {}",
                        name, criterion.criterion, criterion.weight
                    ),
                ));
            }

            for capability in &criterion.capabilities {
                if !phase.capabilities.contains(capability) {
                    issues.push(DefinitionIssue::error(
                        DefinitionIssueCode::UnscoredCapability {
                            phase: name.to_string(),
                            criterion: criterion.criterion.clone(),
                            capability: capability.clone(),
                        },
                        format!(
                            "phase '{}': criterion '{}' scores capability '{}' which the phase does not dispatch",
                            name, criterion.criterion, capability
                        ),
                    ));
                }
            }
        }

        let total = phase.total_weight();
        if weights_valid && (total - 1.0).abs() > WEIGHT_EPSILON {
            issues.push(DefinitionIssue::error(
                DefinitionIssueCode::WeightsDoNotSumToOne {
                    phase: name.to_string(),
                    total,
                },
                format!(
                    "phase '{}': rubric weights sum to {:.4}, expected 1.0",
                    name, total
                ),
            ));
        }
    }

    fn validate_reentry(&self, index: usize, issues: &mut Vec<DefinitionIssue>) {
        let phase = &self.phases[index];
        let name = phase.name.as_str();

        for (criterion, target) in &phase.reentry_map {
            if phase.criterion(criterion).is_none() {
                issues.push(DefinitionIssue::warning(
                    DefinitionIssueCode::ReentryCriterionNotInRubric {
                        phase: name.to_string(),
                        criterion: criterion.clone(),
                    },
                    format!(
                        "phase '{}': re-entry rule for '{}' never fires, criterion is not in the rubric",
                        name, criterion
                    ),
                ));
            }

            match self.phase_index(target) {
                None => issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::UnknownReentryTarget {
                        phase: name.to_string(),
                        criterion: criterion.clone(),
                        target: target.clone(),
                    },
                    format!(
                        "phase '{}': re-entry target '{}' for '{}' does not exist",
                        name, target, criterion
                    ),
                )),
                Some(target_index) if target_index > index => issues.push(DefinitionIssue::error(
                    DefinitionIssueCode::ForwardReentry {
                        phase: name.to_string(),
                        criterion: criterion.clone(),
                        target: target.clone(),
                    },
                    format!(
                        "phase '{}': re-entry target '{}' for '{}' comes after this phase",
                        name, target, criterion
                    ),
                )),
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::{PhaseSpec, RubricCriterion};

    // ==================== Helper ====================

    fn phase(name: &str) -> PhaseSpec {
        PhaseSpec::new(name)
            .with_capability("visual")
            .with_criterion(RubricCriterion::new("quality", 1.0))
    }

    fn codes(issues: &[DefinitionIssue]) -> Vec<&DefinitionIssueCode> {
        issues.iter().map(|i| &i.code).collect()
    }

    // ==================== Valid definitions ====================

    #[test]
    fn single_phase_is_valid() {
        let def = WorkflowDefinition::new("w").with_phase(phase("design"));
        assert!(def.validate().is_empty());
    }

    #[test]
    fn weights_within_epsilon_are_valid() {
        let def = WorkflowDefinition::new("w").with_phase(
            PhaseSpec::new("p")
                .with_capability("a")
                .with_criterion(RubricCriterion::new("x", 0.1))
                .with_criterion(RubricCriterion::new("y", 0.2))
                .with_criterion(RubricCriterion::new("z", 0.7)),
        );
        assert!(def.validate().is_empty());
    }

    #[test]
    fn backward_reentry_is_valid() {
        let def = WorkflowDefinition::new("w")
            .with_phase(phase("discovery"))
            .with_phase(phase("design").with_reentry("quality", "discovery"));
        assert!(def.validate().is_empty());
    }

    // ==================== Errors ====================

    #[test]
    fn empty_definition_is_error() {
        let issues = WorkflowDefinition::new("w").validate();
        assert_eq!(codes(&issues), vec![&DefinitionIssueCode::EmptyDefinition]);
        assert!(has_errors(&issues));
    }

    #[test]
    fn duplicate_phase_names_are_error() {
        let def = WorkflowDefinition::new("w")
            .with_phase(phase("design"))
            .with_phase(phase("design"));
        let issues = def.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].code,
            DefinitionIssueCode::DuplicatePhaseName {
                phase: "design".to_string()
            }
        );
    }

    #[test]
    fn weights_not_summing_to_one_is_error() {
        let def = WorkflowDefinition::new("w").with_phase(
            PhaseSpec::new("p")
                .with_capability("a")
                .with_criterion(RubricCriterion::new("x", 0.5))
                .with_criterion(RubricCriterion::new("y", 0.4)),
        );
        let issues = def.validate();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0].code,
            DefinitionIssueCode::WeightsDoNotSumToOne { .. }
        ));
    }

    #[test]
    fn negative_weight_is_reported_once() {
        let def = WorkflowDefinition::new("w").with_phase(
            PhaseSpec::new("p")
                .with_capability("a")
                .with_criterion(RubricCriterion::new("x", -0.5))
                .with_criterion(RubricCriterion::new("y", 1.5)),
        );
        let issues = def.validate();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0].code,
            DefinitionIssueCode::InvalidWeight { .. }
        ));
    }

    #[test]
    fn missing_capabilities_and_rubric_are_errors() {
        let def = WorkflowDefinition::new("w").with_phase(PhaseSpec::new("p"));
        let issues = def.validate();
        let codes = codes(&issues);
        assert!(codes.contains(&&DefinitionIssueCode::NoCapabilities {
            phase: "p".to_string()
        }));
        assert!(codes.contains(&&DefinitionIssueCode::EmptyRubric {
            phase: "p".to_string()
        }));
    }

    #[test]
    fn unknown_capability_is_error() {
        let def = WorkflowDefinition::new("w").with_phase(phase("design"));
        let issues = def.validate_against(|cap| cap == "copy");
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].code,
            DefinitionIssueCode::UnknownCapability {
                phase: "design".to_string(),
                capability: "visual".to_string()
            }
        );
    }

    #[test]
    fn criterion_scoring_undispatched_capability_is_error() {
        let def = WorkflowDefinition::new("w").with_phase(
            PhaseSpec::new("p")
                .with_capability("a")
                .with_criterion(RubricCriterion::new("x", 1.0).scoring(&["b"])),
        );
        let issues = def.validate();
        assert!(matches!(
            issues[0].code,
            DefinitionIssueCode::UnscoredCapability { .. }
        ));
    }

    #[test]
    fn forward_and_unknown_reentry_are_errors() {
        let def = WorkflowDefinition::new("w")
            .with_phase(phase("discovery").with_reentry("quality", "design"))
            .with_phase(phase("design").with_reentry("quality", "nowhere"));
        let issues = def.validate();
        let codes = codes(&issues);
        assert!(
            codes
                .iter()
                .any(|c| matches!(c, DefinitionIssueCode::ForwardReentry { .. }))
        );
        assert!(
            codes
                .iter()
                .any(|c| matches!(c, DefinitionIssueCode::UnknownReentryTarget { .. }))
        );
    }

    #[test]
    fn zero_fan_out_is_error() {
        let def = WorkflowDefinition::new("w").with_phase(phase("p").with_fan_out(0));
        let issues = def.validate();
        assert!(matches!(issues[0].code, DefinitionIssueCode::ZeroFanOut { .. }));
    }

    // ==================== Warnings ====================

    #[test]
    fn reentry_for_unknown_criterion_warns() {
        let def = WorkflowDefinition::new("w")
            .with_phase(phase("discovery"))
            .with_phase(phase("design").with_reentry("typography", "discovery"));
        let issues = def.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(!has_errors(&issues));
    }
}
