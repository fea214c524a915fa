//! Raw TOML shape of a workflow definition

use phasegate_domain::{PhaseSpec, RubricCriterion, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top level of a definition file
///
/// ```toml
/// name = "brand-sprint"
///
/// [[phases]]
/// name = "discovery"
/// capabilities = ["research"]
/// max_iterations = 1
///
/// [[phases.rubric]]
/// criterion = "coverage"
/// weight = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileWorkflow {
    pub name: String,
    #[serde(default)]
    pub phases: Vec<FilePhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePhase {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub rubric: Vec<FileCriterion>,
    #[serde(default)]
    pub max_iterations: u32,
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
    #[serde(default = "default_fan_out")]
    pub fan_out: u32,
    /// Failed criterion -> phase to re-enter
    #[serde(default)]
    pub reentry_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileCriterion {
    pub criterion: String,
    pub weight: f64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

fn default_concurrent() -> bool {
    true
}

fn default_fan_out() -> u32 {
    1
}

impl From<FileCriterion> for RubricCriterion {
    fn from(file: FileCriterion) -> Self {
        let mut criterion = RubricCriterion::new(file.criterion, file.weight);
        criterion.capabilities = file.capabilities;
        criterion
    }
}

impl From<FilePhase> for PhaseSpec {
    fn from(file: FilePhase) -> Self {
        let mut phase = PhaseSpec::new(file.name);
        phase.capabilities = file.capabilities;
        phase.rubric = file.rubric.into_iter().map(RubricCriterion::from).collect();
        phase.max_iterations = file.max_iterations;
        phase.concurrent = file.concurrent;
        phase.fan_out = file.fan_out;
        phase.reentry_map = file.reentry_map;
        phase
    }
}

impl From<FileWorkflow> for WorkflowDefinition {
    fn from(file: FileWorkflow) -> Self {
        file.phases
            .into_iter()
            .fold(WorkflowDefinition::new(file.name), |definition, phase| {
                definition.with_phase(phase.into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_defaults() {
        let phase: FilePhase = toml::from_str(
            r#"
name = "draft"
capabilities = ["copy"]
"#,
        )
        .unwrap();
        let spec = PhaseSpec::from(phase);
        assert!(spec.concurrent);
        assert_eq!(spec.fan_out, 1);
        assert_eq!(spec.max_iterations, 0);
        assert!(spec.reentry_map.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<FilePhase, _> = toml::from_str(
            r#"
name = "draft"
max_iteration = 3
"#,
        );
        assert!(result.is_err());
    }
}
