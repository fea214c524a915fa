//! Loading and validating workflow definition files

use super::document::FileWorkflow;
use phasegate_domain::{DefinitionIssue, WorkflowDefinition, has_errors};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when loading a definition
#[derive(Error, Debug)]
pub enum DefinitionLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse workflow definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid workflow definition ({} issue(s))", .0.len())]
    Invalid(Vec<DefinitionIssue>),
}

impl DefinitionLoadError {
    /// Issues behind an `Invalid` error
    pub fn issues(&self) -> &[DefinitionIssue] {
        match self {
            DefinitionLoadError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

/// Reads TOML definition files
pub struct WorkflowLoader;

impl WorkflowLoader {
    /// Read and validate a definition file.
    ///
    /// Warnings are logged; any error-level issue rejects the document with
    /// the full issue list.
    pub fn load(path: &Path) -> Result<WorkflowDefinition, DefinitionLoadError> {
        debug!("Loading workflow definition {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|source| DefinitionLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate a definition document
    pub fn parse(raw: &str) -> Result<WorkflowDefinition, DefinitionLoadError> {
        let file: FileWorkflow = toml::from_str(raw)?;
        let definition = WorkflowDefinition::from(file);

        let issues = definition.validate();
        if has_errors(&issues) {
            return Err(DefinitionLoadError::Invalid(issues));
        }
        for issue in &issues {
            warn!("{}: {}", definition.name, issue);
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasegate_domain::DefinitionIssueCode;
    use std::io::Write;

    const BRAND_SPRINT: &str = r#"
name = "brand-sprint"

[[phases]]
name = "discovery"
capabilities = ["research"]
max_iterations = 1

[[phases.rubric]]
criterion = "coverage"
weight = 1.0

[[phases]]
name = "visual"
capabilities = ["design", "copy"]
fan_out = 2
max_iterations = 2

[[phases.rubric]]
criterion = "visual-identity"
weight = 0.6
capabilities = ["design"]

[[phases.rubric]]
criterion = "messaging"
weight = 0.4
capabilities = ["copy"]

[phases.reentry_map]
visual-identity = "discovery"
"#;

    #[test]
    fn test_parse_valid_definition() {
        let definition = WorkflowLoader::parse(BRAND_SPRINT).unwrap();
        assert_eq!(definition.name, "brand-sprint");
        assert_eq!(definition.len(), 2);
        let visual = definition.phase("visual").unwrap();
        assert_eq!(visual.fan_out, 2);
        assert_eq!(visual.rubric[0].capabilities, vec!["design"]);
        assert_eq!(
            visual.reentry_map.get("visual-identity").map(String::as_str),
            Some("discovery")
        );
    }

    #[test]
    fn test_invalid_definition_reports_every_issue() {
        let raw = r#"
name = "broken"

[[phases]]
name = "a"
capabilities = []

[[phases.rubric]]
criterion = "q"
weight = 0.5
"#;
        let err = WorkflowLoader::parse(raw).unwrap_err();
        let issues = err.issues();
        assert!(issues.len() >= 2);
        assert!(
            issues
                .iter()
                .any(|i| matches!(i.code, DefinitionIssueCode::NoCapabilities { .. }))
        );
        assert!(
            issues
                .iter()
                .any(|i| matches!(i.code, DefinitionIssueCode::WeightsDoNotSumToOne { .. }))
        );
    }

    #[test]
    fn test_parse_error() {
        let err = WorkflowLoader::parse("name = ").unwrap_err();
        assert!(matches!(err, DefinitionLoadError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BRAND_SPRINT.as_bytes()).unwrap();
        let definition = WorkflowLoader::load(file.path()).unwrap();
        assert_eq!(definition.phases[0].name, "discovery");

        let missing = WorkflowLoader::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(DefinitionLoadError::Io { .. })));
    }
}
