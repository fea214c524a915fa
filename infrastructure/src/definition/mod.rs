//! Workflow definition documents
//!
//! Definitions are TOML files. [`WorkflowLoader`] parses them into the
//! domain [`WorkflowDefinition`](phasegate_domain::WorkflowDefinition) and
//! rejects invalid documents with every detected issue.

mod document;
mod loader;

pub use document::{FileCriterion, FilePhase, FileWorkflow};
pub use loader::{DefinitionLoadError, WorkflowLoader};
