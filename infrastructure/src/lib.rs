//! Infrastructure layer for phasegate
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: configuration and workflow definition loading, the
//! JSONL run recorder, and concrete workers.

pub mod config;
pub mod definition;
pub mod logging;
pub mod workers;

// Re-export commonly used types
pub use config::{
    ConfigIssue, ConfigIssueCode, ConfigLoader, FileConfig, FileWorkerConfig, FileWorkerKind,
    has_config_errors,
};
pub use definition::{DefinitionLoadError, WorkflowLoader};
pub use logging::{JsonlRunRecorder, RunLog, RunLogError, RunLogReader};
pub use workers::{CommandWorker, CommandWorkerError, StaticWorker, build_registry, build_worker};
