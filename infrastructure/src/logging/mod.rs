//! Logging infrastructure: structured run logs.
//!
//! Provides [`JsonlRunRecorder`], a JSONL file writer that implements the
//! [`RunRecorder`](phasegate_application::RunRecorder) port, and
//! [`RunLogReader`], which reads such a file back for post-hoc replay.

mod jsonl_recorder;
mod run_log;

pub use jsonl_recorder::JsonlRunRecorder;
pub use run_log::{RecordedEvent, RunLog, RunLogError, RunLogReader};
