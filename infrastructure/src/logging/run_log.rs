//! Reading JSONL run logs back for replay

use phasegate_domain::{AuditEntry, PhaseRun, RunMetrics, RunState};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum RunLogError {
    #[error("Failed to read run log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run log line {line} is not valid JSON: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Run log contains no events")]
    Empty,
}

/// One line of a run log
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event_type: String,
    pub timestamp: Option<String>,
    /// The full record, including `type` and `timestamp`
    pub record: Value,
}

impl RecordedEvent {
    fn from_record(record: Value) -> Self {
        let event_type = record
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_str)
            .map(String::from);
        Self {
            event_type,
            timestamp,
            record,
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_value(self.record.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping malformed '{}' record: {}", self.event_type, e);
                None
            }
        }
    }
}

/// A parsed run log
#[derive(Debug, Clone)]
pub struct RunLog {
    events: Vec<RecordedEvent>,
}

impl RunLog {
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    fn of_type<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a RecordedEvent> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    fn started(&self) -> Option<&RecordedEvent> {
        self.of_type("run_started").next()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.started()?.record.get("run_id")?.as_str()
    }

    pub fn workflow(&self) -> Option<&str> {
        self.started()?.record.get("workflow")?.as_str()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.started()?.record.get("project_id")?.as_str()
    }

    /// Audit entries in append order
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.of_type("audit").filter_map(RecordedEvent::decode).collect()
    }

    pub fn phase_runs(&self) -> Vec<PhaseRun> {
        self.of_type("phase_run")
            .filter_map(RecordedEvent::decode)
            .collect()
    }

    /// Execution statistics rebuilt from the recorded phase runs
    pub fn metrics(&self) -> RunMetrics {
        RunMetrics::from_phase_runs(&self.phase_runs())
    }

    /// Final state, or `None` if the run never finished (e.g. the process died)
    pub fn final_state(&self) -> Option<RunState> {
        let finished = self.of_type("run_finished").last()?;
        serde_json::from_value(finished.record.get("state")?.clone()).ok()
    }

    pub fn exit_code(&self) -> Option<i32> {
        let finished = self.of_type("run_finished").last()?;
        finished
            .record
            .get("exit_code")?
            .as_i64()
            .and_then(|code| i32::try_from(code).ok())
    }
}

/// Reads `.run.jsonl` files
pub struct RunLogReader;

impl RunLogReader {
    pub fn read(path: &Path) -> Result<RunLog, RunLogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RunLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse log text. Blank lines are skipped; any other bad line is an error.
    pub fn parse(raw: &str) -> Result<RunLog, RunLogError> {
        let mut events = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Value = serde_json::from_str(line).map_err(|source| {
                RunLogError::InvalidLine {
                    line: index + 1,
                    source,
                }
            })?;
            events.push(RecordedEvent::from_record(record));
        }
        if events.is_empty() {
            return Err(RunLogError::Empty);
        }
        Ok(RunLog { events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::JsonlRunRecorder;
    use phasegate_application::{RunEvent, RunRecorder};
    use phasegate_domain::{AuditLog, DecisionKind, RunId, RunOutcome};
    use serde_json::json;

    #[test]
    fn test_replay_recorded_run() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = RunId::new();
        let recorder = JsonlRunRecorder::for_run(dir.path(), run_id).unwrap();

        let mut audit = AuditLog::new(run_id);
        audit.append(None, DecisionKind::RunStarted, &"sprint", "run started", None);
        audit.append(
            Some("visual"),
            DecisionKind::Verdict,
            &json!({"aggregate": 2.0}),
            "aggregate 2.00 below threshold 3.50",
            Some(0.4),
        );

        recorder.record(RunEvent::new(
            "run_started",
            json!({"run_id": run_id, "project_id": "acme", "workflow": "sprint"}),
        ));
        for entry in audit.entries() {
            recorder.record(RunEvent::new("audit", serde_json::to_value(entry).unwrap()));
        }
        let phase_run = PhaseRun::new("visual", 0, 0);
        recorder.record(RunEvent::new("phase_run", serde_json::to_value(&phase_run).unwrap()));
        let state = RunState::Aborted {
            outcome: RunOutcome::QualityFailure,
            reason: "too weak".to_string(),
        };
        recorder.record(RunEvent::new(
            "run_finished",
            json!({"run_id": run_id, "state": state, "exit_code": 1}),
        ));
        let path = recorder.path().to_path_buf();
        drop(recorder);

        let log = RunLogReader::read(&path).unwrap();
        assert_eq!(log.run_id(), Some(run_id.to_string().as_str()));
        assert_eq!(log.workflow(), Some("sprint"));
        assert_eq!(log.project_id(), Some("acme"));

        let entries = log.audit_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, DecisionKind::Verdict);
        assert_eq!(entries[1].phase.as_deref(), Some("visual"));
        assert_eq!(log.final_state(), Some(state));
        assert_eq!(log.exit_code(), Some(1));

        let metrics = log.metrics();
        assert_eq!(metrics.phase_runs, 1);
        assert_eq!(metrics.phase("visual").map(|p| p.runs), Some(1));
    }

    #[test]
    fn test_unfinished_run_has_no_final_state() {
        let log = RunLogReader::parse(
            r#"{"type":"run_started","run_id":"x","workflow":"w"}

"#,
        )
        .unwrap();
        assert_eq!(log.events().len(), 1);
        assert!(log.final_state().is_none());
        assert!(log.exit_code().is_none());
    }

    #[test]
    fn test_bad_line_is_reported_with_its_number() {
        let err = RunLogReader::parse("{\"type\":\"audit\"}\nnot json\n").unwrap_err();
        assert!(matches!(err, RunLogError::InvalidLine { line: 2, .. }));
        assert!(matches!(RunLogReader::parse("\n\n"), Err(RunLogError::Empty)));
    }
}
