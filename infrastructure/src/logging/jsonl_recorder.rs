//! JSONL file writer for run events.
//!
//! Each [`RunEvent`] is serialized as a single JSON line with a `type` field
//! and `timestamp`, appended to the file via a buffered writer.

use phasegate_application::{RunEvent, RunRecorder};
use phasegate_domain::RunId;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL run recorder that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every record and
/// on `Drop`.
pub struct JsonlRunRecorder {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlRunRecorder {
    /// Create a recorder writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create run log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create run log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Create `<dir>/<run-id>.run.jsonl`
    pub fn for_run(dir: impl AsRef<Path>, run_id: RunId) -> Option<Self> {
        Self::new(Self::file_for(dir.as_ref(), run_id))
    }

    /// Path of the log file for `run_id` inside `dir`
    pub fn file_for(dir: &Path, run_id: RunId) -> PathBuf {
        dir.join(format!("{}.run.jsonl", run_id))
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunRecorder for JsonlRunRecorder {
    fn record(&self, event: RunEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        // Merge payload with type + timestamp
        let record = if let Value::Object(mut map) = event.payload {
            map.insert(
                "type".to_string(),
                Value::String(event.event_type.to_string()),
            );
            map.insert("timestamp".to_string(), Value::String(timestamp));
            Value::Object(map)
        } else {
            serde_json::json!({
                "type": event.event_type,
                "timestamp": timestamp,
                "data": event.payload,
            })
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock()
            && let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush())
        {
            warn!("Could not write run log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlRunRecorder {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_recorder_writes_valid_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.run.jsonl");
        let recorder = JsonlRunRecorder::new(&path).unwrap();

        recorder.record(RunEvent::new(
            "run_started",
            serde_json::json!({"run_id": "r1", "workflow": "sprint", "phases": 2}),
        ));
        recorder.record(RunEvent::new(
            "phase_run",
            serde_json::json!({"phase": "discovery", "attempt": 0, "verdict": "pass"}),
        ));
        drop(recorder);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.get("type").is_some());
            assert!(line.get("timestamp").is_some());
        }
        assert_eq!(lines[0]["type"], "run_started");
        assert_eq!(lines[0]["workflow"], "sprint");
        assert_eq!(lines[1]["type"], "phase_run");
        assert_eq!(lines[1]["verdict"], "pass");
    }

    #[test]
    fn test_recorder_wraps_non_object_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalar.run.jsonl");
        let recorder = JsonlRunRecorder::new(&path).unwrap();
        recorder.record(RunEvent::new("note", serde_json::json!("just a string")));
        drop(recorder);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "note");
        assert_eq!(lines[0]["data"], "just a string");
    }

    #[test]
    fn test_for_run_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = RunId::new();
        let nested = dir.path().join("a").join("b");
        let recorder = JsonlRunRecorder::for_run(&nested, run_id).unwrap();
        assert_eq!(recorder.path(), JsonlRunRecorder::file_for(&nested, run_id));
        assert!(recorder.path().exists());
    }
}
