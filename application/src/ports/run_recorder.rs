//! Port for structured run recording.
//!
//! Defines the [`RunRecorder`] trait for persisting run events (phase runs,
//! audit entries, run start/finish) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the run's
//! decision history in a machine-readable format (JSONL) that can be replayed
//! with `phasegate explain`.

use serde_json::Value;

/// A structured run event.
///
/// Each event has a type string and a JSON payload containing event-specific
/// fields. The adapter adds the timestamp when writing.
#[derive(Debug, Clone)]
pub struct RunEvent {
    /// Event type identifier (e.g., "run_started", "phase_run", "audit").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl RunEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for recording run events.
///
/// `record` is synchronous and non-fallible so that a broken log file never
/// aborts a run; adapters report write failures through `tracing`.
pub trait RunRecorder: Send + Sync {
    fn record(&self, event: RunEvent);
}

/// No-op implementation for tests and when recording is disabled.
pub struct NoRunRecorder;

impl RunRecorder for NoRunRecorder {
    fn record(&self, _event: RunEvent) {}
}
