//! Worker that answers every task with a fixed confidence

use async_trait::async_trait;
use phasegate_application::Worker;
use phasegate_domain::{Task, WorkerError, WorkerOutput};
use serde_json::json;

/// Fixed-confidence worker for dry runs and smoke tests
pub struct StaticWorker {
    name: String,
    capability: String,
    confidence: f64,
}

impl StaticWorker {
    pub const DEFAULT_CONFIDENCE: f64 = 0.8;

    pub fn new(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl Worker for StaticWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> &str {
        &self.capability
    }

    async fn process(&self, task: Task) -> Result<WorkerOutput, WorkerError> {
        let payload = json!({
            "worker": self.name,
            "task": task.id.to_string(),
            "phase": task.context.phase,
            "attempt": task.context.attempt,
        });
        Ok(WorkerOutput::new(payload, self.confidence))
    }
}
