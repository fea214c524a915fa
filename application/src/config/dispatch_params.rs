//! Dispatch parameters: task execution control.
//!
//! [`DispatchParams`] groups the static parameters that control how the
//! [`PhaseDispatcher`](crate::use_cases::dispatch_phase::PhaseDispatcher)
//! runs tasks. These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// What to do with siblings when one task fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Run every task to completion
    #[default]
    CollectAll,
    /// Cancel remaining tasks after the first non-retryable failure
    FailFast,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::CollectAll => "collect-all",
            DispatchMode::FailFast => "fail-fast",
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "collect-all" | "all" => Ok(DispatchMode::CollectAll),
            "fail-fast" | "fast" => Ok(DispatchMode::FailFast),
            other => Err(format!(
                "unknown dispatch mode '{}' (expected collect-all or fail-fast)",
                other
            )),
        }
    }
}

/// Task execution control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchParams {
    /// Timeout for one attempt of one task.
    pub task_timeout: Duration,
    /// Extra attempts after a timeout.
    pub timeout_retries: u32,
    /// Extra attempts after an explicit worker failure.
    pub failure_retries: u32,
    pub mode: DispatchMode,
    /// How long in-flight tasks may keep running after the run is cancelled.
    pub cancel_grace: Duration,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(120),
            timeout_retries: 1,
            failure_retries: 0,
            mode: DispatchMode::CollectAll,
            cancel_grace: Duration::from_secs(5),
        }
    }
}

impl DispatchParams {
    // ==================== Builder Methods ====================

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_timeout_retries(mut self, retries: u32) -> Self {
        self.timeout_retries = retries;
        self
    }

    pub fn with_failure_retries(mut self, retries: u32) -> Self {
        self.failure_retries = retries;
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn fail_fast(&self) -> bool {
        self.mode == DispatchMode::FailFast
    }
}
