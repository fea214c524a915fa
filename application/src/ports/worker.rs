//! Worker port
//!
//! A worker is a specialist that handles tasks for exactly one capability
//! tag. The orchestrator never knows what a worker does with a task; it only
//! sees the [`WorkerOutput`] (or [`WorkerError`]) that comes back.

use async_trait::async_trait;
use phasegate_domain::{Task, WorkerError, WorkerOutput};

/// Specialist that processes tasks for one capability
///
/// Implementations must be safe to call concurrently: the dispatcher may run
/// several tasks on the same worker at once, bounded only by the registry
/// entry's pool size.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable worker name, used in results and logs
    fn name(&self) -> &str;

    /// Capability tag this worker serves
    fn capability(&self) -> &str;

    /// Process one task.
    ///
    /// Timeouts are enforced by the dispatcher; a worker only needs to return
    /// [`WorkerError::Failure`] for failures it detects itself.
    async fn process(&self, task: Task) -> Result<WorkerOutput, WorkerError>;
}
