//! Audit trail
//!
//! Every orchestrator decision point (dispatch start/end, conflict
//! resolution, verdict, routing, run termination) appends one entry.

pub mod entry;
pub mod log;

pub use entry::{AuditEntry, DecisionKind, digest};
pub use log::AuditLog;
