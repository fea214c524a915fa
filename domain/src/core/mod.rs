//! Core domain concepts shared across all subdomains.
//!
//! - [`ids::RunId`] / [`ids::TaskId`]: identifiers for runs and tasks
//! - [`error::OrchestrationError`]: the orchestration error taxonomy
//! - [`string`]: text helpers for rationales and diagnostics

pub mod error;
pub mod ids;
pub mod string;
