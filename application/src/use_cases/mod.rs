//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod control;
pub mod dispatch_phase;
pub mod run_workflow;
