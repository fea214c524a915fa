//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod manual_decision;
pub mod progress;
pub mod run_recorder;
pub mod worker;
