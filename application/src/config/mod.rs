//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`DispatchParams`]: task execution control (timeouts, retries, mode)
//! - [`RunSettings`]: container for everything a run needs
//!   (gate policy, resolver settings, dispatch parameters)

pub mod dispatch_params;
pub mod run_settings;

pub use dispatch_params::{DispatchMode, DispatchParams};
pub use run_settings::RunSettings;
