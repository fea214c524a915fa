//! Raw TOML configuration data types
//!
//! These structs mirror the config file layout. Conversions into the typed
//! application settings live beside each section and report problems as
//! [`ConfigIssue`]s instead of failing.

mod dispatch;
mod gate;
mod logging;
mod resolver;
mod workers;

pub use dispatch::FileDispatchConfig;
pub use gate::FileGateConfig;
pub use logging::FileLoggingConfig;
pub use resolver::FileResolverConfig;
pub use workers::{FileWorkerConfig, FileWorkerKind};

use crate::config::issue::ConfigIssue;
use phasegate_application::RunSettings;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Quality gate thresholds
    pub gate: FileGateConfig,
    /// Task timeouts, retries and dispatch mode
    pub dispatch: FileDispatchConfig,
    /// Conflict resolution weights and rules
    pub resolver: FileResolverConfig,
    /// Run log output
    pub logging: FileLoggingConfig,
    /// Configured workers
    pub workers: Vec<FileWorkerConfig>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let (_, mut issues) = self.to_run_settings();
        issues.extend(workers::validate_workers(&self.workers));
        issues
    }

    /// Typed run settings plus any issues found while converting
    pub fn to_run_settings(&self) -> (RunSettings, Vec<ConfigIssue>) {
        let (gate, mut issues) = self.gate.to_gate_policy();
        let (dispatch, dispatch_issues) = self.dispatch.to_dispatch_params();
        let (resolver, resolver_issues) = self.resolver.to_resolver_config();
        issues.extend(dispatch_issues);
        issues.extend(resolver_issues);
        (RunSettings::new(gate, resolver, dispatch), issues)
    }
}

/// Whether any of the issues is fatal
pub fn has_config_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}
