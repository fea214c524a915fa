//! Configuration file loading for phasegate
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `PHASEGATE_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./phasegate.toml` or `./.phasegate.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/phasegate/config.toml`
//! 5. Default values

mod file_config;
mod issue;
mod loader;

pub use file_config::{
    FileConfig, FileDispatchConfig, FileGateConfig, FileLoggingConfig, FileResolverConfig,
    FileWorkerConfig, FileWorkerKind, has_config_errors,
};
pub use issue::{ConfigIssue, ConfigIssueCode};
pub use loader::ConfigLoader;
