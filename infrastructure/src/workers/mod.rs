//! Concrete worker adapters and registry construction from config

mod command;
mod static_worker;

pub use command::{CommandWorker, CommandWorkerError};
pub use static_worker::StaticWorker;

use crate::config::{ConfigIssue, FileWorkerConfig, FileWorkerKind};
use phasegate_application::{Worker, WorkerRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Build a worker from its config entry, or `None` if the entry is unusable
pub fn build_worker(config: &FileWorkerConfig) -> Option<Arc<dyn Worker>> {
    if config.validate().iter().any(ConfigIssue::is_error) {
        warn!("Skipping misconfigured worker '{}'", config.name);
        return None;
    }
    let worker: Arc<dyn Worker> = match config.kind {
        FileWorkerKind::Command => {
            let command = config.command.as_deref()?;
            let mut worker = CommandWorker::new(&config.name, &config.capability, command);
            if let Some(dir) = &config.working_dir {
                worker = worker.with_working_dir(dir);
            }
            Arc::new(worker)
        }
        FileWorkerKind::Static => {
            let confidence = config
                .confidence
                .unwrap_or(StaticWorker::DEFAULT_CONFIDENCE);
            Arc::new(StaticWorker::new(&config.name, &config.capability).with_confidence(confidence))
        }
    };
    Some(worker)
}

/// Register every usable configured worker.
///
/// When several workers share a capability, the largest configured
/// `pool_size` among them applies.
pub fn build_registry(configs: &[FileWorkerConfig]) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    let mut pools: BTreeMap<&str, usize> = BTreeMap::new();

    for config in configs {
        let Some(worker) = build_worker(config) else {
            continue;
        };
        debug!(
            "Registered worker '{}' for capability '{}'",
            config.name, config.capability
        );
        registry.register(worker);
        if let Some(size) = config.pool_size {
            let entry = pools.entry(config.capability.as_str()).or_default();
            *entry = (*entry).max(size);
        }
    }

    pools
        .into_iter()
        .fold(registry, |registry, (capability, size)| {
            registry.with_pool_size(capability, size)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_entry(name: &str, capability: &str, pool_size: Option<usize>) -> FileWorkerConfig {
        FileWorkerConfig {
            name: name.to_string(),
            capability: capability.to_string(),
            kind: FileWorkerKind::Static,
            command: None,
            working_dir: None,
            confidence: Some(0.9),
            pool_size,
        }
    }

    #[test]
    fn test_build_registry_groups_by_capability() {
        let configs = vec![
            static_entry("r1", "review", Some(1)),
            static_entry("r2", "review", Some(3)),
            static_entry("c1", "copy", None),
        ];
        let registry = build_registry(&configs);
        assert_eq!(registry.candidates("review").len(), 2);
        assert_eq!(registry.pool_size("review"), Some(3));
        assert!(registry.contains("copy"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_misconfigured_worker_is_skipped() {
        let mut broken = static_entry("cmd", "copy", None);
        broken.kind = FileWorkerKind::Command;
        assert!(build_worker(&broken).is_none());
        assert!(build_registry(&[broken]).is_empty());
    }
}
