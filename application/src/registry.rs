//! Worker registry
//!
//! Maps capability tags to the workers that can serve them. Built once at
//! startup, then shared read-only (`Arc<WorkerRegistry>`) by every run.

use crate::ports::worker::Worker;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Pool size used when a capability has no explicit bound
pub const DEFAULT_POOL_SIZE: usize = 4;

struct RegistryEntry {
    workers: Vec<Arc<dyn Worker>>,
    pool_size: usize,
    pool: Arc<Semaphore>,
}

impl RegistryEntry {
    fn new(pool_size: usize) -> Self {
        Self {
            workers: Vec::new(),
            pool_size,
            pool: Arc::new(Semaphore::new(pool_size)),
        }
    }
}

/// Capability tag → ordered candidate workers plus a concurrency bound
///
/// # Example
///
/// ```ignore
/// let registry = WorkerRegistry::new()
///     .with_worker(Arc::new(StaticWorker::new("researcher", "research", 0.9)))
///     .with_pool_size("research", 2);
/// assert!(registry.contains("research"));
/// ```
pub struct WorkerRegistry {
    entries: BTreeMap<String, RegistryEntry>,
    default_pool_size: usize,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            default_pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Pool size for capabilities registered after this call
    pub fn with_default_pool_size(mut self, size: usize) -> Self {
        self.default_pool_size = size.max(1);
        self
    }

    /// Add a worker as the next candidate for its capability
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        let default_pool_size = self.default_pool_size;
        self.entries
            .entry(worker.capability().to_string())
            .or_insert_with(|| RegistryEntry::new(default_pool_size))
            .workers
            .push(worker);
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.register(worker);
        self
    }

    /// Bound the number of tasks of `capability` running at once
    pub fn with_pool_size(mut self, capability: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        let entry = self
            .entries
            .entry(capability.into())
            .or_insert_with(|| RegistryEntry::new(size));
        entry.pool_size = size;
        entry.pool = Arc::new(Semaphore::new(size));
        self
    }

    /// Candidate workers for a capability, in registration order
    pub fn candidates(&self, capability: &str) -> &[Arc<dyn Worker>] {
        self.entries
            .get(capability)
            .map(|e| e.workers.as_slice())
            .unwrap_or_default()
    }

    /// Worker serving variant `variant` of a capability (round-robin)
    pub fn select(&self, capability: &str, variant: u32) -> Option<Arc<dyn Worker>> {
        let candidates = self.candidates(capability);
        if candidates.is_empty() {
            return None;
        }
        Some(Arc::clone(&candidates[variant as usize % candidates.len()]))
    }

    pub(crate) fn pool(&self, capability: &str) -> Option<Arc<Semaphore>> {
        self.entries.get(capability).map(|e| Arc::clone(&e.pool))
    }

    pub fn pool_size(&self, capability: &str) -> Option<usize> {
        self.entries.get(capability).map(|e| e.pool_size)
    }

    /// Capabilities with at least one worker
    pub fn capabilities(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.workers.is_empty())
            .map(|(tag, _)| tag.as_str())
            .collect()
    }

    pub fn contains(&self, capability: &str) -> bool {
        !self.candidates(capability).is_empty()
    }

    /// Total number of registered workers
    pub fn len(&self) -> usize {
        self.entries.values().map(|e| e.workers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (tag, entry) in &self.entries {
            let names: Vec<&str> = entry.workers.iter().map(|w| w.name()).collect();
            map.entry(tag, &(names, entry.pool_size));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use phasegate_domain::{Task, WorkerError, WorkerOutput};

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Worker for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn capability(&self) -> &str {
            self.1
        }
        async fn process(&self, _task: Task) -> Result<WorkerOutput, WorkerError> {
            Ok(WorkerOutput::default())
        }
    }

    fn registry() -> WorkerRegistry {
        WorkerRegistry::new()
            .with_worker(Arc::new(Named("r1", "research")))
            .with_worker(Arc::new(Named("r2", "research")))
            .with_worker(Arc::new(Named("d1", "design")))
    }

    #[test]
    fn test_candidates_keep_registration_order() {
        let registry = registry();
        let names: Vec<&str> = registry
            .candidates("research")
            .iter()
            .map(|w| w.name())
            .collect();
        assert_eq!(names, vec!["r1", "r2"]);
        assert!(registry.candidates("copy").is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_select_round_robin() {
        let registry = registry();
        let picks: Vec<String> = (0..4)
            .filter_map(|v| registry.select("research", v))
            .map(|w| w.name().to_string())
            .collect();
        assert_eq!(picks, vec!["r1", "r2", "r1", "r2"]);
        assert!(registry.select("copy", 0).is_none());
    }

    #[test]
    fn test_capabilities_and_contains() {
        let registry = registry().with_pool_size("copy", 2);
        assert_eq!(registry.capabilities(), vec!["design", "research"]);
        assert!(registry.contains("design"));
        assert!(!registry.contains("copy"));
    }

    #[test]
    fn test_pool_sizes() {
        let registry = registry().with_pool_size("research", 1);
        assert_eq!(registry.pool_size("research"), Some(1));
        assert_eq!(registry.pool_size("design"), Some(DEFAULT_POOL_SIZE));
        assert_eq!(
            registry.pool("research").map(|p| p.available_permits()),
            Some(1)
        );
    }
}
