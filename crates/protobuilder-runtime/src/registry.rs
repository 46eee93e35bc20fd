//! In-process record of the containers this runtime created.
//!
//! Nothing is persisted: containers started by a process that dies without
//! calling [`ContainerRegistry::stop_all`] are orphaned (see
//! `ContainerRuntime::cleanup_stale` for the label-based sweep).

use dashmap::DashMap;
use protobuilder_common::{ContainerEngine, ContainerHandle};
use tracing::{info, warn};

/// Result of a bulk stop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Ids of containers that were removed.
    pub removed: Vec<String>,
    /// `(id, error)` for containers that could not be removed.
    pub failed: Vec<(String, String)>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Stop then force-remove one container. A failed stop is logged and the
/// forced removal still runs.
pub(crate) async fn stop_and_remove<E: ContainerEngine + ?Sized>(
    engine: &E,
    id: &str,
    name: &str,
) -> Result<(), String> {
    if let Err(e) = engine.stop(id).await {
        warn!(container = %name, error = %e, "stop failed, forcing removal");
    }
    match engine.remove(id, true).await {
        Ok(()) => {
            info!(container = %name, "container stopped and removed");
            Ok(())
        }
        Err(e) => {
            warn!(container = %name, error = %e, "failed to remove container");
            Err(e.to_string())
        }
    }
}

/// Concurrent map of tracked containers keyed by container id.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: DashMap<String, ContainerHandle>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, handle: ContainerHandle) {
        self.containers.insert(handle.id.clone(), handle);
    }

    pub fn untrack(&self, id: &str) -> Option<ContainerHandle> {
        self.containers.remove(id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Tracked handles, oldest first.
    pub fn snapshot(&self) -> Vec<ContainerHandle> {
        let mut handles: Vec<ContainerHandle> =
            self.containers.iter().map(|e| e.value().clone()).collect();
        handles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        handles
    }

    /// Stop and force-remove every tracked container.
    ///
    /// Individual failures never abort the sweep. Containers that could not
    /// be removed stay tracked so a later call can retry them.
    pub async fn stop_all<E: ContainerEngine + ?Sized>(&self, engine: &E) -> StopReport {
        let mut report = StopReport::default();
        for handle in self.snapshot() {
            match stop_and_remove(engine, &handle.id, &handle.name).await {
                Ok(()) => {
                    self.untrack(&handle.id);
                    report.removed.push(handle.id);
                }
                Err(e) => report.failed.push((handle.id, e)),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;

    fn handle(id: &str) -> ContainerHandle {
        ContainerHandle::new(id, format!("name-{}", id), "node:14-slim", "/workspace")
    }

    #[test]
    fn track_and_untrack() {
        let registry = ContainerRegistry::new();
        registry.track(handle("a"));
        registry.track(handle("b"));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));

        let removed = registry.untrack("a").unwrap();
        assert_eq!(removed.name, "name-a");
        assert!(!registry.contains("a"));
        assert!(registry.untrack("a").is_none());
    }

    #[test]
    fn snapshot_is_ordered_by_creation() {
        let registry = ContainerRegistry::new();
        let mut first = handle("z");
        first.created_at -= chrono::Duration::seconds(10);
        registry.track(handle("a"));
        registry.track(first);
        let ids: Vec<String> = registry.snapshot().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn stop_all_survives_a_failing_stop() {
        let engine = FakeEngine::new();
        engine.state().fail_stop.insert("b".into());
        let registry = ContainerRegistry::new();
        for id in ["a", "b", "c"] {
            registry.track(handle(id));
        }

        let report = registry.stop_all(&engine).await;

        let state = engine.state();
        assert!(state.stopped.contains(&"a".to_string()));
        assert!(state.stopped.contains(&"c".to_string()));
        assert!(state.removed.contains(&"a".to_string()));
        assert!(state.removed.contains(&"c".to_string()));
        // forced removal still ran for the container whose stop failed
        assert!(state.removed.contains(&"b".to_string()));
        assert_eq!(report.removed.len(), 3);
        assert!(report.is_clean());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stop_all_keeps_unremovable_containers_tracked() {
        let engine = FakeEngine::new();
        {
            let mut state = engine.state();
            state.fail_stop.insert("b".into());
            state.fail_remove.insert("b".into());
        }
        let registry = ContainerRegistry::new();
        for id in ["a", "b", "c"] {
            registry.track(handle(id));
        }

        let report = registry.stop_all(&engine).await;

        let mut removed = report.removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(!report.is_clean());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("b"));
    }

    #[tokio::test]
    async fn stop_all_on_empty_registry_is_noop() {
        let engine = FakeEngine::new();
        let report = ContainerRegistry::new().stop_all(&engine).await;
        assert_eq!(report, StopReport::default());
        assert!(engine.state().stopped.is_empty());
    }
}
