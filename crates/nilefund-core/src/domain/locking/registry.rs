//! Keyed registry of individually locked aggregates

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{LockConfig, ResourceType};
use crate::error::{Error, Result};

/// Registry holding one mutex per aggregate
///
/// The outer `RwLock` only guards membership; it is never held while waiting
/// on an aggregate's mutex.
#[derive(Debug)]
pub struct LockedRegistry<T> {
    resource_type: ResourceType,
    config: LockConfig,
    entries: RwLock<HashMap<Uuid, Arc<Mutex<T>>>>,
}

impl<T: Send + 'static> LockedRegistry<T> {
    /// Create an empty registry
    pub fn new(resource_type: ResourceType, config: LockConfig) -> Self {
        Self {
            resource_type,
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the lock configuration
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Insert a new aggregate. Returns false if the id is already taken.
    pub async fn insert(&self, id: Uuid, value: T) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, Arc::new(Mutex::new(value)));
        true
    }

    /// All ids, sorted for deterministic iteration
    pub async fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.entries.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Acquire the aggregate's lock
    ///
    /// Returns `Ok(None)` when no aggregate has this id, and a lock timeout
    /// error when the aggregate stays locked longer than the configured wait.
    pub async fn lock(&self, id: Uuid) -> Result<Option<OwnedMutexGuard<T>>> {
        let handle = self.entries.read().await.get(&id).cloned();
        let Some(handle) = handle else {
            return Ok(None);
        };

        let lock_key = self.resource_type.lock_key(id);
        debug!(lock_key = %lock_key, "Acquiring aggregate lock");

        match tokio::time::timeout(self.config.timeout, handle.lock_owned()).await {
            Ok(guard) => Ok(Some(guard)),
            Err(_) => {
                warn!(
                    lock_key = %lock_key,
                    timeout_ms = self.config.timeout.as_millis(),
                    "Aggregate lock acquisition timed out"
                );
                Err(Error::LockTimeout(lock_key))
            }
        }
    }

    /// Drop every aggregate and load the given ones
    pub async fn replace_all(&self, values: impl IntoIterator<Item = (Uuid, T)>) {
        let mut entries = self.entries.write().await;
        entries.clear();
        for (id, value) in values {
            entries.insert(id, Arc::new(Mutex::new(value)));
        }
    }
}

impl<T: Clone + Send + 'static> LockedRegistry<T> {
    /// Clone of one aggregate, taken under its lock
    pub async fn get(&self, id: Uuid) -> Result<Option<T>> {
        Ok(self.lock(id).await?.map(|guard| (*guard).clone()))
    }

    /// Clone of every aggregate, ordered by id
    pub async fn snapshot(&self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for id in self.ids().await {
            if let Some(value) = self.get(id).await? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    fn registry() -> LockedRegistry<u64> {
        LockedRegistry::new(
            ResourceType::Project,
            LockConfig::default().with_timeout(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let registry = registry();
        let id = Uuid::new_v4();

        assert!(registry.insert(id, 1).await);
        assert!(!registry.insert(id, 2).await);
        assert_eq!(registry.get(id).await.unwrap(), Some(1));
        assert_eq!(registry.ids().await, vec![id]);
    }

    #[tokio::test]
    async fn test_lock_unknown_id_returns_none() {
        let registry = registry();
        assert!(registry.lock(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let registry = registry();
        let id = Uuid::new_v4();
        registry.insert(id, 10).await;

        let _held = registry.lock(id).await.unwrap().unwrap();
        let error = registry.lock(id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Concurrency);
    }

    #[tokio::test]
    async fn test_other_ids_are_not_blocked() {
        let registry = registry();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.insert(first, 1).await;
        registry.insert(second, 2).await;

        let _held = registry.lock(first).await.unwrap().unwrap();
        let guard = registry.lock(second).await.unwrap().unwrap();
        assert_eq!(*guard, 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_ordered_by_id() {
        let registry = registry();
        let mut ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        for (value, id) in ids.iter().enumerate() {
            registry.insert(*id, value as u64).await;
        }
        ids.sort();

        assert_eq!(registry.ids().await, ids);
        assert_eq!(registry.snapshot().await.unwrap().len(), 3);
    }
}
