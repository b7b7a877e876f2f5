//! In-memory resource store
//!
//! Records live for the lifetime of the process. Every read-modify-write
//! sequence holds the per-key lock for its whole duration, backend call
//! included; the record maps themselves are only locked briefly.

use crate::config::PaginationConfig;
use crate::pagination::Pagination;
use dashmap::DashMap;
use nvmeof_common::{NvmeController, NvmeNamespace, NvmeSubsystem};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A record keyed by its resource name
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind name used in logs and error reasons
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);
}

impl Resource for NvmeSubsystem {
    const KIND: &'static str = "subsystem";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Resource for NvmeController {
    const KIND: &'static str = "controller";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Resource for NvmeNamespace {
    const KIND: &'static str = "namespace";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// Records of one kind plus their per-key locks
pub struct Collection<R> {
    records: RwLock<HashMap<String, R>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            locks: DashMap::new(),
        }
    }
}

impl<R: Resource> Collection<R> {
    /// Get a copy of the record stored under `name`
    pub fn get(&self, name: &str) -> Option<R> {
        self.records.read().get(name).cloned()
    }

    /// Store a record under its own name, replacing any previous one
    pub fn insert(&self, record: R) {
        self.records
            .write()
            .insert(record.name().to_string(), record);
    }

    pub fn remove(&self, name: &str) -> Option<R> {
        self.records.write().remove(name)
    }

    /// Copies of every stored record, in no particular order
    pub fn values(&self) -> Vec<R> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize all operations on `name` until the guard drops
    pub async fn lock(&self, name: &str) -> KeyGuard<'_, R> {
        // Built before waiting so an abandoned wait still drops the entry
        let mut key_guard = KeyGuard {
            collection: self,
            key: name.to_string(),
            guard: None,
        };
        let mutex = self.locks.entry(name.to_string()).or_default().clone();
        key_guard.guard = Some(mutex.lock_owned().await);
        key_guard
    }
}

/// Exclusive hold on one resource key
pub struct KeyGuard<'a, R> {
    collection: &'a Collection<R>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<R> Drop for KeyGuard<'_, R> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still references an idle lock
        self.collection
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// All bridge state: three collections and the page-token table
pub struct ResourceStore {
    pub subsystems: Collection<NvmeSubsystem>,
    pub controllers: Collection<NvmeController>,
    pub namespaces: Collection<NvmeNamespace>,
    pub pagination: Pagination,
}

impl ResourceStore {
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            subsystems: Collection::default(),
            controllers: Collection::default(),
            namespaces: Collection::default(),
            pagination: Pagination::new(config),
        }
    }
}
