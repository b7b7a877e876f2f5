//! Resource manager
//!
//! Translates declarative create/delete/update/get/list/stats requests into
//! storage-target calls and keeps the local store consistent with them. Local
//! state is only mutated after the storage target confirms an operation.

mod controller;
mod namespace;
mod subsystem;

use crate::listener::TcpSubsystemListener;
use crate::store::{Collection, Resource, ResourceStore};
use async_trait::async_trait;
use nvmeof_common::{Error, NvmeSubsystem, Result, SpdkClient};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-kind hooks driving the shared create/delete/update flow
#[async_trait]
pub(crate) trait Lifecycle: Resource {
    fn collection(store: &ResourceStore) -> &Collection<Self>;

    /// Request checks made before an identity is assigned
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Realize the record on the storage target; returns the record to store
    async fn provision(&self, manager: &ResourceManager) -> Result<Self>;

    /// Remove the record from the storage target
    async fn deprovision(&self, manager: &ResourceManager) -> Result<()>;

    /// Status forced onto records written by update
    fn settle(&mut self) {}
}

/// Resource manager shared by all API handlers
#[derive(Clone)]
pub struct ResourceManager {
    store: Arc<ResourceStore>,
    spdk: SpdkClient,
    listener: Arc<TcpSubsystemListener>,
}

impl ResourceManager {
    pub fn new(store: Arc<ResourceStore>, spdk: SpdkClient, listener: TcpSubsystemListener) -> Self {
        Self {
            store,
            spdk,
            listener: Arc::new(listener),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    async fn create<R: Lifecycle>(&self, id: Option<String>, mut record: R) -> Result<R> {
        record.validate()?;

        // AIP-133: a caller-provided id wins over any name in the body
        let name = match id.filter(|id| !id.is_empty()) {
            Some(id) => {
                if !record.name().is_empty() && record.name() != id {
                    debug!(
                        "client provided the ID of a resource {}, ignoring the name field {}",
                        id,
                        record.name()
                    );
                }
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        record.set_name(name.clone());

        let collection = R::collection(&self.store);
        let _guard = collection.lock(&name).await;

        if let Some(existing) = collection.get(&name) {
            info!("Already existing {} with id {}", R::KIND, name);
            return Ok(existing);
        }

        let stored = record.provision(self).await.map_err(|e| {
            warn!("Failed to create {} {}: {}", R::KIND, name, e);
            e
        })?;
        collection.insert(stored.clone());

        info!("Created {}: {}", R::KIND, name);
        Ok(stored)
    }

    async fn delete<R: Lifecycle>(&self, name: &str, allow_missing: bool) -> Result<()> {
        let collection = R::collection(&self.store);
        let _guard = collection.lock(name).await;

        let record = match collection.get(name) {
            Some(record) => record,
            None if allow_missing => {
                debug!("{} {} already absent", R::KIND, name);
                return Ok(());
            }
            None => {
                let err = Error::not_found(R::KIND, name);
                warn!("{}", err);
                return Err(err);
            }
        };

        record.deprovision(self).await.map_err(|e| {
            warn!("Failed to delete {} {}: {}", R::KIND, name, e);
            e
        })?;
        collection.remove(name);

        info!("Deleted {}: {}", R::KIND, name);
        Ok(())
    }

    /// Overwrite the stored record without touching the storage target
    async fn update<R: Lifecycle>(&self, id: Option<String>, mut record: R) -> Result<R> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            record.set_name(id);
        }
        if record.name().is_empty() {
            return Err(Error::InvalidArgument(format!("missing {} name", R::KIND)));
        }
        record.settle();

        let collection = R::collection(&self.store);
        let _guard = collection.lock(record.name()).await;
        collection.insert(record.clone());

        debug!("Updated {}: {}", R::KIND, record.name());
        Ok(record)
    }

    fn lookup<R: Lifecycle>(&self, name: &str) -> Result<R> {
        R::collection(&self.store).get(name).ok_or_else(|| {
            let err = Error::not_found(R::KIND, name);
            warn!("{}", err);
            err
        })
    }

    /// Resolve a subsystem reference held by a controller or namespace
    fn referenced_subsystem(&self, subsystem_id: &str) -> Result<NvmeSubsystem> {
        self.lookup::<NvmeSubsystem>(subsystem_id)
    }
}

#[cfg(test)]
pub(crate) fn test_manager(
    target: Arc<crate::testing::FakeTarget>,
) -> ResourceManager {
    let config = crate::config::DaemonConfig::default();
    ResourceManager::new(
        Arc::new(ResourceStore::new(&config.pagination)),
        SpdkClient::new(target),
        TcpSubsystemListener::new(&config.nvmf.listen_address).unwrap(),
    )
}
