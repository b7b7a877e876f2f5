//! Namespace operations

use super::{Lifecycle, ResourceManager};
use crate::pagination::limit;
use crate::store::{Collection, ResourceStore};
use async_trait::async_trait;
use nvmeof_common::spdk::{AddNamespaceParams, NamespaceParams};
use nvmeof_common::{
    Error, ListRequest, NamespaceStatus, NvmeNamespace, NvmeSubsystem, Page, Result, VolumeStats,
};
use tracing::{debug, warn};

#[async_trait]
impl Lifecycle for NvmeNamespace {
    fn collection(store: &ResourceStore) -> &Collection<Self> {
        &store.namespaces
    }

    fn validate(&self) -> Result<()> {
        if self.subsystem_id.is_empty() {
            return Err(Error::InvalidArgument(
                "invalid input subsystem parameters".to_string(),
            ));
        }
        Ok(())
    }

    async fn provision(&self, manager: &ResourceManager) -> Result<Self> {
        let subsys = manager.referenced_subsystem(&self.subsystem_id)?;

        // The volume id doubles as the backing bdev name
        let params = AddNamespaceParams {
            nqn: subsys.nqn,
            namespace: NamespaceParams {
                nsid: self.host_nsid,
                bdev_name: self.volume_id.clone(),
            },
        };
        let nsid = manager.spdk.add_namespace(&params).await?;
        if nsid < 0 {
            return Err(Error::InvalidArgument(format!(
                "Could not create NS: {}",
                self.name
            )));
        }

        let mut stored = self.clone();
        stored.settle();
        Ok(stored)
    }

    async fn deprovision(&self, manager: &ResourceManager) -> Result<()> {
        let subsys = manager.referenced_subsystem(&self.subsystem_id)?;

        if !manager
            .spdk
            .remove_namespace(&subsys.nqn, self.host_nsid)
            .await?
        {
            return Err(Error::InvalidArgument(format!(
                "Could not delete NS: {}",
                self.name
            )));
        }
        Ok(())
    }

    fn settle(&mut self) {
        self.status = NamespaceStatus::present();
    }
}

impl ResourceManager {
    pub async fn create_namespace(
        &self,
        id: Option<String>,
        namespace: NvmeNamespace,
    ) -> Result<NvmeNamespace> {
        debug!("CreateNvmeNamespace: {:?} {:?}", id, namespace);
        self.create(id, namespace).await
    }

    pub async fn delete_namespace(&self, name: &str, allow_missing: bool) -> Result<()> {
        debug!("DeleteNvmeNamespace: {} (allow_missing={})", name, allow_missing);
        self.delete::<NvmeNamespace>(name, allow_missing).await
    }

    pub async fn update_namespace(
        &self,
        id: Option<String>,
        namespace: NvmeNamespace,
    ) -> Result<NvmeNamespace> {
        debug!("UpdateNvmeNamespace: {:?} {:?}", id, namespace);
        self.update(id, namespace).await
    }

    /// Stored namespace, confirmed present on the storage target
    pub async fn get_namespace(&self, name: &str) -> Result<NvmeNamespace> {
        debug!("GetNvmeNamespace: {}", name);
        let namespace = self.lookup::<NvmeNamespace>(name)?;
        let subsys = self.referenced_subsystem(&namespace.subsystem_id)?;

        let reported = self.spdk.get_subsystems().await?;
        let err = match reported.iter().find(|r| r.nqn == subsys.nqn) {
            Some(r) if r.namespaces.iter().any(|ns| ns.nsid == namespace.host_nsid) => {
                return Ok(NvmeNamespace {
                    name: namespace.name,
                    host_nsid: namespace.host_nsid,
                    status: NamespaceStatus::present(),
                    ..Default::default()
                });
            }
            Some(_) => Error::out_of_sync("NSID", namespace.host_nsid.to_string()),
            None => Error::out_of_sync("NQN", subsys.nqn),
        };
        warn!("{}", err);
        Err(err)
    }

    /// Namespaces the storage target reports, optionally under one parent
    ///
    /// The window applies to each subsystem's namespaces separately.
    pub async fn list_namespaces(&self, request: &ListRequest) -> Result<Page<NvmeNamespace>> {
        debug!("ListNvmeNamespaces: {:?}", request);
        let window = self
            .store
            .pagination
            .extract(request.page_size, &request.page_token)?;

        let nqn = if request.parent.is_empty() {
            String::new()
        } else {
            self.lookup::<NvmeSubsystem>(&request.parent)?.nqn
        };

        let reported = self.spdk.get_subsystems().await?;
        if !nqn.is_empty() && !reported.iter().any(|r| r.nqn == nqn) {
            let err = Error::out_of_sync("NQN", nqn);
            warn!("{}", err);
            return Err(err);
        }

        let mut next_page_token = String::new();
        let mut items = Vec::new();
        for subsys in reported
            .into_iter()
            .filter(|r| nqn.is_empty() || r.nqn == nqn)
        {
            debug!(
                "Limiting {} namespaces of {} to [{}:{}]",
                subsys.namespaces.len(),
                subsys.nqn,
                window.offset,
                window.size
            );
            let (page, has_more) = limit(subsys.namespaces, window);
            if has_more {
                next_page_token = self.store.pagination.issue(window.next_offset());
            }
            items.extend(page.into_iter().map(|ns| NvmeNamespace {
                host_nsid: ns.nsid,
                ..Default::default()
            }));
        }
        items.sort_by_key(|ns| ns.host_nsid);

        Ok(Page {
            items,
            next_page_token,
        })
    }

    pub async fn namespace_stats(&self, name: &str) -> Result<VolumeStats> {
        debug!("NvmeNamespaceStats: {}", name);
        Ok(VolumeStats::unknown())
    }
}
