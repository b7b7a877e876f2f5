//! Subsystem operations

use super::{Lifecycle, ResourceManager};
use crate::store::{Collection, ResourceStore};
use async_trait::async_trait;
use nvmeof_common::spdk::CreateSubsystemParams;
use nvmeof_common::{
    Error, ListRequest, NvmeSubsystem, Page, Result, SubsystemStatus, VolumeStats,
    PLACEHOLDER_FIRMWARE_REVISION,
};
use tracing::{debug, warn};

#[async_trait]
impl Lifecycle for NvmeSubsystem {
    fn collection(store: &ResourceStore) -> &Collection<Self> {
        &store.subsystems
    }

    async fn provision(&self, manager: &ResourceManager) -> Result<Self> {
        let params = CreateSubsystemParams {
            nqn: self.nqn.clone(),
            serial_number: self.serial_number.clone(),
            model_number: self.model_number.clone(),
            allow_any_host: true,
            max_namespaces: self.max_namespaces,
        };
        if !manager.spdk.create_subsystem(&params).await? {
            return Err(Error::InvalidArgument(format!(
                "Could not create NQN: {}",
                self.nqn
            )));
        }

        let version = manager.spdk.get_version().await?;

        let mut stored = self.clone();
        stored.status = SubsystemStatus {
            firmware_revision: version.version,
        };
        Ok(stored)
    }

    async fn deprovision(&self, manager: &ResourceManager) -> Result<()> {
        if !manager.spdk.delete_subsystem(&self.nqn).await? {
            return Err(Error::InvalidArgument(format!(
                "Could not delete NQN: {}",
                self.nqn
            )));
        }
        Ok(())
    }
}

impl ResourceManager {
    pub async fn create_subsystem(
        &self,
        id: Option<String>,
        subsystem: NvmeSubsystem,
    ) -> Result<NvmeSubsystem> {
        debug!("CreateNvmeSubsystem: {:?} {:?}", id, subsystem);
        self.create(id, subsystem).await
    }

    pub async fn delete_subsystem(&self, name: &str, allow_missing: bool) -> Result<()> {
        debug!("DeleteNvmeSubsystem: {} (allow_missing={})", name, allow_missing);
        self.delete::<NvmeSubsystem>(name, allow_missing).await
    }

    pub async fn update_subsystem(
        &self,
        _id: Option<String>,
        subsystem: NvmeSubsystem,
    ) -> Result<NvmeSubsystem> {
        debug!("UpdateNvmeSubsystem: {:?}", subsystem);
        Err(Error::Unimplemented("UpdateNvmeSubsystem".to_string()))
    }

    /// Stored subsystem, reconciled against what the storage target reports
    pub async fn get_subsystem(&self, name: &str) -> Result<NvmeSubsystem> {
        debug!("GetNvmeSubsystem: {}", name);
        let subsys = self.lookup::<NvmeSubsystem>(name)?;

        let reported = self.spdk.get_subsystems().await?;
        match reported.into_iter().find(|r| r.nqn == subsys.nqn) {
            Some(r) => Ok(NvmeSubsystem {
                nqn: r.nqn,
                serial_number: r.serial_number,
                model_number: r.model_number,
                status: SubsystemStatus {
                    firmware_revision: PLACEHOLDER_FIRMWARE_REVISION.to_string(),
                },
                ..Default::default()
            }),
            None => {
                let err = Error::out_of_sync("NQN", subsys.nqn);
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// One page of the subsystems the storage target reports, sorted by NQN
    pub async fn list_subsystems(&self, request: &ListRequest) -> Result<Page<NvmeSubsystem>> {
        debug!("ListNvmeSubsystems: {:?}", request);
        let window = self
            .store
            .pagination
            .extract(request.page_size, &request.page_token)?;

        let reported = self.spdk.get_subsystems().await?;
        debug!(
            "Limiting result len({}) to [{}:{}]",
            reported.len(),
            window.offset,
            window.size
        );
        let (page, next_page_token) = self.store.pagination.paginate(reported, window);

        let mut items: Vec<NvmeSubsystem> = page
            .into_iter()
            .map(|r| NvmeSubsystem {
                nqn: r.nqn,
                serial_number: r.serial_number,
                model_number: r.model_number,
                ..Default::default()
            })
            .collect();
        items.sort_by(|a, b| a.nqn.cmp(&b.nqn));

        Ok(Page {
            items,
            next_page_token,
        })
    }

    /// The storage target has no per-subsystem counters yet
    pub async fn subsystem_stats(&self, name: &str) -> Result<VolumeStats> {
        debug!("NvmeSubsystemStats: {}", name);
        let stats = self.spdk.get_stats().await?;
        debug!("Target reports {} poll groups", stats.poll_groups.len());
        Ok(VolumeStats::unknown())
    }
}
