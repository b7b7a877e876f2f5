//! Controller operations
//!
//! A controller is a TCP listener attached to a subsystem. The storage target
//! does not report a controller id when the listener is added, so stored
//! controllers carry [`UNASSIGNED_CONTROLLER_ID`].

use super::{Lifecycle, ResourceManager};
use crate::store::{Collection, ResourceStore};
use async_trait::async_trait;
use nvmeof_common::{
    ControllerStatus, Error, ListRequest, NvmeController, Page, Result, VolumeStats,
    UNASSIGNED_CONTROLLER_ID,
};
use tracing::debug;

#[async_trait]
impl Lifecycle for NvmeController {
    fn collection(store: &ResourceStore) -> &Collection<Self> {
        &store.controllers
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

        let params = manager.listener.params(self, &subsys.nqn);
        if !manager.spdk.add_listener(&params).await? {
            return Err(Error::InvalidArgument(format!(
                "Could not create CTRL: {}",
                self.name
            )));
        }

        let mut stored = self.clone();
        stored.controller_id = UNASSIGNED_CONTROLLER_ID;
        stored.settle();
        Ok(stored)
    }

    async fn deprovision(&self, manager: &ResourceManager) -> Result<()> {
        let subsys = manager.referenced_subsystem(&self.subsystem_id)?;

        let params = manager.listener.params(self, &subsys.nqn);
        if !manager.spdk.remove_listener(&params).await? {
            return Err(Error::InvalidArgument(format!(
                "Could not delete NQN:ID {}:{}",
                subsys.nqn, self.controller_id
            )));
        }
        Ok(())
    }

    fn settle(&mut self) {
        self.status = ControllerStatus { active: true };
    }
}

impl ResourceManager {
    pub async fn create_controller(
        &self,
        id: Option<String>,
        controller: NvmeController,
    ) -> Result<NvmeController> {
        debug!("CreateNvmeController: {:?} {:?}", id, controller);
        self.create(id, controller).await
    }

    pub async fn delete_controller(&self, name: &str, allow_missing: bool) -> Result<()> {
        debug!("DeleteNvmeController: {} (allow_missing={})", name, allow_missing);
        self.delete::<NvmeController>(name, allow_missing).await
    }

    pub async fn update_controller(
        &self,
        id: Option<String>,
        controller: NvmeController,
    ) -> Result<NvmeController> {
        debug!("UpdateNvmeController: {:?} {:?}", id, controller);
        self.update(id, controller).await
    }

    pub async fn get_controller(&self, name: &str) -> Result<NvmeController> {
        debug!("GetNvmeController: {}", name);
        let controller = self.lookup::<NvmeController>(name)?;
        Ok(NvmeController {
            name: name.to_string(),
            controller_id: controller.controller_id,
            status: ControllerStatus { active: true },
            ..Default::default()
        })
    }

    /// One page of the locally stored controllers, sorted by name
    pub async fn list_controllers(&self, request: &ListRequest) -> Result<Page<NvmeController>> {
        debug!("ListNvmeControllers: {:?}", request);
        let window = self
            .store
            .pagination
            .extract(request.page_size, &request.page_token)?;

        let mut controllers = self.store.controllers.values();
        controllers.sort_by(|a, b| a.name.cmp(&b.name));

        let (items, next_page_token) = self.store.pagination.paginate(controllers, window);
        Ok(Page {
            items,
            next_page_token,
        })
    }

    pub async fn controller_stats(&self, name: &str) -> Result<VolumeStats> {
        debug!("NvmeControllerStats: {}", name);
        Ok(VolumeStats::unknown())
    }
}
