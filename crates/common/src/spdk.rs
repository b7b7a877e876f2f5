//! Typed storage-target procedures
//!
//! Parameter and result shapes follow the SPDK `nvmf_*` JSON-RPC methods.

use crate::rpc::Backend;
use crate::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Typed wrapper over a [`Backend`]
#[derive(Clone)]
pub struct SpdkClient {
    backend: Arc<dyn Backend>,
}

impl SpdkClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    async fn invoke<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R> {
        let params = params.map(serde_json::to_value).transpose()?;
        let result = self.backend.call(method, params).await?;
        debug!("Received from storage target for {}: {}", method, result);
        Ok(serde_json::from_value(result)?)
    }

    pub async fn create_subsystem(&self, params: &CreateSubsystemParams) -> Result<bool> {
        self.invoke("nvmf_create_subsystem", Some(params)).await
    }

    pub async fn delete_subsystem(&self, nqn: &str) -> Result<bool> {
        self.invoke("nvmf_delete_subsystem", Some(NqnParams { nqn })).await
    }

    pub async fn get_subsystems(&self) -> Result<Vec<SubsystemInfo>> {
        self.invoke("nvmf_get_subsystems", None::<()>).await
    }

    pub async fn get_version(&self) -> Result<VersionInfo> {
        self.invoke("spdk_get_version", None::<()>).await
    }

    pub async fn add_listener(&self, params: &ListenerParams) -> Result<bool> {
        self.invoke("nvmf_subsystem_add_listener", Some(params)).await
    }

    pub async fn remove_listener(&self, params: &ListenerParams) -> Result<bool> {
        self.invoke("nvmf_subsystem_remove_listener", Some(params))
            .await
    }

    /// Returns the NSID the target assigned, negative on failure
    pub async fn add_namespace(&self, params: &AddNamespaceParams) -> Result<i64> {
        self.invoke("nvmf_subsystem_add_ns", Some(params)).await
    }

    pub async fn remove_namespace(&self, nqn: &str, nsid: i32) -> Result<bool> {
        self.invoke("nvmf_subsystem_remove_ns", Some(RemoveNamespaceParams { nqn, nsid }))
            .await
    }

    pub async fn get_stats(&self) -> Result<TargetStats> {
        self.invoke("nvmf_get_stats", None::<()>).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSubsystemParams {
    pub nqn: String,
    pub serial_number: String,
    pub model_number: String,
    pub allow_any_host: bool,
    pub max_namespaces: i64,
}

#[derive(Debug, Serialize)]
struct NqnParams<'a> {
    nqn: &'a str,
}

#[derive(Debug, Serialize)]
struct RemoveNamespaceParams<'a> {
    nqn: &'a str,
    nsid: i32,
}

/// Listener attach/detach parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerParams {
    pub nqn: String,
    pub listen_address: ListenAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenAddress {
    pub trtype: String,
    pub traddr: String,
    pub trsvcid: String,
    pub adrfam: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddNamespaceParams {
    pub nqn: String,
    pub namespace: NamespaceParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceParams {
    pub nsid: i32,
    pub bdev_name: String,
}

/// One entry of `nvmf_get_subsystems`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsystemInfo {
    pub nqn: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub max_namespaces: i64,
    #[serde(default)]
    pub allow_any_host: bool,
    #[serde(default)]
    pub namespaces: Vec<NamespaceInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub nsid: i32,
    #[serde(default)]
    pub bdev_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub fields: VersionFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionFields {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
    #[serde(default)]
    pub suffix: String,
}

/// `nvmf_get_stats` result; carries no per-subsystem counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetStats {
    #[serde(default)]
    pub tick_rate: u64,
    #[serde(default)]
    pub poll_groups: Vec<PollGroupStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollGroupStats {
    pub name: String,
    #[serde(default)]
    pub admin_qpairs: u64,
    #[serde(default)]
    pub io_qpairs: u64,
    #[serde(default)]
    pub pending_bdev_io: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listener_params_wire_shape() {
        let params = ListenerParams {
            nqn: "nqn.test:1".to_string(),
            listen_address: ListenAddress {
                trtype: "tcp".to_string(),
                traddr: "10.0.0.1".to_string(),
                trsvcid: "4420".to_string(),
                adrfam: "ipv4".to_string(),
            },
        };

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({
                "nqn": "nqn.test:1",
                "listen_address": {
                    "trtype": "tcp",
                    "traddr": "10.0.0.1",
                    "trsvcid": "4420",
                    "adrfam": "ipv4",
                }
            })
        );
    }

    #[test]
    fn test_get_subsystems_parsing() {
        let json = json!([
            {
                "nqn": "nqn.2014-08.org.nvmexpress.discovery",
                "subtype": "Discovery",
                "listen_addresses": [],
                "hosts": [],
                "allow_any_host": true
            },
            {
                "nqn": "nqn.2016-06.io.spdk:cnode1",
                "subtype": "NVMe",
                "serial_number": "SPDK00000000000001",
                "model_number": "SPDK_Controller1",
                "max_namespaces": 32,
                "namespaces": [
                    {"nsid": 1, "bdev_name": "Malloc2", "name": "Malloc2",
                     "uuid": "55b4b5a9-7d5e-4c1e-8a4f-5e3d6c1b2a90"}
                ]
            }
        ]);

        let subsystems: Vec<SubsystemInfo> = serde_json::from_value(json).unwrap();
        assert_eq!(subsystems.len(), 2);
        assert!(subsystems[0].namespaces.is_empty());
        assert_eq!(subsystems[1].namespaces[0].nsid, 1);
        assert_eq!(subsystems[1].namespaces[0].bdev_name, "Malloc2");
    }

    #[test]
    fn test_version_parsing() {
        let json = json!({
            "version": "SPDK v20.10",
            "fields": {"major": 20, "minor": 10, "patch": 0, "suffix": ""}
        });
        let version: VersionInfo = serde_json::from_value(json).unwrap();
        assert_eq!(version.version, "SPDK v20.10");
        assert_eq!(version.fields.major, 20);
    }
}
