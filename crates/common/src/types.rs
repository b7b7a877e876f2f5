//! Resource records exposed by the bridge

use serde::{Deserialize, Serialize};

/// Controller id stored until the storage target reports a real one
pub const UNASSIGNED_CONTROLLER_ID: i32 = -1;

/// Counter value reported when the storage target has no per-resource figure
pub const UNKNOWN_OPS_COUNT: i64 = -1;

/// Firmware revision reported by Get before reconciliation with the target
pub const PLACEHOLDER_FIRMWARE_REVISION: &str = "TBD";

/// NVMe subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeSubsystem {
    #[serde(default)]
    pub name: String,
    pub nqn: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub max_namespaces: i64,
    #[serde(default)]
    pub status: SubsystemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemStatus {
    #[serde(default)]
    pub firmware_revision: String,
}

/// NVMe controller: a listener attached to a subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeController {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subsystem_id: String,
    #[serde(default)]
    pub controller_id: i32,
    #[serde(default)]
    pub status: ControllerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    #[serde(default)]
    pub active: bool,
}

/// NVMe namespace exposed under a subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeNamespace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subsystem_id: String,
    #[serde(default)]
    pub host_nsid: i32,
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub status: NamespaceStatus,
}

/// PCI device state of a namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PciState {
    #[default]
    Unspecified,
    Disabled,
    Enabled,
}

/// PCI operational state of a namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PciOperState {
    #[default]
    Unspecified,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStatus {
    #[serde(default)]
    pub pci_state: PciState,
    #[serde(default)]
    pub pci_oper_state: PciOperState,
}

impl NamespaceStatus {
    /// Status reported for every namespace the bridge has attached
    pub fn present() -> Self {
        Self {
            pci_state: PciState::Enabled,
            pci_oper_state: PciOperState::Online,
        }
    }
}

/// Read/write counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub read_ops_count: i64,
    pub write_ops_count: i64,
}

impl VolumeStats {
    pub fn unknown() -> Self {
        Self {
            read_ops_count: UNKNOWN_OPS_COUNT,
            write_ops_count: UNKNOWN_OPS_COUNT,
        }
    }
}

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: String,
}

/// List request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub page_token: String,
    /// Parent subsystem name, only meaningful for namespaces
    #[serde(default)]
    pub parent: String,
}
