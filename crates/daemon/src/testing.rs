//! In-process storage target for tests

use async_trait::async_trait;
use nvmeof_common::spdk::{NamespaceInfo, SubsystemInfo};
use nvmeof_common::{Backend, Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct TargetState {
    subsystems: Vec<SubsystemInfo>,
    listeners: Vec<(String, String, String)>,
}

/// Keeps subsystem/namespace/listener state like the real target and
/// records every call it receives.
#[derive(Default)]
pub struct FakeTarget {
    state: Mutex<TargetState>,
    calls: Mutex<HashMap<String, usize>>,
    rejected: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `method` answer false (or a negative NSID)
    pub fn reject(&self, method: &str) {
        self.rejected.lock().insert(method.to_string());
    }

    pub fn accept(&self, method: &str) {
        self.rejected.lock().remove(method);
    }

    /// Make `method` fail at the transport level
    pub fn fail(&self, method: &str) {
        self.failing.lock().insert(method.to_string());
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn seed_subsystem(&self, nqn: &str, nsids: &[i32]) {
        self.state.lock().subsystems.push(SubsystemInfo {
            nqn: nqn.to_string(),
            subtype: "NVMe".to_string(),
            namespaces: nsids
                .iter()
                .map(|&nsid| NamespaceInfo {
                    nsid,
                    bdev_name: format!("Malloc{}", nsid),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
    }

    pub fn has_subsystem(&self, nqn: &str) -> bool {
        self.state.lock().subsystems.iter().any(|s| s.nqn == nqn)
    }

    /// Drop a subsystem behind the bridge's back
    pub fn forget_subsystem(&self, nqn: &str) {
        self.state.lock().subsystems.retain(|s| s.nqn != nqn);
    }

    pub fn forget_namespace(&self, nqn: &str, nsid: i32) {
        let mut state = self.state.lock();
        if let Some(subsys) = state.subsystems.iter_mut().find(|s| s.nqn == nqn) {
            subsys.namespaces.retain(|ns| ns.nsid != nsid);
        }
    }

    pub fn listeners(&self) -> Vec<(String, String, String)> {
        self.state.lock().listeners.clone()
    }

    pub fn namespaces(&self, nqn: &str) -> Vec<(i32, String)> {
        self.state
            .lock()
            .subsystems
            .iter()
            .find(|s| s.nqn == nqn)
            .map(|s| {
                s.namespaces
                    .iter()
                    .map(|ns| (ns.nsid, ns.bdev_name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn dispatch(&self, method: &str, params: &Value) -> Result<Value> {
        let rejected = self.rejected.lock().contains(method);
        let nqn = params["nqn"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock();

        let result = match method {
            "nvmf_create_subsystem" => {
                let ok = !rejected && !state.subsystems.iter().any(|s| s.nqn == nqn);
                if ok {
                    state.subsystems.push(SubsystemInfo {
                        nqn,
                        subtype: "NVMe".to_string(),
                        serial_number: params["serial_number"].as_str().unwrap_or_default().to_string(),
                        model_number: params["model_number"].as_str().unwrap_or_default().to_string(),
                        max_namespaces: params["max_namespaces"].as_i64().unwrap_or_default(),
                        allow_any_host: params["allow_any_host"].as_bool().unwrap_or_default(),
                        namespaces: Vec::new(),
                    });
                }
                json!(ok)
            }
            "nvmf_delete_subsystem" => {
                let before = state.subsystems.len();
                if !rejected {
                    state.subsystems.retain(|s| s.nqn != nqn);
                }
                json!(state.subsystems.len() < before)
            }
            "nvmf_get_subsystems" => serde_json::to_value(&state.subsystems)?,
            "spdk_get_version" => json!({
                "version": "SPDK v23.01",
                "fields": {"major": 23, "minor": 1, "patch": 0, "suffix": ""}
            }),
            "nvmf_subsystem_add_listener" | "nvmf_subsystem_remove_listener" => {
                let address = &params["listen_address"];
                let listener = (
                    nqn,
                    address["traddr"].as_str().unwrap_or_default().to_string(),
                    address["trsvcid"].as_str().unwrap_or_default().to_string(),
                );
                if !rejected {
                    if method == "nvmf_subsystem_add_listener" {
                        state.listeners.push(listener);
                    } else {
                        state.listeners.retain(|l| *l != listener);
                    }
                }
                json!(!rejected)
            }
            "nvmf_subsystem_add_ns" => {
                let nsid = params["namespace"]["nsid"].as_i64().unwrap_or_default() as i32;
                let bdev_name = params["namespace"]["bdev_name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                match state.subsystems.iter_mut().find(|s| s.nqn == nqn) {
                    Some(subsys) if !rejected => {
                        subsys.namespaces.push(NamespaceInfo {
                            nsid,
                            bdev_name,
                            ..Default::default()
                        });
                        json!(nsid)
                    }
                    _ => json!(-1),
                }
            }
            "nvmf_subsystem_remove_ns" => {
                let nsid = params["nsid"].as_i64().unwrap_or_default() as i32;
                let removed = match state.subsystems.iter_mut().find(|s| s.nqn == nqn) {
                    Some(subsys) if !rejected => {
                        let before = subsys.namespaces.len();
                        subsys.namespaces.retain(|ns| ns.nsid != nsid);
                        subsys.namespaces.len() < before
                    }
                    _ => false,
                };
                json!(removed)
            }
            "nvmf_get_stats" => json!({"tick_rate": 2300000000u64, "poll_groups": []}),
            other => return Err(Error::Rpc(format!("Method not found: {}", other))),
        };
        Ok(result)
    }
}

#[async_trait]
impl Backend for FakeTarget {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        *self.calls.lock().entry(method.to_string()).or_default() += 1;
        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;

        if self.failing.lock().contains(method) {
            return Err(Error::Rpc(format!("{} failed: connection reset", method)));
        }
        self.dispatch(method, &params.unwrap_or(Value::Null))
    }
}
