//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP API listen address
    pub api_listen: String,

    /// Storage-target backend configuration
    pub backend: BackendConfig,

    /// NVMe-oF listener configuration
    pub nvmf: NvmfConfig,

    /// List pagination configuration
    pub pagination: PaginationConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_listen: "127.0.0.1:50051".to_string(),
            backend: BackendConfig::default(),
            nvmf: NvmfConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

/// Storage-target backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// JSON-RPC endpoint: a Unix socket path or `host:port`
    pub address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: nvmeof_common::DEFAULT_BACKEND_SOCKET.to_string(),
        }
    }
}

/// NVMe-oF listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NvmfConfig {
    /// `host:port` every controller listener is attached on
    pub listen_address: String,
}

impl Default for NvmfConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:4420".to_string(),
        }
    }
}

/// List pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when a request asks for 0
    pub default_page_size: usize,

    /// Upper bound on any requested page size
    pub max_page_size: usize,

    /// Maximum number of outstanding page tokens
    pub max_cursors: usize,

    /// Seconds a page token stays valid
    pub cursor_ttl_secs: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 250,
            max_cursors: 1024,
            cursor_ttl_secs: 600,
        }
    }
}

impl PaginationConfig {
    pub fn cursor_ttl(&self) -> Duration {
        Duration::from_secs(self.cursor_ttl_secs)
    }
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
