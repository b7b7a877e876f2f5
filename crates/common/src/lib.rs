//! nvmeof-bridge Common Library
//!
//! Shared record types, errors, and the storage-target RPC gateway.

pub mod error;
pub mod rpc;
pub mod spdk;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorCode, Result};
pub use rpc::{Backend, JsonRpcClient};
pub use spdk::SpdkClient;
pub use types::*;

/// nvmeof-bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default storage-target RPC socket
pub const DEFAULT_BACKEND_SOCKET: &str = "/var/tmp/spdk.sock";
