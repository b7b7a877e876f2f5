//! NVMe-oF bridge daemon
//!
//! Serves the subsystem/controller/namespace API and drives the storage
//! target over JSON-RPC.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod listener;
mod manager;
mod pagination;
mod store;
#[cfg(test)]
mod testing;

use config::DaemonConfig;
use listener::TcpSubsystemListener;
use manager::ResourceManager;
use nvmeof_common::{JsonRpcClient, SpdkClient};
use store::ResourceStore;

#[derive(Parser)]
#[command(name = "nvmeofd")]
#[command(about = "NVMe-oF bridge daemon - storage target control plane")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nvmeof/config.toml")]
    config: PathBuf,

    /// API listen address
    #[arg(short, long, env = "NVMEOF_LISTEN")]
    listen: Option<String>,

    /// Storage-target JSON-RPC address (socket path or host:port)
    #[arg(short, long, env = "NVMEOF_BACKEND")]
    backend: Option<String>,

    /// Address controllers are exposed on
    #[arg(long, env = "NVMEOF_NVMF_LISTEN")]
    nvmf_listen: Option<String>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("NVMe-oF bridge daemon v{}", nvmeof_common::VERSION);

    let mut config = DaemonConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.api_listen = listen;
    }
    if let Some(backend) = cli.backend {
        config.backend.address = backend;
    }
    if let Some(nvmf_listen) = cli.nvmf_listen {
        config.nvmf.listen_address = nvmf_listen;
    }

    if let Some(path) = cli.write_config {
        config.save(&path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    // A malformed listener address is fatal before anything is served
    let listener = TcpSubsystemListener::new(&config.nvmf.listen_address)?;
    info!(
        "Controllers exposed on {} ({})",
        config.nvmf.listen_address,
        listener.family()
    );

    let addr: SocketAddr = config.api_listen.parse()?;

    let backend = Arc::new(JsonRpcClient::new(config.backend.address.clone()));
    info!("Storage target at {}", backend.address());

    let store = Arc::new(ResourceStore::new(&config.pagination));
    let manager = ResourceManager::new(store, SpdkClient::new(backend.clone()), listener);

    let api_handle = tokio::spawn(api::serve(addr, manager));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => tracing::error!("API server error: {}", e),
                Err(e) => tracing::error!("API server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    backend.close().await;
    info!("Daemon shutdown complete");
    Ok(())
}
