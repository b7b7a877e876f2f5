//! Listener parameter resolution
//!
//! Turns the configured `host:port` endpoint into the transport address every
//! controller listener is attached on.

use nvmeof_common::spdk::{ListenAddress, ListenerParams};
use nvmeof_common::{Error, NvmeController, Result};
use std::fmt;
use std::net::IpAddr;

/// NVMe/TCP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Resolved TCP listener endpoint
#[derive(Debug, Clone)]
pub struct TcpSubsystemListener {
    addr: IpAddr,
    port: u16,
    family: AddressFamily,
}

impl TcpSubsystemListener {
    /// Parse `a.b.c.d:port` or `[v6]:port`
    pub fn new(endpoint: &str) -> Result<Self> {
        let (host, port) = split_host_port(endpoint)
            .ok_or_else(|| Error::InvalidConfig(format!("Invalid ip:port tuple: {}", endpoint)))?;

        let parsed: IpAddr = host
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("Invalid ip address: {}", host)))?;

        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("Invalid port: {}", port)))?;

        let (addr, family) = match parsed {
            IpAddr::V4(v4) => (IpAddr::V4(v4), AddressFamily::Ipv4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => (IpAddr::V4(v4), AddressFamily::Ipv4),
                None => (IpAddr::V6(v6), AddressFamily::Ipv6),
            },
        };

        Ok(Self { addr, port, family })
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Listener attach/detach parameters for a controller on `nqn`
    pub fn params(&self, _controller: &NvmeController, nqn: &str) -> ListenerParams {
        ListenerParams {
            nqn: nqn.to_string(),
            listen_address: ListenAddress {
                trtype: "tcp".to_string(),
                traddr: self.addr.to_string(),
                trsvcid: self.port.to_string(),
                adrfam: self.family.to_string(),
            },
        }
    }
}

fn split_host_port(endpoint: &str) -> Option<(&str, &str)> {
    if let Some(rest) = endpoint.strip_prefix('[') {
        return rest.split_once("]:");
    }
    let (host, port) = endpoint.rsplit_once(':')?;
    // Bare IPv6 literals need brackets
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}
