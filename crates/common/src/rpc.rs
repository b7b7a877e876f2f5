//! JSON-RPC 2.0 client for the storage-target backend
//!
//! The storage target speaks JSON-RPC over a Unix socket (or TCP). Responses are
//! not line framed, so replies are decoded incrementally from the stream.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Executes named remote procedures against the storage target
#[async_trait]
pub trait Backend: Send + Sync {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value>;
}

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

struct Connection {
    stream: Box<dyn Transport>,
    buf: Vec<u8>,
}

/// JSON-RPC client, connected lazily on first call
pub struct JsonRpcClient {
    address: String,
    next_id: AtomicU64,
    conn: Mutex<Option<Connection>>,
}

impl JsonRpcClient {
    /// Create a new client (does not connect)
    ///
    /// `address` is a Unix socket path (optionally prefixed with `unix:`) or a
    /// `host:port` TCP endpoint.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            next_id: AtomicU64::new(1),
            conn: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<Connection> {
        let stream: Box<dyn Transport> = match unix_path(&self.address) {
            Some(path) => Box::new(UnixStream::connect(path).await.map_err(|e| {
                Error::Rpc(format!("Failed to connect to {}: {}", self.address, e))
            })?),
            None => Box::new(TcpStream::connect(&self.address).await.map_err(|e| {
                Error::Rpc(format!("Failed to connect to {}: {}", self.address, e))
            })?),
        };

        debug!("Connected to storage target at {}", self.address);

        Ok(Connection {
            stream,
            buf: Vec::new(),
        })
    }

    /// Drop the current connection; the next call reconnects
    pub async fn close(&self) {
        *self.conn.lock().await = None;
    }
}

#[async_trait]
impl Backend for JsonRpcClient {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Rpc("Not connected".to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = match conn.exchange(&request).await {
            Ok(response) => response,
            Err(e) => {
                // The stream position is unknown after a failed exchange
                *guard = None;
                return Err(match e {
                    Error::Rpc(msg) => Error::Rpc(msg),
                    other => Error::Rpc(format!("{} failed: {}", method, other)),
                });
            }
        };

        if let Some(error) = response.error {
            return Err(Error::Rpc(format!(
                "{} failed: {} ({})",
                method, error.message, error.code
            )));
        }

        Ok(response.result)
    }
}

impl Connection {
    async fn exchange(&mut self, request: &JsonRpcRequest<'_>) -> Result<JsonRpcResponse> {
        let payload = serde_json::to_vec(request)?;
        trace!("RPC request: {}", String::from_utf8_lossy(&payload));

        self.stream.write_all(&payload).await?;
        self.stream.flush().await?;

        loop {
            let response = self.read_response().await?;
            match response.id {
                Some(id) if id == request.id => return Ok(response),
                // Reply to a request whose caller went away
                Some(id) if id < request.id => {
                    warn!("Discarding stale RPC response id {}", id);
                }
                None if response.error.is_some() => return Ok(response),
                other => {
                    return Err(Error::Rpc(format!(
                        "Unexpected response id {:?}, expected {}",
                        other, request.id
                    )));
                }
            }
        }
    }

    async fn read_response(&mut self) -> Result<JsonRpcResponse> {
        let mut chunk = [0u8; 4096];
        loop {
            if !self.buf.is_empty() {
                let mut values =
                    serde_json::Deserializer::from_slice(&self.buf).into_iter::<JsonRpcResponse>();
                match values.next() {
                    Some(Ok(response)) => {
                        let consumed = values.byte_offset();
                        self.buf.drain(..consumed);
                        trace!("RPC response: {:?}", response);
                        return Ok(response);
                    }
                    Some(Err(e)) if e.is_eof() => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => self.buf.clear(),
                }
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Rpc(
                    "Connection closed by storage target".to_string(),
                ));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

fn unix_path(address: &str) -> Option<&str> {
    if let Some(path) = address.strip_prefix("unix:") {
        return Some(path);
    }
    if address.contains('/') {
        return Some(address);
    }
    None
}

// JSON-RPC protocol types
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}
