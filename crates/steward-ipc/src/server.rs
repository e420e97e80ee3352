//! Unix socket IPC server for the Steward daemon.
//!
//! Handles incoming connections and dispatches requests to handlers.

use crate::{encode, ErrorCode, IpcError, Request, Response};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Maximum request size (1MB)
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Request timeout for reading from socket
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    handler: Arc<dyn RequestHandler>,
}

impl IpcServer {
    /// Create a new IPC server bound to the given socket path
    pub async fn new<P: AsRef<Path>>(
        socket_path: P,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, IpcError> {
        let socket_path = socket_path.as_ref();

        // Remove stale socket file if it exists
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // User only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!("IPC server listening on {}", socket_path.display());

        Ok(Self { listener, handler })
    }

    /// Run the server, accepting connections until the task is dropped
    pub async fn run(&self) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, handler).await {
                            tracing::debug!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Handle a single connection
    async fn handle_connection(
        mut stream: UnixStream,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), IpcError> {
        let request = tokio::time::timeout(REQUEST_TIMEOUT, Self::read_request(&mut stream))
            .await
            .map_err(IpcError::Timeout)?;

        let request = match request {
            Ok(req) => req,
            Err(e) => {
                let response = Response::error(
                    ErrorCode::Validation,
                    format!("Failed to parse request: {}", e),
                );
                Self::write_response(&mut stream, &response).await?;
                return Err(e);
            }
        };

        tracing::debug!(request = request.name(), "Received request");

        let response = handler.handle(request).await;

        Self::write_response(&mut stream, &response).await?;

        Ok(())
    }

    /// Read a request from the stream
    async fn read_request(stream: &mut UnixStream) -> Result<Request, IpcError> {
        // Length prefix (4 bytes, little-endian)
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;

        if len > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge);
        }

        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;

        decode_request(&buf)
    }

    /// Write a response to the stream
    async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<(), IpcError> {
        let response_bytes = encode(response)?;
        let len_bytes = (response_bytes.len() as u32).to_le_bytes();

        stream.write_all(&len_bytes).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        Ok(())
    }
}

/// MessagePack first, then JSON (hook scripts and `nc`).
fn decode_request(buf: &[u8]) -> Result<Request, IpcError> {
    match rmp_serde::from_slice(buf) {
        Ok(request) => Ok(request),
        Err(msgpack_err) => match serde_json::from_slice(buf) {
            Ok(request) => Ok(request),
            Err(json_err) if looks_like_json(buf) => Err(IpcError::Json(json_err)),
            Err(_) => Err(IpcError::Deserialize(msgpack_err)),
        },
    }
}

fn looks_like_json(buf: &[u8]) -> bool {
    buf.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

/// Trait for handling incoming requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    async fn handle(&self, request: Request) -> Response;
}
