//! Steward IPC Protocol and Client/Server
//!
//! This crate provides the IPC protocol definitions and Unix socket
//! client/server implementations for communication with the Steward daemon.
//! Hooks and the CLI send one length-prefixed request per connection.

mod client;
mod error;
mod protocol;
mod server;

pub use client::{ConnectedClient, IpcClient, DEFAULT_SOCKET_PATH};
pub use error::IpcError;
pub use protocol::*;
pub use server::{IpcServer, RequestHandler};
