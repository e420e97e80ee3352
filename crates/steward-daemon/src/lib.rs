//! Steward daemon
//!
//! Background process that keeps per-project memory, loop, scope and
//! checkpoint state for coding assistants, served over a Unix socket.

mod daemon;
mod handler;
mod signals;

pub use daemon::Daemon;
pub use handler::DaemonHandler;
