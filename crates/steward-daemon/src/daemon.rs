//! Daemon lifecycle management.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use steward_core::{Metrics, ProjectManager, StewardConfig};
use steward_engine::{SessionCoordinator, StateStore};
use steward_ipc::IpcServer;
use tokio::sync::broadcast;

use crate::handler::DaemonHandler;
use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: StewardConfig,
    shutdown_tx: broadcast::Sender<()>,
    is_running: Arc<AtomicBool>,
}

impl Daemon {
    /// Create a daemon for the given configuration
    pub fn new(config: StewardConfig) -> Result<Self> {
        config
            .ensure_dirs()
            .context("Failed to create data directories")?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            shutdown_tx,
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle that stops a running daemon when sent to
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until a signal or a shutdown request arrives
    pub async fn run(&self) -> Result<()> {
        self.acquire_pid_lock()?;

        self.is_running.store(true, Ordering::SeqCst);

        tracing::info!(
            socket = %self.config.socket_path.display(),
            state_dir = %self.config.state_dir().display(),
            "Daemon starting"
        );

        let store = Arc::new(StateStore::new(self.config.state_dir()));
        let coordinator = Arc::new(SessionCoordinator::new(store, self.config.engine_policy()));
        let project_manager = Arc::new(ProjectManager::new(&self.config));

        let handler = Arc::new(DaemonHandler::new(
            coordinator,
            project_manager,
            Arc::new(Metrics::new()),
            self.config.inference.clone(),
            self.shutdown_tx.clone(),
        ));

        // Subscribe before the socket opens so no shutdown request is missed
        let shutdown_rx = self.shutdown_tx.subscribe();

        let ipc_server = IpcServer::new(&self.config.socket_path, handler)
            .await
            .context("Failed to create IPC server")?;

        tokio::select! {
            result = ipc_server.run() => {
                if let Err(e) = result {
                    tracing::error!("IPC server error: {}", e);
                }
            }
            _ = signals::wait_for_shutdown(shutdown_rx) => {
                tracing::info!("Shutdown signal received");
            }
        }

        self.cleanup();

        Ok(())
    }

    /// Acquire PID lock to ensure single instance
    fn acquire_pid_lock(&self) -> Result<()> {
        let pid_file = &self.config.pid_file;

        if pid_file.exists() {
            if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if pid != std::process::id() && is_process_running(pid) {
                        anyhow::bail!("Daemon already running (PID: {})", pid);
                    }
                }
            }
            // Stale PID file
            std::fs::remove_file(pid_file)?;
        }

        if let Some(parent) = pid_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", pid_file.display()))?;

        tracing::debug!(pid = std::process::id(), "PID lock acquired");

        Ok(())
    }

    fn cleanup(&self) {
        tracing::info!("Cleaning up...");

        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }

        if self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }

        self.is_running.store(false, Ordering::SeqCst);

        tracing::info!("Cleanup complete");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        // A daemon that never ran must not remove another instance's lock
        if self.is_running.load(Ordering::SeqCst) && self.config.pid_file.exists() {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }
    }
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks for existence
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to another user
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
