//! Configuration for the Steward daemon.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steward_engine::{CheckpointPolicy, EnginePolicy, LoopPolicy, MemoryPolicy};

/// Environment variable overriding the inference model identifier
pub const MODEL_ENV: &str = "STEWARD_MODEL";

/// Environment variable overriding the inference service address
pub const LLM_URL_ENV: &str = "STEWARD_LLM_URL";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StewardConfig {
    /// Unix socket path for IPC
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Data directory; project state lives under `state/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum resolved projects to keep cached
    #[serde(default = "default_max_projects")]
    pub max_projects: usize,

    #[serde(default)]
    pub memory: MemoryPolicy,

    #[serde(default)]
    pub loop_detector: LoopPolicy,

    #[serde(default)]
    pub checkpoints: CheckpointPolicy,

    /// Settings for the external model client; reported, not used
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Inference collaborator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/steward.sock")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".steward")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/steward.pid")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_projects() -> usize {
    8
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            pid_file: default_pid_file(),
            log_level: default_log_level(),
            max_projects: default_max_projects(),
            memory: MemoryPolicy::default(),
            loop_detector: LoopPolicy::default(),
            checkpoints: CheckpointPolicy::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl StewardConfig {
    /// Load configuration from `~/.steward/config.yaml`, falling back to
    /// defaults, then apply environment overrides.
    pub fn load() -> Self {
        let config_path = default_data_dir().join("config.yaml");

        let mut config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Failed to load config file");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply `STEWARD_MODEL` / `STEWARD_LLM_URL` from the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.inference.model = Some(model);
        }
        if let Some(url) = lookup(LLM_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.inference.base_url = Some(url);
        }
    }

    /// Root of all per-project record sets
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Engine policies assembled from this configuration
    pub fn engine_policy(&self) -> EnginePolicy {
        EnginePolicy {
            memory: self.memory.clone(),
            loop_detector: self.loop_detector.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.state_dir())?;
        Ok(())
    }
}
