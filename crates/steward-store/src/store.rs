//! Project-scoped record sets with atomic replace and corruption recovery.

use crate::{Journal, Result, StoreError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// On-disk envelope format version.
const FORMAT_VERSION: u32 = 1;

/// Compute the storage key for a project path.
pub fn project_key(project_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}

/// Handle naming the project a request operates on.
///
/// Passed explicitly into every component call; nothing in the engine keeps
/// per-project state between requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectScope {
    path: PathBuf,
    key: String,
}

impl ProjectScope {
    /// Create a scope for a project path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = project_key(&path);
        Self { path, key }
    }

    /// Project root as supplied by the caller.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Storage key derived from the path.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The independent record sets kept per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    Memory,
    Loop,
    Scope,
    Checkpoints,
}

impl Concern {
    /// Directory name of this concern under the state root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Concern::Memory => "memory",
            Concern::Loop => "loop",
            Concern::Scope => "scope",
            Concern::Checkpoints => "checkpoints",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from the store, plus a warning when the underlying record
/// set had to be discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub warning: Option<String>,
}

impl<T> Loaded<T> {
    /// Wrap a value read without incident.
    pub fn clean(data: T) -> Self {
        Self {
            data,
            warning: None,
        }
    }

    /// Transform the payload, keeping any warning.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        Loaded {
            data: f(self.data),
            warning: self.warning,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    project_path: &'a Path,
    updated_at: DateTime<Utc>,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    #[allow(dead_code)]
    project_path: PathBuf,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
    data: T,
}

/// Storage options.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// State root directory
    pub root: PathBuf,
    /// Journal size before rotation (bytes)
    pub max_journal_size: u64,
    /// Rotated journal files kept per project
    pub max_journal_rotations: usize,
}

impl StoreOptions {
    /// Options rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_journal_size: 10 * 1024 * 1024, // 10MB
            max_journal_rotations: 3,
        }
    }
}

/// Loads and saves per-project record sets.
///
/// Every access to one record set goes through that set's lock, so
/// read-modify-write cycles from concurrent callers never interleave.
/// Clones share the locks.
#[derive(Debug, Clone)]
pub struct StateStore {
    options: StoreOptions,
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl StateStore {
    /// Create a store with default options.
    pub fn new(root: PathBuf) -> Self {
        Self::with_options(StoreOptions::new(root))
    }

    /// Create a store with custom options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            options,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lock guarding one record set file.
    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks.lock().entry(path.to_path_buf()).or_default().clone()
    }

    /// State root directory.
    pub fn root(&self) -> &Path {
        &self.options.root
    }

    /// Path of one project's record set for a concern.
    pub fn record_path(&self, scope: &ProjectScope, concern: Concern) -> PathBuf {
        self.options
            .root
            .join(concern.as_str())
            .join(format!("{}.json", scope.key()))
    }

    /// The project's append-only session journal.
    pub fn journal(&self, scope: &ProjectScope) -> Journal {
        let path = self
            .options
            .root
            .join("journal")
            .join(format!("{}.jsonl", scope.key()));
        Journal::new(path, self.options.max_journal_size)
            .with_rotations(self.options.max_journal_rotations)
    }

    /// Load a record set, treating a missing one as empty.
    ///
    /// A record set that cannot be decoded is moved aside to
    /// `<name>.corrupted` and replaced by the default value; the returned
    /// warning says so. Any other read failure also yields the default
    /// value with a warning, but leaves the file untouched. Loading never
    /// fails.
    pub fn load<T>(&self, scope: &ProjectScope, concern: Concern) -> Loaded<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.record_path(scope, concern);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();

        match read_envelope(&path) {
            Ok(Some(data)) => Loaded::clean(data),
            Ok(None) => Loaded::clean(T::default()),
            Err(e) => recover(scope, concern, &path, e),
        }
    }

    /// Persist a record set: write a temp file beside the target, then
    /// rename it over the original.
    pub fn save<T: Serialize>(
        &self,
        scope: &ProjectScope,
        concern: Concern,
        data: &T,
    ) -> Result<()> {
        let path = self.record_path(scope, concern);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();
        self.write(scope, concern, &path, data)
    }

    fn write<T: Serialize>(
        &self,
        scope: &ProjectScope,
        concern: Concern,
        path: &Path,
        data: &T,
    ) -> Result<()> {
        let dir = self.options.root.join(concern.as_str());
        fs::create_dir_all(&dir)?;

        let envelope = EnvelopeRef {
            version: FORMAT_VERSION,
            project_path: scope.path(),
            updated_at: Utc::now(),
            data,
        };
        let json = serde_json::to_vec_pretty(&envelope)?;

        // Unique temp name so racing writers never share a temp file
        let temp_path = dir.join(format!(
            ".{}.{}.tmp",
            scope.key(),
            Uuid::new_v4().simple()
        ));
        if let Err(e) = write_synced(&temp_path, &json) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = ?path, size = json.len(), "Saved record set");

        Ok(())
    }

    /// Atomic read-modify-write of one record set, holding its lock
    /// throughout.
    ///
    /// Nothing is written when `apply` fails. A corrupt record set is
    /// quarantined and replaced as in [`StateStore::load`]; any other read
    /// failure is returned, so an unreadable file is never overwritten.
    pub fn update<T, R, E, F>(
        &self,
        scope: &ProjectScope,
        concern: Concern,
        apply: F,
    ) -> std::result::Result<Loaded<R>, E>
    where
        T: Serialize + DeserializeOwned + Default,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> std::result::Result<R, E>,
    {
        let path = self.record_path(scope, concern);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();

        let Loaded { mut data, warning } = match read_envelope(&path) {
            Ok(Some(data)) => Loaded::clean(data),
            Ok(None) => Loaded::clean(T::default()),
            Err(e @ StoreError::Corrupt { .. }) => recover(scope, concern, &path, e),
            Err(e) => {
                warn!(
                    project = ?scope.path(),
                    concern = %concern,
                    error = %e,
                    "Record set unreadable, refusing to overwrite"
                );
                return Err(e.into());
            }
        };
        let out = apply(&mut data)?;
        self.write(scope, concern, &path, &data)?;
        Ok(Loaded { data: out, warning })
    }

    /// Delete a record set. Returns whether one existed.
    pub fn remove(&self, scope: &ProjectScope, concern: Concern) -> Result<bool> {
        let path = self.record_path(scope, concern);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = ?path, "Removed record set");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fall back to the default value after a failed read. Corrupt files are
/// moved aside first.
fn recover<T: Default>(
    scope: &ProjectScope,
    concern: Concern,
    path: &Path,
    e: StoreError,
) -> Loaded<T> {
    let backup = match &e {
        StoreError::Corrupt { .. } => quarantine(path),
        _ => None,
    };
    warn!(
        project = ?scope.path(),
        concern = %concern,
        error = %e,
        "Record set unreadable, continuing with empty state"
    );
    let warning = match backup {
        Some(backup) => format!(
            "{} state was unreadable and has been reset (backup: {}): {}",
            concern,
            backup.display(),
            e
        ),
        None => format!("{} state was unreadable, treated as empty: {}", concern, e),
    };
    Loaded {
        data: T::default(),
        warning: Some(warning),
    }
}

fn read_envelope<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // A writer may have created the file without content yet
    if content.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> =
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if envelope.version > FORMAT_VERSION {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", envelope.version),
        });
    }

    Ok(Some(envelope.data))
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn quarantine(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let backup = path.with_file_name(format!("{}.corrupted", file_name));
    match fs::rename(path, &backup) {
        Ok(()) => Some(backup),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to move corrupt record set aside");
            None
        }
    }
}
