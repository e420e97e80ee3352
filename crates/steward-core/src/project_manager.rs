//! Project registry with LRU caching.
//!
//! Resolves a caller's working directory to a stable [`ProjectScope`].
//! Resolution canonicalizes the path, so cached scopes save a syscall and a
//! hash per request.

use crate::{CoreError, StewardConfig};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use steward_engine::ProjectScope;

/// Outcome of [`ProjectManager::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub scope: ProjectScope,
    /// Whether the scope came from the cache
    pub cached: bool,
}

/// Maps working directories to project scopes
pub struct ProjectManager {
    /// LRU cache keyed by the path as the caller sent it
    projects: Mutex<LruCache<PathBuf, ProjectScope>>,
}

impl ProjectManager {
    /// Create a new project manager
    pub fn new(config: &StewardConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_projects).unwrap_or(NonZeroUsize::MIN);

        Self {
            projects: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Resolve a working directory to its project scope.
    ///
    /// The directory must exist.
    pub fn resolve(&self, cwd: &Path) -> Result<Resolved, CoreError> {
        if let Some(scope) = self.projects.lock().get(cwd) {
            return Ok(Resolved {
                scope: scope.clone(),
                cached: true,
            });
        }

        let canonical = cwd
            .canonicalize()
            .map_err(|_| CoreError::InvalidPath(cwd.display().to_string()))?;
        if !canonical.is_dir() {
            return Err(CoreError::InvalidPath(cwd.display().to_string()));
        }

        let scope = ProjectScope::new(canonical);
        self.projects.lock().put(cwd.to_path_buf(), scope.clone());

        tracing::debug!(project = ?scope.path(), key = %scope.key(), "Resolved project");

        Ok(Resolved {
            scope,
            cached: false,
        })
    }

    /// Get the number of cached projects
    pub fn loaded_count(&self) -> usize {
        self.projects.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(max_projects: usize) -> StewardConfig {
        StewardConfig {
            max_projects,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_caches_scope() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(&test_config(3));

        let project_dir = temp_dir.path().join("test_project");
        std::fs::create_dir_all(&project_dir).unwrap();

        let first = manager.resolve(&project_dir).unwrap();
        assert!(!first.cached);
        assert_eq!(first.scope.path(), project_dir.canonicalize().unwrap());

        let second = manager.resolve(&project_dir).unwrap();
        assert!(second.cached);
        assert_eq!(second.scope.key(), first.scope.key());
    }

    #[test]
    fn test_equivalent_paths_share_a_key() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(&test_config(3));
        let project_dir = temp_dir.path().join("p");
        std::fs::create_dir_all(project_dir.join("sub")).unwrap();

        let direct = manager.resolve(&project_dir).unwrap();
        let dotted = manager.resolve(&project_dir.join("sub").join("..")).unwrap();
        assert_eq!(direct.scope.key(), dotted.scope.key());
    }

    #[test]
    fn test_lru_eviction() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(&test_config(3));

        for i in 0..4 {
            let project_dir = temp_dir.path().join(format!("project_{}", i));
            std::fs::create_dir_all(&project_dir).unwrap();
            manager.resolve(&project_dir).unwrap();
        }

        assert_eq!(manager.loaded_count(), 3);

        // The oldest entry was evicted and resolves fresh
        let oldest = manager.resolve(&temp_dir.path().join("project_0")).unwrap();
        assert!(!oldest.cached);
    }

    #[test]
    fn test_missing_directory_is_invalid() {
        let temp_dir = tempdir().unwrap();
        let manager = ProjectManager::new(&test_config(3));

        let result = manager.resolve(&temp_dir.path().join("nonexistent"));
        assert!(matches!(result, Err(CoreError::InvalidPath(_))));

        let file = temp_dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            manager.resolve(&file),
            Err(CoreError::InvalidPath(_))
        ));
    }
}
