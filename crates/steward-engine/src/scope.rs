//! Declared edit boundary per project.

use crate::memory::normalize_path;
use crate::{EngineError, Outcome, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use steward_store::{Concern, ProjectScope, StateStore};

/// An out-of-scope check, kept for post-hoc review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeViolation {
    pub file_path: String,
    pub timestamp: DateTime<Utc>,
}

/// A deliberate widening of the declared scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeExpansion {
    pub files: Vec<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// The active boundary for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDeclaration {
    pub task_description: String,
    #[serde(default)]
    pub in_scope_files: Vec<String>,
    #[serde(default)]
    pub in_scope_patterns: Vec<String>,
    /// Files that must not be touched, even when a pattern admits them
    #[serde(default)]
    pub out_of_scope_files: Vec<String>,
    #[serde(default)]
    pub violations: Vec<ScopeViolation>,
    #[serde(default)]
    pub expansions: Vec<ScopeExpansion>,
    pub declared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScopeState {
    #[serde(default)]
    active: Option<ScopeDeclaration>,
}

/// Result of [`ScopeGuard::check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeVerdict {
    pub file_path: String,
    /// Whether a declaration was active for the check
    pub active: bool,
    pub in_scope: bool,
    pub reason: String,
}

/// Snapshot returned by [`ScopeGuard::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeStatus {
    pub active: bool,
    pub task_description: Option<String>,
    pub declared_files: Vec<String>,
    pub declared_patterns: Vec<String>,
    pub out_of_scope_files: Vec<String>,
    pub violations: Vec<ScopeViolation>,
    pub expansions: Vec<ScopeExpansion>,
}

pub struct ScopeGuard {
    store: Arc<StateStore>,
}

impl ScopeGuard {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Replace the project's declaration.
    pub fn declare(
        &self,
        scope: &ProjectScope,
        task_description: &str,
        in_scope_files: Vec<String>,
        in_scope_patterns: Vec<String>,
    ) -> Result<Outcome<ScopeDeclaration>> {
        self.declare_excluding(
            scope,
            task_description,
            in_scope_files,
            in_scope_patterns,
            Vec::new(),
        )
    }

    /// Replace the project's declaration, naming files that stay out of
    /// scope whatever else matches.
    pub fn declare_excluding(
        &self,
        scope: &ProjectScope,
        task_description: &str,
        in_scope_files: Vec<String>,
        in_scope_patterns: Vec<String>,
        out_of_scope_files: Vec<String>,
    ) -> Result<Outcome<ScopeDeclaration>> {
        let task_description = task_description.trim();
        if task_description.is_empty() {
            return Err(EngineError::validation("task_description cannot be empty"));
        }
        let in_scope_patterns = clean_list(in_scope_patterns);
        build_globs(&in_scope_patterns)?;

        let declaration = ScopeDeclaration {
            task_description: task_description.to_string(),
            in_scope_files: clean_paths(in_scope_files),
            in_scope_patterns,
            out_of_scope_files: clean_paths(out_of_scope_files),
            violations: Vec::new(),
            expansions: Vec::new(),
            declared_at: Utc::now(),
        };

        let outcome = self
            .store
            .update(scope, Concern::Scope, |state: &mut ScopeState| {
                state.active = Some(declaration.clone());
                Ok::<_, EngineError>(declaration)
            })?;

        tracing::info!(
            project = ?scope.path(),
            files = outcome.data.in_scope_files.len(),
            patterns = outcome.data.in_scope_patterns.len(),
            "Scope declared"
        );

        Ok(outcome.into())
    }

    /// Evaluate one path. Out-of-scope results are logged as violations.
    pub fn check(&self, scope: &ProjectScope, file_path: &str) -> Result<Outcome<ScopeVerdict>> {
        let file_path = normalize_path(file_path).to_string();
        if file_path.is_empty() {
            return Err(EngineError::validation("file_path cannot be empty"));
        }

        let loaded: Outcome<ScopeState> = self.store.load(scope, Concern::Scope).into();
        let verdict = match &loaded.value.active {
            None => no_declaration(&file_path),
            Some(declaration) => evaluate(declaration, scope.path(), &file_path),
        };
        if !verdict.active || verdict.in_scope {
            return Ok(loaded.map(|_| verdict));
        }

        // Re-evaluate under the write so a concurrent declare is respected
        let outcome = self
            .store
            .update(scope, Concern::Scope, |state: &mut ScopeState| {
                let verdict = match state.active.as_mut() {
                    None => no_declaration(&file_path),
                    Some(declaration) => {
                        let verdict = evaluate(declaration, scope.path(), &file_path);
                        if !verdict.in_scope {
                            declaration.violations.push(ScopeViolation {
                                file_path: file_path.clone(),
                                timestamp: Utc::now(),
                            });
                        }
                        verdict
                    }
                };
                Ok::<_, EngineError>(verdict)
            })?;

        tracing::debug!(project = ?scope.path(), file = %file_path, "Out-of-scope check recorded");

        Ok(outcome.into())
    }

    /// Add files to the active declaration.
    pub fn expand(
        &self,
        scope: &ProjectScope,
        files: Vec<String>,
        reason: &str,
    ) -> Result<Outcome<ScopeDeclaration>> {
        let files = clean_paths(files);
        if files.is_empty() {
            return Err(EngineError::validation("files_to_add cannot be empty"));
        }
        let reason = reason.trim().to_string();

        let outcome = self
            .store
            .update(scope, Concern::Scope, |state: &mut ScopeState| {
                let declaration = state.active.as_mut().ok_or_else(|| {
                    EngineError::State("no active scope declaration to expand".to_string())
                })?;
                for file in &files {
                    if !declaration.in_scope_files.contains(file) {
                        declaration.in_scope_files.push(file.clone());
                    }
                }
                declaration.expansions.push(ScopeExpansion {
                    files,
                    reason,
                    timestamp: Utc::now(),
                });
                Ok::<_, EngineError>(declaration.clone())
            })?;

        Ok(outcome.into())
    }

    pub fn status(&self, scope: &ProjectScope) -> Outcome<ScopeStatus> {
        let loaded: Outcome<ScopeState> = self.store.load(scope, Concern::Scope).into();
        loaded.map(|state| match state.active {
            Some(d) => ScopeStatus {
                active: true,
                task_description: Some(d.task_description),
                declared_files: d.in_scope_files,
                declared_patterns: d.in_scope_patterns,
                out_of_scope_files: d.out_of_scope_files,
                violations: d.violations,
                expansions: d.expansions,
            },
            None => ScopeStatus {
                active: false,
                task_description: None,
                declared_files: Vec::new(),
                declared_patterns: Vec::new(),
                out_of_scope_files: Vec::new(),
                violations: Vec::new(),
                expansions: Vec::new(),
            },
        })
    }

    /// Discard the active declaration. Returns whether one existed.
    pub fn clear(&self, scope: &ProjectScope) -> Result<bool> {
        let loaded: ScopeState = self.store.load(scope, Concern::Scope).data;
        let removed = self.store.remove(scope, Concern::Scope)?;
        Ok(removed && loaded.active.is_some())
    }
}

fn no_declaration(file_path: &str) -> ScopeVerdict {
    ScopeVerdict {
        file_path: file_path.to_string(),
        active: false,
        in_scope: true,
        reason: "no scope declared".to_string(),
    }
}

fn evaluate(declaration: &ScopeDeclaration, project: &Path, file_path: &str) -> ScopeVerdict {
    let candidates = candidates(project, file_path);

    let excluded = declaration
        .out_of_scope_files
        .iter()
        .find(|excluded| candidates.iter().any(|c| path_matches(c, excluded)));
    if let Some(excluded) = excluded {
        return ScopeVerdict {
            file_path: file_path.to_string(),
            active: true,
            in_scope: false,
            reason: format!("explicitly excluded: {}", excluded),
        };
    }

    let file_hit = declaration
        .in_scope_files
        .iter()
        .find(|declared| candidates.iter().any(|c| path_matches(c, declared)));
    if let Some(declared) = file_hit {
        return ScopeVerdict {
            file_path: file_path.to_string(),
            active: true,
            in_scope: true,
            reason: format!("matches declared file {}", declared),
        };
    }

    // Patterns were validated at declare time; a set that no longer builds matches nothing
    let pattern_hit = build_globs(&declaration.in_scope_patterns)
        .ok()
        .map(|set| candidates.iter().any(|c| set.is_match(c)))
        .unwrap_or(false);
    if pattern_hit {
        return ScopeVerdict {
            file_path: file_path.to_string(),
            active: true,
            in_scope: true,
            reason: "matches a declared pattern".to_string(),
        };
    }

    ScopeVerdict {
        file_path: file_path.to_string(),
        active: true,
        in_scope: false,
        reason: format!(
            "outside the declared scope for '{}'",
            declaration.task_description
        ),
    }
}

/// The path as given plus, for absolute paths inside the project, the
/// project-relative form. Symlinks on either side are resolved before
/// giving up on the relative form.
fn candidates(project: &Path, file_path: &str) -> Vec<String> {
    let mut out = vec![file_path.to_string()];
    let path = Path::new(file_path);
    if !path.is_absolute() {
        return out;
    }

    let relative = match path.strip_prefix(project) {
        Ok(relative) => Some(relative.to_path_buf()),
        Err(_) => resolve(project).zip(resolve(path)).and_then(|(project, path)| {
            path.strip_prefix(&project).ok().map(Path::to_path_buf)
        }),
    };
    if let Some(relative) = relative {
        let relative = relative.to_string_lossy().to_string();
        if !relative.is_empty() {
            out.push(relative);
        }
    }
    out
}

/// Canonical form of a path that may not exist yet: the parent is resolved
/// and the final component kept.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

fn path_matches(candidate: &str, declared: &str) -> bool {
    candidate == declared || Path::new(candidate).ends_with(Path::new(declared))
}

fn build_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let trimmed = normalize_path(pattern);
        let glob = GlobBuilder::new(trimmed)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid_pattern(pattern, e))?;
        builder.add(glob);
        if !trimmed.starts_with('/') && !trimmed.starts_with("**/") {
            let anywhere = GlobBuilder::new(&format!("**/{}", trimmed))
                .literal_separator(true)
                .build()
                .map_err(|e| invalid_pattern(pattern, e))?;
            builder.add(anywhere);
        }
    }
    builder
        .build()
        .map_err(|e| EngineError::validation(format!("invalid pattern set: {}", e)))
}

fn invalid_pattern(pattern: &str, error: globset::Error) -> EngineError {
    EngineError::validation(format!("invalid pattern '{}': {}", pattern, error))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn clean_paths(items: Vec<String>) -> Vec<String> {
    clean_list(
        items
            .into_iter()
            .map(|p| normalize_path(&p).to_string())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn guard() -> (TempDir, ScopeGuard, ProjectScope) {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(StateStore::new(temp_dir.path().join("state")));
        let scope = ProjectScope::new("/work/app");
        (temp_dir, ScopeGuard::new(store), scope)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_project_paths_resolve() {
        let temp_dir = tempdir().unwrap();
        let real = temp_dir.path().join("real");
        std::fs::create_dir_all(real.join("src")).unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let existing = link.join("src");
        let via_link = candidates(&real, &existing.join("lib.rs").to_string_lossy());
        assert_eq!(via_link[1], "src/lib.rs");

        let via_real = candidates(&link, &real.join("src/new.rs").to_string_lossy());
        assert_eq!(via_real[1], "src/new.rs");

        let outside = candidates(&real, "/elsewhere/src/lib.rs");
        assert_eq!(outside.len(), 1);
    }

    #[test]
    fn test_declared_files_and_patterns() {
        let (_dir, guard, scope) = guard();
        guard
            .declare(&scope, "fix login", strings(&["a.py"]), strings(&["src/*.py"]))
            .unwrap();

        assert!(guard.check(&scope, "a.py").unwrap().value.in_scope);
        assert!(guard.check(&scope, "src/util.py").unwrap().value.in_scope);
        assert!(guard.check(&scope, "/work/app/src/util.py").unwrap().value.in_scope);
        assert!(guard.check(&scope, "/work/app/a.py").unwrap().value.in_scope);

        let verdict = guard.check(&scope, "b.py").unwrap().value;
        assert!(verdict.active);
        assert!(!verdict.in_scope);
        assert!(verdict.reason.contains("fix login"));
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let (_dir, guard, scope) = guard();
        guard
            .declare(&scope, "task", Vec::new(), strings(&["src/*.py"]))
            .unwrap();
        assert!(!guard.check(&scope, "src/nested/deep.py").unwrap().value.in_scope);
    }

    #[test]
    fn test_violations_are_logged() {
        let (_dir, guard, scope) = guard();
        guard.declare(&scope, "task", strings(&["a.py"]), Vec::new()).unwrap();

        guard.check(&scope, "b.py").unwrap();
        guard.check(&scope, "a.py").unwrap();
        guard.check(&scope, "c.py").unwrap();

        let status = guard.status(&scope).value;
        assert!(status.active);
        let files: Vec<_> = status.violations.iter().map(|v| v.file_path.as_str()).collect();
        assert_eq!(files, vec!["b.py", "c.py"]);
    }

    #[test]
    fn test_exclusions_override_patterns() {
        let (_dir, guard, scope) = guard();
        guard
            .declare_excluding(
                &scope,
                "tidy handlers",
                Vec::new(),
                strings(&["src/*.py"]),
                strings(&["src/settings.py"]),
            )
            .unwrap();

        assert!(guard.check(&scope, "src/views.py").unwrap().value.in_scope);
        let verdict = guard.check(&scope, "/work/app/src/settings.py").unwrap().value;
        assert!(!verdict.in_scope);
        assert_eq!(verdict.reason, "explicitly excluded: src/settings.py");

        let status = guard.status(&scope).value;
        assert_eq!(status.out_of_scope_files, vec!["src/settings.py"]);
        assert_eq!(status.violations.len(), 1);
    }

    #[test]
    fn test_check_without_declaration() {
        let (_dir, guard, scope) = guard();
        let verdict = guard.check(&scope, "anything.rs").unwrap().value;
        assert!(verdict.in_scope);
        assert!(!verdict.active);
        assert!(!guard.status(&scope).value.active);
    }

    #[test]
    fn test_declare_replaces_previous() {
        let (_dir, guard, scope) = guard();
        guard.declare(&scope, "first", strings(&["a.py"]), Vec::new()).unwrap();
        guard.check(&scope, "x.py").unwrap();
        guard.declare(&scope, "second", strings(&["b.py"]), Vec::new()).unwrap();

        let status = guard.status(&scope).value;
        assert_eq!(status.task_description.as_deref(), Some("second"));
        assert_eq!(status.declared_files, vec!["b.py"]);
        assert!(status.violations.is_empty());
        assert!(!guard.check(&scope, "a.py").unwrap().value.in_scope);
    }

    #[test]
    fn test_expand_requires_declaration() {
        let (_dir, guard, scope) = guard();
        let err = guard.expand(&scope, strings(&["c.py"]), "needed").unwrap_err();
        assert!(matches!(err, EngineError::State(_)));

        guard.declare(&scope, "task", strings(&["a.py"]), Vec::new()).unwrap();
        assert!(matches!(
            guard.expand(&scope, Vec::new(), "nothing").unwrap_err(),
            EngineError::Validation(_)
        ));

        let declaration = guard
            .expand(&scope, strings(&["c.py", "a.py"]), "shared helper")
            .unwrap()
            .value;
        assert_eq!(declaration.in_scope_files, vec!["a.py", "c.py"]);
        assert_eq!(declaration.expansions.len(), 1);
        assert_eq!(declaration.expansions[0].reason, "shared helper");
        assert!(guard.check(&scope, "c.py").unwrap().value.in_scope);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let (_dir, guard, scope) = guard();
        let err = guard
            .declare(&scope, "task", Vec::new(), strings(&["src/[.py"]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(!guard.status(&scope).value.active);
    }

    #[test]
    fn test_clear() {
        let (_dir, guard, scope) = guard();
        assert!(!guard.clear(&scope).unwrap());
        guard.declare(&scope, "task", strings(&["a.py"]), Vec::new()).unwrap();
        assert!(guard.clear(&scope).unwrap());
        assert!(!guard.status(&scope).value.active);
    }
}
