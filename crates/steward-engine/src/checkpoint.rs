//! Task checkpoints, handoff notes and completion verification.

use crate::memory::normalize_path;
use crate::{CheckpointPolicy, EngineError, Outcome, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use steward_store::{Concern, ProjectScope, StateStore};
use uuid::Uuid;

/// Instructions surfaced by one reinforcement.
const REINFORCE_LIMIT: usize = 5;

/// Notes for whoever picks the task up next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub context_needed: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Handoff {
    fn is_empty(&self) -> bool {
        self.summary.is_none() && self.context_needed.is_empty() && self.warnings.is_empty()
    }
}

/// Snapshot of an in-flight task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task_id: String,
    pub task_description: String,
    pub current_step: String,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub pending_steps: Vec<String>,
    #[serde(default)]
    pub files_involved: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub handoff: Option<Handoff>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Share of steps completed, 0-100.
    pub fn progress_percent(&self) -> u8 {
        let total = self.completed_steps.len() + self.pending_steps.len();
        if total == 0 {
            return 0;
        }
        ((self.completed_steps.len() * 100) / total) as u8
    }
}

/// Input to [`CheckpointManager::save`].
#[derive(Debug, Clone, Default)]
pub struct CheckpointDraft {
    /// Explicit task id; otherwise reused or minted
    pub task_id: Option<String>,
    pub task_description: String,
    pub current_step: String,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    pub files_involved: Vec<String>,
    pub key_decisions: Vec<String>,
    pub blockers: Vec<String>,
    pub handoff_summary: Option<String>,
    pub handoff_context_needed: Vec<String>,
    pub handoff_warnings: Vec<String>,
}

/// Per-step result of [`CheckpointManager::verify_completion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCheck {
    pub step: String,
    pub satisfied: bool,
    /// Evidence item that satisfied the step
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionVerdict {
    pub accepted: bool,
    pub reason: String,
    pub steps: Vec<StepCheck>,
    pub missing: Vec<String>,
    /// Evidence items naming files that do not exist
    pub missing_artifacts: Vec<String>,
}

/// An instruction that must stay in front of the assistant as context grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalInstruction {
    pub instruction: String,
    pub reason: String,
    /// 1-10
    pub importance: u8,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub reinforce_count: u32,
    #[serde(default)]
    pub last_reinforced: Option<DateTime<Utc>>,
}

/// Result of [`CheckpointManager::reinforce`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reinforcement {
    /// Most important first
    pub instructions: Vec<CriticalInstruction>,
    /// Instructions registered for the project
    pub total: usize,
    /// Ready-to-inject reminder text, empty when nothing is registered
    pub reminder: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointLog {
    #[serde(default)]
    checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    instructions: Vec<CriticalInstruction>,
}

pub struct CheckpointManager {
    store: Arc<StateStore>,
    policy: CheckpointPolicy,
}

impl CheckpointManager {
    pub fn new(store: Arc<StateStore>, policy: CheckpointPolicy) -> Self {
        Self { store, policy }
    }

    /// Append a checkpoint to the project's log.
    pub fn save(
        &self,
        scope: &ProjectScope,
        draft: CheckpointDraft,
    ) -> Result<Outcome<Checkpoint>> {
        let task_description = draft.task_description.trim().to_string();
        if task_description.is_empty() {
            return Err(EngineError::validation("task_description cannot be empty"));
        }
        let current_step = draft.current_step.trim().to_string();
        if current_step.is_empty() {
            return Err(EngineError::validation("current_step cannot be empty"));
        }

        let handoff = Handoff {
            summary: draft
                .handoff_summary
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            context_needed: draft.handoff_context_needed,
            warnings: draft.handoff_warnings,
        };
        let files_involved = dedup(
            draft
                .files_involved
                .iter()
                .map(|f| normalize_path(f).to_string())
                .filter(|f| !f.is_empty()),
        );
        let explicit_id = draft
            .task_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let max_checkpoints = self.policy.max_checkpoints.max(1);

        let outcome = self
            .store
            .update(scope, Concern::Checkpoints, |log: &mut CheckpointLog| {
                let task_id = explicit_id
                    .or_else(|| {
                        log.checkpoints
                            .last()
                            .filter(|c| c.task_description == task_description)
                            .map(|c| c.task_id.clone())
                    })
                    .unwrap_or_else(new_task_id);

                let checkpoint = Checkpoint {
                    task_id,
                    task_description,
                    current_step,
                    completed_steps: draft.completed_steps,
                    pending_steps: draft.pending_steps,
                    files_involved,
                    key_decisions: draft.key_decisions,
                    blockers: draft.blockers,
                    handoff: (!handoff.is_empty()).then_some(handoff),
                    saved_at: Utc::now(),
                };
                log.checkpoints.push(checkpoint.clone());
                if log.checkpoints.len() > max_checkpoints {
                    let excess = log.checkpoints.len() - max_checkpoints;
                    log.checkpoints.drain(..excess);
                }
                Ok::<_, EngineError>(checkpoint)
            })?;

        tracing::info!(
            project = ?scope.path(),
            task_id = %outcome.data.task_id,
            progress = outcome.data.progress_percent(),
            "Checkpoint saved"
        );

        Ok(outcome.into())
    }

    /// Latest checkpoint, or the latest one for `task_id`.
    pub fn restore(
        &self,
        scope: &ProjectScope,
        task_id: Option<&str>,
    ) -> Result<Outcome<Checkpoint>> {
        let Outcome {
            value: log,
            mut warnings,
        } = self.load(scope);

        let found = match task_id {
            Some(id) => log.checkpoints.into_iter().rev().find(|c| c.task_id == id),
            None => log.checkpoints.into_iter().next_back(),
        };
        let checkpoint = found.ok_or_else(|| match task_id {
            Some(id) => EngineError::NotFound(format!("checkpoint for task {}", id)),
            None => EngineError::NotFound("no checkpoint saved for this project".to_string()),
        })?;

        let age = Utc::now() - checkpoint.saved_at;
        let stale = Duration::try_hours(self.policy.stale_after_hours.max(0))
            .is_some_and(|limit| age > limit);
        if stale {
            warnings.push(format!(
                "checkpoint is {} hours old; verify it still reflects the working tree",
                age.num_hours()
            ));
        }

        Ok(Outcome {
            value: checkpoint,
            warnings,
        })
    }

    /// All checkpoints, most recent first.
    pub fn list(&self, scope: &ProjectScope) -> Outcome<Vec<Checkpoint>> {
        self.load(scope).map(|log| {
            let mut checkpoints = log.checkpoints;
            checkpoints.reverse();
            checkpoints
        })
    }

    /// Check that the evidence covers every verification step.
    ///
    /// Evidence items that look like paths must exist under the project.
    pub fn verify_completion(
        &self,
        scope: &ProjectScope,
        task: &str,
        evidence: &[String],
        verification_steps: &[String],
    ) -> Result<CompletionVerdict> {
        if task.trim().is_empty() {
            return Err(EngineError::validation("task cannot be empty"));
        }
        let steps: Vec<&str> = verification_steps
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if steps.is_empty() {
            return Err(EngineError::validation(
                "at least one verification step is required",
            ));
        }

        let evidence: Vec<&str> = evidence
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();

        let missing_artifacts: Vec<String> = evidence
            .iter()
            .filter(|e| looks_like_path(e))
            .filter(|e| !scope.path().join(normalize_path(e)).exists())
            .map(|e| e.to_string())
            .collect();

        let usable: Vec<&str> = evidence
            .iter()
            .copied()
            .filter(|e| !missing_artifacts.iter().any(|m| m == e))
            .collect();

        let checks: Vec<StepCheck> = steps
            .iter()
            .map(|step| {
                let hit = usable.iter().find(|e| supports(step, e));
                StepCheck {
                    step: step.to_string(),
                    satisfied: hit.is_some(),
                    evidence: hit.map(|e| e.to_string()),
                }
            })
            .collect();

        let missing: Vec<String> = checks
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| c.step.clone())
            .collect();

        let accepted = missing.is_empty() && missing_artifacts.is_empty();
        let reason = if accepted {
            format!("all {} verification steps have evidence", checks.len())
        } else {
            let mut parts = Vec::new();
            if !missing.is_empty() {
                parts.push(format!("no evidence for: {}", missing.join("; ")));
            }
            if !missing_artifacts.is_empty() {
                parts.push(format!(
                    "referenced files not found: {}",
                    missing_artifacts.join(", ")
                ));
            }
            parts.join(". ")
        };

        tracing::debug!(
            project = ?scope.path(),
            accepted,
            missing = missing.len(),
            "Completion verified"
        );

        Ok(CompletionVerdict {
            accepted,
            reason,
            steps: checks,
            missing,
            missing_artifacts,
        })
    }

    /// Register a critical instruction. Registering the same text again
    /// updates its reason and importance.
    pub fn add_instruction(
        &self,
        scope: &ProjectScope,
        instruction: &str,
        reason: Option<&str>,
        importance: Option<u8>,
    ) -> Result<Outcome<CriticalInstruction>> {
        let instruction = instruction.trim().to_string();
        if instruction.is_empty() {
            return Err(EngineError::validation("instruction cannot be empty"));
        }
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Important rule")
            .to_string();
        let importance = importance.unwrap_or(10).clamp(1, 10);

        let outcome = self
            .store
            .update(scope, Concern::Checkpoints, |log: &mut CheckpointLog| {
                let entry = match log
                    .instructions
                    .iter_mut()
                    .find(|i| i.instruction == instruction)
                {
                    Some(existing) => {
                        existing.reason = reason;
                        existing.importance = importance;
                        existing.clone()
                    }
                    None => {
                        let entry = CriticalInstruction {
                            instruction,
                            reason,
                            importance,
                            added_at: Utc::now(),
                            reinforce_count: 0,
                            last_reinforced: None,
                        };
                        log.instructions.push(entry.clone());
                        entry
                    }
                };
                Ok::<_, EngineError>(entry)
            })?;

        tracing::info!(
            project = ?scope.path(),
            importance = outcome.data.importance,
            "Critical instruction registered"
        );

        Ok(outcome.into())
    }

    /// The most important instructions, formatted for re-injection.
    pub fn reinforce(&self, scope: &ProjectScope) -> Result<Outcome<Reinforcement>> {
        let loaded = self.load(scope);
        if loaded.value.instructions.is_empty() {
            return Ok(loaded.map(|_| Reinforcement::default()));
        }

        let now = Utc::now();
        let outcome = self
            .store
            .update(scope, Concern::Checkpoints, |log: &mut CheckpointLog| {
                let mut order: Vec<usize> = (0..log.instructions.len()).collect();
                order.sort_by(|&a, &b| {
                    log.instructions[b]
                        .importance
                        .cmp(&log.instructions[a].importance)
                });
                order.truncate(REINFORCE_LIMIT);

                let mut picked = Vec::with_capacity(order.len());
                for index in order {
                    let entry = &mut log.instructions[index];
                    entry.reinforce_count = entry.reinforce_count.saturating_add(1);
                    entry.last_reinforced = Some(now);
                    picked.push(entry.clone());
                }
                Ok::<_, EngineError>(Reinforcement {
                    reminder: reminder_text(&picked),
                    instructions: picked,
                    total: log.instructions.len(),
                })
            })?;

        Ok(outcome.into())
    }

    fn load(&self, scope: &ProjectScope) -> Outcome<CheckpointLog> {
        self.store.load(scope, Concern::Checkpoints).into()
    }
}

fn reminder_text(instructions: &[CriticalInstruction]) -> String {
    if instructions.is_empty() {
        return String::new();
    }
    let mut lines = vec!["CRITICAL REMINDERS:".to_string()];
    for entry in instructions {
        lines.push(format!("- {} (Why: {})", entry.instruction, entry.reason));
    }
    lines.join("\n")
}

fn new_task_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("task-{}", &id[..8])
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.filter(|i| seen.insert(i.clone())).collect()
}

const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "were", "been", "into", "when", "then", "than",
    "they", "them", "there", "their", "what", "which", "will", "would", "should", "could",
    "does", "done", "make", "sure", "each", "also", "only", "some", "more", "most", "very",
    "check", "verify", "ensure",
];

/// Inflections folded so "tests passed" meets "test passes".
const SUFFIXES: &[&str] = &["ing", "ed", "es", "s"];

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 4 && !STOP_WORDS.contains(&w.as_str()))
        .map(|w| stem(&w).to_string())
        .collect()
}

fn stem(word: &str) -> &str {
    SUFFIXES
        .iter()
        .find_map(|suffix| {
            word.strip_suffix(suffix)
                .filter(|rest| rest.chars().count() >= 4)
        })
        .unwrap_or(word)
}

/// No whitespace, and either a separator or a letter-initial extension.
fn looks_like_path(item: &str) -> bool {
    if item.is_empty() || item.chars().any(char::is_whitespace) || item.contains("://") {
        return false;
    }
    if item.contains('/') {
        return true;
    }
    match item.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

fn supports(step: &str, evidence: &str) -> bool {
    let step_paths: Vec<&str> = step
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')' | '`' | '"' | '\''))
        })
        .filter(|w| looks_like_path(w))
        .collect();
    if step_paths
        .iter()
        .any(|p| evidence.contains(normalize_path(p)))
    {
        return true;
    }

    // Most of the step's keywords must appear in the evidence
    let step_words = keywords(step);
    let evidence_words = keywords(evidence);
    let shared = step_words.intersection(&evidence_words).count();
    shared > 0 && shared * 2 > step_words.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn manager() -> (TempDir, CheckpointManager, ProjectScope) {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(StateStore::new(temp_dir.path().join("state")));
        let project = temp_dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        let scope = ProjectScope::new(project);
        (
            temp_dir,
            CheckpointManager::new(store, CheckpointPolicy::default()),
            scope,
        )
    }

    fn draft(task: &str, step: &str) -> CheckpointDraft {
        CheckpointDraft {
            task_description: task.to_string(),
            current_step: step.to_string(),
            completed_steps: vec!["read code".to_string()],
            pending_steps: vec!["write tests".to_string(), "update docs".to_string()],
            files_involved: vec!["src/auth.rs".to_string(), "./src/auth.rs".to_string()],
            handoff_summary: Some("halfway through the refactor".to_string()),
            handoff_warnings: vec!["login flow untested".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_save_then_restore_latest() {
        let (_dir, manager, scope) = manager();
        manager.save(&scope, draft("refactor auth", "extract trait")).unwrap();
        let saved = manager
            .save(&scope, draft("refactor auth", "wire trait"))
            .unwrap()
            .value;

        assert_eq!(saved.files_involved, vec!["src/auth.rs"]);
        assert!(saved.task_id.starts_with("task-"));
        assert_eq!(saved.progress_percent(), 33);

        let restored = manager.restore(&scope, None).unwrap();
        assert_eq!(restored.value, saved);
        assert!(restored.warnings.is_empty());

        let handoff = restored.value.handoff.unwrap();
        assert_eq!(handoff.summary.as_deref(), Some("halfway through the refactor"));
    }

    #[test]
    fn test_task_id_reuse_and_list_order() {
        let (_dir, manager, scope) = manager();
        let a1 = manager.save(&scope, draft("task a", "one")).unwrap().value;
        let a2 = manager.save(&scope, draft("task a", "two")).unwrap().value;
        let b = manager.save(&scope, draft("task b", "one")).unwrap().value;

        assert_eq!(a1.task_id, a2.task_id);
        assert_ne!(a1.task_id, b.task_id);

        let list = manager.list(&scope).value;
        let steps: Vec<_> = list.iter().map(|c| c.current_step.as_str()).collect();
        assert_eq!(steps, vec!["one", "two", "one"]);
        assert_eq!(list[0].task_id, b.task_id);

        let by_id = manager.restore(&scope, Some(&a1.task_id)).unwrap().value;
        assert_eq!(by_id.current_step, "two");
    }

    #[test]
    fn test_restore_missing() {
        let (_dir, manager, scope) = manager();
        assert!(matches!(
            manager.restore(&scope, None).unwrap_err(),
            EngineError::NotFound(_)
        ));
        manager.save(&scope, draft("task", "step")).unwrap();
        assert!(matches!(
            manager.restore(&scope, Some("task-nope")).unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[test]
    fn test_log_is_capped() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(StateStore::new(temp_dir.path().to_path_buf()));
        let manager = CheckpointManager::new(
            store,
            CheckpointPolicy {
                max_checkpoints: 3,
                ..Default::default()
            },
        );
        let scope = ProjectScope::new("/p");
        for i in 0..5 {
            manager
                .save(&scope, draft("task", &format!("step {i}")))
                .unwrap();
        }
        let list = manager.list(&scope).value;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].current_step, "step 4");
        assert_eq!(list[2].current_step, "step 2");
    }

    #[test]
    fn test_save_validation() {
        let (_dir, manager, scope) = manager();
        assert!(matches!(
            manager.save(&scope, draft(" ", "step")).unwrap_err(),
            EngineError::Validation(_)
        ));
        assert!(matches!(
            manager.save(&scope, draft("task", "")).unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[test]
    fn test_verify_completion_accepts_covered_steps() {
        let (_dir, manager, scope) = manager();
        fs::write(scope.path().join("src/auth.rs"), "fn login() {}").unwrap();

        let verdict = manager
            .verify_completion(
                &scope,
                "refactor auth",
                &[
                    "cargo test: 42 tests passed".to_string(),
                    "src/auth.rs".to_string(),
                ],
                &[
                    "All tests pass".to_string(),
                    "Login moved into src/auth.rs".to_string(),
                ],
            )
            .unwrap();

        assert!(verdict.accepted, "{}", verdict.reason);
        assert!(verdict.missing.is_empty());
        assert_eq!(verdict.steps[1].evidence.as_deref(), Some("src/auth.rs"));
    }

    #[test]
    fn test_verify_completion_flags_gaps() {
        let (_dir, manager, scope) = manager();

        let verdict = manager
            .verify_completion(
                &scope,
                "refactor auth",
                &[
                    "tests passed".to_string(),
                    "src/missing.rs".to_string(),
                ],
                &[
                    "tests pass".to_string(),
                    "documentation updated".to_string(),
                ],
            )
            .unwrap();

        assert!(!verdict.accepted);
        assert_eq!(verdict.missing, vec!["documentation updated"]);
        assert_eq!(verdict.missing_artifacts, vec!["src/missing.rs"]);
        assert!(verdict.reason.contains("documentation updated"));
    }

    #[test]
    fn test_single_shared_word_is_not_evidence() {
        let (_dir, manager, scope) = manager();

        let verdict = manager
            .verify_completion(
                &scope,
                "parser and cache work",
                &["added tests".to_string()],
                &[
                    "write tests for parser".to_string(),
                    "tests for the cache".to_string(),
                ],
            )
            .unwrap();
        assert!(!verdict.accepted);
        assert_eq!(verdict.missing.len(), 2);

        let verdict = manager
            .verify_completion(
                &scope,
                "parser and cache work",
                &["parser tests written and passing".to_string()],
                &["write tests for parser".to_string()],
            )
            .unwrap();
        assert!(verdict.accepted, "{}", verdict.reason);
    }

    #[test]
    fn test_keyword_stemming() {
        assert_eq!(stem("tests"), "test");
        assert_eq!(stem("passed"), "pass");
        assert_eq!(stem("pass"), "pass");
        assert_eq!(stem("caching"), "cach");
        assert!(keywords("Tests passed").contains("pass"));
    }

    #[test]
    fn test_verify_completion_requires_steps() {
        let (_dir, manager, scope) = manager();
        assert!(matches!(
            manager
                .verify_completion(&scope, "task", &["done".to_string()], &[])
                .unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[test]
    fn test_instructions_are_reinforced_by_importance() {
        let (_dir, manager, scope) = manager();

        let empty = manager.reinforce(&scope).unwrap().value;
        assert_eq!(empty.total, 0);
        assert!(empty.reminder.is_empty());

        for (text, importance) in [
            ("Run the linter before pushing", 4),
            ("Never edit vendored crates", 9),
            ("Keep public APIs documented", 6),
        ] {
            manager
                .add_instruction(&scope, text, Some("team policy"), Some(importance))
                .unwrap();
        }
        // Same text again updates rather than duplicates
        let updated = manager
            .add_instruction(&scope, "Run the linter before pushing", None, Some(42))
            .unwrap()
            .value;
        assert_eq!(updated.importance, 10);
        assert_eq!(updated.reason, "Important rule");

        let reinforcement = manager.reinforce(&scope).unwrap().value;
        assert_eq!(reinforcement.total, 3);
        let order: Vec<_> = reinforcement
            .instructions
            .iter()
            .map(|i| i.importance)
            .collect();
        assert_eq!(order, vec![10, 9, 6]);
        assert!(reinforcement
            .reminder
            .contains("- Never edit vendored crates (Why: team policy)"));
        assert!(reinforcement.instructions.iter().all(|i| i.reinforce_count == 1));

        assert!(matches!(
            manager.add_instruction(&scope, " ", None, None).unwrap_err(),
            EngineError::Validation(_)
        ));

        // Instructions live beside checkpoints without disturbing them
        assert!(manager.list(&scope).value.is_empty());
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("src/main.rs"));
        assert!(looks_like_path("Cargo.toml"));
        assert!(!looks_like_path("42 tests passed"));
        assert!(!looks_like_path("v1.2"));
        assert!(!looks_like_path("https://example.com/x"));
    }
}
