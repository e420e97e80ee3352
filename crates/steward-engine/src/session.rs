//! Session-level composition of the engine components.

use crate::{
    Category, Checkpoint, CheckpointManager, CleanupOptions, CleanupReport, EngineError,
    EnginePolicy, LoopCheck, LoopDetector, MemoryEngine, MemoryRecord, NewMemory, Outcome, Result,
    ScopeGuard, ScopeVerdict, SearchQuery, SessionEvent,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use steward_store::{ProjectScope, StateStore};

/// Mistakes surfaced by a pre-edit check.
const PRE_EDIT_MISTAKES: usize = 5;

/// Files named individually in a session summary.
const SUMMARY_FILES: usize = 3;

/// Everything a new session needs to pick up where the last one stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBriefing {
    pub project_path: PathBuf,
    pub protected_memories: Vec<MemoryRecord>,
    /// Ranked recent subset of the unprotected memories
    pub memories: Vec<MemoryRecord>,
    pub conventions_ref: Option<PathBuf>,
    pub restored_checkpoint: Option<Checkpoint>,
    pub cleanup_report: CleanupReport,
    pub active_scope: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Advisory answer for an imminent edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreEditReport {
    pub file_path: String,
    pub mistakes_for_file: Vec<MemoryRecord>,
    pub loop_state: LoopCheck,
    /// Present only while a scope declaration is active
    pub scope_verdict: Option<ScopeVerdict>,
    /// Human-readable merge of everything above worth attention
    pub warnings: Vec<String>,
}

impl PreEditReport {
    pub fn is_clear(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub summary: String,
    pub files_edited: Vec<String>,
    pub decisions: usize,
    pub mistakes: usize,
    pub tests_run: usize,
    pub tests_failed: usize,
    pub duration_minutes: i64,
    /// Id of the stored summary memory, if activity warranted one
    pub memory_id: Option<String>,
}

/// Owns one instance of each component over a shared store.
pub struct SessionCoordinator {
    store: Arc<StateStore>,
    memory: MemoryEngine,
    loops: LoopDetector,
    scope: ScopeGuard,
    checkpoints: CheckpointManager,
}

impl SessionCoordinator {
    pub fn new(store: Arc<StateStore>, policy: EnginePolicy) -> Self {
        Self {
            memory: MemoryEngine::new(store.clone(), policy.memory),
            loops: LoopDetector::new(store.clone(), policy.loop_detector),
            scope: ScopeGuard::new(store.clone()),
            checkpoints: CheckpointManager::new(store.clone(), policy.checkpoints),
            store,
        }
    }

    pub fn memory(&self) -> &MemoryEngine {
        &self.memory
    }

    pub fn loops(&self) -> &LoopDetector {
        &self.loops
    }

    pub fn scope(&self) -> &ScopeGuard {
        &self.scope
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Open a session: mark the boundary, clean memories and gather what
    /// the caller should know before starting.
    pub fn session_start(&self, scope: &ProjectScope) -> Result<SessionBriefing> {
        let now = Utc::now();
        let mut warnings = Vec::new();

        self.loops.begin_session(scope, now)?.drain_into(&mut warnings);
        self.journal(scope, &SessionEvent::SessionStarted { at: now }, &mut warnings);

        let cleanup_report = self
            .memory
            .cleanup(
                scope,
                CleanupOptions {
                    dry_run: false,
                    ..Default::default()
                },
            )?
            .drain_into(&mut warnings);

        let records = self.memory.recall(scope).drain_into(&mut warnings);
        let (mut protected_memories, mut memories): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.category.is_protected());
        protected_memories.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        memories.sort_by(|a, b| {
            b.relevance
                .cmp(&a.relevance)
                .then_with(|| b.last_accessed.cmp(&a.last_accessed))
        });
        memories.truncate(self.memory.policy().recent_limit);

        let restored_checkpoint = match self.checkpoints.restore(scope, None) {
            Ok(outcome) => Some(outcome.drain_into(&mut warnings)),
            Err(EngineError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let conventions = self
            .store
            .root()
            .join("conventions")
            .join(format!("{}.json", scope.key()));
        let conventions_ref = conventions.exists().then_some(conventions);

        let active_scope = self
            .scope
            .status(scope)
            .drain_into(&mut warnings)
            .task_description;

        tracing::info!(
            project = ?scope.path(),
            protected = protected_memories.len(),
            recent = memories.len(),
            checkpoint = restored_checkpoint.is_some(),
            "Session started"
        );

        Ok(SessionBriefing {
            project_path: scope.path().to_path_buf(),
            protected_memories,
            memories,
            conventions_ref,
            restored_checkpoint,
            cleanup_report,
            active_scope,
            warnings,
        })
    }

    /// Merge known mistakes, loop risk and scope membership for one file.
    pub fn pre_edit_check(&self, scope: &ProjectScope, file_path: &str) -> Result<PreEditReport> {
        let mut warnings = Vec::new();
        let mut recovery = Vec::new();

        let mistakes_for_file: Vec<MemoryRecord> = self
            .memory
            .search(
                scope,
                &SearchQuery {
                    file_path: Some(file_path.to_string()),
                    limit: Some(usize::MAX),
                    ..Default::default()
                },
            )?
            .drain_into(&mut recovery)
            .into_iter()
            .filter(|r| r.category == Category::Mistake)
            .take(PRE_EDIT_MISTAKES)
            .collect();
        for mistake in &mistakes_for_file {
            warnings.push(format!("Past mistake: {}", mistake.content));
        }

        let loop_state = self.loops.check(scope, file_path)?.drain_into(&mut recovery);
        if loop_state.is_flagged() {
            warnings.push(format!("Loop {}: {}", loop_state.state, loop_state.advisory_text));
        }

        let verdict = self.scope.check(scope, file_path)?.drain_into(&mut recovery);
        let scope_verdict = verdict.active.then_some(verdict);
        if let Some(verdict) = scope_verdict.as_ref().filter(|v| !v.in_scope) {
            warnings.push(format!("Out of scope: {} ({})", verdict.file_path, verdict.reason));
        }

        warnings.extend(recovery);

        Ok(PreEditReport {
            file_path: loop_state.file_path.clone(),
            mistakes_for_file,
            loop_state,
            scope_verdict,
            warnings,
        })
    }

    /// Close the session and store a summary of what happened in it.
    pub fn session_end(&self, scope: &ProjectScope) -> Result<Outcome<SessionSummary>> {
        let now = Utc::now();
        let mut warnings = Vec::new();

        let events: Vec<SessionEvent> = match self.store.journal(scope).read_all() {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, project = ?scope.path(), "Session journal unreadable");
                warnings.push(format!("session journal unreadable: {}", e));
                Vec::new()
            }
        };
        let start = events
            .iter()
            .rposition(|e| matches!(e, SessionEvent::SessionStarted { .. }));
        let started_at = start.map(|i| events[i].at());
        let in_session = &events[start.map_or(0, |i| i + 1)..];

        let mut files_edited: Vec<String> = Vec::new();
        let (mut decisions, mut mistakes, mut tests_run, mut tests_failed) = (0, 0, 0, 0);
        for event in in_session {
            match event {
                SessionEvent::Edit { file_path, .. } => {
                    if !files_edited.contains(file_path) {
                        files_edited.push(file_path.clone());
                    }
                }
                SessionEvent::Test { passed, .. } => {
                    tests_run += 1;
                    if !passed {
                        tests_failed += 1;
                    }
                }
                SessionEvent::Decision { .. } => decisions += 1,
                SessionEvent::Mistake { .. } => mistakes += 1,
                SessionEvent::SessionStarted { .. } | SessionEvent::SessionEnded { .. } => {}
            }
        }

        let duration_minutes = started_at
            .or_else(|| in_session.first().map(SessionEvent::at))
            .map_or(0, |start| (now - start).num_minutes().max(0));

        let summary = summarize(
            duration_minutes,
            &files_edited,
            decisions,
            mistakes,
            tests_run,
            tests_failed,
        );

        let active = !files_edited.is_empty() || decisions + mistakes + tests_run > 0;
        let memory_id = if active {
            let record = self
                .memory
                .remember(
                    scope,
                    NewMemory::new(summary.clone(), Category::Discovery.as_str())
                        .tags(["session"]),
                )?
                .drain_into(&mut warnings);
            Some(record.id)
        } else {
            None
        };

        self.journal(scope, &SessionEvent::SessionEnded { at: now }, &mut warnings);

        tracing::info!(
            project = ?scope.path(),
            files = files_edited.len(),
            tests = tests_run,
            "Session ended"
        );

        Ok(Outcome {
            value: SessionSummary {
                summary,
                files_edited,
                decisions,
                mistakes,
                tests_run,
                tests_failed,
                duration_minutes,
                memory_id,
            },
            warnings,
        })
    }

    /// Store a mistake memory and note it in the session journal.
    pub fn log_mistake(
        &self,
        scope: &ProjectScope,
        description: &str,
        file_path: Option<&str>,
        how_to_avoid: Option<&str>,
    ) -> Result<Outcome<MemoryRecord>> {
        let description = description.trim();
        if description.is_empty() {
            return Err(EngineError::validation("description cannot be empty"));
        }
        let how_to_avoid = how_to_avoid.map(str::trim).filter(|h| !h.is_empty());
        let file_path = file_path.map(str::trim).filter(|f| !f.is_empty());

        let mut content = format!("MISTAKE: {}", description);
        if let Some(how) = how_to_avoid {
            content.push_str(&format!(" - Fix: {}", how));
        }
        let mut memory = NewMemory::new(content, Category::Mistake.as_str()).relevance(9);
        if let Some(file) = file_path {
            memory = memory.source_file(file);
        }

        let mut outcome = self.memory.remember(scope, memory)?;
        let event = SessionEvent::Mistake {
            at: outcome.value.created_at,
            description: description.to_string(),
            file_path: outcome.value.source_file.clone(),
        };
        self.journal(scope, &event, &mut outcome.warnings);

        Ok(outcome)
    }

    /// Store a decision memory and note it in the session journal.
    pub fn log_decision(
        &self,
        scope: &ProjectScope,
        decision: &str,
        reason: &str,
    ) -> Result<Outcome<MemoryRecord>> {
        let decision = decision.trim();
        let reason = reason.trim();
        if decision.is_empty() {
            return Err(EngineError::validation("decision cannot be empty"));
        }
        if reason.is_empty() {
            return Err(EngineError::validation("reason cannot be empty"));
        }

        let memory = NewMemory::new(
            format!("DECISION: {} - Reason: {}", decision, reason),
            Category::Discovery.as_str(),
        )
        .tags(["decision"])
        .relevance(7);

        let mut outcome = self.memory.remember(scope, memory)?;
        let event = SessionEvent::Decision {
            at: outcome.value.created_at,
            decision: decision.to_string(),
            reason: reason.to_string(),
        };
        self.journal(scope, &event, &mut outcome.warnings);

        Ok(outcome)
    }

    fn journal(&self, scope: &ProjectScope, event: &SessionEvent, warnings: &mut Vec<String>) {
        if let Err(e) = self.store.journal(scope).append(event) {
            tracing::warn!(error = %e, project = ?scope.path(), "Failed to append journal event");
            warnings.push(format!("session journal not updated: {}", e));
        }
    }
}

fn summarize(
    minutes: i64,
    files: &[String],
    decisions: usize,
    mistakes: usize,
    tests_run: usize,
    tests_failed: usize,
) -> String {
    let edited = if files.is_empty() {
        "no edits".to_string()
    } else {
        let mut named = files
            .iter()
            .take(SUMMARY_FILES)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if files.len() > SUMMARY_FILES {
            named.push_str(&format!(" (+{} more)", files.len() - SUMMARY_FILES));
        }
        format!("edited {}", named)
    };
    format!(
        "SESSION: {}min | {} | {} decisions | {} mistakes | {} tests ({} failed)",
        minutes, edited, decisions, mistakes, tests_run, tests_failed
    )
}
