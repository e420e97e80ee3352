//! Edit/test correlation for spotting unproductive edit loops.
//!
//! Each project keeps an append-only log of edit and test events. A file's
//! state is derived on read from the edits inside the recent window and the
//! most recent test result:
//!
//! | recent edits        | last test | state        |
//! |---------------------|-----------|--------------|
//! | below watch         | any       | Normal       |
//! | watch..spiral       | any       | Watch        |
//! | spiral or more      | none      | Watch        |
//! | spiral or more      | failed    | SpiralRisk   |
//! | spiral or more      | passed    | Improving    |

use crate::memory::normalize_path;
use crate::{EngineError, LoopPolicy, Outcome, Result, SessionEvent};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use steward_store::{Concern, ProjectScope, StateStore};

/// A recorded file edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    pub file_path: String,
    pub project_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A recorded test run for the whole project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    pub project_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Risk classification of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Normal,
    Watch,
    SpiralRisk,
    Improving,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoopState::Normal => "Normal",
            LoopState::Watch => "Watch",
            LoopState::SpiralRisk => "Spiral-Risk",
            LoopState::Improving => "Improving",
        };
        f.write_str(label)
    }
}

/// Result of [`LoopDetector::check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCheck {
    pub file_path: String,
    pub state: LoopState,
    pub edit_count: usize,
    pub advisory_text: String,
}

impl LoopCheck {
    /// Whether the state deserves the caller's attention.
    pub fn is_flagged(&self) -> bool {
        matches!(self.state, LoopState::Watch | LoopState::SpiralRisk)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct LoopLog {
    #[serde(default)]
    pub session_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edits: Vec<EditEvent>,
    #[serde(default)]
    pub tests: Vec<TestEvent>,
}

/// Tracks edits and test runs per project.
pub struct LoopDetector {
    store: Arc<StateStore>,
    policy: LoopPolicy,
}

impl LoopDetector {
    pub fn new(store: Arc<StateStore>, policy: LoopPolicy) -> Self {
        Self { store, policy }
    }

    /// Append an edit event and return the file's resulting state.
    pub fn record_edit(
        &self,
        scope: &ProjectScope,
        file_path: &str,
        description: Option<&str>,
    ) -> Result<Outcome<LoopCheck>> {
        let file_path = require_file(file_path)?;
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let now = Utc::now();

        let event = EditEvent {
            file_path: file_path.clone(),
            project_path: scope.path().to_path_buf(),
            timestamp: now,
            description: description.clone(),
        };

        let max_events = self.policy.max_events;
        let outcome = self
            .store
            .update(scope, Concern::Loop, |log: &mut LoopLog| {
                log.edits.push(event);
                trim_front(&mut log.edits, max_events);
                Ok::<_, EngineError>(classify(log, &file_path, now, &self.policy))
            })?;

        let mut outcome: Outcome<LoopCheck> = outcome.into();
        self.journal(
            scope,
            &SessionEvent::Edit {
                at: now,
                file_path,
                description,
            },
            &mut outcome.warnings,
        );

        if outcome.value.state == LoopState::SpiralRisk {
            tracing::warn!(
                project = ?scope.path(),
                file = %outcome.value.file_path,
                edits = outcome.value.edit_count,
                "Edit loop detected"
            );
        }

        Ok(outcome)
    }

    /// Append a project-wide test result.
    pub fn record_test(
        &self,
        scope: &ProjectScope,
        passed: bool,
        error_message: Option<&str>,
    ) -> Result<Outcome<TestEvent>> {
        let error_message = error_message
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        let now = Utc::now();

        let event = TestEvent {
            project_path: scope.path().to_path_buf(),
            timestamp: now,
            passed,
            error_message: error_message.clone(),
        };

        let max_events = self.policy.max_events;
        let outcome = self
            .store
            .update(scope, Concern::Loop, |log: &mut LoopLog| {
                log.tests.push(event.clone());
                trim_front(&mut log.tests, max_events);
                Ok::<_, EngineError>(event)
            })?;

        let mut outcome: Outcome<TestEvent> = outcome.into();
        self.journal(
            scope,
            &SessionEvent::Test {
                at: now,
                passed,
                error_message,
            },
            &mut outcome.warnings,
        );

        Ok(outcome)
    }

    /// Current state of one file. Read-only.
    pub fn check(&self, scope: &ProjectScope, file_path: &str) -> Result<Outcome<LoopCheck>> {
        let file_path = require_file(file_path)?;
        let now = Utc::now();
        Ok(self
            .load(scope)
            .map(|log| classify(&log, &file_path, now, &self.policy)))
    }

    /// State of every file with recorded edits.
    pub fn status(&self, scope: &ProjectScope) -> Outcome<BTreeMap<String, LoopState>> {
        let now = Utc::now();
        self.load(scope).map(|log| {
            log.edits
                .iter()
                .map(|e| e.file_path.clone())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .map(|file| {
                    let state = classify(&log, &file, now, &self.policy).state;
                    (file, state)
                })
                .collect()
        })
    }

    /// Discard all edit and test history for the project.
    pub fn reset(&self, scope: &ProjectScope) -> Result<bool> {
        let removed = self.store.remove(scope, Concern::Loop)?;
        tracing::info!(project = ?scope.path(), "Loop history reset");
        Ok(removed)
    }

    /// Mark a session boundary; earlier edits stop counting.
    pub(crate) fn begin_session(
        &self,
        scope: &ProjectScope,
        at: DateTime<Utc>,
    ) -> Result<Outcome<()>> {
        let outcome = self
            .store
            .update(scope, Concern::Loop, |log: &mut LoopLog| {
                log.session_started_at = Some(at);
                Ok::<_, EngineError>(())
            })?;
        Ok(outcome.into())
    }

    fn load(&self, scope: &ProjectScope) -> Outcome<LoopLog> {
        self.store.load(scope, Concern::Loop).into()
    }

    fn journal(&self, scope: &ProjectScope, event: &SessionEvent, warnings: &mut Vec<String>) {
        if let Err(e) = self.store.journal(scope).append(event) {
            tracing::warn!(error = %e, project = ?scope.path(), "Failed to append journal event");
            warnings.push(format!("session journal not updated: {}", e));
        }
    }
}

fn require_file(file_path: &str) -> Result<String> {
    let file_path = normalize_path(file_path);
    if file_path.is_empty() {
        return Err(EngineError::validation("file_path cannot be empty"));
    }
    Ok(file_path.to_string())
}

fn trim_front<T>(events: &mut Vec<T>, max: usize) {
    if events.len() > max {
        let excess = events.len() - max;
        events.drain(..excess);
    }
}

fn classify(log: &LoopLog, file_path: &str, now: DateTime<Utc>, policy: &LoopPolicy) -> LoopCheck {
    // Windows too large to represent reach back to the earliest instant
    let mut window_start = Duration::try_minutes(policy.window_minutes.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    if let Some(started) = log.session_started_at {
        window_start = window_start.max(started);
    }

    let edit_count = log
        .edits
        .iter()
        .filter(|e| e.file_path == file_path && e.timestamp >= window_start)
        .count();
    let last_test = log
        .tests
        .iter()
        .filter(|t| t.timestamp >= window_start)
        .max_by_key(|t| t.timestamp);

    let state = if edit_count >= policy.spiral_threshold {
        match last_test {
            Some(test) if !test.passed => LoopState::SpiralRisk,
            Some(_) => LoopState::Improving,
            None => LoopState::Watch,
        }
    } else if edit_count >= policy.watch_threshold {
        LoopState::Watch
    } else {
        LoopState::Normal
    };

    let advisory_text = match state {
        LoopState::Normal => format!("{} has no repeated edits.", file_path),
        LoopState::Watch if edit_count >= policy.spiral_threshold => format!(
            "{} edited {} times with no test run since. Run the tests before editing again.",
            file_path, edit_count
        ),
        LoopState::Watch => format!(
            "{} edited {} times recently. Confirm the approach before another edit.",
            file_path, edit_count
        ),
        LoopState::SpiralRisk => {
            let error = last_test
                .and_then(|t| t.error_message.as_deref())
                .map(|e| format!(" ({})", e))
                .unwrap_or_default();
            format!(
                "{} edited {} times and the last test run failed{}. \
                 Stop and rethink instead of editing again.",
                file_path, edit_count, error
            )
        }
        LoopState::Improving => format!(
            "{} edited {} times; the last test run passed.",
            file_path, edit_count
        ),
    };

    LoopCheck {
        file_path: file_path.to_string(),
        state,
        edit_count,
        advisory_text,
    }
}
