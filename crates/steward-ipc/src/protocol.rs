//! IPC Protocol definitions for Steward daemon communication.
//!
//! Uses MessagePack (structs encoded as maps) over Unix sockets. JSON is
//! accepted on input so hook scripts can talk to the daemon with `nc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use steward_engine::{
    Checkpoint, CheckpointDraft, CleanupReport, CompletionVerdict, CriticalInstruction, LoopCheck,
    LoopState, MemoryCluster, MemoryRecord, MemoryStats, PreEditReport, Reinforcement,
    ScopeDeclaration, ScopeStatus, ScopeVerdict, SessionBriefing, SessionSummary, TestEvent,
};

/// Request from client (hooks/CLI) to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Request {
    /// Memory store operations
    Memory { cwd: PathBuf, op: MemoryOp },

    /// Mistake and decision logging
    Work { cwd: PathBuf, op: WorkOp },

    /// Declared edit boundary
    Scope { cwd: PathBuf, op: ScopeOp },

    /// Edit/test loop tracking
    Loop { cwd: PathBuf, op: LoopOp },

    /// Checkpoints and completion checks
    Context { cwd: PathBuf, op: ContextOp },

    /// Begin a session: clean up and brief
    SessionStart { cwd: PathBuf },

    /// End a session and store its summary
    SessionEnd { cwd: PathBuf },

    /// Advisory check before editing a file
    PreEditCheck { cwd: PathBuf, file_path: String },

    /// Get daemon status
    Status,

    /// Graceful shutdown
    Shutdown,

    /// Ping for health check
    Ping,
}

impl Request {
    /// Project directory the request is scoped to, if any.
    pub fn cwd(&self) -> Option<&Path> {
        match self {
            Request::Memory { cwd, .. }
            | Request::Work { cwd, .. }
            | Request::Scope { cwd, .. }
            | Request::Loop { cwd, .. }
            | Request::Context { cwd, .. }
            | Request::SessionStart { cwd }
            | Request::SessionEnd { cwd }
            | Request::PreEditCheck { cwd, .. } => Some(cwd),
            Request::Status | Request::Shutdown | Request::Ping => None,
        }
    }

    /// `tool.operation` label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Memory { op, .. } => op.name(),
            Request::Work { op, .. } => match op {
                WorkOp::LogMistake { .. } => "work.log_mistake",
                WorkOp::LogDecision { .. } => "work.log_decision",
            },
            Request::Scope { op, .. } => match op {
                ScopeOp::Declare { .. } => "scope.declare",
                ScopeOp::Check { .. } => "scope.check",
                ScopeOp::Expand { .. } => "scope.expand",
                ScopeOp::Status => "scope.status",
                ScopeOp::Clear => "scope.clear",
            },
            Request::Loop { op, .. } => match op {
                LoopOp::RecordEdit { .. } => "loop.record_edit",
                LoopOp::RecordTest { .. } => "loop.record_test",
                LoopOp::Check { .. } => "loop.check",
                LoopOp::Status => "loop.status",
                LoopOp::Reset => "loop.reset",
            },
            Request::Context { op, .. } => match op {
                ContextOp::CheckpointSave { .. } => "context.checkpoint_save",
                ContextOp::CheckpointRestore { .. } => "context.checkpoint_restore",
                ContextOp::CheckpointList => "context.checkpoint_list",
                ContextOp::VerifyCompletion { .. } => "context.verify_completion",
                ContextOp::InstructionAdd { .. } => "context.instruction_add",
                ContextOp::InstructionReinforce => "context.instruction_reinforce",
            },
            Request::SessionStart { .. } => "session.start",
            Request::SessionEnd { .. } => "session.end",
            Request::PreEditCheck { .. } => "session.pre_edit_check",
            Request::Status => "status",
            Request::Shutdown => "shutdown",
            Request::Ping => "ping",
        }
    }
}

/// Memory store operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum MemoryOp {
    Remember {
        content: String,
        category: String,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relevance: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_file: Option<String>,
    },
    Recall,
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    Clusters {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cluster_id: Option<String>,
    },
    Cleanup {
        /// Defaults to a dry run
        #[serde(default = "default_dry_run")]
        dry_run: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_relevance: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_age_days: Option<u32>,
    },
    Forget,
    Modify {
        memory_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relevance: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    Delete {
        memory_id: String,
    },
    Promote {
        memory_id: String,
        reason: String,
    },
    Stats,
    /// Store a rule directly
    AddRule {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relevance: Option<u8>,
    },
    ListRules,
    /// Newest memories first
    Recent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

impl MemoryOp {
    fn name(&self) -> &'static str {
        match self {
            MemoryOp::Remember { .. } => "memory.remember",
            MemoryOp::Recall => "memory.recall",
            MemoryOp::Search { .. } => "memory.search",
            MemoryOp::Clusters { .. } => "memory.clusters",
            MemoryOp::Cleanup { .. } => "memory.cleanup",
            MemoryOp::Forget => "memory.forget",
            MemoryOp::Modify { .. } => "memory.modify",
            MemoryOp::Delete { .. } => "memory.delete",
            MemoryOp::Promote { .. } => "memory.promote",
            MemoryOp::Stats => "memory.stats",
            MemoryOp::AddRule { .. } => "memory.add_rule",
            MemoryOp::ListRules => "memory.list_rules",
            MemoryOp::Recent { .. } => "memory.recent",
        }
    }
}

/// Mistake and decision logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum WorkOp {
    LogMistake {
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        how_to_avoid: Option<String>,
    },
    LogDecision {
        decision: String,
        reason: String,
    },
}

/// Scope guard operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ScopeOp {
    Declare {
        task_description: String,
        #[serde(default)]
        in_scope_files: Vec<String>,
        #[serde(default)]
        in_scope_patterns: Vec<String>,
        #[serde(default)]
        out_of_scope_files: Vec<String>,
    },
    Check {
        file_path: String,
    },
    Expand {
        files_to_add: Vec<String>,
        #[serde(default)]
        reason: String,
    },
    Status,
    Clear,
}

/// Loop detector operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum LoopOp {
    RecordEdit {
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    RecordTest {
        passed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    Check {
        file_path: String,
    },
    Status,
    /// Drop all edit/test history for the project
    Reset,
}

/// Checkpoint and completion operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ContextOp {
    CheckpointSave(CheckpointFields),
    CheckpointRestore {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    CheckpointList,
    VerifyCompletion {
        task: String,
        #[serde(default)]
        evidence: Vec<String>,
        #[serde(default)]
        verification_steps: Vec<String>,
    },
    /// Register an instruction that must not be forgotten
    InstructionAdd {
        instruction: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        importance: Option<u8>,
    },
    InstructionReinforce,
}

/// Payload of a checkpoint save
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_summary: Option<String>,
    #[serde(default)]
    pub handoff_context_needed: Vec<String>,
    #[serde(default)]
    pub handoff_warnings: Vec<String>,
}

impl From<CheckpointFields> for CheckpointDraft {
    fn from(fields: CheckpointFields) -> Self {
        CheckpointDraft {
            task_id: fields.task_id,
            task_description: fields.task_description,
            current_step: fields.current_step,
            completed_steps: fields.completed_steps,
            pending_steps: fields.pending_steps,
            files_involved: fields.files_involved,
            key_decisions: fields.key_decisions,
            blockers: fields.blockers,
            handoff_summary: fields.handoff_summary,
            handoff_context_needed: fields.handoff_context_needed,
            handoff_warnings: fields.handoff_warnings,
        }
    }
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success with optional data
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
        /// Recovered storage problems and other non-fatal notes
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },

    /// Acknowledgment for requests without a payload
    Ack,

    /// Error response
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Create a success response with no data
    pub fn ok() -> Self {
        Response::Ok {
            data: None,
            warnings: Vec::new(),
        }
    }

    /// Create a success response with data
    pub fn ok_with(data: ResponseData) -> Self {
        Response::Ok {
            data: Some(data),
            warnings: Vec::new(),
        }
    }

    /// Create a success response with data and warnings
    pub fn ok_warned(data: ResponseData, warnings: Vec<String>) -> Self {
        Response::Ok {
            data: Some(data),
            warnings,
        }
    }

    /// Create an acknowledgment response
    pub fn ack() -> Self {
        Response::Ack
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// A single memory
    Memory { memory: MemoryRecord },

    /// Several memories, in the order the operation defines
    Memories { memories: Vec<MemoryRecord> },

    Clusters { clusters: Vec<MemoryCluster> },

    Cleanup { report: CleanupReport },

    /// Count of memories removed by forget
    Forgotten { removed: usize },

    MemoryStats { stats: MemoryStats },

    LoopCheck { check: LoopCheck },

    TestRecorded { test: TestEvent },

    LoopStatus { files: BTreeMap<String, LoopState> },

    /// Whether any loop history existed
    LoopReset { removed: bool },

    ScopeDeclaration { declaration: ScopeDeclaration },

    ScopeVerdict { verdict: ScopeVerdict },

    ScopeStatus { status: ScopeStatus },

    /// Whether a declaration was active
    ScopeCleared { cleared: bool },

    Checkpoint { checkpoint: Checkpoint },

    Checkpoints { checkpoints: Vec<Checkpoint> },

    Completion { verdict: CompletionVerdict },

    Instruction { instruction: CriticalInstruction },

    Reinforcement { reinforcement: Reinforcement },

    SessionBriefing { briefing: SessionBriefing },

    SessionSummary { summary: SessionSummary },

    PreEdit { report: PreEditReport },

    /// Daemon status
    Status {
        version: String,
        uptime_secs: u64,
        projects_loaded: usize,
        /// Total requests handled
        #[serde(default)]
        requests_total: u64,
        /// Requests answered with an error
        #[serde(default)]
        errors_total: u64,
        /// Average request latency in milliseconds
        #[serde(default)]
        avg_latency_ms: u64,
        /// Share of project lookups served from cache
        #[serde(default)]
        cache_hit_rate: f64,
        /// Inference model override, if configured
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Inference service address override, if configured
        #[serde(default, skip_serializing_if = "Option::is_none")]
        llm_url: Option<String>,
    },

    /// Pong response
    Pong { timestamp: i64 },
}

/// Error codes for error responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or missing input, including unknown operations
    Validation,
    /// Referenced memory, task or cluster does not exist
    NotFound,
    /// Operation needs state that does not exist
    State,
    /// State could not be written
    Storage,
    /// Internal daemon error
    Internal,
    /// Operation timed out
    Timeout,
    /// Daemon is shutting down
    ShuttingDown,
}

fn default_dry_run() -> bool {
    true
}

/// Encode a message for the wire.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(message)
}
