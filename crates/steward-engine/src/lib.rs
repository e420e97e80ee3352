//! Steward engine
//!
//! The state-consolidation and safety-guard core: a memory store with
//! deduplication, clustering and decay; an edit/test loop detector; a
//! declared-scope guard; task checkpoints; and the session coordinator that
//! composes them. Everything here is synchronous. Each call receives the
//! [`ProjectScope`] it operates on and persists its changes before returning.

mod checkpoint;
mod error;
mod events;
mod loop_detector;
mod memory;
mod outcome;
mod policy;
mod scope;
mod session;

pub use checkpoint::{
    Checkpoint, CheckpointDraft, CheckpointManager, CompletionVerdict, CriticalInstruction,
    Handoff, Reinforcement, StepCheck,
};
pub use error::{EngineError, Result};
pub use events::SessionEvent;
pub use loop_detector::{EditEvent, LoopCheck, LoopDetector, LoopState, TestEvent};
pub use memory::{
    auto_tags, Category, CleanupOptions, CleanupReport, MemoryChanges, MemoryCluster,
    MemoryEngine, MemoryRecord, MemoryStats, NewMemory, SearchQuery, SimilarityScorer,
    TokenJaccard,
};
pub use outcome::Outcome;
pub use policy::{CheckpointPolicy, EnginePolicy, LoopPolicy, MemoryPolicy};
pub use scope::{
    ScopeDeclaration, ScopeExpansion, ScopeGuard, ScopeStatus, ScopeVerdict, ScopeViolation,
};
pub use session::{PreEditReport, SessionBriefing, SessionCoordinator, SessionSummary};
pub use steward_store::{ProjectScope, StateStore};
