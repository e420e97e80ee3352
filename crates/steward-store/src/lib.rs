//! Steward state storage
//!
//! File-resident record sets, one per concern per project, written with an
//! atomic replace so concurrent hook and tool-call writers never observe a
//! half-written file. Also provides the append-only session journal.

mod error;
mod journal;
mod store;

pub use error::{Result, StoreError};
pub use journal::Journal;
pub use store::{project_key, Concern, Loaded, ProjectScope, StateStore, StoreOptions};
