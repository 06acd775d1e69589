//! # bihak-core
//!
//! The deterministic incubation program engine for Bihak.
//!
//! Teams move through ordered phases of exercises. This crate decides:
//! - which phases and exercises a team may open ([`gate`])
//! - how saves become numbered versions ([`ledger`])
//! - how staff approve or send back work ([`review`])
//! - how far a team has come ([`progress`])
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - `BTreeMap` only, integer arithmetic only
//! - Callers supply every timestamp; nothing here reads a clock
//! - Fallible operations return `Result<T, IncubatorError>`

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod formats;
pub mod gate;
pub mod ledger;
pub mod memory;
pub mod primitives;
pub mod progress;
pub mod review;
pub mod storage;
pub mod store;
pub mod types;
pub mod workspace;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Exercise, ExerciseId, ExerciseOrder, IncubatorError, Member, MemberId, MemberRole,
    NewSubmission, Phase, PhaseId, ProgramInfo, Review, ReviewDecision, Submission, SubmissionId,
    SubmissionStatus, Team, TeamId, TeamStatus, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::{Catalog, ExerciseDefinition, PhaseDefinition, ProgramDefinition};
pub use gate::{AccessMap, ExerciseAccess, ExerciseState, Gate, PhaseAccess};
pub use ledger::{SaveMode, SaveRequest};
pub use memory::MemoryStore;
pub use progress::{PhaseProgress, ProgramProgress, percent};
pub use review::{QueueEntry, ReviewRequest, check_transition};
pub use storage::RedbStore;
pub use store::{IncubatorStore, Snapshot};
pub use workspace::Workspace;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, snapshot_checksum, snapshot_from_bytes, snapshot_to_bytes};
