//! # Core Type Definitions
//!
//! This module contains all core types for the incubation program engine:
//! - Identifiers (`PhaseId`, `ExerciseId`, `TeamId`, `MemberId`, `SubmissionId`)
//! - Catalog rows (`ProgramInfo`, `Phase`, `Exercise`)
//! - Team rows (`Team`, `Member`)
//! - Workflow rows (`Submission`, `Review`)
//! - Error types (`IncubatorError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap` keys
//! - Carry caller-supplied timestamps; nothing here reads a clock

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a program phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub u64);

/// Identifier of an exercise inside a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExerciseId(pub u64);

/// Identifier of an incubated team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u64);

/// Identifier of a team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

/// Identifier of a single saved submission version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

/// Seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Raw seconds value.
    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0
    }
}

// =============================================================================
// PROGRAM CATALOG
// =============================================================================

/// How exercises inside an unlocked phase become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseOrder {
    /// Every active exercise of an unlocked phase is available.
    #[default]
    Open,
    /// Exercise k+1 opens only once exercise k is approved.
    Sequential,
}

/// Program-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercise_order: ExerciseOrder,
}

impl Default for ProgramInfo {
    fn default() -> Self {
        Self {
            name: "Incubation Program".to_string(),
            description: String::new(),
            exercise_order: ExerciseOrder::Open,
        }
    }
}

/// An ordered stage of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    /// 1-based position in the program.
    pub number: u32,
    pub title: String,
    pub description: String,
}

/// A task that teams answer with submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub phase: PhaseId,
    /// 1-based position inside the phase.
    pub number: u32,
    pub title: String,
    pub instructions: String,
    /// Inactive exercises are kept for history but ignored by the gate.
    pub active: bool,
}

// =============================================================================
// TEAMS
// =============================================================================

/// Lifecycle of a team in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Active,
    Withdrawn,
    Graduated,
}

impl TeamStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamStatus::Active => "active",
            TeamStatus::Withdrawn => "withdrawn",
            TeamStatus::Graduated => "graduated",
        }
    }
}

/// An incubated team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub status: TeamStatus,
    pub created_at: Timestamp,
}

/// Role of a member inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Leader,
    Member,
}

/// A person on a team roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub team: TeamId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

// =============================================================================
// SUBMISSIONS & REVIEWS
// =============================================================================

/// Review state of one submission version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Saved by the team, not handed in.
    Draft,
    /// Handed in and waiting for a reviewer.
    Submitted,
    /// Accepted by a reviewer. Frozen.
    Approved,
    /// Sent back by a reviewer with feedback.
    RevisionRequested,
}

impl SubmissionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::RevisionRequested => "revision_requested",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved version of a team's answer to an exercise.
///
/// Every save appends a new row; `version` increases by one per
/// (team, exercise) and the highest version is the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub team: TeamId,
    pub exercise: ExerciseId,
    pub version: u32,
    pub content: String,
    /// Optional reference to an uploaded file (path or URL).
    pub attachment: Option<String>,
    pub status: SubmissionStatus,
    pub saved_at: Timestamp,
}

/// Fields of a submission before the store assigns id and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub team: TeamId,
    pub exercise: ExerciseId,
    pub content: String,
    pub attachment: Option<String>,
    pub status: SubmissionStatus,
    pub saved_at: Timestamp,
}

/// Outcome chosen by a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestRevision,
}

impl ReviewDecision {
    /// Status the reviewed submission moves to.
    #[must_use]
    pub fn resulting_status(&self) -> SubmissionStatus {
        match self {
            ReviewDecision::Approve => SubmissionStatus::Approved,
            ReviewDecision::RequestRevision => SubmissionStatus::RevisionRequested,
        }
    }
}

/// A reviewer's verdict on one submission version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub submission: SubmissionId,
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub feedback: String,
    pub reviewed_at: Timestamp,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the incubator engine.
///
/// - No silent failures
/// - Use `Result<T, IncubatorError>` for fallible operations
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum IncubatorError {
    /// A field failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Phase not found: {0:?}")]
    PhaseNotFound(PhaseId),

    #[error("Exercise not found: {0:?}")]
    ExerciseNotFound(ExerciseId),

    #[error("Team not found: {0:?}")]
    TeamNotFound(TeamId),

    #[error("Submission not found: {0:?}")]
    SubmissionNotFound(SubmissionId),

    /// The gate has not opened this exercise for the team yet.
    #[error("Exercise {0:?} is locked for this team")]
    ExerciseLocked(ExerciseId),

    /// The current version is approved and can no longer change.
    #[error("Exercise {0:?} is already approved")]
    ExerciseAlreadyApproved(ExerciseId),

    /// A newer version exists for the same team and exercise.
    #[error("Submission {submission:?} was superseded by version {current}")]
    SupersededVersion {
        submission: SubmissionId,
        current: u32,
    },

    /// The requested status change is not part of the review workflow.
    #[error("Cannot move submission from {from} to {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    /// Withdrawn or graduated teams cannot save work.
    #[error("Team {0:?} is not active")]
    TeamInactive(TeamId),

    #[error("A team named '{0}' already exists")]
    DuplicateTeam(String),

    #[error("Team {0:?} already has a leader")]
    LeaderExists(TeamId),

    /// Graduation requires every active exercise to be approved.
    #[error("Team {team:?} has completed {percent}% of the program")]
    ProgramIncomplete { team: TeamId, percent: u8 },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
