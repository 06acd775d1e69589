//! # Phase/Exercise Gate
//!
//! Decides which phases and exercises a team may open, from the catalog and
//! the team's current submission versions.
//!
//! ## Rules
//!
//! | Rule | Effect |
//! |------|--------|
//! | First phase | always unlocked |
//! | Phase N+1 | unlocked iff phase N is unlocked and complete |
//! | Complete phase | every active exercise has an approved current version |
//! | Empty phase | complete (never blocks the next one) |
//! | `Sequential` order | exercise k+1 opens once exercise k is approved |
//!
//! The gate is a pure function: the same catalog and submissions always give
//! the same [`AccessMap`].

use crate::catalog::Catalog;
use crate::{ExerciseId, ExerciseOrder, PhaseId, Submission, SubmissionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// EXERCISE STATE
// =============================================================================

/// What a team sees for one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    /// Not reachable yet.
    Locked,
    /// Reachable, nothing saved.
    NotStarted,
    /// Current version is a draft.
    Draft,
    /// Current version is waiting for a reviewer.
    AwaitingReview,
    /// Reviewer asked for changes.
    NeedsRevision,
    /// Current version is approved.
    Approved,
}

impl ExerciseState {
    /// State of a reachable exercise given its current status.
    #[must_use]
    pub fn from_current(status: Option<SubmissionStatus>) -> Self {
        match status {
            None => ExerciseState::NotStarted,
            Some(SubmissionStatus::Draft) => ExerciseState::Draft,
            Some(SubmissionStatus::Submitted) => ExerciseState::AwaitingReview,
            Some(SubmissionStatus::RevisionRequested) => ExerciseState::NeedsRevision,
            Some(SubmissionStatus::Approved) => ExerciseState::Approved,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseState::Locked => "locked",
            ExerciseState::NotStarted => "not_started",
            ExerciseState::Draft => "draft",
            ExerciseState::AwaitingReview => "awaiting_review",
            ExerciseState::NeedsRevision => "needs_revision",
            ExerciseState::Approved => "approved",
        }
    }
}

// =============================================================================
// ACCESS MAP
// =============================================================================

/// Access to one active exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseAccess {
    pub exercise: ExerciseId,
    pub number: u32,
    pub title: String,
    /// Whether the team may save work on it now.
    pub accessible: bool,
    pub state: ExerciseState,
    pub current_version: Option<u32>,
}

/// Access to one phase and its active exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAccess {
    pub phase: PhaseId,
    pub number: u32,
    pub title: String,
    pub unlocked: bool,
    pub complete: bool,
    /// Active exercises only, in order.
    pub exercises: Vec<ExerciseAccess>,
}

/// Result of evaluating the gate for one team.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessMap {
    /// Phases in program order.
    pub phases: Vec<PhaseAccess>,
}

impl AccessMap {
    #[must_use]
    pub fn phase(&self, id: PhaseId) -> Option<&PhaseAccess> {
        self.phases.iter().find(|p| p.phase == id)
    }

    /// Lookup an active exercise.
    #[must_use]
    pub fn exercise(&self, id: ExerciseId) -> Option<&ExerciseAccess> {
        self.phases
            .iter()
            .flat_map(|p| p.exercises.iter())
            .find(|e| e.exercise == id)
    }

    /// False for unknown phases.
    #[must_use]
    pub fn can_access_phase(&self, id: PhaseId) -> bool {
        self.phase(id).is_some_and(|p| p.unlocked)
    }

    /// False for unknown and inactive exercises.
    #[must_use]
    pub fn can_access_exercise(&self, id: ExerciseId) -> bool {
        self.exercise(id).is_some_and(|e| e.accessible)
    }

    #[must_use]
    pub fn exercise_state(&self, id: ExerciseId) -> Option<ExerciseState> {
        self.exercise(id).map(|e| e.state)
    }

    /// First unlocked phase that is not complete.
    ///
    /// `None` once every phase is complete.
    #[must_use]
    pub fn current_phase(&self) -> Option<PhaseId> {
        self.phases
            .iter()
            .find(|p| p.unlocked && !p.complete)
            .map(|p| p.phase)
    }
}

// =============================================================================
// GATE
// =============================================================================

/// Evaluates access for a team.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gate {
    order: ExerciseOrder,
}

impl Gate {
    #[must_use]
    pub fn new(order: ExerciseOrder) -> Self {
        Self { order }
    }

    /// Compute the access map.
    ///
    /// `currents` maps each exercise to the team's current version; entries
    /// for exercises not in the catalog are ignored.
    #[must_use]
    pub fn evaluate(
        &self,
        catalog: &Catalog,
        currents: &BTreeMap<ExerciseId, Submission>,
    ) -> AccessMap {
        let mut phases = Vec::with_capacity(catalog.phases().len());
        let mut previous_open = true;

        for phase in catalog.phases() {
            let unlocked = previous_open;
            let mut exercises = Vec::new();
            let mut complete = true;
            // Sequential order: has every earlier exercise in this phase been approved?
            let mut chain_open = true;

            for exercise in catalog.active_exercises_in(phase.id) {
                let current = currents.get(&exercise.id);
                let status = current.map(|s| s.status);
                let approved = status == Some(SubmissionStatus::Approved);

                let accessible = unlocked
                    && match self.order {
                        ExerciseOrder::Open => true,
                        ExerciseOrder::Sequential => chain_open,
                    };
                let state = if approved {
                    ExerciseState::Approved
                } else if !accessible {
                    ExerciseState::Locked
                } else {
                    ExerciseState::from_current(status)
                };

                complete &= approved;
                chain_open &= approved;

                exercises.push(ExerciseAccess {
                    exercise: exercise.id,
                    number: exercise.number,
                    title: exercise.title.clone(),
                    accessible,
                    state,
                    current_version: current.map(|s| s.version),
                });
            }

            previous_open = unlocked && complete;
            phases.push(PhaseAccess {
                phase: phase.id,
                number: phase.number,
                title: phase.title.clone(),
                unlocked,
                complete,
                exercises,
            });
        }

        AccessMap { phases }
    }
}

// =============================================================================
// TESTS
// =============================================================================
