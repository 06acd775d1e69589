//! # Review Workflow
//!
//! Staff decide on handed-in work. The only legal moves are
//!
//! ```text
//! Submitted --approve--------> Approved
//! Submitted --request_revision-> RevisionRequested
//! ```
//!
//! and only the current version of an exercise can be reviewed.

use crate::catalog::Catalog;
use crate::primitives::{MAX_FEEDBACK_LENGTH, MAX_NAME_LENGTH, limit_text, require_text};
use crate::store::IncubatorStore;
use crate::{
    ExerciseId, IncubatorError, PhaseId, Review, ReviewDecision, Submission, SubmissionId,
    SubmissionStatus, TeamId, TeamStatus, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Check that `from -> to` is a review transition.
pub fn check_transition(
    from: SubmissionStatus,
    to: SubmissionStatus,
) -> Result<(), IncubatorError> {
    match (from, to) {
        (SubmissionStatus::Submitted, SubmissionStatus::Approved)
        | (SubmissionStatus::Submitted, SubmissionStatus::RevisionRequested) => Ok(()),
        _ => Err(IncubatorError::InvalidTransition { from, to }),
    }
}

/// A reviewer's decision on one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub submission: SubmissionId,
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub feedback: String,
}

impl ReviewRequest {
    pub fn validate(&self) -> Result<(), IncubatorError> {
        require_text("reviewer", &self.reviewer, MAX_NAME_LENGTH)?;
        match self.decision {
            ReviewDecision::RequestRevision => {
                require_text("feedback", &self.feedback, MAX_FEEDBACK_LENGTH)
            }
            ReviewDecision::Approve => limit_text("feedback", &self.feedback, MAX_FEEDBACK_LENGTH),
        }
    }
}

/// Apply a review and record it.
///
/// Returns the submission with its new status.
pub fn review<S: IncubatorStore + ?Sized>(
    store: &mut S,
    request: ReviewRequest,
    now: Timestamp,
) -> Result<Submission, IncubatorError> {
    request.validate()?;

    let submission = store
        .submission(request.submission)?
        .ok_or(IncubatorError::SubmissionNotFound(request.submission))?;

    let current = store
        .current(submission.team, submission.exercise)?
        .ok_or(IncubatorError::SubmissionNotFound(request.submission))?;
    if current.id != submission.id {
        return Err(IncubatorError::SupersededVersion {
            submission: submission.id,
            current: current.version,
        });
    }

    let next = request.decision.resulting_status();
    check_transition(submission.status, next)?;

    let team = store
        .team(submission.team)?
        .ok_or(IncubatorError::TeamNotFound(submission.team))?;
    if team.status != TeamStatus::Active {
        return Err(IncubatorError::TeamInactive(team.id));
    }

    let updated = store.set_submission_status(submission.id, next)?;
    store.record_review(Review {
        submission: submission.id,
        reviewer: request.reviewer,
        decision: request.decision,
        feedback: request.feedback,
        reviewed_at: now,
    })?;
    Ok(updated)
}

// =============================================================================
// REVIEW QUEUE
// =============================================================================

/// Work waiting for a reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub submission: SubmissionId,
    pub team: TeamId,
    pub team_name: String,
    pub phase: PhaseId,
    pub exercise: ExerciseId,
    pub exercise_title: String,
    pub version: u32,
    pub saved_at: Timestamp,
}

/// Current `Submitted` versions of active teams on active exercises, oldest
/// first.
pub fn pending<S: IncubatorStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
) -> Result<Vec<QueueEntry>, IncubatorError> {
    let mut queue = Vec::new();
    for team in store.teams()? {
        if team.status != TeamStatus::Active {
            continue;
        }
        for (exercise_id, current) in store.currents(team.id)? {
            if current.status != SubmissionStatus::Submitted {
                continue;
            }
            let Some(exercise) = catalog.exercise(exercise_id).filter(|e| e.active) else {
                continue;
            };
            queue.push(QueueEntry {
                submission: current.id,
                team: team.id,
                team_name: team.name.clone(),
                phase: exercise.phase,
                exercise: exercise.id,
                exercise_title: exercise.title.clone(),
                version: current.version,
                saved_at: current.saved_at,
            });
        }
    }
    queue.sort_by_key(|e| (e.saved_at, e.submission));
    Ok(queue)
}

// =============================================================================
// TESTS
// =============================================================================
