//! # Submission Ledger
//!
//! Every save appends a new version for `(team, exercise)`. Nothing is
//! overwritten: earlier versions stay readable as history and only the
//! highest version is current.
//!
//! A save is refused when:
//! - the team is withdrawn or graduated
//! - the exercise is inactive or not yet unlocked for the team
//! - the current version is approved (approved work is frozen)

use crate::catalog::Catalog;
use crate::gate::Gate;
use crate::primitives::{MAX_ATTACHMENT_LENGTH, MAX_CONTENT_LENGTH, limit_text, require_text};
use crate::store::IncubatorStore;
use crate::{
    ExerciseId, IncubatorError, NewSubmission, Submission, SubmissionStatus, TeamId, TeamStatus,
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// Whether a save hands the work in for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Keep working; not visible to reviewers.
    #[default]
    Draft,
    /// Hand in for review.
    Submit,
}

impl SaveMode {
    /// Status of the version this save creates.
    #[must_use]
    pub fn status(&self) -> SubmissionStatus {
        match self {
            SaveMode::Draft => SubmissionStatus::Draft,
            SaveMode::Submit => SubmissionStatus::Submitted,
        }
    }
}

/// A team's save of one exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub team: TeamId,
    pub exercise: ExerciseId,
    pub content: String,
    pub attachment: Option<String>,
    pub mode: SaveMode,
}

impl SaveRequest {
    /// Field checks that need no store access.
    pub fn validate(&self) -> Result<(), IncubatorError> {
        match self.mode {
            SaveMode::Submit => require_text("content", &self.content, MAX_CONTENT_LENGTH)?,
            SaveMode::Draft => limit_text("content", &self.content, MAX_CONTENT_LENGTH)?,
        }
        if let Some(attachment) = &self.attachment {
            require_text("attachment", attachment, MAX_ATTACHMENT_LENGTH)?;
        }
        Ok(())
    }
}

/// Append a new version.
///
/// Checks run in a fixed order so callers always see the same error for the
/// same state: field limits, unknown team or exercise, inactive team,
/// approved current version, gate.
pub fn save<S: IncubatorStore + ?Sized>(
    store: &mut S,
    catalog: &Catalog,
    request: SaveRequest,
    now: Timestamp,
) -> Result<Submission, IncubatorError> {
    request.validate()?;

    let team = store
        .team(request.team)?
        .ok_or(IncubatorError::TeamNotFound(request.team))?;
    if catalog.exercise(request.exercise).is_none() {
        return Err(IncubatorError::ExerciseNotFound(request.exercise));
    }
    if team.status != TeamStatus::Active {
        return Err(IncubatorError::TeamInactive(team.id));
    }

    let currents = store.currents(team.id)?;
    if currents
        .get(&request.exercise)
        .is_some_and(|s| s.status == SubmissionStatus::Approved)
    {
        return Err(IncubatorError::ExerciseAlreadyApproved(request.exercise));
    }

    let access = Gate::new(catalog.program().exercise_order).evaluate(catalog, &currents);
    if !access.can_access_exercise(request.exercise) {
        return Err(IncubatorError::ExerciseLocked(request.exercise));
    }

    store.append_submission(NewSubmission {
        team: team.id,
        exercise: request.exercise,
        status: request.mode.status(),
        content: request.content,
        attachment: request.attachment,
        saved_at: now,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, ProgramInfo};

    struct Fixture {
        store: MemoryStore,
        catalog: Catalog,
        team: TeamId,
        first: ExerciseId,
        second: ExerciseId,
        later: ExerciseId,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        let p1 = store.upsert_phase(1, "Ideation", "").expect("phase");
        let p2 = store.upsert_phase(2, "Validation", "").expect("phase");
        let first = store.upsert_exercise(p1, 1, "Problem", "", true).expect("ex");
        let second = store.upsert_exercise(p1, 2, "Solution", "", true).expect("ex");
        let later = store.upsert_exercise(p2, 1, "Interviews", "", true).expect("ex");
        let team = store.insert_team("Umurava", Timestamp(1)).expect("team").id;
        let catalog = Catalog::from_parts(
            ProgramInfo::default(),
            store.phases().expect("phases"),
            store.exercises().expect("exercises"),
        );
        Fixture {
            store,
            catalog,
            team,
            first,
            second,
            later,
        }
    }

    fn save_as(
        f: &mut Fixture,
        exercise: ExerciseId,
        content: &str,
        mode: SaveMode,
    ) -> Result<Submission, IncubatorError> {
        let request = SaveRequest {
            team: f.team,
            exercise,
            content: content.to_string(),
            attachment: None,
            mode,
        };
        save(&mut f.store, &f.catalog, request, Timestamp(2))
    }

    fn approve_current(f: &mut Fixture, exercise: ExerciseId) {
        let current = f
            .store
            .current(f.team, exercise)
            .expect("current")
            .expect("some");
        f.store
            .set_submission_status(current.id, SubmissionStatus::Approved)
            .expect("approve");
    }

    #[test]
    fn each_save_is_a_new_version() {
        let mut f = fixture();
        let first = f.first;
        let a = save_as(&mut f, first, "a", SaveMode::Draft).expect("save");
        let b = save_as(&mut f, first, "b", SaveMode::Submit).expect("save");
        assert_eq!((a.version, b.version), (1, 2));
        assert_eq!(a.status, SubmissionStatus::Draft);
        assert_eq!(b.status, SubmissionStatus::Submitted);
        assert_eq!(f.store.history(f.team, first).expect("history").len(), 2);
    }

    #[test]
    fn empty_draft_allowed_but_empty_submit_rejected() {
        let mut f = fixture();
        let first = f.first;
        assert!(save_as(&mut f, first, "", SaveMode::Draft).is_ok());
        let err = save_as(&mut f, first, "  ", SaveMode::Submit);
        assert!(matches!(err, Err(IncubatorError::InvalidInput(_))));
    }

    #[test]
    fn locked_phase_rejected() {
        let mut f = fixture();
        let later = f.later;
        let err = save_as(&mut f, later, "x", SaveMode::Draft);
        assert!(matches!(err, Err(IncubatorError::ExerciseLocked(id)) if id == later));
    }

    #[test]
    fn next_phase_opens_after_approvals() {
        let mut f = fixture();
        for exercise in [f.first, f.second] {
            save_as(&mut f, exercise, "x", SaveMode::Submit).expect("save");
            approve_current(&mut f, exercise);
        }
        let later = f.later;
        let saved = save_as(&mut f, later, "x", SaveMode::Draft).expect("unlocked");
        assert_eq!(saved.version, 1);
    }

    #[test]
    fn approved_work_is_frozen() {
        let mut f = fixture();
        let first = f.first;
        save_as(&mut f, first, "x", SaveMode::Submit).expect("save");
        approve_current(&mut f, first);
        let err = save_as(&mut f, first, "y", SaveMode::Draft);
        assert!(matches!(err, Err(IncubatorError::ExerciseAlreadyApproved(_))));
    }

    #[test]
    fn withdrawn_team_cannot_save() {
        let mut f = fixture();
        f.store
            .set_team_status(f.team, TeamStatus::Withdrawn)
            .expect("status");
        let first = f.first;
        let err = save_as(&mut f, first, "x", SaveMode::Draft);
        assert!(matches!(err, Err(IncubatorError::TeamInactive(_))));
    }

    #[test]
    fn inactive_exercise_is_locked() {
        let mut f = fixture();
        f.store.set_exercise_active(f.second, false).expect("deactivate");
        f.catalog = Catalog::from_parts(
            ProgramInfo::default(),
            f.store.phases().expect("phases"),
            f.store.exercises().expect("exercises"),
        );
        let second = f.second;
        let err = save_as(&mut f, second, "x", SaveMode::Draft);
        assert!(matches!(err, Err(IncubatorError::ExerciseLocked(_))));
    }

    #[test]
    fn unknown_exercise_rejected() {
        let mut f = fixture();
        let err = save_as(&mut f, ExerciseId(99), "x", SaveMode::Draft);
        assert!(matches!(err, Err(IncubatorError::ExerciseNotFound(_))));
    }

    #[test]
    fn blank_attachment_rejected() {
        let request = SaveRequest {
            team: TeamId(0),
            exercise: ExerciseId(0),
            content: "x".to_string(),
            attachment: Some(String::new()),
            mode: SaveMode::Draft,
        };
        assert!(request.validate().is_err());
    }
}
