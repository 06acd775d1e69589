//! # Store Abstraction
//!
//! This module defines the `IncubatorStore` trait implemented by the
//! in-memory [`MemoryStore`](crate::MemoryStore) and the disk-backed
//! [`RedbStore`](crate::RedbStore), plus the [`Snapshot`] used to move a
//! whole program between them.
//!
//! Stores only persist rows, assign identifiers and
//! version numbers, and enforce referential integrity. Program rules (who may
//! save, which transitions are legal) live in the engine modules.

use crate::catalog::ProgramDefinition;
use crate::primitives::FIRST_VERSION;
use crate::{
    Exercise, ExerciseId, IncubatorError, Member, MemberRole, NewSubmission, Phase,
    PhaseId, ProgramInfo, Review, Submission, SubmissionId, SubmissionStatus, Team, TeamId,
    TeamStatus, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Persistence operations for the incubation program.
///
/// All fallible operations return `Result<T, IncubatorError>` so in-memory
/// and persistent backends behave the same.
pub trait IncubatorStore {
    /// Program settings, if a program has been loaded.
    fn program(&self) -> Result<Option<ProgramInfo>, IncubatorError>;

    fn set_program(&mut self, info: ProgramInfo) -> Result<(), IncubatorError>;

    /// Insert a phase or update the one with the same `number`.
    fn upsert_phase(
        &mut self,
        number: u32,
        title: &str,
        description: &str,
    ) -> Result<PhaseId, IncubatorError>;

    /// Insert an exercise or update the one with the same `(phase, number)`.
    fn upsert_exercise(
        &mut self,
        phase: PhaseId,
        number: u32,
        title: &str,
        instructions: &str,
        active: bool,
    ) -> Result<ExerciseId, IncubatorError>;

    fn set_exercise_active(&mut self, id: ExerciseId, active: bool)
    -> Result<(), IncubatorError>;

    fn phases(&self) -> Result<Vec<Phase>, IncubatorError>;

    /// Apply a validated program definition.
    ///
    /// Phases and exercises are matched by number so their ids survive a
    /// reload. Active exercises missing from `definition` are deactivated.
    /// The provided method applies the rows one call at a time;
    /// [`RedbStore`](crate::RedbStore) commits them in one write transaction.
    fn apply_program(&mut self, definition: &ProgramDefinition) -> Result<(), IncubatorError> {
        apply_program_rows(self, definition)
    }

    fn exercises(&self) -> Result<Vec<Exercise>, IncubatorError>;

    fn insert_team(&mut self, name: &str, created_at: Timestamp) -> Result<Team, IncubatorError>;

    fn team(&self, id: TeamId) -> Result<Option<Team>, IncubatorError>;

    /// All teams ordered by id.
    fn teams(&self) -> Result<Vec<Team>, IncubatorError>;

    fn set_team_status(&mut self, id: TeamId, status: TeamStatus)
    -> Result<Team, IncubatorError>;

    fn add_member(
        &mut self,
        team: TeamId,
        name: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, IncubatorError>;

    /// Members of a team ordered by id.
    fn members(&self, team: TeamId) -> Result<Vec<Member>, IncubatorError>;

    /// Append a new version for `(team, exercise)`.
    ///
    /// The store assigns the id and `version = last + 1` (or
    /// [`FIRST_VERSION`] for the first save) in one atomic step.
    fn append_submission(&mut self, new: NewSubmission) -> Result<Submission, IncubatorError>;

    fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, IncubatorError>;

    /// Every version for `(team, exercise)`, ascending.
    fn history(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Vec<Submission>, IncubatorError>;

    /// Latest version for `(team, exercise)`.
    fn current(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Option<Submission>, IncubatorError>;

    /// Latest version of every exercise the team has saved.
    fn currents(&self, team: TeamId) -> Result<BTreeMap<ExerciseId, Submission>, IncubatorError>;

    fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Submission, IncubatorError>;

    fn record_review(&mut self, review: Review) -> Result<(), IncubatorError>;

    /// Reviews of one submission in the order they were recorded.
    fn reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, IncubatorError>;

    /// True if the store holds no program, teams or submissions.
    fn is_empty(&self) -> Result<bool, IncubatorError>;

    /// Copy every row into a [`Snapshot`].
    fn snapshot(&self) -> Result<Snapshot, IncubatorError>;

    /// Load a validated snapshot into an empty store.
    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), IncubatorError>;
}

fn apply_program_rows<S: IncubatorStore + ?Sized>(
    store: &mut S,
    definition: &ProgramDefinition,
) -> Result<(), IncubatorError> {
    store.set_program(definition.program.clone())?;

    let mut listed = BTreeSet::new();
    for phase in &definition.phases {
        let phase_id = store.upsert_phase(phase.number, &phase.title, &phase.description)?;
        for exercise in &phase.exercises {
            listed.insert(store.upsert_exercise(
                phase_id,
                exercise.number,
                &exercise.title,
                &exercise.instructions,
                exercise.active,
            )?);
        }
    }

    for exercise in store.exercises()? {
        if exercise.active && !listed.contains(&exercise.id) {
            store.set_exercise_active(exercise.id, false)?;
        }
    }
    Ok(())
}

// =============================================================================
// NEXT ID COUNTERS
// =============================================================================

/// Next identifiers to hand out. Shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextIds {
    pub phase: u64,
    pub exercise: u64,
    pub team: u64,
    pub member: u64,
    pub submission: u64,
}

impl NextIds {
    /// Counters one past the highest id in a snapshot.
    #[must_use]
    pub fn after(snapshot: &Snapshot) -> Self {
        fn next<I: Iterator<Item = u64>>(ids: I) -> u64 {
            ids.max().map(|m| m.saturating_add(1)).unwrap_or(0)
        }
        Self {
            phase: next(snapshot.phases.iter().map(|p| p.id.0)),
            exercise: next(snapshot.exercises.iter().map(|e| e.id.0)),
            team: next(snapshot.teams.iter().map(|t| t.id.0)),
            member: next(snapshot.members.iter().map(|m| m.id.0)),
            submission: next(snapshot.submissions.iter().map(|s| s.id.0)),
        }
    }
}

/// Take the current value of a counter and advance it.
pub(crate) fn bump(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter = counter.saturating_add(1);
    id
}

/// Version that follows `last` (or the first version).
pub(crate) fn next_version(last: Option<u32>) -> u32 {
    last.map(|v| v.saturating_add(1)).unwrap_or(FIRST_VERSION)
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Every row of a program, sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub program: Option<ProgramInfo>,
    pub phases: Vec<Phase>,
    pub exercises: Vec<Exercise>,
    pub teams: Vec<Team>,
    pub members: Vec<Member>,
    pub submissions: Vec<Submission>,
    pub reviews: Vec<Review>,
}

impl Snapshot {
    /// Check referential integrity before a restore.
    ///
    /// - ids are unique per table
    /// - exercises, members, submissions and reviews point at existing rows
    /// - versions per (team, exercise) run 1, 2, 3, ... without gaps
    pub fn validate(&self) -> Result<(), IncubatorError> {
        fn unique<I: Iterator<Item = u64>>(table: &str, ids: I) -> Result<BTreeSet<u64>, IncubatorError> {
            let mut seen = BTreeSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(IncubatorError::SerializationError(format!(
                        "duplicate {} id {}",
                        table, id
                    )));
                }
            }
            Ok(seen)
        }
        fn dangling(what: &str, id: u64) -> IncubatorError {
            IncubatorError::SerializationError(format!("{} references missing row {}", what, id))
        }

        let phases = unique("phase", self.phases.iter().map(|p| p.id.0))?;
        let exercises = unique("exercise", self.exercises.iter().map(|e| e.id.0))?;
        let teams = unique("team", self.teams.iter().map(|t| t.id.0))?;
        unique("member", self.members.iter().map(|m| m.id.0))?;
        let submissions = unique("submission", self.submissions.iter().map(|s| s.id.0))?;

        for exercise in &self.exercises {
            if !phases.contains(&exercise.phase.0) {
                return Err(dangling("exercise", exercise.phase.0));
            }
        }
        for member in &self.members {
            if !teams.contains(&member.team.0) {
                return Err(dangling("member", member.team.0));
            }
        }

        let mut versions: BTreeMap<(TeamId, ExerciseId), Vec<u32>> = BTreeMap::new();
        for submission in &self.submissions {
            if !teams.contains(&submission.team.0) {
                return Err(dangling("submission", submission.team.0));
            }
            if !exercises.contains(&submission.exercise.0) {
                return Err(dangling("submission", submission.exercise.0));
            }
            versions
                .entry((submission.team, submission.exercise))
                .or_default()
                .push(submission.version);
        }
        for ((team, exercise), mut list) in versions {
            list.sort_unstable();
            let contiguous = list
                .iter()
                .enumerate()
                .all(|(i, v)| *v == FIRST_VERSION.saturating_add(i as u32));
            if !contiguous {
                return Err(IncubatorError::SerializationError(format!(
                    "versions for team {} exercise {} are not contiguous",
                    team.0, exercise.0
                )));
            }
        }

        for review in &self.reviews {
            if !submissions.contains(&review.submission.0) {
                return Err(dangling("review", review.submission.0));
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
