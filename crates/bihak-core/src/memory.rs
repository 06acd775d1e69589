//! # In-Memory Store
//!
//! The deterministic in-memory backend for the incubator engine.
//!
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::store::{IncubatorStore, NextIds, Snapshot, bump, next_version};
use crate::{
    Exercise, ExerciseId, IncubatorError, Member, MemberId, MemberRole, NewSubmission, Phase,
    PhaseId, ProgramInfo, Review, Submission, SubmissionId, SubmissionStatus, Team, TeamId,
    TeamStatus, Timestamp,
};
use std::collections::BTreeMap;

/// In-memory incubator store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    program: Option<ProgramInfo>,
    phases: BTreeMap<PhaseId, Phase>,
    exercises: BTreeMap<ExerciseId, Exercise>,
    teams: BTreeMap<TeamId, Team>,
    members: BTreeMap<(TeamId, MemberId), Member>,
    submissions: BTreeMap<SubmissionId, Submission>,
    /// (team, exercise, version) -> submission
    versions: BTreeMap<(TeamId, ExerciseId, u32), SubmissionId>,
    reviews: BTreeMap<SubmissionId, Vec<Review>>,
    next: NextIds,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn version_range(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> impl DoubleEndedIterator<Item = (&(TeamId, ExerciseId, u32), &SubmissionId)> {
        self.versions
            .range((team, exercise, 0)..=(team, exercise, u32::MAX))
    }
}

impl IncubatorStore for MemoryStore {
    fn program(&self) -> Result<Option<ProgramInfo>, IncubatorError> {
        Ok(self.program.clone())
    }

    fn set_program(&mut self, info: ProgramInfo) -> Result<(), IncubatorError> {
        self.program = Some(info);
        Ok(())
    }

    fn upsert_phase(
        &mut self,
        number: u32,
        title: &str,
        description: &str,
    ) -> Result<PhaseId, IncubatorError> {
        if let Some(phase) = self.phases.values_mut().find(|p| p.number == number) {
            phase.title = title.to_string();
            phase.description = description.to_string();
            return Ok(phase.id);
        }

        let id = PhaseId(bump(&mut self.next.phase));
        self.phases.insert(
            id,
            Phase {
                id,
                number,
                title: title.to_string(),
                description: description.to_string(),
            },
        );
        Ok(id)
    }

    fn upsert_exercise(
        &mut self,
        phase: PhaseId,
        number: u32,
        title: &str,
        instructions: &str,
        active: bool,
    ) -> Result<ExerciseId, IncubatorError> {
        if !self.phases.contains_key(&phase) {
            return Err(IncubatorError::PhaseNotFound(phase));
        }

        if let Some(exercise) = self
            .exercises
            .values_mut()
            .find(|e| e.phase == phase && e.number == number)
        {
            exercise.title = title.to_string();
            exercise.instructions = instructions.to_string();
            exercise.active = active;
            return Ok(exercise.id);
        }

        let id = ExerciseId(bump(&mut self.next.exercise));
        self.exercises.insert(
            id,
            Exercise {
                id,
                phase,
                number,
                title: title.to_string(),
                instructions: instructions.to_string(),
                active,
            },
        );
        Ok(id)
    }

    fn set_exercise_active(
        &mut self,
        id: ExerciseId,
        active: bool,
    ) -> Result<(), IncubatorError> {
        let exercise = self
            .exercises
            .get_mut(&id)
            .ok_or(IncubatorError::ExerciseNotFound(id))?;
        exercise.active = active;
        Ok(())
    }

    fn phases(&self) -> Result<Vec<Phase>, IncubatorError> {
        Ok(self.phases.values().cloned().collect())
    }

    fn exercises(&self) -> Result<Vec<Exercise>, IncubatorError> {
        Ok(self.exercises.values().cloned().collect())
    }

    fn insert_team(&mut self, name: &str, created_at: Timestamp) -> Result<Team, IncubatorError> {
        let team = Team {
            id: TeamId(bump(&mut self.next.team)),
            name: name.to_string(),
            status: TeamStatus::Active,
            created_at,
        };
        self.teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>, IncubatorError> {
        Ok(self.teams.get(&id).cloned())
    }

    fn teams(&self) -> Result<Vec<Team>, IncubatorError> {
        Ok(self.teams.values().cloned().collect())
    }

    fn set_team_status(
        &mut self,
        id: TeamId,
        status: TeamStatus,
    ) -> Result<Team, IncubatorError> {
        let team = self
            .teams
            .get_mut(&id)
            .ok_or(IncubatorError::TeamNotFound(id))?;
        team.status = status;
        Ok(team.clone())
    }

    fn add_member(
        &mut self,
        team: TeamId,
        name: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, IncubatorError> {
        if !self.teams.contains_key(&team) {
            return Err(IncubatorError::TeamNotFound(team));
        }
        let member = Member {
            id: MemberId(bump(&mut self.next.member)),
            team,
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        self.members.insert((team, member.id), member.clone());
        Ok(member)
    }

    fn members(&self, team: TeamId) -> Result<Vec<Member>, IncubatorError> {
        Ok(self
            .members
            .range((team, MemberId(0))..=(team, MemberId(u64::MAX)))
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn append_submission(&mut self, new: NewSubmission) -> Result<Submission, IncubatorError> {
        if !self.teams.contains_key(&new.team) {
            return Err(IncubatorError::TeamNotFound(new.team));
        }
        if !self.exercises.contains_key(&new.exercise) {
            return Err(IncubatorError::ExerciseNotFound(new.exercise));
        }

        let last = self
            .version_range(new.team, new.exercise)
            .next_back()
            .map(|((_, _, v), _)| *v);

        let submission = Submission {
            id: SubmissionId(bump(&mut self.next.submission)),
            team: new.team,
            exercise: new.exercise,
            version: next_version(last),
            content: new.content,
            attachment: new.attachment,
            status: new.status,
            saved_at: new.saved_at,
        };

        self.versions.insert(
            (submission.team, submission.exercise, submission.version),
            submission.id,
        );
        self.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, IncubatorError> {
        Ok(self.submissions.get(&id).cloned())
    }

    fn history(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Vec<Submission>, IncubatorError> {
        Ok(self
            .version_range(team, exercise)
            .filter_map(|(_, id)| self.submissions.get(id).cloned())
            .collect())
    }

    fn current(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Option<Submission>, IncubatorError> {
        Ok(self
            .version_range(team, exercise)
            .next_back()
            .and_then(|(_, id)| self.submissions.get(id).cloned()))
    }

    fn currents(&self, team: TeamId) -> Result<BTreeMap<ExerciseId, Submission>, IncubatorError> {
        let mut latest = BTreeMap::new();
        // Ascending by version, so later inserts overwrite earlier ones.
        for ((_, exercise, _), id) in self
            .versions
            .range((team, ExerciseId(0), 0)..=(team, ExerciseId(u64::MAX), u32::MAX))
        {
            if let Some(submission) = self.submissions.get(id) {
                latest.insert(*exercise, submission.clone());
            }
        }
        Ok(latest)
    }

    fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Submission, IncubatorError> {
        let submission = self
            .submissions
            .get_mut(&id)
            .ok_or(IncubatorError::SubmissionNotFound(id))?;
        submission.status = status;
        Ok(submission.clone())
    }

    fn record_review(&mut self, review: Review) -> Result<(), IncubatorError> {
        if !self.submissions.contains_key(&review.submission) {
            return Err(IncubatorError::SubmissionNotFound(review.submission));
        }
        self.reviews.entry(review.submission).or_default().push(review);
        Ok(())
    }

    fn reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, IncubatorError> {
        Ok(self.reviews.get(&submission).cloned().unwrap_or_default())
    }

    fn is_empty(&self) -> Result<bool, IncubatorError> {
        Ok(self.program.is_none()
            && self.phases.is_empty()
            && self.teams.is_empty()
            && self.submissions.is_empty())
    }

    fn snapshot(&self) -> Result<Snapshot, IncubatorError> {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by_key(|m| m.id);
        Ok(Snapshot {
            program: self.program.clone(),
            phases: self.phases.values().cloned().collect(),
            exercises: self.exercises.values().cloned().collect(),
            teams: self.teams.values().cloned().collect(),
            members,
            submissions: self.submissions.values().cloned().collect(),
            reviews: self.reviews.values().flatten().cloned().collect(),
        })
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), IncubatorError> {
        if !self.is_empty()? {
            return Err(IncubatorError::InvalidInput(
                "restore requires an empty store".to_string(),
            ));
        }
        snapshot.validate()?;

        let mut restored = MemoryStore {
            program: snapshot.program.clone(),
            next: NextIds::after(snapshot),
            ..MemoryStore::default()
        };
        for phase in &snapshot.phases {
            restored.phases.insert(phase.id, phase.clone());
        }
        for exercise in &snapshot.exercises {
            restored.exercises.insert(exercise.id, exercise.clone());
        }
        for team in &snapshot.teams {
            restored.teams.insert(team.id, team.clone());
        }
        for member in &snapshot.members {
            restored.members.insert((member.team, member.id), member.clone());
        }
        for submission in &snapshot.submissions {
            restored.versions.insert(
                (submission.team, submission.exercise, submission.version),
                submission.id,
            );
            restored.submissions.insert(submission.id, submission.clone());
        }
        for review in &snapshot.reviews {
            restored
                .reviews
                .entry(review.submission)
                .or_default()
                .push(review.clone());
        }

        *self = restored;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
