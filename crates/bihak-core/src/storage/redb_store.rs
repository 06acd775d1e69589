//! # redb-backed Incubator Storage
//!
//! A disk-backed store using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Rows are postcard-encoded. Version numbers are assigned inside the same
//! write transaction that inserts the submission, so two saves can never
//! share a version.

use crate::catalog::ProgramDefinition;
use crate::store::{IncubatorStore, NextIds, Snapshot, bump, next_version};
use crate::{
    Exercise, ExerciseId, IncubatorError, Member, MemberId, MemberRole, NewSubmission, Phase,
    PhaseId, ProgramInfo, Review, Submission, SubmissionId, SubmissionStatus, Team, TeamId,
    TeamStatus, Timestamp,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Table for program settings: "program" -> ProgramInfo bytes
const PROGRAM: TableDefinition<&str, &[u8]> = TableDefinition::new("program");

/// Table for phases: PhaseId -> Phase bytes
const PHASES: TableDefinition<u64, &[u8]> = TableDefinition::new("phases");

/// Table for exercises: ExerciseId -> Exercise bytes
const EXERCISES: TableDefinition<u64, &[u8]> = TableDefinition::new("exercises");

/// Table for teams: TeamId -> Team bytes
const TEAMS: TableDefinition<u64, &[u8]> = TableDefinition::new("teams");

/// Table for members: (TeamId, MemberId) -> Member bytes
const MEMBERS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("members");

/// Table for submissions: SubmissionId -> Submission bytes
const SUBMISSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("submissions");

/// Version index: (TeamId, ExerciseId, version) -> SubmissionId.
/// Range scans give history in ascending version order.
const VERSIONS: TableDefinition<(u64, u64, u32), u64> = TableDefinition::new("versions");

/// Table for reviews: (SubmissionId, sequence) -> Review bytes
const REVIEWS: TableDefinition<(u64, u32), &[u8]> = TableDefinition::new("reviews");

/// Table for id counters: key string -> next value
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const PROGRAM_KEY: &str = "program";

fn io_err(e: impl std::fmt::Display) -> IncubatorError {
    IncubatorError::IoError(e.to_string())
}

fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>, IncubatorError> {
    postcard::to_stdvec(row).map_err(|e| IncubatorError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, IncubatorError> {
    postcard::from_bytes(bytes).map_err(|e| IncubatorError::SerializationError(e.to_string()))
}

/// A disk-backed incubator store using redb.
pub struct RedbStore {
    db: Database,
    /// Next identifiers, mirrored from the metadata table.
    next: NextIds,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IncubatorError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            write_txn.open_table(PROGRAM).map_err(io_err)?;
            write_txn.open_table(PHASES).map_err(io_err)?;
            write_txn.open_table(EXERCISES).map_err(io_err)?;
            write_txn.open_table(TEAMS).map_err(io_err)?;
            write_txn.open_table(MEMBERS).map_err(io_err)?;
            write_txn.open_table(SUBMISSIONS).map_err(io_err)?;
            write_txn.open_table(VERSIONS).map_err(io_err)?;
            write_txn.open_table(REVIEWS).map_err(io_err)?;
            write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let next = {
            let read_txn = db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            let counter = |key: &str| -> Result<u64, IncubatorError> {
                Ok(table.get(key).map_err(io_err)?.map(|v| v.value()).unwrap_or(0))
            };
            NextIds {
                phase: counter("next_phase_id")?,
                exercise: counter("next_exercise_id")?,
                team: counter("next_team_id")?,
                member: counter("next_member_id")?,
                submission: counter("next_submission_id")?,
            }
        };

        Ok(Self { db, next })
    }

    /// Run `f` in a write transaction and commit it.
    ///
    /// `f` works on a copy of the id counters; they are stored in the same
    /// transaction and mirrored in memory only after a successful commit.
    fn write<R>(
        &mut self,
        f: impl FnOnce(&WriteTransaction, &mut NextIds) -> Result<R, IncubatorError>,
    ) -> Result<R, IncubatorError> {
        let mut next = self.next;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let result = f(&write_txn, &mut next)?;
        if next != self.next {
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert("next_phase_id", next.phase).map_err(io_err)?;
            meta.insert("next_exercise_id", next.exercise).map_err(io_err)?;
            meta.insert("next_team_id", next.team).map_err(io_err)?;
            meta.insert("next_member_id", next.member).map_err(io_err)?;
            meta.insert("next_submission_id", next.submission).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        self.next = next;
        Ok(result)
    }

    /// Decode every value of a table keyed by `u64`, in key order.
    fn rows<T: DeserializeOwned>(
        &self,
        def: TableDefinition<u64, &'static [u8]>,
    ) -> Result<Vec<T>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(def).map_err(io_err)?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    /// Decode one row of a table keyed by `u64`.
    fn row<T: DeserializeOwned>(
        &self,
        def: TableDefinition<u64, &'static [u8]>,
        id: u64,
    ) -> Result<Option<T>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(def).map_err(io_err)?;
        match table.get(id).map_err(io_err)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn submission_ids(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Vec<u64>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let versions = read_txn.open_table(VERSIONS).map_err(io_err)?;
        let mut ids = Vec::new();
        for entry in versions
            .range((team.0, exercise.0, 0)..=(team.0, exercise.0, u32::MAX))
            .map_err(io_err)?
        {
            let (_, id) = entry.map_err(io_err)?;
            ids.push(id.value());
        }
        Ok(ids)
    }
}

// =============================================================================
// INCUBATORSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl IncubatorStore for RedbStore {
    fn program(&self) -> Result<Option<ProgramInfo>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PROGRAM).map_err(io_err)?;
        match table.get(PROGRAM_KEY).map_err(io_err)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn set_program(&mut self, info: ProgramInfo) -> Result<(), IncubatorError> {
        let bytes = encode(&info)?;
        self.write(|txn, _| {
            let mut table = txn.open_table(PROGRAM).map_err(io_err)?;
            table
                .insert(PROGRAM_KEY, bytes.as_slice())
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn upsert_phase(
        &mut self,
        number: u32,
        title: &str,
        description: &str,
    ) -> Result<PhaseId, IncubatorError> {
        let existing = self
            .phases()?
            .into_iter()
            .find(|p| p.number == number)
            .map(|p| p.id);

        self.write(|txn, next| {
            let id = existing.unwrap_or_else(|| PhaseId(bump(&mut next.phase)));
            let phase = Phase {
                id,
                number,
                title: title.to_string(),
                description: description.to_string(),
            };
            let bytes = encode(&phase)?;
            let mut table = txn.open_table(PHASES).map_err(io_err)?;
            table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(id)
        })
    }

    fn upsert_exercise(
        &mut self,
        phase: PhaseId,
        number: u32,
        title: &str,
        instructions: &str,
        active: bool,
    ) -> Result<ExerciseId, IncubatorError> {
        if self.row::<Phase>(PHASES, phase.0)?.is_none() {
            return Err(IncubatorError::PhaseNotFound(phase));
        }
        let existing = self
            .exercises()?
            .into_iter()
            .find(|e| e.phase == phase && e.number == number)
            .map(|e| e.id);

        self.write(|txn, next| {
            let id = existing.unwrap_or_else(|| ExerciseId(bump(&mut next.exercise)));
            let exercise = Exercise {
                id,
                phase,
                number,
                title: title.to_string(),
                instructions: instructions.to_string(),
                active,
            };
            let bytes = encode(&exercise)?;
            let mut table = txn.open_table(EXERCISES).map_err(io_err)?;
            table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(id)
        })
    }

    fn set_exercise_active(
        &mut self,
        id: ExerciseId,
        active: bool,
    ) -> Result<(), IncubatorError> {
        let mut exercise: Exercise = self
            .row(EXERCISES, id.0)?
            .ok_or(IncubatorError::ExerciseNotFound(id))?;
        exercise.active = active;
        let bytes = encode(&exercise)?;
        self.write(|txn, _| {
            let mut table = txn.open_table(EXERCISES).map_err(io_err)?;
            table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(())
        })
    }

    fn phases(&self) -> Result<Vec<Phase>, IncubatorError> {
        self.rows(PHASES)
    }

    fn apply_program(&mut self, definition: &ProgramDefinition) -> Result<(), IncubatorError> {
        // One transaction: an I/O error leaves the previous catalog in place.
        self.write(|txn, next| {
            {
                let mut table = txn.open_table(PROGRAM).map_err(io_err)?;
                table
                    .insert(PROGRAM_KEY, encode(&definition.program)?.as_slice())
                    .map_err(io_err)?;
            }
            let mut phases = txn.open_table(PHASES).map_err(io_err)?;
            let mut exercises = txn.open_table(EXERCISES).map_err(io_err)?;

            let mut phase_ids: BTreeMap<u32, PhaseId> = BTreeMap::new();
            for entry in phases.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let phase: Phase = decode(value.value())?;
                phase_ids.insert(phase.number, phase.id);
            }
            let mut existing: BTreeMap<(PhaseId, u32), Exercise> = BTreeMap::new();
            for entry in exercises.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let exercise: Exercise = decode(value.value())?;
                existing.insert((exercise.phase, exercise.number), exercise);
            }

            for phase_def in &definition.phases {
                let id = match phase_ids.get(&phase_def.number) {
                    Some(id) => *id,
                    None => PhaseId(bump(&mut next.phase)),
                };
                let phase = Phase {
                    id,
                    number: phase_def.number,
                    title: phase_def.title.clone(),
                    description: phase_def.description.clone(),
                };
                phases
                    .insert(id.0, encode(&phase)?.as_slice())
                    .map_err(io_err)?;

                for exercise_def in &phase_def.exercises {
                    let exercise_id = match existing.remove(&(id, exercise_def.number)) {
                        Some(old) => old.id,
                        None => ExerciseId(bump(&mut next.exercise)),
                    };
                    let exercise = Exercise {
                        id: exercise_id,
                        phase: id,
                        number: exercise_def.number,
                        title: exercise_def.title.clone(),
                        instructions: exercise_def.instructions.clone(),
                        active: exercise_def.active,
                    };
                    exercises
                        .insert(exercise_id.0, encode(&exercise)?.as_slice())
                        .map_err(io_err)?;
                }
            }

            // Whatever is left in `existing` was not listed.
            for mut exercise in existing.into_values() {
                if exercise.active {
                    exercise.active = false;
                    exercises
                        .insert(exercise.id.0, encode(&exercise)?.as_slice())
                        .map_err(io_err)?;
                }
            }
            Ok(())
        })
    }

    fn exercises(&self) -> Result<Vec<Exercise>, IncubatorError> {
        self.rows(EXERCISES)
    }

    fn insert_team(&mut self, name: &str, created_at: Timestamp) -> Result<Team, IncubatorError> {
        self.write(|txn, next| {
            let team = Team {
                id: TeamId(bump(&mut next.team)),
                name: name.to_string(),
                status: TeamStatus::Active,
                created_at,
            };
            let bytes = encode(&team)?;
            let mut table = txn.open_table(TEAMS).map_err(io_err)?;
            table.insert(team.id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(team)
        })
    }

    fn team(&self, id: TeamId) -> Result<Option<Team>, IncubatorError> {
        self.row(TEAMS, id.0)
    }

    fn teams(&self) -> Result<Vec<Team>, IncubatorError> {
        self.rows(TEAMS)
    }

    fn set_team_status(
        &mut self,
        id: TeamId,
        status: TeamStatus,
    ) -> Result<Team, IncubatorError> {
        let mut team: Team = self.row(TEAMS, id.0)?.ok_or(IncubatorError::TeamNotFound(id))?;
        team.status = status;
        let bytes = encode(&team)?;
        self.write(|txn, _| {
            let mut table = txn.open_table(TEAMS).map_err(io_err)?;
            table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(())
        })?;
        Ok(team)
    }

    fn add_member(
        &mut self,
        team: TeamId,
        name: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, IncubatorError> {
        if self.team(team)?.is_none() {
            return Err(IncubatorError::TeamNotFound(team));
        }
        self.write(|txn, next| {
            let member = Member {
                id: MemberId(bump(&mut next.member)),
                team,
                name: name.to_string(),
                email: email.to_string(),
                role,
            };
            let bytes = encode(&member)?;
            let mut table = txn.open_table(MEMBERS).map_err(io_err)?;
            table
                .insert((team.0, member.id.0), bytes.as_slice())
                .map_err(io_err)?;
            Ok(member)
        })
    }

    fn members(&self, team: TeamId) -> Result<Vec<Member>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(MEMBERS).map_err(io_err)?;
        let mut members = Vec::new();
        for entry in table
            .range((team.0, 0)..=(team.0, u64::MAX))
            .map_err(io_err)?
        {
            let (_, value) = entry.map_err(io_err)?;
            members.push(decode(value.value())?);
        }
        Ok(members)
    }

    fn append_submission(&mut self, new: NewSubmission) -> Result<Submission, IncubatorError> {
        if self.team(new.team)?.is_none() {
            return Err(IncubatorError::TeamNotFound(new.team));
        }
        if self.row::<Exercise>(EXERCISES, new.exercise.0)?.is_none() {
            return Err(IncubatorError::ExerciseNotFound(new.exercise));
        }

        self.write(|txn, next| {
            let mut versions = txn.open_table(VERSIONS).map_err(io_err)?;

            // Read the last version inside the write transaction.
            let last = versions
                .range((new.team.0, new.exercise.0, 0)..=(new.team.0, new.exercise.0, u32::MAX))
                .map_err(io_err)?
                .next_back()
                .transpose()
                .map_err(io_err)?
                .map(|(key, _)| key.value().2);

            let submission = Submission {
                id: SubmissionId(bump(&mut next.submission)),
                team: new.team,
                exercise: new.exercise,
                version: next_version(last),
                content: new.content,
                attachment: new.attachment,
                status: new.status,
                saved_at: new.saved_at,
            };
            let bytes = encode(&submission)?;

            versions
                .insert(
                    (submission.team.0, submission.exercise.0, submission.version),
                    submission.id.0,
                )
                .map_err(io_err)?;
            let mut rows = txn.open_table(SUBMISSIONS).map_err(io_err)?;
            rows.insert(submission.id.0, bytes.as_slice())
                .map_err(io_err)?;
            Ok(submission)
        })
    }

    fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, IncubatorError> {
        self.row(SUBMISSIONS, id.0)
    }

    fn history(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Vec<Submission>, IncubatorError> {
        let mut history = Vec::new();
        for id in self.submission_ids(team, exercise)? {
            if let Some(submission) = self.row(SUBMISSIONS, id)? {
                history.push(submission);
            }
        }
        Ok(history)
    }

    fn current(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Option<Submission>, IncubatorError> {
        match self.submission_ids(team, exercise)?.last() {
            Some(id) => self.row(SUBMISSIONS, *id),
            None => Ok(None),
        }
    }

    fn currents(&self, team: TeamId) -> Result<BTreeMap<ExerciseId, Submission>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let versions = read_txn.open_table(VERSIONS).map_err(io_err)?;
        let rows = read_txn.open_table(SUBMISSIONS).map_err(io_err)?;

        // Ascending by version, so later ids overwrite earlier ones.
        let mut latest_ids: BTreeMap<ExerciseId, u64> = BTreeMap::new();
        for entry in versions
            .range((team.0, 0, 0)..=(team.0, u64::MAX, u32::MAX))
            .map_err(io_err)?
        {
            let (key, id) = entry.map_err(io_err)?;
            let (_, exercise, _) = key.value();
            latest_ids.insert(ExerciseId(exercise), id.value());
        }

        let mut latest = BTreeMap::new();
        for (exercise, id) in latest_ids {
            if let Some(value) = rows.get(id).map_err(io_err)? {
                latest.insert(exercise, decode(value.value())?);
            }
        }
        Ok(latest)
    }

    fn set_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Submission, IncubatorError> {
        let mut submission: Submission = self
            .row(SUBMISSIONS, id.0)?
            .ok_or(IncubatorError::SubmissionNotFound(id))?;
        submission.status = status;
        let bytes = encode(&submission)?;
        self.write(|txn, _| {
            let mut table = txn.open_table(SUBMISSIONS).map_err(io_err)?;
            table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
            Ok(())
        })?;
        Ok(submission)
    }

    fn record_review(&mut self, review: Review) -> Result<(), IncubatorError> {
        if self.submission(review.submission)?.is_none() {
            return Err(IncubatorError::SubmissionNotFound(review.submission));
        }
        let bytes = encode(&review)?;
        let submission = review.submission.0;
        self.write(|txn, _| {
            let mut table = txn.open_table(REVIEWS).map_err(io_err)?;
            let seq = table
                .range((submission, 0)..=(submission, u32::MAX))
                .map_err(io_err)?
                .next_back()
                .transpose()
                .map_err(io_err)?
                .map(|(key, _)| key.value().1.saturating_add(1))
                .unwrap_or(0);
            table
                .insert((submission, seq), bytes.as_slice())
                .map_err(io_err)?;
            Ok(())
        })
    }

    fn reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(REVIEWS).map_err(io_err)?;
        let mut reviews = Vec::new();
        for entry in table
            .range((submission.0, 0)..=(submission.0, u32::MAX))
            .map_err(io_err)?
        {
            let (_, value) = entry.map_err(io_err)?;
            reviews.push(decode(value.value())?);
        }
        Ok(reviews)
    }

    fn is_empty(&self) -> Result<bool, IncubatorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let program = read_txn.open_table(PROGRAM).map_err(io_err)?;
        let phases = read_txn.open_table(PHASES).map_err(io_err)?;
        let teams = read_txn.open_table(TEAMS).map_err(io_err)?;
        let submissions = read_txn.open_table(SUBMISSIONS).map_err(io_err)?;
        Ok(program.len().map_err(io_err)? == 0
            && phases.len().map_err(io_err)? == 0
            && teams.len().map_err(io_err)? == 0
            && submissions.len().map_err(io_err)? == 0)
    }

    fn snapshot(&self) -> Result<Snapshot, IncubatorError> {
        let members = {
            let read_txn = self.db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(MEMBERS).map_err(io_err)?;
            let mut members: Vec<Member> = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                members.push(decode(value.value())?);
            }
            members.sort_by_key(|m| m.id);
            members
        };
        let reviews = {
            let read_txn = self.db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(REVIEWS).map_err(io_err)?;
            let mut reviews = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                reviews.push(decode(value.value())?);
            }
            reviews
        };

        Ok(Snapshot {
            program: self.program()?,
            phases: self.phases()?,
            exercises: self.exercises()?,
            teams: self.teams()?,
            members,
            submissions: self.rows(SUBMISSIONS)?,
            reviews,
        })
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), IncubatorError> {
        if !self.is_empty()? {
            return Err(IncubatorError::InvalidInput(
                "restore requires an empty store".to_string(),
            ));
        }
        snapshot.validate()?;

        // Everything lands in one transaction: a failed restore leaves the
        // database empty.
        self.write(|txn, next| {
            if let Some(program) = &snapshot.program {
                let mut table = txn.open_table(PROGRAM).map_err(io_err)?;
                table
                    .insert(PROGRAM_KEY, encode(program)?.as_slice())
                    .map_err(io_err)?;
            }
            {
                let mut table = txn.open_table(PHASES).map_err(io_err)?;
                for phase in &snapshot.phases {
                    table
                        .insert(phase.id.0, encode(phase)?.as_slice())
                        .map_err(io_err)?;
                }
            }
            {
                let mut table = txn.open_table(EXERCISES).map_err(io_err)?;
                for exercise in &snapshot.exercises {
                    table
                        .insert(exercise.id.0, encode(exercise)?.as_slice())
                        .map_err(io_err)?;
                }
            }
            {
                let mut table = txn.open_table(TEAMS).map_err(io_err)?;
                for team in &snapshot.teams {
                    table
                        .insert(team.id.0, encode(team)?.as_slice())
                        .map_err(io_err)?;
                }
            }
            {
                let mut table = txn.open_table(MEMBERS).map_err(io_err)?;
                for member in &snapshot.members {
                    table
                        .insert((member.team.0, member.id.0), encode(member)?.as_slice())
                        .map_err(io_err)?;
                }
            }
            {
                let mut rows = txn.open_table(SUBMISSIONS).map_err(io_err)?;
                let mut versions = txn.open_table(VERSIONS).map_err(io_err)?;
                for submission in &snapshot.submissions {
                    rows.insert(submission.id.0, encode(submission)?.as_slice())
                        .map_err(io_err)?;
                    versions
                        .insert(
                            (submission.team.0, submission.exercise.0, submission.version),
                            submission.id.0,
                        )
                        .map_err(io_err)?;
                }
            }
            {
                let mut table = txn.open_table(REVIEWS).map_err(io_err)?;
                let mut seq: BTreeMap<u64, u32> = BTreeMap::new();
                for review in &snapshot.reviews {
                    let n = seq.entry(review.submission.0).or_insert(0);
                    table
                        .insert((review.submission.0, *n), encode(review)?.as_slice())
                        .map_err(io_err)?;
                    *n = n.saturating_add(1);
                }
            }
            *next = NextIds::after(snapshot);
            Ok(())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
