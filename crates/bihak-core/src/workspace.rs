//! # Workspace Module
//!
//! High-level operations over one incubation program.
//!
//! ## Storage Backends
//!
//! A workspace runs on one of two storage backends:
//! - `InMemory`: Uses [`MemoryStore`] (fast, volatile unless exported)
//! - `Persistent`: Uses [`RedbStore`] for disk-backed ACID storage
//!
//! Program rules live in [`ledger`](crate::ledger), [`review`](crate::review),
//! [`gate`](crate::gate) and [`progress`](crate::progress); the workspace
//! wires them to the store and adds team roster checks.

use crate::catalog::{Catalog, ProgramDefinition};
use crate::formats::{snapshot_checksum, snapshot_from_bytes, snapshot_to_bytes};
use crate::gate::{AccessMap, Gate};
use crate::ledger::{self, SaveRequest};
use crate::primitives::{MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MAX_TEAM_MEMBERS, require_text};
use crate::progress::ProgramProgress;
use crate::review::{self, QueueEntry, ReviewRequest};
use crate::storage::RedbStore;
use crate::store::IncubatorStore;
use crate::{
    ExerciseId, IncubatorError, Member, MemberRole, MemoryStore, Review, Submission,
    SubmissionId, Team, TeamId, TeamStatus, Timestamp,
};
use std::path::Path;

/// Storage backend for a Workspace.
#[derive(Debug)]
enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// One incubation program and its teams.
///
/// Does NOT implement Clone: a redb handle cannot be duplicated.
#[derive(Debug, Default)]
pub struct Workspace {
    backend: StorageBackend,
}

impl Workspace {
    /// Create an empty in-memory workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, IncubatorError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    fn store(&self) -> &dyn IncubatorStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn IncubatorStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    // =========================================================================
    // CATALOG
    // =========================================================================

    /// Load or reload the program layout.
    ///
    /// Phases and exercises are matched by number, so their ids survive a
    /// reload. Exercises missing from `definition` are deactivated; their
    /// submissions are kept.
    pub fn load_program(
        &mut self,
        definition: &ProgramDefinition,
    ) -> Result<Catalog, IncubatorError> {
        definition.validate()?;
        self.store_mut().apply_program(definition)?;
        self.catalog()
    }

    /// The program as currently stored.
    pub fn catalog(&self) -> Result<Catalog, IncubatorError> {
        let store = self.store();
        Ok(Catalog::from_parts(
            store.program()?.unwrap_or_default(),
            store.phases()?,
            store.exercises()?,
        ))
    }

    fn gate(catalog: &Catalog) -> Gate {
        Gate::new(catalog.program().exercise_order)
    }

    // =========================================================================
    // TEAMS
    // =========================================================================

    /// Register a new active team. Names are unique, ignoring case.
    pub fn register_team(&mut self, name: &str, now: Timestamp) -> Result<Team, IncubatorError> {
        let name = name.trim();
        require_text("team name", name, MAX_NAME_LENGTH)?;

        let wanted = name.to_lowercase();
        if self
            .store()
            .teams()?
            .iter()
            .any(|t| t.name.to_lowercase() == wanted)
        {
            return Err(IncubatorError::DuplicateTeam(name.to_string()));
        }
        self.store_mut().insert_team(name, now)
    }

    pub fn team(&self, id: TeamId) -> Result<Team, IncubatorError> {
        self.store()
            .team(id)?
            .ok_or(IncubatorError::TeamNotFound(id))
    }

    pub fn teams(&self) -> Result<Vec<Team>, IncubatorError> {
        self.store().teams()
    }

    /// Add someone to a team roster.
    ///
    /// A team has at most one leader and [`MAX_TEAM_MEMBERS`] members.
    pub fn add_member(
        &mut self,
        team: TeamId,
        name: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, IncubatorError> {
        let name = name.trim();
        let email = email.trim();
        require_text("member name", name, MAX_NAME_LENGTH)?;
        validate_email(email)?;

        let team = self.team(team)?;
        if team.status != TeamStatus::Active {
            return Err(IncubatorError::TeamInactive(team.id));
        }

        let roster = self.store().members(team.id)?;
        if roster.len() >= MAX_TEAM_MEMBERS {
            return Err(IncubatorError::InvalidInput(format!(
                "team already has {} members",
                MAX_TEAM_MEMBERS
            )));
        }
        if role == MemberRole::Leader && roster.iter().any(|m| m.role == MemberRole::Leader) {
            return Err(IncubatorError::LeaderExists(team.id));
        }
        if roster.iter().any(|m| m.email.eq_ignore_ascii_case(email)) {
            return Err(IncubatorError::InvalidInput(format!(
                "{} is already on this team",
                email
            )));
        }

        self.store_mut().add_member(team.id, name, email, role)
    }

    pub fn members(&self, team: TeamId) -> Result<Vec<Member>, IncubatorError> {
        self.team(team)?;
        self.store().members(team)
    }

    /// Change a team's status.
    ///
    /// Graduation requires a complete program. Graduated is final.
    pub fn set_team_status(
        &mut self,
        team: TeamId,
        status: TeamStatus,
    ) -> Result<Team, IncubatorError> {
        let current = self.team(team)?;
        if current.status == status {
            return Ok(current);
        }
        if current.status == TeamStatus::Graduated {
            return Err(IncubatorError::InvalidInput(
                "graduated teams cannot change status".to_string(),
            ));
        }
        if status == TeamStatus::Graduated {
            self.progress(team)?.ensure_complete()?;
        }
        self.store_mut().set_team_status(team, status)
    }

    // =========================================================================
    // SUBMISSIONS & REVIEWS
    // =========================================================================

    /// Save a new version of a team's answer.
    pub fn save_submission(
        &mut self,
        request: SaveRequest,
        now: Timestamp,
    ) -> Result<Submission, IncubatorError> {
        let catalog = self.catalog()?;
        ledger::save(self.store_mut(), &catalog, request, now)
    }

    /// Approve or send back the current version of an exercise.
    pub fn review_submission(
        &mut self,
        request: ReviewRequest,
        now: Timestamp,
    ) -> Result<Submission, IncubatorError> {
        review::review(self.store_mut(), request, now)
    }

    pub fn submission(&self, id: SubmissionId) -> Result<Submission, IncubatorError> {
        self.store()
            .submission(id)?
            .ok_or(IncubatorError::SubmissionNotFound(id))
    }

    /// Every version of one exercise, oldest first.
    pub fn history(
        &self,
        team: TeamId,
        exercise: ExerciseId,
    ) -> Result<Vec<Submission>, IncubatorError> {
        self.team(team)?;
        if self.catalog()?.exercise(exercise).is_none() {
            return Err(IncubatorError::ExerciseNotFound(exercise));
        }
        self.store().history(team, exercise)
    }

    pub fn reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, IncubatorError> {
        self.submission(submission)?;
        self.store().reviews(submission)
    }

    /// Submissions waiting for a reviewer, oldest first.
    pub fn review_queue(&self) -> Result<Vec<QueueEntry>, IncubatorError> {
        let catalog = self.catalog()?;
        review::pending(self.store(), &catalog)
    }

    // =========================================================================
    // GATE & PROGRESS
    // =========================================================================

    /// Which phases and exercises the team may open.
    pub fn access(&self, team: TeamId) -> Result<AccessMap, IncubatorError> {
        self.team(team)?;
        let catalog = self.catalog()?;
        let currents = self.store().currents(team)?;
        Ok(Self::gate(&catalog).evaluate(&catalog, &currents))
    }

    /// Completion figures, recomputed on every call.
    pub fn progress(&self, team: TeamId) -> Result<ProgramProgress, IncubatorError> {
        let access = self.access(team)?;
        Ok(ProgramProgress::from_access(team, &access))
    }

    // =========================================================================
    // EXPORT / IMPORT
    // =========================================================================

    /// Export every row as snapshot bytes.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, IncubatorError> {
        snapshot_to_bytes(&self.store().snapshot()?)
    }

    /// Deterministic checksum of the current contents.
    pub fn checksum(&self) -> Result<u64, IncubatorError> {
        snapshot_checksum(&self.store().snapshot()?)
    }

    /// BLAKE3 digest of the current contents.
    #[cfg(feature = "crypto-hash")]
    pub fn crypto_hash(&self) -> Result<String, IncubatorError> {
        crate::formats::snapshot_crypto_hash(&self.store().snapshot()?)
    }

    /// Import snapshot bytes into this workspace, which must be empty.
    pub fn import_snapshot(&mut self, bytes: &[u8]) -> Result<(), IncubatorError> {
        let snapshot = snapshot_from_bytes(bytes)?;
        self.store_mut().restore(&snapshot)
    }
}

/// Minimal address shape check: one `@`, non-empty local part, a dot in the
/// domain, no whitespace.
fn validate_email(email: &str) -> Result<(), IncubatorError> {
    require_text("email", email, MAX_EMAIL_LENGTH)?;
    let invalid = || IncubatorError::InvalidInput(format!("invalid email address '{}'", email));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let dot_inside = domain
        .find('.')
        .is_some_and(|i| i > 0 && i + 1 < domain.len());
    if !dot_inside || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
