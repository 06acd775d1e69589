//! # CLI Command Implementations

use crate::{api, config};
use bihak_core::{
    AccessMap, ExerciseId, IncubatorError, MemberRole, ProgramProgress, ReviewDecision,
    ReviewRequest, SaveMode, SaveRequest, SubmissionId, TeamId, TeamStatus, Workspace,
    formats::MAX_SNAPSHOT_SIZE,
    primitives::MAX_CONTENT_LENGTH,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), IncubatorError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IncubatorError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(IncubatorError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, IncubatorError> {
    let canonical = path.canonicalize().map_err(|e| {
        IncubatorError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(IncubatorError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path.
fn validate_output_path(path: &Path) -> Result<PathBuf, IncubatorError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        IncubatorError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(IncubatorError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| IncubatorError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a file after path and size checks.
fn read_checked(path: &Path, max_size: u64) -> Result<Vec<u8>, IncubatorError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| IncubatorError::IoError(format!("Read file: {}", e)))
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// DATABASE HANDLE
// =============================================================================

/// Storage backend selected with `-B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// redb database, written on every change.
    Redb,
    /// Snapshot file, loaded into memory and written back after each command.
    File,
}

impl Backend {
    pub fn parse(name: &str) -> Result<Self, IncubatorError> {
        match name {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(IncubatorError::InvalidInput(format!(
                "Unknown backend '{}'. Use: redb, file",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
        }
    }
}

/// A database path plus its backend.
#[derive(Debug, Clone)]
pub struct Database {
    pub path: PathBuf,
    pub backend: Backend,
}

impl Database {
    pub fn new(path: PathBuf, backend: &str) -> Result<Self, IncubatorError> {
        Ok(Self {
            path,
            backend: Backend::parse(backend)?,
        })
    }

    /// Open the workspace, creating an empty one if nothing exists yet.
    pub fn open(&self) -> Result<Workspace, IncubatorError> {
        match self.backend {
            Backend::Redb => Workspace::with_redb(&self.path),
            Backend::File => {
                let mut workspace = Workspace::new();
                if self.path.exists() {
                    let data = read_checked(&self.path, MAX_SNAPSHOT_SIZE as u64)?;
                    workspace.import_snapshot(&data)?;
                }
                Ok(workspace)
            }
        }
    }

    /// Persist an in-memory workspace. redb has already committed.
    pub fn save(&self, workspace: &Workspace) -> Result<(), IncubatorError> {
        if workspace.is_persistent() {
            return Ok(());
        }
        let data = workspace.export_snapshot()?;
        std::fs::write(&self.path, &data)
            .map_err(|e| IncubatorError::IoError(format!("Write db: {}", e)))
    }

    /// Open, run `f`, then save.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut Workspace) -> Result<T, IncubatorError>,
    ) -> Result<T, IncubatorError> {
        let mut workspace = self.open()?;
        let value = f(&mut workspace)?;
        self.save(&workspace)?;
        Ok(value)
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server. A file database is written back on shutdown.
pub async fn cmd_server(db: &Database, host: &str, port: u16) -> Result<(), IncubatorError> {
    let workspace = db.open()?;
    let server_config = config::ServerConfig::from_env();

    println!("Bihak Incubator Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", db.backend.as_str());
    println!("  Database: {:?}", db.path);
    println!();
    println!("Endpoints:");
    println!("  GET  /program                  - Program layout");
    println!("  GET  /teams/{{id}}/progress      - Team completion");
    println!("  POST /teams/{{id}}/exercises/... - Save a version");
    println!("  POST /submissions/{{id}}/review  - Review (admin)");
    println!("  GET  /health                   - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = api::AppState::new(workspace, server_config);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state.clone()).await?;

    let workspace = state.workspace.read().await;
    db.save(&workspace)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Program and database overview.
pub fn cmd_status(db: &Database, json_mode: bool) -> Result<(), IncubatorError> {
    let workspace = db.open()?;
    let catalog = workspace.catalog()?;
    let teams = workspace.teams()?;
    let pending = workspace.review_queue()?.len();
    let checksum = workspace.checksum()?;
    let hash = workspace.crypto_hash()?;

    let count = |status: TeamStatus| teams.iter().filter(|t| t.status == status).count();

    if json_mode {
        let output = serde_json::json!({
            "program": catalog.program().name,
            "phases": catalog.phases().len(),
            "active_exercises": catalog.total_active(),
            "teams": {
                "active": count(TeamStatus::Active),
                "withdrawn": count(TeamStatus::Withdrawn),
                "graduated": count(TeamStatus::Graduated),
            },
            "pending_reviews": pending,
            "checksum": checksum,
            "blake3": hash,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Bihak Incubator Status");
    println!("======================");
    println!("Database: {:?}", db.path);
    println!("Backend:  {}", db.backend.as_str());
    println!();
    if catalog.is_empty() {
        println!("Program:  (not loaded)");
    } else {
        println!("Program:  {}", catalog.program().name);
    }
    println!("Phases:           {}", catalog.phases().len());
    println!("Active exercises: {}", catalog.total_active());
    println!(
        "Teams:            {} active, {} withdrawn, {} graduated",
        count(TeamStatus::Active),
        count(TeamStatus::Withdrawn),
        count(TeamStatus::Graduated)
    );
    println!("Pending reviews:  {}", pending);
    println!();
    println!("Checksum: {}", checksum);
    println!("BLAKE3:   {}", hash);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(db: &Database, force: bool) -> Result<(), IncubatorError> {
    if db.path.exists() {
        if !force {
            return Err(IncubatorError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&db.path)
            .map_err(|e| IncubatorError::IoError(format!("Remove old database: {}", e)))?;
    }

    let workspace = db.open()?;
    db.save(&workspace)?;
    println!(
        "Initialized new {} database at {:?}",
        db.backend.as_str(),
        db.path
    );
    Ok(())
}

// =============================================================================
// PROGRAM COMMAND
// =============================================================================

/// Load or reload the program from a TOML file.
pub fn cmd_load_program(db: &Database, json_mode: bool, file: &Path) -> Result<(), IncubatorError> {
    let validated = validate_file_path(file)?;
    let definition = config::load_program_file(&validated)?;
    let catalog = db.update(|ws| ws.load_program(&definition))?;

    tracing::info!(
        event = "program_loaded",
        phases = catalog.phases().len(),
        active_exercises = catalog.total_active()
    );

    if json_mode {
        print_json(&serde_json::json!({
            "program": catalog.program().name,
            "phases": catalog.phases().len(),
            "active_exercises": catalog.total_active(),
        }));
        return Ok(());
    }

    println!("Loaded program '{}'", catalog.program().name);
    for phase in catalog.phases() {
        println!("  Phase {} (id {}): {}", phase.number, phase.id.0, phase.title);
        for exercise in catalog.exercises_in(phase.id) {
            let marker = if exercise.active { "" } else { " [inactive]" };
            println!(
                "    {}.{} (id {}): {}{}",
                phase.number, exercise.number, exercise.id.0, exercise.title, marker
            );
        }
    }
    Ok(())
}

// =============================================================================
// TEAM COMMANDS
// =============================================================================

pub fn cmd_team_add(db: &Database, json_mode: bool, name: &str) -> Result<(), IncubatorError> {
    let team = db.update(|ws| ws.register_team(name, config::now()))?;
    if json_mode {
        print_json(&team);
    } else {
        println!("Registered team '{}' with id {}", team.name, team.id.0);
    }
    Ok(())
}

pub fn cmd_member_add(
    db: &Database,
    json_mode: bool,
    team: u64,
    name: &str,
    email: &str,
    leader: bool,
) -> Result<(), IncubatorError> {
    let role = if leader {
        MemberRole::Leader
    } else {
        MemberRole::Member
    };
    let member = db.update(|ws| ws.add_member(TeamId(team), name, email, role))?;
    if json_mode {
        print_json(&member);
    } else {
        println!(
            "Added {} <{}> to team {} (member id {})",
            member.name, member.email, team, member.id.0
        );
    }
    Ok(())
}

fn parse_team_status(status: &str) -> Result<TeamStatus, IncubatorError> {
    match status {
        "active" => Ok(TeamStatus::Active),
        "withdrawn" => Ok(TeamStatus::Withdrawn),
        "graduated" => Ok(TeamStatus::Graduated),
        other => Err(IncubatorError::InvalidInput(format!(
            "Unknown status '{}'. Use: active, withdrawn, graduated",
            other
        ))),
    }
}

pub fn cmd_team_status(
    db: &Database,
    json_mode: bool,
    team: u64,
    status: &str,
) -> Result<(), IncubatorError> {
    let status = parse_team_status(status)?;
    let team = db.update(|ws| ws.set_team_status(TeamId(team), status))?;
    if json_mode {
        print_json(&team);
    } else {
        println!("Team {} is now {}", team.id.0, team.status.as_str());
    }
    Ok(())
}

// =============================================================================
// SUBMIT COMMAND
// =============================================================================

/// Arguments of `submit`.
#[derive(Debug, Clone)]
pub struct SubmitArgs {
    pub team: u64,
    pub exercise: u64,
    pub content: Option<String>,
    pub file: Option<PathBuf>,
    pub attachment: Option<String>,
    pub draft: bool,
}

pub fn cmd_submit(db: &Database, json_mode: bool, args: SubmitArgs) -> Result<(), IncubatorError> {
    let content = match (&args.content, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => {
            let bytes = read_checked(path, MAX_CONTENT_LENGTH as u64)?;
            String::from_utf8(bytes).map_err(|_| {
                IncubatorError::InvalidInput("Answer file is not valid UTF-8".to_string())
            })?
        }
        (None, None) => String::new(),
    };

    let request = SaveRequest {
        team: TeamId(args.team),
        exercise: ExerciseId(args.exercise),
        content,
        attachment: args.attachment,
        mode: if args.draft {
            SaveMode::Draft
        } else {
            SaveMode::Submit
        },
    };
    let submission = db.update(|ws| ws.save_submission(request, config::now()))?;

    if json_mode {
        print_json(&submission);
    } else {
        println!(
            "Saved version {} of exercise {} for team {} as {} (submission id {})",
            submission.version,
            args.exercise,
            args.team,
            submission.status.as_str(),
            submission.id.0
        );
    }
    Ok(())
}

// =============================================================================
// REVIEW COMMANDS
// =============================================================================

fn parse_decision(decision: &str) -> Result<ReviewDecision, IncubatorError> {
    match decision {
        "approve" => Ok(ReviewDecision::Approve),
        "revise" => Ok(ReviewDecision::RequestRevision),
        other => Err(IncubatorError::InvalidInput(format!(
            "Unknown decision '{}'. Use: approve, revise",
            other
        ))),
    }
}

pub fn cmd_review(
    db: &Database,
    json_mode: bool,
    submission: u64,
    decision: &str,
    reviewer: &str,
    feedback: &str,
) -> Result<(), IncubatorError> {
    let request = ReviewRequest {
        submission: SubmissionId(submission),
        reviewer: reviewer.to_string(),
        decision: parse_decision(decision)?,
        feedback: feedback.to_string(),
    };
    let reviewed = db.update(|ws| ws.review_submission(request, config::now()))?;

    if json_mode {
        print_json(&reviewed);
    } else {
        println!(
            "Submission {} (team {}, version {}) is now {}",
            reviewed.id.0,
            reviewed.team.0,
            reviewed.version,
            reviewed.status.as_str()
        );
    }
    Ok(())
}

pub fn cmd_queue(db: &Database, json_mode: bool) -> Result<(), IncubatorError> {
    let queue = db.open()?.review_queue()?;
    if json_mode {
        print_json(&queue);
        return Ok(());
    }

    if queue.is_empty() {
        println!("No submissions waiting for review");
        return Ok(());
    }
    println!("Pending reviews ({}):", queue.len());
    for entry in &queue {
        println!(
            "  #{} {} / {} (v{}, saved at {})",
            entry.submission.0,
            entry.team_name,
            entry.exercise_title,
            entry.version,
            entry.saved_at.secs()
        );
    }
    Ok(())
}

// =============================================================================
// INSPECTION COMMANDS
// =============================================================================

pub fn cmd_progress(db: &Database, json_mode: bool, team: u64) -> Result<(), IncubatorError> {
    let workspace = db.open()?;
    let team = workspace.team(TeamId(team))?;
    let progress = workspace.progress(team.id)?;

    if json_mode {
        print_json(&progress);
        return Ok(());
    }

    println!("Team {} ({})", team.name, team.status.as_str());
    for line in progress_lines(&progress, &workspace.access(team.id)?) {
        println!("{}", line);
    }
    Ok(())
}

/// Text report: totals, one line per phase, one line per active exercise.
fn progress_lines(progress: &ProgramProgress, access: &AccessMap) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Completion: {}% ({} of {} exercises approved)",
            progress.percent, progress.approved, progress.total
        ),
        String::new(),
    ];
    for (phase, phase_access) in progress.phases.iter().zip(&access.phases) {
        let state = if phase.complete {
            "complete"
        } else if phase.unlocked {
            "open"
        } else {
            "locked"
        };
        lines.push(format!(
            "  Phase {}: {} - {}% ({}/{}) [{}]",
            phase.number, phase.title, phase.percent, phase.approved, phase.total, state
        ));
        for exercise in &phase_access.exercises {
            lines.push(format!(
                "    {}. {} #{} [{}]",
                exercise.number,
                exercise.title,
                exercise.exercise.0,
                exercise.state.as_str()
            ));
        }
    }
    lines
}

pub fn cmd_history(
    db: &Database,
    json_mode: bool,
    team: u64,
    exercise: u64,
) -> Result<(), IncubatorError> {
    let workspace = db.open()?;
    let history = workspace.history(TeamId(team), ExerciseId(exercise))?;

    if json_mode {
        print_json(&history);
        return Ok(());
    }

    if history.is_empty() {
        println!("No versions saved yet");
        return Ok(());
    }
    let current = history.last().map(|s| s.version);
    for submission in &history {
        let marker = if Some(submission.version) == current {
            " (current)"
        } else {
            ""
        };
        println!(
            "  v{} #{} {}{}",
            submission.version,
            submission.id.0,
            submission.status.as_str(),
            marker
        );
        for review in workspace.reviews(submission.id)? {
            if !review.feedback.is_empty() {
                println!("      {}: {}", review.reviewer, review.feedback);
            }
        }
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

pub fn cmd_export(db: &Database, output: &Path) -> Result<(), IncubatorError> {
    let validated_output = validate_output_path(output)?;
    let workspace = db.open()?;
    let data = workspace.export_snapshot()?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| IncubatorError::IoError(format!("Write file: {}", e)))?;

    println!("Checksum: {}", workspace.checksum()?);
    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Import a snapshot. The target database must be empty.
pub fn cmd_import(db: &Database, input: &Path) -> Result<(), IncubatorError> {
    let data = read_checked(input, MAX_SNAPSHOT_SIZE as u64)?;

    let mut workspace = db.open()?;
    workspace.import_snapshot(&data)?;
    db.save(&workspace)?;

    println!(
        "Imported {} teams (checksum {})",
        workspace.teams()?.len(),
        workspace.checksum()?
    );
    Ok(())
}
