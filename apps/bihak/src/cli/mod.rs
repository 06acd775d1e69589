//! # Bihak CLI Module
//!
//! Administrator commands against a local database.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `load-program` - Load or reload the program from TOML
//! - `team-add`, `member-add`, `team-status` - Manage teams
//! - `submit` - Save a version for a team
//! - `review` - Approve or send back a submission
//! - `queue` - List work waiting for review
//! - `progress`, `history` - Inspect a team
//! - `status` - Program and database overview
//! - `export`, `import` - Snapshot files

mod commands;

use bihak_core::IncubatorError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Bihak - incubation program engine
///
/// Teams work through ordered phases of exercises; staff review each
/// submission before the next phase opens.
#[derive(Parser, Debug)]
#[command(name = "bihak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database
    #[arg(short = 'D', long, global = true, default_value = "bihak.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "file" (snapshot file)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show program and database overview
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Load or reload the program definition
    LoadProgram {
        /// Path to the TOML program file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Register a team
    TeamAdd {
        /// Team name
        #[arg(short, long)]
        name: String,
    },

    /// Add a member to a team
    MemberAdd {
        /// Team ID
        #[arg(short, long)]
        team: u64,

        /// Member name
        #[arg(short, long)]
        name: String,

        /// Member email
        #[arg(short, long)]
        email: String,

        /// Make this member the team leader
        #[arg(long)]
        leader: bool,
    },

    /// Change a team's status (active, withdrawn, graduated)
    TeamStatus {
        /// Team ID
        #[arg(short, long)]
        team: u64,

        /// New status
        #[arg(short, long)]
        status: String,
    },

    /// Save a new version of an exercise answer
    Submit {
        /// Team ID
        #[arg(short, long)]
        team: u64,

        /// Exercise ID
        #[arg(short, long)]
        exercise: u64,

        /// Answer text
        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the answer from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Attachment reference (path or URL)
        #[arg(short, long)]
        attachment: Option<String>,

        /// Save as draft instead of submitting for review
        #[arg(long)]
        draft: bool,
    },

    /// Review a submitted version
    Review {
        /// Submission ID
        #[arg(short, long)]
        submission: u64,

        /// Decision (approve, revise)
        #[arg(short, long)]
        decision: String,

        /// Reviewer name
        #[arg(short, long, default_value = "staff")]
        reviewer: String,

        /// Feedback for the team (required for revise)
        #[arg(short, long, default_value = "")]
        feedback: String,
    },

    /// List submissions waiting for review
    Queue,

    /// Show a team's completion
    Progress {
        /// Team ID
        #[arg(short, long)]
        team: u64,
    },

    /// Show every version of one exercise
    History {
        /// Team ID
        #[arg(short, long)]
        team: u64,

        /// Exercise ID
        #[arg(short, long)]
        exercise: u64,
    },

    /// Export a snapshot
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a snapshot into an empty database
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), IncubatorError> {
    let db = Database::new(cli.database, &cli.backend)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&db, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&db, json_mode),
        Some(Commands::Init { force }) => cmd_init(&db, force),
        Some(Commands::LoadProgram { file }) => cmd_load_program(&db, json_mode, &file),
        Some(Commands::TeamAdd { name }) => cmd_team_add(&db, json_mode, &name),
        Some(Commands::MemberAdd {
            team,
            name,
            email,
            leader,
        }) => cmd_member_add(&db, json_mode, team, &name, &email, leader),
        Some(Commands::TeamStatus { team, status }) => {
            cmd_team_status(&db, json_mode, team, &status)
        }
        Some(Commands::Submit {
            team,
            exercise,
            content,
            file,
            attachment,
            draft,
        }) => cmd_submit(
            &db,
            json_mode,
            SubmitArgs {
                team,
                exercise,
                content,
                file,
                attachment,
                draft,
            },
        ),
        Some(Commands::Review {
            submission,
            decision,
            reviewer,
            feedback,
        }) => cmd_review(&db, json_mode, submission, &decision, &reviewer, &feedback),
        Some(Commands::Queue) => cmd_queue(&db, json_mode),
        Some(Commands::Progress { team }) => cmd_progress(&db, json_mode, team),
        Some(Commands::History { team, exercise }) => {
            cmd_history(&db, json_mode, team, exercise)
        }
        Some(Commands::Export { output }) => cmd_export(&db, &output),
        Some(Commands::Import { input }) => cmd_import(&db, &input),
    }
}
