//! # API Request/Response Types
//!
//! JSON bodies for the HTTP API, and the mapping from engine errors to
//! status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bihak_core::{
    Exercise, ExerciseId, IncubatorError, Member, MemberRole, Phase, ProgramInfo, QueueEntry,
    Review, ReviewDecision, SaveMode, Submission, Team, TeamId, TeamStatus,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body: `{ "error": "<message>" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An engine error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub IncubatorError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            IncubatorError::PhaseNotFound(_)
            | IncubatorError::ExerciseNotFound(_)
            | IncubatorError::TeamNotFound(_)
            | IncubatorError::SubmissionNotFound(_) => StatusCode::NOT_FOUND,
            IncubatorError::ExerciseLocked(_)
            | IncubatorError::ExerciseAlreadyApproved(_)
            | IncubatorError::SupersededVersion { .. }
            | IncubatorError::InvalidTransition { .. }
            | IncubatorError::TeamInactive(_)
            | IncubatorError::DuplicateTeam(_)
            | IncubatorError::LeaderExists(_)
            | IncubatorError::ProgramIncomplete { .. } => StatusCode::CONFLICT,
            IncubatorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IncubatorError::SerializationError(_) | IncubatorError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<IncubatorError> for ApiError {
    fn from(e: IncubatorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(event = "request_failed", error = %self.0, "Storage error");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// PROGRAM
// =============================================================================

/// One phase with all of its exercises, active or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseView {
    #[serde(flatten)]
    pub phase: Phase,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramResponse {
    pub program: ProgramInfo,
    pub phases: Vec<PhaseView>,
    pub total_active: usize,
}

// =============================================================================
// TEAMS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTeamRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamListResponse {
    pub teams: Vec<Team>,
}

/// A team with its roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResponse {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: TeamStatus,
}

// =============================================================================
// SUBMISSIONS
// =============================================================================

/// Body of a save. `mode` defaults to `draft`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSubmissionRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub mode: SaveMode,
}

/// A stored version and the reviews it received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub reviews: Vec<Review>,
}

/// Every version of one exercise, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub team: TeamId,
    pub exercise: ExerciseId,
    /// Version number of the current row, if any.
    pub current_version: Option<u32>,
    pub versions: Vec<VersionView>,
}

// =============================================================================
// REVIEWS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBody {
    pub reviewer: String,
    pub decision: ReviewDecision,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub pending: Vec<QueueEntry>,
}

// =============================================================================
// TESTS
// =============================================================================
