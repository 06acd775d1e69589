//! # API Endpoint Handlers
//!
//! Every handler takes the workspace lock, calls one engine operation and
//! maps the result. Reads share the lock; saves, reviews and roster changes
//! take it exclusively.

use super::{
    AppState, CHECKSUM_HEADER, HASH_HEADER,
    extract::{JsonBody, PathParams},
    types::{
        AddMemberRequest, ApiResult, HealthResponse, HistoryResponse, PhaseView, ProgramResponse,
        QueueResponse, RegisterTeamRequest, ReviewBody, SaveSubmissionRequest, SetStatusRequest,
        TeamListResponse, TeamResponse, VersionView,
    },
};
use crate::config;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use bihak_core::{
    AccessMap, ExerciseId, Member, ProgramProgress, ReviewRequest, SaveRequest, Submission,
    SubmissionId, Team, TeamId,
};

// =============================================================================
// HEALTH
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// PROGRAM
// =============================================================================

/// The program layout, inactive exercises included.
pub async fn program_handler(State(state): State<AppState>) -> ApiResult<Json<ProgramResponse>> {
    let workspace = state.workspace.read().await;
    let catalog = workspace.catalog()?;

    let phases = catalog
        .phases()
        .iter()
        .map(|phase| PhaseView {
            phase: phase.clone(),
            exercises: catalog.exercises_in(phase.id).to_vec(),
        })
        .collect();

    Ok(Json(ProgramResponse {
        program: catalog.program().clone(),
        phases,
        total_active: catalog.total_active(),
    }))
}

// =============================================================================
// TEAMS
// =============================================================================

pub async fn list_teams_handler(State(state): State<AppState>) -> ApiResult<Json<TeamListResponse>> {
    let workspace = state.workspace.read().await;
    Ok(Json(TeamListResponse {
        teams: workspace.teams()?,
    }))
}

pub async fn register_team_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    let mut workspace = state.workspace.write().await;
    let team = workspace.register_team(&request.name, config::now())?;
    tracing::info!(event = "team_registered", team = team.id.0, name = %team.name);

    Ok((
        StatusCode::CREATED,
        Json(TeamResponse {
            team,
            members: Vec::new(),
        }),
    ))
}

pub async fn team_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
) -> ApiResult<Json<TeamResponse>> {
    let workspace = state.workspace.read().await;
    let team = workspace.team(TeamId(id))?;
    let members = workspace.members(team.id)?;
    Ok(Json(TeamResponse { team, members }))
}

pub async fn add_member_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
    JsonBody(request): JsonBody<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let mut workspace = state.workspace.write().await;
    let member = workspace.add_member(TeamId(id), &request.name, &request.email, request.role)?;
    tracing::info!(event = "member_added", team = id, member = member.id.0);
    Ok((StatusCode::CREATED, Json(member)))
}

/// Withdraw, reactivate or graduate a team.
pub async fn set_status_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
    JsonBody(request): JsonBody<SetStatusRequest>,
) -> ApiResult<Json<Team>> {
    let mut workspace = state.workspace.write().await;
    let team = workspace.set_team_status(TeamId(id), request.status)?;
    tracing::info!(event = "team_status_changed", team = id, status = team.status.as_str());
    Ok(Json(team))
}

// =============================================================================
// GATE & PROGRESS
// =============================================================================

/// Completion figures for the team dashboard.
pub async fn progress_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
) -> ApiResult<Json<ProgramProgress>> {
    let workspace = state.workspace.read().await;
    Ok(Json(workspace.progress(TeamId(id))?))
}

pub async fn access_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
) -> ApiResult<Json<AccessMap>> {
    let workspace = state.workspace.read().await;
    Ok(Json(workspace.access(TeamId(id))?))
}

// =============================================================================
// SUBMISSIONS
// =============================================================================

pub async fn history_handler(
    State(state): State<AppState>,
    PathParams((team, exercise)): PathParams<(u64, u64)>,
) -> ApiResult<Json<HistoryResponse>> {
    let workspace = state.workspace.read().await;
    let (team, exercise) = (TeamId(team), ExerciseId(exercise));

    let mut versions = Vec::new();
    for submission in workspace.history(team, exercise)? {
        let reviews = workspace.reviews(submission.id)?;
        versions.push(VersionView {
            submission,
            reviews,
        });
    }

    Ok(Json(HistoryResponse {
        team,
        exercise,
        current_version: versions.last().map(|v| v.submission.version),
        versions,
    }))
}

/// Save a draft or submit for review. Each call creates a new version.
pub async fn save_submission_handler(
    State(state): State<AppState>,
    PathParams((team, exercise)): PathParams<(u64, u64)>,
    JsonBody(request): JsonBody<SaveSubmissionRequest>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let mut workspace = state.workspace.write().await;
    let submission = workspace.save_submission(
        SaveRequest {
            team: TeamId(team),
            exercise: ExerciseId(exercise),
            content: request.content,
            attachment: request.attachment,
            mode: request.mode,
        },
        config::now(),
    )?;

    tracing::info!(
        event = "submission_saved",
        team,
        exercise,
        version = submission.version,
        status = submission.status.as_str()
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

// =============================================================================
// REVIEWS
// =============================================================================

/// Submitted current versions, oldest first.
pub async fn pending_reviews_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<QueueResponse>> {
    let workspace = state.workspace.read().await;
    Ok(Json(QueueResponse {
        pending: workspace.review_queue()?,
    }))
}

pub async fn review_handler(
    State(state): State<AppState>,
    PathParams(id): PathParams<u64>,
    JsonBody(body): JsonBody<ReviewBody>,
) -> ApiResult<Json<Submission>> {
    let mut workspace = state.workspace.write().await;
    let submission = workspace.review_submission(
        ReviewRequest {
            submission: SubmissionId(id),
            reviewer: body.reviewer,
            decision: body.decision,
            feedback: body.feedback,
        },
        config::now(),
    )?;

    tracing::info!(
        event = "submission_reviewed",
        submission = id,
        team = submission.team.0,
        status = submission.status.as_str()
    );
    Ok(Json(submission))
}

// =============================================================================
// EXPORT
// =============================================================================

/// Snapshot bytes, with the checksum and BLAKE3 digest in response headers.
pub async fn export_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let workspace = state.workspace.read().await;
    let data = workspace.export_snapshot()?;
    let checksum = workspace.checksum()?;
    let hash = workspace.crypto_hash()?;

    tracing::info!(event = "snapshot_exported", bytes = data.len(), checksum);

    Ok((
        [
            ("content-type", "application/octet-stream".to_string()),
            (CHECKSUM_HEADER, checksum.to_string()),
            (HASH_HEADER, hash),
        ],
        data,
    ))
}
