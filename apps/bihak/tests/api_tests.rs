//! Integration tests for the Bihak HTTP API.
//!
//! Uses axum-test to drive the router without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in the env test - it is serialized
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, header::AUTHORIZATION};
use axum_test::{TestResponse, TestServer};
use bihak::api::{
    AppState, CHECKSUM_HEADER, ErrorResponse, HASH_HEADER, HealthResponse, HistoryResponse,
    ProgramResponse, QueueResponse, TeamListResponse, TeamResponse, create_router,
};
use bihak::config::{DEFAULT_RATE_LIMIT, ServerConfig, parse_program};
use bihak_core::{AccessMap, ExerciseState, Member, ProgramProgress, Submission, Team, Workspace};
use serde_json::json;
use std::sync::Mutex;

/// Serializes the test that touches process environment variables.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const PROGRAM: &str = r#"
[program]
name = "Bihak Incubation"

[[phases]]
number = 1
title = "Ideation"

[[phases.exercises]]
number = 1
title = "Problem statement"

[[phases.exercises]]
number = 2
title = "Customer interviews"

[[phases]]
number = 2
title = "Validation"

[[phases.exercises]]
number = 1
title = "Prototype"
"#;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_config() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

fn keyed_config() -> ServerConfig {
    ServerConfig {
        api_key: Some("team-key".to_string()),
        admin_key: Some("admin-key".to_string()),
        rate_limit: 0,
        cors_origins: None,
    }
}

fn loaded_workspace() -> Workspace {
    let mut workspace = Workspace::new();
    workspace
        .load_program(&parse_program(PROGRAM).unwrap())
        .unwrap();
    workspace
}

fn test_server(config: ServerConfig) -> TestServer {
    let state = AppState::new(loaded_workspace(), config);
    TestServer::new(create_router(state)).unwrap()
}

fn bearer(key: &str) -> HeaderValue {
    format!("Bearer {}", key).parse::<HeaderValue>().unwrap()
}

/// Exercise ids grouped by phase, in program order.
async fn exercise_ids(server: &TestServer) -> Vec<Vec<u64>> {
    let program: ProgramResponse = server.get("/program").await.json();
    program
        .phases
        .iter()
        .map(|p| p.exercises.iter().map(|e| e.id.0).collect())
        .collect()
}

async fn register(server: &TestServer, name: &str) -> u64 {
    let response = server.post("/teams").json(&json!({ "name": name })).await;
    assert_eq!(response.status_code().as_u16(), 201);
    let team: TeamResponse = response.json();
    team.team.id.0
}

async fn save(server: &TestServer, team: u64, exercise: u64, mode: &str) -> TestResponse {
    server
        .post(&format!("/teams/{}/exercises/{}/submissions", team, exercise))
        .json(&json!({ "content": "our answer", "mode": mode }))
        .await
}

async fn approve(server: &TestServer, submission: u64) -> TestResponse {
    server
        .post(&format!("/submissions/{}/review", submission))
        .json(&json!({ "reviewer": "coach", "decision": "approve" }))
        .await
}

async fn submit_and_approve(server: &TestServer, team: u64, exercise: u64) {
    let response = save(server, team, exercise, "submit").await;
    assert_eq!(response.status_code().as_u16(), 201);
    let submission: Submission = response.json();
    approve(server, submission.id.0).await.assert_status_ok();
}

// =============================================================================
// HEALTH & PROGRAM
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = test_server(open_config());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_program_lists_phases_in_order() {
    let server = test_server(open_config());

    let response = server.get("/program").await;

    response.assert_status_ok();
    let program: ProgramResponse = response.json();
    assert_eq!(program.program.name, "Bihak Incubation");
    assert_eq!(program.total_active, 3);
    let titles: Vec<&str> = program.phases.iter().map(|p| p.phase.title.as_str()).collect();
    assert_eq!(titles, vec!["Ideation", "Validation"]);
    assert_eq!(program.phases[0].exercises.len(), 2);
}

// =============================================================================
// TEAMS
// =============================================================================

#[tokio::test]
async fn test_register_and_list_teams() {
    let server = test_server(open_config());
    let id = register(&server, "Umurava").await;

    let list: TeamListResponse = server.get("/teams").await.json();
    assert_eq!(list.teams.len(), 1);
    assert_eq!(list.teams[0].id.0, id);

    let detail = server.get(&format!("/teams/{}", id)).await;
    detail.assert_status_ok();
    let team: TeamResponse = detail.json();
    assert_eq!(team.team.name, "Umurava");
    assert!(team.members.is_empty());
}

#[tokio::test]
async fn test_duplicate_team_is_conflict() {
    let server = test_server(open_config());
    register(&server, "Umurava").await;

    let response = server.post("/teams").json(&json!({ "name": "umurava" })).await;

    assert_eq!(response.status_code().as_u16(), 409);
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("umurava"));
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let server = test_server(open_config());

    let response = server.get("/teams/999").await;

    response.assert_status_not_found();
    let error: ErrorResponse = response.json();
    assert!(!error.error.is_empty());
}

#[tokio::test]
async fn test_second_leader_is_rejected() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let path = format!("/teams/{}/members", team);

    let first = server
        .post(&path)
        .json(&json!({ "name": "Aline", "email": "aline@example.org", "role": "leader" }))
        .await;
    assert_eq!(first.status_code().as_u16(), 201);
    let member: Member = first.json();
    assert_eq!(member.email, "aline@example.org");

    let second = server
        .post(&path)
        .json(&json!({ "name": "Eric", "email": "eric@example.org", "role": "leader" }))
        .await;
    assert_eq!(second.status_code().as_u16(), 409);

    let bad_email = server
        .post(&path)
        .json(&json!({ "name": "Eric", "email": "not-an-email" }))
        .await;
    bad_email.assert_status_bad_request();
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];

    let response = server
        .post(&format!("/teams/{}/exercises/{}/submissions", team, exercise))
        .json(&json!({ "content": "x", "mode": "publish" }))
        .await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("publish"));
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let server = test_server(open_config());

    let response = server.get("/teams/abc").await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert!(!error.error.is_empty());
}

// =============================================================================
// GATING
// =============================================================================

#[tokio::test]
async fn test_next_phase_locked_until_previous_approved() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let ids = exercise_ids(&server).await;

    let early = save(&server, team, ids[1][0], "draft").await;
    assert_eq!(early.status_code().as_u16(), 409);

    submit_and_approve(&server, team, ids[0][0]).await;
    let still_locked = save(&server, team, ids[1][0], "draft").await;
    assert_eq!(still_locked.status_code().as_u16(), 409);

    submit_and_approve(&server, team, ids[0][1]).await;
    let unlocked = save(&server, team, ids[1][0], "draft").await;
    assert_eq!(unlocked.status_code().as_u16(), 201);

    let access: AccessMap = server
        .get(&format!("/teams/{}/access", team))
        .await
        .json();
    assert!(access.phases[0].complete);
    assert!(access.phases[1].unlocked);
    assert_eq!(
        access.phases[1].exercises[0].state,
        ExerciseState::Draft
    );
}

#[tokio::test]
async fn test_approved_exercise_is_frozen() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let ids = exercise_ids(&server).await;

    submit_and_approve(&server, team, ids[0][0]).await;
    let again = save(&server, team, ids[0][0], "submit").await;

    assert_eq!(again.status_code().as_u16(), 409);
}

// =============================================================================
// VERSIONING & REVIEW
// =============================================================================

#[tokio::test]
async fn test_saves_create_versions_and_only_latest_is_reviewable() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];

    let first: Submission = save(&server, team, exercise, "submit").await.json();
    let second: Submission = save(&server, team, exercise, "submit").await.json();
    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);

    let stale = approve(&server, first.id.0).await;
    assert_eq!(stale.status_code().as_u16(), 409);

    approve(&server, second.id.0).await.assert_status_ok();

    let history: HistoryResponse = server
        .get(&format!("/teams/{}/exercises/{}/submissions", team, exercise))
        .await
        .json();
    assert_eq!(history.current_version, Some(2));
    assert_eq!(history.versions.len(), 2);
    assert_eq!(history.versions[1].reviews.len(), 1);
    assert_eq!(history.versions[1].reviews[0].reviewer, "coach");
}

#[tokio::test]
async fn test_revision_requires_feedback() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];
    let sub: Submission = save(&server, team, exercise, "submit").await.json();
    let path = format!("/submissions/{}/review", sub.id.0);

    let silent = server
        .post(&path)
        .json(&json!({ "reviewer": "coach", "decision": "request_revision" }))
        .await;
    silent.assert_status_bad_request();

    let with_notes = server
        .post(&path)
        .json(&json!({
            "reviewer": "coach",
            "decision": "request_revision",
            "feedback": "Interview at least five customers"
        }))
        .await;
    with_notes.assert_status_ok();
    let reviewed: Submission = with_notes.json();
    assert_eq!(reviewed.status.as_str(), "revision_requested");
}

#[tokio::test]
async fn test_draft_cannot_be_reviewed() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];
    let draft: Submission = save(&server, team, exercise, "draft").await.json();

    let response = approve(&server, draft.id.0).await;

    assert_eq!(response.status_code().as_u16(), 409);
}

#[tokio::test]
async fn test_pending_queue_lists_submitted_work() {
    let server = test_server(open_config());
    let a = register(&server, "Umurava").await;
    let b = register(&server, "Isoko").await;
    let exercise = exercise_ids(&server).await[0][0];

    save(&server, a, exercise, "submit").await;
    save(&server, b, exercise, "draft").await;

    let queue: QueueResponse = server.get("/reviews/pending").await.json();
    assert_eq!(queue.pending.len(), 1);
    assert_eq!(queue.pending[0].team_name, "Umurava");
}

// =============================================================================
// PROGRESS & GRADUATION
// =============================================================================

#[tokio::test]
async fn test_progress_uses_floor_percent() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let ids = exercise_ids(&server).await;

    submit_and_approve(&server, team, ids[0][0]).await;

    let progress: ProgramProgress = server
        .get(&format!("/teams/{}/progress", team))
        .await
        .json();
    assert_eq!(progress.approved, 1);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.percent, 33);
    assert!(!progress.complete);
    assert_eq!(progress.phases[0].percent, 50);
}

#[tokio::test]
async fn test_graduation_requires_complete_program() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let ids = exercise_ids(&server).await;
    let path = format!("/teams/{}/status", team);

    let early = server.post(&path).json(&json!({ "status": "graduated" })).await;
    assert_eq!(early.status_code().as_u16(), 409);

    for exercise in ids.iter().flatten() {
        submit_and_approve(&server, team, *exercise).await;
    }

    let done = server.post(&path).json(&json!({ "status": "graduated" })).await;
    done.assert_status_ok();
    let graduated: Team = done.json();
    assert_eq!(graduated.status.as_str(), "graduated");

    let progress: ProgramProgress = server
        .get(&format!("/teams/{}/progress", team))
        .await
        .json();
    assert_eq!(progress.percent, 100);
}

#[tokio::test]
async fn test_withdrawn_team_cannot_save() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];

    server
        .post(&format!("/teams/{}/status", team))
        .json(&json!({ "status": "withdrawn" }))
        .await
        .assert_status_ok();

    let response = save(&server, team, exercise, "draft").await;
    assert_eq!(response.status_code().as_u16(), 409);
}

// =============================================================================
// EXPORT
// =============================================================================

#[tokio::test]
async fn test_export_returns_snapshot_with_checksum() {
    let server = test_server(open_config());
    let team = register(&server, "Umurava").await;
    let exercise = exercise_ids(&server).await[0][0];
    submit_and_approve(&server, team, exercise).await;

    let response = server.post("/export").await;

    response.assert_status_ok();
    let checksum: u64 = response
        .header(CHECKSUM_HEADER)
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let hash = response.header(HASH_HEADER).to_str().unwrap().to_string();
    assert_eq!(hash.len(), 64);

    let mut restored = Workspace::new();
    restored.import_snapshot(response.as_bytes()).unwrap();
    assert_eq!(restored.checksum().unwrap(), checksum);
    assert_eq!(restored.progress(bihak_core::TeamId(team)).unwrap().approved, 1);
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_health_is_public_with_keys_configured() {
    let server = test_server(keyed_config());

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_team_routes_require_key() {
    let server = test_server(keyed_config());

    let missing = server.get("/teams").await;
    assert_eq!(missing.status_code().as_u16(), 401);

    let wrong = server
        .get("/teams")
        .add_header(AUTHORIZATION, bearer("nope"))
        .await;
    assert_eq!(wrong.status_code().as_u16(), 401);

    let team_key = server
        .get("/teams")
        .add_header(AUTHORIZATION, bearer("team-key"))
        .await;
    team_key.assert_status_ok();

    let raw_admin = server
        .get("/teams")
        .add_header(AUTHORIZATION, "admin-key".parse::<HeaderValue>().unwrap())
        .await;
    raw_admin.assert_status_ok();
}

#[tokio::test]
async fn test_admin_routes_reject_team_key() {
    let server = test_server(keyed_config());

    let team_key = server
        .get("/reviews/pending")
        .add_header(AUTHORIZATION, bearer("team-key"))
        .await;
    assert_eq!(team_key.status_code().as_u16(), 401);

    let admin_key = server
        .get("/reviews/pending")
        .add_header(AUTHORIZATION, bearer("admin-key"))
        .await;
    admin_key.assert_status_ok();
}

#[tokio::test]
async fn test_admin_key_alone_protects_team_routes() {
    let server = test_server(ServerConfig {
        api_key: None,
        admin_key: Some("admin-key".to_string()),
        rate_limit: 0,
        cors_origins: None,
    });

    let list = server.get("/teams").await;
    assert_eq!(list.status_code().as_u16(), 401);

    let create = server.post("/teams").json(&json!({ "name": "Umurava" })).await;
    assert_eq!(create.status_code().as_u16(), 401);

    server
        .get("/teams")
        .add_header(AUTHORIZATION, bearer("admin-key"))
        .await
        .assert_status_ok();
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let server = test_server(ServerConfig {
        rate_limit: 1,
        ..ServerConfig::default()
    });

    server.get("/health").await.assert_status_ok();
    let limited = server.get("/health").await;

    assert_eq!(limited.status_code().as_u16(), 429);
}

// =============================================================================
// CONFIGURATION
// =============================================================================

const ENV_VARS: [&str; 4] = [
    "BIHAK_API_KEY",
    "BIHAK_ADMIN_KEY",
    "BIHAK_RATE_LIMIT",
    "BIHAK_CORS_ORIGINS",
];

/// Holds the env mutex and clears the variables on drop.
struct EnvGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for var in ENV_VARS {
            // SAFETY: Env access is serialized by ENV_TEST_MUTEX.
            unsafe { std::env::remove_var(var) };
        }
    }
}

#[test]
fn test_config_from_env() {
    let _env = EnvGuard {
        _guard: ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner()),
    };

    // SAFETY: Env access is serialized by ENV_TEST_MUTEX.
    unsafe {
        std::env::set_var("BIHAK_API_KEY", "team-key");
        std::env::set_var("BIHAK_ADMIN_KEY", "");
        std::env::set_var("BIHAK_RATE_LIMIT", "not-a-number");
    }
    let config = ServerConfig::from_env();

    assert_eq!(config.api_key.as_deref(), Some("team-key"));
    assert_eq!(config.admin_key, None);
    assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
    assert_eq!(config.admin_keys(), vec!["team-key"]);
}
