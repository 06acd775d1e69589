//! # Progression Tier Tests (P0-P3)
//!
//! End-to-end program runs through the public `Workspace` API, on both
//! storage backends.
//!
//! ## Tiers
//! - P0: Catalog loading
//! - P1: Submission versioning
//! - P2: Phase gating
//! - P3: Review and completion

use bihak_core::{
    Catalog, ExerciseDefinition, ExerciseId, ExerciseOrder, ExerciseState, IncubatorError,
    PhaseDefinition, PhaseId, ProgramDefinition, ProgramInfo, ReviewDecision, ReviewRequest,
    SaveMode, SaveRequest, Submission, SubmissionStatus, TeamId, TeamStatus, Timestamp,
    Workspace,
};
use tempfile::TempDir;

/// Three phases: 2 exercises, 1 exercise, 2 exercises.
fn program(order: ExerciseOrder) -> ProgramDefinition {
    let phase = |number: u32, titles: &[&str]| PhaseDefinition {
        number,
        title: format!("Phase {}", number),
        description: String::new(),
        exercises: titles
            .iter()
            .enumerate()
            .map(|(i, title)| ExerciseDefinition {
                number: i as u32 + 1,
                title: (*title).to_string(),
                instructions: String::new(),
                active: true,
            })
            .collect(),
    };
    ProgramDefinition {
        program: ProgramInfo {
            name: "Bihak Incubation".to_string(),
            description: String::new(),
            exercise_order: order,
        },
        phases: vec![
            phase(1, &["Problem statement", "Target customer"]),
            phase(2, &["Customer interviews"]),
            phase(3, &["Business model", "Pitch deck"]),
        ],
    }
}

fn exercises(catalog: &Catalog, phase_index: usize) -> Vec<ExerciseId> {
    let phase = catalog.phases()[phase_index].id;
    catalog.exercises_in(phase).iter().map(|e| e.id).collect()
}

fn save(
    ws: &mut Workspace,
    team: TeamId,
    exercise: ExerciseId,
    mode: SaveMode,
    at: u64,
) -> Result<Submission, IncubatorError> {
    ws.save_submission(
        SaveRequest {
            team,
            exercise,
            content: format!("answer at {}", at),
            attachment: None,
            mode,
        },
        Timestamp(at),
    )
}

fn decide(
    ws: &mut Workspace,
    submission: &Submission,
    decision: ReviewDecision,
) -> Result<Submission, IncubatorError> {
    ws.review_submission(
        ReviewRequest {
            submission: submission.id,
            reviewer: "Program staff".to_string(),
            decision,
            feedback: "Reviewed".to_string(),
        },
        Timestamp(submission.saved_at.secs() + 1),
    )
}

fn pass(ws: &mut Workspace, team: TeamId, exercise: ExerciseId, at: u64) {
    let sub = save(ws, team, exercise, SaveMode::Submit, at).expect("submit");
    decide(ws, &sub, ReviewDecision::Approve).expect("approve");
}

/// Run `scenario` on a fresh in-memory workspace and a fresh redb workspace.
fn on_both_backends(scenario: impl Fn(&mut Workspace)) {
    let mut memory = Workspace::new();
    scenario(&mut memory);

    let dir = TempDir::new().expect("temp dir");
    let mut persistent = Workspace::with_redb(dir.path().join("program.redb")).expect("open");
    scenario(&mut persistent);
}

// =============================================================================
// TIER P0: CATALOG LOADING
// =============================================================================

mod p0_catalog {
    use super::*;

    /// P0.1: Phases and exercises come back in program order.
    #[test]
    fn catalog_is_ordered() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let numbers: Vec<u32> = catalog.phases().iter().map(|p| p.number).collect();
            assert_eq!(numbers, vec![1, 2, 3]);
            assert_eq!(catalog.total_active(), 5);
            assert_eq!(catalog.program().name, "Bihak Incubation");
        });
    }

    /// P0.2: An invalid definition leaves the store untouched.
    #[test]
    fn invalid_definition_rejected() {
        on_both_backends(|ws| {
            let mut def = program(ExerciseOrder::Open);
            def.phases[1].number = 1;
            assert!(matches!(
                ws.load_program(&def),
                Err(IncubatorError::InvalidInput(_))
            ));
            assert!(ws.catalog().expect("catalog").is_empty());
        });
    }

    /// P0.3: Reloading with an exercise removed deactivates it and can open
    /// the next phase.
    #[test]
    fn removed_exercise_stops_blocking() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let phase_one = exercises(&catalog, 0);
            pass(ws, team, phase_one[0], 10);
            assert!(!ws.access(team).expect("access").can_access_phase(catalog.phases()[1].id));

            let mut def = program(ExerciseOrder::Open);
            def.phases[0].exercises.truncate(1);
            ws.load_program(&def).expect("reload");

            let access = ws.access(team).expect("access");
            assert!(access.can_access_phase(catalog.phases()[1].id));
            assert!(access.exercise(phase_one[1]).is_none());
        });
    }
}

// =============================================================================
// TIER P1: SUBMISSION VERSIONING
// =============================================================================

mod p1_versioning {
    use super::*;

    /// P1.1: Versions run 1, 2, 3 and the last one is current.
    #[test]
    fn versions_increment_per_exercise() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let phase_one = exercises(&catalog, 0);
            let (a, b) = (phase_one[0], phase_one[1]);

            for at in [10, 11, 12] {
                save(ws, team, a, SaveMode::Draft, at).expect("save");
            }
            let other = save(ws, team, b, SaveMode::Draft, 13).expect("save");
            assert_eq!(other.version, 1);

            let history = ws.history(team, a).expect("history");
            let versions: Vec<u32> = history.iter().map(|s| s.version).collect();
            assert_eq!(versions, vec![1, 2, 3]);
            assert_eq!(
                ws.access(team).expect("access").exercise(a).and_then(|e| e.current_version),
                Some(3)
            );
        });
    }

    /// P1.2: Versions are counted per team.
    #[test]
    fn versions_are_per_team() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let first = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let second = ws.register_team("Inzozi", Timestamp(2)).expect("team").id;
            let exercise = exercises(&catalog, 0)[0];

            save(ws, first, exercise, SaveMode::Draft, 10).expect("save");
            save(ws, first, exercise, SaveMode::Draft, 11).expect("save");
            let theirs = save(ws, second, exercise, SaveMode::Draft, 12).expect("save");
            assert_eq!(theirs.version, 1);
        });
    }

    /// P1.3: A new save supersedes a version awaiting review.
    #[test]
    fn resubmission_supersedes_pending_version() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let exercise = exercises(&catalog, 0)[0];

            let old = save(ws, team, exercise, SaveMode::Submit, 10).expect("v1");
            save(ws, team, exercise, SaveMode::Submit, 11).expect("v2");

            let queue = ws.review_queue().expect("queue");
            assert_eq!(queue.len(), 1);
            assert_eq!(queue[0].version, 2);
            assert!(matches!(
                decide(ws, &old, ReviewDecision::Approve),
                Err(IncubatorError::SupersededVersion { current: 2, .. })
            ));
        });
    }
}

// =============================================================================
// TIER P2: PHASE GATING
// =============================================================================

mod p2_gating {
    use super::*;

    /// P2.1: Only the first phase is open for a new team.
    #[test]
    fn new_team_sees_first_phase_only() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let access = ws.access(team).expect("access");

            let unlocked: Vec<bool> = access.phases.iter().map(|p| p.unlocked).collect();
            assert_eq!(unlocked, vec![true, false, false]);
            assert_eq!(access.current_phase(), Some(catalog.phases()[0].id));

            let locked = exercises(&catalog, 1)[0];
            assert!(matches!(
                save(ws, team, locked, SaveMode::Draft, 10),
                Err(IncubatorError::ExerciseLocked(_))
            ));
        });
    }

    /// P2.2: Phases open one after another as approvals land.
    #[test]
    fn phases_unlock_in_sequence() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let phase_ids: Vec<PhaseId> = catalog.phases().iter().map(|p| p.id).collect();

            let mut at = 10;
            for (index, phase) in phase_ids.iter().enumerate() {
                assert!(ws.access(team).expect("access").can_access_phase(*phase));
                if let Some(next) = phase_ids.get(index + 1) {
                    assert!(!ws.access(team).expect("access").can_access_phase(*next));
                }
                for exercise in exercises(&catalog, index) {
                    pass(ws, team, exercise, at);
                    at += 10;
                }
            }
            assert_eq!(ws.access(team).expect("access").current_phase(), None);
        });
    }

    /// P2.3: A revision request keeps the next phase closed.
    #[test]
    fn revision_request_blocks_next_phase() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let phase_one = exercises(&catalog, 0);

            pass(ws, team, phase_one[0], 10);
            let sub = save(ws, team, phase_one[1], SaveMode::Submit, 20).expect("submit");
            decide(ws, &sub, ReviewDecision::RequestRevision).expect("revise");

            let access = ws.access(team).expect("access");
            assert!(!access.can_access_phase(catalog.phases()[1].id));
            assert_eq!(
                access.exercise_state(phase_one[1]),
                Some(ExerciseState::NeedsRevision)
            );

            // Revising and passing the exercise opens phase 2.
            pass(ws, team, phase_one[1], 30);
            assert!(ws
                .access(team)
                .expect("access")
                .can_access_phase(catalog.phases()[1].id));
        });
    }

    /// P2.4: Sequential order chains exercises inside a phase.
    #[test]
    fn sequential_order_within_phase() {
        on_both_backends(|ws| {
            let catalog = ws
                .load_program(&program(ExerciseOrder::Sequential))
                .expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let phase_one = exercises(&catalog, 0);

            assert!(matches!(
                save(ws, team, phase_one[1], SaveMode::Draft, 10),
                Err(IncubatorError::ExerciseLocked(_))
            ));
            pass(ws, team, phase_one[0], 20);
            save(ws, team, phase_one[1], SaveMode::Draft, 30).expect("now open");
        });
    }

    /// P2.5: Approved work cannot be saved again.
    #[test]
    fn approved_exercise_is_frozen() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let exercise = exercises(&catalog, 0)[0];
            pass(ws, team, exercise, 10);
            assert!(matches!(
                save(ws, team, exercise, SaveMode::Draft, 20),
                Err(IncubatorError::ExerciseAlreadyApproved(_))
            ));
        });
    }
}

// =============================================================================
// TIER P3: REVIEW AND COMPLETION
// =============================================================================

mod p3_completion {
    use super::*;

    /// P3.1: Completion is approved / total active, floored.
    #[test]
    fn percent_tracks_approvals() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;

            assert_eq!(ws.progress(team).expect("progress").percent, 0);

            let phase_one = exercises(&catalog, 0);
            pass(ws, team, phase_one[0], 10);
            assert_eq!(ws.progress(team).expect("progress").percent, 20);

            // Submitted but not approved does not count.
            save(ws, team, phase_one[1], SaveMode::Submit, 20).expect("submit");
            let progress = ws.progress(team).expect("progress");
            assert_eq!(progress.approved, 1);
            assert_eq!(progress.total, 5);
            assert_eq!(progress.phases[0].percent, 50);
        });
    }

    /// P3.2: A full run ends at 100% and allows graduation.
    #[test]
    fn full_run_graduates() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;

            assert!(matches!(
                ws.set_team_status(team, TeamStatus::Graduated),
                Err(IncubatorError::ProgramIncomplete { .. })
            ));

            let mut at = 10;
            for index in 0..catalog.phases().len() {
                for exercise in exercises(&catalog, index) {
                    pass(ws, team, exercise, at);
                    at += 10;
                }
            }

            let progress = ws.progress(team).expect("progress");
            assert_eq!(progress.percent, 100);
            assert!(progress.complete);
            let team = ws
                .set_team_status(team, TeamStatus::Graduated)
                .expect("graduate");
            assert_eq!(team.status, TeamStatus::Graduated);
        });
    }

    /// P3.3: Review history keeps every decision.
    #[test]
    fn reviews_are_recorded() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let exercise = exercises(&catalog, 0)[0];

            let first = save(ws, team, exercise, SaveMode::Submit, 10).expect("v1");
            let revised = decide(ws, &first, ReviewDecision::RequestRevision).expect("revise");
            assert_eq!(revised.status, SubmissionStatus::RevisionRequested);

            let second = save(ws, team, exercise, SaveMode::Submit, 20).expect("v2");
            decide(ws, &second, ReviewDecision::Approve).expect("approve");

            assert_eq!(ws.reviews(first.id).expect("reviews").len(), 1);
            assert_eq!(
                ws.reviews(second.id).expect("reviews")[0].decision,
                ReviewDecision::Approve
            );
            assert!(ws.review_queue().expect("queue").is_empty());
        });
    }

    /// P3.4: Withdrawn teams drop out of the queue and cannot save.
    #[test]
    fn withdrawn_team_is_frozen() {
        on_both_backends(|ws| {
            let catalog = ws.load_program(&program(ExerciseOrder::Open)).expect("load");
            let team = ws.register_team("Umurava", Timestamp(1)).expect("team").id;
            let exercise = exercises(&catalog, 0)[0];
            save(ws, team, exercise, SaveMode::Submit, 10).expect("submit");

            ws.set_team_status(team, TeamStatus::Withdrawn)
                .expect("withdraw");
            assert!(ws.review_queue().expect("queue").is_empty());
            assert!(matches!(
                save(ws, team, exercise, SaveMode::Draft, 20),
                Err(IncubatorError::TeamInactive(_))
            ));
        });
    }
}
