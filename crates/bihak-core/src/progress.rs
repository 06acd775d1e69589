//! # Completion Aggregation
//!
//! Progress is derived from an [`AccessMap`] and never stored: every
//! dashboard view recomputes it from the current submission versions.
//!
//! ```text
//! percent = approved * 100 / total    (integer floor, 0 when total == 0)
//! ```
//!
//! Only active exercises are counted.

use crate::gate::{AccessMap, ExerciseState};
use crate::{IncubatorError, PhaseId, TeamId};
use serde::{Deserialize, Serialize};

/// Integer percentage, floored and capped at 100.
#[must_use]
pub fn percent(approved: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = approved.saturating_mul(100) / total;
    value.min(100) as u8
}

/// Progress through one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: PhaseId,
    pub number: u32,
    pub title: String,
    pub approved: usize,
    pub total: usize,
    pub percent: u8,
    pub unlocked: bool,
    pub complete: bool,
}

/// Progress through the whole program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramProgress {
    pub team: TeamId,
    pub approved: usize,
    pub total: usize,
    pub percent: u8,
    pub phases: Vec<PhaseProgress>,
    /// First unlocked phase still open.
    pub current_phase: Option<PhaseId>,
    /// Every active exercise approved. False for a program with no exercises.
    pub complete: bool,
}

impl ProgramProgress {
    /// Aggregate an access map.
    #[must_use]
    pub fn from_access(team: TeamId, access: &AccessMap) -> Self {
        let phases: Vec<PhaseProgress> = access
            .phases
            .iter()
            .map(|p| {
                let total = p.exercises.len();
                let approved = p
                    .exercises
                    .iter()
                    .filter(|e| e.state == ExerciseState::Approved)
                    .count();
                PhaseProgress {
                    phase: p.phase,
                    number: p.number,
                    title: p.title.clone(),
                    approved,
                    total,
                    percent: percent(approved, total),
                    unlocked: p.unlocked,
                    complete: p.complete,
                }
            })
            .collect();

        let approved: usize = phases.iter().map(|p| p.approved).sum();
        let total: usize = phases.iter().map(|p| p.total).sum();

        Self {
            team,
            approved,
            total,
            percent: percent(approved, total),
            phases,
            current_phase: access.current_phase(),
            complete: total > 0 && approved == total,
        }
    }

    /// Graduation requires a complete program.
    pub fn ensure_complete(&self) -> Result<(), IncubatorError> {
        if self.complete {
            Ok(())
        } else {
            Err(IncubatorError::ProgramIncomplete {
                team: self.team,
                percent: self.percent,
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExerciseId;
    use crate::gate::{ExerciseAccess, PhaseAccess};

    fn exercise(id: u64, state: ExerciseState) -> ExerciseAccess {
        ExerciseAccess {
            exercise: ExerciseId(id),
            number: id as u32,
            title: format!("Exercise {}", id),
            accessible: state != ExerciseState::Locked,
            state,
            current_version: None,
        }
    }

    fn phase(id: u64, unlocked: bool, exercises: Vec<ExerciseAccess>) -> PhaseAccess {
        let complete = exercises.iter().all(|e| e.state == ExerciseState::Approved);
        PhaseAccess {
            phase: PhaseId(id),
            number: id as u32,
            title: format!("Phase {}", id),
            unlocked,
            complete,
            exercises,
        }
    }

    #[test]
    fn percent_floors() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 7), 0);
    }

    #[test]
    fn percent_of_nothing_is_zero() {
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn aggregates_across_phases() {
        let access = AccessMap {
            phases: vec![
                phase(
                    1,
                    true,
                    vec![
                        exercise(1, ExerciseState::Approved),
                        exercise(2, ExerciseState::Approved),
                    ],
                ),
                phase(
                    2,
                    true,
                    vec![
                        exercise(3, ExerciseState::AwaitingReview),
                        exercise(4, ExerciseState::NotStarted),
                        exercise(5, ExerciseState::Approved),
                    ],
                ),
            ],
        };
        let progress = ProgramProgress::from_access(TeamId(1), &access);
        assert_eq!(progress.approved, 3);
        assert_eq!(progress.total, 5);
        assert_eq!(progress.percent, 60);
        assert_eq!(progress.phases[0].percent, 100);
        assert_eq!(progress.phases[1].percent, 33);
        assert_eq!(progress.current_phase, Some(PhaseId(2)));
        assert!(!progress.complete);
        assert!(matches!(
            progress.ensure_complete(),
            Err(IncubatorError::ProgramIncomplete { percent: 60, .. })
        ));
    }

    #[test]
    fn full_approval_is_complete() {
        let access = AccessMap {
            phases: vec![phase(1, true, vec![exercise(1, ExerciseState::Approved)])],
        };
        let progress = ProgramProgress::from_access(TeamId(1), &access);
        assert!(progress.complete);
        assert_eq!(progress.percent, 100);
        assert!(progress.ensure_complete().is_ok());
    }

    #[test]
    fn empty_program_is_not_complete() {
        let progress = ProgramProgress::from_access(TeamId(1), &AccessMap::default());
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percent, 0);
        assert!(!progress.complete);
    }
}
