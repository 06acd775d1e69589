//! # Program Catalog
//!
//! The ordered list of phases and their exercises.
//!
//! A [`ProgramDefinition`] is the declarative form (usually a TOML file kept
//! by program staff). A [`Catalog`] is the resolved, ordered view built from
//! store rows that the gate and the progress assessor work on.
//!
//! ```toml
//! [program]
//! name = "Bihak Incubation Program"
//! exercise_order = "open"
//!
//! [[phases]]
//! number = 1
//! title = "Ideation"
//!
//! [[phases.exercises]]
//! number = 1
//! title = "Problem statement"
//! ```

use crate::primitives::{
    MAX_DESCRIPTION_LENGTH, MAX_EXERCISES_PER_PHASE, MAX_PHASES, MAX_TITLE_LENGTH, limit_text,
    require_text,
};
use crate::{Exercise, ExerciseId, IncubatorError, Phase, PhaseId, ProgramInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DECLARATIVE DEFINITION
// =============================================================================

/// Declarative program layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub program: ProgramInfo,
    #[serde(default)]
    pub phases: Vec<PhaseDefinition>,
}

/// One phase in a [`ProgramDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseDefinition>,
}

/// One exercise in a [`PhaseDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProgramDefinition {
    /// Check numbering and field limits.
    ///
    /// Phase numbers must be unique and start at 1 or above; exercise numbers
    /// must be unique within their phase.
    pub fn validate(&self) -> Result<(), IncubatorError> {
        require_text("program name", &self.program.name, MAX_TITLE_LENGTH)?;
        limit_text(
            "program description",
            &self.program.description,
            MAX_DESCRIPTION_LENGTH,
        )?;

        if self.phases.len() > MAX_PHASES {
            return Err(IncubatorError::InvalidInput(format!(
                "program has {} phases, maximum is {}",
                self.phases.len(),
                MAX_PHASES
            )));
        }

        let mut phase_numbers = BTreeSet::new();
        for phase in &self.phases {
            if phase.number == 0 {
                return Err(IncubatorError::InvalidInput(
                    "phase numbers start at 1".to_string(),
                ));
            }
            if !phase_numbers.insert(phase.number) {
                return Err(IncubatorError::InvalidInput(format!(
                    "duplicate phase number {}",
                    phase.number
                )));
            }
            require_text("phase title", &phase.title, MAX_TITLE_LENGTH)?;
            limit_text(
                "phase description",
                &phase.description,
                MAX_DESCRIPTION_LENGTH,
            )?;

            if phase.exercises.len() > MAX_EXERCISES_PER_PHASE {
                return Err(IncubatorError::InvalidInput(format!(
                    "phase {} has {} exercises, maximum is {}",
                    phase.number,
                    phase.exercises.len(),
                    MAX_EXERCISES_PER_PHASE
                )));
            }

            let mut exercise_numbers = BTreeSet::new();
            for exercise in &phase.exercises {
                if exercise.number == 0 {
                    return Err(IncubatorError::InvalidInput(format!(
                        "exercise numbers in phase {} start at 1",
                        phase.number
                    )));
                }
                if !exercise_numbers.insert(exercise.number) {
                    return Err(IncubatorError::InvalidInput(format!(
                        "duplicate exercise number {} in phase {}",
                        exercise.number, phase.number
                    )));
                }
                require_text("exercise title", &exercise.title, MAX_TITLE_LENGTH)?;
                limit_text(
                    "exercise instructions",
                    &exercise.instructions,
                    MAX_DESCRIPTION_LENGTH,
                )?;
            }
        }

        Ok(())
    }
}

// =============================================================================
// RESOLVED CATALOG
// =============================================================================

/// Ordered, read-only view of the program.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    program: ProgramInfo,
    /// Sorted by phase number.
    phases: Vec<Phase>,
    /// Per phase, sorted by exercise number.
    exercises: BTreeMap<PhaseId, Vec<Exercise>>,
    /// Exercise -> owning phase.
    index: BTreeMap<ExerciseId, PhaseId>,
}

impl Catalog {
    /// Build the ordered view from store rows.
    ///
    /// Exercises that reference a phase not in `phases` are dropped.
    #[must_use]
    pub fn from_parts(program: ProgramInfo, mut phases: Vec<Phase>, exercises: Vec<Exercise>) -> Self {
        phases.sort_by_key(|p| (p.number, p.id));

        let known: BTreeSet<PhaseId> = phases.iter().map(|p| p.id).collect();
        let mut grouped: BTreeMap<PhaseId, Vec<Exercise>> =
            phases.iter().map(|p| (p.id, Vec::new())).collect();
        let mut index = BTreeMap::new();

        for exercise in exercises {
            if !known.contains(&exercise.phase) {
                continue;
            }
            index.insert(exercise.id, exercise.phase);
            grouped.entry(exercise.phase).or_default().push(exercise);
        }
        for list in grouped.values_mut() {
            list.sort_by_key(|e| (e.number, e.id));
        }

        Self {
            program,
            phases,
            exercises: grouped,
            index,
        }
    }

    #[must_use]
    pub fn program(&self) -> &ProgramInfo {
        &self.program
    }

    /// Phases in program order.
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    #[must_use]
    pub fn phase(&self, id: PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// All exercises of a phase, active or not, in order.
    #[must_use]
    pub fn exercises_in(&self, phase: PhaseId) -> &[Exercise] {
        self.exercises.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Active exercises of a phase, in order.
    pub fn active_exercises_in(&self, phase: PhaseId) -> impl Iterator<Item = &Exercise> {
        self.exercises_in(phase).iter().filter(|e| e.active)
    }

    #[must_use]
    pub fn exercise(&self, id: ExerciseId) -> Option<&Exercise> {
        let phase = self.index.get(&id)?;
        self.exercises_in(*phase).iter().find(|e| e.id == id)
    }

    /// Phase that owns an exercise.
    #[must_use]
    pub fn phase_of(&self, exercise: ExerciseId) -> Option<&Phase> {
        let phase = self.index.get(&exercise)?;
        self.phase(*phase)
    }

    /// Number of active exercises across all phases.
    #[must_use]
    pub fn total_active(&self) -> usize {
        self.exercises
            .values()
            .map(|list| list.iter().filter(|e| e.active).count())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
