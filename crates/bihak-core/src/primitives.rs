//! # Engine Primitives
//!
//! Hardcoded limits and format constants for the incubator engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Every user-supplied string is checked against them before it reaches a
//! store, so no backend has to guard against unbounded input.

use crate::IncubatorError;

/// Version number given to the first save of an exercise.
pub const FIRST_VERSION: u32 = 1;

/// Magic bytes for the snapshot binary format header.
pub const MAGIC_BYTES: &[u8; 4] = b"BIHK";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// CATALOG LIMITS
// =============================================================================

/// Maximum number of phases in one program.
pub const MAX_PHASES: usize = 64;

/// Maximum number of exercises in one phase.
pub const MAX_EXERCISES_PER_PHASE: usize = 128;

/// Maximum length for program, phase and exercise titles.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for descriptions and exercise instructions (16KB).
pub const MAX_DESCRIPTION_LENGTH: usize = 16 * 1024;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for team and member names.
pub const MAX_NAME_LENGTH: usize = 120;

/// Maximum length for member email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for submission content (256KB).
pub const MAX_CONTENT_LENGTH: usize = 256 * 1024;

/// Maximum length for an attachment reference.
pub const MAX_ATTACHMENT_LENGTH: usize = 1024;

/// Maximum length for reviewer feedback (32KB).
pub const MAX_FEEDBACK_LENGTH: usize = 32 * 1024;

/// Maximum number of members on one team.
pub const MAX_TEAM_MEMBERS: usize = 32;

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

/// Reject empty, whitespace-only or over-long text.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<(), IncubatorError> {
    if value.trim().is_empty() {
        return Err(IncubatorError::InvalidInput(format!(
            "{} must not be empty",
            field
        )));
    }
    limit_text(field, value, max)
}

/// Reject over-long text; empty is fine.
pub(crate) fn limit_text(field: &str, value: &str, max: usize) -> Result<(), IncubatorError> {
    if value.len() > max {
        return Err(IncubatorError::InvalidInput(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}
