//! # Configuration
//!
//! Server settings from environment variables, program definitions from TOML
//! files, and the wall clock the engine never reads itself.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `BIHAK_API_KEY` | key for team-facing endpoints | unset (open) |
//! | `BIHAK_ADMIN_KEY` | key for review and admin endpoints | falls back to `BIHAK_API_KEY` |
//! | `BIHAK_RATE_LIMIT` | requests per second, 0 disables | 100 |
//! | `BIHAK_CORS_ORIGINS` | comma-separated origins or `*` | localhost only |

use bihak_core::{IncubatorError, ProgramDefinition, Timestamp};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default rate limit in requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Maximum size of a program definition file (1 MB).
pub const MAX_PROGRAM_FILE_SIZE: u64 = 1024 * 1024;

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub api_key: Option<String>,
    pub admin_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Raw `BIHAK_CORS_ORIGINS` value.
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            admin_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ServerConfig {
    /// Read every setting from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_env("BIHAK_API_KEY"),
            admin_key: non_empty_env("BIHAK_ADMIN_KEY"),
            rate_limit: non_empty_env("BIHAK_RATE_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT),
            cors_origins: non_empty_env("BIHAK_CORS_ORIGINS"),
        }
    }

    /// Keys accepted on team-facing endpoints: either key that is set.
    /// Empty means open access.
    #[must_use]
    pub fn team_keys(&self) -> Vec<&str> {
        self.api_key
            .iter()
            .chain(self.admin_key.iter())
            .map(String::as_str)
            .collect()
    }

    /// Keys accepted on admin endpoints. Empty means open access.
    #[must_use]
    pub fn admin_keys(&self) -> Vec<&str> {
        self.admin_key
            .as_deref()
            .or(self.api_key.as_deref())
            .into_iter()
            .collect()
    }
}

/// Parse and validate a TOML program definition.
pub fn parse_program(text: &str) -> Result<ProgramDefinition, IncubatorError> {
    let definition: ProgramDefinition = toml::from_str(text)
        .map_err(|e| IncubatorError::InvalidInput(format!("Invalid program file: {}", e)))?;
    definition.validate()?;
    Ok(definition)
}

/// Read a TOML program definition from disk.
pub fn load_program_file(path: &Path) -> Result<ProgramDefinition, IncubatorError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IncubatorError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_PROGRAM_FILE_SIZE {
        return Err(IncubatorError::InvalidInput(format!(
            "Program file is {} bytes, maximum is {} bytes",
            metadata.len(),
            MAX_PROGRAM_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| IncubatorError::IoError(format!("Failed to read program file: {}", e)))?;
    parse_program(&text)
}

/// Current wall-clock time. A clock before 1970 reads as 0.
#[must_use]
pub fn now() -> Timestamp {
    Timestamp(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    )
}
