//! # Snapshot Format
//!
//! Binary serialization for a full program export.
//!
//! Format: Header (13 bytes) + postcard-serialized [`Snapshot`].
//! - 4 bytes: Magic ("BIHK")
//! - 1 byte: Version
//! - 8 bytes: Checksum of the payload (little-endian)
//!
//! ## Validation
//!
//! Size limits, header and checksum are all checked BEFORE the payload is
//! deserialized, so corrupted or oversized input is rejected without
//! allocating for it.

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES};
use crate::store::Snapshot;
use crate::IncubatorError;

/// Maximum accepted export size (256 MB).
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

/// Header length in bytes.
const HEADER_SIZE: usize = 13;

// =============================================================================
// HEADER
// =============================================================================

/// Precedes every exported snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub checksum: u64,
}

impl SnapshotHeader {
    /// Header for a payload in the current format.
    #[must_use]
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            checksum: checksum(payload),
        }
    }

    pub fn validate(&self) -> Result<(), IncubatorError> {
        if &self.magic != MAGIC_BYTES {
            return Err(IncubatorError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(IncubatorError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5..13].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IncubatorError> {
        let (Some(magic), Some(version), Some(checksum)) = (
            bytes.get(0..4),
            bytes.get(4),
            bytes.get(5..HEADER_SIZE),
        ) else {
            return Err(IncubatorError::SerializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic_bytes = [0u8; 4];
        magic_bytes.copy_from_slice(magic);
        let mut checksum_bytes = [0u8; 8];
        checksum_bytes.copy_from_slice(checksum);
        Ok(Self {
            magic: magic_bytes,
            version: *version,
            checksum: u64::from_le_bytes(checksum_bytes),
        })
    }
}

// =============================================================================
// CHECKSUM
// =============================================================================

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over raw bytes.
///
/// Detects accidental corruption only. It is not a cryptographic hash; use
/// the `crypto-hash` feature for a BLAKE3 digest.
fn checksum(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic checksum of a snapshot.
///
/// Equal snapshots always give equal checksums.
pub fn snapshot_checksum(snapshot: &Snapshot) -> Result<u64, IncubatorError> {
    Ok(checksum(&encode_payload(snapshot)?))
}

/// BLAKE3 hex digest of the exported bytes.
///
/// Only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_crypto_hash(snapshot: &Snapshot) -> Result<String, IncubatorError> {
    let bytes = snapshot_to_bytes(snapshot)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

fn encode_payload(snapshot: &Snapshot) -> Result<Vec<u8>, IncubatorError> {
    postcard::to_stdvec(snapshot).map_err(|e| IncubatorError::SerializationError(e.to_string()))
}

/// Serialize a snapshot to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, IncubatorError> {
    let payload = encode_payload(snapshot)?;
    let header = SnapshotHeader::for_payload(&payload);

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize and validate a snapshot.
///
/// Checks, in order: minimum size, maximum size, header, checksum, payload,
/// referential integrity.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, IncubatorError> {
    if bytes.len() < HEADER_SIZE {
        return Err(IncubatorError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(IncubatorError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let computed = checksum(payload);
    if computed != header.checksum {
        return Err(IncubatorError::SerializationError(format!(
            "Checksum mismatch: header {:#018x}, payload {:#018x}",
            header.checksum, computed
        )));
    }

    let snapshot: Snapshot = postcard::from_bytes(payload).map_err(|e| {
        IncubatorError::SerializationError(format!("Failed to deserialize snapshot: {}", e))
    })?;
    snapshot.validate()?;
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
