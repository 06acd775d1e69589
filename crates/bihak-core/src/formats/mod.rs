//! # Formats Module
//!
//! Binary export/import of a whole program.
//! File I/O operations are in the app layer.

pub mod snapshot;

pub use snapshot::{
    MAX_SNAPSHOT_SIZE, SnapshotHeader, snapshot_checksum, snapshot_from_bytes, snapshot_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use snapshot::snapshot_crypto_hash;
