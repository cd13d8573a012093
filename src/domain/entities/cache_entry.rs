//! Result cache records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cache_key::CacheKey;

/// Metadata record stored next to every cached payload.
///
/// The metadata record is the commit marker of an entry: it is written after
/// the payload and removed before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheEntryMetadata {
    /// Output file name of the processed artifact.
    pub derived_filename: String,
    /// Name of the artifact the entry was produced from.
    pub source_artifact_name: String,
    /// When the entry was written or last used.
    pub stored_at: DateTime<Utc>,
    /// Length of the payload record; a mismatch marks the entry as corrupt.
    pub payload_size: u64,
}

/// A complete cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Entry key.
    pub key: CacheKey,
    /// Processed output bytes.
    pub result_blob: Bytes,
    /// Entry metadata.
    pub metadata: CacheEntryMetadata,
}
