//! Deterministic cache keys derived from artifact identity and parameters.

use sha2::{Digest, Sha256};

use super::artifact::{ArtifactIdentity, ProcessingParameters};

/// Version tag of the key encoding. Bump whenever the canonical form changes.
pub const CACHE_KEY_VERSION: &str = "v1";

const FIELD_SEPARATOR: char = '|';
const ESCAPE_CHAR: char = '\\';

/// Opaque, storage-safe cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for an identity and parameter set.
    #[must_use]
    pub fn derive(identity: &ArtifactIdentity, params: &ProcessingParameters) -> Self {
        let canonical = canonical_form(identity, params);
        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{CACHE_KEY_VERSION}-{}", hex::encode(digest)))
    }

    /// Rebuilds a key from its stored string form.
    pub(crate) fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives the cache key for an identity and parameter set.
#[must_use]
pub fn derive_key(identity: &ArtifactIdentity, params: &ProcessingParameters) -> CacheKey {
    CacheKey::derive(identity, params)
}

/// Joins all seven fields with an escaped separator, prefixed by the version tag.
fn canonical_form(identity: &ArtifactIdentity, params: &ProcessingParameters) -> String {
    let fields = [
        escape_field(identity.name()),
        identity.byte_size().to_string(),
        identity.last_modified_ms().to_string(),
        params.compression_level().to_string(),
        params.max_width().to_string(),
        params.max_height().to_string(),
        params.background_removal().to_string(),
        escape_field(params.model_name()),
    ];

    let mut out = String::from(CACHE_KEY_VERSION);
    for field in fields {
        out.push(FIELD_SEPARATOR);
        out.push_str(&field);
    }
    out
}

fn escape_field(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == FIELD_SEPARATOR || c == ESCAPE_CHAR {
            escaped.push(ESCAPE_CHAR);
        }
        escaped.push(c);
    }
    escaped
}
