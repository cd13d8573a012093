//! Upload request and response types.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Metadata attached to an uploaded artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Product the image belongs to.
    pub product_id: Option<String>,
    /// Title shown by the target.
    pub title: Option<String>,
    /// Category names.
    pub categories: Vec<String>,
    /// Tags.
    pub tags: Vec<String>,
}

/// Successful upload acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// URL of the uploaded image.
    pub url: String,
}

/// Aggregate outcome of a batch upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Number of uploads that succeeded.
    pub success_count: usize,
    /// Number of uploads that failed.
    pub failure_count: usize,
    /// `"<file name>: <message>"` for every failure.
    pub errors: Vec<String>,
    /// URLs of the successful uploads, in input order.
    pub urls: Vec<String>,
}

/// Upload API key. Wiped from memory on drop and masked when printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey {
    value: String,
}

impl ApiKey {
    /// Creates a key, `None` if it is blank.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return None;
        }
        Some(Self { value })
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the key masked for display.
    #[must_use]
    pub fn masked(&self) -> String {
        if self.value.len() <= 8 {
            return "*".repeat(self.value.len());
        }

        let visible_prefix = &self.value[..4];
        format!("{visible_prefix}...")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &self.masked())
            .finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_rejected() {
        assert!(ApiKey::new("   ").is_none());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let key = ApiKey::new("sk_live_0123456789abcdef").unwrap();
        let debug_output = format!("{key:?}");

        assert!(!debug_output.contains("0123456789abcdef"));
        assert!(debug_output.contains("sk_l..."));
    }

    #[test]
    fn test_short_key_is_fully_masked() {
        assert_eq!(ApiKey::new("abc").unwrap().masked(), "***");
    }
}
