//! Output file naming for processed artifacts.

use std::sync::OnceLock;

use regex::Regex;

const FALLBACK_BASE_NAME: &str = "image";

fn extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.[^/.]+$").expect("Invalid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"))
}

fn disallowed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9-]").expect("Invalid regex"))
}

/// Builds a web-friendly output name such as `summer-sale-800x600.jpg`.
///
/// # Panics
///
/// Panics if an internal regex is invalid.
#[must_use]
pub fn derive_output_filename(source_name: &str, width: u32, height: u32, extension: &str) -> String {
    let stem = extension_regex().replace(source_name, "");
    let lowered = stem.to_lowercase();
    let dashed = whitespace_regex().replace_all(&lowered, "-");
    let safe = disallowed_regex().replace_all(&dashed, "");

    let base = if safe.is_empty() {
        FALLBACK_BASE_NAME
    } else {
        safe.as_ref()
    };

    format!("{base}-{width}x{height}.{extension}")
}
