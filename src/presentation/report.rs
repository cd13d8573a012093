//! Plain text rendering of command results.

use std::fmt::Write;

use crate::application::services::{CacheStats, Delivery};
use crate::domain::entities::{BatchProgress, BatchReport, ProcessedResult, UploadSummary, UsageStats};

/// Formats a byte count with a binary unit.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_bytes(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let sign = if bytes < 0 { "-" } else { "" };
    let mut value = bytes.unsigned_abs() as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{sign}{} B", bytes.unsigned_abs())
    } else {
        format!("{sign}{value:.1} {}", UNITS[unit])
    }
}

/// One-line progress update.
#[must_use]
pub fn progress_line(progress: &BatchProgress) -> String {
    format!(
        "[{}/{}] {}% ({} failed)",
        progress.completed_items,
        progress.total_items,
        progress.percent(),
        progress.failed_items
    )
}

/// Summary of a processing batch. `names` maps input positions to file names.
#[must_use]
pub fn batch_report(report: &BatchReport<ProcessedResult>, names: &[String]) -> String {
    let mut out = String::new();
    let progress = &report.progress;

    let _ = writeln!(
        out,
        "Processed {} of {} images: {} succeeded, {} failed",
        progress.completed_items, progress.total_items, progress.succeeded_items, progress.failed_items
    );

    let cached = report.outputs.iter().filter(|(_, r)| r.from_cache).count();
    if cached > 0 {
        let _ = writeln!(out, "  {cached} served from cache");
    }

    for (_, result) in &report.outputs {
        if result.was_retried() {
            let _ = writeln!(
                out,
                "  {} needed {} attempts",
                result.source_name, result.attempts
            );
        }
    }

    for failure in &report.failures {
        let name = names.get(failure.index).map_or("?", String::as_str);
        let _ = writeln!(out, "  failed {name}: {}", failure.message);
    }

    if report.cancelled {
        let _ = writeln!(
            out,
            "Cancelled, {} images were not started",
            report.skipped_items
        );
    }

    out
}

/// Lists where every result was written.
#[must_use]
pub fn deliveries(deliveries: &[Delivery]) -> String {
    let mut out = String::new();
    for delivery in deliveries {
        match &delivery.outcome {
            Ok(location) => {
                let _ = writeln!(out, "  wrote {location}");
            }
            Err(e) => {
                let _ = writeln!(out, "  could not write {}: {e}", delivery.derived_filename);
            }
        }
    }
    out
}

/// Summary of a batch upload.
#[must_use]
pub fn upload_summary(summary: &UploadSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Uploaded {} images, {} failed",
        summary.success_count, summary.failure_count
    );
    for url in &summary.urls {
        let _ = writeln!(out, "  {url}");
    }
    for error in &summary.errors {
        let _ = writeln!(out, "  failed {error}");
    }
    out
}

/// Usage statistics and cache occupancy.
#[must_use]
pub fn usage_stats(stats: &UsageStats, cache: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Images processed:     {}", stats.total_images);
    let _ = writeln!(out, "Downloads:            {}", stats.total_downloads);
    let _ = writeln!(out, "Background removals:  {}", stats.background_removal_count);
    let _ = writeln!(out, "Bytes saved:          {}", human_bytes(stats.total_saved_bytes));
    let _ = writeln!(
        out,
        "Average compression:  {:.1}%",
        stats.average_compression_ratio * 100.0
    );
    let _ = writeln!(
        out,
        "Average time:         {:.0} ms",
        stats.average_processing_time_ms
    );
    let _ = writeln!(out, "Sessions:             {}", stats.total_sessions_count);
    let last_session = stats
        .last_session
        .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string());
    let _ = writeln!(out, "Last session:         {last_session}");
    let _ = writeln!(
        out,
        "Cached results:       {} ({})",
        cache.entries,
        human_bytes(i64::try_from(cache.total_bytes).unwrap_or(i64::MAX))
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ItemFailure;
    use bytes::Bytes;
    use test_case::test_case;

    #[test_case(0, "0 B" ; "zero")]
    #[test_case(1023, "1023 B" ; "below_kib")]
    #[test_case(1536, "1.5 KiB" ; "kib")]
    #[test_case(5 * 1024 * 1024, "5.0 MiB" ; "mib")]
    #[test_case(-2048, "-2.0 KiB" ; "negative")]
    fn test_human_bytes(bytes: i64, expected: &str) {
        assert_eq!(human_bytes(bytes), expected);
    }

    fn result(name: &str, attempts: u32, from_cache: bool) -> ProcessedResult {
        ProcessedResult {
            source_name: name.to_string(),
            derived_filename: format!("{name}-1x1.jpg"),
            bytes: Bytes::from_static(b"x"),
            original_size: 10,
            attempts,
            from_cache,
        }
    }

    #[test]
    fn test_batch_report_lists_failures_by_name() {
        let report = BatchReport {
            progress: BatchProgress {
                total_items: 3,
                completed_items: 3,
                succeeded_items: 2,
                failed_items: 1,
            },
            outputs: vec![(0, result("a", 2, false)), (2, result("c", 0, true))],
            failures: vec![ItemFailure {
                index: 1,
                message: "bad header".to_string(),
            }],
            cancelled: false,
            skipped_items: 0,
        };
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let text = batch_report(&report, &names);

        assert!(text.contains("Processed 3 of 3 images: 2 succeeded, 1 failed"));
        assert!(text.contains("1 served from cache"));
        assert!(text.contains("a needed 2 attempts"));
        assert!(text.contains("failed b: bad header"));
        assert!(!text.contains("Cancelled"));
    }

    #[test]
    fn test_upload_summary() {
        let summary = UploadSummary {
            success_count: 1,
            failure_count: 1,
            errors: vec!["b-1x1.jpg: Upload failed".to_string()],
            urls: vec!["https://cdn.example.com/a.jpg".to_string()],
        };

        let text = upload_summary(&summary);

        assert!(text.starts_with("Uploaded 1 images, 1 failed"));
        assert!(text.contains("https://cdn.example.com/a.jpg"));
        assert!(text.contains("failed b-1x1.jpg: Upload failed"));
    }

    #[test]
    fn test_progress_line() {
        let progress = BatchProgress {
            total_items: 4,
            completed_items: 1,
            succeeded_items: 1,
            failed_items: 0,
        };
        assert_eq!(progress_line(&progress), "[1/4] 25% (0 failed)");
    }
}
