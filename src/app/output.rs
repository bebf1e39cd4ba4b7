//! End-of-run summary printed to stdout.

use std::path::Path;

use harvester_core::{Acquisition, DownloadReport};

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub(crate) fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// Summary lines: totals, then every unrecovered failure with its last error.
pub(crate) fn summary_lines(
    acquisition: &Acquisition,
    downloads: &DownloadReport,
    report_path: &Path,
    width: usize,
) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Collected {} of ~{} videos from @{} ({})",
            acquisition.candidates.len(),
            acquisition.estimated_total,
            acquisition.profile_handle,
            acquisition.stop_reason
        ),
        format!(
            "Downloaded {}, failed {}, skipped {}",
            downloads.succeeded().len(),
            downloads.failures().len(),
            downloads.skipped().len()
        ),
    ];

    if !downloads.failures().is_empty() {
        lines.push("Failed downloads:".to_string());
        for (index, failure) in downloads.failures().iter().enumerate() {
            lines.push(truncate_to_width(
                &format!(
                    "  {}. video #{} ({}): {}",
                    index + 1,
                    failure.ordinal,
                    failure.candidate_id,
                    failure.last_error
                ),
                width,
            ));
        }
    }

    lines.push(format!("Report written to {}", report_path.display()));
    lines
}

/// Prints [`summary_lines`] to stdout.
pub(crate) fn print_summary(acquisition: &Acquisition, downloads: &DownloadReport, report_path: &Path) {
    for line in summary_lines(acquisition, downloads, report_path, terminal_width()) {
        println!("{line}");
    }
}
