//! Terminal summary of a pass: one block per directory, one line per year.

use crate::archive::{DirectoryStatus, PassReport};
use crate::util::format_bytes;

pub fn render(report: &PassReport) -> String {
    let mut output = String::new();

    if let Some(threshold) = report.threshold {
        output.push_str(&format!("threshold: {}\n", threshold.format("%Y-%m-%d %H:%M:%S")));
    }

    if report.directories.is_empty() {
        output.push_str("No directories processed.\n");
    }

    for dir in &report.directories {
        output.push_str(&format!("\n{}\n", dir.path.display()));
        output.push_str(&"-".repeat(40));
        output.push('\n');

        match &dir.status {
            DirectoryStatus::Missing => output.push_str("  missing, skipped\n"),
            DirectoryStatus::Failed(reason) => output.push_str(&format!("  failed: {reason}\n")),
            DirectoryStatus::Empty => output.push_str("  nothing old enough\n"),
            DirectoryStatus::Archived => {
                for year in &dir.years {
                    let name = year
                        .container
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| year.year.to_string());

                    if let Some(error) = &year.error {
                        output.push_str(&format!("  {name:12} abandoned: {error}\n"));
                        continue;
                    }

                    output.push_str(&format!(
                        "  {name:12} {:>4} added {:>10}",
                        year.added,
                        format_bytes(year.bytes_added)
                    ));
                    if year.already_archived > 0 {
                        output.push_str(&format!(", {} already archived", year.already_archived));
                    }
                    if year.deleted > 0 {
                        output.push_str(&format!(", {} deleted", year.deleted));
                    }
                    let problems = year.failed + year.skipped + year.delete_failed;
                    if problems > 0 {
                        output.push_str(&format!(", {problems} problems"));
                    }
                    output.push('\n');
                }
            }
        }
    }

    let duration = report.finished_at - report.started_at;
    output.push_str(&format!(
        "\n{} added, {} deleted, {} failures in {:.2}s",
        report.files_added(),
        report.files_deleted(),
        report.failures(),
        duration.num_milliseconds() as f64 / 1000.0
    ));
    if report.cancelled {
        output.push_str(" (cancelled)");
    }
    output.push('\n');

    output
}
