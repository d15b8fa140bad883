//! Scan pass: select aged files per watched directory, bucket them by year
//! and hand each bucket to the archive writer.
//!
//! Failures stay as narrow as possible. A file that cannot be added only
//! affects that file, a container that cannot be opened only affects its
//! year, and a directory that cannot be read only affects that directory.

pub mod grouper;
pub mod selector;
pub mod writer;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Months};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use grouper::group_by_year;
use writer::{ArchiveWriter, YearReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DirectoryStatus {
    Missing,
    Failed(String),
    Empty,
    Archived,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryReport {
    pub path: PathBuf,
    pub status: DirectoryStatus,
    pub candidates: usize,
    pub years: Vec<YearReport>,
}

impl DirectoryReport {
    fn new(path: &Path, status: DirectoryStatus) -> Self {
        DirectoryReport {
            path: path.to_path_buf(),
            status,
            candidates: 0,
            years: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<DateTime<Local>>,
    pub cancelled: bool,
    pub directories: Vec<DirectoryReport>,
}

impl PassReport {
    pub fn files_added(&self) -> usize {
        self.year_reports().map(|y| y.added).sum()
    }

    pub fn files_deleted(&self) -> usize {
        self.year_reports().map(|y| y.deleted).sum()
    }

    pub fn failures(&self) -> usize {
        let dir_failures = self
            .directories
            .iter()
            .filter(|d| matches!(d.status, DirectoryStatus::Failed(_)))
            .count();
        let year_failures: usize = self
            .year_reports()
            .map(|y| y.failed + y.delete_failed + usize::from(y.error.is_some()))
            .sum();
        dir_failures + year_failures
    }

    fn year_reports(&self) -> impl Iterator<Item = &YearReport> {
        self.directories.iter().flat_map(|d| d.years.iter())
    }
}

/// `now` minus `months` calendar months. `None` when that date cannot be
/// represented, in which case nothing can be older than it.
pub fn threshold(now: DateTime<Local>, months: u32) -> Option<DateTime<Local>> {
    now.checked_sub_months(Months::new(months))
}

pub struct Orchestrator {
    config: Arc<Config>,
    writer: ArchiveWriter,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>) -> Self {
        let writer = ArchiveWriter::new(config.delete_originals);
        Orchestrator { config, writer }
    }

    /// Runs one pass over every watched directory in configured order.
    ///
    /// Never fails: every problem is logged where it happens and recorded in
    /// the returned report. Cancellation is honoured between directories.
    pub fn run_pass(&self, cancel: &CancellationToken) -> PassReport {
        let started_at = Local::now();
        info!(started_at = %started_at, directories = self.config.directories.len(), "scan pass started");

        let mut report = PassReport {
            started_at,
            finished_at: started_at,
            threshold: threshold(started_at, self.config.months),
            cancelled: false,
            directories: Vec::new(),
        };

        match report.threshold {
            Some(cutoff) => {
                info!(threshold = %cutoff, months = self.config.months, "archiving files older than threshold");

                for dir in &self.config.directories {
                    if cancel.is_cancelled() {
                        info!("cancellation requested, skipping remaining directories");
                        report.cancelled = true;
                        break;
                    }
                    report.directories.push(self.process_directory(dir, cutoff));
                }
            }
            None => {
                error!(months = self.config.months, "age threshold out of range, nothing to archive");
            }
        }

        report.finished_at = Local::now();
        info!(
            finished_at = %report.finished_at,
            added = report.files_added(),
            deleted = report.files_deleted(),
            failures = report.failures(),
            cancelled = report.cancelled,
            "scan pass finished"
        );
        report
    }

    fn process_directory(&self, dir: &Path, cutoff: DateTime<Local>) -> DirectoryReport {
        info!(dir = %dir.display(), "scanning directory");

        match fs::metadata(dir) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "directory does not exist, skipping");
                return DirectoryReport::new(dir, DirectoryStatus::Missing);
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "failed to inspect directory");
                return DirectoryReport::new(dir, DirectoryStatus::Failed(e.to_string()));
            }
        }

        let candidates = match selector::select(dir, cutoff, self.config.time_source) {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "failed to scan directory");
                return DirectoryReport::new(dir, DirectoryStatus::Failed(e.to_string()));
            }
        };

        info!(dir = %dir.display(), count = candidates.len(), "found files to archive");
        if candidates.is_empty() {
            return DirectoryReport::new(dir, DirectoryStatus::Empty);
        }

        let mut report = DirectoryReport::new(dir, DirectoryStatus::Archived);
        report.candidates = candidates.len();

        for bucket in group_by_year(candidates, |f| f.timestamp) {
            info!(dir = %dir.display(), year = bucket.year, count = bucket.files.len(), "archiving year");
            report.years.push(self.writer.archive(dir, bucket.year, &bucket.files));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn threshold_subtracts_calendar_months() {
        let now = Local.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap();
        let cutoff = threshold(now, 12).unwrap();
        assert_eq!((cutoff.year(), cutoff.month(), cutoff.day()), (2023, 5, 20));
    }

    #[test]
    fn threshold_clamps_to_month_end() {
        let now = Local.with_ymd_and_hms(2024, 3, 31, 10, 0, 0).unwrap();
        let cutoff = threshold(now, 1).unwrap();
        assert_eq!((cutoff.month(), cutoff.day()), (2, 29));
    }

    #[test]
    fn zero_months_means_now() {
        let now = Local.with_ymd_and_hms(2024, 3, 31, 10, 0, 0).unwrap();
        assert_eq!(threshold(now, 0), Some(now));
    }

    #[test]
    fn unrepresentable_threshold_is_none() {
        assert_eq!(threshold(Local::now(), u32::MAX), None);
    }

    fn config_for(directories: Vec<PathBuf>) -> Config {
        Config {
            directories,
            months: 12,
            time_source: crate::config::TimeSource::Modified,
            interval: std::time::Duration::from_secs(3_600),
            delete_originals: false,
        }
    }

    #[test]
    fn stat_failure_other_than_not_found_is_a_directory_failure() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain");
        fs::write(&file, "x").unwrap();
        // stat through a regular file fails with ENOTDIR, not ENOENT
        let unreachable = file.join("child");

        let report = Orchestrator::new(Arc::new(config_for(vec![unreachable]))).run_pass(&CancellationToken::new());

        assert!(matches!(report.directories[0].status, DirectoryStatus::Failed(_)));
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn absent_directory_is_missing() {
        let root = tempfile::tempdir().unwrap();

        let report =
            Orchestrator::new(Arc::new(config_for(vec![root.path().join("nope")]))).run_pass(&CancellationToken::new());

        assert_eq!(report.directories[0].status, DirectoryStatus::Missing);
    }

    #[test]
    fn cancelled_token_skips_every_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(vec![dir.path().to_path_buf()]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Orchestrator::new(Arc::new(config)).run_pass(&cancel);

        assert!(report.cancelled);
        assert!(report.directories.is_empty());
    }
}
