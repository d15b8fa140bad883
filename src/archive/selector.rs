//! Picks the files in a watched directory that are old enough to archive.
//!
//! Only immediate children are considered. Zip containers produced by
//! earlier passes are never candidates themselves.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::TimeSource;
use crate::error::{Error, Result};
use crate::platform;

pub const CONTAINER_EXTENSION: &str = "zip";

/// Appended to a container path while a batch is being written.
pub const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub name: String,
    pub timestamp: DateTime<Local>,
    pub extension: Option<String>,
    pub len: u64,
}

pub fn is_archive_container(extension: Option<&str>) -> bool {
    extension.is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// `2021.zip.tmp` and friends: a container copy that a batch is writing,
/// or left behind when one was interrupted.
pub fn is_staging_file(name: &str) -> bool {
    name.to_ascii_lowercase()
        .ends_with(&format!(".{CONTAINER_EXTENSION}{STAGING_SUFFIX}"))
}

/// Strictly older: a file stamped exactly at the threshold stays put.
pub fn is_older(timestamp: DateTime<Local>, threshold: DateTime<Local>) -> bool {
    timestamp < threshold
}

/// Lists the files directly inside `dir` whose qualifying timestamp is older
/// than `threshold`, in file name order.
///
/// Failing to read `dir` itself is an error. A single entry that cannot be
/// inspected (removed mid-scan, unreadable metadata) is logged and skipped.
pub fn select(dir: &Path, threshold: DateTime<Local>, source: TimeSource) -> Result<Vec<CandidateFile>> {
    let metadata = fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }

    let mut selected = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let io_err = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                return Err(Error::io(dir, io_err));
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        // zip entry names are UTF-8; a lossy name could collide with another file's
        let Some(name) = entry.file_name().to_str() else {
            warn!(file = %path.display(), "skipping file with a non UTF-8 name");
            continue;
        };

        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_string);
        if is_archive_container(extension.as_deref()) || is_staging_file(name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping file with unreadable metadata");
                continue;
            }
        };

        let timestamp = match platform::qualifying_time(&metadata, source) {
            Ok(time) => DateTime::<Local>::from(time),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping file without a usable timestamp");
                continue;
            }
        };

        if !is_older(timestamp, threshold) {
            continue;
        }

        debug!(file = %path.display(), %timestamp, "selected");
        selected.push(CandidateFile {
            path: path.to_path_buf(),
            name: name.to_string(),
            timestamp,
            extension,
            len: metadata.len(),
        });
    }

    Ok(selected)
}
