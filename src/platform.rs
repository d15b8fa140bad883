use std::fs::Metadata;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::config::TimeSource;

/// Default config file location, e.g. ~/.config/yearzip/config.toml on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "yearzip")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Returns the timestamp that decides a file's age and year.
///
/// Not every filesystem records a birth time (older Linux kernels, some
/// network mounts). When creation time is requested but unavailable, the
/// modification time is used instead.
pub fn qualifying_time(metadata: &Metadata, source: TimeSource) -> io::Result<SystemTime> {
    match source {
        TimeSource::Modified => metadata.modified(),
        TimeSource::Created => match metadata.created() {
            Ok(created) => Ok(created),
            Err(e) => {
                debug!(error = %e, "creation time unavailable, falling back to modification time");
                metadata.modified()
            }
        },
    }
}
