use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Which file timestamp decides age and year bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Created,
    Modified,
}

impl TimeSource {
    /// `LastWriteTime` (any case) selects modification time. Anything else,
    /// including an empty string, selects creation time.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("LastWriteTime") => TimeSource::Modified,
            _ => TimeSource::Created,
        }
    }
}

/// Shape of the config file. Key names follow snake_case; the PascalCase
/// aliases keep older config files working unchanged.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(alias = "Directories")]
    directories: Vec<PathBuf>,
    #[serde(alias = "Months")]
    months: u32,
    #[serde(alias = "TimeType")]
    time_type: Option<String>,
    #[serde(alias = "IntervalHours")]
    interval_hours: u64,
    #[serde(alias = "DeleteOriginalFileAfterZip")]
    delete_original_after_zip: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            directories: Vec::new(),
            months: 12,
            time_type: None,
            interval_hours: 24,
            delete_original_after_zip: false,
        }
    }
}

/// Resolved, read-only settings for the whole process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub directories: Vec<PathBuf>,
    pub months: u32,
    pub time_source: TimeSource,
    pub interval: Duration,
    pub delete_originals: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: FileConfig = toml::from_str(text)?;

        if raw.interval_hours == 0 {
            return Err(Error::Config("interval_hours must be at least 1".into()));
        }

        let interval = raw
            .interval_hours
            .checked_mul(3_600)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::Config(format!("interval_hours {} is too large", raw.interval_hours)))?;

        Ok(Config {
            directories: raw.directories,
            months: raw.months,
            time_source: TimeSource::parse(raw.time_type.as_deref()),
            interval,
            delete_originals: raw.delete_original_after_zip,
        })
    }
}
