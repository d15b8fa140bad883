//! Per-year zip containers.
//!
//! A batch never writes into `<dir>/<year>.zip` directly. It copies the
//! container (if any) to `<year>.zip.tmp`, appends every file there, finishes
//! the central directory and renames the copy over the container. Originals
//! are removed only after that rename, so a failed finish or a crash mid-batch
//! leaves the previous container intact and every original on disk.
//!
//! Entry names already present in the container are not written twice. An
//! entry with the same name, size and CRC-32 is taken as proof that an
//! earlier pass archived the file; anything else is skipped and left for a
//! human.

use std::collections::HashMap;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::Serialize;
use tracing::{error, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::selector::{CandidateFile, CONTAINER_EXTENSION, STAGING_SUFFIX};
use crate::error::{Error, Result};

/// Strongest standard deflate level. Size over speed, not configurable.
const MAX_COMPRESSION_LEVEL: i64 = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearReport {
    pub year: i32,
    pub container: PathBuf,
    pub added: usize,
    pub already_archived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub bytes_added: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Added(u64),
    AlreadyArchived,
    Skipped(Error),
    Failed(Error),
}

/// Identity of an entry's uncompressed contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Digest {
    size: u64,
    crc32: u32,
}

struct Staging {
    writer: ZipWriter<File>,
    existing: HashMap<String, Digest>,
}

/// Feeds everything read through a CRC-32 hasher.
struct Crc32Reader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    size: u64,
}

impl<R: Read> Crc32Reader<R> {
    fn new(inner: R) -> Self {
        Crc32Reader { inner, hasher: crc32fast::Hasher::new(), size: 0 }
    }

    fn digest(self) -> Digest {
        Digest { size: self.size, crc32: self.hasher.finalize() }
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }
}

pub fn container_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("{year}.{CONTAINER_EXTENSION}"))
}

pub fn staging_path(container: &Path) -> PathBuf {
    let mut name = container.as_os_str().to_os_string();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

pub struct ArchiveWriter {
    delete_originals: bool,
}

impl ArchiveWriter {
    pub fn new(delete_originals: bool) -> Self {
        ArchiveWriter { delete_originals }
    }

    pub fn archive(&self, dir: &Path, year: i32, files: &[CandidateFile]) -> YearReport {
        let container = container_path(dir, year);
        let mut report = YearReport {
            year,
            container: container.clone(),
            ..YearReport::default()
        };

        let outcomes = match write_batch(&container, files) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(container = %container.display(), year, error = %e, "container unavailable, batch abandoned");
                report.error = Some(e.to_string());
                return report;
            }
        };

        for (file, outcome) in files.iter().zip(outcomes) {
            let archived = match outcome {
                FileOutcome::Added(bytes) => {
                    report.added += 1;
                    report.bytes_added += bytes;
                    true
                }
                FileOutcome::AlreadyArchived => {
                    report.already_archived += 1;
                    true
                }
                FileOutcome::Skipped(_) => {
                    report.skipped += 1;
                    false
                }
                FileOutcome::Failed(_) => {
                    report.failed += 1;
                    false
                }
            };

            if archived && self.delete_originals {
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        info!(file = %file.path.display(), "original deleted");
                        report.deleted += 1;
                    }
                    Err(e) => {
                        error!(file = %file.path.display(), error = %e, "failed to delete original");
                        report.delete_failed += 1;
                    }
                }
            }
        }

        report
    }
}

/// Writes `files` into `container` and returns one outcome per file, in
/// order. Errors are container-level: the container is unchanged and no
/// original may be removed.
fn write_batch(container: &Path, files: &[CandidateFile]) -> Result<Vec<FileOutcome>> {
    let staging = staging_path(container);
    let Staging { mut writer, mut existing } = match open_staging(container, &staging) {
        Ok(staged) => staged,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };
    let mut outcomes = Vec::with_capacity(files.len());

    for file in files {
        let outcome = match existing.get(&file.name).copied() {
            Some(archived) => match file_digest(&file.path) {
                Ok(digest) if digest == archived => {
                    info!(file = %file.path.display(), container = %container.display(), "already archived");
                    FileOutcome::AlreadyArchived
                }
                Ok(_) => {
                    let e = Error::DuplicateEntry { name: file.name.clone() };
                    warn!(file = %file.path.display(), container = %container.display(), error = %e, "skipping file");
                    FileOutcome::Skipped(e)
                }
                Err(e) => {
                    error!(file = %file.path.display(), error = %e, "failed to read file");
                    FileOutcome::Failed(e)
                }
            },
            None => match add_file(&mut writer, file) {
                Ok(digest) => {
                    info!(file = %file.path.display(), container = %container.display(), bytes = digest.size, "added");
                    existing.insert(file.name.clone(), digest);
                    FileOutcome::Added(digest.size)
                }
                Err(e) => {
                    error!(file = %file.path.display(), container = %container.display(), error = %e, "failed to add");
                    FileOutcome::Failed(e)
                }
            },
        };
        outcomes.push(outcome);
    }

    let nothing_written = !outcomes.iter().any(|o| matches!(o, FileOutcome::Added(_)));

    if let Err(e) = writer.finish() {
        discard(&staging);
        return Err(Error::zip(container, e));
    }

    // nothing new: keep the container as it was, or never create it
    if nothing_written {
        discard(&staging);
        return Ok(outcomes);
    }

    if let Err(e) = fs::rename(&staging, container) {
        discard(&staging);
        return Err(Error::io(container, e));
    }

    Ok(outcomes)
}

/// Prepares the staging copy. The live container is only ever read here.
fn open_staging(container: &Path, staging: &Path) -> Result<Staging> {
    let existing = match File::open(container) {
        Ok(file) => Some(existing_entries(container, &file)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::io(container, e)),
    };

    match existing {
        Some(existing) => {
            fs::copy(container, staging).map_err(|e| Error::io(staging, e))?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(staging)
                .map_err(|e| Error::io(staging, e))?;
            let writer = ZipWriter::new_append(file).map_err(|e| Error::zip(staging, e))?;
            Ok(Staging { writer, existing })
        }
        None => {
            // truncate: a leftover from an interrupted pass is ours to replace
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(staging)
                .map_err(|e| Error::io(staging, e))?;
            info!(container = %container.display(), "creating container");
            Ok(Staging { writer: ZipWriter::new(file), existing: HashMap::new() })
        }
    }
}

fn existing_entries(path: &Path, file: &File) -> Result<HashMap<String, Digest>> {
    let mut archive = ZipArchive::new(file).map_err(|e| Error::zip(path, e))?;
    let mut entries = HashMap::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|e| Error::zip(path, e))?;
        entries.insert(
            entry.name().to_string(),
            Digest { size: entry.size(), crc32: entry.crc32() },
        );
    }

    Ok(entries)
}

fn file_digest(path: &Path) -> Result<Digest> {
    let source = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = Crc32Reader::new(source);
    io::copy(&mut reader, &mut io::sink()).map_err(|e| Error::io(path, e))?;
    Ok(reader.digest())
}

fn add_file(writer: &mut ZipWriter<File>, file: &CandidateFile) -> Result<Digest> {
    let source = File::open(&file.path).map_err(|e| Error::io(&file.path, e))?;
    let metadata = source.metadata().map_err(|e| Error::io(&file.path, e))?;
    if !metadata.is_file() {
        return Err(Error::NotAFile(file.path.clone()));
    }

    writer
        .start_file(file.name.as_str(), entry_options(&metadata))
        .map_err(|e| Error::zip(&file.path, e))?;

    let mut reader = Crc32Reader::new(source);
    match io::copy(&mut reader, writer) {
        Ok(_) => Ok(reader.digest()),
        Err(e) => {
            // drop the half written entry so the next file starts clean
            if let Err(abort) = writer.abort_file() {
                warn!(file = %file.path.display(), error = %abort, "could not discard partial entry");
            }
            Err(Error::io(&file.path, e))
        }
    }
}

fn entry_options(metadata: &Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(MAX_COMPRESSION_LEVEL))
        .large_file(metadata.len() >= u64::from(u32::MAX));

    match entry_time(metadata) {
        Some(time) => options.last_modified_time(time),
        None => options,
    }
}

/// Zip timestamps are DOS dates: 1980 to 2107, two second resolution.
fn entry_time(metadata: &Metadata) -> Option<zip::DateTime> {
    let modified: DateTime<Local> = metadata.modified().ok()?.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(modified.year()).ok()?,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .ok()
}

fn discard(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %staging.display(), error = %e, "could not remove staging copy"),
    }
}
