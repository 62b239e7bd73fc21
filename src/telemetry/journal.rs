//! # Durable Journal
//!
//! Append-only line log on non-volatile storage with a checkpoint operation
//! for selective compaction.
//!
//! A drain pass opens a [`Checkpoint`], reads every line in file order,
//! copies the lines it wants to keep into a scratch file, and then either
//! commits (the scratch file atomically replaces the log) or discards (the
//! log is left byte-for-byte untouched). Until a commit the journal file is
//! the only copy of unsent data.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GreenhouseError, Result};

/// Line terminator written after every entry
pub const LINE_TERMINATOR: &str = "\r\n";

/// Append-only journal backed by a log file and a scratch file
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    scratch_path: PathBuf,
}

impl Journal {
    /// Create a journal handle. No file is touched until the first append.
    pub fn new(path: impl Into<PathBuf>, scratch_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch_path: scratch_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }

    /// Append one line, creating the log (and its directory) on first use
    ///
    /// The line is flushed and synced before returning.
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Storage` if the log cannot be opened or written
    pub fn append(&self, line: &str) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| GreenhouseError::storage(dir, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_error(e))?;

        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(LINE_TERMINATOR.as_bytes()))
            .and_then(|()| file.sync_data())
            .map_err(|e| self.storage_error(e))?;

        debug!("Appended {} bytes to {}", line.len() + LINE_TERMINATOR.len(), self.path.display());
        Ok(())
    }

    /// Whether the log exists on storage
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// True if the log is absent or has no content
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Storage` if the log exists but cannot be inspected
    pub fn is_empty(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    /// Delete the log if present
    pub fn remove(&self) -> Result<()> {
        remove_if_present(&self.path)
    }

    /// Read every line currently in the log, in file order
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    pub fn lines(&self) -> Result<Vec<String>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes
                .split(|b| *b == b'\n')
                .map(trim_terminator)
                .filter(|line| !line.is_empty())
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    /// Open the log for reading and a fresh scratch file for writing
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Storage` if either file cannot be opened.
    /// The log itself is never modified by a failed checkpoint.
    pub fn checkpoint(&self) -> Result<Checkpoint> {
        let reader = File::open(&self.path)
            .map(BufReader::new)
            .map_err(|e| self.storage_error(e))?;

        let scratch = File::create(&self.scratch_path)
            .map(BufWriter::new)
            .map_err(|e| GreenhouseError::storage(&self.scratch_path, e))?;

        Ok(Checkpoint {
            journal: self.clone(),
            reader,
            scratch,
            retained: 0,
        })
    }

    fn storage_error(&self, source: io::Error) -> GreenhouseError {
        GreenhouseError::storage(&self.path, source)
    }
}

/// An in-progress compaction of a [`Journal`]
///
/// Must end in [`Checkpoint::commit`] or [`Checkpoint::discard`]. Dropping it
/// without either leaves the log untouched and a stale scratch file behind,
/// which the next checkpoint truncates.
#[derive(Debug)]
pub struct Checkpoint {
    journal: Journal,
    reader: BufReader<File>,
    scratch: BufWriter<File>,
    retained: usize,
}

impl Checkpoint {
    /// Next log line without its terminator, or `None` at end of file
    ///
    /// Lines are returned as raw bytes. A line torn by power loss may not be
    /// valid UTF-8; deciding what to do with it is up to the caller.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| self.journal.storage_error(e))?;
        if read == 0 {
            return Ok(None);
        }
        let len = trim_terminator(&buf).len();
        buf.truncate(len);
        Ok(Some(buf))
    }

    /// Keep a line, byte for byte, for the compacted log
    pub fn retain(&mut self, line: impl AsRef<[u8]>) -> Result<()> {
        self.scratch
            .write_all(line.as_ref())
            .and_then(|()| self.scratch.write_all(LINE_TERMINATOR.as_bytes()))
            .map_err(|e| GreenhouseError::storage(&self.journal.scratch_path, e))?;
        self.retained += 1;
        Ok(())
    }

    /// Number of lines retained so far
    pub fn retained(&self) -> usize {
        self.retained
    }

    /// Replace the log with the retained lines
    ///
    /// When nothing was retained the log is deleted instead.
    pub fn commit(self) -> Result<()> {
        let Checkpoint {
            journal,
            reader,
            scratch,
            retained,
        } = self;
        drop(reader);

        let scratch_path = journal.scratch_path.clone();
        let file = scratch
            .into_inner()
            .map_err(|e| GreenhouseError::storage(&scratch_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| GreenhouseError::storage(&scratch_path, e))?;
        drop(file);

        if retained == 0 {
            remove_if_present(&scratch_path)?;
            journal.remove()?;
            debug!("Checkpoint emptied {}", journal.path.display());
        } else {
            fs::rename(&scratch_path, &journal.path).map_err(|e| journal.storage_error(e))?;
            debug!("Checkpoint kept {} lines in {}", retained, journal.path.display());
        }
        Ok(())
    }

    /// Drop the scratch file and keep the log as it was
    pub fn discard(self) -> Result<()> {
        let Checkpoint {
            journal,
            reader,
            scratch,
            ..
        } = self;
        drop(reader);
        drop(scratch);
        remove_if_present(&journal.scratch_path)
    }
}

fn trim_terminator(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GreenhouseError::storage(path, e)),
    }
}
