//! Append-only JSONL event log store
//!
//! Synchronous read/write over a flat file, one record per line. Missing
//! files read as empty. No locking is implemented: callers must not run
//! concurrent writers against the same path.

use crate::entry::{self, HealthEntry, LogRecord};
use crate::error::VigilError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle on one JSONL log file
#[derive(Debug, Clone)]
pub struct EventLogStore {
    path: PathBuf,
}

impl EventLogStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a compact JSON line, creating parent
    /// directories as needed.
    pub fn append(&self, entry: &HealthEntry) -> Result<(), VigilError> {
        let line = entry::encode_line(entry)?;
        self.append_line(&line)
    }

    /// Append any serializable record as a compact JSON line
    pub fn append_record<T: Serialize>(&self, record: &T) -> Result<(), VigilError> {
        let line = serde_json::to_string(record)?;
        self.append_line(&line)
    }

    fn append_line(&self, line: &str) -> Result<(), VigilError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        debug!("appended one record to {}", self.path.display());
        Ok(())
    }

    /// Read every record, oldest first. Blank lines are skipped;
    /// unparseable lines come back tagged as malformed.
    pub fn read_all(&self) -> Result<Vec<LogRecord>, VigilError> {
        if !self.path.exists() {
            debug!("log {} does not exist yet, reading as empty", self.path.display());
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(entry::parse_line(line_no, &line));
        }

        debug!(
            "loaded {} records from {} ({} malformed)",
            records.len(),
            self.path.display(),
            records.iter().filter(|r| r.is_malformed()).count()
        );
        Ok(records)
    }

    /// Read the trailing `n` records
    pub fn read_trailing(&self, n: usize) -> Result<Vec<LogRecord>, VigilError> {
        let mut records = self.read_all()?;
        if records.len() > n {
            records.drain(0..records.len() - n);
        }
        Ok(records)
    }
}

/// Write raw lines to a new file via a temp file and atomic rename.
/// A trailing newline follows the last record.
pub fn write_raw_lines<P: AsRef<Path>>(path: P, lines: &[&str]) -> Result<(), VigilError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("jsonl.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = std::io::BufWriter::new(file);
        for line in lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)?;

    debug!("wrote {} lines to {}", lines.len(), path.display());
    Ok(())
}
