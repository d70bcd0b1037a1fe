//! Append-only JSON lines log of a run

use crate::testing::recorder::{Counters, InvocationResult};
use crate::testing::reporter::{InvocationRecord, SummaryRecord};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Writes each record as soon as it exists, so an interrupted run keeps
/// every line produced before the interruption.
pub struct ResultsLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ResultsLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_invocation(&mut self, result: &InvocationResult) -> io::Result<()> {
        self.append(&InvocationRecord::from(result))
    }

    pub fn append_summary(&mut self, counters: Counters, elapsed: Duration) -> io::Result<()> {
        self.append(&SummaryRecord::new(counters, elapsed))
    }

    fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
