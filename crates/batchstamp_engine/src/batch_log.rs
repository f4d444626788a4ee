use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::persist::{ensure_output_dir, PersistError};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Append-only per-batch report file: one line per discovered file and per
/// stamping outcome.
pub struct BatchLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl BatchLog {
    /// Creates `batchstamp_<YYYYmmdd_HHMMSS>.log` in `dir`. A name already
    /// taken by an earlier batch gets a `_<n>` suffix; existing logs are never
    /// appended to.
    pub fn open(dir: &Path, started: DateTime<Local>) -> Result<Self, PersistError> {
        ensure_output_dir(dir)?;
        let stem = format!("batchstamp_{}", started.format("%Y%m%d_%H%M%S"));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => format!("{stem}.log"),
                n => format!("{stem}_{n}.log"),
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        writer: BufWriter::new(file),
                    })
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(PersistError::OutputDir(format!(
            "{}: no free name for {stem}.log",
            dir.display()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines are flushed immediately so the file is useful after a crash.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    pub fn close(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
