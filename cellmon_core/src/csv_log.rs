//! Append-only CSV log of samples with size-based rotation.
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::runner::SampleSink;
use crate::sample::{CellSample, SampleReport, TimeOfDay};

pub const HEADER: [&str; 10] = [
    "time", "c1_mv", "c1_soc", "c2_mv", "c2_soc", "c3_mv", "c3_soc", "c4_mv", "c4_soc", "total_mv",
];

/// Unix time below which the wall clock is considered unset (2020-09-13).
pub const WALL_CLOCK_VALID_AFTER: i64 = 1_600_000_000;

pub const DEFAULT_MAX_BYTES: u64 = 512_000;

#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
    max_bytes: u64,
    utc_offset_s: i32,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            utc_offset_s: 0,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_utc_offset(mut self, utc_offset_s: i32) -> Self {
        self.utc_offset_s = utc_offset_s;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<name>.old.csv` next to the live file.
    pub fn rotated_path(&self) -> PathBuf {
        self.path.with_extension("old.csv")
    }

    /// Append using the system wall clock.
    pub fn append(&mut self, sample: &CellSample) -> Result<bool, csv::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.append_at(sample, now)
    }

    /// Append one line stamped with `unix_secs`.
    ///
    /// Returns `false` without writing while the wall clock is unset.
    pub fn append_at(&mut self, sample: &CellSample, unix_secs: i64) -> Result<bool, csv::Error> {
        if unix_secs < WALL_CLOCK_VALID_AFTER {
            debug!(unix_secs, "wall clock unset, line not logged");
            return Ok(false);
        }
        self.rotate_if_needed()?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            w.write_record(HEADER)?;
        }
        let time = TimeOfDay::from_unix_secs(unix_secs, self.utc_offset_s);
        w.write_record(sample.log_fields(time))?;
        w.flush()?;
        Ok(true)
    }

    /// Delete the live and the rotated file.
    pub fn clear(&mut self) -> io::Result<()> {
        for p in [self.path.clone(), self.rotated_path()] {
            match fs::remove_file(&p) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        info!(path = %self.path.display(), "csv log cleared");
        Ok(())
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        let len = match fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if len <= self.max_bytes {
            return Ok(());
        }
        let old = self.rotated_path();
        match fs::remove_file(&old) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::rename(&self.path, &old)?;
        info!(path = %self.path.display(), bytes = len, "csv log rotated");
        Ok(())
    }
}

impl SampleSink for CsvLog {
    fn accept(&mut self, report: &SampleReport) -> eyre::Result<()> {
        self.append(&report.sample)?;
        Ok(())
    }
}
