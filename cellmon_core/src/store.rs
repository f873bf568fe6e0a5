//! Persistence of calibration parameters.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cellmon_config::{CalibrationRecord, parse_calibration_json};
use tracing::debug;

use crate::calibration::CalibrationParameters;
use crate::error::StoreError;

/// Where calibration parameters live between runs.
pub trait CalibrationStore {
    /// Persisted parameters merged over `defaults`, field by field.
    fn load(&self, defaults: &CalibrationParameters) -> Result<CalibrationParameters, StoreError>;
    /// Replace whatever is stored; last write wins.
    fn save(&mut self, params: &CalibrationParameters) -> Result<(), StoreError>;
}

impl<S: CalibrationStore + ?Sized> CalibrationStore for Box<S> {
    fn load(&self, defaults: &CalibrationParameters) -> Result<CalibrationParameters, StoreError> {
        (**self).load(defaults)
    }

    fn save(&mut self, params: &CalibrationParameters) -> Result<(), StoreError> {
        (**self).save(params)
    }
}

/// `{"k":[..],"o":[..]}` in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for JsonFileStore {
    fn load(&self, defaults: &CalibrationParameters) -> Result<CalibrationParameters, StoreError> {
        let shown = self.path.display().to_string();
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(shown));
            }
            Err(e) => return Err(StoreError::Corrupt(format!("{shown}: {e}"))),
        };
        if text.trim().is_empty() {
            return Err(StoreError::NotFound(format!("{shown} is empty")));
        }
        let persisted =
            parse_calibration_json(&text).map_err(|e| StoreError::Corrupt(format!("{shown}: {e}")))?;
        Ok(CalibrationParameters::merged(defaults, &persisted))
    }

    fn save(&mut self, params: &CalibrationParameters) -> Result<(), StoreError> {
        let record = CalibrationRecord {
            k: params.gains(),
            o: params.offsets_mv(),
        };
        let json = record
            .to_json()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())
            .map_err(|e| StoreError::Write(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "calibration saved");
        Ok(())
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
