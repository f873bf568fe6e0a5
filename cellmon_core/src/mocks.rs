//! In-memory collaborators for tests, benches and simulation runs.
use crate::calibration::CalibrationParameters;
use crate::error::StoreError;
use crate::store::CalibrationStore;

/// Calibration store that keeps the last saved parameters in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stored: Option<CalibrationParameters>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `params`.
    pub fn with(params: CalibrationParameters) -> Self {
        Self {
            stored: Some(params),
            ..Self::default()
        }
    }

    /// Make every following `save` fail with a write error.
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn stored(&self) -> Option<&CalibrationParameters> {
        self.stored.as_ref()
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&self, _defaults: &CalibrationParameters) -> Result<CalibrationParameters, StoreError> {
        self.stored
            .ok_or_else(|| StoreError::NotFound("memory store is empty".into()))
    }

    fn save(&mut self, params: &CalibrationParameters) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Write("simulated write failure".into()));
        }
        self.stored = Some(*params);
        self.saves += 1;
        Ok(())
    }
}
