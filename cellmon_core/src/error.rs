use thiserror::Error;

/// Cycle-level acquisition failure; the cycle produced no sample.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquisitionFault {
    #[error("insufficient valid samples on channel {channel}: {valid}/{total} passes valid")]
    InsufficientValidSamples { channel: usize, valid: u8, total: u8 },
}

/// Why a calibration fit refused its inputs. No parameters change when this is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationInputError {
    #[error("channel {channel}: no valid raw reading")]
    RawInvalid { channel: usize },
    #[error("channel {channel}: raw code {raw} outside (0, {max}]")]
    RawOutOfRange { channel: usize, raw: i16, max: i16 },
    #[error("channel {channel}: reference {mv} mV outside [{min}, {max}] mV")]
    ReferenceOutOfRange {
        channel: usize,
        mv: f32,
        min: f32,
        max: f32,
    },
    #[error("channel {channel}: gain {gain} must be finite and > 0")]
    InvalidGain { channel: usize, gain: f64 },
    #[error("channel {channel}: offset {offset} must be finite")]
    InvalidOffset { channel: usize, offset: f64 },
    #[error("no first calibration point captured")]
    MissingFirstPoint,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("calibration not found: {0}")]
    NotFound(String),
    #[error("calibration corrupt: {0}")]
    Corrupt(String),
    #[error("calibration write failed: {0}")]
    Write(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    /// A single read failed on the bus; only surfaces once retries are spent.
    #[error("transient bus fault on channel {channel}: {detail}")]
    TransientIo { channel: usize, detail: String },
    #[error("acquisition fault: {0}")]
    Acquisition(#[from] AcquisitionFault),
    #[error("device not initialized")]
    DeviceNotInitialized,
    #[error("invalid calibration input: {0}")]
    InvalidCalibrationInput(#[from] CalibrationInputError),
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("hardware error: {0}")]
    Hardware(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
