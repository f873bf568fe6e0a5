#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration-file parsing for the cell monitor.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The persisted calibration JSON is parsed leniently: every field that can
//!   be read is reported, everything else is left to the caller's defaults.
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Channels (taps) on the pack.
pub const CHANNELS: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Bus {
    /// Linux I²C bus number (`/dev/i2c-N`)
    pub i2c_bus: u8,
    /// 7-bit converter address
    pub address: u16,
    /// Max wait for one conversion to complete
    pub conversion_timeout_ms: u64,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            address: 0x48,
            conversion_timeout_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
    /// Passes over all four channels per cycle
    pub oversample: u8,
    /// Pause after each channel read (µs)
    pub settle_us: u64,
    /// Time between the start of consecutive cycles (ms)
    pub interval_ms: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            oversample: 8,
            settle_us: 125,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// Attempts per channel read, first try included
    pub max_attempts: u8,
    pub backoff: BackoffKind,
    /// Base pause between attempts (ms)
    pub backoff_ms: u64,
    /// Upper bound for growing backoffs (ms)
    pub max_backoff_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Fixed,
            backoff_ms: 2,
            max_backoff_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Persisted calibration (JSON with `k` and optional `o`)
    pub file: String,
    pub default_gain: [f32; CHANNELS],
    pub default_offset_mv: [f32; CHANNELS],
    /// Accepted band for reference voltages supplied to a fit (mV)
    pub min_reference_mv: f32,
    pub max_reference_mv: f32,
    /// Highest raw code accepted by a fit; above this the channel is treated as saturated
    pub max_raw_code: i16,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            file: "calibration.json".to_string(),
            default_gain: [1.042, 2.109, 3.023, 4.033],
            default_offset_mv: [0.0; CHANNELS],
            min_reference_mv: 3000.0,
            max_reference_mv: 20000.0,
            max_raw_code: 32000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Taps {
    /// Plausible cumulative voltage per tap (mV)
    pub min_mv: [f32; CHANNELS],
    pub max_mv: [f32; CHANNELS],
}

impl Default for Taps {
    fn default() -> Self {
        Self {
            min_mv: [3400.0, 6800.0, 10200.0, 13600.0],
            max_mv: [4200.0, 8400.0, 12600.0, 16800.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CsvLogCfg {
    /// Sample log path; unset disables the CSV log
    pub path: Option<String>,
    /// Rotate once the file grows past this many bytes
    pub max_bytes: u64,
    /// Local time offset applied to the HH:MM:SS column
    pub utc_offset_s: i32,
}

impl Default for CsvLogCfg {
    fn default() -> Self {
        Self {
            path: None,
            max_bytes: 512_000,
            utc_offset_s: 0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub bus: Bus,
    pub sampling: Sampling,
    pub retry: Retry,
    pub calibration: CalibrationCfg,
    pub taps: Taps,
    pub csv_log: CsvLogCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Bus
        if self.bus.address > 0x7F {
            eyre::bail!("bus.address must be a 7-bit address (<= 0x7f)");
        }
        if self.bus.conversion_timeout_ms == 0 {
            eyre::bail!("bus.conversion_timeout_ms must be >= 1");
        }

        // Sampling
        if self.sampling.oversample == 0 || self.sampling.oversample > 64 {
            eyre::bail!("sampling.oversample must be in [1, 64]");
        }
        if self.sampling.settle_us > 10_000 {
            eyre::bail!("sampling.settle_us is unreasonably large (>10ms)");
        }
        if self.sampling.interval_ms == 0 {
            eyre::bail!("sampling.interval_ms must be >= 1");
        }

        // Retry
        if self.retry.max_attempts == 0 || self.retry.max_attempts > 10 {
            eyre::bail!("retry.max_attempts must be in [1, 10]");
        }
        if self.retry.backoff_ms > 1000 {
            eyre::bail!("retry.backoff_ms is unreasonably large (>1s)");
        }
        if self.retry.max_backoff_ms < self.retry.backoff_ms {
            eyre::bail!("retry.max_backoff_ms must be >= retry.backoff_ms");
        }

        // Calibration
        if self.calibration.file.trim().is_empty() {
            eyre::bail!("calibration.file must not be empty");
        }
        for (i, g) in self.calibration.default_gain.iter().enumerate() {
            if !(g.is_finite() && *g > 0.0) {
                eyre::bail!("calibration.default_gain[{i}] must be finite and > 0");
            }
        }
        for (i, o) in self.calibration.default_offset_mv.iter().enumerate() {
            if !o.is_finite() {
                eyre::bail!("calibration.default_offset_mv[{i}] must be finite");
            }
        }
        let (lo, hi) = (
            self.calibration.min_reference_mv,
            self.calibration.max_reference_mv,
        );
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo < hi) {
            eyre::bail!("calibration reference band must satisfy 0 < min_reference_mv < max_reference_mv");
        }
        if self.calibration.max_raw_code <= 0 {
            eyre::bail!("calibration.max_raw_code must be > 0");
        }

        // Taps
        for i in 0..CHANNELS {
            let (lo, hi) = (self.taps.min_mv[i], self.taps.max_mv[i]);
            if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
                eyre::bail!("taps window {i} must satisfy min_mv < max_mv");
            }
        }

        // CSV log
        if self.csv_log.max_bytes < 1024 {
            eyre::bail!("csv_log.max_bytes must be >= 1024");
        }
        if self.csv_log.utc_offset_s.unsigned_abs() > 14 * 3600 {
            eyre::bail!("csv_log.utc_offset_s must be within ±14h");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

/// Calibration record as written to disk.
///
/// Example:
/// {"k":[1.042,2.109,3.023,4.033],"o":[0.0,0.0,0.0,0.0]}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// gain per channel
    pub k: [f32; CHANNELS],
    /// additive offset per channel, mV
    pub o: [f32; CHANNELS],
}

impl CalibrationRecord {
    pub fn to_json(&self) -> eyre::Result<String> {
        serde_json::to_string(self).map_err(|e| eyre::eyre!("serialize calibration: {e}"))
    }
}

/// Calibration as read back from disk, one `Option` per field.
///
/// `None` means the field was missing or unusable and the caller keeps its
/// default. A missing `o` array is reported as `offsets_present == false`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PersistedCalibration {
    pub k: [Option<f32>; CHANNELS],
    pub o: [Option<f32>; CHANNELS],
    pub offsets_present: bool,
}

#[derive(Debug, Deserialize)]
struct RawCalibrationFile {
    #[serde(default, deserialize_with = "de_lenient_array")]
    k: Option<[Option<f32>; CHANNELS]>,
    #[serde(default, deserialize_with = "de_lenient_array")]
    o: Option<[Option<f32>; CHANNELS]>,
}

/// Accept anything for an array field: non-arrays become `None`, and each
/// element that is not a finite number becomes `None`.
fn de_lenient_array<'de, D>(deserializer: D) -> Result<Option<[Option<f32>; CHANNELS]>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        return Ok(None);
    };
    let mut out = [None; CHANNELS];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .filter(|v| v.is_finite())
            .map(|v| v as f32)
            .filter(|v| v.is_finite());
    }
    Ok(Some(out))
}

/// Parse a persisted calibration file.
///
/// Fails only when the text is not a JSON object; individual fields that
/// cannot be used are reported as `None`.
pub fn parse_calibration_json(s: &str) -> eyre::Result<PersistedCalibration> {
    let raw: RawCalibrationFile =
        serde_json::from_str(s).map_err(|e| eyre::eyre!("invalid calibration JSON: {e}"))?;
    Ok(PersistedCalibration {
        k: raw.k.unwrap_or_default(),
        o: raw.o.unwrap_or_default(),
        offsets_present: raw.o.is_some(),
    })
}
