//! Configuration types for the acquisition engine.
//!
//! These are the runtime configuration structs used by `Monitor`.
//! They are separate from the TOML-deserialized config in `cellmon_config`.

use crate::CHANNELS;
use crate::calibration::CalibrationParameters;
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Oversampling and bus pacing for `RawSampler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerCfg {
    /// Passes over all channels per cycle.
    pub oversample: u8,
    /// Pause after every single channel read.
    pub settle: Duration,
    /// Per-read retry budget.
    pub retry: RetryPolicy,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            oversample: 8,
            settle: Duration::from_micros(125),
            retry: RetryPolicy::default(),
        }
    }
}

impl SamplerCfg {
    /// Fewest valid passes a channel needs for the cycle to stand:
    /// the cycle fails once more than half of the passes are invalid.
    #[inline]
    pub fn min_valid_passes(&self) -> u8 {
        let n = self.oversample.max(1);
        n - n / 2
    }
}

/// Expected cumulative voltage window per tap, in mV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapWindows {
    pub min_mv: [f32; CHANNELS],
    pub max_mv: [f32; CHANNELS],
}

impl Default for TapWindows {
    fn default() -> Self {
        // Tap n spans n cells of 3.4..4.2 V
        Self {
            min_mv: [3400.0, 6800.0, 10200.0, 13600.0],
            max_mv: [4200.0, 8400.0, 12600.0, 16800.0],
        }
    }
}

/// Input bands a calibration fit accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationLimits {
    pub min_reference_mv: f32,
    pub max_reference_mv: f32,
    /// Highest raw code treated as unsaturated (full scale is 32767).
    pub max_raw_code: i16,
}

impl Default for CalibrationLimits {
    fn default() -> Self {
        Self {
            min_reference_mv: 3000.0,
            max_reference_mv: 20000.0,
            max_raw_code: 32000,
        }
    }
}

/// Everything a `Monitor` needs besides its device, clock and store.
#[derive(Debug, Clone, Default)]
pub struct MonitorCfg {
    pub sampler: SamplerCfg,
    pub windows: TapWindows,
    pub limits: CalibrationLimits,
    /// Parameters used when nothing usable is persisted.
    pub defaults: CalibrationParameters,
}
