//! Bridges from `cellmon_config` schemas to the engine's runtime types.

use std::time::Duration;

use cellmon_config::PersistedCalibration;

use crate::calibration::{CalibrationParameters, ChannelCalibration};
use crate::config::{CalibrationLimits, MonitorCfg, SamplerCfg, TapWindows};
use crate::error::CalibrationInputError;
use crate::retry::{Backoff, RetryPolicy};

// ── RetryPolicy ──────────────────────────────────────────────────────────────

impl From<&cellmon_config::Retry> for RetryPolicy {
    fn from(c: &cellmon_config::Retry) -> Self {
        let step = Duration::from_millis(c.backoff_ms);
        let max = Duration::from_millis(c.max_backoff_ms);
        let backoff = match c.backoff {
            _ if c.backoff_ms == 0 => Backoff::None,
            cellmon_config::BackoffKind::Fixed => Backoff::Fixed(step),
            cellmon_config::BackoffKind::Linear => Backoff::Linear { step, max },
            cellmon_config::BackoffKind::Exponential => Backoff::Exponential { base: step, max },
        };
        Self {
            max_attempts: c.max_attempts,
            backoff,
        }
    }
}

// ── Sampler / taps / limits ──────────────────────────────────────────────────

impl From<&cellmon_config::Config> for SamplerCfg {
    fn from(c: &cellmon_config::Config) -> Self {
        Self {
            oversample: c.sampling.oversample,
            settle: Duration::from_micros(c.sampling.settle_us),
            retry: RetryPolicy::from(&c.retry),
        }
    }
}

impl From<&cellmon_config::Taps> for TapWindows {
    fn from(c: &cellmon_config::Taps) -> Self {
        Self {
            min_mv: c.min_mv,
            max_mv: c.max_mv,
        }
    }
}

impl From<&cellmon_config::CalibrationCfg> for CalibrationLimits {
    fn from(c: &cellmon_config::CalibrationCfg) -> Self {
        Self {
            min_reference_mv: c.min_reference_mv,
            max_reference_mv: c.max_reference_mv,
            max_raw_code: c.max_raw_code,
        }
    }
}

// ── MonitorCfg ───────────────────────────────────────────────────────────────

impl TryFrom<&cellmon_config::Config> for MonitorCfg {
    type Error = CalibrationInputError;

    /// Fails only when the configured default gains or offsets are unusable.
    fn try_from(c: &cellmon_config::Config) -> Result<Self, Self::Error> {
        Ok(Self {
            sampler: SamplerCfg::from(c),
            windows: TapWindows::from(&c.taps),
            limits: CalibrationLimits::from(&c.calibration),
            defaults: CalibrationParameters::new(
                c.calibration.default_gain,
                c.calibration.default_offset_mv,
            )?,
        })
    }
}

// ── Persisted calibration ────────────────────────────────────────────────────

impl CalibrationParameters {
    /// Overlay what was read from disk onto `defaults`.
    ///
    /// Gains override only when finite and > 0. An absent offset array means
    /// zero offsets; a present one overrides element-wise where finite.
    pub fn merged(defaults: &CalibrationParameters, p: &PersistedCalibration) -> Self {
        let mut channels = defaults.channels;
        for (ch, slot) in channels.iter_mut().enumerate() {
            let gain = p.k[ch]
                .filter(|g| g.is_finite() && *g > 0.0)
                .unwrap_or(slot.gain);
            let offset_mv = if p.offsets_present {
                p.o[ch].filter(|o| o.is_finite()).unwrap_or(slot.offset_mv)
            } else {
                0.0
            };
            *slot = ChannelCalibration { gain, offset_mv };
        }
        Self { channels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CHANNELS;

    #[test]
    fn merge_keeps_defaults_for_bad_fields() {
        let defaults = CalibrationParameters::new([1.0; CHANNELS], [5.0; CHANNELS]).unwrap();
        let p = PersistedCalibration {
            k: [Some(2.0), Some(-1.0), None, Some(0.0)],
            o: [Some(1.0), None, Some(3.0), None],
            offsets_present: true,
        };
        let m = CalibrationParameters::merged(&defaults, &p);
        assert_eq!(m.gains(), [2.0, 1.0, 1.0, 1.0]);
        assert_eq!(m.offsets_mv(), [1.0, 5.0, 3.0, 5.0]);
    }

    #[test]
    fn absent_offsets_mean_zero() {
        let defaults = CalibrationParameters::new([1.0; CHANNELS], [5.0; CHANNELS]).unwrap();
        let p = PersistedCalibration {
            k: [Some(3.0); CHANNELS],
            ..Default::default()
        };
        let m = CalibrationParameters::merged(&defaults, &p);
        assert_eq!(m.offsets_mv(), [0.0; CHANNELS]);
    }

    #[test]
    fn retry_conversion_follows_kind() {
        let mut r = cellmon_config::Retry::default();
        assert_eq!(
            RetryPolicy::from(&r).backoff,
            Backoff::Fixed(Duration::from_millis(2))
        );
        r.backoff = cellmon_config::BackoffKind::Exponential;
        assert!(matches!(RetryPolicy::from(&r).backoff, Backoff::Exponential { .. }));
        r.backoff_ms = 0;
        assert_eq!(RetryPolicy::from(&r).backoff, Backoff::None);
    }
}
