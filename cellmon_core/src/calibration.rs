//! Per-channel linear calibration: raw code → cumulative tap voltage.
//!
//! `mv = code * LSB_MV_PER_CODE * gain + offset_mv`
//!
//! Fits are pure functions of their inputs and the current parameters; they
//! hand back a complete new parameter set or an error, never a partial update.
//! Arithmetic runs in `f64`, parameters are stored as `f32`.
use crate::CHANNELS;
use crate::config::CalibrationLimits;
use crate::error::CalibrationInputError;
use crate::sampler::RawReading;

/// mV represented by one code at PGA ±6.144 V.
pub const LSB_MV_PER_CODE: f32 = 0.1875;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCalibration {
    /// Divider compensation; always finite and > 0.
    pub gain: f32,
    pub offset_mv: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParameters {
    pub channels: [ChannelCalibration; CHANNELS],
}

impl CalibrationParameters {
    /// Divider gains of the reference board, no offsets.
    pub const FACTORY: Self = Self {
        channels: [
            ChannelCalibration {
                gain: 1.042,
                offset_mv: 0.0,
            },
            ChannelCalibration {
                gain: 2.109,
                offset_mv: 0.0,
            },
            ChannelCalibration {
                gain: 3.023,
                offset_mv: 0.0,
            },
            ChannelCalibration {
                gain: 4.033,
                offset_mv: 0.0,
            },
        ],
    };

    pub fn new(
        gains: [f32; CHANNELS],
        offsets_mv: [f32; CHANNELS],
    ) -> Result<Self, CalibrationInputError> {
        let mut channels = Self::FACTORY.channels;
        for (ch, slot) in channels.iter_mut().enumerate() {
            let (gain, offset) = (gains[ch], offsets_mv[ch]);
            if !valid_gain(f64::from(gain)) {
                return Err(CalibrationInputError::InvalidGain {
                    channel: ch,
                    gain: f64::from(gain),
                });
            }
            if !offset.is_finite() {
                return Err(CalibrationInputError::InvalidOffset {
                    channel: ch,
                    offset: f64::from(offset),
                });
            }
            *slot = ChannelCalibration {
                gain,
                offset_mv: offset,
            };
        }
        Ok(Self { channels })
    }

    pub fn gains(&self) -> [f32; CHANNELS] {
        self.channels.map(|c| c.gain)
    }

    pub fn offsets_mv(&self) -> [f32; CHANNELS] {
        self.channels.map(|c| c.offset_mv)
    }

    /// Absolute cumulative voltage of `channel` for a (possibly fractional) code.
    #[inline]
    pub fn absolute_mv(&self, channel: usize, code: f64) -> f64 {
        let c = self.channels[channel];
        code * f64::from(LSB_MV_PER_CODE) * f64::from(c.gain) + f64::from(c.offset_mv)
    }
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self::FACTORY
    }
}

#[inline]
fn valid_gain(g: f64) -> bool {
    g.is_finite() && g > 0.0 && (g as f32).is_finite()
}

/// Current calibration plus the input bands fits are checked against.
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    params: CalibrationParameters,
    limits: CalibrationLimits,
}

impl CalibrationModel {
    pub fn new(params: CalibrationParameters, limits: CalibrationLimits) -> Self {
        Self { params, limits }
    }

    pub fn params(&self) -> &CalibrationParameters {
        &self.params
    }

    pub fn limits(&self) -> &CalibrationLimits {
        &self.limits
    }

    /// Swap in a complete parameter set.
    pub fn replace(&mut self, params: CalibrationParameters) {
        self.params = params;
    }

    /// Cumulative tap voltages for `raw`, mV.
    pub fn to_absolute_mv(&self, raw: &RawReading) -> [f32; CHANNELS] {
        std::array::from_fn(|ch| self.params.absolute_mv(ch, f64::from(raw.codes[ch])) as f32)
    }

    /// Keep each gain, move each offset so `raw` maps exactly onto `reference_mv`.
    pub fn fit_one_point(
        &self,
        raw: &RawReading,
        reference_mv: &[f32; CHANNELS],
    ) -> Result<CalibrationParameters, CalibrationInputError> {
        self.check_raw(raw)?;
        self.check_reference(reference_mv)?;

        let mut next = self.params;
        for ch in 0..CHANNELS {
            let gain = f64::from(self.params.channels[ch].gain);
            next.channels[ch].offset_mv =
                offset_through(gain, raw.codes[ch], reference_mv[ch], ch)?;
        }
        Ok(next)
    }

    /// Fit gain and offset through two observations per channel.
    ///
    /// A channel whose two raw codes coincide keeps its gain and gets the
    /// one-point offset from the first observation.
    pub fn fit_two_point(
        &self,
        raw1: &RawReading,
        ref1_mv: &[f32; CHANNELS],
        raw2: &RawReading,
        ref2_mv: &[f32; CHANNELS],
    ) -> Result<CalibrationParameters, CalibrationInputError> {
        self.check_raw(raw1)?;
        self.check_reference(ref1_mv)?;
        self.check_raw(raw2)?;
        self.check_reference(ref2_mv)?;

        let lsb = f64::from(LSB_MV_PER_CODE);
        let mut next = self.params;
        for ch in 0..CHANNELS {
            let (c1, c2) = (raw1.codes[ch], raw2.codes[ch]);
            let gain = if c1 == c2 {
                f64::from(self.params.channels[ch].gain)
            } else {
                let dv = f64::from(ref2_mv[ch]) - f64::from(ref1_mv[ch]);
                let dc = (f64::from(c2) - f64::from(c1)) * lsb;
                dv / dc
            };
            if !valid_gain(gain) {
                return Err(CalibrationInputError::InvalidGain { channel: ch, gain });
            }
            next.channels[ch] = ChannelCalibration {
                gain: gain as f32,
                offset_mv: offset_through(gain, c1, ref1_mv[ch], ch)?,
            };
        }
        Ok(next)
    }

    fn check_raw(&self, raw: &RawReading) -> Result<(), CalibrationInputError> {
        let max = self.limits.max_raw_code;
        for ch in 0..CHANNELS {
            if !raw.valid[ch] {
                return Err(CalibrationInputError::RawInvalid { channel: ch });
            }
            let code = raw.codes[ch];
            if code <= 0 || code > max {
                return Err(CalibrationInputError::RawOutOfRange {
                    channel: ch,
                    raw: code,
                    max,
                });
            }
        }
        Ok(())
    }

    fn check_reference(&self, reference_mv: &[f32; CHANNELS]) -> Result<(), CalibrationInputError> {
        let (min, max) = (self.limits.min_reference_mv, self.limits.max_reference_mv);
        for (ch, &mv) in reference_mv.iter().enumerate() {
            if !(mv.is_finite() && (min..=max).contains(&mv)) {
                return Err(CalibrationInputError::ReferenceOutOfRange {
                    channel: ch,
                    mv,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Offset that puts `code` on `reference_mv` for the given gain.
fn offset_through(
    gain: f64,
    code: i16,
    reference_mv: f32,
    channel: usize,
) -> Result<f32, CalibrationInputError> {
    let offset = f64::from(reference_mv) - gain * f64::from(code) * f64::from(LSB_MV_PER_CODE);
    let stored = offset as f32;
    if !stored.is_finite() {
        return Err(CalibrationInputError::InvalidOffset { channel, offset });
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CalibrationModel {
        CalibrationModel::new(CalibrationParameters::FACTORY, CalibrationLimits::default())
    }

    #[test]
    fn conversion_applies_gain_then_offset() {
        let params = CalibrationParameters::new([1.0, 2.0, 3.0, 4.0], [0.0, 10.0, -10.0, 0.5])
            .unwrap();
        let m = CalibrationModel::new(params, CalibrationLimits::default());
        let mv = m.to_absolute_mv(&RawReading::from_codes([1000, 1000, 1000, 1000]));
        // 1000 codes * 0.1875 = 187.5 mV at the ADC pin
        assert_eq!(mv, [187.5, 385.0, 552.5, 750.5]);
    }

    #[test]
    fn one_point_hits_reference_exactly() {
        let m = model();
        let raw = RawReading::from_codes([18000, 18500, 19000, 19500]);
        let refs = [3600.0, 7400.0, 11100.0, 15000.0];
        let p = m.fit_one_point(&raw, &refs).unwrap();
        assert_eq!(p.gains(), CalibrationParameters::FACTORY.gains());
        let fitted = CalibrationModel::new(p, CalibrationLimits::default());
        let mv = fitted.to_absolute_mv(&raw);
        for ch in 0..CHANNELS {
            assert!((mv[ch] - refs[ch]).abs() < 1e-2, "ch{ch}: {} vs {}", mv[ch], refs[ch]);
        }
    }

    #[test]
    fn new_rejects_non_positive_gain() {
        let err = CalibrationParameters::new([1.0, -2.0, 3.0, 4.0], [0.0; CHANNELS]).unwrap_err();
        assert!(matches!(err, CalibrationInputError::InvalidGain { channel: 1, .. }));
        let err = CalibrationParameters::new([1.0, 2.0, f32::NAN, 4.0], [0.0; CHANNELS]).unwrap_err();
        assert!(matches!(err, CalibrationInputError::InvalidGain { channel: 2, .. }));
    }

    #[test]
    fn two_point_with_inverted_slope_is_rejected() {
        let m = model();
        let raw1 = RawReading::from_codes([10000; CHANNELS]);
        let raw2 = RawReading::from_codes([12000; CHANNELS]);
        let err = m
            .fit_two_point(&raw1, &[5000.0; CHANNELS], &raw2, &[4000.0; CHANNELS])
            .unwrap_err();
        assert!(matches!(err, CalibrationInputError::InvalidGain { channel: 0, .. }));
    }
}
