//! Per-cycle output records and their external renderings.
use serde::Serialize;
use std::fmt;

use crate::CHANNELS;
use crate::decompose::{Decomposition, TapWarning};
use crate::sampler::RawReading;
use crate::soc::estimate_soc;

/// One completed acquisition cycle. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSample {
    /// ms since the monitor's epoch; wraps after ~49.7 days.
    pub epoch_ms: u32,
    pub mv: [u16; CHANNELS],
    pub soc: [u8; CHANNELS],
    pub total: u16,
}

#[inline]
fn clamp_mv(mv: f32) -> u16 {
    if !mv.is_finite() {
        return 0;
    }
    mv.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

impl CellSample {
    /// Clamp the signed decomposition into the wire representation.
    pub fn from_decomposition(epoch_ms: u32, d: &Decomposition) -> Self {
        let mv = d.cells_mv.map(clamp_mv);
        Self {
            epoch_ms,
            mv,
            soc: mv.map(|v| estimate_soc(f32::from(v))),
            total: clamp_mv(d.total_mv),
        }
    }

    /// `HH:MM:SS,c1_mv,c1_soc,…,c4_mv,c4_soc,total_mv` as separate fields.
    pub fn log_fields(&self, time: TimeOfDay) -> [String; 2 + 2 * CHANNELS] {
        let mut out: [String; 2 + 2 * CHANNELS] = Default::default();
        out[0] = time.to_string();
        for ch in 0..CHANNELS {
            out[1 + 2 * ch] = self.mv[ch].to_string();
            out[2 + 2 * ch] = self.soc[ch].to_string();
        }
        out[1 + 2 * CHANNELS] = self.total.to_string();
        out
    }

    pub fn log_line(&self, time: TimeOfDay) -> String {
        self.log_fields(time).join(",")
    }

    /// Telemetry record, time of day taken from `epoch_ms`.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            t: TimeOfDay::from_epoch_ms(self.epoch_ms).to_string(),
            v: self.mv,
            soc: self.soc,
            tot: self.total,
        }
    }
}

/// Wall-clock-free `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TimeOfDay {
    const DAY_S: i64 = 86_400;

    fn from_secs_of_day(s: i64) -> Self {
        let s = s.rem_euclid(Self::DAY_S);
        Self {
            hours: (s / 3600) as u8,
            minutes: (s / 60 % 60) as u8,
            seconds: (s % 60) as u8,
        }
    }

    /// Local time of day for a unix timestamp shifted by `utc_offset_s`.
    pub fn from_unix_secs(secs: i64, utc_offset_s: i32) -> Self {
        Self::from_secs_of_day(secs.saturating_add(i64::from(utc_offset_s)))
    }

    /// Elapsed time since the monitor's epoch; hours wrap at 24.
    pub fn from_epoch_ms(epoch_ms: u32) -> Self {
        Self::from_secs_of_day(i64::from(epoch_ms / 1000))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Push-channel record: `{"t":"HH:MM:SS","v":[..],"soc":[..],"tot":n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    pub t: String,
    pub v: [u16; CHANNELS],
    pub soc: [u8; CHANNELS],
    pub tot: u16,
}

/// A sample together with what produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    pub sample: CellSample,
    pub raw: RawReading,
    pub cumulative_mv: [f32; CHANNELS],
    pub cells_mv: [f32; CHANNELS],
    pub warnings: [TapWarning; CHANNELS],
}

impl SampleReport {
    pub fn has_warnings(&self) -> bool {
        self.warnings.iter().any(TapWarning::any)
    }
}
