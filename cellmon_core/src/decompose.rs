//! Cumulative tap voltages → per-cell voltages and pack total.
use crate::CHANNELS;
use crate::config::TapWindows;

/// Plausibility flags for one tap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapWarning {
    pub below_window: bool,
    pub above_window: bool,
    /// Tap is not above the one beneath it.
    pub not_increasing: bool,
}

impl TapWarning {
    #[inline]
    pub fn any(&self) -> bool {
        self.below_window || self.above_window || self.not_increasing
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    /// Signed; a cell may come out negative on a broken tap.
    pub cells_mv: [f32; CHANNELS],
    pub total_mv: f32,
    pub warnings: [TapWarning; CHANNELS],
}

#[derive(Debug, Clone, Copy)]
pub struct Decomposer {
    windows: TapWindows,
}

impl Decomposer {
    pub fn new(windows: TapWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &TapWindows {
        &self.windows
    }

    /// Always produces a result; implausible taps are only flagged.
    pub fn decompose(&self, cumulative_mv: &[f32; CHANNELS]) -> Decomposition {
        let mut cells_mv = [0.0f32; CHANNELS];
        let mut warnings = [TapWarning::default(); CHANNELS];
        for i in 0..CHANNELS {
            let cum = cumulative_mv[i];
            let below = if i == 0 { 0.0 } else { cumulative_mv[i - 1] };
            cells_mv[i] = cum - below;
            warnings[i] = TapWarning {
                below_window: !(cum >= self.windows.min_mv[i]),
                above_window: cum > self.windows.max_mv[i],
                not_increasing: i > 0 && !(cum > below),
            };
        }
        Decomposition {
            cells_mv,
            total_mv: cumulative_mv[CHANNELS - 1],
            warnings,
        }
    }
}
