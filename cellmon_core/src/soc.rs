//! Linear cell-voltage → state-of-charge map.

/// Cell voltage reported as 0 %.
pub const SOC_EMPTY_MV: f32 = 3200.0;
/// Cell voltage reported as 100 %.
pub const SOC_FULL_MV: f32 = 4200.0;

/// Percent in `0..=100`, truncated. Non-finite input maps to 0.
#[inline]
pub fn estimate_soc(cell_mv: f32) -> u8 {
    if !cell_mv.is_finite() {
        return 0;
    }
    let pct = 100.0 * (cell_mv - SOC_EMPTY_MV) / (SOC_FULL_MV - SOC_EMPTY_MV);
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_and_midpoint() {
        assert_eq!(estimate_soc(3200.0), 0);
        assert_eq!(estimate_soc(4200.0), 100);
        assert_eq!(estimate_soc(3700.0), 50);
        assert_eq!(estimate_soc(3709.9), 50);
    }

    #[test]
    fn clamps_and_rejects_non_finite() {
        assert_eq!(estimate_soc(-12.0), 0);
        assert_eq!(estimate_soc(5000.0), 100);
        assert_eq!(estimate_soc(f32::NAN), 0);
        assert_eq!(estimate_soc(f32::INFINITY), 0);
    }
}
