#![no_main]
use cellmon_core::CalibrationParameters;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(persisted) = cellmon_config::parse_calibration_json(data) else {
        return;
    };
    let merged = CalibrationParameters::merged(&CalibrationParameters::FACTORY, &persisted);
    for ch in merged.channels {
        assert!(ch.gain.is_finite() && ch.gain > 0.0);
        assert!(ch.offset_mv.is_finite());
    }
});
