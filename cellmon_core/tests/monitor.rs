use std::time::Duration;

use cellmon_core::mocks::MemoryStore;
use cellmon_core::{
    CHANNELS, CalibrationInputError, CalibrationParameters, Monitor, MonitorCfg, MonitorError,
    StoreError,
};
use cellmon_hardware::SimulatedAdc;
use cellmon_traits::clock::test_clock::TestClock;

type SimMonitor = Monitor<SimulatedAdc, TestClock, MemoryStore>;

fn monitor_with(store: MemoryStore) -> (SimMonitor, SimulatedAdc, TestClock) {
    let adc = SimulatedAdc::default();
    let clock = TestClock::new();
    let mut m = Monitor::new(adc.clone(), clock.clone(), store, MonitorCfg::default());
    m.init().unwrap();
    (m, adc, clock)
}

#[test]
fn healthy_pack_decomposes_into_cells() {
    let (mut m, _, _) = monitor_with(MemoryStore::new());
    let report = m.cycle().unwrap();
    assert_eq!(report.sample.mv, [3700, 3800, 3900, 3800]);
    assert_eq!(report.sample.soc, [50, 60, 70, 60]);
    assert_eq!(report.sample.total, 15200);
    assert!(!report.has_warnings());
}

#[test]
fn epoch_ms_counts_from_session_start() {
    let (mut m, _, clock) = monitor_with(MemoryStore::new());
    clock.advance(Duration::from_millis(1500));
    let first = m.cycle().unwrap().sample.epoch_ms;
    assert!(first >= 1500);
    clock.advance(Duration::from_secs(1));
    let second = m.cycle().unwrap().sample.epoch_ms;
    assert!(second >= first + 1000);
}

#[test]
fn broken_tap_warns_and_clamps_only_in_sample() {
    let (mut m, adc, _) = monitor_with(MemoryStore::new());
    adc.set_taps_mv([3700.0, 11400.0, 7500.0, 15200.0]);
    let report = m.cycle().unwrap();
    assert!(report.has_warnings());
    assert!(report.warnings[2].not_increasing);
    assert!(report.cells_mv[2] < -3000.0);
    assert_eq!(report.sample.mv[2], 0);
    assert_eq!(report.sample.soc[2], 0);
}

#[test]
fn stored_calibration_is_used_at_start() {
    let stored = CalibrationParameters::new([1.0; CHANNELS], [10.0; CHANNELS]).unwrap();
    let (m, _, _) = monitor_with(MemoryStore::with(stored));
    assert_eq!(*m.calibration(), stored);
}

#[test]
fn empty_store_falls_back_to_defaults() {
    let (m, _, _) = monitor_with(MemoryStore::new());
    assert_eq!(*m.calibration(), CalibrationParameters::FACTORY);
}

#[test]
fn one_point_calibration_is_persisted_and_applied() {
    let (mut m, _, _) = monitor_with(MemoryStore::new());
    let reference = [3650.0, 7450.0, 11350.0, 15150.0];
    let p = m.calibrate_one_point(&reference).unwrap();
    assert_eq!(m.store().stored(), Some(&p));
    assert_eq!(m.store().saves(), 1);
    assert!(m.anchor().is_some());

    let report = m.cycle().unwrap();
    for ch in 0..CHANNELS {
        assert!((report.cumulative_mv[ch] - reference[ch]).abs() < 0.05);
    }
}

#[test]
fn failed_save_leaves_model_untouched() {
    let (mut m, _, _) = monitor_with(MemoryStore::new());
    m.store_mut().set_fail_saves(true);
    let err = m
        .calibrate_one_point(&[3650.0, 7450.0, 11350.0, 15150.0])
        .unwrap_err();
    assert!(matches!(err, MonitorError::Persistence(StoreError::Write(_))));
    assert_eq!(*m.calibration(), CalibrationParameters::FACTORY);
    assert!(m.anchor().is_none());
}

#[test]
fn rejected_fit_changes_no_channel() {
    let (mut m, _, _) = monitor_with(MemoryStore::new());
    let err = m
        .calibrate_one_point(&[3650.0, 7450.0, 11350.0, 25000.0])
        .unwrap_err();
    assert!(matches!(
        err,
        MonitorError::InvalidCalibrationInput(CalibrationInputError::ReferenceOutOfRange { channel: 3, .. })
    ));
    assert_eq!(*m.calibration(), CalibrationParameters::FACTORY);
    assert_eq!(m.store().saves(), 0);
}

#[test]
fn two_point_needs_a_captured_first_point() {
    let (mut m, _, _) = monitor_with(MemoryStore::new());
    let err = m
        .calibrate_two_point(&[3600.0; CHANNELS], &[4000.0; CHANNELS])
        .unwrap_err();
    assert_eq!(
        err,
        MonitorError::InvalidCalibrationInput(CalibrationInputError::MissingFirstPoint)
    );
}

#[test]
fn two_point_fit_recovers_true_dividers() {
    // Board dividers differ from the factory gains the monitor starts with.
    let dividers = [1.1, 2.2, 3.1, 4.2];
    let low = [3400.0, 6900.0, 10400.0, 13800.0];
    let high = [4100.0, 8200.0, 12300.0, 16400.0];
    let adc = SimulatedAdc::with_dividers(low, dividers);
    let mut m = Monitor::new(adc.clone(), TestClock::new(), MemoryStore::new(), MonitorCfg::default());
    m.init().unwrap();

    m.capture_point().unwrap();
    adc.set_taps_mv(high);
    let p = m.calibrate_two_point(&low, &high).unwrap();
    for ch in 0..CHANNELS {
        assert!((p.channels[ch].gain - dividers[ch]).abs() < 1e-3, "ch{ch}: {}", p.channels[ch].gain);
        assert!(p.channels[ch].offset_mv.abs() < 5.0, "ch{ch}: {}", p.channels[ch].offset_mv);
    }
    assert!(m.anchor().is_none());
}

#[test]
fn acquisition_failure_aborts_calibration() {
    let (mut m, adc, _) = monitor_with(MemoryStore::new());
    adc.fail_next_reads(0, 3 * 8);
    let err = m.calibrate_one_point(&[3700.0, 7500.0, 11400.0, 15200.0]).unwrap_err();
    assert!(matches!(err, MonitorError::Acquisition(_)));
    assert_eq!(m.store().saves(), 0);
}
