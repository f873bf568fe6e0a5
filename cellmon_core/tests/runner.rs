use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use cellmon_core::mocks::MemoryStore;
use cellmon_core::runner::{self, ControlMsg, RunParams, SampleSink};
use cellmon_core::{CellSample, ControlResponse, Monitor, MonitorCfg, SampleReport};
use cellmon_hardware::SimulatedAdc;
use cellmon_traits::clock::test_clock::TestClock;
use crossbeam_channel as xch;

type SimMonitor = Monitor<SimulatedAdc, TestClock, MemoryStore>;

fn monitor() -> (SimMonitor, SimulatedAdc) {
    let adc = SimulatedAdc::default();
    let m = Monitor::new(adc.clone(), TestClock::new(), MemoryStore::new(), MonitorCfg::default());
    (m, adc)
}

fn params(cycles: u64) -> RunParams {
    RunParams {
        interval: Duration::from_secs(1),
        max_cycles: Some(cycles),
    }
}

#[test]
fn cycles_are_paced_by_interval() {
    let (mut m, _) = monitor();
    let mut seen: Vec<CellSample> = Vec::new();
    let mut collect = |r: &SampleReport| -> eyre::Result<()> {
        seen.push(r.sample);
        Ok(())
    };
    let stop = AtomicBool::new(false);
    let stats = runner::run(&mut m, &params(3), None, &stop, &mut [&mut collect]);

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.samples, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1].epoch_ms - seen[0].epoch_ms, 1000);
    assert_eq!(seen[2].epoch_ms - seen[1].epoch_ms, 1000);
}

#[test]
fn shutdown_flag_prevents_any_cycle() {
    let (mut m, adc) = monitor();
    let stop = AtomicBool::new(true);
    let stats = runner::run(&mut m, &params(5), None, &stop, &mut []);
    assert_eq!(stats.cycles, 0);
    assert_eq!(adc.read_count(), 0);
}

#[test]
fn failed_init_is_retried_next_cycle() {
    let (mut m, adc) = monitor();
    adc.fail_next_probes(1);
    let stop = AtomicBool::new(false);
    let stats = runner::run(&mut m, &params(2), None, &stop, &mut []);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.samples, 1);
    assert!(m.is_initialized());
}

#[test]
fn failed_cycle_is_skipped_not_fatal() {
    let (mut m, adc) = monitor();
    m.init().unwrap();
    // the whole first cycle on channel 1 is lost
    adc.fail_next_reads(1, 3 * 8);
    let stop = AtomicBool::new(false);
    let stats = runner::run(&mut m, &params(3), None, &stop, &mut []);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.samples, 2);
}

#[test]
fn sink_errors_do_not_stop_the_loop() {
    let (mut m, _) = monitor();
    let mut failing = |_: &SampleReport| -> eyre::Result<()> { Err(eyre::eyre!("disk full")) };
    let mut count = 0u32;
    let mut counting = |_: &SampleReport| -> eyre::Result<()> {
        count += 1;
        Ok(())
    };
    let stop = AtomicBool::new(false);
    let sinks: &mut [&mut dyn SampleSink] = &mut [&mut failing, &mut counting];
    let stats = runner::run(&mut m, &params(2), None, &stop, sinks);
    assert_eq!(stats.samples, 2);
    assert_eq!(count, 2);
}

#[test]
fn queued_requests_are_served_before_the_cycle() {
    let (mut m, _) = monitor();
    let (tx, rx) = xch::unbounded();
    let (cal, cal_reply) = ControlMsg::new(r#"{"v":[3.65,7.45,11.35,15.15]}"#);
    let (raw, raw_reply) = ControlMsg::new(r#"{"cmd":"raw"}"#);
    let (bad, bad_reply) = ControlMsg::new("not json");
    for msg in [cal, raw, bad] {
        tx.send(msg).unwrap();
    }
    // queued requests are drained before the loop brings the device up
    m.init().unwrap();

    let stop = AtomicBool::new(false);
    let stats = runner::run(&mut m, &params(1), Some(&rx), &stop, &mut []);
    assert_eq!(stats.requests, 3);

    let cal = cal_reply.recv().unwrap();
    assert!(matches!(cal, ControlResponse::Calibrated { ok: true, .. }));
    assert_eq!(m.store().saves(), 1);

    match raw_reply.recv().unwrap() {
        ControlResponse::Raw { valid, lsb, .. } => {
            assert_eq!(valid, [true; 4]);
            assert_eq!(lsb, 0.1875);
        }
        other => panic!("unexpected {other:?}"),
    }

    let json: serde_json::Value = serde_json::from_str(&bad_reply.recv().unwrap().to_json()).unwrap();
    assert_eq!(json["reason"], "invalid_json");
}

#[test]
fn request_arriving_mid_wait_is_served() {
    let (mut m, _) = monitor();
    m.init().unwrap();
    let (tx, rx) = xch::unbounded();
    let requester = thread::spawn(move || {
        let (msg, reply) = ControlMsg::new(r#"{"cmd":"capture"}"#);
        tx.send(msg).unwrap();
        reply.recv().unwrap()
    });

    let stop = AtomicBool::new(false);
    let p = RunParams {
        interval: Duration::from_millis(200),
        max_cycles: Some(2),
    };
    let stats = runner::run(&mut m, &p, Some(&rx), &stop, &mut []);
    assert_eq!(stats.samples, 2);
    drop(rx);

    let resp = requester.join().unwrap();
    assert!(matches!(resp, ControlResponse::Captured { ok: true, .. }));
    assert!(m.anchor().is_some());
}

#[test]
fn closed_control_channel_falls_back_to_clock() {
    let (mut m, _) = monitor();
    let (tx, rx) = xch::unbounded::<ControlMsg>();
    drop(tx);
    let stop = AtomicBool::new(false);
    let stats = runner::run(&mut m, &params(2), Some(&rx), &stop, &mut []);
    assert_eq!(stats.samples, 2);
    assert_eq!(stats.requests, 0);
}
