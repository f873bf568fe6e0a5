//! The cycle loop: one cycle, hand the sample to sinks, service queued
//! control requests while waiting for the next cycle, honor shutdown.
//!
//! Single-threaded: requests are only executed between cycles, so every
//! cycle sees one consistent set of calibration parameters.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cellmon_traits::{AdcBus, Clock};
use crossbeam_channel as xch;
use tracing::{debug, info, warn};

use crate::control::{self, ControlResponse};
use crate::monitor::Monitor;
use crate::sample::SampleReport;
use crate::store::CalibrationStore;

/// Longest single wait between shutdown and request checks.
const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    /// Time between the start of consecutive cycles.
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_cycles: None,
        }
    }
}

/// A request line plus where to send the answer.
#[derive(Debug)]
pub struct ControlMsg {
    pub line: String,
    pub reply: Option<xch::Sender<ControlResponse>>,
}

impl ControlMsg {
    pub fn new(line: impl Into<String>) -> (Self, xch::Receiver<ControlResponse>) {
        let (tx, rx) = xch::bounded(1);
        (
            Self {
                line: line.into(),
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Consumer of completed samples (CSV log, telemetry, ...).
pub trait SampleSink {
    fn accept(&mut self, report: &SampleReport) -> eyre::Result<()>;
}

impl<F> SampleSink for F
where
    F: FnMut(&SampleReport) -> eyre::Result<()>,
{
    fn accept(&mut self, report: &SampleReport) -> eyre::Result<()> {
        self(report)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub samples: u64,
    pub failed: u64,
    pub requests: u64,
}

/// Run until `shutdown` is set or `params.max_cycles` is reached.
///
/// Failed cycles are logged and skipped; nothing here ends the loop early.
pub fn run<A, C, S>(
    monitor: &mut Monitor<A, C, S>,
    params: &RunParams,
    control: Option<&xch::Receiver<ControlMsg>>,
    shutdown: &AtomicBool,
    sinks: &mut [&mut dyn SampleSink],
) -> RunStats
where
    A: AdcBus,
    C: Clock,
    S: CalibrationStore,
{
    let mut stats = RunStats::default();
    let mut control = control;
    info!(interval_ms = params.interval.as_millis() as u64, max_cycles = ?params.max_cycles, "run start");

    while !shutdown.load(Ordering::Relaxed) {
        if params.max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        if let Some(rx) = control {
            while let Ok(msg) = rx.try_recv() {
                serve(monitor, msg, &mut stats);
            }
        }

        let started = monitor.clock().now();
        stats.cycles += 1;
        if !monitor.is_initialized() && monitor.init().is_err() {
            stats.failed += 1;
        } else {
            match monitor.cycle() {
                Ok(report) => {
                    stats.samples += 1;
                    for sink in sinks.iter_mut() {
                        if let Err(e) = sink.accept(&report) {
                            warn!(error = %e, "sample sink failed");
                        }
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(cycle = stats.cycles, error = %e, "cycle failed, skipping");
                }
            }
        }

        if params.max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        let spent = monitor.clock().now().saturating_duration_since(started);
        let mut remaining = params.interval.saturating_sub(spent);
        while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
            let slice = remaining.min(WAIT_SLICE);
            match control {
                Some(rx) => match rx.recv_timeout(slice) {
                    Ok(msg) => serve(monitor, msg, &mut stats),
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => {
                        debug!("control channel closed");
                        control = None;
                    }
                },
                None => monitor.clock().sleep(slice),
            }
            remaining = remaining.saturating_sub(slice);
        }
    }

    info!(
        cycles = stats.cycles,
        samples = stats.samples,
        failed = stats.failed,
        requests = stats.requests,
        "run finished"
    );
    stats
}

fn serve<A, C, S>(monitor: &mut Monitor<A, C, S>, msg: ControlMsg, stats: &mut RunStats)
where
    A: AdcBus,
    C: Clock,
    S: CalibrationStore,
{
    stats.requests += 1;
    let resp = control::handle_line(monitor, &msg.line);
    if let Some(tx) = msg.reply
        && tx.send(resp).is_err()
    {
        debug!("requester went away before the reply");
    }
}
