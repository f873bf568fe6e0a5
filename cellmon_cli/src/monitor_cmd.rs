//! Command execution: hardware assembly, monitor construction, subcommands.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cellmon_config::Config;
use cellmon_core::runner::{self, ControlMsg, RunParams, SampleSink};
use cellmon_core::{
    CHANNELS, ControlResponse, CsvLog, JsonFileStore, LSB_MV_PER_CODE, Monitor, MonitorCfg,
    SampleReport,
};
use cellmon_traits::{AdcBus, MonotonicClock};
use crossbeam_channel as xch;
use eyre::{WrapErr, bail};
use tracing::{info, warn};

use crate::cli::Commands;

type CliMonitor = Monitor<Box<dyn AdcBus>, MonotonicClock, JsonFileStore>;

/// Simulated tap voltages (mV, cumulative), comma separated.
#[cfg(not(feature = "hardware"))]
const SIM_TAPS_ENV: &str = "CELLMON_SIM_TAPS_MV";
/// Number of initial probes the simulated converter refuses.
#[cfg(not(feature = "hardware"))]
const SIM_FAIL_PROBES_ENV: &str = "CELLMON_SIM_FAIL_PROBES";

pub fn dispatch(cfg: &Config, cmd: Commands, json: bool) -> eyre::Result<()> {
    match cmd {
        Commands::Run {
            cycles,
            interval_ms,
            stdin_control,
        } => run(cfg, cycles, interval_ms, stdin_control),
        Commands::Raw => raw(cfg, json),
        Commands::Calibrate { v, v2, no_prompt } => calibrate(cfg, &v, v2.as_deref(), no_prompt, json),
        Commands::SelfCheck => self_check(cfg, json),
        Commands::ClearLog => clear_log(cfg),
    }
}

#[cfg(feature = "hardware")]
fn make_adc(cfg: &Config) -> eyre::Result<Box<dyn AdcBus>> {
    let adc = cellmon_hardware::HardwareAdc::try_new(
        cfg.bus.i2c_bus,
        cfg.bus.address,
        Duration::from_millis(cfg.bus.conversion_timeout_ms),
    )
    .wrap_err("open ADS1115")?;
    info!(bus = cfg.bus.i2c_bus, address = cfg.bus.address, "using ADS1115");
    Ok(Box::new(adc))
}

#[cfg(not(feature = "hardware"))]
fn make_adc(cfg: &Config) -> eyre::Result<Box<dyn AdcBus>> {
    let taps = match std::env::var(SIM_TAPS_ENV) {
        Ok(s) => parse_taps(&s).wrap_err_with(|| format!("{SIM_TAPS_ENV}={s:?}"))?,
        Err(_) => [3700.0, 7500.0, 11400.0, 15200.0],
    };
    // Simulated dividers match the configured default gains.
    let adc = cellmon_hardware::SimulatedAdc::with_dividers(taps, cfg.calibration.default_gain);
    if let Some(n) = std::env::var(SIM_FAIL_PROBES_ENV)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
    {
        adc.fail_next_probes(n);
    }
    info!(?taps, "using simulated ADC");
    Ok(Box::new(adc))
}

#[cfg(not(feature = "hardware"))]
fn parse_taps(s: &str) -> eyre::Result<[f32; CHANNELS]> {
    let values = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("tap voltages must be numbers")?;
    to_channels(&values)
}

fn to_channels(values: &[f32]) -> eyre::Result<[f32; CHANNELS]> {
    match <[f32; CHANNELS]>::try_from(values) {
        Ok(a) => Ok(a),
        Err(_) => bail!("expected {CHANNELS} values, got {}", values.len()),
    }
}

fn build_monitor(cfg: &Config) -> eyre::Result<CliMonitor> {
    let mcfg = MonitorCfg::try_from(cfg).wrap_err("invalid configuration: calibration defaults")?;
    let store = JsonFileStore::new(&cfg.calibration.file);
    Ok(Monitor::new(make_adc(cfg)?, MonotonicClock::new(), store, mcfg))
}

fn build_ready_monitor(cfg: &Config) -> eyre::Result<CliMonitor> {
    let mut m = build_monitor(cfg)?;
    m.init()?;
    Ok(m)
}

fn csv_log(cfg: &Config) -> Option<CsvLog> {
    cfg.csv_log.path.as_ref().map(|p| {
        CsvLog::new(p)
            .with_max_bytes(cfg.csv_log.max_bytes)
            .with_utc_offset(cfg.csv_log.utc_offset_s)
    })
}

fn print_line(line: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{line}")?;
    out.flush()
}

// ── run ──────────────────────────────────────────────────────────────────────

struct TelemetryPrinter;

impl SampleSink for TelemetryPrinter {
    fn accept(&mut self, report: &SampleReport) -> eyre::Result<()> {
        let line = serde_json::to_string(&report.sample.telemetry())?;
        print_line(&line)?;
        Ok(())
    }
}

fn spawn_stdin_reader(tx: xch::Sender<ControlMsg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let (msg, reply) = ControlMsg::new(line);
            if tx.send(msg).is_err() {
                break;
            }
            match reply.recv() {
                Ok(resp) => {
                    if print_line(&resp.to_json()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

fn run(
    cfg: &Config,
    cycles: Option<u64>,
    interval_ms: Option<u64>,
    stdin_control: bool,
) -> eyre::Result<()> {
    let mut monitor = build_monitor(cfg)?;
    if let Err(e) = monitor.init() {
        warn!(error = %e, "ADC not ready; will retry every cycle");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let control = stdin_control.then(|| {
        let (tx, rx) = xch::unbounded();
        spawn_stdin_reader(tx);
        rx
    });

    let params = RunParams {
        interval: Duration::from_millis(interval_ms.unwrap_or(cfg.sampling.interval_ms).max(1)),
        max_cycles: cycles,
    };
    let mut telemetry = TelemetryPrinter;
    let mut log = csv_log(cfg);
    let stats = match log.as_mut() {
        Some(log) => runner::run(
            &mut monitor,
            &params,
            control.as_ref(),
            &shutdown,
            &mut [&mut telemetry, log],
        ),
        None => runner::run(&mut monitor, &params, control.as_ref(), &shutdown, &mut [&mut telemetry]),
    };

    if stats.samples == 0 && stats.cycles > 0 {
        bail!("no cycle succeeded ({} attempted)", stats.cycles);
    }
    Ok(())
}

// ── raw ──────────────────────────────────────────────────────────────────────

fn raw(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut monitor = build_ready_monitor(cfg)?;
    let reading = monitor.read_raw()?;
    if json {
        let resp = ControlResponse::Raw {
            raw: reading.codes,
            valid: reading.valid,
            lsb: LSB_MV_PER_CODE,
        };
        print_line(&resp.to_json())?;
    } else {
        for ch in 0..CHANNELS {
            if reading.valid[ch] {
                let pin_mv = f32::from(reading.codes[ch]) * LSB_MV_PER_CODE;
                print_line(&format!("ch{}: {:>6}  ({pin_mv:.1} mV at pin)", ch + 1, reading.codes[ch]))?;
            } else {
                print_line(&format!("ch{}: read failed", ch + 1))?;
            }
        }
    }
    Ok(())
}

// ── calibrate ────────────────────────────────────────────────────────────────

fn volts_to_mv(v: &[f32]) -> eyre::Result<[f32; CHANNELS]> {
    Ok(to_channels(v)?.map(|v| v * 1000.0))
}

fn calibrate(
    cfg: &Config,
    v: &[f32],
    v2: Option<&[f32]>,
    no_prompt: bool,
    json: bool,
) -> eyre::Result<()> {
    let ref1 = volts_to_mv(v).wrap_err("--v")?;
    let ref2 = v2.map(volts_to_mv).transpose().wrap_err("--v2")?;
    let mut monitor = build_ready_monitor(cfg)?;

    let params = match ref2 {
        None => monitor
            .calibrate_one_point(&ref1)
            .wrap_err("calibration failed")?,
        Some(ref2) => {
            monitor.capture_point().wrap_err("first calibration point")?;
            if !no_prompt {
                eprintln!("First point captured. Change the pack voltage to match --v2, then press Enter.");
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
            }
            monitor
                .calibrate_two_point(&ref1, &ref2)
                .wrap_err("calibration failed")?
        }
    };

    if json {
        print_line(&ControlResponse::calibrated(&params).to_json())?;
    } else {
        print_line(&format!(
            "calibration saved to {}: k={:?} o={:?}",
            cfg.calibration.file,
            params.gains(),
            params.offsets_mv()
        ))?;
    }
    Ok(())
}

// ── self-check / clear-log ───────────────────────────────────────────────────

fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut monitor = build_ready_monitor(cfg)?;
    let report = monitor.cycle()?;
    let implausible: Vec<usize> = (0..CHANNELS)
        .filter(|&ch| report.warnings[ch].any())
        .map(|ch| ch + 1)
        .collect();
    if json {
        let obj = serde_json::json!({
            "ok": true,
            "mv": report.sample.mv,
            "total": report.sample.total,
            "implausible_taps": implausible,
        });
        print_line(&obj.to_string())?;
    } else if implausible.is_empty() {
        print_line(&format!("self-check ok: cells {:?} mV, total {} mV", report.sample.mv, report.sample.total))?;
    } else {
        print_line(&format!("self-check ok, implausible taps {implausible:?}: cells {:?} mV", report.sample.mv))?;
    }
    Ok(())
}

fn clear_log(cfg: &Config) -> eyre::Result<()> {
    let Some(mut log) = csv_log(cfg) else {
        bail!("csv_log.path is not set in the config");
    };
    log.clear()
        .wrap_err_with(|| format!("clear {}", log.path().display()))?;
    print_line("log cleared")?;
    Ok(())
}
