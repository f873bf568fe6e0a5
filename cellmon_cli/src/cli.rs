//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "cellmon", version, about = "Four-cell battery pack monitor")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample continuously, printing one telemetry line per cycle
    Run {
        /// Stop after this many cycles (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Override sampling.interval_ms
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
        /// Accept JSON control requests on stdin, one per line
        #[arg(long, action = ArgAction::SetTrue)]
        stdin_control: bool,
    },
    /// One unaveraged pass: raw ADC codes per channel
    Raw,
    /// Calibrate against measured tap voltages (volts, cumulative)
    Calibrate {
        /// Reference tap voltages, e.g. --v 3.70,7.50,11.40,15.20
        #[arg(long, value_name = "V1,V2,V3,V4", value_delimiter = ',', required = true)]
        v: Vec<f32>,
        /// Second reference set for a two-point fit, taken after the pack voltage changed
        #[arg(long, value_name = "V1,V2,V3,V4", value_delimiter = ',')]
        v2: Option<Vec<f32>>,
        /// Do not wait for Enter between the two points
        #[arg(long, action = ArgAction::SetTrue)]
        no_prompt: bool,
    },
    /// Quick health check (converter present, one cycle succeeds)
    SelfCheck,
    /// Delete the CSV sample log and its rotated copy
    ClearLog,
}
