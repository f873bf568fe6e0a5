#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Cell-voltage acquisition engine (hardware-agnostic).
//!
//! All device access goes through `cellmon_traits::AdcBus`; all waiting goes
//! through `cellmon_traits::Clock`, so the whole engine runs deterministically
//! against `SimulatedAdc` and a test clock.
//!
//! ## Architecture
//!
//! - **Sampling**: oversampled reads with retry and soft reset (`sampler`, `retry`)
//! - **Calibration**: per-channel gain/offset and fits (`calibration`)
//! - **Decomposition**: cumulative taps → cells, plausibility warnings (`decompose`)
//! - **State of charge**: linear map (`soc`)
//! - **Session**: `Monitor` owns device, calibration and store (`monitor`)
//! - **Loop**: cycles, sinks and control requests (`runner`, `control`)
//! - **Persistence**: calibration file (`store`) and CSV sample log (`csv_log`)

pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod csv_log;
pub mod decompose;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod monitor;
pub mod retry;
pub mod runner;
pub mod sample;
pub mod sampler;
pub mod soc;
pub mod store;

pub use cellmon_traits::CHANNELS;

pub use calibration::{CalibrationModel, CalibrationParameters, ChannelCalibration, LSB_MV_PER_CODE};
pub use config::{CalibrationLimits, MonitorCfg, SamplerCfg, TapWindows};
pub use control::{ControlRequest, ControlResponse, RejectReason};
pub use csv_log::CsvLog;
pub use decompose::{Decomposer, Decomposition, TapWarning};
pub use error::{AcquisitionFault, CalibrationInputError, MonitorError, StoreError};
pub use monitor::Monitor;
pub use retry::{Backoff, RetryPolicy};
pub use runner::{ControlMsg, RunParams, RunStats, SampleSink};
pub use sample::{CellSample, SampleReport, Telemetry, TimeOfDay};
pub use sampler::{RawReading, RawSampler};
pub use soc::estimate_soc;
pub use store::{CalibrationStore, JsonFileStore};
