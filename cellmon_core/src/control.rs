//! Line-oriented control requests serviced between cycles.
//!
//! Requests are single JSON objects:
//! - `{"v":[v1,v2,v3,v4]}` one-point calibration, volts
//! - `{"v":[..],"v2":[..]}` two-point calibration; `v` pairs with the anchor
//! - `{"cmd":"capture"}` acquire and hold the first two-point observation
//! - `{"cmd":"raw"}` one unaveraged pass of raw codes
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use cellmon_traits::{AdcBus, CHANNELS, Clock};

use crate::calibration::{CalibrationParameters, LSB_MV_PER_CODE};
use crate::error::{CalibrationInputError, MonitorError};
use crate::monitor::Monitor;
use crate::store::CalibrationStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    Calibrate { ref_mv: [f32; CHANNELS] },
    CalibrateTwoPoint {
        ref1_mv: [f32; CHANNELS],
        ref2_mv: [f32; CHANNELS],
    },
    Capture,
    Raw,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unexpected request shape: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    cmd: Option<String>,
    v: Option<Vec<f64>>,
    v2: Option<Vec<f64>>,
}

fn volts_to_mv(field: &str, volts: &[f64]) -> Result<[f32; CHANNELS], RequestError> {
    let arr: [f64; CHANNELS] = volts.try_into().map_err(|_| {
        RequestError::InvalidPayload(format!(
            "`{field}` must hold {CHANNELS} numbers, got {}",
            volts.len()
        ))
    })?;
    Ok(arr.map(|v| (v * 1000.0) as f32))
}

pub fn parse_request(line: &str) -> Result<ControlRequest, RequestError> {
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).map_err(|e| RequestError::InvalidJson(e.to_string()))?;
    let p: Payload =
        serde_json::from_value(value).map_err(|e| RequestError::InvalidPayload(e.to_string()))?;

    match (p.cmd.as_deref(), p.v, p.v2) {
        (Some("capture"), None, None) => Ok(ControlRequest::Capture),
        (Some("raw"), None, None) => Ok(ControlRequest::Raw),
        (Some(cmd), ..) => Err(RequestError::InvalidPayload(format!(
            "unknown command or stray fields for {cmd:?}"
        ))),
        (None, Some(v), None) => Ok(ControlRequest::Calibrate {
            ref_mv: volts_to_mv("v", &v)?,
        }),
        (None, Some(v), Some(v2)) => Ok(ControlRequest::CalibrateTwoPoint {
            ref1_mv: volts_to_mv("v", &v)?,
            ref2_mv: volts_to_mv("v2", &v2)?,
        }),
        (None, None, _) => Err(RequestError::InvalidPayload("missing `v`".into())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidJson,
    InvalidPayload,
    InvalidRange,
    WriteFailed,
    AcquisitionFailed,
    DeviceNotInitialized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Calibrated {
        ok: bool,
        k: [f32; CHANNELS],
        o: [f32; CHANNELS],
    },
    Captured {
        ok: bool,
        raw: [i16; CHANNELS],
    },
    Raw {
        raw: [i16; CHANNELS],
        valid: [bool; CHANNELS],
        lsb: f32,
    },
    Rejected {
        ok: bool,
        reason: RejectReason,
        message: String,
    },
}

impl ControlResponse {
    pub fn calibrated(p: &CalibrationParameters) -> Self {
        Self::Calibrated {
            ok: true,
            k: p.gains(),
            o: p.offsets_mv(),
        }
    }

    pub fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        Self::Rejected {
            ok: false,
            reason,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    pub fn to_json(&self) -> String {
        // Only plain numbers, bools and strings inside.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"ok":false}"#.to_string())
    }
}

impl From<&RequestError> for ControlResponse {
    fn from(e: &RequestError) -> Self {
        let reason = match e {
            RequestError::InvalidJson(_) => RejectReason::InvalidJson,
            RequestError::InvalidPayload(_) => RejectReason::InvalidPayload,
        };
        Self::rejected(reason, e.to_string())
    }
}

impl From<&MonitorError> for ControlResponse {
    fn from(e: &MonitorError) -> Self {
        let reason = match e {
            MonitorError::InvalidCalibrationInput(CalibrationInputError::MissingFirstPoint) => {
                RejectReason::InvalidPayload
            }
            MonitorError::InvalidCalibrationInput(_) => RejectReason::InvalidRange,
            MonitorError::Persistence(_) => RejectReason::WriteFailed,
            MonitorError::DeviceNotInitialized => RejectReason::DeviceNotInitialized,
            MonitorError::TransientIo { .. }
            | MonitorError::Acquisition(_)
            | MonitorError::Hardware(_) => RejectReason::AcquisitionFailed,
        };
        Self::rejected(reason, e.to_string())
    }
}

/// Execute one request against the session.
pub fn handle<A: AdcBus, C: Clock, S: CalibrationStore>(
    monitor: &mut Monitor<A, C, S>,
    request: ControlRequest,
) -> ControlResponse {
    let outcome = match request {
        ControlRequest::Calibrate { ref_mv } => monitor
            .calibrate_one_point(&ref_mv)
            .map(|p| ControlResponse::calibrated(&p)),
        ControlRequest::CalibrateTwoPoint { ref1_mv, ref2_mv } => monitor
            .calibrate_two_point(&ref1_mv, &ref2_mv)
            .map(|p| ControlResponse::calibrated(&p)),
        ControlRequest::Capture => monitor.capture_point().map(|raw| ControlResponse::Captured {
            ok: true,
            raw: raw.codes,
        }),
        ControlRequest::Raw => monitor.read_raw().map(|raw| ControlResponse::Raw {
            raw: raw.codes,
            valid: raw.valid,
            lsb: LSB_MV_PER_CODE,
        }),
    };
    match outcome {
        Ok(resp) => {
            info!(?request, "control request served");
            resp
        }
        Err(e) => {
            warn!(?request, error = %e, "control request rejected");
            ControlResponse::from(&e)
        }
    }
}

/// Parse and execute one request line.
pub fn handle_line<A: AdcBus, C: Clock, S: CalibrationStore>(
    monitor: &mut Monitor<A, C, S>,
    line: &str,
) -> ControlResponse {
    match parse_request(line) {
        Ok(req) => handle(monitor, req),
        Err(e) => {
            warn!(error = %e, "control request refused");
            ControlResponse::from(&e)
        }
    }
}
