//! Human-readable error descriptions and structured JSON error formatting.

use cellmon_core::error::{MonitorError, StoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(me) = err.downcast_ref::<MonitorError>() {
        return match me {
            MonitorError::DeviceNotInitialized => {
                "What happened: The ADC is not initialized.\nLikely causes: ADS1115 not powered, wrong I²C bus or address, or it dropped off the bus after repeated faults.\nHow to fix: Check wiring and [bus] i2c_bus/address in the config, then run `cellmon self-check`.".to_string()
            }
            MonitorError::Acquisition(fault) => format!(
                "What happened: The acquisition cycle was rejected ({fault}).\nLikely causes: Loose tap wire, noisy bus, or a failing converter.\nHow to fix: Check the tap harness and I²C pull-ups; raise retry.max_attempts if the bus is marginal."
            ),
            MonitorError::TransientIo { channel, detail } => format!(
                "What happened: Bus fault on channel {channel} ({detail}).\nLikely causes: Electrical noise or a marginal I²C connection.\nHow to fix: Check cabling and pull-ups, then retry."
            ),
            MonitorError::InvalidCalibrationInput(e) => format!(
                "What happened: Calibration input was refused ({e}).\nLikely causes: Reference voltages not cumulative per tap, typed in mV instead of V, or a saturated channel.\nHow to fix: Pass four cumulative tap voltages in volts, e.g. --v 3.70,7.50,11.40,15.20. Nothing was changed."
            ),
            MonitorError::Persistence(StoreError::Write(msg)) => format!(
                "What happened: The new calibration could not be saved ({msg}).\nLikely causes: Read-only filesystem or missing permissions.\nHow to fix: Check calibration.file in the config. The previous calibration is still in effect."
            ),
            MonitorError::Persistence(e) => format!(
                "What happened: Calibration storage problem ({e}).\nLikely causes: Missing or damaged calibration file.\nHow to fix: Re-run the calibration to write a fresh file."
            ),
            MonitorError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Converter absent or I²C bus not enabled.\nHow to fix: Enable I²C (raspi-config) and verify the device answers at the configured address."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        let cause = err.root_cause().to_string();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Out-of-range values or a typo in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Check the --config path."
        );
    }

    if lower.contains("open ads1115") {
        return "What happened: Failed to open the I²C bus.\nLikely causes: I²C disabled or insufficient permissions on /dev/i2c-*.\nHow to fix: Enable I²C and add the user to the i2c group.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure class; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<MonitorError>() {
        Some(MonitorError::DeviceNotInitialized) => 3,
        Some(MonitorError::Acquisition(_)) => 4,
        Some(MonitorError::InvalidCalibrationInput(_)) => 5,
        Some(MonitorError::Persistence(_)) => 6,
        Some(MonitorError::Hardware(_) | MonitorError::TransientIo { .. }) => 7,
        None => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<MonitorError>() {
        Some(MonitorError::DeviceNotInitialized) => "DeviceNotInitialized",
        Some(MonitorError::Acquisition(_)) => "AcquisitionFault",
        Some(MonitorError::InvalidCalibrationInput(_)) => "InvalidCalibrationInput",
        Some(MonitorError::Persistence(_)) => "Persistence",
        Some(MonitorError::Hardware(_)) => "Hardware",
        Some(MonitorError::TransientIo { .. }) => "TransientIo",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
