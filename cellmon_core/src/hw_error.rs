//! Maps `Box<dyn Error>` from the `AdcBus` boundary to typed `MonitorError`.
//!
//! The traits in `cellmon_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `cellmon_hardware::HwError` downcasting.

use crate::error::MonitorError;

/// Map a bus-boundary error for `channel` to a typed `MonitorError`.
///
/// Bus-level hiccups become `TransientIo` (eligible for retry); a device that
/// was never brought up becomes `DeviceNotInitialized`; the rest is
/// `Hardware`.
pub fn map_hw_error(channel: usize, e: &(dyn std::error::Error + 'static)) -> MonitorError {
    #[cfg(feature = "hardware-errors")]
    {
        use cellmon_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::BusFault { .. } | HwError::I2c(_) | HwError::ConversionTimeout => {
                    MonitorError::TransientIo {
                        channel,
                        detail: hw.to_string(),
                    }
                }
                HwError::NotInitialized => MonitorError::DeviceNotInitialized,
                other => MonitorError::Hardware(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not initialized") {
        MonitorError::DeviceNotInitialized
    } else if lower.contains("bus fault") || lower.contains("timeout") || lower.contains("i2c") {
        MonitorError::TransientIo { channel, detail: s }
    } else {
        MonitorError::Hardware(s)
    }
}
