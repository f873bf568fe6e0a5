use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_ready` until it reports true or `timeout` expires.
///
/// Errors from the predicate end the wait immediately. Sleeps `poll_interval`
/// between polls to keep the bus quiet.
pub fn wait_until_ready_with_timeout(
    mut is_ready: impl FnMut() -> Result<bool>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !is_ready()? {
        if Instant::now() >= deadline {
            return Err(HwError::ConversionTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
