//! Oversampled, fault-tolerant acquisition of the four tap channels.
//!
//! `RawSampler` exclusively owns the `AdcBus` handle. Every channel read goes
//! through the configured `RetryPolicy`; when a read keeps failing the device
//! is soft-reset (re-probed, which re-arms its gain) and that pass counts as
//! invalid for the channel. Reads are blocking; nothing here spawns threads.
use cellmon_traits::{AdcBus, CHANNELS, Clock};
use tracing::{debug, trace, warn};

use crate::config::SamplerCfg;
use crate::error::{AcquisitionFault, MonitorError};
use crate::hw_error::map_hw_error;
use crate::retry::RetryError;

/// Raw codes for one acquisition, one entry per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    pub codes: [i16; CHANNELS],
    pub valid: [bool; CHANNELS],
    /// Passes that contributed to each code.
    pub passes: [u8; CHANNELS],
}

impl RawReading {
    /// A reading where every channel holds a single valid code.
    pub fn from_codes(codes: [i16; CHANNELS]) -> Self {
        Self {
            codes,
            valid: [true; CHANNELS],
            passes: [1; CHANNELS],
        }
    }

    #[inline]
    pub fn all_valid(&self) -> bool {
        self.valid.iter().all(|v| *v)
    }
}

pub struct RawSampler<A, C> {
    adc: A,
    clock: C,
    cfg: SamplerCfg,
    initialized: bool,
}

impl<A: AdcBus, C: Clock> RawSampler<A, C> {
    pub fn new(adc: A, clock: C, cfg: SamplerCfg) -> Self {
        Self {
            adc,
            clock,
            cfg,
            initialized: false,
        }
    }

    pub fn cfg(&self) -> &SamplerCfg {
        &self.cfg
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Probe the converter and arm it. Safe to call again after a failure.
    pub fn init(&mut self) -> Result<(), MonitorError> {
        match self.adc.probe() {
            Ok(()) => {
                self.initialized = true;
                debug!("adc initialized");
                Ok(())
            }
            Err(e) => {
                self.initialized = false;
                let err = match map_hw_error(0, e.as_ref()) {
                    MonitorError::TransientIo { detail, .. } => MonitorError::Hardware(detail),
                    other => other,
                };
                warn!(error = %err, "adc initialization failed");
                Err(err)
            }
        }
    }

    /// One oversampled acquisition of all channels.
    ///
    /// Each code is `sum / valid_passes`, truncated toward zero. Fails with
    /// `InsufficientValidSamples` when any channel lost more than half of its
    /// passes.
    pub fn sample(&mut self) -> Result<RawReading, MonitorError> {
        if !self.initialized {
            return Err(MonitorError::DeviceNotInitialized);
        }
        let total = self.cfg.oversample.max(1);
        let mut acc = [0i32; CHANNELS];
        let mut valid = [0u8; CHANNELS];

        for pass in 0..total {
            for ch in 0..CHANNELS {
                match self.read_channel(ch) {
                    Ok(code) => {
                        acc[ch] += i32::from(code);
                        valid[ch] += 1;
                    }
                    Err(MonitorError::TransientIo { detail, .. }) => {
                        debug!(pass, channel = ch, %detail, "pass invalid for channel");
                    }
                    Err(e) => return Err(e),
                }
                self.clock.sleep(self.cfg.settle);
            }
        }

        let min_valid = self.cfg.min_valid_passes();
        if let Some(ch) = (0..CHANNELS).find(|&ch| valid[ch] < min_valid) {
            let fault = AcquisitionFault::InsufficientValidSamples {
                channel: ch,
                valid: valid[ch],
                total,
            };
            warn!(%fault, "cycle rejected");
            return Err(fault.into());
        }

        let mut codes = [0i16; CHANNELS];
        for ch in 0..CHANNELS {
            // Mean of i16 values always fits in i16
            codes[ch] = (acc[ch] / i32::from(valid[ch])) as i16;
        }
        trace!(?codes, passes = ?valid, "oversampled reading");
        Ok(RawReading {
            codes,
            valid: [true; CHANNELS],
            passes: valid,
        })
    }

    /// A single pass over all channels, no averaging.
    ///
    /// Channels whose read fails after retries are returned with
    /// `valid == false` and code 0 instead of failing the call.
    pub fn read_once(&mut self) -> Result<RawReading, MonitorError> {
        if !self.initialized {
            return Err(MonitorError::DeviceNotInitialized);
        }
        let mut reading = RawReading {
            codes: [0; CHANNELS],
            valid: [false; CHANNELS],
            passes: [0; CHANNELS],
        };
        for ch in 0..CHANNELS {
            match self.read_channel(ch) {
                Ok(code) => {
                    reading.codes[ch] = code;
                    reading.valid[ch] = true;
                    reading.passes[ch] = 1;
                }
                Err(MonitorError::TransientIo { .. }) => {}
                Err(e) => return Err(e),
            }
            self.clock.sleep(self.cfg.settle);
        }
        Ok(reading)
    }

    /// Read one channel under the retry policy; soft-reset once it is exhausted.
    fn read_channel(&mut self, ch: usize) -> Result<i16, MonitorError> {
        let adc = &mut self.adc;
        let res = self.cfg.retry.run_if(
            &self.clock,
            |e: &MonitorError| matches!(e, MonitorError::TransientIo { .. }),
            |attempt| {
                adc.read_channel(ch as u8).map_err(|e| {
                    let err = map_hw_error(ch, e.as_ref());
                    trace!(channel = ch, attempt, error = %err, "adc read failed");
                    err
                })
            },
        );
        match res {
            Ok(code) => Ok(code),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(channel = ch, attempts, error = %last, "retries exhausted, resetting adc");
                self.soft_reset()?;
                Err(last)
            }
            Err(RetryError::Aborted { error, .. }) => {
                if matches!(error, MonitorError::DeviceNotInitialized) {
                    self.initialized = false;
                }
                Err(error)
            }
        }
    }

    fn soft_reset(&mut self) -> Result<(), MonitorError> {
        match self.adc.probe() {
            Ok(()) => {
                debug!("adc soft reset ok");
                Ok(())
            }
            Err(e) => {
                self.initialized = false;
                warn!(error = %e, "adc soft reset failed; device needs re-initialization");
                Err(MonitorError::DeviceNotInitialized)
            }
        }
    }
}
