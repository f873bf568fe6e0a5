#[cfg(feature = "hardware")]
pub mod ads1115;
pub mod error;
pub mod util;

use cellmon_traits::{AdcBus, CHANNELS};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::HwError;

/// mV per code of an ADS1115 at PGA ±6.144 V.
pub const ADS1115_LSB_MV: f32 = 0.1875;

#[derive(Debug, Clone)]
struct SimState {
    taps_mv: [f32; CHANNELS],
    dividers: [f32; CHANNELS],
    noise_codes: i16,
    fail_reads: [u32; CHANNELS],
    fail_probes: u32,
    probes: u32,
    reads: u32,
    rng: u32,
}

impl SimState {
    fn next_noise(&mut self) -> i16 {
        if self.noise_codes == 0 {
            return 0;
        }
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = (2 * self.noise_codes + 1) as u32;
        (x % span) as i16 - self.noise_codes
    }
}

/// Simulated 4-channel ADC behind a resistor-divider tap network.
///
/// Each tap voltage is scaled down by its divider and quantized at the
/// ADS1115 LSB. Clones share state, so a test can keep a clone as a handle to
/// move the pack voltages or inject bus faults while the monitor owns the
/// device.
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new([3700.0, 7500.0, 11400.0, 15200.0])
    }
}

impl SimulatedAdc {
    /// Dividers default to the factory calibration gains.
    pub fn new(taps_mv: [f32; CHANNELS]) -> Self {
        Self::with_dividers(taps_mv, [1.042, 2.109, 3.023, 4.033])
    }

    pub fn with_dividers(taps_mv: [f32; CHANNELS], dividers: [f32; CHANNELS]) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                taps_mv,
                dividers,
                noise_codes: 0,
                fail_reads: [0; CHANNELS],
                fail_probes: 0,
                probes: 0,
                reads: 0,
                rng: 0x2545_F491,
            })),
        }
    }

    /// Add uniform noise of up to ±`codes` to every conversion.
    pub fn with_noise(self, codes: i16, seed: u32) -> Self {
        {
            let mut s = self.lock();
            s.noise_codes = codes.max(0);
            s.rng = seed.max(1);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_taps_mv(&self, taps_mv: [f32; CHANNELS]) {
        self.lock().taps_mv = taps_mv;
    }

    /// The next `n` reads of `channel` report a bus fault.
    pub fn fail_next_reads(&self, channel: usize, n: u32) {
        if let Some(slot) = self.lock().fail_reads.get_mut(channel) {
            *slot = n;
        }
    }

    /// The next `n` probes report the device as absent.
    pub fn fail_next_probes(&self, n: u32) {
        self.lock().fail_probes = n;
    }

    pub fn probe_count(&self) -> u32 {
        self.lock().probes
    }

    pub fn read_count(&self) -> u32 {
        self.lock().reads
    }

    /// The code an ideal converter would report for `channel` right now.
    pub fn ideal_code(&self, channel: usize) -> i16 {
        let s = self.lock();
        code_for(s.taps_mv[channel], s.dividers[channel])
    }
}

fn code_for(tap_mv: f32, divider: f32) -> i16 {
    let code = (tap_mv / (divider * ADS1115_LSB_MV)).round();
    code.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

impl AdcBus for SimulatedAdc {
    fn probe(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.lock();
        s.probes += 1;
        if s.fail_probes > 0 {
            s.fail_probes -= 1;
            return Err(Box::new(HwError::NotResponding));
        }
        Ok(())
    }

    fn read_channel(
        &mut self,
        channel: u8,
    ) -> Result<i16, Box<dyn std::error::Error + Send + Sync>> {
        let ch = usize::from(channel);
        if ch >= CHANNELS {
            return Err(Box::new(HwError::InvalidChannel(channel)));
        }
        let mut s = self.lock();
        s.reads += 1;
        if s.fail_reads[ch] > 0 {
            s.fail_reads[ch] -= 1;
            return Err(Box::new(HwError::BusFault { channel }));
        }
        let noise = s.next_noise();
        Ok(code_for(s.taps_mv[ch], s.dividers[ch]).saturating_add(noise))
    }
}

#[cfg(feature = "hardware")]
pub struct HardwareAdc {
    ads: ads1115::Ads1115,
    probed: bool,
}

#[cfg(feature = "hardware")]
impl HardwareAdc {
    pub fn try_new(
        bus: u8,
        address: u16,
        conversion_timeout: std::time::Duration,
    ) -> Result<Self, HwError> {
        Ok(Self {
            ads: ads1115::Ads1115::new(bus, address, conversion_timeout)?,
            probed: false,
        })
    }
}

#[cfg(feature = "hardware")]
impl AdcBus for HardwareAdc {
    fn probe(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.probed = false;
        match self.ads.begin() {
            Ok(()) => {
                self.probed = true;
                tracing::debug!("ads1115 probed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "ads1115 probe failed");
                Err(Box::new(e))
            }
        }
    }

    fn read_channel(
        &mut self,
        channel: u8,
    ) -> Result<i16, Box<dyn std::error::Error + Send + Sync>> {
        if !self.probed {
            return Err(Box::new(HwError::NotInitialized));
        }
        self.ads.read_single_ended(channel).map_err(|e| {
            tracing::debug!(channel, error = %e, "ads1115 read failed");
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>
        })
    }
}
