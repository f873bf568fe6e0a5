use std::time::Duration;
use tracing::trace;

use rppal::i2c::I2c;

use crate::error::{HwError, Result};
use crate::util::wait_until_ready_with_timeout;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// OS bit: write 1 to start a single conversion, reads 1 when idle.
const CFG_OS: u16 = 0x8000;
/// Single-ended AIN0 vs GND; AINn is this plus n.
const CFG_MUX_SINGLE_0: u16 = 0x4000;
/// PGA ±6.144 V (gain 2/3), 0.1875 mV per code.
const CFG_PGA_6_144V: u16 = 0x0000;
const CFG_MODE_SINGLE: u16 = 0x0100;
const CFG_DR_475SPS: u16 = 0x00C0;
/// Comparator disabled, ALERT/RDY high-impedance.
const CFG_COMP_DISABLE: u16 = 0x0003;

const CFG_BASE: u16 = CFG_PGA_6_144V | CFG_MODE_SINGLE | CFG_DR_475SPS | CFG_COMP_DISABLE;

/// Default 7-bit address with ADDR tied to GND.
pub const DEFAULT_ADDRESS: u16 = 0x48;

pub struct Ads1115 {
    i2c: I2c,
    address: u16,
    conversion_timeout: Duration,
}

impl Ads1115 {
    pub fn new(bus: u8, address: u16, conversion_timeout: Duration) -> Result<Self> {
        let i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(format!("open i2c-{bus}: {e}")))?;
        Ok(Self {
            i2c,
            address,
            conversion_timeout,
        })
    }

    /// Check the device answers and leave it idle with the PGA armed.
    pub fn begin(&mut self) -> Result<()> {
        self.i2c
            .set_slave_address(self.address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        self.read_register(REG_CONFIG)
            .map_err(|_| HwError::NotResponding)?;
        self.write_register(REG_CONFIG, CFG_BASE)?;
        Ok(())
    }

    pub fn read_single_ended(&mut self, channel: u8) -> Result<i16> {
        if channel > 3 {
            return Err(HwError::InvalidChannel(channel));
        }
        let mux = CFG_MUX_SINGLE_0 + (u16::from(channel) << 12);
        self.write_register(REG_CONFIG, CFG_OS | mux | CFG_BASE)?;

        // ~2.1 ms per conversion at 475 SPS
        let timeout = self.conversion_timeout;
        wait_until_ready_with_timeout(
            || Ok((self.read_register(REG_CONFIG)? & CFG_OS) != 0),
            timeout,
            Duration::from_micros(250),
        )?;

        let word = self.read_register(REG_CONVERSION)?;
        if word == 0xFFFF {
            return Err(HwError::BusFault { channel });
        }
        let code = word as i16;
        trace!(channel, code, "ads1115 conversion");
        Ok(code)
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(&[reg, hi, lo])
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&[reg], &mut buf)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(u16::from_be_bytes(buf))
    }
}
