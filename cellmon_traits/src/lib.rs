pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Number of ADC channels wired to the pack taps.
pub const CHANNELS: usize = 4;

/// A multi-channel single-ended ADC on a shared bus.
///
/// Implementations report bus faults as errors; a returned code is always a
/// real conversion result.
pub trait AdcBus {
    /// Bring the device up (or back up): probe it on the bus and arm its gain.
    fn probe(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// One single-ended conversion of `channel` (0-based).
    fn read_channel(
        &mut self,
        channel: u8,
    ) -> Result<i16, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: AdcBus + ?Sized> AdcBus for Box<T> {
    fn probe(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).probe()
    }

    fn read_channel(
        &mut self,
        channel: u8,
    ) -> Result<i16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_channel(channel)
    }
}
