use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("i2c error: {0}")]
    I2c(String),
    /// The converter answered with the all-ones word; the transfer is not trusted.
    #[error("bus fault reading channel {channel}")]
    BusFault { channel: u8 },
    #[error("adc not responding on the bus")]
    NotResponding,
    #[error("adc not initialized")]
    NotInitialized,
    #[error("adc conversion-ready timeout")]
    ConversionTimeout,
    #[error("invalid adc channel {0}")]
    InvalidChannel(u8),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
