/// Error types shared by the drivers, the sampler and configuration loading
use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

pub type SensorResult<T> = Result<T, SensorError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    /// Transport failure on the I2C bus. Never retried at the register layer.
    #[error("bus fault on device 0x{address:02x}, register 0x{register:02x}: {kind:?}")]
    Bus {
        address: u8,
        register: u8,
        kind: ErrorKind,
    },

    #[error("software reset did not complete after {polls} polls")]
    ResetTimeout { polls: u32 },

    #[error("driver initialisation failed: {0}")]
    DriverInit(String),

    #[error("pressure sensor polled before continuous mode was enabled")]
    NotContinuous,

    #[error("checksum mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    Crc { expected: u8, actual: u8 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
