/// LPS22HB barometric pressure and temperature sensor
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::error::{SensorError, SensorResult};
use crate::models::BaroSample;
use crate::sensors::{PressureSensor, RegisterClient};

pub const DEFAULT_ADDRESS: u8 = 0x5C;

const DEVICE_ID: u8 = 0xB1;

/// Upper bound on status reads while waiting for the reset bit to clear.
pub const RESET_POLL_LIMIT: u32 = 1000;
/// Upper bound on status reads while waiting for a ready bit in one poll.
pub const READY_POLL_LIMIT: u32 = 1000;

mod reg {
    pub const WHO_AM_I: u8 = 0x0F;
    pub const CTRL_REG1: u8 = 0x10;
    pub const CTRL_REG2: u8 = 0x11;
    pub const STATUS: u8 = 0x27;
    pub const PRESS_OUT_XL: u8 = 0x28;
    pub const PRESS_OUT_L: u8 = 0x29;
    pub const PRESS_OUT_H: u8 = 0x2A;
    pub const TEMP_OUT_L: u8 = 0x2B;
}

mod bits {
    /// CTRL_REG1: block data update.
    pub const BDU: u8 = 0x02;
    /// CTRL_REG1: 1 Hz output rate with the low-pass filter on.
    pub const ODR_1HZ_LPF: u8 = 0x18;
    /// CTRL_REG2: software reset, self-clearing.
    pub const SWRESET: u8 = 0x04;
    /// CTRL_REG2: FIFO enable.
    pub const FIFO_EN: u8 = 0x40;
    /// STATUS: pressure data available.
    pub const P_DA: u8 = 0x01;
    /// STATUS: temperature data available.
    pub const T_DA: u8 = 0x02;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Resetting,
    Configured,
    Continuous,
}

pub struct Lps22hb<I> {
    client: RegisterClient<I>,
    state: DriverState,
}

/// Pressure in mbar from the XL, L and H output bytes (4096 LSB per mbar).
pub fn decode_pressure(xl: u8, l: u8, h: u8) -> f64 {
    let raw = u32::from(h) << 16 | u32::from(l) << 8 | u32::from(xl);
    f64::from(raw) / 4096.0
}

/// Temperature in °C from the signed 16-bit output word (100 LSB per °C).
pub fn decode_temperature(raw: u16) -> f64 {
    f64::from(raw as i16) / 100.0
}

impl<I: I2c> Lps22hb<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            client: RegisterClient::new(i2c, address),
            state: DriverState::Uninitialized,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Log a warning when WHO_AM_I does not identify an LPS22HB. Bring-up
    /// carries on regardless.
    pub fn check_identity(&mut self) -> SensorResult<()> {
        let id = self.client.read_byte(reg::WHO_AM_I)?;
        if id != DEVICE_ID {
            warn!(
                "Unexpected WHO_AM_I 0x{:02x} at 0x{:02x} (expected 0x{:02x})",
                id,
                self.client.address(),
                DEVICE_ID
            );
        }
        Ok(())
    }

    /// Software reset followed by block-data-update configuration.
    ///
    /// The reset bit is re-read until the device clears it, at most
    /// [`RESET_POLL_LIMIT`] times.
    pub fn reset(&mut self) -> SensorResult<()> {
        self.state = DriverState::Resetting;
        let ctrl = self.client.read_byte(reg::CTRL_REG2)?;
        self.client.write_byte(reg::CTRL_REG2, ctrl | bits::SWRESET)?;

        let mut polls = 0;
        loop {
            if polls == RESET_POLL_LIMIT {
                return Err(SensorError::ResetTimeout { polls });
            }
            polls += 1;
            if self.client.read_byte(reg::CTRL_REG2)? & bits::SWRESET == 0 {
                break;
            }
        }
        debug!("LPS22HB reset complete after {} polls", polls);

        self.client.write_byte(reg::CTRL_REG1, bits::BDU)?;
        self.state = DriverState::Configured;
        Ok(())
    }

    /// Enable 1 Hz continuous output and the FIFO.
    pub fn start_continuous(&mut self) -> SensorResult<()> {
        let ctrl1 = self.client.read_byte(reg::CTRL_REG1)?;
        self.client
            .write_byte(reg::CTRL_REG1, ctrl1 | bits::ODR_1HZ_LPF)?;
        let ctrl2 = self.client.read_byte(reg::CTRL_REG2)?;
        self.client.write_byte(reg::CTRL_REG2, ctrl2 | bits::FIFO_EN)?;
        self.state = DriverState::Continuous;
        Ok(())
    }

    fn read_pressure(&mut self) -> SensorResult<f64> {
        let xl = self.client.read_byte(reg::PRESS_OUT_XL)?;
        let l = self.client.read_byte(reg::PRESS_OUT_L)?;
        let h = self.client.read_byte(reg::PRESS_OUT_H)?;
        Ok(decode_pressure(xl, l, h))
    }

    fn read_temperature(&mut self) -> SensorResult<f64> {
        let raw = self.client.read_word16(reg::TEMP_OUT_L)?;
        Ok(decode_temperature(raw))
    }

    pub fn release(self) -> I {
        self.client.release()
    }
}

impl<I: I2c> PressureSensor for Lps22hb<I> {
    fn start(&mut self) -> SensorResult<()> {
        self.check_identity()?;
        self.reset()?;
        self.start_continuous()?;
        info!(
            "LPS22HB at 0x{:02x} {:?}",
            self.client.address(),
            self.state()
        );
        Ok(())
    }

    /// Spin on the status register until at least one ready bit has been
    /// seen, reading whichever quantities are ready. Gives up after
    /// [`READY_POLL_LIMIT`] status reads and returns an empty sample.
    fn poll_once(&mut self) -> SensorResult<BaroSample> {
        if self.state != DriverState::Continuous {
            return Err(SensorError::NotContinuous);
        }

        let mut sample = BaroSample::default();
        for _ in 0..READY_POLL_LIMIT {
            let status = self.client.read_byte(reg::STATUS)?;
            if status & bits::P_DA != 0 {
                sample.pressure_mbar = Some(self.read_pressure()?);
            }
            if status & bits::T_DA != 0 {
                sample.temperature_c = Some(self.read_temperature()?);
            }
            if !sample.is_empty() {
                return Ok(sample);
            }
        }

        debug!("No ready bit after {} status reads", READY_POLL_LIMIT);
        Ok(sample)
    }
}
