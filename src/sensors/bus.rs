/// Register-level access to a device on a shared I2C bus
use embedded_hal::i2c::I2c;

use crate::error::{SensorError, SensorResult};

/// Byte and word register access for one device address.
///
/// Every call is a single bus transaction with no retry: a transport fault
/// comes straight back as [`SensorError::Bus`]. Protocols that need to wait
/// on hardware (reset handshakes, ready bits) run their own bounded loops on
/// top of this.
pub struct RegisterClient<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> RegisterClient<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_byte(&mut self, register: u8) -> SensorResult<u8> {
        let mut buf = [0u8; 1];
        let address = self.address;
        self.i2c
            .write_read(address, &[register], &mut buf)
            .map_err(|e| bus_fault(address, register, e))?;
        Ok(buf[0])
    }

    pub fn write_byte(&mut self, register: u8, value: u8) -> SensorResult<()> {
        let address = self.address;
        self.i2c
            .write(address, &[register, value])
            .map_err(|e| bus_fault(address, register, e))
    }

    /// Read `register` (low byte) and `register + 1` (high byte) and combine
    /// them as `(high << 8) | low`.
    pub fn read_word16(&mut self, register: u8) -> SensorResult<u16> {
        let low = self.read_byte(register)?;
        let high = self.read_byte(register.wrapping_add(1))?;
        Ok(u16::from(high) << 8 | u16::from(low))
    }

    /// Send a raw command sequence (devices addressed by command words
    /// rather than registers). The first byte identifies the command in
    /// error reports.
    pub fn write_command(&mut self, command: &[u8]) -> SensorResult<()> {
        let address = self.address;
        let tag = command.first().copied().unwrap_or_default();
        self.i2c
            .write(address, command)
            .map_err(|e| bus_fault(address, tag, e))
    }

    /// Plain read without a register pointer write.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> SensorResult<()> {
        let address = self.address;
        self.i2c
            .read(address, buf)
            .map_err(|e| bus_fault(address, 0, e))
    }

    /// Give the bus handle back.
    pub fn release(self) -> I {
        self.i2c
    }
}

fn bus_fault<E: embedded_hal::i2c::Error>(address: u8, register: u8, err: E) -> SensorError {
    SensorError::Bus {
        address,
        register,
        kind: err.kind(),
    }
}
