pub mod bus;
pub mod lps22hb;
pub mod shtc3;
pub mod tcs34725;

use crate::error::SensorResult;
use crate::models::{AmbientSample, BaroSample, LightSample};

pub use bus::RegisterClient;
pub use lps22hb::Lps22hb;
pub use shtc3::Shtc3;
pub use tcs34725::{GainStep, Tcs34725};

/// Barometric pressure/temperature source polled once per tick.
pub trait PressureSensor {
    /// Reset and configure the device for continuous sampling.
    fn start(&mut self) -> SensorResult<()>;

    fn poll_once(&mut self) -> SensorResult<BaroSample>;
}

/// Ambient light source with stepped gain control.
pub trait LightSensor {
    fn init(&mut self) -> SensorResult<()>;

    fn sample(&mut self) -> SensorResult<LightSample>;

    /// Move the gain one step and return the resulting multiplier.
    fn adjust_gain(&mut self, step: GainStep) -> SensorResult<u8>;

    /// Current gain multiplier.
    fn gain(&self) -> u8;
}

/// Auxiliary temperature/humidity capability.
pub trait EnvironmentSensor {
    /// Temperature and humidity from a single conversion.
    fn measure(&mut self) -> SensorResult<AmbientSample>;

    fn read_temperature(&mut self) -> SensorResult<f64> {
        Ok(self.measure()?.temperature_c)
    }

    fn read_humidity(&mut self) -> SensorResult<f64> {
        Ok(self.measure()?.humidity_pct)
    }
}
