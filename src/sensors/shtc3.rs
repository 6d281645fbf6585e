/// SHTC3 humidity and temperature sensor, the station's auxiliary
/// environment source
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::{SensorError, SensorResult};
use crate::models::AmbientSample;
use crate::sensors::{EnvironmentSensor, RegisterClient};

pub const DEFAULT_ADDRESS: u8 = 0x70;

const CMD_WAKEUP: [u8; 2] = [0x35, 0x17];
const CMD_SLEEP: [u8; 2] = [0xB0, 0x98];
/// Normal power mode, clock stretching off, temperature first.
const CMD_MEASURE_T_FIRST: [u8; 2] = [0x78, 0x66];

const WAKEUP_DELAY_US: u32 = 240;
const MEASUREMENT_DELAY_MS: u32 = 13;

/// CRC-8, polynomial 0x31, initial value 0xFF.
fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn checked_word(bytes: &[u8]) -> SensorResult<u16> {
    let expected = crc8(&bytes[..2]);
    if expected != bytes[2] {
        return Err(SensorError::Crc {
            expected,
            actual: bytes[2],
        });
    }
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub struct Shtc3<I, D> {
    client: RegisterClient<I>,
    delay: D,
}

impl<I: I2c, D: DelayNs> Shtc3<I, D> {
    pub fn new(i2c: I, address: u8, delay: D) -> Self {
        Self {
            client: RegisterClient::new(i2c, address),
            delay,
        }
    }

    /// Wake the sensor, take one measurement and put it back to sleep.
    pub fn single_shot(&mut self) -> SensorResult<AmbientSample> {
        self.client.write_command(&CMD_WAKEUP)?;
        self.delay.delay_us(WAKEUP_DELAY_US);
        self.client.write_command(&CMD_MEASURE_T_FIRST)?;
        self.delay.delay_ms(MEASUREMENT_DELAY_MS);

        let mut buf = [0u8; 6];
        self.client.read_raw(&mut buf)?;
        self.client.write_command(&CMD_SLEEP)?;

        let raw_t = checked_word(&buf[0..3])?;
        let raw_rh = checked_word(&buf[3..6])?;
        Ok(AmbientSample {
            temperature_c: -45.0 + 175.0 * f64::from(raw_t) / 65536.0,
            humidity_pct: 100.0 * f64::from(raw_rh) / 65536.0,
        })
    }

    pub fn release(self) -> I {
        self.client.release()
    }
}

impl<I: I2c, D: DelayNs> EnvironmentSensor for Shtc3<I, D> {
    fn measure(&mut self) -> SensorResult<AmbientSample> {
        self.single_shot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, NoDelay};

    fn frame(raw_t: u16, raw_rh: u16) -> Vec<u8> {
        let t = raw_t.to_be_bytes();
        let rh = raw_rh.to_be_bytes();
        vec![t[0], t[1], crc8(&t), rh[0], rh[1], crc8(&rh)]
    }

    #[test]
    fn crc_matches_datasheet_example() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn measurement_converts_raw_words() {
        let bus = FakeBus::new();
        bus.queue_raw(&frame(0x6666, 0x8000));
        let mut sensor = Shtc3::new(bus.clone(), DEFAULT_ADDRESS, NoDelay);

        let m = sensor.single_shot().unwrap();

        assert!((m.temperature_c - (-45.0 + 175.0 * 26214.0 / 65536.0)).abs() < 1e-9);
        assert_eq!(m.humidity_pct, 50.0);
        assert_eq!(
            bus.commands(),
            vec![
                CMD_WAKEUP.to_vec(),
                CMD_MEASURE_T_FIRST.to_vec(),
                CMD_SLEEP.to_vec()
            ]
        );
    }

    #[test]
    fn corrupted_frame_is_reported() {
        let bus = FakeBus::new();
        let mut bytes = frame(0x6666, 0x8000);
        bytes[5] ^= 0xFF;
        bus.queue_raw(&bytes);
        let mut sensor = Shtc3::new(bus, DEFAULT_ADDRESS, NoDelay);

        assert!(matches!(
            sensor.read_humidity(),
            Err(SensorError::Crc { .. })
        ));
    }
}
