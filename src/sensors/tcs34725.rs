/// TCS34725 colour sensor used as an ambient light meter
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::error::{SensorError, SensorResult};
use crate::models::LightSample;
use crate::sensors::{LightSensor, RegisterClient};

pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Empirical correction applied to the DN40 lux figure for this enclosure.
pub const LUX_NORMALISATION: f64 = 3.0;

/// Every register access carries the command bit.
const COMMAND_BIT: u8 = 0x80;
const VALID_IDS: [u8; 2] = [0x44, 0x4D];

/// ATIME value for a 154 ms integration window.
const INTEGRATION_154MS: u8 = 0xC0;
const POWER_ON_DELAY_MS: u32 = 3;
const VALID_POLL_LIMIT: u32 = 50;
const VALID_POLL_DELAY_MS: u32 = 5;

// DN40 lux coefficients.
const R_COEF: f64 = 0.136;
const G_COEF: f64 = 1.0;
const B_COEF: f64 = -0.444;
const GLASS_ATTENUATION: f64 = 1.0;
const DEVICE_FACTOR: f64 = 310.0;

mod reg {
    pub const ENABLE: u8 = 0x00;
    pub const ATIME: u8 = 0x01;
    pub const CONTROL: u8 = 0x0F;
    pub const ID: u8 = 0x12;
    pub const STATUS: u8 = 0x13;
    pub const CDATAL: u8 = 0x14;
    pub const RDATAL: u8 = 0x16;
    pub const GDATAL: u8 = 0x18;
    pub const BDATAL: u8 = 0x1A;
}

mod bits {
    pub const ENABLE_PON: u8 = 0x01;
    pub const ENABLE_AEN: u8 = 0x02;
    pub const STATUS_AVALID: u8 = 0x01;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainStep {
    Up,
    Down,
}

/// Analog gain settings supported by the device, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gain {
    X1,
    X4,
    X16,
    X60,
}

impl Gain {
    const LADDER: [Gain; 4] = [Gain::X1, Gain::X4, Gain::X16, Gain::X60];

    pub fn multiplier(self) -> u8 {
        match self {
            Gain::X1 => 1,
            Gain::X4 => 4,
            Gain::X16 => 16,
            Gain::X60 => 60,
        }
    }

    fn control_bits(self) -> u8 {
        self as u8
    }

    /// One step along the ladder, clamped at either end.
    pub fn step(self, step: GainStep) -> Gain {
        let index = self as usize;
        let next = match step {
            GainStep::Up => (index + 1).min(Self::LADDER.len() - 1),
            GainStep::Down => index.saturating_sub(1),
        };
        Self::LADDER[next]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawChannels {
    pub clear: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl RawChannels {
    /// Illuminance using the DN40 IR-compensated channel mix.
    pub fn lux(&self, atime: u8, gain: Gain) -> f64 {
        let (c, r, g, b) = (
            f64::from(self.clear),
            f64::from(self.red),
            f64::from(self.green),
            f64::from(self.blue),
        );
        let ir = if r + g + b > c { (r + g + b - c) / 2.0 } else { 0.0 };

        let atime_ms = (256.0 - f64::from(atime)) * 2.4;
        let counts_per_lux =
            atime_ms * f64::from(gain.multiplier()) / (GLASS_ATTENUATION * DEVICE_FACTOR);
        let lux = (R_COEF * (r - ir) + G_COEF * (g - ir) + B_COEF * (b - ir)) / counts_per_lux;
        lux.max(0.0)
    }

    /// Colour packed as 0xRRGGBB after scaling the brightest channel into
    /// eight bits and trimming the dark offset.
    pub fn rgb888(&self) -> u32 {
        let max = self.red.max(self.green).max(self.blue);
        let divisor = u32::from(max) / 255 + 1;
        let scale = |channel: u16| {
            let mut value = u32::from(channel) / divisor;
            if value > 30 {
                value -= 30;
            }
            (value * 255 / 225).min(255)
        };
        scale(self.red) << 16 | scale(self.green) << 8 | scale(self.blue)
    }
}

pub struct Tcs34725<I, D> {
    client: RegisterClient<I>,
    delay: D,
    gain: Gain,
    atime: u8,
}

impl<I: I2c, D: DelayNs> Tcs34725<I, D> {
    pub fn new(i2c: I, address: u8, delay: D) -> Self {
        Self {
            client: RegisterClient::new(i2c, address),
            delay,
            gain: Gain::X1,
            atime: INTEGRATION_154MS,
        }
    }

    fn read(&mut self, register: u8) -> SensorResult<u8> {
        self.client.read_byte(COMMAND_BIT | register)
    }

    fn write(&mut self, register: u8, value: u8) -> SensorResult<()> {
        self.client.write_byte(COMMAND_BIT | register, value)
    }

    fn read_word(&mut self, register: u8) -> SensorResult<u16> {
        self.client.read_word16(COMMAND_BIT | register)
    }

    fn set_gain(&mut self, gain: Gain) -> SensorResult<()> {
        self.write(reg::CONTROL, gain.control_bits())?;
        self.gain = gain;
        Ok(())
    }

    fn integration_ms(&self) -> u32 {
        (256 - u32::from(self.atime)) * 12 / 5
    }

    /// Wait out one integration cycle, then poll until the device flags a
    /// complete conversion.
    fn wait_for_valid(&mut self) -> SensorResult<()> {
        let integration_ms = self.integration_ms();
        self.delay.delay_ms(integration_ms);
        for _ in 0..VALID_POLL_LIMIT {
            if self.read(reg::STATUS)? & bits::STATUS_AVALID != 0 {
                return Ok(());
            }
            self.delay.delay_ms(VALID_POLL_DELAY_MS);
        }
        debug!("TCS34725 conversion not flagged valid, reading anyway");
        Ok(())
    }

    pub fn read_channels(&mut self) -> SensorResult<RawChannels> {
        self.wait_for_valid()?;
        Ok(RawChannels {
            clear: self.read_word(reg::CDATAL)?,
            red: self.read_word(reg::RDATAL)?,
            green: self.read_word(reg::GDATAL)?,
            blue: self.read_word(reg::BDATAL)?,
        })
    }

    pub fn release(self) -> I {
        self.client.release()
    }
}

impl<I: I2c, D: DelayNs> LightSensor for Tcs34725<I, D> {
    fn init(&mut self) -> SensorResult<()> {
        let id = self.read(reg::ID)?;
        if !VALID_IDS.contains(&id) {
            return Err(SensorError::DriverInit(format!(
                "TCS34725 reported id 0x{:02x}",
                id
            )));
        }

        self.write(reg::ATIME, self.atime)?;
        self.set_gain(Gain::X1)?;
        self.write(reg::ENABLE, bits::ENABLE_PON)?;
        self.delay.delay_ms(POWER_ON_DELAY_MS);
        self.write(reg::ENABLE, bits::ENABLE_PON | bits::ENABLE_AEN)?;
        info!(
            "TCS34725 at 0x{:02x} ready, integration {} ms",
            self.client.address(),
            self.integration_ms()
        );
        Ok(())
    }

    fn sample(&mut self) -> SensorResult<LightSample> {
        let channels = self.read_channels()?;
        Ok(LightSample {
            clear: channels.clear,
            lux: channels.lux(self.atime, self.gain) / LUX_NORMALISATION,
            rgb888: channels.rgb888(),
        })
    }

    fn adjust_gain(&mut self, step: GainStep) -> SensorResult<u8> {
        let next = self.gain.step(step);
        if next != self.gain {
            self.set_gain(next)?;
        }
        Ok(self.gain.multiplier())
    }

    fn gain(&self) -> u8 {
        self.gain.multiplier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBus, NoDelay};

    fn sensor(bus: &FakeBus) -> Tcs34725<FakeBus, NoDelay> {
        Tcs34725::new(bus.clone(), DEFAULT_ADDRESS, NoDelay)
    }

    fn set_word(bus: &FakeBus, register: u8, value: u16) {
        let [low, high] = value.to_le_bytes();
        bus.set(COMMAND_BIT | register, low);
        bus.set(COMMAND_BIT | (register + 1), high);
    }

    #[test]
    fn gain_ladder_clamps_at_both_ends() {
        assert_eq!(Gain::X1.step(GainStep::Down), Gain::X1);
        assert_eq!(Gain::X1.step(GainStep::Up), Gain::X4);
        assert_eq!(Gain::X16.step(GainStep::Up), Gain::X60);
        assert_eq!(Gain::X60.step(GainStep::Up), Gain::X60);
        assert_eq!(Gain::X60.step(GainStep::Down), Gain::X16);
    }

    #[test]
    fn init_rejects_unknown_device() {
        let bus = FakeBus::new();
        bus.set(COMMAND_BIT | reg::ID, 0x00);

        let err = sensor(&bus).init().unwrap_err();

        assert!(matches!(err, SensorError::DriverInit(_)));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn init_powers_up_with_unity_gain() {
        let bus = FakeBus::new();
        bus.set(COMMAND_BIT | reg::ID, 0x44);
        let mut light = sensor(&bus);

        light.init().unwrap();

        assert_eq!(light.gain(), 1);
        assert_eq!(bus.get(COMMAND_BIT | reg::ATIME), INTEGRATION_154MS);
        assert_eq!(bus.get(COMMAND_BIT | reg::CONTROL), 0);
        assert_eq!(
            bus.get(COMMAND_BIT | reg::ENABLE),
            bits::ENABLE_PON | bits::ENABLE_AEN
        );
    }

    #[test]
    fn adjust_gain_writes_control_register() {
        let bus = FakeBus::new();
        let mut light = sensor(&bus);

        assert_eq!(light.adjust_gain(GainStep::Up).unwrap(), 4);
        assert_eq!(light.adjust_gain(GainStep::Up).unwrap(), 16);
        assert_eq!(bus.get(COMMAND_BIT | reg::CONTROL), 2);
        assert_eq!(light.adjust_gain(GainStep::Down).unwrap(), 4);
        assert_eq!(bus.get(COMMAND_BIT | reg::CONTROL), 1);
    }

    #[test]
    fn sample_reads_channels_and_normalises_lux() {
        let bus = FakeBus::new();
        bus.set(COMMAND_BIT | reg::STATUS, bits::STATUS_AVALID);
        set_word(&bus, reg::CDATAL, 3000);
        set_word(&bus, reg::RDATAL, 1000);
        set_word(&bus, reg::GDATAL, 1200);
        set_word(&bus, reg::BDATAL, 800);
        let mut light = sensor(&bus);

        let sample = light.sample().unwrap();

        // r+g+b == c, so no IR term: (136 + 1200 - 355.2) / (153.6 / 310) / 3
        let expected = (0.136 * 1000.0 + 1200.0 - 0.444 * 800.0) / (153.6 / 310.0) / 3.0;
        assert_eq!(sample.clear, 3000);
        assert!((sample.lux - expected).abs() < 1e-9);
    }

    #[test]
    fn lux_subtracts_infrared_estimate() {
        let channels = RawChannels {
            clear: 1000,
            red: 600,
            green: 600,
            blue: 200,
        };
        // ir = (1400 - 1000) / 2 = 200
        let expected = (0.136 * 400.0 + 400.0 - 0.0) / (153.6 * 4.0 / 310.0);
        assert!((channels.lux(INTEGRATION_154MS, Gain::X4) - expected).abs() < 1e-9);
    }

    #[test]
    fn lux_never_goes_negative() {
        let channels = RawChannels {
            clear: 100,
            red: 0,
            green: 0,
            blue: 100,
        };
        assert_eq!(channels.lux(INTEGRATION_154MS, Gain::X1), 0.0);
    }

    #[test]
    fn rgb888_packs_scaled_channels() {
        let channels = RawChannels {
            clear: 0,
            red: 255,
            green: 20,
            blue: 0,
        };
        // divisor 2: red 127 - 30 = 97 -> 109, green 10 -> 11, blue 0
        assert_eq!(channels.rgb888(), 109 << 16 | 11 << 8);
    }
}
