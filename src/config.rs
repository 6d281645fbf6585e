use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::KeyList;
use crate::processing::UnitSystem;
use crate::sensors::lps22hb;

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub i2c_port: u8,
    pub i2c_address: u8,
    pub pressure_keys: KeyList,
    pub temperature_keys: KeyList,
    pub humidity_keys: KeyList,
    pub irradiance_keys: KeyList,
    /// Keys for the auxiliary sensor's own temperature. Empty by default.
    pub aux_temperature_keys: KeyList,
    /// Carried for the caller's own filtering; the sampler does not use them.
    pub pressure_must_have: KeyList,
    pub temperature_must_have: KeyList,
    pub humidity_must_have: KeyList,
    /// Used when the packet does not declare a unit system.
    pub fallback_units: UnitSystem,
    /// Period of the tick loop driving the sampler.
    pub loop_interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            i2c_port: 1,
            i2c_address: lps22hb::DEFAULT_ADDRESS,
            pressure_keys: KeyList::new(["pressure"]),
            temperature_keys: KeyList::new(["extraTemp1"]),
            humidity_keys: KeyList::new(["outHumidity"]),
            irradiance_keys: KeyList::new(["radiation"]),
            aux_temperature_keys: KeyList::default(),
            pressure_must_have: KeyList::default(),
            temperature_must_have: KeyList::default(),
            humidity_must_have: KeyList::default(),
            fallback_units: UnitSystem::Us,
            loop_interval: Duration::from_secs(2),
        }
    }
}

impl SamplerConfig {
    /// Load from the process environment, after pulling in a `.env` file if
    /// there is one.
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(env::vars())
    }

    /// Build from `PISENSE_*` variables; anything unset keeps its default.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with("PISENSE_"))
            .collect();
        let mut config = SamplerConfig::default();

        if let Some(port) = vars.get("PISENSE_I2C_PORT") {
            config.i2c_port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("PISENSE_I2C_PORT", format!("{}", e)))?;
        }

        if let Some(address) = vars.get("PISENSE_I2C_ADDRESS") {
            config.i2c_address = parse_hex_address(address)?;
        }

        let keys = |name: &str, target: &mut KeyList| {
            if let Some(raw) = vars.get(name) {
                *target = KeyList::parse(raw);
            }
        };
        keys("PISENSE_PRESSURE_KEYS", &mut config.pressure_keys);
        keys("PISENSE_TEMPERATURE_KEYS", &mut config.temperature_keys);
        keys("PISENSE_HUMIDITY_KEYS", &mut config.humidity_keys);
        keys("PISENSE_IRRADIANCE_KEYS", &mut config.irradiance_keys);
        keys("PISENSE_AUX_TEMPERATURE_KEYS", &mut config.aux_temperature_keys);
        keys("PISENSE_PRESSURE_MUST_HAVE", &mut config.pressure_must_have);
        keys("PISENSE_TEMPERATURE_MUST_HAVE", &mut config.temperature_must_have);
        keys("PISENSE_HUMIDITY_MUST_HAVE", &mut config.humidity_must_have);

        if let Some(units) = vars.get("PISENSE_UNITS") {
            config.fallback_units = units.parse()?;
        }

        if let Some(secs) = vars.get("PISENSE_LOOP_INTERVAL_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                ConfigError::invalid("PISENSE_LOOP_INTERVAL_SECS", format!("{}", e))
            })?;
            if secs == 0 {
                return Err(ConfigError::invalid(
                    "PISENSE_LOOP_INTERVAL_SECS",
                    "must be at least 1",
                ));
            }
            config.loop_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn bus_path(&self) -> String {
        format!("/dev/i2c-{}", self.i2c_port)
    }
}

fn parse_hex_address(raw: &str) -> Result<u8, ConfigError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let address = u8::from_str_radix(digits, 16)
        .map_err(|e| ConfigError::invalid("PISENSE_I2C_ADDRESS", format!("{}", e)))?;
    if address > 0x7F {
        return Err(ConfigError::invalid(
            "PISENSE_I2C_ADDRESS",
            format!("0x{:02x} is not a 7-bit address", address),
        ));
    }
    Ok(address)
}
