/// Unit systems a record can be expressed in, and conversion into them
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const INHG_PER_MBAR: f64 = 0.029529983071445;

/// Station unit systems. Internally every value is metric: mbar, °C and
/// percent, with irradiance passed through as measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    /// inHg, °F
    Us,
    /// mbar, °C
    Metric,
    /// mbar, °C (metric with wind in m/s, which this station does not report)
    MetricWx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Pressure,
    Temperature,
    Humidity,
    Irradiance,
}

impl UnitSystem {
    /// Convert a metric value of `quantity` into this system.
    pub fn convert(self, quantity: Quantity, value: f64) -> f64 {
        match (self, quantity) {
            (UnitSystem::Us, Quantity::Pressure) => value * INHG_PER_MBAR,
            (UnitSystem::Us, Quantity::Temperature) => value * 9.0 / 5.0 + 32.0,
            _ => value,
        }
    }
}

impl FromStr for UnitSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(UnitSystem::Us),
            "METRIC" => Ok(UnitSystem::Metric),
            "METRICWX" => Ok(UnitSystem::MetricWx),
            other => Err(ConfigError::invalid(
                "units",
                format!("unknown unit system '{}'", other),
            )),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitSystem::Us => "US",
            UnitSystem::Metric => "METRIC",
            UnitSystem::MetricWx => "METRICWX",
        };
        f.write_str(name)
    }
}
