use std::collections::BTreeMap;
use std::fmt;

use crate::processing::units::UnitSystem;

/// One poll of the barometer. `None` means the ready bit for that quantity
/// was not observed during the poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaroSample {
    pub pressure_mbar: Option<f64>,
    pub temperature_c: Option<f64>,
}

impl BaroSample {
    pub fn is_empty(&self) -> bool {
        self.pressure_mbar.is_none() && self.temperature_c.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientSample {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub clear: u16,
    pub lux: f64,
    pub rgb888: u32,
}

/// Ordered list of record keys a quantity is written to. Empty means the
/// quantity is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList(Vec<String>);

impl KeyList {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        KeyList(keys.into_iter().map(Into::into).collect())
    }

    /// Accepts a bare key or a comma separated list.
    pub fn parse(raw: &str) -> Self {
        KeyList(
            raw.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for KeyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Converted values produced by a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub units: UnitSystem,
    pub values: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(units: UnitSystem) -> Self {
        Self {
            units,
            values: BTreeMap::new(),
        }
    }

    /// Write `value` under every key in `keys`.
    pub fn fan_out(&mut self, keys: &KeyList, value: f64) {
        for key in keys.iter() {
            log::debug!("{} -> {:.3}", key, value);
            self.values.insert(key.to_string(), value);
        }
    }
}

/// The record the caller is assembling for the current tick. It may already
/// declare a unit system and hold values from other sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub units: Option<UnitSystem>,
    pub values: BTreeMap<String, f64>,
}

impl Packet {
    pub fn new(units: Option<UnitSystem>) -> Self {
        Self {
            units,
            values: BTreeMap::new(),
        }
    }

    /// Copy the observation's values in. Keys it does not carry are left as
    /// they were, and so is the declared unit system.
    pub fn merge(&mut self, observation: Observation) {
        self.values.extend(observation.values);
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.units {
            Some(units) => write!(f, "usUnits={}", units)?,
            None => write!(f, "usUnits=unset")?,
        }
        for (key, value) in &self.values {
            write!(f, " {}={:.3}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lists_accept_bare_values_and_lists() {
        assert_eq!(KeyList::parse("pressure"), KeyList::new(["pressure"]));
        assert_eq!(
            KeyList::parse("pressure, barometer,,altimeter "),
            KeyList::new(["pressure", "barometer", "altimeter"])
        );
        assert!(KeyList::parse("").is_empty());
        assert!(KeyList::parse(" , ").is_empty());
    }

    #[test]
    fn merge_keeps_unrelated_keys_and_declared_units() {
        let mut packet = Packet::new(Some(UnitSystem::Metric));
        packet.values.insert("windSpeed".into(), 3.5);
        packet.values.insert("pressure".into(), 900.0);

        let mut observation = Observation::new(UnitSystem::Metric);
        observation.fan_out(&KeyList::new(["pressure", "barometer"]), 1013.2);
        packet.merge(observation);

        assert_eq!(packet.units, Some(UnitSystem::Metric));
        assert_eq!(packet.values["windSpeed"], 3.5);
        assert_eq!(packet.values["pressure"], 1013.2);
        assert_eq!(packet.values["barometer"], 1013.2);
    }
}
