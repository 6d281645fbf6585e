/// Fixed-cadence sampling: polls the sensors, smooths pressure, runs light
/// autogain and merges converted values into the caller's packet
use log::{debug, error, info, warn};
use time::{Duration, OffsetDateTime};

use crate::config::SamplerConfig;
use crate::error::SensorResult;
use crate::models::{Observation, Packet};
use crate::processing::{FilterOutcome, PressureFilter, Quantity, UnitSystem};
use crate::sensors::{EnvironmentSensor, GainStep, LightSensor, PressureSensor};

/// Minimum spacing between processed ticks.
pub const MIN_TICK_INTERVAL: Duration = Duration::SECOND;

/// Clear-channel count below which the gain is raised.
pub const CLEAR_LOW: u16 = 2000;
/// Clear-channel count at or above which the gain is lowered.
pub const CLEAR_HIGH: u16 = 50000;
/// Gain multiplier at which stepping up stops.
pub const GAIN_CEILING: u8 = 60;

/// Lets a tick through only when `interval` has passed since the last one
/// that got through.
#[derive(Debug, Clone)]
pub struct CadenceGate {
    interval: Duration,
    last: OffsetDateTime,
}

impl CadenceGate {
    pub fn new(interval: Duration, armed_at: OffsetDateTime) -> Self {
        Self {
            interval,
            last: armed_at,
        }
    }

    /// A tick timestamped before the last admitted one means the wall clock
    /// stepped backwards; it is admitted and the gate re-arms from it.
    pub fn admit(&mut self, now: OffsetDateTime) -> bool {
        let elapsed = now - self.last;
        if elapsed.is_negative() {
            warn!("Clock stepped back by {}, re-arming cadence gate", -elapsed);
        } else if elapsed < self.interval {
            return false;
        }
        self.last = now;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutogainAction {
    StepUp,
    StepDown,
    Emit,
}

/// Decide what to do with a light reading taken at `gain`.
pub fn autogain_action(clear: u16, gain: u8) -> AutogainAction {
    if clear < CLEAR_LOW && gain < GAIN_CEILING {
        AutogainAction::StepUp
    } else if clear >= CLEAR_HIGH {
        AutogainAction::StepDown
    } else {
        AutogainAction::Emit
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressureStatus {
    Accepted(f64),
    /// Warm-up poll, or neither ready bit seen.
    Discarded,
    SpikeRejected(f64),
    NoSample,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightStatus {
    Emitted(f64),
    /// Gain moved to the contained multiplier; no irradiance this tick.
    GainChanged(u8),
    /// A step was called for but the gain is already at that end of its
    /// range; no irradiance this tick.
    GainAtLimit(u8),
    Disabled,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickReport {
    Skipped,
    Processed {
        pressure: PressureStatus,
        light: LightStatus,
    },
}

/// Sensor handles and per-session state, owned by the [`Sampler`].
pub struct SensorSession<P, L, E> {
    pressure: P,
    light: Option<L>,
    environment: E,
    filter: PressureFilter,
}

impl<P, L, E> SensorSession<P, L, E>
where
    P: PressureSensor,
    L: LightSensor,
    E: EnvironmentSensor,
{
    /// Bring the sensors up. Barometer failures abort; a light sensor that
    /// fails to initialise is dropped for the rest of the session.
    pub fn open(mut pressure: P, mut light: L, environment: E) -> SensorResult<Self> {
        pressure.start()?;

        let light = match light.init() {
            Ok(()) => Some(light),
            Err(e) => {
                error!("Light sensor disabled: {}", e);
                None
            }
        };

        Ok(Self {
            pressure,
            light,
            environment,
            filter: PressureFilter::new(),
        })
    }

    pub fn light_enabled(&self) -> bool {
        self.light.is_some()
    }

    pub fn filter(&self) -> &PressureFilter {
        &self.filter
    }
}

pub struct Sampler<P, L, E> {
    config: SamplerConfig,
    session: SensorSession<P, L, E>,
    gate: CadenceGate,
}

impl<P, L, E> Sampler<P, L, E>
where
    P: PressureSensor,
    L: LightSensor,
    E: EnvironmentSensor,
{
    pub fn new(
        config: SamplerConfig,
        session: SensorSession<P, L, E>,
        started_at: OffsetDateTime,
    ) -> Self {
        info!("Fallback units: {}", config.fallback_units);
        info!(
            "Keys: pressure {} temperature {} humidity {} irradiance {}",
            config.pressure_keys,
            config.temperature_keys,
            config.humidity_keys,
            config.irradiance_keys
        );
        Self {
            config,
            session,
            gate: CadenceGate::new(MIN_TICK_INTERVAL, started_at),
        }
    }

    pub fn session(&self) -> &SensorSession<P, L, E> {
        &self.session
    }

    /// Handle one external tick. Sensor anomalies are logged and reflected
    /// in the report; they never fail the tick.
    pub fn on_tick(&mut self, now: OffsetDateTime, packet: &mut Packet) -> TickReport {
        if !self.gate.admit(now) {
            return TickReport::Skipped;
        }

        let units = packet.units.unwrap_or(self.config.fallback_units);
        let mut observation = Observation::new(units);

        // A discarded or rejected pressure poll only withholds pressure;
        // humidity and light are still reported for this tick.
        let pressure = self.sample_pressure(units, &mut observation);
        self.sample_environment(units, &mut observation);
        let light = self.sample_light(&mut observation);

        packet.merge(observation);
        TickReport::Processed { pressure, light }
    }

    fn sample_pressure(&mut self, units: UnitSystem, observation: &mut Observation) -> PressureStatus {
        let sample = match self.session.pressure.poll_once() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Pressure read failed: {}", e);
                return PressureStatus::ReadFailed;
            }
        };

        let outcome = self.session.filter.update(&sample);
        if outcome == FilterOutcome::Discarded {
            return PressureStatus::Discarded;
        }

        if let Some(celsius) = sample.temperature_c {
            let value = units.convert(Quantity::Temperature, celsius);
            observation.fan_out(&self.config.temperature_keys, value);
        }

        match outcome {
            FilterOutcome::Accepted(mean) => {
                info!("Pressure: {:.2} mbar", mean);
                let value = units.convert(Quantity::Pressure, mean);
                observation.fan_out(&self.config.pressure_keys, value);
                PressureStatus::Accepted(mean)
            }
            FilterOutcome::SpikeRejected { sample, mean } => {
                debug!("Holding smoothed pressure at {:.2} mbar", mean);
                PressureStatus::SpikeRejected(sample)
            }
            FilterOutcome::NoSample | FilterOutcome::Discarded => PressureStatus::NoSample,
        }
    }

    fn sample_environment(&mut self, units: UnitSystem, observation: &mut Observation) {
        let ambient = match self.session.environment.measure() {
            Ok(ambient) => ambient,
            Err(e) => {
                warn!("Environment read failed: {}", e);
                return;
            }
        };

        let humidity = units.convert(Quantity::Humidity, ambient.humidity_pct);
        observation.fan_out(&self.config.humidity_keys, humidity);
        let celsius = units.convert(Quantity::Temperature, ambient.temperature_c);
        observation.fan_out(&self.config.aux_temperature_keys, celsius);
    }

    fn sample_light(&mut self, observation: &mut Observation) -> LightStatus {
        let Some(light) = self.session.light.as_mut() else {
            return LightStatus::Disabled;
        };

        let sample = match light.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Light read failed: {}", e);
                return LightStatus::ReadFailed;
            }
        };
        info!(
            "Lux: {:.1} Clear: {} Gain: {} RGB: 0x{:06x}",
            sample.lux,
            sample.clear,
            light.gain(),
            sample.rgb888
        );

        let step = match autogain_action(sample.clear, light.gain()) {
            AutogainAction::StepUp => GainStep::Up,
            AutogainAction::StepDown => GainStep::Down,
            AutogainAction::Emit => {
                let value = observation.units.convert(Quantity::Irradiance, sample.lux);
                observation.fan_out(&self.config.irradiance_keys, value);
                return LightStatus::Emitted(sample.lux);
            }
        };

        let previous = light.gain();
        match light.adjust_gain(step) {
            Ok(gain) if gain == previous => {
                info!("Gain already at {}, cannot step {:?}", gain, step);
                LightStatus::GainAtLimit(gain)
            }
            Ok(gain) => {
                info!("Changed gain to {}", gain);
                LightStatus::GainChanged(gain)
            }
            Err(e) => {
                warn!("Gain change failed: {}", e);
                LightStatus::ReadFailed
            }
        }
    }

    /// Stop sampling and hand the sensor handles back so their buses can be
    /// released.
    pub fn shutdown(self) -> (P, Option<L>, E) {
        let session = self.session;
        (session.pressure, session.light, session.environment)
    }
}
