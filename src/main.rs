mod config;
mod error;
mod models;
mod processing;
mod sampler;
mod sensors;
#[cfg(test)]
mod testing;
mod utils;

use std::cell::RefCell;
use std::time::Duration;

use embedded_hal_bus::i2c::RefCellDevice;
use linux_embedded_hal::{Delay, I2cdev};
use log::{debug, error, info};
use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};

use config::SamplerConfig;
use models::Packet;
use sampler::{Sampler, SensorSession, TickReport};
use sensors::{shtc3, tcs34725, EnvironmentSensor, LightSensor, PressureSensor};
use sensors::{Lps22hb, Shtc3, Tcs34725};
use utils::format_datetime;

/// Drive the sampler from a fixed-period ticker, standing in for the station
/// loop that owns each packet.
async fn main_loop<P, L, E>(sampler: &mut Sampler<P, L, E>, period: Duration)
where
    P: PressureSensor,
    L: LightSensor,
    E: EnvironmentSensor,
{
    info!("Starting sampling loop every {:?}", period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = OffsetDateTime::now_utc();
        let mut packet = Packet::new(None);

        match sampler.on_tick(now, &mut packet) {
            TickReport::Skipped => debug!("Tick at {} skipped", format_datetime(&now)),
            TickReport::Processed { pressure, light } => {
                debug!("Pressure {:?}, light {:?}", pressure, light);
                info!("{}: {}", format_datetime(&now), packet);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match SamplerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    info!("I2C bus: {}", config.bus_path());
    info!("Barometer address: 0x{:02x}", config.i2c_address);
    info!(
        "Must-have keys: pressure {} temperature {} humidity {}",
        config.pressure_must_have, config.temperature_must_have, config.humidity_must_have
    );

    // One bus handle shared by all three devices
    let bus = match I2cdev::new(config.bus_path()) {
        Ok(dev) => RefCell::new(dev),
        Err(e) => {
            error!("Failed to open {}: {}", config.bus_path(), e);
            return Err(e.into());
        }
    };

    let baro = Lps22hb::new(RefCellDevice::new(&bus), config.i2c_address);
    let light = Tcs34725::new(RefCellDevice::new(&bus), tcs34725::DEFAULT_ADDRESS, Delay);
    let environment = Shtc3::new(RefCellDevice::new(&bus), shtc3::DEFAULT_ADDRESS, Delay);

    let session = match SensorSession::open(baro, light, environment) {
        Ok(session) => session,
        Err(e) => {
            error!("Sensor bring-up failed: {}", e);
            return Err(e.into());
        }
    };

    let period = config.loop_interval;
    let mut sampler = Sampler::new(config, session, OffsetDateTime::now_utc());
    if !sampler.session().light_enabled() {
        info!("Running without light readings");
    }

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    tokio::select! {
        _ = main_loop(&mut sampler, period) => {}
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    let filter = sampler.session().filter();
    info!(
        "Discarded {} polls, last smoothed pressure {:?}",
        filter.discarded(),
        filter.mean()
    );

    let (baro, light, environment) = sampler.shutdown();
    drop((baro.release(), light.map(Tcs34725::release), environment.release()));
    drop(bus.into_inner());
    info!("I2C bus released");

    Ok(())
}
