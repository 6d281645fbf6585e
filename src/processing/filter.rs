/// Ring-buffer smoothing with warm-up discard and spike rejection
use log::{debug, info};

use crate::models::BaroSample;

/// Number of accepted samples averaged into the smoothed pressure.
pub const WINDOW_SIZE: usize = 10;
/// Polls thrown away after startup while the sensor settles.
pub const WARMUP_POLLS: u32 = 10;
/// Largest jump from the running mean (mbar) accepted once the window is full.
pub const SPIKE_THRESHOLD_MBAR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    /// Warm-up poll, or a poll where neither quantity was ready.
    Discarded,
    /// Temperature arrived but pressure did not.
    NoSample,
    SpikeRejected { sample: f64, mean: f64 },
    Accepted(f64),
}

/// Running mean over the last [`WINDOW_SIZE`] accepted pressure samples.
///
/// The buffer fills in order; once full, each accepted sample overwrites the
/// oldest slot. The mean is always taken over the filled slots only.
#[derive(Debug, Clone)]
pub struct PressureFilter {
    buffer: [f64; WINDOW_SIZE],
    fill: usize,
    cursor: usize,
    last_mean: Option<f64>,
    discarded: u32,
}

impl Default for PressureFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PressureFilter {
    pub fn new() -> Self {
        Self {
            buffer: [0.0; WINDOW_SIZE],
            fill: 0,
            cursor: 0,
            last_mean: None,
            discarded: 0,
        }
    }

    pub fn update(&mut self, sample: &BaroSample) -> FilterOutcome {
        if sample.is_empty() || self.discarded < WARMUP_POLLS {
            self.discarded = self.discarded.saturating_add(1);
            debug!("Discarding poll {} ({:?})", self.discarded, sample);
            return FilterOutcome::Discarded;
        }

        let Some(pressure) = sample.pressure_mbar else {
            return FilterOutcome::NoSample;
        };

        if self.fill == WINDOW_SIZE {
            if let Some(mean) = self.last_mean {
                if (mean - pressure).abs() > SPIKE_THRESHOLD_MBAR {
                    info!("Ignored pressure {:.2} mbar (mean {:.2})", pressure, mean);
                    return FilterOutcome::SpikeRejected {
                        sample: pressure,
                        mean,
                    };
                }
            }
        } else {
            self.fill += 1;
        }
        self.buffer[self.cursor] = pressure;
        self.cursor = (self.cursor + 1) % WINDOW_SIZE;

        let mean = self.samples().iter().sum::<f64>() / self.fill as f64;
        self.last_mean = Some(mean);
        FilterOutcome::Accepted(mean)
    }

    /// Accepted samples currently in the window, in slot order.
    pub fn samples(&self) -> &[f64] {
        &self.buffer[..self.fill]
    }

    pub fn mean(&self) -> Option<f64> {
        self.last_mean
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }
}
