//! Closed-form signal synthesis over grid indices.
//!
//! Cycle density depends on the sample count, not on wall-clock time: `period_count`
//! full cycles are spread across indices `0..N`. Callers that want cycles tied to the
//! calendar derive `period_count` from the range duration first.

use std::{
    f64::consts::{FRAC_2_PI, TAU},
    num::NonZeroU32,
};

use core_types::{config::WaveformConfig, ConfigError, WaveformKind};

use crate::errors::TraceError;

/// Shape and bounds of a synthesized signal.
///
/// `amplitude_high < amplitude_low` is accepted and yields an inverted signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveformParams {
    pub kind: WaveformKind,
    pub amplitude_high: f64,
    pub amplitude_low: f64,
    pub period_count: NonZeroU32,
}

impl WaveformParams {
    pub fn new(amplitude_high: f64, amplitude_low: f64, period_count: NonZeroU32) -> Self {
        Self {
            kind: WaveformKind::Sine,
            amplitude_high,
            amplitude_low,
            period_count,
        }
    }

    pub fn with_kind(mut self, kind: WaveformKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn from_config(config: &WaveformConfig) -> Result<Self, TraceError> {
        let period_count =
            NonZeroU32::new(config.period_count).ok_or(ConfigError::ZeroPeriodCount)?;
        Ok(
            Self::new(config.amplitude_high, config.amplitude_low, period_count)
                .with_kind(config.kind),
        )
    }

    // Halve before combining so bounds near f64::MAX stay finite.
    pub fn half_range(&self) -> f64 {
        self.amplitude_high / 2.0 - self.amplitude_low / 2.0
    }

    pub fn midpoint(&self) -> f64 {
        self.amplitude_high / 2.0 + self.amplitude_low / 2.0
    }

    /// Unit oscillation in `[-1, 1]` at phase `x`.
    fn unit(&self, x: f64) -> f64 {
        match self.kind {
            WaveformKind::Sine => x.sin(),
            WaveformKind::Triangle => FRAC_2_PI * x.sin().asin(),
            WaveformKind::Square => {
                if x.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Values index-aligned with a [`crate::TimeGrid`].
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    values: Vec<f64>,
}

impl Signal {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Phase of sample `i` out of `n`: `n` evenly spaced points over
/// `[0, 2π · period_count]`, with the last point pinned to the upper bound.
fn phases(n: usize, period_count: NonZeroU32) -> impl Iterator<Item = f64> {
    let stop = TAU * period_count.get() as f64;
    let step = if n > 1 { stop / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| {
        if n > 1 && i == n - 1 {
            stop
        } else {
            i as f64 * step
        }
    })
}

/// `half_range · u(x_i) + midpoint` for every index. Pure in `(n, params)`.
pub fn synthesize(n: usize, params: &WaveformParams) -> Signal {
    let half = params.half_range();
    let mid = params.midpoint();
    let values = phases(n, params.period_count)
        .map(|x| half * params.unit(x) + mid)
        .collect();
    Signal::new(values)
}
