use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use core_types::TimestampUnit;

use crate::binder::BoundDataset;

/// Descriptive statistics of a bound trace.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceSummary {
    pub rows: usize,
    pub unit: TimestampUnit,
    pub first_tick: Option<i64>,
    pub last_tick: Option<i64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub green_threshold: f64,
    /// Share of samples strictly below `green_threshold`.
    pub green_fraction: f64,
}

impl TraceSummary {
    pub fn from_dataset(dataset: &BoundDataset, green_threshold: f64) -> Self {
        let ticks = dataset.timestamp_ticks();
        let values = dataset.values();
        let rows = values.len();

        let mut min = None::<f64>;
        let mut max = None::<f64>;
        // Scaled per sample so the running total stays finite for bounds near f64::MAX.
        let mut mean_acc = 0.0;
        let mut green = 0usize;
        for &value in values {
            min = Some(min.map_or(value, |m| m.min(value)));
            max = Some(max.map_or(value, |m| m.max(value)));
            mean_acc += value / rows as f64;
            if value < green_threshold {
                green += 1;
            }
        }
        let (mean, green_fraction) = if rows == 0 {
            (None, 0.0)
        } else {
            (Some(mean_acc), green as f64 / rows as f64)
        };

        Self {
            rows,
            unit: dataset.schema().timestamp.unit,
            first_tick: ticks.first().copied(),
            last_tick: ticks.last().copied(),
            min,
            max,
            mean,
            green_threshold,
            green_fraction,
        }
    }

    pub fn first_label(&self) -> String {
        label(self.first_tick, self.unit)
    }

    pub fn last_label(&self) -> String {
        label(self.last_tick, self.unit)
    }
}

fn label(tick: Option<i64>, unit: TimestampUnit) -> String {
    let Some(tick) = tick else {
        return "-".to_string();
    };
    let per_second = 1_000_000_000 / unit.nanos_per_tick();
    let secs = tick.div_euclid(per_second);
    let nanos = (tick.rem_euclid(per_second) * unit.nanos_per_tick()) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|| format!("{tick}{}", unit.label()))
}

fn stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rows={} span={} -> {}",
            self.rows,
            self.first_label(),
            self.last_label()
        )?;
        write!(
            f,
            "min={} max={} mean={} below {}: {:.1}%",
            stat(self.min),
            stat(self.max),
            stat(self.mean),
            self.green_threshold,
            self.green_fraction * 100.0
        )
    }
}
