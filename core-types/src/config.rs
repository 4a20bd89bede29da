// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{
    PrecisionPolicy, TimestampColumn, TimestampUnit, TraceSchema, ValueColumn, ValueType,
    CARBON_INTENSITY_COLUMN, TIMESTAMP_COLUMN,
};

/// Prefix for environment overrides, e.g. `TRACEGEN_WAVEFORM__PERIOD_COUNT=4`.
pub const ENV_PREFIX: &str = "TRACEGEN";

/// Parameters of one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// RFC 3339 start instant; the offset is mandatory.
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i64,
    #[serde(default)]
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

fn default_start() -> String {
    "2012-12-31T23:00:00Z".to_string()
}

fn default_end() -> String {
    "2016-12-30T22:45:00Z".to_string()
}

fn default_interval_minutes() -> i64 {
    15
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            interval_minutes: default_interval_minutes(),
            waveform: WaveformConfig::default(),
            output: OutputConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    #[default]
    Sine,
    Triangle,
    Square,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformConfig {
    #[serde(default)]
    pub kind: WaveformKind,
    #[serde(default = "default_amplitude_high")]
    pub amplitude_high: f64,
    #[serde(default = "default_amplitude_low")]
    pub amplitude_low: f64,
    #[serde(default = "default_period_count")]
    pub period_count: u32,
}

fn default_amplitude_high() -> f64 {
    150.0
}

fn default_amplitude_low() -> f64 {
    50.0
}

fn default_period_count() -> u32 {
    12
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            kind: WaveformKind::default(),
            amplitude_high: default_amplitude_high(),
            amplitude_low: default_amplitude_low(),
            period_count: default_period_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default = "default_row_group_target")]
    pub row_group_target: usize,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub precision_policy: PrecisionPolicy,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("sin_carbon_trace.parquet")
}

fn default_row_group_target() -> usize {
    128000
}

fn default_timestamp_column() -> String {
    TIMESTAMP_COLUMN.to_string()
}

fn default_value_column() -> String {
    CARBON_INTENSITY_COLUMN.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            row_group_target: default_row_group_target(),
            timestamp_column: default_timestamp_column(),
            value_column: default_value_column(),
            timestamp_unit: TimestampUnit::default(),
            timezone: None,
            value_type: ValueType::default(),
            precision_policy: PrecisionPolicy::default(),
        }
    }
}

impl OutputConfig {
    pub fn schema(&self) -> TraceSchema {
        let mut timestamp = TimestampColumn::new(&self.timestamp_column, self.timestamp_unit);
        if let Some(tz) = &self.timezone {
            timestamp = timestamp.with_timezone(tz);
        }
        TraceSchema::new(
            timestamp,
            ValueColumn::new(&self.value_column, self.value_type),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Carbon intensity below which green energy counts as available.
    #[serde(default = "default_green_threshold")]
    pub green_threshold: f64,
}

fn default_green_threshold() -> f64 {
    100.0
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            green_threshold: default_green_threshold(),
        }
    }
}

impl TraceConfig {
    /// Loads an optional TOML file, then applies `TRACEGEN_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, Self::environment())
    }

    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder.add_source(env).build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no run could use. Inverted amplitudes and range ordering are
    /// left alone: the former is a valid configuration and the latter belongs to the
    /// grid builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.waveform.period_count == 0 {
            return Err(ConfigError::ZeroPeriodCount);
        }
        for (field, value) in [
            ("amplitude_high", self.waveform.amplitude_high),
            ("amplitude_low", self.waveform.amplitude_low),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteAmplitude { field, value });
            }
        }
        if self.output.row_group_target == 0 {
            return Err(ConfigError::ZeroRowGroupTarget);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config source error: {0}")]
    Source(#[from] ::config::ConfigError),
    #[error("waveform.period_count must be positive")]
    ZeroPeriodCount,
    #[error("waveform.{field} must be finite, got {value}")]
    NonFiniteAmplitude { field: &'static str, value: f64 },
    #[error("output.row_group_target must be positive")]
    ZeroRowGroupTarget,
}
