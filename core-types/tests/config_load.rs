// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{collections::HashMap, fs};

use core_types::{
    config::{ConfigError, TraceConfig},
    PrecisionPolicy, TimestampUnit, WaveformKind,
};

fn no_env() -> config::Environment {
    TraceConfig::environment().source(Some(HashMap::new()))
}

#[test]
fn file_values_override_defaults() -> Result<(), ConfigError> {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("trace.toml");
    fs::write(
        &path,
        r#"
start = "2020-01-01T00:00:00Z"
end = "2020-01-01T01:00:00Z"
interval_minutes = 15

[waveform]
kind = "triangle"
period_count = 2

[output]
path = "out/trace.parquet"
timestamp_unit = "microsecond"
precision_policy = "truncate"
"#,
    )
    .expect("write config");

    let cfg = TraceConfig::from_sources(Some(path.as_path()), no_env())?;
    assert_eq!(cfg.start, "2020-01-01T00:00:00Z");
    assert_eq!(cfg.waveform.kind, WaveformKind::Triangle);
    assert_eq!(cfg.waveform.period_count, 2);
    assert_eq!(cfg.waveform.amplitude_high, 150.0);
    assert_eq!(cfg.output.timestamp_unit, TimestampUnit::Microsecond);
    assert_eq!(cfg.output.precision_policy, PrecisionPolicy::Truncate);
    assert_eq!(cfg.output.row_group_target, 128000);
    assert_eq!(cfg.summary.green_threshold, 100.0);
    Ok(())
}

#[test]
fn environment_overrides_file() -> Result<(), ConfigError> {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("trace.toml");
    fs::write(&path, "[waveform]\nperiod_count = 2\n").expect("write config");

    let env = HashMap::from([
        ("TRACEGEN_WAVEFORM__PERIOD_COUNT".to_string(), "7".to_string()),
        ("TRACEGEN_INTERVAL_MINUTES".to_string(), "5".to_string()),
    ]);
    let cfg = TraceConfig::from_sources(
        Some(path.as_path()),
        TraceConfig::environment().source(Some(env)),
    )?;
    assert_eq!(cfg.waveform.period_count, 7);
    assert_eq!(cfg.interval_minutes, 5);
    Ok(())
}

#[test]
fn zero_period_count_from_file_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("trace.toml");
    fs::write(&path, "[waveform]\nperiod_count = 0\n").expect("write config");

    let err = TraceConfig::from_sources(Some(path.as_path()), no_env()).unwrap_err();
    assert!(matches!(err, ConfigError::ZeroPeriodCount));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.toml");
    let err = TraceConfig::from_sources(Some(path.as_path()), no_env()).unwrap_err();
    assert!(matches!(err, ConfigError::Source(_)));
}

#[test]
fn no_sources_yields_defaults() -> Result<(), ConfigError> {
    let cfg = TraceConfig::from_sources(None, no_env())?;
    assert_eq!(cfg.interval_minutes, 15);
    assert_eq!(cfg.output.path.to_str(), Some("sin_carbon_trace.parquet"));
    Ok(())
}
