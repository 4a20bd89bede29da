// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Synthetic carbon-intensity trace generation.
//!
//! A run flows through four stages, each a plain function of its inputs:
//! - [`build_grid`]: evenly spaced timestamps over an offset-aware [`TimeRange`].
//! - [`synthesize`]: closed-form waveform values, one per grid point.
//! - [`bind`]: conformance to a [`core_types::TraceSchema`], producing a [`BoundDataset`].
//! - [`write`]: atomic parquet persistence.
//!
//! [`run`] wires them together from a [`TraceConfig`]. Identical configurations
//! produce byte-identical files.

pub mod artifacts;
pub mod binder;
pub mod errors;
pub mod grid;
pub mod summary;
pub mod waveform;

pub use artifacts::{
    clean_stale_temporaries, compute_checksum, read_trace, write, write_with_options,
    WriteOptions, WriteResult,
};
pub use binder::{bind, BoundDataset, Trace};
pub use errors::{ReadError, TraceError, WriteError};
pub use grid::{build_grid, TimeGrid, TimeRange};
pub use summary::TraceSummary;
pub use waveform::{synthesize, Signal, WaveformParams};

use core_types::TraceConfig;
use log::info;

#[derive(Clone, Debug)]
pub struct RunReport {
    pub written: WriteResult,
    pub summary: TraceSummary,
}

/// Generates one trace from `config` and writes it to `config.output.path`.
///
/// Range and parameter validation happen before any file is touched.
pub fn run(config: &TraceConfig) -> Result<RunReport, TraceError> {
    config.validate()?;
    let range = TimeRange::from_config(config)?;
    let params = WaveformParams::from_config(&config.waveform)?;

    let grid = build_grid(&range);
    info!(
        "grid: {} points from {} to {} every {}",
        grid.len(),
        range.start().to_rfc3339(),
        range.end().to_rfc3339(),
        range.interval()
    );
    info!(
        "waveform: {:?} high={} low={} periods={}",
        params.kind, params.amplitude_high, params.amplitude_low, params.period_count
    );

    let trace = Trace::generate(grid, &params);
    let dataset = trace.bind(&config.output.schema(), config.output.precision_policy)?;
    let written = write_with_options(
        &dataset,
        &config.output.path,
        &WriteOptions {
            row_group_target: config.output.row_group_target,
        },
    )?;
    let summary = TraceSummary::from_dataset(&dataset, config.summary.green_threshold);
    info!(
        "summary: min={:?} max={:?} mean={:?} green_fraction={:.3}",
        summary.min, summary.max, summary.mean, summary.green_fraction
    );
    Ok(RunReport { written, summary })
}
