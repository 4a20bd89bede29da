//! Binds a timestamp grid and a signal to an explicit column schema.

use std::sync::Arc;

use arrow::{
    array::{
        ArrayRef, Float32Array, Float64Array, TimestampMicrosecondArray,
        TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
    },
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::{DateTime, FixedOffset};
use core_types::{PrecisionPolicy, TimestampUnit, TraceSchema, ValueType};
use log::debug;

use crate::{
    errors::TraceError,
    grid::TimeGrid,
    waveform::{synthesize, Signal, WaveformParams},
};

/// Index-aligned grid and signal. The two always have the same length.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    grid: TimeGrid,
    signal: Signal,
}

impl Trace {
    pub fn new(grid: TimeGrid, signal: Signal) -> Result<Self, TraceError> {
        check_shape(&grid, &signal)?;
        Ok(Self { grid, signal })
    }

    /// Synthesizes one value per grid point.
    pub fn generate(grid: TimeGrid, params: &WaveformParams) -> Self {
        let signal = synthesize(grid.len(), params);
        Self { grid, signal }
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn bind(
        &self,
        schema: &TraceSchema,
        policy: PrecisionPolicy,
    ) -> Result<BoundDataset, TraceError> {
        bind(&self.grid, &self.signal, schema, policy)
    }
}

/// A trace that conforms to its schema, held as a single arrow record batch.
///
/// Only [`bind`] and the read-back path construct one, so column count, order,
/// names, and types always match `schema`.
#[derive(Clone, Debug)]
pub struct BoundDataset {
    schema: TraceSchema,
    ticks: Vec<i64>,
    values: Vec<f64>,
    batch: RecordBatch,
}

impl BoundDataset {
    pub(crate) fn assemble(
        schema: TraceSchema,
        ticks: Vec<i64>,
        values: Vec<f64>,
    ) -> Result<Self, ArrowError> {
        let timezone = schema.timestamp.timezone.clone();
        let timestamp_array: ArrayRef = match schema.timestamp.unit {
            TimestampUnit::Second => Arc::new(
                TimestampSecondArray::from(ticks.clone()).with_timezone_opt(timezone),
            ),
            TimestampUnit::Millisecond => Arc::new(
                TimestampMillisecondArray::from(ticks.clone()).with_timezone_opt(timezone),
            ),
            TimestampUnit::Microsecond => Arc::new(
                TimestampMicrosecondArray::from(ticks.clone()).with_timezone_opt(timezone),
            ),
            TimestampUnit::Nanosecond => Arc::new(
                TimestampNanosecondArray::from(ticks.clone()).with_timezone_opt(timezone),
            ),
        };
        let value_array: ArrayRef = match schema.value.value_type {
            ValueType::Float64 => Arc::new(Float64Array::from(values.clone())),
            ValueType::Float32 => Arc::new(Float32Array::from(
                values.iter().map(|v| *v as f32).collect::<Vec<_>>(),
            )),
        };
        let batch = RecordBatch::try_new(schema.to_arrow(), vec![timestamp_array, value_array])?;
        Ok(Self {
            schema,
            ticks,
            values,
            batch,
        })
    }

    pub fn schema(&self) -> &TraceSchema {
        &self.schema
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Timestamp column as integer ticks of the schema's unit since the Unix epoch.
    pub fn timestamp_ticks(&self) -> &[i64] {
        &self.ticks
    }

    /// Value column as stored, widened to f64.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl PartialEq for BoundDataset {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.batch == other.batch
    }
}

fn check_shape(grid: &TimeGrid, signal: &Signal) -> Result<(), TraceError> {
    if grid.len() != signal.len() {
        return Err(TraceError::ShapeMismatch {
            grid_len: grid.len(),
            signal_len: signal.len(),
        });
    }
    Ok(())
}

/// Maps the grid onto the schema's timestamp column and the signal onto its value
/// column, failing on the first row that cannot be represented.
pub fn bind(
    grid: &TimeGrid,
    signal: &Signal,
    schema: &TraceSchema,
    policy: PrecisionPolicy,
) -> Result<BoundDataset, TraceError> {
    check_shape(grid, signal)?;

    let ticks = grid
        .iter()
        .enumerate()
        .map(|(index, ts)| timestamp_to_ticks(index, ts, schema, policy))
        .collect::<Result<Vec<_>, _>>()?;
    let values = signal
        .values()
        .iter()
        .enumerate()
        .map(|(index, value)| coerce_value(index, *value, schema))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "bound {} rows to ({} {}, {} {})",
        ticks.len(),
        schema.timestamp.name,
        schema.timestamp.unit.label(),
        schema.value.name,
        schema.value.value_type.label()
    );
    Ok(BoundDataset::assemble(schema.clone(), ticks, values)?)
}

fn timestamp_to_ticks(
    index: usize,
    ts: &DateTime<FixedOffset>,
    schema: &TraceSchema,
    policy: PrecisionPolicy,
) -> Result<i64, TraceError> {
    let unit = schema.timestamp.unit;
    let nanos_per_tick = unit.nanos_per_tick();
    let subsec = ts.timestamp_subsec_nanos() as i64;
    let remainder = subsec % nanos_per_tick;
    if remainder != 0 && policy == PrecisionPolicy::Reject {
        return Err(TraceError::PrecisionLoss {
            column: schema.timestamp.name.clone(),
            index,
            sub_unit_nanos: remainder,
            unit: unit.label(),
        });
    }
    let ticks_per_second = 1_000_000_000 / nanos_per_tick;
    ts.timestamp()
        .checked_mul(ticks_per_second)
        .and_then(|whole| whole.checked_add(subsec / nanos_per_tick))
        .ok_or_else(|| TraceError::TypeCoercion {
            column: schema.timestamp.name.clone(),
            index,
            value: ts.to_rfc3339(),
            target: unit.label(),
        })
}

fn coerce_value(index: usize, value: f64, schema: &TraceSchema) -> Result<f64, TraceError> {
    let target = schema.value.value_type;
    if !value.is_finite() || value.abs() > target.max_magnitude() {
        return Err(TraceError::TypeCoercion {
            column: schema.value.name.clone(),
            index,
            value: value.to_string(),
            target: target.label(),
        });
    }
    Ok(match target {
        ValueType::Float64 => value,
        ValueType::Float32 => value as f32 as f64,
    })
}
