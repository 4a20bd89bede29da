// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Arrow/Parquet schema for carbon intensity traces.
//!
//! A trace schema is always exactly two columns: a timestamp column followed by a
//! value column. The layout is fixed by type so a bound dataset can never carry a
//! third column or the two columns in the wrong order.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const CARBON_INTENSITY_COLUMN: &str = "carbon_intensity";

/// Storage precision of the timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Second,
    #[default]
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimestampUnit {
    /// Nanoseconds covered by one tick of this unit.
    pub fn nanos_per_tick(self) -> i64 {
        match self {
            TimestampUnit::Second => 1_000_000_000,
            TimestampUnit::Millisecond => 1_000_000,
            TimestampUnit::Microsecond => 1_000,
            TimestampUnit::Nanosecond => 1,
        }
    }

    pub fn arrow_unit(self) -> TimeUnit {
        match self {
            TimestampUnit::Second => TimeUnit::Second,
            TimestampUnit::Millisecond => TimeUnit::Millisecond,
            TimestampUnit::Microsecond => TimeUnit::Microsecond,
            TimestampUnit::Nanosecond => TimeUnit::Nanosecond,
        }
    }

    pub fn from_arrow(unit: &TimeUnit) -> Self {
        match unit {
            TimeUnit::Second => TimestampUnit::Second,
            TimeUnit::Millisecond => TimestampUnit::Millisecond,
            TimeUnit::Microsecond => TimestampUnit::Microsecond,
            TimeUnit::Nanosecond => TimestampUnit::Nanosecond,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimestampUnit::Second => "s",
            TimestampUnit::Millisecond => "ms",
            TimestampUnit::Microsecond => "us",
            TimestampUnit::Nanosecond => "ns",
        }
    }
}

/// Numeric type of the value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Float64,
    Float32,
}

impl ValueType {
    pub fn arrow_type(self) -> DataType {
        match self {
            ValueType::Float64 => DataType::Float64,
            ValueType::Float32 => DataType::Float32,
        }
    }

    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Float64 => Some(ValueType::Float64),
            DataType::Float32 => Some(ValueType::Float32),
            _ => None,
        }
    }

    /// Largest finite magnitude the type can hold.
    pub fn max_magnitude(self) -> f64 {
        match self {
            ValueType::Float64 => f64::MAX,
            ValueType::Float32 => f32::MAX as f64,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ValueType::Float64 => "float64",
            ValueType::Float32 => "float32",
        }
    }
}

/// What binding does when a timestamp carries information finer than the column unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionPolicy {
    #[default]
    Reject,
    Truncate,
}

/// Logical type of one trace column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalType {
    Timestamp {
        unit: TimestampUnit,
        timezone: Option<String>,
    },
    Value(ValueType),
}

impl LogicalType {
    pub fn arrow_type(&self) -> DataType {
        match self {
            LogicalType::Timestamp { unit, timezone } => DataType::Timestamp(
                unit.arrow_unit(),
                timezone.as_deref().map(Arc::<str>::from),
            ),
            LogicalType::Value(value_type) => value_type.arrow_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampColumn {
    pub name: String,
    pub unit: TimestampUnit,
    pub timezone: Option<String>,
}

impl TimestampColumn {
    pub fn new(name: impl Into<String>, unit: TimestampUnit) -> Self {
        Self {
            name: name.into(),
            unit,
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn logical_type(&self) -> LogicalType {
        LogicalType::Timestamp {
            unit: self.unit,
            timezone: self.timezone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueColumn {
    pub name: String,
    pub value_type: ValueType,
}

impl ValueColumn {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        LogicalType::Value(self.value_type)
    }
}

/// Ordered `(timestamp, value)` column layout a trace must conform to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSchema {
    pub timestamp: TimestampColumn,
    pub value: ValueColumn,
}

impl TraceSchema {
    pub fn new(timestamp: TimestampColumn, value: ValueColumn) -> Self {
        Self { timestamp, value }
    }

    /// Layout downstream simulators read: `timestamp` in milliseconds with no
    /// timezone annotation, then `carbon_intensity` as float64.
    pub fn carbon_intensity() -> Self {
        Self::new(
            TimestampColumn::new(TIMESTAMP_COLUMN, TimestampUnit::Millisecond),
            ValueColumn::new(CARBON_INTENSITY_COLUMN, ValueType::Float64),
        )
    }

    pub fn columns(&self) -> [(&str, LogicalType); 2] {
        [
            (self.timestamp.name.as_str(), self.timestamp.logical_type()),
            (self.value.name.as_str(), self.value.logical_type()),
        ]
    }

    pub fn to_arrow(&self) -> SchemaRef {
        let fields = self
            .columns()
            .into_iter()
            .map(|(name, logical)| Field::new(name, logical.arrow_type(), false))
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }

    /// Recovers the trace layout from an arrow schema read off disk.
    pub fn from_arrow(schema: &Schema) -> Result<Self, SchemaError> {
        let fields = schema.fields();
        if fields.len() != 2 {
            return Err(SchemaError::ColumnCount {
                found: fields.len(),
            });
        }
        let timestamp = match fields[0].data_type() {
            DataType::Timestamp(unit, timezone) => TimestampColumn {
                name: fields[0].name().clone(),
                unit: TimestampUnit::from_arrow(unit),
                timezone: timezone.as_deref().map(str::to_string),
            },
            other => {
                return Err(SchemaError::UnsupportedColumn {
                    position: 0,
                    name: fields[0].name().clone(),
                    data_type: other.to_string(),
                })
            }
        };
        let value_type = ValueType::from_arrow(fields[1].data_type()).ok_or_else(|| {
            SchemaError::UnsupportedColumn {
                position: 1,
                name: fields[1].name().clone(),
                data_type: fields[1].data_type().to_string(),
            }
        })?;
        Ok(Self::new(
            timestamp,
            ValueColumn::new(fields[1].name().clone(), value_type),
        ))
    }
}

impl Default for TraceSchema {
    fn default() -> Self {
        Self::carbon_intensity()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("trace schema needs exactly 2 columns, found {found}")]
    ColumnCount { found: usize },
    #[error("column {position} ('{name}') has unsupported type {data_type}")]
    UnsupportedColumn {
        position: usize,
        name: String,
        data_type: String,
    },
}
