use std::{io, path::PathBuf};

use core_types::{ConfigError, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("invalid time range: {field}: {reason}")]
    InvalidRange { field: &'static str, reason: String },
    #[error("shape mismatch: grid has {grid_len} timestamps, signal has {signal_len} values")]
    ShapeMismatch { grid_len: usize, signal_len: usize },
    #[error(
        "precision loss in column '{column}' row {index}: {sub_unit_nanos}ns below {unit} resolution"
    )]
    PrecisionLoss {
        column: String,
        index: usize,
        sub_unit_nanos: i64,
        unit: &'static str,
    },
    #[error("type coercion failed in column '{column}' row {index}: {value} does not fit {target}")]
    TypeCoercion {
        column: String,
        index: usize,
        value: String,
        target: &'static str,
    },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("write error: {0}")]
    Write(#[from] WriteError),
    #[error("read error: {0}")]
    Read(#[from] ReadError),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("destination {} does not name a file", .path.display())]
    InvalidDestination { path: PathBuf },
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("column '{column}' contains {count} null values")]
    NullValues { column: String, count: usize },
    #[error("column '{column}' does not hold {expected} data")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}
