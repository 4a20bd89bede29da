// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared configuration and column schema for the carbon trace generator.

pub mod config;
pub mod schema;

pub use config::{ConfigError, TraceConfig, WaveformKind};
pub use schema::{
    LogicalType, PrecisionPolicy, SchemaError, TimestampColumn, TimestampUnit, TraceSchema,
    ValueColumn, ValueType,
};
