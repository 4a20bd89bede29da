//! Parquet persistence for bound traces.
//!
//! Writes go to a temporary file next to the destination, are fsynced, and are
//! committed with a single rename, so the destination is either absent, the previous
//! file, or the complete new file.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use arrow::{
    array::{Array, ArrayRef, AsArray},
    datatypes::{
        Float32Type, Float64Type, TimestampMicrosecondType, TimestampMillisecondType,
        TimestampNanosecondType, TimestampSecondType,
    },
};
use core_types::{TimestampUnit, TraceSchema, ValueType};
use crc32fast::Hasher as Crc32;
use log::info;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};

use crate::{
    binder::BoundDataset,
    errors::{ReadError, WriteError},
};

pub const DEFAULT_ROW_GROUP_TARGET: usize = 128000;

#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub row_group_target: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            row_group_target: DEFAULT_ROW_GROUP_TARGET,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteResult {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
    pub checksum: u32,
}

pub fn write(dataset: &BoundDataset, destination: &Path) -> Result<WriteResult, WriteError> {
    write_with_options(dataset, destination, &WriteOptions::default())
}

pub fn write_with_options(
    dataset: &BoundDataset,
    destination: &Path,
    options: &WriteOptions,
) -> Result<WriteResult, WriteError> {
    write_committing(dataset, destination, options, |_| Ok(()))
}

/// Runs `before_commit` against the finished temporary file right before the rename.
/// An error from it aborts the write exactly like an interrupted process would.
pub(crate) fn write_committing<F>(
    dataset: &BoundDataset,
    destination: &Path,
    options: &WriteOptions,
    before_commit: F,
) -> Result<WriteResult, WriteError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let file_name = destination
        .file_name()
        .ok_or_else(|| WriteError::InvalidDestination {
            path: destination.to_path_buf(),
        })?;
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name.to_string_lossy()))
        .suffix(".parquet.tmp")
        .tempfile_in(parent)
        .map_err(io_err(parent))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(options.row_group_target)
        .build();
    let batch = dataset.record_batch();
    {
        let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
    }
    tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;

    let checksum = compute_checksum(tmp.path()).map_err(io_err(tmp.path()))?;
    let bytes = tmp
        .as_file()
        .metadata()
        .map_err(io_err(tmp.path()))?
        .len();

    before_commit(tmp.path()).map_err(io_err(tmp.path()))?;
    tmp.persist(destination)
        .map_err(|err| io_err(destination)(err.error))?;
    sync_dir(parent);

    let result = WriteResult {
        path: destination.to_path_buf(),
        rows: batch.num_rows(),
        bytes,
        checksum,
    };
    info!(
        "wrote {} rows to {} ({} bytes, crc32={:08x})",
        result.rows,
        result.path.display(),
        result.bytes,
        result.checksum
    );
    Ok(result)
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WriteError {
    let path = path.to_path_buf();
    move |source| WriteError::Io { path, source }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    // The rename has already happened; a failed directory fsync only weakens durability.
    if let Err(err) = File::open(dir).and_then(|handle| handle.sync_all()) {
        log::warn!("failed to fsync directory {}: {}", dir.display(), err);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

pub fn compute_checksum(path: &Path) -> io::Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = Crc32::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Reads a trace file back into a [`BoundDataset`], checking it has the two-column
/// trace layout and no nulls.
pub fn read_trace(path: &Path) -> Result<BoundDataset, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = TraceSchema::from_arrow(builder.schema())?;
    let reader = builder.build()?;

    let mut ticks = Vec::new();
    let mut values = Vec::new();
    for batch in reader {
        let batch = batch?;
        if batch.num_rows() == 0 {
            continue;
        }
        extend_ticks(&mut ticks, batch.column(0), &schema)?;
        extend_values(&mut values, batch.column(1), &schema)?;
    }
    Ok(BoundDataset::assemble(schema, ticks, values)?)
}

fn check_nulls(column: &ArrayRef, name: &str) -> Result<(), ReadError> {
    if column.null_count() > 0 {
        return Err(ReadError::NullValues {
            column: name.to_string(),
            count: column.null_count(),
        });
    }
    Ok(())
}

fn extend_ticks(
    out: &mut Vec<i64>,
    column: &ArrayRef,
    schema: &TraceSchema,
) -> Result<(), ReadError> {
    let name = &schema.timestamp.name;
    check_nulls(column, name)?;
    let ticks = match schema.timestamp.unit {
        TimestampUnit::Second => column
            .as_primitive_opt::<TimestampSecondType>()
            .map(|a| &a.values()[..]),
        TimestampUnit::Millisecond => column
            .as_primitive_opt::<TimestampMillisecondType>()
            .map(|a| &a.values()[..]),
        TimestampUnit::Microsecond => column
            .as_primitive_opt::<TimestampMicrosecondType>()
            .map(|a| &a.values()[..]),
        TimestampUnit::Nanosecond => column
            .as_primitive_opt::<TimestampNanosecondType>()
            .map(|a| &a.values()[..]),
    }
    .ok_or_else(|| ReadError::ColumnType {
        column: name.clone(),
        expected: schema.timestamp.unit.label(),
    })?;
    out.extend_from_slice(ticks);
    Ok(())
}

fn extend_values(
    out: &mut Vec<f64>,
    column: &ArrayRef,
    schema: &TraceSchema,
) -> Result<(), ReadError> {
    let name = &schema.value.name;
    check_nulls(column, name)?;
    let type_err = || ReadError::ColumnType {
        column: name.clone(),
        expected: schema.value.value_type.label(),
    };
    match schema.value.value_type {
        ValueType::Float64 => {
            let array = column.as_primitive_opt::<Float64Type>().ok_or_else(type_err)?;
            out.extend_from_slice(array.values());
        }
        ValueType::Float32 => {
            let array = column.as_primitive_opt::<Float32Type>().ok_or_else(type_err)?;
            out.extend(array.values().iter().map(|v| *v as f64));
        }
    }
    Ok(())
}

/// Removes leftover temporary files from interrupted writes in `dir`.
pub fn clean_stale_temporaries(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name.ends_with(".parquet.tmp") && entry.file_type()?.is_file()
        {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!("removed {} stale temporary files from {}", removed, dir.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::Trace,
        grid::{build_grid, TimeRange},
        waveform::WaveformParams,
    };
    use chrono::TimeDelta;
    use core_types::PrecisionPolicy;
    use std::num::NonZeroU32;

    fn dataset(periods: u32) -> BoundDataset {
        let range = TimeRange::parse(
            "2020-01-01T00:00:00Z",
            "2020-01-02T00:00:00Z",
            TimeDelta::minutes(15),
        )
        .unwrap();
        let params = WaveformParams::new(150.0, 50.0, NonZeroU32::new(periods).unwrap());
        Trace::generate(build_grid(&range), &params)
            .bind(&TraceSchema::carbon_intensity(), PrecisionPolicy::Reject)
            .unwrap()
    }

    fn temporaries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn interrupted_first_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trace.parquet");
        let err = write_committing(&dataset(2), &dest, &WriteOptions::default(), |tmp| {
            assert!(tmp.exists());
            Err(io::Error::other("interrupted"))
        })
        .unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert!(!dest.exists());
        assert!(temporaries(dir.path()).is_empty());
    }

    #[test]
    fn interrupted_overwrite_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trace.parquet");
        let first = write(&dataset(2), &dest).unwrap();
        let before = fs::read(&dest).unwrap();

        write_committing(&dataset(5), &dest, &WriteOptions::default(), |_| {
            Err(io::Error::other("interrupted"))
        })
        .unwrap_err();

        assert_eq!(fs::read(&dest).unwrap(), before);
        assert_eq!(compute_checksum(&dest).unwrap(), first.checksum);
        assert!(temporaries(dir.path()).is_empty());
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trace.parquet");
        let first = write(&dataset(2), &dest).unwrap();
        let second = write(&dataset(5), &dest).unwrap();
        assert_ne!(first.checksum, second.checksum);
        assert_eq!(compute_checksum(&dest).unwrap(), second.checksum);
        assert_eq!(fs::metadata(&dest).unwrap().len(), second.bytes);
    }

    #[test]
    fn missing_parent_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("absent").join("trace.parquet");
        let err = write(&dataset(1), &dest).unwrap_err();
        match err {
            WriteError::Io { path, source } => {
                assert_eq!(path, dir.path().join("absent"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn directory_destination_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep.txt"), b"keep").unwrap();
        assert!(write(&dataset(1), &dest).is_err());
        assert_eq!(fs::read(dest.join("keep.txt")).unwrap(), b"keep");
        assert!(temporaries(dir.path()).is_empty());
    }

    #[test]
    fn row_groups_follow_target() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trace.parquet");
        write_with_options(&dataset(1), &dest, &WriteOptions { row_group_target: 10 }).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(builder.metadata().num_row_groups(), 10);
        for row_group in builder.metadata().row_groups() {
            for column in row_group.columns() {
                assert_eq!(column.compression(), Compression::SNAPPY);
            }
        }
        let ds = read_trace(&dest).unwrap();
        assert_eq!(ds.num_rows(), 97);
    }

    #[test]
    fn stale_temporaries_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".trace.parquet.abc123.parquet.tmp"), b"partial").unwrap();
        fs::write(dir.path().join("trace.parquet"), b"keep").unwrap();
        assert_eq!(clean_stale_temporaries(dir.path()).unwrap(), 1);
        assert!(temporaries(dir.path()).is_empty());
        assert!(dir.path().join("trace.parquet").exists());
    }

    #[test]
    fn read_rejects_non_trace_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("garbage.parquet");
        fs::write(&dest, b"not parquet").unwrap();
        assert!(matches!(read_trace(&dest), Err(ReadError::Parquet(_))));
    }
}
