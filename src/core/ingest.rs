//! Parquet episode log ingestion.
//!
//! Reads one tabular log per episode, normalizes known column-name typos,
//! and extracts the action vectors, timestamps, and raw per-camera point
//! cloud buffers needed by the rest of the pipeline.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, FixedSizeListArray, Float32Array, Float64Array, Int64Array, LargeListArray, ListArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::DataType;
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use thiserror::Error;

/// Errors that can occur while loading an episode log.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("empty log file: {0}")]
    EmptyFile(PathBuf),

    #[error("missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("column '{column}' has unsupported type '{datatype}'")]
    UnsupportedColumn { column: String, datatype: String },
}

/// Result type for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// One episode's normalized row table.
#[derive(Debug, Clone)]
pub struct EpisodeTable {
    /// Episode index taken from the first row.
    pub index: i64,
    /// Canonical episode key, `episode_{index:06}`.
    pub key: String,
    /// Number of rows in the log.
    pub num_rows: usize,
    /// Per-row action vectors.
    pub actions: Vec<Vec<f64>>,
    /// Per-row timestamps, if the log carries a `timestamp` column.
    pub timestamps: Option<Vec<f64>>,
    /// Per-camera raw point buffers (flat xyz triplets), one entry per row.
    /// A camera whose column is missing maps to all-empty buffers.
    pub pointclouds: HashMap<String, Vec<Vec<f32>>>,
}

/// Map historical column-name typos onto their canonical names.
///
/// `fra_index` and `fre_index` are known misspellings of `frame_index` found
/// in older recordings. They are renamed before any column is read and not
/// interpreted further.
pub fn canonical_column_name(name: &str) -> &str {
    match name {
        "fra_index" | "fre_index" => "frame_index",
        other => other,
    }
}

/// Format the canonical episode key for an episode index.
pub fn episode_key(index: i64) -> String {
    format!("episode_{:06}", index)
}

/// Extract the rows of a list-typed column as owned per-row value arrays.
/// Returns `None` for non-list columns; null rows map to `None` entries.
fn list_rows(col: &ArrayRef) -> Option<Vec<Option<ArrayRef>>> {
    match col.data_type() {
        DataType::List(_) => {
            let list = col.as_any().downcast_ref::<ListArray>()?;
            Some(
                (0..list.len())
                    .map(|i| (!list.is_null(i)).then(|| list.value(i)))
                    .collect(),
            )
        }
        DataType::LargeList(_) => {
            let list = col.as_any().downcast_ref::<LargeListArray>()?;
            Some(
                (0..list.len())
                    .map(|i| (!list.is_null(i)).then(|| list.value(i)))
                    .collect(),
            )
        }
        DataType::FixedSizeList(_, _) => {
            let list = col.as_any().downcast_ref::<FixedSizeListArray>()?;
            Some(
                (0..list.len())
                    .map(|i| (!list.is_null(i)).then(|| list.value(i)))
                    .collect(),
            )
        }
        _ => None,
    }
}

fn unsupported(column: &str, col: &ArrayRef) -> IngestError {
    IngestError::UnsupportedColumn {
        column: column.to_string(),
        datatype: col.data_type().to_string(),
    }
}

/// Read a list column as per-row `f64` vectors. Null rows become empty
/// vectors, null values become NaN.
fn numeric_rows_f64(col: &ArrayRef, column: &str) -> Result<Vec<Vec<f64>>> {
    let rows = list_rows(col).ok_or_else(|| unsupported(column, col))?;

    rows.into_iter()
        .map(|row| match row {
            None => Ok(Vec::new()),
            Some(values) => {
                let floats = cast(values.as_ref(), &DataType::Float64)?;
                let floats = floats
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| unsupported(column, col))?;
                Ok(floats.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            }
        })
        .collect()
}

/// Read a list column as per-row `f32` vectors. Null rows become empty
/// vectors, null values become NaN.
fn numeric_rows_f32(col: &ArrayRef, column: &str) -> Result<Vec<Vec<f32>>> {
    let rows = list_rows(col).ok_or_else(|| unsupported(column, col))?;

    rows.into_iter()
        .map(|row| match row {
            None => Ok(Vec::new()),
            Some(values) => {
                let floats = cast(values.as_ref(), &DataType::Float32)?;
                let floats = floats
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| unsupported(column, col))?;
                Ok(floats.iter().map(|v| v.unwrap_or(f32::NAN)).collect())
            }
        })
        .collect()
}

/// Read a scalar numeric column as `f64` values.
fn column_f64(col: &ArrayRef, column: &str) -> Result<Vec<f64>> {
    let floats = cast(col.as_ref(), &DataType::Float64)?;
    let floats = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| unsupported(column, col))?;
    Ok(floats.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Read one `i64` value out of a scalar numeric column.
fn scalar_i64(col: &ArrayRef, row: usize, column: &str) -> Result<i64> {
    let ints = cast(col.as_ref(), &DataType::Int64)?;
    let ints = ints
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| unsupported(column, col))?;
    if ints.is_null(row) {
        return Err(unsupported(column, col));
    }
    Ok(ints.value(row))
}

/// Load one parquet episode log.
///
/// Reads all row groups, applies column-typo aliasing, and extracts the
/// episode index, action vectors, optional timestamps, and the raw point
/// cloud buffers for each configured camera.
///
/// # Errors
///
/// Returns an error when the file cannot be parsed as parquet, is empty,
/// or lacks the required `episode_index` or `action` columns. A missing
/// point cloud column is not an error: that camera's buffers come back
/// empty for every row.
pub fn load_episode_log<P: AsRef<Path>>(
    path: P,
    pointcloud_cameras: &[String],
) -> Result<EpisodeTable> {
    let path = path.as_ref();

    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    if batches.is_empty() || batches.iter().all(|b| b.num_rows() == 0) {
        return Err(IngestError::EmptyFile(path.to_path_buf()));
    }

    let schema = batches[0].schema();
    let batch = concat_batches(&schema, &batches)?;
    let num_rows = batch.num_rows();

    // Column index under canonical (typo-corrected) names.
    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (i, field) in schema.fields().iter().enumerate() {
        let canonical = canonical_column_name(field.name());
        if canonical != field.name() {
            info!(
                "{}: treating column '{}' as '{}'",
                path.display(),
                field.name(),
                canonical
            );
        }
        columns.insert(canonical, i);
    }

    let missing = |column: &str| IngestError::MissingColumn {
        column: column.to_string(),
        path: path.to_path_buf(),
    };

    let episode_col = *columns.get("episode_index").ok_or_else(|| missing("episode_index"))?;
    let index = scalar_i64(batch.column(episode_col), 0, "episode_index")?;
    let key = episode_key(index);

    let action_col = *columns.get("action").ok_or_else(|| missing("action"))?;
    let actions = numeric_rows_f64(batch.column(action_col), "action")?;

    let timestamps = match columns.get("timestamp") {
        Some(&i) => Some(column_f64(batch.column(i), "timestamp")?),
        None => None,
    };

    let mut pointclouds = HashMap::new();
    for camera in pointcloud_cameras {
        let column = format!("observation.pointcloud.{}", camera);
        let buffers = match columns.get(column.as_str()) {
            None => {
                warn!("{}: point cloud column '{}' missing", path.display(), column);
                vec![Vec::new(); num_rows]
            }
            Some(&i) => match numeric_rows_f32(batch.column(i), &column) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("{}: unreadable point cloud column '{}': {}", path.display(), column, e);
                    vec![Vec::new(); num_rows]
                }
            },
        };
        pointclouds.insert(camera.clone(), buffers);
    }

    info!(
        "{}: loaded {} rows for {} ({} columns)",
        path.display(),
        num_rows,
        key,
        schema.fields().len()
    );

    Ok(EpisodeTable {
        index,
        key,
        num_rows,
        actions,
        timestamps,
        pointclouds,
    })
}
