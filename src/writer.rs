//! CSV artifacts: one file per series plus the crawled index.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use crate::assembler::Assembly;
use crate::index::IndexEntry;
use crate::schema::SeriesSchema;

pub const INDEX_FILE_NAME: &str = "indicators_index.csv";

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Nothing to write: {0}")]
    Empty(String),
}

pub fn series_path(output_dir: &Path, schema: &SeriesSchema) -> PathBuf {
    output_dir.join(schema.file_name())
}

pub fn index_path(output_dir: &Path) -> PathBuf {
    output_dir.join(INDEX_FILE_NAME)
}

/// Write `period,<measures...>` rows; missing values become empty fields
#[instrument(skip_all, fields(series = schema.id, dir = %output_dir.display()))]
pub fn write_series_csv(
    output_dir: &Path,
    schema: &SeriesSchema,
    assembly: &Assembly,
) -> Result<PathBuf, WriteError> {
    fs::create_dir_all(output_dir)?;
    let path = series_path(output_dir, schema);
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header = vec!["period"];
    header.extend(assembly.measure_names());
    writer.write_record(&header)?;

    for record in &assembly.records {
        let mut row = Vec::with_capacity(record.values.len() + 1);
        row.push(record.period.to_string());
        row.extend(
            record
                .values
                .iter()
                .map(|v| v.map(|n| n.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(
        "Wrote {} record(s) to {}",
        assembly.records.len(),
        path.display()
    );
    Ok(path)
}

/// Write the index; an empty crawl is refused rather than clobbering a good file
#[instrument(skip_all, fields(entries = entries.len(), dir = %output_dir.display()))]
pub fn write_index_csv(output_dir: &Path, entries: &[IndexEntry]) -> Result<PathBuf, WriteError> {
    if entries.is_empty() {
        return Err(WriteError::Empty(
            "index crawl returned no PDF/XLS links".to_string(),
        ));
    }
    fs::create_dir_all(output_dir)?;
    let path = index_path(output_dir);
    let mut writer = csv::Writer::from_path(&path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;

    info!("Wrote {} index entries to {}", entries.len(), path.display());
    Ok(path)
}

pub fn read_index_csv(path: &Path) -> Result<Vec<IndexEntry>, WriteError> {
    let mut reader = csv::Reader::from_path(path)?;
    let entries = reader
        .deserialize()
        .collect::<Result<Vec<IndexEntry>, _>>()?;
    Ok(entries)
}
