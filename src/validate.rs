//! Checks on written CSV artifacts, run before anything is published.

use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument};

use crate::normalize::YearMonth;
use crate::schema::SeriesSchema;

const INDEX_COLUMNS: [&str; 5] = ["chapter", "short_title", "file_type", "download_url", "page_url"];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{file}: missing column(s) {columns:?}")]
    MissingColumns { file: String, columns: Vec<String> },
    #[error("{file} line {line}: {detail}")]
    InvalidRow {
        file: String,
        line: u64,
        detail: String,
    },
    #[error("{0}: no data rows")]
    NoRows(String),
}

struct Sheet {
    file: String,
    headers: Vec<String>,
    reader: csv::Reader<std::fs::File>,
}

impl Sheet {
    fn open(path: &Path) -> Result<Self, ValidationError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        Ok(Self {
            file: path.display().to_string(),
            headers,
            reader,
        })
    }

    fn require(&self, wanted: &[&str]) -> Result<(), ValidationError> {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|w| !self.headers.iter().any(|h| h == *w))
            .map(|w| w.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns {
                file: self.file.clone(),
                columns: missing,
            })
        }
    }

    fn position(&self, column: &str) -> usize {
        self.headers.iter().position(|h| h == column).unwrap_or(0)
    }
}

fn invalid(file: &str, record: &csv::StringRecord, detail: String) -> ValidationError {
    ValidationError::InvalidRow {
        file: file.to_string(),
        line: record.position().map_or(0, |p| p.line()),
        detail,
    }
}

/// Required columns, a known file type and absolute URLs on every row.
/// Returns the number of entries.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn validate_index_csv(path: &Path) -> Result<usize, ValidationError> {
    let mut sheet = Sheet::open(path)?;
    sheet.require(&INDEX_COLUMNS)?;
    let file_type = sheet.position("file_type");
    let urls = [sheet.position("download_url"), sheet.position("page_url")];

    let mut rows = 0;
    for record in sheet.reader.records() {
        let record = record?;
        let kind = record.get(file_type).unwrap_or_default();
        if !matches!(kind, "pdf" | "xls") {
            return Err(invalid(&sheet.file, &record, format!("unexpected file_type '{kind}'")));
        }
        for &col in &urls {
            let url = record.get(col).unwrap_or_default();
            if !url.starts_with("http") {
                return Err(invalid(&sheet.file, &record, format!("not an absolute URL: '{url}'")));
            }
        }
        rows += 1;
    }

    if rows == 0 {
        return Err(ValidationError::NoRows(sheet.file));
    }
    info!("Index OK: {} entries", rows);
    Ok(rows)
}

/// Periods parse and strictly ascend; required measures are present;
/// numeric fields are empty or numbers. Returns the number of records.
#[instrument(skip_all, fields(path = %path.display(), series = schema.id))]
pub fn validate_series_csv(path: &Path, schema: &SeriesSchema) -> Result<usize, ValidationError> {
    let mut sheet = Sheet::open(path)?;
    let mut wanted = vec!["period"];
    wanted.extend(schema.required);
    sheet.require(&wanted)?;

    let period_col = sheet.position("period");
    let mut previous: Option<YearMonth> = None;
    let mut rows = 0;

    for record in sheet.reader.records() {
        let record = record?;
        let raw = record.get(period_col).unwrap_or_default();
        let period: YearMonth = raw
            .parse()
            .map_err(|_| invalid(&sheet.file, &record, format!("bad period '{raw}'")))?;
        if let Some(prev) = previous {
            if period <= prev {
                return Err(invalid(
                    &sheet.file,
                    &record,
                    format!("period {period} does not follow {prev}"),
                ));
            }
        }
        previous = Some(period);

        for (col, value) in record.iter().enumerate() {
            if col == period_col || value.is_empty() {
                continue;
            }
            if value.parse::<f64>().is_err() {
                let column = sheet.headers.get(col).cloned().unwrap_or_default();
                return Err(invalid(&sheet.file, &record, format!("{column}: not a number '{value}'")));
            }
        }
        rows += 1;
    }

    info!("Series {} OK: {} records", schema.id, rows);
    Ok(rows)
}
