/// Workbook strategies backed by calamine.
///
/// Every sheet becomes one candidate tagged with its sheet name. The legacy
/// (BIFF) and modern (OOXML) readers are separate strategies so that a
/// workbook mislabeled as one kind can be retried as the other.
use std::fmt::Display;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::extract::StrategyError;
use crate::table::{CandidateTable, Cell, Origin, RawRow};

/// Read a legacy binary workbook (.xls)
pub fn read_legacy(bytes: &[u8]) -> Result<Vec<CandidateTable>, StrategyError> {
    let workbook: Xls<_> = Xls::new(Cursor::new(bytes))
        .map_err(|e| StrategyError::WorkbookOpen(e.to_string()))?;
    read_all_sheets(workbook)
}

/// Read a modern zipped workbook (.xlsx)
pub fn read_modern(bytes: &[u8]) -> Result<Vec<CandidateTable>, StrategyError> {
    let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| StrategyError::WorkbookOpen(e.to_string()))?;
    read_all_sheets(workbook)
}

fn read_all_sheets<'a, R>(mut workbook: R) -> Result<Vec<CandidateTable>, StrategyError>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: Display,
{
    let sheet_names = workbook.sheet_names();
    debug!("Workbook has {} sheet(s): {:?}", sheet_names.len(), sheet_names);

    let mut tables = Vec::new();
    let mut first_error = None;

    for (index, sheet_name) in sheet_names.into_iter().enumerate() {
        match workbook.worksheet_range(&sheet_name) {
            Ok(range) => {
                let table = range_to_table(&range, index, &sheet_name);
                debug!("Sheet '{}' has {} non-blank rows", sheet_name, table.rows.len());
                tables.push(table);
            }
            Err(e) => {
                // One unreadable sheet should not hide the others
                warn!("Failed to read sheet '{}': {}", sheet_name, e);
                first_error.get_or_insert(StrategyError::SheetRead {
                    sheet: sheet_name.clone(),
                    msg: e.to_string(),
                });
            }
        }
    }

    match first_error {
        Some(err) if tables.is_empty() => Err(err),
        _ => Ok(tables),
    }
}

fn range_to_table(range: &Range<Data>, index: usize, sheet_name: &str) -> CandidateTable {
    // Rows are numbered as in the sheet, even when the used range starts lower down
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let rows = range
        .rows()
        .enumerate()
        .filter_map(|(i, row)| {
            let cells = row.iter().map(data_to_cell).collect();
            RawRow::new(first_row + i + 1, cells)
        })
        .collect();

    CandidateTable::new(
        Origin {
            index,
            name: Some(sheet_name.to_string()),
        },
        rows,
    )
}

fn data_to_cell(data: &Data) -> Cell {
    #[allow(unreachable_patterns)]
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Cell::Date(datetime.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s)),
        Data::DurationIso(s) => Cell::text(s),
        Data::Error(_) => Cell::Empty,
        _ => Cell::Empty,
    }
}
