//! Header row promotion.
//!
//! Published tables open with titles, notes and blank spacer rows; the real
//! header is the first row within a short window that names the period column.

use tracing::{debug, instrument};

use crate::ingest_error::IngestError;
use crate::normalize::fold;
use crate::selector::SelectedTable;
use crate::table::{CandidateTable, Cell, Origin, RawRow};

/// Number of leading rows searched for the header
pub const HEADER_SCAN_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Position of the column in the raw rows
    pub index: usize,
}

/// A table split into header and data rows
#[derive(Debug, Clone, PartialEq)]
pub struct PromotedTable {
    pub origin: Origin,
    /// Source row number of the header
    pub header_row: usize,
    pub columns: Vec<Column>,
    pub rows: Vec<RawRow>,
}

impl PromotedTable {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Position (within `table.rows`) of the first header-looking row in the scan window
pub fn find_header_row(table: &CandidateTable, anchors: &[&str]) -> Option<usize> {
    table
        .rows
        .iter()
        .take(HEADER_SCAN_WINDOW)
        .position(|row| is_header_row(row, anchors))
}

#[instrument(skip_all, fields(origin = %selected.table.origin))]
pub fn promote(selected: SelectedTable, anchors: &[&str]) -> Result<PromotedTable, IngestError> {
    let table = selected.table;

    let Some(position) = find_header_row(&table, anchors) else {
        return Err(IngestError::HeaderNotFound {
            origin: table.origin.label(),
            scanned: table.rows.len().min(HEADER_SCAN_WINDOW),
            anchors: anchors.iter().map(|a| a.to_string()).collect(),
        });
    };

    let mut rows = table.rows;
    let data = rows.split_off(position + 1);
    let header = rows.pop().ok_or_else(|| IngestError::HeaderNotFound {
        origin: table.origin.label(),
        scanned: 0,
        anchors: anchors.iter().map(|a| a.to_string()).collect(),
    })?;

    let columns = header_columns(&header);
    debug!(
        "Promoted source row {} as header ({} decorative row(s) discarded): {:?}",
        header.number,
        position,
        columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );

    Ok(PromotedTable {
        origin: table.origin,
        header_row: header.number,
        columns,
        rows: data,
    })
}

/// A header has at least two labels and one of them is an anchor word.
/// Single-cell rows are titles, even when they mention an anchor.
fn is_header_row(row: &RawRow, anchors: &[&str]) -> bool {
    if row.non_blank_count() < 2 {
        return false;
    }
    row.cells.iter().any(|cell| match cell {
        Cell::Text(text) => {
            let folded = fold(text);
            anchors.iter().any(|anchor| {
                folded == *anchor
                    || folded
                        .split(|c: char| !c.is_alphanumeric())
                        .any(|word| word == *anchor)
            })
        }
        _ => false,
    })
}

fn header_columns(header: &RawRow) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    for (index, cell) in header.cells.iter().enumerate() {
        if cell.is_blank() {
            continue;
        }
        let base = cell.to_label();
        let mut name = base.clone();
        let mut occurrence = 1;
        while columns.iter().any(|c| c.name == name) {
            occurrence += 1;
            name = format!("{base}_{occurrence}");
        }
        columns.push(Column { name, index });
    }
    columns
}
