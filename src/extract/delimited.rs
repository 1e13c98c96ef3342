/// Delimited-text strategy.
///
/// The delimiter is chosen by how uniform the resulting table is: the
/// candidate whose most common field count is shared by the most records wins.
use std::collections::HashMap;

use csv::ReaderBuilder;
use tracing::debug;

use crate::extract::StrategyError;
use crate::resource::decode_text;
use crate::table::{CandidateTable, Cell, Origin, RawRow};

/// Tried in this order; earlier delimiters win ties
const DELIMITERS: [u8; 3] = [b',', b'\t', b';'];

/// How well a delimiter fits the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    multi_column: bool,
    modal_rows: usize,
    modal_width: usize,
}

pub fn read_delimited(bytes: &[u8]) -> Result<Vec<CandidateTable>, StrategyError> {
    let text = decode_text(bytes);

    let mut best: Option<(u8, Score, Vec<Record>)> = None;
    for delimiter in DELIMITERS {
        let records = split_records(&text, delimiter)?;
        let score = score(&records);
        debug!(
            "Delimiter {:?} scores {:?}",
            char::from(delimiter),
            score
        );
        if best.as_ref().map_or(true, |(_, current, _)| score > *current) {
            best = Some((delimiter, score, records));
        }
    }

    let Some((delimiter, _, records)) = best else {
        return Ok(Vec::new());
    };
    debug!(
        "Using delimiter {:?} for {} record(s)",
        char::from(delimiter),
        records.len()
    );

    let rows = records
        .into_iter()
        .filter_map(|record| {
            let cells = record.fields.iter().map(|f| Cell::text(f)).collect();
            RawRow::new(record.line, cells)
        })
        .collect();
    let table = CandidateTable::new(
        Origin {
            index: 0,
            name: Some("delimited".to_string()),
        },
        rows,
    );
    if table.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![table])
}

/// Fields of one record plus the source line it started on
struct Record {
    line: usize,
    fields: Vec<String>,
}

fn split_records(text: &str, delimiter: u8) -> Result<Vec<Record>, StrategyError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        // The reader's line counter ignores the blank lines it skips, so
        // count newlines up to the record's byte offset instead
        let line = record
            .position()
            .map_or(i + 1, |pos| line_at(text, pos.byte() as usize));
        records.push(Record {
            line,
            fields: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(records)
}

/// 1-based line number of the byte at `offset`
fn line_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

fn score(records: &[Record]) -> Score {
    let mut widths: HashMap<usize, usize> = HashMap::new();
    for record in records {
        if record.fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        *widths.entry(record.fields.len()).or_default() += 1;
    }

    // Most frequent width; the wider one on a frequency tie
    let (modal_width, modal_rows) = widths
        .into_iter()
        .max_by_key(|&(width, rows)| (rows, width))
        .unwrap_or((0, 0));

    Score {
        multi_column: modal_width >= 2,
        modal_rows,
        modal_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(table: &CandidateTable) -> Vec<Vec<String>> {
        table
            .rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.to_label()).collect())
            .collect()
    }

    #[test]
    fn test_semicolon_with_decimal_commas() {
        let text = "Fecha;Total\nene-24;1.234,5\nfeb-24;2.000\n";
        let tables = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(
            labels(&tables[0]),
            vec![
                vec!["Fecha", "Total"],
                vec!["ene-24", "1.234,5"],
                vec!["feb-24", "2.000"],
            ]
        );
    }

    #[test]
    fn test_tab_separated() {
        let text = "Fecha\tAltas\tBajas\n01/2024\t10\t3\n02/2024\t12\t4\n";
        let tables = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(tables[0].width(), 3);
    }

    #[test]
    fn test_quoted_commas_are_not_split() {
        let text = "Fecha,Total\nene-24,\"1,5\"\nfeb-24,\"2,5\"\n";
        let tables = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(labels(&tables[0])[1], vec!["ene-24", "1,5"]);
    }

    #[test]
    fn test_title_line_does_not_confuse_scoring() {
        let text = "Cuadro 2; Recaudación\n\nFecha;Privados;Públicos\n01/2024;1;2\n02/2024;3;4\n";
        let tables = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(tables[0].width(), 3);
        assert_eq!(tables[0].rows[1].number, 3);
    }

    #[test]
    fn test_row_numbers_count_skipped_blank_lines() {
        let text = "Fecha;Total\n\n\nene-24;1\n\nfeb-24;2\n";
        let tables = read_delimited(text.as_bytes()).unwrap();
        let numbers: Vec<usize> = tables[0].rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 4, 6]);
    }

    #[test]
    fn test_single_column_text_still_yields_a_table() {
        let tables = read_delimited(b"solo texto\notra linea\n").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].width(), 1);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(read_delimited(b"\n\n  \n").unwrap().is_empty());
    }
}
