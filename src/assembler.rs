//! Series assembly: promoted columns onto a schema's measures.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::header::{Column, PromotedTable};
use crate::ingest_error::IngestError;
use crate::normalize::{fold, number_from_cell, period_from_cell, year_marker, YearMonth};
use crate::schema::SeriesSchema;
use crate::table::RawRow;

/// Share of data cells that must read as periods for an unnamed column to be
/// taken as the period column
const PERIOD_CONTENT_RATIO: f64 = 0.3;

/// One output row: a month and one slot per schema measure
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub period: YearMonth,
    pub values: Vec<Option<f64>>,
}

/// A data row left out of the output, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: IngestError,
}

/// Which source column fed a measure
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureColumn {
    pub measure: &'static str,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub series: &'static str,
    pub period_column: String,
    pub measures: Vec<MeasureColumn>,
    /// Sorted by period, one record per period
    pub records: Vec<SeriesRecord>,
    pub dropped: Vec<DroppedRow>,
}

impl Assembly {
    pub fn measure_names(&self) -> Vec<&'static str> {
        self.measures.iter().map(|m| m.measure).collect()
    }
}

#[instrument(skip_all, fields(series = schema.id, origin = %table.origin))]
pub fn assemble(table: &PromotedTable, schema: &SeriesSchema) -> Result<Assembly, IngestError> {
    let folded: Vec<String> = table.columns.iter().map(|c| fold(&c.name)).collect();
    let mismatch = |detail: String| IngestError::SchemaMismatch {
        series: schema.id.to_string(),
        detail,
        columns: table.column_names(),
    };

    let period_pos = find_period_column(table, &folded, schema)
        .ok_or_else(|| mismatch("no period column".to_string()))?;
    let year_pos = folded
        .iter()
        .enumerate()
        .position(|(i, name)| {
            i != period_pos && SeriesSchema::has_alias(schema.year_aliases, name)
        });

    let mut claimed = vec![false; table.columns.len()];
    claimed[period_pos] = true;
    if let Some(y) = year_pos {
        claimed[y] = true;
    }

    let mut mapped: Vec<Option<&Column>> = Vec::with_capacity(schema.measures.len());
    for measure in schema.measures {
        let found = measure.aliases.iter().find_map(|alias| {
            folded.iter().enumerate().position(|(i, name)| {
                !claimed[i] && !measure.is_excluded(name) && alias.matches(name)
            })
        });
        if let Some(i) = found {
            claimed[i] = true;
            debug!("Measure {} <- column '{}'", measure.name, table.columns[i].name);
        }
        mapped.push(found.map(|i| &table.columns[i]));
    }

    if mapped.iter().all(Option::is_none) {
        return Err(mismatch("no measure column matched".to_string()));
    }
    let missing: Vec<&str> = schema
        .required
        .iter()
        .copied()
        .filter(|req| {
            schema
                .measures
                .iter()
                .zip(&mapped)
                .any(|(m, col)| m.name == *req && col.is_none())
        })
        .collect();
    if !missing.is_empty() {
        return Err(mismatch(format!("missing required measures {missing:?}")));
    }

    let period_col = &table.columns[period_pos];
    let year_col = year_pos.map(|i| &table.columns[i]);

    let mut by_period: BTreeMap<YearMonth, SeriesRecord> = BTreeMap::new();
    let mut dropped = Vec::new();
    let mut carried_year: Option<i32> = None;

    for row in &table.rows {
        if let Some(year) = year_col.and_then(|c| year_marker(row.get(c.index))) {
            carried_year = Some(year);
        }

        let period_cell = row.get(period_col.index);
        if year_col.is_none() {
            if let Some(year) = year_marker(period_cell) {
                // A bare year opens a block of month-only labels
                debug!("Row {}: year block {}", row.number, year);
                carried_year = Some(year);
                continue;
            }
        }

        match assemble_row(row, period_col, &mapped, carried_year) {
            Ok(record) => {
                if let Some(previous) = by_period.insert(record.period, record) {
                    debug!(
                        "Row {}: period {} seen again, keeping the later values",
                        row.number, previous.period
                    );
                }
            }
            Err(reason) => {
                warn!("Dropping row {}: {}", row.number, reason);
                dropped.push(DroppedRow {
                    row: row.number,
                    reason,
                });
            }
        }
    }

    let records: Vec<SeriesRecord> = by_period.into_values().collect();
    info!(
        "Assembled {} record(s) for {} ({} row(s) dropped)",
        records.len(),
        schema.id,
        dropped.len()
    );

    Ok(Assembly {
        series: schema.id,
        period_column: period_col.name.clone(),
        measures: schema
            .measures
            .iter()
            .zip(&mapped)
            .map(|(m, col)| MeasureColumn {
                measure: m.name,
                source: col.map(|c| c.name.clone()),
            })
            .collect(),
        records,
        dropped,
    })
}

fn assemble_row(
    row: &RawRow,
    period_col: &Column,
    mapped: &[Option<&Column>],
    year_hint: Option<i32>,
) -> Result<SeriesRecord, IngestError> {
    let period = period_from_cell(row.get(period_col.index), year_hint)?;
    let values = mapped
        .iter()
        .map(|col| match col {
            Some(c) => number_from_cell(row.get(c.index)),
            None => Ok(None),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SeriesRecord { period, values })
}

/// A column named like a period; failing that, the first column whose
/// content mostly reads as periods
fn find_period_column(
    table: &PromotedTable,
    folded: &[String],
    schema: &SeriesSchema,
) -> Option<usize> {
    if let Some(i) = folded
        .iter()
        .position(|name| SeriesSchema::has_alias(schema.period_aliases, name))
    {
        return Some(i);
    }

    if table.rows.is_empty() {
        return None;
    }
    table.columns.iter().position(|column| {
        let parsed = table
            .rows
            .iter()
            .filter(|row| period_from_cell(row.get(column.index), None).is_ok())
            .count();
        parsed as f64 / table.rows.len() as f64 > PERIOD_CONTENT_RATIO
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::lookup;
    use crate::table::{Cell, Origin};

    fn promoted(header: &[&str], rows: Vec<Vec<Cell>>) -> PromotedTable {
        PromotedTable {
            origin: Origin {
                index: 0,
                name: Some("test".to_string()),
            },
            header_row: 1,
            columns: header
                .iter()
                .enumerate()
                .map(|(index, name)| Column {
                    name: name.to_string(),
                    index,
                })
                .collect(),
            rows: rows
                .into_iter()
                .enumerate()
                .filter_map(|(i, cells)| RawRow::new(i + 2, cells))
                .collect(),
        }
    }

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_trailing_total_and_footnote_rows_are_dropped() {
        let table = promoted(
            &["Mes", "Privados", "Públicos", "Total"],
            vec![
                vec![t("ene-24"), t("10"), t("5"), t("15")],
                vec![t("feb-24"), t("20"), t("5"), t("25")],
                vec![t("Total"), t("30"), t("10"), t("40")],
                vec![t("Fuente: BPS - ATYR")],
            ],
        );
        let assembly = assemble(&table, lookup("recaudacion").unwrap()).unwrap();
        assert_eq!(assembly.records.len(), 2);
        assert_eq!(assembly.dropped.len(), 2);
        assert_eq!(assembly.dropped[0].row, 4);
        assert!(matches!(
            assembly.dropped[0].reason,
            IngestError::UnparseablePeriod(_)
        ));
        assert_eq!(
            assembly.records[1].values,
            vec![Some(20.0), Some(5.0), Some(25.0)]
        );
    }

    #[test]
    fn test_records_sorted_and_last_duplicate_wins() {
        let table = promoted(
            &["Fecha", "Total"],
            vec![
                vec![t("03/2024"), t("3")],
                vec![t("01/2024"), t("1")],
                vec![t("marzo 2024"), t("33")],
            ],
        );
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        let periods: Vec<YearMonth> = assembly.records.iter().map(|r| r.period).collect();
        assert_eq!(periods, vec![ym(2024, 1), ym(2024, 3)]);
        assert_eq!(assembly.records[1].values[0], Some(33.0));
    }

    #[test]
    fn test_bare_year_rows_complete_month_labels() {
        let table = promoted(
            &["Mes", "Total"],
            vec![
                vec![Cell::Number(2023.0)],
                vec![t("Diciembre"), t("7")],
                vec![t("2024 (*)")],
                vec![t("Enero"), t("8")],
            ],
        );
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        let periods: Vec<YearMonth> = assembly.records.iter().map(|r| r.period).collect();
        assert_eq!(periods, vec![ym(2023, 12), ym(2024, 1)]);
        assert!(assembly.dropped.is_empty());
    }

    #[test]
    fn test_year_column_is_carried_forward() {
        let table = promoted(
            &["Año", "Mes", "Total"],
            vec![
                vec![t("2024"), t("ene"), t("1")],
                vec![Cell::Empty, t("feb"), t("2")],
            ],
        );
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        assert_eq!(assembly.records[1].period, ym(2024, 2));
        assert_eq!(assembly.period_column, "Mes");
    }

    #[test]
    fn test_unmatched_measures_are_missing_slots() {
        let table = promoted(&["Fecha", "Montevideo"], vec![vec![t("ene-24"), t("4")]]);
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        assert_eq!(assembly.measures.len(), 6);
        assert_eq!(
            assembly.records[0].values,
            vec![None, Some(4.0), None, None, None, None]
        );
    }

    #[test]
    fn test_missing_required_measure() {
        let table = promoted(&["Mes", "Privados", "Total"], vec![vec![t("ene-24"), t("1"), t("2")]]);
        match assemble(&table, lookup("recaudacion").unwrap()).unwrap_err() {
            IngestError::SchemaMismatch { detail, columns, .. } => {
                assert!(detail.contains("recaudacion_publicos"));
                assert_eq!(columns, vec!["Mes", "Privados", "Total"]);
            }
            other => panic!("Expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_matching_measure() {
        let table = promoted(&["Fecha", "Observaciones"], vec![vec![t("ene-24"), t("x")]]);
        assert!(matches!(
            assemble(&table, lookup("desempleo-altas").unwrap()),
            Err(IngestError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_period_column_found_by_content() {
        let table = promoted(
            &["Detalle", "Total"],
            vec![vec![t("ene-24"), t("1")], vec![t("feb-24"), t("2")]],
        );
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        assert_eq!(assembly.period_column, "Detalle");
        assert_eq!(assembly.records.len(), 2);
    }

    #[test]
    fn test_bad_number_drops_row() {
        let table = promoted(
            &["Fecha", "Total"],
            vec![vec![t("ene-24"), t("1")], vec![t("feb-24"), t("n/c?")]],
        );
        let assembly = assemble(&table, lookup("desempleo-altas").unwrap()).unwrap();
        assert_eq!(assembly.records.len(), 1);
        assert!(matches!(
            assembly.dropped[0].reason,
            IngestError::UnparseableNumber(_)
        ));
    }
}
