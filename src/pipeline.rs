//! Resource ingestion: sniff, extract, select, promote, assemble.
//!
//! Synchronous and free of shared state; callers may ingest distinct
//! resources concurrently.

use tracing::{info, instrument};

use crate::assembler::{assemble, Assembly, SeriesRecord};
use crate::extract::extract;
use crate::header::{promote, Column};
use crate::ingest_error::IngestError;
use crate::resource::RawResource;
use crate::schema::SeriesSchema;
use crate::selector::{select, SelectionPolicy, SelectionReason, SheetHint};
use crate::sniffer::{sniff, SniffedFormat};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOptions {
    pub sheet_hint: Option<SheetHint>,
    /// Fail with `AmbiguousSelection` when the hint matches no candidate
    pub require_hint_match: bool,
}

impl IngestOptions {
    pub fn with_sheet(sheet: &str) -> Self {
        Self {
            sheet_hint: Some(SheetHint::parse(sheet)),
            require_hint_match: false,
        }
    }

    fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            hint: self.sheet_hint.clone(),
            require_hint_match: self.require_hint_match,
        }
    }
}

/// Result of ingesting one resource, with enough provenance to explain it
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub format: SniffedFormat,
    pub table: String,
    pub selected_by: SelectionReason,
    pub header_row: usize,
    pub columns: Vec<Column>,
    pub assembly: Assembly,
}

impl Ingested {
    pub fn records(&self) -> &[SeriesRecord] {
        &self.assembly.records
    }
}

#[instrument(skip_all, fields(url = %resource.url, series = schema.id))]
pub fn ingest(
    resource: &RawResource,
    schema: &SeriesSchema,
    options: &IngestOptions,
) -> Result<Ingested, IngestError> {
    let declared = resource.declared_extension();
    let format = sniff(&resource.bytes, declared.as_deref())?;
    let candidates = extract(&resource.bytes, format)?;
    let selected = select(candidates, &options.selection_policy(), schema)?;

    let table = selected.table.origin.label();
    let selected_by = selected.reason.clone();
    let promoted = promote(selected, schema.anchor_labels)?;
    let assembly = assemble(&promoted, schema)?;

    info!(
        "Ingested {} record(s) from '{}' ({}, header at row {})",
        assembly.records.len(),
        table,
        format,
        promoted.header_row
    );

    Ok(Ingested {
        format,
        table,
        selected_by,
        header_row: promoted.header_row,
        columns: promoted.columns,
        assembly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::YearMonth;
    use crate::schema::lookup;

    #[test]
    fn test_delimited_resource_end_to_end() {
        let csv = "Recaudación mensual\n\nMes;Privados;Públicos;Total\nene-24;1.000,5;500;1.500,5\nfeb-24;1.100;600;1.700\nTotal;2.100,5;1.100;3.200,5\n";
        let resource = RawResource::new("https://example.org/recaudacion.csv", None, csv.into());
        let ingested = ingest(
            &resource,
            lookup("recaudacion").unwrap(),
            &IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(ingested.format, SniffedFormat::DelimitedText);
        assert_eq!(ingested.header_row, 3);
        assert_eq!(ingested.records().len(), 2);
        assert_eq!(ingested.records()[0].period, YearMonth::new(2024, 1).unwrap());
        assert_eq!(
            ingested.records()[0].values,
            vec![Some(1000.5), Some(500.0), Some(1500.5)]
        );
        assert_eq!(ingested.assembly.dropped.len(), 1);
    }

    #[test]
    fn test_structural_failure_aborts() {
        let resource = RawResource::new("x.csv", None, b"solo una columna\nsin fecha\n".to_vec());
        let err = ingest(
            &resource,
            lookup("recaudacion").unwrap(),
            &IngestOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::HeaderNotFound { .. }));
        assert!(err.is_structural());
    }
}
