// Sniffing and extraction through the public API

mod common;

use bps_indicators::extract::extract;
use bps_indicators::ingest_error::IngestError;
use bps_indicators::sniffer::{sniff, SniffedFormat};
use bps_indicators::table::Cell;
use common::{n, t, xlsx, BLANK, HTML_AS_XLS};

#[test]
fn test_workbook_sheets_become_candidates_in_order() {
    let bytes = xlsx(&[
        ("Notas", vec![vec![t("Fuente: BPS")]]),
        (
            "Altas",
            vec![
                vec![t("Altas por mes")],
                vec![],
                vec![t("Mes"), BLANK, t("Total")],
                vec![t("ene-24"), BLANK, n(9000.0)],
            ],
        ),
    ]);

    let format = sniff(&bytes, Some("xls")).unwrap();
    assert_eq!(format, SniffedFormat::ModernSpreadsheet);

    let tables = extract(&bytes, format).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].origin.label(), "Notas");
    assert_eq!(tables[1].origin.label(), "Altas");

    let altas = &tables[1];
    let numbers: Vec<usize> = altas.rows.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 3, 4]);
    assert_eq!(altas.rows[2].cells, vec![Cell::Text("ene-24".to_string()), Cell::Empty, Cell::Number(9000.0)]);
}

#[test]
fn test_html_export_is_one_candidate() {
    let format = sniff(HTML_AS_XLS.as_bytes(), Some("xls")).unwrap();
    assert_eq!(format, SniffedFormat::HtmlTable);

    let tables = extract(HTML_AS_XLS.as_bytes(), format).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows.len(), 5);
    assert_eq!(tables[0].width(), 4);
}

#[test]
fn test_markup_soup_without_table_element() {
    let soup = "<html><body><TR><TD>Mes<TD>Total\n<TR><TD>ene-24<TD>1.000</body></html>";
    let tables = extract(soup.as_bytes(), SniffedFormat::HtmlTable).unwrap();

    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows[0].cells, vec![Cell::text("Mes"), Cell::text("Total")]);
    assert_eq!(tables[0].rows[1].cells, vec![Cell::text("ene-24"), Cell::text("1.000")]);
}

#[test]
fn test_truncated_buffer_is_unrecognized() {
    let err = sniff(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07], None).unwrap_err();
    assert!(matches!(err, IngestError::UnrecognizedFormat(_)));
    assert!(err.is_structural());
}
