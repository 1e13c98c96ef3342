//! Value normalizers.
//!
//! Both halves are pure functions over the source locale (Uruguayan Spanish):
//! the same input always yields the same output.

pub mod number;
pub mod period;

pub use number::{number_from_cell, parse_number};
pub use period::{excel_serial_to_date, parse_period, period_from_cell, year_marker, YearMonth};

use crate::table::collapse_whitespace;

/// Case- and accent-insensitive form of a label, used for every keyword and
/// alias comparison in the pipeline
pub fn fold(s: &str) -> String {
    collapse_whitespace(s)
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("  Emisión  de\u{a0}PAGOS "), "emision de pagos");
        assert_eq!(fold("Año"), "ano");
        assert_eq!(fold("Recaudación Públicos"), "recaudacion publicos");
    }
}
