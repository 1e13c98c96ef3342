/// Month/period label parsing into a canonical year-month.
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::ingest_error::IngestError;
use crate::normalize::fold;
use crate::table::Cell;

static FOOTNOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(\([^)]*\)|\*+)\s*$").expect("valid footnote regex"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid iso regex"));
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})$").expect("valid dmy regex")
});
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})([/.\-])(\d{4}|\d{2})$").expect("valid m/y regex"));
static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})([/.\-])(\d{1,2})$").expect("valid y-m regex"));
static COMPACT_YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})$").expect("valid yyyymm regex"));
static BARE_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}$").expect("valid regex"));
static SERIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(\.\d+)?$").expect("valid serial regex"));
static TOKEN_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-/.,_']+").expect("valid token regex"));
static GLUED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]+)(\d{4}|\d{2})$").expect("valid glued regex"));

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Excel serials that can plausibly be a month in a published series
/// (roughly 1954 to 2119)
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20000.0..=80000.0;

const MONTHS: [(&str, u32); 31] = [
    ("enero", 1),
    ("ene", 1),
    ("jan", 1),
    ("febrero", 2),
    ("feb", 2),
    ("marzo", 3),
    ("mar", 3),
    ("abril", 4),
    ("abr", 4),
    ("apr", 4),
    ("mayo", 5),
    ("may", 5),
    ("junio", 6),
    ("jun", 6),
    ("julio", 7),
    ("jul", 7),
    ("agosto", 8),
    ("ago", 8),
    ("aug", 8),
    ("setiembre", 9),
    ("septiembre", 9),
    ("sept", 9),
    ("set", 9),
    ("sep", 9),
    ("octubre", 10),
    ("oct", 10),
    ("noviembre", 11),
    ("nov", 11),
    ("diciembre", 12),
    ("dic", 12),
    ("dec", 12),
];

const FILLER_WORDS: [&str; 2] = ["de", "del"];

/// Canonical period: a calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (MIN_YEAR..=MAX_YEAR).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Strict `YYYY-MM`, the form written to disk
impl FromStr for YearMonth {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IngestError::UnparseablePeriod(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        let year = year.parse().map_err(|_| err())?;
        let month = month.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

/// Excel serial day number to a date (1899-12-30 epoch, which absorbs
/// Excel's 1900 leap-year bug for every date after February 1900)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial as i64))
}

/// Parse a period label such as `Enero 2024`, `ene-24`, `02/2024`, `2024-03`
/// or `202403`.
///
/// `year_hint` completes labels that carry only a month (`marzo`, `3`).
pub fn parse_period(label: &str, year_hint: Option<i32>) -> Result<YearMonth, IngestError> {
    let err = || IngestError::UnparseablePeriod(label.trim().to_string());

    let folded = fold(label);
    let s = FOOTNOTE.replace(&folded, "");
    let s = s.trim();
    if s.is_empty() {
        return Err(err());
    }

    if let Some(caps) = ISO_DATE.captures(s) {
        return YearMonth::new(capture_num(&caps, 1)?, capture_num(&caps, 2)? as u32)
            .ok_or_else(err);
    }
    if let Some(caps) = DAY_MONTH_YEAR.captures(s) {
        let year = expand_year(&caps[3]).ok_or_else(err)?;
        return YearMonth::new(year, capture_num(&caps, 2)? as u32).ok_or_else(err);
    }
    // With a dot, `12.50` and `2024.5` are decimals, not periods
    if let Some(caps) = YEAR_MONTH.captures(s) {
        if &caps[2] == "." && caps[3].len() != 2 {
            return Err(err());
        }
        return YearMonth::new(capture_num(&caps, 1)?, capture_num(&caps, 3)? as u32)
            .ok_or_else(err);
    }
    if let Some(caps) = MONTH_YEAR.captures(s) {
        if &caps[2] == "." && caps[3].len() != 4 {
            return Err(err());
        }
        let year = expand_year(&caps[3]).ok_or_else(err)?;
        return YearMonth::new(year, capture_num(&caps, 1)? as u32).ok_or_else(err);
    }
    if let Some(caps) = COMPACT_YEAR_MONTH.captures(s) {
        return YearMonth::new(capture_num(&caps, 1)?, capture_num(&caps, 2)? as u32)
            .ok_or_else(err);
    }
    if SERIAL.is_match(s) {
        let serial: f64 = s.parse().map_err(|_| err())?;
        return excel_serial_to_date(serial)
            .and_then(YearMonth::from_date)
            .ok_or_else(err);
    }
    if BARE_MONTH.is_match(s) {
        let month: u32 = s.parse().map_err(|_| err())?;
        return year_hint
            .and_then(|year| YearMonth::new(year, month))
            .ok_or_else(err);
    }

    parse_words(s, year_hint).ok_or_else(err)
}

/// Period from a raw cell; spreadsheet dates and serials are accepted as-is
pub fn period_from_cell(cell: &Cell, year_hint: Option<i32>) -> Result<YearMonth, IngestError> {
    match cell {
        Cell::Date(date) => {
            YearMonth::from_date(*date).ok_or_else(|| IngestError::UnparseablePeriod(date.to_string()))
        }
        Cell::Number(n) => period_from_number(*n, year_hint)
            .ok_or_else(|| IngestError::UnparseablePeriod(cell.to_label())),
        Cell::Text(s) => parse_period(s, year_hint),
        Cell::Empty => Err(IngestError::UnparseablePeriod(String::new())),
    }
}

/// A cell holding only a year (`2024`, `Año 2024`, `2024 (*)`), which in the
/// institution's layouts opens a block of month-only rows
pub fn year_marker(cell: &Cell) -> Option<i32> {
    let year = match cell {
        Cell::Number(n) if n.fract() == 0.0 => *n as i32,
        Cell::Text(s) => {
            let folded = fold(s);
            let stripped = FOOTNOTE.replace(&folded, "");
            let stripped = stripped.trim();
            let digits = stripped
                .strip_prefix("ano")
                .or_else(|| stripped.strip_prefix("anio"))
                .unwrap_or(stripped)
                .trim();
            if digits.len() != 4 {
                return None;
            }
            digits.parse().ok()?
        }
        _ => return None,
    };
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

fn period_from_number(n: f64, year_hint: Option<i32>) -> Option<YearMonth> {
    if n.fract() == 0.0 && (1.0..=12.0).contains(&n) {
        return YearMonth::new(year_hint?, n as u32);
    }
    if n.fract() == 0.0 && (190001.0..=210012.0).contains(&n) {
        let n = n as i64;
        return YearMonth::new((n / 100) as i32, (n % 100) as u32);
    }
    if SERIAL_RANGE.contains(&n) {
        return excel_serial_to_date(n).and_then(YearMonth::from_date);
    }
    None
}

/// Word form: a month name plus optional year, e.g. `enero de 2024`, `ene24`
fn parse_words(s: &str, year_hint: Option<i32>) -> Option<YearMonth> {
    let mut month = None;
    let mut year = None;

    for token in TOKEN_SPLIT.split(s).filter(|t| !t.is_empty()) {
        if FILLER_WORDS.contains(&token) {
            continue;
        }
        let (word, glued_year) = match GLUED.captures(token) {
            Some(caps) => (caps.get(1)?.as_str(), Some(caps.get(2)?.as_str())),
            None => (token, None),
        };

        if let Some(m) = month_number(word) {
            if month.replace(m).is_some() {
                return None;
            }
            if let Some(y) = glued_year {
                year = Some(expand_year(y)?);
            }
        } else if word.chars().all(|c| c.is_ascii_digit()) && matches!(word.len(), 2 | 4) {
            if year.replace(expand_year(word)?).is_some() {
                return None;
            }
        } else {
            return None;
        }
    }

    YearMonth::new(year.or(year_hint)?, month?)
}

fn month_number(word: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, number)| *number)
}

/// Two-digit years: below 70 is 20YY, otherwise 19YY
fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    match digits.len() {
        4 => Some(value),
        2 if value < 70 => Some(2000 + value),
        2 => Some(1900 + value),
        _ => None,
    }
}

fn capture_num(caps: &regex::Captures, group: usize) -> Result<i32, IngestError> {
    caps.get(group)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| IngestError::UnparseablePeriod(caps[0].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_all_forms_of_the_same_month_agree() {
        let expected = ym(2024, 3);
        for label in [
            "Marzo 2024",
            "marzo-2024",
            "MAR-24",
            "mar.24",
            "03/2024",
            "3/24",
            "2024-03",
            "202403",
            "2024-03-01",
            "01/03/2024",
            "marzo de 2024",
            "Mar24",
        ] {
            assert_eq!(parse_period(label, None).unwrap(), expected, "label {label:?}");
        }
        assert_eq!(parse_period("marzo", Some(2024)).unwrap(), expected);
        assert_eq!(parse_period("3", Some(2024)).unwrap(), expected);
    }

    #[test]
    fn test_accents_and_september_variants() {
        assert_eq!(parse_period("Setiembre 2023", None).unwrap(), ym(2023, 9));
        assert_eq!(parse_period("sept-23", None).unwrap(), ym(2023, 9));
        assert_eq!(parse_period("set/2023", None).unwrap(), ym(2023, 9));
        assert_eq!(parse_period("SEPTIEMBRE 2023", None).unwrap(), ym(2023, 9));
    }

    #[test]
    fn test_footnote_markers_ignored() {
        assert_eq!(parse_period("Dic-23 (*)", None).unwrap(), ym(2023, 12));
        assert_eq!(parse_period("ene-24*", None).unwrap(), ym(2024, 1));
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(parse_period("ene-69", None).unwrap(), ym(2069, 1));
        assert_eq!(parse_period("ene-70", None).unwrap(), ym(1970, 1));
    }

    #[test]
    fn test_unrecognized_tokens_fail() {
        for label in ["Total", "Promedio 2023", "Fuente: BPS", "13/2024", "marzo", ""] {
            assert!(
                matches!(parse_period(label, None), Err(IngestError::UnparseablePeriod(_))),
                "label {label:?}"
            );
        }
    }

    #[test]
    fn test_decimal_measures_are_not_periods() {
        for label in ["12.50", "3.25", "2024.5", "1999.125"] {
            assert!(
                matches!(parse_period(label, None), Err(IngestError::UnparseablePeriod(_))),
                "label {label:?}"
            );
        }
        assert_eq!(parse_period("03.2024", None).unwrap(), ym(2024, 3));
        assert_eq!(parse_period("2024.03", None).unwrap(), ym(2024, 3));
    }

    #[test]
    fn test_excel_serial_text() {
        // 45292 is 2024-01-01
        assert_eq!(parse_period("45292", None).unwrap(), ym(2024, 1));
    }

    #[test]
    fn test_period_from_cells() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(period_from_cell(&Cell::Date(date), None).unwrap(), ym(2024, 2));
        assert_eq!(period_from_cell(&Cell::Number(45292.0), None).unwrap(), ym(2024, 1));
        assert_eq!(period_from_cell(&Cell::Number(202405.0), None).unwrap(), ym(2024, 5));
        assert_eq!(period_from_cell(&Cell::Number(7.0), Some(2022)).unwrap(), ym(2022, 7));
        assert!(period_from_cell(&Cell::Number(7.0), None).is_err());
        assert!(period_from_cell(&Cell::Empty, Some(2022)).is_err());
    }

    #[test]
    fn test_year_marker() {
        assert_eq!(year_marker(&Cell::Number(2024.0)), Some(2024));
        assert_eq!(year_marker(&Cell::Text("Año 2023".into())), Some(2023));
        assert_eq!(year_marker(&Cell::Text("2022 (*)".into())), Some(2022));
        assert_eq!(year_marker(&Cell::Text("ene-24".into())), None);
        assert_eq!(year_marker(&Cell::Number(45292.0)), None);
    }

    #[test]
    fn test_display_and_from_str() {
        assert_eq!(ym(2024, 1).to_string(), "2024-01");
        assert_eq!("2024-01".parse::<YearMonth>().unwrap(), ym(2024, 1));
        assert!("2024-1".parse::<YearMonth>().is_err());
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!(ym(2023, 12) < ym(2024, 1));
    }
}
