/// Locale-tolerant numeric parsing.
///
/// Published tables mix `1.234,5` (source locale) with `1,234.5` (files
/// re-exported by English-language tooling), so the decimal separator is
/// inferred per value rather than fixed.
use crate::ingest_error::IngestError;
use crate::table::Cell;

/// Tokens that stand for "no data"; compared lowercase with spaces removed
const PLACEHOLDERS: [&str; 13] = [
    "", "-", "–", "—", "−", "n/d", "s/d", "n/a", "nd", "..", "...", "…", "*",
];

/// Longest first, so `u$s` is removed before `$`
const CURRENCY_TOKENS: [&str; 9] = ["u$s", "us$", "$u", "usd", "uyu", "$", "€", "£", "%"];

/// Parse a locale-formatted number.
///
/// Returns `Ok(None)` for blank and placeholder tokens, which are missing
/// values and never zero.
pub fn parse_number(raw: &str) -> Result<Option<f64>, IngestError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if PLACEHOLDERS.contains(&compact.as_str()) {
        return Ok(None);
    }

    let unparseable = || IngestError::UnparseableNumber(raw.trim().to_string());

    let mut s = compact;
    for token in CURRENCY_TOKENS {
        s = s.replace(token, "");
    }
    // `$ -` and the like; a bare currency sign is still an error
    if !s.is_empty() && PLACEHOLDERS.contains(&s.as_str()) {
        return Ok(None);
    }

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        s = inner.to_string();
    }
    if let Some(rest) = s.strip_prefix(['-', '−', '–']) {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    if !s.chars().any(|c| c.is_ascii_digit())
        || !s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return Err(unparseable());
    }

    let canonical = canonical_digits(&s).ok_or_else(unparseable)?;
    let value: f64 = canonical.parse().map_err(|_| unparseable())?;
    Ok(Some(if negative { -value } else { value }))
}

/// Parse a cell; spreadsheet numbers pass through untouched
pub fn number_from_cell(cell: &Cell) -> Result<Option<f64>, IngestError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) => Ok(Some(*n)),
        Cell::Text(s) => parse_number(s),
        Cell::Date(d) => Err(IngestError::UnparseableNumber(d.to_string())),
    }
}

/// Rewrite digits with `.`/`,` separators into a string `f64::from_str` accepts.
///
/// Both separators present: the rightmost is the decimal point. One kind
/// repeated: thousands. A lone comma: decimal. A lone dot followed by exactly
/// three digits after a non-zero integer part: thousands (`2.000`); any other
/// lone dot is decimal.
fn canonical_digits(s: &str) -> Option<String> {
    let dots = s.matches('.').count();
    let commas = s.matches(',').count();

    let (thousands, decimal) = match (dots, commas) {
        (0, 0) => return Some(s.to_string()),
        (_, 0) if dots > 1 => ('.', None),
        (0, _) if commas > 1 => (',', None),
        (0, 1) => (',', Some(',')),
        (1, 0) => {
            let (int_part, frac_part) = s.split_once('.')?;
            let looks_grouped =
                frac_part.len() == 3 && !int_part.is_empty() && !int_part.starts_with('0');
            if looks_grouped {
                ('.', None)
            } else {
                (',', Some('.'))
            }
        }
        _ => {
            let last_dot = s.rfind('.')?;
            let last_comma = s.rfind(',')?;
            if last_dot > last_comma {
                (',', Some('.'))
            } else {
                ('.', Some(','))
            }
        }
    };

    if let Some(decimal) = decimal {
        if s.matches(decimal).count() > 1 {
            return None;
        }
    }

    let out: String = s
        .chars()
        .filter(|&c| c != thousands || Some(c) == decimal)
        .map(|c| if Some(c) == decimal { '.' } else { c })
        .collect();
    Some(out)
}
