/// HTML table strategies.
///
/// `read_tables` walks the parsed DOM; `read_soup` is the loose fallback for
/// markup the DOM parser cannot place into a table (stray `<tr>` fragments,
/// or reports laid out inside `<pre>`).
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::resource::decode_text;
use crate::table::{collapse_whitespace, CandidateTable, Cell, Origin};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CAPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("caption").expect("valid selector"));

static SOUP_ROW_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<tr\b[^>]*>").expect("valid regex"));
static SOUP_ROW_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</tr\s*>").expect("valid regex"));
static SOUP_CELL_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<t[dh]\b[^>]*>").expect("valid regex"));
static SOUP_CELL_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</t[dh]\s*>").expect("valid regex"));
static SOUP_PRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").expect("valid regex"));

/// Upper bound on colspan expansion; anything larger is a layout artifact
const MAX_COLSPAN: usize = 64;

/// Every `<table>` in document order becomes one candidate
pub fn read_tables(bytes: &[u8]) -> Vec<CandidateTable> {
    let html = decode_text(bytes);
    let document = Html::parse_document(&html);

    let tables: Vec<CandidateTable> = document
        .select(&TABLE)
        .enumerate()
        .map(|(index, table)| {
            let origin = Origin {
                index,
                name: table_name(&table),
            };
            CandidateTable::from_grid(origin, table_grid(&table))
        })
        .collect();

    debug!("Structural HTML parse found {} table(s)", tables.len());
    tables
}

/// Loose scan for tabular patterns when the DOM yields no tables
pub fn read_soup(bytes: &[u8]) -> Vec<CandidateTable> {
    let html = decode_text(bytes);

    let grid: Vec<Vec<Cell>> = soup_blocks(&html, &SOUP_ROW_OPEN, &SOUP_ROW_CLOSE)
        .into_iter()
        .map(|row| {
            soup_blocks(row, &SOUP_CELL_OPEN, &SOUP_CELL_CLOSE)
                .into_iter()
                .map(|cell| Cell::text(&strip_markup(cell)))
                .collect()
        })
        .collect();

    if !grid.is_empty() {
        debug!("Markup soup scan found {} row fragment(s)", grid.len());
        let table = CandidateTable::from_grid(Origin { index: 0, name: None }, grid);
        return vec![table];
    }

    // Plain-text reports wrapped in <pre>: columns separated by runs of spaces
    SOUP_PRE
        .captures_iter(&html)
        .enumerate()
        .map(|(index, pre)| {
            let text = strip_markup(pre.get(1).map_or("", |m| m.as_str()));
            let grid = text
                .lines()
                .map(|line| COLUMN_GAP.split(line.trim()).map(Cell::text).collect())
                .collect();
            CandidateTable::from_grid(
                Origin {
                    index,
                    name: Some(format!("pre {index}")),
                },
                grid,
            )
        })
        .collect()
}

fn table_name(table: &ElementRef) -> Option<String> {
    let caption = table
        .select(&CAPTION)
        .next()
        .map(|c| collapse_whitespace(&c.text().collect::<Vec<_>>().join(" ")))
        .filter(|c| !c.is_empty());

    caption.or_else(|| {
        ["id", "summary"]
            .iter()
            .filter_map(|attr| table.value().attr(attr))
            .map(collapse_whitespace)
            .find(|v| !v.is_empty())
    })
}

fn table_grid(table: &ElementRef) -> Vec<Vec<Cell>> {
    table
        .select(&ROW)
        .filter(|row| {
            // Rows of a nested table belong to that table, not this one
            let owner = row
                .ancestors()
                .find(|node| {
                    node.value()
                        .as_element()
                        .is_some_and(|el| el.name() == "table")
                })
                .map(|node| node.id());
            owner == Some(table.id())
        })
        .map(|row| row_cells(&row))
        .collect()
}

/// Contents of every block opened by `open`, ending at `close`, at the next
/// `open`, or at the end of the input, whichever comes first. Sloppy exports
/// often omit closing tags.
fn soup_blocks<'a>(text: &'a str, open: &Regex, close: &Regex) -> Vec<&'a str> {
    let opens: Vec<(usize, usize)> = open.find_iter(text).map(|m| (m.start(), m.end())).collect();
    opens
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start))| {
            let limit = opens.get(i + 1).map_or(text.len(), |&(next, _)| next);
            let body = &text[body_start..limit];
            match close.find(body) {
                Some(m) => &body[..m.start()],
                None => body,
            }
        })
        .collect()
}

fn row_cells(row: &ElementRef) -> Vec<Cell> {
    let mut cells = Vec::new();
    for child in row.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        if name != "td" && name != "th" {
            continue;
        }
        // Separate text nodes so `<br>` breaks do not glue words together
        cells.push(Cell::text(&child.text().collect::<Vec<_>>().join(" ")));

        let span = child
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_COLSPAN);
        cells.extend(std::iter::repeat(Cell::Empty).take(span - 1));
    }
    cells
}

fn strip_markup(fragment: &str) -> String {
    let without_tags = TAG.replace_all(fragment, " ");
    decode_entities(&without_tags)
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&aacute;", "á")
        .replace("&eacute;", "é")
        .replace("&iacute;", "í")
        .replace("&oacute;", "ó")
        .replace("&uacute;", "ú")
        .replace("&ntilde;", "ñ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(table: &CandidateTable) -> Vec<Vec<String>> {
        table
            .rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.to_label()).collect())
            .collect()
    }

    #[test]
    fn test_read_tables_in_document_order() {
        let html = br#"
            <html><body>
            <table id="altas"><tr><th>Fecha</th><th>Total</th></tr><tr><td>ene-24</td><td>10</td></tr></table>
            <table><caption>Emisi&oacute;n</caption><tr><td>Fecha</td><td>Total</td></tr></table>
            </body></html>
        "#;
        let tables = read_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].origin.label(), "altas");
        assert_eq!(tables[1].origin.label(), "Emisión");
        assert_eq!(texts(&tables[0])[1], vec!["ene-24", "10"]);
    }

    #[test]
    fn test_nested_table_rows_stay_with_inner_table() {
        let html = br#"<table>
            <tr><td>outer</td><td><table><tr><td>inner</td></tr></table></td></tr>
        </table>"#;
        let tables = read_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(texts(&tables[1]), vec![vec!["inner"]]);
    }

    #[test]
    fn test_line_breaks_inside_cells_separate_words() {
        let html = br#"<table>
            <caption>Cuadro<br>II</caption>
            <tr><th>Fecha<br>de pago</th><th>Recaudaci&oacute;n<br>Privados</th></tr>
        </table>"#;
        let tables = read_tables(html);
        assert_eq!(tables[0].origin.label(), "Cuadro II");
        assert_eq!(texts(&tables[0])[0], vec!["Fecha de pago", "Recaudación Privados"]);
    }

    #[test]
    fn test_colspan_expands_with_blank_cells() {
        let html = br#"<table>
            <tr><td colspan="2">Altas</td><td>Bajas</td></tr>
            <tr><td>Montevideo</td><td>Interior</td><td>Total</td></tr>
        </table>"#;
        let tables = read_tables(html);
        let first = &tables[0].rows[0].cells;
        assert_eq!(first.len(), 3);
        assert_eq!(first[1], Cell::Empty);
        assert_eq!(first[2], Cell::Text("Bajas".to_string()));
    }

    #[test]
    fn test_soup_reads_stray_rows() {
        let html = b"<div><tr><td>Fecha<td>Total</tr><tr><td>ene-24</td><td>1.234,5</td></tr></div>";
        let tables = read_soup(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            texts(&tables[0]),
            vec![vec!["Fecha", "Total"], vec!["ene-24", "1.234,5"]]
        );
    }

    #[test]
    fn test_soup_reads_pre_blocks() {
        let html = b"<html><pre>\nFecha      Total\nene-24     1.234\n</pre></html>";
        let tables = read_soup(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            texts(&tables[0]),
            vec![vec!["Fecha", "Total"], vec!["ene-24", "1.234"]]
        );
    }
}
