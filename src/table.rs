use std::fmt;

use chrono::NaiveDate;

/// A raw cell as it came out of the source document
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Text cell with whitespace collapsed; blank text becomes `Empty`
    pub fn text(raw: &str) -> Self {
        let collapsed = collapse_whitespace(raw);
        if collapsed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(collapsed)
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display form used for header names and diagnostics
    pub fn to_label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => collapse_whitespace(s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_label())
    }
}

/// One non-blank row together with its 1-based position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub number: usize,
    pub cells: Vec<Cell>,
}

impl RawRow {
    /// Builds a row, trimming trailing blank cells.
    ///
    /// Returns `None` when every cell is blank.
    pub fn new(number: usize, mut cells: Vec<Cell>) -> Option<Self> {
        while cells.last().is_some_and(Cell::is_blank) {
            cells.pop();
        }
        if cells.is_empty() {
            None
        } else {
            Some(Self { number, cells })
        }
    }

    pub fn get(&self, col: usize) -> &Cell {
        self.cells.get(col).unwrap_or(&Cell::Empty)
    }

    pub fn non_blank_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_blank()).count()
    }
}

/// Where a candidate table came from: a sheet name or a position in the document
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub index: usize,
    pub name: Option<String>,
}

impl Origin {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("table {}", self.index),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One raw grid extracted from a resource, before selection
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    pub origin: Origin,
    pub rows: Vec<RawRow>,
}

impl CandidateTable {
    pub fn new(origin: Origin, rows: Vec<RawRow>) -> Self {
        Self { origin, rows }
    }

    /// Build a candidate from a dense grid, numbering rows from 1 and
    /// discarding blank ones
    pub fn from_grid(origin: Origin, grid: Vec<Vec<Cell>>) -> Self {
        let rows = grid
            .into_iter()
            .enumerate()
            .filter_map(|(i, cells)| RawRow::new(i + 1, cells))
            .collect();
        Self { origin, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
