// Table extraction: turns sniffed bytes into candidate tables.
//
// Each format maps to an ordered list of strategies. Strategies share one
// signature so they can be tried in order and tested on their own.

pub mod delimited;
pub mod html_table;
pub mod spreadsheet;

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::ingest_error::{IngestError, StrategyAttempt};
use crate::sniffer::SniffedFormat;
use crate::table::CandidateTable;

/// Error raised inside a single strategy; collected into `NoTableFound`
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Failed to read sheet '{sheet}': {msg}")]
    SheetRead { sheet: String, msg: String },

    #[error("Failed to read delimited text: {0}")]
    Delimited(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    LegacySpreadsheet,
    ModernSpreadsheet,
    HtmlTable,
    MarkupSoup,
    DelimitedText,
}

impl Strategy {
    /// Fallback order per sniffed format
    pub fn plan(format: SniffedFormat) -> &'static [Strategy] {
        match format {
            SniffedFormat::LegacySpreadsheet => {
                &[Strategy::LegacySpreadsheet, Strategy::ModernSpreadsheet]
            }
            SniffedFormat::ModernSpreadsheet => {
                &[Strategy::ModernSpreadsheet, Strategy::LegacySpreadsheet]
            }
            SniffedFormat::HtmlTable => &[Strategy::HtmlTable, Strategy::MarkupSoup],
            SniffedFormat::DelimitedText => &[Strategy::DelimitedText],
            SniffedFormat::Unknown => &[],
        }
    }

    pub fn run(self, bytes: &[u8]) -> Result<Vec<CandidateTable>, StrategyError> {
        match self {
            Strategy::LegacySpreadsheet => spreadsheet::read_legacy(bytes),
            Strategy::ModernSpreadsheet => spreadsheet::read_modern(bytes),
            Strategy::HtmlTable => Ok(html_table::read_tables(bytes)),
            Strategy::MarkupSoup => Ok(html_table::read_soup(bytes)),
            Strategy::DelimitedText => delimited::read_delimited(bytes),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LegacySpreadsheet => "legacy-spreadsheet",
            Strategy::ModernSpreadsheet => "modern-spreadsheet",
            Strategy::HtmlTable => "html-table",
            Strategy::MarkupSoup => "markup-soup",
            Strategy::DelimitedText => "delimited-text",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract every candidate table from a buffer of the given format.
///
/// Strategies run in plan order; the first one that yields at least one
/// non-empty table wins. When none does, the error lists every attempt.
#[instrument(skip(bytes), fields(size = bytes.len(), format = %format))]
pub fn extract(bytes: &[u8], format: SniffedFormat) -> Result<Vec<CandidateTable>, IngestError> {
    let mut attempts = Vec::new();

    for &strategy in Strategy::plan(format) {
        debug!("Trying extraction strategy {}", strategy);
        match strategy.run(bytes) {
            Ok(tables) => {
                let tables: Vec<CandidateTable> =
                    tables.into_iter().filter(|t| !t.is_empty()).collect();
                if tables.is_empty() {
                    debug!("Strategy {} produced no tables", strategy);
                    attempts.push(StrategyAttempt {
                        strategy,
                        outcome: "0 tables".to_string(),
                    });
                    continue;
                }
                if !attempts.is_empty() {
                    info!(
                        "Strategy {} succeeded after {} fallback(s)",
                        strategy,
                        attempts.len()
                    );
                }
                info!("Extracted {} candidate table(s) via {}", tables.len(), strategy);
                return Ok(tables);
            }
            Err(e) => {
                warn!("Strategy {} failed: {}", strategy, e);
                attempts.push(StrategyAttempt {
                    strategy,
                    outcome: e.to_string(),
                });
            }
        }
    }

    Err(IngestError::NoTableFound { format, attempts })
}
