use std::fmt;

use crate::extract::Strategy;
use crate::sniffer::SniffedFormat;

/// One extraction strategy that was tried against a resource and what came of it
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub outcome: String,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.outcome)
    }
}

fn join_attempts(attempts: &[StrategyAttempt]) -> String {
    if attempts.is_empty() {
        return "none".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error("No table found in {format} resource (attempted: {})", join_attempts(.attempts))]
    NoTableFound {
        format: SniffedFormat,
        attempts: Vec<StrategyAttempt>,
    },

    #[error("No candidate matches sheet hint '{hint}' (available: {candidates:?})")]
    AmbiguousSelection {
        hint: String,
        candidates: Vec<String>,
    },

    #[error("Header row not found in '{origin}' within {scanned} rows (anchors: {anchors:?})")]
    HeaderNotFound {
        origin: String,
        scanned: usize,
        anchors: Vec<String>,
    },

    #[error("Unparseable number: '{0}'")]
    UnparseableNumber(String),

    #[error("Unparseable period: '{0}'")]
    UnparseablePeriod(String),

    #[error("Schema '{series}' does not match table: {detail} (columns: {columns:?})")]
    SchemaMismatch {
        series: String,
        detail: String,
        columns: Vec<String>,
    },
}

impl IngestError {
    /// Structural errors abort a whole resource; the rest are per-cell and
    /// only cost the row they occur in.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            IngestError::UnparseableNumber(_) | IngestError::UnparseablePeriod(_)
        )
    }
}
