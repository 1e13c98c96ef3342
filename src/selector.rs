//! Sheet/table selection.
//!
//! Policy, in order:
//! 1. caller hint (name, case-insensitive, or 0-based position)
//! 2. schema keyword tiers against the candidate label, highest tier first
//! 3. first candidate whose leading rows contain a header anchor
//! 4. first candidate
//!
//! Ties inside a tier resolve to extraction order, so the choice is fully
//! determined by candidate labels, order and content.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::header::find_header_row;
use crate::ingest_error::IngestError;
use crate::normalize::fold;
use crate::schema::SeriesSchema;
use crate::table::CandidateTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetHint {
    Name(String),
    Position(usize),
}

impl SheetHint {
    /// Purely numeric arguments are positions, anything else is a name
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<usize>() {
            Ok(position) if trimmed.chars().all(|c| c.is_ascii_digit()) => {
                SheetHint::Position(position)
            }
            _ => SheetHint::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for SheetHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetHint::Name(name) => f.write_str(name),
            SheetHint::Position(position) => write!(f, "#{position}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub hint: Option<SheetHint>,
    /// Fail instead of falling back when the hint matches nothing
    pub require_hint_match: bool,
}

/// Why a candidate won
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    Hint,
    Keyword(&'static str),
    ContentSignature,
    FirstCandidate,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::Hint => f.write_str("hint"),
            SelectionReason::Keyword(keyword) => write!(f, "keyword '{keyword}'"),
            SelectionReason::ContentSignature => f.write_str("header anchor"),
            SelectionReason::FirstCandidate => f.write_str("first candidate"),
        }
    }
}

/// The candidate the selector settled on
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTable {
    pub table: CandidateTable,
    pub reason: SelectionReason,
}

#[instrument(skip_all, fields(candidates = candidates.len(), series = schema.id))]
pub fn select(
    candidates: Vec<CandidateTable>,
    policy: &SelectionPolicy,
    schema: &SeriesSchema,
) -> Result<SelectedTable, IngestError> {
    let labels: Vec<String> = candidates.iter().map(|c| c.origin.label()).collect();
    debug!("Selecting among {:?}", labels);

    let (position, reason) = match choose(&candidates, &labels, policy, schema) {
        Some(choice) => choice,
        None => {
            return Err(IngestError::AmbiguousSelection {
                hint: policy
                    .hint
                    .as_ref()
                    .map_or_else(|| "(none)".to_string(), |h| h.to_string()),
                candidates: labels,
            })
        }
    };

    info!("Selected '{}' by {}", labels[position], reason);
    let table = candidates
        .into_iter()
        .nth(position)
        .ok_or_else(|| IngestError::AmbiguousSelection {
            hint: position.to_string(),
            candidates: labels.clone(),
        })?;
    Ok(SelectedTable { table, reason })
}

fn choose(
    candidates: &[CandidateTable],
    labels: &[String],
    policy: &SelectionPolicy,
    schema: &SeriesSchema,
) -> Option<(usize, SelectionReason)> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(hint) = &policy.hint {
        match match_hint(hint, labels) {
            Some(position) => return Some((position, SelectionReason::Hint)),
            None if policy.require_hint_match => return None,
            None => warn!(
                "Hint '{}' matches none of {:?}; falling back to keyword policy",
                hint, labels
            ),
        }
    }

    let folded: Vec<String> = labels.iter().map(|l| fold(l)).collect();
    for &keyword in schema.selection_keywords {
        if let Some(position) = folded.iter().position(|label| label.contains(keyword)) {
            return Some((position, SelectionReason::Keyword(keyword)));
        }
    }

    if let Some(position) = candidates
        .iter()
        .position(|c| find_header_row(c, schema.anchor_labels).is_some())
    {
        return Some((position, SelectionReason::ContentSignature));
    }

    Some((0, SelectionReason::FirstCandidate))
}

fn match_hint(hint: &SheetHint, labels: &[String]) -> Option<usize> {
    match hint {
        SheetHint::Name(name) => {
            let wanted = name.trim().to_lowercase();
            labels
                .iter()
                .position(|label| label.trim().to_lowercase() == wanted)
        }
        SheetHint::Position(position) => {
            // A sheet literally named "2" beats the third sheet
            let as_name = position.to_string();
            labels
                .iter()
                .position(|label| label.trim() == as_name)
                .or_else(|| (*position < labels.len()).then_some(*position))
        }
    }
}
