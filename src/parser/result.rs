use crate::models::{AnalysisPhase, Field, ParseStatus, PhaseRecord};

/// Outcome of parsing one oracle response against the phase protocol.
///
/// `Partial` carries both the best-effort record and the critical fields it
/// lacks, so the retry layer can name them in a correction prompt.
/// `Unparseable` keeps the raw text for evidence salvage downstream.
#[derive(Debug, Clone)]
pub enum ParseResult {
    Complete { record: PhaseRecord },
    Partial { record: PhaseRecord, missing: Vec<Field> },
    Unparseable { raw: String },
}

impl ParseResult {
    /// Classify a decoded record by its phase criticality rules.
    pub fn from_record(record: PhaseRecord) -> Self {
        let missing = record.validate();
        if missing.is_empty() {
            ParseResult::Complete { record }
        } else {
            ParseResult::Partial { record, missing }
        }
    }

    pub fn status(&self) -> ParseStatus {
        match self {
            ParseResult::Complete { .. } => ParseStatus::Complete,
            ParseResult::Partial { .. } => ParseStatus::Partial,
            ParseResult::Unparseable { .. } => ParseStatus::Unparseable,
        }
    }

    pub fn record(&self) -> Option<&PhaseRecord> {
        match self {
            ParseResult::Complete { record } | ParseResult::Partial { record, .. } => Some(record),
            ParseResult::Unparseable { .. } => None,
        }
    }

    /// The record to carry forward once retries are spent: the parsed one,
    /// or an empty placeholder for the phase when nothing decoded.
    pub fn into_record(self, phase: AnalysisPhase) -> PhaseRecord {
        match self {
            ParseResult::Complete { record } | ParseResult::Partial { record, .. } => record,
            ParseResult::Unparseable { .. } => PhaseRecord::empty(phase),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ParseResult::Complete { .. })
    }
}
