// ⚠️ Error Taxonomy
// Row-scoped validation errors are absorbed by the normalizer; everything else
// aborts the run.

use crate::pipeline::PipelineStage;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ROW-SCOPED (recovered locally)
// ============================================================================

/// Why a raw row was dropped during normalization.
///
/// `row` is the 0-based index of the row inside the raw batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: unparseable date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: non-numeric amount '{value}'")]
    InvalidAmount { row: usize, value: String },

    #[error("row {row}: unknown transaction kind '{value}'")]
    InvalidKind { row: usize, value: String },
}

impl ValidationError {
    pub fn row(&self) -> usize {
        match self {
            ValidationError::MissingField { row, .. }
            | ValidationError::InvalidDate { row, .. }
            | ValidationError::InvalidAmount { row, .. }
            | ValidationError::InvalidKind { row, .. } => *row,
        }
    }

    /// Canonical field that failed
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField { field, .. } => field,
            ValidationError::InvalidDate { .. } => "date",
            ValidationError::InvalidAmount { .. } => "amount",
            ValidationError::InvalidKind { .. } => "kind",
        }
    }
}

// ============================================================================
// RUN-SCOPED (fatal)
// ============================================================================

/// Which dimension a natural key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Account,
    Category,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Account => write!(f, "account"),
            KeyKind::Category => write!(f, "category"),
        }
    }
}

/// A canonical row references a natural key absent from the reloaded maps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {kind} '{key}' has no surrogate id after resolution")]
pub struct ResolutionError {
    pub row: usize,
    pub kind: KeyKind,
    pub key: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read CSV record {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("input has no header row")]
    MissingHeader,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything that can terminate a run in the `Aborted` stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The store rejected a write or the commit itself failed; the run is rolled back
    #[error("transaction rolled back: {0}")]
    Transaction(#[from] rusqlite::Error),

    #[error("illegal stage transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
