// 📂 Extract - tabular input for the pipeline
//
// Produces a loosely structured batch: whatever headers the source has, and
// every cell as text. Nothing here knows about the canonical schema.

use crate::error::ExtractError;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::PathBuf;

// ============================================================================
// RAW BATCH
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBatch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawBatch {
    /// Rows shorter than the header are padded with empty cells; longer rows keep
    /// their extra cells, which the normalizer ignores.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        RawBatch { headers, rows }
    }

    /// Build a batch from string slices, mostly for tests and embedding callers
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        RawBatch::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Anything that can hand the pipeline one bounded, in-memory batch
pub trait Extractor {
    fn extract(&self) -> Result<RawBatch, ExtractError>;

    /// Human-readable origin, for logs
    fn source_name(&self) -> String {
        "in-memory".to_string()
    }
}

impl Extractor for RawBatch {
    fn extract(&self) -> Result<RawBatch, ExtractError> {
        Ok(self.clone())
    }
}

/// Reads a delimited text file with a header row
pub struct CsvExtractor {
    path: PathBuf,
    delimiter: u8,
}

impl CsvExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvExtractor {
            path: path.into(),
            delimiter: b',',
        }
    }

    /// Non-ASCII delimiters fall back to a comma; config validation rejects them earlier.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = u8::try_from(delimiter).unwrap_or(b',');
        self
    }

    /// Parse from any reader; `extract` wraps this around the file
    pub fn read_from<R: std::io::Read>(&self, reader: R) -> Result<RawBatch, ExtractError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = rdr
            .byte_headers()
            .map_err(|source| ExtractError::Csv { line: 1, source })?
            .iter()
            .map(decode_cell)
            .collect::<Vec<_>>();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ExtractError::MissingHeader);
        }

        let mut rows = Vec::new();
        for result in rdr.byte_records() {
            let record = result.map_err(|source| ExtractError::Csv {
                line: source.position().map(|p| p.line()).unwrap_or(0),
                source,
            })?;
            rows.push(record.iter().map(decode_cell).collect());
        }

        Ok(RawBatch::new(headers, rows))
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to one code point)
fn decode_cell(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

impl Extractor for CsvExtractor {
    fn extract(&self) -> Result<RawBatch, ExtractError> {
        let file = File::open(&self.path).map_err(|source| ExtractError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.read_from(file)
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}
