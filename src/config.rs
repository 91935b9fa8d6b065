// ⚙️ Pipeline Configuration
// Defaults match day-first bank statements loaded into a single default account.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound keeps a multi-row INSERT under SQLite's bound-parameter limit
pub const MAX_CHUNK_SIZE: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Account used when a row has no account of its own
    pub default_account: String,

    /// chrono formats tried in order; date-only formats resolve to midnight
    pub date_formats: Vec<String>,

    /// Fact rows per INSERT statement
    pub chunk_size: usize,

    /// Field delimiter for CSV extraction
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            default_account: "Main".to_string(),
            date_formats: vec![
                "%d/%m/%Y %H:%M:%S".to_string(),
                "%d/%m/%Y %H:%M".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%d".to_string(),
            ],
            chunk_size: 1000,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_default_account(mut self, account: impl Into<String>) -> Self {
        self.default_account = account.into();
        self
    }

    pub fn with_date_formats(mut self, formats: Vec<String>) -> Self {
        self.date_formats = formats;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_account.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_account must not be empty".to_string(),
            ));
        }

        if self.date_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one date format is required".to_string(),
            ));
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }

        if !self.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }

        Ok(())
    }
}
