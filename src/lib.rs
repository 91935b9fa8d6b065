// Finance ETL - Core Library
// Normalize → resolve keys → batch load, exposed for the CLI and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod resolver;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use db::{
    count_accounts, count_categories, count_dangling_references, count_transactions,
    get_all_transactions, load_accounts, load_categories, open_database, open_in_memory,
    setup_database,
};
pub use entities::{Account, Category, NewTransaction, Transaction, TransactionKind};
pub use error::{
    ConfigError, ExtractError, KeyKind, PipelineError, ResolutionError, ValidationError,
};
pub use extract::{CsvExtractor, Extractor, RawBatch};
pub use loader::BatchLoader;
pub use normalize::{CanonicalRow, Normalized, Normalizer};
pub use pipeline::{Pipeline, PipelineStage, RunReport};
pub use resolver::{DistinctKeys, KeyResolver, Resolution, ResolutionMaps};
