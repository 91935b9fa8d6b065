// 🔄 Pipeline - Extract → Normalize → Resolve keys → Load facts → Commit
//
// One run, one transaction, one commit point. A failure after the transaction
// opens drops it uncommitted and rusqlite rolls it back, so the store looks
// exactly as it did before the run.

use crate::config::PipelineConfig;
use crate::db;
use crate::error::{ConfigError, PipelineError, Result, ValidationError};
use crate::extract::Extractor;
use crate::loader::BatchLoader;
use crate::normalize::Normalizer;
use crate::resolver::KeyResolver;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Serialize, Serializer};
use tracing::{error, info, info_span};

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Extracting,
    Normalizing,
    ResolvingKeys,
    LoadingFacts,
    Committed,
    Aborted,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::ResolvingKeys => "resolving_keys",
            PipelineStage::LoadingFacts => "loading_facts",
            PipelineStage::Committed => "committed",
            PipelineStage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Committed | PipelineStage::Aborted)
    }

    /// Forward one step at a time, or abort from any non-terminal stage
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        match (self, next) {
            (Idle, Extracting)
            | (Extracting, Normalizing)
            | (Normalizing, ResolvingKeys)
            | (ResolvingKeys, LoadingFacts)
            | (LoadingFacts, Committed) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// Outcome of a committed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Raw rows seen
    pub processed: usize,
    /// Rows dropped by the normalizer
    pub skipped: usize,
    /// Facts committed
    pub loaded: usize,
    pub accounts_created: usize,
    pub categories_created: usize,
    /// Dimension cardinalities after commit
    pub accounts: i64,
    pub categories: i64,
    #[serde(serialize_with = "serialize_rejections")]
    pub rejected: Vec<ValidationError>,
}

fn serialize_rejections<S: Serializer>(
    rejected: &[ValidationError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(rejected.iter().map(|err| err.to_string()))
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rows processed, {} skipped, {} loaded | {} accounts (+{}), {} categories (+{})",
            self.processed,
            self.skipped,
            self.loaded,
            self.accounts,
            self.accounts_created,
            self.categories,
            self.categories_created
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// A single-use run. Build a new one for every batch.
pub struct Pipeline {
    config: PipelineConfig,
    stage: PipelineStage,
    history: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Pipeline {
            config,
            stage: PipelineStage::Idle,
            history: vec![PipelineStage::Idle],
        })
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Every stage entered so far, starting with `Idle`
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    fn advance(&mut self, next: PipelineStage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }

        info!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    fn abort(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = PipelineStage::Aborted;
            self.history.push(PipelineStage::Aborted);
        }
    }

    /// Run the whole pipeline against `conn`. On error the stage is `Aborted`
    /// and nothing from this run is visible in the store.
    pub fn run(&mut self, conn: &mut Connection, source: &dyn Extractor) -> Result<RunReport> {
        // A finished pipeline refuses to start again; nothing was attempted
        if self.stage.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: PipelineStage::Extracting,
            });
        }

        let span = info_span!("etl_run", source = %source.source_name());
        let _guard = span.enter();

        match self.execute(conn, source) {
            Ok(report) => Ok(report),
            Err(err) => {
                let failed_in = self.stage;
                self.abort();
                error!(stage = %failed_in, error = %err, "run aborted");
                Err(err)
            }
        }
    }

    fn execute(&mut self, conn: &mut Connection, source: &dyn Extractor) -> Result<RunReport> {
        self.advance(PipelineStage::Extracting)?;
        let batch = source.extract()?;
        info!(rows = batch.len(), columns = batch.headers.len(), "extracted batch");

        self.advance(PipelineStage::Normalizing)?;
        let normalized = Normalizer::new(&self.config).normalize(&batch);

        // IMMEDIATE takes the write lock up front so concurrent runs serialize
        // across the upsert → reload window
        self.advance(PipelineStage::ResolvingKeys)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let resolution = KeyResolver::new().resolve(&tx, &normalized.rows)?;

        self.advance(PipelineStage::LoadingFacts)?;
        let loader = BatchLoader::new(self.config.chunk_size);
        let loaded = loader.load(&tx, &normalized.rows, &resolution.maps)?;

        let accounts = db::count_accounts(&tx)?;
        let categories = db::count_categories(&tx)?;

        tx.commit()?;
        self.advance(PipelineStage::Committed)?;

        let report = RunReport {
            processed: normalized.processed(),
            skipped: normalized.skipped(),
            loaded,
            accounts_created: resolution.accounts_created,
            categories_created: resolution.categories_created,
            accounts,
            categories,
            rejected: normalized.rejected,
        };

        // Facts have no natural key; loading the same input again duplicates them
        info!(
            processed = report.processed,
            skipped = report.skipped,
            loaded = report.loaded,
            "run committed (facts are append-only and not deduplicated)"
        );

        Ok(report)
    }
}
