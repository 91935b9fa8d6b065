// 📦 Batch Loader - canonical rows + maps → fact inserts
//
// Every fact is built before the first insert, so a resolution failure never
// leaves a half-written batch behind. Chunking only bounds statement size; the
// caller's transaction is what makes the run atomic.

use crate::db;
use crate::entities::NewTransaction;
use crate::error::{ResolutionError, Result};
use crate::normalize::CanonicalRow;
use crate::resolver::ResolutionMaps;
use rusqlite::Connection;
use tracing::{debug, info};

pub struct BatchLoader {
    chunk_size: usize,
}

impl BatchLoader {
    /// A zero chunk size is treated as one row per statement
    pub fn new(chunk_size: usize) -> Self {
        BatchLoader {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Swap natural keys for surrogate ids. Fails on the first unresolved row.
    pub fn build_facts(
        &self,
        rows: &[CanonicalRow],
        maps: &ResolutionMaps,
    ) -> Result<Vec<NewTransaction>, ResolutionError> {
        rows.iter()
            .map(|row| {
                let (account_id, category_id) = maps.resolve_row(row)?;
                Ok(NewTransaction {
                    date: row.date,
                    description: row.description.clone(),
                    amount: row.amount.abs(),
                    kind: row.kind,
                    account_id,
                    category_id,
                })
            })
            .collect()
    }

    /// Insert facts chunk by chunk on `conn`. Returns the number of rows written.
    pub fn insert(&self, conn: &Connection, facts: &[NewTransaction]) -> Result<usize> {
        let mut inserted = 0;

        for (idx, chunk) in facts.chunks(self.chunk_size).enumerate() {
            inserted += db::insert_transactions(conn, chunk)?;
            debug!(chunk = idx, rows = chunk.len(), "inserted fact chunk");
        }

        info!(inserted, chunk_size = self.chunk_size, "loaded facts");
        Ok(inserted)
    }

    /// Build then insert
    pub fn load(
        &self,
        conn: &Connection,
        rows: &[CanonicalRow],
        maps: &ResolutionMaps,
    ) -> Result<usize> {
        let facts = self.build_facts(rows, maps)?;
        self.insert(conn, &facts)
    }
}
