//! # redb-backed Store Gateway
//!
//! A disk-backed store gateway using the redb embedded database,
//! providing ACID transactions and crash safety with zero configuration.
//!
//! Rows are postcard-encoded records keyed by identifier string:
//! - `blocks`: block id → [`BlockRecord`]
//! - `lineages`: lineage id → `Vec<LineageEntry>` (insertion order)
//! - `documents`: document id → [`DocumentRecord`]
//!
//! Similarity search scans the block table and ranks stored embeddings
//! against the query embedding; the store owns an embedding provider for
//! query vectors just like the in-memory backend.

use crate::block::BlockRecord;
use crate::document::DocumentRecord;
use crate::embedding::EmbeddingProvider;
use crate::store::{LineageEntry, SimilarityHit, StoreGateway, rank_by_distance};
use crate::types::{BlockId, DocumentId, LineageId, MnemonError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use tracing::debug;

/// Table for blocks: block id -> serialized BlockRecord bytes
const BLOCKS: TableDefinition<&str, &[u8]> = TableDefinition::new("blocks");

/// Table for lineage logs: lineage id -> serialized Vec<LineageEntry> bytes
const LINEAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("lineages");

/// Table for documents: document id -> serialized DocumentRecord bytes
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// A disk-backed store gateway using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Embedding provider for query vectors.
    embedder: Box<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(
        path: impl AsRef<Path>,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, MnemonError> {
        let db = Database::create(path.as_ref()).map_err(|e| MnemonError::Io(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| MnemonError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(BLOCKS)
                .map_err(|e| MnemonError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(LINEAGES)
                .map_err(|e| MnemonError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(DOCUMENTS)
                .map_err(|e| MnemonError::Io(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| MnemonError::Io(e.to_string()))?;
        }

        Ok(Self { db, embedder })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), MnemonError> {
        self.db
            .compact()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        Ok(())
    }

    /// Fetch and decode one row from a table.
    fn get_row<T: serde::de::DeserializeOwned>(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> Result<Option<T>, MnemonError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(table_def)
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        let Some(guard) = table
            .get(key)
            .map_err(|e| MnemonError::Io(e.to_string()))?
        else {
            return Ok(None);
        };
        let value = postcard::from_bytes::<T>(guard.value())
            .map_err(|e| MnemonError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    /// Encode and write one row into a table.
    fn put_row<T: serde::Serialize>(
        &mut self,
        table_def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        value: &T,
    ) -> Result<(), MnemonError> {
        let bytes =
            postcard::to_allocvec(value).map_err(|e| MnemonError::Serialization(e.to_string()))?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .map_err(|e| MnemonError::Io(e.to_string()))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| MnemonError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        Ok(())
    }

    /// Decode every block record in the store.
    fn all_blocks(&self) -> Result<Vec<BlockRecord>, MnemonError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(BLOCKS)
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(|e| MnemonError::Io(e.to_string()))? {
            let (_, value) = entry.map_err(|e| MnemonError::Io(e.to_string()))?;
            let record = postcard::from_bytes::<BlockRecord>(value.value())
                .map_err(|e| MnemonError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

impl StoreGateway for RedbStore {
    fn put_block(&mut self, record: &BlockRecord) -> Result<(), MnemonError> {
        self.put_row(BLOCKS, record.id.as_str(), record)?;
        debug!(block = %record.id, "block stored");
        Ok(())
    }

    fn block_by_id(&self, id: &BlockId) -> Result<Option<BlockRecord>, MnemonError> {
        self.get_row(BLOCKS, id.as_str())
    }

    fn similarity_search(
        &self,
        query: &str,
        candidates: Option<&[BlockId]>,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, MnemonError> {
        let query_embedding = self.embedder.embed_or_zero(query)?;
        let records = self.all_blocks()?;
        let hits = rank_by_distance(
            &query_embedding,
            records.iter(),
            candidates,
            max_distance,
            limit,
        );
        debug!(hits = hits.len(), "similarity search");
        Ok(hits)
    }

    fn append_lineage(
        &mut self,
        lineage: &LineageId,
        block: &BlockId,
        timestamp: f64,
    ) -> Result<(), MnemonError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(LINEAGES)
                .map_err(|e| MnemonError::Io(e.to_string()))?;

            // Read-modify-write within the same transaction.
            let mut entries: Vec<LineageEntry> = {
                let existing = table
                    .get(lineage.as_str())
                    .map_err(|e| MnemonError::Io(e.to_string()))?;
                match existing {
                    Some(guard) => postcard::from_bytes(guard.value())
                        .map_err(|e| MnemonError::Serialization(e.to_string()))?,
                    None => Vec::new(),
                }
            };
            entries.push(LineageEntry {
                block: block.clone(),
                computed_at: timestamp,
            });

            let bytes = postcard::to_allocvec(&entries)
                .map_err(|e| MnemonError::Serialization(e.to_string()))?;
            table
                .insert(lineage.as_str(), bytes.as_slice())
                .map_err(|e| MnemonError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| MnemonError::Io(e.to_string()))?;
        Ok(())
    }

    fn lineage_log(&self, lineage: &LineageId) -> Result<Vec<LineageEntry>, MnemonError> {
        Ok(self
            .get_row::<Vec<LineageEntry>>(LINEAGES, lineage.as_str())?
            .unwrap_or_default())
    }

    fn put_document(&mut self, record: &DocumentRecord) -> Result<(), MnemonError> {
        self.put_row(DOCUMENTS, record.id.as_str(), record)?;
        debug!(document = %record.id, "document stored");
        Ok(())
    }

    fn document_by_id(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, MnemonError> {
        self.get_row(DOCUMENTS, id.as_str())
    }
}

// =============================================================================
// TESTS
// =============================================================================
