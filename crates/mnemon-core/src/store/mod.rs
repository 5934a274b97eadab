//! # Store Gateway
//!
//! The persistence and similarity-search boundary of the engine. The
//! engine consumes the [`StoreGateway`] trait; two implementations ship
//! with the crate:
//!
//! - [`MemoryStore`]: `BTreeMap`-backed, volatile, deterministic
//!   iteration order
//! - [`RedbStore`]: disk-backed rows in a redb database (see
//!   `redb_store`)
//!
//! Similarity search embeds the query text through the store's own
//! embedding provider and ranks stored blocks by squared Euclidean
//! distance, ascending. Candidate-id filtering restricts the search to a
//! named subset; omitting it searches the whole corpus.
//!
//! Absent lookups are `Ok(None)` / empty results, never errors; callers
//! decide existence semantics.

mod redb_store;

pub use redb_store::RedbStore;

use crate::block::BlockRecord;
use crate::document::DocumentRecord;
use crate::embedding::{EmbeddingProvider, squared_l2};
use crate::types::{BlockId, DocumentId, LineageId, MnemonError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// =============================================================================
// GATEWAY CONTRACT
// =============================================================================

/// One entry of a lineage log: a block that represented the lineage, and
/// when it was computed. Logs grow append-only in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    /// The block version.
    pub block: BlockId,
    /// Its computation timestamp.
    pub computed_at: f64,
}

/// One similarity-search hit, with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    /// Squared Euclidean distance to the query embedding, ascending.
    pub distance: f64,
    /// The matching block record.
    pub record: BlockRecord,
}

/// The store gateway contract consumed by the engine.
///
/// All stores round-trip `f64` timestamps and nested structured fields
/// (parent pointers, operation logs) losslessly.
pub trait StoreGateway {
    /// Persist a block record, overwriting any previous version.
    fn put_block(&mut self, record: &BlockRecord) -> Result<(), MnemonError>;

    /// Fetch a block by id. Absent blocks are `Ok(None)`.
    fn block_by_id(&self, id: &BlockId) -> Result<Option<BlockRecord>, MnemonError>;

    /// Rank stored blocks by distance to the query text, ascending.
    ///
    /// `candidates` restricts the search to the named block ids; `None`
    /// searches the whole corpus. Hits beyond `max_distance` are
    /// filtered; at most `limit` hits are returned.
    fn similarity_search(
        &self,
        query: &str,
        candidates: Option<&[BlockId]>,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, MnemonError>;

    /// Append one entry to a lineage log, creating the log if this is
    /// the lineage's first entry.
    fn append_lineage(
        &mut self,
        lineage: &LineageId,
        block: &BlockId,
        timestamp: f64,
    ) -> Result<(), MnemonError>;

    /// The full log of a lineage in insertion order. Unknown lineages
    /// yield an empty log.
    fn lineage_log(&self, lineage: &LineageId) -> Result<Vec<LineageEntry>, MnemonError>;

    /// The current tip of a lineage: the entry with the maximum
    /// timestamp, ties broken by the lexicographically greatest block id.
    fn lineage_tip(&self, lineage: &LineageId) -> Result<Option<BlockId>, MnemonError> {
        let log = self.lineage_log(lineage)?;
        Ok(log
            .into_iter()
            .max_by(|a, b| {
                a.computed_at
                    .total_cmp(&b.computed_at)
                    .then_with(|| a.block.cmp(&b.block))
            })
            .map(|entry| entry.block))
    }

    /// Persist a document record, overwriting any previous version.
    fn put_document(&mut self, record: &DocumentRecord) -> Result<(), MnemonError>;

    /// Fetch a document by id. Absent documents are `Ok(None)`.
    fn document_by_id(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, MnemonError>;
}

// =============================================================================
// SIMILARITY RANKING (shared by backends)
// =============================================================================

/// Rank an iterator of records against a query embedding.
///
/// Skips records whose embedding dimension does not match the query.
/// Ordering is (distance, block id) for determinism.
pub(crate) fn rank_by_distance<'a>(
    query: &[f32],
    records: impl Iterator<Item = &'a BlockRecord>,
    candidates: Option<&[BlockId]>,
    max_distance: f64,
    limit: usize,
) -> Vec<SimilarityHit> {
    let candidate_set: Option<BTreeSet<&BlockId>> =
        candidates.map(|ids| ids.iter().collect());
    let mut hits: Vec<SimilarityHit> = records
        .filter(|record| {
            candidate_set
                .as_ref()
                .is_none_or(|set| set.contains(&record.id))
        })
        .filter_map(|record| {
            let distance = squared_l2(query, &record.embedding)?;
            (distance <= max_distance).then(|| SimilarityHit {
                distance,
                record: record.clone(),
            })
        })
        .collect();
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits.truncate(limit);
    hits
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Volatile store gateway backed by `BTreeMap` tables.
///
/// Owns an embedding provider for query vectors, the same way the
/// persistent backend does. Iteration order is deterministic.
pub struct MemoryStore {
    embedder: Box<dyn EmbeddingProvider>,
    blocks: BTreeMap<BlockId, BlockRecord>,
    lineages: BTreeMap<LineageId, Vec<LineageEntry>>,
    documents: BTreeMap<DocumentId, DocumentRecord>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("blocks", &self.blocks.len())
            .field("lineages", &self.lineages.len())
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty store around the given embedding provider.
    #[must_use]
    pub fn new(embedder: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            blocks: BTreeMap::new(),
            lineages: BTreeMap::new(),
            documents: BTreeMap::new(),
        }
    }

    /// Number of stored blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of known lineages.
    #[must_use]
    pub fn lineage_count(&self) -> usize {
        self.lineages.len()
    }
}

impl StoreGateway for MemoryStore {
    fn put_block(&mut self, record: &BlockRecord) -> Result<(), MnemonError> {
        self.blocks.insert(record.id.clone(), record.clone());
        debug!(block = %record.id, "block stored");
        Ok(())
    }

    fn block_by_id(&self, id: &BlockId) -> Result<Option<BlockRecord>, MnemonError> {
        Ok(self.blocks.get(id).cloned())
    }

    fn similarity_search(
        &self,
        query: &str,
        candidates: Option<&[BlockId]>,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, MnemonError> {
        let query_embedding = self.embedder.embed_or_zero(query)?;
        let hits = rank_by_distance(
            &query_embedding,
            self.blocks.values(),
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
        self.lineages
            .entry(lineage.clone())
            .or_default()
            .push(LineageEntry {
                block: block.clone(),
                computed_at: timestamp,
            });
        Ok(())
    }

    fn lineage_log(&self, lineage: &LineageId) -> Result<Vec<LineageEntry>, MnemonError> {
        Ok(self.lineages.get(lineage).cloned().unwrap_or_default())
    }

    fn put_document(&mut self, record: &DocumentRecord) -> Result<(), MnemonError> {
        self.documents.insert(record.id.clone(), record.clone());
        debug!(document = %record.id, "document stored");
        Ok(())
    }

    fn document_by_id(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, MnemonError> {
        Ok(self.documents.get(id).cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================
