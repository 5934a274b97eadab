//! # Documents
//!
//! A document aggregates blocks with set-like combination operators and a
//! semantic-aware insertion operator. A lineage appears at most once per
//! document at any instant, enforced by the smart insert, which merges
//! new information about an existing topic into the member that already
//! covers it instead of duplicating it.
//!
//! Documents keep an append-only operation log recording every
//! structural event with a full snapshot of the member-id set, so the
//! aggregate's own history stays reconstructable.

use crate::block::Block;
use crate::context::ComputeContext;
use crate::primitives::SMART_INSERT_MAX_DISTANCE;
use crate::store::{SimilarityHit, StoreGateway};
use crate::types::{BlockId, ComputeState, DocumentId, MnemonError, now_ts};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// =============================================================================
// OPERATION LOG
// =============================================================================

/// A structural event recorded in a document's operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocOp {
    /// Document created with an initial member set.
    Create,
    /// Plain insert of one block.
    Add,
    /// Semantic-dedup insert of one block.
    SmartAdd,
    /// Union of two documents.
    Sum,
    /// Difference of two documents.
    Sub,
}

impl fmt::Display for DocOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Add => "add",
            Self::SmartAdd => "smart_add",
            Self::Sum => "sum",
            Self::Sub => "sub",
        };
        f.write_str(s)
    }
}

/// One entry of the append-only operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocOperation {
    /// The structural event.
    pub op: DocOp,
    /// Blocks directly affected by the event (empty for create/sum/sub).
    pub affected: Vec<BlockId>,
    /// Full snapshot of the member-id set after the event.
    pub snapshot: Vec<BlockId>,
    /// Event timestamp, fractional epoch seconds.
    pub timestamp: f64,
    /// Parent documents for sum/sub provenance, flat (never nested).
    pub parent_docs: Vec<DocumentId>,
}

// =============================================================================
// PERSISTED RECORD
// =============================================================================

/// The persisted form of a document. Blocks are stored independently and
/// referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier.
    pub id: DocumentId,
    /// Ordered member block ids.
    pub block_ids: Vec<BlockId>,
    /// Append-only operation log.
    pub operations: Vec<DocOperation>,
    /// Lifecycle state at persistence time.
    pub state: ComputeState,
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// An aggregate of blocks with set combination and semantic-dedup
/// insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    blocks: Vec<Block>,
    block_ids: Vec<BlockId>,
    operations: Vec<DocOperation>,
    state: ComputeState,
}

impl Document {
    /// Create a document over an initial member list.
    #[must_use]
    pub fn new(blocks: Vec<Block>) -> Self {
        let block_ids: Vec<BlockId> = blocks.iter().map(|b| b.id().clone()).collect();
        let operations = vec![DocOperation {
            op: DocOp::Create,
            affected: Vec::new(),
            snapshot: block_ids.clone(),
            timestamp: now_ts(),
            parent_docs: Vec::new(),
        }];
        Self {
            id: DocumentId::generate(),
            blocks,
            block_ids,
            operations,
            state: ComputeState::Uncomputed,
        }
    }

    /// Create an empty document.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Hydrate a document from its persisted record, loading every
    /// member block from the store.
    pub fn from_record(
        record: DocumentRecord,
        store: &dyn StoreGateway,
    ) -> Result<Self, MnemonError> {
        let mut blocks = Vec::with_capacity(record.block_ids.len());
        for id in &record.block_ids {
            let block_record = store
                .block_by_id(id)?
                .ok_or_else(|| MnemonError::BlockNotFound(id.clone()))?;
            blocks.push(Block::from_record(block_record));
        }
        Ok(Self {
            id: record.id,
            blocks,
            block_ids: record.block_ids,
            operations: record.operations,
            state: record.state,
        })
    }

    /// Load a document by id. Absent documents are `Ok(None)`.
    pub fn load(
        store: &dyn StoreGateway,
        id: &DocumentId,
    ) -> Result<Option<Self>, MnemonError> {
        match store.document_by_id(id)? {
            Some(record) => Ok(Some(Self::from_record(record, store)?)),
            None => Ok(None),
        }
    }

    /// The persisted form of this document.
    #[must_use]
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id.clone(),
            block_ids: self.block_ids.clone(),
            operations: self.operations.clone(),
            state: self.state,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Document identifier.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Ordered member blocks.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Ordered member block ids.
    #[must_use]
    pub fn block_ids(&self) -> &[BlockId] {
        &self.block_ids
    }

    /// The append-only operation log.
    #[must_use]
    pub fn operations(&self) -> &[DocOperation] {
        &self.operations
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> ComputeState {
        self.state
    }

    /// Whether a block id is a member.
    #[must_use]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.block_ids.contains(id)
    }

    // =========================================================================
    // SET COMBINATION
    // =========================================================================

    /// Union: a new document with this document's members plus any member
    /// of `other` whose id is not already present.
    ///
    /// Provenance stays flat: an operand that is itself an unresolved sum
    /// contributes its recorded parent list instead of nesting.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let mut parent_docs = Vec::new();
        self.push_sum_provenance(&mut parent_docs);
        other.push_sum_provenance(&mut parent_docs);

        let own_ids = self.block_ids;
        let mut blocks = self.blocks;
        for block in other.blocks {
            if !own_ids.contains(block.id()) {
                blocks.push(block);
            }
        }

        let mut doc = Self::new(blocks);
        if let Some(first) = doc.operations.first_mut() {
            first.op = DocOp::Sum;
            first.parent_docs = parent_docs;
        }
        doc
    }

    fn push_sum_provenance(&self, out: &mut Vec<DocumentId>) {
        let unresolved_sum = self.state == ComputeState::Uncomputed
            && self
                .operations
                .last()
                .is_some_and(|entry| entry.op == DocOp::Sum);
        if unresolved_sum {
            if let Some(entry) = self.operations.last() {
                out.extend(entry.parent_docs.iter().cloned());
            }
        } else {
            out.push(self.id.clone());
        }
    }

    /// Difference: a new document with exactly this document's members
    /// whose id is absent from `other`.
    #[must_use]
    pub fn difference(self, other: &Self) -> Self {
        let own_id = self.id.clone();
        let kept: Vec<Block> = self
            .blocks
            .into_iter()
            .filter(|block| !other.block_ids.contains(block.id()))
            .collect();

        let mut doc = Self::new(kept);
        if let Some(first) = doc.operations.first_mut() {
            first.op = DocOp::Sub;
            first.parent_docs = vec![own_id, other.id.clone()];
        }
        doc
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Plain insert: append a block, refusing a duplicate id.
    pub fn insert(&mut self, block: Block) -> Result<(), MnemonError> {
        if self.contains(block.id()) {
            return Err(MnemonError::DuplicateBlock(block.id().clone()));
        }
        let id = block.id().clone();
        self.block_ids.push(id.clone());
        self.blocks.push(block);
        self.operations.push(DocOperation {
            op: DocOp::Add,
            affected: vec![id],
            snapshot: self.block_ids.clone(),
            timestamp: now_ts(),
            parent_docs: Vec::new(),
        });
        self.state = ComputeState::Uncomputed;
        Ok(())
    }

    /// Smart insert: merge the incoming block into its nearest semantic
    /// neighbor among the members, if one exists within the loose
    /// threshold; otherwise append it unchanged.
    ///
    /// Every member is forced to the computed state first so the search
    /// sees persisted embeddings. A match is replaced by a pending sum of
    /// the matched member and the incoming block; the actual textual
    /// merge is deferred to the next compute.
    pub fn insert_smart(
        &mut self,
        ctx: &mut ComputeContext<'_>,
        block: Block,
    ) -> Result<(), MnemonError> {
        if self.contains(block.id()) {
            return Err(MnemonError::DuplicateBlock(block.id().clone()));
        }

        let note = format!("computed before smart insert into {}", self.id);
        for member in &mut self.blocks {
            if !member.is_computed() {
                member.compute(ctx, &note)?;
            }
        }

        let hits = ctx.store.similarity_search(
            block.content(),
            Some(&self.block_ids),
            SMART_INSERT_MAX_DISTANCE,
            1,
        )?;

        let incoming = match hits.into_iter().next() {
            Some(hit) => {
                let matched_id = hit.record.id.clone();
                debug!(matched = %matched_id, distance = hit.distance, "smart insert merges into neighbor");
                self.blocks.retain(|member| member.id() != &matched_id);
                self.block_ids.retain(|id| id != &matched_id);
                Block::from_record(hit.record).merge(block)
            }
            None => block,
        };

        let id = incoming.id().clone();
        self.block_ids.push(id.clone());
        self.blocks.push(incoming);
        self.operations.push(DocOperation {
            op: DocOp::SmartAdd,
            affected: vec![id],
            snapshot: self.block_ids.clone(),
            timestamp: now_ts(),
            parent_docs: Vec::new(),
        });
        self.state = ComputeState::Uncomputed;
        Ok(())
    }

    // =========================================================================
    // COMPUTE & QUERIES
    // =========================================================================

    /// Force every member to the computed state, mark the document
    /// computed, and persist it.
    pub fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), MnemonError> {
        let note = format!("computed with document {}", self.id);
        for member in &mut self.blocks {
            if !member.is_computed() {
                member.compute(ctx, &note)?;
            }
        }
        self.state = ComputeState::Computed;
        ctx.store.put_document(&self.to_record())?;
        debug!(document = %self.id, members = self.blocks.len(), "document computed");
        Ok(())
    }

    /// Search members similar to the given block's content with an
    /// explicit (stricter-by-default) threshold.
    ///
    /// Both the query block and the document are computed first if
    /// necessary.
    pub fn search_similar(
        &mut self,
        ctx: &mut ComputeContext<'_>,
        block: &mut Block,
        max_distance: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityHit>, MnemonError> {
        if !block.is_computed() {
            block.compute(ctx, "computed for similarity query")?;
        }
        if self.state != ComputeState::Computed {
            self.compute(ctx)?;
        }
        ctx.store
            .similarity_search(block.content(), Some(&self.block_ids), max_distance, limit)
    }

    /// Render the members as `[id] content` lines, computing any pending
    /// member first.
    pub fn render(&mut self, ctx: &mut ComputeContext<'_>) -> Result<String, MnemonError> {
        let note = format!("computed to render document {}", self.id);
        let mut out = String::new();
        for member in &mut self.blocks {
            if !member.is_computed() {
                member.compute(ctx, &note)?;
            }
            out.push_str(&format!("[{}] {} \n", member.id(), member.content()));
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::store::MemoryStore;
    use crate::transform::LanguageModel;
    use std::collections::BTreeSet;

    /// Echo model: returns the payload under transformation unchanged.
    struct EchoModel;

    impl LanguageModel for EchoModel {
        fn complete(&self, prompt: &str) -> Result<String, MnemonError> {
            if prompt.contains("conflictual information") {
                return Ok("<OUTPUT>OK</OUTPUT>".to_string());
            }
            let payload = prompt
                .rsplit("**Text:**")
                .next()
                .and_then(|tail| tail.split("The output is:").next())
                .map(str::trim)
                .unwrap_or_default();
            Ok(format!("<OUTPUT>{payload}</OUTPUT>"))
        }
    }

    /// Topic-axis embedder: texts about the sky share one unit axis,
    /// everything else sits on the orthogonal axis. Same-topic distance
    /// is 0, cross-topic distance is 2 — deterministically on either
    /// side of the loose smart-insert threshold.
    struct TopicEmbedder;

    impl EmbeddingProvider for TopicEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, MnemonError> {
            if text.to_lowercase().contains("sky") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    fn computed_block(ctx: &mut ComputeContext<'_>, content: &str) -> Block {
        let mut block = Block::new(content);
        block.compute(ctx, "computed in test").expect("compute");
        block
    }

    #[test]
    fn insert_refuses_duplicate_id() {
        let mut doc = Document::empty();
        let block = Block::new("a fact");
        let clone = block.clone();
        doc.insert(block).expect("insert");
        let err = doc.insert(clone);
        assert!(matches!(err, Err(MnemonError::DuplicateBlock(_))));
    }

    #[test]
    fn insert_logs_snapshot() {
        let mut doc = Document::empty();
        doc.insert(Block::new("a")).expect("insert");
        doc.insert(Block::new("b")).expect("insert");

        let last = doc.operations().last().expect("log entry");
        assert_eq!(last.op, DocOp::Add);
        assert_eq!(last.snapshot.len(), 2);
        assert_eq!(last.snapshot, doc.block_ids());
    }

    #[test]
    fn merge_unions_block_ids() {
        let a1 = Block::new("a1");
        let shared = Block::new("shared");
        let shared_clone = shared.clone();
        let b1 = Block::new("b1");

        let left = Document::new(vec![a1, shared]);
        let right = Document::new(vec![shared_clone, b1]);

        let union = left.merge(right);
        assert_eq!(union.block_ids().len(), 3);
        let last = union.operations().last().expect("log entry");
        assert_eq!(last.op, DocOp::Sum);
        assert_eq!(last.parent_docs.len(), 2);
    }

    #[test]
    fn merge_is_commutative_on_id_sets() {
        let a = Block::new("a");
        let b = Block::new("b");
        let c = Block::new("c");

        let left = Document::new(vec![a.clone(), b.clone()]);
        let right = Document::new(vec![b, c]);
        let left2 = left.clone();
        let right2 = right.clone();

        let ab = left.merge(right);
        let ba = right2.merge(left2);
        let ids_ab: BTreeSet<&BlockId> = ab.block_ids().iter().collect();
        let ids_ba: BTreeSet<&BlockId> = ba.block_ids().iter().collect();
        assert_eq!(ids_ab, ids_ba);
    }

    #[test]
    fn merge_flattens_unresolved_sum_provenance() {
        let d1 = Document::new(vec![Block::new("1")]);
        let d2 = Document::new(vec![Block::new("2")]);
        let d3 = Document::new(vec![Block::new("3")]);
        let d1_id = d1.id().clone();
        let d2_id = d2.id().clone();
        let d3_id = d3.id().clone();

        let nested = d1.merge(d2).merge(d3);
        let last = nested.operations().last().expect("log entry");
        // Flat provenance: all three originals, no intermediate sum id.
        assert_eq!(last.parent_docs, vec![d1_id, d2_id, d3_id]);
    }

    #[test]
    fn difference_removes_shared_members() {
        let a = Block::new("a");
        let shared = Block::new("shared");
        let shared_clone = shared.clone();

        let left = Document::new(vec![a.clone(), shared]);
        let right = Document::new(vec![shared_clone]);

        let diff = left.difference(&right);
        assert_eq!(diff.block_ids(), &[a.id().clone()]);
        let last = diff.operations().last().expect("log entry");
        assert_eq!(last.op, DocOp::Sub);
        assert_eq!(last.parent_docs.len(), 2);
    }

    #[test]
    fn smart_insert_appends_when_no_neighbor_matches() {
        let mut store = MemoryStore::new(Box::new(TopicEmbedder));
        let model = EchoModel;
        let embedder = TopicEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let member = computed_block(&mut ctx, "The sky is blue today.");
        let mut doc = Document::new(vec![member]);

        let unrelated = Block::new("Trains run on steel rails.");
        let unrelated_id = unrelated.id().clone();
        doc.insert_smart(&mut ctx, unrelated).expect("smart insert");

        assert_eq!(doc.block_ids().len(), 2);
        assert!(doc.contains(&unrelated_id));
        let last = doc.operations().last().expect("log entry");
        assert_eq!(last.op, DocOp::SmartAdd);
    }

    #[test]
    fn smart_insert_replaces_neighbor_with_pending_sum() {
        let mut store = MemoryStore::new(Box::new(TopicEmbedder));
        let model = EchoModel;
        let embedder = TopicEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let member = computed_block(&mut ctx, "The sky is blue.");
        let member_id = member.id().clone();
        let mut doc = Document::new(vec![member]);

        let related = Block::new("The sky is blue. Water is wet.");
        let related_id = related.id().clone();
        doc.insert_smart(&mut ctx, related).expect("smart insert");

        // The neighbor is gone; a single pending sum replaced both.
        assert_eq!(doc.block_ids().len(), 1);
        assert!(!doc.contains(&member_id));
        assert!(!doc.contains(&related_id));
        let sum = &doc.blocks()[0];
        assert!(!sum.is_computed());
        assert_eq!(sum.op(), crate::types::ParentOp::Sum);
        assert_eq!(sum.parents().len(), 2);
    }

    #[test]
    fn search_similar_is_scoped_to_members() {
        let mut store = MemoryStore::new(Box::new(TopicEmbedder));
        let model = EchoModel;
        let embedder = TopicEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let on_topic = computed_block(&mut ctx, "The sky is blue.");
        let off_topic = computed_block(&mut ctx, "Trains run on rails.");
        // A block outside the document must never surface.
        let _outside = computed_block(&mut ctx, "The sky is clear.");

        let mut doc = Document::new(vec![on_topic.clone(), off_topic]);
        let mut query = Block::new("The sky looks grey today.");
        let hits = doc
            .search_similar(&mut ctx, &mut query, 1000.0, 10)
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(&hits[0].record.id, on_topic.id());
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn compute_persists_document() {
        let mut store = MemoryStore::new(Box::new(TopicEmbedder));
        let model = EchoModel;
        let embedder = TopicEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let mut doc = Document::new(vec![Block::new("a fact")]);
        doc.compute(&mut ctx).expect("compute");
        assert_eq!(doc.state(), ComputeState::Computed);
        assert!(doc.blocks().iter().all(Block::is_computed));

        let record = store
            .document_by_id(doc.id())
            .expect("lookup")
            .expect("present");
        assert_eq!(record.block_ids, doc.block_ids());

        let hydrated = Document::from_record(record, &store).expect("hydrate");
        assert_eq!(hydrated.block_ids(), doc.block_ids());
    }
}
