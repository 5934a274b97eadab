//! # Knowledge Blocks
//!
//! The atomic versioned unit of the engine. A block owns a lazy
//! computation describing how its content derives from zero, one, or
//! several parent blocks:
//!
//! - `create`: raw text starting a new lineage
//! - `edit`: new text superseding a lineage predecessor
//! - `sum`: a merge of two or more parents, delegated to the rewrite
//!   transform with parents ordered earliest-computed first
//! - `sub`: a subtractive diff of exactly two parents
//!
//! Blocks are immutable once computed. `compute` is the only mutation:
//! it resolves content, collapses every parent reference to a pointer,
//! stamps timestamps, and persists the block plus one lineage-log entry.
//! Pending ancestors are settled with an explicit descend loop rather
//! than native recursion, so ancestry depth never threatens the stack.

use crate::context::ComputeContext;
use crate::primitives::{DEFAULT_EMBEDDING_DIM, SUM_JOIN_SEPARATOR};
use crate::store::StoreGateway;
use crate::types::{
    BlockId, BlockPointer, ComputeState, LineageId, MnemonError, ParentOp, now_ts,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// PARENT REFERENCES
// =============================================================================

/// A reference to a parent block.
///
/// Before computation a parent may be a live uncomputed block owned by
/// this reference; once the parent is computed the reference collapses
/// to the pointer form. The transition is one-way: after `compute`,
/// every parent of a block is `Resolved`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentRef {
    /// An owned, not-yet-computed parent block.
    Pending(Box<Block>),
    /// A resolved pointer to a computed, persisted parent.
    Resolved(BlockPointer),
}

impl ParentRef {
    /// Whether this reference still owns a live uncomputed block.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The pointer form, if resolved.
    #[must_use]
    pub fn pointer(&self) -> Option<&BlockPointer> {
        match self {
            Self::Resolved(p) => Some(p),
            Self::Pending(_) => None,
        }
    }
}

// =============================================================================
// PERSISTED RECORD
// =============================================================================

/// The persisted form of a computed block.
///
/// Every field round-trips losslessly through the store, including the
/// `f64` timestamps and the nested parent-pointer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block identifier.
    pub id: BlockId,
    /// Lineage this block belongs to.
    pub lineage: LineageId,
    /// Resolved text body. Empty is valid.
    pub content: String,
    /// Raw transform output retained for audit, when a transform ran.
    pub content_raw: Option<String>,
    /// Embedding of `content`.
    pub embedding: Vec<f32>,
    /// Derivation operation.
    pub op: ParentOp,
    /// Resolved parent pointers.
    pub parents: Vec<BlockPointer>,
    /// Lifecycle state at persistence time (always computed in practice).
    pub state: ComputeState,
    /// Creation timestamp, fractional epoch seconds.
    pub created_at: f64,
    /// Computation timestamp, fractional epoch seconds.
    pub computed_at: Option<f64>,
    /// Free-text annotation describing why/when compute ran.
    pub compute_note: Option<String>,
}

// =============================================================================
// BLOCK
// =============================================================================

/// A content-bearing version node of the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: BlockId,
    lineage: LineageId,
    content: String,
    content_raw: Option<String>,
    embedding: Vec<f32>,
    op: ParentOp,
    parents: Vec<ParentRef>,
    state: ComputeState,
    created_at: f64,
    computed_at: Option<f64>,
    compute_note: Option<String>,
}

impl Block {
    /// Create a new uncomputed block from raw text, starting a fresh
    /// lineage.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: BlockId::generate(),
            lineage: LineageId::generate(),
            content: content.into(),
            content_raw: None,
            embedding: vec![0.0; DEFAULT_EMBEDDING_DIM],
            op: ParentOp::Create,
            parents: Vec::new(),
            state: ComputeState::Uncomputed,
            created_at: now_ts(),
            computed_at: None,
            compute_note: None,
        }
    }

    /// Internal constructor for derived blocks (edit/sum/sub/rebase).
    fn derived(lineage: LineageId, op: ParentOp, parents: Vec<ParentRef>) -> Self {
        Self {
            id: BlockId::generate(),
            lineage,
            content: String::new(),
            content_raw: None,
            embedding: vec![0.0; DEFAULT_EMBEDDING_DIM],
            op,
            parents,
            state: ComputeState::Uncomputed,
            created_at: now_ts(),
            computed_at: None,
            compute_note: None,
        }
    }

    /// Reconstruct a derived block with an explicit resolved parent set.
    ///
    /// Used by recompute to re-thread a superseded ancestry onto current
    /// lineage tips.
    #[must_use]
    pub fn rethreaded(lineage: LineageId, op: ParentOp, parents: Vec<BlockPointer>) -> Self {
        Self::derived(lineage, op, parents.into_iter().map(ParentRef::Resolved).collect())
    }

    /// Hydrate a block from its persisted record.
    #[must_use]
    pub fn from_record(record: BlockRecord) -> Self {
        Self {
            id: record.id,
            lineage: record.lineage,
            content: record.content,
            content_raw: record.content_raw,
            embedding: record.embedding,
            op: record.op,
            parents: record.parents.into_iter().map(ParentRef::Resolved).collect(),
            state: record.state,
            created_at: record.created_at,
            computed_at: record.computed_at,
            compute_note: record.compute_note,
        }
    }

    /// The persisted form of this block.
    #[must_use]
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            id: self.id.clone(),
            lineage: self.lineage.clone(),
            content: self.content.clone(),
            content_raw: self.content_raw.clone(),
            embedding: self.embedding.clone(),
            op: self.op,
            parents: self
                .parents
                .iter()
                .filter_map(|p| p.pointer().cloned())
                .collect(),
            state: self.state,
            created_at: self.created_at,
            computed_at: self.computed_at,
            compute_note: self.compute_note.clone(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Block identifier.
    #[must_use]
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Lineage identifier.
    #[must_use]
    pub fn lineage(&self) -> &LineageId {
        &self.lineage
    }

    /// Current text body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Derivation operation.
    #[must_use]
    pub fn op(&self) -> ParentOp {
        self.op
    }

    /// Parent references.
    #[must_use]
    pub fn parents(&self) -> &[ParentRef] {
        &self.parents
    }

    /// Embedding of the current content.
    #[must_use]
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> ComputeState {
        self.state
    }

    /// Whether the block has reached the terminal computed state.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.state == ComputeState::Computed
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// Computation timestamp, absent while uncomputed.
    #[must_use]
    pub fn computed_at(&self) -> Option<f64> {
        self.computed_at
    }

    /// Compute annotation, absent while uncomputed.
    #[must_use]
    pub fn compute_note(&self) -> Option<&str> {
        self.compute_note.as_deref()
    }

    /// Pointer form of this block (valid once computed).
    #[must_use]
    pub fn pointer(&self) -> BlockPointer {
        BlockPointer {
            lineage: self.lineage.clone(),
            block: self.id.clone(),
        }
    }

    // =========================================================================
    // COMBINATORS
    // =========================================================================

    /// Derive an edit: a new uncomputed block with this block's lineage
    /// and fresh content, superseding it once computed.
    ///
    /// Computes the receiver first if necessary, so the lineage log has
    /// an entry to supersede.
    pub fn edit(
        &mut self,
        ctx: &mut ComputeContext<'_>,
        new_content: impl Into<String>,
    ) -> Result<Self, MnemonError> {
        if !self.is_computed() {
            self.compute(ctx, "computed before edit")?;
        }
        let mut block = Self::derived(self.lineage.clone(), ParentOp::Edit, Vec::new());
        block.content = new_content.into();
        Ok(block)
    }

    /// Derive the merge (`sum`) of this block and another.
    ///
    /// Computed operands enter as pointers; an uncomputed operand that is
    /// itself a pending sum is flattened into the parent list rather than
    /// nested, keeping merge provenance flat.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let mut parents = Vec::new();
        self.push_sum_operand(&mut parents);
        other.push_sum_operand(&mut parents);
        Self::derived(LineageId::generate(), ParentOp::Sum, parents)
    }

    fn push_sum_operand(self, parents: &mut Vec<ParentRef>) {
        if self.is_computed() {
            parents.push(ParentRef::Resolved(self.pointer()));
        } else if self.op == ParentOp::Sum {
            parents.extend(self.parents);
        } else {
            parents.push(ParentRef::Pending(Box::new(self)));
        }
    }

    /// Derive the subtractive diff (`sub`): this block's content minus
    /// anything already present in `other`.
    #[must_use]
    pub fn difference(self, other: Self) -> Self {
        let parents = vec![Self::into_parent_ref(self), Self::into_parent_ref(other)];
        Self::derived(LineageId::generate(), ParentOp::Sub, parents)
    }

    fn into_parent_ref(block: Self) -> ParentRef {
        if block.is_computed() {
            ParentRef::Resolved(block.pointer())
        } else {
            ParentRef::Pending(Box::new(block))
        }
    }

    // =========================================================================
    // COMPUTE
    // =========================================================================

    /// Resolve this block's content, settle its pending ancestors, and
    /// persist the result.
    ///
    /// Fails with [`MnemonError::AlreadyComputed`] when invoked on a
    /// computed block. Exactly one block write and one lineage-log append
    /// happen per computed block, on the terminal transition only.
    pub fn compute(&mut self, ctx: &mut ComputeContext<'_>, note: &str) -> Result<(), MnemonError> {
        if self.is_computed() {
            return Err(MnemonError::AlreadyComputed(self.id.clone()));
        }

        // Settle pending ancestors deepest-first. Each settled ancestor
        // collapses to a pointer in its owner's parent list, so the
        // descend loop shrinks monotonically.
        while let Some((owner, owner_op, slot)) =
            next_ready_slot(&mut self.parents, &self.id, self.op)
        {
            let derived_note = format!("computed as parent of {owner}, operation {owner_op}");
            let pointer = match slot {
                ParentRef::Pending(block) => {
                    block.compute_settled(ctx, &derived_note)?;
                    block.pointer()
                }
                ParentRef::Resolved(_) => break,
            };
            *slot = ParentRef::Resolved(pointer);
        }

        self.compute_settled(ctx, note)
    }

    /// Compute a block whose parents are all resolved pointers.
    fn compute_settled(
        &mut self,
        ctx: &mut ComputeContext<'_>,
        note: &str,
    ) -> Result<(), MnemonError> {
        if self.is_computed() {
            return Err(MnemonError::AlreadyComputed(self.id.clone()));
        }

        match self.op {
            ParentOp::Create => {
                // Content taken as given; a create never has parents.
                self.parents.clear();
            }
            ParentOp::Edit => {
                // An edit supersedes through the lineage log, not through
                // an explicit parent object.
                if !self.parents.is_empty() {
                    return Err(MnemonError::ParentArity {
                        op: ParentOp::Edit,
                        expected: "0",
                        actual: self.parents.len(),
                    });
                }
            }
            ParentOp::Sub => {
                if self.parents.len() != 2 {
                    return Err(MnemonError::ParentArity {
                        op: ParentOp::Sub,
                        expected: "2",
                        actual: self.parents.len(),
                    });
                }
                let records = self.hydrate_parents(ctx)?;
                let mut contents = Vec::with_capacity(records.len());
                for record in &records {
                    contents.push(normalized_parent_content(ctx, record)?);
                }
                let outcome = ctx.transformer.remove(&contents[0], &contents[1])?;
                self.content = outcome.parsed;
                self.content_raw = Some(outcome.raw);
            }
            ParentOp::Sum => {
                if self.parents.len() < 2 {
                    return Err(MnemonError::ParentArity {
                        op: ParentOp::Sum,
                        expected: "at least 2",
                        actual: self.parents.len(),
                    });
                }
                let records = self.hydrate_parents(ctx)?;
                let mut entries = Vec::with_capacity(records.len());
                for record in &records {
                    let content = normalized_parent_content(ctx, record)?;
                    entries.push((record.computed_at.unwrap_or(0.0), content));
                }
                // Earliest-computed first; the rewrite prefers later
                // statements, so the newest content wins on contradiction.
                // Ties keep insertion order (stable sort).
                entries.sort_by(|a, b| a.0.total_cmp(&b.0));
                let joined = entries
                    .iter()
                    .map(|(_, c)| c.as_str())
                    .collect::<Vec<_>>()
                    .join(SUM_JOIN_SEPARATOR);
                let outcome = ctx.transformer.rewrite(&joined)?;
                self.content = outcome.parsed;
                self.content_raw = Some(outcome.raw);
            }
        }

        let computed_at = now_ts();
        self.embedding = ctx.embedder.embed_or_zero(&self.content)?;
        self.compute_note = Some(note.to_string());
        self.computed_at = Some(computed_at);
        self.state = ComputeState::Computed;

        ctx.store.put_block(&self.to_record())?;
        ctx.store.append_lineage(&self.lineage, &self.id, computed_at)?;
        debug!(block = %self.id, lineage = %self.lineage, op = %self.op, "block computed");
        Ok(())
    }

    /// Hydrate the resolved parents from the store, in parent order.
    fn hydrate_parents(
        &self,
        ctx: &ComputeContext<'_>,
    ) -> Result<Vec<BlockRecord>, MnemonError> {
        let mut records = Vec::with_capacity(self.parents.len());
        for parent in &self.parents {
            match parent {
                ParentRef::Resolved(pointer) => {
                    let record = ctx
                        .store
                        .block_by_id(&pointer.block)?
                        .ok_or_else(|| MnemonError::BlockNotFound(pointer.block.clone()))?;
                    records.push(record);
                }
                // The descend loop settles every pending parent before a
                // block reaches this point.
                ParentRef::Pending(block) => {
                    return Err(MnemonError::NotComputed(block.id.clone()));
                }
            }
        }
        Ok(records)
    }
}

/// Normalize a parent's content for a merge or diff.
///
/// Free-form text (create/edit parents) is passed through the rewrite
/// transform into structured form first; derived parents are used as-is.
fn normalized_parent_content(
    ctx: &ComputeContext<'_>,
    record: &BlockRecord,
) -> Result<String, MnemonError> {
    match record.op {
        ParentOp::Create | ParentOp::Edit => Ok(ctx.transformer.rewrite(&record.content)?.parsed),
        ParentOp::Sum | ParentOp::Sub => Ok(record.content.clone()),
    }
}

/// Find the deepest pending parent reference whose own block has no
/// pending parents, together with the id and operation of the block that
/// owns the reference.
///
/// Returns `None` when the root's parents are all resolved. This is the
/// worklist of the compute algorithm: an explicit descend loop instead of
/// native recursion, so deep ancestries cannot exhaust the stack.
fn next_ready_slot<'a>(
    parents: &'a mut Vec<ParentRef>,
    root_id: &BlockId,
    root_op: ParentOp,
) -> Option<(BlockId, ParentOp, &'a mut ParentRef)> {
    let mut owner_id = root_id.clone();
    let mut owner_op = root_op;
    let mut cur = parents;
    loop {
        let idx = cur.iter().position(ParentRef::is_pending)?;
        let descend = match &cur[idx] {
            ParentRef::Pending(block) => block.parents.iter().any(ParentRef::is_pending),
            ParentRef::Resolved(_) => false,
        };
        if descend {
            let ParentRef::Pending(block) = &mut cur[idx] else {
                return None;
            };
            owner_id = block.id.clone();
            owner_op = block.op;
            cur = &mut block.parents;
        } else {
            return cur.get_mut(idx).map(|slot| (owner_id, owner_op, slot));
        }
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

    /// Identity-ish model: echoes the text under transformation.
    struct EchoModel;

    impl LanguageModel for EchoModel {
        fn complete(&self, prompt: &str) -> Result<String, MnemonError> {
            // Conflict probes get the all-clear; everything else echoes
            // the last **Text:** / **Block 1:** payload.
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

    /// Fixed-dimension deterministic embedder.
    struct UnitEmbedder;

    impl EmbeddingProvider for UnitEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, MnemonError> {
            let len = text.len() as f32;
            Ok(vec![1.0, len])
        }
    }

    fn memory_store() -> MemoryStore {
        MemoryStore::new(Box::new(UnitEmbedder))
    }

    #[test]
    fn new_block_starts_uncomputed() {
        let block = Block::new("The sky is blue.");
        assert!(!block.is_computed());
        assert_eq!(block.op(), ParentOp::Create);
        assert!(block.parents().is_empty());
        assert!(block.computed_at().is_none());
        assert_eq!(block.embedding().len(), DEFAULT_EMBEDDING_DIM);
    }

    #[test]
    fn compute_persists_block_and_lineage() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let mut block = Block::new("The sky is blue.");
        block.compute(&mut ctx, "computed in test").expect("compute");

        assert!(block.is_computed());
        assert_eq!(block.content(), "The sky is blue.");
        assert!(block.computed_at().is_some());

        let stored = store
            .block_by_id(block.id())
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.content, "The sky is blue.");
        let tip = store.lineage_tip(block.lineage()).expect("tip");
        assert_eq!(tip, Some(block.id().clone()));
    }

    #[test]
    fn compute_twice_fails() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let mut block = Block::new("fact");
        block.compute(&mut ctx, "first").expect("compute");
        let err = block.compute(&mut ctx, "second");
        assert!(matches!(err, Err(MnemonError::AlreadyComputed(_))));
    }

    #[test]
    fn merge_of_pending_blocks_computes_ancestors_first() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let x = Block::new("The sky is blue.");
        let y = Block::new("Water is wet.");
        let mut z = x.merge(y);
        assert_eq!(z.parents().len(), 2);
        assert!(z.parents().iter().all(ParentRef::is_pending));

        z.compute(&mut ctx, "merge in test").expect("compute");
        assert!(z.is_computed());
        // Parents collapsed to pointers and persisted.
        assert!(z.parents().iter().all(|p| p.pointer().is_some()));
        for parent in z.parents() {
            let pointer = parent.pointer().expect("resolved");
            assert!(store.block_by_id(&pointer.block).expect("lookup").is_some());
        }
    }

    #[test]
    fn merge_flattens_pending_sum_operand() {
        let a = Block::new("a");
        let b = Block::new("b");
        let c = Block::new("c");
        let ab = a.merge(b);
        let abc = ab.merge(c);
        // The pending sum is spliced, not nested: three parents.
        assert_eq!(abc.parents().len(), 3);
    }

    #[test]
    fn sub_requires_exactly_two_parents() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let a = Block::new("a");
        let b = Block::new("b");
        let mut diff = a.difference(b);
        // Sabotage the arity to exercise the invariant.
        let _ = diff.parents.pop();
        let err = diff.compute(&mut ctx, "bad arity");
        assert!(matches!(err, Err(MnemonError::ParentArity { .. })));
    }

    #[test]
    fn edit_keeps_lineage_and_drops_parents() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let mut original = Block::new("v1");
        original.compute(&mut ctx, "computed").expect("compute");
        let mut edited = original.edit(&mut ctx, "v2").expect("edit");
        assert_eq!(edited.lineage(), original.lineage());
        assert_eq!(edited.op(), ParentOp::Edit);
        assert!(edited.parents().is_empty());

        edited.compute(&mut ctx, "computed").expect("compute");
        // The lineage tip moved to the edit.
        let tip = store.lineage_tip(original.lineage()).expect("tip");
        assert_eq!(tip, Some(edited.id().clone()));
    }

    #[test]
    fn record_roundtrip_preserves_fields() {
        let mut store = memory_store();
        let model = EchoModel;
        let embedder = UnitEmbedder;
        let mut ctx = ComputeContext::new(&mut store, &model, &embedder);

        let mut block = Block::new("roundtrip me");
        block.compute(&mut ctx, "computed").expect("compute");

        let record = block.to_record();
        let hydrated = Block::from_record(record.clone());
        assert_eq!(hydrated, block);
        assert_eq!(hydrated.to_record(), record);
    }
}
