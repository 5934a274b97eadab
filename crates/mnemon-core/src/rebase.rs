//! # Recompute
//!
//! Rebase-like re-threading of a block's ancestry. Given a computed
//! block, `recompute` produces an equivalent block whose ancestry points
//! at the *current* tip of every ancestor lineage instead of the
//! historical block each lineage had at original compute time.
//!
//! The walk is an explicit breadth-first worklist with a visited set:
//! diamond-shaped ancestries (a lineage reachable via multiple paths)
//! resolve each superseded ancestor exactly once, however many times it
//! is reached.

use crate::block::{Block, BlockRecord};
use crate::context::ComputeContext;
use crate::store::StoreGateway;
use crate::types::{BlockId, BlockPointer, MnemonError};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

impl Block {
    /// Produce an equivalent block rebased onto the current tip of every
    /// ancestor lineage.
    ///
    /// Ancestors are collected breadth-first through resolved parent
    /// pointers, then processed in reverse discovery order (oldest
    /// ancestors first) while a substitution map rewrites parent
    /// pointers. A block whose parents did not change is its own
    /// replacement; in the fixed-point case the root itself comes back
    /// unchanged, with no new block ids introduced.
    ///
    /// Fails with [`MnemonError::NotComputed`] on an uncomputed root.
    pub fn recompute(&self, ctx: &mut ComputeContext<'_>) -> Result<Self, MnemonError> {
        if !self.is_computed() {
            return Err(MnemonError::NotComputed(self.id().clone()));
        }

        // Breadth-first collection of the reachable ancestry, each block
        // once, in discovery order.
        let mut discovered: Vec<BlockRecord> = Vec::new();
        let mut seen: BTreeSet<BlockId> = BTreeSet::new();
        let mut queue: VecDeque<BlockId> = VecDeque::from([self.id().clone()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let record = ctx
                .store
                .block_by_id(&id)?
                .ok_or_else(|| MnemonError::BlockNotFound(id.clone()))?;
            for parent in &record.parents {
                queue.push_back(parent.block.clone());
            }
            discovered.push(record);
        }

        // Process oldest-first, rewriting parent pointers through the
        // substitution map.
        let mut substitutions: BTreeMap<BlockId, BlockId> = BTreeMap::new();
        let mut root_replacement: Option<Self> = None;
        for record in discovered.iter().rev() {
            if record.parents.is_empty() {
                // A leaf tracks its lineage tip.
                let tip = ctx.store.lineage_tip(&record.lineage)?;
                if let Some(tip) = tip
                    && tip != record.id
                {
                    debug!(superseded = %record.id, tip = %tip, "leaf rebased onto lineage tip");
                    substitutions.insert(record.id.clone(), tip);
                }
                continue;
            }

            let mut changed = false;
            let mut parents: Vec<BlockPointer> = Vec::with_capacity(record.parents.len());
            for parent in &record.parents {
                match substitutions.get(&parent.block) {
                    Some(replacement) => {
                        changed = true;
                        parents.push(BlockPointer {
                            lineage: parent.lineage.clone(),
                            block: replacement.clone(),
                        });
                    }
                    None => parents.push(parent.clone()),
                }
            }

            if changed {
                let mut rebuilt =
                    Self::rethreaded(record.lineage.clone(), record.op, parents);
                rebuilt.compute(ctx, &format!("recomputed from {}", record.id))?;
                substitutions.insert(record.id.clone(), rebuilt.id().clone());
                if record.id == *self.id() {
                    root_replacement = Some(rebuilt);
                }
            }
        }

        if let Some(replacement) = root_replacement {
            return Ok(replacement);
        }
        match substitutions.get(self.id()) {
            // The root was a leaf whose lineage moved on: its replacement
            // is the tip itself.
            Some(tip) => {
                let record = ctx
                    .store
                    .block_by_id(tip)?
                    .ok_or_else(|| MnemonError::BlockNotFound(tip.clone()))?;
                Ok(Self::from_record(record))
            }
            // Fixed point: nothing changed anywhere in the ancestry.
            None => Ok(self.clone()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
