//! # Core Type Definitions
//!
//! This module contains the shared types of the Mnemon versioning engine:
//! - Entity identifiers (`BlockId`, `LineageId`, `DocumentId`)
//! - Block provenance (`ParentOp`, `BlockPointer`)
//! - Lifecycle state (`ComputeState`)
//! - Error types (`MnemonError`)
//!
//! ## Identifier Scheme
//!
//! All identifiers are prefixed UUID v4 strings (`blk_…`, `lin_…`,
//! `doc_…`). The prefix makes ids self-describing in logs, stores, and
//! history output. Identifiers implement `Ord` so they can key `BTreeMap`
//! tables with deterministic iteration order.

use crate::primitives::{BLOCK_ID_PREFIX, DOCUMENT_ID_PREFIX, LINEAGE_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

/// Unique identifier of a single block version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generate a fresh block id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{BLOCK_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a lineage: the chain of supersession that successive
/// block versions of "the same" conceptual fact share.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineageId(pub String);

impl LineageId {
    /// Generate a fresh lineage id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{LINEAGE_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a document aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Generate a fresh document id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{DOCUMENT_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PROVENANCE
// =============================================================================

/// The derivation operation a block was constructed with.
///
/// Fixed at construction, never mutated. Arity invariants:
/// `Create`/`Edit` take no parents, `Sub` exactly two, `Sum` two or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentOp {
    /// A block created from raw text, starting a new lineage.
    Create,
    /// A block superseding a lineage predecessor with new text.
    Edit,
    /// A merge of two or more parent blocks.
    Sum,
    /// A subtractive diff of exactly two parent blocks.
    Sub,
}

impl fmt::Display for ParentOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Sum => "sum",
            Self::Sub => "sub",
        };
        f.write_str(s)
    }
}

/// A resolved reference to a computed block: the lineage it belonged to at
/// reference time plus the concrete block version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPointer {
    /// Lineage of the referenced block.
    pub lineage: LineageId,
    /// Concrete block version referenced.
    pub block: BlockId,
}

// =============================================================================
// LIFECYCLE STATE
// =============================================================================

/// Lifecycle state shared by blocks and documents.
///
/// The transition is monotonic: `Uncomputed → Computed`, at most once,
/// never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeState {
    /// Content not yet resolved; parents may still be in-memory objects.
    Uncomputed,
    /// Content resolved and persisted; parents are all pointers.
    Computed,
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Current wall-clock time as fractional epoch seconds.
///
/// Stored timestamps are `f64` and must round-trip losslessly through
/// every store backend.
#[must_use]
pub fn now_ts() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors of the Mnemon engine.
///
/// Precondition violations are fatal to the operation and never retried.
/// Absent lookups are `Option::None`, not errors; only a dangling parent
/// reference (a pointer whose target is missing from the store) is an
/// error, because computation cannot proceed without it.
#[derive(Debug, Error)]
pub enum MnemonError {
    /// `compute` was invoked on a block that is already computed.
    #[error("block {0} is already computed")]
    AlreadyComputed(BlockId),

    /// An operation requiring a computed block was invoked on an
    /// uncomputed one.
    #[error("block {0} is not computed")]
    NotComputed(BlockId),

    /// The parent list does not satisfy the arity invariant of the
    /// block's operation.
    #[error("operation {op} requires {expected} parents, found {actual}")]
    ParentArity {
        /// The violating operation.
        op: ParentOp,
        /// Human-readable expected arity ("0", "2", "at least 2").
        expected: &'static str,
        /// Actual number of parents present.
        actual: usize,
    },

    /// A block with this id is already a member of the document.
    #[error("block {0} is already a member of the document")]
    DuplicateBlock(BlockId),

    /// A referenced block is missing from the store.
    #[error("referenced block {0} is missing from the store")]
    BlockNotFound(BlockId),

    /// A referenced document is missing from the store.
    #[error("referenced document {0} is missing from the store")]
    DocumentNotFound(DocumentId),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred in a store backend.
    #[error("I/O error: {0}")]
    Io(String),

    /// A collaborator transport failure (text-transform or embedding
    /// endpoint unreachable or returning garbage).
    #[error("transport error: {0}")]
    Transport(String),
}

// =============================================================================
// TESTS
// =============================================================================
