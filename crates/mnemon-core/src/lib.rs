//! # mnemon-core
//!
//! The Block Versioning Engine for Mnemon - THE LOGIC.
//!
//! Mnemon manages a version-controlled knowledge base of text fragments.
//! Blocks are created, edited, merged, and differenced like commits in a
//! source-control DAG, except that the merge/diff transforms on content
//! are delegated to a generative text model instead of being computed
//! deterministically.
//!
//! This crate implements:
//! - the lazy compute graph of blocks and the compute state machine
//! - the rebase-like recompute that re-threads dependents after an
//!   ancestor is superseded
//! - history reconstruction (lineage log, ancestry trace, ancestry DAG)
//! - the document aggregate with set combination and semantic-dedup
//!   insertion
//! - the store-gateway contract with in-memory and redb-backed
//!   implementations
//!
//! ## Architectural Constraints
//!
//! - Collaborators (store, text transform, embeddings) are injected
//!   traits; nothing is looked up ambiently
//! - Blocks are immutable once computed; supersession creates new blocks
//! - All graph walks use explicit worklists, never unbounded recursion
//! - Single logical thread of control; collaborator calls are blocking

// =============================================================================
// MODULES
// =============================================================================

pub mod block;
pub mod context;
pub mod document;
pub mod embedding;
pub mod history;
pub mod primitives;
pub mod rebase;
pub mod store;
pub mod transform;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BlockId, BlockPointer, ComputeState, DocumentId, LineageId, MnemonError, ParentOp, now_ts,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use block::{Block, BlockRecord, ParentRef};
pub use context::ComputeContext;
pub use document::{DocOp, DocOperation, Document, DocumentRecord};
pub use history::{
    AncestryGraph, AncestryVertex, ancestry_graph, ancestry_trace, lineage_history, summary_line,
    wrap_lines,
};

// =============================================================================
// RE-EXPORTS: Collaborator Contracts
// =============================================================================

pub use embedding::{EmbeddingProvider, squared_l2};
pub use store::{LineageEntry, MemoryStore, RedbStore, SimilarityHit, StoreGateway};
pub use transform::{ConflictReport, LanguageModel, TransformOutcome, Transformer, extract_output};
