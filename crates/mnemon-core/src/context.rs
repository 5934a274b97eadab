//! # Compute Context
//!
//! The explicit dependency-injection bundle threaded through every
//! computing operation: the store gateway, the text-transform wrapper,
//! and the embedding provider. Nothing in the engine reaches for an
//! ambient/global backend; callers construct a context and pass it in,
//! which keeps every collaborator replaceable by a deterministic fake.

use crate::embedding::EmbeddingProvider;
use crate::store::StoreGateway;
use crate::transform::{LanguageModel, Transformer};

/// Collaborator bundle for compute, recompute, and document operations.
pub struct ComputeContext<'a> {
    /// The persistence and similarity-search backend.
    pub store: &'a mut dyn StoreGateway,
    /// The text-transform wrapper (retry, marker parsing, healing).
    pub transformer: Transformer<'a>,
    /// The embedding provider for computed content.
    pub embedder: &'a dyn EmbeddingProvider,
}

impl<'a> ComputeContext<'a> {
    /// Bundle the collaborators with the default transform attempt budget.
    pub fn new(
        store: &'a mut dyn StoreGateway,
        model: &'a dyn LanguageModel,
        embedder: &'a dyn EmbeddingProvider,
    ) -> Self {
        Self {
            store,
            transformer: Transformer::new(model),
            embedder,
        }
    }

    /// Bundle the collaborators with an explicit transform attempt budget.
    pub fn with_attempts(
        store: &'a mut dyn StoreGateway,
        model: &'a dyn LanguageModel,
        embedder: &'a dyn EmbeddingProvider,
        attempts: usize,
    ) -> Self {
        Self {
            store,
            transformer: Transformer::with_attempts(model, attempts),
            embedder,
        }
    }
}
