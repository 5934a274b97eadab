//! Shared deterministic fakes for the integration tests.
//!
//! The scripted model answers every prompt kind of the transform layer
//! deterministically; the keyword embedder maps texts onto one of two
//! unit axes so similarity thresholds behave predictably.

// Not every test crate uses every helper.
#![allow(dead_code)]

use mnemon_core::{EmbeddingProvider, LanguageModel, MnemonError};

// =============================================================================
// SCRIPTED LANGUAGE MODEL
// =============================================================================

/// Deterministic stand-in for the generative model.
///
/// - conflict probes report the all-clear
/// - rewrite echoes the text unchanged
/// - remove computes a sentence-level difference
/// - correct echoes the text under revision
pub struct ScriptedModel;

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String, MnemonError> {
        if prompt.contains("identify evident conflictual information") {
            return Ok("<OUTPUT>OK</OUTPUT>".to_string());
        }
        if prompt.contains("revise the first block (Block 1) with the observation") {
            let block1 = between_last(prompt, "**Block 1:**", "**Block 2:**");
            return Ok(format!("<OUTPUT>{block1}</OUTPUT>"));
        }
        if prompt.contains("remove any information from the first block") {
            let block1 = between_last(prompt, "**Block 1:**", "**Block 2:**");
            let block2 = between_last(prompt, "**Block 2:**", "The output is:");
            return Ok(format!(
                "<OUTPUT>{}</OUTPUT>",
                sentence_difference(&block1, &block2)
            ));
        }
        // Rewrite: echo the payload.
        let text = between_last(prompt, "**Text:**", "The output is:");
        Ok(format!("<OUTPUT>{text}</OUTPUT>"))
    }
}

/// The trimmed text after the last `open` and before the following
/// `close` (or the rest of the string when `close` is absent).
fn between_last(text: &str, open: &str, close: &str) -> String {
    let tail = text.rsplit(open).next().unwrap_or_default();
    let inner = tail.split(close).next().unwrap_or_default();
    inner.trim().to_string()
}

/// Sentences of `a` that are not contained verbatim in `b`.
fn sentence_difference(a: &str, b: &str) -> String {
    a.split('.')
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .filter(|sentence| !b.contains(sentence))
        .map(|sentence| format!("{sentence}."))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// KEYWORD EMBEDDER
// =============================================================================

/// Two-axis embedder: texts containing the keyword share one unit axis,
/// all other texts the orthogonal one. Same-topic squared distance is 0,
/// cross-topic distance is 2.
pub struct KeywordEmbedder {
    keyword: String,
}

impl KeywordEmbedder {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
        }
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn dimension(&self) -> usize {
        2
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, MnemonError> {
        if text.to_lowercase().contains(&self.keyword) {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
}
