//! # Text Transform Boundary
//!
//! Blocks delegate every content transformation (merge rewriting,
//! subtractive diffing, conflict detection, correction) to a generative
//! text model. The model itself is external and injected through the
//! [`LanguageModel`] trait; everything else in this module is load-bearing
//! engine behavior:
//!
//! - bounded retry until the expected `<OUTPUT>` marker appears, with the
//!   last raw response surfaced as-is when the budget is exhausted (a
//!   soft failure, never an error)
//! - last-match extraction of the marked payload
//! - the rewrite-then-heal wrapping: every rewrite/remove result is run
//!   through conflict detection, and a reported conflict triggers a
//!   correction pass whose raw output is concatenated for audit

use crate::primitives::{OUTPUT_CLOSE, OUTPUT_OPEN, TRANSFORM_ATTEMPTS};
use crate::types::MnemonError;
use tracing::{debug, warn};

// =============================================================================
// LANGUAGE MODEL TRAIT
// =============================================================================

/// A single raw completion call against a generative text model.
///
/// Implementations perform one blocking request and return the raw
/// response body. Transport failures are errors; content-level problems
/// (missing marker, conflicting output) are handled by [`Transformer`].
pub trait LanguageModel {
    /// Complete the prompt and return the raw model response.
    fn complete(&self, prompt: &str) -> Result<String, MnemonError>;
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of a content transformation: the raw model response (kept for
/// audit) and the payload extracted from the output markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    /// Concatenated raw responses of every call that contributed.
    pub raw: String,
    /// The extracted, possibly healed payload. Empty is valid.
    pub parsed: String,
}

/// Result of a conflict-detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// Raw model response.
    pub raw: String,
    /// `None` when no contradiction was found, otherwise the model's
    /// description of the conflict.
    pub conflict: Option<String>,
}

// =============================================================================
// TRANSFORMER
// =============================================================================

/// The engine-side wrapper around a [`LanguageModel`].
///
/// Owns the retry budget, marker extraction, and conflict healing.
pub struct Transformer<'a> {
    model: &'a dyn LanguageModel,
    attempts: usize,
}

impl<'a> Transformer<'a> {
    /// Wrap a model with the default attempt budget.
    #[must_use]
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self {
            model,
            attempts: TRANSFORM_ATTEMPTS,
        }
    }

    /// Wrap a model with an explicit attempt budget.
    #[must_use]
    pub fn with_attempts(model: &'a dyn LanguageModel, attempts: usize) -> Self {
        Self {
            model,
            attempts: attempts.max(1),
        }
    }

    /// Call the model, retrying until the output marker appears.
    ///
    /// Exhausting the budget returns the last raw response unchanged so
    /// partial work is never silently lost; callers observe the missing
    /// marker as an empty extraction.
    fn call(&self, prompt: &str) -> Result<String, MnemonError> {
        debug!(prompt_len = prompt.len(), "transform call");
        let mut raw = String::new();
        for attempt in 0..self.attempts {
            if attempt > 0 {
                warn!(attempt, "retrying transform call for an acceptable answer");
            }
            raw = self.model.complete(prompt)?;
            if raw.contains(OUTPUT_OPEN) {
                return Ok(raw);
            }
        }
        warn!(
            attempts = self.attempts,
            "transform response still missing the output marker; surfacing raw response"
        );
        Ok(raw)
    }

    /// Restructure text into a concise normalized form, preserving all
    /// information, then heal any reported contradiction.
    pub fn rewrite(&self, text: &str) -> Result<TransformOutcome, MnemonError> {
        let raw = self.call(&rewrite_prompt(text))?;
        self.heal(raw)
    }

    /// Return `text_a` with anything already present in `text_b`
    /// subtracted out, then heal any reported contradiction. An empty
    /// result is valid.
    pub fn remove(&self, text_a: &str, text_b: &str) -> Result<TransformOutcome, MnemonError> {
        let raw = self.call(&remove_prompt(text_a, text_b))?;
        self.heal(raw)
    }

    /// Detect contradictory statements inside the text.
    ///
    /// A conflict is never an error: it is surfaced as a warning-level
    /// signal and consumed by the healing wrapper.
    pub fn detect_conflicts(&self, text: &str) -> Result<ConflictReport, MnemonError> {
        let raw = self.call(&conflicts_prompt(text))?;
        let parsed = extract_output(&raw);
        if is_all_clear(&parsed) {
            Ok(ConflictReport {
                raw,
                conflict: None,
            })
        } else {
            warn!(conflict = %parsed, "possible conflicts in the text");
            Ok(ConflictReport {
                raw,
                conflict: Some(parsed),
            })
        }
    }

    /// Revise text given a conflict description, preferring later-stated
    /// information.
    pub fn correct(&self, text: &str, comment: &str) -> Result<TransformOutcome, MnemonError> {
        let raw = self.call(&correct_prompt(text, comment))?;
        let parsed = extract_output(&raw);
        Ok(TransformOutcome { raw, parsed })
    }

    /// Extract the payload and run it through conflict detection; a
    /// reported conflict replaces the payload with the corrected version
    /// and concatenates the raw outputs for audit.
    fn heal(&self, raw: String) -> Result<TransformOutcome, MnemonError> {
        let parsed = extract_output(&raw);
        let report = self.detect_conflicts(&parsed)?;
        if let Some(comment) = report.conflict {
            let corrected = self.correct(&parsed, &comment)?;
            Ok(TransformOutcome {
                raw: raw + &corrected.raw,
                parsed: corrected.parsed,
            })
        } else {
            Ok(TransformOutcome { raw, parsed })
        }
    }
}

// =============================================================================
// MARKER EXTRACTION
// =============================================================================

/// Extract the last `<OUTPUT>…</OUTPUT>` payload from a raw response.
///
/// The last match wins because models tend to echo the examples before
/// producing the final answer. A missing marker yields an empty string
/// (the soft-failure signal callers must treat as such).
#[must_use]
pub fn extract_output(text: &str) -> String {
    let mut result: Option<&str> = None;
    let mut rest = text;
    while let Some(open) = rest.find(OUTPUT_OPEN) {
        let after = &rest[open + OUTPUT_OPEN.len()..];
        match after.find(OUTPUT_CLOSE) {
            Some(close) => {
                result = Some(&after[..close]);
                rest = &after[close + OUTPUT_CLOSE.len()..];
            }
            None => break,
        }
    }
    match result {
        Some(payload) => payload.trim().to_string(),
        None => {
            warn!("output marker not found; returning empty string");
            String::new()
        }
    }
}

/// Whether a conflict-detection payload means "no contradiction found".
fn is_all_clear(parsed: &str) -> bool {
    parsed == "OK"
        || parsed.contains("no contradiction")
        || parsed.contains("no contradictory")
        || parsed.contains("no evident contradictory")
}

// =============================================================================
// PROMPT TEMPLATES
// =============================================================================

fn rewrite_prompt(text: &str) -> String {
    format!(
        r"
- I have a lengthy text that I would like you to rewrite in a structured format.
- Please ensure that all information is retained while organizing the content into clear sections or headings.
- The rewritten text should be concise and easy to understand.
- Do not invent anything. Use only the information contained in the text.
- If there are any contradictions in the text, prioritize the information that appears later in the text.
- The output should be simple, structured, and have brief but informative sentences.
- Please enclose the rewritten text within <OUTPUT> </OUTPUT> tags. For example, it should be formatted as follows: <OUTPUT>Rewritten text.</OUTPUT>
- Reason step by step.

Example 1.
**Text:**
I am hungry.
The pen is red.
The output is: <OUTPUT>I am hungry. The pen is red.</OUTPUT>

Example 2.
**Text:**
Intesa Sanpaolo is an Italian bank.
Turin is a beautiful city located in France.
Intesa Sanpaolo (ISP) has its headquarter in Turin.
Turin is a city located in Italy.
The output is: <OUTPUT>Intesa Sanpaolo (ISP) is an Italian bank. It has its headquarter in Turin, which is a beautiful Italian city.</OUTPUT>

Your turn to complete.
**Text:**
{text}
The output is:
"
    )
}

fn remove_prompt(text_a: &str, text_b: &str) -> String {
    format!(
        r"
- I have two blocks of text.
- I need you to remove any information from the first block (Block 1) that is also contained in the second block (Block 2).
- Please provide the revised version of the first block (Block 1) after removing the overlapping information.
- Do not invent anything. Use only the information contained in the text.
- The output should be simple, structured, and have brief but informative sentences.
- Please enclose the rewritten text within <OUTPUT> </OUTPUT> tags. For example, it should be formatted as follows: <OUTPUT>Rewritten text.</OUTPUT>
- Reason step by step.

Example 1.
**Block 1:**
I am hungry and the pen is red.
**Block 2:**
I am hungry.
The output is: <OUTPUT>The pen is red.</OUTPUT>

Example 2.
**Block 1:**
The laptop is running hot.
**Block 2:**
Today it is sunny and the laptop is getting very hot.
The output is an empty string <OUTPUT></OUTPUT> since the unique information to keep (laptop running hot) is also contained in the second block.

Your turn to complete.
**Block 1:**
{text_a}
**Block 2:**
{text_b}
The output is:
"
    )
}

fn conflicts_prompt(text: &str) -> String {
    format!(
        r"
- I have a block of text, and I need you to identify evident conflictual information or strong contradictory statements within it.
- Please highlight the specific conflicting statements and provide a brief explanation of why they are considered contradictory.
- Ensure that the identified conflicts are based on clear evidence from the given text and not on assumptions or hypotheses or your previous knowledge.
- Do not use any of your previous knowledge. Use only the contents of the given text.
- Please enclose the answer within <OUTPUT> </OUTPUT> tags. For example, it should be formatted as follows: <OUTPUT>Text</OUTPUT>.
- If no evident conflictual information or contradictory statements are detected, or if you are unsure, then return <OUTPUT>OK</OUTPUT>.
- Reason step by step.

Example 1.
**Text:**
I am hungry right now and the pen is red.
I am full and won't eat again today.
Reasoning: in the first sentence I am hungry but in the second sentence I say that I won't eat again because I am full. They are contradictory statements.
The output is: <OUTPUT>In the first sentence I am hungry but in the second sentence I say that I won't eat again because I am full. They are contradictory statements.</OUTPUT>

Example 2.
**Text:**
Intesa Sanpaolo is an Italian bank. It has its headquarter in Turin.
Turin is a city on the north of Italy and it is where the headquarter of Intesa Sanpaolo is located.
Reasoning: no contradictory statements here.
The output is: <OUTPUT>OK</OUTPUT>

Your turn to complete.
**Text:**
{text}
Reasoning: ...
The output is:
"
    )
}

fn correct_prompt(text: &str, comment: &str) -> String {
    format!(
        r"
- I have two blocks of text.
- I need you to revise the first block (Block 1) with the observation contained in the second block (Block 2).
- If there are any contradictions in the text, prioritize the information that appears later in the text of Block 1.
- Remove conflictual information from the first block.
- Do not invent anything. Use only the information contained in the text.
- The output should be simple, structured, and have brief but informative sentences.
- Please enclose the revised text within <OUTPUT> </OUTPUT> tags. For example, it should be formatted as follows: <OUTPUT>Revised text.</OUTPUT>
- Reason step by step.

Example 1.
**Block 1:**
I am hungry and the pen is red. I am full.
**Block 2:**
It seems that there is a contradiction. You cannot be hungry and full at the same time. Keep the information that appears later in the text (I am full).
The output is: <OUTPUT>I am full and the pen is red.</OUTPUT>

Your turn to complete.
**Block 1:**
{text}
**Block 2:**
{comment}
Reasoning: ...
The output is:
"
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Model that pops canned responses in order.
    struct QueueModel {
        responses: RefCell<Vec<String>>,
    }

    impl QueueModel {
        fn new(responses: Vec<&str>) -> Self {
            let mut responses: Vec<String> = responses.into_iter().map(String::from).collect();
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
            }
        }
    }

    impl LanguageModel for QueueModel {
        fn complete(&self, _prompt: &str) -> Result<String, MnemonError> {
            Ok(self.responses.borrow_mut().pop().unwrap_or_default())
        }
    }

    #[test]
    fn extract_output_takes_last_match() {
        let raw = "echo <OUTPUT>first</OUTPUT> then <OUTPUT> final </OUTPUT> tail";
        assert_eq!(extract_output(raw), "final");
    }

    #[test]
    fn extract_output_missing_marker_is_empty() {
        assert_eq!(extract_output("no markers here"), "");
    }

    #[test]
    fn extract_output_unclosed_marker_is_empty() {
        assert_eq!(extract_output("<OUTPUT>never closed"), "");
    }

    #[test]
    fn retry_until_marker_appears() {
        let model = QueueModel::new(vec![
            "garbage",
            "<OUTPUT>rewritten</OUTPUT>",
            "<OUTPUT>OK</OUTPUT>",
        ]);
        let transformer = Transformer::new(&model);
        let outcome = transformer.rewrite("anything").expect("rewrite");
        assert_eq!(outcome.parsed, "rewritten");
    }

    #[test]
    fn exhausted_budget_surfaces_last_raw() {
        let model = QueueModel::new(vec!["bad one", "bad two"]);
        let transformer = Transformer::with_attempts(&model, 2);
        let outcome = transformer.rewrite("anything").expect("rewrite");
        // Soft failure: raw preserved, parsed empty.
        assert_eq!(outcome.parsed, "");
        assert!(outcome.raw.contains("bad two"));
    }

    #[test]
    fn conflict_triggers_correction_and_concatenates_raw() {
        let model = QueueModel::new(vec![
            "<OUTPUT>A and not A</OUTPUT>",
            "<OUTPUT>statements contradict</OUTPUT>",
            "<OUTPUT>A</OUTPUT>",
        ]);
        let transformer = Transformer::new(&model);
        let outcome = transformer.rewrite("text").expect("rewrite");
        assert_eq!(outcome.parsed, "A");
        assert!(outcome.raw.contains("A and not A"));
        assert!(outcome.raw.contains("<OUTPUT>A</OUTPUT>"));
    }

    #[test]
    fn all_clear_phrases_mean_no_conflict() {
        let model = QueueModel::new(vec!["<OUTPUT>There is no contradiction in this text</OUTPUT>"]);
        let transformer = Transformer::new(&model);
        let report = transformer.detect_conflicts("text").expect("detect");
        assert!(report.conflict.is_none());
    }

    #[test]
    fn remove_heals_like_rewrite() {
        let model = QueueModel::new(vec!["<OUTPUT>left over</OUTPUT>", "<OUTPUT>OK</OUTPUT>"]);
        let transformer = Transformer::new(&model);
        let outcome = transformer.remove("a", "b").expect("remove");
        assert_eq!(outcome.parsed, "left over");
    }
}
