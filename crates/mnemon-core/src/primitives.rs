//! # Engine Constants
//!
//! Hardcoded runtime constants for the Mnemon engine.
//!
//! These values are compiled into the binary and immutable at runtime.
//! The similarity thresholds are tunables: only their loose/strict
//! relationship is meaningful, not the specific numbers.

/// Prefix of block identifiers.
pub const BLOCK_ID_PREFIX: &str = "blk_";

/// Prefix of lineage identifiers.
pub const LINEAGE_ID_PREFIX: &str = "lin_";

/// Prefix of document identifiers.
pub const DOCUMENT_ID_PREFIX: &str = "doc_";

/// Dimension of the placeholder all-zero embedding a block carries until
/// it is computed. The real dimension comes from the embedding provider.
pub const DEFAULT_EMBEDDING_DIM: usize = 1;

/// Separator used to join parent contents before a merge rewrite.
///
/// Parents are joined earliest-computed first; the rewrite service
/// prefers later statements, so later content takes precedence.
pub const SUM_JOIN_SEPARATOR: &str = " \n";

/// Opening marker the text-transform service wraps its payload in.
pub const OUTPUT_OPEN: &str = "<OUTPUT>";

/// Closing marker the text-transform service wraps its payload in.
pub const OUTPUT_CLOSE: &str = "</OUTPUT>";

/// Attempt budget for a single text-transform call.
///
/// A response without the expected marker is retried up to this many
/// times; exhaustion surfaces the last raw response as a soft failure.
pub const TRANSFORM_ATTEMPTS: usize = 3;

/// Column width the ancestry trace is wrapped to for display.
pub const TRACE_LINE_WIDTH: usize = 100;

/// Indentation added per ancestry hop in the trace.
pub const TRACE_INDENT_STEP: usize = 5;

/// Extra indentation prefixed to wrapped continuation lines.
pub const TRACE_WRAP_INDENT: usize = 4;

/// Maximal distance for the smart-insert neighbor search.
///
/// Deliberately loose ("first hit wins"): later information about the
/// same fact should accrete onto the existing member.
pub const SMART_INSERT_MAX_DISTANCE: f64 = 1.0;

/// Default maximal distance for explicit similarity searches.
pub const DEFAULT_SEARCH_MAX_DISTANCE: f64 = 1000.0;

/// Default result limit for explicit similarity searches.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_balanced() {
        assert_eq!(OUTPUT_CLOSE, "</OUTPUT>");
        assert!(OUTPUT_CLOSE.contains(&OUTPUT_OPEN[1..]));
    }

    #[test]
    fn smart_insert_threshold_is_looser_than_strict_zero() {
        assert!(SMART_INSERT_MAX_DISTANCE > 0.0);
        assert!(SMART_INSERT_MAX_DISTANCE < DEFAULT_SEARCH_MAX_DISTANCE);
    }
}
