//! # Property-Based Tests
//!
//! Proptest invariants: document union commutativity, trace wrapping
//! bounds, lineage-tip selection, and marker extraction.

mod common;

use common::KeywordEmbedder;
use mnemon_core::{
    Block, BlockId, Document, LineageId, MemoryStore, StoreGateway, extract_output, wrap_lines,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Union id-sets are the same whichever operand comes first.
    #[test]
    fn document_union_commutative(
        left_contents in vec("[a-z]{1,12}", 0..8),
        right_contents in vec("[a-z]{1,12}", 0..8),
        shared_contents in vec("[a-z]{1,12}", 0..4),
    ) {
        let shared: Vec<Block> = shared_contents.iter().map(|s| Block::new(s.as_str())).collect();

        let mut left_blocks: Vec<Block> =
            left_contents.iter().map(|s| Block::new(s.as_str())).collect();
        left_blocks.extend(shared.clone());
        let mut right_blocks: Vec<Block> =
            right_contents.iter().map(|s| Block::new(s.as_str())).collect();
        right_blocks.extend(shared);

        let left = Document::new(left_blocks);
        let right = Document::new(right_blocks);

        let ab = left.clone().merge(right.clone());
        let ba = right.merge(left);

        let ids_ab: BTreeSet<&BlockId> = ab.block_ids().iter().collect();
        let ids_ba: BTreeSet<&BlockId> = ba.block_ids().iter().collect();
        prop_assert_eq!(ids_ab, ids_ba);
    }

    /// Wrapped lines never exceed the width (short of the ellipsis row),
    /// and wrapping never loses non-space characters.
    #[test]
    fn wrap_lines_bounds_width(
        body in "[a-zA-Z0-9 ]{0,300}",
        indent in 0usize..20,
        width in 40usize..120,
    ) {
        let row = format!("{}{}", " ".repeat(indent), body);
        let wrapped = wrap_lines(&[row.clone()], width, 4);

        for line in &wrapped {
            prop_assert!(line.chars().count() <= width || line == "[...]");
        }

        let count_non_space = |s: &str| s.chars().filter(|c| !c.is_whitespace()).count();
        let total: usize = wrapped.iter().map(|l| count_non_space(l)).sum();
        if wrapped.last().map(String::as_str) != Some("[...]") {
            prop_assert_eq!(total, count_non_space(&row));
        }
    }

    /// The lineage tip is always the entry with the maximum timestamp.
    #[test]
    fn lineage_tip_tracks_max_timestamp(
        timestamps in vec(0u32..100_000, 1..20),
    ) {
        let mut store = MemoryStore::new(Box::new(KeywordEmbedder::new("sky")));
        let lineage = LineageId("lin_prop".to_string());

        let mut max_seen: Option<(f64, BlockId)> = None;
        for (index, raw) in timestamps.iter().enumerate() {
            let ts = f64::from(*raw) / 10.0;
            let block = BlockId(format!("blk_{index:04}"));
            store.append_lineage(&lineage, &block, ts).expect("append");
            let better = match &max_seen {
                Some((best, best_id)) => {
                    ts > *best || (ts == *best && block > *best_id)
                }
                None => true,
            };
            if better {
                max_seen = Some((ts, block));
            }
        }

        let tip = store.lineage_tip(&lineage).expect("tip");
        prop_assert_eq!(tip, max_seen.map(|(_, id)| id));
    }

    /// The last marked payload is extracted whatever surrounds it.
    #[test]
    fn extract_output_finds_last_payload(
        prefix in "[a-z :.\n]{0,60}",
        decoy in "[a-z .]{0,30}",
        payload in "[a-z .]{0,40}",
        suffix in "[a-z :.\n]{0,60}",
    ) {
        let raw = format!(
            "{prefix}<OUTPUT>{decoy}</OUTPUT>{suffix}<OUTPUT>{payload}</OUTPUT>{suffix}"
        );
        prop_assert_eq!(extract_output(&raw), payload.trim());
    }
}
