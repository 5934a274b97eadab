//! # History Reconstruction
//!
//! Read-only views over a computed block's provenance:
//!
//! - [`lineage_history`]: every block that has ever represented the
//!   block's lineage, one summary line per version, in log order
//! - [`ancestry_trace`]: an indented breadth-first rendering of the
//!   parent DAG, deduplicated by exact line text and wrapped to a fixed
//!   display width
//! - [`ancestry_graph`]: an explicit DAG value with one vertex per
//!   distinct ancestor and deduplicated parent→child edges, exposed for
//!   external analysis
//!
//! All three require the subject block to be computed, since they walk
//! resolved parent pointers through the store.

use crate::block::{Block, BlockRecord};
use crate::primitives::{TRACE_INDENT_STEP, TRACE_LINE_WIDTH, TRACE_WRAP_INDENT};
use crate::store::StoreGateway;
use crate::types::{BlockId, LineageId, MnemonError};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// SUMMARY RENDERING
// =============================================================================

/// One-line summary of a block record.
///
/// `[op] content [block id] [lineage id] [created] [computed]`
#[must_use]
pub fn summary_line(record: &BlockRecord) -> String {
    format!(
        "[{}] {} [{}] [{}] [{}] [{}]",
        record.op,
        record.content,
        record.id,
        record.lineage,
        format_timestamp(record.created_at),
        record
            .computed_at
            .map_or_else(|| "-".to_string(), format_timestamp),
    )
}

fn format_timestamp(ts: f64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

// =============================================================================
// LINEAGE HISTORY
// =============================================================================

/// Render the full history of the block's lineage, one line per version,
/// in log order. Log order approximates chronological order since
/// entries are appended at compute time.
pub fn lineage_history(
    store: &dyn StoreGateway,
    block: &Block,
) -> Result<Vec<String>, MnemonError> {
    if !block.is_computed() {
        return Err(MnemonError::NotComputed(block.id().clone()));
    }
    let log = store.lineage_log(block.lineage())?;
    let mut lines = Vec::with_capacity(log.len());
    for entry in &log {
        let record = store
            .block_by_id(&entry.block)?
            .ok_or_else(|| MnemonError::BlockNotFound(entry.block.clone()))?;
        lines.push(summary_line(&record));
    }
    Ok(lines)
}

// =============================================================================
// ANCESTRY TRACE
// =============================================================================

/// Render the block's ancestry as an indented trace.
///
/// Breadth-first over the parent DAG: each visited ancestor is rendered
/// beneath every occurrence of its discovering block, indented one hop
/// deeper and prefixed with an `↑__` marker. Lines are deduplicated by
/// exact text (first occurrence wins) and wrapped to the display width,
/// continuation lines carrying the row's leading indentation.
pub fn ancestry_trace(
    store: &dyn StoreGateway,
    block: &Block,
) -> Result<Vec<String>, MnemonError> {
    if !block.is_computed() {
        return Err(MnemonError::NotComputed(block.id().clone()));
    }

    let mut ids: Vec<BlockId> = vec![block.id().clone()];
    let mut lines: Vec<String> = vec![summary_line(&block.to_record())];

    // (discovering block, ancestor to render) pairs.
    let mut queue: VecDeque<(BlockId, BlockId)> = block
        .parents()
        .iter()
        .filter_map(|p| p.pointer())
        .map(|ptr| (block.id().clone(), ptr.block.clone()))
        .collect();

    while let Some((anchor, current)) = queue.pop_front() {
        let record = store
            .block_by_id(&current)?
            .ok_or_else(|| MnemonError::BlockNotFound(current.clone()))?;
        let sentence = format!("↑__ {}", summary_line(&record));

        let positions: Vec<usize> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| **id == anchor)
            .map(|(index, _)| index)
            .collect();
        for (offset, position) in positions.iter().enumerate() {
            let at = position + offset + 1;
            let indent = leading_spaces(&lines[position + offset]);
            ids.insert(at, current.clone());
            lines.insert(
                at,
                format!("{}{}", " ".repeat(indent + TRACE_INDENT_STEP), sentence),
            );
        }

        for parent in &record.parents {
            queue.push_back((current.clone(), parent.block.clone()));
        }
    }

    // Dedup by exact text, first occurrence wins.
    let mut seen = BTreeSet::new();
    lines.retain(|line| seen.insert(line.clone()));

    Ok(wrap_lines(&lines, TRACE_LINE_WIDTH, TRACE_WRAP_INDENT))
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Wrap rows to a fixed display width.
///
/// Rows longer than the width are split at the width boundary; each
/// continuation line is prefixed with the row's leading indentation plus
/// `extra_indent` spaces. A row indented so deep that no useful width
/// remains terminates the output with an ellipsis marker.
#[must_use]
pub fn wrap_lines(rows: &[String], width: usize, extra_indent: usize) -> Vec<String> {
    let mut out = Vec::new();
    for row in rows {
        let indent = leading_spaces(row);
        let total = indent + extra_indent;
        if total >= width.saturating_sub(20) {
            out.push("[...]".to_string());
            break;
        }
        let pad = " ".repeat(total);
        let mut rest = row.clone();
        while let Some(split_at) = byte_offset_of_char(&rest, width) {
            out.push(rest[..split_at].to_string());
            rest = format!("{pad}{}", &rest[split_at..]);
        }
        out.push(rest);
    }
    out
}

/// Byte offset of the `n`-th character, or `None` when the string is at
/// most `n` characters long. Splitting at the returned offset never
/// lands inside a multi-byte character.
fn byte_offset_of_char(s: &str, n: usize) -> Option<usize> {
    s.char_indices().nth(n).map(|(offset, _)| offset)
}

// =============================================================================
// ANCESTRY GRAPH
// =============================================================================

/// A vertex of the ancestry graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AncestryVertex {
    /// The block this vertex represents.
    pub block: BlockId,
    /// Its lineage.
    pub lineage: LineageId,
    /// Its content at compute time.
    pub content: String,
}

/// An explicit DAG over a block's ancestry.
///
/// One vertex per distinct visited block id, one directed edge per
/// parent→child relationship; both deduplicated across discovery paths.
/// The engine only constructs the graph; interpretation is left to
/// external analysis or visualization.
#[derive(Debug, Clone, Default)]
pub struct AncestryGraph {
    vertices: BTreeMap<BlockId, AncestryVertex>,
    edges: BTreeSet<(BlockId, BlockId)>,
}

impl AncestryGraph {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of directed edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether a block id has a vertex.
    #[must_use]
    pub fn contains_vertex(&self, id: &BlockId) -> bool {
        self.vertices.contains_key(id)
    }

    /// Whether the parent→child edge exists.
    #[must_use]
    pub fn contains_edge(&self, parent: &BlockId, child: &BlockId) -> bool {
        self.edges
            .contains(&(parent.clone(), child.clone()))
    }

    /// Vertices in deterministic order.
    pub fn vertices(&self) -> impl Iterator<Item = &AncestryVertex> {
        self.vertices.values()
    }

    /// Directed parent→child edges in deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = &(BlockId, BlockId)> {
        self.edges.iter()
    }
}

/// Build the ancestry DAG of a computed block.
pub fn ancestry_graph(
    store: &dyn StoreGateway,
    block: &Block,
) -> Result<AncestryGraph, MnemonError> {
    if !block.is_computed() {
        return Err(MnemonError::NotComputed(block.id().clone()));
    }

    let mut graph = AncestryGraph::default();
    let mut processed: BTreeSet<BlockId> = BTreeSet::new();
    let mut queue: VecDeque<BlockId> = VecDeque::from([block.id().clone()]);

    while let Some(current) = queue.pop_front() {
        if !processed.insert(current.clone()) {
            continue;
        }
        let record = store
            .block_by_id(&current)?
            .ok_or_else(|| MnemonError::BlockNotFound(current.clone()))?;
        graph.vertices.insert(
            current.clone(),
            AncestryVertex {
                block: current.clone(),
                lineage: record.lineage.clone(),
                content: record.content.clone(),
            },
        );
        for parent in &record.parents {
            queue.push_back(parent.block.clone());
            graph
                .edges
                .insert((parent.block.clone(), current.clone()));
        }
    }

    Ok(graph)
}

// =============================================================================
// TESTS
// =============================================================================
