//! # CLI Command Implementations
//!
//! Every command opens the disk-backed store, builds a compute context
//! around the configured collaborators, and runs one engine operation to
//! completion.

use crate::cli::Cli;
use crate::config::Config;
use crate::llm::OpenAiClient;
use mnemon_core::{
    Block, BlockId, ComputeContext, Document, DocumentId, MnemonError, RedbStore, StoreGateway,
    ancestry_graph, ancestry_trace, lineage_history, summary_line,
};
use serde_json::json;
use tracing::info;

// =============================================================================
// WORKBENCH
// =============================================================================

/// The opened store plus the configured collaborators.
pub struct Workbench {
    store: RedbStore,
    client: OpenAiClient,
    attempts: usize,
}

impl Workbench {
    /// Open the store and collaborators per CLI flags and config file.
    pub fn open(cli: &Cli) -> Result<Self, MnemonError> {
        let config = Config::load(&cli.config)?;
        let client = OpenAiClient::from_config(&config.llm);
        let db_path = cli
            .database
            .clone()
            .unwrap_or_else(|| config.store.path.clone());
        let store = RedbStore::open(&db_path, Box::new(client.clone()))?;
        info!(database = %db_path.display(), "store opened");
        Ok(Self {
            store,
            client,
            attempts: config.llm.attempts,
        })
    }

    /// A compute context over the workbench collaborators.
    fn ctx(&mut self) -> ComputeContext<'_> {
        ComputeContext::with_attempts(&mut self.store, &self.client, &self.client, self.attempts)
    }
}

// =============================================================================
// BLOCK LOADING HELPERS
// =============================================================================

fn load_block(store: &RedbStore, id: &str) -> Result<Block, MnemonError> {
    let block_id = BlockId(id.to_string());
    let record = store
        .block_by_id(&block_id)?
        .ok_or(MnemonError::BlockNotFound(block_id))?;
    Ok(Block::from_record(record))
}

fn load_document(store: &RedbStore, id: &str) -> Result<Document, MnemonError> {
    let doc_id = DocumentId(id.to_string());
    Document::load(store, &doc_id)?.ok_or(MnemonError::DocumentNotFound(doc_id))
}

fn print_block(block: &Block, json_mode: bool) {
    if json_mode {
        let record = block.to_record();
        match serde_json::to_string_pretty(&record) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => println!("{{\"error\": \"{e}\"}}"),
        }
    } else {
        println!("{}", summary_line(&block.to_record()));
    }
}

// =============================================================================
// BLOCK COMMANDS
// =============================================================================

/// Create and compute a block from raw text.
pub fn cmd_create(
    bench: &mut Workbench,
    content: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut block = Block::new(content);
    block.compute(&mut bench.ctx(), "computed on create")?;
    print_block(&block, json_mode);
    Ok(())
}

/// Supersede a block with new text within its lineage.
pub fn cmd_edit(
    bench: &mut Workbench,
    block_id: &str,
    content: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut original = load_block(&bench.store, block_id)?;
    let mut edited = original.edit(&mut bench.ctx(), content)?;
    edited.compute(&mut bench.ctx(), "computed on edit")?;
    print_block(&edited, json_mode);
    Ok(())
}

/// Merge two or more blocks into a new block.
pub fn cmd_merge(
    bench: &mut Workbench,
    block_ids: &[String],
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut blocks = Vec::with_capacity(block_ids.len());
    for id in block_ids {
        blocks.push(load_block(&bench.store, id)?);
    }
    let mut iter = blocks.into_iter();
    let Some(first) = iter.next() else {
        return Ok(());
    };
    let mut merged = iter.fold(first, Block::merge);
    merged.compute(&mut bench.ctx(), "computed on merge")?;
    print_block(&merged, json_mode);
    Ok(())
}

/// Subtract the second block's information from the first.
pub fn cmd_diff(
    bench: &mut Workbench,
    left: &str,
    right: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let left_block = load_block(&bench.store, left)?;
    let right_block = load_block(&bench.store, right)?;
    let mut diff = left_block.difference(right_block);
    diff.compute(&mut bench.ctx(), "computed on diff")?;
    print_block(&diff, json_mode);
    Ok(())
}

/// Recompute a block onto current lineage tips.
pub fn cmd_rebase(
    bench: &mut Workbench,
    block_id: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let block = load_block(&bench.store, block_id)?;
    let rebased = block.recompute(&mut bench.ctx())?;
    if rebased.id() == block.id() {
        println!("unchanged: every ancestor lineage is already at its tip");
    }
    print_block(&rebased, json_mode);
    Ok(())
}

/// Show one block.
pub fn cmd_show(bench: &Workbench, block_id: &str, json_mode: bool) -> Result<(), MnemonError> {
    let block = load_block(&bench.store, block_id)?;
    print_block(&block, json_mode);
    Ok(())
}

/// Show the full history of the block's lineage.
pub fn cmd_history(bench: &Workbench, block_id: &str) -> Result<(), MnemonError> {
    let block = load_block(&bench.store, block_id)?;
    for line in lineage_history(&bench.store, &block)? {
        println!("{line}");
    }
    Ok(())
}

/// Show the block's ancestry trace.
pub fn cmd_trace(bench: &Workbench, block_id: &str) -> Result<(), MnemonError> {
    let block = load_block(&bench.store, block_id)?;
    for line in ancestry_trace(&bench.store, &block)? {
        println!("{line}");
    }
    Ok(())
}

/// Show the block's ancestry DAG as vertices and edges.
pub fn cmd_graph(bench: &Workbench, block_id: &str, json_mode: bool) -> Result<(), MnemonError> {
    let block = load_block(&bench.store, block_id)?;
    let graph = ancestry_graph(&bench.store, &block)?;

    if json_mode {
        let rendered = json!({
            "vertices": graph
                .vertices()
                .map(|v| json!({
                    "block": v.block.as_str(),
                    "lineage": v.lineage.as_str(),
                    "content": v.content,
                }))
                .collect::<Vec<_>>(),
            "edges": graph
                .edges()
                .map(|(parent, child)| json!([parent.as_str(), child.as_str()]))
                .collect::<Vec<_>>(),
        });
        println!("{rendered:#}");
    } else {
        println!(
            "{} vertices, {} edges",
            graph.vertex_count(),
            graph.edge_count()
        );
        for (parent, child) in graph.edges() {
            println!("{parent} -> {child}");
        }
    }
    Ok(())
}

/// Similarity search over the whole store.
pub fn cmd_search(
    bench: &Workbench,
    text: &str,
    distance: f64,
    limit: usize,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let hits = bench
        .store
        .similarity_search(text, None, distance, limit)?;
    if json_mode {
        let rendered = json!(
            hits.iter()
                .map(|hit| json!({
                    "distance": hit.distance,
                    "block": hit.record.id.as_str(),
                    "content": hit.record.content,
                }))
                .collect::<Vec<_>>()
        );
        println!("{rendered:#}");
    } else {
        for hit in &hits {
            println!("{:.4}  {}", hit.distance, summary_line(&hit.record));
        }
        if hits.is_empty() {
            println!("no blocks within distance {distance}");
        }
    }
    Ok(())
}

// =============================================================================
// DOCUMENT COMMANDS
// =============================================================================

fn print_document(doc: &Document, json_mode: bool) {
    if json_mode {
        match serde_json::to_string_pretty(&doc.to_record()) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => println!("{{\"error\": \"{e}\"}}"),
        }
    } else {
        let last_op = doc
            .operations()
            .last()
            .map_or_else(|| "-".to_string(), |entry| entry.op.to_string());
        println!(
            "[{}] {} members, last operation {last_op}",
            doc.id(),
            doc.block_ids().len()
        );
        for id in doc.block_ids() {
            println!("  {id}");
        }
    }
}

/// Create a document over existing blocks and persist it.
pub fn cmd_doc_new(
    bench: &mut Workbench,
    block_ids: &[String],
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut blocks = Vec::with_capacity(block_ids.len());
    for id in block_ids {
        blocks.push(load_block(&bench.store, id)?);
    }
    let mut doc = Document::new(blocks);
    doc.compute(&mut bench.ctx())?;
    print_document(&doc, json_mode);
    Ok(())
}

/// Insert a block into a document (plain insert).
pub fn cmd_doc_add(
    bench: &mut Workbench,
    doc_id: &str,
    block_id: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut doc = load_document(&bench.store, doc_id)?;
    let block = load_block(&bench.store, block_id)?;
    doc.insert(block)?;
    doc.compute(&mut bench.ctx())?;
    print_document(&doc, json_mode);
    Ok(())
}

/// Smart-insert new text into a document (semantic dedup).
pub fn cmd_doc_smart_add(
    bench: &mut Workbench,
    doc_id: &str,
    content: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut doc = load_document(&bench.store, doc_id)?;
    let block = Block::new(content);
    doc.insert_smart(&mut bench.ctx(), block)?;
    doc.compute(&mut bench.ctx())?;
    print_document(&doc, json_mode);
    Ok(())
}

/// Union of two documents.
pub fn cmd_doc_merge(
    bench: &mut Workbench,
    left: &str,
    right: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let left_doc = load_document(&bench.store, left)?;
    let right_doc = load_document(&bench.store, right)?;
    let mut union = left_doc.merge(right_doc);
    union.compute(&mut bench.ctx())?;
    print_document(&union, json_mode);
    Ok(())
}

/// Difference of two documents.
pub fn cmd_doc_diff(
    bench: &mut Workbench,
    left: &str,
    right: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let left_doc = load_document(&bench.store, left)?;
    let right_doc = load_document(&bench.store, right)?;
    let mut diff = left_doc.difference(&right_doc);
    diff.compute(&mut bench.ctx())?;
    print_document(&diff, json_mode);
    Ok(())
}

/// Show a document's members.
pub fn cmd_doc_show(bench: &mut Workbench, doc_id: &str) -> Result<(), MnemonError> {
    let mut doc = load_document(&bench.store, doc_id)?;
    let rendered = doc.render(&mut bench.ctx())?;
    print!("{rendered}");
    Ok(())
}

/// Compute every member and persist the document.
pub fn cmd_doc_compute(
    bench: &mut Workbench,
    doc_id: &str,
    json_mode: bool,
) -> Result<(), MnemonError> {
    let mut doc = load_document(&bench.store, doc_id)?;
    doc.compute(&mut bench.ctx())?;
    print_document(&doc, json_mode);
    Ok(())
}
