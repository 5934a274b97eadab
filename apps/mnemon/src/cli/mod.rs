//! # Mnemon CLI Module
//!
//! This module implements the CLI interface for Mnemon.
//!
//! ## Available Commands
//!
//! - `create` - Create a knowledge block from raw text
//! - `edit` - Supersede a block with new text
//! - `merge` - Merge two or more blocks (sum)
//! - `diff` - Subtract one block from another (sub)
//! - `rebase` - Recompute a block onto current lineage tips
//! - `show` - Show one block
//! - `history` - Show the block's lineage history
//! - `trace` - Show the block's ancestry trace
//! - `graph` - Show the block's ancestry DAG
//! - `search` - Similarity search over the whole store
//! - `doc` - Document operations (new/add/smart-add/merge/diff/show/compute)

mod commands;

use clap::{Parser, Subcommand};
use mnemon_core::MnemonError;
use mnemon_core::primitives::{DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_MAX_DISTANCE};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Mnemon - version-controlled knowledge blocks
///
/// Blocks are created, edited, merged, and differenced like commits in a
/// source-control DAG; content transforms are delegated to a text model.
#[derive(Parser, Debug)]
#[command(name = "mnemon")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the block database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short = 'C', long, global = true, default_value = "mnemon.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a knowledge block from raw text
    Create {
        /// The block content
        content: String,
    },

    /// Supersede a block with new text within its lineage
    Edit {
        /// Block id to supersede
        block: String,

        /// The new content
        content: String,
    },

    /// Merge two or more blocks into a new block (sum)
    Merge {
        /// Block ids to merge
        #[arg(required = true, num_args = 2..)]
        blocks: Vec<String>,
    },

    /// Subtract the second block's information from the first (sub)
    Diff {
        /// Block id to subtract from
        left: String,

        /// Block id whose information is removed
        right: String,
    },

    /// Recompute a block onto the current tip of every ancestor lineage
    Rebase {
        /// Block id to rebase
        block: String,
    },

    /// Show one block
    Show {
        /// Block id
        block: String,
    },

    /// Show the full history of the block's lineage
    History {
        /// Block id
        block: String,
    },

    /// Show the block's ancestry trace
    Trace {
        /// Block id
        block: String,
    },

    /// Show the block's ancestry DAG
    Graph {
        /// Block id
        block: String,
    },

    /// Similarity search over the whole store
    Search {
        /// Query text
        text: String,

        /// Maximal distance for a hit
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_MAX_DISTANCE)]
        distance: f64,

        /// Maximal number of hits
        #[arg(short = 'n', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Document operations
    #[command(subcommand)]
    Doc(DocCommands),
}

/// Document subcommands.
#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Create a document over existing blocks
    New {
        /// Member block ids
        blocks: Vec<String>,
    },

    /// Insert a block into a document (plain insert)
    Add {
        /// Document id
        doc: String,

        /// Block id to insert
        block: String,
    },

    /// Smart-insert new text into a document (semantic dedup)
    SmartAdd {
        /// Document id
        doc: String,

        /// The new content
        content: String,
    },

    /// Union of two documents
    Merge {
        /// First document id
        left: String,

        /// Second document id
        right: String,
    },

    /// Difference of two documents
    Diff {
        /// Document id to subtract from
        left: String,

        /// Document id whose members are removed
        right: String,
    },

    /// Show a document's members
    Show {
        /// Document id
        doc: String,
    },

    /// Compute every member and persist the document
    Compute {
        /// Document id
        doc: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), MnemonError> {
    let mut bench = Workbench::open(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Create { content } => cmd_create(&mut bench, &content, json_mode),
        Commands::Edit { block, content } => cmd_edit(&mut bench, &block, &content, json_mode),
        Commands::Merge { blocks } => cmd_merge(&mut bench, &blocks, json_mode),
        Commands::Diff { left, right } => cmd_diff(&mut bench, &left, &right, json_mode),
        Commands::Rebase { block } => cmd_rebase(&mut bench, &block, json_mode),
        Commands::Show { block } => cmd_show(&bench, &block, json_mode),
        Commands::History { block } => cmd_history(&bench, &block),
        Commands::Trace { block } => cmd_trace(&bench, &block),
        Commands::Graph { block } => cmd_graph(&bench, &block, json_mode),
        Commands::Search {
            text,
            distance,
            limit,
        } => cmd_search(&bench, &text, distance, limit, json_mode),
        Commands::Doc(doc_command) => match doc_command {
            DocCommands::New { blocks } => cmd_doc_new(&mut bench, &blocks, json_mode),
            DocCommands::Add { doc, block } => cmd_doc_add(&mut bench, &doc, &block, json_mode),
            DocCommands::SmartAdd { doc, content } => {
                cmd_doc_smart_add(&mut bench, &doc, &content, json_mode)
            }
            DocCommands::Merge { left, right } => {
                cmd_doc_merge(&mut bench, &left, &right, json_mode)
            }
            DocCommands::Diff { left, right } => {
                cmd_doc_diff(&mut bench, &left, &right, json_mode)
            }
            DocCommands::Show { doc } => cmd_doc_show(&mut bench, &doc),
            DocCommands::Compute { doc } => cmd_doc_compute(&mut bench, &doc, json_mode),
        },
    }
}
