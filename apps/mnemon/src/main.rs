//! # Mnemon - Version-Controlled Knowledge Blocks
//!
//! The main binary for the Mnemon versioning engine.
//!
//! This application provides a CLI over the engine plus the real
//! collaborator implementations (OpenAI-compatible chat and embedding
//! endpoints, redb-backed store).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  apps/mnemon (THE BINARY)                  │
//! │                                                            │
//! │  ┌──────────┐   ┌───────────────┐   ┌──────────────────┐  │
//! │  │   CLI    │   │  OpenAiClient │   │     Config       │  │
//! │  │  (clap)  │   │  (reqwest)    │   │     (toml)       │  │
//! │  └─────┬────┘   └───────┬───────┘   └────────┬─────────┘  │
//! │        │                │                    │            │
//! │        └────────────────┼────────────────────┘            │
//! │                         ▼                                 │
//! │                 ┌───────────────┐                         │
//! │                 │  mnemon-core  │                         │
//! │                 │  (THE LOGIC)  │                         │
//! │                 └───────────────┘                         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Create two blocks and merge them
//! mnemon create "The sky is blue."
//! mnemon create "Water is wet."
//! mnemon merge blk_… blk_…
//!
//! # Inspect provenance
//! mnemon history blk_…
//! mnemon trace blk_…
//! ```

mod cli;
mod config;
mod llm;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing — MNEMON_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MNEMON_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "mnemon=debug,mnemon_core=debug"
    } else {
        "mnemon=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Mnemon startup banner.
fn print_banner() {
    println!(
        r"
  ███╗   ███╗███╗   ██╗███████╗███╗   ███╗ ██████╗ ███╗   ██╗
  ████╗ ████║████╗  ██║██╔════╝████╗ ████║██╔═══██╗████╗  ██║
  ██╔████╔██║██╔██╗ ██║█████╗  ██╔████╔██║██║   ██║██╔██╗ ██║
  ██║╚██╔╝██║██║╚██╗██║██╔══╝  ██║╚██╔╝██║██║   ██║██║╚██╗██║
  ██║ ╚═╝ ██║██║ ╚████║███████╗██║ ╚═╝ ██║╚██████╔╝██║ ╚████║
  ╚═╝     ╚═╝╚═╝  ╚═══╝╚══════╝╚═╝     ╚═╝ ╚═════╝ ╚═╝  ╚═══╝

  Knowledge Blocks v{}

  Versioned • Merged • Rebased
",
        env!("CARGO_PKG_VERSION")
    );
}
