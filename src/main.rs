//! Binary entry point for mnemo.
//!
//! This binary provides the CLI interface for the mnemo consolidation engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{ConceptAction, ConsolidateArgs};
use mnemo::MnemoConfig;
use mnemo::observability::{self, InitOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Mnemo - consolidates episodic memory into a semantic knowledge graph.
#[derive(Parser)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MNEMO_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Graph database path (overrides configuration).
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run one consolidation cycle over a memory file.
    Consolidate {
        #[command(flatten)]
        args: ConsolidateArgs,

        /// Print the extracted knowledge as JSON without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run consolidation whenever a trigger fires.
    Watch {
        #[command(flatten)]
        args: ConsolidateArgs,

        /// Seconds between trigger checks.
        #[arg(long, default_value = "10")]
        tick_secs: u64,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<usize>,
    },

    /// Store and look up concepts.
    Concept {
        /// Concept subcommand.
        #[command(subcommand)]
        action: ConceptAction,
    },

    /// Split a text file into chunks.
    Chunk {
        /// File to chunk, `-` for stdin.
        file: PathBuf,

        /// Maximum chunk length in characters.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters carried over from the previous chunk.
        #[arg(long)]
        overlap: Option<usize>,

        /// Drop chunks shorter than this.
        #[arg(long)]
        min_chunk_size: Option<usize>,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and graph statistics.
    Status,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match MnemoConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(graph) = &cli.graph {
        config.storage.graph_path = Some(graph.clone());
    }

    let expose_metrics = matches!(cli.command, Commands::Watch { .. });
    let _observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, config: MnemoConfig) -> anyhow::Result<()> {
    match command {
        Commands::Consolidate { args, dry_run } => {
            commands::cmd_consolidate(&config, &args, dry_run)
        },
        Commands::Watch {
            args,
            tick_secs,
            max_cycles,
        } => commands::cmd_watch(config, args, tick_secs, max_cycles).await,
        Commands::Concept { action } => commands::cmd_concept(&config, action),
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
            min_chunk_size,
            json,
        } => {
            let mut chunker = config.chunking;
            if let Some(size) = chunk_size {
                chunker.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                chunker.overlap = overlap;
            }
            if let Some(min) = min_chunk_size {
                chunker.min_chunk_size = min;
            }
            commands::cmd_chunk(&file, chunker, json)
        },
        Commands::Status => commands::cmd_status(&config),
    }
}
