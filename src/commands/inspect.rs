//! Inspection commands: chunk and status.

use super::concept_service;
use anyhow::Context;
use mnemo::MnemoConfig;
use mnemo::services::TextChunker;
use std::io::Read;
use std::path::Path;

/// Chunk command.
pub fn cmd_chunk(file: &Path, chunker: TextChunker, json: bool) -> anyhow::Result<()> {
    let text = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?
    };

    let chunks = chunker.chunk(&text);
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!(
        "{} chunks (size {}, overlap {}, min {}):",
        chunks.len(),
        chunker.chunk_size,
        chunker.overlap,
        chunker.min_chunk_size
    );
    for (i, chunk) in chunks.iter().enumerate() {
        println!();
        println!("--- chunk {i} ({} chars) ---", chunk.chars().count());
        println!("{chunk}");
    }
    Ok(())
}

/// Status command.
pub fn cmd_status(config: &MnemoConfig) -> anyhow::Result<()> {
    let graph_path = config.storage.resolved_graph_path();
    let service = concept_service(config)?;

    println!("Mnemo Status");
    println!("============");
    println!();
    println!("Graph: {}", graph_path.display());
    println!("  Concepts:      {}", service.count_concepts()?);
    println!("  Relationships: {}", service.count_relationships()?);
    println!();
    println!("Configuration:");
    print!("{}", config.to_toml()?);
    Ok(())
}
