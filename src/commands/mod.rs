//! Command handlers module.
//!
//! - `consolidate.rs`: one-shot consolidation and the watch loop
//! - `concept.rs`: concept store/get/search/query
//! - `inspect.rs`: chunk and status

mod concept;
mod consolidate;
mod inspect;

pub use concept::{ConceptAction, cmd_concept};
pub use consolidate::{ConsolidateArgs, cmd_consolidate, cmd_watch};
pub use inspect::{cmd_chunk, cmd_status};

use anyhow::Context;
use mnemo::MnemoConfig;
use mnemo::models::PrimaryDomain;
use mnemo::services::ConceptService;
use mnemo::storage::open_graph;

/// Opens the configured graph behind the retry executor.
fn concept_service(config: &MnemoConfig) -> anyhow::Result<ConceptService> {
    let path = config.storage.resolved_graph_path();
    let graph = open_graph(Some(&path), config.storage.retry)
        .with_context(|| format!("opening graph at {}", path.display()))?;
    Ok(ConceptService::new(graph))
}

/// Parses a domain name, rejecting unknown names.
fn parse_domain(s: &str) -> anyhow::Result<PrimaryDomain> {
    PrimaryDomain::parse(s).with_context(|| {
        let known: Vec<&str> = PrimaryDomain::all().iter().map(PrimaryDomain::as_str).collect();
        format!("unknown domain '{s}' (expected one of: {})", known.join(", "))
    })
}
