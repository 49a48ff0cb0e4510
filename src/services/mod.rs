//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations:
//! concept persistence, knowledge extraction, and the consolidation cycle.

pub mod chunking;
mod concept;
mod consolidation;
mod domain_transfer;
mod knowledge_writer;
pub mod patterns;

pub use chunking::{ContentChunk, TextChunker};
pub use concept::ConceptService;
pub use consolidation::{
    ConsolidationConfig, ConsolidationManager, ConsolidationStats, DEFAULT_CANDIDATE_THRESHOLD,
    DEFAULT_CONSOLIDATION_INTERVAL_SECS, DEFAULT_IMPORTANCE_THRESHOLD,
};
pub use domain_transfer::validate_transfer;
pub use knowledge_writer::{CONSOLIDATION_SOURCE, KnowledgeWriter, WriteStats};
pub use patterns::{
    AgentInteractionPattern, Applicability, ConsolidationPattern, TopicCooccurrencePattern,
};
