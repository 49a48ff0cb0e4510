//! Data models for mnemo.
//!
//! Episodic input types, domain classification, the concept graph, and the
//! output of a consolidation run.

mod concept;
mod domain;
mod knowledge;
mod memory;
mod validation;

pub use concept::{
    Concept, ConceptRelationship, ConceptRequest, ConceptType, DEFAULT_RELATIONSHIP_TYPE,
    KnowledgeQuery, RELATED_TO, RelationshipDirection,
};
pub use domain::{CrossDomainGrant, DomainContext, PrimaryDomain, SYNTHESIZED_DOMAIN_CONFIDENCE};
pub use knowledge::{
    Belief, ConsolidatedKnowledge, CrossDomainTransfer, ExtractedConcept, ExtractedRelationship,
    ExtractionResult, TRANSFER_DENIED_REASON,
};
pub use memory::{Memory, MemoryContent, MemoryId};
pub use validation::{
    CONSOLIDATION_CONFIDENCE_FLOOR, ValidationMetadata, parse_validation,
};
