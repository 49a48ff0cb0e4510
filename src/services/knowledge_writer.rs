//! Persists consolidated knowledge into the concept graph.

use super::ConceptService;
use crate::models::{
    ConceptRequest, ConsolidatedKnowledge, DomainContext, ExtractedConcept, ExtractedRelationship,
    ValidationMetadata,
};
use crate::{Error, Result};
use tracing::instrument;

/// Source recorded on validation metadata written by consolidation.
pub const CONSOLIDATION_SOURCE: &str = "consolidation";

/// Counts from one write of consolidated knowledge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Concepts upserted.
    pub concepts_written: usize,
    /// Logical relationships written (two edges each).
    pub relationships_written: usize,
    /// Beliefs carried by the knowledge (not persisted as nodes).
    pub beliefs_recorded: usize,
    /// Items rejected by validation and skipped.
    pub rejected: usize,
}

/// Writes extracted concepts and relationships through a [`ConceptService`].
///
/// Everything is written as consolidation output, so the confidence floor
/// applies. Items the service rejects as invalid are logged and skipped;
/// store failures abort the write.
#[derive(Clone)]
pub struct KnowledgeWriter {
    concepts: ConceptService,
}

impl KnowledgeWriter {
    /// Creates a writer over a concept service.
    #[must_use]
    pub const fn new(concepts: ConceptService) -> Self {
        Self { concepts }
    }

    /// Returns the underlying concept service.
    #[must_use]
    pub const fn concepts(&self) -> &ConceptService {
        &self.concepts
    }

    /// Writes `knowledge` into the graph.
    ///
    /// # Errors
    ///
    /// Returns the first store failure that outlived the retry budget.
    #[instrument(skip(self, knowledge), fields(
        concepts = knowledge.concepts.len(),
        relationships = knowledge.relationships.len()
    ))]
    pub fn write(&self, knowledge: &ConsolidatedKnowledge) -> Result<WriteStats> {
        let mut stats = WriteStats {
            beliefs_recorded: knowledge.beliefs.len(),
            ..WriteStats::default()
        };

        for concept in &knowledge.concepts {
            match self.concepts.store_concept(&concept_request(concept)) {
                Ok(_) => stats.concepts_written += 1,
                Err(Error::Validation(reason)) => {
                    tracing::warn!(name = %concept.name, %reason, "Skipping invalid concept");
                    stats.rejected += 1;
                },
                Err(e) => return Err(e),
            }
        }

        for relationship in &knowledge.relationships {
            let validation = validation_for(
                relationship.confidence,
                &relationship.domain_context,
                relationship.source_memory.as_ref().map(ToString::to_string),
            );
            match self.write_relationship(relationship, &validation) {
                Ok(()) => stats.relationships_written += 1,
                Err(Error::Validation(reason)) => {
                    tracing::warn!(
                        from = %relationship.from,
                        to = %relationship.to,
                        %reason,
                        "Skipping invalid relationship"
                    );
                    stats.rejected += 1;
                },
                Err(e) => return Err(e),
            }
        }

        metrics::counter!("consolidation_concepts_written_total")
            .increment(stats.concepts_written as u64);
        metrics::counter!("consolidation_relationships_written_total")
            .increment(stats.relationships_written as u64);

        Ok(stats)
    }

    fn write_relationship(
        &self,
        relationship: &ExtractedRelationship,
        validation: &ValidationMetadata,
    ) -> Result<()> {
        self.concepts.add_relationship(
            &relationship.from,
            &relationship.to,
            &relationship.relationship_type,
            validation,
        )
    }
}

fn concept_request(concept: &ExtractedConcept) -> ConceptRequest {
    let validation = validation_for(
        concept.confidence,
        &concept.domain_context,
        concept.source_memory.as_ref().map(ToString::to_string),
    );
    ConceptRequest::new(
        concept.name.clone(),
        concept.concept_type().as_str(),
        concept.description.clone(),
    )
    .with_validation(validation)
    .consolidation()
}

fn validation_for(
    confidence: f32,
    context: &DomainContext,
    source_memory: Option<String>,
) -> ValidationMetadata {
    let mut validation = ValidationMetadata::new(confidence, CONSOLIDATION_SOURCE)
        .with_domain(context.primary_domain);
    if let Some(memory_id) = source_memory {
        validation = validation.supported_by(memory_id);
    }
    if let Some(grant) = context.cross_domain.clone() {
        validation = validation.with_cross_domain(grant);
    }
    validation.finalize(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Belief, ConceptType, CrossDomainGrant, MemoryId, PrimaryDomain};
    use crate::storage::{InMemoryGraphBackend, ResilientGraphBackend, RetryConfig};
    use std::sync::Arc;

    fn writer() -> KnowledgeWriter {
        let graph = ResilientGraphBackend::new(InMemoryGraphBackend::new(), RetryConfig::default());
        KnowledgeWriter::new(ConceptService::new(Arc::new(graph)))
    }

    fn work() -> DomainContext {
        DomainContext::new(PrimaryDomain::Professional)
    }

    #[test]
    fn test_writes_concepts_with_floor_and_provenance() {
        let writer = writer();
        let knowledge = ConsolidatedKnowledge {
            concepts: vec![
                ExtractedConcept::new("planner", "Agent", "Agent with role planning", work())
                    .with_confidence(0.4)
                    .from_memory(&MemoryId::new("m1")),
            ],
            ..ConsolidatedKnowledge::default()
        };

        let stats = writer.write(&knowledge).unwrap();
        assert_eq!(stats.concepts_written, 1);

        let stored = writer.concepts().get_concept("planner").unwrap().unwrap();
        assert_eq!(stored.concept_type, ConceptType::Entity);
        assert!(stored.is_consolidation);
        assert!((stored.validation.confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(stored.validation.source, CONSOLIDATION_SOURCE);
        assert_eq!(stored.validation.domain, PrimaryDomain::Professional);
        assert_eq!(stored.validation.supported_by, vec!["m1".to_string()]);
    }

    #[test]
    fn test_relationships_create_stubs_and_edge_pairs() {
        let writer = writer();
        let knowledge = ConsolidatedKnowledge {
            relationships: vec![ExtractedRelationship::new(
                "planner",
                "Deploy",
                "assigned_to",
                work(),
            )],
            beliefs: vec![Belief::new(
                "planner",
                "interacted_with",
                "reviewer",
                0.9,
                work(),
                "m1",
            )],
            ..ConsolidatedKnowledge::default()
        };

        let stats = writer.write(&knowledge).unwrap();
        assert_eq!(stats.relationships_written, 1);
        assert_eq!(stats.beliefs_recorded, 1);
        assert_eq!(writer.concepts().count_concepts().unwrap(), 2);
        assert_eq!(writer.concepts().count_relationships().unwrap(), 2);
    }

    #[test]
    fn test_invalid_concept_is_skipped() {
        let writer = writer();
        let knowledge = ConsolidatedKnowledge {
            concepts: vec![
                ExtractedConcept::new("empty", "Task", "", work()),
                ExtractedConcept::new("Deploy", "Task", "Ship it", work()),
            ],
            ..ConsolidatedKnowledge::default()
        };

        let stats = writer.write(&knowledge).unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.concepts_written, 1);
    }

    #[test]
    fn test_cross_domain_grant_is_recorded() {
        let writer = writer();
        let context = work().with_cross_domain(CrossDomainGrant::approved(
            PrimaryDomain::Professional,
            PrimaryDomain::System,
            "shared runbook",
        ));
        let knowledge = ConsolidatedKnowledge {
            concepts: vec![ExtractedConcept::new("Runbook", "entity", "Ops notes", context)],
            ..ConsolidatedKnowledge::default()
        };

        writer.write(&knowledge).unwrap();
        let stored = writer.concepts().get_concept("Runbook").unwrap().unwrap();
        assert!(stored.validation.cross_domain.is_some_and(|g| g.approved));
    }
}
