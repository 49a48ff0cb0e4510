//! Concept service for semantic memory operations.
//!
//! Wraps a [`GraphBackend`] with validation, the consolidation confidence
//! floor, pending-stub creation, and forward/reverse relationship
//! materialization.
//!
//! # Example
//!
//! ```rust
//! use mnemo::models::ConceptRequest;
//! use mnemo::services::ConceptService;
//! use mnemo::storage::{InMemoryGraphBackend, ResilientGraphBackend, RetryConfig};
//! use std::sync::Arc;
//!
//! let graph = ResilientGraphBackend::new(InMemoryGraphBackend::new(), RetryConfig::default());
//! let service = ConceptService::new(Arc::new(graph));
//!
//! service.store_concept(&ConceptRequest::new("Python", "entity", "A language").with_related(["Rust"]))?;
//!
//! let rust = service.get_concept("Rust")?.expect("stub created");
//! assert!(rust.concept_type.is_pending());
//! assert!(rust.related.contains("Python"));
//! # Ok::<(), mnemo::Error>(())
//! ```

use crate::models::{
    Concept, ConceptRelationship, ConceptRequest, ConceptType, DEFAULT_RELATIONSHIP_TYPE,
    KnowledgeQuery, ValidationMetadata,
};
use crate::storage::GraphBackend;
use crate::storage::graph::codec::{decode_concept, decode_edge, encode_concept, encode_edge};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// High-level service for concept graph operations.
///
/// # Thread Safety
///
/// The service is `Send + Sync`; share it behind an `Arc`.
#[derive(Clone)]
pub struct ConceptService {
    graph: Arc<dyn GraphBackend>,
}

impl ConceptService {
    /// Creates a service over a shared graph backend.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphBackend>) -> Self {
        Self { graph }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn graph(&self) -> &dyn GraphBackend {
        self.graph.as_ref()
    }

    /// Stores a concept, creating or updating it by name.
    ///
    /// Missing related concepts are created as pending stubs and every related
    /// name gets a forward/reverse `RELATED_TO` pair carrying the concept's
    /// validation metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty name or description, an
    /// unknown type, or an out-of-range confidence. Store failures surface
    /// once the retry budget is spent; edges already written stay written.
    #[instrument(skip(self, request), fields(name = %request.name, concept_type = %request.concept_type))]
    pub fn store_concept(&self, request: &ConceptRequest) -> Result<Concept> {
        let start = Instant::now();
        let result = self.store_concept_inner(request);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "concept_operations_total",
            "operation" => "store",
            "status" => status
        )
        .increment(1);
        metrics::histogram!("concept_operation_duration_ms", "operation" => "store")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    fn store_concept_inner(&self, request: &ConceptRequest) -> Result<Concept> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("concept name must not be empty".to_string()));
        }
        if request.description.trim().is_empty() {
            return Err(Error::Validation(format!(
                "concept '{name}' needs a description"
            )));
        }
        let concept_type = ConceptType::parse(&request.concept_type).ok_or_else(|| {
            Error::Validation(format!(
                "unknown concept type '{}' for '{name}'",
                request.concept_type
            ))
        })?;
        if request.related.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "concept '{name}' lists an empty related name"
            )));
        }

        let validation = request.validation.clone().unwrap_or_default();
        validation.validate()?;
        let validation = validation.finalize(request.is_consolidation);

        let mut concept = Concept::new(name, concept_type, request.description.clone());
        concept.validation = validation;
        concept.is_consolidation = request.is_consolidation;
        concept.related = request
            .related
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| {
                let is_self = r == name;
                if is_self {
                    tracing::debug!(name, "Ignoring self-relation");
                }
                !is_self
            })
            .collect::<BTreeSet<_>>();

        self.graph.upsert_concept(&encode_concept(&concept)?)?;

        for related in &concept.related {
            self.link(
                &concept.name,
                related,
                DEFAULT_RELATIONSHIP_TYPE,
                &concept.validation,
            )?;
        }

        tracing::debug!(related = concept.related.len(), "Stored concept");
        Ok(concept)
    }

    /// Relates two concepts with a forward/reverse edge pair of the given type.
    ///
    /// Endpoints that do not exist yet are created as pending stubs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty names or type, or an
    /// out-of-range confidence; store failures otherwise.
    #[instrument(skip(self, validation))]
    pub fn add_relationship(
        &self,
        from: &str,
        to: &str,
        relationship_type: &str,
        validation: &ValidationMetadata,
    ) -> Result<()> {
        if from.trim().is_empty() || to.trim().is_empty() || relationship_type.trim().is_empty() {
            return Err(Error::Validation(
                "relationship endpoints and type must not be empty".to_string(),
            ));
        }
        validation.validate()?;

        self.ensure_exists(from)?;
        self.link(from, to, relationship_type, validation)
    }

    fn ensure_exists(&self, name: &str) -> Result<()> {
        let created = self
            .graph
            .create_concept_if_absent(&encode_concept(&Concept::pending_stub(name))?)?;
        if created {
            tracing::debug!(name, "Created pending concept stub");
            metrics::counter!("concept_pending_stubs_total").increment(1);
        }
        Ok(())
    }

    fn link(
        &self,
        from: &str,
        to: &str,
        relationship_type: &str,
        validation: &ValidationMetadata,
    ) -> Result<()> {
        self.ensure_exists(to)?;
        for edge in ConceptRelationship::pair(from, to, relationship_type, validation) {
            self.graph.upsert_edge(&encode_edge(&edge)?)?;
        }
        Ok(())
    }

    /// Returns a concept with its outgoing and incoming edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    #[instrument(skip(self))]
    pub fn get_concept(&self, name: &str) -> Result<Option<Concept>> {
        self.graph
            .get_concept(name)?
            .map(|record| self.hydrate(decode_concept(&record)))
            .transpose()
    }

    /// Finds concepts whose name or description contains `query`,
    /// ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self))]
    pub fn search_concepts(&self, query: &str) -> Result<Vec<Concept>> {
        self.query_knowledge(&KnowledgeQuery::new().with_text(query))
    }

    /// Finds concepts matching a structured filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self, filter))]
    pub fn query_knowledge(&self, filter: &KnowledgeQuery) -> Result<Vec<Concept>> {
        self.graph
            .find_concepts(filter)?
            .iter()
            .map(|record| self.hydrate(decode_concept(record)))
            .collect()
    }

    /// Returns the number of concept nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn count_concepts(&self) -> Result<usize> {
        self.graph.count_concepts()
    }

    /// Returns the number of directed `RELATED_TO` edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn count_relationships(&self) -> Result<usize> {
        self.graph.count_edges()
    }

    fn hydrate(&self, concept: Concept) -> Result<Concept> {
        let relationships = self
            .graph
            .edges_for(&concept.name)?
            .iter()
            .map(decode_edge)
            .collect();
        Ok(concept.with_relationships(relationships))
    }
}
