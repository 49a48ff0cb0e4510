//! Consolidation output types.
//!
//! Extraction patterns produce candidate concepts, relationships, and beliefs
//! tagged with the domain context they were extracted under. The consolidation
//! manager merges per-pattern [`ExtractionResult`]s into a single
//! [`ConsolidatedKnowledge`].

use super::{ConceptType, DomainContext, MemoryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reason recorded when a memory is skipped at the domain gate.
pub const TRANSFER_DENIED_REASON: &str = "Domain transfer validation failed";

/// A concept candidate produced by an extraction pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedConcept {
    /// Concept name.
    pub name: String,
    /// Pattern-level kind (e.g. "Agent", "Task", "Capability").
    #[serde(rename = "type")]
    pub kind: String,
    /// Description.
    pub description: String,
    /// Domain context the concept was extracted under.
    pub domain_context: DomainContext,
    /// Extraction confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Memory the concept was extracted from.
    #[serde(default)]
    pub source_memory: Option<MemoryId>,
    /// Extra attributes copied from the memory payload.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ExtractedConcept {
    /// Creates a concept candidate.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        domain_context: DomainContext,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
            domain_context,
            confidence: 1.0,
            source_memory: None,
            properties: Map::new(),
        }
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Records the source memory.
    #[must_use]
    pub fn from_memory(mut self, memory_id: &MemoryId) -> Self {
        self.source_memory = Some(memory_id.clone());
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Maps the pattern-level kind onto the graph's closed concept types.
    #[must_use]
    pub fn concept_type(&self) -> ConceptType {
        match self.kind.to_lowercase().as_str() {
            "task" | "action" => ConceptType::Action,
            "capability" | "property" => ConceptType::Property,
            "interaction" | "event" => ConceptType::Event,
            "topic" | "abstract" => ConceptType::Abstract,
            _ => ConceptType::Entity,
        }
    }

    /// Deduplication key: `(name, domain_context)`.
    #[must_use]
    pub fn dedup_key(&self) -> (String, DomainContext) {
        (self.name.clone(), self.domain_context.clone())
    }
}

/// A relationship candidate produced by an extraction pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    /// Source concept name.
    pub from: String,
    /// Target concept name.
    pub to: String,
    /// Relationship type (e.g. "assigned_to").
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Domain context the relationship was extracted under.
    pub domain_context: DomainContext,
    /// Extraction confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Memory the relationship was extracted from.
    #[serde(default)]
    pub source_memory: Option<MemoryId>,
}

impl ExtractedRelationship {
    /// Creates a relationship candidate.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relationship_type: impl Into<String>,
        domain_context: DomainContext,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relationship_type: relationship_type.into(),
            domain_context,
            confidence: 1.0,
            source_memory: None,
        }
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Records the source memory.
    #[must_use]
    pub fn from_memory(mut self, memory_id: &MemoryId) -> Self {
        self.source_memory = Some(memory_id.clone());
        self
    }

    /// Deduplication key: `(from, to, type, domain_context)`.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, String, DomainContext) {
        (
            self.from.clone(),
            self.to.clone(),
            self.relationship_type.clone(),
            self.domain_context.clone(),
        )
    }
}

/// A subject-predicate-object statement held with some confidence.
///
/// Beliefs are produced by extraction only; the graph layer does not persist them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// Statement subject.
    pub subject: String,
    /// Statement predicate.
    pub predicate: String,
    /// Statement object.
    pub object: String,
    /// Confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Domain context the belief was extracted under.
    pub domain_context: DomainContext,
    /// Origin of the belief (pattern name or memory id).
    pub source: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Belief {
    /// Creates a belief stamped with the current time.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        confidence: f32,
        domain_context: DomainContext,
        source: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: confidence.clamp(0.0, 1.0),
            domain_context,
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// Deduplication key: `(subject, predicate, object, domain_context)`.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, String, DomainContext) {
        (
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
            self.domain_context.clone(),
        )
    }
}

/// Record of an attempted cross-domain transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossDomainTransfer {
    /// Domain context of the memory.
    pub source: DomainContext,
    /// Requested target domain context.
    pub target: DomainContext,
    /// Whether the transfer was allowed.
    pub success: bool,
    /// Human-readable reason.
    pub reason: String,
    /// Memory the transfer concerned.
    #[serde(default)]
    pub memory_id: Option<MemoryId>,
}

impl CrossDomainTransfer {
    /// Records a denied transfer.
    #[must_use]
    pub fn denied(source: DomainContext, target: DomainContext, memory_id: &MemoryId) -> Self {
        Self {
            source,
            target,
            success: false,
            reason: TRANSFER_DENIED_REASON.to_string(),
            memory_id: Some(memory_id.clone()),
        }
    }
}

/// Output of one pattern invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Concept candidates.
    pub concepts: Vec<ExtractedConcept>,
    /// Relationship candidates.
    pub relationships: Vec<ExtractedRelationship>,
    /// Beliefs.
    pub beliefs: Vec<Belief>,
    /// Domain context the extraction ran under.
    pub domain_context: Option<DomainContext>,
    /// Attempted cross-domain transfers.
    pub cross_domain_transfers: Vec<CrossDomainTransfer>,
}

impl ExtractionResult {
    /// Creates an empty result for the given context.
    #[must_use]
    pub fn for_context(domain_context: Option<DomainContext>) -> Self {
        Self {
            domain_context,
            ..Self::default()
        }
    }
}

/// Merged, deduplicated output of an `extract_knowledge` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedKnowledge {
    /// Deduplicated concepts.
    pub concepts: Vec<ExtractedConcept>,
    /// Deduplicated relationships.
    pub relationships: Vec<ExtractedRelationship>,
    /// Deduplicated beliefs.
    pub beliefs: Vec<Belief>,
    /// Target domain context of the run, if any.
    pub domain_context: Option<DomainContext>,
    /// Every attempted cross-domain transfer.
    pub cross_domain_transfers: Vec<CrossDomainTransfer>,
    /// Distinct knowledge verticals seen across the input memories.
    pub knowledge_verticals: Vec<String>,
}

impl ConsolidatedKnowledge {
    /// Returns the concepts extracted under `domain_context`.
    #[must_use]
    pub fn concepts_in(&self, domain_context: &DomainContext) -> Vec<&ExtractedConcept> {
        self.concepts
            .iter()
            .filter(|c| &c.domain_context == domain_context)
            .collect()
    }

    /// Returns the number of denied transfers.
    #[must_use]
    pub fn denied_transfers(&self) -> usize {
        self.cross_domain_transfers
            .iter()
            .filter(|t| !t.success)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrimaryDomain;
    use test_case::test_case;

    #[test_case("Agent", ConceptType::Entity)]
    #[test_case("Task", ConceptType::Action)]
    #[test_case("Capability", ConceptType::Property)]
    #[test_case("Interaction", ConceptType::Event)]
    #[test_case("Topic", ConceptType::Abstract)]
    #[test_case("entity", ConceptType::Entity)]
    #[test_case("Something", ConceptType::Entity)]
    fn test_kind_maps_to_concept_type(kind: &str, expected: ConceptType) {
        let concept = ExtractedConcept::new("x", kind, "", DomainContext::general());
        assert_eq!(concept.concept_type(), expected);
    }

    #[test]
    fn test_dedup_key_uses_structural_domain() {
        let a = ExtractedConcept::new(
            "Deploy",
            "Task",
            "first",
            DomainContext::new(PrimaryDomain::Professional).with_confidence(0.9),
        );
        let b = ExtractedConcept::new(
            "Deploy",
            "Task",
            "second",
            DomainContext::new(PrimaryDomain::Professional),
        );
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_denied_transfer_serializes_success_false() {
        let transfer = CrossDomainTransfer::denied(
            DomainContext::new(PrimaryDomain::Personal),
            DomainContext::new(PrimaryDomain::Professional),
            &MemoryId::new("m1"),
        );
        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["reason"], serde_json::json!(TRANSFER_DENIED_REASON));
    }
}
