// Allow non-const functions that use String/Vec operations
#![allow(clippy::missing_const_for_fn)]

//! Semantic memory types for the concept graph.
//!
//! Concepts are the nodes of the knowledge graph, keyed globally by name.
//! Relationships between concepts are materialized as pairs of directed
//! `RELATED_TO` edges so that traversals from either end see the same
//! metadata.
//!
//! # Concept Types
//!
//! | Type | Description | Examples |
//! |------|-------------|----------|
//! | `Entity` | Things, people, systems | "Python", "Alice" |
//! | `Action` | Activities and tasks | "Deploy", "Review PR" |
//! | `Property` | Attributes and capabilities | "Fast", "Can translate" |
//! | `Event` | Things that happened | "Outage on Monday" |
//! | `Abstract` | Ideas and principles | "Idempotency" |
//! | `Pending` | Auto-created relationship target stub | - |
//!
//! # Example
//!
//! ```rust
//! use mnemo::models::{ConceptRequest, ConceptType};
//!
//! let request = ConceptRequest::new("Python", "entity", "A language")
//!     .with_related(["Programming"]);
//! assert_eq!(ConceptType::parse(&request.concept_type), Some(ConceptType::Entity));
//! ```

use super::{PrimaryDomain, ValidationMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Edge label used for every concept-to-concept relationship.
pub const RELATED_TO: &str = "RELATED_TO";

/// Default relationship `type` property for related-concept pairs.
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "related_to";

/// Closed enumeration of concept types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptType {
    /// Things, people, systems.
    Entity,
    /// Activities and tasks.
    Action,
    /// Attributes and capabilities.
    Property,
    /// Things that happened.
    Event,
    /// Ideas and principles.
    Abstract,
    /// Placeholder created for a relationship target that does not exist yet.
    Pending,
}

impl ConceptType {
    /// Returns all concept type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Entity,
            Self::Action,
            Self::Property,
            Self::Event,
            Self::Abstract,
            Self::Pending,
        ]
    }

    /// Returns the concept type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Action => "action",
            Self::Property => "property",
            Self::Event => "event",
            Self::Abstract => "abstract",
            Self::Pending => "pending",
        }
    }

    /// Parses a concept type (case-insensitive). Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entity" => Some(Self::Entity),
            "action" => Some(Self::Action),
            "property" => Some(Self::Property),
            "event" => Some(Self::Event),
            "abstract" => Some(Self::Abstract),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    /// Returns `true` for auto-created stubs.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConceptType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown concept type: {s}"))
    }
}

/// Which end of a logical relation an edge was written from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipDirection {
    /// Edge from the concept that declared the relation.
    Forward,
    /// Mirror edge pointing back at the declaring concept.
    Reverse,
}

impl RelationshipDirection {
    /// Returns the direction as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }

    /// Parses a direction.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(Self::Forward),
            "reverse" => Some(Self::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed `RELATED_TO` edge between two concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRelationship {
    /// Source concept name.
    pub from: String,
    /// Target concept name.
    pub to: String,
    /// Relationship type property.
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Whether this edge is half of a forward/reverse pair.
    pub bidirectional: bool,
    /// Which half of the pair this edge is.
    pub direction: RelationshipDirection,
    /// Validation metadata shared by both halves.
    pub validation: ValidationMetadata,
}

impl ConceptRelationship {
    /// Builds the forward and reverse edges for a logical relation `from -> to`.
    #[must_use]
    pub fn pair(
        from: &str,
        to: &str,
        relationship_type: &str,
        validation: &ValidationMetadata,
    ) -> [Self; 2] {
        [
            Self {
                from: from.to_string(),
                to: to.to_string(),
                relationship_type: relationship_type.to_string(),
                bidirectional: true,
                direction: RelationshipDirection::Forward,
                validation: validation.clone(),
            },
            Self {
                from: to.to_string(),
                to: from.to_string(),
                relationship_type: relationship_type.to_string(),
                bidirectional: true,
                direction: RelationshipDirection::Reverse,
                validation: validation.clone(),
            },
        ]
    }

    /// Returns the name at the other end of the edge, seen from `name`.
    #[must_use]
    pub fn other_end(&self, name: &str) -> &str {
        if self.from == name { &self.to } else { &self.from }
    }
}

/// A node of the semantic knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Globally unique name.
    pub name: String,
    /// Concept type.
    #[serde(rename = "type")]
    pub concept_type: ConceptType,
    /// Human-readable description.
    pub description: String,
    /// Names of related concepts.
    pub related: BTreeSet<String>,
    /// Validation metadata.
    pub validation: ValidationMetadata,
    /// Whether the concept was written by consolidation.
    pub is_consolidation: bool,
    /// Outgoing and incoming edges, populated when read back from the graph.
    #[serde(default)]
    pub relationships: Vec<ConceptRelationship>,
}

impl Concept {
    /// Creates a concept with default validation and no relations.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        concept_type: ConceptType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            concept_type,
            description: description.into(),
            related: BTreeSet::new(),
            validation: ValidationMetadata::default(),
            is_consolidation: false,
            relationships: Vec::new(),
        }
    }

    /// Creates a pending stub for a relationship target that does not exist yet.
    #[must_use]
    pub fn pending_stub(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("Pending concept: {name}");
        Self::new(name, ConceptType::Pending, description)
    }

    /// Attaches hydrated relationships and derives `related` from them.
    #[must_use]
    pub fn with_relationships(mut self, relationships: Vec<ConceptRelationship>) -> Self {
        self.related = relationships
            .iter()
            .map(|rel| rel.other_end(&self.name).to_string())
            .collect();
        self.relationships = relationships;
        self
    }

    /// Returns the relationships connecting this concept to `other`.
    #[must_use]
    pub fn relationships_with<'a>(&'a self, other: &'a str) -> Vec<&'a ConceptRelationship> {
        self.relationships
            .iter()
            .filter(|rel| rel.other_end(&self.name) == other)
            .collect()
    }
}

/// Input for storing a concept.
///
/// The type is kept as raw text so the persistence layer can reject values
/// outside the closed enumeration with a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptRequest {
    /// Concept name (unique key).
    pub name: String,
    /// Raw concept type.
    #[serde(rename = "type")]
    pub concept_type: String,
    /// Description.
    pub description: String,
    /// Names of related concepts.
    #[serde(default)]
    pub related: Vec<String>,
    /// Validation metadata; defaults when absent.
    #[serde(default)]
    pub validation: Option<ValidationMetadata>,
    /// Whether the write comes from consolidation.
    #[serde(default)]
    pub is_consolidation: bool,
}

impl ConceptRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        concept_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            concept_type: concept_type.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Adds related concept names.
    #[must_use]
    pub fn with_related(mut self, related: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.related.extend(related.into_iter().map(Into::into));
        self
    }

    /// Sets the validation metadata.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationMetadata) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Marks the request as written by consolidation.
    #[must_use]
    pub fn consolidation(mut self) -> Self {
        self.is_consolidation = true;
        self
    }
}

/// Filter for knowledge queries.
///
/// All set fields must match. Validation predicates are evaluated against the
/// stored validation metadata of each concept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeQuery {
    /// Exact concept names.
    pub names: Option<Vec<String>>,
    /// Case-insensitive substring of the description.
    pub description_pattern: Option<String>,
    /// Case-insensitive substring of name or description.
    pub text: Option<String>,
    /// Concept type.
    pub concept_type: Option<ConceptType>,
    /// `validation.domain`.
    pub domain: Option<PrimaryDomain>,
    /// `validation.access_domain`.
    pub access_domain: Option<PrimaryDomain>,
    /// `validation.cross_domain.approved`.
    pub cross_domain_approved: Option<bool>,
    /// `validation.cross_domain.requested`.
    pub cross_domain_requested: Option<bool>,
    /// `validation.cross_domain.source_domain`.
    pub cross_domain_source: Option<PrimaryDomain>,
    /// `validation.cross_domain.target_domain`.
    pub cross_domain_target: Option<PrimaryDomain>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl KnowledgeQuery {
    /// Creates an empty query (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given names.
    #[must_use]
    pub fn with_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to descriptions containing `pattern`.
    #[must_use]
    pub fn with_description_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.description_pattern = Some(pattern.into());
        self
    }

    /// Restricts to names or descriptions containing `text`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Restricts to a concept type.
    #[must_use]
    pub fn with_type(mut self, concept_type: ConceptType) -> Self {
        self.concept_type = Some(concept_type);
        self
    }

    /// Restricts to `validation.domain`.
    #[must_use]
    pub fn with_domain(mut self, domain: PrimaryDomain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Restricts to `validation.access_domain`.
    #[must_use]
    pub fn with_access_domain(mut self, domain: PrimaryDomain) -> Self {
        self.access_domain = Some(domain);
        self
    }

    /// Restricts to `validation.cross_domain.approved`.
    #[must_use]
    pub fn with_cross_domain_approved(mut self, approved: bool) -> Self {
        self.cross_domain_approved = Some(approved);
        self
    }

    /// Restricts to `validation.cross_domain.requested`.
    #[must_use]
    pub fn with_cross_domain_requested(mut self, requested: bool) -> Self {
        self.cross_domain_requested = Some(requested);
        self
    }

    /// Restricts to `validation.cross_domain.source_domain`.
    #[must_use]
    pub fn with_cross_domain_source(mut self, domain: PrimaryDomain) -> Self {
        self.cross_domain_source = Some(domain);
        self
    }

    /// Restricts to `validation.cross_domain.target_domain`.
    #[must_use]
    pub fn with_cross_domain_target(mut self, domain: PrimaryDomain) -> Self {
        self.cross_domain_target = Some(domain);
        self
    }

    /// Limits the number of results.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if any validation predicate is set.
    #[must_use]
    pub fn has_validation_predicates(&self) -> bool {
        self.domain.is_some()
            || self.access_domain.is_some()
            || self.cross_domain_approved.is_some()
            || self.cross_domain_requested.is_some()
            || self.cross_domain_source.is_some()
            || self.cross_domain_target.is_some()
    }

    /// Evaluates the validation predicates against decoded metadata.
    #[must_use]
    pub fn matches_validation(&self, validation: &ValidationMetadata) -> bool {
        if self.domain.is_some_and(|d| d != validation.domain) {
            return false;
        }
        if self.access_domain.is_some_and(|d| d != validation.access_domain) {
            return false;
        }

        let grant = validation.cross_domain.as_ref();
        if let Some(approved) = self.cross_domain_approved {
            if grant.is_none_or(|g| g.approved != approved) {
                return false;
            }
        }
        if let Some(requested) = self.cross_domain_requested {
            if grant.is_none_or(|g| g.requested != requested) {
                return false;
            }
        }
        if let Some(source) = self.cross_domain_source {
            if grant.is_none_or(|g| g.source_domain != Some(source)) {
                return false;
            }
        }
        if let Some(target) = self.cross_domain_target {
            if grant.is_none_or(|g| g.target_domain != Some(target)) {
                return false;
            }
        }
        true
    }
}
