//! Conversion between typed concepts and flat graph records.
//!
//! Validation metadata is stored as a JSON blob. Rows written by older
//! writers may only carry the discrete `confidence`, `source`, `domain`, and
//! `access_domain` columns, so decoding tries the blob first and falls back
//! to those columns over the defaults.

use crate::models::{
    Concept, ConceptRelationship, ConceptType, PrimaryDomain, RelationshipDirection,
    ValidationMetadata,
};
use crate::storage::traits::{ConceptRecord, EdgeRecord};
use crate::{Error, Result};

/// Encodes a concept node.
///
/// # Errors
///
/// Returns an error if the validation metadata cannot be serialized.
pub fn encode_concept(concept: &Concept) -> Result<ConceptRecord> {
    let validation_json = encode_validation(&concept.validation)?;
    Ok(ConceptRecord {
        name: concept.name.clone(),
        concept_type: concept.concept_type.as_str().to_string(),
        description: concept.description.clone(),
        is_consolidation: concept.is_consolidation,
        validation_json: Some(validation_json),
        confidence: Some(concept.validation.confidence),
        source: Some(concept.validation.source.clone()),
        domain: Some(concept.validation.domain.as_str().to_string()),
        access_domain: Some(concept.validation.access_domain.as_str().to_string()),
    })
}

/// Decodes a concept node without relationships.
///
/// An unknown stored type decodes as [`ConceptType::Entity`].
#[must_use]
pub fn decode_concept(record: &ConceptRecord) -> Concept {
    let concept_type = ConceptType::parse(&record.concept_type).unwrap_or_else(|| {
        tracing::warn!(
            name = %record.name,
            concept_type = %record.concept_type,
            "Unknown stored concept type, reading as entity"
        );
        ConceptType::Entity
    });

    let mut concept = Concept::new(record.name.clone(), concept_type, record.description.clone());
    concept.is_consolidation = record.is_consolidation;
    concept.validation = decode_record_validation(record);
    concept
}

/// Encodes a directed edge.
///
/// # Errors
///
/// Returns an error if the validation metadata cannot be serialized.
pub fn encode_edge(relationship: &ConceptRelationship) -> Result<EdgeRecord> {
    Ok(EdgeRecord {
        from_name: relationship.from.clone(),
        to_name: relationship.to.clone(),
        relationship_type: relationship.relationship_type.clone(),
        bidirectional: relationship.bidirectional,
        direction: relationship.direction.as_str().to_string(),
        validation_json: Some(encode_validation(&relationship.validation)?),
    })
}

/// Decodes a directed edge.
#[must_use]
pub fn decode_edge(record: &EdgeRecord) -> ConceptRelationship {
    ConceptRelationship {
        from: record.from_name.clone(),
        to: record.to_name.clone(),
        relationship_type: record.relationship_type.clone(),
        bidirectional: record.bidirectional,
        direction: RelationshipDirection::parse(&record.direction)
            .unwrap_or(RelationshipDirection::Forward),
        validation: record
            .validation_json
            .as_deref()
            .and_then(decode_blob)
            .unwrap_or_default(),
    }
}

/// Decodes the validation metadata of a concept record.
///
/// The blob wins when it parses; otherwise the discrete columns are laid over
/// the defaults.
#[must_use]
pub fn decode_record_validation(record: &ConceptRecord) -> ValidationMetadata {
    if let Some(validation) = record.validation_json.as_deref().and_then(decode_blob) {
        return validation;
    }

    let mut validation = ValidationMetadata::default();
    if let Some(confidence) = record.confidence {
        validation.confidence = confidence;
    }
    if let Some(source) = &record.source {
        validation.source.clone_from(source);
    }
    if let Some(domain) = record.domain.as_deref() {
        validation.domain = PrimaryDomain::parse_or_general(domain);
    }
    validation.access_domain = record
        .access_domain
        .as_deref()
        .map_or(validation.domain, PrimaryDomain::parse_or_general);
    validation
}

fn encode_validation(validation: &ValidationMetadata) -> Result<String> {
    serde_json::to_string(validation).map_err(|e| Error::operation("encode_validation", e))
}

fn decode_blob(json: &str) -> Option<ValidationMetadata> {
    match serde_json::from_str(json) {
        Ok(validation) => Some(validation),
        Err(e) => {
            tracing::debug!(error = %e, "Stored validation blob unreadable, using columns");
            None
        },
    }
}
