// Allow non-const functions that use f32::max/clamp (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Validation metadata attached to concepts and relationships.
//!
//! Every concept and relationship edge carries a [`ValidationMetadata`]
//! describing how much the knowledge is trusted, where it came from, which
//! domain may read it, and any cross-domain grant it was transferred under.
//!
//! Consolidated knowledge is never recorded below
//! [`CONSOLIDATION_CONFIDENCE_FLOOR`].

use super::{CrossDomainGrant, PrimaryDomain};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum confidence recorded for knowledge written by consolidation.
pub const CONSOLIDATION_CONFIDENCE_FLOOR: f32 = 0.8;

/// Trust and provenance metadata for a piece of semantic knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationMetadata {
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
    /// Where the knowledge came from (e.g. "consolidation", "user").
    pub source: String,
    /// Domain allowed to read the knowledge.
    pub access_domain: PrimaryDomain,
    /// Domain the knowledge belongs to.
    pub domain: PrimaryDomain,
    /// When the metadata was produced.
    pub timestamp: DateTime<Utc>,
    /// Names of concepts or memories supporting the knowledge.
    pub supported_by: Vec<String>,
    /// Names of concepts or memories contradicting the knowledge.
    pub contradicted_by: Vec<String>,
    /// Open points that still need verification.
    pub needs_verification: Vec<String>,
    /// Cross-domain grant the knowledge was transferred under.
    pub cross_domain: Option<CrossDomainGrant>,
}

impl Default for ValidationMetadata {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            source: "system".to_string(),
            access_domain: PrimaryDomain::General,
            domain: PrimaryDomain::General,
            timestamp: Utc::now(),
            supported_by: Vec::new(),
            contradicted_by: Vec::new(),
            needs_verification: Vec::new(),
            cross_domain: None,
        }
    }
}

impl ValidationMetadata {
    /// Creates metadata with the given confidence and source.
    #[must_use]
    pub fn new(confidence: f32, source: impl Into<String>) -> Self {
        Self {
            confidence,
            source: source.into(),
            ..Self::default()
        }
    }

    /// Sets both the owning and the access domain.
    #[must_use]
    pub fn with_domain(mut self, domain: PrimaryDomain) -> Self {
        self.domain = domain;
        self.access_domain = domain;
        self
    }

    /// Sets the access domain.
    #[must_use]
    pub fn with_access_domain(mut self, domain: PrimaryDomain) -> Self {
        self.access_domain = domain;
        self
    }

    /// Attaches a cross-domain grant.
    #[must_use]
    pub fn with_cross_domain(mut self, grant: CrossDomainGrant) -> Self {
        self.cross_domain = Some(grant);
        self
    }

    /// Adds a supporting reference.
    #[must_use]
    pub fn supported_by(mut self, reference: impl Into<String>) -> Self {
        self.supported_by.push(reference.into());
        self
    }

    /// Checks that the metadata is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the confidence is not a finite value in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Validation(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        Ok(())
    }

    /// Returns the metadata with the consolidation floor applied.
    ///
    /// When `is_consolidation` is set the confidence becomes
    /// `max(confidence, CONSOLIDATION_CONFIDENCE_FLOOR)`; otherwise it is unchanged.
    #[must_use]
    pub fn finalize(mut self, is_consolidation: bool) -> Self {
        if is_consolidation {
            self.confidence = self.confidence.max(CONSOLIDATION_CONFIDENCE_FLOOR);
        }
        self
    }
}

/// Parses validation metadata from untyped input.
///
/// Only a JSON object is accepted. Missing fields take their defaults;
/// present fields must have the right shape.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the input is not an object, a field has the
/// wrong type, a domain name is unknown, or the confidence is out of range.
pub fn parse_validation(input: &Value) -> Result<ValidationMetadata> {
    let Value::Object(map) = input else {
        return Err(Error::Validation(format!(
            "validation must be an object, got {}",
            json_kind(input)
        )));
    };

    let metadata: ValidationMetadata = serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| Error::Validation(format!("malformed validation metadata: {e}")))?;
    metadata.validate()?;
    Ok(metadata)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        let parsed = parse_validation(&json!({})).unwrap();
        assert!((parsed.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(parsed.source, "system");
        assert_eq!(parsed.domain, PrimaryDomain::General);
    }

    #[test]
    fn test_parse_full_object() {
        let parsed = parse_validation(&json!({
            "confidence": 0.4,
            "source": "user",
            "domain": "professional",
            "access_domain": "PERSONAL",
            "supported_by": ["m1", "m2"],
            "cross_domain": {"approved": true, "target_domain": "system"}
        }))
        .unwrap();

        assert!((parsed.confidence - 0.4).abs() < f32::EPSILON);
        assert_eq!(parsed.domain, PrimaryDomain::Professional);
        assert_eq!(parsed.access_domain, PrimaryDomain::Personal);
        assert_eq!(parsed.supported_by, vec!["m1", "m2"]);
        let grant = parsed.cross_domain.unwrap();
        assert!(grant.permits(PrimaryDomain::System));
    }

    #[test_case(json!([1, 2]) ; "array")]
    #[test_case(json!("high") ; "string")]
    #[test_case(json!(0.9) ; "number")]
    #[test_case(json!(null) ; "null")]
    fn test_parse_rejects_non_objects(input: Value) {
        assert!(matches!(parse_validation(&input), Err(Error::Validation(_))));
    }

    #[test_case(json!({"confidence": 1.5}) ; "confidence above range")]
    #[test_case(json!({"confidence": -0.1}) ; "confidence below range")]
    #[test_case(json!({"confidence": "high"}) ; "confidence wrong type")]
    #[test_case(json!({"domain": "martian"}) ; "unknown domain")]
    #[test_case(json!({"supported_by": "m1"}) ; "list wrong type")]
    fn test_parse_rejects_malformed_fields(input: Value) {
        assert!(matches!(parse_validation(&input), Err(Error::Validation(_))));
    }

    #[test]
    fn test_finalize_applies_floor_only_for_consolidation() {
        let low = ValidationMetadata::new(0.3, "test");
        assert!((low.clone().finalize(true).confidence - 0.8).abs() < f32::EPSILON);
        assert!((low.finalize(false).confidence - 0.3).abs() < f32::EPSILON);

        let high = ValidationMetadata::new(0.95, "test");
        assert!((high.finalize(true).confidence - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn test_serde_roundtrip_preserves_fields() {
        let original = ValidationMetadata::new(0.7, "consolidation")
            .with_domain(PrimaryDomain::Professional)
            .supported_by("m1");
        let json = serde_json::to_string(&original).unwrap();
        let restored: ValidationMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }
}
