//! Domain context types.
//!
//! A [`DomainContext`] classifies where a piece of knowledge lives: its coarse
//! [`PrimaryDomain`] plus an optional, finer-grained knowledge vertical. Contexts
//! also carry cross-domain transfer grants, which the transfer validator
//! consults before knowledge crosses a domain boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Confidence assigned to a domain context synthesized from raw memory context.
pub const SYNTHESIZED_DOMAIN_CONFIDENCE: f32 = 0.9;

/// Coarse knowledge partition used to gate knowledge transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryDomain {
    /// Knowledge not bound to any particular area.
    #[default]
    #[serde(alias = "GENERAL")]
    General,
    /// Private life knowledge.
    #[serde(alias = "PERSONAL")]
    Personal,
    /// Work and career knowledge.
    #[serde(alias = "PROFESSIONAL")]
    Professional,
    /// Knowledge about the system itself.
    #[serde(alias = "SYSTEM")]
    System,
}

impl PrimaryDomain {
    /// Returns all domain variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::General, Self::Personal, Self::Professional, Self::System]
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Personal => "personal",
            Self::Professional => "professional",
            Self::System => "system",
        }
    }

    /// Parses a domain from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Some(Self::General),
            "personal" => Some(Self::Personal),
            "professional" | "work" => Some(Self::Professional),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Parses a domain, falling back to [`PrimaryDomain::General`] when unknown.
    #[must_use]
    pub fn parse_or_general(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl fmt::Display for PrimaryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PrimaryDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown domain: {s}"))
    }
}

/// Cross-domain transfer metadata.
///
/// A grant is only effective when `approved` is set and `target_domain`
/// names the domain the knowledge is moving into.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossDomainGrant {
    /// Whether the transfer was approved.
    pub approved: bool,
    /// Whether a transfer was requested.
    pub requested: bool,
    /// Domain the knowledge originates from.
    pub source_domain: Option<PrimaryDomain>,
    /// Domain the knowledge may move into.
    pub target_domain: Option<PrimaryDomain>,
    /// Free-form reason recorded with the grant.
    pub justification: Option<String>,
}

impl CrossDomainGrant {
    /// Creates an approved grant from `source` into `target`.
    #[must_use]
    pub fn approved(
        source: PrimaryDomain,
        target: PrimaryDomain,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            approved: true,
            requested: true,
            source_domain: Some(source),
            target_domain: Some(target),
            justification: Some(justification.into()),
        }
    }

    /// Creates a pending (requested but not approved) grant.
    #[must_use]
    pub const fn requested(source: PrimaryDomain, target: PrimaryDomain) -> Self {
        Self {
            approved: false,
            requested: true,
            source_domain: Some(source),
            target_domain: Some(target),
            justification: None,
        }
    }

    /// Returns `true` if the grant allows moving knowledge into `target`.
    #[must_use]
    pub fn permits(&self, target: PrimaryDomain) -> bool {
        self.approved && self.target_domain == Some(target)
    }
}

/// Classification of a memory's primary domain and optional knowledge vertical.
///
/// Equality and hashing are structural over `(primary_domain, knowledge_vertical)`
/// so contexts can key domain groups and deduplication sets. `confidence` and
/// `cross_domain` ride along but do not affect identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainContext {
    /// Coarse domain.
    pub primary_domain: PrimaryDomain,
    /// Optional topic tag orthogonal to the domain.
    #[serde(default)]
    pub knowledge_vertical: Option<String>,
    /// Classification confidence (0.0 to 1.0).
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Cross-domain transfer grant, if any.
    #[serde(default)]
    pub cross_domain: Option<CrossDomainGrant>,
}

const fn default_confidence() -> f32 {
    1.0
}

impl DomainContext {
    /// Creates a context for the given domain with full confidence.
    #[must_use]
    pub const fn new(primary_domain: PrimaryDomain) -> Self {
        Self {
            primary_domain,
            knowledge_vertical: None,
            confidence: 1.0,
            cross_domain: None,
        }
    }

    /// Creates a general-domain context.
    #[must_use]
    pub const fn general() -> Self {
        Self::new(PrimaryDomain::General)
    }

    /// Sets the knowledge vertical.
    #[must_use]
    pub fn with_vertical(mut self, vertical: impl Into<String>) -> Self {
        self.knowledge_vertical = Some(vertical.into());
        self
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attaches a cross-domain grant.
    #[must_use]
    pub fn with_cross_domain(mut self, grant: CrossDomainGrant) -> Self {
        self.cross_domain = Some(grant);
        self
    }

    /// Synthesizes a context from a memory's free-form context map.
    ///
    /// Reads `domain` (default general) and the optional `knowledge_vertical`
    /// key. The result carries [`SYNTHESIZED_DOMAIN_CONFIDENCE`].
    #[must_use]
    pub fn from_memory_context(context: &serde_json::Map<String, serde_json::Value>) -> Self {
        let primary_domain = context
            .get("domain")
            .and_then(serde_json::Value::as_str)
            .map_or(PrimaryDomain::General, PrimaryDomain::parse_or_general);
        let knowledge_vertical = context
            .get("knowledge_vertical")
            .and_then(serde_json::Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string);

        Self {
            primary_domain,
            knowledge_vertical,
            confidence: SYNTHESIZED_DOMAIN_CONFIDENCE,
            cross_domain: None,
        }
    }

    /// Returns the structural grouping key.
    #[must_use]
    pub fn key(&self) -> (PrimaryDomain, Option<&str>) {
        (self.primary_domain, self.knowledge_vertical.as_deref())
    }
}

impl Default for DomainContext {
    fn default() -> Self {
        Self::general()
    }
}

impl PartialEq for DomainContext {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DomainContext {}

impl Hash for DomainContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.primary_domain.hash(state);
        self.knowledge_vertical.hash(state);
    }
}

impl fmt::Display for DomainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.knowledge_vertical {
            Some(vertical) => write!(f, "{}/{vertical}", self.primary_domain),
            None => write!(f, "{}", self.primary_domain),
        }
    }
}
