//! Episodic memory types and identifiers.

use super::DomainContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for an episodic memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a time-ordered ID for memories captured without one.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Content of an episodic memory: plain text or a structured map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryContent {
    /// Plain text content.
    Text(String),
    /// Structured content; textual payload lives under `text` or `content`.
    Structured(Map<String, Value>),
}

impl MemoryContent {
    /// Keys probed for the textual payload of structured content.
    pub const TEXT_KEYS: [&'static str; 2] = ["text", "content"];

    /// Returns the textual payload.
    ///
    /// Structured content without a `text`/`content` string is rendered as JSON.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(map) => Self::TEXT_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
        }
    }

    /// Returns the non-text fields of structured content.
    #[must_use]
    pub fn extra_fields(&self) -> Map<String, Value> {
        match self {
            Self::Text(_) => Map::new(),
            Self::Structured(map) => map
                .iter()
                .filter(|(key, _)| !Self::TEXT_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

impl Default for MemoryContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MemoryContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MemoryContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A raw, timestamped experience record owned by the episodic store.
///
/// The consolidation core treats memories as read-only; only the episodic
/// store flips `consolidated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier; generated when absent from the input.
    #[serde(default = "MemoryId::generate")]
    pub id: MemoryId,
    /// The memory content.
    #[serde(default)]
    pub content: MemoryContent,
    /// Capture type (e.g. "observation", "conversation").
    #[serde(rename = "type", default = "default_memory_type")]
    pub memory_type: String,
    /// Importance score (0.0 to 1.0).
    #[serde(default = "default_importance")]
    pub importance: f32,
    /// Free-form capture context; `domain` selects the primary domain.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Structured extraction payload (agents, tasks, interactions, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Whether the memory has already been consolidated.
    #[serde(default)]
    pub consolidated: bool,
    /// Capture time.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Pre-computed domain classification, if the capture layer provided one.
    #[serde(default)]
    pub domain_context: Option<DomainContext>,
}

fn default_memory_type() -> String {
    "observation".to_string()
}

const fn default_importance() -> f32 {
    0.5
}

impl Memory {
    /// Creates a new unconsolidated memory with default importance.
    #[must_use]
    pub fn new(id: impl Into<MemoryId>, content: impl Into<MemoryContent>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            memory_type: default_memory_type(),
            importance: default_importance(),
            context: Map::new(),
            metadata: Map::new(),
            consolidated: false,
            timestamp: Utc::now(),
            domain_context: None,
        }
    }

    /// Sets the importance score, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Sets a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the pre-computed domain context.
    #[must_use]
    pub fn with_domain_context(mut self, domain_context: DomainContext) -> Self {
        self.domain_context = Some(domain_context);
        self
    }

    /// Returns the memory's domain context, synthesizing one from
    /// `context.domain` when none was provided.
    #[must_use]
    pub fn resolved_domain_context(&self) -> DomainContext {
        self.domain_context
            .clone()
            .unwrap_or_else(|| DomainContext::from_memory_context(&self.context))
    }

    /// Returns the textual content.
    #[must_use]
    pub fn text(&self) -> String {
        self.content.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrimaryDomain;
    use serde_json::json;

    #[test]
    fn test_memory_id_roundtrip() {
        let id = MemoryId::new("mem-1");
        assert_eq!(id.as_str(), "mem-1");
        assert_eq!(id.to_string(), "mem-1");
        assert_eq!(MemoryId::from("mem-1"), id);
    }

    #[test]
    fn test_structured_content_text() {
        let content: MemoryContent =
            serde_json::from_value(json!({"text": "hello", "speaker": "bob"})).unwrap();
        assert_eq!(content.text(), "hello");
        let extra = content.extra_fields();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra.get("speaker"), Some(&json!("bob")));
    }

    #[test]
    fn test_structured_content_without_text_renders_json() {
        let content = MemoryContent::Structured(
            json!({"speaker": "bob"}).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(content.text(), r#"{"speaker":"bob"}"#);
    }

    #[test]
    fn test_deserialize_minimal_memory() {
        let memory: Memory = serde_json::from_value(json!({
            "id": "m1",
            "content": "Deployed the service",
            "context": {"domain": "professional"}
        }))
        .unwrap();

        assert_eq!(memory.memory_type, "observation");
        assert!((memory.importance - 0.5).abs() < f32::EPSILON);
        assert!(!memory.consolidated);
        assert_eq!(
            memory.resolved_domain_context().primary_domain,
            PrimaryDomain::Professional
        );
    }

    #[test]
    fn test_missing_id_is_generated() {
        let a: Memory = serde_json::from_value(json!({"content": "x"})).unwrap();
        let b: Memory = serde_json::from_value(json!({"content": "y"})).unwrap();
        assert!(!a.id.as_str().is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_explicit_domain_context_wins() {
        let memory = Memory::new("m1", "x")
            .with_context("domain", "personal")
            .with_domain_context(DomainContext::new(PrimaryDomain::System));
        assert_eq!(
            memory.resolved_domain_context().primary_domain,
            PrimaryDomain::System
        );
    }
}
