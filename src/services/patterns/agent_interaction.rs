//! Agent interaction pattern.
//!
//! Reads structured payloads from memory metadata:
//!
//! ```json
//! {
//!   "agents": [{"name": "planner", "role": "coordinator", "capabilities": ["scheduling"]}],
//!   "tasks": [{"name": "Deploy", "description": "Ship it", "assigned_to": "planner", "status": "done"}],
//!   "interactions": [{"from": "planner", "to": "coder", "type": "delegated_to", "outcome": "success"}],
//!   "capability_observations": [{"agent": "coder", "capability": "rust", "confidence": 0.9}]
//! }
//! ```
//!
//! Independently of metadata, content containing the word "important"
//! (case-insensitive) yields an entity concept named from its first three
//! non-stop-word tokens. Content longer than one chunk is checked chunk by
//! chunk.

use super::{ConsolidationPattern, admit, content_tokens, retain_confident};
use crate::models::{
    Belief, DomainContext, ExtractedConcept, ExtractedRelationship, ExtractionResult, Memory,
};
use crate::services::TextChunker;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

const PATTERN_NAME: &str = "agent_interaction";
const IMPORTANT_MARKER: &str = "important";
const NAME_TOKENS: usize = 3;
const DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct AgentItem {
    name: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TaskItem {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractionItem {
    from: String,
    to: String,
    #[serde(default, rename = "type")]
    interaction_type: Option<String>,
    #[serde(default)]
    outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CapabilityObservation {
    agent: String,
    capability: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Default extraction pattern for multi-agent activity logs.
#[derive(Debug, Clone)]
pub struct AgentInteractionPattern {
    threshold: f32,
    domain_context: Option<DomainContext>,
    chunker: TextChunker,
}

impl Default for AgentInteractionPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentInteractionPattern {
    /// Creates a domain-general pattern that keeps every item.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: 0.0,
            domain_context: None,
            chunker: TextChunker::default(),
        }
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Restricts the pattern to a domain context.
    #[must_use]
    pub fn with_domain_context(mut self, domain_context: DomainContext) -> Self {
        self.domain_context = Some(domain_context);
        self
    }

    /// Sets the chunker used for oversized content.
    #[must_use]
    pub const fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Parses the metadata array under `key`. A missing key yields nothing;
    /// a key holding anything but an array fails the pattern. Array entries
    /// that do not match the item shape are skipped.
    fn items<T: serde::de::DeserializeOwned>(memory: &Memory, key: &str) -> Result<Vec<T>> {
        let Some(value) = memory.metadata.get(key) else {
            return Ok(Vec::new());
        };
        let Value::Array(entries) = value else {
            return Err(Error::PatternFailed {
                pattern: PATTERN_NAME.to_string(),
                cause: format!("memory {}: metadata.{key} must be an array", memory.id),
            });
        };

        Ok(entries
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!(memory_id = %memory.id, key, error = %e, "Skipping malformed item");
                    None
                },
            })
            .collect())
    }

    fn extract_agents(
        memory: &Memory,
        context: &DomainContext,
        result: &mut ExtractionResult,
    ) -> Result<()> {
        for agent in Self::items::<AgentItem>(memory, "agents")? {
            let description = agent
                .role
                .as_deref()
                .map_or_else(|| "Agent".to_string(), |role| format!("Agent with role {role}"));
            let mut concept = ExtractedConcept::new(&agent.name, "Agent", description, context.clone())
                .from_memory(&memory.id);
            if let Some(role) = &agent.role {
                concept = concept.with_property("role", role.as_str());
            }
            result.concepts.push(concept);

            for capability in &agent.capabilities {
                result.concepts.push(
                    ExtractedConcept::new(
                        capability,
                        "Capability",
                        format!("Capability: {capability}"),
                        context.clone(),
                    )
                    .from_memory(&memory.id),
                );
                result.relationships.push(
                    ExtractedRelationship::new(&agent.name, capability, "has_capability", context.clone())
                        .from_memory(&memory.id),
                );
            }
        }
        Ok(())
    }

    fn extract_tasks(
        memory: &Memory,
        context: &DomainContext,
        result: &mut ExtractionResult,
    ) -> Result<()> {
        for task in Self::items::<TaskItem>(memory, "tasks")? {
            let description = task
                .description
                .clone()
                .unwrap_or_else(|| format!("Task: {}", task.name));
            let mut concept = ExtractedConcept::new(&task.name, "Task", description, context.clone())
                .from_memory(&memory.id);
            if let Some(status) = &task.status {
                concept = concept.with_property("status", status.as_str());
            }
            result.concepts.push(concept);

            if let Some(agent) = &task.assigned_to {
                result.relationships.push(
                    ExtractedRelationship::new(agent, &task.name, "assigned_to", context.clone())
                        .from_memory(&memory.id),
                );
            }
        }
        Ok(())
    }

    fn extract_interactions(
        memory: &Memory,
        context: &DomainContext,
        result: &mut ExtractionResult,
    ) -> Result<()> {
        for interaction in Self::items::<InteractionItem>(memory, "interactions")? {
            let relationship_type = interaction
                .interaction_type
                .as_deref()
                .unwrap_or("interacted_with");
            result.relationships.push(
                ExtractedRelationship::new(
                    &interaction.from,
                    &interaction.to,
                    relationship_type,
                    context.clone(),
                )
                .from_memory(&memory.id),
            );

            let confidence = match interaction.outcome.as_deref() {
                Some("failure" | "failed") => 0.5,
                _ => 1.0,
            };
            result.beliefs.push(Belief::new(
                &interaction.from,
                "interacted_with",
                &interaction.to,
                confidence,
                context.clone(),
                memory.id.as_str(),
            ));
        }
        Ok(())
    }

    fn extract_capabilities(
        memory: &Memory,
        context: &DomainContext,
        result: &mut ExtractionResult,
    ) -> Result<()> {
        for observation in Self::items::<CapabilityObservation>(memory, "capability_observations")? {
            let confidence = observation.confidence.unwrap_or(1.0);
            result.concepts.push(
                ExtractedConcept::new(
                    &observation.capability,
                    "Capability",
                    format!("Capability: {}", observation.capability),
                    context.clone(),
                )
                .with_confidence(confidence)
                .from_memory(&memory.id),
            );
            result.relationships.push(
                ExtractedRelationship::new(
                    &observation.agent,
                    &observation.capability,
                    "has_capability",
                    context.clone(),
                )
                .with_confidence(confidence)
                .from_memory(&memory.id),
            );
            result.beliefs.push(Belief::new(
                &observation.agent,
                "has_capability",
                &observation.capability,
                confidence,
                context.clone(),
                memory.id.as_str(),
            ));
        }
        Ok(())
    }

    fn extract_important(
        &self,
        memory: &Memory,
        context: &DomainContext,
        result: &mut ExtractionResult,
    ) {
        let text = memory.text();
        let segments = if self.chunker.needs_chunking(&text) {
            self.chunker.chunk(&text)
        } else {
            vec![text]
        };

        for (index, segment) in segments.iter().enumerate() {
            if !segment.to_lowercase().contains(IMPORTANT_MARKER) {
                continue;
            }
            let tokens: Vec<String> = content_tokens(segment).take(NAME_TOKENS).collect();
            if tokens.is_empty() {
                continue;
            }
            let description: String = segment.chars().take(DESCRIPTION_LIMIT).collect();
            result.concepts.push(
                ExtractedConcept::new(tokens.join("_"), "entity", description, context.clone())
                    .with_confidence(memory.importance)
                    .with_property("chunk_index", index)
                    .from_memory(&memory.id),
            );
        }
    }
}

impl ConsolidationPattern for AgentInteractionPattern {
    fn name(&self) -> &str {
        PATTERN_NAME
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }

    fn domain_context(&self) -> Option<&DomainContext> {
        self.domain_context.as_ref()
    }

    fn extract(
        &self,
        memories: &[Memory],
        target_domain: Option<&DomainContext>,
    ) -> Result<ExtractionResult> {
        let mut result = ExtractionResult::for_context(target_domain.cloned());

        for (memory, context) in admit(PATTERN_NAME, memories, target_domain, &mut result) {
            Self::extract_agents(memory, &context, &mut result)?;
            Self::extract_tasks(memory, &context, &mut result)?;
            Self::extract_interactions(memory, &context, &mut result)?;
            Self::extract_capabilities(memory, &context, &mut result)?;
            self.extract_important(memory, &context, &mut result);
        }

        retain_confident(&mut result, self.threshold);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrimaryDomain;
    use serde_json::json;

    fn work_memory(id: &str) -> Memory {
        Memory::new(id, "routine update").with_context("domain", "professional")
    }

    #[test]
    fn test_extracts_agents_tasks_and_assignment() {
        let memory = work_memory("m1")
            .with_metadata(
                "agents",
                json!([{"name": "planner", "role": "coordinator", "capabilities": ["scheduling"]}]),
            )
            .with_metadata(
                "tasks",
                json!([{"name": "Deploy", "assigned_to": "planner", "status": "done"}]),
            );

        let result = AgentInteractionPattern::new().extract(&[memory], None).unwrap();

        let names: Vec<&str> = result.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["planner", "scheduling", "Deploy"]);
        assert_eq!(result.concepts[2].kind, "Task");
        assert_eq!(result.concepts[2].properties.get("status"), Some(&json!("done")));
        assert!(result
            .relationships
            .iter()
            .any(|r| r.from == "planner" && r.to == "Deploy" && r.relationship_type == "assigned_to"));
        assert!(result
            .concepts
            .iter()
            .all(|c| c.domain_context.primary_domain == PrimaryDomain::Professional));
    }

    #[test]
    fn test_interactions_and_capability_observations() {
        let memory = work_memory("m1")
            .with_metadata(
                "interactions",
                json!([{"from": "planner", "to": "coder"}, {"from": "coder", "to": "qa", "type": "handed_off"}]),
            )
            .with_metadata(
                "capability_observations",
                json!([{"agent": "coder", "capability": "rust", "confidence": 0.7}]),
            );

        let result = AgentInteractionPattern::new().extract(&[memory], None).unwrap();

        assert_eq!(result.relationships.len(), 3);
        assert_eq!(result.relationships[0].relationship_type, "interacted_with");
        assert_eq!(result.relationships[1].relationship_type, "handed_off");
        assert_eq!(result.beliefs.len(), 3);
        let capability = result.concepts.iter().find(|c| c.name == "rust").unwrap();
        assert!((capability.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_important_marker_names_concept() {
        let memory = Memory::new("m1", "Important: the deploy window moves to Friday")
            .with_importance(0.9);

        let result = AgentInteractionPattern::new().extract(&[memory], None).unwrap();

        assert_eq!(result.concepts.len(), 1);
        let concept = &result.concepts[0];
        assert_eq!(concept.name, "important_deploy_window");
        assert_eq!(concept.kind, "entity");
        assert!((concept.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_important_marker_checked_per_chunk() {
        let text = "Nothing to see in this opening sentence. \
                    Another plain sentence follows here. \
                    This is IMPORTANT news about billing.";
        let pattern = AgentInteractionPattern::new().with_chunker(TextChunker::new(45, 0, 1));
        let result = pattern.extract(&[Memory::new("m1", text)], None).unwrap();

        assert_eq!(result.concepts.len(), 1);
        assert_eq!(result.concepts[0].name, "important_news_billing");
        assert_eq!(result.concepts[0].properties.get("chunk_index"), Some(&json!(2)));
    }

    #[test]
    fn test_threshold_drops_low_confidence_items() {
        let memory = work_memory("m1").with_metadata(
            "capability_observations",
            json!([{"agent": "a", "capability": "weak", "confidence": 0.2},
                   {"agent": "a", "capability": "strong", "confidence": 0.9}]),
        );

        let result = AgentInteractionPattern::new()
            .with_threshold(0.5)
            .extract(&[memory], None)
            .unwrap();

        assert_eq!(result.concepts.len(), 1);
        assert_eq!(result.concepts[0].name, "strong");
        assert_eq!(result.beliefs.len(), 1);
    }

    #[test]
    fn test_malformed_collection_fails_pattern() {
        let memory = work_memory("m1").with_metadata("agents", json!("planner"));
        let result = AgentInteractionPattern::new().extract(&[memory], None);
        assert!(matches!(result, Err(Error::PatternFailed { .. })));
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let memory = work_memory("m1").with_metadata("tasks", json!([{"status": "done"}, {"name": "Ok"}]));
        let result = AgentInteractionPattern::new().extract(&[memory], None).unwrap();
        assert_eq!(result.concepts.len(), 1);
    }

    #[test]
    fn test_denied_memory_contributes_nothing() {
        let memory = Memory::new("m1", "important personal note")
            .with_context("domain", "personal")
            .with_metadata("tasks", json!([{"name": "Groceries"}]));
        let target = DomainContext::new(PrimaryDomain::Professional);

        let result = AgentInteractionPattern::new()
            .extract(&[memory], Some(&target))
            .unwrap();

        assert!(result.concepts.is_empty());
        assert!(result.relationships.is_empty());
        assert_eq!(result.cross_domain_transfers.len(), 1);
        assert!(!result.cross_domain_transfers[0].success);
    }
}
