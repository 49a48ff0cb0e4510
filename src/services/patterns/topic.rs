//! Topic co-occurrence pattern.
//!
//! Emits a `Topic` concept for the most frequent keywords of each memory and
//! a `co_occurs_with` relationship between every pair of topics seen in the
//! same memory.

use super::{ConsolidationPattern, admit, content_tokens, retain_confident};
use crate::Result;
use crate::models::{DomainContext, ExtractedConcept, ExtractedRelationship, ExtractionResult, Memory};
use std::collections::HashMap;

const PATTERN_NAME: &str = "topic_cooccurrence";
const MIN_TOPIC_LENGTH: usize = 3;
const MAX_TOPIC_LENGTH: usize = 30;

/// Keyword topic extraction, domain-general by default.
#[derive(Debug, Clone)]
pub struct TopicCooccurrencePattern {
    threshold: f32,
    max_topics: usize,
    domain_context: Option<DomainContext>,
}

impl Default for TopicCooccurrencePattern {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicCooccurrencePattern {
    /// Creates the pattern with a 0.5 threshold and five topics per memory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: 0.5,
            max_topics: 5,
            domain_context: None,
        }
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets the number of topics kept per memory.
    #[must_use]
    pub const fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics;
        self
    }

    /// Restricts the pattern to a domain context.
    #[must_use]
    pub fn with_domain_context(mut self, domain_context: DomainContext) -> Self {
        self.domain_context = Some(domain_context);
        self
    }

    /// Most frequent keywords, ties broken alphabetically.
    fn topics(&self, text: &str) -> Vec<(String, usize)> {
        let mut freq: HashMap<String, usize> = HashMap::new();
        for token in content_tokens(text) {
            let len = token.chars().count();
            if !(MIN_TOPIC_LENGTH..=MAX_TOPIC_LENGTH).contains(&len)
                || token.chars().all(|c| c.is_numeric())
            {
                continue;
            }
            *freq.entry(token).or_insert(0) += 1;
        }

        let mut sorted: Vec<_> = freq.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.truncate(self.max_topics);
        sorted
    }
}

/// Confidence grows with repetition: 0.6 for one mention, 1.0 from five.
#[allow(clippy::cast_precision_loss)]
fn topic_confidence(count: usize) -> f32 {
    (0.5 + 0.1 * count as f32).min(1.0)
}

impl ConsolidationPattern for TopicCooccurrencePattern {
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
            let topics = self.topics(&memory.text());

            for (topic, count) in &topics {
                result.concepts.push(
                    ExtractedConcept::new(topic, "Topic", format!("Topic: {topic}"), context.clone())
                        .with_confidence(topic_confidence(*count))
                        .with_property("mentions", *count)
                        .from_memory(&memory.id),
                );
            }

            let mut names: Vec<&str> = topics.iter().map(|(t, _)| t.as_str()).collect();
            names.sort_unstable();
            for (i, from) in names.iter().enumerate() {
                for to in &names[i + 1..] {
                    result.relationships.push(
                        ExtractedRelationship::new(*from, *to, "co_occurs_with", context.clone())
                            .with_confidence(0.5)
                            .from_memory(&memory.id),
                    );
                }
            }
        }

        retain_confident(&mut result, self.threshold);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrimaryDomain;

    #[test]
    fn test_topics_ranked_by_frequency() {
        let pattern = TopicCooccurrencePattern::new().with_max_topics(2);
        let topics = pattern.topics("Rust rust RUST cargo cargo tokio and the 2024");
        assert_eq!(
            topics,
            vec![("rust".to_string(), 3), ("cargo".to_string(), 2)]
        );
    }

    #[test]
    fn test_emits_topics_and_pairs() {
        let memory = Memory::new("m1", "Kubernetes cluster upgrade for kubernetes nodes")
            .with_context("domain", "professional");

        let result = TopicCooccurrencePattern::new()
            .with_max_topics(3)
            .extract(&[memory], None)
            .unwrap();

        assert_eq!(result.concepts.len(), 3);
        assert_eq!(result.concepts[0].name, "kubernetes");
        assert!(result.concepts.iter().all(|c| c.kind == "Topic"));
        assert_eq!(result.relationships.len(), 3);
        assert!(result.relationships.iter().all(|r| r.from < r.to));
        assert!(result
            .concepts
            .iter()
            .all(|c| c.domain_context.primary_domain == PrimaryDomain::Professional));
    }

    #[test]
    fn test_threshold_filters_pairs() {
        let memory = Memory::new("m1", "alpha beta");
        let result = TopicCooccurrencePattern::new()
            .with_threshold(0.55)
            .extract(&[memory], None)
            .unwrap();
        assert_eq!(result.concepts.len(), 2);
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn test_honors_domain_gate() {
        let memory = Memory::new("m1", "private diary entry").with_context("domain", "personal");
        let target = DomainContext::new(PrimaryDomain::System);
        let result = TopicCooccurrencePattern::new()
            .extract(&[memory], Some(&target))
            .unwrap();
        assert!(result.concepts.is_empty());
        assert_eq!(result.cross_domain_transfers.len(), 1);
    }
}
