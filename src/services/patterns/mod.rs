//! Extraction patterns.
//!
//! A pattern turns a batch of episodic memories into candidate concepts,
//! relationships, and beliefs. Every pattern runs each memory through the
//! same domain gate first: a memory whose domain context may not flow into
//! the requested target is recorded as a denied transfer and skipped
//! entirely.
//!
//! | Pattern | Default | Extracts |
//! |---------|---------|----------|
//! | [`AgentInteractionPattern`] | yes | Agents, tasks, interactions, capabilities, "important" notes |
//! | [`TopicCooccurrencePattern`] | no | Keyword topics and their co-occurrence |

mod agent_interaction;
mod topic;

pub use agent_interaction::AgentInteractionPattern;
pub use topic::TopicCooccurrencePattern;

use super::validate_transfer;
use crate::Result;
use crate::models::{CrossDomainTransfer, DomainContext, ExtractionResult, Memory};
use std::collections::HashSet;
use std::sync::LazyLock;

/// A stateless extraction strategy.
pub trait ConsolidationPattern: Send + Sync {
    /// Unique pattern name.
    fn name(&self) -> &str;

    /// Minimum confidence for an extracted item to be kept.
    fn threshold(&self) -> f32;

    /// Domain the pattern is specialised for; `None` for domain-general patterns.
    fn domain_context(&self) -> Option<&DomainContext>;

    /// Extracts knowledge from `memories`.
    ///
    /// When `target_domain` is set, memories that fail the transfer check are
    /// recorded in `cross_domain_transfers` and contribute nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternFailed`] if the memories carry payloads
    /// the pattern cannot interpret.
    fn extract(
        &self,
        memories: &[Memory],
        target_domain: Option<&DomainContext>,
    ) -> Result<ExtractionResult>;
}

/// Decides whether a pattern registered for one domain context runs on a
/// domain group.
///
/// A pattern applies when it has no context, when its primary domain matches
/// the group's, when it shares the group's knowledge vertical, or when it
/// declares no vertical at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Applicability;

impl Applicability {
    /// Returns `true` if a pattern with `pattern_context` applies to `group`.
    #[must_use]
    pub fn applies(pattern_context: Option<&DomainContext>, group: &DomainContext) -> bool {
        let Some(pattern) = pattern_context else {
            return true;
        };
        if pattern.primary_domain == group.primary_domain {
            return true;
        }
        match (&pattern.knowledge_vertical, &group.knowledge_vertical) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        }
    }
}

/// Runs the domain gate over `memories`.
///
/// Returns each admitted memory paired with its resolved domain context and
/// records a denied transfer in `result` for every rejected one.
pub(crate) fn admit<'a>(
    pattern: &str,
    memories: &'a [Memory],
    target_domain: Option<&DomainContext>,
    result: &mut ExtractionResult,
) -> Vec<(&'a Memory, DomainContext)> {
    let mut admitted = Vec::with_capacity(memories.len());

    for memory in memories {
        let context = memory.resolved_domain_context();
        if let Some(target) = target_domain {
            if !validate_transfer(&context, target) {
                tracing::debug!(
                    pattern,
                    memory_id = %memory.id,
                    source = %context,
                    target = %target,
                    "Cross-domain transfer denied"
                );
                metrics::counter!(
                    "consolidation_transfers_denied_total",
                    "pattern" => pattern.to_string()
                )
                .increment(1);
                result.cross_domain_transfers.push(CrossDomainTransfer::denied(
                    context,
                    target.clone(),
                    &memory.id,
                ));
                continue;
            }
        }
        admitted.push((memory, context));
    }

    admitted
}

/// Drops every extracted item whose confidence is below `threshold`.
pub(crate) fn retain_confident(result: &mut ExtractionResult, threshold: f32) {
    result.concepts.retain(|c| c.confidence >= threshold);
    result.relationships.retain(|r| r.confidence >= threshold);
    result.beliefs.retain(|b| b.confidence >= threshold);
}

/// Common English stop words ignored when naming concepts and topics.
pub static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "if", "then", "so", "than", "too", "very", "in",
        "on", "at", "to", "for", "of", "with", "by", "from", "as", "into", "about", "over",
        "after", "before", "is", "was", "are", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "must",
        "shall", "can", "need", "i", "me", "my", "we", "us", "our", "you", "your", "he", "him",
        "his", "she", "her", "it", "its", "they", "them", "their", "this", "that", "these",
        "those", "what", "which", "who", "whom", "when", "where", "why", "how", "all", "each",
        "some", "such", "no", "nor", "not", "only", "just", "also", "now", "here", "there",
    ]
    .into_iter()
    .collect()
});

/// Lowercased tokens of `text` with surrounding punctuation and stop words removed.
pub(crate) fn content_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word.as_str()))
}
