//! Episodic-to-semantic consolidation.
//!
//! The [`ConsolidationManager`] decides when a run is due, groups candidate
//! memories by domain, dispatches every applicable extraction pattern, merges
//! the results with first-writer-wins deduplication, and hands the merged
//! knowledge to a [`KnowledgeWriter`].

use super::patterns::{
    AgentInteractionPattern, Applicability, ConsolidationPattern, TopicCooccurrencePattern,
};
use super::{KnowledgeWriter, TextChunker};
use crate::Result;
use crate::models::{ConsolidatedKnowledge, DomainContext, ExtractionResult, Memory, MemoryId};
use crate::storage::EpisodicStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info_span, instrument};

/// Default seconds between scheduled runs.
pub const DEFAULT_CONSOLIDATION_INTERVAL_SECS: u64 = 300;
/// Default importance that triggers an early run.
pub const DEFAULT_IMPORTANCE_THRESHOLD: f32 = 0.8;
/// Default candidate pool size that triggers an early run.
pub const DEFAULT_CANDIDATE_THRESHOLD: usize = 10;

/// Trigger thresholds for consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Seconds between scheduled runs.
    pub interval_secs: u64,
    /// Any candidate at or above this importance triggers a run.
    pub importance_threshold: f32,
    /// A candidate pool at least this large triggers a run.
    pub candidate_threshold: usize,
    /// Registers the keyword topic pattern alongside the default one.
    pub topic_cooccurrence: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_CONSOLIDATION_INTERVAL_SECS,
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
            candidate_threshold: DEFAULT_CANDIDATE_THRESHOLD,
            topic_cooccurrence: false,
        }
    }
}

impl ConsolidationConfig {
    /// Creates the default configuration with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `MNEMO_CONSOLIDATION_INTERVAL_SECS`, `MNEMO_IMPORTANCE_THRESHOLD`
    /// and `MNEMO_CANDIDATE_THRESHOLD`. Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(secs) = std::env::var("MNEMO_CONSOLIDATION_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.interval_secs = secs;
        }
        if let Some(threshold) = std::env::var("MNEMO_IMPORTANCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
        {
            self.importance_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(count) = std::env::var("MNEMO_CANDIDATE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.candidate_threshold = count;
        }
        self
    }

    /// Sets the interval between scheduled runs.
    #[must_use]
    pub const fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Sets the importance trigger.
    #[must_use]
    pub fn with_importance_threshold(mut self, threshold: f32) -> Self {
        self.importance_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets the candidate pool trigger.
    #[must_use]
    pub const fn with_candidate_threshold(mut self, count: usize) -> Self {
        self.candidate_threshold = count;
        self
    }

    /// Enables the keyword topic pattern.
    #[must_use]
    pub const fn with_topic_cooccurrence(mut self, enabled: bool) -> Self {
        self.topic_cooccurrence = enabled;
        self
    }

    /// Returns the interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

struct RegisteredPattern {
    pattern: Arc<dyn ConsolidationPattern>,
    domain_context: Option<DomainContext>,
}

impl RegisteredPattern {
    /// Registration context, falling back to the pattern's own.
    fn context(&self) -> Option<&DomainContext> {
        self.domain_context
            .as_ref()
            .or_else(|| self.pattern.domain_context())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Interval,
    Importance,
    PoolSize,
}

impl Trigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Importance => "importance",
            Self::PoolSize => "pool_size",
        }
    }
}

/// Orchestrates consolidation runs over an episodic store.
///
/// # Example
///
/// ```rust
/// use mnemo::models::Memory;
/// use mnemo::services::{ConsolidationConfig, ConsolidationManager};
/// use mnemo::storage::InMemoryEpisodicStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryEpisodicStore::with_memories(vec![
///     Memory::new("m1", "An important release note").with_importance(0.9),
/// ]));
/// let manager = ConsolidationManager::new(store, ConsolidationConfig::default());
///
/// assert!(manager.should_consolidate());
/// ```
pub struct ConsolidationManager {
    store: Arc<dyn EpisodicStore>,
    config: ConsolidationConfig,
    patterns: Vec<RegisteredPattern>,
    last_consolidation: DateTime<Utc>,
}

impl ConsolidationManager {
    /// Creates a manager with the default patterns and the default chunker.
    #[must_use]
    pub fn new(store: Arc<dyn EpisodicStore>, config: ConsolidationConfig) -> Self {
        Self::with_chunker(store, config, TextChunker::default())
    }

    /// Creates a manager with the default patterns using `chunker` for long
    /// content.
    #[must_use]
    pub fn with_chunker(
        store: Arc<dyn EpisodicStore>,
        config: ConsolidationConfig,
        chunker: TextChunker,
    ) -> Self {
        let topic = config.topic_cooccurrence;
        let mut manager = Self::without_patterns(store, config);
        manager.add_pattern(AgentInteractionPattern::new().with_chunker(chunker), None);
        if topic {
            manager.add_pattern(TopicCooccurrencePattern::new(), None);
        }
        manager
    }

    /// Creates a manager with an empty pattern registry.
    #[must_use]
    pub fn without_patterns(store: Arc<dyn EpisodicStore>, config: ConsolidationConfig) -> Self {
        Self {
            store,
            config,
            patterns: Vec::new(),
            last_consolidation: Utc::now(),
        }
    }

    /// Overrides the time of the last run.
    #[must_use]
    pub fn with_last_consolidation(mut self, at: DateTime<Utc>) -> Self {
        self.last_consolidation = at;
        self
    }

    /// Returns the trigger configuration.
    #[must_use]
    pub const fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Returns the time of the last completed run.
    #[must_use]
    pub const fn last_consolidation(&self) -> DateTime<Utc> {
        self.last_consolidation
    }

    /// Registers a pattern, optionally scoped to a domain context.
    ///
    /// Patterns run in registration order.
    pub fn add_pattern<P>(&mut self, pattern: P, domain_context: Option<DomainContext>)
    where
        P: ConsolidationPattern + 'static,
    {
        tracing::debug!(
            pattern = pattern.name(),
            domain = ?domain_context.as_ref().map(ToString::to_string),
            "Registered consolidation pattern"
        );
        self.patterns.push(RegisteredPattern {
            pattern: Arc::new(pattern),
            domain_context,
        });
    }

    /// Removes patterns named `name`.
    ///
    /// With a domain context only the registration scoped to that context is
    /// removed. Returns the number of registrations removed.
    pub fn remove_pattern(&mut self, name: &str, domain_context: Option<&DomainContext>) -> usize {
        let before = self.patterns.len();
        self.patterns.retain(|registered| {
            let same_name = registered.pattern.name() == name;
            let same_scope =
                domain_context.is_none_or(|ctx| registered.domain_context.as_ref() == Some(ctx));
            !(same_name && same_scope)
        });
        before - self.patterns.len()
    }

    /// Returns the patterns that apply to `domain_context`, in registration order.
    #[must_use]
    pub fn get_domain_patterns(
        &self,
        domain_context: &DomainContext,
    ) -> Vec<Arc<dyn ConsolidationPattern>> {
        self.patterns
            .iter()
            .filter(|registered| Applicability::applies(registered.context(), domain_context))
            .map(|registered| Arc::clone(&registered.pattern))
            .collect()
    }

    /// Returns registered pattern names in registration order.
    #[must_use]
    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns.iter().map(|r| r.pattern.name()).collect()
    }

    /// Returns `true` if a run is due.
    ///
    /// A run is due when the interval has elapsed since the last run, when an
    /// unconsolidated candidate reaches the importance threshold, or when the
    /// candidate pool reaches its size threshold. A failing candidate query is
    /// logged and counts as an empty pool.
    #[must_use]
    pub fn should_consolidate(&self) -> bool {
        let Some(trigger) = self.pending_trigger() else {
            return false;
        };
        tracing::debug!(trigger = trigger.as_str(), "Consolidation due");
        metrics::counter!("consolidation_triggers_total", "trigger" => trigger.as_str())
            .increment(1);
        true
    }

    fn pending_trigger(&self) -> Option<Trigger> {
        let elapsed = Utc::now()
            .signed_duration_since(self.last_consolidation)
            .to_std()
            .unwrap_or_default();
        if elapsed >= self.config.interval() {
            return Some(Trigger::Interval);
        }

        let candidates = match self.store.get_consolidation_candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Candidate query failed, treating pool as empty");
                Vec::new()
            },
        };
        let pending: Vec<&Memory> = candidates.iter().filter(|m| !m.consolidated).collect();

        if pending
            .iter()
            .any(|m| m.importance >= self.config.importance_threshold)
        {
            return Some(Trigger::Importance);
        }
        (pending.len() >= self.config.candidate_threshold).then_some(Trigger::PoolSize)
    }

    /// Extracts and merges knowledge from `memories`.
    ///
    /// Memories are grouped by `(primary_domain, knowledge_vertical)`. A
    /// pattern failing on one group is logged and skipped; the result is
    /// complete for every group that succeeded.
    #[must_use]
    pub fn extract_knowledge(
        &self,
        memories: &[Memory],
        target_domain: Option<&DomainContext>,
    ) -> ConsolidatedKnowledge {
        self.extract_with_report(memories, target_domain).0
    }

    fn extract_with_report(
        &self,
        memories: &[Memory],
        target_domain: Option<&DomainContext>,
    ) -> (ConsolidatedKnowledge, usize) {
        let groups = group_by_domain(memories);
        let mut merger = KnowledgeMerger::new(target_domain.cloned());
        let mut failures = 0;

        for (group_context, group) in &groups {
            let _span = info_span!("mnemo.consolidation.group", domain = %group_context).entered();

            for registered in &self.patterns {
                if !Applicability::applies(registered.context(), group_context) {
                    continue;
                }
                let pattern = registered.pattern.as_ref();
                match pattern.extract(group, target_domain) {
                    Ok(result) => merger.absorb(result),
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(
                            pattern = pattern.name(),
                            domain = %group_context,
                            error = %e,
                            "Pattern failed for domain group"
                        );
                        metrics::counter!(
                            "consolidation_pattern_failures_total",
                            "pattern" => pattern.name().to_string()
                        )
                        .increment(1);
                    },
                }
            }
        }

        let mut knowledge = merger.finish();
        knowledge.knowledge_verticals = distinct_verticals(memories);
        (knowledge, failures)
    }

    /// Runs one full consolidation cycle.
    ///
    /// Fetches candidates, extracts knowledge, writes it through `writer`,
    /// and marks every memory that was not denied a transfer as consolidated.
    /// `last_consolidation` is updated only when the cycle succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate query, the graph write, or the
    /// consolidated-flag update fails.
    #[instrument(
        name = "mnemo.consolidation.run",
        skip(self, writer, target_domain),
        fields(component = "consolidation", operation = "consolidate")
    )]
    pub fn consolidate(
        &mut self,
        writer: &KnowledgeWriter,
        target_domain: Option<&DomainContext>,
    ) -> Result<ConsolidationStats> {
        let start = Instant::now();
        let result = self.run_cycle(writer, target_domain);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("consolidation_runs_total", "status" => status).increment(1);
        metrics::histogram!("consolidation_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Ok(stats) = &result {
            self.last_consolidation = Utc::now();
            tracing::info!(summary = %stats.summary(), "Consolidation finished");
        }
        result
    }

    fn run_cycle(
        &self,
        writer: &KnowledgeWriter,
        target_domain: Option<&DomainContext>,
    ) -> Result<ConsolidationStats> {
        let candidates: Vec<Memory> = self
            .store
            .get_consolidation_candidates()?
            .into_iter()
            .filter(|m| !m.consolidated)
            .collect();

        let mut stats = ConsolidationStats {
            candidates: candidates.len(),
            ..ConsolidationStats::default()
        };
        if candidates.is_empty() {
            return Ok(stats);
        }

        let (knowledge, failures) = self.extract_with_report(&candidates, target_domain);
        stats.pattern_failures = failures;
        stats.denied_transfers = knowledge.denied_transfers();
        stats.beliefs = knowledge.beliefs.len();

        let written = writer.write(&knowledge)?;
        stats.concepts_written = written.concepts_written;
        stats.relationships_written = written.relationships_written;
        stats.rejected = written.rejected;

        let denied: HashSet<&MemoryId> = knowledge
            .cross_domain_transfers
            .iter()
            .filter(|t| !t.success)
            .filter_map(|t| t.memory_id.as_ref())
            .collect();
        let done: Vec<MemoryId> = candidates
            .iter()
            .filter(|m| !denied.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();
        stats.marked_consolidated = self.store.mark_consolidated(&done)?;

        Ok(stats)
    }
}

/// Groups memories by domain key in first-seen order.
fn group_by_domain(memories: &[Memory]) -> Vec<(DomainContext, Vec<Memory>)> {
    let mut index: HashMap<DomainContext, usize> = HashMap::new();
    let mut groups: Vec<(DomainContext, Vec<Memory>)> = Vec::new();

    for memory in memories {
        let resolved = memory.resolved_domain_context();
        let mut group_context = DomainContext::new(resolved.primary_domain);
        group_context.knowledge_vertical = resolved.knowledge_vertical;

        let slot = *index.entry(group_context.clone()).or_insert_with(|| {
            groups.push((group_context, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(memory.clone());
    }
    groups
}

fn distinct_verticals(memories: &[Memory]) -> Vec<String> {
    let mut seen = HashSet::new();
    memories
        .iter()
        .filter_map(|m| m.resolved_domain_context().knowledge_vertical)
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// First-writer-wins merge of pattern results.
struct KnowledgeMerger {
    knowledge: ConsolidatedKnowledge,
    concepts: HashSet<(String, DomainContext)>,
    relationships: HashSet<(String, String, String, DomainContext)>,
    beliefs: HashSet<(String, String, String, DomainContext)>,
}

impl KnowledgeMerger {
    fn new(domain_context: Option<DomainContext>) -> Self {
        Self {
            knowledge: ConsolidatedKnowledge {
                domain_context,
                ..ConsolidatedKnowledge::default()
            },
            concepts: HashSet::new(),
            relationships: HashSet::new(),
            beliefs: HashSet::new(),
        }
    }

    fn absorb(&mut self, result: ExtractionResult) {
        let ExtractionResult {
            concepts,
            relationships,
            beliefs,
            cross_domain_transfers,
            ..
        } = result;

        self.knowledge.concepts.extend(
            concepts
                .into_iter()
                .filter(|c| self.concepts.insert(c.dedup_key())),
        );
        self.knowledge.relationships.extend(
            relationships
                .into_iter()
                .filter(|r| self.relationships.insert(r.dedup_key())),
        );
        self.knowledge.beliefs.extend(
            beliefs
                .into_iter()
                .filter(|b| self.beliefs.insert(b.dedup_key())),
        );
        self.knowledge
            .cross_domain_transfers
            .extend(cross_domain_transfers);
    }

    fn finish(self) -> ConsolidatedKnowledge {
        self.knowledge
    }
}

/// Statistics from a consolidation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationStats {
    /// Unconsolidated memories fetched.
    pub candidates: usize,
    /// Concepts written to the graph.
    pub concepts_written: usize,
    /// Logical relationships written to the graph.
    pub relationships_written: usize,
    /// Beliefs extracted.
    pub beliefs: usize,
    /// Memories skipped by the domain gate.
    pub denied_transfers: usize,
    /// Pattern-by-group failures that were isolated.
    pub pattern_failures: usize,
    /// Extracted items rejected by validation.
    pub rejected: usize,
    /// Memories flagged as consolidated.
    pub marked_consolidated: usize,
}

impl ConsolidationStats {
    /// Returns true if no work was done.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.candidates == 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No memories to consolidate".to_string();
        }
        format!(
            "Candidates: {}, Concepts: {}, Relationships: {}, Beliefs: {}, Denied: {}, Failures: {}, Consolidated: {}",
            self.candidates,
            self.concepts_written,
            self.relationships_written,
            self.beliefs,
            self.denied_transfers,
            self.pattern_failures,
            self.marked_consolidated
        )
    }
}
