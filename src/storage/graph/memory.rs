//! In-memory graph backend for testing.
//!
//! Provides a fast, non-persistent implementation of [`GraphBackend`] for use
//! in unit tests and development scenarios.

// Allow collapsible_if for clearer nested conditional logic in query matching.
#![allow(clippy::collapsible_if)]

use super::codec::decode_record_validation;
use crate::models::KnowledgeQuery;
use crate::storage::traits::{ConceptRecord, EdgeRecord, GraphBackend};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::RwLock;

type EdgeKey = (String, String, String);

/// In-memory graph backend for testing.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
///
/// # Example
///
/// ```rust
/// use mnemo::storage::graph::InMemoryGraphBackend;
/// use mnemo::storage::GraphBackend;
///
/// let backend = InMemoryGraphBackend::new();
/// assert_eq!(backend.count_concepts().unwrap(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphBackend {
    concepts: RwLock<BTreeMap<String, ConceptRecord>>,
    edges: RwLock<BTreeMap<EdgeKey, EdgeRecord>>,
}

impl InMemoryGraphBackend {
    /// Creates a new empty in-memory graph backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(operation: &str) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }

    /// Checks if a record matches the query criteria.
    fn record_matches_query(record: &ConceptRecord, query: &KnowledgeQuery) -> bool {
        if let Some(ref names) = query.names {
            if !names.iter().any(|n| n == &record.name) {
                return false;
            }
        }

        if let Some(concept_type) = query.concept_type {
            if !record.concept_type.eq_ignore_ascii_case(concept_type.as_str()) {
                return false;
            }
        }

        if let Some(ref pattern) = query.description_pattern {
            if !contains_ignore_case(&record.description, pattern) {
                return false;
            }
        }

        if let Some(ref text) = query.text {
            if !contains_ignore_case(&record.name, text)
                && !contains_ignore_case(&record.description, text)
            {
                return false;
            }
        }

        !query.has_validation_predicates()
            || query.matches_validation(&decode_record_validation(record))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl GraphBackend for InMemoryGraphBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn upsert_concept(&self, record: &ConceptRecord) -> Result<()> {
        let mut concepts = self
            .concepts
            .write()
            .map_err(|_| Self::lock_error("upsert_concept"))?;
        concepts.insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn create_concept_if_absent(&self, record: &ConceptRecord) -> Result<bool> {
        let mut concepts = self
            .concepts
            .write()
            .map_err(|_| Self::lock_error("create_concept_if_absent"))?;
        if concepts.contains_key(&record.name) {
            return Ok(false);
        }
        concepts.insert(record.name.clone(), record.clone());
        Ok(true)
    }

    fn get_concept(&self, name: &str) -> Result<Option<ConceptRecord>> {
        let concepts = self
            .concepts
            .read()
            .map_err(|_| Self::lock_error("get_concept"))?;
        Ok(concepts.get(name).cloned())
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<()> {
        let mut edges = self
            .edges
            .write()
            .map_err(|_| Self::lock_error("upsert_edge"))?;
        let key = (
            edge.from_name.clone(),
            edge.to_name.clone(),
            edge.relationship_type.clone(),
        );
        edges.insert(key, edge.clone());
        Ok(())
    }

    fn edges_for(&self, name: &str) -> Result<Vec<EdgeRecord>> {
        let edges = self
            .edges
            .read()
            .map_err(|_| Self::lock_error("edges_for"))?;
        Ok(edges
            .values()
            .filter(|e| e.from_name == name || e.to_name == name)
            .cloned()
            .collect())
    }

    fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>> {
        let concepts = self
            .concepts
            .read()
            .map_err(|_| Self::lock_error("find_concepts"))?;
        let matches = concepts
            .values()
            .filter(|record| Self::record_matches_query(record, query))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matches)
    }

    fn count_concepts(&self) -> Result<usize> {
        self.concepts
            .read()
            .map(|c| c.len())
            .map_err(|_| Self::lock_error("count_concepts"))
    }

    fn count_edges(&self) -> Result<usize> {
        self.edges
            .read()
            .map(|e| e.len())
            .map_err(|_| Self::lock_error("count_edges"))
    }
}
