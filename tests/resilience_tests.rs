//! Retry behavior of the concept service against a failing graph store.
//!
//! A wrapper backend fails a configurable number of calls before delegating
//! to the in-memory graph, standing in for a store that drops connections.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use mnemo::models::{ConceptRequest, KnowledgeQuery};
use mnemo::services::ConceptService;
use mnemo::storage::{
    ConceptRecord, EdgeRecord, GraphBackend, InMemoryGraphBackend, ResilientGraphBackend,
    RetryConfig,
};
use mnemo::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

struct FlakyGraph {
    inner: InMemoryGraphBackend,
    failures_left: AtomicU32,
    calls: Arc<AtomicU32>,
}

impl FlakyGraph {
    fn new(failures: u32, calls: Arc<AtomicU32>) -> Self {
        Self {
            inner: InMemoryGraphBackend::new(),
            failures_left: AtomicU32::new(failures),
            calls,
        }
    }

    fn gate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Error::operation("graph_call", "connection reset"));
        }
        Ok(())
    }
}

impl GraphBackend for FlakyGraph {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn ensure_schema(&self) -> Result<()> {
        self.gate()?;
        self.inner.ensure_schema()
    }

    fn upsert_concept(&self, record: &ConceptRecord) -> Result<()> {
        self.gate()?;
        self.inner.upsert_concept(record)
    }

    fn create_concept_if_absent(&self, record: &ConceptRecord) -> Result<bool> {
        self.gate()?;
        self.inner.create_concept_if_absent(record)
    }

    fn get_concept(&self, name: &str) -> Result<Option<ConceptRecord>> {
        self.gate()?;
        self.inner.get_concept(name)
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<()> {
        self.gate()?;
        self.inner.upsert_edge(edge)
    }

    fn edges_for(&self, name: &str) -> Result<Vec<EdgeRecord>> {
        self.gate()?;
        self.inner.edges_for(name)
    }

    fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>> {
        self.gate()?;
        self.inner.find_concepts(query)
    }

    fn count_concepts(&self) -> Result<usize> {
        self.gate()?;
        self.inner.count_concepts()
    }

    fn count_edges(&self) -> Result<usize> {
        self.gate()?;
        self.inner.count_edges()
    }
}

fn service(failures: u32, retry: RetryConfig) -> (ConceptService, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = ResilientGraphBackend::new(FlakyGraph::new(failures, Arc::clone(&calls)), retry);
    (ConceptService::new(Arc::new(graph)), calls)
}

fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_max_retry_time_ms(2_000)
        .with_retry_interval_ms(1)
}

#[test]
fn test_transient_failures_are_retried() {
    let (service, _) = service(3, fast_retry());

    service
        .store_concept(&ConceptRequest::new("Python", "entity", "A language").with_related(["Rust"]))
        .unwrap();

    assert_eq!(service.count_concepts().unwrap(), 2);
    assert_eq!(service.count_relationships().unwrap(), 2);
}

#[test]
fn test_exhausted_budget_surfaces_store_error() {
    let budget = RetryConfig::default()
        .with_max_retry_time_ms(50)
        .with_retry_interval_ms(5);
    let (service, calls) = service(u32::MAX, budget);

    let start = Instant::now();
    let result = service.get_concept("Python");

    assert!(matches!(result, Err(Error::OperationFailed { .. })));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(calls.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_validation_errors_never_reach_the_store() {
    let (service, calls) = service(0, fast_retry());

    let result = service.store_concept(&ConceptRequest::new("Python", "language", "A language"));

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_schema_setup_retried_on_first_use() {
    let (service, calls) = service(1, fast_retry());

    assert_eq!(service.count_concepts().unwrap(), 0);
    assert_eq!(service.count_concepts().unwrap(), 0);

    // failed setup, successful setup, two counts
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
