//! Bounded retry for graph store operations.
//!
//! Every graph call goes through a [`RetryExecutor`]: transient failures are
//! retried after a fixed interval until the total elapsed time exceeds the
//! retry budget, then the last error is returned. Non-retryable errors
//! (validation, invalid input) are returned on the first attempt.
//!
//! ```text
//! call ──► Ok ─────────────────────────────► return Ok
//!   │
//!   └──► Err(retryable) ── elapsed < budget ──► sleep(interval) ──► call
//!   │                    └─ elapsed >= budget ─► return Err
//!   └──► Err(other) ──────────────────────────► return Err
//! ```
//!
//! # Usage
//!
//! ```rust
//! use mnemo::storage::graph::InMemoryGraphBackend;
//! use mnemo::storage::resilience::{ResilientGraphBackend, RetryConfig};
//! use mnemo::storage::GraphBackend;
//!
//! let graph = ResilientGraphBackend::new(InMemoryGraphBackend::new(), RetryConfig::default());
//!
//! // Schema setup runs lazily, inside the retry executor, on first use
//! assert_eq!(graph.count_concepts()?, 0);
//! # Ok::<(), mnemo::Error>(())
//! ```

use crate::Result;
use crate::models::KnowledgeQuery;
use crate::storage::traits::{ConceptRecord, EdgeRecord, GraphBackend};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Retry configuration for graph store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total elapsed-time budget across attempts.
    pub max_retry_time_ms: u64,
    /// Sleep between attempts.
    pub retry_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_time_ms: 30_000,
            retry_interval_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Loads retry configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("MNEMO_MAX_RETRY_TIME_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.max_retry_time_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("MNEMO_RETRY_INTERVAL_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.retry_interval_ms = parsed;
            }
        }
        self
    }

    /// Sets the retry budget in milliseconds.
    #[must_use]
    pub const fn with_max_retry_time_ms(mut self, ms: u64) -> Self {
        self.max_retry_time_ms = ms;
        self
    }

    /// Sets the retry interval in milliseconds.
    #[must_use]
    pub const fn with_retry_interval_ms(mut self, ms: u64) -> Self {
        self.retry_interval_ms = ms;
        self
    }

    /// Returns the retry budget.
    #[must_use]
    pub const fn max_retry_time(&self) -> Duration {
        Duration::from_millis(self.max_retry_time_ms)
    }

    /// Returns the retry interval.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Runs fallible calls under a deadline-bounded retry policy.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    backend_name: &'static str,
}

impl RetryExecutor {
    /// Creates an executor labelled with the backend name for metrics.
    #[must_use]
    pub const fn new(config: RetryConfig, backend_name: &'static str) -> Self {
        Self {
            config,
            backend_name,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable error once
    /// the elapsed time reaches the budget.
    pub fn execute<T, F>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match call() {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            backend = self.backend_name,
                            operation,
                            attempt,
                            "Graph operation succeeded after retry"
                        );
                    }
                    self.record_metrics(operation, "success");
                    return Ok(value);
                },
                Err(err) if err.is_retryable() => {
                    let elapsed = start.elapsed();
                    if elapsed >= self.config.max_retry_time() {
                        tracing::warn!(
                            backend = self.backend_name,
                            operation,
                            attempt,
                            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "Graph operation retry budget exhausted"
                        );
                        self.record_metrics(operation, "exhausted");
                        return Err(err);
                    }
                    tracing::warn!(
                        backend = self.backend_name,
                        operation,
                        attempt,
                        error = %err,
                        "Graph operation failed, retrying"
                    );
                    metrics::counter!(
                        "storage_retries_total",
                        "backend" => self.backend_name,
                        "operation" => operation
                    )
                    .increment(1);
                    std::thread::sleep(self.config.retry_interval());
                },
                Err(err) => {
                    self.record_metrics(operation, "error");
                    return Err(err);
                },
            }
        }
    }

    fn record_metrics(&self, operation: &'static str, status: &'static str) {
        metrics::counter!(
            "storage_requests_total",
            "backend" => self.backend_name,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
    }
}

/// Graph backend wrapper that retries transient failures and sets up the
/// schema lazily on first use.
pub struct ResilientGraphBackend<B: GraphBackend> {
    inner: B,
    executor: RetryExecutor,
    schema_ready: AtomicBool,
}

impl<B: GraphBackend> ResilientGraphBackend<B> {
    /// Wraps a backend.
    #[must_use]
    pub fn new(inner: B, config: RetryConfig) -> Self {
        let executor = RetryExecutor::new(config, inner.name());
        Self {
            inner,
            executor,
            schema_ready: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped backend.
    #[must_use]
    pub const fn inner(&self) -> &B {
        &self.inner
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.inner.ensure_schema()?;
        self.schema_ready.store(true, Ordering::Release);
        tracing::debug!(backend = self.inner.name(), "Graph schema ready");
        Ok(())
    }

    fn execute<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn(&B) -> Result<T>,
    {
        self.executor.execute(operation, || {
            self.ensure_ready()?;
            call(&self.inner)
        })
    }
}

impl<B: GraphBackend> GraphBackend for ResilientGraphBackend<B> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn ensure_schema(&self) -> Result<()> {
        self.executor
            .execute("ensure_schema", || self.ensure_ready())
    }

    fn upsert_concept(&self, record: &ConceptRecord) -> Result<()> {
        self.execute("upsert_concept", |b| b.upsert_concept(record))
    }

    fn create_concept_if_absent(&self, record: &ConceptRecord) -> Result<bool> {
        self.execute("create_concept_if_absent", |b| {
            b.create_concept_if_absent(record)
        })
    }

    fn get_concept(&self, name: &str) -> Result<Option<ConceptRecord>> {
        self.execute("get_concept", |b| b.get_concept(name))
    }

    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<()> {
        self.execute("upsert_edge", |b| b.upsert_edge(edge))
    }

    fn edges_for(&self, name: &str) -> Result<Vec<EdgeRecord>> {
        self.execute("edges_for", |b| b.edges_for(name))
    }

    fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>> {
        self.execute("find_concepts", |b| b.find_concepts(query))
    }

    fn count_concepts(&self) -> Result<usize> {
        self.execute("count_concepts", B::count_concepts)
    }

    fn count_edges(&self) -> Result<usize> {
        self.execute("count_edges", B::count_edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::storage::graph::InMemoryGraphBackend;
    use std::sync::atomic::AtomicU32;

    fn fast_config() -> RetryConfig {
        RetryConfig::default()
            .with_max_retry_time_ms(200)
            .with_retry_interval_ms(5)
    }

    /// Fails the first `failures` calls of every operation with a transient error.
    struct FlakyBackend {
        inner: InMemoryGraphBackend,
        failures: u32,
        calls: AtomicU32,
        schema_calls: AtomicU32,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryGraphBackend::new(),
                failures,
                calls: AtomicU32::new(0),
                schema_calls: AtomicU32::new(0),
            }
        }

        fn gate(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(Error::operation("flaky", "connection reset"));
            }
            Ok(())
        }
    }

    impl GraphBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn ensure_schema(&self) -> Result<()> {
            self.schema_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
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
            self.inner.edges_for(name)
        }
        fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>> {
            self.inner.find_concepts(query)
        }
        fn count_concepts(&self) -> Result<usize> {
            self.gate()?;
            self.inner.count_concepts()
        }
        fn count_edges(&self) -> Result<usize> {
            self.inner.count_edges()
        }
    }

    #[test]
    fn test_retries_transient_failures_until_success() {
        let graph = ResilientGraphBackend::new(FlakyBackend::new(2), fast_config());
        let record = ConceptRecord {
            name: "A".to_string(),
            concept_type: "entity".to_string(),
            ..ConceptRecord::default()
        };

        graph.upsert_concept(&record).unwrap();
        assert_eq!(graph.inner().calls.load(Ordering::SeqCst), 3);
        assert!(graph.get_concept("A").unwrap().is_some());
    }

    #[test]
    fn test_exhausted_budget_returns_last_error() {
        let config = RetryConfig::default()
            .with_max_retry_time_ms(30)
            .with_retry_interval_ms(10);
        let graph = ResilientGraphBackend::new(FlakyBackend::new(u32::MAX), config);

        let start = Instant::now();
        let result = graph.count_concepts();
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(graph.inner().calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_non_retryable_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config(), "test");
        let attempts = AtomicU32::new(0);

        let result: Result<()> = executor.execute("validate", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Validation("bad confidence".to_string()))
        });

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_budget_makes_single_attempt() {
        let executor = RetryExecutor::new(RetryConfig::default().with_max_retry_time_ms(0), "test");
        let attempts = AtomicU32::new(0);

        let result: Result<()> = executor.execute("op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::operation("op", "down"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_schema_set_up_lazily_once() {
        let graph = ResilientGraphBackend::new(FlakyBackend::new(0), fast_config());
        assert_eq!(graph.inner().schema_calls.load(Ordering::SeqCst), 0);

        graph.count_concepts().unwrap();
        graph.count_edges().unwrap();
        graph.ensure_schema().unwrap();

        assert_eq!(graph.inner().schema_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retry_time(), Duration::from_secs(30));
        assert_eq!(config.retry_interval(), Duration::from_secs(1));
    }
}
