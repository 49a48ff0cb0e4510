//! # Mnemo
//!
//! Consolidates episodic memory into a domain-aware semantic knowledge graph.
//!
//! Mnemo periodically distills raw, timestamped experience records into a
//! curated, deduplicated graph of concepts, relationships, and beliefs. Domain
//! boundaries (personal, professional, system, ...) are enforced during
//! extraction and every attempted cross-domain transfer is recorded.
//!
//! ## Features
//!
//! - Guarded consolidation trigger (elapsed time, importance, pool size)
//! - Pluggable extraction patterns with domain applicability rules
//! - Cross-pattern and cross-memory deduplication (first writer wins)
//! - Idempotent concept upserts with bidirectional relationship edges
//! - Bounded retry executor around every graph store call
//!
//! ## Example
//!
//! ```rust
//! use mnemo::models::{DomainContext, Memory, PrimaryDomain};
//! use mnemo::services::{ConceptService, ConsolidationConfig, ConsolidationManager, KnowledgeWriter};
//! use mnemo::storage::{InMemoryEpisodicStore, open_graph, RetryConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryEpisodicStore::with_memories(vec![
//!     Memory::new("m1", "Sprint planning")
//!         .with_context("domain", "professional")
//!         .with_metadata("agents", json!([{ "name": "planner", "role": "planning" }])),
//! ]));
//! let mut manager = ConsolidationManager::new(store, ConsolidationConfig::default());
//! let writer = KnowledgeWriter::new(ConceptService::new(open_graph(None, RetryConfig::default())?));
//!
//! let target = DomainContext::new(PrimaryDomain::Professional);
//! let stats = manager.consolidate(&writer, Some(&target))?;
//! assert_eq!(stats.concepts_written, 1);
//! assert!(writer.concepts().get_concept("planner")?.is_some());
//! # Ok::<(), mnemo::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::MnemoConfig;
pub use models::{
    Concept, ConceptType, ConsolidatedKnowledge, DomainContext, Memory, MemoryId, PrimaryDomain,
    ValidationMetadata,
};
pub use services::{ConceptService, ConsolidationManager, TextChunker, validate_transfer};
pub use storage::{EpisodicStore, GraphBackend};

/// Error type for mnemo operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Retried |
/// |---------|-------------|---------|
/// | `Validation` | Missing name/description, unknown concept type, confidence outside `[0,1]` | No |
/// | `InvalidInput` | Malformed config or input files, bad CLI arguments | No |
/// | `OperationFailed` | Graph store or episodic store I/O fails | Yes |
/// | `PatternFailed` | A consolidation pattern fails for one domain group | No (isolated) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed concept, relationship, or validation input.
    ///
    /// Surfaced immediately to the caller; the retry executor never retries it.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Invalid input was provided outside the concept model.
    ///
    /// Raised when:
    /// - A config file cannot be parsed
    /// - An episodic memory file is not a JSON array of memories
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A store operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail or the connection is busy
    /// - The episodic store cannot be queried
    /// - Filesystem I/O errors occur
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A consolidation pattern failed while processing one domain group.
    #[error("pattern '{pattern}' failed: {cause}")]
    PatternFailed {
        /// Name of the pattern.
        pattern: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` if the error is transient and the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }

    /// Shorthand for an [`Error::OperationFailed`] built from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for mnemo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use mnemo::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("name is required".to_string());
        assert_eq!(err.to_string(), "validation failed: name is required");

        let err = Error::OperationFailed {
            operation: "store_concept".to_string(),
            cause: "database is locked".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'store_concept' failed: database is locked"
        );

        let err = Error::PatternFailed {
            pattern: "agent_interaction".to_string(),
            cause: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "pattern 'agent_interaction' failed: boom");
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(Error::operation("get_concept", "timeout").is_retryable());
        assert!(!Error::Validation("bad".to_string()).is_retryable());
        assert!(!Error::InvalidInput("bad".to_string()).is_retryable());
        assert!(
            !Error::PatternFailed {
                pattern: "p".to_string(),
                cause: "c".to_string()
            }
            .is_retryable()
        );
    }
}
