//! Storage layer abstraction.
//!
//! - **Graph**: concept nodes and `RELATED_TO` edges (`SQLite`, in-memory)
//! - **Resilience**: bounded retry and lazy schema setup around any graph backend
//! - **Episodic**: the source of memories awaiting consolidation

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow manual_let_else for clearer error handling in some contexts.
#![allow(clippy::manual_let_else)]

pub mod episodic;
pub mod graph;
pub mod resilience;
pub mod traits;

pub use episodic::InMemoryEpisodicStore;
pub use graph::{InMemoryGraphBackend, SqliteGraphBackend};
pub use resilience::{ResilientGraphBackend, RetryConfig, RetryExecutor};
pub use traits::{ConceptRecord, EdgeRecord, EpisodicStore, GraphBackend};

use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Opens the configured graph backend wrapped in the retry executor.
///
/// A `None` path opens an in-memory `SQLite` database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub fn open_graph(path: Option<&Path>, retry: RetryConfig) -> Result<Arc<dyn GraphBackend>> {
    let backend = match path {
        Some(path) => SqliteGraphBackend::new(path)?,
        None => SqliteGraphBackend::in_memory()?,
    };
    Ok(Arc::new(ResilientGraphBackend::new(backend, retry)))
}
