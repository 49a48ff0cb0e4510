//! Graph storage backends for the concept graph.
//!
//! This module provides implementations of the [`GraphBackend`] trait for
//! storing concept nodes and `RELATED_TO` edges.
//!
//! # Available Backends
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | [`SqliteGraphBackend`] | Default; embedded | `json_extract` validation predicates |
//! | [`InMemoryGraphBackend`] | Testing | Fast, no persistence |
//!
//! # Example
//!
//! ```rust
//! use mnemo::storage::graph::{SqliteGraphBackend, codec};
//! use mnemo::storage::GraphBackend;
//! use mnemo::models::{Concept, ConceptType};
//!
//! let backend = SqliteGraphBackend::in_memory()?;
//! backend.ensure_schema()?;
//!
//! let concept = Concept::new("Python", ConceptType::Entity, "A language");
//! backend.upsert_concept(&codec::encode_concept(&concept)?)?;
//! assert_eq!(backend.count_concepts()?, 1);
//! # Ok::<(), mnemo::Error>(())
//! ```

pub mod codec;
mod memory;
mod sqlite;

pub use memory::InMemoryGraphBackend;
pub use sqlite::SqliteGraphBackend;

pub use crate::storage::traits::graph::{ConceptRecord, EdgeRecord, GraphBackend};
