//! Graph backend trait for the concept graph.
//!
//! The graph layer stores `Concept` nodes keyed by unique name and directed
//! `RELATED_TO` edges between them. Backends work on flat records; the typed
//! model is encoded and decoded at this boundary by
//! [`crate::storage::graph::codec`].
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `SqliteGraphBackend` | Default; embedded | `json_extract` predicates over validation blobs |
//! | `InMemoryGraphBackend` | Testing | Fast, no persistence |
//!
//! # Error Modes and Guarantees
//!
//! All backends return `Result<T>` with errors propagated via [`crate::Error`].
//! Store and I/O failures are reported as `Error::OperationFailed`, which the
//! retry executor treats as transient.
//!
//! | Operation | Guarantee |
//! |-----------|-----------|
//! | `ensure_schema` | Idempotent, safe to repeat |
//! | `upsert_concept` | Create-or-update by name, atomic per call |
//! | `create_concept_if_absent` | Merge-if-absent, never overwrites |
//! | `upsert_edge` | Create-or-update by `(from, to, type)` |

use crate::Result;
use crate::models::KnowledgeQuery;

/// Flat storage form of a concept node.
///
/// `validation_json` carries the full validation metadata. The discrete
/// columns mirror its most important fields so rows written without a blob
/// can still be decoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConceptRecord {
    /// Unique name.
    pub name: String,
    /// Concept type.
    pub concept_type: String,
    /// Description.
    pub description: String,
    /// Whether the concept was written by consolidation.
    pub is_consolidation: bool,
    /// Serialized validation metadata.
    pub validation_json: Option<String>,
    /// Discrete fallback: confidence.
    pub confidence: Option<f32>,
    /// Discrete fallback: source.
    pub source: Option<String>,
    /// Discrete fallback: domain.
    pub domain: Option<String>,
    /// Discrete fallback: access domain.
    pub access_domain: Option<String>,
}

/// Flat storage form of a directed `RELATED_TO` edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeRecord {
    /// Source concept name.
    pub from_name: String,
    /// Target concept name.
    pub to_name: String,
    /// Relationship `type` property.
    pub relationship_type: String,
    /// Whether the edge is half of a pair.
    pub bidirectional: bool,
    /// `forward` or `reverse`.
    pub direction: String,
    /// Serialized validation metadata.
    pub validation_json: Option<String>,
}

/// Trait for concept graph backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn GraphBackend>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - Each method call must be atomic on its own; callers do not expect
///   multi-call transactions
/// - Validation predicates in [`KnowledgeQuery`] are evaluated against the
///   serialized validation blob
pub trait GraphBackend: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Creates the uniqueness constraint on concept names and the type index.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema statements fail.
    fn ensure_schema(&self) -> Result<()>;

    /// Creates or updates a concept node keyed by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn upsert_concept(&self, record: &ConceptRecord) -> Result<()>;

    /// Creates a concept node only if no node with that name exists.
    ///
    /// Returns `true` if the node was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn create_concept_if_absent(&self, record: &ConceptRecord) -> Result<bool>;

    /// Retrieves a concept node by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_concept(&self, name: &str) -> Result<Option<ConceptRecord>>;

    /// Creates or updates a directed edge keyed by `(from, to, type)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<()>;

    /// Returns all outgoing and incoming edges of a concept.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn edges_for(&self, name: &str) -> Result<Vec<EdgeRecord>>;

    /// Returns concept nodes matching the query, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>>;

    /// Returns the number of concept nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_concepts(&self) -> Result<usize>;

    /// Returns the number of directed edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_edges(&self) -> Result<usize>;
}
