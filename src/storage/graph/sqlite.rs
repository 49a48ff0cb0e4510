//! `SQLite` graph backend for the concept graph.
//!
//! Concepts live in a `concepts` table with a unique index on `name`; edges
//! live in `related_to`, keyed by `(from_name, to_name, relationship_type)`.
//! Validation predicates are evaluated with `json_extract` over the stored
//! blob, falling back to the discrete columns.

// Allow cast_possible_truncation and cast_sign_loss for SQLite i64 to usize conversions.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Allow cast_possible_wrap - usize to i64 casts for LIMIT won't wrap in practice.
#![allow(clippy::cast_possible_wrap)]
// Allow redundant_closure_for_method_calls - closures needed due to rusqlite's Error type.
#![allow(clippy::redundant_closure_for_method_calls)]

use crate::models::KnowledgeQuery;
use crate::storage::traits::{ConceptRecord, EdgeRecord, GraphBackend};
use crate::{Error, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

/// Helper to acquire mutex lock with poison recovery.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Graph SQLite mutex was poisoned, recovering");
            metrics::counter!("graph_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Unicode-aware replacement for `SQLite`'s ASCII-only `lower()`.
const LOWER_FN: &str = "mnemo_lower";

const CONCEPT_COLUMNS: &str = "name, concept_type, description, is_consolidation, \
     validation_json, confidence, source, domain, access_domain";

const EDGE_COLUMNS: &str =
    "from_name, to_name, relationship_type, bidirectional, direction, validation_json";

/// Blob field with a discrete-column fallback, evaluated per row.
fn blob_or_column(path: &str, fallback: &str) -> String {
    format!(
        "{LOWER_FN}(COALESCE(CASE WHEN json_valid(validation_json) \
         THEN json_extract(validation_json, '{path}') END, {fallback}))"
    )
}

fn grant_field(path: &str) -> String {
    format!(
        "(CASE WHEN json_valid(validation_json) \
         THEN json_extract(validation_json, '$.cross_domain.{path}') END)"
    )
}

/// `SQLite`-based concept graph backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and `busy_timeout`
/// handle concurrent access gracefully.
///
/// # Schema
///
/// Tables are not created by the constructors; call
/// [`GraphBackend::ensure_schema`] (the resilient wrapper does this lazily on
/// first use).
pub struct SqliteGraphBackend {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteGraphBackend {
    /// Opens a `SQLite` graph backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_graph_dir", e))?;
        }
        let conn =
            Connection::open(&db_path).map_err(|e| Error::operation("open_graph_sqlite", e))?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        })
    }

    /// Creates an in-memory `SQLite` graph backend (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_graph_sqlite_memory", e))?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn configure(conn: &Connection) -> Result<()> {
        // Enable WAL mode for better concurrent read performance
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        conn.create_scalar_function(
            LOWER_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )
        .map_err(|e| Error::operation("register_graph_sqlite_functions", e))
    }

    fn parse_concept_row(row: &Row<'_>) -> rusqlite::Result<ConceptRecord> {
        let confidence: Option<f64> = row.get("confidence")?;
        Ok(ConceptRecord {
            name: row.get("name")?,
            concept_type: row.get("concept_type")?,
            description: row.get("description")?,
            is_consolidation: row.get::<_, i64>("is_consolidation")? != 0,
            validation_json: row.get("validation_json")?,
            confidence: confidence.map(|c| c as f32),
            source: row.get("source")?,
            domain: row.get("domain")?,
            access_domain: row.get("access_domain")?,
        })
    }

    fn parse_edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRecord> {
        Ok(EdgeRecord {
            from_name: row.get("from_name")?,
            to_name: row.get("to_name")?,
            relationship_type: row.get("relationship_type")?,
            bidirectional: row.get::<_, i64>("bidirectional")? != 0,
            direction: row.get("direction")?,
            validation_json: row.get("validation_json")?,
        })
    }

    /// Builds the WHERE clause and its parameters from a knowledge query.
    fn build_where_clause(query: &KnowledgeQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref names) = query.names {
            if names.is_empty() {
                conditions.push("0".to_string());
            } else {
                let placeholders = vec!["?"; names.len()].join(", ");
                conditions.push(format!("name IN ({placeholders})"));
                for name in names {
                    params.push(Box::new(name.clone()));
                }
            }
        }

        if let Some(concept_type) = query.concept_type {
            conditions.push(format!("{LOWER_FN}(concept_type) = ?"));
            params.push(Box::new(concept_type.as_str().to_string()));
        }

        if let Some(ref pattern) = query.description_pattern {
            conditions.push(format!("instr({LOWER_FN}(description), ?) > 0"));
            params.push(Box::new(pattern.to_lowercase()));
        }

        if let Some(ref text) = query.text {
            conditions.push(format!(
                "(instr({LOWER_FN}(name), ?) > 0 OR instr({LOWER_FN}(description), ?) > 0)"
            ));
            params.push(Box::new(text.to_lowercase()));
            params.push(Box::new(text.to_lowercase()));
        }

        if let Some(domain) = query.domain {
            conditions.push(format!(
                "{} = ?",
                blob_or_column("$.domain", "domain, 'general'")
            ));
            params.push(Box::new(domain.as_str().to_string()));
        }

        if let Some(domain) = query.access_domain {
            conditions.push(format!(
                "{} = ?",
                blob_or_column("$.access_domain", "access_domain, domain, 'general'")
            ));
            params.push(Box::new(domain.as_str().to_string()));
        }

        if let Some(approved) = query.cross_domain_approved {
            conditions.push(format!("{} = ?", grant_field("approved")));
            params.push(Box::new(i64::from(approved)));
        }

        if let Some(requested) = query.cross_domain_requested {
            conditions.push(format!("{} = ?", grant_field("requested")));
            params.push(Box::new(i64::from(requested)));
        }

        if let Some(source) = query.cross_domain_source {
            conditions.push(format!("{LOWER_FN}({}) = ?", grant_field("source_domain")));
            params.push(Box::new(source.as_str().to_string()));
        }

        if let Some(target) = query.cross_domain_target {
            conditions.push(format!("{LOWER_FN}({}) = ?", grant_field("target_domain")));
            params.push(Box::new(target.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn count(&self, table: &str, operation: &str) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::operation(operation, e))?;
        Ok(count as usize)
    }
}

impl GraphBackend for SqliteGraphBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self))]
    fn ensure_schema(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS concepts (
                name TEXT NOT NULL,
                concept_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_consolidation INTEGER NOT NULL DEFAULT 0,
                validation_json TEXT,
                confidence REAL,
                source TEXT,
                domain TEXT,
                access_domain TEXT,
                updated_at INTEGER NOT NULL DEFAULT 0
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_concepts_name ON concepts(name);
            CREATE INDEX IF NOT EXISTS idx_concepts_type ON concepts(concept_type);
            CREATE TABLE IF NOT EXISTS related_to (
                from_name TEXT NOT NULL,
                to_name TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                bidirectional INTEGER NOT NULL DEFAULT 0,
                direction TEXT NOT NULL DEFAULT 'forward',
                validation_json TEXT,
                updated_at INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (from_name, to_name, relationship_type)
            );
            CREATE INDEX IF NOT EXISTS idx_related_to_to ON related_to(to_name);",
        )
        .map_err(|e| Error::operation("ensure_graph_schema", e))?;

        Ok(())
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    fn upsert_concept(&self, record: &ConceptRecord) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute(
            "INSERT INTO concepts (
                name, concept_type, description, is_consolidation, validation_json,
                confidence, source, domain, access_domain, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(name) DO UPDATE SET
                concept_type = excluded.concept_type,
                description = excluded.description,
                is_consolidation = excluded.is_consolidation,
                validation_json = excluded.validation_json,
                confidence = excluded.confidence,
                source = excluded.source,
                domain = excluded.domain,
                access_domain = excluded.access_domain,
                updated_at = excluded.updated_at",
            params![
                record.name,
                record.concept_type,
                record.description,
                i64::from(record.is_consolidation),
                record.validation_json,
                record.confidence.map(f64::from),
                record.source,
                record.domain,
                record.access_domain,
                crate::current_timestamp() as i64,
            ],
        )
        .map_err(|e| Error::operation("upsert_concept", e))?;

        metrics::counter!("graph_concepts_upserted_total").increment(1);
        Ok(())
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    fn create_concept_if_absent(&self, record: &ConceptRecord) -> Result<bool> {
        let conn = acquire_lock(&self.conn);

        let rows = conn
            .execute(
                "INSERT INTO concepts (
                    name, concept_type, description, is_consolidation, validation_json,
                    confidence, source, domain, access_domain, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(name) DO NOTHING",
                params![
                    record.name,
                    record.concept_type,
                    record.description,
                    i64::from(record.is_consolidation),
                    record.validation_json,
                    record.confidence.map(f64::from),
                    record.source,
                    record.domain,
                    record.access_domain,
                    crate::current_timestamp() as i64,
                ],
            )
            .map_err(|e| Error::operation("create_concept_if_absent", e))?;

        Ok(rows > 0)
    }

    #[instrument(skip(self))]
    fn get_concept(&self, name: &str) -> Result<Option<ConceptRecord>> {
        let conn = acquire_lock(&self.conn);

        conn.query_row(
            &format!("SELECT {CONCEPT_COLUMNS} FROM concepts WHERE name = ?1"),
            params![name],
            Self::parse_concept_row,
        )
        .optional()
        .map_err(|e| Error::operation("get_concept", e))
    }

    #[instrument(skip(self, edge), fields(from = %edge.from_name, to = %edge.to_name))]
    fn upsert_edge(&self, edge: &EdgeRecord) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute(
            "INSERT INTO related_to (
                from_name, to_name, relationship_type, bidirectional, direction,
                validation_json, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(from_name, to_name, relationship_type) DO UPDATE SET
                bidirectional = excluded.bidirectional,
                direction = excluded.direction,
                validation_json = excluded.validation_json,
                updated_at = excluded.updated_at",
            params![
                edge.from_name,
                edge.to_name,
                edge.relationship_type,
                i64::from(edge.bidirectional),
                edge.direction,
                edge.validation_json,
                crate::current_timestamp() as i64,
            ],
        )
        .map_err(|e| Error::operation("upsert_edge", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    fn edges_for(&self, name: &str) -> Result<Vec<EdgeRecord>> {
        let conn = acquire_lock(&self.conn);

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM related_to
                 WHERE from_name = ?1 OR to_name = ?1
                 ORDER BY from_name, to_name, relationship_type"
            ))
            .map_err(|e| Error::operation("edges_for_prepare", e))?;

        let edges = stmt
            .query_map(params![name], Self::parse_edge_row)
            .map_err(|e| Error::operation("edges_for", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("edges_for_row", e))?;

        Ok(edges)
    }

    #[instrument(skip(self, query))]
    fn find_concepts(&self, query: &KnowledgeQuery) -> Result<Vec<ConceptRecord>> {
        let conn = acquire_lock(&self.conn);

        let (where_clause, params) = Self::build_where_clause(query);
        let limit = query.limit.map_or(-1, |l| l as i64);
        let sql = format!(
            "SELECT {CONCEPT_COLUMNS} FROM concepts {where_clause} ORDER BY name LIMIT {limit}"
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::operation("find_concepts_prepare", e))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let records = stmt
            .query_map(param_refs.as_slice(), Self::parse_concept_row)
            .map_err(|e| Error::operation("find_concepts", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("find_concepts_row", e))?;

        Ok(records)
    }

    fn count_concepts(&self) -> Result<usize> {
        self.count("concepts", "count_concepts")
    }

    fn count_edges(&self) -> Result<usize> {
        self.count("related_to", "count_edges")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Concept, ConceptType, CrossDomainGrant, PrimaryDomain, ValidationMetadata,
    };
    use crate::storage::graph::codec::encode_concept;
    use tempfile::TempDir;

    fn backend() -> SqliteGraphBackend {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        backend.ensure_schema().unwrap();
        backend
    }

    fn concept_record(name: &str, validation: ValidationMetadata) -> ConceptRecord {
        let mut concept = Concept::new(name, ConceptType::Entity, format!("About {name}"));
        concept.validation = validation;
        encode_concept(&concept).unwrap()
    }

    #[test]
    fn test_operations_fail_before_schema() {
        let backend = SqliteGraphBackend::in_memory().unwrap();
        let result = backend.count_concepts();
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let backend = backend();
        backend.ensure_schema().unwrap();
        assert_eq!(backend.count_concepts().unwrap(), 0);
    }

    #[test]
    fn test_upsert_updates_by_name() {
        let backend = backend();
        backend
            .upsert_concept(&concept_record("A", ValidationMetadata::new(0.5, "x")))
            .unwrap();
        backend
            .upsert_concept(&concept_record("A", ValidationMetadata::new(0.9, "y")))
            .unwrap();

        assert_eq!(backend.count_concepts().unwrap(), 1);
        let stored = backend.get_concept("A").unwrap().unwrap();
        assert_eq!(stored.source.as_deref(), Some("y"));
    }

    #[test]
    fn test_create_if_absent_keeps_existing() {
        let backend = backend();
        let original = concept_record("A", ValidationMetadata::default());
        assert!(backend.create_concept_if_absent(&original).unwrap());

        let stub = ConceptRecord {
            name: "A".to_string(),
            concept_type: "pending".to_string(),
            ..ConceptRecord::default()
        };
        assert!(!backend.create_concept_if_absent(&stub).unwrap());
        assert_eq!(backend.get_concept("A").unwrap().unwrap(), original);
    }

    #[test]
    fn test_edges_for_returns_both_directions() {
        let backend = backend();
        for (from, to, direction) in [("A", "B", "forward"), ("B", "A", "reverse")] {
            backend
                .upsert_edge(&EdgeRecord {
                    from_name: from.to_string(),
                    to_name: to.to_string(),
                    relationship_type: "related_to".to_string(),
                    bidirectional: true,
                    direction: direction.to_string(),
                    validation_json: None,
                })
                .unwrap();
        }
        assert_eq!(backend.edges_for("A").unwrap().len(), 2);
        assert_eq!(backend.count_edges().unwrap(), 2);
    }

    #[test]
    fn test_find_by_blob_domain() {
        let backend = backend();
        backend
            .upsert_concept(&concept_record(
                "Work",
                ValidationMetadata::default().with_domain(PrimaryDomain::Professional),
            ))
            .unwrap();
        backend
            .upsert_concept(&concept_record(
                "Home",
                ValidationMetadata::default().with_domain(PrimaryDomain::Personal),
            ))
            .unwrap();

        let found = backend
            .find_concepts(&KnowledgeQuery::new().with_domain(PrimaryDomain::Professional))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Work");
    }

    #[test]
    fn test_find_by_fallback_columns() {
        let backend = backend();
        let legacy = ConceptRecord {
            name: "Legacy".to_string(),
            concept_type: "entity".to_string(),
            domain: Some("system".to_string()),
            ..ConceptRecord::default()
        };
        backend.upsert_concept(&legacy).unwrap();

        let found = backend
            .find_concepts(&KnowledgeQuery::new().with_access_domain(PrimaryDomain::System))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_find_by_cross_domain_grant() {
        let backend = backend();
        backend
            .upsert_concept(&concept_record(
                "Shared",
                ValidationMetadata::default().with_cross_domain(CrossDomainGrant::approved(
                    PrimaryDomain::Personal,
                    PrimaryDomain::Professional,
                    "approved by user",
                )),
            ))
            .unwrap();
        backend
            .upsert_concept(&concept_record("Private", ValidationMetadata::default()))
            .unwrap();

        let approved = backend
            .find_concepts(
                &KnowledgeQuery::new()
                    .with_cross_domain_approved(true)
                    .with_cross_domain_target(PrimaryDomain::Professional),
            )
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].name, "Shared");

        let unapproved = backend
            .find_concepts(&KnowledgeQuery::new().with_cross_domain_approved(false))
            .unwrap();
        assert!(unapproved.is_empty());
    }

    #[test]
    fn test_find_by_text_limit_and_names() {
        let backend = backend();
        for name in ["Alpha", "Beta", "Gamma"] {
            backend
                .upsert_concept(&concept_record(name, ValidationMetadata::default()))
                .unwrap();
        }

        let limited = backend
            .find_concepts(&KnowledgeQuery::new().with_text("about").with_limit(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].name, "Alpha");

        let named = backend
            .find_concepts(&KnowledgeQuery::new().with_names(["Gamma", "Missing"]))
            .unwrap();
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("graph.db");
        {
            let backend = SqliteGraphBackend::new(&path).unwrap();
            backend.ensure_schema().unwrap();
            backend
                .upsert_concept(&concept_record("Kept", ValidationMetadata::default()))
                .unwrap();
        }
        let reopened = SqliteGraphBackend::new(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert!(reopened.get_concept("Kept").unwrap().is_some());
    }
}
