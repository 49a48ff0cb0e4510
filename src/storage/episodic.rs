//! In-memory episodic store.
//!
//! Holds memories in insertion order. Memories can be loaded from and saved
//! back to a JSON file, either a bare array or an object with a `memories`
//! array.

use crate::models::{Memory, MemoryId};
use crate::storage::traits::EpisodicStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::RwLock;
use tracing::instrument;

#[derive(Deserialize)]
#[serde(untagged)]
enum MemoryFile {
    Bare(Vec<Memory>),
    Wrapped { memories: Vec<Memory> },
}

#[derive(Serialize)]
struct MemoryFileOut<'a> {
    memories: &'a [Memory],
}

/// Episodic store backed by a `Vec` behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryEpisodicStore {
    memories: RwLock<Vec<Memory>>,
}

impl InMemoryEpisodicStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given memories.
    #[must_use]
    pub fn with_memories(memories: Vec<Memory>) -> Self {
        Self {
            memories: RwLock::new(memories),
        }
    }

    /// Loads memories from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read and
    /// [`Error::InvalidInput`] if it is not a memory array.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_memory_file", e))?;
        let store = Self::from_json_str(&raw)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
        tracing::debug!(count = store.len(), "Loaded episodic memories");
        Ok(store)
    }

    /// Parses memories from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not a memory array.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: MemoryFile = serde_json::from_str(raw)
            .map_err(|e| Error::InvalidInput(format!("invalid memory file: {e}")))?;
        let memories = match file {
            MemoryFile::Bare(memories) | MemoryFile::Wrapped { memories } => memories,
        };
        Ok(Self::with_memories(memories))
    }

    /// Writes all memories, including their `consolidated` flags, to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization or the write fails.
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let memories = self.snapshot()?;
        let json = serde_json::to_string_pretty(&MemoryFileOut {
            memories: &memories,
        })
        .map_err(|e| Error::operation("encode_memory_file", e))?;
        std::fs::write(path, json).map_err(|e| Error::operation("write_memory_file", e))
    }

    /// Appends a memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn insert(&self, memory: Memory) -> Result<()> {
        self.memories
            .write()
            .map_err(|_| Error::operation("insert_memory", "lock poisoned"))?
            .push(memory);
        Ok(())
    }

    /// Returns a copy of every memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<Memory>> {
        self.memories
            .read()
            .map(|m| m.clone())
            .map_err(|_| Error::operation("snapshot_memories", "lock poisoned"))
    }

    /// Returns the number of memories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no memories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EpisodicStore for InMemoryEpisodicStore {
    fn get_consolidation_candidates(&self) -> Result<Vec<Memory>> {
        let memories = self
            .memories
            .read()
            .map_err(|_| Error::operation("get_consolidation_candidates", "lock poisoned"))?;
        Ok(memories.iter().filter(|m| !m.consolidated).cloned().collect())
    }

    fn mark_consolidated(&self, ids: &[MemoryId]) -> Result<usize> {
        let wanted: HashSet<&MemoryId> = ids.iter().collect();
        let mut memories = self
            .memories
            .write()
            .map_err(|_| Error::operation("mark_consolidated", "lock poisoned"))?;

        let mut changed = 0;
        for memory in memories.iter_mut() {
            if !memory.consolidated && wanted.contains(&memory.id) {
                memory.consolidated = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_exclude_consolidated() {
        let store = InMemoryEpisodicStore::with_memories(vec![
            Memory::new("m1", "first"),
            Memory::new("m2", "second"),
        ]);
        assert_eq!(store.mark_consolidated(&[MemoryId::new("m1")]).unwrap(), 1);
        assert_eq!(store.mark_consolidated(&[MemoryId::new("m1")]).unwrap(), 0);

        let candidates = store.get_consolidation_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, MemoryId::new("m2"));
    }

    #[test]
    fn test_parse_bare_and_wrapped_arrays() {
        let bare = InMemoryEpisodicStore::from_json_str(r#"[{"id": "m1", "content": "x"}]"#)
            .unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = InMemoryEpisodicStore::from_json_str(
            r#"{"memories": [{"id": "m1", "content": {"text": "x"}}, {"id": "m2", "content": "y"}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = InMemoryEpisodicStore::from_json_str(r#"{"nope": 1}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_save_and_reload_keeps_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memories.json");

        let store = InMemoryEpisodicStore::with_memories(vec![Memory::new("m1", "text")]);
        store.mark_consolidated(&[MemoryId::new("m1")]).unwrap();
        store.save_json_file(&path).unwrap();

        let reloaded = InMemoryEpisodicStore::from_json_file(&path).unwrap();
        assert!(reloaded.get_consolidation_candidates().unwrap().is_empty());
    }
}
