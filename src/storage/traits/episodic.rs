//! Episodic store trait.

use crate::Result;
use crate::models::{Memory, MemoryId};

/// Source of episodic memories awaiting consolidation.
///
/// The episodic store owns memories; the consolidation core only reads them
/// and asks the store to flip the `consolidated` flag after a run.
pub trait EpisodicStore: Send + Sync {
    /// Returns the unconsolidated memories eligible for the next run.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn get_consolidation_candidates(&self) -> Result<Vec<Memory>>;

    /// Marks memories as consolidated.
    ///
    /// Returns the number of memories that changed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn mark_consolidated(&self, ids: &[MemoryId]) -> Result<usize>;
}
