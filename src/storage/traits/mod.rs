//! Storage backend traits.

mod episodic;
pub mod graph;

pub use episodic::EpisodicStore;
pub use graph::{ConceptRecord, EdgeRecord, GraphBackend};
