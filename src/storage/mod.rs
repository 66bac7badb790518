//! Storage layer for KyroDrift.
//!
//! The traits define the abstract interface the resolution engine talks to;
//! `memory` provides the thread-safe in-memory backend.

mod memory;
mod traits;

pub use memory::{InMemoryBehaviorStore, InMemorySignalStore, InMemoryStores};
pub use traits::{
    window_start, BehaviorFilter, BehaviorStore, CasOutcome, Page, PageRequest, Reinforcement,
    SemanticMatch, SemanticMatcher, SignalStore, StorageError,
};
