//! # KyroDrift - Drift-aware behavior resolution
//!
//! KyroDrift maintains a per-user ledger of inferred behavioral preferences and
//! decides, for every newly observed candidate, whether it reinforces an
//! existing belief, replaces it, starts a new one, or is noise to be logged.
//!
//! ## Core Concepts
//!
//! - **BehaviorRecord**: A ledger entry with credibility, reinforcement count and lifecycle state
//! - **Decay**: Credibility halves every `decay_half_life_days` without reinforcement
//! - **DriftSignal**: A logged rejection; enough of them inside the window force a SUPERSEDE
//! - **ResolutionAction**: The audit record produced for every candidate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kyrodrift::{BatchRequest, Candidate, Polarity, ResolutionConfig, ResolutionEngine};
//!
//! let (engine, _stores) = ResolutionEngine::in_memory(ResolutionConfig::default())?;
//! let response = engine.process_batch(&BatchRequest::new(
//!     "user-1",
//!     vec![Candidate {
//!         intent: "PREFERENCE".into(),
//!         target: "Rust".into(),
//!         context: "backend".into(),
//!         polarity: Polarity::Positive,
//!         credibility: 0.8,
//!         embedding,
//!         observed_at: None,
//!     }],
//! ));
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod action;
pub mod behavior;
pub mod candidate;
pub mod credibility;
pub mod error;
pub mod signal;

// Pure decision inputs
pub mod decay;
pub mod drift;

// Configuration, storage and execution
pub mod config;
pub mod engine;
pub mod storage;

pub use action::{ActionRecord, ActionType, BatchResponse, Outcome, ResolutionAction};
pub use behavior::{BehaviorId, BehaviorRecord, BehaviorState, Polarity};
pub use candidate::{BatchRequest, Candidate, ValidCandidate};
pub use config::{ResolutionConfig, RetryConfig, RuntimeConfig, MAX_SIGNAL_WINDOW_DAYS};
pub use credibility::Credibility;
pub use decay::{effective_credibility, Decay};
pub use drift::{classify, AnalysisParams, DriftAnalysis};
pub use engine::runtime::{lane_for, BatchHandle, DriftRuntime};
pub use engine::{decide, Decision, ResolutionEngine};
pub use error::{
    ConfigError, DriftError, DriftResult, ResolutionError, RuntimeError, ValidationError,
};
pub use signal::{DriftSignal, DriftType, SignalId};
pub use storage::{
    BehaviorFilter, BehaviorStore, CasOutcome, InMemoryBehaviorStore, InMemorySignalStore,
    InMemoryStores, Page, PageRequest, Reinforcement, SemanticMatch, SemanticMatcher, SignalStore,
    StorageError,
};
