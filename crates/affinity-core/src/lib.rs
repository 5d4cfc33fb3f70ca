//! # affinity-core
//!
//! Core types, traits, and abstractions for the affinity match engine.
//!
//! This crate provides the tag vocabulary, the pure match evaluator, the
//! tag store and ledger traits, and in-memory implementations of both that
//! the other affinity crates and their tests build on.

pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod memory;
pub mod models;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use evaluator::{can_like, can_like_flags, compute_state, is_new_match, next_heart_action};
pub use events::{EventBus, EventEnvelope, MatchEvent};
pub use memory::{MemoryLedger, MemoryTagStore, SeedNote, SeedRelation, StoreCall, StoreOp, StoreSeed};
pub use models::*;
pub use tags::{Tag, TagSet};
pub use traits::*;
