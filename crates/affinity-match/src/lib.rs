//! # affinity-match
//!
//! Turns user actions on another profile into tag store mutations and
//! detects newly formed matches.
//!
//! This crate provides:
//! - [`ActionDispatcher`]: heart, hide and tag controls with optimistic
//!   local state, rollback on failure and a per-pair in-flight guard
//! - [`CelebrationTrigger`]: one-shot celebration of new mutual likes
//! - [`FileLedger`]: JSON-file persistence of already-celebrated matches
//! - [`TagCache`]: TTL-bounded cache of the viewer's own tag sets
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use affinity_match::{ActionDispatcher, DispatchConfig, FileLedger};
//! use affinity_client::HttpTagStore;
//!
//! let store = Arc::new(HttpTagStore::from_env()?);
//! let ledger = Arc::new(FileLedger::new(".affinity"));
//! let dispatcher = ActionDispatcher::new(store, ledger, DispatchConfig::from_env());
//!
//! let result = dispatcher.click_heart(viewer, target).await?;
//! println!("{:?} -> {}", result.outcome, result.state);
//! ```

pub mod cache;
pub mod celebration;
pub mod dispatcher;
pub mod ledger;

// Re-export core types
pub use affinity_core::*;

pub use cache::TagCache;
pub use celebration::CelebrationTrigger;
pub use dispatcher::{
    ActionDispatcher, DispatchConfig, Dispatched, HeartOutcome, HideOutcome, TagOutcome,
};
pub use ledger::FileLedger;
