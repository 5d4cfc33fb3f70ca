//! Core traits for affinity abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TaggedUser, UserId};
use crate::tags::{Tag, TagSet};

// =============================================================================
// TAG STORE
// =============================================================================

/// Service of record for viewer → target tag relations.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Tags the viewer currently holds toward the target.
    async fn get_tags(&self, viewer: UserId, target: UserId) -> Result<TagSet>;

    /// Flip membership of `tag` in the viewer → target relation.
    async fn toggle_tag(&self, viewer: UserId, target: UserId, tag: Tag) -> Result<()>;

    /// Send a short note alongside a like.
    async fn send_note(&self, sender: UserId, recipient: UserId, note: &str) -> Result<()>;

    /// Everyone the viewer has tagged with `tag`.
    async fn list_by_tag(&self, viewer: UserId, tag: Tag) -> Result<Vec<TaggedUser>>;
}

// =============================================================================
// CELEBRATION LEDGER
// =============================================================================

/// Persisted per-viewer set of targets whose match was already celebrated.
#[async_trait]
pub trait CelebrationLedger: Send + Sync {
    /// Every target celebrated so far. Empty on first use.
    async fn load(&self, viewer: UserId) -> Result<BTreeSet<UserId>>;

    /// Add `target` to the set. Returns false if it was already there.
    async fn record(&self, viewer: UserId, target: UserId) -> Result<bool>;

    /// Drop `target` from the set. Returns false if it was not there.
    async fn forget(&self, viewer: UserId, target: UserId) -> Result<bool>;
}

/// Storage key of a viewer's celebrated-match set.
pub fn celebrated_key(viewer: UserId) -> String {
    format!("celebrated_matches_{}", viewer)
}
