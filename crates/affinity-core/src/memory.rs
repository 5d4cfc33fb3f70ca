//! In-process tag store and celebration ledger.
//!
//! [`MemoryTagStore`] behaves like the remote store (toggle semantics,
//! listing by tag) and can be told to fail specific operations, which is
//! how rollback paths are exercised. It also backs the CLI's offline mode,
//! seeded from and written back to a JSON file.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{PairKey, TaggedUser, UserId};
use crate::tags::{Tag, TagSet};
use crate::traits::{CelebrationLedger, TagStore};

/// Store operation, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetTags,
    ToggleTag,
    SendNote,
    ListByTag,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub viewer: UserId,
    pub target: Option<UserId>,
    pub tag: Option<Tag>,
}

/// Serializable contents of a [`MemoryTagStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub relations: Vec<SeedRelation>,
    #[serde(default)]
    pub profiles: Vec<TaggedUser>,
    #[serde(default)]
    pub notes: Vec<SeedNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRelation {
    pub viewer: UserId,
    pub target: UserId,
    pub tags: TagSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedNote {
    pub sender: UserId,
    pub recipient: UserId,
    pub note: String,
}

#[derive(Default)]
struct StoreState {
    relations: BTreeMap<PairKey, TagSet>,
    profiles: HashMap<UserId, TaggedUser>,
    notes: Vec<SeedNote>,
    failing_ops: HashSet<StoreOp>,
    failing_toggles: HashSet<Tag>,
    calls: Vec<StoreCall>,
}

/// Tag store held entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryTagStore {
    state: Arc<Mutex<StoreState>>,
    latency: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from serialized contents.
    pub fn from_seed(seed: StoreSeed) -> Self {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            for rel in seed.relations {
                state
                    .relations
                    .insert(PairKey::new(rel.viewer, rel.target), rel.tags);
            }
            for profile in seed.profiles {
                state.profiles.insert(profile.user_id, profile);
            }
            state.notes = seed.notes;
        }
        store
    }

    /// Serializable contents, empty relations omitted.
    pub fn to_seed(&self) -> StoreSeed {
        let state = lock(&self.state);
        let mut profiles: Vec<TaggedUser> = state.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.user_id);
        StoreSeed {
            relations: state
                .relations
                .iter()
                .filter(|(_, tags)| !tags.is_empty())
                .map(|(pair, tags)| SeedRelation {
                    viewer: pair.viewer,
                    target: pair.target,
                    tags: tags.clone(),
                })
                .collect(),
            profiles,
            notes: state.notes.clone(),
        }
    }

    /// Delay every call, to hold actions in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the viewer's tags toward the target.
    pub fn set_tags(&self, viewer: UserId, target: UserId, tags: impl Into<TagSet>) {
        lock(&self.state)
            .relations
            .insert(PairKey::new(viewer, target), tags.into());
    }

    /// Current tags without recording a call.
    pub fn peek(&self, viewer: UserId, target: UserId) -> TagSet {
        lock(&self.state)
            .relations
            .get(&PairKey::new(viewer, target))
            .cloned()
            .unwrap_or_default()
    }

    /// Register display details returned by `list_by_tag`.
    pub fn add_profile(&self, profile: TaggedUser) {
        lock(&self.state).profiles.insert(profile.user_id, profile);
    }

    /// Make every call of `op` fail until [`heal`](Self::heal).
    pub fn fail_op(&self, op: StoreOp) {
        lock(&self.state).failing_ops.insert(op);
    }

    /// Make toggles of `tag` fail until [`heal`](Self::heal).
    pub fn fail_toggle(&self, tag: Tag) {
        lock(&self.state).failing_toggles.insert(tag);
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        let mut state = lock(&self.state);
        state.failing_ops.clear();
        state.failing_toggles.clear();
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of recorded calls of `op`.
    pub fn call_count(&self, op: StoreOp) -> usize {
        lock(&self.state).calls.iter().filter(|c| c.op == op).count()
    }

    /// Notes sent so far.
    pub fn notes(&self) -> Vec<SeedNote> {
        lock(&self.state).notes.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record(&self, call: StoreCall) -> Result<()> {
        let mut state = lock(&self.state);
        let fails = state.failing_ops.contains(&call.op)
            || call
                .tag
                .is_some_and(|t| call.op == StoreOp::ToggleTag && state.failing_toggles.contains(&t));
        let op = call.op;
        state.calls.push(call);
        if fails {
            return Err(Error::Store(format!("simulated {:?} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn get_tags(&self, viewer: UserId, target: UserId) -> Result<TagSet> {
        self.simulate_latency().await;
        self.record(StoreCall {
            op: StoreOp::GetTags,
            viewer,
            target: Some(target),
            tag: None,
        })?;
        Ok(self.peek(viewer, target))
    }

    async fn toggle_tag(&self, viewer: UserId, target: UserId, tag: Tag) -> Result<()> {
        self.simulate_latency().await;
        self.record(StoreCall {
            op: StoreOp::ToggleTag,
            viewer,
            target: Some(target),
            tag: Some(tag),
        })?;
        let mut state = lock(&self.state);
        let tags = state
            .relations
            .entry(PairKey::new(viewer, target))
            .or_default();
        if !tags.remove(tag) {
            tags.insert(tag);
        }
        Ok(())
    }

    async fn send_note(&self, sender: UserId, recipient: UserId, note: &str) -> Result<()> {
        self.simulate_latency().await;
        self.record(StoreCall {
            op: StoreOp::SendNote,
            viewer: sender,
            target: Some(recipient),
            tag: None,
        })?;
        lock(&self.state).notes.push(SeedNote {
            sender,
            recipient,
            note: note.to_string(),
        });
        Ok(())
    }

    async fn list_by_tag(&self, viewer: UserId, tag: Tag) -> Result<Vec<TaggedUser>> {
        self.simulate_latency().await;
        self.record(StoreCall {
            op: StoreOp::ListByTag,
            viewer,
            target: None,
            tag: Some(tag),
        })?;
        let state = lock(&self.state);
        Ok(state
            .relations
            .iter()
            .filter(|(pair, tags)| pair.viewer == viewer && tags.contains(tag))
            .map(|(pair, _)| {
                state
                    .profiles
                    .get(&pair.target)
                    .cloned()
                    .unwrap_or_else(|| TaggedUser::bare(pair.target))
            })
            .collect())
    }
}

/// Celebration ledger held in memory.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    sets: Arc<Mutex<HashMap<UserId, BTreeSet<UserId>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CelebrationLedger for MemoryLedger {
    async fn load(&self, viewer: UserId) -> Result<BTreeSet<UserId>> {
        Ok(lock(&self.sets).get(&viewer).cloned().unwrap_or_default())
    }

    async fn record(&self, viewer: UserId, target: UserId) -> Result<bool> {
        Ok(lock(&self.sets).entry(viewer).or_default().insert(target))
    }

    async fn forget(&self, viewer: UserId, target: UserId) -> Result<bool> {
        Ok(lock(&self.sets)
            .get_mut(&viewer)
            .is_some_and(|set| set.remove(&target)))
    }
}
