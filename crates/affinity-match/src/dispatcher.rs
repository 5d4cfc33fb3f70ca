//! Action dispatch for the heart, hide and tag controls.
//!
//! Each public action runs the same pipeline: take the pair's in-flight
//! guard, read both directions from the store, decide with the evaluator,
//! write the optimistic result to the cache, issue the toggles in order, and
//! finally re-read the viewer's tags once from the store. The first failed
//! toggle restores the cached set and ends the action; nothing is retried.
//!
//! Toggles flip membership, so the set they are computed from must be the
//! store's current one. The cache only serves read-only queries.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use affinity_core::defaults;
use affinity_core::{
    can_like, compute_state, is_new_match, next_heart_action, Celebration, CelebrationLedger,
    Error, EventBus, HeartAction, MatchEvent, PairKey, RelationshipState, Result, Tag, TagSet,
    TagStore, TaggedUser, UserId,
};

use crate::cache::TagCache;
use crate::celebration::CelebrationTrigger;

// =============================================================================
// CONFIG
// =============================================================================

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long the viewer's cached tags are trusted.
    pub cache_ttl: Duration,
    /// Drop the target from the celebrated set when a match is broken.
    pub forget_on_unmatch: bool,
    /// Event bus buffer size.
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
            forget_on_unmatch: defaults::FORGET_ON_UNMATCH,
            event_capacity: defaults::EVENT_BUS_CAPACITY,
        }
    }
}

impl DispatchConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `AFFINITY_CACHE_TTL_SECS` | `300` | Tag cache TTL |
    /// | `AFFINITY_FORGET_ON_UNMATCH` | `false` | Re-celebrate re-formed matches |
    pub fn from_env() -> Self {
        let cache_ttl = std::env::var(defaults::ENV_CACHE_TTL_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(defaults::CACHE_TTL_SECS));

        let forget_on_unmatch = std::env::var(defaults::ENV_FORGET_ON_UNMATCH)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults::FORGET_ON_UNMATCH);

        Self {
            cache_ttl,
            forget_on_unmatch,
            ..Self::default()
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_forget_on_unmatch(mut self, forget: bool) -> Self {
        self.forget_on_unmatch = forget;
        self
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of a heart click or like confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HeartOutcome {
    /// `Approve` added (and `Hide` cleared if it was set).
    Approved,
    /// The target has not approved the viewer yet; nothing was changed.
    AwaitingApproval,
    /// Liking is allowed; the caller should collect a note and call
    /// [`ActionDispatcher::confirm_like`].
    NoteRequested,
    /// `Like` added, no mutual like yet.
    Liked,
    /// `Like` added and the target already liked back.
    Matched { celebration: Option<Celebration> },
    /// `Like` removed, `Approve` kept.
    Unliked { was_matched: bool },
}

/// Result of the hide control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HideOutcome {
    Hidden,
    Unhidden,
}

/// Result of a generic tag toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOutcome {
    Added,
    Removed,
    AwaitingApproval,
}

/// An action's outcome plus the settled view of the pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatched<O> {
    pub outcome: O,
    pub tags: TagSet,
    pub state: RelationshipState,
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

#[derive(Clone, Default)]
struct InFlight {
    pending: Arc<Mutex<HashSet<PairKey>>>,
}

struct InFlightGuard {
    pending: Arc<Mutex<HashSet<PairKey>>>,
    pair: PairKey,
}

fn lock(m: &Mutex<HashSet<PairKey>>) -> MutexGuard<'_, HashSet<PairKey>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InFlight {
    fn acquire(&self, pair: PairKey) -> Result<InFlightGuard> {
        if !lock(&self.pending).insert(pair) {
            debug!(viewer_id = %pair.viewer, target_id = %pair.target, "Action rejected, pair busy");
            return Err(Error::Busy {
                viewer: pair.viewer,
                target: pair.target,
            });
        }
        Ok(InFlightGuard {
            pending: Arc::clone(&self.pending),
            pair,
        })
    }

    fn is_pending(&self, pair: PairKey) -> bool {
        lock(&self.pending).contains(&pair)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.pair);
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Both directions of a pair as read at the start of an action.
struct PairView {
    mine: TagSet,
    theirs: TagSet,
}

impl PairView {
    fn state(&self) -> RelationshipState {
        compute_state(&self.mine, &self.theirs)
    }
}

/// Orchestrates user actions into tag store mutations.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn TagStore>,
    cache: TagCache,
    celebrations: CelebrationTrigger,
    events: EventBus,
    in_flight: InFlight,
    config: DispatchConfig,
}

impl ActionDispatcher {
    pub fn new(
        store: Arc<dyn TagStore>,
        ledger: Arc<dyn CelebrationLedger>,
        config: DispatchConfig,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        let celebrations = CelebrationTrigger::new(Arc::clone(&store), ledger, events.clone());
        Self {
            store,
            cache: TagCache::new(config.cache_ttl),
            celebrations,
            events,
            in_flight: InFlight::default(),
            config,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub fn celebrations(&self) -> &CelebrationTrigger {
        &self.celebrations
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Whether an action on the pair is currently running.
    pub fn is_busy(&self, viewer: UserId, target: UserId) -> bool {
        self.in_flight.is_pending(PairKey::new(viewer, target))
    }

    /// Viewer's tags toward the target, from cache when fresh.
    pub async fn viewer_tags(&self, viewer: UserId, target: UserId) -> Result<TagSet> {
        let pair = PairKey::new(viewer, target);
        if let Some(tags) = self.cache.get(pair).await {
            debug!(viewer_id = %viewer, target_id = %target, "Tag cache hit");
            return Ok(tags);
        }
        let tags = self.store.get_tags(viewer, target).await?;
        self.cache.put(pair, tags.clone()).await;
        Ok(tags)
    }

    /// Current relationship state of the viewer toward the target.
    pub async fn state(&self, viewer: UserId, target: UserId) -> Result<RelationshipState> {
        Ok(self.read_pair(viewer, target).await?.state())
    }

    /// States for a page of results. Targets whose tags cannot be read are
    /// left out.
    pub async fn relationships(
        &self,
        viewer: UserId,
        targets: &[UserId],
    ) -> Vec<(UserId, RelationshipState)> {
        let reads = targets.iter().map(|&target| async move {
            match self.read_pair(viewer, target).await {
                Ok(view) => Some((target, view.state())),
                Err(e) => {
                    warn!(viewer_id = %viewer, target_id = %target, error = %e, "Skipping result");
                    None
                }
            }
        });
        futures::future::join_all(reads)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Heart button.
    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target))]
    pub async fn click_heart(
        &self,
        viewer: UserId,
        target: UserId,
    ) -> Result<Dispatched<HeartOutcome>> {
        let pair = PairKey::new(viewer, target);
        let _guard = self.in_flight.acquire(pair)?;
        let view = self.read_pair_fresh(viewer, target).await?;
        let before = view.state();

        match next_heart_action(before) {
            HeartAction::AddApprove => {
                let mut steps = Vec::new();
                if view.mine.contains(Tag::Hide) {
                    steps.push(Tag::Hide);
                }
                if !view.mine.contains(Tag::Approve) {
                    steps.push(Tag::Approve);
                }
                let tags = self
                    .mutate(pair, &view.mine, view.mine.with_approve(), &steps)
                    .await?;
                Ok(self.settle(pair, HeartOutcome::Approved, tags, &view.theirs, before))
            }
            HeartAction::AddLike => {
                if !can_like(&view.theirs) {
                    info!("Like blocked until target approves");
                    return Ok(Dispatched {
                        outcome: HeartOutcome::AwaitingApproval,
                        tags: view.mine,
                        state: before,
                    });
                }
                Ok(Dispatched {
                    outcome: HeartOutcome::NoteRequested,
                    tags: view.mine,
                    state: before,
                })
            }
            HeartAction::RemoveLike => {
                let mut steps = vec![Tag::Like];
                if !view.mine.contains(Tag::Approve) {
                    steps.push(Tag::Approve);
                }
                let tags = self
                    .mutate(pair, &view.mine, view.mine.without_like(), &steps)
                    .await?;
                let was_matched = before == RelationshipState::Matched;
                let dispatched = self.settle(
                    pair,
                    HeartOutcome::Unliked { was_matched },
                    tags,
                    &view.theirs,
                    before,
                );
                if was_matched && dispatched.state != RelationshipState::Matched {
                    self.on_unmatch(viewer, target).await;
                }
                Ok(dispatched)
            }
        }
    }

    /// Second half of a like: add `Like`, send the note, check for a match.
    ///
    /// Re-checks the approval gate, since the target may have changed their
    /// tags while the note was being written.
    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target))]
    pub async fn confirm_like(
        &self,
        viewer: UserId,
        target: UserId,
        note: Option<&str>,
    ) -> Result<Dispatched<HeartOutcome>> {
        let pair = PairKey::new(viewer, target);
        let _guard = self.in_flight.acquire(pair)?;
        let view = self.read_pair_fresh(viewer, target).await?;
        let before = view.state();

        if view.mine.contains(Tag::Like) {
            debug!("Already liked");
            let outcome = if before == RelationshipState::Matched {
                HeartOutcome::Matched { celebration: None }
            } else {
                HeartOutcome::Liked
            };
            return Ok(Dispatched {
                outcome,
                tags: view.mine,
                state: before,
            });
        }
        if !can_like(&view.theirs) {
            info!("Like blocked until target approves");
            return Ok(Dispatched {
                outcome: HeartOutcome::AwaitingApproval,
                tags: view.mine,
                state: before,
            });
        }

        let mut steps = Vec::new();
        if view.mine.contains(Tag::Hide) {
            steps.push(Tag::Hide);
        }
        steps.push(Tag::Like);
        let tags = self
            .mutate(pair, &view.mine, view.mine.with_like(), &steps)
            .await?;

        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            if let Err(e) = self.store.send_note(viewer, target, note).await {
                warn!(error = %e, "Note was not delivered");
            }
        }

        let after = compute_state(&tags, &view.theirs);
        let outcome = if after == RelationshipState::Matched {
            let celebration = match self.celebrations.sweep_target(viewer, target).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Celebration check failed");
                    None
                }
            };
            HeartOutcome::Matched { celebration }
        } else {
            HeartOutcome::Liked
        };
        Ok(self.settle(pair, outcome, tags, &view.theirs, before))
    }

    /// Hide button: toggles `Hide`, clearing `Approve` and `Like` when
    /// turning it on.
    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target))]
    pub async fn toggle_hide(
        &self,
        viewer: UserId,
        target: UserId,
    ) -> Result<Dispatched<HideOutcome>> {
        let pair = PairKey::new(viewer, target);
        let _guard = self.in_flight.acquire(pair)?;
        let view = self.read_pair_fresh(viewer, target).await?;
        self.hide_locked(pair, view).await
    }

    /// Generic tag chip. Relationship tags keep their invariants: `Hide`
    /// goes through the hide control, removing `Approve` drops `Like`, and
    /// adding `Like` is gated on the target's approval.
    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target, tag = %tag))]
    pub async fn toggle_tag(
        &self,
        viewer: UserId,
        target: UserId,
        tag: Tag,
    ) -> Result<Dispatched<TagOutcome>> {
        let pair = PairKey::new(viewer, target);
        let _guard = self.in_flight.acquire(pair)?;
        let view = self.read_pair_fresh(viewer, target).await?;
        let before = view.state();
        let present = view.mine.contains(tag);

        if tag == Tag::Hide {
            let hidden = self.hide_locked(pair, view).await?;
            let outcome = match hidden.outcome {
                HideOutcome::Hidden => TagOutcome::Added,
                HideOutcome::Unhidden => TagOutcome::Removed,
            };
            return Ok(Dispatched {
                outcome,
                tags: hidden.tags,
                state: hidden.state,
            });
        }

        let (optimistic, steps) = match (tag, present) {
            (Tag::Approve, true) => {
                let mut steps = Vec::new();
                if view.mine.contains(Tag::Like) {
                    steps.push(Tag::Like);
                }
                steps.push(Tag::Approve);
                (view.mine.without_approve(), steps)
            }
            (Tag::Approve, false) => {
                let mut steps = Vec::new();
                if view.mine.contains(Tag::Hide) {
                    steps.push(Tag::Hide);
                }
                steps.push(Tag::Approve);
                (view.mine.with_approve(), steps)
            }
            (Tag::Like, true) => {
                let mut steps = vec![Tag::Like];
                if !view.mine.contains(Tag::Approve) {
                    steps.push(Tag::Approve);
                }
                (view.mine.without_like(), steps)
            }
            (Tag::Like, false) => {
                if !can_like(&view.theirs) {
                    info!("Like blocked until target approves");
                    return Ok(Dispatched {
                        outcome: TagOutcome::AwaitingApproval,
                        tags: view.mine,
                        state: before,
                    });
                }
                let mut steps = Vec::new();
                if view.mine.contains(Tag::Hide) {
                    steps.push(Tag::Hide);
                }
                steps.push(Tag::Like);
                (view.mine.with_like(), steps)
            }
            (_, _) => {
                let mut next = view.mine.clone();
                if present {
                    next.remove(tag);
                } else {
                    next.insert(tag);
                }
                (next, vec![tag])
            }
        };

        let tags = self.mutate(pair, &view.mine, optimistic, &steps).await?;
        let outcome = if present {
            TagOutcome::Removed
        } else {
            TagOutcome::Added
        };
        let dispatched = self.settle(pair, outcome, tags, &view.theirs, before);

        if before == RelationshipState::Matched && dispatched.state != RelationshipState::Matched {
            self.on_unmatch(viewer, target).await;
        } else if is_new_match(before, dispatched.state) {
            if let Err(e) = self.celebrations.sweep_target(viewer, target).await {
                warn!(error = %e, "Celebration check failed");
            }
        }
        Ok(dispatched)
    }

    /// Users the viewer has tagged with `tag`, straight from the store.
    pub async fn tagged_users(&self, viewer: UserId, tag: Tag) -> Result<Vec<TaggedUser>> {
        self.store.list_by_tag(viewer, tag).await
    }

    /// Celebrate at most one new match for the viewer (page-load sweep).
    pub async fn sweep(&self, viewer: UserId) -> Result<Option<Celebration>> {
        self.celebrations.sweep(viewer).await
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    async fn read_pair(&self, viewer: UserId, target: UserId) -> Result<PairView> {
        let mine = self.viewer_tags(viewer, target).await?;
        let theirs = self.store.get_tags(target, viewer).await?;
        Ok(PairView { mine, theirs })
    }

    /// Both directions straight from the store. The viewer's side refreshes
    /// the cache.
    async fn read_pair_fresh(&self, viewer: UserId, target: UserId) -> Result<PairView> {
        let mine = self.store.get_tags(viewer, target).await?;
        self.cache.put(PairKey::new(viewer, target), mine.clone()).await;
        let theirs = self.store.get_tags(target, viewer).await?;
        Ok(PairView { mine, theirs })
    }

    /// Hide toggle body; the caller holds the pair's guard.
    async fn hide_locked(&self, pair: PairKey, view: PairView) -> Result<Dispatched<HideOutcome>> {
        let before = view.state();
        let (outcome, optimistic, steps) = if view.mine.contains(Tag::Hide) {
            let mut next = view.mine.clone();
            next.remove(Tag::Hide);
            (HideOutcome::Unhidden, next, vec![Tag::Hide])
        } else {
            let mut steps = Vec::new();
            if view.mine.contains(Tag::Approve) {
                steps.push(Tag::Approve);
            }
            if view.mine.contains(Tag::Like) {
                steps.push(Tag::Like);
            }
            steps.push(Tag::Hide);
            (HideOutcome::Hidden, view.mine.with_hide(), steps)
        };

        let tags = self.mutate(pair, &view.mine, optimistic, &steps).await?;
        let dispatched = self.settle(pair, outcome, tags, &view.theirs, before);
        if before == RelationshipState::Matched && dispatched.state != RelationshipState::Matched {
            self.on_unmatch(pair.viewer, pair.target).await;
        }
        Ok(dispatched)
    }

    /// Apply `steps` as toggles, optimistic first, then re-sync once.
    async fn mutate(
        &self,
        pair: PairKey,
        before: &TagSet,
        optimistic: TagSet,
        steps: &[Tag],
    ) -> Result<TagSet> {
        self.cache.put(pair, optimistic.clone()).await;

        for (done, &tag) in steps.iter().enumerate() {
            if let Err(e) = self.store.toggle_tag(pair.viewer, pair.target, tag).await {
                self.cache.put(pair, before.clone()).await;
                warn!(
                    viewer_id = %pair.viewer,
                    target_id = %pair.target,
                    tag = %tag,
                    completed = done,
                    error = %e,
                    "Tag toggle failed, local tags restored"
                );
                self.events.emit(MatchEvent::RolledBack {
                    viewer: pair.viewer,
                    target: pair.target,
                    tags: before.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        match self.store.get_tags(pair.viewer, pair.target).await {
            Ok(actual) => {
                if actual != optimistic {
                    debug!(
                        expected = ?optimistic,
                        actual = ?actual,
                        "Store differs from optimistic tags"
                    );
                }
                self.cache.put(pair, actual.clone()).await;
                Ok(actual)
            }
            Err(e) => {
                warn!(error = %e, "Re-sync after action failed, keeping optimistic tags");
                Ok(optimistic)
            }
        }
    }

    fn settle<O>(
        &self,
        pair: PairKey,
        outcome: O,
        tags: TagSet,
        theirs: &TagSet,
        before: RelationshipState,
    ) -> Dispatched<O> {
        let state = compute_state(&tags, theirs);
        info!(
            viewer_id = %pair.viewer,
            target_id = %pair.target,
            state_before = %before,
            state_after = %state,
            "Action completed"
        );
        self.events.emit(MatchEvent::TagsChanged {
            viewer: pair.viewer,
            target: pair.target,
            tags: tags.clone(),
            state,
        });
        Dispatched {
            outcome,
            tags,
            state,
        }
    }

    async fn on_unmatch(&self, viewer: UserId, target: UserId) {
        info!(viewer_id = %viewer, target_id = %target, "Match broken");
        if !self.config.forget_on_unmatch {
            return;
        }
        if let Err(e) = self.celebrations.forget(viewer, target).await {
            warn!(error = %e, "Could not clear celebrated match");
        }
    }
}
