//! One-shot celebration of newly formed matches.
//!
//! There is no push channel: a sweep walks everyone the viewer has liked,
//! asks the store whether they liked back, and celebrates the first match
//! not yet in the viewer's ledger. Further matches wait for the next sweep.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use affinity_core::{
    Celebration, CelebrationLedger, EventBus, MatchEvent, Result, Tag, TagStore, TaggedUser,
    UserId,
};

/// Detects mutual likes and celebrates each one once.
#[derive(Clone)]
pub struct CelebrationTrigger {
    store: Arc<dyn TagStore>,
    ledger: Arc<dyn CelebrationLedger>,
    events: EventBus,
}

impl CelebrationTrigger {
    pub fn new(
        store: Arc<dyn TagStore>,
        ledger: Arc<dyn CelebrationLedger>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            ledger,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Celebrate at most one uncelebrated match among everyone the viewer likes.
    #[instrument(skip(self), fields(viewer_id = %viewer))]
    pub async fn sweep(&self, viewer: UserId) -> Result<Option<Celebration>> {
        let liked = self.store.list_by_tag(viewer, Tag::Like).await?;
        let celebrated = self.ledger.load(viewer).await?;
        debug!(
            liked = liked.len(),
            celebrated = celebrated.len(),
            "Sweeping for new matches"
        );

        for user in liked {
            if user.user_id == viewer || celebrated.contains(&user.user_id) {
                continue;
            }
            let back = match self.store.get_tags(user.user_id, viewer).await {
                Ok(tags) => tags,
                Err(e) => {
                    warn!(target_id = %user.user_id, error = %e, "Skipping target in sweep");
                    continue;
                }
            };
            if back.contains(Tag::Like) {
                if let Some(celebration) = self.celebrate(viewer, user).await? {
                    return Ok(Some(celebration));
                }
            }
        }
        Ok(None)
    }

    /// Check a single pair, typically right after the viewer liked `target`.
    #[instrument(skip(self), fields(viewer_id = %viewer, target_id = %target))]
    pub async fn sweep_target(&self, viewer: UserId, target: UserId) -> Result<Option<Celebration>> {
        if self.ledger.load(viewer).await?.contains(&target) {
            debug!("Match already celebrated");
            return Ok(None);
        }
        if !self.store.get_tags(target, viewer).await?.contains(Tag::Like) {
            return Ok(None);
        }

        // Display details come from the viewer's like listing; a bare id is
        // still worth celebrating if that call fails.
        let profile = match self.store.list_by_tag(viewer, Tag::Like).await {
            Ok(users) => users.into_iter().find(|u| u.user_id == target),
            Err(e) => {
                warn!(error = %e, "Could not load profile for celebration");
                None
            }
        };
        self.celebrate(viewer, profile.unwrap_or_else(|| TaggedUser::bare(target)))
            .await
    }

    /// Drop a target from the ledger so a later re-match is celebrated again.
    pub async fn forget(&self, viewer: UserId, target: UserId) -> Result<bool> {
        let removed = self.ledger.forget(viewer, target).await?;
        if removed {
            debug!(viewer_id = %viewer, target_id = %target, "Forgot celebrated match");
        }
        Ok(removed)
    }

    async fn celebrate(&self, viewer: UserId, user: TaggedUser) -> Result<Option<Celebration>> {
        // A concurrent sweep may have recorded it first.
        if !self.ledger.record(viewer, user.user_id).await? {
            return Ok(None);
        }
        let celebration = Celebration {
            viewer,
            target: user.user_id,
            display_name: user.display_name,
            photo_url: user.photo_url,
            celebrated_at: Utc::now(),
        };
        info!(
            viewer_id = %viewer,
            target_id = %celebration.target,
            "New match celebrated"
        );
        self.events.emit(MatchEvent::Celebrated(celebration.clone()));
        Ok(Some(celebration))
    }
}
