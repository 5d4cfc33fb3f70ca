//! Match evaluation.
//!
//! Pure decision logic over two directed tag sets. Nothing here touches the
//! store; the dispatcher calls these before and after each mutation.

use crate::models::{HeartAction, RelationshipState};
use crate::tags::{Tag, TagSet};

/// Relationship of the viewer toward the target.
///
/// `viewer` holds the viewer's tags toward the target, `target` the
/// target's tags toward the viewer.
pub fn compute_state(viewer: &TagSet, target: &TagSet) -> RelationshipState {
    if viewer.contains(Tag::Like) {
        if target.contains(Tag::Like) {
            RelationshipState::Matched
        } else {
            RelationshipState::Liked
        }
    } else if viewer.contains(Tag::Approve) {
        RelationshipState::Approved
    } else {
        RelationshipState::None
    }
}

/// Whether the viewer may like a target holding `target` toward them.
pub fn can_like(target: &TagSet) -> bool {
    target.approves()
}

/// Flag form of [`can_like`].
///
/// Only the target's side gates liking; the viewer's own approval is
/// implied by being in the `Approved` state when the heart is clicked.
pub fn can_like_flags(_viewer_has_approved_target: bool, target_has_approved_viewer: bool) -> bool {
    target_has_approved_viewer
}

/// True only on a transition into `Matched`.
pub fn is_new_match(previous: RelationshipState, new: RelationshipState) -> bool {
    previous != RelationshipState::Matched && new == RelationshipState::Matched
}

/// Heart button transition table.
pub fn next_heart_action(state: RelationshipState) -> HeartAction {
    match state {
        RelationshipState::None => HeartAction::AddApprove,
        RelationshipState::Approved => HeartAction::AddLike,
        RelationshipState::Liked | RelationshipState::Matched => HeartAction::RemoveLike,
    }
}
