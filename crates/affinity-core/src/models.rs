//! Identifiers, wire payloads, and derived relationship types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::Tag;

/// A user id as issued by the results service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Directed viewer → target pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub viewer: UserId,
    pub target: UserId,
}

impl PairKey {
    pub fn new(viewer: UserId, target: UserId) -> Self {
        Self { viewer, target }
    }

    /// The same pair seen from the target's side.
    pub fn reversed(&self) -> Self {
        Self {
            viewer: self.target,
            target: self.viewer,
        }
    }
}

/// Relationship of a viewer toward a target, derived from both tag sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipState {
    None,
    Approved,
    Liked,
    Matched,
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Approved => write!(f, "approved"),
            Self::Liked => write!(f, "liked"),
            Self::Matched => write!(f, "matched"),
        }
    }
}

/// What a heart click does from a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartAction {
    /// Clear `Hide` if present, add `Approve`.
    AddApprove,
    /// Add `Like`, gated on the target having approved the viewer.
    AddLike,
    /// Remove `Like`, keeping `Approve`.
    RemoveLike,
}

// =============================================================================
// WIRE PAYLOADS
// =============================================================================

/// Response of `GET user_tags/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTagsResponse {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `POST toggle_tag/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleTagRequest {
    pub user_id: UserId,
    pub result_user_id: UserId,
    pub tag: Tag,
}

/// Body of `POST send_note/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNoteRequest {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub note: String,
}

/// One row of the `by_tag/` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedUser {
    #[serde(alias = "result_user_id", alias = "id")]
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "photo")]
    pub photo_url: Option<String>,
}

impl TaggedUser {
    pub fn bare(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            photo_url: None,
        }
    }
}

/// Response of `GET by_tag/`, accepted either as a bare array or wrapped.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaggedUsersResponse {
    Bare(Vec<TaggedUser>),
    Wrapped { results: Vec<TaggedUser> },
}

impl TaggedUsersResponse {
    pub fn into_users(self) -> Vec<TaggedUser> {
        match self {
            Self::Bare(users) => users,
            Self::Wrapped { results } => results,
        }
    }
}

/// A newly formed match, shown to the viewer once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Celebration {
    pub viewer: UserId,
    pub target: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub celebrated_at: DateTime<Utc>,
}
