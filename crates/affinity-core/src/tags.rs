//! Tag vocabulary and directed tag sets.
//!
//! The store speaks raw strings; everything inside the workspace speaks
//! [`Tag`]. Conversion happens once, in [`Tag::from_str`] and
//! [`TagSet::from_wire`], so no call site ever compares lowercase strings.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A label a viewer attaches to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Approve,
    Like,
    Hide,
    Hot,
    Maybe,
    Save,
}

impl Tag {
    /// Every tag in the vocabulary.
    pub const ALL: [Tag; 6] = [
        Tag::Approve,
        Tag::Like,
        Tag::Hide,
        Tag::Hot,
        Tag::Maybe,
        Tag::Save,
    ];

    /// Canonical capitalized form sent to the store.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Like => "Like",
            Self::Hide => "Hide",
            Self::Hot => "Hot",
            Self::Maybe => "Maybe",
            Self::Save => "Save",
        }
    }

    /// Lowercase key, used for comparisons and query parameters.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Like => "like",
            Self::Hide => "hide",
            Self::Hot => "hot",
            Self::Maybe => "maybe",
            Self::Save => "save",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "like" => Ok(Self::Like),
            "hide" => Ok(Self::Hide),
            "hot" => Ok(Self::Hot),
            "maybe" => Ok(Self::Maybe),
            "save" => Ok(Self::Save),
            _ => Err(Error::InvalidInput(format!("Unknown tag: {}", s))),
        }
    }
}

impl Serialize for Tag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Tags one viewer holds toward one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from store strings. Unrecognized labels are skipped.
    pub fn from_wire<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for label in raw {
            match label.as_ref().parse::<Tag>() {
                Ok(tag) => {
                    set.insert(tag);
                }
                Err(_) => {
                    tracing::debug!(tag = label.as_ref(), "Ignoring unrecognized tag from store");
                }
            }
        }
        Self(set)
    }

    /// Canonical wire strings, in vocabulary order.
    pub fn to_wire(&self) -> Vec<String> {
        self.0.iter().map(|t| t.as_wire().to_string()).collect()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    /// Returns true if the tag was not already present.
    pub fn insert(&mut self, tag: Tag) -> bool {
        self.0.insert(tag)
    }

    /// Returns true if the tag was present.
    pub fn remove(&mut self, tag: Tag) -> bool {
        self.0.remove(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().copied()
    }

    /// Whether the holder has approved or liked the other side.
    pub fn approves(&self) -> bool {
        self.contains(Tag::Approve) || self.contains(Tag::Like)
    }

    /// The set after turning `Hide` on: `Approve` and `Like` are cleared.
    pub fn with_hide(&self) -> Self {
        let mut next = self.clone();
        next.remove(Tag::Approve);
        next.remove(Tag::Like);
        next.insert(Tag::Hide);
        next
    }

    /// The set after adding `Approve`: `Hide` is cleared.
    pub fn with_approve(&self) -> Self {
        let mut next = self.clone();
        next.remove(Tag::Hide);
        next.insert(Tag::Approve);
        next
    }

    /// The set after adding `Like`: `Hide` is cleared.
    pub fn with_like(&self) -> Self {
        let mut next = self.clone();
        next.remove(Tag::Hide);
        next.insert(Tag::Like);
        next
    }

    /// The set after removing `Like`; `Approve` is kept or restored.
    pub fn without_like(&self) -> Self {
        let mut next = self.clone();
        next.remove(Tag::Like);
        next.insert(Tag::Approve);
        next
    }

    /// The set after removing `Approve`, which also drops `Like`.
    pub fn without_approve(&self) -> Self {
        let mut next = self.clone();
        next.remove(Tag::Approve);
        next.remove(Tag::Like);
        next
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Tag; N]> for TagSet {
    fn from(tags: [Tag; N]) -> Self {
        tags.into_iter().collect()
    }
}
