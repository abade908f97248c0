// Reactions - pure, no side effects
//
// A reaction is a single user's emoji choice on a post. The map keeps
// JS-object semantics from the persisted format: entries stay in insertion
// order, overwriting an existing user keeps its position, and removing then
// re-adding appends at the end. Serialized as a plain JSON object.
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::users::UserId;

/// Outcome of a toggle, so idempotent no-ops stay distinct from success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionToggle {
    /// The user had no reaction; one was added.
    Added,
    /// The user had a different emoji; it was overwritten in place.
    Changed,
    /// The user had this exact emoji; the reaction was removed.
    Removed,
}

/// Per-post reaction map: at most one emoji per user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionMap {
    entries: Vec<(UserId, String)>,
}

impl ReactionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, user_id: &UserId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, emoji)| emoji.as_str())
    }

    /// Set the user's reaction. A single overwrite, never a duplicate
    /// entry, so aggregation never transiently double-counts.
    pub fn set(&mut self, user_id: UserId, emoji: impl Into<String>) {
        let emoji = emoji.into();
        match self.entries.iter_mut().find(|(id, _)| *id == user_id) {
            Some(entry) => entry.1 = emoji,
            None => self.entries.push((user_id, emoji)),
        }
    }

    pub fn remove(&mut self, user_id: &UserId) -> Option<String> {
        let pos = self.entries.iter().position(|(id, _)| id == user_id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Toggle semantics: same emoji un-reacts, anything else reacts or
    /// changes the reaction in place.
    pub fn toggle(&mut self, user_id: &UserId, emoji: &str) -> ReactionToggle {
        match self.get(user_id) {
            Some(current) if current == emoji => {
                self.remove(user_id);
                ReactionToggle::Removed
            }
            Some(_) => {
                self.set(user_id.clone(), emoji);
                ReactionToggle::Changed
            }
            None => {
                self.set(user_id.clone(), emoji);
                ReactionToggle::Added
            }
        }
    }

    /// Group reactions into display counts, ordered by first occurrence of
    /// each emoji (not frequency-sorted). `sum(counts) == self.len()`.
    pub fn aggregate(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for (_, emoji) in &self.entries {
            match counts.iter_mut().find(|(e, _)| e == emoji) {
                Some(slot) => slot.1 += 1,
                None => counts.push((emoji.clone(), 1)),
            }
        }
        counts
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &str)> {
        self.entries.iter().map(|(id, emoji)| (id, emoji.as_str()))
    }
}

impl Serialize for ReactionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (user_id, emoji) in &self.entries {
            map.serialize_entry(user_id, emoji)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReactionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ReactionMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of user id to emoji")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut reactions = ReactionMap::new();
                while let Some((user_id, emoji)) = access.next_entry::<UserId, String>()? {
                    // `set` keeps the one-entry-per-user invariant even for
                    // documents a buggy writer duplicated keys into.
                    reactions.set(user_id, emoji);
                }
                Ok(reactions)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}
