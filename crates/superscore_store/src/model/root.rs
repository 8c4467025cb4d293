//! The top-level container and the tag vocabulary.

use super::{Entry, EntryRef};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a tag group in the vocabulary.
pub type TagGroupId = u32;

/// Identifier of a tag within its group.
pub type TagId = u32;

/// The tags applied to a Collection or Snapshot, keyed by tag group.
pub type TagSet = BTreeMap<TagGroupId, BTreeSet<TagId>>;

/// Reads a [`TagSet`] whose group ids may arrive as JSON object keys.
///
/// Inside an internally tagged [`Entry`] the keys are buffered as strings
/// and no longer parse as integers on their own.
pub(crate) fn deserialize_tag_set<'de, D>(deserializer: D) -> Result<TagSet, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(untagged)]
    enum GroupKey {
        Id(TagGroupId),
        Text(String),
    }

    let raw = BTreeMap::<GroupKey, BTreeSet<TagId>>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, tags)| {
            let group = match key {
                GroupKey::Id(id) => id,
                GroupKey::Text(text) => text.parse().map_err(|_| {
                    serde::de::Error::custom(format!("invalid tag group id \"{}\"", text))
                })?,
            };
            Ok((group, tags))
        })
        .collect()
}

/// The globally defined tag vocabulary, keyed by group id.
pub type TagGroups = BTreeMap<TagGroupId, TagGroup>;

/// One group of the tag vocabulary.
///
/// Serialized as `[name, description, {tag_id: tag_name}]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "(String, String, BTreeMap<TagId, String>)",
    into = "(String, String, BTreeMap<TagId, String>)"
)]
pub struct TagGroup {
    pub name: String,
    pub description: String,
    pub tags: BTreeMap<TagId, String>,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Adds a member tag, returning the group for chaining.
    pub fn with_tag(mut self, id: TagId, name: impl Into<String>) -> Self {
        self.tags.insert(id, name.into());
        self
    }
}

impl From<(String, String, BTreeMap<TagId, String>)> for TagGroup {
    fn from((name, description, tags): (String, String, BTreeMap<TagId, String>)) -> Self {
        Self {
            name,
            description,
            tags,
        }
    }
}

impl From<TagGroup> for (String, String, BTreeMap<TagId, String>) {
    fn from(group: TagGroup) -> Self {
        (group.name, group.description, group.tags)
    }
}

/// Base level structure holding the top-level entries of a store.
///
/// Depending on the backend, `entries` holds filled trees (filestore) or
/// bare references to separately stored records (directory index).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Root {
    #[serde(default)]
    pub entries: Vec<EntryRef>,
    #[serde(default)]
    pub tag_groups: TagGroups,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a top-level entry.
    pub fn push(&mut self, entry: impl Into<EntryRef>) {
        self.entries.push(entry.into());
    }

    /// Returns the resolved top-level entries, skipping bare references.
    pub fn resolved(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter_map(EntryRef::as_entry)
    }
}
