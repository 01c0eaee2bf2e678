//! Polymorphic tagging.
//!
//! A tag is attached to any entity through a [`TagLink`] naming the
//! entity's kind and id. [`TagIndex`] answers "which tags does this
//! entity carry" for the model assembler.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::EntityId;

/// Kinds of entity a tag can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Group,
    Instructor,
    Venue,
    Activity,
}

/// A named label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: EntityId,
    pub name: String,
}

impl Tag {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Attachment of a tag to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLink {
    pub tag_id: EntityId,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
}

impl TagLink {
    pub fn new(tag_id: EntityId, entity_kind: EntityKind, entity_id: EntityId) -> Self {
        Self {
            tag_id,
            entity_kind,
            entity_id,
        }
    }
}

/// Lookup `(entity kind, entity id) → tag ids`.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    tags: HashMap<(EntityKind, EntityId), BTreeSet<EntityId>>,
}

impl TagIndex {
    pub fn from_links<'a>(links: impl IntoIterator<Item = &'a TagLink>) -> Self {
        let mut tags: HashMap<(EntityKind, EntityId), BTreeSet<EntityId>> = HashMap::new();
        for link in links {
            tags.entry((link.entity_kind, link.entity_id))
                .or_default()
                .insert(link.tag_id);
        }
        Self { tags }
    }

    /// Tags carried by an entity, in ascending id order.
    pub fn tags_of(&self, kind: EntityKind, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.tags.get(&(kind, id)).into_iter().flatten().copied()
    }

    /// Whether an entity carries a tag.
    pub fn has_tag(&self, kind: EntityKind, id: EntityId, tag_id: EntityId) -> bool {
        self.tags
            .get(&(kind, id))
            .is_some_and(|set| set.contains(&tag_id))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
