//! Side index of entities whose latest mutation is unconfirmed.

use std::collections::HashMap;

use gymboard_types::{EntityId, EntityKind};

/// Maps entity id → entity kind for every pending optimistic mutation.
///
/// Entries are added when a mutation is applied optimistically and removed
/// when that mutation is confirmed or rolled back. Nothing else touches it,
/// except that deleting a subtree drops entries for the subtree's
/// descendants (they can no longer be confirmed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimisticTracker {
    pending: HashMap<EntityId, EntityKind>,
}

impl OptimisticTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: EntityId, kind: EntityKind) {
        self.pending.insert(id, kind);
    }

    /// Remove an entry, returning its kind if it was present.
    pub fn clear(&mut self, id: &EntityId) -> Option<EntityKind> {
        self.pending.remove(id)
    }

    pub fn clear_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EntityId>) {
        for id in ids {
            self.pending.remove(id);
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn kind_of(&self, id: &EntityId) -> Option<EntityKind> {
        self.pending.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, EntityKind)> {
        self.pending.iter().map(|(id, kind)| (id, *kind))
    }
}
