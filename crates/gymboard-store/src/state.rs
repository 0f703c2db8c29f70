//! The canonical cache: server state merged with optimistic local changes.

use std::sync::Arc;

use gymboard_types::{Board, Card, EntityId, List};

use crate::tracker::OptimisticTracker;

/// Snapshot of the cache.
///
/// Cloning is cheap: boards, lists and cards are `Arc`-shared, so two
/// snapshots share every subtree a transition didn't touch. Compare
/// subtrees with `Arc::ptr_eq` to skip re-rendering them.
///
/// Fields are only written through [`reduce`](crate::reduce).
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub(crate) boards: Vec<Arc<Board>>,
    pub(crate) current_board: Option<Arc<Board>>,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
    pub(crate) optimistic: OptimisticTracker,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// All known boards. Entries may be summaries without lists.
    pub fn boards(&self) -> &[Arc<Board>] {
        &self.boards
    }

    /// The aggregate being edited.
    pub fn current_board(&self) -> Option<&Arc<Board>> {
        self.current_board.as_ref()
    }

    pub fn current_board_id(&self) -> Option<&EntityId> {
        self.current_board.as_ref().map(|b| &b.id)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Last failure message. Last write wins.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn optimistic(&self) -> &OptimisticTracker {
        &self.optimistic
    }

    pub fn is_optimistic(&self, id: &EntityId) -> bool {
        self.optimistic.contains(id)
    }

    /// Boards in search order: the current aggregate first, then the rest.
    fn search_order(&self) -> impl Iterator<Item = &Board> {
        self.current_board
            .iter()
            .chain(self.boards.iter())
            .map(|b| b.as_ref())
    }

    pub fn board(&self, id: &EntityId) -> Option<&Board> {
        self.search_order().find(|b| &b.id == id)
    }

    /// The board whose tree contains `id` (the board itself included).
    pub fn board_containing(&self, id: &EntityId) -> Option<&Board> {
        self.search_order().find(|b| b.contains(id))
    }

    pub fn find_list(&self, id: &EntityId) -> Option<&List> {
        self.search_order().find_map(|b| b.list(id))
    }

    pub fn find_card(&self, id: &EntityId) -> Option<&Card> {
        self.search_order().find_map(|b| b.card(id))
    }

    /// Whether any cached board carries the id anywhere in its tree.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.board_containing(id).is_some()
    }
}
