//! Shared handle over the canonical cache.

use std::sync::atomic::{AtomicU64, Ordering};

use gymboard_types::EntityId;
use tokio::sync::watch;
use tracing::trace;

use crate::action::Action;
use crate::reduce::reduce;
use crate::state::BoardState;

/// The single writer of [`BoardState`].
///
/// Every change goes through [`dispatch`](Self::dispatch), which runs the
/// action through [`reduce`] and publishes the result. Observers call
/// [`subscribe`](Self::subscribe) and get a `watch::Receiver` that always
/// yields the latest snapshot; intermediate states may be skipped.
///
/// The store also owns the temporary-id sequence so that ids are unique for
/// the life of the process, whoever allocates them.
#[derive(Debug)]
pub struct BoardStore {
    state: watch::Sender<BoardState>,
    next_temp: AtomicU64,
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore {
    pub fn new() -> Self {
        Self::with_state(BoardState::new())
    }

    pub fn with_state(state: BoardState) -> Self {
        let (state, _) = watch::channel(state);
        Self { state, next_temp: AtomicU64::new(1) }
    }

    /// Apply an action and notify subscribers.
    pub fn dispatch(&self, action: Action) {
        trace!(action = action.name(), "dispatch");
        self.state.send_modify(|state| *state = reduce(state, action));
    }

    /// Apply an action and read the result before any other dispatch can
    /// land. `f` runs with the state locked.
    pub fn dispatch_and_read<R: Default>(
        &self,
        action: Action,
        f: impl FnOnce(&BoardState) -> R,
    ) -> R {
        trace!(action = action.name(), "dispatch");
        let mut out = None;
        self.state.send_modify(|state| {
            *state = reduce(state, action);
            out = Some(f(state));
        });
        out.unwrap_or_default()
    }

    /// Build an action from the current state and apply it under the same
    /// lock, so no other dispatch can land between the read and the write.
    /// `plan` also returns a value computed from the state it saw.
    pub fn dispatch_with<R: Default>(
        &self,
        plan: impl FnOnce(&BoardState) -> (Action, R),
    ) -> R {
        let mut out = None;
        self.state.send_modify(|state| {
            let (action, seen) = plan(state);
            trace!(action = action.name(), "dispatch");
            *state = reduce(state, action);
            out = Some(seen);
        });
        out.unwrap_or_default()
    }

    /// Cheap clone of the current state.
    pub fn snapshot(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Read the current state without cloning it.
    ///
    /// Don't dispatch from inside `f`: the state is locked for reading.
    pub fn read<R>(&self, f: impl FnOnce(&BoardState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Allocate a fresh temporary id.
    pub fn next_temp_id(&self) -> EntityId {
        EntityId::temporary(self.next_temp.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_optimistic(&self, id: &EntityId) -> bool {
        self.read(|state| state.is_optimistic(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymboard_types::{BoardDraft, EntityKind};

    #[test]
    fn test_dispatch_without_subscribers() {
        let store = BoardStore::new();
        store.dispatch(Action::AddBoard(BoardDraft::new("Pool").materialize("b1".into())));
        assert_eq!(store.snapshot().boards().len(), 1);
    }

    #[test]
    fn test_dispatch_and_read_sees_result() {
        let store = BoardStore::new();
        let count = store.dispatch_and_read(
            Action::AddBoard(BoardDraft::new("Spa").materialize("b9".into())),
            |state| state.boards().len(),
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn test_dispatch_with_plans_from_current_state() {
        let store = BoardStore::new();
        store.dispatch(Action::AddBoard(BoardDraft::new("Spa").materialize("b9".into())));
        let before = store.dispatch_with(|state| {
            let seen = state.boards().len();
            (Action::AddBoard(BoardDraft::new("Pool").materialize("b10".into())), seen)
        });
        assert_eq!(before, 1);
        assert_eq!(store.snapshot().boards().len(), 2);
    }

    #[test]
    fn test_temp_ids_are_unique() {
        let store = BoardStore::new();
        let a = store.next_temp_id();
        let b = store.next_temp_id();
        assert!(a.is_temporary());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_state() {
        let store = BoardStore::new();
        let mut rx = store.subscribe();

        let id = store.next_temp_id();
        store.dispatch(Action::MarkOptimistic { id: id.clone(), kind: EntityKind::Card });
        rx.changed().await.expect("store alive");
        assert!(rx.borrow_and_update().is_optimistic(&id));

        store.dispatch(Action::ConfirmOptimistic(id.clone()));
        rx.changed().await.expect("store alive");
        assert!(!rx.borrow().is_optimistic(&id));
        assert!(!store.is_optimistic(&id));
    }
}
