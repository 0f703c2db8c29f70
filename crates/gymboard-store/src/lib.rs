//! Canonical board cache for gymboard.
//!
//! The store holds everything the UI renders: the list of boards, the board
//! aggregate being edited, a loading flag, the last error, and the set of ids
//! whose latest mutation hasn't been confirmed yet. It does no I/O.
//!
//! # Layers
//!
//! |------------------|------------------------------------------------------|
//! | Module           | Purpose                                              |
//! |------------------|------------------------------------------------------|
//! | [`action`]       | The closed set of state transitions                  |
//! | [`reduce`]       | `(state, action) -> state`, pure and total           |
//! | [`paths`]        | In-place edits along one path of a board aggregate   |
//! | [`state`]        | The snapshot type and its read-only lookups          |
//! | [`tracker`]      | Pending optimistic ids                               |
//! | [`store`]        | Single writer + `watch` fan-out to observers         |
//! |------------------|------------------------------------------------------|
//!
//! # Sharing
//!
//! Boards, lists and cards are `Arc`-shared between snapshots. A transition
//! copies only the nodes on the path it edits, and a transition that changes
//! nothing copies nothing:
//!
//! ```
//! use std::sync::Arc;
//! use gymboard_store::{Action, BoardStore};
//! use gymboard_types::{BoardDraft, CardPatch};
//!
//! let store = BoardStore::new();
//! let board = BoardDraft::new("Front desk").materialize("b1".into());
//! store.dispatch(Action::SetCurrentBoard(Some(board)));
//!
//! let before = store.snapshot();
//! store.dispatch(Action::UpdateCard { id: "missing".into(), patch: CardPatch::completed(true) });
//! let after = store.snapshot();
//!
//! assert!(Arc::ptr_eq(
//!     before.current_board().unwrap(),
//!     after.current_board().unwrap(),
//! ));
//! ```

pub mod action;
pub mod paths;
pub mod reduce;
pub mod state;
pub mod store;
pub mod tracker;

pub use action::Action;
pub use reduce::reduce;
pub use state::BoardState;
pub use store::BoardStore;
pub use tracker::OptimisticTracker;
