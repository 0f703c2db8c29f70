//! Shared identity and board types for gymboard.
//!
//! This crate is the leaf of the workspace: typed ids, the board aggregate,
//! creation drafts and update patches. It has no internal dependencies.
//!
//! # Aggregate
//!
//! ```text
//! Board (EntityId)
//!     └── List (ordered by position)
//!             └── Card (ordered by position)
//!                     ├── Label
//!                     ├── Comment
//!                     └── Attachment
//! ```
//!
//! |------------------|------------------------------------------------|
//! | Type             | Purpose                                        |
//! |------------------|------------------------------------------------|
//! | [`EntityId`]     | `Temporary(seq)` or `Confirmed(remote id)`     |
//! | [`EntityKind`]   | Which of the six entity types an id names      |
//! | [`Board`]        | Aggregate root                                 |
//! | [`CardDraft`]    | Caller input for a create, plus defaults       |
//! | [`CardPatch`]    | Idempotent field update                        |
//! |------------------|------------------------------------------------|

pub mod board;
pub mod draft;
pub mod ids;
pub mod patch;

pub use board::{
    Attachment, Board, Card, CardLocation, Comment, DEFAULT_BOARD_COLOR, DEFAULT_LABEL_COLOR,
    Label, List, Priority,
};
pub use draft::{AttachmentDraft, BoardDraft, CardDraft, CommentDraft, LabelDraft, ListDraft};
pub use ids::{EntityId, EntityKind};
pub use patch::{
    AttachmentPatch, BoardPatch, CardPatch, Clearable, CommentPatch, LabelPatch, ListPatch,
};

/// Timestamp type used on the wire (ISO-8601).
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current time. Used when materializing provisional entities.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
