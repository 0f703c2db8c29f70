//! Actions accepted by the state transition function.

use gymboard_types::{
    Attachment, AttachmentPatch, Board, BoardPatch, Card, CardPatch, Comment, CommentPatch,
    EntityId, EntityKind, Label, LabelPatch, List, ListPatch,
};
use strum::IntoStaticStr;

/// One state transition.
///
/// `Add*` inserts a (usually provisional) entity, `Update*` applies a patch,
/// `Delete*` removes, and `Replace*` swaps the entity known as `temp` for its
/// confirmed form in place. Every action naming an id that isn't in the cache
/// is a no-op.
#[derive(Debug, Clone, IntoStaticStr)]
pub enum Action {
    // ── Bookkeeping ─────────────────────────────────────────────────────
    SetLoading(bool),
    SetError(Option<String>),
    /// Replace the list of known boards.
    SetBoards(Vec<Board>),
    /// Replace the aggregate being edited (load or refetch).
    SetCurrentBoard(Option<Board>),
    MarkOptimistic { id: EntityId, kind: EntityKind },
    ConfirmOptimistic(EntityId),
    RevertOptimistic(EntityId),

    // ── Boards ──────────────────────────────────────────────────────────
    AddBoard(Board),
    UpdateBoard { id: EntityId, patch: BoardPatch },
    DeleteBoard(EntityId),
    ReplaceBoard { temp: EntityId, board: Board },

    // ── Lists ───────────────────────────────────────────────────────────
    AddList(List),
    UpdateList { id: EntityId, patch: ListPatch },
    DeleteList(EntityId),
    ReplaceList { temp: EntityId, list: List },
    ReorderLists { board_id: EntityId, list_ids: Vec<EntityId> },

    // ── Cards ───────────────────────────────────────────────────────────
    AddCard(Card),
    UpdateCard { id: EntityId, patch: CardPatch },
    DeleteCard(EntityId),
    ReplaceCard { temp: EntityId, card: Card },
    MoveCard { card_id: EntityId, target_list_id: EntityId, new_position: usize },
    ReorderCards { list_id: EntityId, card_ids: Vec<EntityId> },

    // ── Labels ──────────────────────────────────────────────────────────
    AddLabel(Label),
    UpdateLabel { id: EntityId, patch: LabelPatch },
    DeleteLabel(EntityId),
    ReplaceLabel { temp: EntityId, label: Label },

    // ── Comments ────────────────────────────────────────────────────────
    AddComment(Comment),
    UpdateComment { id: EntityId, patch: CommentPatch },
    DeleteComment(EntityId),
    ReplaceComment { temp: EntityId, comment: Comment },

    // ── Attachments ─────────────────────────────────────────────────────
    AddAttachment(Attachment),
    UpdateAttachment { id: EntityId, patch: AttachmentPatch },
    DeleteAttachment(EntityId),
    ReplaceAttachment { temp: EntityId, attachment: Attachment },
}

impl Action {
    /// The delete action for an entity of the given kind.
    pub fn delete(kind: EntityKind, id: EntityId) -> Self {
        match kind {
            EntityKind::Board => Self::DeleteBoard(id),
            EntityKind::List => Self::DeleteList(id),
            EntityKind::Card => Self::DeleteCard(id),
            EntityKind::Label => Self::DeleteLabel(id),
            EntityKind::Comment => Self::DeleteComment(id),
            EntityKind::Attachment => Self::DeleteAttachment(id),
        }
    }

    /// Variant name, for logging.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
