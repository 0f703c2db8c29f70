//! View-local copy of the current board, patched synchronously while the
//! user drags cards around or edits them inline.
//!
//! The mirror is seeded from the cache once per board switch and then edited
//! directly, so a drag never waits on a dispatch. Each finished gesture is
//! handed to the [`BoardController`]; if the controller reports a failure
//! the mirror throws its copy away and reseeds from the (already repaired)
//! cache.

use gymboard_store::paths::{self, CardChild};
use gymboard_store::BoardState;
use gymboard_types::{
    Attachment, AttachmentDraft, Board, Card, CardPatch, CommentDraft, Comment, EntityId,
    EntityKind, Label, LabelDraft, Priority,
};
use tracing::{debug, trace};

use crate::controller::BoardController;
use crate::error::SyncError;
use crate::transport::BoardTransport;

/// Where a drag gesture is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    /// A card is picked up but not over any list.
    Dragging { card: EntityId, from: EntityId },
    /// A card is over `list`.
    Hovering { card: EntityId, from: EntityId, list: EntityId },
}

impl DragState {
    pub fn card(&self) -> Option<&EntityId> {
        match self {
            DragState::Idle => None,
            DragState::Dragging { card, .. } | DragState::Hovering { card, .. } => Some(card),
        }
    }
}

/// Result of releasing a dragged card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The card was moved in the mirror to the end of `to`.
    Moved {
        card_id: EntityId,
        from: EntityId,
        to: EntityId,
        position: usize,
        /// Both ids are confirmed, so the move needs a remote call.
        reconcile: bool,
    },
    /// Dropped on its own list or outside any list. Nothing changed.
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct BoardMirror {
    board: Option<Board>,
    drag: DragState,
}

impl BoardMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn card(&self, id: &EntityId) -> Option<&Card> {
        self.board.as_ref()?.card(id)
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Seed from `board` unless a board with the same id is already seeded.
    /// Returns whether the mirror changed.
    pub fn seed(&mut self, board: &Board) -> bool {
        if self.board.as_ref().is_some_and(|b| b.id == board.id) {
            return false;
        }
        self.reseed(Some(board));
        true
    }

    /// Seed from the cache's current board (see [`seed`](Self::seed)).
    pub fn seed_from(&mut self, state: &BoardState) -> bool {
        match state.current_board() {
            Some(board) => self.seed(board),
            None => false,
        }
    }

    /// Replace the mirror unconditionally and drop any gesture in progress.
    pub fn reseed(&mut self, board: Option<&Board>) {
        debug!(board = ?board.map(|b| &b.id), "mirror reseeded");
        self.board = board.cloned();
        self.drag = DragState::Idle;
    }

    fn resync<T: BoardTransport>(&mut self, controller: &BoardController<T>) {
        let state = controller.snapshot();
        self.reseed(state.current_board().map(|b| &**b));
    }

    // ------------------------------------------------------------------------
    // Drag and drop
    // ------------------------------------------------------------------------

    /// Start dragging `card`. Only from `Idle`, and only for a card the
    /// mirror holds.
    pub fn pick_up(&mut self, card: &EntityId) -> bool {
        if self.drag != DragState::Idle {
            return false;
        }
        let Some(from) = self.board.as_ref().and_then(|b| b.card(card)).map(|c| c.list_id.clone())
        else {
            return false;
        };
        trace!(%card, %from, "pick up");
        self.drag = DragState::Dragging { card: card.clone(), from };
        true
    }

    /// The dragged card entered `list`. Unknown lists are ignored.
    pub fn drag_over(&mut self, list: &EntityId) -> bool {
        let known = self.board.as_ref().is_some_and(|b| b.list(list).is_some());
        let (card, from) = match &self.drag {
            DragState::Dragging { card, from } | DragState::Hovering { card, from, .. } if known => {
                (card.clone(), from.clone())
            }
            _ => return false,
        };
        self.drag = DragState::Hovering { card, from, list: list.clone() };
        true
    }

    /// The dragged card left whatever list it was over.
    pub fn drag_leave(&mut self) {
        if let DragState::Hovering { card, from, .. } = std::mem::take(&mut self.drag) {
            self.drag = DragState::Dragging { card, from };
        }
    }

    /// Drop the dragged card. Over a list other than its own, the card is
    /// appended to that list in the mirror. Always ends in `Idle`.
    pub fn release(&mut self) -> DropOutcome {
        let DragState::Hovering { card, from, list } = std::mem::take(&mut self.drag) else {
            return DropOutcome::Cancelled;
        };
        if list == from {
            return DropOutcome::Cancelled;
        }
        let Some(board) = self.board.as_mut() else {
            return DropOutcome::Cancelled;
        };
        let Some(position) = board.list(&list).map(|l| l.cards.len()) else {
            return DropOutcome::Cancelled;
        };
        if !paths::move_card(board, &card, &list, position) {
            return DropOutcome::Cancelled;
        }

        let reconcile = card.is_confirmed() && list.is_confirmed();
        trace!(%card, %from, to = %list, position, reconcile, "dropped");
        DropOutcome::Moved { card_id: card, from, to: list, position, reconcile }
    }

    /// Abandon the gesture.
    pub fn cancel(&mut self) {
        self.drag = DragState::Idle;
    }

    /// [`release`](Self::release), then hand the move to the controller.
    ///
    /// Moves involving a provisional card or list only touch the cache.
    pub async fn drop_card<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
    ) -> Result<DropOutcome, SyncError> {
        let outcome = self.release();
        if let DropOutcome::Moved { card_id, to, position, .. } = &outcome {
            let result = controller.move_card(card_id, to, *position).await;
            self.settle(controller, result)?;
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Inline edits
    // ------------------------------------------------------------------------

    pub async fn edit_card<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
        patch: CardPatch,
    ) -> Result<(), SyncError> {
        if let Some(board) = self.board.as_mut() {
            paths::patch_card(board, id, &patch);
        }
        let result = controller.update_card(id, patch).await;
        self.settle(controller, result)
    }

    pub async fn toggle_completed<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
    ) -> Result<(), SyncError> {
        let completed = self
            .card(id)
            .map(|c| !c.completed)
            .ok_or_else(|| SyncError::not_found(EntityKind::Card, id))?;
        self.edit_card(controller, id, CardPatch::completed(completed)).await
    }

    pub async fn set_priority<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
        priority: Priority,
    ) -> Result<(), SyncError> {
        self.edit_card(controller, id, CardPatch::priority(priority)).await
    }

    pub async fn add_label<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        card_id: &EntityId,
        draft: LabelDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = controller.store().next_temp_id();
        if let Some(board) = self.board.as_mut() {
            paths::add_child(board, draft.materialize(temp.clone(), card_id.clone()));
        }
        let result = controller.add_label_as(temp.clone(), card_id, draft).await;
        let id = self.settle(controller, result)?;
        self.adopt::<Label, T>(controller, &temp, &id);
        Ok(id)
    }

    pub async fn remove_label<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
    ) -> Result<(), SyncError> {
        if let Some(board) = self.board.as_mut() {
            paths::remove_child::<Label>(board, id);
        }
        let result = controller.remove_label(id).await;
        self.settle(controller, result)
    }

    pub async fn add_comment<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        card_id: &EntityId,
        draft: CommentDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = controller.store().next_temp_id();
        if let Some(board) = self.board.as_mut() {
            let comment = draft.materialize(temp.clone(), card_id.clone(), gymboard_types::now());
            paths::add_child(board, comment);
        }
        let result = controller.add_comment_as(temp.clone(), card_id, draft).await;
        let id = self.settle(controller, result)?;
        self.adopt::<Comment, T>(controller, &temp, &id);
        Ok(id)
    }

    pub async fn remove_comment<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
    ) -> Result<(), SyncError> {
        if let Some(board) = self.board.as_mut() {
            paths::remove_child::<Comment>(board, id);
        }
        let result = controller.remove_comment(id).await;
        self.settle(controller, result)
    }

    pub async fn add_attachment<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        card_id: &EntityId,
        draft: AttachmentDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = controller.store().next_temp_id();
        if let Some(board) = self.board.as_mut() {
            paths::add_child(board, draft.materialize(temp.clone(), card_id.clone()));
        }
        let result = controller.add_attachment_as(temp.clone(), card_id, draft).await;
        let id = self.settle(controller, result)?;
        self.adopt::<Attachment, T>(controller, &temp, &id);
        Ok(id)
    }

    pub async fn remove_attachment<T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        id: &EntityId,
    ) -> Result<(), SyncError> {
        if let Some(board) = self.board.as_mut() {
            paths::remove_child::<Attachment>(board, id);
        }
        let result = controller.remove_attachment(id).await;
        self.settle(controller, result)
    }

    /// On failure, reseed from the cache the controller has already repaired.
    fn settle<T: BoardTransport, R>(
        &mut self,
        controller: &BoardController<T>,
        result: Result<R, SyncError>,
    ) -> Result<R, SyncError> {
        if let Err(error) = &result {
            debug!(%error, "controller rejected mirror edit, resyncing");
            self.resync(controller);
        }
        result
    }

    /// Swap a provisional child for the confirmed copy the cache now holds.
    fn adopt<C: CardChild, T: BoardTransport>(
        &mut self,
        controller: &BoardController<T>,
        temp: &EntityId,
        id: &EntityId,
    ) {
        if temp == id {
            return;
        }
        let confirmed = controller.store().read(|s| {
            s.board_containing(id)?
                .cards()
                .flat_map(|card| C::slot(card).iter())
                .find(|c| c.id() == id)
                .cloned()
        });
        if let (Some(board), Some(child)) = (self.board.as_mut(), confirmed) {
            paths::replace_child(board, temp, child);
        }
    }
}
