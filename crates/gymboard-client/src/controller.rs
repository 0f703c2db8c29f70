//! Reconciliation controller: apply locally, then settle against the remote.
//!
//! Every mutating method follows one of two flows.
//!
//! **Create** (`create_*`, `add_*`): allocate a temporary id, insert the
//! provisional entity, mark it optimistic and, if its parent has a remote
//! record, send the create. A confirmed response replaces the provisional
//! entity in place; a rejection removes it. Children created under a
//! still-temporary parent stay local until the parent is confirmed, and are
//! then submitted in turn.
//!
//! **Change** (`update_*`, `delete_*`, `remove_*`, `move_card`, `reorder_*`):
//! apply, mark, send. A confirmed response clears the mark (and folds any
//! server-owned fields back in); a rejection refetches the aggregate.
//!
//! A subject (or move target) with a temporary id is changed in the cache
//! only. The transport is never called with a temporary id: remote ids come
//! out of [`EntityId::as_confirmed`] and nowhere else.
//!
//! Overlapping mutations of the same entity aren't serialized; whichever
//! response lands last wins.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gymboard_store::{Action, BoardState, BoardStore};
use gymboard_types::{
    Attachment, AttachmentDraft, Board, BoardDraft, BoardPatch, Card, CardDraft, CardPatch,
    Comment, CommentDraft, EntityId, EntityKind, Label, LabelDraft, List, ListDraft, ListPatch,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::mutation::{Mutation, MutationVerb, Phase, Recovery};
use crate::transport::{
    BoardTransport, CreateAttachment, CreateBoard, CreateCard, CreateComment, CreateLabel,
    CreateList, TransportError, TransportResult,
};

/// Provisional ids of descendants still waiting for their own create.
type LocalChildren = Vec<(EntityKind, EntityId)>;

// ============================================================================
// Create plumbing
// ============================================================================

/// A create request built from a provisional entity in the cache.
enum CreateRequest {
    Board(CreateBoard),
    List(CreateList),
    Card(CreateCard),
    Label { card_id: String, body: CreateLabel },
    Comment { card_id: String, body: CreateComment },
    Attachment { card_id: String, body: CreateAttachment },
}

impl CreateRequest {
    /// `None` when the entity is gone or its parent has no remote id.
    fn from_cache(state: &BoardState, kind: EntityKind, temp: &EntityId) -> Option<Self> {
        match kind {
            EntityKind::Board => state.board(temp).map(|b| Self::Board(CreateBoard::from(b))),
            EntityKind::List => {
                let list = state.find_list(temp)?;
                let board_id = list.board_id.as_confirmed()?;
                Some(Self::List(CreateList::new(list, board_id)))
            }
            EntityKind::Card => {
                let card = state.find_card(temp)?;
                let list_id = card.list_id.as_confirmed()?;
                Some(Self::Card(CreateCard::new(card, list_id)))
            }
            EntityKind::Label | EntityKind::Comment | EntityKind::Attachment => {
                let card = state.board_containing(temp)?.card_owning(temp)?;
                let card_id = card.id.as_confirmed()?.to_string();
                match kind {
                    EntityKind::Label => {
                        let label = card.labels.iter().find(|l| &l.id == temp)?;
                        Some(Self::Label { card_id, body: CreateLabel::from(label) })
                    }
                    EntityKind::Comment => {
                        let comment = card.comments.iter().find(|c| &c.id == temp)?;
                        Some(Self::Comment { card_id, body: CreateComment::from(comment) })
                    }
                    _ => {
                        let attachment = card.attachments.iter().find(|a| &a.id == temp)?;
                        Some(Self::Attachment { card_id, body: CreateAttachment::from(attachment) })
                    }
                }
            }
        }
    }
}

/// The server's copy of a newly created entity.
enum Created {
    Board(Board),
    List(List),
    Card(Card),
    Label(Label),
    Comment(Comment),
    Attachment(Attachment),
}

impl Created {
    fn id(&self) -> EntityId {
        match self {
            Created::Board(b) => b.id.clone(),
            Created::List(l) => l.id.clone(),
            Created::Card(c) => c.id.clone(),
            Created::Label(l) => l.id.clone(),
            Created::Comment(c) => c.id.clone(),
            Created::Attachment(a) => a.id.clone(),
        }
    }

    fn into_replace(self, temp: EntityId) -> Action {
        match self {
            Created::Board(board) => Action::ReplaceBoard { temp, board },
            Created::List(list) => Action::ReplaceList { temp, list },
            Created::Card(card) => Action::ReplaceCard { temp, card },
            Created::Label(label) => Action::ReplaceLabel { temp, label },
            Created::Comment(comment) => Action::ReplaceComment { temp, comment },
            Created::Attachment(attachment) => Action::ReplaceAttachment { temp, attachment },
        }
    }
}

/// A provisional board, list or card as it was when its create was sent.
enum Provisional {
    Board(Board),
    List(List),
    Card(Card),
}

impl Provisional {
    /// Children have no remote update verb, so only these three are kept.
    fn read(state: &BoardState, kind: EntityKind, temp: &EntityId) -> Option<Self> {
        match kind {
            EntityKind::Board => state.board(temp).cloned().map(Self::Board),
            EntityKind::List => state.find_list(temp).cloned().map(Self::List),
            EntityKind::Card => state.find_card(temp).cloned().map(Self::Card),
            EntityKind::Label | EntityKind::Comment | EntityKind::Attachment => None,
        }
    }

    /// What was changed locally since the create was sent. `None` when
    /// nothing was, or the entity is gone.
    fn edits_since(&self, state: &BoardState, temp: &EntityId) -> Option<LocalEdits> {
        match self {
            Provisional::Board(sent) => {
                let patch = BoardPatch::between(sent, state.board(temp)?);
                (!patch.is_empty()).then_some(LocalEdits::Board(patch))
            }
            Provisional::List(sent) => {
                let patch = ListPatch::between(sent, state.find_list(temp)?);
                (!patch.is_empty()).then_some(LocalEdits::List(patch))
            }
            Provisional::Card(sent) => {
                let now = state.find_card(temp)?;
                let patch = CardPatch::between(sent, now);
                let moved = now.list_id != sent.list_id || now.position != sent.position;
                let moved_to = moved.then(|| (now.list_id.clone(), now.position));
                (!patch.is_empty() || moved_to.is_some())
                    .then_some(LocalEdits::Card { patch, moved_to })
            }
        }
    }
}

/// Changes made to a provisional entity while its create was in flight.
/// The create body predates them, so they are sent again under the
/// confirmed id.
#[derive(Debug)]
enum LocalEdits {
    Board(BoardPatch),
    List(ListPatch),
    Card { patch: CardPatch, moved_to: Option<(EntityId, usize)> },
}

impl LocalEdits {
    /// Apply the field edits to the server's copy so the replace doesn't
    /// undo them. A card keeps its local slot through the replace anyway.
    fn fold_into(&self, created: &mut Created) {
        match (self, created) {
            (LocalEdits::Board(patch), Created::Board(board)) => {
                patch.apply(board);
            }
            (LocalEdits::List(patch), Created::List(list)) => {
                patch.apply(list);
            }
            (LocalEdits::Card { patch, .. }, Created::Card(card)) => {
                patch.apply(card);
            }
            _ => {}
        }
    }
}

/// Temporary direct children of `parent`. Under a temporary parent these
/// can only have been applied locally.
fn local_children(state: &BoardState, parent: &EntityId) -> LocalChildren {
    fn temps<'a>(kind: EntityKind, ids: impl Iterator<Item = &'a EntityId>) -> LocalChildren {
        ids.filter(|id| id.is_temporary()).map(|id| (kind, id.clone())).collect()
    }

    if let Some(board) = state.board(parent) {
        return temps(EntityKind::List, board.lists.iter().map(|l| &l.id));
    }
    if let Some(list) = state.find_list(parent) {
        return temps(EntityKind::Card, list.cards.iter().map(|c| &c.id));
    }
    if let Some(card) = state.find_card(parent) {
        let mut children = temps(EntityKind::Label, card.labels.iter().map(|l| &l.id));
        children.extend(temps(EntityKind::Comment, card.comments.iter().map(|c| &c.id)));
        children.extend(temps(EntityKind::Attachment, card.attachments.iter().map(|a| &a.id)));
        return children;
    }
    Vec::new()
}

fn exists(state: &BoardState, kind: EntityKind, id: &EntityId) -> bool {
    match kind {
        EntityKind::Board => state.board(id).is_some(),
        EntityKind::List => state.find_list(id).is_some(),
        EntityKind::Card => state.find_card(id).is_some(),
        EntityKind::Label => owning_card(state, id).is_some_and(|c| c.labels.iter().any(|l| &l.id == id)),
        EntityKind::Comment => {
            owning_card(state, id).is_some_and(|c| c.comments.iter().any(|m| &m.id == id))
        }
        EntityKind::Attachment => {
            owning_card(state, id).is_some_and(|c| c.attachments.iter().any(|a| &a.id == id))
        }
    }
}

fn owning_card<'a>(state: &'a BoardState, child: &EntityId) -> Option<&'a Card> {
    state.board_containing(child)?.card_owning(child)
}

/// Where a requested insert position lands in a container of `len`.
fn insert_at(requested: Option<usize>, len: usize) -> usize {
    requested.map_or(len, |p| p.min(len))
}

/// Creates whose remote call is outstanding, and the ones among them that
/// were deleted locally before the response came back.
#[derive(Debug, Default)]
struct InFlight {
    creates: HashSet<EntityId>,
    discarded: HashSet<EntityId>,
}

// ============================================================================
// BoardController
// ============================================================================

/// Optimistic front end over a [`BoardTransport`].
///
/// All methods take `&self`; share the controller behind an `Arc` to drive
/// several mutations at once.
pub struct BoardController<T> {
    store: BoardStore,
    transport: T,
    in_flight: Mutex<InFlight>,
}

impl<T: BoardTransport> BoardController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_store(BoardStore::new(), transport)
    }

    pub fn with_store(store: BoardStore, transport: T) -> Self {
        Self { store, transport, in_flight: Mutex::new(InFlight::default()) }
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> BoardState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.store.subscribe()
    }

    pub fn is_optimistic(&self, id: &EntityId) -> bool {
        self.store.is_optimistic(id)
    }

    pub fn current_board_id(&self) -> Result<EntityId, SyncError> {
        self.store
            .read(|s| s.current_board_id().cloned())
            .ok_or(SyncError::NoCurrentBoard)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    pub async fn load_boards(&self) -> Result<(), SyncError> {
        self.store.dispatch(Action::SetLoading(true));
        self.store.dispatch(Action::SetError(None));
        let result = self.transport.list_boards().await;
        self.store.dispatch(Action::SetLoading(false));

        let boards = result.map_err(|e| self.fail(e.into()))?;
        info!(count = boards.len(), "boards loaded");
        self.store.dispatch(Action::SetBoards(boards));
        Ok(())
    }

    /// Make `id` the current aggregate. A board that only exists locally is
    /// promoted from the board list without a fetch.
    pub async fn load_board(&self, id: &EntityId) -> Result<(), SyncError> {
        let Some(remote) = id.as_confirmed() else {
            let local = self.store.read(|s| s.board(id).cloned());
            let board = local.ok_or_else(|| self.fail(SyncError::not_found(EntityKind::Board, id)))?;
            self.store.dispatch(Action::SetCurrentBoard(Some(board)));
            return Ok(());
        };

        self.store.dispatch(Action::SetLoading(true));
        self.store.dispatch(Action::SetError(None));
        let result = self.transport.get_board(remote).await;
        self.store.dispatch(Action::SetLoading(false));

        let board = result.map_err(|e| self.fail(e.into()))?;
        info!(board = remote, lists = board.lists.len(), "board loaded");
        self.store.dispatch(Action::SetCurrentBoard(Some(board)));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Boards
    // ------------------------------------------------------------------------

    pub async fn create_board(&self, draft: BoardDraft) -> Result<EntityId, SyncError> {
        let temp = self.store.next_temp_id();
        self.store.dispatch(Action::AddBoard(draft.materialize(temp.clone())));
        self.mark(&temp, EntityKind::Board);
        self.submit_tree(EntityKind::Board, temp).await
    }

    pub async fn update_board(&self, id: &EntityId, patch: BoardPatch) -> Result<(), SyncError> {
        self.require(EntityKind::Board, id)?;
        let aggregate = self.aggregate_of(EntityKind::Board, id);
        self.store.dispatch(Action::UpdateBoard { id: id.clone(), patch: patch.clone() });

        let Some(remote) = id.as_confirmed() else {
            self.keep_local(MutationVerb::UpdateBoard, id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::UpdateBoard, id, aggregate);
        self.settle(mutation, self.transport.update_board(remote, &patch), |board| {
            let patch = BoardPatch::from_board(&board);
            self.store.dispatch(Action::UpdateBoard { id: id.clone(), patch });
        })
        .await
    }

    pub async fn delete_board(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::Board, id).await
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    pub async fn create_list(
        &self,
        board_id: &EntityId,
        draft: ListDraft,
    ) -> Result<EntityId, SyncError> {
        let position = self
            .store
            .read(|s| s.board(board_id).map(|b| insert_at(draft.position, b.lists.len())))
            .ok_or_else(|| self.fail(SyncError::not_found(EntityKind::Board, board_id)))?;

        let temp = self.store.next_temp_id();
        let list = draft.materialize(temp.clone(), board_id.clone(), position);
        self.store.dispatch(Action::AddList(list));
        self.mark(&temp, EntityKind::List);
        self.submit_under(EntityKind::List, temp, board_id).await
    }

    pub async fn update_list(&self, id: &EntityId, patch: ListPatch) -> Result<(), SyncError> {
        self.require(EntityKind::List, id)?;
        let aggregate = self.aggregate_of(EntityKind::List, id);
        self.store.dispatch(Action::UpdateList { id: id.clone(), patch: patch.clone() });

        let Some(remote) = id.as_confirmed() else {
            self.keep_local(MutationVerb::UpdateList, id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::UpdateList, id, aggregate);
        self.settle(mutation, self.transport.update_list(remote, &patch), |list| {
            let patch = ListPatch::from_list(&list);
            self.store.dispatch(Action::UpdateList { id: id.clone(), patch });
        })
        .await
    }

    pub async fn delete_list(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::List, id).await
    }

    /// Put the board's lists in `order`. Lists not named keep their relative
    /// order after the named ones.
    pub async fn reorder_lists(
        &self,
        board_id: &EntityId,
        order: &[EntityId],
    ) -> Result<(), SyncError> {
        self.require(EntityKind::Board, board_id)?;
        let aggregate = self.aggregate_of(EntityKind::Board, board_id);
        let action = Action::ReorderLists { board_id: board_id.clone(), list_ids: order.to_vec() };
        let remote_order = self.store.dispatch_and_read(action, |s| {
            s.board(board_id)
                .map(|b| confirmed_ids(b.lists.iter().map(|l| &l.id)))
                .unwrap_or_default()
        });

        let Some(remote) = board_id.as_confirmed() else {
            self.keep_local(MutationVerb::ReorderLists, board_id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::ReorderLists, board_id, aggregate);
        self.settle(mutation, self.transport.reorder_lists(remote, &remote_order), drop).await
    }

    // ------------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------------

    pub async fn create_card(
        &self,
        list_id: &EntityId,
        draft: CardDraft,
    ) -> Result<EntityId, SyncError> {
        let position = self
            .store
            .read(|s| s.find_list(list_id).map(|l| insert_at(draft.position, l.cards.len())))
            .ok_or_else(|| self.fail(SyncError::not_found(EntityKind::List, list_id)))?;

        let temp = self.store.next_temp_id();
        let card = draft.materialize(temp.clone(), list_id.clone(), position);
        self.store.dispatch(Action::AddCard(card));
        self.mark(&temp, EntityKind::Card);
        self.submit_under(EntityKind::Card, temp, list_id).await
    }

    pub async fn update_card(&self, id: &EntityId, patch: CardPatch) -> Result<(), SyncError> {
        self.require(EntityKind::Card, id)?;
        let aggregate = self.aggregate_of(EntityKind::Card, id);
        self.store.dispatch(Action::UpdateCard { id: id.clone(), patch: patch.clone() });

        let Some(remote) = id.as_confirmed() else {
            self.keep_local(MutationVerb::UpdateCard, id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::UpdateCard, id, aggregate);
        self.settle(mutation, self.transport.update_card(remote, &patch), |card| {
            let patch = CardPatch::from_card(&card);
            self.store.dispatch(Action::UpdateCard { id: id.clone(), patch });
        })
        .await
    }

    pub async fn delete_card(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::Card, id).await
    }

    /// Move a card to `target_list_id` at `position` (clamped to the target's
    /// length). Both must be on the same board.
    pub async fn move_card(
        &self,
        card_id: &EntityId,
        target_list_id: &EntityId,
        position: usize,
    ) -> Result<(), SyncError> {
        let target_known = self.store.read(|s| {
            let board = s.board_containing(card_id)?;
            board.card(card_id)?;
            Some(board.list(target_list_id).is_some())
        });
        match target_known {
            None => return Err(self.fail(SyncError::not_found(EntityKind::Card, card_id))),
            Some(false) => {
                return Err(self.fail(SyncError::not_found(EntityKind::List, target_list_id)));
            }
            Some(true) => {}
        }

        let aggregate = self.aggregate_of(EntityKind::Card, card_id);
        let action = Action::MoveCard {
            card_id: card_id.clone(),
            target_list_id: target_list_id.clone(),
            new_position: position,
        };
        // Send the index the card actually landed on.
        let landed = self
            .store
            .dispatch_and_read(action, |s| s.find_card(card_id).map(|c| c.position))
            .unwrap_or(position);

        let (Some(card), Some(list)) = (card_id.as_confirmed(), target_list_id.as_confirmed())
        else {
            self.keep_local(MutationVerb::MoveCard, card_id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::MoveCard, card_id, aggregate);
        self.settle(mutation, self.transport.move_card(card, list, landed), drop).await
    }

    /// Put a list's cards in `order`. Cards not named keep their relative
    /// order after the named ones.
    pub async fn reorder_cards(
        &self,
        list_id: &EntityId,
        order: &[EntityId],
    ) -> Result<(), SyncError> {
        self.require(EntityKind::List, list_id)?;
        let aggregate = self.aggregate_of(EntityKind::List, list_id);
        let action = Action::ReorderCards { list_id: list_id.clone(), card_ids: order.to_vec() };
        let remote_order = self.store.dispatch_and_read(action, |s| {
            s.find_list(list_id)
                .map(|l| confirmed_ids(l.cards.iter().map(|c| &c.id)))
                .unwrap_or_default()
        });

        let Some(remote) = list_id.as_confirmed() else {
            self.keep_local(MutationVerb::ReorderCards, list_id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::ReorderCards, list_id, aggregate);
        self.settle(mutation, self.transport.reorder_cards(remote, &remote_order), drop).await
    }

    // ------------------------------------------------------------------------
    // Labels, comments, attachments
    // ------------------------------------------------------------------------

    pub async fn add_label(
        &self,
        card_id: &EntityId,
        draft: LabelDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = self.store.next_temp_id();
        self.add_label_as(temp, card_id, draft).await
    }

    /// [`add_label`](Self::add_label) with a temporary id the caller
    /// allocated from [`BoardStore::next_temp_id`], so it can show the label
    /// before calling.
    pub async fn add_label_as(
        &self,
        temp: EntityId,
        card_id: &EntityId,
        draft: LabelDraft,
    ) -> Result<EntityId, SyncError> {
        self.require(EntityKind::Card, card_id)?;
        self.store.dispatch(Action::AddLabel(draft.materialize(temp.clone(), card_id.clone())));
        self.mark(&temp, EntityKind::Label);
        self.submit_under(EntityKind::Label, temp, card_id).await
    }

    pub async fn remove_label(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::Label, id).await
    }

    pub async fn add_comment(
        &self,
        card_id: &EntityId,
        draft: CommentDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = self.store.next_temp_id();
        self.add_comment_as(temp, card_id, draft).await
    }

    /// See [`add_label_as`](Self::add_label_as).
    pub async fn add_comment_as(
        &self,
        temp: EntityId,
        card_id: &EntityId,
        draft: CommentDraft,
    ) -> Result<EntityId, SyncError> {
        self.require(EntityKind::Card, card_id)?;
        let comment = draft.materialize(temp.clone(), card_id.clone(), gymboard_types::now());
        self.store.dispatch(Action::AddComment(comment));
        self.mark(&temp, EntityKind::Comment);
        self.submit_under(EntityKind::Comment, temp, card_id).await
    }

    pub async fn remove_comment(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::Comment, id).await
    }

    pub async fn add_attachment(
        &self,
        card_id: &EntityId,
        draft: AttachmentDraft,
    ) -> Result<EntityId, SyncError> {
        let temp = self.store.next_temp_id();
        self.add_attachment_as(temp, card_id, draft).await
    }

    /// See [`add_label_as`](Self::add_label_as).
    pub async fn add_attachment_as(
        &self,
        temp: EntityId,
        card_id: &EntityId,
        draft: AttachmentDraft,
    ) -> Result<EntityId, SyncError> {
        self.require(EntityKind::Card, card_id)?;
        let attachment = draft.materialize(temp.clone(), card_id.clone());
        self.store.dispatch(Action::AddAttachment(attachment));
        self.mark(&temp, EntityKind::Attachment);
        self.submit_under(EntityKind::Attachment, temp, card_id).await
    }

    pub async fn remove_attachment(&self, id: &EntityId) -> Result<(), SyncError> {
        self.remove(EntityKind::Attachment, id).await
    }

    // ========================================================================
    // Flow internals
    // ========================================================================

    /// Record a failure in the cache and hand it back.
    fn fail(&self, error: SyncError) -> SyncError {
        self.store.dispatch(Action::SetError(Some(error.to_string())));
        error
    }

    fn require(&self, kind: EntityKind, id: &EntityId) -> Result<(), SyncError> {
        if self.store.read(|s| exists(s, kind, id)) {
            Ok(())
        } else {
            Err(self.fail(SyncError::not_found(kind, id)))
        }
    }

    fn mark(&self, id: &EntityId, kind: EntityKind) {
        self.store.dispatch(Action::MarkOptimistic { id: id.clone(), kind });
    }

    fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Confirmed id of the aggregate to refetch if a change to `id` fails.
    ///
    /// Board verbs only refetch when the board is the current aggregate;
    /// the board list is reloaded for them regardless.
    fn aggregate_of(&self, kind: EntityKind, id: &EntityId) -> Option<String> {
        self.store.read(|s| {
            let board = match kind {
                EntityKind::Board => s.current_board().map(|b| &**b).filter(|b| &b.id == id),
                _ => s.board_containing(id),
            };
            board.and_then(|b| b.id.as_confirmed()).map(str::to_string)
        })
    }

    /// A change whose subject (or parent) has no remote record yet stays in
    /// the cache; there is nothing to send or settle.
    fn keep_local(&self, verb: MutationVerb, subject: &EntityId) {
        debug!(%verb, %subject, "mutation applied locally only");
    }

    fn begin(&self, verb: MutationVerb, subject: &EntityId, aggregate: Option<String>) -> Mutation {
        self.mark(subject, verb.kind());
        Mutation::pending(verb, subject.clone(), aggregate)
    }

    /// Await the remote half of a change and confirm or roll it back.
    async fn settle<R>(
        &self,
        mut mutation: Mutation,
        call: impl Future<Output = TransportResult<R>>,
        on_ok: impl FnOnce(R),
    ) -> Result<(), SyncError> {
        match call.await {
            Ok(response) => {
                on_ok(response);
                self.store.dispatch(Action::ConfirmOptimistic(mutation.subject.clone()));
                mutation.settle(Phase::Confirmed);
                info!(verb = %mutation.verb, subject = %mutation.subject, "mutation confirmed");
                Ok(())
            }
            Err(error) => Err(self.roll_back(&mut mutation, error).await),
        }
    }

    async fn roll_back(&self, mutation: &mut Mutation, error: TransportError) -> SyncError {
        warn!(
            verb = %mutation.verb,
            subject = %mutation.subject,
            %error,
            "remote store rejected mutation, rolling back"
        );
        match mutation.recovery() {
            Recovery::DiscardTemporary => {
                self.store.dispatch(Action::delete(mutation.kind(), mutation.subject.clone()));
            }
            Recovery::RefetchAggregate => self.refetch(mutation).await,
        }
        self.store.dispatch(Action::RevertOptimistic(mutation.subject.clone()));
        mutation.settle(Phase::RolledBack);
        self.fail(SyncError::Network(error))
    }

    /// Replace local state with the server's after a rejected change.
    async fn refetch(&self, mutation: &Mutation) {
        if let Some(board_id) = mutation.aggregate.as_deref() {
            match self.transport.get_board(board_id).await {
                Ok(board) => {
                    let still_current = self.store.read(|s| {
                        s.current_board_id().is_none_or(|id| id.as_confirmed() == Some(board_id))
                    });
                    if still_current {
                        debug!(board = board_id, "aggregate refetched");
                        self.store.dispatch(Action::SetCurrentBoard(Some(board)));
                    } else {
                        debug!(board = board_id, "current board changed, dropping refetch");
                    }
                }
                Err(error) => warn!(board = board_id, %error, "aggregate refetch failed"),
            }
        }
        if mutation.kind() == EntityKind::Board {
            match self.transport.list_boards().await {
                Ok(boards) => self.store.dispatch(Action::SetBoards(boards)),
                Err(error) => warn!(%error, "board list refetch failed"),
            }
        }
    }

    /// Shared tail of every delete verb.
    async fn remove(&self, kind: EntityKind, id: &EntityId) -> Result<(), SyncError> {
        self.require(kind, id)?;
        let aggregate = self.aggregate_of(kind, id);
        self.store.dispatch(Action::delete(kind, id.clone()));

        let Some(remote) = id.as_confirmed() else {
            // Never persisted: it just vanishes.
            self.store.dispatch(Action::RevertOptimistic(id.clone()));
            let mut in_flight = self.in_flight();
            if in_flight.creates.contains(id) {
                in_flight.discarded.insert(id.clone());
            }
            self.keep_local(MutationVerb::delete_for(kind), id);
            return Ok(());
        };
        let mutation = self.begin(MutationVerb::delete_for(kind), id, aggregate);
        self.settle(mutation, self.send_delete(kind, remote), drop).await
    }

    async fn send_delete(&self, kind: EntityKind, id: &str) -> TransportResult<()> {
        match kind {
            EntityKind::Board => self.transport.delete_board(id).await,
            EntityKind::List => self.transport.delete_list(id).await,
            EntityKind::Card => self.transport.delete_card(id).await,
            EntityKind::Label => self.transport.delete_label(id).await,
            EntityKind::Comment => self.transport.delete_comment(id).await,
            EntityKind::Attachment => self.transport.delete_attachment(id).await,
        }
    }

    async fn send_create(&self, request: CreateRequest) -> TransportResult<Created> {
        match request {
            CreateRequest::Board(body) => self.transport.create_board(&body).await.map(Created::Board),
            CreateRequest::List(body) => self.transport.create_list(&body).await.map(Created::List),
            CreateRequest::Card(body) => self.transport.create_card(&body).await.map(Created::Card),
            CreateRequest::Label { card_id, body } => {
                self.transport.add_label(&card_id, &body).await.map(Created::Label)
            }
            CreateRequest::Comment { card_id, body } => {
                self.transport.add_comment(&card_id, &body).await.map(Created::Comment)
            }
            CreateRequest::Attachment { card_id, body } => {
                self.transport.add_attachment(&card_id, &body).await.map(Created::Attachment)
            }
        }
    }

    /// Submit a provisional entity unless its parent is itself provisional,
    /// in which case it waits for the parent.
    async fn submit_under(
        &self,
        kind: EntityKind,
        temp: EntityId,
        parent: &EntityId,
    ) -> Result<EntityId, SyncError> {
        if parent.is_temporary() {
            self.keep_local(MutationVerb::create_for(kind), &temp);
            return Ok(temp);
        }
        self.submit_tree(kind, temp).await
    }

    /// Submit a provisional entity, then every provisional descendant that
    /// was waiting on it, parents before children.
    async fn submit_tree(&self, kind: EntityKind, temp: EntityId) -> Result<EntityId, SyncError> {
        let (id, mut waiting) = self.submit(kind, temp).await?;
        while let Some((kind, temp)) = waiting.pop() {
            // Failures are already compensated and recorded in the cache.
            if let Ok((_, children)) = self.submit(kind, temp).await {
                waiting.extend(children);
            }
        }
        Ok(id)
    }

    /// Send one create and settle it. On success returns the confirmed id and
    /// the provisional children that were waiting on it.
    async fn submit(
        &self,
        kind: EntityKind,
        temp: EntityId,
    ) -> Result<(EntityId, LocalChildren), SyncError> {
        let (request, sent) = self.store.read(|s| {
            (CreateRequest::from_cache(s, kind, &temp), Provisional::read(s, kind, &temp))
        });
        let Some(request) = request else {
            return Err(self.fail(SyncError::not_found(kind, &temp)));
        };

        let mut mutation = Mutation::pending(MutationVerb::create_for(kind), temp.clone(), None);
        self.in_flight().creates.insert(temp.clone());
        let result = self.send_create(request).await;
        let discarded = {
            let mut in_flight = self.in_flight();
            in_flight.creates.remove(&temp);
            in_flight.discarded.remove(&temp)
        };

        let mut created = match result {
            Ok(created) => created,
            Err(error) => return Err(self.roll_back(&mut mutation, error).await),
        };
        let id = created.id();

        if discarded {
            // Deleted locally while the create was in flight: the server copy
            // is the only one left, so remove it too.
            self.store.dispatch(Action::ConfirmOptimistic(temp.clone()));
            mutation.settle(Phase::Confirmed);
            info!(%kind, %temp, %id, "created entity was discarded locally, deleting remote copy");
            if let Some(remote) = id.as_confirmed() {
                if let Err(error) = self.send_delete(kind, remote).await {
                    warn!(%kind, %id, %error, "failed to delete discarded entity");
                }
            }
            return Ok((id, Vec::new()));
        }

        // The replace keeps the provisional node's children, so the ones
        // waiting on it can be read before it lands.
        let (children, edits) = self.store.dispatch_with(|s| {
            let edits = sent.as_ref().and_then(|sent| sent.edits_since(s, &temp));
            if let Some(edits) = &edits {
                edits.fold_into(&mut created);
            }
            let children = local_children(s, &temp);
            (created.into_replace(temp.clone()), (children, edits))
        });
        self.store.dispatch(Action::ConfirmOptimistic(temp.clone()));
        mutation.settle(Phase::Confirmed);
        info!(%kind, %temp, %id, waiting = children.len(), "create confirmed");

        if let Some(edits) = edits {
            self.replay(&id, edits).await;
        }
        Ok((id, children))
    }

    /// Send edits that were applied to an entity before it had a remote id.
    /// A rejection is compensated like any other change; the create itself
    /// still stands.
    async fn replay(&self, id: &EntityId, edits: LocalEdits) {
        debug!(%id, ?edits, "replaying edits made while the create was in flight");
        let result = match edits {
            LocalEdits::Board(patch) => self.update_board(id, patch).await,
            LocalEdits::List(patch) => self.update_list(id, patch).await,
            LocalEdits::Card { patch, moved_to } => {
                let moved = match moved_to {
                    Some((list_id, position)) => self.move_card(id, &list_id, position).await,
                    None => Ok(()),
                };
                match moved {
                    Ok(()) if !patch.is_empty() => self.update_card(id, patch).await,
                    other => other,
                }
            }
        };
        if let Err(error) = result {
            warn!(%id, %error, "edits made during create were rejected");
        }
    }
}

fn confirmed_ids<'a>(ids: impl Iterator<Item = &'a EntityId>) -> Vec<String> {
    ids.filter_map(|id| id.as_confirmed().map(str::to_string)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymboard_types::DEFAULT_BOARD_COLOR;

    fn state_with(board: Board) -> BoardState {
        let store = BoardStore::new();
        store.dispatch(Action::SetCurrentBoard(Some(board)));
        store.snapshot()
    }

    #[test]
    fn test_create_request_needs_confirmed_parent() {
        let mut board = BoardDraft::new("Gym").materialize("b1".into());
        board.lists.push(std::sync::Arc::new(
            ListDraft::new("Later").materialize(EntityId::temporary(1), "b1".into(), 0),
        ));
        let state = state_with(board);

        let request = CreateRequest::from_cache(&state, EntityKind::List, &EntityId::temporary(1));
        assert!(matches!(request, Some(CreateRequest::List(ref body)) if body.board_id == "b1"));

        let mut orphan = BoardDraft::new("Draft").materialize(EntityId::temporary(2));
        orphan.lists.push(std::sync::Arc::new(
            ListDraft::new("x").materialize(EntityId::temporary(3), EntityId::temporary(2), 0),
        ));
        let state = state_with(orphan);
        assert!(CreateRequest::from_cache(&state, EntityKind::List, &EntityId::temporary(3)).is_none());
        assert!(matches!(
            CreateRequest::from_cache(&state, EntityKind::Board, &EntityId::temporary(2)),
            Some(CreateRequest::Board(ref body)) if body.color == DEFAULT_BOARD_COLOR
        ));
    }

    #[test]
    fn test_local_children_only_lists_temporary_ids() {
        let mut board = BoardDraft::new("Gym").materialize("b1".into());
        board.lists.push(std::sync::Arc::new(
            ListDraft::new("Kept").materialize("l1".into(), "b1".into(), 0),
        ));
        board.lists.push(std::sync::Arc::new(
            ListDraft::new("New").materialize(EntityId::temporary(5), "b1".into(), 1),
        ));
        let state = state_with(board);
        assert_eq!(
            local_children(&state, &"b1".into()),
            vec![(EntityKind::List, EntityId::temporary(5))]
        );
        assert!(local_children(&state, &"nope".into()).is_empty());
    }

    #[test]
    fn test_insert_at_clamps_and_appends() {
        assert_eq!(insert_at(None, 3), 3);
        assert_eq!(insert_at(Some(1), 3), 1);
        assert_eq!(insert_at(Some(9), 3), 3);
    }
}
