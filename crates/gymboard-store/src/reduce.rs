//! The state transition function.
//!
//! [`reduce`] is pure and total: it never panics, never performs I/O, and an
//! action that names an id absent from the cache returns a state equal to the
//! input. Only the boards, lists and cards on the edited path are copied.
//!
//! List, card and child actions are routed to the first board holding the
//! target, searching the current aggregate before the board list. When the
//! current aggregate is edited, its entry in `boards` is repointed at the
//! edited copy so both views stay identical.

use std::sync::Arc;

use gymboard_types::{Attachment, Board, Comment, EntityId, Label};
use tracing::trace;

use crate::action::Action;
use crate::paths::{self, CardChild};
use crate::state::BoardState;

/// Apply one action, returning the next state.
pub fn reduce(state: &BoardState, action: Action) -> BoardState {
    let mut next = state.clone();
    apply(&mut next, action);
    next
}

/// Edit the first board matching `pred` in place.
fn edit_board(
    state: &mut BoardState,
    pred: impl Fn(&Board) -> bool,
    edit: impl FnOnce(&mut Board) -> bool,
) -> bool {
    if let Some(current) = state.current_board.as_mut().filter(|b| pred(b)) {
        let changed = edit(Arc::make_mut(current));
        let shared = current.clone();
        if let Some(slot) = state.boards.iter_mut().find(|b| b.id == shared.id) {
            *slot = shared;
        }
        return changed;
    }
    match state.boards.iter_mut().find(|b| pred(b)) {
        Some(slot) => edit(Arc::make_mut(slot)),
        None => false,
    }
}

/// Point the `boards` entry for the current aggregate at the same node.
fn share_current(state: &mut BoardState) {
    if let Some(current) = &state.current_board {
        if let Some(slot) = state.boards.iter_mut().find(|b| b.id == current.id) {
            *slot = current.clone();
        }
    }
}

/// Drop tracker entries for ids that no cached board holds any more. Run
/// after the aggregate is replaced wholesale.
fn prune_tracker(state: &mut BoardState) {
    let stale: Vec<EntityId> = state
        .optimistic
        .iter()
        .filter(|(id, _)| !state.contains(id))
        .map(|(id, _)| id.clone())
        .collect();
    if !stale.is_empty() {
        trace!(count = stale.len(), "pruning tracker after aggregate replace");
        state.optimistic.clear_all(&stale);
    }
}

fn find_child<'a, C: CardChild>(state: &'a BoardState, id: &EntityId) -> Option<&'a C> {
    state
        .board_containing(id)?
        .cards()
        .flat_map(|card| C::slot(card).iter())
        .find(|c| c.id() == id)
}

fn holds_child<C: CardChild>(board: &Board, id: &EntityId) -> bool {
    board.cards().any(|card| C::slot(card).iter().any(|c| c.id() == id))
}

fn apply(state: &mut BoardState, action: Action) {
    trace!("reduce {}", action.name());
    match action {
        // ── Bookkeeping ─────────────────────────────────────────────────
        Action::SetLoading(loading) => state.loading = loading,
        Action::SetError(error) => state.error = error,
        Action::SetBoards(boards) => {
            state.boards = boards.into_iter().map(Arc::new).collect();
        }
        Action::SetCurrentBoard(board) => {
            state.current_board = board.map(Arc::new);
            share_current(state);
            prune_tracker(state);
        }
        Action::MarkOptimistic { id, kind } => state.optimistic.mark(id, kind),
        Action::ConfirmOptimistic(id) | Action::RevertOptimistic(id) => {
            state.optimistic.clear(&id);
        }

        // ── Boards ──────────────────────────────────────────────────────
        Action::AddBoard(board) => {
            if state.board(&board.id).is_none() {
                state.boards.push(Arc::new(board));
            }
        }
        Action::UpdateBoard { id, patch } => {
            if state.board(&id).is_some_and(|b| patch.would_change(b)) {
                edit_board(state, |b| b.id == id, |b| patch.apply(b));
            }
        }
        Action::DeleteBoard(id) => {
            let Some(descendants) = state.board(&id).map(|b| b.descendant_ids()) else {
                return;
            };
            state.boards.retain(|b| b.id != id);
            if state.current_board_id() == Some(&id) {
                state.current_board = None;
            }
            state.optimistic.clear_all(&descendants);
        }
        Action::ReplaceBoard { temp, board } => replace_board(state, &temp, board),

        // ── Lists ───────────────────────────────────────────────────────
        Action::AddList(list) => {
            let board_id = list.board_id.clone();
            let position = list.position;
            edit_board(state, |b| b.id == board_id, |b| paths::insert_list(b, list, position));
        }
        Action::UpdateList { id, patch } => {
            if state.find_list(&id).is_some_and(|l| patch.would_change(l)) {
                edit_board(
                    state,
                    |b| b.list_index(&id).is_some(),
                    |b| paths::patch_list(b, &id, &patch),
                );
            }
        }
        Action::DeleteList(id) => {
            let Some(descendants) = state.find_list(&id).map(|l| l.descendant_ids()) else {
                return;
            };
            edit_board(
                state,
                |b| b.list_index(&id).is_some(),
                |b| paths::remove_list(b, &id).is_some(),
            );
            state.optimistic.clear_all(&descendants);
        }
        Action::ReplaceList { temp, list } => {
            let confirmed = list.id.clone();
            let board_id = list.board_id.clone();
            edit_board(
                state,
                |b| {
                    b.list_index(&confirmed).is_some()
                        || b.list_index(&temp).is_some()
                        || b.id == board_id
                },
                |b| paths::replace_list(b, &temp, list),
            );
        }
        Action::ReorderLists { board_id, list_ids } => {
            edit_board(state, |b| b.id == board_id, |b| paths::reorder_lists(b, &list_ids));
        }

        // ── Cards ───────────────────────────────────────────────────────
        Action::AddCard(card) => {
            let list_id = card.list_id.clone();
            let position = card.position;
            edit_board(
                state,
                |b| b.list_index(&list_id).is_some(),
                |b| paths::insert_card(b, card, position),
            );
        }
        Action::UpdateCard { id, patch } => {
            if state.find_card(&id).is_some_and(|c| patch.would_change(c)) {
                edit_board(
                    state,
                    |b| b.locate_card(&id).is_some(),
                    |b| paths::patch_card(b, &id, &patch),
                );
            }
        }
        Action::DeleteCard(id) => {
            let Some(children) = state.find_card(&id).map(|c| c.child_ids().collect::<Vec<_>>())
            else {
                return;
            };
            edit_board(
                state,
                |b| b.locate_card(&id).is_some(),
                |b| paths::remove_card(b, &id).is_some(),
            );
            state.optimistic.clear_all(&children);
        }
        Action::ReplaceCard { temp, card } => {
            let confirmed = card.id.clone();
            let list_id = card.list_id.clone();
            edit_board(
                state,
                |b| {
                    b.locate_card(&confirmed).is_some()
                        || b.locate_card(&temp).is_some()
                        || b.list_index(&list_id).is_some()
                },
                |b| paths::replace_card(b, &temp, card),
            );
        }
        Action::MoveCard { card_id, target_list_id, new_position } => {
            edit_board(
                state,
                |b| b.locate_card(&card_id).is_some() && b.list_index(&target_list_id).is_some(),
                |b| paths::move_card(b, &card_id, &target_list_id, new_position),
            );
        }
        Action::ReorderCards { list_id, card_ids } => {
            edit_board(
                state,
                |b| b.list_index(&list_id).is_some(),
                |b| paths::reorder_cards(b, &list_id, &card_ids),
            );
        }

        // ── Labels ──────────────────────────────────────────────────────
        Action::AddLabel(label) => add_child(state, label),
        Action::UpdateLabel { id, patch } => {
            if find_child::<Label>(state, &id).is_some_and(|l| patch.would_change(l)) {
                edit_board(
                    state,
                    |b| holds_child::<Label>(b, &id),
                    |b| paths::patch_label(b, &id, &patch),
                );
            }
        }
        Action::DeleteLabel(id) => remove_child::<Label>(state, &id),
        Action::ReplaceLabel { temp, label } => replace_child(state, &temp, label),

        // ── Comments ────────────────────────────────────────────────────
        Action::AddComment(comment) => add_child(state, comment),
        Action::UpdateComment { id, patch } => {
            if find_child::<Comment>(state, &id).is_some_and(|c| patch.would_change(c)) {
                edit_board(
                    state,
                    |b| holds_child::<Comment>(b, &id),
                    |b| paths::patch_comment(b, &id, &patch),
                );
            }
        }
        Action::DeleteComment(id) => remove_child::<Comment>(state, &id),
        Action::ReplaceComment { temp, comment } => replace_child(state, &temp, comment),

        // ── Attachments ─────────────────────────────────────────────────
        Action::AddAttachment(attachment) => add_child(state, attachment),
        Action::UpdateAttachment { id, patch } => {
            if find_child::<Attachment>(state, &id).is_some_and(|a| patch.would_change(a)) {
                edit_board(
                    state,
                    |b| holds_child::<Attachment>(b, &id),
                    |b| paths::patch_attachment(b, &id, &patch),
                );
            }
        }
        Action::DeleteAttachment(id) => remove_child::<Attachment>(state, &id),
        Action::ReplaceAttachment { temp, attachment } => {
            replace_child(state, &temp, attachment)
        }
    }
}

fn replace_board(state: &mut BoardState, temp: &EntityId, mut incoming: Board) {
    if incoming.lists.is_empty() {
        if let Some(local) = state.board(&incoming.id).or_else(|| state.board(temp)) {
            incoming.lists = local.lists.clone();
        }
    }
    for list in &mut incoming.lists {
        if list.board_id != incoming.id {
            Arc::make_mut(list).board_id = incoming.id.clone();
        }
    }
    let incoming = Arc::new(incoming);

    let slot = state
        .boards
        .iter()
        .position(|b| b.id == incoming.id)
        .or_else(|| state.boards.iter().position(|b| &b.id == temp));
    match slot {
        Some(index) => state.boards[index] = incoming.clone(),
        None => state.boards.push(incoming.clone()),
    }
    if temp != &incoming.id {
        state.boards.retain(|b| &b.id != temp);
    }

    let current_matches = state
        .current_board_id()
        .is_some_and(|id| id == temp || id == &incoming.id);
    if current_matches {
        state.current_board = Some(incoming);
    }
}

fn add_child<C: CardChild>(state: &mut BoardState, child: C) {
    let card_id = child.card_id().clone();
    edit_board(state, |b| b.card(&card_id).is_some(), |b| paths::add_child(b, child));
}

fn remove_child<C: CardChild>(state: &mut BoardState, id: &EntityId) {
    edit_board(state, |b| holds_child::<C>(b, id), |b| paths::remove_child::<C>(b, id));
}

fn replace_child<C: CardChild>(state: &mut BoardState, temp: &EntityId, child: C) {
    let confirmed = child.id().clone();
    let card_id = child.card_id().clone();
    edit_board(
        state,
        |b| holds_child::<C>(b, &confirmed) || holds_child::<C>(b, temp) || b.card(&card_id).is_some(),
        |b| paths::replace_child(b, temp, child),
    );
}
