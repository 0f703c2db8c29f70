//! Path-update helpers over a single board aggregate.
//!
//! Each helper edits a `&mut Board` in place, calling `Arc::make_mut` only on
//! the lists and cards along the path it actually changes. Everything else
//! stays pointer-equal to whatever snapshot the board was cloned from.
//!
//! Helpers return `true` when they changed the board. Callers that want to
//! keep a no-op from copying anything should check with the read-only
//! lookups on [`Board`] first; the helpers themselves assume a change is
//! wanted once they reach a node.
//!
//! After any insert or removal the affected container is re-ranked so that
//! `position == index` for every child.

use std::sync::Arc;

use gymboard_types::{
    Attachment, AttachmentPatch, Board, Card, CardPatch, Comment, CommentPatch, EntityId, Label,
    LabelPatch, List, ListPatch,
};

// ============================================================================
// Ranking
// ============================================================================

/// Rewrite list positions to match their index.
pub fn rerank_lists(board: &mut Board) {
    for (index, list) in board.lists.iter_mut().enumerate() {
        if list.position != index {
            Arc::make_mut(list).position = index;
        }
    }
}

/// Rewrite card positions (and parent ids) to match the containing list.
pub fn rerank_cards(list: &mut List) {
    let list_id = list.id.clone();
    for (index, card) in list.cards.iter_mut().enumerate() {
        if card.position != index || card.list_id != list_id {
            let card = Arc::make_mut(card);
            card.position = index;
            card.list_id = list_id.clone();
        }
    }
}

// ============================================================================
// Lists
// ============================================================================

/// Insert a list at `clamp(position, 0, len)`. Existing ids are rejected.
pub fn insert_list(board: &mut Board, mut list: List, position: usize) -> bool {
    if board.list_index(&list.id).is_some() {
        return false;
    }
    let at = position.min(board.lists.len());
    list.board_id = board.id.clone();
    board.lists.insert(at, Arc::new(list));
    rerank_lists(board);
    true
}

pub fn remove_list(board: &mut Board, id: &EntityId) -> Option<Arc<List>> {
    let index = board.list_index(id)?;
    let removed = board.lists.remove(index);
    rerank_lists(board);
    Some(removed)
}

pub fn patch_list(board: &mut Board, id: &EntityId, patch: &ListPatch) -> bool {
    let Some(index) = board.list_index(id) else {
        return false;
    };
    if !patch.would_change(&board.lists[index]) {
        return false;
    }
    patch.apply(Arc::make_mut(&mut board.lists[index]))
}

/// Swap a provisional list for its confirmed form, keeping its slot.
///
/// Lookup prefers the confirmed id (a refetch may already have brought it
/// in), then the temporary one. If neither is present the list is inserted
/// at its reported position. Local cards are adopted when the response
/// carries none.
pub fn replace_list(board: &mut Board, temp: &EntityId, mut incoming: List) -> bool {
    let confirmed_at = board.list_index(&incoming.id);
    let temp_at = board.list_index(temp).filter(|_| temp != &incoming.id);

    let Some(index) = confirmed_at.or(temp_at) else {
        let position = incoming.position;
        return insert_list(board, incoming, position);
    };

    if incoming.cards.is_empty() {
        incoming.cards = board.lists[index].cards.clone();
    }
    incoming.board_id = board.id.clone();
    rerank_cards(&mut incoming);
    board.lists[index] = Arc::new(incoming);

    // Both forms present: the provisional copy is now a duplicate.
    if let (Some(_), Some(stale)) = (confirmed_at, temp_at) {
        board.lists.remove(stale);
    }
    rerank_lists(board);
    true
}

/// Reorder lists to follow `order`. Ids not on the board are ignored; lists
/// missing from `order` keep their relative order after the named ones.
pub fn reorder_lists(board: &mut Board, order: &[EntityId]) -> bool {
    let before: Vec<EntityId> = board.lists.iter().map(|l| l.id.clone()).collect();
    let mut remaining = std::mem::take(&mut board.lists);
    let mut ordered = Vec::with_capacity(remaining.len());
    for id in order {
        if let Some(index) = remaining.iter().position(|l| &l.id == id) {
            ordered.push(remaining.remove(index));
        }
    }
    ordered.extend(remaining);
    board.lists = ordered;

    let changed = board.lists.iter().map(|l| &l.id).ne(before.iter());
    rerank_lists(board);
    changed
}

// ============================================================================
// Cards
// ============================================================================

/// Insert a card into its `list_id` at `clamp(position, 0, len)`.
///
/// Fails (returns `false`) when the list isn't on this board or the card id
/// is already present anywhere on it.
pub fn insert_card(board: &mut Board, card: Card, position: usize) -> bool {
    if board.locate_card(&card.id).is_some() {
        return false;
    }
    let Some(list_index) = board.list_index(&card.list_id) else {
        return false;
    };
    let list = Arc::make_mut(&mut board.lists[list_index]);
    let at = position.min(list.cards.len());
    list.cards.insert(at, Arc::new(card));
    rerank_cards(list);
    true
}

pub fn remove_card(board: &mut Board, id: &EntityId) -> Option<Arc<Card>> {
    let loc = board.locate_card(id)?;
    let list = Arc::make_mut(&mut board.lists[loc.list_index]);
    let removed = list.cards.remove(loc.card_index);
    rerank_cards(list);
    Some(removed)
}

/// Run `edit` against a card in place. Returns `false` if the card is absent.
pub fn edit_card(board: &mut Board, id: &EntityId, edit: impl FnOnce(&mut Card)) -> bool {
    let Some(loc) = board.locate_card(id) else {
        return false;
    };
    let list = Arc::make_mut(&mut board.lists[loc.list_index]);
    edit(Arc::make_mut(&mut list.cards[loc.card_index]));
    true
}

pub fn patch_card(board: &mut Board, id: &EntityId, patch: &CardPatch) -> bool {
    let wanted = board.card(id).is_some_and(|card| patch.would_change(card));
    wanted
        && edit_card(board, id, |card| {
            patch.apply(card);
        })
}

/// Swap a provisional card for its confirmed form, keeping its slot and
/// its containing list. Same lookup and adoption rules as [`replace_list`].
pub fn replace_card(board: &mut Board, temp: &EntityId, mut incoming: Card) -> bool {
    let confirmed_at = board.locate_card(&incoming.id);
    let temp_at = board.locate_card(temp).filter(|_| temp != &incoming.id);

    let Some(loc) = confirmed_at.or(temp_at) else {
        let position = incoming.position;
        return insert_card(board, incoming, position);
    };

    let local = board.lists[loc.list_index].cards[loc.card_index].clone();
    if incoming.labels.is_empty() {
        incoming.labels = local.labels.clone();
    }
    if incoming.comments.is_empty() {
        incoming.comments = local.comments.clone();
    }
    if incoming.attachments.is_empty() {
        incoming.attachments = local.attachments.clone();
    }
    let card_id = incoming.id.clone();
    for label in &mut incoming.labels {
        label.card_id = card_id.clone();
    }
    for comment in &mut incoming.comments {
        comment.card_id = card_id.clone();
    }
    for attachment in &mut incoming.attachments {
        attachment.card_id = card_id.clone();
    }

    if let (Some(_), Some(stale)) = (confirmed_at, temp_at) {
        let list = Arc::make_mut(&mut board.lists[stale.list_index]);
        list.cards.remove(stale.card_index);
        rerank_cards(list);
    }

    // Removing the stale copy may have shifted the confirmed slot. With no
    // confirmed copy yet, the provisional one is the slot to fill.
    let Some(loc) = board.locate_card(&card_id).or_else(|| board.locate_card(temp)) else {
        return false;
    };
    let list = Arc::make_mut(&mut board.lists[loc.list_index]);
    list.cards[loc.card_index] = Arc::new(incoming);
    rerank_cards(list);
    true
}

/// Move a card to `target_list` at `clamp(position, 0, len)`.
///
/// The target is checked before anything is removed, so a bad target leaves
/// the card where it was rather than in no list at all.
pub fn move_card(
    board: &mut Board,
    card_id: &EntityId,
    target_list: &EntityId,
    position: usize,
) -> bool {
    let Some(from) = board.locate_card(card_id) else {
        return false;
    };
    let Some(to_index) = board.list_index(target_list) else {
        return false;
    };

    let source = Arc::make_mut(&mut board.lists[from.list_index]);
    let card = source.cards.remove(from.card_index);
    rerank_cards(source);

    let target = Arc::make_mut(&mut board.lists[to_index]);
    let at = position.min(target.cards.len());
    target.cards.insert(at, card);
    rerank_cards(target);
    true
}

/// Reorder cards within one list. Same rules as [`reorder_lists`].
pub fn reorder_cards(board: &mut Board, list_id: &EntityId, order: &[EntityId]) -> bool {
    let Some(index) = board.list_index(list_id) else {
        return false;
    };
    let current: Vec<&EntityId> = board.lists[index].cards.iter().map(|c| &c.id).collect();
    let mut wanted: Vec<&EntityId> = order.iter().filter(|id| current.contains(id)).collect();
    wanted.extend(current.iter().copied().filter(|id| !order.contains(id)));
    if wanted == current {
        return false;
    }
    let wanted: Vec<EntityId> = wanted.into_iter().cloned().collect();

    let list = Arc::make_mut(&mut board.lists[index]);
    let mut remaining = std::mem::take(&mut list.cards);
    for id in &wanted {
        if let Some(at) = remaining.iter().position(|c| &c.id == id) {
            list.cards.push(remaining.remove(at));
        }
    }
    rerank_cards(list);
    true
}

// ============================================================================
// Card children (labels, comments, attachments)
// ============================================================================

/// Something stored in one of a card's child collections.
pub trait CardChild: Clone + PartialEq {
    fn id(&self) -> &EntityId;
    fn card_id(&self) -> &EntityId;
    fn set_card_id(&mut self, card_id: EntityId);
    fn slot(card: &Card) -> &Vec<Self>;
    fn slot_mut(card: &mut Card) -> &mut Vec<Self>;
}

macro_rules! impl_card_child {
    ($T:ty, $field:ident) => {
        impl CardChild for $T {
            fn id(&self) -> &EntityId {
                &self.id
            }
            fn card_id(&self) -> &EntityId {
                &self.card_id
            }
            fn set_card_id(&mut self, card_id: EntityId) {
                self.card_id = card_id;
            }
            fn slot(card: &Card) -> &Vec<Self> {
                &card.$field
            }
            fn slot_mut(card: &mut Card) -> &mut Vec<Self> {
                &mut card.$field
            }
        }
    };
}

impl_card_child!(Label, labels);
impl_card_child!(Comment, comments);
impl_card_child!(Attachment, attachments);

fn card_holding<C: CardChild>(board: &Board, child: &EntityId) -> Option<EntityId> {
    board
        .cards()
        .find(|card| C::slot(card).iter().any(|c| c.id() == child))
        .map(|card| card.id.clone())
}

/// Append a child to the card named by its `card_id`.
pub fn add_child<C: CardChild>(board: &mut Board, child: C) -> bool {
    let card_id = child.card_id().clone();
    let fresh = board
        .card(&card_id)
        .is_some_and(|card| !C::slot(card).iter().any(|c| c.id() == child.id()));
    fresh && edit_card(board, &card_id, |card| C::slot_mut(card).push(child))
}

pub fn remove_child<C: CardChild>(board: &mut Board, id: &EntityId) -> bool {
    let Some(card_id) = card_holding::<C>(board, id) else {
        return false;
    };
    edit_card(board, &card_id, |card| C::slot_mut(card).retain(|c| c.id() != id))
}

/// Swap a provisional child for its confirmed form in place, or append it to
/// its card if neither form is present.
pub fn replace_child<C: CardChild>(board: &mut Board, temp: &EntityId, mut incoming: C) -> bool {
    let holder = card_holding::<C>(board, incoming.id()).or_else(|| card_holding::<C>(board, temp));
    let Some(card_id) = holder else {
        return add_child(board, incoming);
    };
    incoming.set_card_id(card_id.clone());
    let confirmed = incoming.id().clone();
    edit_card(board, &card_id, |card| {
        let slot = C::slot_mut(card);
        let index = slot
            .iter()
            .position(|c| c.id() == &confirmed)
            .or_else(|| slot.iter().position(|c| c.id() == temp));
        if let Some(index) = index {
            slot[index] = incoming;
        }
        if temp != &confirmed {
            slot.retain(|c| c.id() != temp);
        }
    })
}

/// Edit a child in place if `changes` says the edit would change it.
pub fn edit_child<C: CardChild>(
    board: &mut Board,
    id: &EntityId,
    changes: impl Fn(&C) -> bool,
    edit: impl FnOnce(&mut C),
) -> bool {
    let Some(card_id) = card_holding::<C>(board, id) else {
        return false;
    };
    let wanted = board
        .card(&card_id)
        .and_then(|card| C::slot(card).iter().find(|c| c.id() == id))
        .is_some_and(|c| changes(c));
    if !wanted {
        return false;
    }
    edit_card(board, &card_id, |card| {
        if let Some(child) = C::slot_mut(card).iter_mut().find(|c| c.id() == id) {
            edit(child);
        }
    })
}

pub fn patch_label(board: &mut Board, id: &EntityId, patch: &LabelPatch) -> bool {
    edit_child::<Label>(board, id, |l| patch.would_change(l), |l| {
        patch.apply(l);
    })
}

pub fn patch_comment(board: &mut Board, id: &EntityId, patch: &CommentPatch) -> bool {
    edit_child::<Comment>(board, id, |c| patch.would_change(c), |c| {
        patch.apply(c);
    })
}

pub fn patch_attachment(board: &mut Board, id: &EntityId, patch: &AttachmentPatch) -> bool {
    edit_child::<Attachment>(board, id, |a| patch.would_change(a), |a| {
        patch.apply(a);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymboard_types::{CardDraft, LabelDraft, ListDraft};

    fn board() -> Board {
        let mut board = Board {
            id: "b1".into(),
            title: "Front desk".into(),
            description: None,
            color: "#000".into(),
            lists: Vec::new(),
        };
        for (i, name) in ["To Do", "Doing", "Done"].iter().enumerate() {
            let id = EntityId::confirmed(format!("l{i}"));
            insert_list(&mut board, ListDraft::new(*name).materialize(id, "b1".into(), i), i);
        }
        for i in 0..3 {
            let card = CardDraft::new(format!("card {i}")).materialize(
                EntityId::confirmed(format!("c{i}")),
                "l0".into(),
                i,
            );
            insert_card(&mut board, card, i);
        }
        board
    }

    fn ids(list: &List) -> Vec<String> {
        list.cards.iter().map(|c| c.id.to_string()).collect()
    }

    #[test]
    fn test_insert_clamps_and_reranks() {
        let mut b = board();
        let card = CardDraft::new("late").materialize(EntityId::temporary(1), "l0".into(), 99);
        assert!(insert_card(&mut b, card, 99));
        assert_eq!(ids(&b.lists[0]), ["c0", "c1", "c2", "temp-1"]);
        assert!(b.lists[0].cards.iter().enumerate().all(|(i, c)| c.position == i));
    }

    #[test]
    fn test_move_within_same_list() {
        let mut b = board();
        assert!(move_card(&mut b, &"c0".into(), &"l0".into(), 2));
        assert_eq!(ids(&b.lists[0]), ["c1", "c2", "c0"]);
    }

    #[test]
    fn test_move_to_unknown_list_keeps_card() {
        let mut b = board();
        assert!(!move_card(&mut b, &"c0".into(), &"nope".into(), 0));
        assert_eq!(ids(&b.lists[0]), ["c0", "c1", "c2"]);
    }

    #[test]
    fn test_move_only_copies_touched_lists() {
        let before = board();
        let mut after = before.clone();
        move_card(&mut after, &"c1".into(), &"l1".into(), 0);

        assert!(!Arc::ptr_eq(&before.lists[0], &after.lists[0]));
        assert!(!Arc::ptr_eq(&before.lists[1], &after.lists[1]));
        assert!(Arc::ptr_eq(&before.lists[2], &after.lists[2]));
        // c0 kept its slot and position, so it was never copied.
        assert!(Arc::ptr_eq(&before.lists[0].cards[0], &after.lists[0].cards[0]));
    }

    #[test]
    fn test_replace_list_keeps_slot_and_rewrites_children() {
        let mut b = board();
        let temp = EntityId::temporary(5);
        insert_list(&mut b, ListDraft::new("Later").materialize(temp.clone(), "b1".into(), 1), 1);
        let card = CardDraft::new("child").materialize(EntityId::temporary(6), temp.clone(), 0);
        insert_card(&mut b, card, 0);

        let confirmed = ListDraft::new("Later").materialize("l9".into(), "b1".into(), 7);
        assert!(replace_list(&mut b, &temp, confirmed));

        assert_eq!(b.lists[1].id, EntityId::confirmed("l9"));
        assert_eq!(b.lists[1].position, 1);
        assert_eq!(b.lists[1].cards[0].list_id, EntityId::confirmed("l9"));
        assert_eq!(b.lists.len(), 4);
    }

    #[test]
    fn test_replace_drops_duplicate_after_refetch() {
        let mut b = board();
        let temp = EntityId::temporary(1);
        let provisional = CardDraft::new("dup").materialize(temp.clone(), "l1".into(), 0);
        insert_card(&mut b, provisional, 0);
        let confirmed = CardDraft::new("dup").materialize("c9".into(), "l1".into(), 0);
        insert_card(&mut b, confirmed.clone(), 1);

        assert!(replace_card(&mut b, &temp, confirmed));
        assert_eq!(ids(&b.lists[1]), ["c9"]);
    }

    #[test]
    fn test_replace_card_fills_provisional_slot() {
        let mut b = board();
        let temp = EntityId::temporary(4);
        let provisional = CardDraft::new("Mop floors").materialize(temp.clone(), "l0".into(), 1);
        insert_card(&mut b, provisional, 1);
        add_child(&mut b, LabelDraft::new("cleaning").materialize(EntityId::temporary(5), temp.clone()));

        let confirmed = CardDraft::new("Mop floors").materialize("c9".into(), "l0".into(), 3);
        assert!(replace_card(&mut b, &temp, confirmed));

        assert_eq!(ids(&b.lists[0]), ["c0", "c9", "c1", "c2"]);
        let card = b.card(&"c9".into()).expect("confirmed card");
        assert_eq!(card.position, 1);
        assert_eq!(card.labels.len(), 1);
        assert_eq!(card.labels[0].card_id, EntityId::confirmed("c9"));
        assert!(b.card(&temp).is_none());
    }

    #[test]
    fn test_reorder_lists_ignores_unknown_ids() {
        let mut b = board();
        let order: [EntityId; 3] = ["l2".into(), "zz".into(), "l0".into()];
        assert!(reorder_lists(&mut b, &order));
        let got: Vec<String> = b.lists.iter().map(|l| l.id.to_string()).collect();
        assert_eq!(got, ["l2", "l0", "l1"]);
        assert!(!reorder_lists(&mut b, &order));
    }

    #[test]
    fn test_reorder_cards() {
        let mut b = board();
        assert!(reorder_cards(&mut b, &"l0".into(), &[EntityId::from("c2"), EntityId::from("c0")]));
        assert_eq!(ids(&b.lists[0]), ["c2", "c0", "c1"]);
    }

    #[test]
    fn test_child_replace_in_place() {
        let mut b = board();
        let temp = EntityId::temporary(3);
        add_child(&mut b, LabelDraft::new("cardio").materialize(temp.clone(), "c1".into()));
        add_child(&mut b, LabelDraft::new("legs").materialize("lb2".into(), "c1".into()));

        let confirmed = LabelDraft::new("cardio").materialize("lb1".into(), "c1".into());
        assert!(replace_child(&mut b, &temp, confirmed));

        let card = b.card(&"c1".into()).unwrap();
        let names: Vec<String> = card.labels.iter().map(|l| l.id.to_string()).collect();
        assert_eq!(names, ["lb1", "lb2"]);
        assert!(remove_child::<Label>(&mut b, &"lb1".into()));
        assert_eq!(b.card(&"c1".into()).unwrap().labels.len(), 1);
    }

    #[test]
    fn test_child_patch_skips_no_op() {
        let mut b = board();
        add_child(&mut b, LabelDraft::new("cardio").materialize("lb1".into(), "c2".into()));
        let before = b.clone();

        let same = LabelPatch { name: Some("cardio".into()), ..Default::default() };
        assert!(!patch_label(&mut b, &"lb1".into(), &same));
        assert!(Arc::ptr_eq(&before.lists[0], &b.lists[0]));

        let renamed = LabelPatch { name: Some("hiit".into()), ..Default::default() };
        assert!(patch_label(&mut b, &"lb1".into(), &renamed));
        assert_eq!(b.card(&"c2".into()).unwrap().labels[0].name, "hiit");
        assert!(Arc::ptr_eq(&before.lists[0].cards[0], &b.lists[0].cards[0]));
        assert!(!patch_label(&mut b, &"missing".into(), &renamed));
    }
}
