//! Field patches for update verbs.
//!
//! `None` leaves a field alone. Applying a patch is idempotent: the second
//! application finds every field already equal and changes nothing. Patches
//! serialize as camelCase PATCH bodies with unset fields omitted.
//!
//! Optional entity fields (descriptions, due dates) are patched through a
//! [`Clearable`]: `Some(None)` clears the field and goes on the wire as
//! `null`, while `None` leaves it untouched and is omitted.
//!
//! `from_*` builds a patch carrying every scalar field of an entity, which is
//! how a server response gets folded over local state without touching child
//! collections. An absent optional field in the response folds as a clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::board::{Attachment, Board, Card, Comment, Label, List, Priority};

/// Patch slot for an optional field: `None` = keep, `Some(None)` = clear.
pub type Clearable<T> = Option<Option<T>>;

/// Read an explicit `null` as a clear rather than as an absent field.
fn clearable<'de, D, T>(deserializer: D) -> Result<Clearable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Assign `value` to `slot` if set and different. Returns whether it changed.
fn assign<T: PartialEq + Clone>(slot: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(v) if slot != v => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

/// Like [`assign`] for optional fields, where `Some(None)` clears the slot.
fn assign_opt<T: PartialEq + Clone>(slot: &mut Option<T>, value: &Clearable<T>) -> bool {
    match value {
        Some(v) if slot != v => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

/// `to` if it differs from `from`.
fn changed<T: PartialEq + Clone>(from: &T, to: &T) -> Option<T> {
    (from != to).then(|| to.clone())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
    pub description: Clearable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl BoardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Default::default() }
    }

    pub fn description(description: Option<String>) -> Self {
        Self { description: Some(description), ..Default::default() }
    }

    pub fn from_board(board: &Board) -> Self {
        Self {
            title: Some(board.title.clone()),
            description: Some(board.description.clone()),
            color: Some(board.color.clone()),
        }
    }

    /// The fields that differ between two copies of a board, set to `to`'s.
    pub fn between(from: &Board, to: &Board) -> Self {
        Self {
            title: changed(&from.title, &to.title),
            description: changed(&from.description, &to.description),
            color: changed(&from.color, &to.color),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.color.is_none()
    }

    pub fn apply(&self, board: &mut Board) -> bool {
        let mut changed = assign(&mut board.title, &self.title);
        changed |= assign_opt(&mut board.description, &self.description);
        changed |= assign(&mut board.color, &self.color);
        changed
    }

    /// Whether applying would change anything.
    pub fn would_change(&self, board: &Board) -> bool {
        self.apply(&mut board.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ListPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()) }
    }

    pub fn from_list(list: &List) -> Self {
        Self { title: Some(list.title.clone()) }
    }

    pub fn between(from: &List, to: &List) -> Self {
        Self { title: changed(&from.title, &to.title) }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }

    pub fn apply(&self, list: &mut List) -> bool {
        assign(&mut list.title, &self.title)
    }

    pub fn would_change(&self, list: &List) -> bool {
        self.title.as_ref().is_some_and(|t| t != &list.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
    pub description: Clearable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "clearable")]
    pub due_date: Clearable<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Default::default() }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self { description: Some(Some(description.into())), ..Default::default() }
    }

    pub fn clear_description() -> Self {
        Self { description: Some(None), ..Default::default() }
    }

    pub fn due_date(due_date: Option<DateTime<Utc>>) -> Self {
        Self { due_date: Some(due_date), ..Default::default() }
    }

    pub fn priority(priority: Priority) -> Self {
        Self { priority: Some(priority), ..Default::default() }
    }

    pub fn completed(completed: bool) -> Self {
        Self { completed: Some(completed), ..Default::default() }
    }

    pub fn from_card(card: &Card) -> Self {
        Self {
            title: Some(card.title.clone()),
            description: Some(card.description.clone()),
            priority: Some(card.priority),
            due_date: Some(card.due_date),
            completed: Some(card.completed),
        }
    }

    pub fn between(from: &Card, to: &Card) -> Self {
        Self {
            title: changed(&from.title, &to.title),
            description: changed(&from.description, &to.description),
            priority: changed(&from.priority, &to.priority),
            due_date: changed(&from.due_date, &to.due_date),
            completed: changed(&from.completed, &to.completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }

    pub fn apply(&self, card: &mut Card) -> bool {
        let mut changed = assign(&mut card.title, &self.title);
        changed |= assign_opt(&mut card.description, &self.description);
        changed |= assign(&mut card.priority, &self.priority);
        changed |= assign_opt(&mut card.due_date, &self.due_date);
        changed |= assign(&mut card.completed, &self.completed);
        changed
    }

    pub fn would_change(&self, card: &Card) -> bool {
        self.title.as_ref().is_some_and(|v| v != &card.title)
            || self.description.as_ref().is_some_and(|v| v != &card.description)
            || self.priority.is_some_and(|v| v != card.priority)
            || self.due_date.is_some_and(|v| v != card.due_date)
            || self.completed.is_some_and(|v| v != card.completed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl LabelPatch {
    pub fn from_label(label: &Label) -> Self {
        Self { name: Some(label.name.clone()), color: Some(label.color.clone()) }
    }

    pub fn apply(&self, label: &mut Label) -> bool {
        let mut changed = assign(&mut label.name, &self.name);
        changed |= assign(&mut label.color, &self.color);
        changed
    }

    pub fn would_change(&self, label: &Label) -> bool {
        self.name.as_ref().is_some_and(|v| v != &label.name)
            || self.color.as_ref().is_some_and(|v| v != &label.color)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Server-owned; never sent, only folded back from responses.
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommentPatch {
    pub fn from_comment(comment: &Comment) -> Self {
        Self { content: Some(comment.content.clone()), updated_at: Some(comment.updated_at) }
    }

    pub fn apply(&self, comment: &mut Comment) -> bool {
        let mut changed = assign(&mut comment.content, &self.content);
        changed |= assign(&mut comment.updated_at, &self.updated_at);
        changed
    }

    pub fn would_change(&self, comment: &Comment) -> bool {
        self.content.as_ref().is_some_and(|v| v != &comment.content)
            || self.updated_at.is_some_and(|v| v != comment.updated_at)
    }
}

/// Renames an attachment. Everything else about it is fixed at upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AttachmentPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }

    pub fn apply(&self, attachment: &mut Attachment) -> bool {
        assign(&mut attachment.name, &self.name)
    }

    pub fn would_change(&self, attachment: &Attachment) -> bool {
        self.name.as_ref().is_some_and(|v| v != &attachment.name)
    }
}
