//! Board aggregate: boards, lists, cards and the things hanging off cards.
//!
//! Lists and cards are held behind `Arc` so a state transition can rebuild
//! only the branch it touches and leave every other subtree pointer-equal to
//! the previous state. Use `Arc::make_mut` to edit a node in place.
//!
//! Field names are camelCase on the wire. Child collections default to empty
//! when absent, and `position` is the node's index within its parent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids::EntityId;

/// Colour given to boards created without one.
pub const DEFAULT_BOARD_COLOR: &str = "#3b82f6";

/// Colour given to labels created without one.
pub const DEFAULT_LABEL_COLOR: &str = "#6b7280";

fn default_board_color() -> String {
    DEFAULT_BOARD_COLOR.to_string()
}

fn default_label_color() -> String {
    DEFAULT_LABEL_COLOR.to_string()
}

/// Card priority.
#[derive(
    Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Display, EnumString,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
}

/// A board and, when loaded as an aggregate, its full tree of lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_board_color")]
    pub color: String,
    #[serde(default)]
    pub lists: Vec<Arc<List>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub position: usize,
    pub board_id: EntityId,
    #[serde(default)]
    pub cards: Vec<Arc<Card>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    pub list_id: EntityId,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: EntityId,
    pub name: String,
    #[serde(default = "default_label_color")]
    pub color: String,
    pub card_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: EntityId,
    pub content: String,
    pub card_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: EntityId,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub card_id: EntityId,
}

// ── Lookups ─────────────────────────────────────────────────────────────────

/// Where a card sits inside a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLocation {
    pub list_index: usize,
    pub card_index: usize,
}

impl Board {
    pub fn list(&self, id: &EntityId) -> Option<&List> {
        self.lists.iter().find(|l| &l.id == id).map(|l| l.as_ref())
    }

    pub fn list_index(&self, id: &EntityId) -> Option<usize> {
        self.lists.iter().position(|l| &l.id == id)
    }

    /// Scan every list for the card.
    pub fn locate_card(&self, id: &EntityId) -> Option<CardLocation> {
        self.lists.iter().enumerate().find_map(|(list_index, list)| {
            list.card_index(id).map(|card_index| CardLocation { list_index, card_index })
        })
    }

    pub fn card(&self, id: &EntityId) -> Option<&Card> {
        self.locate_card(id)
            .map(|loc| self.lists[loc.list_index].cards[loc.card_index].as_ref())
    }

    /// The card owning a label, comment or attachment with this id.
    pub fn card_owning(&self, child: &EntityId) -> Option<&Card> {
        self.cards().find(|card| card.owns(child))
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.lists.iter().flat_map(|l| l.cards.iter().map(|c| c.as_ref()))
    }

    /// Every id in the aggregate except the board's own.
    pub fn descendant_ids(&self) -> Vec<EntityId> {
        self.lists
            .iter()
            .flat_map(|l| std::iter::once(l.id.clone()).chain(l.descendant_ids()))
            .collect()
    }

    /// Whether any node of the tree carries this id.
    pub fn contains(&self, id: &EntityId) -> bool {
        &self.id == id
            || self
                .lists
                .iter()
                .any(|l| &l.id == id || l.cards.iter().any(|c| &c.id == id || c.owns(id)))
    }
}

impl List {
    pub fn card_index(&self, id: &EntityId) -> Option<usize> {
        self.cards.iter().position(|c| &c.id == id)
    }

    pub fn descendant_ids(&self) -> Vec<EntityId> {
        self.cards
            .iter()
            .flat_map(|c| std::iter::once(c.id.clone()).chain(c.child_ids()))
            .collect()
    }
}

impl Card {
    /// Whether a label, comment or attachment with this id hangs off the card.
    pub fn owns(&self, child: &EntityId) -> bool {
        self.labels.iter().any(|l| &l.id == child)
            || self.comments.iter().any(|c| &c.id == child)
            || self.attachments.iter().any(|a| &a.id == child)
    }

    pub fn child_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.labels
            .iter()
            .map(|l| l.id.clone())
            .chain(self.comments.iter().map(|c| c.id.clone()))
            .chain(self.attachments.iter().map(|a| a.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_defaults_when_fields_absent() {
        let card: Card = serde_json::from_value(serde_json::json!({
            "id": "card-1",
            "title": "Deadlift form check",
            "listId": "list-1",
        }))
        .unwrap();

        assert_eq!(card.priority, Priority::Low);
        assert!(!card.completed);
        assert!(card.labels.is_empty());
        assert!(card.comments.is_empty());
        assert!(card.attachments.is_empty());
    }

    #[test]
    fn test_priority_wire_form() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"URGENT\"");
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn test_attachment_type_field_rename() {
        let att: Attachment = serde_json::from_value(serde_json::json!({
            "id": "att-1",
            "name": "plan.pdf",
            "url": "https://files.example/plan.pdf",
            "type": "application/pdf",
            "cardId": "card-1",
        }))
        .unwrap();
        assert_eq!(att.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(att.size, None);
    }

    #[test]
    fn test_locate_card_scans_all_lists() {
        let board: Board = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "title": "Front desk",
            "lists": [
                { "id": "l1", "title": "To Do", "boardId": "b1", "cards": [] },
                { "id": "l2", "title": "Done", "position": 1, "boardId": "b1", "cards": [
                    { "id": "c1", "title": "Mop floor", "listId": "l2" }
                ]},
            ],
        }))
        .unwrap();

        let loc = board.locate_card(&"c1".into()).unwrap();
        assert_eq!(loc, CardLocation { list_index: 1, card_index: 0 });
        assert!(board.contains(&"l1".into()));
        assert_eq!(board.descendant_ids().len(), 3);
        assert_eq!(board.color, DEFAULT_BOARD_COLOR);
    }
}
