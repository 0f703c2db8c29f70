//! Drafts: what a caller supplies to create an entity.
//!
//! A draft knows how to materialize a complete provisional entity for a given
//! id, filling every field the remote store would otherwise own with a local
//! default (empty child collections, current timestamps, default colours).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{
    Attachment, Board, Card, Comment, DEFAULT_BOARD_COLOR, DEFAULT_LABEL_COLOR, Label, List,
    Priority,
};
use crate::ids::EntityId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardDraft {
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl BoardDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub fn materialize(&self, id: EntityId) -> Board {
        Board {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone().unwrap_or_else(|| DEFAULT_BOARD_COLOR.to_string()),
            lists: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListDraft {
    pub title: String,
    /// Insert position; `None` appends.
    pub position: Option<usize>,
}

impl ListDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), position: None }
    }

    pub fn materialize(&self, id: EntityId, board_id: EntityId, position: usize) -> List {
        List { id, title: self.title.clone(), position, board_id, cards: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    /// Insert position; `None` appends.
    pub position: Option<usize>,
}

impl CardDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn materialize(&self, id: EntityId, list_id: EntityId, position: usize) -> Card {
        Card {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            position,
            priority: self.priority.unwrap_or_default(),
            due_date: self.due_date,
            completed: false,
            list_id,
            labels: Vec::new(),
            comments: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDraft {
    pub name: String,
    pub color: Option<String>,
}

impl LabelDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), color: None }
    }

    pub fn materialize(&self, id: EntityId, card_id: EntityId) -> Label {
        Label {
            id,
            name: self.name.clone(),
            color: self.color.clone().unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
            card_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub content: String,
}

impl CommentDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    pub fn materialize(&self, id: EntityId, card_id: EntityId, now: DateTime<Utc>) -> Comment {
        Comment { id, content: self.content.clone(), card_id, created_at: now, updated_at: now }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDraft {
    pub name: String,
    pub url: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

impl AttachmentDraft {
    pub fn materialize(&self, id: EntityId, card_id: EntityId) -> Attachment {
        Attachment {
            id,
            name: self.name.clone(),
            url: self.url.clone(),
            size: self.size,
            content_type: self.content_type.clone(),
            card_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_draft_provisional_defaults() {
        let card = CardDraft::new("Buy weights").materialize(
            EntityId::temporary(1),
            EntityId::confirmed("list-42"),
            0,
        );
        assert_eq!(card.priority, Priority::Low);
        assert!(!card.completed);
        assert!(card.labels.is_empty() && card.comments.is_empty() && card.attachments.is_empty());
        assert_eq!(card.list_id, EntityId::confirmed("list-42"));
    }

    #[test]
    fn test_comment_draft_stamps_both_timestamps() {
        let now = Utc::now();
        let comment = CommentDraft::new("Looks good").materialize(
            EntityId::temporary(2),
            EntityId::confirmed("card-1"),
            now,
        );
        assert_eq!(comment.created_at, now);
        assert_eq!(comment.updated_at, now);
    }
}
