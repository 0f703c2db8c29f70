//! The remote board store as seen by the controller.
//!
//! [`BoardTransport`] has one method per remote verb. Every id argument is a
//! confirmed remote id as `&str`; callers obtain it through
//! [`EntityId::as_confirmed`](gymboard_types::EntityId::as_confirmed), so a
//! temporary id has no way to reach an implementation.
//!
//! Implementations return entities with every child collection present
//! (possibly empty), never absent.

use async_trait::async_trait;
use gymboard_types::{
    Attachment, Board, BoardPatch, Card, CardPatch, Comment, Label, List, ListPatch, Priority,
    Timestamp,
};
use serde::Serialize;
use thiserror::Error;

/// A failed remote call: unreachable, timed out, or a non-success status.
///
/// Carries one human-readable message. No retry is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
}

impl From<&Board> for CreateBoard {
    fn from(board: &Board) -> Self {
        Self {
            title: board.title.clone(),
            description: board.description.clone(),
            color: board.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateList {
    pub title: String,
    pub position: usize,
    pub board_id: String,
}

impl CreateList {
    /// Body for a provisional list whose board is `board_id` remotely.
    pub fn new(list: &List, board_id: &str) -> Self {
        Self { title: list.title.clone(), position: list.position, board_id: board_id.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCard {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: usize,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Timestamp>,
    pub list_id: String,
}

impl CreateCard {
    /// Body for a provisional card whose list is `list_id` remotely.
    pub fn new(card: &Card, list_id: &str) -> Self {
        Self {
            title: card.title.clone(),
            description: card.description.clone(),
            position: card.position,
            priority: card.priority,
            due_date: card.due_date,
            list_id: list_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateLabel {
    pub name: String,
    pub color: String,
}

impl From<&Label> for CreateLabel {
    fn from(label: &Label) -> Self {
        Self { name: label.name.clone(), color: label.color.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateComment {
    pub content: String,
}

impl From<&Comment> for CreateComment {
    fn from(comment: &Comment) -> Self {
        Self { content: comment.content.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAttachment {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<&Attachment> for CreateAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            name: attachment.name.clone(),
            url: attachment.url.clone(),
            size: attachment.size,
            content_type: attachment.content_type.clone(),
        }
    }
}

// ============================================================================
// Transport trait
// ============================================================================

/// One method per remote verb.
///
/// Methods take `&self` and must be safe to call concurrently; the
/// controller keeps several calls in flight at once.
#[async_trait]
pub trait BoardTransport: Send + Sync {
    /// Board summaries. Lists may be absent or partial.
    async fn list_boards(&self) -> TransportResult<Vec<Board>>;
    /// The full aggregate: lists, cards and card children.
    async fn get_board(&self, id: &str) -> TransportResult<Board>;
    async fn create_board(&self, body: &CreateBoard) -> TransportResult<Board>;
    async fn update_board(&self, id: &str, patch: &BoardPatch) -> TransportResult<Board>;
    async fn delete_board(&self, id: &str) -> TransportResult<()>;

    async fn create_list(&self, body: &CreateList) -> TransportResult<List>;
    async fn update_list(&self, id: &str, patch: &ListPatch) -> TransportResult<List>;
    async fn delete_list(&self, id: &str) -> TransportResult<()>;
    async fn reorder_lists(&self, board_id: &str, list_ids: &[String]) -> TransportResult<()>;

    async fn create_card(&self, body: &CreateCard) -> TransportResult<Card>;
    async fn update_card(&self, id: &str, patch: &CardPatch) -> TransportResult<Card>;
    async fn delete_card(&self, id: &str) -> TransportResult<()>;
    async fn move_card(&self, id: &str, list_id: &str, position: usize) -> TransportResult<()>;
    async fn reorder_cards(&self, list_id: &str, card_ids: &[String]) -> TransportResult<()>;

    async fn add_label(&self, card_id: &str, body: &CreateLabel) -> TransportResult<Label>;
    async fn delete_label(&self, id: &str) -> TransportResult<()>;

    async fn add_comment(&self, card_id: &str, body: &CreateComment) -> TransportResult<Comment>;
    async fn delete_comment(&self, id: &str) -> TransportResult<()>;

    async fn add_attachment(
        &self,
        card_id: &str,
        body: &CreateAttachment,
    ) -> TransportResult<Attachment>;
    async fn delete_attachment(&self, id: &str) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymboard_types::{AttachmentDraft, CardDraft, EntityId, LabelDraft};

    #[test]
    fn test_create_card_body_wire_form() {
        let card = CardDraft::new("Buy weights").materialize(EntityId::temporary(1), "list-42".into(), 0);
        let json = serde_json::to_value(CreateCard::new(&card, "list-42")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Buy weights",
                "position": 0,
                "priority": "LOW",
                "listId": "list-42",
            })
        );
    }

    #[test]
    fn test_label_body_carries_default_colour() {
        let label = LabelDraft::new("cardio").materialize(EntityId::temporary(2), "c1".into());
        let body = CreateLabel::from(&label);
        assert_eq!(body.color, gymboard_types::DEFAULT_LABEL_COLOR);
    }

    #[test]
    fn test_attachment_body_renames_type() {
        let draft = AttachmentDraft {
            name: "waiver.pdf".into(),
            url: "https://files.example/waiver.pdf".into(),
            size: Some(2048),
            content_type: Some("application/pdf".into()),
        };
        let attachment = draft.materialize(EntityId::temporary(3), "c1".into());
        let json = serde_json::to_value(CreateAttachment::from(&attachment)).unwrap();
        assert_eq!(json["type"], "application/pdf");
        assert!(json.get("contentType").is_none());
    }
}
