//! [`BoardTransport`] over the REST surface of the remote board store.
//!
//! Responses are normalized as raw JSON before they are decoded: the store
//! omits or nulls empty child collections, and the board types expect them
//! to be arrays.

use async_trait::async_trait;
use gymboard_types::{
    Attachment, Board, BoardPatch, Card, CardPatch, Comment, Label, List, ListPatch,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::transport::{
    BoardTransport, CreateAttachment, CreateBoard, CreateCard, CreateComment, CreateLabel,
    CreateList, TransportError, TransportResult,
};

// ============================================================================
// Response normalization
// ============================================================================

/// Make `obj[key]` an array, replacing a missing or `null` (or otherwise
/// non-array) value with `[]`.
fn ensure_array<'a>(obj: &'a mut Map<String, Value>, key: &str) -> &'a mut Value {
    let slot = obj.entry(key).or_insert(Value::Null);
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    slot
}

pub fn normalize_card(card: &mut Value) {
    if let Some(obj) = card.as_object_mut() {
        for key in ["labels", "comments", "attachments"] {
            ensure_array(obj, key);
        }
    }
}

pub fn normalize_list(list: &mut Value) {
    if let Some(obj) = list.as_object_mut() {
        if let Value::Array(cards) = ensure_array(obj, "cards") {
            cards.iter_mut().for_each(normalize_card);
        }
    }
}

pub fn normalize_board(board: &mut Value) {
    if let Some(obj) = board.as_object_mut() {
        if let Value::Array(lists) = ensure_array(obj, "lists") {
            lists.iter_mut().for_each(normalize_list);
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> TransportResult<T> {
    serde_json::from_value(value)
        .map_err(|e| TransportError::new(format!("unexpected response shape: {e}")))
}

/// One message for a non-success response: the status plus whatever the
/// body says. JSON bodies contribute their `message` or `error` field.
fn failure_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string());
    if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    }
}

// ============================================================================
// HttpTransport
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> TransportResult<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::new(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| TransportError::new(format!("invalid base URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::new(format!("base URL {base_url} cannot take a path")));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The base URL with `segments` appended as path segments. Each segment
    /// is percent-encoded, so an id can't add segments or a query.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, builder: RequestBuilder) -> TransportResult<Response> {
        let request = builder
            .build()
            .map_err(|e| TransportError::new(format!("invalid request: {e}")))?;
        let (method, url) = (request.method().clone(), request.url().clone());
        debug!(%method, %url, "request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| TransportError::new(format!("{method} {url} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = failure_message(status, &body);
        warn!(%method, %url, %status, "remote store rejected request");
        Err(TransportError::new(message))
    }

    async fn fetch_json(&self, builder: RequestBuilder) -> TransportResult<Value> {
        self.send(builder)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| TransportError::new(format!("invalid JSON response: {e}")))
    }

    async fn fetch_board(&self, builder: RequestBuilder) -> TransportResult<Board> {
        let mut value = self.fetch_json(builder).await?;
        normalize_board(&mut value);
        decode(value)
    }

    async fn fetch_list(&self, builder: RequestBuilder) -> TransportResult<List> {
        let mut value = self.fetch_json(builder).await?;
        normalize_list(&mut value);
        decode(value)
    }

    async fn fetch_card(&self, builder: RequestBuilder) -> TransportResult<Card> {
        let mut value = self.fetch_json(builder).await?;
        normalize_card(&mut value);
        decode(value)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> TransportResult<T> {
        decode(self.fetch_json(builder).await?)
    }

    async fn execute(&self, builder: RequestBuilder) -> TransportResult<()> {
        self.send(builder).await.map(drop)
    }
}

#[async_trait]
impl BoardTransport for HttpTransport {
    async fn list_boards(&self) -> TransportResult<Vec<Board>> {
        let mut value = self.fetch_json(self.client.get(self.url(&["boards"]))).await?;
        if let Some(boards) = value.as_array_mut() {
            boards.iter_mut().for_each(normalize_board);
        }
        decode(value)
    }

    async fn get_board(&self, id: &str) -> TransportResult<Board> {
        self.fetch_board(self.client.get(self.url(&["boards", id]))).await
    }

    async fn create_board(&self, body: &CreateBoard) -> TransportResult<Board> {
        self.fetch_board(self.client.post(self.url(&["boards"])).json(body)).await
    }

    async fn update_board(&self, id: &str, patch: &BoardPatch) -> TransportResult<Board> {
        self.fetch_board(self.client.patch(self.url(&["boards", id])).json(patch)).await
    }

    async fn delete_board(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["boards", id]))).await
    }

    async fn create_list(&self, body: &CreateList) -> TransportResult<List> {
        self.fetch_list(self.client.post(self.url(&["lists"])).json(body)).await
    }

    async fn update_list(&self, id: &str, patch: &ListPatch) -> TransportResult<List> {
        self.fetch_list(self.client.patch(self.url(&["lists", id])).json(patch)).await
    }

    async fn delete_list(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["lists", id]))).await
    }

    async fn reorder_lists(&self, board_id: &str, list_ids: &[String]) -> TransportResult<()> {
        let url = self.url(&["boards", board_id, "lists", "reorder"]);
        self.execute(self.client.put(url).json(&json!({ "listIds": list_ids }))).await
    }

    async fn create_card(&self, body: &CreateCard) -> TransportResult<Card> {
        self.fetch_card(self.client.post(self.url(&["cards"])).json(body)).await
    }

    async fn update_card(&self, id: &str, patch: &CardPatch) -> TransportResult<Card> {
        self.fetch_card(self.client.patch(self.url(&["cards", id])).json(patch)).await
    }

    async fn delete_card(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["cards", id]))).await
    }

    async fn move_card(&self, id: &str, list_id: &str, position: usize) -> TransportResult<()> {
        let url = self.url(&["cards", id, "move"]);
        let body = json!({ "listId": list_id, "position": position });
        self.execute(self.client.patch(url).json(&body)).await
    }

    async fn reorder_cards(&self, list_id: &str, card_ids: &[String]) -> TransportResult<()> {
        let url = self.url(&["lists", list_id, "cards", "reorder"]);
        self.execute(self.client.put(url).json(&json!({ "cardIds": card_ids }))).await
    }

    async fn add_label(&self, card_id: &str, body: &CreateLabel) -> TransportResult<Label> {
        let url = self.url(&["cards", card_id, "labels"]);
        self.fetch(self.client.post(url).json(body)).await
    }

    async fn delete_label(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["labels", id]))).await
    }

    async fn add_comment(&self, card_id: &str, body: &CreateComment) -> TransportResult<Comment> {
        let url = self.url(&["cards", card_id, "comments"]);
        self.fetch(self.client.post(url).json(body)).await
    }

    async fn delete_comment(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["comments", id]))).await
    }

    async fn add_attachment(
        &self,
        card_id: &str,
        body: &CreateAttachment,
    ) -> TransportResult<Attachment> {
        let url = self.url(&["cards", card_id, "attachments"]);
        self.fetch(self.client.post(url).json(body)).await
    }

    async fn delete_attachment(&self, id: &str) -> TransportResult<()> {
        self.execute(self.client.delete(self.url(&["attachments", id]))).await
    }
}
