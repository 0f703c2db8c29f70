//! Scripted in-memory transport for controller and mirror tests.
//!
//! Records every call as `"<verb> <args>"`, fails the verbs it's told to,
//! hands out ids from a script (then `<kind>-<n>`), and serves a single
//! server-side board for `get_board`. Accepted list and card creates, moves
//! and card deletes are applied to that board. A gate can hold every call until the
//! test releases permits, which lets a test look at optimistic state while
//! a request is in flight.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gymboard_client::transport::{
    CreateAttachment, CreateBoard, CreateCard, CreateComment, CreateLabel, CreateList,
};
use gymboard_client::{BoardController, BoardTransport, TransportError, TransportResult};
use gymboard_store::paths;
use gymboard_types::{
    Attachment, Board, BoardDraft, BoardPatch, Card, CardDraft, CardPatch, Comment, EntityId,
    Label, List, ListDraft, ListPatch,
};
use tokio::sync::Semaphore;

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    ids: Mutex<VecDeque<String>>,
    counter: AtomicU64,
    board: Mutex<Option<Board>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `board` from `get_board` / `list_boards`.
    pub fn with_board(board: Board) -> Self {
        let transport = Self::new();
        *transport.script.board.lock().unwrap() = Some(board);
        transport
    }

    /// Make every call to `verb` fail.
    pub fn fail(&self, verb: &'static str) {
        self.script.failing.lock().unwrap().insert(verb);
    }

    pub fn succeed(&self, verb: &'static str) {
        self.script.failing.lock().unwrap().remove(verb);
    }

    /// Next create returns this id.
    pub fn issue(&self, id: &str) {
        self.script.ids.lock().unwrap().push_back(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.script.calls.lock().unwrap().clear();
    }

    /// Hold every call from now on until permits are added to the returned
    /// semaphore (one permit per call).
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.script.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Let every call through again.
    pub fn open(&self) {
        if let Some(gate) = self.script.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Edit the server-side board directly.
    pub fn edit_server(&self, edit: impl FnOnce(&mut Board)) {
        if let Some(board) = self.script.board.lock().unwrap().as_mut() {
            edit(board);
        }
    }

    /// Yield until at least `n` calls were recorded.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.calls().len() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} calls, saw {:?}", self.calls());
    }

    fn next_id(&self, kind: &str) -> String {
        self.script.ids.lock().unwrap().pop_front().unwrap_or_else(|| {
            format!("{kind}-{}", 100 + self.script.counter.fetch_add(1, Ordering::Relaxed))
        })
    }

    async fn enter(&self, call: String) -> TransportResult<()> {
        let verb = call.split(' ').next().unwrap_or_default().to_string();
        self.script.calls.lock().unwrap().push(call);
        let gate = self.script.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.script.failing.lock().unwrap().contains(verb.as_str()) {
            return Err(TransportError::new(format!("HTTP 500 Internal Server Error: {verb} rejected")));
        }
        Ok(())
    }

    fn server_board(&self) -> TransportResult<Board> {
        self.script
            .board
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::new("HTTP 404 Not Found"))
    }
}

#[async_trait]
impl BoardTransport for ScriptedTransport {
    async fn list_boards(&self) -> TransportResult<Vec<Board>> {
        self.enter("list_boards".into()).await?;
        let mut summary = self.server_board()?;
        summary.lists.clear();
        Ok(vec![summary])
    }

    async fn get_board(&self, id: &str) -> TransportResult<Board> {
        self.enter(format!("get_board {id}")).await?;
        let board = self.server_board()?;
        if board.id.as_confirmed() == Some(id) {
            Ok(board)
        } else {
            Err(TransportError::new("HTTP 404 Not Found"))
        }
    }

    async fn create_board(&self, body: &CreateBoard) -> TransportResult<Board> {
        self.enter(format!("create_board {}", body.title)).await?;
        Ok(Board {
            id: self.next_id("board").into(),
            title: body.title.clone(),
            description: body.description.clone(),
            color: body.color.clone(),
            lists: Vec::new(),
        })
    }

    async fn update_board(&self, id: &str, patch: &BoardPatch) -> TransportResult<Board> {
        self.enter(format!("update_board {id}")).await?;
        let mut board = self.server_board()?;
        patch.apply(&mut board);
        Ok(board)
    }

    async fn delete_board(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_board {id}")).await
    }

    async fn create_list(&self, body: &CreateList) -> TransportResult<List> {
        self.enter(format!("create_list {} {}", body.title, body.board_id)).await?;
        let list = List {
            id: self.next_id("list").into(),
            title: body.title.clone(),
            position: body.position,
            board_id: body.board_id.as_str().into(),
            cards: Vec::new(),
        };
        self.edit_server(|board| {
            if board.id == list.board_id {
                paths::insert_list(board, list.clone(), list.position);
            }
        });
        Ok(list)
    }

    async fn update_list(&self, id: &str, patch: &ListPatch) -> TransportResult<List> {
        self.enter(format!("update_list {id}")).await?;
        let board = self.server_board()?;
        let mut list = board
            .list(&id.into())
            .cloned()
            .ok_or_else(|| TransportError::new("HTTP 404 Not Found"))?;
        patch.apply(&mut list);
        Ok(list)
    }

    async fn delete_list(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_list {id}")).await
    }

    async fn reorder_lists(&self, board_id: &str, list_ids: &[String]) -> TransportResult<()> {
        self.enter(format!("reorder_lists {board_id} {}", list_ids.join(","))).await
    }

    async fn create_card(&self, body: &CreateCard) -> TransportResult<Card> {
        self.enter(format!("create_card {} {}", body.title, body.list_id)).await?;
        let card = Card {
            id: self.next_id("card").into(),
            title: body.title.clone(),
            description: body.description.clone(),
            position: body.position,
            priority: body.priority,
            due_date: body.due_date,
            completed: false,
            list_id: body.list_id.as_str().into(),
            labels: Vec::new(),
            comments: Vec::new(),
            attachments: Vec::new(),
        };
        self.edit_server(|board| {
            paths::insert_card(board, card.clone(), card.position);
        });
        Ok(card)
    }

    async fn update_card(&self, id: &str, patch: &CardPatch) -> TransportResult<Card> {
        self.enter(format!("update_card {id}")).await?;
        let mut board = self.server_board()?;
        let id: EntityId = id.into();
        paths::patch_card(&mut board, &id, patch);
        board.card(&id).cloned().ok_or_else(|| TransportError::new("HTTP 404 Not Found"))
    }

    async fn delete_card(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_card {id}")).await?;
        self.edit_server(|board| {
            paths::remove_card(board, &id.into());
        });
        Ok(())
    }

    async fn move_card(&self, id: &str, list_id: &str, position: usize) -> TransportResult<()> {
        self.enter(format!("move_card {id} {list_id} {position}")).await?;
        self.edit_server(|board| {
            paths::move_card(board, &id.into(), &list_id.into(), position);
        });
        Ok(())
    }

    async fn reorder_cards(&self, list_id: &str, card_ids: &[String]) -> TransportResult<()> {
        self.enter(format!("reorder_cards {list_id} {}", card_ids.join(","))).await
    }

    async fn add_label(&self, card_id: &str, body: &CreateLabel) -> TransportResult<Label> {
        self.enter(format!("add_label {card_id} {}", body.name)).await?;
        Ok(Label {
            id: self.next_id("label").into(),
            name: body.name.clone(),
            color: body.color.clone(),
            card_id: card_id.into(),
        })
    }

    async fn delete_label(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_label {id}")).await
    }

    async fn add_comment(&self, card_id: &str, body: &CreateComment) -> TransportResult<Comment> {
        self.enter(format!("add_comment {card_id}")).await?;
        let now = gymboard_types::now();
        Ok(Comment {
            id: self.next_id("comment").into(),
            content: body.content.clone(),
            card_id: card_id.into(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn delete_comment(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_comment {id}")).await
    }

    async fn add_attachment(
        &self,
        card_id: &str,
        body: &CreateAttachment,
    ) -> TransportResult<Attachment> {
        self.enter(format!("add_attachment {card_id} {}", body.name)).await?;
        Ok(Attachment {
            id: self.next_id("attachment").into(),
            name: body.name.clone(),
            url: body.url.clone(),
            size: body.size,
            content_type: body.content_type.clone(),
            card_id: card_id.into(),
        })
    }

    async fn delete_attachment(&self, id: &str) -> TransportResult<()> {
        self.enter(format!("delete_attachment {id}")).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Board `b1` with lists `l1` ("To Do": c1, c2) and `l2` ("Done": c3).
pub fn gym_board() -> Board {
    let mut board = BoardDraft::new("Front desk").materialize("b1".into());
    for (i, (id, title)) in [("l1", "To Do"), ("l2", "Done")].into_iter().enumerate() {
        paths::insert_list(&mut board, ListDraft::new(title).materialize(id.into(), "b1".into(), i), i);
    }
    for (id, title, list) in
        [("c1", "Restock towels", "l1"), ("c2", "Oil rowers", "l1"), ("c3", "Fix treadmill", "l2")]
    {
        let card = CardDraft::new(title).materialize(id.into(), list.into(), usize::MAX);
        paths::insert_card(&mut board, card, usize::MAX);
    }
    board
}

/// Board `b1` with no lists.
pub fn empty_board() -> Board {
    BoardDraft::new("Front desk").materialize("b1".into())
}

/// A controller whose cache already holds `board` as the current aggregate,
/// with the load call cleared from the log.
pub async fn loaded(board: Board) -> (BoardController<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::with_board(board);
    let controller = BoardController::new(transport.clone());
    controller.load_board(&"b1".into()).await.expect("initial load");
    transport.clear_calls();
    (controller, transport)
}

pub fn card_ids(board: &Board, list: &str) -> Vec<String> {
    board
        .list(&list.into())
        .map(|l| l.cards.iter().map(|c| c.id.to_string()).collect())
        .unwrap_or_default()
}
