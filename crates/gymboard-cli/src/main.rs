//! gymboard command-line client
//!
//! Drives the optimistic controller against the HTTP board store, one
//! subcommand per verb.
//!
//! ## Usage
//!
//! ```bash
//! gymboard boards
//! gymboard show board-1
//! gymboard create-card board-1 list-1 "Buy weights" --priority high
//! gymboard move-card board-1 card-7 list-2 --position 0
//! gymboard --base-url http://gym.local/api edit-card board-1 card-7 --completed true
//! ```
//!
//! The base URL comes from `--base-url`, then `GYMBOARD_BASE_URL`, then the
//! config file (`--config`, default `~/.config/gymboard/config.ron`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gymboard_client::{BoardController, ClientConfig, HttpTransport};
use gymboard_types::{
    AttachmentDraft, Board, BoardDraft, BoardPatch, CardDraft, CardPatch, CommentDraft, EntityId,
    LabelDraft, ListDraft, ListPatch, Priority,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gymboard", version, about = "Kanban boards for the gym")]
struct Cli {
    /// Config file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Board store base URL, overriding config and environment
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List boards
    Boards,
    /// Print a board with its lists and cards
    Show { board: String },

    CreateBoard {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Hex colour, e.g. "#22c55e"
        #[arg(long)]
        color: Option<String>,
    },
    RenameBoard { board: String, title: String },
    DeleteBoard { board: String },

    CreateList {
        board: String,
        title: String,
        /// Insert position (default: append)
        #[arg(long)]
        position: Option<usize>,
    },
    RenameList { board: String, list: String, title: String },
    DeleteList { board: String, list: String },
    /// Put lists in the given order; unnamed lists follow
    ReorderLists { board: String, lists: Vec<String> },

    CreateCard {
        board: String,
        list: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, medium, high or urgent
        #[arg(long)]
        priority: Option<Priority>,
    },
    EditCard {
        board: String,
        card: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Remove the description
        #[arg(long, conflicts_with = "description")]
        clear_description: bool,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        completed: Option<bool>,
    },
    MoveCard {
        board: String,
        card: String,
        list: String,
        #[arg(long, default_value_t = 0)]
        position: usize,
    },
    DeleteCard { board: String, card: String },
    /// Put a list's cards in the given order; unnamed cards follow
    ReorderCards { board: String, list: String, cards: Vec<String> },

    Label {
        board: String,
        card: String,
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Unlabel { board: String, label: String },
    Comment { board: String, card: String, text: String },
    Uncomment { board: String, comment: String },
    Attach {
        board: String,
        card: String,
        name: String,
        url: String,
        #[arg(long)]
        size: Option<u64>,
        /// MIME type
        #[arg(long = "type")]
        content_type: Option<String>,
    },
    Detach { board: String, attachment: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn id(raw: &str) -> EntityId {
    EntityId::from(raw)
}

fn ids(raw: &[String]) -> Vec<EntityId> {
    raw.iter().map(|s| id(s)).collect()
}

fn config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(cli.config.as_deref())?
        .apply_env(|key| std::env::var(key).ok())?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone())?;
    }
    Ok(config)
}

/// Load `board` as the current aggregate so later verbs can find it.
async fn open(controller: &BoardController<HttpTransport>, board: &str) -> anyhow::Result<EntityId> {
    let board_id = id(board);
    controller
        .load_board(&board_id)
        .await
        .with_context(|| format!("loading board {board}"))?;
    Ok(board_id)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config(&cli)?;
    tracing::debug!(base_url = %config.base_url, "using board store");
    let controller = BoardController::new(HttpTransport::new(&config)?);
    let c = &controller;

    match cli.command {
        Command::Boards => {
            c.load_boards().await?;
            for board in c.snapshot().boards() {
                println!("{}\t{}", board.id, board.title);
            }
        }
        Command::Show { board } => {
            open(c, &board).await?;
            if let Some(board) = c.snapshot().current_board() {
                print_board(board);
            }
        }

        Command::CreateBoard { title, description, color } => {
            let draft = BoardDraft { title, description, color };
            println!("{}", c.create_board(draft).await?);
        }
        Command::RenameBoard { board, title } => {
            let board = open(c, &board).await?;
            c.update_board(&board, BoardPatch::title(title)).await?;
        }
        Command::DeleteBoard { board } => {
            let board = open(c, &board).await?;
            c.delete_board(&board).await?;
        }

        Command::CreateList { board, title, position } => {
            let board = open(c, &board).await?;
            let draft = ListDraft { title, position };
            println!("{}", c.create_list(&board, draft).await?);
        }
        Command::RenameList { board, list, title } => {
            open(c, &board).await?;
            c.update_list(&id(&list), ListPatch::title(title)).await?;
        }
        Command::DeleteList { board, list } => {
            open(c, &board).await?;
            c.delete_list(&id(&list)).await?;
        }
        Command::ReorderLists { board, lists } => {
            let board = open(c, &board).await?;
            c.reorder_lists(&board, &ids(&lists)).await?;
        }

        Command::CreateCard { board, list, title, description, priority } => {
            open(c, &board).await?;
            let draft = CardDraft { description, priority, ..CardDraft::new(title) };
            println!("{}", c.create_card(&id(&list), draft).await?);
        }
        Command::EditCard { board, card, title, description, clear_description, priority, completed } => {
            open(c, &board).await?;
            let description = if clear_description { Some(None) } else { description.map(Some) };
            let patch = CardPatch { title, description, priority, completed, ..Default::default() };
            if patch.is_empty() {
                anyhow::bail!("nothing to change: pass --title, --description, --clear-description, --priority or --completed");
            }
            c.update_card(&id(&card), patch).await?;
        }
        Command::MoveCard { board, card, list, position } => {
            open(c, &board).await?;
            c.move_card(&id(&card), &id(&list), position).await?;
        }
        Command::DeleteCard { board, card } => {
            open(c, &board).await?;
            c.delete_card(&id(&card)).await?;
        }
        Command::ReorderCards { board, list, cards } => {
            open(c, &board).await?;
            c.reorder_cards(&id(&list), &ids(&cards)).await?;
        }

        Command::Label { board, card, name, color } => {
            open(c, &board).await?;
            let draft = LabelDraft { name, color };
            println!("{}", c.add_label(&id(&card), draft).await?);
        }
        Command::Unlabel { board, label } => {
            open(c, &board).await?;
            c.remove_label(&id(&label)).await?;
        }
        Command::Comment { board, card, text } => {
            open(c, &board).await?;
            println!("{}", c.add_comment(&id(&card), CommentDraft::new(text)).await?);
        }
        Command::Uncomment { board, comment } => {
            open(c, &board).await?;
            c.remove_comment(&id(&comment)).await?;
        }
        Command::Attach { board, card, name, url, size, content_type } => {
            open(c, &board).await?;
            let draft = AttachmentDraft { name, url, size, content_type };
            println!("{}", c.add_attachment(&id(&card), draft).await?);
        }
        Command::Detach { board, attachment } => {
            open(c, &board).await?;
            c.remove_attachment(&id(&attachment)).await?;
        }
    }
    Ok(())
}

fn print_board(board: &Board) {
    println!("{} ({})", board.title, board.id);
    if let Some(description) = &board.description {
        println!("  {description}");
    }
    for list in &board.lists {
        println!();
        println!("  {} ({}, {} cards)", list.title, list.id, list.cards.len());
        for card in &list.cards {
            let done = if card.completed { "x" } else { " " };
            let labels: Vec<String> = card.labels.iter().map(|l| format!("#{}", l.name)).collect();
            println!(
                "    [{done}] {} ({}) {} {}",
                card.title,
                card.id,
                card.priority,
                labels.join(" ")
            );
            if !card.comments.is_empty() || !card.attachments.is_empty() {
                println!(
                    "        {} comments, {} attachments",
                    card.comments.len(),
                    card.attachments.len()
                );
            }
        }
    }
}
