//! Optimistic sync client for gymboard boards.
//!
//! Sits between a UI and the remote board store. Mutations are applied to
//! the local cache at once and reconciled with the store in the background;
//! a rejected mutation is compensated so the cache converges back to what
//! the store holds.
//!
//! |------------------------|------------------------------------------------|
//! | Module                 | Purpose                                        |
//! |------------------------|------------------------------------------------|
//! | [`transport`]          | `BoardTransport` trait and request bodies      |
//! | [`http`]               | `reqwest` implementation + response cleanup    |
//! | [`controller`]         | Apply, send, confirm or roll back              |
//! | [`mutation`]           | Per-mutation phase and the verb recovery table |
//! | [`mirror`]             | View-local board copy and drag/drop            |
//! | [`config`]             | RON config file and env overrides              |
//! |------------------------|------------------------------------------------|
//!
//! ```no_run
//! use gymboard_client::{BoardController, ClientConfig, HttpTransport};
//! use gymboard_types::{CardDraft, EntityId};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load_or_default(None)?;
//! let controller = BoardController::new(HttpTransport::new(&config)?);
//!
//! let board = EntityId::confirmed("board-1");
//! controller.load_board(&board).await?;
//! let card = controller
//!     .create_card(&EntityId::confirmed("list-1"), CardDraft::new("Oil the rowers"))
//!     .await?;
//! assert!(!controller.is_optimistic(&card));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod http;
pub mod mirror;
pub mod mutation;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use controller::BoardController;
pub use error::SyncError;
pub use http::HttpTransport;
pub use mirror::{BoardMirror, DragState, DropOutcome};
pub use mutation::{Mutation, MutationVerb, Phase, Recovery};
pub use transport::{BoardTransport, TransportError, TransportResult};
