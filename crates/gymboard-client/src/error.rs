//! Controller errors.

use gymboard_types::{EntityId, EntityKind};
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Why a controller call failed.
///
/// Every failure is also written to the cache's `error` field, so callers
/// that render state can ignore the return value.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store rejected the call or couldn't be reached.
    #[error(transparent)]
    Network(#[from] TransportError),
    #[error("no board is loaded")]
    NoCurrentBoard,
    /// The entity a verb needs to read before applying isn't cached.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        Self::NotFound { kind, id: id.clone() }
    }
}
