//! Typed identifiers for board entities.
//!
//! An [`EntityId`] is either `Temporary` (synthesized by the client for an
//! entity whose create has not been confirmed) or `Confirmed` (issued by the
//! remote store). The transport layer only accepts confirmed ids as `&str`,
//! and the only way to get one out of an `EntityId` is [`EntityId::as_confirmed`],
//! so a temporary id can't be sent as a persisted reference by accident.
//!
//! Temporary ids display as `temp-<seq>` for logs and CLI output. That text
//! form is never parsed back: anything read from the wire is confirmed.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

/// Identifier of a board, list, card, label, comment or attachment.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum EntityId {
    /// Client-synthesized, not yet persisted remotely.
    Temporary(u64),
    /// Issued by the remote store.
    Confirmed(String),
}

impl EntityId {
    /// A temporary id for the given client-local sequence number.
    pub fn temporary(seq: u64) -> Self {
        Self::Temporary(seq)
    }

    /// A confirmed id as issued by the remote store.
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(id.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// The remote id, if this entity has one.
    ///
    /// Every remote call site goes through this; `None` means the call must
    /// be skipped.
    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }

    /// The client-local sequence of a temporary id.
    pub fn temp_seq(&self) -> Option<u64> {
        match self {
            Self::Temporary(seq) => Some(*seq),
            Self::Confirmed(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(seq) => write!(f, "temp-{seq}"),
            Self::Confirmed(id) => f.write_str(id),
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(seq) => write!(f, "EntityId(temp#{seq})"),
            Self::Confirmed(id) => write!(f, "EntityId({id})"),
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Confirmed(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Confirmed(id)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Confirmed)
    }
}

/// The six entity types of a board aggregate.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Board,
    List,
    Card,
    Label,
    Comment,
    Attachment,
}
