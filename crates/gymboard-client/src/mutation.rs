//! Per-mutation lifecycle and the verb table that drives recovery.
//!
//! Every controller call that reaches the remote store builds one
//! [`Mutation`] and walks it through
//!
//! ```text
//!            apply + mark
//!   (start) ─────────────▶ Pending ──remote ok──▶ Confirmed
//!                             │
//!                             └──remote err──▶ RolledBack
//! ```
//!
//! Changes to an entity with a temporary id never get this far: they are
//! applied to the cache and logged, with nothing to settle.
//!
//! What "rolled back" means is decided by [`MutationVerb::recovery`], the
//! one place that maps verbs to a compensation strategy.

use gymboard_types::{EntityId, EntityKind};
use strum::{Display, EnumIter, IntoStaticStr};
use tracing::{debug, warn};

/// Every mutation the controller can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum MutationVerb {
    CreateBoard,
    UpdateBoard,
    DeleteBoard,
    CreateList,
    UpdateList,
    DeleteList,
    ReorderLists,
    CreateCard,
    UpdateCard,
    DeleteCard,
    MoveCard,
    ReorderCards,
    AddLabel,
    RemoveLabel,
    AddComment,
    RemoveComment,
    AddAttachment,
    RemoveAttachment,
}

/// How a rejected mutation is compensated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Remove the provisional entity. Nothing else was touched.
    DiscardTemporary,
    /// Replace the aggregate with the server's copy.
    RefetchAggregate,
}

impl MutationVerb {
    /// Kind of entity the verb's subject is.
    pub fn kind(self) -> EntityKind {
        use MutationVerb::*;
        match self {
            CreateBoard | UpdateBoard | DeleteBoard => EntityKind::Board,
            CreateList | UpdateList | DeleteList => EntityKind::List,
            // Reorders mark their container.
            ReorderLists => EntityKind::Board,
            ReorderCards => EntityKind::List,
            CreateCard | UpdateCard | DeleteCard | MoveCard => EntityKind::Card,
            AddLabel | RemoveLabel => EntityKind::Label,
            AddComment | RemoveComment => EntityKind::Comment,
            AddAttachment | RemoveAttachment => EntityKind::Attachment,
        }
    }

    /// The create verb for an entity kind.
    pub fn create_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Board => Self::CreateBoard,
            EntityKind::List => Self::CreateList,
            EntityKind::Card => Self::CreateCard,
            EntityKind::Label => Self::AddLabel,
            EntityKind::Comment => Self::AddComment,
            EntityKind::Attachment => Self::AddAttachment,
        }
    }

    /// The delete verb for an entity kind.
    pub fn delete_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Board => Self::DeleteBoard,
            EntityKind::List => Self::DeleteList,
            EntityKind::Card => Self::DeleteCard,
            EntityKind::Label => Self::RemoveLabel,
            EntityKind::Comment => Self::RemoveComment,
            EntityKind::Attachment => Self::RemoveAttachment,
        }
    }

    pub fn is_create(self) -> bool {
        use MutationVerb::*;
        matches!(
            self,
            CreateBoard | CreateList | CreateCard | AddLabel | AddComment | AddAttachment
        )
    }

    pub fn recovery(self) -> Recovery {
        if self.is_create() {
            Recovery::DiscardTemporary
        } else {
            Recovery::RefetchAggregate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    /// Applied locally, remote call outstanding.
    Pending,
    Confirmed,
    RolledBack,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::Pending)
    }
}

/// One in-flight (or finished) mutation.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub verb: MutationVerb,
    /// The id the tracker is keyed by: the provisional id for creates, the
    /// entity (or container) id otherwise.
    pub subject: EntityId,
    /// Confirmed id of the aggregate to refetch on failure.
    pub aggregate: Option<String>,
    phase: Phase,
}

impl Mutation {
    pub fn pending(verb: MutationVerb, subject: EntityId, aggregate: Option<String>) -> Self {
        debug!(%verb, subject = %subject, "mutation pending");
        Self { verb, subject, aggregate, phase: Phase::Pending }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> EntityKind {
        self.verb.kind()
    }

    pub fn recovery(&self) -> Recovery {
        self.verb.recovery()
    }

    /// Move to a terminal phase. Only `Pending` may settle; anything else is
    /// logged and ignored.
    pub fn settle(&mut self, to: Phase) -> bool {
        let legal = self.phase == Phase::Pending && matches!(to, Phase::Confirmed | Phase::RolledBack);
        if !legal {
            warn!(verb = %self.verb, from = %self.phase, %to, "illegal mutation transition");
            return false;
        }
        self.phase = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_creates_discard_everything_else_refetches() {
        for verb in MutationVerb::iter() {
            let expected = if verb.is_create() {
                Recovery::DiscardTemporary
            } else {
                Recovery::RefetchAggregate
            };
            assert_eq!(verb.recovery(), expected, "{verb}");
        }
        assert_eq!(MutationVerb::iter().filter(|v| v.is_create()).count(), 6);
    }

    #[test]
    fn test_create_and_delete_verbs_agree_on_kind() {
        for kind in [EntityKind::Board, EntityKind::Card, EntityKind::Attachment] {
            assert_eq!(MutationVerb::create_for(kind).kind(), kind);
            assert_eq!(MutationVerb::delete_for(kind).kind(), kind);
            assert!(!MutationVerb::delete_for(kind).is_create());
        }
    }

    #[test]
    fn test_settle_only_from_pending() {
        let mut m = Mutation::pending(MutationVerb::MoveCard, "c1".into(), Some("b1".into()));
        assert!(m.settle(Phase::Confirmed));
        assert!(m.phase().is_terminal());
        assert!(!m.settle(Phase::RolledBack));
        assert_eq!(m.phase(), Phase::Confirmed);

        let mut failed = Mutation::pending(MutationVerb::UpdateCard, "c2".into(), Some("b1".into()));
        assert!(failed.settle(Phase::RolledBack));
        assert!(!failed.settle(Phase::Confirmed));
        assert_eq!(failed.phase(), Phase::RolledBack);
    }

    #[test]
    fn test_pending_cannot_settle_to_pending() {
        let mut m = Mutation::pending(MutationVerb::CreateCard, EntityId::temporary(2), None);
        assert!(!m.settle(Phase::Pending));
        assert_eq!(m.phase(), Phase::Pending);
        assert_eq!(m.kind(), EntityKind::Card);
    }
}
