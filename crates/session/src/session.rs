use feedhead_core::{MutationContext, StreamStructure};
use std::collections::HashSet;

/// Why an update batch was dropped without touching the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The continuation token points at content this session does not hold.
    UnknownToken(String),
    /// Page continuations are not applied to HEAD.
    PageUpdatesLimited,
    /// The page was requested by a different session.
    RequestedByOtherSession(Option<String>),
    /// Derivative sessions are invalidated, not updated, when HEAD is cleared.
    ClearHead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Discarded(DiscardReason),
    /// Held until the session is populated.
    Queued,
}

/// Counters for one update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub outcome: UpdateOutcome,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub required: usize,
    pub cleared: bool,
    pub committed: bool,
}

impl UpdateSummary {
    pub(crate) fn applied() -> Self {
        Self {
            outcome: UpdateOutcome::Applied,
            added: 0,
            updated: 0,
            removed: 0,
            required: 0,
            cleared: false,
            committed: false,
        }
    }

    pub(crate) fn discarded(reason: DiscardReason) -> Self {
        Self {
            outcome: UpdateOutcome::Discarded(reason),
            ..Self::applied()
        }
    }

    pub(crate) fn queued() -> Self {
        Self {
            outcome: UpdateOutcome::Queued,
            ..Self::applied()
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == UpdateOutcome::Applied
    }

    /// Number of operations written to the session journal.
    pub fn staged(&self) -> usize {
        self.added + self.removed + self.required
    }
}

/// A view over a structure stream that accepts update batches.
pub trait Session: Send {
    fn session_id(&self) -> &str;

    fn update_session(
        &mut self,
        clear_head: bool,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    ) -> UpdateSummary;

    fn content_in_session(&self) -> HashSet<String>;

    /// Whether clearing HEAD must tear this session down.
    fn invalidate_on_reset_head(&self) -> bool;

    fn schema_version(&self) -> i32;
}
