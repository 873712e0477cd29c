use thiserror::Error;

use crate::ids::TabId;
use crate::state::TabState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("maximum tabs reached ({limit})")]
    CapacityExceeded { limit: usize },
    #[error("cannot {operation} {tab_id} while {state:?}")]
    InvalidTransition {
        tab_id: TabId,
        state: TabState,
        operation: &'static str,
    },
    #[error("tab not found: {0}")]
    NotFound(TabId),
    #[error("tab is not live: {0}")]
    NotLive(TabId),
    #[error("the pinned tab cannot be closed: {0}")]
    CannotClosePinned(TabId),
    #[error("cannot close the last browsing tab: {0}")]
    CannotCloseLastTab(TabId),
    #[error("cannot suspend the active tab: {0}")]
    CannotSuspendActiveTab(TabId),
    #[error("a pinned tab is already open: {0}")]
    PinnedAlreadyOpen(TabId),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl LifecycleError {
    /// Invariant corruption rather than an expected business condition.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
