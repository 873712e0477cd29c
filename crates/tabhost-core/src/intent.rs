use crate::ids::{ResurrectToken, TabId};

/// A request marshaled onto the controller's owner. Hosts translate user
/// input into intents; timer-driven work goes through the scheduler instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Open { url: String, pinned: bool },
    GoHome,
    Activate { tab_id: TabId },
    Close { tab_id: TabId },
    Suspend { tab_id: TabId },
    Resurrect { tab_id: TabId },
    ResurrectByToken { token: ResurrectToken },
    Navigate { tab_id: TabId, url: String },
    Move { tab_id: TabId, position: usize },
    Back { tab_id: TabId },
    Forward { tab_id: TabId },
    Reload { tab_id: TabId },
    Bookmark { tab_id: TabId },
    ClearHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Opened(TabId),
    Activated(TabId),
    Suspended(ResurrectToken),
    Bookmarked { added: bool },
    Applied,
}
