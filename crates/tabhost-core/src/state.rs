use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ids::{PageHandle, ResurrectToken, TabId};

pub const DEFAULT_TAB_TITLE: &str = "New Tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabState {
    Live,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveResource {
    pub handle: PageHandle,
    pub url: String,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub loading: bool,
}

impl LiveResource {
    pub(crate) fn new(handle: PageHandle, url: String) -> Self {
        Self {
            handle,
            url,
            can_go_back: false,
            can_go_forward: false,
            loading: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedPlaceholder {
    pub url: String,
    pub title: String,
    pub token: ResurrectToken,
}

/// Live and Suspended are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabResource {
    Live(LiveResource),
    Suspended(SuspendedPlaceholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRecord {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub last_active_at: Instant,
    pub pinned: bool,
    pub resource: TabResource,
}

impl TabRecord {
    pub fn state(&self) -> TabState {
        match self.resource {
            TabResource::Live(_) => TabState::Live,
            TabResource::Suspended(_) => TabState::Suspended,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.resource, TabResource::Live(_))
    }

    pub fn live(&self) -> Option<&LiveResource> {
        match &self.resource {
            TabResource::Live(live) => Some(live),
            TabResource::Suspended(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<&SuspendedPlaceholder> {
        match &self.resource {
            TabResource::Live(_) => None,
            TabResource::Suspended(placeholder) => Some(placeholder),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            DEFAULT_TAB_TITLE
        } else {
            &self.title
        }
    }

    pub fn summary(&self) -> TabSummary {
        TabSummary {
            id: self.id,
            title: self.display_title().to_owned(),
            url: self.url.clone(),
            state: self.state(),
            pinned: self.pinned,
        }
    }
}

/// Read-only view handed to hosts by `list()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSummary {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub state: TabState,
    pub pinned: bool,
}
