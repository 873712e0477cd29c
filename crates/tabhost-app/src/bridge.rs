use serde::{Deserialize, Serialize};
use tabhost_core::{Intent, ResurrectToken, TabId};

/// One line of host input. Ids arrive as raw integers, as the UI sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UiCommand {
    Open {
        #[serde(default)]
        url: String,
        #[serde(default)]
        pinned: bool,
    },
    Activate {
        tab_id: u64,
    },
    Close {
        tab_id: u64,
    },
    Suspend {
        tab_id: u64,
    },
    Resurrect {
        tab_id: u64,
    },
    ResurrectToken {
        tab_id: u64,
        epoch: u64,
    },
    Navigate {
        tab_id: u64,
        url: String,
    },
    Move {
        tab_id: u64,
        position: usize,
    },
    Home,
    Back {
        tab_id: u64,
    },
    Forward {
        tab_id: u64,
    },
    Reload {
        tab_id: u64,
    },
    Bookmark {
        tab_id: u64,
    },
    ClearHistory,
    /// Fields left out keep their current value.
    Settings {
        #[serde(default)]
        max_tabs: Option<usize>,
        #[serde(default)]
        idle_threshold_secs: Option<u64>,
        #[serde(default)]
        sweep_interval_secs: Option<u64>,
        #[serde(default)]
        suspend_enabled: Option<bool>,
    },
    List,
    Quit,
}

impl UiCommand {
    /// `List`, `Settings` and `Quit` are answered by the runtime itself.
    pub fn into_intent(self) -> Option<Intent> {
        let intent = match self {
            Self::Open { url, pinned } => Intent::Open { url, pinned },
            Self::Activate { tab_id } => Intent::Activate {
                tab_id: TabId(tab_id),
            },
            Self::Close { tab_id } => Intent::Close {
                tab_id: TabId(tab_id),
            },
            Self::Suspend { tab_id } => Intent::Suspend {
                tab_id: TabId(tab_id),
            },
            Self::Resurrect { tab_id } => Intent::Resurrect {
                tab_id: TabId(tab_id),
            },
            Self::ResurrectToken { tab_id, epoch } => Intent::ResurrectByToken {
                token: ResurrectToken {
                    tab_id: TabId(tab_id),
                    epoch,
                },
            },
            Self::Navigate { tab_id, url } => Intent::Navigate {
                tab_id: TabId(tab_id),
                url,
            },
            Self::Move { tab_id, position } => Intent::Move {
                tab_id: TabId(tab_id),
                position,
            },
            Self::Home => Intent::GoHome,
            Self::Bookmark { tab_id } => Intent::Bookmark {
                tab_id: TabId(tab_id),
            },
            Self::Back { tab_id } => Intent::Back {
                tab_id: TabId(tab_id),
            },
            Self::Forward { tab_id } => Intent::Forward {
                tab_id: TabId(tab_id),
            },
            Self::Reload { tab_id } => Intent::Reload {
                tab_id: TabId(tab_id),
            },
            Self::ClearHistory => Intent::ClearHistory,
            Self::List | Self::Settings { .. } | Self::Quit => return None,
        };
        Some(intent)
    }
}
