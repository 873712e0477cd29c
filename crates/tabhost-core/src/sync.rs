use serde::{Deserialize, Serialize};

use crate::ids::TabId;
use crate::state::TabState;

/// Receives ordered change notifications for the visible tab strip.
/// Positions are display positions; the pinned tab, when open, is 0.
pub trait UiSync {
    fn on_tab_inserted(&mut self, position: usize, tab_id: TabId, title: &str);

    fn on_tab_removed(&mut self, position: usize);

    fn on_tab_state_changed(&mut self, tab_id: TabId, state: TabState);

    fn on_active_changed(&mut self, tab_id: TabId);

    fn on_tab_title_changed(&mut self, _tab_id: TabId, _title: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TabEvent {
    Inserted {
        position: usize,
        tab_id: TabId,
        title: String,
    },
    Removed {
        position: usize,
    },
    StateChanged {
        tab_id: TabId,
        state: TabState,
    },
    ActiveChanged {
        tab_id: TabId,
    },
    TitleChanged {
        tab_id: TabId,
        title: String,
    },
}

/// Collects notifications as [`TabEvent`]s, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingUiSync {
    events: Vec<TabEvent>,
}

impl RecordingUiSync {
    pub fn events(&self) -> &[TabEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<TabEvent> {
        std::mem::take(&mut self.events)
    }
}

impl UiSync for RecordingUiSync {
    fn on_tab_inserted(&mut self, position: usize, tab_id: TabId, title: &str) {
        self.events.push(TabEvent::Inserted {
            position,
            tab_id,
            title: title.to_owned(),
        });
    }

    fn on_tab_removed(&mut self, position: usize) {
        self.events.push(TabEvent::Removed { position });
    }

    fn on_tab_state_changed(&mut self, tab_id: TabId, state: TabState) {
        self.events.push(TabEvent::StateChanged { tab_id, state });
    }

    fn on_active_changed(&mut self, tab_id: TabId) {
        self.events.push(TabEvent::ActiveChanged { tab_id });
    }

    fn on_tab_title_changed(&mut self, tab_id: TabId, title: &str) {
        self.events.push(TabEvent::TitleChanged {
            tab_id,
            title: title.to_owned(),
        });
    }
}
