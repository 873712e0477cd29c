use serde::{Deserialize, Serialize};

use crate::ids::PageHandle;

/// The opaque document engine. Requests are fire-and-forget: the controller
/// commits its own transition without waiting on the engine, and readiness
/// comes back later as [`PageEvent`]s keyed by handle.
pub trait PageEngine {
    fn create(&mut self, url: &str) -> PageHandle;

    fn destroy(&mut self, handle: PageHandle);

    fn navigate(&mut self, handle: PageHandle, url: &str);

    fn go_back(&mut self, handle: PageHandle);

    fn go_forward(&mut self, handle: PageHandle);

    fn reload(&mut self, handle: PageHandle);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    TitleChanged {
        handle: PageHandle,
        title: String,
    },
    UrlChanged {
        handle: PageHandle,
        url: String,
        can_go_back: bool,
        can_go_forward: bool,
    },
    LoadFinished {
        handle: PageHandle,
        ok: bool,
    },
}

impl PageEvent {
    pub fn handle(&self) -> PageHandle {
        match self {
            Self::TitleChanged { handle, .. }
            | Self::UrlChanged { handle, .. }
            | Self::LoadFinished { handle, .. } => *handle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Created { handle: PageHandle, url: String },
    Destroyed { handle: PageHandle },
    Navigated { handle: PageHandle, url: String },
    WentBack { handle: PageHandle },
    WentForward { handle: PageHandle },
    Reloaded { handle: PageHandle },
}

/// In-memory engine that mints sequential handles and records every call.
#[derive(Debug, Default)]
pub struct RecordingPageEngine {
    next_handle: u64,
    calls: Vec<EngineCall>,
}

impl RecordingPageEngine {
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn live_handles(&self) -> Vec<PageHandle> {
        let mut live = Vec::new();
        for call in &self.calls {
            match call {
                EngineCall::Created { handle, .. } => live.push(*handle),
                EngineCall::Destroyed { handle } => live.retain(|candidate| candidate != handle),
                EngineCall::Navigated { .. }
                | EngineCall::WentBack { .. }
                | EngineCall::WentForward { .. }
                | EngineCall::Reloaded { .. } => {}
            }
        }
        live
    }
}

impl PageEngine for RecordingPageEngine {
    fn create(&mut self, url: &str) -> PageHandle {
        self.next_handle += 1;
        let handle = PageHandle(self.next_handle);
        self.calls.push(EngineCall::Created {
            handle,
            url: url.to_owned(),
        });
        handle
    }

    fn destroy(&mut self, handle: PageHandle) {
        self.calls.push(EngineCall::Destroyed { handle });
    }

    fn navigate(&mut self, handle: PageHandle, url: &str) {
        self.calls.push(EngineCall::Navigated {
            handle,
            url: url.to_owned(),
        });
    }

    fn go_back(&mut self, handle: PageHandle) {
        self.calls.push(EngineCall::WentBack { handle });
    }

    fn go_forward(&mut self, handle: PageHandle) {
        self.calls.push(EngineCall::WentForward { handle });
    }

    fn reload(&mut self, handle: PageHandle) {
        self.calls.push(EngineCall::Reloaded { handle });
    }
}
