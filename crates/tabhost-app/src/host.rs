use std::collections::HashMap;
use std::io::{self, Write};

use serde::Serialize;
use tabhost_core::{PageEngine, PageEvent, PageHandle, TabEvent, TabId, TabState, UiSync};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Page engine without a renderer. Every request is acknowledged with the
/// callbacks a real engine would produce, delivered asynchronously through
/// the owner loop's page-event channel.
#[derive(Debug)]
pub struct HeadlessPageEngine {
    next_handle: u64,
    pages: HashMap<PageHandle, PageHistory>,
    events: UnboundedSender<PageEvent>,
}

/// Session history of one page; `index` points at the current entry.
#[derive(Debug, Default)]
struct PageHistory {
    entries: Vec<String>,
    index: usize,
}

impl PageHistory {
    fn push(&mut self, url: &str) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(url.to_owned());
        self.index = self.entries.len() - 1;
    }

    fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    fn can_go_back(&self) -> bool {
        self.index > 0
    }

    fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }
}

impl HeadlessPageEngine {
    pub fn new() -> (Self, UnboundedReceiver<PageEvent>) {
        let (events, receiver) = unbounded_channel();
        let engine = Self {
            next_handle: 0,
            pages: HashMap::new(),
            events,
        };
        (engine, receiver)
    }

    pub fn live_pages(&self) -> usize {
        self.pages.len()
    }

    /// Moves within a page's history and reports the entry it lands on.
    fn traverse(&mut self, handle: PageHandle, step: fn(&mut PageHistory) -> bool) {
        let Some(history) = self.pages.get_mut(&handle) else {
            debug!(handle = %handle, "history request for unknown page ignored");
            return;
        };
        if !step(history) {
            debug!(handle = %handle, "no history entry in that direction");
        }
        self.report(handle);
    }

    fn report(&self, handle: PageHandle) {
        let Some(history) = self.pages.get(&handle) else {
            return;
        };
        let Some(url) = history.current() else {
            return;
        };
        self.send(PageEvent::UrlChanged {
            handle,
            url: url.to_owned(),
            can_go_back: history.can_go_back(),
            can_go_forward: history.can_go_forward(),
        });
        self.send(PageEvent::TitleChanged {
            handle,
            title: title_for(url),
        });
        self.send(PageEvent::LoadFinished { handle, ok: true });
    }

    fn send(&self, event: PageEvent) {
        if self.events.send(event).is_err() {
            debug!("page event receiver closed");
        }
    }
}

impl PageEngine for HeadlessPageEngine {
    fn create(&mut self, url: &str) -> PageHandle {
        self.next_handle += 1;
        let handle = PageHandle(self.next_handle);
        self.pages.entry(handle).or_default().push(url);
        self.report(handle);
        handle
    }

    fn destroy(&mut self, handle: PageHandle) {
        self.pages.remove(&handle);
    }

    fn navigate(&mut self, handle: PageHandle, url: &str) {
        let Some(history) = self.pages.get_mut(&handle) else {
            debug!(handle = %handle, url, "navigate for unknown page ignored");
            return;
        };
        history.push(url);
        self.report(handle);
    }

    fn go_back(&mut self, handle: PageHandle) {
        self.traverse(handle, |history| {
            if !history.can_go_back() {
                return false;
            }
            history.index -= 1;
            true
        });
    }

    fn go_forward(&mut self, handle: PageHandle) {
        self.traverse(handle, |history| {
            if !history.can_go_forward() {
                return false;
            }
            history.index += 1;
            true
        });
    }

    fn reload(&mut self, handle: PageHandle) {
        self.traverse(handle, |_| true);
    }
}

fn title_for(url: &str) -> String {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest).to_owned()
}

/// Writes tab-strip notifications, and anything else the runtime replies
/// with, as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesUiSync<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesUiSync<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn emit<T: Serialize>(&mut self, value: &T) {
        if let Err(error) = self.write_line(value) {
            warn!(error = %error, "failed to write ui line");
        }
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> UiSync for JsonLinesUiSync<W> {
    fn on_tab_inserted(&mut self, position: usize, tab_id: TabId, title: &str) {
        self.emit(&TabEvent::Inserted {
            position,
            tab_id,
            title: title.to_owned(),
        });
    }

    fn on_tab_removed(&mut self, position: usize) {
        self.emit(&TabEvent::Removed { position });
    }

    fn on_tab_state_changed(&mut self, tab_id: TabId, state: TabState) {
        self.emit(&TabEvent::StateChanged { tab_id, state });
    }

    fn on_active_changed(&mut self, tab_id: TabId) {
        self.emit(&TabEvent::ActiveChanged { tab_id });
    }

    fn on_tab_title_changed(&mut self, tab_id: TabId, title: &str) {
        self.emit(&TabEvent::TitleChanged {
            tab_id,
            title: title.to_owned(),
        });
    }
}
