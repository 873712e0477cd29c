use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::address::{is_recordable, normalize_url};
use crate::clock::Clock;
use crate::config::{ConfigError, LifecycleConfig};
use crate::error::{LifecycleError, LifecycleResult};
use crate::ids::{PageHandle, ResurrectToken, TabId};
use crate::intent::{Intent, Outcome};
use crate::page::{PageEngine, PageEvent};
use crate::persistence::{Bookmark, HistoryEntry, Persistence, Section, StoreSnapshot};
use crate::registry::ResourceRegistry;
use crate::sequence::TabSequence;
use crate::state::{LiveResource, TabRecord, TabResource, TabState, TabSummary};
use crate::sync::UiSync;

/// Orchestrates every tab transition. Each public operation validates all of
/// its preconditions before touching either the registry or the sequence, so
/// a failed call leaves both unchanged.
pub struct LifecycleController<E: PageEngine, P: Persistence, U: UiSync> {
    registry: ResourceRegistry,
    sequence: TabSequence,
    active: Option<TabId>,
    config: LifecycleConfig,
    store: StoreSnapshot,
    engine: E,
    persistence: P,
    ui: U,
    clock: Box<dyn Clock>,
    revision: u64,
}

impl<E: PageEngine, P: Persistence, U: UiSync> LifecycleController<E, P, U> {
    pub fn new(
        config: LifecycleConfig,
        engine: E,
        persistence: P,
        ui: U,
        clock: impl Clock + 'static,
    ) -> Result<Self, ConfigError> {
        let store = StoreSnapshot {
            settings: config,
            ..StoreSnapshot::default()
        };
        Self::with_store(store, engine, persistence, ui, clock)
    }

    /// Starts from a snapshot previously loaded from `persistence`; its
    /// `settings` section becomes the active configuration.
    pub fn with_store(
        store: StoreSnapshot,
        engine: E,
        persistence: P,
        ui: U,
        clock: impl Clock + 'static,
    ) -> Result<Self, ConfigError> {
        store.settings.validate()?;
        let config = store.settings.clone();
        Ok(Self {
            registry: ResourceRegistry::new(config.max_live_tabs),
            sequence: TabSequence::default(),
            active: None,
            config,
            store,
            engine,
            persistence,
            ui,
            clock: Box::new(clock),
            revision: 0,
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn sequence(&self) -> &TabSequence {
        &self.sequence
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn store(&self) -> &StoreSnapshot {
        &self.store
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.store.history
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.store.bookmarks
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TabRecord> {
        self.registry.get(tab_id)
    }

    /// Tab summaries in display order.
    pub fn list(&self) -> Vec<TabSummary> {
        self.sequence
            .iter()
            .filter_map(|tab_id| self.registry.get(tab_id))
            .map(TabRecord::summary)
            .collect()
    }

    pub fn dispatch(&mut self, intent: Intent) -> LifecycleResult<Outcome> {
        match intent {
            Intent::Open { url, pinned } => self.open(&url, pinned).map(Outcome::Opened),
            Intent::GoHome => self.go_home().map(Outcome::Activated),
            Intent::Activate { tab_id } => {
                self.activate(tab_id).map(|()| Outcome::Activated(tab_id))
            }
            Intent::Close { tab_id } => self.close(tab_id).map(|()| Outcome::Applied),
            Intent::Suspend { tab_id } => self.suspend(tab_id).map(Outcome::Suspended),
            Intent::Resurrect { tab_id } => self.resurrect(tab_id).map(|()| Outcome::Applied),
            Intent::ResurrectByToken { token } => {
                self.resurrect_by_token(token).map(Outcome::Activated)
            }
            Intent::Navigate { tab_id, url } => {
                self.navigate(tab_id, &url).map(|()| Outcome::Applied)
            }
            Intent::Move { tab_id, position } => {
                self.move_tab(tab_id, position).map(|()| Outcome::Applied)
            }
            Intent::Back { tab_id } => self.go_back(tab_id).map(|()| Outcome::Applied),
            Intent::Forward { tab_id } => self.go_forward(tab_id).map(|()| Outcome::Applied),
            Intent::Reload { tab_id } => self.reload(tab_id).map(|()| Outcome::Applied),
            Intent::Bookmark { tab_id } => self
                .bookmark(tab_id)
                .map(|added| Outcome::Bookmarked { added }),
            Intent::ClearHistory => {
                self.clear_history();
                Ok(Outcome::Applied)
            }
        }
    }

    pub fn open(&mut self, url: &str, pinned: bool) -> LifecycleResult<TabId> {
        if pinned {
            if let Some(existing) = self.sequence.pinned() {
                return Err(LifecycleError::PinnedAlreadyOpen(existing));
            }
        } else if self.sequence.regular_len() >= self.config.max_tabs {
            return Err(LifecycleError::CapacityExceeded {
                limit: self.config.max_tabs,
            });
        }

        let url = normalize_url(url);
        let now = self.clock.now();
        let tab_id = self.registry.create(&mut self.engine, pinned, &url, now)?;
        let inserted = if pinned {
            self.sequence.insert_pinned(tab_id)
        } else {
            self.sequence.push(tab_id)
        };
        let position = match inserted {
            Ok(position) => position,
            Err(error) => {
                self.registry.discard(&mut self.engine, tab_id)?;
                return Err(error);
            }
        };

        self.revision += 1;
        info!(tab_id = %tab_id, pinned, url = %url, position, "tab opened");
        let title = self.display_title(tab_id);
        self.ui.on_tab_inserted(position, tab_id, &title);
        self.focus(tab_id)?;
        Ok(tab_id)
    }

    /// Focuses the pinned home tab, opening it first if needed.
    pub fn go_home(&mut self) -> LifecycleResult<TabId> {
        match self.sequence.pinned() {
            Some(pinned) => {
                self.activate(pinned)?;
                Ok(pinned)
            }
            None => {
                let homepage = self.config.homepage_url.clone();
                self.open(&homepage, true)
            }
        }
    }

    /// Suspended tabs are resurrected transparently before gaining focus.
    pub fn activate(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let record = self
            .registry
            .get(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        self.ensure_sequenced(tab_id)?;
        if self.active == Some(tab_id) && record.is_live() {
            return Ok(());
        }
        if !record.is_live() {
            self.restore(tab_id)?;
        }
        self.focus(tab_id)
    }

    pub fn close(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let record = self
            .registry
            .get(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if record.pinned {
            return Err(LifecycleError::CannotClosePinned(tab_id));
        }
        let regular_index = self.sequence.regular_index_of(tab_id).ok_or_else(|| {
            LifecycleError::internal(format!("{tab_id} is registered but not sequenced"))
        })?;
        if self.sequence.regular_len() <= 1 {
            return Err(LifecycleError::CannotCloseLastTab(tab_id));
        }

        let record = self.registry.destroy(&mut self.engine, tab_id)?;
        let position = self.sequence.remove(tab_id)?;
        self.revision += 1;
        info!(tab_id = %tab_id, state = ?record.state(), position, "tab closed");
        self.ui.on_tab_removed(position);

        if self.active == Some(tab_id) {
            self.active = None;
            if let Some(successor) = self.sequence.successor_for(regular_index) {
                if let Err(error) = self.activate(successor) {
                    warn!(tab_id = %successor, error = %error, "failed to focus successor tab");
                }
            }
        }
        Ok(())
    }

    pub fn suspend(&mut self, tab_id: TabId) -> LifecycleResult<ResurrectToken> {
        if !self.registry.contains(tab_id) {
            return Err(LifecycleError::NotFound(tab_id));
        }
        if self.active == Some(tab_id) {
            return Err(LifecycleError::CannotSuspendActiveTab(tab_id));
        }
        self.ensure_sequenced(tab_id)?;

        let token = self
            .registry
            .suspend(&mut self.engine, tab_id, self.active)?;
        self.revision += 1;
        self.ui.on_tab_state_changed(tab_id, TabState::Suspended);
        Ok(token)
    }

    /// Brings a suspended tab back without moving focus.
    pub fn resurrect(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        if !self.registry.contains(tab_id) {
            return Err(LifecycleError::NotFound(tab_id));
        }
        self.ensure_sequenced(tab_id)?;
        self.restore(tab_id)
    }

    /// Redeems a placeholder's reload token. Resolution is by `TabId`, so the
    /// tab may have moved anywhere in the sequence since it was suspended.
    pub fn resurrect_by_token(&mut self, token: ResurrectToken) -> LifecycleResult<TabId> {
        let tab_id = token.tab_id;
        let record = self
            .registry
            .get(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let matches = record
            .placeholder()
            .is_some_and(|placeholder| placeholder.token == token);
        if !matches {
            return Err(LifecycleError::InvalidTransition {
                tab_id,
                state: record.state(),
                operation: "resurrect by token",
            });
        }
        self.activate(tab_id)?;
        Ok(tab_id)
    }

    pub fn navigate(&mut self, tab_id: TabId, url: &str) -> LifecycleResult<()> {
        let url = normalize_url(url);
        let record = self
            .registry
            .get_mut(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let TabResource::Live(live) = &mut record.resource else {
            return Err(LifecycleError::NotLive(tab_id));
        };
        live.url = url.clone();
        live.loading = true;
        let handle = live.handle;
        record.url = url.clone();
        self.engine.navigate(handle, &url);
        self.revision += 1;
        debug!(tab_id = %tab_id, url = %url, "tab navigated");
        Ok(())
    }

    pub fn go_back(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let handle = self.begin_page_load(tab_id, "go back", |live| live.can_go_back)?;
        self.engine.go_back(handle);
        Ok(())
    }

    pub fn go_forward(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let handle = self.begin_page_load(tab_id, "go forward", |live| live.can_go_forward)?;
        self.engine.go_forward(handle);
        Ok(())
    }

    pub fn reload(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let handle = self.begin_page_load(tab_id, "reload", |_| true)?;
        self.engine.reload(handle);
        Ok(())
    }

    pub fn clear_history(&mut self) {
        let cleared = self.store.history.len();
        self.store.history.clear();
        info!(cleared, "history cleared");
        self.persist(Section::History);
    }

    pub fn move_tab(&mut self, tab_id: TabId, position: usize) -> LifecycleResult<()> {
        let record = self
            .registry
            .get(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if record.pinned {
            return Err(LifecycleError::InvalidTransition {
                tab_id,
                state: record.state(),
                operation: "move pinned",
            });
        }
        let (from, to) = self.sequence.move_to(tab_id, position)?;
        if from == to {
            return Ok(());
        }
        self.revision += 1;
        let title = self.display_title(tab_id);
        self.ui.on_tab_removed(from);
        self.ui.on_tab_inserted(to, tab_id, &title);
        Ok(())
    }

    /// Returns whether a new bookmark was added.
    pub fn bookmark(&mut self, tab_id: TabId) -> LifecycleResult<bool> {
        let record = self
            .registry
            .get(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if self.store.bookmarks.iter().any(|bookmark| bookmark.url == record.url) {
            return Ok(false);
        }
        let bookmark = Bookmark {
            url: record.url.clone(),
            title: record.display_title().to_owned(),
        };
        self.store.bookmarks.push(bookmark);
        self.persist(Section::Bookmarks);
        Ok(true)
    }

    pub fn update_config(&mut self, config: LifecycleConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.registry.set_max_live_tabs(config.max_live_tabs);
        self.store.settings = config.clone();
        self.config = config;
        self.trim_history();
        self.persist(Section::Settings);
        Ok(())
    }

    /// Applies an engine callback. Events for handles that were torn down
    /// (closed or suspended mid-load) are dropped; returns the affected tab.
    pub fn handle_page_event(&mut self, event: PageEvent) -> Option<TabId> {
        let handle = event.handle();
        let Some(tab_id) = self.registry.tab_for_handle(handle) else {
            debug!(handle = %handle, "dropping page event for torn-down handle");
            return None;
        };
        let record = self.registry.get_mut(tab_id)?;
        let TabResource::Live(live) = &mut record.resource else {
            debug!(tab_id = %tab_id, handle = %handle, "dropping page event for suspended tab");
            return None;
        };
        if live.handle != handle {
            debug!(tab_id = %tab_id, handle = %handle, "dropping page event for replaced handle");
            return None;
        }

        match event {
            PageEvent::TitleChanged { title, .. } => {
                record.title = title;
                let title = record.display_title().to_owned();
                self.ui.on_tab_title_changed(tab_id, &title);
            }
            PageEvent::UrlChanged {
                url,
                can_go_back,
                can_go_forward,
                ..
            } => {
                live.url = url.clone();
                live.can_go_back = can_go_back;
                live.can_go_forward = can_go_forward;
                record.url = url.clone();
                let title = record.display_title().to_owned();
                if self.active == Some(tab_id) {
                    self.record_history(url, title);
                }
            }
            PageEvent::LoadFinished { ok, .. } => {
                live.loading = false;
                if !ok {
                    warn!(tab_id = %tab_id, url = %live.url, "page failed to load");
                }
            }
        }
        Some(tab_id)
    }

    /// Cross-checks the registry, the sequence and the active pointer.
    pub fn check_invariants(&self) -> LifecycleResult<()> {
        let sequenced: BTreeSet<TabId> = self.sequence.iter().collect();
        if sequenced.len() != self.sequence.len() {
            return Err(LifecycleError::internal("tab sequence holds duplicate ids"));
        }
        let registered: BTreeSet<TabId> = self.registry.iter().map(|record| record.id).collect();
        if sequenced != registered {
            return Err(LifecycleError::internal(format!(
                "sequence {sequenced:?} and registry {registered:?} disagree"
            )));
        }

        let pinned: Vec<TabId> = self
            .registry
            .iter()
            .filter(|record| record.pinned)
            .map(|record| record.id)
            .collect();
        if pinned.len() > 1 || pinned.first().copied() != self.sequence.pinned() {
            return Err(LifecycleError::internal(format!(
                "pinned records {pinned:?} do not match pinned slot {:?}",
                self.sequence.pinned()
            )));
        }
        if let Some(pinned) = self.sequence.pinned().and_then(|id| self.registry.get(id)) {
            if !pinned.is_live() {
                return Err(LifecycleError::internal(format!(
                    "pinned {} is suspended",
                    pinned.id
                )));
            }
        }

        if let Some(active) = self.active {
            let live = self.registry.get(active).is_some_and(TabRecord::is_live);
            if !live {
                return Err(LifecycleError::internal(format!(
                    "active {active} is missing or not live"
                )));
            }
        }
        self.registry.verify_handle_index()
    }

    fn focus(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        let now = self.clock.now();
        self.registry.mark_active(tab_id, now)?;
        let previous = self.active.replace(tab_id);
        if previous != Some(tab_id) {
            self.revision += 1;
            debug!(tab_id = %tab_id, previous = ?previous, "tab activated");
            self.ui.on_active_changed(tab_id);
        }
        Ok(())
    }

    fn restore(&mut self, tab_id: TabId) -> LifecycleResult<()> {
        self.registry.resurrect(&mut self.engine, tab_id)?;
        self.revision += 1;
        self.ui.on_tab_state_changed(tab_id, TabState::Live);
        Ok(())
    }

    /// Marks a live tab as loading and hands back its page handle, provided
    /// `allowed` accepts the tab's navigation state.
    fn begin_page_load(
        &mut self,
        tab_id: TabId,
        operation: &'static str,
        allowed: impl FnOnce(&LiveResource) -> bool,
    ) -> LifecycleResult<PageHandle> {
        let record = self
            .registry
            .get_mut(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let TabResource::Live(live) = &mut record.resource else {
            return Err(LifecycleError::NotLive(tab_id));
        };
        if !allowed(live) {
            return Err(LifecycleError::InvalidTransition {
                tab_id,
                state: TabState::Live,
                operation,
            });
        }
        live.loading = true;
        let handle = live.handle;
        self.revision += 1;
        debug!(tab_id = %tab_id, handle = %handle, operation, "page load requested");
        Ok(handle)
    }

    fn ensure_sequenced(&self, tab_id: TabId) -> LifecycleResult<()> {
        if self.sequence.contains(tab_id) {
            Ok(())
        } else {
            Err(LifecycleError::internal(format!(
                "{tab_id} is registered but not sequenced"
            )))
        }
    }

    fn display_title(&self, tab_id: TabId) -> String {
        self.registry
            .get(tab_id)
            .map(|record| record.display_title().to_owned())
            .unwrap_or_default()
    }

    fn record_history(&mut self, url: String, title: String) {
        if !is_recordable(&url) {
            return;
        }
        if self
            .store
            .history
            .last()
            .is_some_and(|entry| entry.url == url)
        {
            return;
        }
        self.store.history.push(HistoryEntry {
            url,
            title,
            visited_at: self.clock.unix_seconds(),
        });
        self.trim_history();
        self.persist(Section::History);
    }

    fn trim_history(&mut self) {
        let limit = self.config.history_limit;
        let len = self.store.history.len();
        if len > limit {
            self.store.history.drain(..len - limit);
        }
    }

    fn persist(&mut self, section: Section) {
        if let Err(error) = self.persistence.save(section, &self.store) {
            warn!(section = %section, error = %error, "persistence write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::config::LifecycleConfig;
    use crate::error::LifecycleError;
    use crate::ids::{PageHandle, ResurrectToken, TabId};
    use crate::intent::{Intent, Outcome};
    use crate::page::{EngineCall, PageEvent, RecordingPageEngine};
    use crate::persistence::{MemoryPersistence, Section};
    use crate::scheduler::EvictionScheduler;
    use crate::state::TabState;
    use crate::sync::{RecordingUiSync, TabEvent};

    use super::LifecycleController;

    type TestController =
        LifecycleController<RecordingPageEngine, MemoryPersistence, RecordingUiSync>;

    fn controller_with(config: LifecycleConfig) -> (TestController, ManualClock) {
        let clock = ManualClock::new();
        let controller = LifecycleController::new(
            config,
            RecordingPageEngine::default(),
            MemoryPersistence::default(),
            RecordingUiSync::default(),
            clock.clone(),
        )
        .expect("config should be valid");
        (controller, clock)
    }

    fn seeded_controller() -> (TestController, ManualClock, TabId) {
        let (mut controller, clock) = controller_with(LifecycleConfig::default());
        let home = controller.go_home().expect("home tab should open");
        (controller, clock, home)
    }

    fn handle_of(controller: &TestController, tab_id: TabId) -> PageHandle {
        controller
            .get(tab_id)
            .and_then(|record| record.live())
            .map(|live| live.handle)
            .expect("tab should be live")
    }

    fn state_of(controller: &TestController, tab_id: TabId) -> Option<TabState> {
        controller.get(tab_id).map(|record| record.state())
    }

    fn url_changed(handle: PageHandle, url: &str) -> PageEvent {
        PageEvent::UrlChanged {
            handle,
            url: url.to_owned(),
            can_go_back: false,
            can_go_forward: false,
        }
    }

    fn next_rand(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        *seed
    }

    fn rand_index(seed: &mut u64, len: usize) -> usize {
        (next_rand(seed) as usize) % len
    }

    #[test]
    fn open_appends_and_focuses_new_tab() {
        let (mut controller, _clock, home) = seeded_controller();

        let tab = controller.open("a.test", false).expect("open should succeed");

        assert_eq!(controller.active_id(), Some(tab));
        assert_eq!(controller.sequence().iter().collect::<Vec<_>>(), vec![home, tab]);
        let summaries = controller.list();
        assert_eq!(summaries[1].url, "https://a.test");
        assert_eq!(summaries[1].title, "New Tab");
        assert!(summaries[0].pinned);
        assert!(controller.ui().events().ends_with(&[
            TabEvent::Inserted {
                position: 1,
                tab_id: tab,
                title: "New Tab".to_owned(),
            },
            TabEvent::ActiveChanged { tab_id: tab },
        ]));
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn second_pinned_open_is_rejected() {
        let (mut controller, _clock, home) = seeded_controller();

        let result = controller.open("about:home", true);

        assert_eq!(result, Err(LifecycleError::PinnedAlreadyOpen(home)));
        assert_eq!(controller.registry().len(), 1);
    }

    #[test]
    fn max_tabs_plus_one_is_capacity_exceeded() {
        let (mut controller, _clock) = controller_with(LifecycleConfig {
            max_tabs: 3,
            ..LifecycleConfig::default()
        });
        for index in 0..3 {
            controller
                .open(&format!("https://{index}.test"), false)
                .expect("open within limit");
        }
        let before = controller.list().len();
        let revision = controller.revision();

        let result = controller.open("https://overflow.test", false);

        assert_eq!(result, Err(LifecycleError::CapacityExceeded { limit: 3 }));
        assert_eq!(controller.list().len(), before);
        assert_eq!(controller.revision(), revision);
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn registry_live_capacity_surfaces_from_open() {
        let (mut controller, _clock) = controller_with(LifecycleConfig {
            max_live_tabs: Some(1),
            ..LifecycleConfig::default()
        });
        controller.go_home().expect("home");
        controller.open("https://a.test", false).expect("first live tab");

        let result = controller.open("https://b.test", false);

        assert_eq!(result, Err(LifecycleError::CapacityExceeded { limit: 1 }));
        assert_eq!(controller.sequence().regular_len(), 1);
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn suspend_then_activate_round_trips_url() {
        let (mut controller, _clock, home) = seeded_controller();
        let tab = controller
            .open("https://a.test/deep?x=1", false)
            .expect("open");
        controller.activate(home).expect("focus home");

        let token = controller.suspend(tab).expect("background tab suspends");
        assert_eq!(token.tab_id, tab);
        assert_eq!(state_of(&controller, tab), Some(TabState::Suspended));

        controller.activate(tab).expect("activation resurrects");

        assert_eq!(controller.active_id(), Some(tab));
        let record = controller.get(tab).expect("record");
        assert_eq!(
            record.live().map(|live| live.url.as_str()),
            Some("https://a.test/deep?x=1")
        );
        assert!(controller.ui().events().ends_with(&[
            TabEvent::StateChanged {
                tab_id: tab,
                state: TabState::Live,
            },
            TabEvent::ActiveChanged { tab_id: tab },
        ]));
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn suspending_active_tab_is_rejected() {
        let (mut controller, _clock, _home) = seeded_controller();
        let tab = controller.open("https://a.test", false).expect("open");
        let revision = controller.revision();

        let result = controller.suspend(tab);

        assert_eq!(result, Err(LifecycleError::CannotSuspendActiveTab(tab)));
        assert_eq!(state_of(&controller, tab), Some(TabState::Live));
        assert_eq!(controller.revision(), revision);
    }

    #[test]
    fn suspending_pinned_or_missing_tab_fails() {
        let (mut controller, _clock, home) = seeded_controller();
        controller.open("https://a.test", false).expect("open");

        assert!(matches!(
            controller.suspend(home),
            Err(LifecycleError::InvalidTransition {
                operation: "suspend pinned",
                ..
            })
        ));
        assert_eq!(
            controller.suspend(TabId(404)),
            Err(LifecycleError::NotFound(TabId(404)))
        );
    }

    #[test]
    fn closing_last_regular_tab_is_rejected() {
        let (mut controller, _clock, home) = seeded_controller();
        let tab = controller.open("https://a.test", false).expect("open");
        let before = controller.list();

        assert_eq!(
            controller.close(tab),
            Err(LifecycleError::CannotCloseLastTab(tab))
        );
        assert_eq!(
            controller.close(home),
            Err(LifecycleError::CannotClosePinned(home))
        );
        assert_eq!(controller.list(), before);
        assert_eq!(controller.active_id(), Some(tab));
    }

    #[test]
    fn closing_active_tab_focuses_same_index_then_previous() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");
        let c = controller.open("https://c", false).expect("open c");

        controller.activate(b).expect("focus b");
        controller.close(b).expect("close b");
        assert_eq!(controller.active_id(), Some(c));

        controller.close(c).expect("close c");
        assert_eq!(controller.active_id(), Some(a));
        assert_eq!(controller.sequence().iter().collect::<Vec<_>>(), vec![home, a]);
        assert_eq!(controller.engine().live_handles().len(), 2);
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn closing_background_tab_keeps_focus() {
        let (mut controller, _clock, _home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");

        controller.close(a).expect("close a");

        assert_eq!(controller.active_id(), Some(b));
        assert_eq!(
            controller.ui().events().last(),
            Some(&TabEvent::Removed { position: 1 })
        );
    }

    #[test]
    fn pinned_home_scenario_sweeps_idle_background_tab() {
        let (mut controller, clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");
        controller.activate(a).expect("focus a");

        clock.advance(controller.config().idle_threshold() + Duration::from_secs(1));
        let report = EvictionScheduler::new().sweep(&mut controller);

        assert_eq!(report.suspended, vec![b]);
        assert_eq!(state_of(&controller, b), Some(TabState::Suspended));
        assert_eq!(state_of(&controller, a), Some(TabState::Live));
        assert_eq!(state_of(&controller, home), Some(TabState::Live));

        controller.close(b).expect("suspended tab closes without resurrection");
        assert!(controller.get(b).is_none());
        assert!(!controller
            .engine()
            .calls()
            .iter()
            .skip_while(|call| !matches!(call, EngineCall::Destroyed { .. }))
            .skip(1)
            .any(|call| matches!(call, EngineCall::Created { .. })));
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn resurrect_by_token_follows_moved_tab() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");
        controller.activate(home).expect("focus home");
        let token = controller.suspend(a).expect("suspend a");

        controller.move_tab(a, 5).expect("move a to the end");
        assert_eq!(controller.sequence().regular(), &[b, a]);

        assert_eq!(controller.resurrect_by_token(token), Ok(a));
        assert_eq!(controller.active_id(), Some(a));
        assert_eq!(state_of(&controller, a), Some(TabState::Live));

        assert!(matches!(
            controller.resurrect_by_token(token),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn stale_token_is_rejected() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        controller.open("https://b", false).expect("open b");
        controller.activate(home).expect("focus home");
        let first = controller.suspend(a).expect("first suspend");
        controller.resurrect(a).expect("explicit resurrect");
        let second = controller.suspend(a).expect("second suspend");

        assert_ne!(first, second);
        assert!(matches!(
            controller.resurrect_by_token(first),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(
            controller.resurrect_by_token(ResurrectToken {
                tab_id: TabId(77),
                epoch: 1,
            }),
            Err(LifecycleError::NotFound(TabId(77)))
        );
        assert_eq!(controller.active_id(), Some(home));
    }

    #[test]
    fn moving_pinned_tab_is_rejected_and_moves_notify_ui() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");

        assert!(matches!(
            controller.move_tab(home, 2),
            Err(LifecycleError::InvalidTransition {
                operation: "move pinned",
                ..
            })
        ));

        controller.ui_mut().take_events();
        controller.move_tab(b, 0).expect("move b first");

        assert_eq!(controller.sequence().regular(), &[b, a]);
        assert_eq!(
            controller.ui().events(),
            &[
                TabEvent::Removed { position: 2 },
                TabEvent::Inserted {
                    position: 1,
                    tab_id: b,
                    title: "New Tab".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn stale_page_events_are_dropped() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        controller.open("https://b", false).expect("open b");
        let old_handle = handle_of(&controller, a);
        controller.activate(home).expect("focus home");
        controller.suspend(a).expect("suspend a");
        let revision = controller.revision();

        let applied = controller.handle_page_event(PageEvent::LoadFinished {
            handle: old_handle,
            ok: true,
        });
        let titled = controller.handle_page_event(PageEvent::TitleChanged {
            handle: old_handle,
            title: "late".to_owned(),
        });

        assert_eq!(applied, None);
        assert_eq!(titled, None);
        assert_eq!(controller.revision(), revision);
        assert_eq!(controller.get(a).map(|record| record.title.as_str()), Some(""));
    }

    #[test]
    fn closing_loading_tab_drops_late_callbacks() {
        let (mut controller, _clock, _home) = seeded_controller();
        let loading = controller.open("https://slow.test", false).expect("open slow");
        controller.open("https://b", false).expect("open b");
        let handle = handle_of(&controller, loading);
        assert!(controller
            .get(loading)
            .and_then(|record| record.live())
            .is_some_and(|live| live.loading));

        controller.close(loading).expect("loading tab closes");
        let revision = controller.revision();

        assert_eq!(
            controller.handle_page_event(PageEvent::LoadFinished { handle, ok: true }),
            None
        );
        assert_eq!(
            controller.handle_page_event(PageEvent::TitleChanged {
                handle,
                title: "Slow".to_owned(),
            }),
            None
        );
        assert_eq!(
            controller.handle_page_event(url_changed(handle, "https://slow.test/landed")),
            None
        );
        assert_eq!(controller.revision(), revision);
        assert!(controller.history().is_empty());
        assert!(controller.get(loading).is_none());
        controller.check_invariants().expect("invariants hold");
    }

    #[test]
    fn title_and_url_events_update_metadata() {
        let (mut controller, _clock, _home) = seeded_controller();
        let tab = controller.open("https://a", false).expect("open a");
        let handle = handle_of(&controller, tab);

        controller.handle_page_event(PageEvent::TitleChanged {
            handle,
            title: "Alpha".to_owned(),
        });
        controller.handle_page_event(PageEvent::UrlChanged {
            handle,
            url: "https://a/next".to_owned(),
            can_go_back: true,
            can_go_forward: false,
        });
        controller.handle_page_event(PageEvent::LoadFinished { handle, ok: true });

        let record = controller.get(tab).expect("record");
        assert_eq!(record.display_title(), "Alpha");
        assert_eq!(record.url, "https://a/next");
        let live = record.live().expect("live");
        assert!(live.can_go_back);
        assert!(!live.loading);
        assert_eq!(
            controller.ui().events().last(),
            Some(&TabEvent::TitleChanged {
                tab_id: tab,
                title: "Alpha".to_owned(),
            })
        );
    }

    #[test]
    fn history_records_active_tab_with_dedupe_and_filtering() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let b = controller.open("https://b", false).expect("open b");
        let handle_a = handle_of(&controller, a);
        let handle_b = handle_of(&controller, b);

        controller.handle_page_event(url_changed(handle_b, "https://b/1"));
        controller.handle_page_event(url_changed(handle_b, "https://b/1"));
        controller.handle_page_event(url_changed(handle_b, "about:blank"));
        controller.handle_page_event(url_changed(handle_a, "https://a/background"));
        controller.activate(home).expect("focus home");
        let home_handle = handle_of(&controller, home);
        controller.handle_page_event(url_changed(home_handle, "about:suspended_3"));

        let urls: Vec<&str> = controller
            .history()
            .iter()
            .map(|entry| entry.url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://b/1"]);
        assert_eq!(controller.history()[0].visited_at, 1_700_000_000);
        assert_eq!(controller.persistence().saves(), &[Section::History]);
        assert_eq!(controller.persistence().stored().history.len(), 1);
    }

    #[test]
    fn history_is_trimmed_to_limit() {
        let (mut controller, _clock) = controller_with(LifecycleConfig {
            history_limit: 2,
            ..LifecycleConfig::default()
        });
        let tab = controller.open("https://a", false).expect("open");
        let handle = handle_of(&controller, tab);

        for page in 0..4 {
            controller.handle_page_event(url_changed(handle, &format!("https://a/{page}")));
        }

        let urls: Vec<&str> = controller
            .history()
            .iter()
            .map(|entry| entry.url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://a/2", "https://a/3"]);
    }

    #[test]
    fn bookmarks_deduplicate_by_url() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        controller.open("https://b", false).expect("open b");

        assert_eq!(controller.bookmark(a), Ok(true));
        assert_eq!(controller.bookmark(a), Ok(false));
        controller.activate(home).expect("focus home");
        controller.suspend(a).expect("suspend a");
        assert_eq!(controller.bookmark(a), Ok(false));
        assert_eq!(
            controller.bookmark(TabId(999)),
            Err(LifecycleError::NotFound(TabId(999)))
        );

        assert_eq!(controller.bookmarks().len(), 1);
        assert_eq!(controller.persistence().stored().bookmarks.len(), 1);
    }

    #[test]
    fn navigate_requires_live_tab() {
        let (mut controller, _clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        controller.open("https://b", false).expect("open b");

        controller.navigate(a, "example.org").expect("live tab navigates");
        let handle = handle_of(&controller, a);
        assert_eq!(
            controller.engine().calls().last(),
            Some(&EngineCall::Navigated {
                handle,
                url: "https://example.org".to_owned(),
            })
        );

        controller.activate(home).expect("focus home");
        controller.suspend(a).expect("suspend a");
        assert_eq!(
            controller.navigate(a, "https://c"),
            Err(LifecycleError::NotLive(a))
        );
    }

    #[test]
    fn back_and_forward_follow_engine_flags() {
        let (mut controller, _clock, home) = seeded_controller();
        let tab = controller.open("https://a", false).expect("open a");
        controller.open("https://b", false).expect("open b");
        let handle = handle_of(&controller, tab);

        assert!(matches!(
            controller.go_back(tab),
            Err(LifecycleError::InvalidTransition {
                operation: "go back",
                ..
            })
        ));

        controller.handle_page_event(PageEvent::LoadFinished { handle, ok: true });
        controller.handle_page_event(PageEvent::UrlChanged {
            handle,
            url: "https://a/2".to_owned(),
            can_go_back: true,
            can_go_forward: false,
        });
        controller.go_back(tab).expect("history allows going back");
        assert_eq!(
            controller.engine().calls().last(),
            Some(&EngineCall::WentBack { handle })
        );
        assert!(controller
            .get(tab)
            .and_then(|record| record.live())
            .is_some_and(|live| live.loading));
        assert!(matches!(
            controller.go_forward(tab),
            Err(LifecycleError::InvalidTransition {
                operation: "go forward",
                ..
            })
        ));

        controller.reload(tab).expect("live tab reloads");
        assert_eq!(
            controller.engine().calls().last(),
            Some(&EngineCall::Reloaded { handle })
        );

        controller.activate(home).expect("focus home");
        controller.suspend(tab).expect("suspend a");
        assert_eq!(controller.go_back(tab), Err(LifecycleError::NotLive(tab)));
        assert_eq!(controller.go_forward(tab), Err(LifecycleError::NotLive(tab)));
        assert_eq!(controller.reload(tab), Err(LifecycleError::NotLive(tab)));
        assert_eq!(
            controller.reload(TabId(404)),
            Err(LifecycleError::NotFound(TabId(404)))
        );
    }

    #[test]
    fn clear_history_empties_and_persists() {
        let (mut controller, _clock, _home) = seeded_controller();
        let tab = controller.open("https://a", false).expect("open a");
        let handle = handle_of(&controller, tab);
        controller.handle_page_event(url_changed(handle, "https://a/1"));
        assert_eq!(controller.persistence().stored().history.len(), 1);

        assert_eq!(
            controller.dispatch(Intent::ClearHistory),
            Ok(Outcome::Applied)
        );

        assert!(controller.history().is_empty());
        assert!(controller.persistence().stored().history.is_empty());
        assert_eq!(
            controller.persistence().saves(),
            &[Section::History, Section::History]
        );
    }

    #[test]
    fn go_home_focuses_existing_pinned_tab() {
        let (mut controller, _clock, home) = seeded_controller();
        controller.open("https://a", false).expect("open a");

        assert_eq!(controller.dispatch(Intent::GoHome), Ok(Outcome::Activated(home)));
        assert_eq!(controller.active_id(), Some(home));
        assert_eq!(controller.registry().len(), 2);
    }

    #[test]
    fn last_active_updates_only_on_focus_transitions() {
        let (mut controller, clock, home) = seeded_controller();
        let a = controller.open("https://a", false).expect("open a");
        let opened_at = controller.get(a).map(|record| record.last_active_at);

        clock.advance(Duration::from_secs(30));
        controller.activate(a).expect("already active");
        assert_eq!(controller.get(a).map(|record| record.last_active_at), opened_at);

        controller.activate(home).expect("focus home");
        controller.activate(a).expect("refocus a");
        assert_eq!(
            controller.get(a).map(|record| record.last_active_at),
            Some(controller.now())
        );
    }

    #[test]
    fn update_config_persists_settings() {
        let (mut controller, _clock, _home) = seeded_controller();
        let config = LifecycleConfig {
            max_tabs: 5,
            suspend_enabled: false,
            ..LifecycleConfig::default()
        };

        controller.update_config(config.clone()).expect("valid config");

        assert_eq!(controller.config(), &config);
        assert_eq!(controller.persistence().stored().settings, config);
        assert!(controller
            .update_config(LifecycleConfig {
                max_tabs: 0,
                ..LifecycleConfig::default()
            })
            .is_err());
        assert_eq!(controller.config(), &config);
    }

    #[test]
    fn seeded_churn_preserves_invariants() {
        let (mut controller, clock) = controller_with(LifecycleConfig {
            max_tabs: 8,
            idle_threshold_secs: 20,
            ..LifecycleConfig::default()
        });
        controller.go_home().expect("home");
        controller.open("https://seed.test", false).expect("seed tab");
        let mut scheduler = EvictionScheduler::new();
        let mut seed = 0x7ab5_u64;

        for step in 0..2_000 {
            let ids: Vec<TabId> = controller.sequence().iter().collect();
            let target = ids[rand_index(&mut seed, ids.len())];
            let result = match rand_index(&mut seed, 8) {
                0 | 1 => controller
                    .open(&format!("https://{step}.test"), false)
                    .map(|_| ()),
                2 => controller.activate(target),
                3 => controller.close(target),
                4 => controller.suspend(target).map(|_| ()),
                5 => controller.move_tab(target, rand_index(&mut seed, 10)),
                6 => {
                    clock.advance(Duration::from_secs(rand_index(&mut seed, 15) as u64));
                    scheduler.sweep(&mut controller);
                    Ok(())
                }
                _ => {
                    let handle = controller
                        .get(target)
                        .and_then(|record| record.live())
                        .map(|live| live.handle)
                        .unwrap_or(PageHandle(u64::MAX));
                    let url = format!("https://{step}.next");
                    controller.handle_page_event(url_changed(handle, &url));
                    Ok(())
                }
            };

            if let Err(error) = result {
                assert!(!error.is_internal(), "step {step}: unexpected {error}");
            }
            controller
                .check_invariants()
                .unwrap_or_else(|error| panic!("step {step}: {error}"));
            assert_eq!(controller.list().len(), controller.registry().len());
            assert!(controller.sequence().regular_len() >= 1);
            assert!(controller.sequence().regular_len() <= 8);
            assert_eq!(
                controller.engine().live_handles().len(),
                controller
                    .registry()
                    .iter()
                    .filter(|record| record.is_live())
                    .count()
            );
        }
    }
}
