use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{LifecycleError, LifecycleResult};
use crate::ids::{PageHandle, ResurrectToken, TabId};
use crate::page::PageEngine;
use crate::state::{LiveResource, SuspendedPlaceholder, TabRecord, TabResource, TabState};

/// Single source of truth for tab records. Owns the `TabId -> record` arena
/// and the `PageHandle -> TabId` index used to route engine callbacks; the
/// two are only ever updated together.
#[derive(Debug)]
pub struct ResourceRegistry {
    records: BTreeMap<TabId, TabRecord>,
    handles: HashMap<PageHandle, TabId>,
    max_live_tabs: Option<usize>,
    next_tab_id: u64,
    next_epoch: u64,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResourceRegistry {
    pub fn new(max_live_tabs: Option<usize>) -> Self {
        Self {
            records: BTreeMap::new(),
            handles: HashMap::new(),
            max_live_tabs,
            next_tab_id: 1,
            next_epoch: 1,
        }
    }

    pub fn set_max_live_tabs(&mut self, max_live_tabs: Option<usize>) {
        self.max_live_tabs = max_live_tabs;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.records.contains_key(&tab_id)
    }

    /// Absence is a normal outcome: eviction and close race with callers.
    pub fn get(&self, tab_id: TabId) -> Option<&TabRecord> {
        self.records.get(&tab_id)
    }

    pub(crate) fn get_mut(&mut self, tab_id: TabId) -> Option<&mut TabRecord> {
        self.records.get_mut(&tab_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabRecord> {
        self.records.values()
    }

    pub fn tab_for_handle(&self, handle: PageHandle) -> Option<TabId> {
        self.handles.get(&handle).copied()
    }

    pub fn live_regular_count(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.is_live() && !record.pinned)
            .count()
    }

    pub fn pinned_id(&self) -> Option<TabId> {
        self.records
            .values()
            .find(|record| record.pinned)
            .map(|record| record.id)
    }

    pub fn create<E: PageEngine>(
        &mut self,
        engine: &mut E,
        pinned: bool,
        url: &str,
        now: Instant,
    ) -> LifecycleResult<TabId> {
        if !pinned {
            if let Some(limit) = self.max_live_tabs {
                if self.live_regular_count() >= limit {
                    return Err(LifecycleError::CapacityExceeded { limit });
                }
            }
        }

        let tab_id = self.allocate_tab_id();
        let handle = engine.create(url);
        self.handles.insert(handle, tab_id);
        self.records.insert(
            tab_id,
            TabRecord {
                id: tab_id,
                title: String::new(),
                url: url.to_owned(),
                last_active_at: now,
                pinned,
                resource: TabResource::Live(LiveResource::new(handle, url.to_owned())),
            },
        );
        debug!(tab_id = %tab_id, handle = %handle, pinned, url, "tab record created");
        Ok(tab_id)
    }

    pub fn mark_active(&mut self, tab_id: TabId, now: Instant) -> LifecycleResult<()> {
        let record = self
            .records
            .get_mut(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if !record.is_live() {
            return Err(LifecycleError::NotLive(tab_id));
        }
        record.last_active_at = now;
        Ok(())
    }

    pub fn suspend<E: PageEngine>(
        &mut self,
        engine: &mut E,
        tab_id: TabId,
        active: Option<TabId>,
    ) -> LifecycleResult<ResurrectToken> {
        let record = self
            .records
            .get(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let operation = if record.pinned {
            Some("suspend pinned")
        } else if active == Some(tab_id) {
            Some("suspend active")
        } else if !record.is_live() {
            Some("suspend")
        } else {
            None
        };
        if let Some(operation) = operation {
            return Err(LifecycleError::InvalidTransition {
                tab_id,
                state: record.state(),
                operation,
            });
        }

        let token = ResurrectToken {
            tab_id,
            epoch: self.allocate_epoch(),
        };
        let record = self
            .records
            .get_mut(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let TabResource::Live(live) = &record.resource else {
            return Err(LifecycleError::internal(format!(
                "{tab_id} lost its live resource during suspension"
            )));
        };
        let handle = live.handle;
        let placeholder = SuspendedPlaceholder {
            url: live.url.clone(),
            title: record.title.clone(),
            token,
        };
        record.url = placeholder.url.clone();
        record.resource = TabResource::Suspended(placeholder);
        self.handles.remove(&handle);
        engine.destroy(handle);

        info!(tab_id = %tab_id, handle = %handle, url = %record.url, "tab suspended");
        Ok(token)
    }

    pub fn resurrect<E: PageEngine>(
        &mut self,
        engine: &mut E,
        tab_id: TabId,
    ) -> LifecycleResult<PageHandle> {
        let record = self
            .records
            .get_mut(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        let TabResource::Suspended(placeholder) = &record.resource else {
            return Err(LifecycleError::InvalidTransition {
                tab_id,
                state: TabState::Live,
                operation: "resurrect",
            });
        };

        let url = placeholder.url.clone();
        let handle = engine.create(&url);
        record.url = url.clone();
        record.resource = TabResource::Live(LiveResource::new(handle, url));
        self.handles.insert(handle, tab_id);

        info!(tab_id = %tab_id, handle = %handle, url = %record.url, "tab resurrected");
        Ok(handle)
    }

    pub fn destroy<E: PageEngine>(
        &mut self,
        engine: &mut E,
        tab_id: TabId,
    ) -> LifecycleResult<TabRecord> {
        let record = self
            .records
            .get(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if record.pinned {
            return Err(LifecycleError::CannotClosePinned(tab_id));
        }
        self.discard(engine, tab_id)
    }

    /// Tears a record down without the pinned guard. Used to undo a
    /// half-applied open.
    pub(crate) fn discard<E: PageEngine>(
        &mut self,
        engine: &mut E,
        tab_id: TabId,
    ) -> LifecycleResult<TabRecord> {
        let record = self
            .records
            .remove(&tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        if let TabResource::Live(live) = &record.resource {
            self.handles.remove(&live.handle);
            engine.destroy(live.handle);
        }
        debug!(tab_id = %tab_id, state = ?record.state(), "tab record destroyed");
        Ok(record)
    }

    pub(crate) fn verify_handle_index(&self) -> LifecycleResult<()> {
        let live = self
            .records
            .values()
            .filter_map(|record| record.live().map(|live| (live.handle, record.id)));
        let mut live_count = 0;
        for (handle, tab_id) in live {
            live_count += 1;
            if self.handles.get(&handle) != Some(&tab_id) {
                return Err(LifecycleError::internal(format!(
                    "{handle} of {tab_id} is missing from the handle index"
                )));
            }
        }
        if live_count != self.handles.len() {
            return Err(LifecycleError::internal(format!(
                "handle index holds {} entries for {live_count} live tabs",
                self.handles.len()
            )));
        }
        Ok(())
    }

    fn allocate_tab_id(&mut self) -> TabId {
        let id = TabId(self.next_tab_id);
        self.next_tab_id += 1;
        id
    }

    fn allocate_epoch(&mut self) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        epoch
    }

    #[cfg(test)]
    pub(crate) fn handle_index_len(&self) -> usize {
        self.handles.len()
    }
}
