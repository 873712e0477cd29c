use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    History,
    Bookmarks,
    Settings,
    Permissions,
}

impl Section {
    pub fn name(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Bookmarks => "bookmarks",
            Self::Settings => "settings",
            Self::Permissions => "permissions",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    pub visited_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub title: String,
}

/// Origin -> feature -> decision. Carried through untouched by the core.
pub type SitePermissions = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
    #[serde(default)]
    pub settings: LifecycleConfig,
    #[serde(default)]
    pub permissions: SitePermissions,
}

/// External document store. The controller writes through on
/// history-affecting events; a failed write never fails a tab transition.
pub trait Persistence {
    type Error: Display;

    fn load(&mut self) -> Result<StoreSnapshot, Self::Error>;

    fn save(&mut self, section: Section, snapshot: &StoreSnapshot) -> Result<(), Self::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPersistence;

impl Persistence for NoopPersistence {
    type Error = Infallible;

    fn load(&mut self) -> Result<StoreSnapshot, Self::Error> {
        Ok(StoreSnapshot::default())
    }

    fn save(&mut self, _section: Section, _snapshot: &StoreSnapshot) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Keeps the last written snapshot and the order of section writes.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: StoreSnapshot,
    saves: Vec<Section>,
}

impl MemoryPersistence {
    pub fn with_snapshot(stored: StoreSnapshot) -> Self {
        Self {
            stored,
            saves: Vec::new(),
        }
    }

    pub fn stored(&self) -> &StoreSnapshot {
        &self.stored
    }

    pub fn saves(&self) -> &[Section] {
        &self.saves
    }
}

impl Persistence for MemoryPersistence {
    type Error = Infallible;

    fn load(&mut self) -> Result<StoreSnapshot, Self::Error> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, section: Section, snapshot: &StoreSnapshot) -> Result<(), Self::Error> {
        match section {
            Section::History => self.stored.history = snapshot.history.clone(),
            Section::Bookmarks => self.stored.bookmarks = snapshot.bookmarks.clone(),
            Section::Settings => self.stored.settings = snapshot.settings.clone(),
            Section::Permissions => self.stored.permissions = snapshot.permissions.clone(),
        }
        self.saves.push(section);
        Ok(())
    }
}
