use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// Stable identity of one logical tab. Minted once by the registry and never
/// reused, so it survives suspension, resurrection and reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl Display for TabId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "tab:{}", self.0)
    }
}

/// Handle to a page-engine instance. Minted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageHandle(pub u64);

impl Display for PageHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "page:{}", self.0)
    }
}

/// Issued when a tab is suspended; redeemed by the placeholder's reload
/// affordance. Resolution goes through `tab_id`, never through position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResurrectToken {
    pub tab_id: TabId,
    pub epoch: u64,
}

impl Display for ResurrectToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}#{}", self.tab_id, self.epoch)
    }
}
