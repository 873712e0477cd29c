use crate::error::{LifecycleError, LifecycleResult};
use crate::ids::TabId;

/// On-screen tab order. The pinned tab is a distinguished slot kept out of the
/// regular order, so index arithmetic on user-ordered tabs never has to skip
/// it. Display positions put the pinned tab first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSequence {
    pinned: Option<TabId>,
    order: Vec<TabId>,
}

impl TabSequence {
    pub fn pinned(&self) -> Option<TabId> {
        self.pinned
    }

    pub fn regular(&self) -> &[TabId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len() + self.pinned_offset()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn regular_len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.pinned == Some(tab_id) || self.order.contains(&tab_id)
    }

    /// Display order, pinned first.
    pub fn iter(&self) -> impl Iterator<Item = TabId> + '_ {
        self.pinned.into_iter().chain(self.order.iter().copied())
    }

    pub fn index_of(&self, tab_id: TabId) -> Option<usize> {
        if self.pinned == Some(tab_id) {
            return Some(0);
        }
        self.regular_index_of(tab_id)
            .map(|index| index + self.pinned_offset())
    }

    pub fn regular_index_of(&self, tab_id: TabId) -> Option<usize> {
        self.order.iter().position(|id| *id == tab_id)
    }

    pub fn insert_pinned(&mut self, tab_id: TabId) -> LifecycleResult<usize> {
        if let Some(existing) = self.pinned {
            return Err(LifecycleError::PinnedAlreadyOpen(existing));
        }
        self.ensure_absent(tab_id)?;
        self.pinned = Some(tab_id);
        Ok(0)
    }

    /// Inserts into the regular order at `position` (clamped) and returns the
    /// resulting display position.
    pub fn insert_at(&mut self, position: usize, tab_id: TabId) -> LifecycleResult<usize> {
        self.ensure_absent(tab_id)?;
        let insert_at = position.min(self.order.len());
        self.order.insert(insert_at, tab_id);
        Ok(insert_at + self.pinned_offset())
    }

    pub fn push(&mut self, tab_id: TabId) -> LifecycleResult<usize> {
        self.insert_at(self.order.len(), tab_id)
    }

    /// Removes `tab_id` and returns the display position it occupied.
    pub fn remove(&mut self, tab_id: TabId) -> LifecycleResult<usize> {
        if self.pinned == Some(tab_id) {
            self.pinned = None;
            return Ok(0);
        }
        let index = self
            .regular_index_of(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        self.order.remove(index);
        Ok(index + self.pinned_offset())
    }

    /// Moves a regular tab to `position` (clamped) within the regular order.
    /// Returns the display positions before and after the move.
    pub fn move_to(&mut self, tab_id: TabId, position: usize) -> LifecycleResult<(usize, usize)> {
        let from = self
            .regular_index_of(tab_id)
            .ok_or(LifecycleError::NotFound(tab_id))?;
        self.order.remove(from);
        let to = position.min(self.order.len());
        self.order.insert(to, tab_id);
        let offset = self.pinned_offset();
        Ok((from + offset, to + offset))
    }

    /// Focus successor after the regular tab at `regular_index` was removed:
    /// the tab now at that index, else the previous one, else the pinned tab.
    pub fn successor_for(&self, regular_index: usize) -> Option<TabId> {
        self.order
            .get(regular_index)
            .copied()
            .or_else(|| {
                regular_index
                    .checked_sub(1)
                    .and_then(|previous| self.order.get(previous).copied())
            })
            .or_else(|| self.order.last().copied())
            .or(self.pinned)
    }

    fn ensure_absent(&self, tab_id: TabId) -> LifecycleResult<()> {
        if self.contains(tab_id) {
            return Err(LifecycleError::internal(format!(
                "{tab_id} is already in the tab sequence"
            )));
        }
        Ok(())
    }

    fn pinned_offset(&self) -> usize {
        usize::from(self.pinned.is_some())
    }
}
