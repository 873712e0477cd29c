use serde::Serialize;
use tracing::{debug, warn};

use crate::controller::LifecycleController;
use crate::ids::TabId;
use crate::page::PageEngine;
use crate::persistence::Persistence;
use crate::sync::UiSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scanning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub suspended: Vec<TabId>,
    pub failed: Vec<TabId>,
    /// Set when suspension is disabled and the sweep did nothing.
    pub skipped: bool,
}

/// Periodic idle-tab eviction. The sweep borrows the controller mutably, so
/// it always runs on the controller's owner, serialized with user intents.
#[derive(Debug)]
pub struct EvictionScheduler {
    state: SchedulerState,
    sweeps: u64,
}

impl Default for EvictionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            sweeps: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn sweep<E, P, U>(&mut self, controller: &mut LifecycleController<E, P, U>) -> SweepReport
    where
        E: PageEngine,
        P: Persistence,
        U: UiSync,
    {
        self.sweeps += 1;
        if !controller.config().suspend_enabled {
            debug!(sweep = self.sweeps, "suspension disabled, skipping sweep");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        }

        self.state = SchedulerState::Scanning;
        let candidates = idle_candidates(controller);
        let mut report = SweepReport::default();
        for tab_id in candidates {
            match controller.suspend(tab_id) {
                Ok(_) => report.suspended.push(tab_id),
                Err(error) => {
                    warn!(tab_id = %tab_id, error = %error, "sweep failed to suspend tab");
                    report.failed.push(tab_id);
                }
            }
        }
        self.state = SchedulerState::Idle;

        debug!(
            sweep = self.sweeps,
            suspended = report.suspended.len(),
            failed = report.failed.len(),
            "eviction sweep finished"
        );
        report
    }
}

fn idle_candidates<E, P, U>(controller: &LifecycleController<E, P, U>) -> Vec<TabId>
where
    E: PageEngine,
    P: Persistence,
    U: UiSync,
{
    let now = controller.now();
    let threshold = controller.config().idle_threshold();
    let active = controller.active_id();
    controller
        .registry()
        .iter()
        .filter(|record| record.is_live() && !record.pinned && Some(record.id) != active)
        .filter(|record| now.saturating_duration_since(record.last_active_at) > threshold)
        .map(|record| record.id)
        .collect()
}
