use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;
use tabhost_core::{
    Clock, ConfigError, EvictionScheduler, LifecycleConfig, LifecycleController, LifecycleError,
    Outcome, PageEvent, Persistence, ResurrectToken, SweepReport, TabId, TabSummary,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bridge::UiCommand;
use crate::host::{HeadlessPageEngine, JsonLinesUiSync};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to load store: {0}")]
    Load(String),
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("startup failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("input error: {0}")]
    Io(#[from] io::Error),
}

/// Why a single host command was rejected. Never stops the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
}

impl CommandError {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Lifecycle(error) if error.is_internal())
    }
}

/// Command-line values layered over the persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub max_tabs: Option<usize>,
    pub idle_threshold_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub no_suspend: bool,
}

impl SettingsOverrides {
    pub fn apply(&self, config: &mut LifecycleConfig) {
        if let Some(max_tabs) = self.max_tabs {
            config.max_tabs = max_tabs;
        }
        if let Some(idle) = self.idle_threshold_secs {
            config.idle_threshold_secs = idle;
        }
        if let Some(interval) = self.sweep_interval_secs {
            config.sweep_interval_secs = interval;
        }
        if self.no_suspend {
            config.suspend_enabled = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Opened {
        tab_id: TabId,
    },
    Activated {
        tab_id: TabId,
    },
    Suspended {
        token: ResurrectToken,
    },
    Bookmarked {
        added: bool,
    },
    Ok,
    Settings {
        config: LifecycleConfig,
    },
    Tabs {
        active: Option<TabId>,
        tabs: Vec<TabSummary>,
    },
    Swept {
        report: SweepReport,
    },
    Error {
        message: String,
    },
    Quit,
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Opened(tab_id) => Self::Opened { tab_id },
            Outcome::Activated(tab_id) => Self::Activated { tab_id },
            Outcome::Suspended(token) => Self::Suspended { token },
            Outcome::Bookmarked { added } => Self::Bookmarked { added },
            Outcome::Applied => Self::Ok,
        }
    }
}

type HostController<P, W> = LifecycleController<HeadlessPageEngine, P, JsonLinesUiSync<W>>;

/// The single owner of the controller. User commands, page callbacks and
/// sweep ticks are all serialized through `run`.
pub struct AppRuntime<P: Persistence, W: Write> {
    controller: HostController<P, W>,
    scheduler: EvictionScheduler,
    page_events: UnboundedReceiver<PageEvent>,
}

impl<P: Persistence, W: Write> AppRuntime<P, W> {
    pub fn bootstrap(
        mut persistence: P,
        overrides: &SettingsOverrides,
        out: W,
        clock: impl Clock + 'static,
    ) -> Result<Self, RuntimeError> {
        let mut store = persistence
            .load()
            .map_err(|error| RuntimeError::Load(error.to_string()))?;
        overrides.apply(&mut store.settings);
        info!(
            history = store.history.len(),
            bookmarks = store.bookmarks.len(),
            max_tabs = store.settings.max_tabs,
            suspend_enabled = store.settings.suspend_enabled,
            "store loaded"
        );

        let (engine, page_events) = HeadlessPageEngine::new();
        let mut controller = LifecycleController::with_store(
            store,
            engine,
            persistence,
            JsonLinesUiSync::new(out),
            clock,
        )?;
        controller.go_home()?;
        if controller.sequence().regular_len() == 0 {
            let homepage = controller.config().homepage_url.clone();
            controller.open(&homepage, false)?;
        }

        Ok(Self {
            controller,
            scheduler: EvictionScheduler::new(),
            page_events,
        })
    }

    pub fn controller(&self) -> &HostController<P, W> {
        &self.controller
    }

    pub fn handle_ui_command(&mut self, command: UiCommand) -> Result<Reply, CommandError> {
        match command {
            UiCommand::Settings {
                max_tabs,
                idle_threshold_secs,
                sweep_interval_secs,
                suspend_enabled,
            } => {
                let mut config = self.controller.config().clone();
                let overrides = SettingsOverrides {
                    max_tabs,
                    idle_threshold_secs,
                    sweep_interval_secs,
                    no_suspend: false,
                };
                overrides.apply(&mut config);
                if let Some(enabled) = suspend_enabled {
                    config.suspend_enabled = enabled;
                }
                self.controller.update_config(config)?;
                Ok(Reply::Settings {
                    config: self.controller.config().clone(),
                })
            }
            UiCommand::List => Ok(Reply::Tabs {
                active: self.controller.active_id(),
                tabs: self.controller.list(),
            }),
            UiCommand::Quit => Ok(Reply::Quit),
            other => match other.into_intent() {
                Some(intent) => Ok(Reply::from(self.controller.dispatch(intent)?)),
                None => Ok(Reply::Ok),
            },
        }
    }

    /// Applies every page callback already queued by the engine.
    pub fn drain_page_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.page_events.try_recv() {
            self.controller.handle_page_event(event);
            applied += 1;
        }
        applied
    }

    pub fn sweep(&mut self) -> SweepReport {
        let report = self.scheduler.sweep(&mut self.controller);
        if !report.suspended.is_empty() {
            info!(suspended = report.suspended.len(), "idle tabs suspended");
        }
        report
    }

    /// Lines are read as raw bytes so one undecodable line is answered with
    /// an error reply instead of ending the loop.
    pub async fn run<R>(&mut self, mut input: R) -> Result<(), RuntimeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut period = self.controller.config().sweep_interval();
        let mut ticker = sweep_ticker(period);
        let mut pending = Vec::new();

        loop {
            tokio::select! {
                read = input.read_until(b'\n', &mut pending) => {
                    if read? == 0 {
                        info!("input closed, shutting down");
                        break;
                    }
                    let raw = std::mem::take(&mut pending);
                    if !self.handle_raw_line(raw) {
                        break;
                    }
                    let configured = self.controller.config().sweep_interval();
                    if configured != period {
                        debug!(secs = configured.as_secs(), "sweep interval changed");
                        period = configured;
                        ticker = sweep_ticker(period);
                    }
                }
                Some(event) = self.page_events.recv() => {
                    self.controller.handle_page_event(event);
                }
                _ = ticker.tick() => {
                    let report = self.sweep();
                    if !report.suspended.is_empty() || !report.failed.is_empty() {
                        self.reply(&Reply::Swept { report });
                    }
                }
            }
        }
        self.drain_page_events();
        Ok(())
    }

    fn handle_raw_line(&mut self, raw: Vec<u8>) -> bool {
        match String::from_utf8(raw) {
            Ok(line) => self.handle_line(&line),
            Err(decode_error) => {
                warn!(error = %decode_error, "command line is not valid utf-8");
                self.reply(&Reply::Error {
                    message: format!("invalid command: {decode_error}"),
                });
                true
            }
        }
    }

    /// Returns false once the host should stop.
    fn handle_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        let command = match serde_json::from_str::<UiCommand>(line) {
            Ok(command) => command,
            Err(parse_error) => {
                warn!(error = %parse_error, "unparseable command");
                self.reply(&Reply::Error {
                    message: format!("invalid command: {parse_error}"),
                });
                return true;
            }
        };
        debug!(command = ?command, "ui command");

        let reply = match self.handle_ui_command(command) {
            Ok(reply) => reply,
            Err(failure) => {
                if failure.is_internal() {
                    error!(error = %failure, "internal lifecycle error");
                } else {
                    warn!(error = %failure, "command rejected");
                }
                Reply::Error {
                    message: failure.to_string(),
                }
            }
        };
        let keep_running = reply != Reply::Quit;
        self.reply(&reply);
        keep_running
    }

    fn reply(&mut self, reply: &Reply) {
        self.controller.ui_mut().emit(reply);
    }
}

fn sweep_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
