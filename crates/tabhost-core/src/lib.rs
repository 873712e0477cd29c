pub mod address;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod ids;
pub mod intent;
pub mod page;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod sequence;
pub mod state;
pub mod sync;

pub use address::normalize_url;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LifecycleConfig};
pub use controller::LifecycleController;
pub use error::{LifecycleError, LifecycleResult};
pub use ids::{PageHandle, ResurrectToken, TabId};
pub use intent::{Intent, Outcome};
pub use page::{EngineCall, PageEngine, PageEvent, RecordingPageEngine};
pub use persistence::{
    Bookmark, HistoryEntry, MemoryPersistence, NoopPersistence, Persistence, Section,
    SitePermissions, StoreSnapshot,
};
pub use registry::ResourceRegistry;
pub use scheduler::{EvictionScheduler, SchedulerState, SweepReport};
pub use sequence::TabSequence;
pub use state::{TabRecord, TabState, TabSummary, DEFAULT_TAB_TITLE};
pub use sync::{RecordingUiSync, TabEvent, UiSync};
