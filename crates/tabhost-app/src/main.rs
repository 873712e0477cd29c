mod bridge;
mod host;
mod logging;
mod persistence;
mod runtime;

use std::path::PathBuf;

use clap::Parser;
use tabhost_core::SystemClock;
use tokio::io::{stdin, BufReader};
use tracing::error;

use persistence::{default_data_dir, JsonFileStore};
use runtime::{AppRuntime, SettingsOverrides};

#[derive(Parser, Debug)]
#[command(name = "tabhost")]
#[command(about = "Headless tab host with idle-tab suspension")]
#[command(version)]
struct Cli {
    /// Directory holding the history, bookmarks, settings and permissions files
    #[arg(long, env = "TABHOST_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Maximum number of regular tabs
    #[arg(long)]
    max_tabs: Option<usize>,

    /// Seconds a background tab may stay idle before it is suspended
    #[arg(long)]
    idle_threshold_secs: Option<u64>,

    /// Seconds between eviction sweeps
    #[arg(long)]
    sweep_interval_secs: Option<u64>,

    /// Never suspend idle tabs
    #[arg(long)]
    no_suspend: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            max_tabs: self.max_tabs,
            idle_threshold_secs: self.idle_threshold_secs,
            sweep_interval_secs: self.sweep_interval_secs,
            no_suspend: self.no_suspend,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(message) = run(cli).await {
        error!(error = %message, "tabhost exited with an error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir().map_err(|error| error.to_string())?,
    };
    let store = JsonFileStore::open(&data_dir)
        .map_err(|error| format!("failed to open store at {}: {error}", data_dir.display()))?;

    let mut runtime =
        AppRuntime::bootstrap(store, &cli.overrides(), std::io::stdout(), SystemClock)
            .map_err(|error| format!("bootstrap failed: {error}"))?;
    runtime
        .run(BufReader::new(stdin()))
        .await
        .map_err(|error| format!("event loop failed: {error}"))
}
