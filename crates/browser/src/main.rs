use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use consent_browser::{ConsentWorker, LaunchConfig};
use consent_core::AutoAction;
use consent_storage::{JsonFileStore, KeyValueStore, MemoryStore, install_rules, load_or_init_config, load_rules};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Opens a page in Chromium and deals with its cookie consent popup.
#[derive(Parser, Debug)]
#[command(name = "consent-pilot", version, about)]
struct Cli {
    /// Page to open
    url: String,

    /// What to do with a detected popup; defaults to the stored config
    #[arg(long, value_enum)]
    action: Option<ActionArg>,

    /// Rule set to install before the run
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Folder for persisted config and rules; in-memory when omitted
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Upper bound on the whole run
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    OptOut,
    OptIn,
    None,
}

impl From<ActionArg> for AutoAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::OptOut => AutoAction::OptOut,
            ActionArg::OptIn => AutoAction::OptIn,
            ActionArg::None => AutoAction::DoNothing,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store: Box<dyn KeyValueStore> = match &cli.store {
        Some(dir) => Box::new(JsonFileStore::new(dir)?),
        None => Box::new(MemoryStore::new()),
    };
    let mut config = load_or_init_config(store.as_ref()).await?;
    if let Some(action) = cli.action {
        config = config.with_auto_action(action.into());
    }
    let rules = match &cli.rules {
        Some(path) => install_rules(store.as_ref(), path).await?,
        None => load_rules(store.as_ref()).await?,
    };

    let mut launch = LaunchConfig::default().with_run_budget(cli.timeout_secs);
    if cli.headful {
        launch = launch.headful();
    }
    let worker = ConsentWorker::launch(launch).await?;

    let report = worker
        .run(&cli.url, config, rules, |message| match serde_json::to_string(message) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "unprintable message"),
        })
        .await;
    worker.shutdown().await?;
    let report = report?;

    info!(
        url = %report.url,
        cmp = report.found_cmp.as_deref().unwrap_or("none"),
        phase = ?report.phase,
        messages = report.messages.len(),
        timed_out = report.timed_out,
        "run finished"
    );
    Ok(())
}
