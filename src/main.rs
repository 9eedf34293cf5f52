//! Splash launcher
//!
//! Checks the release feed for updates, handles maintenance windows and
//! starts the main application when everything is in order.

mod console_host;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use splash_updater::{
    launcher_channel, Collaborators, HttpFetcher, HttpMaintenanceStatus, LauncherConfig,
    LauncherController, Outcome, Platform, ReleaseApi, ReleaseFeedUpdater, TimedHttpClient,
    TracingLog, UpdateOrchestrator,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::console_host::{forward_user_input, ConsoleHost};

/// Command-line arguments for the launcher
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository URL whose releases are checked (https://github.com/owner/repo)
    #[arg(long)]
    repository: Option<String>,

    /// Maintenance status endpoint
    #[arg(long)]
    status_url: Option<String>,

    /// Override the detected platform (windows, macos, linux)
    #[arg(long)]
    platform: Option<Platform>,

    /// Command that starts the main application
    #[arg(long)]
    launch: Option<String>,

    /// Open the developer tools when the update window starts
    #[arg(long, default_value_t = false)]
    dev_tools: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug,splash_updater=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();

    let mut config = LauncherConfig::load(args.config.as_deref())?;
    if let Some(repository) = args.repository {
        config = config.repository_url(repository);
    }
    if let Some(status_url) = args.status_url {
        config = config.status_url(status_url);
    }
    if let Some(platform) = args.platform {
        config = config.platform(platform);
    }
    if args.dev_tools {
        config = config.open_dev_tools(true);
    }
    let timeout = config.fetch_timeout_duration();
    info!(
        platform = %config.effective_platform(),
        repository = %config.repository_url,
        "starting launcher v{}",
        env!("CARGO_PKG_VERSION")
    );

    let log = TracingLog::shared();
    let http = TimedHttpClient::builder()
        .user_agent(config.user_agent.clone())
        .default_timeout(timeout)
        .log(log.clone())
        .build()?;
    let fetcher: Arc<dyn HttpFetcher> = Arc::new(http.clone());
    let releases = ReleaseApi::new(fetcher.clone(), config.api_root.clone(), timeout);

    let (events, inbox) = launcher_channel();
    let updater = ReleaseFeedUpdater::new(
        releases.clone(),
        http.http_client().clone(),
        config.repository_url.clone(),
        semver::Version::parse(env!("CARGO_PKG_VERSION"))?,
        events.clone(),
        log.clone(),
    );
    let maintenance = HttpMaintenanceStatus::new(fetcher, config.status_url.clone(), timeout);

    let orchestrator = UpdateOrchestrator::new(
        &config,
        Collaborators {
            updater: Arc::new(updater),
            maintenance: Arc::new(maintenance),
            host: Arc::new(ConsoleHost::new(args.launch)),
            releases,
            log,
        },
    );
    let controller = LauncherController::launch(orchestrator, inbox);
    forward_user_input(events);

    match controller.wait().await? {
        Outcome::Launched => info!("handed over to the main application"),
        Outcome::ShutDown { message } => info!(%message, "launcher shut down"),
    }
    Ok(())
}
