//! Startup update orchestration for the splash launcher.
//!
//! The splash window checks for updates before handing over to the main
//! application. An external updater reports its verdict on a single event
//! channel; the [`UpdateOrchestrator`] reacts by starting a native update,
//! offering a manual download resolved from the public release feed, or
//! querying the maintenance status. Every run ends by launching the main
//! window or by showing a message with a short countdown.
//!
//! ```ignore
//! use std::sync::Arc;
//! use splash_updater::*;
//!
//! # async fn demo(host: Arc<dyn LauncherHost>) -> splash_updater::Result<()> {
//! let config = LauncherConfig::load(None)?;
//! let log = TracingLog::shared();
//! let http = TimedHttpClient::builder().log(log.clone()).build()?;
//! let fetcher: Arc<dyn HttpFetcher> = Arc::new(http.clone());
//! let releases = ReleaseApi::new(fetcher.clone(), &config.api_root, config.fetch_timeout_duration());
//!
//! let (events, inbox) = launcher_channel();
//! let updater = ReleaseFeedUpdater::new(
//!     releases.clone(),
//!     http.http_client().clone(),
//!     &config.repository_url,
//!     semver::Version::parse(env!("CARGO_PKG_VERSION"))?,
//!     events.clone(),
//!     log.clone(),
//! );
//! let maintenance = HttpMaintenanceStatus::new(fetcher, config.status_url.clone(), config.fetch_timeout_duration());
//!
//! let orchestrator = UpdateOrchestrator::new(&config, Collaborators {
//!     updater: Arc::new(updater),
//!     maintenance: Arc::new(maintenance),
//!     host,
//!     releases,
//!     log,
//! });
//! let controller = LauncherController::launch(orchestrator, inbox);
//! match controller.wait().await? {
//!     Outcome::Launched => println!("main window open"),
//!     Outcome::ShutDown { message } => println!("closed: {message}"),
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod countdown;
mod error;
mod events;
mod feed;
mod fetcher;
mod host;
mod logging;
mod maintenance;
mod orchestrator;
mod platform;
mod progress;
mod release;
mod release_api;

pub use config::{
    LauncherConfig, ENV_DEV_TOOLS, ENV_FETCH_TIMEOUT_MS, ENV_PLATFORM, ENV_REPOSITORY_URL,
    ENV_STATUS_URL,
};
pub use countdown::{Countdown, DEFAULT_COUNTDOWN_SECS};
pub use error::{Result, UpdaterError};
pub use events::{launcher_channel, EventInbox, EventSender, LauncherEvent};
pub use feed::{native_installer_filter, ReleaseFeedUpdater, UpdateSource};
pub use fetcher::{
    FetchedBody, HttpFetcher, TimedHttpClient, TimedHttpClientBuilder, DEFAULT_FETCH_TIMEOUT,
};
pub use host::LauncherHost;
pub use logging::{EventLog, LogEntry, LogLevel, MemoryLog, TracingLog};
pub use maintenance::{HttpMaintenanceStatus, LauncherStatus, MaintenanceStatus};
pub use orchestrator::{
    Collaborators, DownloadStatus, LauncherController, OrchestratorState, Outcome,
    UpdateOrchestrator, MSG_DOWNLOADING, MSG_INSTALLING, MSG_MAINTENANCE, MSG_NO_ASSET,
    MSG_OFFLINE, MSG_UPDATER_GONE, STATUS_CHECKING, STATUS_READY_TO_DOWNLOAD, STATUS_STARTING,
    STATUS_UPDATE_AVAILABLE,
};
pub use platform::Platform;
pub use progress::{estimate, Eta, ProgressSample, RemainingTime, TransferEstimate};
pub use release::{select_asset, AssetFilter, Release, ReleaseAsset, RepositoryCoordinates};
pub use release_api::ReleaseApi;
