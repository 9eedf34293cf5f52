//! Startup update state machine.
//!
//! The orchestrator is the single consumer of the launcher event channel and
//! the only writer of the splash status, the progress indicator and its own
//! state. Every run ends in exactly one terminal state: `Launching` or
//! `ShuttingDown`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::LauncherConfig;
use crate::countdown::Countdown;
use crate::error::{Result, UpdaterError};
use crate::events::{EventInbox, LauncherEvent};
use crate::feed::UpdateSource;
use crate::host::LauncherHost;
use crate::logging::EventLog;
use crate::maintenance::MaintenanceStatus;
use crate::platform::Platform;
use crate::progress::{ProgressSample, TransferEstimate};
use crate::release::{ReleaseAsset, RepositoryCoordinates};
use crate::release_api::ReleaseApi;

pub const STATUS_CHECKING: &str = "Checking for updates...";
pub const STATUS_UPDATE_AVAILABLE: &str = "Update available!";
pub const STATUS_READY_TO_DOWNLOAD: &str = "Update ready to download";
pub const STATUS_STARTING: &str = "Starting launcher";
pub const MSG_NO_ASSET: &str = "No asset found for your OS";
pub const MSG_OFFLINE: &str = "No internet connection detected.";
pub const MSG_MAINTENANCE: &str = "The launcher is under maintenance.";
pub const MSG_DOWNLOADING: &str = "Download in progress...";
pub const MSG_INSTALLING: &str = "Installing update...";
pub const MSG_UPDATER_GONE: &str = "The updater stopped responding.";

/// Progress of the native update download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadStatus {
    pub transferred: u64,
    pub total: u64,
    /// `None` until the first progress sample arrives.
    pub estimate: Option<TransferEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OrchestratorState {
    Idle,
    CheckingUpdate,
    UpdateAvailable,
    Downloading(DownloadStatus),
    AwaitingUserDownload(ReleaseAsset),
    MaintenanceCheck,
    Launching,
    ShuttingDown { message: String, remaining_secs: u32 },
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Launching | OrchestratorState::ShuttingDown { .. }
        )
    }

    fn label(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::CheckingUpdate => "checking-update",
            OrchestratorState::UpdateAvailable => "update-available",
            OrchestratorState::Downloading(_) => "downloading",
            OrchestratorState::AwaitingUserDownload(_) => "awaiting-user-download",
            OrchestratorState::MaintenanceCheck => "maintenance-check",
            OrchestratorState::Launching => "launching",
            OrchestratorState::ShuttingDown { .. } => "shutting-down",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Launched,
    ShutDown { message: String },
}

/// External parties the orchestrator talks to.
pub struct Collaborators {
    pub updater: Arc<dyn UpdateSource>,
    pub maintenance: Arc<dyn MaintenanceStatus>,
    pub host: Arc<dyn LauncherHost>,
    pub releases: ReleaseApi,
    pub log: Arc<dyn EventLog>,
}

pub struct UpdateOrchestrator {
    platform: Platform,
    repository_url: String,
    countdown_secs: u32,
    countdown_tick: Duration,
    open_dev_tools: bool,
    updater: Arc<dyn UpdateSource>,
    maintenance: Arc<dyn MaintenanceStatus>,
    host: Arc<dyn LauncherHost>,
    releases: ReleaseApi,
    log: Arc<dyn EventLog>,
    state_tx: watch::Sender<OrchestratorState>,
}

impl UpdateOrchestrator {
    pub fn new(config: &LauncherConfig, collaborators: Collaborators) -> Self {
        let (state_tx, _) = watch::channel(OrchestratorState::Idle);
        Self {
            platform: config.effective_platform(),
            repository_url: config.repository_url.clone(),
            countdown_secs: config.shutdown_countdown_secs,
            countdown_tick: config.countdown_tick(),
            open_dev_tools: config.open_dev_tools,
            updater: collaborators.updater,
            maintenance: collaborators.maintenance,
            host: collaborators.host,
            releases: collaborators.releases,
            log: collaborators.log,
            state_tx,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn state(&self) -> OrchestratorState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state_tx.subscribe()
    }

    /// Drive the update flow to a terminal state, consuming events from
    /// `inbox` until then.
    pub async fn run(mut self, mut inbox: EventInbox) -> Outcome {
        if self.open_dev_tools {
            self.host.open_dev_tools();
        }
        if self.platform.supports_native_update() {
            self.host.set_window_progress_loading();
        }
        self.set_state(OrchestratorState::CheckingUpdate);
        self.host.set_status(STATUS_CHECKING);

        let updater = self.updater.clone();
        let check = async move { updater.check_for_update().await };
        tokio::pin!(check);
        let mut check_pending = true;

        loop {
            let event = tokio::select! {
                result = &mut check, if check_pending => {
                    check_pending = false;
                    if let Err(err) = result {
                        self.log.error(&format!("update check failed: {err}"));
                        return self.shutdown(format!("Update error:\n{err}")).await;
                    }
                    continue;
                }
                event = inbox.recv() => event,
            };

            let Some(event) = event else {
                self.log.error("launcher event channel closed before a verdict");
                return self.shutdown(MSG_UPDATER_GONE.to_string()).await;
            };

            if let Some(outcome) = self.handle_event(event).await {
                return outcome;
            }
        }
    }

    async fn handle_event(&mut self, event: LauncherEvent) -> Option<Outcome> {
        match event {
            LauncherEvent::UpdateAvailable => return self.on_update_available().await,
            LauncherEvent::UpdateNotAvailable => {
                self.log.info("no update available");
                return Some(self.maintenance_check().await);
            }
            LauncherEvent::UpdateError(message) => {
                self.log.error(&format!("updater reported an error: {message}"));
                return Some(self.shutdown(message).await);
            }
            LauncherEvent::DownloadProgress(sample) => self.on_progress(sample),
            LauncherEvent::NativeUpdateStaged(path) => {
                return Some(self.run_installer(&path).await);
            }
            LauncherEvent::DownloadRequested => {
                let OrchestratorState::AwaitingUserDownload(asset) = self.state() else {
                    self.log
                        .debug("download requested while no download is offered; ignoring");
                    return None;
                };
                return Some(self.open_download(asset).await);
            }
            LauncherEvent::DevToolsRequested => self.host.open_dev_tools(),
        }
        None
    }

    async fn on_update_available(&mut self) -> Option<Outcome> {
        self.set_state(OrchestratorState::UpdateAvailable);
        self.host.set_status(STATUS_UPDATE_AVAILABLE);

        if self.platform.supports_native_update() {
            self.host.show_progress(true);
            self.host.set_progress(0, 1);
            if let Err(err) = self.updater.start_native_update().await {
                self.log
                    .error(&format!("could not start native update: {err}"));
                return Some(self.shutdown(failure_message(&err)).await);
            }
            self.set_state(OrchestratorState::Downloading(DownloadStatus {
                transferred: 0,
                total: 0,
                estimate: None,
            }));
            return None;
        }

        match self.resolve_manual_asset().await {
            Ok(asset) => {
                self.log.info(&format!(
                    "offering {} from {}",
                    asset.name, asset.download_url
                ));
                self.set_state(OrchestratorState::AwaitingUserDownload(asset.clone()));
                self.host.set_status(STATUS_READY_TO_DOWNLOAD);
                self.host.prompt_download(&asset);
                None
            }
            Err(err) => {
                self.log
                    .error(&format!("manual download flow failed: {err}"));
                Some(self.shutdown(failure_message(&err)).await)
            }
        }
    }

    async fn resolve_manual_asset(&self) -> Result<ReleaseAsset> {
        let filter = self.platform.manual_asset_filter().ok_or_else(|| {
            UpdaterError::Other(format!("no manual download for {}", self.platform))
        })?;
        let coords = RepositoryCoordinates::parse(&self.repository_url)?;
        self.releases.resolve_asset(&coords, &filter).await
    }

    fn on_progress(&mut self, sample: ProgressSample) {
        self.host
            .set_window_progress(sample.transferred_bytes, sample.total_bytes);
        self.host
            .set_progress(sample.transferred_bytes, sample.total_bytes);

        let estimate = sample.estimate();
        self.log.info(&estimate.speed_line());
        self.log.info(&estimate.eta_line());

        self.set_state(OrchestratorState::Downloading(DownloadStatus {
            transferred: sample.transferred_bytes,
            total: sample.total_bytes,
            estimate: Some(estimate),
        }));
    }

    async fn run_installer(&mut self, path: &Path) -> Outcome {
        self.log
            .info(&format!("native update staged at {}", path.display()));
        match self.host.run_installer(path) {
            Ok(()) => self.shutdown(MSG_INSTALLING.to_string()).await,
            Err(err) => {
                self.log.error(&format!(
                    "could not start installer {}: {err}",
                    path.display()
                ));
                self.shutdown(format!(
                    "Could not start the installer:\n{}",
                    path.display()
                ))
                .await
            }
        }
    }

    async fn open_download(&mut self, asset: ReleaseAsset) -> Outcome {
        match self.host.open_external(&asset.download_url) {
            Ok(()) => self.shutdown(MSG_DOWNLOADING.to_string()).await,
            Err(err) => {
                self.log.error(&format!(
                    "could not open {}: {err}",
                    asset.download_url
                ));
                self.shutdown(format!(
                    "Could not open the download link:\n{}",
                    asset.download_url
                ))
                .await
            }
        }
    }

    async fn maintenance_check(&mut self) -> Outcome {
        self.set_state(OrchestratorState::MaintenanceCheck);

        match self.maintenance.get_config().await {
            Ok(status) if status.maintenance => {
                let message = if status.maintenance_message.trim().is_empty() {
                    MSG_MAINTENANCE.to_string()
                } else {
                    status.maintenance_message
                };
                self.shutdown(message).await
            }
            Ok(_) => self.launch(),
            Err(err) => {
                self.log.error(&format!("maintenance check failed: {err}"));
                self.shutdown(MSG_OFFLINE.to_string()).await
            }
        }
    }

    fn launch(&mut self) -> Outcome {
        self.set_state(OrchestratorState::Launching);
        self.host.set_status(STATUS_STARTING);
        self.host.open_main_window();
        self.host.close_update_window();
        Outcome::Launched
    }

    /// Show `message` with a countdown, then close the update window. Runs
    /// to completion once started; later events stay unread.
    async fn shutdown(&mut self, message: String) -> Outcome {
        let mut countdown = Countdown::new(self.countdown_secs, self.countdown_tick);
        self.show_shutdown(&message, countdown.remaining());
        while let Some(remaining) = countdown.tick().await {
            self.show_shutdown(&message, remaining);
        }
        self.host.close_update_window();
        Outcome::ShutDown { message }
    }

    fn show_shutdown(&mut self, message: &str, remaining_secs: u32) {
        self.host
            .set_status(&format!("{message}\nShutting down in {remaining_secs}s"));
        self.set_state(OrchestratorState::ShuttingDown {
            message: message.to_string(),
            remaining_secs,
        });
    }

    fn set_state(&mut self, next: OrchestratorState) {
        let previous = self.state_tx.send_replace(next);
        let current = self.state_tx.borrow().label();
        if previous.label() != current {
            self.log
                .debug(&format!("state {} -> {current}", previous.label()));
        }
    }
}

fn failure_message(err: &UpdaterError) -> String {
    match err {
        UpdaterError::NoAssetFound { .. } => MSG_NO_ASSET.to_string(),
        other => format!("Update error:\n{other}"),
    }
}

/// Runs an [`UpdateOrchestrator`] on the tokio runtime and exposes its state.
pub struct LauncherController {
    state_rx: watch::Receiver<OrchestratorState>,
    task: JoinHandle<Outcome>,
}

impl LauncherController {
    pub fn launch(orchestrator: UpdateOrchestrator, inbox: EventInbox) -> Self {
        let state_rx = orchestrator.subscribe();
        let task = tokio::spawn(orchestrator.run(inbox));
        Self { state_rx, task }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state_rx.clone()
    }

    /// Wait until the state satisfies `predicate`, returning that state.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<OrchestratorState>
    where
        F: FnMut(&OrchestratorState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| UpdaterError::ChannelClosed)?;
        Ok(state.clone())
    }

    pub async fn wait(self) -> Result<Outcome> {
        self.task
            .await
            .map_err(|err| UpdaterError::Other(format!("orchestrator task failed: {err}")))
    }
}
