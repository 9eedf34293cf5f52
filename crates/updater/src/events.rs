use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Result, UpdaterError};
use crate::progress::ProgressSample;

const EVENT_CAPACITY: usize = 64;

/// Everything that can drive the orchestrator from outside: updater
/// notifications, user actions and keyboard shortcuts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    UpdateAvailable,
    UpdateNotAvailable,
    /// The updater reported a failure; the text is shown to the user as is.
    UpdateError(String),
    DownloadProgress(ProgressSample),
    /// The native installer is on disk and takes over from here.
    NativeUpdateStaged(PathBuf),
    /// The user accepted the manual download prompt.
    DownloadRequested,
    DevToolsRequested,
}

/// Producer side of the launcher event channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<LauncherEvent>,
}

impl EventSender {
    pub async fn send(&self, event: LauncherEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| UpdaterError::ChannelClosed)
    }

    /// Non-blocking send. A full channel is `ChannelFull` and leaves the
    /// channel usable; only a dropped inbox is `ChannelClosed`.
    pub fn try_send(&self, event: LauncherEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => UpdaterError::ChannelFull,
            TrySendError::Closed(_) => UpdaterError::ChannelClosed,
        })
    }

    /// Wait for room from a plain thread. Must not be called from inside the
    /// async runtime.
    pub fn blocking_send(&self, event: LauncherEvent) -> Result<()> {
        self.tx
            .blocking_send(event)
            .map_err(|_| UpdaterError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the orchestrator alone.
#[derive(Debug)]
pub struct EventInbox {
    rx: mpsc::Receiver<LauncherEvent>,
}

impl EventInbox {
    pub async fn recv(&mut self) -> Option<LauncherEvent> {
        self.rx.recv().await
    }
}

/// Create the single inbound channel feeding the orchestrator.
pub fn launcher_channel() -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
    (EventSender { tx }, EventInbox { rx })
}
