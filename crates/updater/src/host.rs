use std::path::Path;

use crate::error::Result;
use crate::release::ReleaseAsset;

/// Window and shell commands the orchestrator issues to its host.
///
/// All methods are fire-and-forget UI commands; the host owns rendering.
pub trait LauncherHost: Send + Sync {
    /// Replace the status line shown under the splash.
    fn set_status(&self, message: &str);

    /// Show or hide the in-window progress indicator.
    fn show_progress(&self, visible: bool);

    /// `max` is zero while the download size is unknown.
    fn set_progress(&self, value: u64, max: u64);

    /// Taskbar/dock progress of the update window.
    fn set_window_progress(&self, transferred: u64, total: u64);

    /// Indeterminate taskbar progress while the update check runs.
    fn set_window_progress_loading(&self);

    /// Offer `asset` to the user; the user's answer comes back as a
    /// `DownloadRequested` event.
    fn prompt_download(&self, asset: &ReleaseAsset);

    /// Hand `url` to the system's external handler.
    fn open_external(&self, url: &str) -> Result<()>;

    /// Start the staged native installer, which replaces this launcher.
    fn run_installer(&self, path: &Path) -> Result<()>;

    fn open_main_window(&self);

    fn close_update_window(&self);

    fn open_dev_tools(&self);
}
