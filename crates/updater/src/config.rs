//! Launcher configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::countdown::DEFAULT_COUNTDOWN_SECS;
use crate::error::{Result, UpdaterError};
use crate::fetcher::DEFAULT_FETCH_TIMEOUT;
use crate::platform::Platform;

const DEFAULT_API_ROOT: &str = "https://api.github.com";
const DEFAULT_REPOSITORY_URL: &str = env!("CARGO_PKG_REPOSITORY");

pub const ENV_REPOSITORY_URL: &str = "SPLASH_REPOSITORY_URL";
pub const ENV_STATUS_URL: &str = "SPLASH_STATUS_URL";
pub const ENV_FETCH_TIMEOUT_MS: &str = "SPLASH_FETCH_TIMEOUT_MS";
pub const ENV_PLATFORM: &str = "SPLASH_PLATFORM";
/// `open` opens the developer tools next to the update window.
pub const ENV_DEV_TOOLS: &str = "SPLASH_DEV_TOOLS";

/// Settings for the startup update flow. Every field has a default, so a
/// partial JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherConfig {
    /// Discovery document of the release-hosting API.
    pub api_root: String,
    /// Repository URL from the package metadata (`owner/repo` is derived from it).
    pub repository_url: String,
    /// JSON document carrying `maintenance` and `maintenance_message`.
    pub status_url: Option<String>,
    pub fetch_timeout_ms: u64,
    pub shutdown_countdown_secs: u32,
    pub countdown_tick_ms: u64,
    pub user_agent: String,
    /// Overrides the detected OS family.
    pub platform: Option<Platform>,
    /// Open the developer tools when the update window starts.
    pub open_dev_tools: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            status_url: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            shutdown_countdown_secs: DEFAULT_COUNTDOWN_SECS,
            countdown_tick_ms: 1000,
            user_agent: concat!("splash-launcher/", env!("CARGO_PKG_VERSION")).to_string(),
            platform: None,
            open_dev_tools: false,
        }
    }
}

impl LauncherConfig {
    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|err| UpdaterError::Config(format!("{}: {err}", path.display())))
    }

    /// Defaults, then the optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup` (normally the environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_REPOSITORY_URL).filter(|v| !v.trim().is_empty()) {
            self.repository_url = url;
        }
        if let Some(url) = lookup(ENV_STATUS_URL).filter(|v| !v.trim().is_empty()) {
            self.status_url = Some(url);
        }
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_MS) {
            self.fetch_timeout_ms = raw.trim().parse().map_err(|_| {
                UpdaterError::Config(format!("{ENV_FETCH_TIMEOUT_MS} must be an integer, got `{raw}`"))
            })?;
        }
        if let Some(raw) = lookup(ENV_PLATFORM) {
            self.platform = Some(raw.parse()?);
        }
        if let Some(raw) = lookup(ENV_DEV_TOOLS) {
            self.open_dev_tools = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "open" | "1" | "true"
            );
        }
        Ok(self)
    }

    pub fn repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    pub fn api_root(mut self, url: impl Into<String>) -> Self {
        self.api_root = url.into();
        self
    }

    pub fn status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = Some(url.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn open_dev_tools(mut self, open: bool) -> Self {
        self.open_dev_tools = open;
        self
    }

    pub fn countdown(mut self, seconds: u32, tick: Duration) -> Self {
        self.shutdown_countdown_secs = seconds;
        self.countdown_tick_ms = tick.as_millis() as u64;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Per-call fetch deadline; zero falls back to the default.
    pub fn fetch_timeout_duration(&self) -> Duration {
        match self.fetch_timeout_ms {
            0 => DEFAULT_FETCH_TIMEOUT,
            ms => Duration::from_millis(ms),
        }
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn effective_platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}
