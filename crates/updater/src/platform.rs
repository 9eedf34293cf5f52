use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;
use crate::release::AssetFilter;

/// OS family the launcher runs on. Selects between the native auto-update
/// path and the manual download path, and which release asset to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Linux,
}

impl Platform {
    /// Platform of the running binary. Unknown OSes are treated as Linux.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    /// Whether the external updater installs updates in-process here.
    pub fn supports_native_update(self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Asset filter for the manual download path. `None` on the native
    /// update platform, which never consults the release list this way.
    pub fn manual_asset_filter(self) -> Option<AssetFilter> {
        match self {
            Platform::Windows => None,
            Platform::MacOs => Some(AssetFilter::new("mac", ".dmg")),
            Platform::Linux => Some(AssetFilter::new("linux", ".appimage")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" | "win" => Ok(Platform::Windows),
            "macos" | "darwin" | "mac" => Ok(Platform::MacOs),
            "linux" => Ok(Platform::Linux),
            other => Err(UpdaterError::Config(format!("unknown platform `{other}`"))),
        }
    }
}
