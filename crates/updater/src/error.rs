use std::time::Duration;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Errors that can occur while checking for and resolving updates.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// The URL handed to the fetcher could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection-level failure while talking to a remote endpoint.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// No response arrived before the per-call deadline.
    #[error("request to {url} timed out after {} ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },
    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    /// A body was received but could not be decoded for its content type.
    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    /// The latest release carries no asset for this platform.
    #[error("no release asset found for this platform ({os_key}, {extension})")]
    NoAssetFound { os_key: String, extension: String },
    /// The maintenance status endpoint could not be queried.
    #[error("maintenance status unreachable: {0}")]
    MaintenanceUnreachable(String),
    /// The external updater failed to check for updates.
    #[error("update check failed: {0}")]
    UpdateCheck(String),
    /// The repository URL in the package metadata is not usable.
    #[error("unsupported repository URL: {0}")]
    Repository(String),
    /// Failed to parse or compare versions.
    #[error("version error: {0}")]
    Version(#[from] semver::Error),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The orchestrator event channel is gone.
    #[error("launcher event channel closed")]
    ChannelClosed,
    /// The orchestrator has not caught up with earlier events yet.
    #[error("launcher event channel is full")]
    ChannelFull,
    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl UpdaterError {
    pub(crate) fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        UpdaterError::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures where the remote end could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            UpdaterError::Network { .. } | UpdaterError::Timeout { .. }
        )
    }
}
