use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdaterError};
use crate::fetcher::HttpFetcher;

/// Server-side launcher status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherStatus {
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub maintenance_message: String,
}

/// Source of the maintenance flag consulted when no update is pending.
#[async_trait]
pub trait MaintenanceStatus: Send + Sync {
    /// Fails with [`UpdaterError::MaintenanceUnreachable`] when the status
    /// cannot be obtained.
    async fn get_config(&self) -> Result<LauncherStatus>;
}

/// Reads the status document over HTTP through the timed fetcher.
#[derive(Clone)]
pub struct HttpMaintenanceStatus {
    fetcher: Arc<dyn HttpFetcher>,
    url: Option<String>,
    timeout: Duration,
}

impl HttpMaintenanceStatus {
    /// Without a `url` the launcher is never in maintenance.
    pub fn new(fetcher: Arc<dyn HttpFetcher>, url: Option<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl MaintenanceStatus for HttpMaintenanceStatus {
    async fn get_config(&self) -> Result<LauncherStatus> {
        let Some(url) = self.url.as_deref() else {
            return Ok(LauncherStatus::default());
        };

        self.fetcher
            .fetch(url, self.timeout)
            .await
            .and_then(|body| body.decode(url))
            .map_err(|err| UpdaterError::MaintenanceUnreachable(err.to_string()))
    }
}
