use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use tempfile::{NamedTempFile, PathPersistError};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, UpdaterError};
use crate::events::{EventSender, LauncherEvent};
use crate::logging::EventLog;
use crate::progress::ProgressSample;
use crate::release::{select_asset, AssetFilter, ReleaseAsset, RepositoryCoordinates};
use crate::release_api::ReleaseApi;

/// External updater driven by the orchestrator.
///
/// Verdicts and download progress are reported on the launcher event
/// channel, not through return values.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Start an update check. Resolves once the check has been carried out;
    /// an `Err` means the check itself could not run.
    async fn check_for_update(&self) -> Result<()>;

    /// Begin downloading and installing the pending update in-process.
    async fn start_native_update(&self) -> Result<()>;
}

/// Installer asset used by the native update path.
pub fn native_installer_filter() -> AssetFilter {
    AssetFilter::new("win", ".exe")
}

/// [`UpdateSource`] backed by the public release feed: compares the running
/// version with the latest release tag and streams the installer on demand.
pub struct ReleaseFeedUpdater {
    releases: ReleaseApi,
    client: Client,
    repository_url: String,
    current_version: semver::Version,
    events: EventSender,
    staging_dir: PathBuf,
    log: Arc<dyn EventLog>,
    pending: Mutex<Option<ReleaseAsset>>,
}

impl ReleaseFeedUpdater {
    pub fn new(
        releases: ReleaseApi,
        client: Client,
        repository_url: impl Into<String>,
        current_version: semver::Version,
        events: EventSender,
        log: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            releases,
            client,
            repository_url: repository_url.into(),
            current_version,
            events,
            staging_dir: std::env::temp_dir().join("splash-launcher-updates"),
            log,
            pending: Mutex::new(None),
        }
    }

    /// Directory the installer is downloaded into.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    async fn newer_release(&self) -> Result<Option<Option<ReleaseAsset>>> {
        let coords = RepositoryCoordinates::parse(&self.repository_url)?;
        let Some(release) = self.releases.latest_release(&coords).await? else {
            self.log.info("no published release found");
            return Ok(None);
        };
        let Some(latest) = release.version()? else {
            self.log.info("latest release carries no version tag");
            return Ok(None);
        };

        if latest <= self.current_version {
            self.log
                .info(&format!("running {} is up to date (latest {latest})", self.current_version));
            return Ok(None);
        }

        self.log
            .info(&format!("update available: {} -> {latest}", self.current_version));
        Ok(Some(
            select_asset(&release.assets, &native_installer_filter()).cloned(),
        ))
    }

    fn set_pending(&self, asset: Option<ReleaseAsset>) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = asset;
        }
    }

    fn take_pending(&self) -> Option<ReleaseAsset> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }
}

#[async_trait]
impl UpdateSource for ReleaseFeedUpdater {
    async fn check_for_update(&self) -> Result<()> {
        let verdict = self
            .newer_release()
            .await
            .map_err(|err| UpdaterError::UpdateCheck(err.to_string()))?;

        let event = match verdict {
            Some(installer) => {
                self.set_pending(installer);
                LauncherEvent::UpdateAvailable
            }
            None => LauncherEvent::UpdateNotAvailable,
        };
        self.events.send(event).await
    }

    async fn start_native_update(&self) -> Result<()> {
        let filter = native_installer_filter();
        let asset = self.take_pending().ok_or_else(|| filter.not_found())?;
        self.log
            .info(&format!("downloading installer {}", asset.name));

        let client = self.client.clone();
        let events = self.events.clone();
        let staging_dir = self.staging_dir.clone();
        let log = self.log.clone();

        tokio::spawn(async move {
            let event = match download_installer(&client, &asset, &staging_dir, &events).await {
                Ok(path) => {
                    log.info(&format!("installer staged at {}", path.display()));
                    LauncherEvent::NativeUpdateStaged(path)
                }
                Err(err) => {
                    log.error(&format!("installer download failed: {err}"));
                    LauncherEvent::UpdateError(format!("Update download failed:\n{err}"))
                }
            };
            if events.send(event).await.is_err() {
                log.debug("launcher stopped listening before the download finished");
            }
        });

        Ok(())
    }
}

async fn download_installer(
    client: &Client,
    asset: &ReleaseAsset,
    staging_dir: &Path,
    events: &EventSender,
) -> Result<PathBuf> {
    let network = |source: reqwest::Error| UpdaterError::Network {
        url: asset.download_url.clone(),
        source,
    };

    let response = client
        .get(&asset.download_url)
        .send()
        .await
        .map_err(network)?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpdaterError::Http {
            url: asset.download_url.clone(),
            status: status.as_u16(),
        });
    }
    // Zero when the server streams without a Content-Length.
    let total = response.content_length().unwrap_or(0);

    let file_name = Path::new(&asset.name)
        .file_name()
        .ok_or_else(|| UpdaterError::Other(format!("unusable asset name `{}`", asset.name)))?;
    let target = staging_dir.join(file_name);
    tokio::fs::create_dir_all(staging_dir).await?;

    let (std_file, temp_path) = NamedTempFile::new_in(staging_dir)?.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);
    let mut stream = response.bytes_stream();
    let mut transferred = 0u64;
    let mut last_sample = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(network)?;
        file.write_all(&chunk).await?;
        transferred += chunk.len() as u64;

        let now = Instant::now();
        let sample = ProgressSample {
            transferred_bytes: transferred,
            total_bytes: total,
            delta_time_ms: now.duration_since(last_sample).as_millis() as u64,
        };
        last_sample = now;
        events.send(LauncherEvent::DownloadProgress(sample)).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&temp_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&temp_path, perms)?;
    }

    temp_path.persist(&target).map_err(map_persist_error)?;
    Ok(target)
}

fn map_persist_error(err: PathPersistError) -> UpdaterError {
    UpdaterError::Io(err.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::launcher_channel;
    use crate::fetcher::{FetchedBody, HttpFetcher};
    use crate::logging::MemoryLog;
    use crate::progress::Eta;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    struct FeedFetcher {
        releases: Value,
    }

    #[async_trait]
    impl HttpFetcher for FeedFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedBody> {
            let body = match url {
                "https://api.test" => json!({"repository_url": "https://api.test/repos/{owner}/{repo}"}),
                "https://api.test/repos/acme/launcher" => {
                    json!({"releases_url": "https://api.test/repos/acme/launcher/releases{/id}"})
                }
                "https://api.test/repos/acme/launcher/releases" => self.releases.clone(),
                other => {
                    return Err(UpdaterError::Http {
                        url: other.to_string(),
                        status: 404,
                    })
                }
            };
            Ok(FetchedBody::Json(body))
        }
    }

    fn updater(releases: Value, events: EventSender, staging: &Path) -> ReleaseFeedUpdater {
        let api = ReleaseApi::new(
            Arc::new(FeedFetcher { releases }),
            "https://api.test",
            Duration::from_secs(1),
        );
        ReleaseFeedUpdater::new(
            api,
            Client::new(),
            "https://github.com/acme/launcher",
            semver::Version::new(1, 0, 0),
            events,
            Arc::new(MemoryLog::new()),
        )
        .staging_dir(staging)
    }

    fn release(tag: &str, installer_url: &str) -> Value {
        json!([{
            "tag_name": tag,
            "assets": [
                {"name": "Launcher-win-setup.exe", "browser_download_url": installer_url, "created_at": "2024-03-01T00:00:00Z"},
                {"name": "Launcher-linux.AppImage", "browser_download_url": "https://dl.test/linux", "created_at": "2024-03-01T00:00:00Z"}
            ]
        }])
    }

    #[tokio::test]
    async fn newer_tag_signals_update_available() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = launcher_channel();
        let updater = updater(release("v1.2.0", "https://dl.test/setup.exe"), tx, dir.path());

        updater.check_for_update().await.unwrap();
        assert_eq!(rx.recv().await, Some(LauncherEvent::UpdateAvailable));
    }

    #[tokio::test]
    async fn same_tag_signals_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = launcher_channel();
        let updater = updater(release("v1.0.0", "https://dl.test/setup.exe"), tx, dir.path());

        updater.check_for_update().await.unwrap();
        assert_eq!(rx.recv().await, Some(LauncherEvent::UpdateNotAvailable));
    }

    #[tokio::test]
    async fn unparseable_tag_fails_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = launcher_channel();
        let updater = updater(release("nightly", "https://dl.test/setup.exe"), tx, dir.path());

        assert!(matches!(
            updater.check_for_update().await,
            Err(UpdaterError::UpdateCheck(_))
        ));
    }

    #[tokio::test]
    async fn native_update_without_pending_installer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = launcher_channel();
        let updater = updater(json!([]), tx, dir.path());

        assert!(matches!(
            updater.start_native_update().await,
            Err(UpdaterError::NoAssetFound { .. })
        ));
    }

    async fn serve_installer(payload: Vec<u8>, with_length: bool) -> u16 {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf).await;
            let length = if with_length {
                format!("Content-Length: {}\r\n", payload.len())
            } else {
                String::new()
            };
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n{length}Connection: close\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes()).await;
            for chunk in payload.chunks(16 * 1024) {
                let _ = stream.write_all(chunk).await;
            }
            let _ = stream.shutdown().await;
        });
        port
    }

    async fn download_events(port: u16, dir: &Path) -> (Vec<ProgressSample>, PathBuf) {
        let (tx, mut rx) = launcher_channel();
        let installer_url = format!("http://127.0.0.1:{port}/Launcher-win-setup.exe");
        let updater = updater(release("v2.0.0", &installer_url), tx, dir);

        updater.check_for_update().await.unwrap();
        assert_eq!(rx.recv().await, Some(LauncherEvent::UpdateAvailable));
        updater.start_native_update().await.unwrap();

        let mut samples = Vec::new();
        loop {
            match rx.recv().await.expect("channel open") {
                LauncherEvent::DownloadProgress(sample) => samples.push(sample),
                LauncherEvent::NativeUpdateStaged(path) => return (samples, path),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn native_update_streams_installer_with_progress() {
        let payload = vec![0x5au8; 96 * 1024];
        let port = serve_installer(payload.clone(), true).await;
        let dir = tempfile::tempdir().unwrap();

        let (samples, staged) = download_events(port, dir.path()).await;

        assert!(samples
            .iter()
            .all(|sample| sample.total_bytes == payload.len() as u64));
        assert_eq!(
            samples.last().map(|sample| sample.transferred_bytes),
            Some(payload.len() as u64)
        );
        assert_eq!(staged, dir.path().join("Launcher-win-setup.exe"));
        assert_eq!(std::fs::read(&staged).unwrap(), payload);
    }

    #[tokio::test]
    async fn installer_without_content_length_keeps_total_unknown() {
        let payload = vec![0x33u8; 64 * 1024];
        let port = serve_installer(payload.clone(), false).await;
        let dir = tempfile::tempdir().unwrap();

        let (samples, staged) = download_events(port, dir.path()).await;

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|sample| sample.total_bytes == 0));
        assert!(samples
            .iter()
            .all(|sample| sample.estimate().eta == Eta::Unknown));
        assert_eq!(std::fs::read(&staged).unwrap(), payload);
    }
}
