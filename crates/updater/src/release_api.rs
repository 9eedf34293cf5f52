use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::fetcher::HttpFetcher;
use crate::release::{select_asset, AssetFilter, Release, ReleaseAsset, RepositoryCoordinates};

#[derive(Debug, Deserialize)]
struct ApiRoot {
    repository_url: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryResource {
    releases_url: String,
}

/// Client for the public release-hosting API.
///
/// Discovery walks the API the way a browser would: the root document names
/// the repository URL template, the repository names the releases URL
/// template. Each hop is a separate timed fetch and feeds the next one.
#[derive(Clone)]
pub struct ReleaseApi {
    fetcher: Arc<dyn HttpFetcher>,
    api_root: String,
    timeout: Duration,
}

impl ReleaseApi {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, api_root: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            api_root: api_root.into(),
            timeout,
        }
    }

    /// All releases of the repository, most recent first.
    pub async fn releases(&self, coords: &RepositoryCoordinates) -> Result<Vec<Release>> {
        let root: ApiRoot = self
            .fetcher
            .fetch(&self.api_root, self.timeout)
            .await?
            .decode(&self.api_root)?;

        let repository_url = root
            .repository_url
            .replace("{owner}", &coords.owner)
            .replace("{repo}", &coords.repo);
        let repository: RepositoryResource = self
            .fetcher
            .fetch(&repository_url, self.timeout)
            .await?
            .decode(&repository_url)?;

        let releases_url = repository.releases_url.replace("{/id}", "");
        self.fetcher
            .fetch(&releases_url, self.timeout)
            .await?
            .decode(&releases_url)
    }

    pub async fn latest_release(&self, coords: &RepositoryCoordinates) -> Result<Option<Release>> {
        Ok(self.releases(coords).await?.into_iter().next())
    }

    /// Assets of the most recent release; empty when there is no release.
    pub async fn latest_assets(&self, coords: &RepositoryCoordinates) -> Result<Vec<ReleaseAsset>> {
        Ok(self
            .latest_release(coords)
            .await?
            .map(|release| release.assets)
            .unwrap_or_default())
    }

    /// Newest asset of the latest release matching `filter`.
    pub async fn resolve_asset(
        &self,
        coords: &RepositoryCoordinates,
        filter: &AssetFilter,
    ) -> Result<ReleaseAsset> {
        let assets = self.latest_assets(coords).await?;
        select_asset(&assets, filter)
            .cloned()
            .ok_or_else(|| filter.not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdaterError;
    use crate::fetcher::FetchedBody;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockFetcher {
        entries: HashMap<String, FetchedBody>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                entries: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn insert(&mut self, url: &str, body: FetchedBody) {
            self.entries.insert(url.to_string(), body);
        }
    }

    #[async_trait]
    impl HttpFetcher for MockFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedBody> {
            self.calls.lock().unwrap().push(url.to_string());
            self.entries
                .get(url)
                .cloned()
                .ok_or_else(|| UpdaterError::Other(format!("unknown url in mock fetcher: {url}")))
        }
    }

    fn coords() -> RepositoryCoordinates {
        RepositoryCoordinates::parse("git+https://github.com/acme/launcher.git").unwrap()
    }

    fn populated() -> MockFetcher {
        let mut fetcher = MockFetcher::new();
        fetcher.insert(
            "https://api.test",
            FetchedBody::Json(json!({
                "repository_url": "https://api.test/repos/{owner}/{repo}"
            })),
        );
        fetcher.insert(
            "https://api.test/repos/acme/launcher",
            FetchedBody::Json(json!({
                "releases_url": "https://api.test/repos/acme/launcher/releases{/id}"
            })),
        );
        fetcher.insert(
            "https://api.test/repos/acme/launcher/releases",
            FetchedBody::Json(json!([
                {
                    "tag_name": "v2.0.0",
                    "assets": [
                        {"name": "launcher-linux-old.AppImage", "browser_download_url": "https://dl.test/old", "created_at": "2024-01-01T00:00:00Z"},
                        {"name": "launcher-linux-new.AppImage", "browser_download_url": "https://dl.test/new", "created_at": "2024-02-01T00:00:00Z"}
                    ]
                },
                {
                    "tag_name": "v1.0.0",
                    "assets": [
                        {"name": "launcher-linux-newest.AppImage", "browser_download_url": "https://dl.test/v1", "created_at": "2025-01-01T00:00:00Z"}
                    ]
                }
            ])),
        );
        fetcher
    }

    #[tokio::test]
    async fn walks_discovery_documents_in_order() {
        let fetcher = Arc::new(populated());
        let api = ReleaseApi::new(fetcher.clone(), "https://api.test", Duration::from_secs(1));

        let asset = api
            .resolve_asset(&coords(), &AssetFilter::new("linux", ".appimage"))
            .await
            .expect("asset resolves");

        assert_eq!(asset.download_url, "https://dl.test/new");
        assert_eq!(
            *fetcher.calls.lock().unwrap(),
            vec![
                "https://api.test".to_string(),
                "https://api.test/repos/acme/launcher".to_string(),
                "https://api.test/repos/acme/launcher/releases".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn only_the_first_release_is_consulted() {
        let api = ReleaseApi::new(Arc::new(populated()), "https://api.test", Duration::from_secs(1));
        let release = api.latest_release(&coords()).await.unwrap().unwrap();
        assert_eq!(release.tag_name.as_deref(), Some("v2.0.0"));
    }

    #[tokio::test]
    async fn missing_asset_is_reported() {
        let api = ReleaseApi::new(Arc::new(populated()), "https://api.test", Duration::from_secs(1));
        let err = api
            .resolve_asset(&coords(), &AssetFilter::new("mac", ".dmg"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::NoAssetFound { .. }));
    }

    #[tokio::test]
    async fn a_failed_hop_stops_the_walk() {
        let mut fetcher = MockFetcher::new();
        fetcher.insert(
            "https://api.test",
            FetchedBody::Json(json!({"repository_url": "https://api.test/repos/{owner}/{repo}"})),
        );
        let fetcher = Arc::new(fetcher);
        let api = ReleaseApi::new(fetcher.clone(), "https://api.test", Duration::from_secs(1));

        assert!(api.latest_assets(&coords()).await.is_err());
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn root_without_template_is_a_decode_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.insert(
            "https://api.test",
            FetchedBody::Json(json!({"message": "API rate limit exceeded"})),
        );
        let api = ReleaseApi::new(Arc::new(fetcher), "https://api.test", Duration::from_secs(1));
        assert!(matches!(
            api.latest_assets(&coords()).await,
            Err(UpdaterError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn empty_release_list_has_no_assets() {
        let mut fetcher = populated();
        fetcher.insert(
            "https://api.test/repos/acme/launcher/releases",
            FetchedBody::Json(json!([])),
        );
        let api = ReleaseApi::new(Arc::new(fetcher), "https://api.test", Duration::from_secs(1));
        assert!(api.latest_assets(&coords()).await.unwrap().is_empty());
    }
}
