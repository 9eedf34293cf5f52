use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdaterError};

/// A downloadable file attached to a published release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    pub created_at: DateTime<Utc>,
}

/// A published release as returned by the releases collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Version carried by the tag, with a leading `v` removed.
    pub fn version(&self) -> Result<Option<semver::Version>> {
        match self.tag_name.as_deref() {
            Some(tag) => Ok(Some(semver::Version::parse(tag.trim_start_matches('v'))?)),
            None => Ok(None),
        }
    }
}

/// OS-keyed substring and file extension an asset name must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFilter {
    os_key: String,
    extension: String,
}

impl AssetFilter {
    pub fn new(os_key: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            os_key: os_key.into().to_lowercase(),
            extension: extension.into().to_lowercase(),
        }
    }

    pub fn os_key(&self) -> &str {
        &self.os_key
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn matches(&self, asset: &ReleaseAsset) -> bool {
        let name = asset.name.to_lowercase();
        name.contains(&self.os_key) && name.ends_with(&self.extension)
    }

    pub(crate) fn not_found(&self) -> UpdaterError {
        UpdaterError::NoAssetFound {
            os_key: self.os_key.clone(),
            extension: self.extension.clone(),
        }
    }
}

/// Pick the most recently created asset matching `filter`.
///
/// Ties on `created_at` keep the first asset encountered, so the choice is
/// deterministic for a given list.
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], filter: &AssetFilter) -> Option<&'a ReleaseAsset> {
    assets
        .iter()
        .filter(|asset| filter.matches(asset))
        .fold(None, |best: Option<&ReleaseAsset>, asset| match best {
            Some(current) if asset.created_at <= current.created_at => Some(current),
            _ => Some(asset),
        })
}

/// `owner/repo` pair of the hosting repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub repo: String,
}

impl RepositoryCoordinates {
    /// Parse a package repository URL such as
    /// `git+https://github.com/owner/repo.git`.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let path = trimmed.strip_prefix("git+").unwrap_or(trimmed);
        let path = path
            .strip_prefix("https://github.com/")
            .ok_or_else(|| UpdaterError::Repository(url.to_string()))?;
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(UpdaterError::Repository(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn asset(name: &str, created_secs: i64) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            download_url: format!("https://downloads.example/{name}"),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn picks_latest_matching_asset() {
        let assets = vec![
            asset("Launcher-linux-1.0.0.AppImage", 100),
            asset("Launcher-mac-1.0.1.dmg", 300),
            asset("Launcher-linux-1.0.1.AppImage", 200),
            asset("Launcher-linux-1.0.1.tar.gz", 400),
        ];
        let filter = AssetFilter::new("linux", ".appimage");

        let picked = select_asset(&assets, &filter).unwrap();
        assert_eq!(picked.name, "Launcher-linux-1.0.1.AppImage");
    }

    #[test]
    fn filter_is_case_insensitive() {
        let assets = vec![asset("LAUNCHER-MAC.DMG", 1)];
        let filter = AssetFilter::new("Mac", ".DMG");
        assert!(select_asset(&assets, &filter).is_some());
    }

    #[test]
    fn returns_none_without_match() {
        let assets = vec![asset("launcher-win-setup.exe", 1), asset("linux.deb", 2)];
        let filter = AssetFilter::new("linux", ".appimage");
        assert!(select_asset(&assets, &filter).is_none());
        assert!(select_asset(&[], &filter).is_none());
    }

    #[test]
    fn ties_keep_first_encountered() {
        let assets = vec![
            asset("a-linux.AppImage", 50),
            asset("b-linux.AppImage", 50),
            asset("c-linux.AppImage", 10),
        ];
        let filter = AssetFilter::new("linux", ".appimage");
        assert_eq!(select_asset(&assets, &filter).unwrap().name, "a-linux.AppImage");
    }

    #[test]
    fn every_selection_satisfies_the_filter() {
        let names = [
            "x-linux.appimage",
            "x-LINUX.exe",
            "mac-x.dmg",
            "linux",
            ".appimage",
            "Linux-arm64.AppImage",
        ];
        let assets: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| asset(name, idx as i64))
            .collect();
        for filter in [
            AssetFilter::new("linux", ".appimage"),
            AssetFilter::new("mac", ".dmg"),
            AssetFilter::new("win", ".exe"),
        ] {
            let expected_any = assets.iter().any(|a| filter.matches(a));
            match select_asset(&assets, &filter) {
                Some(picked) => {
                    assert!(expected_any);
                    let lower = picked.name.to_lowercase();
                    assert!(lower.contains(filter.os_key()));
                    assert!(lower.ends_with(filter.extension()));
                }
                None => assert!(!expected_any),
            }
        }
    }

    #[test]
    fn deserializes_api_shape() {
        let json = serde_json::json!({
            "tag_name": "v1.4.0",
            "assets": [{
                "name": "launcher-linux.AppImage",
                "browser_download_url": "https://example.invalid/launcher-linux.AppImage",
                "created_at": "2024-05-01T10:00:00Z",
                "size": 1024
            }]
        });
        let release: Release = serde_json::from_value(json).unwrap();
        assert_eq!(release.assets.len(), 1);
        assert_eq!(
            release.version().unwrap(),
            Some(semver::Version::new(1, 4, 0))
        );
    }

    #[test]
    fn parses_repository_urls() {
        let expected = RepositoryCoordinates {
            owner: "acme".into(),
            repo: "launcher".into(),
        };
        for url in [
            "git+https://github.com/acme/launcher.git",
            "https://github.com/acme/launcher",
            "https://github.com/acme/launcher/",
        ] {
            assert_eq!(RepositoryCoordinates::parse(url).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_unusable_repository_urls() {
        for url in [
            "https://gitlab.com/acme/launcher",
            "https://github.com/acme",
            "https://github.com/acme/launcher/tree/main",
            "",
        ] {
            assert!(matches!(
                RepositoryCoordinates::parse(url),
                Err(UpdaterError::Repository(_))
            ));
        }
    }
}
