use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::CdnError;
use super::http::{fetch_json, shared_client};

/// Content type demarcating the windows installer among release assets.
pub const INSTALLER_CONTENT_TYPE: &str = "application/x-msdownload";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub content_type: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One entry of the release-metadata document. The document is ordered
/// newest-first; index 0 is the authoritative latest release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Uppercase hex MD5 of the installer artifact.
    pub md5: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

pub struct CdnClient {
    client: Client,
    meta_url: Url,
    events_url: Url,
}

impl CdnClient {
    pub fn new(
        root: &str,
        metadata_filename: &str,
        events_filename: &str,
    ) -> Result<Self, CdnError> {
        let mut base = root.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base)?;

        Ok(Self {
            client: shared_client().clone(),
            meta_url: base.join(metadata_filename)?,
            events_url: base.join(events_filename)?,
        })
    }

    /// Release metadata, newest first. A failure here means the caller could
    /// not check, never that there is no update.
    pub async fn fetch_release_meta(&self) -> Result<Vec<ReleaseEntry>, CdnError> {
        fetch_json(&self.client, self.meta_url.as_str()).await
    }

    /// Events feed, passed through opaquely.
    pub async fn fetch_events(&self) -> Result<serde_json::Value, CdnError> {
        fetch_json(&self.client, self.events_url.as_str()).await
    }
}

/// The installer asset of the latest release. The assets list can contain
/// any number of files in any order, so search by content type; the last
/// match wins.
pub fn installer_asset(releases: &[ReleaseEntry]) -> Option<&ReleaseAsset> {
    let latest = releases.first()?;
    latest
        .assets
        .iter()
        .filter(|asset| asset.content_type == INSTALLER_CONTENT_TYPE)
        .last()
}

pub fn installer_download_url(releases: &[ReleaseEntry]) -> Option<&str> {
    installer_asset(releases).map(|asset| asset.browser_download_url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_doc() -> Vec<ReleaseEntry> {
        serde_json::from_str(
            r#"[
                {
                    "tag_name": "2.1.0",
                    "name": "Orbit Interface",
                    "md5": "0CC175B9C0F1B6A831C399E269772661",
                    "assets": [
                        {
                            "content_type": "application/zip",
                            "browser_download_url": "https://cdn.example/source.zip"
                        },
                        {
                            "content_type": "application/x-msdownload",
                            "browser_download_url": "https://cdn.example/setup-old.exe"
                        },
                        {
                            "content_type": "application/x-msdownload",
                            "browser_download_url": "https://cdn.example/setup.exe",
                            "size": 1048576
                        }
                    ]
                },
                {
                    "tag_name": "2.0.5",
                    "md5": "92EB5FFEE6AE2FEC3AD71C777531578F",
                    "assets": []
                }
            ]"#,
        )
        .expect("valid metadata document")
    }

    #[test]
    fn parses_release_metadata() {
        let releases = meta_doc();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag_name, "2.1.0");
        assert_eq!(releases[0].name.as_deref(), Some("Orbit Interface"));
        assert_eq!(releases[1].name, None);
        assert_eq!(releases[1].assets.len(), 0);
    }

    #[test]
    fn installer_asset_matches_by_content_type_last_wins() {
        let releases = meta_doc();
        let asset = installer_asset(&releases).expect("installer present");
        assert_eq!(asset.browser_download_url, "https://cdn.example/setup.exe");
        assert_eq!(asset.size, Some(1048576));
        assert_eq!(
            installer_download_url(&releases),
            Some("https://cdn.example/setup.exe")
        );
    }

    #[test]
    fn installer_asset_absent_when_no_msdownload() {
        let releases: Vec<ReleaseEntry> = serde_json::from_str(
            r#"[{"tag_name": "1.0.0", "md5": "AA", "assets": [
                {"content_type": "application/zip", "browser_download_url": "https://cdn.example/a.zip"}
            ]}]"#,
        )
        .expect("valid metadata document");
        assert!(installer_asset(&releases).is_none());
    }
}
