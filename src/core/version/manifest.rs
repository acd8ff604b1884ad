// ─── Version Manifest ───
// Remote index used to locate a version descriptor by id.

use serde::Deserialize;
use tracing::info;

use crate::core::error::{InstallerError, InstallerResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Fetch the version manifest using the shared HTTP client.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> InstallerResult<Self> {
        info!("Fetching version manifest from {}", url);

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(InstallerError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let manifest: VersionManifest = response.json().await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.17.1").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_version_by_id() {
        let manifest: VersionManifest = serde_json::from_str(
            r#"{"versions": [
                {"id": "1.17.1", "type": "release", "url": "https://example.com/1.17.1.json", "sha1": "abc"},
                {"id": "21w20a", "type": "snapshot", "url": "https://example.com/21w20a.json"}
            ]}"#,
        )
        .unwrap();

        let entry = manifest.find_version("1.17.1").unwrap();
        assert_eq!(entry.url, "https://example.com/1.17.1.json");
        assert_eq!(entry.sha1.as_deref(), Some("abc"));
        assert!(manifest.find_version("1.0").is_none());
    }
}
