// ─── Version File ───
// Parses a version descriptor JSON and evaluates OS rules for libraries.

use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::DownloadSpec;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::MavenArtifact;

/// A parsed base-game version descriptor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    pub downloads: Option<VersionDownloads>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    pub url: String,
}

// ─── Library Entry with Rules ───

/// A library as it appears in both install profiles and version descriptors.
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl LibraryEntry {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// Rules logic:
    /// - If no rules → allowed.
    /// - Process rules top-to-bottom. Start with "disallowed".
    /// - Each rule either sets "allow" or "disallow" if the OS matches (or if no OS is specified).
    /// - Final state determines inclusion.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match rule.os.as_ref().and_then(|os| os.name.as_deref()) {
                None => true,
                Some(name) => name == current_os,
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Convert to a download spec. An empty URL counts as "no network source".
    pub fn to_download_spec(&self) -> InstallerResult<DownloadSpec> {
        let coordinate = MavenArtifact::parse(&self.name)?;
        let artifact = self.downloads.as_ref().and_then(|d| d.artifact.as_ref());

        Ok(DownloadSpec {
            coordinate,
            url: artifact
                .and_then(|a| a.url.clone())
                .filter(|url| !url.trim().is_empty()),
            sha1: artifact
                .and_then(|a| a.sha1.clone())
                .filter(|sha| !sha.trim().is_empty()),
            size: artifact.and_then(|a| a.size),
            path: artifact
                .and_then(|a| a.path.clone())
                .filter(|path| !path.trim().is_empty()),
        })
    }
}

/// Get the OS name used by library rules for the current platform.
fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

impl VersionJson {
    pub fn parse(raw: &str) -> InstallerResult<Self> {
        serde_json::from_str(raw).map_err(InstallerError::from)
    }

    /// Base game download for a side, if published.
    pub fn download_for(&self, side: crate::core::Side) -> Option<&DownloadArtifact> {
        let downloads = self.downloads.as_ref()?;
        match side {
            crate::core::Side::Client => downloads.client.as_ref(),
            crate::core::Side::Server => downloads.server.as_ref(),
        }
    }

    /// Download specs for every library allowed on this OS.
    pub fn library_specs(&self) -> InstallerResult<Vec<DownloadSpec>> {
        let mut specs = Vec::new();
        for lib in &self.libraries {
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", lib.name);
                continue;
            }
            specs.push(lib.to_download_spec()?);
        }
        Ok(specs)
    }
}
