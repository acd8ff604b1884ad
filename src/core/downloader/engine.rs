use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use md5::Md5;
use reqwest::header::ETAG;
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::checksum::{existing_file_is_valid, sha1_bytes, verify_or_delete};
use super::store::DownloadSpec;
use crate::core::bundle::{version_descriptor_entry, InstallerArchive};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::MOJANG_LIBRARIES;
use crate::core::profile::Mirror;
use crate::core::version::{VersionManifest, VERSION_MANIFEST_URL};

/// Where a resolved file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Bundle,
    Network,
}

/// Result of resolving one artifact. Errors travel in the surrounding `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { path: PathBuf, origin: Origin },
    Skipped { reason: String },
}

/// What a completed network fetch observed.
#[derive(Debug)]
struct Fetched {
    etag: Option<String>,
    md5: String,
    size: u64,
}

/// Sequential, checksum-verifying artifact resolver.
///
/// Order per artifact: valid cached file, embedded copy in the installer
/// bundle, network (optionally through a mirror). Nothing is retried.
pub struct DownloadEngine {
    client: Client,
    offline: bool,
    mirror: Option<Mirror>,
    archive: Option<InstallerArchive>,
    version_manifest_url: String,
}

impl DownloadEngine {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            offline: false,
            mirror: None,
            archive: None,
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_mirror(mut self, mirror: Option<Mirror>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_archive(mut self, archive: InstallerArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_version_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.version_manifest_url = url.into();
        self
    }

    // ── Libraries ───────────────────────────────────────

    /// Resolve one library into the repository rooted at `root`.
    pub async fn resolve(&self, spec: &DownloadSpec, root: &Path) -> InstallerResult<Resolution> {
        let dest = spec.local_path(root);
        let sha1 = spec.sha1.as_deref();

        if existing_file_is_valid(&dest, sha1)? {
            debug!("Cached: {} -> {:?}", spec.coordinate, dest);
            return Ok(Resolution::Resolved {
                path: dest,
                origin: Origin::Cache,
            });
        }

        let entry = InstallerArchive::library_entry(&spec.relative_path());
        if self.extract_bundled(&entry, &dest, sha1)? {
            debug!("Extracted from installer: {} -> {:?}", spec.coordinate, dest);
            return Ok(Resolution::Resolved {
                path: dest,
                origin: Origin::Bundle,
            });
        }

        let Some(declared) = spec.url.as_deref() else {
            return Ok(Resolution::Skipped {
                reason: format!("{} has no download URL, expected from a processor", spec.coordinate),
            });
        };

        let url = self.effective_url(declared, &spec.relative_path());
        let fetched = self.fetch(&url, &dest, sha1).await?;
        if let Some(expected) = spec.size {
            if expected != fetched.size {
                warn!(
                    "Size mismatch for {}: declared {}, received {}",
                    spec.coordinate, expected, fetched.size
                );
            }
        }

        info!("Downloaded {} from {}", spec.coordinate, url);
        Ok(Resolution::Resolved {
            path: dest,
            origin: Origin::Network,
        })
    }

    /// Rewrite a declared URL onto the mirror unless it already points at the
    /// official library host.
    pub fn effective_url(&self, declared: &str, relative_path: &str) -> String {
        match &self.mirror {
            Some(mirror) if !declared.starts_with(MOJANG_LIBRARIES) => {
                mirror.library_url(relative_path)
            }
            _ => declared.to_string(),
        }
    }

    // ── Main artifact ───────────────────────────────────

    /// Resolve a base game artifact.
    ///
    /// When no sha1 is published, a strong quoted ETag on the response is
    /// treated as the MD5 of the body and enforced.
    pub async fn download_main_artifact(
        &self,
        url: &str,
        sha1: Option<&str>,
        bundled_entry: Option<&str>,
        dest: &Path,
    ) -> InstallerResult<Resolution> {
        if existing_file_is_valid(dest, sha1)? {
            debug!("Cached main artifact {:?}", dest);
            return Ok(Resolution::Resolved {
                path: dest.to_path_buf(),
                origin: Origin::Cache,
            });
        }

        if let Some(entry) = bundled_entry {
            if self.extract_bundled(entry, dest, sha1)? {
                return Ok(Resolution::Resolved {
                    path: dest.to_path_buf(),
                    origin: Origin::Bundle,
                });
            }
        }

        let fetched = self.fetch(url, dest, sha1).await?;
        if sha1.is_none() {
            if let Some(expected) = fetched.etag.as_deref().and_then(strong_etag) {
                if !expected.eq_ignore_ascii_case(&fetched.md5) {
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(InstallerError::EtagMismatch {
                        path: dest.to_path_buf(),
                        expected: expected.to_string(),
                        actual: fetched.md5,
                    });
                }
                debug!("ETag verified for {:?}", dest);
            }
        }

        info!("Downloaded {} -> {:?}", url, dest);
        Ok(Resolution::Resolved {
            path: dest.to_path_buf(),
            origin: Origin::Network,
        })
    }

    /// Raw version descriptor for `minecraft_version`, bundled copy first.
    pub async fn fetch_version_descriptor(&self, minecraft_version: &str) -> InstallerResult<String> {
        if let Some(archive) = &self.archive {
            let entry = version_descriptor_entry(minecraft_version);
            if archive.contains(&entry) {
                debug!("Using bundled version descriptor {}", entry);
                return archive.read_string(&entry);
            }
        }

        if self.offline {
            return Err(InstallerError::OfflineBlocked {
                url: self.version_manifest_url.clone(),
            });
        }

        let manifest = VersionManifest::fetch(&self.client, &self.version_manifest_url).await?;
        let entry = manifest.find_version(minecraft_version).ok_or_else(|| {
            InstallerError::Other(format!(
                "Version {} not found in version manifest",
                minecraft_version
            ))
        })?;

        let response = self.client.get(&entry.url).send().await?;
        if !response.status().is_success() {
            return Err(InstallerError::DownloadFailed {
                url: entry.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let raw = response.text().await?;

        if let Some(expected) = &entry.sha1 {
            let actual = sha1_bytes(raw.as_bytes());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(InstallerError::ChecksumMismatch {
                    path: PathBuf::from(&entry.url),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(raw)
    }

    // ── Internals ───────────────────────────────────────

    /// Copy an embedded entry out and check it. A mismatching copy is
    /// deleted and reported as "not available" so the caller moves on.
    fn extract_bundled(&self, entry: &str, dest: &Path, sha1: Option<&str>) -> InstallerResult<bool> {
        let Some(archive) = &self.archive else {
            return Ok(false);
        };
        if !archive.extract_to(entry, dest)? {
            return Ok(false);
        }
        match sha1 {
            None => Ok(true),
            Some(expected) => match verify_or_delete(dest, expected) {
                Ok(()) => Ok(true),
                Err(InstallerError::ChecksumMismatch { .. }) => {
                    warn!("Embedded copy {} is corrupt, falling back to network", entry);
                    Ok(false)
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Stream `url` straight into `dest`, hashing on the way.
    ///
    /// Any failure after the file was created deletes it.
    async fn fetch(&self, url: &str, dest: &Path, sha1: Option<&str>) -> InstallerResult<Fetched> {
        if self.offline {
            return Err(InstallerError::OfflineBlocked {
                url: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut sha1_hasher = Sha1::new();
        let mut md5_hasher = Md5::new();
        let mut size = 0u64;

        let written: InstallerResult<()> = async {
            // Write inside a block so the handle is dropped before any cleanup.
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| InstallerError::io(dest, e))?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                sha1_hasher.update(&chunk);
                md5_hasher.update(&chunk);
                size += chunk.len() as u64;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| InstallerError::io(dest, e))?;
            }
            file.flush().await.map_err(|e| InstallerError::io(dest, e))?;
            Ok(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }

        if let Some(expected) = sha1 {
            let actual = hex::encode(sha1_hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(InstallerError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(Fetched {
            etag,
            md5: hex::encode(md5_hasher.finalize()),
            size,
        })
    }
}

/// Quoted, non-weak, single-part ETag value without its quotes.
fn strong_etag(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.starts_with("W/") {
        return None;
    }
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    if inner.is_empty() || inner.contains('-') {
        return None;
    }
    Some(inner)
}
